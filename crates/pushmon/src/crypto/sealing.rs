//! Whole-message sealing using X25519 key exchange and XChaCha20-Poly1305.
//!
//! Every outgoing wire line is sealed as a unit under the report key
//! before it touches the socket. Messages are short, so asymmetric
//! sealing per datagram is acceptable; there is no session.
//!
//! # Construction
//! - Ephemeral-Static Diffie-Hellman: fresh ephemeral key per message
//! - XChaCha20-Poly1305 AEAD: authenticated encryption
//! - Each datagram carries its own ephemeral public key and nonce

use anyhow::{anyhow, Result};
use chacha20poly1305::{
    aead::{Aead, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

/// Length of the fixed header preceding the ciphertext on the wire.
const HEADER_LEN: usize = 32 + 24;

/// A sealed wire line, ready to be framed into a single datagram.
#[derive(Debug, Clone)]
pub struct SealedReport {
    /// Ephemeral public key for the ECDH exchange (32 bytes)
    pub ephemeral_pubkey: [u8; 32],
    /// Nonce for XChaCha20-Poly1305 (24 bytes)
    pub nonce: [u8; 24],
    /// Ciphertext, including the AEAD authentication tag
    pub ciphertext: Vec<u8>,
}

impl SealedReport {
    /// Datagram layout: `ephemeral_pub(32) || nonce(24) || ciphertext`.
    pub fn to_datagram(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        buf.extend_from_slice(&self.ephemeral_pubkey);
        buf.extend_from_slice(&self.nonce);
        buf.extend_from_slice(&self.ciphertext);
        buf
    }

    /// Parse a datagram produced by [`SealedReport::to_datagram`].
    pub fn from_datagram(data: &[u8]) -> Result<Self> {
        if data.len() <= HEADER_LEN {
            anyhow::bail!("Sealed datagram too short: {} bytes", data.len());
        }

        let mut ephemeral_pubkey = [0u8; 32];
        ephemeral_pubkey.copy_from_slice(&data[..32]);
        let mut nonce = [0u8; 24];
        nonce.copy_from_slice(&data[32..HEADER_LEN]);

        Ok(Self { ephemeral_pubkey, nonce, ciphertext: data[HEADER_LEN..].to_vec() })
    }
}

/// Seal a plaintext wire line under the report key.
///
/// Each call generates a fresh ephemeral keypair, so equal plaintexts
/// never produce equal datagrams.
pub fn seal_report(plaintext: &[u8], report_key: &[u8; 32]) -> Result<SealedReport> {
    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let recipient_public = PublicKey::from(*report_key);
    let shared_secret = ephemeral_secret.diffie_hellman(&recipient_public);

    let key = XChaCha20Poly1305::new(shared_secret.as_bytes().into());

    let mut nonce_bytes = [0u8; 24];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from(nonce_bytes);

    let ciphertext =
        key.encrypt(&nonce, plaintext).map_err(|e| anyhow!("Sealing failed: {}", e))?;

    Ok(SealedReport {
        ephemeral_pubkey: ephemeral_public.to_bytes(),
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Open a sealed report with the recipient's X25519 secret key.
///
/// This is the collector's half of the exchange; the agent only needs it
/// in tests.
pub fn open_report(sealed: &SealedReport, recipient_secret: &[u8; 32]) -> Result<Vec<u8>> {
    let recipient_static = StaticSecret::from(*recipient_secret);
    let ephemeral_public = PublicKey::from(sealed.ephemeral_pubkey);
    let shared_secret = recipient_static.diffie_hellman(&ephemeral_public);

    let key = XChaCha20Poly1305::new(shared_secret.as_bytes().into());

    let nonce = XNonce::from(sealed.nonce);
    key.decrypt(&nonce, sealed.ciphertext.as_ref())
        .map_err(|e| anyhow!("Opening failed (wrong key or tampered data): {}", e))
}
