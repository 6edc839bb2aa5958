//! Host identity keys with X25519 derivation.
//!
//! The agent does not provision its own PKI. It loads the host's
//! existing Ed25519 identity secret and converts it to an X25519 pair;
//! reports are sealed under the converted public key (the "report key").

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};

/// The host identity keys plus the X25519 pair derived from them.
///
/// The Ed25519 secret key is converted to an X25519 secret key via
/// standard clamping, and the X25519 public key is derived from that via
/// scalar multiplication with the Curve25519 base point.
#[derive(Clone, Debug)]
pub struct KeyPair {
    pub signing_key: SigningKey,
    pub verifying_key: VerifyingKey,
    /// Cached X25519 public key (derived from the Ed25519 secret key)
    x25519_public: [u8; 32],
    /// Cached clamped X25519 secret bytes
    x25519_secret: [u8; 32],
}

impl KeyPair {
    /// Build a keypair from an Ed25519 signing key, performing the
    /// Ed25519 → X25519 format conversion:
    ///   - Clear the lowest 3 bits (multiple of 8)
    ///   - Clear bit 255 (< 2^255)
    ///   - Set bit 254 (high bit for constant-time ops)
    pub fn new(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();

        let mut x25519_secret_bytes = signing_key.to_bytes();
        x25519_secret_bytes[0] &= 248;
        x25519_secret_bytes[31] &= 127;
        x25519_secret_bytes[31] |= 64;

        let static_secret = X25519StaticSecret::from(x25519_secret_bytes);
        let x25519_public = X25519PublicKey::from(&static_secret);

        Self {
            signing_key,
            verifying_key,
            x25519_public: x25519_public.to_bytes(),
            x25519_secret: x25519_secret_bytes,
        }
    }

    /// Load a keypair from a 32-byte Ed25519 secret key file.
    pub fn from_secret_file(path: &Path) -> Result<Self> {
        let secret_bytes = fs::read(path)
            .with_context(|| format!("Failed to read identity key: {}", path.display()))?;

        if secret_bytes.len() != 32 {
            anyhow::bail!(
                "Invalid identity key {}: expected 32 bytes, got {}",
                path.display(),
                secret_bytes.len()
            );
        }

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&secret_bytes);

        Ok(Self::new(SigningKey::from_bytes(&bytes)))
    }

    /// The Ed25519 public key as bytes.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// The report key: the X25519 public key reports are sealed under.
    pub fn report_key(&self) -> [u8; 32] {
        self.x25519_public
    }

    /// The report key as a hex string (the on-disk export format).
    pub fn report_key_hex(&self) -> String {
        hex::encode(self.x25519_public)
    }

    /// X25519 secret key bytes for opening sealed reports (clamped, 32
    /// bytes). Only the collector side needs this at runtime.
    pub fn x25519_secret_bytes(&self) -> [u8; 32] {
        self.x25519_secret
    }
}

/// Source of the agent's key material.
///
/// `ensure_keys` is called exactly once at startup; any failure aborts
/// the process before a scheduling loop starts.
pub trait KeyProvider {
    fn ensure_keys(&self) -> Result<KeyPair>;
}

/// Keys derived from the host's pre-existing identity secret.
///
/// The converted public key is exported to `export_path` the first time
/// the agent runs; an existing export is reused untouched on later runs.
pub struct HostIdentityKeys {
    key_path: PathBuf,
    export_path: PathBuf,
}

impl HostIdentityKeys {
    pub fn new(key_path: PathBuf, export_path: PathBuf) -> Self {
        Self { key_path, export_path }
    }
}

impl KeyProvider for HostIdentityKeys {
    fn ensure_keys(&self) -> Result<KeyPair> {
        let keypair = KeyPair::from_secret_file(&self.key_path)?;

        if self.export_path.exists() {
            tracing::debug!("Reusing public key export: {}", self.export_path.display());
        } else {
            if let Some(parent) = self.export_path.parent() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create export directory for {}", self.export_path.display())
                })?;
            }
            fs::write(&self.export_path, keypair.report_key_hex()).with_context(|| {
                format!("Failed to write public key export: {}", self.export_path.display())
            })?;
            tracing::info!("Exported report key to: {}", self.export_path.display());
        }

        Ok(keypair)
    }
}

/// Freshly generated keys for dedicated deployments that do not share
/// the host identity.
pub struct GeneratedKeys;

impl KeyProvider for GeneratedKeys {
    fn ensure_keys(&self) -> Result<KeyPair> {
        let mut csprng = OsRng;
        let mut secret_bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut csprng, &mut secret_bytes);
        Ok(KeyPair::new(SigningKey::from_bytes(&secret_bytes)))
    }
}
