//! Key material and report sealing for the push channel.
//!
//! The agent reuses the host's Ed25519 identity key rather than carrying
//! a dedicated PKI; the collector provisions that identity and holds the
//! matching secret, so it can open everything sealed under the derived
//! report key.

pub mod keys;
pub mod sealing;

pub use keys::{GeneratedKeys, HostIdentityKeys, KeyPair, KeyProvider};
pub use sealing::{open_report, seal_report, SealedReport};
