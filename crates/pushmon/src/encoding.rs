//! Probe output encoding for the wire line.

use std::io::Write;

use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use flate2::write::ZlibEncoder;
use flate2::Compression;

/// Compress and encode raw probe output into a transport-safe payload.
///
/// The raw bytes are deflated at maximum ratio and base64-encoded with
/// no padding or line breaks, yielding a single-line ASCII token the
/// collector inflates back. Deterministic: equal input, equal output.
pub fn encode_report(raw: &[u8]) -> Result<String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(raw).context("Failed to compress probe output")?;
    let compressed = encoder.finish().context("Failed to compress probe output")?;

    Ok(STANDARD_NO_PAD.encode(compressed))
}
