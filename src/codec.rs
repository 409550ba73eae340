//! Record codec: gzip-then-base64 for a single raw record.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};

/// Hard failure from the underlying compression/encoding stream.
/// Treated as fatal for the single record that triggered it, never the batch.
#[derive(Debug)]
pub struct CodecFailure(String);

impl std::fmt::Display for CodecFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "codec failure: {}", self.0)
    }
}

impl std::error::Error for CodecFailure {}

impl From<io::Error> for CodecFailure {
    fn from(e: io::Error) -> Self {
        CodecFailure(e.to_string())
    }
}

/// gzip (default level) then base64 (standard alphabet, padded).
/// Deterministic: identical input always yields identical output.
pub fn encode(raw: &[u8]) -> Result<String, CodecFailure> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2 + 16), Compression::default());
    encoder.write_all(raw)?;
    let gzipped = encoder.finish()?;
    Ok(STANDARD.encode(gzipped))
}

/// Inverse of [`encode`]. Only used by tests and the functional probe endpoint contract.
pub fn decode(encoded: &str) -> Result<Vec<u8>, CodecFailure> {
    let gzipped = STANDARD
        .decode(encoded)
        .map_err(|e| CodecFailure(e.to_string()))?;
    let mut decoder = GzDecoder::new(gzipped.as_slice());
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    Ok(raw)
}
