use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use flipack_core::{Codec, Error, Result};

/// Gzip (DEFLATE) codec.
///
/// Slower and usually larger than zstd, but readable by every platform's
/// stock tooling once the payload is decompressed.
pub struct GzipCodec {
    /// Compression level (0 = store, 9 = smallest).
    pub level: u32,
}

impl Default for GzipCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl GzipCodec {
    pub fn new(level: u32) -> Self {
        Self {
            level: level.min(9),
        }
    }
}

impl Codec for GzipCodec {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        let mut encoder = GzEncoder::new(
            Vec::with_capacity(raw.len() / 2),
            Compression::new(self.level),
        );
        encoder
            .write_all(raw)
            .map_err(|e| Error::backend("gzip", e))?;
        encoder.finish().map_err(|e| Error::backend("gzip", e))
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(compressed)
            .read_to_end(&mut out)
            .map_err(|e| Error::backend("gzip", e))?;
        Ok(out)
    }
}
