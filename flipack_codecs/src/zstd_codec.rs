use flipack_core::{Codec, Error, Result};

/// Zstandard codec.
///
/// The whole payload is compressed as a single frame at the configured level
/// (default: 3). The frame carries its own content size, so decompression
/// needs no size hint.
///
/// Best for: general text, JSON, logs, mixed structured data.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        zstd::bulk::compress(raw, self.level).map_err(|e| Error::backend("zstd", e))
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(compressed).map_err(|e| Error::backend("zstd", e))
    }
}
