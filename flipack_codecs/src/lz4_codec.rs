use flipack_core::{Codec, Error, Result};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

/// LZ4 block codec with the uncompressed size prepended.
///
/// Fastest of the bundled codecs, which makes it the cheapest cost function
/// for long searches; its ratio is lower than zstd's.
///
/// Best for: quick searches, large inputs, latency-sensitive restores.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(compress_prepend_size(raw))
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        let declared = match compressed.get(..4) {
            Some(prefix) => u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]),
            None => return Err(Error::backend("lz4", "frame shorter than its size prefix")),
        };
        let out = decompress_size_prepended(compressed).map_err(|e| Error::backend("lz4", e))?;
        // lz4_flex only uses the prefix as a capacity hint.
        if out.len() != declared as usize {
            return Err(Error::backend(
                "lz4",
                format!("frame declares {} bytes but decodes to {}", declared, out.len()),
            ));
        }
        Ok(out)
    }
}
