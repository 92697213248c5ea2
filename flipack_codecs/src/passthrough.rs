use flipack_core::{Codec, Result};

/// No-op codec: the artifact is the transformed payload verbatim.
///
/// Useful for:
/// - Checking the transform and metadata round trip without a backend in the way.
/// - Seeing exactly what size the search is comparing: with no compressor the
///   only thing that varies is the metadata length.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>> {
        Ok(compressed.to_vec())
    }
}
