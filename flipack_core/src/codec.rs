use crate::error::Result;

/// The general-purpose byte compressor the search optimizes against.
///
/// Implementations are treated as opaque: the search only looks at the length
/// of `compress` output, and trusts `decompress(compress(x)) == x` no further
/// than round-trip verification proves it for the chosen candidate.
/// - `compress` must be deterministic for a given input and configuration, or
///   the size comparison between trials is meaningless.
/// - `decompress` must return `Error::CompressionBackend` on malformed input
///   rather than panic.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display and logs.
    fn name(&self) -> &'static str;

    /// Compress a whole buffer into a self-contained frame.
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;

    /// Decompress a frame produced by `compress`.
    fn decompress(&self, compressed: &[u8]) -> Result<Vec<u8>>;
}
