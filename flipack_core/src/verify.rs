use crate::candidate::{CandidateResult, VerifiedCandidate};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::Metadata;
use crate::pipeline;

/// Prove that `compressed` restores `original` exactly under `codec`.
///
/// Runs the full restore path (decompress → decode → invert → truncate) and
/// byte-compares the result. Returns the decoded metadata on success.
pub fn verify_bytes(original: &[u8], compressed: &[u8], codec: &dyn Codec) -> Result<Metadata> {
    let payload = codec.decompress(compressed)?;
    let (meta, restored) = pipeline::reverse(&payload)?;

    if meta.original_size != original.len() as u64 {
        return Err(Error::CorruptionDetected(format!(
            "metadata records {} bytes but the input has {}",
            meta.original_size,
            original.len()
        )));
    }
    if restored != original {
        let first_diff = restored
            .iter()
            .zip(original)
            .position(|(a, b)| a != b)
            .unwrap_or(restored.len().min(original.len()));
        return Err(Error::CorruptionDetected(format!(
            "restored bytes differ from the input at offset {}",
            first_diff
        )));
    }
    Ok(meta)
}

/// Verify a search candidate, upgrading it to a [`VerifiedCandidate`].
///
/// The candidate is consumed either way; a rejected candidate must never be
/// published.
pub fn verify(
    original: &[u8],
    candidate: CandidateResult,
    codec: &dyn Codec,
) -> Result<VerifiedCandidate> {
    let meta = verify_bytes(original, &candidate.compressed_bytes, codec)?;
    if meta.params != candidate.params {
        return Err(Error::CorruptionDetected(format!(
            "trial {} decoded parameters differ from the ones it was built with",
            candidate.trial
        )));
    }
    Ok(VerifiedCandidate::new(candidate, meta.original_size))
}
