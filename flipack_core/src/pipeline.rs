//! The two directions of the artifact payload:
//!
//! ```text
//! forward: metadata(params, len) ++ join(apply(split(buffer, chunk_size)))
//! reverse: decode metadata → split payload → invert → join → truncate(len)
//! ```
//!
//! The compressor sits outside both functions; callers wrap `forward` in
//! `Codec::compress` and feed `reverse` the output of `Codec::decompress`.

use crate::chunker::Chunks;
use crate::error::{Error, Result};
use crate::format::{self, Metadata};
use crate::transform::{self, TransformParameters};

/// Build the uncompressed artifact payload for `buffer` under `params`.
pub fn forward(buffer: &[u8], params: &TransformParameters) -> Result<Vec<u8>> {
    params.validate(buffer.len())?;
    let mut chunks = Chunks::split(buffer, params.chunk_size as usize)?;
    transform::apply(&mut chunks, params)?;

    let mut out = format::encode(params, buffer.len() as u64)?;
    out.reserve(chunks.padded_len());
    out.extend_from_slice(chunks.as_bytes());
    Ok(out)
}

/// Recover the original bytes from an uncompressed artifact payload.
///
/// Returns the decoded metadata alongside the restored buffer.
pub fn reverse(payload: &[u8]) -> Result<(Metadata, Vec<u8>)> {
    let (meta, consumed) = Metadata::from_bytes(payload)?;
    let body = &payload[consumed..];

    let chunk_size = meta.params.chunk_size as usize;
    let expected = meta.params.chunk_count(meta.original_size as usize) * chunk_size;
    if body.len() != expected {
        return Err(Error::CorruptMetadata(format!(
            "payload holds {} bytes but metadata implies {} ({} bytes in chunks of {})",
            body.len(),
            expected,
            meta.original_size,
            chunk_size
        )));
    }

    let mut chunks = Chunks::from_padded(body.to_vec(), chunk_size)?;
    transform::invert(&mut chunks, &meta.params)?;
    let mut restored = chunks.join();
    restored.truncate(meta.original_size as usize);
    Ok((meta, restored))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::TransformKind;

    #[test]
    fn forward_lays_out_metadata_then_chunks() {
        let params = TransformParameters::new(4, vec![0], TransformKind::Reverse);
        let payload = forward(b"ABCDEFGH", &params).unwrap();
        let meta_len = format::FIXED_PREFIX_SIZE + format::POSITION_SIZE;
        assert_eq!(&payload[meta_len..], b"DCBAEFGH");

        let (meta, restored) = reverse(&payload).unwrap();
        assert_eq!(meta.original_size, 8);
        assert_eq!(meta.params, params);
        assert_eq!(restored, b"ABCDEFGH");
    }

    #[test]
    fn padding_is_truncated_on_reverse() {
        let params = TransformParameters::new(3, vec![0, 1, 2, 3], TransformKind::XorMask(0x0F));
        let input = b"0123456789";
        let payload = forward(input, &params).unwrap();
        let (_, restored) = reverse(&payload).unwrap();
        assert_eq!(restored, input);
    }

    #[test]
    fn truncated_payload_is_corrupt() {
        let params = TransformParameters::new(4, vec![1], TransformKind::Reverse);
        let payload = forward(b"ABCDEFGH", &params).unwrap();
        assert!(matches!(
            reverse(&payload[..payload.len() - 1]),
            Err(Error::CorruptMetadata(_))
        ));
    }

    #[test]
    fn invalid_parameters_are_rejected_before_encoding() {
        let params = TransformParameters::new(16, vec![], TransformKind::Reverse);
        assert!(matches!(
            forward(b"short", &params),
            Err(Error::InvalidParameter(_))
        ));
    }
}
