mod gzip_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use gzip_codec::GzipCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;

use flipack_core::{Codec, Error, Result};

/// Names accepted by [`codec_by_name`].
pub const CODEC_NAMES: &[&str] = &["passthrough", "zstd", "lz4", "gzip"];

/// Resolve a codec from its CLI name.
///
/// `level` is passed to codecs that have one (zstd, gzip); `None` keeps the
/// codec's default. Artifacts carry no codec tag, so extraction must resolve
/// the same name the artifact was written with.
pub fn codec_by_name(name: &str, level: Option<i32>) -> Result<Arc<dyn Codec>> {
    match name {
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        "zstd" | "z" => Ok(Arc::new(
            level.map_or_else(ZstdCodec::default, ZstdCodec::new),
        )),
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "gzip" | "gz" => Ok(Arc::new(level.map_or_else(GzipCodec::default, |l| {
            GzipCodec::new(l.max(0) as u32)
        }))),
        other => Err(Error::InvalidParameter(format!(
            "unknown codec '{}'. Valid options: {}",
            other,
            CODEC_NAMES.join(", ")
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(4096)
            .copied()
            .collect()
    }

    #[test]
    fn every_codec_round_trips() {
        let data = sample();
        for name in CODEC_NAMES {
            let codec = codec_by_name(name, None).unwrap();
            let packed = codec.compress(&data).unwrap();
            assert_eq!(codec.decompress(&packed).unwrap(), data, "{}", name);
        }
    }

    #[test]
    fn real_codecs_shrink_repetitive_input() {
        let data = sample();
        for name in ["zstd", "lz4", "gzip"] {
            let codec = codec_by_name(name, None).unwrap();
            assert!(codec.compress(&data).unwrap().len() < data.len() / 4, "{}", name);
        }
    }

    #[test]
    fn malformed_frames_are_backend_errors() {
        let garbage = [0x13u8, 0x37, 0xBE, 0xEF, 0x00, 0x01];
        for name in ["zstd", "gzip"] {
            let codec = codec_by_name(name, None).unwrap();
            assert!(
                matches!(codec.decompress(&garbage), Err(Error::CompressionBackend { .. })),
                "{}",
                name
            );
        }

        // Prefix declares 8 bytes, the block holds a single literal 'A'.
        let short_output = [0x08u8, 0x00, 0x00, 0x00, 0x10, 0x41];
        let truncated = [0x08u8, 0x00];
        let lz4 = codec_by_name("lz4", None).unwrap();
        for frame in [&short_output[..], &truncated[..]] {
            assert!(
                matches!(lz4.decompress(frame), Err(Error::CompressionBackend { .. })),
                "{:?}",
                frame
            );
        }
    }

    #[test]
    fn lz4_rejects_frames_whose_prefix_disagrees_with_output() {
        let lz4 = codec_by_name("lz4", None).unwrap();
        let mut packed = lz4.compress(&sample()).unwrap();
        let declared = u32::from_le_bytes([packed[0], packed[1], packed[2], packed[3]]);
        packed[..4].copy_from_slice(&(declared + 1).to_le_bytes());
        assert!(matches!(
            lz4.decompress(&packed),
            Err(Error::CompressionBackend { backend: "lz4", .. })
        ));
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert!(matches!(
            codec_by_name("brotli", None),
            Err(Error::InvalidParameter(_))
        ));
        assert_eq!(codec_by_name("z", Some(19)).unwrap().name(), "zstd");
    }
}
