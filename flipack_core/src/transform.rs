//! Reversible per-chunk transforms.
//!
//! A transform is described by [`TransformParameters`]: the chunk size used to
//! partition the buffer, the set of chunk positions to rewrite, and the
//! [`TransformKind`] applied to each selected chunk. Every kind is exactly
//! invertible and touches nothing outside the selected chunks, so
//! `invert(apply(x, p), p) == x` holds for every valid `x` and `p`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::chunker::{chunk_count_for, Chunks};
use crate::error::{Error, Result};

/// Bit width of the unit a `RotateBits` transform rotates.
pub const ROTATION_WIDTH: u32 = u8::BITS;

/// The byte-level rewrite applied to each selected chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Reverse the byte order of the chunk. Self-inverse.
    Reverse,
    /// Rotate every byte left by `n` bits (`1..=7`).
    RotateBits(u8),
    /// XOR every byte with a fixed mask. Self-inverse.
    XorMask(u8),
}

impl TransformKind {
    pub fn validate(&self) -> Result<()> {
        match *self {
            TransformKind::RotateBits(n) if n == 0 || u32::from(n) >= ROTATION_WIDTH => {
                Err(Error::InvalidParameter(format!(
                    "rotation amount {} outside 1..{}",
                    n, ROTATION_WIDTH
                )))
            }
            _ => Ok(()),
        }
    }

    /// The kind that undoes `self`.
    pub fn inverse(&self) -> TransformKind {
        match *self {
            TransformKind::RotateBits(n) => {
                let back = (ROTATION_WIDTH - u32::from(n) % ROTATION_WIDTH) % ROTATION_WIDTH;
                TransformKind::RotateBits(back as u8)
            }
            other => other,
        }
    }

    fn rewrite(&self, chunk: &mut [u8]) {
        match *self {
            TransformKind::Reverse => chunk.reverse(),
            TransformKind::RotateBits(n) => {
                for b in chunk.iter_mut() {
                    *b = b.rotate_left(u32::from(n));
                }
            }
            TransformKind::XorMask(mask) => {
                for b in chunk.iter_mut() {
                    *b ^= mask;
                }
            }
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformKind::Reverse => write!(f, "reverse"),
            TransformKind::RotateBits(n) => write!(f, "rotate:{}", n),
            TransformKind::XorMask(m) => write!(f, "xor:0x{:02x}", m),
        }
    }
}

/// Parses `reverse`, `rotate:<n>` and `xor:<mask>` (mask in decimal or `0x` hex).
impl FromStr for TransformKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (s.trim(), None),
        };
        let parse_u8 = |arg: Option<&str>| -> Result<u8> {
            let arg = arg.ok_or_else(|| {
                Error::InvalidParameter(format!("transform '{}' needs an argument", name))
            })?;
            let parsed = match arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
                Some(hex) => u8::from_str_radix(hex, 16),
                None => arg.parse::<u8>(),
            };
            parsed.map_err(|e| Error::InvalidParameter(format!("bad argument '{}': {}", arg, e)))
        };

        let kind = match name {
            "reverse" | "rev" => TransformKind::Reverse,
            "rotate" | "rot" => TransformKind::RotateBits(parse_u8(arg)?),
            "xor" => TransformKind::XorMask(parse_u8(arg)?),
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unknown transform '{}'. Valid options: reverse, rotate:<n>, xor:<mask>",
                    other
                )))
            }
        };
        kind.validate()?;
        Ok(kind)
    }
}

/// Sort and deduplicate chunk positions. Idempotent.
pub fn canonicalize(positions: &mut Vec<u32>) {
    positions.sort_unstable();
    positions.dedup();
}

/// Everything needed to apply or invert a transform on one buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransformParameters {
    pub chunk_size: u32,
    positions: Vec<u32>,
    pub kind: TransformKind,
}

impl TransformParameters {
    /// Build parameters; `positions` are canonicalized on the way in.
    pub fn new(chunk_size: u32, mut positions: Vec<u32>, kind: TransformKind) -> Self {
        canonicalize(&mut positions);
        Self {
            chunk_size,
            positions,
            kind,
        }
    }

    /// Selected chunk indices, ascending and unique.
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Number of chunks a buffer of `len` bytes splits into.
    pub fn chunk_count(&self, len: usize) -> usize {
        chunk_count_for(len, self.chunk_size as usize)
    }

    /// Check these parameters against a buffer of `original_len` bytes.
    pub fn validate(&self, original_len: usize) -> Result<()> {
        self.kind.validate()?;
        if self.chunk_size == 0 || self.chunk_size as usize > original_len {
            return Err(Error::InvalidParameter(format!(
                "chunk_size {} outside 1..={}",
                self.chunk_size, original_len
            )));
        }
        let chunk_count = self.chunk_count(original_len);
        self.check_positions(chunk_count)
    }

    fn check_positions(&self, chunk_count: usize) -> Result<()> {
        match self.positions.last() {
            Some(&last) if last as usize >= chunk_count => Err(Error::InvalidParameter(format!(
                "position {} out of range for {} chunks",
                last, chunk_count
            ))),
            _ => Ok(()),
        }
    }
}

/// Rewrite every selected chunk with `params.kind`.
pub fn apply(chunks: &mut Chunks, params: &TransformParameters) -> Result<()> {
    rewrite_selected(chunks, params, params.kind)
}

/// Undo [`apply`] with the same parameters.
pub fn invert(chunks: &mut Chunks, params: &TransformParameters) -> Result<()> {
    rewrite_selected(chunks, params, params.kind.inverse())
}

fn rewrite_selected(
    chunks: &mut Chunks,
    params: &TransformParameters,
    kind: TransformKind,
) -> Result<()> {
    if chunks.chunk_size() != params.chunk_size as usize {
        return Err(Error::InvalidParameter(format!(
            "chunks are {} bytes but parameters say {}",
            chunks.chunk_size(),
            params.chunk_size
        )));
    }
    params.check_positions(chunks.chunk_count())?;

    for &pos in params.positions() {
        if let Some(chunk) = chunks.chunk_mut(pos as usize) {
            kind.rewrite(chunk);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(buffer: &[u8], params: &TransformParameters) -> Vec<u8> {
        let mut chunks = Chunks::split(buffer, params.chunk_size as usize).unwrap();
        apply(&mut chunks, params).unwrap();
        invert(&mut chunks, params).unwrap();
        let mut out = chunks.join();
        out.truncate(buffer.len());
        out
    }

    #[test]
    fn reverse_selected_chunk_only() {
        let params = TransformParameters::new(4, vec![0], TransformKind::Reverse);
        let mut chunks = Chunks::split(b"ABCDEFGH", 4).unwrap();
        apply(&mut chunks, &params).unwrap();
        assert_eq!(chunks.as_bytes(), b"DCBAEFGH");

        invert(&mut chunks, &params).unwrap();
        assert_eq!(chunks.join(), b"ABCDEFGH");
    }

    #[test]
    fn zero_buffer_reversal_is_a_no_op() {
        let buffer = [0u8; 16];
        let params = TransformParameters::new(4, vec![1, 3], TransformKind::Reverse);
        let mut chunks = Chunks::split(&buffer, 4).unwrap();
        apply(&mut chunks, &params).unwrap();
        assert_eq!(chunks.as_bytes(), &buffer);
        assert_eq!(roundtrip(&buffer, &params), buffer);
    }

    #[test]
    fn every_kind_inverts() {
        let buffer: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let kinds = [
            TransformKind::Reverse,
            TransformKind::RotateBits(1),
            TransformKind::RotateBits(3),
            TransformKind::RotateBits(7),
            TransformKind::XorMask(0xA5),
            TransformKind::XorMask(0xFF),
        ];
        for kind in kinds {
            for chunk_size in [1u32, 7, 64, 333, 1000] {
                let count = chunk_count_for(buffer.len(), chunk_size as usize) as u32;
                let positions: Vec<u32> = (0..count).step_by(2).collect();
                let params = TransformParameters::new(chunk_size, positions, kind);
                assert_eq!(roundtrip(&buffer, &params), buffer, "{} @ {}", kind, chunk_size);
            }
        }
    }

    #[test]
    fn rotation_changes_bytes_and_inverse_uses_complement() {
        assert_eq!(TransformKind::RotateBits(3).inverse(), TransformKind::RotateBits(5));
        assert_eq!(TransformKind::XorMask(9).inverse(), TransformKind::XorMask(9));

        let params = TransformParameters::new(2, vec![1], TransformKind::RotateBits(1));
        let mut chunks = Chunks::split(&[0x81, 0x01, 0x81, 0x01], 2).unwrap();
        apply(&mut chunks, &params).unwrap();
        assert_eq!(chunks.as_bytes(), &[0x81, 0x01, 0x03, 0x02]);
    }

    #[test]
    fn out_of_range_position_is_invalid() {
        let params = TransformParameters::new(4, vec![2], TransformKind::Reverse);
        let mut chunks = Chunks::split(b"ABCDEFGH", 4).unwrap();
        assert!(matches!(
            apply(&mut chunks, &params),
            Err(Error::InvalidParameter(_))
        ));
        assert!(params.validate(8).is_err());
        assert!(params.validate(9).is_ok());
    }

    #[test]
    fn canonicalize_is_idempotent() {
        let mut once = vec![9, 3, 3, 0, 9, 1];
        canonicalize(&mut once);
        assert_eq!(once, vec![0, 1, 3, 9]);
        let mut twice = once.clone();
        canonicalize(&mut twice);
        assert_eq!(once, twice);

        let params = TransformParameters::new(1, vec![5, 2, 5], TransformKind::Reverse);
        assert_eq!(params.positions(), &[2, 5]);
    }

    #[test]
    fn parse_kinds() {
        assert_eq!("reverse".parse::<TransformKind>().unwrap(), TransformKind::Reverse);
        assert_eq!(
            "rotate:3".parse::<TransformKind>().unwrap(),
            TransformKind::RotateBits(3)
        );
        assert_eq!(
            "xor:0xff".parse::<TransformKind>().unwrap(),
            TransformKind::XorMask(0xFF)
        );
        assert!("rotate:8".parse::<TransformKind>().is_err());
        assert!("rotate".parse::<TransformKind>().is_err());
        assert!("shuffle".parse::<TransformKind>().is_err());
    }
}
