use crate::chunker::chunk_count_for;
use crate::error::{Error, Result};
use crate::transform::{TransformKind, TransformParameters};

/// Current metadata layout version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the fixed metadata prefix in bytes.
///   version:u8 + kind_tag:u8 + kind_arg:u8
///   + original_size:u32 + chunk_size:u32 + position_count:u32
///   = 1 + 1 + 1 + 4 + 4 + 4 = 15
pub const FIXED_PREFIX_SIZE: usize = 15;

/// Size of one encoded chunk position.
pub const POSITION_SIZE: usize = 4;

/// Largest input the `original_size` field can describe.
pub const MAX_ORIGINAL_SIZE: u64 = u32::MAX as u64;

// ── Transform kind tags ────────────────────────────────────────────────────

pub const KIND_REVERSE: u8 = 0;
pub const KIND_ROTATE_BITS: u8 = 1;
pub const KIND_XOR_MASK: u8 = 2;

fn kind_to_bytes(kind: TransformKind) -> (u8, u8) {
    match kind {
        TransformKind::Reverse => (KIND_REVERSE, 0),
        TransformKind::RotateBits(n) => (KIND_ROTATE_BITS, n),
        TransformKind::XorMask(m) => (KIND_XOR_MASK, m),
    }
}

fn kind_from_bytes(tag: u8, arg: u8) -> Result<TransformKind> {
    let kind = match (tag, arg) {
        (KIND_REVERSE, 0) => TransformKind::Reverse,
        (KIND_ROTATE_BITS, n) => TransformKind::RotateBits(n),
        (KIND_XOR_MASK, m) => TransformKind::XorMask(m),
        (tag, arg) => {
            return Err(Error::CorruptMetadata(format!(
                "unknown transform tag {} (arg {})",
                tag, arg
            )))
        }
    };
    kind.validate().map_err(|e| Error::CorruptMetadata(e.to_string()))?;
    Ok(kind)
}

// ── Metadata record ────────────────────────────────────────────────────────

/// Decoded metadata prefix: the transform parameters plus the exact
/// pre-padding length of the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub params: TransformParameters,
    pub original_size: u64,
}

impl Metadata {
    pub fn new(params: TransformParameters, original_size: u64) -> Self {
        Self {
            params,
            original_size,
        }
    }

    /// Encoded length of this record in bytes.
    pub fn encoded_len(&self) -> usize {
        FIXED_PREFIX_SIZE + self.params.positions().len() * POSITION_SIZE
    }

    /// Serialize to the version-1 layout. Positions are written ascending.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let original_size = u32::try_from(self.original_size).map_err(|_| {
            Error::InvalidParameter(format!(
                "input of {} bytes exceeds the {} byte ceiling",
                self.original_size, MAX_ORIGINAL_SIZE
            ))
        })?;
        let positions = self.params.positions();
        let position_count = u32::try_from(positions.len())
            .map_err(|_| Error::InvalidParameter("too many positions".into()))?;
        let (tag, arg) = kind_to_bytes(self.params.kind);

        let mut buf = Vec::with_capacity(self.encoded_len());
        buf.push(FORMAT_VERSION);
        buf.push(tag);
        buf.push(arg);
        buf.extend_from_slice(&original_size.to_le_bytes());
        buf.extend_from_slice(&self.params.chunk_size.to_le_bytes());
        buf.extend_from_slice(&position_count.to_le_bytes());
        for pos in positions {
            buf.extend_from_slice(&pos.to_le_bytes());
        }
        Ok(buf)
    }

    /// Deserialize from the front of `buf`.
    ///
    /// Returns the record and the number of bytes it occupied; everything
    /// after that is the transformed payload.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize)> {
        if buf.len() < FIXED_PREFIX_SIZE {
            return Err(Error::CorruptMetadata(format!(
                "need {} bytes for the metadata prefix, got {}",
                FIXED_PREFIX_SIZE,
                buf.len()
            )));
        }
        if buf[0] != FORMAT_VERSION {
            return Err(Error::CorruptMetadata(format!(
                "unsupported metadata version {} (only version {} is supported)",
                buf[0], FORMAT_VERSION
            )));
        }
        let kind = kind_from_bytes(buf[1], buf[2])?;
        let original_size = read_u32(buf, 3);
        let chunk_size = read_u32(buf, 7);
        let position_count = read_u32(buf, 11) as usize;

        if chunk_size == 0 {
            return Err(Error::CorruptMetadata("chunk_size is 0".into()));
        }

        let available = buf.len() - FIXED_PREFIX_SIZE;
        let needed = position_count
            .checked_mul(POSITION_SIZE)
            .filter(|&n| n <= available)
            .ok_or_else(|| {
                Error::CorruptMetadata(format!(
                    "{} positions declared but only {} bytes remain",
                    position_count, available
                ))
            })?;

        let chunk_count = chunk_count_for(original_size as usize, chunk_size as usize);
        let mut positions = Vec::with_capacity(position_count);
        for i in 0..position_count {
            let pos = read_u32(buf, FIXED_PREFIX_SIZE + i * POSITION_SIZE);
            if positions.last().is_some_and(|&prev| pos <= prev) {
                return Err(Error::CorruptMetadata(format!(
                    "positions not strictly ascending at entry {}",
                    i
                )));
            }
            if pos as usize >= chunk_count {
                return Err(Error::CorruptMetadata(format!(
                    "position {} out of range for {} chunks",
                    pos, chunk_count
                )));
            }
            positions.push(pos);
        }

        let params = TransformParameters::new(chunk_size, positions, kind);
        Ok((
            Self::new(params, u64::from(original_size)),
            FIXED_PREFIX_SIZE + needed,
        ))
    }
}

#[inline]
fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut le = [0u8; 4];
    le.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(le)
}

/// Encode `params` and `original_size` into a metadata prefix.
pub fn encode(params: &TransformParameters, original_size: u64) -> Result<Vec<u8>> {
    Metadata::new(params.clone(), original_size).to_bytes()
}

/// Decode a metadata prefix: `(params, original_size, bytes_consumed)`.
pub fn decode(prefix: &[u8]) -> Result<(TransformParameters, u64, usize)> {
    let (meta, consumed) = Metadata::from_bytes(prefix)?;
    Ok((meta.params, meta.original_size, consumed))
}
