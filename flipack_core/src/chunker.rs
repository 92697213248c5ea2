use crate::error::{Error, Result};

/// Descriptor of one fixed-size slice of the zero-padded buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub offset: usize,
    pub length: usize,
}

/// A buffer partitioned into `chunk_count` chunks of exactly `chunk_size`
/// bytes each. The last chunk is zero-padded, so `padded_len()` is always a
/// multiple of `chunk_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunks {
    data: Vec<u8>,
    chunk_size: usize,
}

impl Chunks {
    /// Copy `buffer` into chunks of `chunk_size` bytes.
    ///
    /// Fails with `InvalidParameter` for an empty buffer, a zero chunk size,
    /// or a chunk size larger than the buffer.
    pub fn split(buffer: &[u8], chunk_size: usize) -> Result<Self> {
        if buffer.is_empty() {
            return Err(Error::InvalidParameter("cannot chunk an empty buffer".into()));
        }
        if chunk_size == 0 || chunk_size > buffer.len() {
            return Err(Error::InvalidParameter(format!(
                "chunk_size {} outside 1..={}",
                chunk_size,
                buffer.len()
            )));
        }

        let chunk_count = buffer.len().div_ceil(chunk_size);
        let mut data = Vec::with_capacity(chunk_count * chunk_size);
        data.extend_from_slice(buffer);
        data.resize(chunk_count * chunk_size, 0);
        Ok(Self { data, chunk_size })
    }

    /// Wrap an already padded buffer, e.g. the payload of a decoded artifact.
    pub fn from_padded(data: Vec<u8>, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || data.len() % chunk_size != 0 {
            return Err(Error::InvalidParameter(format!(
                "padded length {} is not a multiple of chunk_size {}",
                data.len(),
                chunk_size
            )));
        }
        Ok(Self { data, chunk_size })
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.data.len() / self.chunk_size
    }

    #[inline]
    pub fn padded_len(&self) -> usize {
        self.data.len()
    }

    pub fn descriptors(&self) -> impl Iterator<Item = Chunk> + '_ {
        (0..self.chunk_count()).map(move |index| Chunk {
            index,
            offset: index * self.chunk_size,
            length: self.chunk_size,
        })
    }

    pub fn chunk(&self, index: usize) -> Option<&[u8]> {
        let start = index.checked_mul(self.chunk_size)?;
        self.data.get(start..start + self.chunk_size)
    }

    pub fn chunk_mut(&mut self, index: usize) -> Option<&mut [u8]> {
        let start = index.checked_mul(self.chunk_size)?;
        self.data.get_mut(start..start + self.chunk_size)
    }

    /// Concatenate the chunks in order. Padding is kept.
    pub fn join(self) -> Vec<u8> {
        self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Number of chunks `len` bytes occupy at `chunk_size`.
#[inline]
pub fn chunk_count_for(len: usize, chunk_size: usize) -> usize {
    if chunk_size == 0 {
        0
    } else {
        len.div_ceil(chunk_size)
    }
}
