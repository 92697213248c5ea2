use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use xxhash_rust::xxh3::xxh3_64;

use crate::candidate::VerifiedCandidate;
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::Metadata;
use crate::pipeline;

/// Summary of an artifact on disk.
#[derive(Debug, Clone)]
pub struct ArtifactInfo {
    pub path: PathBuf,
    /// Size of the artifact file (the compressed payload).
    pub artifact_size: u64,
    /// xxhash3-64 of the artifact bytes.
    pub digest: u64,
    pub metadata: Metadata,
    /// Size of the decompressed payload: metadata prefix plus padded chunks.
    pub payload_size: u64,
}

impl ArtifactInfo {
    /// Compression ratio (original / artifact).
    pub fn ratio(&self) -> f64 {
        if self.artifact_size == 0 {
            return 1.0;
        }
        self.metadata.original_size as f64 / self.artifact_size as f64
    }
}

/// Writes verified artifacts and restores them.
///
/// # Artifact layout
/// ```text
/// codec.compress( [METADATA: 15 + 4 × positions bytes] [TRANSFORMED CHUNKS] )
/// ```
/// There is no outer header; the reader must use the codec the writer used.
///
/// # Write contract
/// [`persist`] only accepts a [`VerifiedCandidate`]. The bytes go to a freshly
/// created sibling `<path>.<pid>.<n>.tmp` file first, are read back and
/// digest-checked, and only then renamed over `path`. A failed write or rename
/// removes the temp file and never leaves a partial file under the final name.
/// [`restore_to`] writes its output the same way.
pub struct ArtifactStore {
    codec: Arc<dyn Codec>,
}

impl ArtifactStore {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    /// Persist `artifact` at `path`, consuming it.
    pub fn persist(
        &self,
        path: impl AsRef<Path>,
        artifact: VerifiedCandidate,
    ) -> Result<ArtifactInfo> {
        let path = path.as_ref();
        let metadata = Metadata::new(artifact.params().clone(), artifact.original_size());
        let payload_size = (metadata.encoded_len()
            + artifact.params().chunk_count(artifact.original_size() as usize)
                * artifact.params().chunk_size as usize) as u64;
        let bytes = artifact.into_bytes();
        let digest = xxh3_64(&bytes);

        write_atomically(path, &bytes, digest)?;

        log::info!(
            "wrote {} ({} bytes, digest {:016x})",
            path.display(),
            bytes.len(),
            digest
        );

        Ok(ArtifactInfo {
            path: path.to_path_buf(),
            artifact_size: bytes.len() as u64,
            digest,
            metadata,
            payload_size,
        })
    }

    /// Restore the original bytes from an in-memory artifact.
    pub fn restore_bytes(&self, artifact: &[u8]) -> Result<Vec<u8>> {
        let payload = self.codec.decompress(artifact)?;
        let (meta, restored) = pipeline::reverse(&payload)?;
        log::debug!(
            "restored {} bytes (chunk_size {}, {} positions, {})",
            meta.original_size,
            meta.params.chunk_size,
            meta.params.positions().len(),
            meta.params.kind
        );
        Ok(restored)
    }

    /// Restore the original bytes from the artifact at `path`.
    pub fn restore(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let artifact = fs::read(path.as_ref())?;
        self.restore_bytes(&artifact)
    }

    /// Restore the artifact at `input` and write the original bytes to `output`.
    ///
    /// Returns the number of bytes written.
    pub fn restore_to(&self, input: impl AsRef<Path>, output: impl AsRef<Path>) -> Result<u64> {
        let restored = self.restore(input)?;
        write_atomically(output.as_ref(), &restored, xxh3_64(&restored))?;
        Ok(restored.len() as u64)
    }

    /// Decode the artifact's metadata without inverting its payload.
    pub fn inspect(&self, path: impl AsRef<Path>) -> Result<ArtifactInfo> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let payload = self.codec.decompress(&bytes)?;
        let (metadata, _) = Metadata::from_bytes(&payload)?;
        Ok(ArtifactInfo {
            path: path.to_path_buf(),
            artifact_size: bytes.len() as u64,
            digest: xxh3_64(&bytes),
            metadata,
            payload_size: payload.len() as u64,
        })
    }
}

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

const MAX_TEMP_ATTEMPTS: u32 = 16;

/// Write `bytes` next to `path` under a fresh temp name, check them, then
/// rename over `path`. The temp file is removed on every failure.
fn write_atomically(path: &Path, bytes: &[u8], digest: u64) -> Result<()> {
    let tmp = create_temp_sibling(path, bytes)?;
    let result = check_written(&tmp, digest)
        .and_then(|()| fs::rename(&tmp, path).map_err(Error::from));
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Create a temp file that did not exist before and fill it with `bytes`.
/// Existing files are never truncated.
fn create_temp_sibling(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    for _ in 0..MAX_TEMP_ATTEMPTS {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        let tmp = PathBuf::from(name);

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&tmp) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        let written = file.write_all(bytes).and_then(|()| file.sync_all());
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        return Ok(tmp);
    }
    Err(Error::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free temp name next to {}", path.display()),
    )))
}

fn check_written(path: &Path, digest: u64) -> Result<()> {
    let written = fs::read(path)?;
    let on_disk = xxh3_64(&written);
    if on_disk != digest {
        return Err(Error::CorruptionDetected(format!(
            "{} digest mismatch after write: expected {:016x}, got {:016x}",
            path.display(),
            digest,
            on_disk
        )));
    }
    Ok(())
}
