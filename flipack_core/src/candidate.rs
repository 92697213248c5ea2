use crate::transform::TransformParameters;

/// One trial's parameters and the compressor output they produced.
///
/// Candidates are ranked by compressed size ascending; on equal sizes the
/// earlier trial ranks first.
#[derive(Debug, Clone)]
pub struct CandidateResult {
    pub trial: u64,
    pub params: TransformParameters,
    pub compressed_bytes: Vec<u8>,
}

impl CandidateResult {
    #[inline]
    pub fn compressed_size(&self) -> usize {
        self.compressed_bytes.len()
    }

    /// True when `self` should be preferred over `other`.
    pub fn ranks_before(&self, other: &CandidateResult) -> bool {
        (self.compressed_size(), self.trial) < (other.compressed_size(), other.trial)
    }
}

/// A candidate that has been proven to restore the original input exactly.
///
/// Only round-trip verification constructs this type, and only this type can
/// be persisted as an artifact.
#[derive(Debug)]
pub struct VerifiedCandidate {
    candidate: CandidateResult,
    original_size: u64,
}

impl VerifiedCandidate {
    pub(crate) fn new(candidate: CandidateResult, original_size: u64) -> Self {
        Self {
            candidate,
            original_size,
        }
    }

    pub fn trial(&self) -> u64 {
        self.candidate.trial
    }

    pub fn params(&self) -> &TransformParameters {
        &self.candidate.params
    }

    pub fn original_size(&self) -> u64 {
        self.original_size
    }

    pub fn compressed_size(&self) -> usize {
        self.candidate.compressed_size()
    }

    pub fn compressed_bytes(&self) -> &[u8] {
        &self.candidate.compressed_bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.candidate.compressed_bytes
    }
}
