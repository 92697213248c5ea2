pub mod candidate;
pub mod chunker;
pub mod codec;
pub mod config;
pub mod error;
pub mod format;
pub mod pipeline;
pub mod sampler;
pub mod search;
pub mod stop;
pub mod store;
pub mod transform;
pub mod verify;

pub use candidate::{CandidateResult, VerifiedCandidate};
pub use chunker::{Chunk, Chunks};
pub use codec::Codec;
pub use config::{ChunkSizePolicy, SearchConfig};
pub use error::{Error, Result};
pub use format::Metadata;
pub use search::{SearchOptimizer, SearchReport, SearchState};
pub use stop::{CancelToken, StopReason, StopRule, StopRules};
pub use store::{ArtifactInfo, ArtifactStore};
pub use transform::{TransformKind, TransformParameters};
