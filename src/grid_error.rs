//! StagGridError: unified error type for staggrid public APIs.
//!
//! Every fallible operation in the crate reports through this enum so callers
//! see one error surface. Precondition violations (caller bugs) are explicit
//! variants rather than panics; they carry no recovery path and must never be
//! silently ignored. External solver non-convergence is *not* an error; it is
//! reported through [`SolveStatus`](crate::assembly::backend::SolveStatus).

use crate::level::patch::PatchId;
use thiserror::Error;

/// Unified error type for staggrid operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StagGridError {
    /// `initialize` was called on a solver that is already initialized.
    #[error("level solver is already initialized")]
    AlreadyInitialized,
    /// `solve` or `deallocate` was called before `initialize`.
    #[error("level solver is not initialized")]
    NotInitialized,
    /// A patch owned by this rank has no allocated data in the level field.
    #[error("patch `{0}` has no allocated side data (caller must allocate before use)")]
    PatchDataUnallocated(PatchId),
    /// A patch id does not name a patch of the level.
    #[error("patch `{0}` is not part of this level")]
    UnknownPatch(PatchId),
    /// A region failed a structural check (reported at the point of detection).
    #[error("malformed region: {detail}")]
    MalformedRegion { detail: String },
    /// Two patch boxes of one level intersect.
    #[error("patches `{0}` and `{1}` overlap in index space")]
    OverlappingPatches(PatchId, PatchId),
    /// A patch box extends beyond the level's physical domain.
    #[error("patch `{0}` extends beyond the level domain")]
    PatchOutsideDomain(PatchId),
    /// The level's ghost width cannot support the requested stencil.
    #[error("ghost width mismatch: need at least {expected}, level has {found}")]
    GhostWidthMismatch { expected: i64, found: i64 },
    /// A side index fell outside the allocated (ghosted) side box.
    #[error("side index {index:?} out of bounds on axis {axis}")]
    SideIndexOutOfBounds { axis: usize, index: Vec<i64> },
    /// An axis argument exceeded the spatial dimension.
    #[error("axis {axis} is invalid for dimension {dim}")]
    InvalidAxis { axis: usize, dim: usize },
    /// A degree of freedom was read before the partitioner assigned it.
    #[error("unassigned degree of freedom at {index:?} on axis {axis}")]
    UnassignedDof { axis: usize, index: Vec<i64> },
    /// A duplicate entry was consumed before its owner index was exchanged.
    #[error("unresolved duplicate degree of freedom at {index:?} on axis {axis}")]
    UnresolvedDuplicateDof { axis: usize, index: Vec<i64> },
    /// A global index fell outside the assembled system.
    #[error("global dof index {index} out of range (total {total})")]
    DofOutOfRange { index: u64, total: u64 },
    /// The requested operation is not supported by this backend/configuration.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),
    /// A communication exchange with a neighbor rank failed.
    #[error("communication with rank {neighbor} failed: {detail}")]
    CommError { neighbor: usize, detail: String },
    /// A received buffer did not match the size implied by the schedule.
    #[error("buffer size mismatch from rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
}
