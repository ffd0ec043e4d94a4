//! Degrees of freedom: global indices, per-side assignment state, and the
//! per-rank partition of the assembled system.
//!
//! A `GlobalDof` is a strong handle for one unknown of the distributed linear
//! system. The DOF index field stores a [`DofEntry`] per real side position:
//! unassigned, owned with a global index, or a duplicate of a side owned by a
//! neighboring patch (whose index becomes known once the data-synch schedule
//! has run over the index field).

pub mod partition;

use crate::debug_invariants::DebugInvariants;
use crate::grid_error::StagGridError;
use std::fmt;

pub use partition::{assign_level_dofs, resolve_duplicate_dofs};

/// Global index of one degree of freedom in the assembled system.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct GlobalDof(u64);

impl GlobalDof {
    /// Wrap a raw global index.
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw global index.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for GlobalDof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalDof").field(&self.0).finish()
    }
}

impl fmt::Display for GlobalDof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Assignment state of one staggered-grid side position.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DofEntry {
    /// Not yet visited by the partitioner (also the state of ghost positions
    /// before the index field has been ghost-filled).
    #[default]
    Unassigned,
    /// This patch is authoritative for the side; the index is final.
    Owned(GlobalDof),
    /// The side is owned by a neighboring patch. The payload holds the
    /// owner's index once the index field has been synchronized, `None`
    /// before that.
    Duplicate(Option<GlobalDof>),
}

impl DofEntry {
    /// The global index usable for matrix/vector addressing, if known.
    #[inline]
    pub fn global(&self) -> Option<GlobalDof> {
        match self {
            DofEntry::Owned(g) | DofEntry::Duplicate(Some(g)) => Some(*g),
            _ => None,
        }
    }

    /// Whether this patch is authoritative for the side.
    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self, DofEntry::Owned(_))
    }
}

/// Per-rank owned-DOF counts of one level, with this rank identified.
///
/// The union of the per-rank ranges is the contiguous interval
/// `[0, total())`; rank `r` owns `[offset_of(r), offset_of(r) + counts[r])`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DofPartition {
    counts: Vec<u64>,
    rank: usize,
}

impl DofPartition {
    /// Build a partition from per-rank counts, identifying the calling rank.
    pub fn new(counts: Vec<u64>, rank: usize) -> Self {
        Self { counts, rank }
    }

    /// This rank's index in `counts`.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Owned-DOF counts per rank.
    #[inline]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Number of DOFs owned by this rank.
    #[inline]
    pub fn local_count(&self) -> u64 {
        self.counts[self.rank]
    }

    /// First global index owned by this rank (prefix sum of lower ranks).
    pub fn local_offset(&self) -> u64 {
        self.counts[..self.rank].iter().sum()
    }

    /// Total number of DOFs across all ranks.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Global index range owned by `rank`.
    pub fn range_of(&self, rank: usize) -> std::ops::Range<u64> {
        let start: u64 = self.counts[..rank].iter().sum();
        start..start + self.counts[rank]
    }
}

impl DebugInvariants for DofPartition {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "DofPartition invalid");
    }

    fn validate_invariants(&self) -> Result<(), StagGridError> {
        if self.rank >= self.counts.len() {
            return Err(StagGridError::UnsupportedOperation(
                "partition rank outside counts",
            ));
        }
        // Ranges must tile [0, total) without gaps.
        let mut expected = 0u64;
        for r in 0..self.counts.len() {
            let range = self.range_of(r);
            if range.start != expected {
                return Err(StagGridError::DofOutOfRange {
                    index: range.start,
                    total: self.total(),
                });
            }
            expected = range.end;
        }
        Ok(())
    }
}
