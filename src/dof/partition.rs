//! DOF partitioning: globally unique, process-contiguous side numbering.
//!
//! Every rank walks its local patches in id order and hands a fresh local
//! index to each side it is authoritative for. A side is a duplicate, and
//! numbered by the neighbor instead, exactly when it lies on the top face
//! layer of its axis *and* inside another patch's side box; this mirrors the
//! synchronization fill pattern, which copies onto a patch's top layer from
//! the neighbor that holds the same face as a bottom layer. An allgather of
//! per-rank counts followed by a prefix sum turns local indices global.

use crate::comm::Communicator;
use crate::dof::{DofEntry, DofPartition, GlobalDof};
use crate::grid_error::StagGridError;
use crate::level::patch::PatchLevel;
use crate::level::side_data::LevelData;
use crate::schedule::SynchSchedule;
use crate::schedule::delta::DofIndexDelta;
use log::debug;

/// Communication tag for the per-rank count allgather.
pub const DOF_COUNT_TAG: u16 = 0xA110;
/// Communication tag for synchronizing the index field across duplicates.
pub const DOF_SYNCH_TAG: u16 = 0xD0F0;
/// Communication tag for ghost-filling the index field.
pub const DOF_GHOST_TAG: u16 = 0xD0F1;

/// Assign a global index to every owned side of the level and mark duplicate
/// sides; returns the per-rank partition needed to size distributed objects.
///
/// The caller must have allocated `dof` for every patch this rank owns
/// (`PatchDataUnallocated` otherwise, a precondition violation). Collective:
/// every rank of the level must call this in the same relative order.
pub fn assign_level_dofs<const D: usize, C: Communicator>(
    level: &PatchLevel<D>,
    dof: &mut LevelData<D, DofEntry>,
    comm: &C,
) -> Result<DofPartition, StagGridError> {
    let rank = comm.rank();
    let mut local_count = 0u64;

    for patch in level.local_patches(rank) {
        let data = dof.try_patch_mut(patch.id())?;
        for axis in 0..D {
            let side_box = patch.region().to_side_box(axis);
            let top = side_box.upper()[axis];
            for idx in side_box.iter() {
                let duplicate = idx[axis] == top
                    && level.patches().any(|q| {
                        q.id() != patch.id() && q.region().to_side_box(axis).contains(idx)
                    });
                let entry = if duplicate {
                    DofEntry::Duplicate(None)
                } else {
                    let e = DofEntry::Owned(GlobalDof::new(local_count));
                    local_count += 1;
                    e
                };
                data.set(axis, idx, entry)?;
            }
        }
    }

    let counts = comm.allgather_u64(local_count, DOF_COUNT_TAG);
    let partition = DofPartition::new(counts, rank);
    crate::debug_invariants::DebugInvariants::debug_assert_invariants(&partition);
    let base = partition.local_offset();

    if base != 0 {
        for patch in level.local_patches(rank) {
            let data = dof.try_patch_mut(patch.id())?;
            for axis in 0..D {
                for entry in data.axis_values_mut(axis) {
                    if let DofEntry::Owned(g) = *entry {
                        *entry = DofEntry::Owned(GlobalDof::new(g.get() + base));
                    }
                }
            }
        }
    }

    debug!(
        "assigned {} local dofs on rank {} (global range {:?})",
        local_count,
        rank,
        partition.range_of(rank)
    );
    Ok(partition)
}

/// Propagate owner indices into duplicate and ghost entries of the index
/// field by executing the data-synch and ghost-fill schedules over it.
///
/// Must run after [`assign_level_dofs`] and before matrix assembly.
/// Collective, like all schedule executions.
pub fn resolve_duplicate_dofs<const D: usize, C: Communicator>(
    level: &PatchLevel<D>,
    dof: &mut LevelData<D, DofEntry>,
    data_synch: &SynchSchedule<D>,
    ghost_fill: &SynchSchedule<D>,
    comm: &C,
) -> Result<(), StagGridError> {
    data_synch.execute::<DofEntry, DofIndexDelta, C>(level, dof, comm, DOF_SYNCH_TAG)?;
    ghost_fill.execute::<DofEntry, DofIndexDelta, C>(level, dof, comm, DOF_GHOST_TAG)?;
    Ok(())
}
