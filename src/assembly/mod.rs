//! Distributed linear-system assembly: moving side fields in and out of
//! backend vectors and building the sparse operator.
//!
//! Owned entries are the only ones that touch the vector; duplicate side
//! values are skipped on copy-in and recovered on copy-out by executing the
//! data-synch schedule, followed by the ghost-fill schedule for stencil
//! access. The right-hand side is adjusted for physical boundary conditions
//! on a private copy that never escapes [`setup_rhs`].

pub mod backend;
pub mod stencil;

use crate::comm::Communicator;
use crate::dof::{DofEntry, DofPartition};
use crate::grid_error::StagGridError;
use crate::level::patch::PatchLevel;
use crate::level::side_data::LevelData;
use crate::schedule::SynchSchedule;
use crate::schedule::delta::CopyDelta;
use log::debug;

pub use backend::{LinearBackend, SerialBackend, SolveStatus, SolverOptions};
pub use stencil::{PoissonStencil, StencilProvider, StencilRow};

/// Communication tag for the copy-out data synchronization.
pub const DATA_SYNCH_TAG: u16 = 0x5C00;
/// Communication tag for the copy-out ghost fill.
pub const GHOST_FILL_TAG: u16 = 0x5C01;

/// Write every owned side value of `field` into `vec` at its global index.
///
/// Duplicate entries are skipped; synchronization recovers them after the
/// solve. An `Unassigned` entry inside a patch side box means the partitioner
/// has not run: a precondition violation.
pub fn copy_to_vec<const D: usize, B: LinearBackend>(
    backend: &B,
    level: &PatchLevel<D>,
    rank: usize,
    field: &LevelData<D, f64>,
    dof: &LevelData<D, DofEntry>,
    vec: &mut B::Vector,
) -> Result<(), StagGridError> {
    for patch in level.local_patches(rank) {
        let fdata = field.try_patch(patch.id())?;
        let ddata = dof.try_patch(patch.id())?;
        for axis in 0..D {
            for idx in patch.region().to_side_box(axis).iter() {
                match ddata.get(axis, idx)? {
                    DofEntry::Owned(g) => {
                        backend.vec_set(vec, *g, *fdata.get(axis, idx)?)?;
                    }
                    DofEntry::Duplicate(_) => {}
                    DofEntry::Unassigned => {
                        return Err(StagGridError::UnassignedDof {
                            axis,
                            index: idx.to_vec(),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// Read owned entries of `vec` back into `field`, then reconcile duplicates
/// (data-synch schedule) and fill ghost regions (ghost-fill schedule).
///
/// Collective: the schedule executions communicate.
pub fn copy_from_vec<const D: usize, B: LinearBackend, C: Communicator>(
    backend: &B,
    vec: &B::Vector,
    level: &PatchLevel<D>,
    field: &mut LevelData<D, f64>,
    dof: &LevelData<D, DofEntry>,
    data_synch: &SynchSchedule<D>,
    ghost_fill: &SynchSchedule<D>,
    comm: &C,
) -> Result<(), StagGridError> {
    let rank = comm.rank();
    for patch in level.local_patches(rank) {
        let fdata = field.try_patch_mut(patch.id())?;
        let ddata = dof.try_patch(patch.id())?;
        for axis in 0..D {
            for idx in patch.region().to_side_box(axis).iter() {
                if let DofEntry::Owned(g) = ddata.get(axis, idx)? {
                    let value = backend.vec_get(vec, *g)?;
                    fdata.set(axis, idx, value)?;
                }
            }
        }
    }
    data_synch.execute::<f64, CopyDelta, C>(level, field, comm, DATA_SYNCH_TAG)?;
    ghost_fill.execute::<f64, CopyDelta, C>(level, field, comm, GHOST_FILL_TAG)?;
    Ok(())
}

/// Load the right-hand side into `vec`, applying boundary-condition
/// adjustments for patches that touch the physical domain boundary.
///
/// The adjustments happen on a private copy of `b_field`; the caller's data
/// is never mutated, and the copy is released before returning.
pub fn setup_rhs<const D: usize, B: LinearBackend, S: StencilProvider<D>>(
    backend: &B,
    level: &PatchLevel<D>,
    rank: usize,
    b_field: &LevelData<D, f64>,
    dof: &LevelData<D, DofEntry>,
    provider: &S,
    homogeneous: bool,
    vec: &mut B::Vector,
) -> Result<(), StagGridError> {
    let mut b_adj = b_field.clone();
    for patch in level.local_patches(rank) {
        if !level.touches_physical_boundary(patch) {
            continue;
        }
        let data = b_adj.try_patch_mut(patch.id())?;
        for axis in 0..D {
            for idx in patch.region().to_side_box(axis).iter() {
                let original = *data.get(axis, idx)?;
                let adjusted = provider.adjust_rhs(level, patch, axis, idx, original, homogeneous);
                if adjusted != original {
                    data.set(axis, idx, adjusted)?;
                }
            }
        }
    }
    copy_to_vec(backend, level, rank, &b_adj, dof, vec)
}

/// Assemble the sparse operator: one row per owned DOF, with stencil
/// neighbor indices translated to global indices through the DOF field.
///
/// Requires a resolved DOF field (duplicates synchronized and ghosts filled);
/// an unresolved neighbor is reported as `UnresolvedDuplicateDof`.
pub fn assemble_matrix<const D: usize, B: LinearBackend, S: StencilProvider<D>>(
    backend: &B,
    level: &PatchLevel<D>,
    rank: usize,
    dof: &LevelData<D, DofEntry>,
    provider: &S,
    partition: &DofPartition,
) -> Result<B::Matrix, StagGridError> {
    let mut matrix = backend.create_matrix(partition)?;
    let mut rows = 0usize;
    for patch in level.local_patches(rank) {
        let ddata = dof.try_patch(patch.id())?;
        for axis in 0..D {
            for idx in patch.region().to_side_box(axis).iter() {
                let row_index = match ddata.get(axis, idx)? {
                    DofEntry::Owned(g) => *g,
                    DofEntry::Duplicate(_) => continue,
                    DofEntry::Unassigned => {
                        return Err(StagGridError::UnassignedDof {
                            axis,
                            index: idx.to_vec(),
                        });
                    }
                };
                let stencil_row = provider.row(level, patch, axis, idx);
                let mut entries = Vec::with_capacity(stencil_row.entries.len());
                for (nidx, coef) in stencil_row.entries {
                    let global = ddata.get(axis, nidx)?.global().ok_or_else(|| {
                        StagGridError::UnresolvedDuplicateDof {
                            axis,
                            index: nidx.to_vec(),
                        }
                    })?;
                    entries.push((global, coef));
                }
                backend.mat_set_row(&mut matrix, row_index, &entries)?;
                rows += 1;
            }
        }
    }
    debug!("assembled {rows} matrix rows on rank {rank}");
    Ok(matrix)
}
