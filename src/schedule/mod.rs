//! Synchronization schedules: precomputed communication plans for duplicated
//! and ghost side values.
//!
//! Building a schedule performs no data movement: it records, per ordered
//! patch pair and axis, the destination regions the fill pattern yields. The
//! plan is collective metadata: every rank builds the identical op list from
//! the level geometry, which is what lets execution size its receive buffers
//! without a size exchange. A schedule stays valid until the patch partition
//! changes; rebuild it whenever the hierarchy does.

pub mod delta;

use crate::comm::{Communicator, Wait};
use crate::geometry::fill_pattern::{DefaultSidePattern, FillPattern, SideSynchPattern};
use crate::geometry::region::Region;
use crate::geometry::side::SideGeometry;
use crate::grid_error::StagGridError;
use crate::level::patch::{PatchId, PatchLevel};
use crate::level::side_data::LevelData;
use bytemuck::Zeroable;
use delta::Delta;
use hashbrown::HashMap;
use log::debug;

/// One planned copy: `region` (in destination index space) of the `axis`
/// field of `dst` receives values from `src`, translated by `offset`.
#[derive(Clone, Debug)]
pub struct CopyOp<const D: usize> {
    pub src: PatchId,
    pub dst: PatchId,
    pub axis: usize,
    pub region: Region<D>,
    pub offset: [i64; D],
}

/// A reusable communication plan over one patch level.
#[derive(Clone, Debug, Default)]
pub struct SynchSchedule<const D: usize> {
    ops: Vec<CopyOp<D>>,
}

/// Plan the boundary-exact reconciliation of duplicated side values: for
/// every patch pair with a non-empty synch overlap, the owner's bottom-layer
/// face value is copied onto the neighbor's top-layer storage.
pub fn build_data_synch_schedule<const D: usize>(level: &PatchLevel<D>) -> SynchSchedule<D> {
    build_schedule(level, &SideSynchPattern, 0, true)
}

/// Plan the propagation of interior values into neighbor ghost regions,
/// using the level's full ghost width.
pub fn build_ghost_fill_schedule<const D: usize>(level: &PatchLevel<D>) -> SynchSchedule<D> {
    build_schedule(level, &DefaultSidePattern, level.ghost_width(), false)
}

fn build_schedule<const D: usize>(
    level: &PatchLevel<D>,
    pattern: &dyn FillPattern<D>,
    ghosts: i64,
    overwrite_interior: bool,
) -> SynchSchedule<D> {
    let mut ops = Vec::new();
    for dst in level.patches() {
        for src in level.patches() {
            if src.id() == dst.id() {
                continue;
            }
            let dst_geom = SideGeometry::new(*dst.region(), ghosts);
            let src_geom = SideGeometry::new(*src.region(), ghosts);
            let overlap = pattern.compute_overlap(
                &dst_geom,
                &src_geom,
                src.region(),
                overwrite_interior,
                [0; D],
            );
            for axis in 0..D {
                for region in overlap.boxes(axis) {
                    ops.push(CopyOp {
                        src: src.id(),
                        dst: dst.id(),
                        axis,
                        region: *region,
                        offset: overlap.offset(),
                    });
                }
            }
        }
    }
    debug!(
        "built schedule with {} ops over {} patches",
        ops.len(),
        level.num_patches()
    );
    SynchSchedule { ops }
}

impl<const D: usize> SynchSchedule<D> {
    /// The planned copies, in deterministic build order.
    #[inline]
    pub fn ops(&self) -> &[CopyOp<D>] {
        &self.ops
    }

    /// Whether the plan contains no copies.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Execute the plan over `data` under the delta rule `Dl`.
    ///
    /// Copies between two local patches happen in place; copies with a remote
    /// end are packed per peer rank and exchanged through `comm`. Collective:
    /// every rank of the level must execute the same schedule in the same
    /// relative order, or the exchange deadlocks.
    pub fn execute<V, Dl, C>(
        &self,
        level: &PatchLevel<D>,
        data: &mut LevelData<D, V>,
        comm: &C,
        tag: u16,
    ) -> Result<(), StagGridError>
    where
        V: Clone + Default,
        Dl: Delta<V>,
        C: Communicator,
    {
        let rank = comm.rank();
        let mut local_ops: Vec<&CopyOp<D>> = Vec::new();
        let mut send_ops: HashMap<usize, Vec<&CopyOp<D>>> = HashMap::new();
        let mut recv_ops: HashMap<usize, Vec<&CopyOp<D>>> = HashMap::new();
        for op in &self.ops {
            let src_rank = level.patch(op.src)?.owner();
            let dst_rank = level.patch(op.dst)?.owner();
            match (src_rank == rank, dst_rank == rank) {
                (true, true) => local_ops.push(op),
                (true, false) => send_ops.entry(dst_rank).or_default().push(op),
                (false, true) => recv_ops.entry(src_rank).or_default().push(op),
                (false, false) => {}
            }
        }

        let part_size = std::mem::size_of::<Dl::Part>();

        // Post all receives first, sized from the plan itself.
        let mut recv_peers: Vec<usize> = recv_ops.keys().copied().collect();
        recv_peers.sort_unstable();
        let mut pending: Vec<(usize, C::RecvHandle)> = Vec::with_capacity(recv_peers.len());
        for &peer in &recv_peers {
            let count: usize = recv_ops[&peer].iter().map(|op| op.region.size()).sum();
            pending.push((peer, comm.irecv(peer, tag, count * part_size)));
        }

        // Pack and send, in plan order per peer.
        let mut send_peers: Vec<usize> = send_ops.keys().copied().collect();
        send_peers.sort_unstable();
        for &peer in &send_peers {
            let mut scratch: Vec<Dl::Part> = Vec::new();
            for op in &send_ops[&peer] {
                let src_data = data.try_patch(op.src)?;
                for idx in op.region.iter() {
                    scratch.push(Dl::restrict(src_data.get(op.axis, sub(idx, op.offset))?));
                }
            }
            comm.isend(peer, tag, bytemuck::cast_slice(&scratch));
        }

        // Purely local copies: restrict into scratch, then fuse, so the same
        // patch can legally be read and written by distinct ops.
        for op in local_ops {
            let mut scratch: Vec<Dl::Part> = Vec::with_capacity(op.region.size());
            {
                let src_data = data.try_patch(op.src)?;
                for idx in op.region.iter() {
                    scratch.push(Dl::restrict(src_data.get(op.axis, sub(idx, op.offset))?));
                }
            }
            let dst_data = data.try_patch_mut(op.dst)?;
            for (idx, part) in op.region.iter().zip(scratch) {
                Dl::fuse(dst_data.get_mut(op.axis, idx)?, part);
            }
        }

        // Wait for remote data and fuse it, in the same plan order it was
        // packed on the sending side.
        for (peer, handle) in pending {
            let raw = handle.wait().ok_or_else(|| StagGridError::CommError {
                neighbor: peer,
                detail: "no data received".into(),
            })?;
            let count: usize = recv_ops[&peer].iter().map(|op| op.region.size()).sum();
            if raw.len() != count * part_size {
                return Err(StagGridError::BufferSizeMismatch {
                    neighbor: peer,
                    expected: count * part_size,
                    got: raw.len(),
                });
            }
            let mut parts: Vec<Dl::Part> = vec![Dl::Part::zeroed(); count];
            bytemuck::cast_slice_mut::<Dl::Part, u8>(&mut parts).copy_from_slice(&raw);
            let mut k = 0;
            for op in &recv_ops[&peer] {
                let dst_data = data.try_patch_mut(op.dst)?;
                for idx in op.region.iter() {
                    Dl::fuse(dst_data.get_mut(op.axis, idx)?, parts[k]);
                    k += 1;
                }
            }
        }
        Ok(())
    }
}

#[inline]
fn sub<const D: usize>(idx: [i64; D], offset: [i64; D]) -> [i64; D] {
    std::array::from_fn(|d| idx[d] - offset[d])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::NoComm;
    use crate::schedule::delta::CopyDelta;

    fn two_patch_level() -> PatchLevel<2> {
        PatchLevel::new(
            Region::new([0, 0], [7, 3]),
            1,
            vec![
                (Region::new([0, 0], [3, 3]), 0),
                (Region::new([4, 0], [7, 3]), 0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn data_synch_plans_one_direction_only() {
        let level = two_patch_level();
        let sched = build_data_synch_schedule(&level);
        // Only the left patch's top face layer receives; 4 faces total.
        assert_eq!(sched.ops().len(), 1);
        let op = &sched.ops()[0];
        assert_eq!(op.dst, PatchId::new(0));
        assert_eq!(op.src, PatchId::new(1));
        assert_eq!(op.axis, 0);
        assert_eq!(op.region, Region::new([4, 0], [4, 3]));
    }

    #[test]
    fn data_synch_replicates_owner_values() {
        let level = two_patch_level();
        let sched = build_data_synch_schedule(&level);
        let mut data: LevelData<2, f64> = LevelData::allocate(&level, 0, 1);
        let shared = Region::new([4, 0], [4, 3]);
        data.try_patch_mut(PatchId::new(1))
            .unwrap()
            .fill_with(0, &shared, |idx| 100.0 + idx[1] as f64)
            .unwrap();
        sched
            .execute::<f64, CopyDelta, _>(&level, &mut data, &NoComm, 0x51)
            .unwrap();
        let left = data.try_patch(PatchId::new(0)).unwrap();
        for idx in shared.iter() {
            assert_eq!(*left.get(0, idx).unwrap(), 100.0 + idx[1] as f64);
        }
    }

    #[test]
    fn ghost_fill_targets_ghost_regions_only() {
        let level = two_patch_level();
        let sched = build_ghost_fill_schedule(&level);
        assert!(!sched.is_empty());
        for op in sched.ops() {
            let dst = level.patch(op.dst).unwrap();
            let interior = dst.region().to_side_box(op.axis);
            assert!(op.region.intersect(&interior).is_empty());
        }
    }

    #[test]
    fn ghost_fill_copies_neighbor_interior() {
        let level = two_patch_level();
        let sched = build_ghost_fill_schedule(&level);
        let mut data: LevelData<2, f64> = LevelData::allocate(&level, 0, 1);
        // Fill the right patch's whole axis-0 field with a marker function.
        let right_side = Region::new([4, 0], [8, 3]);
        data.try_patch_mut(PatchId::new(1))
            .unwrap()
            .fill_with(0, &right_side, |idx| idx[0] as f64)
            .unwrap();
        sched
            .execute::<f64, CopyDelta, _>(&level, &mut data, &NoComm, 0x52)
            .unwrap();
        // The left patch's ghost layer at x = 5 now mirrors the right patch.
        let left = data.try_patch(PatchId::new(0)).unwrap();
        for y in 0..4 {
            assert_eq!(*left.get(0, [5, y]).unwrap(), 5.0);
        }
    }

    #[test]
    fn single_patch_schedules_are_empty() {
        let level = PatchLevel::new(
            Region::new([0, 0], [3, 3]),
            1,
            vec![(Region::new([0, 0], [3, 3]), 0)],
        )
        .unwrap();
        assert!(build_data_synch_schedule(&level).is_empty());
        assert!(build_ghost_fill_schedule(&level).is_empty());
    }
}
