//! Side data: per-axis face-centered value arrays over a patch box.
//!
//! `SideData<D, V>` holds one contiguous array per coordinate axis, each
//! covering the patch's side box for that axis grown by the ghost width.
//! Storage is row-major with the last axis fastest, matching
//! [`Region::iter`](crate::geometry::region::Region::iter). `LevelData`
//! collects the per-patch arrays a rank owns for one variable.

use crate::geometry::region::Region;
use crate::grid_error::StagGridError;
use crate::level::patch::{PatchId, PatchLevel};
use std::collections::HashMap;

/// Face-centered storage for one patch: D arrays, one per axis.
#[derive(Clone, Debug)]
pub struct SideData<const D: usize, V> {
    region: Region<D>,
    ghosts: i64,
    boxes: [Region<D>; D],
    data: [Vec<V>; D],
}

impl<const D: usize, V: Clone + Default> SideData<D, V> {
    /// Allocate default-initialized side data over `region` with `ghosts`
    /// ghost layers per axis.
    pub fn new(region: Region<D>, ghosts: i64) -> Self {
        let boxes: [Region<D>; D] =
            std::array::from_fn(|axis| region.to_side_box(axis).grow(ghosts));
        let data: [Vec<V>; D] = std::array::from_fn(|axis| vec![V::default(); boxes[axis].size()]);
        Self {
            region,
            ghosts,
            boxes,
            data,
        }
    }

    /// The underlying cell box.
    #[inline]
    pub fn region(&self) -> &Region<D> {
        &self.region
    }

    /// Ghost width per axis.
    #[inline]
    pub fn ghosts(&self) -> i64 {
        self.ghosts
    }

    /// Side box for `axis` without ghosts.
    #[inline]
    pub fn side_box(&self, axis: usize) -> Region<D> {
        self.region.to_side_box(axis)
    }

    /// The allocated (ghosted) side box for `axis`.
    #[inline]
    pub fn axis_box(&self, axis: usize) -> &Region<D> {
        &self.boxes[axis]
    }

    fn offset(&self, axis: usize, idx: [i64; D]) -> Result<usize, StagGridError> {
        if axis >= D {
            return Err(StagGridError::InvalidAxis { axis, dim: D });
        }
        self.boxes[axis]
            .offset_of(idx)
            .ok_or_else(|| StagGridError::SideIndexOutOfBounds {
                axis,
                index: idx.to_vec(),
            })
    }

    /// Read the value at side `idx` of the `axis` field.
    pub fn get(&self, axis: usize, idx: [i64; D]) -> Result<&V, StagGridError> {
        let off = self.offset(axis, idx)?;
        Ok(&self.data[axis][off])
    }

    /// Mutable access to the value at side `idx` of the `axis` field.
    pub fn get_mut(&mut self, axis: usize, idx: [i64; D]) -> Result<&mut V, StagGridError> {
        let off = self.offset(axis, idx)?;
        Ok(&mut self.data[axis][off])
    }

    /// Overwrite the value at side `idx` of the `axis` field.
    pub fn set(&mut self, axis: usize, idx: [i64; D], value: V) -> Result<(), StagGridError> {
        *self.get_mut(axis, idx)? = value;
        Ok(())
    }

    /// The raw storage of one axis field, ghost layers included.
    #[inline]
    pub fn axis_values(&self, axis: usize) -> &[V] {
        &self.data[axis]
    }

    /// Mutable raw storage of one axis field, ghost layers included.
    #[inline]
    pub fn axis_values_mut(&mut self, axis: usize) -> &mut [V] {
        &mut self.data[axis]
    }

    /// Set every side in `region` of the `axis` field from `f(idx)`.
    pub fn fill_with(
        &mut self,
        axis: usize,
        region: &Region<D>,
        mut f: impl FnMut([i64; D]) -> V,
    ) -> Result<(), StagGridError> {
        for idx in region.iter() {
            self.set(axis, idx, f(idx))?;
        }
        Ok(())
    }
}

/// Per-patch side data for the patches one rank owns.
#[derive(Clone, Debug, Default)]
pub struct LevelData<const D: usize, V> {
    entries: HashMap<PatchId, SideData<D, V>>,
}

impl<const D: usize, V: Clone + Default> LevelData<D, V> {
    /// Allocate side data for every patch of `level` owned by `rank`.
    pub fn allocate(level: &PatchLevel<D>, rank: usize, ghosts: i64) -> Self {
        let entries = level
            .local_patches(rank)
            .map(|p| (p.id(), SideData::new(*p.region(), ghosts)))
            .collect();
        Self { entries }
    }

    /// Side data for `patch`, if allocated on this rank.
    pub fn get(&self, patch: PatchId) -> Option<&SideData<D, V>> {
        self.entries.get(&patch)
    }

    /// Mutable side data for `patch`, if allocated on this rank.
    pub fn get_mut(&mut self, patch: PatchId) -> Option<&mut SideData<D, V>> {
        self.entries.get_mut(&patch)
    }

    /// Side data for `patch`.
    ///
    /// # Errors
    /// `PatchDataUnallocated` when this rank holds no data for `patch`,
    /// a caller precondition violation, never recovered from.
    pub fn try_patch(&self, patch: PatchId) -> Result<&SideData<D, V>, StagGridError> {
        self.entries
            .get(&patch)
            .ok_or(StagGridError::PatchDataUnallocated(patch))
    }

    /// Mutable variant of [`try_patch`](Self::try_patch).
    pub fn try_patch_mut(&mut self, patch: PatchId) -> Result<&mut SideData<D, V>, StagGridError> {
        self.entries
            .get_mut(&patch)
            .ok_or(StagGridError::PatchDataUnallocated(patch))
    }

    /// Number of patches with allocated data.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no patch has allocated data.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
