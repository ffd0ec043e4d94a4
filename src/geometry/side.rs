//! Staggered-grid geometry descriptors and the baseline side overlap.
//!
//! A [`SideGeometry`] pairs a patch's cell box with its ghost width and
//! answers side-box queries per axis. [`baseline_overlap`] is the generic
//! staggered overlap: for every axis it intersects the (ghost-grown)
//! destination side box with the translated, masked source side box. The
//! boundary-exact restriction on top of this baseline lives in
//! [`fill_pattern`](crate::geometry::fill_pattern).

use crate::geometry::region::Region;

/// Geometry of one patch's staggered data: cell box plus uniform ghost width.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SideGeometry<const D: usize> {
    region: Region<D>,
    ghosts: i64,
}

impl<const D: usize> SideGeometry<D> {
    /// Describe staggered data over `region` with `ghosts` ghost layers.
    pub fn new(region: Region<D>, ghosts: i64) -> Self {
        Self { region, ghosts }
    }

    /// The underlying cell box.
    #[inline]
    pub fn region(&self) -> &Region<D> {
        &self.region
    }

    /// Ghost width on every axis.
    #[inline]
    pub fn ghosts(&self) -> i64 {
        self.ghosts
    }

    /// Side box for `axis` without ghosts.
    #[inline]
    pub fn side_box(&self, axis: usize) -> Region<D> {
        self.region.to_side_box(axis)
    }

    /// Side box for `axis` grown by the ghost width.
    #[inline]
    pub fn ghost_side_box(&self, axis: usize) -> Region<D> {
        self.side_box(axis).grow(self.ghosts)
    }
}

/// Per-axis destination regions that must receive copied side values, plus
/// the source translation that produced them.
///
/// Only non-empty boxes are ever stored, so [`is_empty`](Self::is_empty)
/// cleanly distinguishes "no adjacency" from a populated result.
#[derive(Clone, Debug)]
pub struct SideOverlap<const D: usize> {
    boxes: [Vec<Region<D>>; D],
    offset: [i64; D],
}

impl<const D: usize> SideOverlap<D> {
    /// Assemble an overlap from per-axis destination boxes.
    pub fn new(boxes: [Vec<Region<D>>; D], offset: [i64; D]) -> Self {
        debug_assert!(
            boxes.iter().flatten().all(|b| !b.is_empty()),
            "overlap must not carry empty boxes"
        );
        Self { boxes, offset }
    }

    /// Destination boxes for one axis.
    #[inline]
    pub fn boxes(&self, axis: usize) -> &[Region<D>] {
        &self.boxes[axis]
    }

    /// The source translation offset.
    #[inline]
    pub fn offset(&self) -> [i64; D] {
        self.offset
    }

    /// True when no axis has any destination box.
    pub fn is_empty(&self) -> bool {
        self.boxes.iter().all(|v| v.is_empty())
    }

    /// Total number of face positions covered, across all axes.
    pub fn total_size(&self) -> usize {
        self.boxes.iter().flatten().map(|b| b.size()).sum()
    }
}

/// Generic staggered-grid overlap between a destination and a source.
///
/// For every axis: the source cell box is masked, converted to its side box,
/// translated by `offset`, and intersected with the destination side box
/// (grown by the destination ghost width). With `overwrite_interior` false the
/// destination interior is excluded, so only ghost positions are targeted.
pub fn baseline_overlap<const D: usize>(
    dst: &SideGeometry<D>,
    src: &SideGeometry<D>,
    mask: &Region<D>,
    overwrite_interior: bool,
    offset: [i64; D],
) -> SideOverlap<D> {
    let mut boxes: [Vec<Region<D>>; D] = std::array::from_fn(|_| Vec::new());
    let masked = src.region().intersect(mask);
    if !masked.is_empty() {
        for axis in 0..D {
            let src_side = masked.to_side_box(axis).shift(offset);
            let dst_interior = dst.side_box(axis);
            let dst_ghost = dst.ghost_side_box(axis);
            if overwrite_interior {
                let inter = dst_ghost.intersect(&src_side);
                if !inter.is_empty() {
                    boxes[axis].push(inter);
                }
            } else {
                for ghost_piece in dst_ghost.subtract(&dst_interior) {
                    let inter = ghost_piece.intersect(&src_side);
                    if !inter.is_empty() {
                        boxes[axis].push(inter);
                    }
                }
            }
        }
    }
    SideOverlap::new(boxes, offset)
}
