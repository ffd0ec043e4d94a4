//! Fill patterns: which destination face positions an overlap may write.
//!
//! A [`FillPattern`] is one closed variant of the overlap computation:
//! the default pattern fills everything the baseline geometry yields, while
//! [`SideSynchPattern`] restricts each axis to the destination's topmost face
//! layer so that a face value duplicated on two abutting patches is written
//! exactly once. The patch for which the shared face is the *bottom* layer of
//! its side box stays authoritative; the patch that sees it as its top layer
//! receives the copy.

use crate::geometry::region::Region;
use crate::geometry::side::{SideGeometry, SideOverlap, baseline_overlap};

/// Strategy for computing the destination regions of a staggered copy.
pub trait FillPattern<const D: usize> {
    /// Compute the per-axis destination regions for copying from `src` into
    /// `dst` under the translation `offset`, with candidate source faces
    /// limited to `mask`.
    fn compute_overlap(
        &self,
        dst: &SideGeometry<D>,
        src: &SideGeometry<D>,
        mask: &Region<D>,
        overwrite_interior: bool,
        offset: [i64; D],
    ) -> SideOverlap<D>;

    /// Width of the stencil this pattern fills (0 = destination ghost width).
    fn stencil_width(&self) -> i64;
}

/// Plain staggered overlap: everything the baseline geometry yields.
///
/// Used for ghost filling, where the full ghost width of the destination is
/// the target and interior values are never overwritten.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultSidePattern;

impl<const D: usize> FillPattern<D> for DefaultSidePattern {
    fn compute_overlap(
        &self,
        dst: &SideGeometry<D>,
        src: &SideGeometry<D>,
        mask: &Region<D>,
        overwrite_interior: bool,
        offset: [i64; D],
    ) -> SideOverlap<D> {
        baseline_overlap(dst, src, mask, overwrite_interior, offset)
    }

    fn stencil_width(&self) -> i64 {
        0
    }
}

/// Boundary-exact synchronization pattern for duplicated side values.
///
/// Starting from the baseline overlap, each axis keeps only the intersection
/// with the destination patch's top face layer on that axis, and an axis is
/// skipped entirely when the translation offset has a nonzero component on
/// any *other* axis; only axis-aligned on-boundary synchronization is
/// performed by this pattern.
#[derive(Clone, Copy, Debug, Default)]
pub struct SideSynchPattern;

impl<const D: usize> FillPattern<D> for SideSynchPattern {
    fn compute_overlap(
        &self,
        dst: &SideGeometry<D>,
        src: &SideGeometry<D>,
        mask: &Region<D>,
        overwrite_interior: bool,
        offset: [i64; D],
    ) -> SideOverlap<D> {
        let base = baseline_overlap(dst, src, mask, overwrite_interior, offset);
        if base.is_empty() {
            return base;
        }
        let mut boxes: [Vec<Region<D>>; D] = std::array::from_fn(|_| Vec::new());
        for axis in 0..D {
            if (0..D).any(|d| d != axis && offset[d] != 0) {
                continue;
            }
            let stencil = dst.side_box(axis).upper_layer(axis);
            for b in base.boxes(axis) {
                let overlap_box = stencil.intersect(b);
                if !overlap_box.is_empty() {
                    boxes[axis].push(overlap_box);
                }
            }
        }
        SideOverlap::new(boxes, offset)
    }

    fn stencil_width(&self) -> i64 {
        1
    }
}
