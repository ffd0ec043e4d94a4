//! Discretization provider: stencil coefficients and boundary adjustments.
//!
//! The assembler owns the translation from side indices to global matrix
//! indices; the numerical coefficients come from a [`StencilProvider`]. The
//! built-in [`PoissonStencil`] discretizes the constant-coefficient operator
//! `C u - D lap(u)` on each axis field with Dirichlet physical boundaries:
//! faces normal to a boundary carry identity rows, and couplings that would
//! reach across a boundary are folded into the diagonal and the right-hand
//! side.

use crate::geometry::region::Region;
use crate::level::patch::{Patch, PatchLevel};

/// One matrix row in side-index form: absolute side indices on the same axis
/// field, with the row's own index carrying the diagonal.
#[derive(Clone, Debug)]
pub struct StencilRow<const D: usize> {
    pub entries: Vec<([i64; D], f64)>,
}

/// Supplies matrix rows and right-hand-side boundary adjustments for one
/// operator, given a side DOF of one axis field.
pub trait StencilProvider<const D: usize> {
    /// The matrix row for the side at `idx` of the `axis` field, with
    /// physical-boundary couplings already folded.
    fn row(
        &self,
        level: &PatchLevel<D>,
        patch: &Patch<D>,
        axis: usize,
        idx: [i64; D],
    ) -> StencilRow<D>;

    /// The boundary-adjusted right-hand-side value at `idx`, given the
    /// unadjusted `original`. Interior sides return `original` unchanged;
    /// with `homogeneous` set, boundary values are treated as zero.
    fn adjust_rhs(
        &self,
        level: &PatchLevel<D>,
        patch: &Patch<D>,
        axis: usize,
        idx: [i64; D],
        original: f64,
        homogeneous: bool,
    ) -> f64;
}

/// Constant-coefficient `C u - D lap(u)` with a uniform Dirichlet boundary
/// value on every physical boundary.
#[derive(Clone, Debug)]
pub struct PoissonStencil<const D: usize> {
    /// Reaction coefficient `C`.
    pub c: f64,
    /// Diffusion coefficient `D`.
    pub d: f64,
    /// Grid spacing per axis.
    pub dx: [f64; D],
    /// Dirichlet value on the physical boundary.
    pub boundary_value: f64,
}

impl<const D: usize> PoissonStencil<D> {
    /// Identity-like operator (`C = 1`, `D = 0`) with homogeneous boundary.
    pub fn identity() -> Self {
        Self {
            c: 1.0,
            d: 0.0,
            dx: [1.0; D],
            boundary_value: 0.0,
        }
    }

    fn domain_side(&self, level: &PatchLevel<D>, axis: usize) -> Region<D> {
        level.domain().to_side_box(axis)
    }

    fn on_boundary_face(&self, domain_side: &Region<D>, axis: usize, idx: [i64; D]) -> bool {
        idx[axis] == domain_side.lower()[axis] || idx[axis] == domain_side.upper()[axis]
    }
}

impl<const D: usize> StencilProvider<D> for PoissonStencil<D> {
    fn row(
        &self,
        level: &PatchLevel<D>,
        _patch: &Patch<D>,
        axis: usize,
        idx: [i64; D],
    ) -> StencilRow<D> {
        let domain_side = self.domain_side(level, axis);
        if self.on_boundary_face(&domain_side, axis, idx) {
            return StencilRow {
                entries: vec![(idx, 1.0)],
            };
        }
        let mut diag = self.c;
        let mut entries = Vec::with_capacity(2 * D + 1);
        for k in 0..D {
            let inv = self.d / (self.dx[k] * self.dx[k]);
            diag += 2.0 * inv;
            for sign in [-1i64, 1i64] {
                let mut nidx = idx;
                nidx[k] += sign;
                if k == axis && self.on_boundary_face(&domain_side, axis, nidx) {
                    // Dirichlet face value is known; the column is dropped
                    // and its contribution lands on the right-hand side.
                } else if k != axis
                    && (nidx[k] < domain_side.lower()[k] || nidx[k] > domain_side.upper()[k])
                {
                    // Mirror fold: the ghost value reflects across the wall
                    // onto this row's own unknown.
                    diag += inv;
                } else if inv != 0.0 {
                    entries.push((nidx, -inv));
                }
            }
        }
        entries.insert(0, (idx, diag));
        StencilRow { entries }
    }

    fn adjust_rhs(
        &self,
        level: &PatchLevel<D>,
        _patch: &Patch<D>,
        axis: usize,
        idx: [i64; D],
        original: f64,
        homogeneous: bool,
    ) -> f64 {
        let domain_side = self.domain_side(level, axis);
        if self.on_boundary_face(&domain_side, axis, idx) {
            return if homogeneous {
                0.0
            } else {
                self.boundary_value
            };
        }
        let g = if homogeneous {
            0.0
        } else {
            self.boundary_value
        };
        let mut value = original;
        for k in 0..D {
            let inv = self.d / (self.dx[k] * self.dx[k]);
            for sign in [-1i64, 1i64] {
                let mut nidx = idx;
                nidx[k] += sign;
                if k == axis && self.on_boundary_face(&domain_side, axis, nidx) {
                    value += inv * g;
                } else if k != axis
                    && (nidx[k] < domain_side.lower()[k] || nidx[k] > domain_side.upper()[k])
                {
                    value += 2.0 * inv * g;
                }
            }
        }
        value
    }
}
