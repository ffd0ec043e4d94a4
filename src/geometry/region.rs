//! `Region<D>`: an axis-aligned box in D-dimensional integer index space.
//!
//! Bounds are inclusive on every axis, following the convention of
//! block-structured mesh libraries: a region is empty exactly when some axis
//! has `lower > upper`. All box algebra used by the overlap engine lives here:
//! intersection, translation, growth, side-box conversion, single-layer
//! collapse, and box subtraction (which yields a disjoint cover of the
//! difference).

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

/// An axis-aligned integer-indexed box with inclusive bounds.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region<const D: usize> {
    lower: [i64; D],
    upper: [i64; D],
}

impl<const D: usize> Region<D> {
    /// Construct a region from inclusive lower/upper corners.
    ///
    /// Bounds with `lower[d] > upper[d]` are legal and denote an empty region.
    #[inline]
    pub const fn new(lower: [i64; D], upper: [i64; D]) -> Self {
        Self { lower, upper }
    }

    /// The canonical empty region.
    #[inline]
    pub fn empty() -> Self {
        Self {
            lower: [0; D],
            upper: [-1; D],
        }
    }

    /// Inclusive lower corner.
    #[inline]
    pub fn lower(&self) -> [i64; D] {
        self.lower
    }

    /// Inclusive upper corner.
    #[inline]
    pub fn upper(&self) -> [i64; D] {
        self.upper
    }

    /// Whether the region contains no indices.
    #[inline]
    pub fn is_empty(&self) -> bool {
        (0..D).any(|d| self.lower[d] > self.upper[d])
    }

    /// Number of indices per axis (zero on any axis of an empty region).
    #[inline]
    pub fn extent(&self, axis: usize) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.upper[axis] - self.lower[axis] + 1) as usize
        }
    }

    /// Total number of indices in the region.
    pub fn size(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        (0..D).map(|d| self.extent(d)).product()
    }

    /// Whether `idx` lies inside the region.
    pub fn contains(&self, idx: [i64; D]) -> bool {
        (0..D).all(|d| self.lower[d] <= idx[d] && idx[d] <= self.upper[d])
    }

    /// Whether every index of `other` lies inside `self`.
    ///
    /// An empty `other` is contained in anything.
    pub fn contains_region(&self, other: &Self) -> bool {
        other.is_empty()
            || (0..D).all(|d| self.lower[d] <= other.lower[d] && other.upper[d] <= self.upper[d])
    }

    /// Componentwise intersection. Disjoint inputs yield an empty region.
    pub fn intersect(&self, other: &Self) -> Self {
        let mut lower = [0i64; D];
        let mut upper = [0i64; D];
        for d in 0..D {
            lower[d] = self.lower[d].max(other.lower[d]);
            upper[d] = self.upper[d].min(other.upper[d]);
        }
        Self { lower, upper }
    }

    /// Translate by an integer offset.
    pub fn shift(&self, offset: [i64; D]) -> Self {
        let mut lower = self.lower;
        let mut upper = self.upper;
        for d in 0..D {
            lower[d] += offset[d];
            upper[d] += offset[d];
        }
        Self { lower, upper }
    }

    /// Expand by `width` on both ends of every axis (negative widths shrink).
    pub fn grow(&self, width: i64) -> Self {
        let mut lower = self.lower;
        let mut upper = self.upper;
        for d in 0..D {
            lower[d] -= width;
            upper[d] += width;
        }
        Self { lower, upper }
    }

    /// Convert a cell box to the side (face) box for `axis`: faces normal to
    /// `axis` span one more index than the cells they bound.
    pub fn to_side_box(&self, axis: usize) -> Self {
        let mut upper = self.upper;
        upper[axis] += 1;
        Self {
            lower: self.lower,
            upper,
        }
    }

    /// Collapse to the single topmost layer on `axis` (`lower[axis] = upper[axis]`).
    ///
    /// This is the stencil-box construction of the synchronization fill
    /// pattern: only the top face layer of a side box survives.
    pub fn upper_layer(&self, axis: usize) -> Self {
        let mut lower = self.lower;
        lower[axis] = self.upper[axis];
        Self {
            lower,
            upper: self.upper,
        }
    }

    /// Subtract `other`, returning a disjoint set of boxes covering exactly
    /// `self \ other`. Returns `[self]` when the two do not intersect.
    pub fn subtract(&self, other: &Self) -> Vec<Self> {
        if self.is_empty() {
            return Vec::new();
        }
        let inter = self.intersect(other);
        if inter.is_empty() {
            return vec![*self];
        }
        let mut rest = *self;
        let mut out = Vec::new();
        for d in 0..D {
            if rest.lower[d] < inter.lower[d] {
                let mut piece = rest;
                piece.upper[d] = inter.lower[d] - 1;
                out.push(piece);
                rest.lower[d] = inter.lower[d];
            }
            if rest.upper[d] > inter.upper[d] {
                let mut piece = rest;
                piece.lower[d] = inter.upper[d] + 1;
                out.push(piece);
                rest.upper[d] = inter.upper[d];
            }
        }
        out
    }

    /// Row-major linear offset of `idx` within the region (last axis fastest),
    /// or `None` when `idx` lies outside.
    pub fn offset_of(&self, idx: [i64; D]) -> Option<usize> {
        if self.is_empty() {
            return None;
        }
        let mut off = 0usize;
        for d in 0..D {
            if idx[d] < self.lower[d] || idx[d] > self.upper[d] {
                return None;
            }
            off = off * self.extent(d) + (idx[d] - self.lower[d]) as usize;
        }
        Some(off)
    }

    /// Iterate all indices in row-major order (last axis fastest).
    pub fn iter(&self) -> RegionIter<D> {
        RegionIter {
            lower: self.lower,
            upper: self.upper,
            next: if self.is_empty() {
                None
            } else {
                Some(self.lower)
            },
        }
    }
}

impl<const D: usize> fmt::Debug for Region<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Region({:?}..={:?})", self.lower, self.upper)
    }
}

/// Row-major index iterator over a [`Region`].
pub struct RegionIter<const D: usize> {
    lower: [i64; D],
    upper: [i64; D],
    next: Option<[i64; D]>,
}

impl<const D: usize> Iterator for RegionIter<D> {
    type Item = [i64; D];

    fn next(&mut self) -> Option<Self::Item> {
        let cur = self.next?;
        let mut idx = cur;
        let mut d = D;
        loop {
            if d == 0 {
                self.next = None;
                break;
            }
            d -= 1;
            if idx[d] < self.upper[d] {
                idx[d] += 1;
                self.next = Some(idx);
                break;
            }
            idx[d] = self.lower[d];
        }
        Some(cur)
    }
}

// serde's derive cannot express const-generic arrays on the Deserialize side,
// so the two impls are written out against a length-checked Vec encoding.
impl<const D: usize> Serialize for Region<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut st = serializer.serialize_struct("Region", 2)?;
        st.serialize_field("lower", &self.lower[..])?;
        st.serialize_field("upper", &self.upper[..])?;
        st.end()
    }
}

impl<'de, const D: usize> Deserialize<'de> for Region<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> Result<Self, De::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            lower: Vec<i64>,
            upper: Vec<i64>,
        }
        let raw = Raw::deserialize(deserializer)?;
        let lower: [i64; D] = raw
            .lower
            .try_into()
            .map_err(|v: Vec<i64>| de::Error::invalid_length(v.len(), &"one bound per axis"))?;
        let upper: [i64; D] = raw
            .upper
            .try_into()
            .map_err(|v: Vec<i64>| de::Error::invalid_length(v.len(), &"one bound per axis"))?;
        Ok(Region { lower, upper })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r2(lo: [i64; 2], up: [i64; 2]) -> Region<2> {
        Region::new(lo, up)
    }

    #[test]
    fn empty_and_size() {
        let r = r2([0, 0], [3, 3]);
        assert!(!r.is_empty());
        assert_eq!(r.size(), 16);
        assert!(Region::<2>::empty().is_empty());
        assert_eq!(Region::<2>::empty().size(), 0);
        assert!(r2([2, 0], [1, 3]).is_empty());
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = r2([0, 0], [3, 3]);
        let b = r2([5, 0], [7, 3]);
        assert!(a.intersect(&b).is_empty());
    }

    #[test]
    fn intersect_partial() {
        let a = r2([0, 0], [3, 3]);
        let b = r2([2, 1], [5, 5]);
        let i = a.intersect(&b);
        assert_eq!(i, r2([2, 1], [3, 3]));
        assert_eq!(i, b.intersect(&a));
    }

    #[test]
    fn side_box_extends_one_axis() {
        let r = r2([0, 0], [3, 3]);
        assert_eq!(r.to_side_box(0), r2([0, 0], [4, 3]));
        assert_eq!(r.to_side_box(1), r2([0, 0], [3, 4]));
    }

    #[test]
    fn upper_layer_selects_top_faces() {
        let side = r2([0, 0], [4, 3]);
        let layer = side.upper_layer(0);
        assert_eq!(layer, r2([4, 0], [4, 3]));
        assert_eq!(layer.size(), 4);
    }

    #[test]
    fn subtract_partitions_volume() {
        let a = r2([0, 0], [5, 5]);
        let b = r2([2, 2], [3, 3]);
        let pieces = a.subtract(&b);
        let vol: usize = pieces.iter().map(|p| p.size()).sum();
        assert_eq!(vol + a.intersect(&b).size(), a.size());
        for p in &pieces {
            assert!(a.contains_region(p));
            assert!(p.intersect(&b).is_empty());
        }
        // Pieces are pairwise disjoint.
        for (i, p) in pieces.iter().enumerate() {
            for q in &pieces[i + 1..] {
                assert!(p.intersect(q).is_empty());
            }
        }
    }

    #[test]
    fn subtract_disjoint_returns_self() {
        let a = r2([0, 0], [3, 3]);
        let b = r2([10, 10], [12, 12]);
        assert_eq!(a.subtract(&b), vec![a]);
    }

    #[test]
    fn iter_row_major_last_axis_fastest() {
        let r = r2([0, 0], [1, 1]);
        let got: Vec<_> = r.iter().collect();
        assert_eq!(got, vec![[0, 0], [0, 1], [1, 0], [1, 1]]);
    }

    #[test]
    fn offset_matches_iteration_order() {
        let r = r2([-1, 2], [1, 4]);
        for (k, idx) in r.iter().enumerate() {
            assert_eq!(r.offset_of(idx), Some(k));
        }
        assert_eq!(r.offset_of([5, 5]), None);
    }

    #[test]
    fn grow_and_shift() {
        let r = r2([0, 0], [3, 3]);
        assert_eq!(r.grow(1), r2([-1, -1], [4, 4]));
        assert_eq!(r.shift([2, -1]), r2([2, -1], [5, 2]));
    }

    #[test]
    fn serde_roundtrip() {
        let r = r2([-2, 3], [5, 7]);
        let json = serde_json::to_string(&r).expect("serialize");
        let back: Region<2> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, r);
        let bytes = bincode::serialize(&r).expect("serialize");
        let back: Region<2> = bincode::deserialize(&bytes).expect("deserialize");
        assert_eq!(back, r);
    }

    #[test]
    fn serde_rejects_wrong_rank() {
        let r3 = Region::<3>::new([0, 0, 0], [1, 1, 1]);
        let json = serde_json::to_string(&r3).expect("serialize");
        assert!(serde_json::from_str::<Region<2>>(&json).is_err());
    }
}
