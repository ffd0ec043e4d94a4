//! Patches and patch levels: the rectangular subdomains of one refinement
//! level and their process ownership.
//!
//! A [`PatchLevel`] is collective metadata: every rank holds the full list
//! of patch boxes and owners, while bulk side data exists only for the
//! patches a rank owns. Construction validates the level geometry once;
//! downstream algorithms (partitioner, schedule builder) rely on it.

use crate::debug_invariants::DebugInvariants;
use crate::geometry::region::Region;
use crate::grid_error::StagGridError;
use itertools::Itertools;
use std::fmt;

/// Identifier of a patch within one level.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct PatchId(u32);

impl PatchId {
    /// Wrap a raw patch number.
    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw patch number.
    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PatchId").field(&self.0).finish()
    }
}

impl fmt::Display for PatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One rectangular subdomain of a level, owned by exactly one rank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Patch<const D: usize> {
    id: PatchId,
    region: Region<D>,
    owner: usize,
}

impl<const D: usize> Patch<D> {
    #[inline]
    pub fn id(&self) -> PatchId {
        self.id
    }

    /// The patch's cell box.
    #[inline]
    pub fn region(&self) -> &Region<D> {
        &self.region
    }

    /// Rank that owns this patch's data.
    #[inline]
    pub fn owner(&self) -> usize {
        self.owner
    }
}

/// The ordered set of patches covering one refinement level.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PatchLevel<const D: usize> {
    patches: Vec<Patch<D>>,
    domain: Region<D>,
    ghost_width: i64,
}

impl<const D: usize> PatchLevel<D> {
    /// Build a level from `(box, owner rank)` pairs over `domain`.
    ///
    /// # Errors
    /// - `MalformedRegion` when the domain or any patch box is empty or the
    ///   ghost width is negative,
    /// - `PatchOutsideDomain` when a patch box leaves the domain,
    /// - `OverlappingPatches` when two patch boxes intersect.
    pub fn new(
        domain: Region<D>,
        ghost_width: i64,
        boxes: Vec<(Region<D>, usize)>,
    ) -> Result<Self, StagGridError> {
        if domain.is_empty() {
            return Err(StagGridError::MalformedRegion {
                detail: "level domain is empty".into(),
            });
        }
        if ghost_width < 0 {
            return Err(StagGridError::MalformedRegion {
                detail: format!("negative ghost width {ghost_width}"),
            });
        }
        let patches: Vec<Patch<D>> = boxes
            .into_iter()
            .enumerate()
            .map(|(i, (region, owner))| Patch {
                id: PatchId::new(i as u32),
                region,
                owner,
            })
            .collect();
        let level = Self {
            patches,
            domain,
            ghost_width,
        };
        level.validate_invariants()?;
        Ok(level)
    }

    /// All patches in id order.
    #[inline]
    pub fn patches(&self) -> impl Iterator<Item = &Patch<D>> {
        self.patches.iter()
    }

    /// Patches owned by `rank`, in id order.
    pub fn local_patches(&self, rank: usize) -> impl Iterator<Item = &Patch<D>> {
        self.patches.iter().filter(move |p| p.owner == rank)
    }

    /// Look up a patch by id.
    pub fn patch(&self, id: PatchId) -> Result<&Patch<D>, StagGridError> {
        self.patches
            .get(id.get() as usize)
            .ok_or(StagGridError::UnknownPatch(id))
    }

    /// Number of patches on the level.
    #[inline]
    pub fn num_patches(&self) -> usize {
        self.patches.len()
    }

    /// The level's physical domain box.
    #[inline]
    pub fn domain(&self) -> &Region<D> {
        &self.domain
    }

    /// Ghost width carried by level side data.
    #[inline]
    pub fn ghost_width(&self) -> i64 {
        self.ghost_width
    }

    /// Whether a patch touches the physical domain boundary on any axis.
    pub fn touches_physical_boundary(&self, patch: &Patch<D>) -> bool {
        (0..D).any(|d| {
            patch.region.lower()[d] == self.domain.lower()[d]
                || patch.region.upper()[d] == self.domain.upper()[d]
        })
    }
}

impl<const D: usize> DebugInvariants for PatchLevel<D> {
    fn debug_assert_invariants(&self) {
        crate::debug_invariants!(self.validate_invariants(), "PatchLevel invalid");
    }

    fn validate_invariants(&self) -> Result<(), StagGridError> {
        for p in &self.patches {
            if p.region.is_empty() {
                return Err(StagGridError::MalformedRegion {
                    detail: format!("patch {} has an empty box", p.id),
                });
            }
            if !self.domain.contains_region(&p.region) {
                return Err(StagGridError::PatchOutsideDomain(p.id));
            }
        }
        for (a, b) in self.patches.iter().tuple_combinations() {
            if !a.region.intersect(&b.region).is_empty() {
                return Err(StagGridError::OverlappingPatches(a.id, b.id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod layout_tests {
    use super::*;
    use static_assertions::assert_eq_size;

    assert_eq_size!(PatchId, u32);
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn ids_are_sequential() {
        let level = two_patch_level();
        let ids: Vec<u32> = level.patches().map(|p| p.id().get()).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn overlapping_patches_rejected() {
        let err = PatchLevel::new(
            Region::new([0, 0], [7, 3]),
            1,
            vec![
                (Region::new([0, 0], [4, 3]), 0),
                (Region::new([4, 0], [7, 3]), 0),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, StagGridError::OverlappingPatches(_, _)));
    }

    #[test]
    fn patch_outside_domain_rejected() {
        let err = PatchLevel::new(
            Region::new([0, 0], [3, 3]),
            1,
            vec![(Region::new([0, 0], [4, 3]), 0)],
        )
        .unwrap_err();
        assert!(matches!(err, StagGridError::PatchOutsideDomain(_)));
    }

    #[test]
    fn physical_boundary_detection() {
        let level = PatchLevel::new(
            Region::new([0, 0], [11, 11]),
            1,
            vec![
                (Region::new([0, 0], [3, 11]), 0),
                (Region::new([4, 4], [7, 7]), 0),
            ],
        )
        .unwrap();
        let boundary = level.patch(PatchId::new(0)).unwrap();
        let interior = level.patch(PatchId::new(1)).unwrap();
        assert!(level.touches_physical_boundary(boundary));
        assert!(!level.touches_physical_boundary(interior));
    }

    #[test]
    fn unknown_patch_errors() {
        let level = two_patch_level();
        assert!(matches!(
            level.patch(PatchId::new(9)),
            Err(StagGridError::UnknownPatch(_))
        ));
    }

    #[test]
    fn local_patches_filters_by_owner() {
        let level = PatchLevel::new(
            Region::new([0, 0], [7, 3]),
            1,
            vec![
                (Region::new([0, 0], [3, 3]), 0),
                (Region::new([4, 0], [7, 3]), 1),
            ],
        )
        .unwrap();
        assert_eq!(level.local_patches(0).count(), 1);
        assert_eq!(level.local_patches(1).count(), 1);
        assert_eq!(level.local_patches(2).count(), 0);
    }

    #[test]
    fn serde_roundtrip() {
        let level = two_patch_level();
        let json = serde_json::to_string(&level).expect("serialize");
        let back: PatchLevel<2> = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.num_patches(), 2);
        assert_eq!(back.domain(), level.domain());
    }
}
