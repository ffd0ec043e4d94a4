//! Delta rules: how a copied side value is extracted and merged.
//!
//! A `Delta` pairs a *restrict* step (what travels on one copy) with a *fuse*
//! step (how it lands in the destination). Wire parts must be plain old data
//! so remote copies can be packed into byte buffers.

use crate::dof::{DofEntry, GlobalDof};

/// Restriction & fusion rule for a side value `V`.
pub trait Delta<V>: Sized {
    /// What a restricted value looks like on the wire.
    type Part: bytemuck::Pod;

    /// Extract the part of `v` that travels on one copy.
    fn restrict(v: &V) -> Self::Part;

    /// Merge an incoming part into the local value.
    fn fuse(local: &mut V, incoming: Self::Part);
}

/// Identity delta for POD values (copy overwrites local).
#[derive(Copy, Clone, Debug, Default)]
pub struct CopyDelta;

impl<V: bytemuck::Pod> Delta<V> for CopyDelta {
    type Part = V;

    #[inline]
    fn restrict(v: &V) -> V {
        *v
    }

    #[inline]
    fn fuse(local: &mut V, incoming: V) {
        *local = incoming;
    }
}

/// Delta for the DOF index field: carries the owner's global index into
/// duplicate and ghost entries.
///
/// Wire encoding is `raw + 1` with `0` meaning "no index yet", so an
/// unresolved source never clobbers a resolved destination. Ownership is
/// never overwritten: an `Owned` destination keeps its index.
#[derive(Copy, Clone, Debug, Default)]
pub struct DofIndexDelta;

impl Delta<DofEntry> for DofIndexDelta {
    type Part = u64;

    #[inline]
    fn restrict(v: &DofEntry) -> u64 {
        match v.global() {
            Some(g) => g.get() + 1,
            None => 0,
        }
    }

    #[inline]
    fn fuse(local: &mut DofEntry, incoming: u64) {
        if incoming != 0 && !local.is_owned() {
            *local = DofEntry::Duplicate(Some(GlobalDof::new(incoming - 1)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_delta_overwrites() {
        let mut v = 1.5f64;
        let part = <CopyDelta as Delta<f64>>::restrict(&2.5);
        <CopyDelta as Delta<f64>>::fuse(&mut v, part);
        assert_eq!(v, 2.5);
    }

    #[test]
    fn dof_delta_resolves_duplicates() {
        let owner = DofEntry::Owned(GlobalDof::new(9));
        let part = DofIndexDelta::restrict(&owner);
        let mut dup = DofEntry::Duplicate(None);
        DofIndexDelta::fuse(&mut dup, part);
        assert_eq!(dup, DofEntry::Duplicate(Some(GlobalDof::new(9))));
    }

    #[test]
    fn dof_delta_never_clobbers_ownership() {
        let mut owned = DofEntry::Owned(GlobalDof::new(3));
        DofIndexDelta::fuse(&mut owned, 8);
        assert_eq!(owned, DofEntry::Owned(GlobalDof::new(3)));
    }

    #[test]
    fn unresolved_source_is_a_no_op() {
        let mut dst = DofEntry::Duplicate(Some(GlobalDof::new(4)));
        DofIndexDelta::fuse(&mut dst, DofIndexDelta::restrict(&DofEntry::Unassigned));
        assert_eq!(dst, DofEntry::Duplicate(Some(GlobalDof::new(4))));
    }
}
