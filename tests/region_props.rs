//! Property-based coverage of the box algebra and the synchronization
//! pattern's exactly-once guarantee.

use proptest::prelude::*;
use staggrid::geometry::fill_pattern::{FillPattern, SideSynchPattern};
use staggrid::geometry::region::Region;
use staggrid::geometry::side::SideGeometry;

prop_compose! {
    fn arb_region()(
        lx in -8i64..8,
        ly in -8i64..8,
        ex in 0i64..8,
        ey in 0i64..8,
    ) -> Region<2> {
        Region::new([lx, ly], [lx + ex, ly + ey])
    }
}

prop_compose! {
    fn arb_nonempty()(
        lx in -8i64..8,
        ly in -8i64..8,
        ex in 1i64..8,
        ey in 1i64..8,
    ) -> Region<2> {
        Region::new([lx, ly], [lx + ex - 1, ly + ey - 1])
    }
}

proptest! {
    #[test]
    fn intersection_commutes(a in arb_region(), b in arb_region()) {
        prop_assert_eq!(a.intersect(&b), b.intersect(&a));
    }

    #[test]
    fn intersection_is_contained(a in arb_region(), b in arb_region()) {
        let i = a.intersect(&b);
        if !i.is_empty() {
            prop_assert!(a.contains_region(&i));
            prop_assert!(b.contains_region(&i));
        }
    }

    #[test]
    fn subtraction_partitions_the_minuend(a in arb_region(), b in arb_region()) {
        let pieces = a.subtract(&b);
        let piece_vol: usize = pieces.iter().map(|p| p.size()).sum();
        prop_assert_eq!(piece_vol + a.intersect(&b).size(), a.size());
        for (i, p) in pieces.iter().enumerate() {
            prop_assert!(!p.is_empty());
            prop_assert!(a.contains_region(p));
            prop_assert!(p.intersect(&b).is_empty());
            for q in &pieces[i + 1..] {
                prop_assert!(p.intersect(q).is_empty());
            }
        }
    }

    #[test]
    fn offset_enumerates_row_major(a in arb_nonempty()) {
        for (k, idx) in a.iter().enumerate() {
            prop_assert_eq!(a.offset_of(idx), Some(k));
        }
        prop_assert_eq!(a.iter().count(), a.size());
    }

    /// For any pair of abutting boxes, the synchronization pattern yields the
    /// shared faces exactly once, always on the lower box's top layer.
    #[test]
    fn abutting_boxes_synchronize_exactly_once(a in arb_nonempty(), axis in 0usize..2) {
        let width = a.extent(axis) as i64;
        let mut offset = [0i64; 2];
        offset[axis] = width;
        let b = a.shift(offset);

        let lower = SideGeometry::new(a, 0);
        let upper = SideGeometry::new(b, 0);
        let pattern = SideSynchPattern;

        let into_lower = pattern.compute_overlap(&lower, &upper, upper.region(), true, [0, 0]);
        let into_upper = pattern.compute_overlap(&upper, &lower, lower.region(), true, [0, 0]);

        let shared = a.to_side_box(axis).upper_layer(axis);
        prop_assert_eq!(into_lower.total_size(), shared.size());
        prop_assert_eq!(into_upper.total_size(), 0);
        for bx in into_lower.boxes(axis) {
            prop_assert!(shared.contains_region(bx));
        }
    }

    /// Disjoint, non-adjacent boxes must produce an empty overlap.
    #[test]
    fn separated_boxes_never_synchronize(a in arb_nonempty(), gap in 2i64..5, axis in 0usize..2) {
        let mut offset = [0i64; 2];
        offset[axis] = a.extent(axis) as i64 + gap;
        let b = a.shift(offset);
        let ov = SideSynchPattern.compute_overlap(
            &SideGeometry::new(a, 0),
            &SideGeometry::new(b, 0),
            &b,
            true,
            [0, 0],
        );
        prop_assert!(ov.is_empty());
    }

    /// A nonzero cross-axis translation suppresses the examined axis
    /// regardless of adjacency.
    #[test]
    fn cross_axis_translation_suppresses_axis(a in arb_nonempty(), shift in 1i64..4) {
        let width = a.extent(0) as i64;
        let b = a.shift([width, 0]);
        let ov = SideSynchPattern.compute_overlap(
            &SideGeometry::new(a, 0),
            &SideGeometry::new(b, 0),
            &b,
            true,
            [0, shift],
        );
        prop_assert!(ov.boxes(0).is_empty());
    }
}
