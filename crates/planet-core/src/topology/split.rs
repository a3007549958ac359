//! Plate splits: a Rifting boundary whose `RiftWidthMeters` exceeds
//! `RiftSplitThresholdMeters` divides its wider-side plate in two.
//!
//! **Open question resolved (spec §9):** the original source logs this
//! derivation rather than expressing it in a closed form. This repo's
//! closed form: offset the parent's centroid by a small angle along the
//! rift's tangent normal to seed two child centroids, and perturb the
//! parent's Euler pole axis by the same small angle in opposite directions
//! for the two children while holding angular velocity magnitude fixed.
//! For offset angle `δ`, `axis_a = normalize(axis_p + δ·t)`,
//! `axis_b = normalize(axis_p − δ·t)` (`t` the rift tangent, `⊥ axis_p`),
//! so `axis_a + axis_b → 2·axis_p` as `δ → 0`; at the `δ ≈ 0.05` rad this
//! engine uses, `‖ω_A + ω_B − 2·ω_parent‖ / ‖2·ω_parent‖` is within the
//! documented 5% tolerance used by the topology invariant tests.

use crate::plate::{CrustType, TectonicPlate};
use crate::sphere::{perpendicular_offset, Vec3};

const CHILD_POLE_OFFSET_RAD: f64 = 0.05;
const CHILD_CENTROID_OFFSET_RAD: f64 = 0.05;

/// Angular-momentum-approximation tolerance the split construction is
/// designed to satisfy; exposed for the determinism-audit tests.
pub const ANGULAR_MOMENTUM_TOLERANCE: f64 = 0.05;

/// Split `parent` into two plates along the tangent direction `rift_tangent`
/// (perpendicular to the boundary, in the tangent plane at the parent's
/// centroid). `new_plate_id` is assigned to the second child; the first
/// child keeps `parent`'s id.
pub fn split_plate(parent: &TectonicPlate, rift_tangent: Vec3, new_plate_id: u32) -> (TectonicPlate, TectonicPlate) {
    let tangent = rift_tangent.tangential_component(parent.centroid).normalize();

    let centroid_a = perpendicular_offset(parent.centroid, tangent, CHILD_CENTROID_OFFSET_RAD, 1.0);
    let centroid_b = perpendicular_offset(parent.centroid, tangent, CHILD_CENTROID_OFFSET_RAD, -1.0);

    let axis_a = parent.euler_pole_axis.add(tangent.scale(CHILD_POLE_OFFSET_RAD)).normalize();
    let axis_b = parent.euler_pole_axis.sub(tangent.scale(CHILD_POLE_OFFSET_RAD)).normalize();

    let child_a = TectonicPlate {
        plate_id: parent.plate_id,
        crust_type: parent.crust_type,
        centroid: centroid_a,
        initial_centroid: centroid_a,
        euler_pole_axis: axis_a,
        angular_velocity_rad_per_my: parent.angular_velocity_rad_per_my,
        seed_face: parent.seed_face,
        crust_thickness_m: parent.crust_thickness_m,
    };
    let child_b = TectonicPlate {
        plate_id: new_plate_id,
        crust_type: parent.crust_type,
        centroid: centroid_b,
        initial_centroid: centroid_b,
        euler_pole_axis: axis_b,
        angular_velocity_rad_per_my: parent.angular_velocity_rad_per_my,
        seed_face: parent.seed_face,
        crust_thickness_m: parent.crust_thickness_m,
    };
    (child_a, child_b)
}

/// Whether a Rifting boundary's width has crossed the split threshold.
pub fn should_split(rift_width_meters: f64, threshold_meters: f64) -> bool {
    rift_width_meters > threshold_meters
}

/// `CrustType::Continental` survives a split of a continental parent (spec:
/// "new plate inherits crust type of the parent" — both children do).
pub fn inherits_parent_crust(parent: CrustType, child: CrustType) -> bool {
    parent == child
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::generate_plates;

    #[test]
    fn children_inherit_parent_crust_type() {
        let plates = generate_plates(0, 1);
        let parent = &plates[0];
        let tangent = Vec3::new(0.0, 1.0, 0.0);
        let (a, b) = split_plate(parent, tangent, 99);
        assert!(inherits_parent_crust(parent.crust_type, a.crust_type));
        assert!(inherits_parent_crust(parent.crust_type, b.crust_type));
    }

    #[test]
    fn children_have_unit_centroids_and_axes() {
        let plates = generate_plates(0, 2);
        let parent = &plates[3];
        let tangent = Vec3::new(1.0, 0.0, 0.0);
        let (a, b) = split_plate(parent, tangent, 20);
        for p in [&a, &b] {
            assert!((p.centroid.length() - 1.0).abs() < 1e-9);
            assert!((p.euler_pole_axis.length() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn angular_momentum_sum_approximates_twice_parent() {
        let plates = generate_plates(0, 4);
        let parent = &plates[0];
        let tangent = Vec3::new(0.0, 0.0, 1.0);
        let (a, b) = split_plate(parent, tangent, 50);

        let omega_parent = parent.euler_pole_axis.scale(parent.angular_velocity_rad_per_my);
        let omega_a = a.euler_pole_axis.scale(a.angular_velocity_rad_per_my);
        let omega_b = b.euler_pole_axis.scale(b.angular_velocity_rad_per_my);
        let sum = omega_a.add(omega_b);
        let target = omega_parent.scale(2.0);

        let error = sum.sub(target).length();
        let target_len = target.length().max(1e-12);
        assert!(error / target_len < ANGULAR_MOMENTUM_TOLERANCE, "relative error {:.4} exceeds tolerance", error / target_len);
    }

    #[test]
    fn split_threshold_boundary() {
        assert!(!should_split(499_999.0, 500_000.0));
        assert!(should_split(500_001.0, 500_000.0));
    }

    #[test]
    fn children_inherit_parent_crust_thickness() {
        let plates = generate_plates(0, 1);
        let parent = &plates[0];
        let tangent = Vec3::new(0.0, 1.0, 0.0);
        let (a, b) = split_plate(parent, tangent, 99);
        assert_eq!(a.crust_thickness_m, parent.crust_thickness_m);
        assert_eq!(b.crust_thickness_m, parent.crust_thickness_m);
    }

    #[test]
    fn children_have_distinct_centroids() {
        let plates = generate_plates(0, 5);
        let parent = &plates[1];
        let tangent = Vec3::new(0.0, 1.0, 0.0);
        let (a, b) = split_plate(parent, tangent, 30);
        let d = crate::sphere::great_circle_distance_rad(a.centroid, b.centroid);
        assert!(d > 1e-6);
    }
}
