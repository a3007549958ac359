//! Plate merges: a Convergent boundary whose stress exceeds
//! `MergeStressThreshold` consumes the smaller of its two plates.

use crate::plate::{CrustType, TectonicPlate};

/// Whether a convergent boundary's stress has crossed the merge threshold.
pub fn should_merge(accumulated_stress_mpa: f64, threshold_mpa: f64) -> bool {
    accumulated_stress_mpa > threshold_mpa
}

/// Merge `consumed` into `survivor` in place: the survivor's Euler pole
/// becomes an area-weighted blend of the two (approximated here by vertex
/// count, the caller's proxy for spherical area), and its crust type
/// becomes Continental if either plate was continental.
pub fn merge_into(survivor: &mut TectonicPlate, consumed: &TectonicPlate, survivor_area_weight: f64, consumed_area_weight: f64) {
    let total = (survivor_area_weight + consumed_area_weight).max(1e-9);
    let wa = survivor_area_weight / total;
    let wb = consumed_area_weight / total;

    let blended_axis = survivor
        .euler_pole_axis
        .scale(wa)
        .add(consumed.euler_pole_axis.scale(wb))
        .normalize();
    let blended_velocity = survivor.angular_velocity_rad_per_my * wa + consumed.angular_velocity_rad_per_my * wb;

    survivor.euler_pole_axis = blended_axis;
    survivor.angular_velocity_rad_per_my = blended_velocity;
    if consumed.crust_type == CrustType::Continental {
        survivor.crust_type = CrustType::Continental;
    }
    survivor.crust_thickness_m = crate::plate::default_crust_thickness_m(survivor.crust_type);
}

/// Reassign every vertex owned by `consumed_plate_id` to `survivor_plate_id`.
pub fn reassign_vertices(assignment: &mut [u32], consumed_plate_id: u32, survivor_plate_id: u32) {
    for a in assignment.iter_mut() {
        if *a == consumed_plate_id {
            *a = survivor_plate_id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::generate_plates;

    #[test]
    fn merge_threshold_boundary() {
        assert!(!should_merge(80.0, 80.0));
        assert!(should_merge(80.1, 80.0));
    }

    #[test]
    fn continental_crust_dominates_on_merge() {
        let mut plates = generate_plates(0, 1);
        plates[0].crust_type = CrustType::Oceanic;
        plates[1].crust_type = CrustType::Continental;
        let consumed = plates[1].clone();
        merge_into(&mut plates[0], &consumed, 1.0, 1.0);
        assert_eq!(plates[0].crust_type, CrustType::Continental);
    }

    #[test]
    fn survivor_crust_thickness_matches_resulting_crust_type() {
        let mut plates = generate_plates(0, 1);
        plates[0].crust_type = CrustType::Oceanic;
        plates[1].crust_type = CrustType::Continental;
        let consumed = plates[1].clone();
        merge_into(&mut plates[0], &consumed, 1.0, 1.0);
        assert_eq!(plates[0].crust_thickness_m, crate::plate::default_crust_thickness_m(CrustType::Continental));
    }

    #[test]
    fn survivor_pole_stays_unit_length() {
        let mut plates = generate_plates(0, 2);
        let consumed = plates[1].clone();
        merge_into(&mut plates[0], &consumed, 3.0, 1.0);
        assert!((plates[0].euler_pole_axis.length() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn all_consumed_vertices_reassigned() {
        let mut assignment = vec![0u32, 1, 1, 2, 1];
        reassign_vertices(&mut assignment, 1, 0);
        assert_eq!(assignment, vec![0, 0, 0, 2, 0]);
    }
}
