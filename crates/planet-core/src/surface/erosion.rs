//! Continental erosion: stress-driven uplift followed by slope/thermal/
//! stress-modulated erosion, grounded verbatim on
//! `ContinentalErosion.cpp::ApplyContinentalErosion`.

use crate::mesh::RenderMesh;
use crate::plate::CrustType;

const UPLIFT_FLOOR_M: f64 = 250.0;
const MPA_TO_METERS: f64 = 100.0;

/// Apply one step of continental erosion in place. `crust_type_of` maps a
/// vertex index to the crust type of its assigned plate (oceanic vertices,
/// and unassigned vertices, are skipped entirely).
#[allow(clippy::too_many_arguments)]
pub fn apply_continental_erosion(
    mesh: &RenderMesh,
    elevations: &mut [f64],
    erosion_rates: &mut [f64],
    stress: &[f64],
    temperature: &[f64],
    crust_type_of: impl Fn(usize) -> Option<CrustType>,
    erosion_constant: f64,
    sea_level_m: f64,
    planet_radius_m: f64,
    delta_my: f64,
) {
    let max_stress = stress.iter().cloned().fold(1.0_f64, f64::max);
    let max_temperature = temperature.iter().cloned().fold(1000.0_f64, f64::max);

    for v in 0..mesh.vertex_count() {
        match crust_type_of(v) {
            Some(CrustType::Continental) => {}
            _ => {
                erosion_rates[v] = 0.0;
                continue;
            }
        }

        let mut elevation = elevations[v];
        let stress_lift_m = stress.get(v).copied().unwrap_or(0.0) * MPA_TO_METERS;
        if stress_lift_m > 0.0 {
            elevation = (elevation + stress_lift_m).max(UPLIFT_FLOOR_M);
            elevations[v] = elevation;
        }

        if elevation <= sea_level_m {
            erosion_rates[v] = 0.0;
            continue;
        }

        let slope = mesh.max_slope(v as u32, elevations, planet_radius_m);
        let base_rate = erosion_constant * slope * (elevation - sea_level_m);

        let thermal_factor = 1.0 + 0.5 * (temperature.get(v).copied().unwrap_or(0.0) / max_temperature);
        let stress_factor = 1.0 + 0.3 * (stress.get(v).copied().unwrap_or(0.0) / max_stress);

        let rate = base_rate * thermal_factor * stress_factor;
        erosion_rates[v] = rate;
        elevations[v] = (elevation - rate * delta_my).max(sea_level_m);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oceanic_vertices_never_erode() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut elevations = vec![2000.0; n];
        let mut rates = vec![0.0; n];
        let stress = vec![0.0; n];
        let temperature = vec![1600.0; n];
        apply_continental_erosion(&mesh, &mut elevations, &mut rates, &stress, &temperature, |_| Some(CrustType::Oceanic), 1e-6, 0.0, 6_371_000.0, 1.0);
        assert!(elevations.iter().all(|&e| e == 2000.0));
        assert!(rates.iter().all(|&r| r == 0.0));
    }

    #[test]
    fn stress_lift_applies_before_sea_level_gate() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut elevations = vec![-10.0; n]; // below sea level before uplift
        let mut rates = vec![0.0; n];
        let stress = vec![5.0; n]; // 5 MPa * 100 = 500m lift
        let temperature = vec![1600.0; n];
        apply_continental_erosion(&mesh, &mut elevations, &mut rates, &stress, &temperature, |_| Some(CrustType::Continental), 1e-6, 0.0, 6_371_000.0, 1.0);
        assert!(elevations.iter().all(|&e| e >= 250.0 - 1.0));
    }

    #[test]
    fn erosion_never_drops_below_sea_level() {
        let mesh = RenderMesh::from_icosphere(1);
        let n = mesh.vertex_count();
        let mut elevations = vec![300.0; n];
        let mut rates = vec![0.0; n];
        let stress = vec![0.0; n];
        let temperature = vec![1600.0; n];
        for _ in 0..50 {
            apply_continental_erosion(&mesh, &mut elevations, &mut rates, &stress, &temperature, |_| Some(CrustType::Continental), 1e-3, 0.0, 6_371_000.0, 1.0);
        }
        assert!(elevations.iter().all(|&e| e >= 0.0));
    }
}
