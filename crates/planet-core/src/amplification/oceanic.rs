//! Stage-B oceanic amplification: per-vertex transform-fault noise plus
//! fractal fine detail layered onto the baseline oceanic elevation (spec
//! §4.11, grounded on `OceanicAmplification.cpp`). Applies only to vertices
//! owned by an oceanic plate; continental vertices pass through untouched.

use crate::plate::{CrustType, TectonicPlate};
use crate::sphere::Vec3;
use noise::{NoiseFn, Perlin};

const BASE_FREQUENCY: f64 = 0.1;
const FRACTAL_OCTAVES: u32 = 4;
const FRACTAL_SCALE: f64 = 20.0;
const VARIANCE_SCALE: f64 = 1.5;
const EXTRA_VARIANCE_AMPLITUDE: f64 = 150.0;
const EXTRA_VARIANCE_FREQUENCY: f64 = 8.0;
const EXTRA_VARIANCE_OFFSET: Vec3 = Vec3 { x: 23.17, y: 42.73, z: 7.91 };

/// A pair of decorrelated Perlin samples, the larger-magnitude one chosen
/// and sharpened via `sign(x) * |x|^0.6`, approximating a directional
/// transform-fault "Gabor noise" texture at much lower cost than true Gabor
/// kernels (spec §4.11 step 1).
fn gabor_noise_approximation(perlin_a: &Perlin, perlin_b: &Perlin, position: Vec3, fault_direction: Vec3, frequency: f64) -> f64 {
    let p = position.scale(frequency);
    let offset = position.add(fault_direction.scale(2.0)).scale(frequency);
    let sample_a = perlin_a.get([p.x, p.y, p.z]);
    let sample_b = perlin_b.get([offset.x, offset.y, offset.z]);
    let raw = if sample_a.abs() > sample_b.abs() { sample_a } else { sample_b };
    raw.signum() * raw.abs().powf(0.6)
}

/// Four-octave Perlin fractal detail, each octave doubling frequency and
/// halving amplitude from `BASE_FREQUENCY`, summed and scaled by
/// `FRACTAL_SCALE` (spec §4.11 step 2, "fine fractal detail").
fn fractal_detail(perlin: &Perlin, position: Vec3) -> f64 {
    let mut value = 0.0;
    let mut amplitude = 1.0;
    let mut frequency = BASE_FREQUENCY;
    for _ in 0..FRACTAL_OCTAVES {
        let p = position.scale(frequency);
        value += amplitude * perlin.get([p.x, p.y, p.z]);
        amplitude *= 0.5;
        frequency *= 2.0;
    }
    value * FRACTAL_SCALE
}

pub struct OceanicAmplificationParams {
    pub fault_amplitude: f64,
    pub fault_frequency: f64,
    pub age_falloff: f64,
    pub seed: u32,
}

/// Compute the Stage-B amplified elevation for every oceanic vertex,
/// leaving continental vertices at their baseline value. `ridge_directions`
/// gives each vertex's unit tangent ridge direction (ref. spec's
/// `VertexRidgeDirections`); the transform-fault direction is the
/// perpendicular-to-ridge tangent, `cross(ridge_direction, position)`.
pub fn amplify_oceanic(
    positions: &[Vec3],
    baseline_elevation: &[f64],
    crust_age_my: &[f64],
    ridge_directions: &[Vec3],
    assignment: &[u32],
    plates: &[TectonicPlate],
    params: &OceanicAmplificationParams,
) -> Vec<f64> {
    let oceanic_plate_ids: std::collections::HashSet<u32> = plates
        .iter()
        .filter(|p| p.crust_type == CrustType::Oceanic)
        .map(|p| p.plate_id)
        .collect();

    let perlin_a = Perlin::new(params.seed);
    let perlin_b = Perlin::new(params.seed ^ 0x5bd1_e995);
    let perlin_fractal = Perlin::new(params.seed ^ 0x9e37_79b9);
    let perlin_variance = Perlin::new(params.seed ^ 0x85eb_ca6b);

    let fault_frequency = params.fault_frequency.max(0.0001);

    (0..positions.len())
        .map(|i| {
            let base = baseline_elevation[i];
            if !oceanic_plate_ids.contains(&assignment[i]) {
                return base;
            }

            let position = positions[i];
            let age_factor = (-crust_age_my[i] * params.age_falloff).exp();
            let fault_amplitude = params.fault_amplitude * age_factor;

            let ridge_direction = ridge_directions[i];
            let transform_fault_direction = ridge_direction.cross(position).normalize();

            let gabor = gabor_noise_approximation(&perlin_a, &perlin_b, position, transform_fault_direction, fault_frequency);
            let gabor_clamped = (gabor * 3.0).clamp(-1.0, 1.0);
            let fault_detail = fault_amplitude * gabor_clamped;

            let fine_detail = fractal_detail(&perlin_fractal, position);

            let amplified = base + fault_detail + fine_detail;

            let delta = amplified - base;
            let scaled_delta = delta * VARIANCE_SCALE;

            let variance_pos = position.scale(EXTRA_VARIANCE_FREQUENCY).add(EXTRA_VARIANCE_OFFSET);
            let extra_variance = EXTRA_VARIANCE_AMPLITUDE * perlin_variance.get([variance_pos.x, variance_pos.y, variance_pos.z]);

            base + scaled_delta + extra_variance
        })
        .collect()
}
