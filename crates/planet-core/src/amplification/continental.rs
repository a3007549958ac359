//! Stage-B continental amplification: classify each continental vertex's
//! terrain type, pick a weighted blend of exemplar heightfields for that
//! type, and layer the exemplar's detail onto the baseline elevation (spec
//! §4.11, grounded on `ContinentalAmplification.cpp`).

use crate::amplification::cache::{CachedBlend, ContinentalBlendCache};
use crate::amplification::exemplar::{Exemplar, ExemplarLibrary, ExemplarRegion};
use crate::boundary::{BoundaryType, PlateBoundary};
use crate::plate::{CrustType, TectonicPlate};
use crate::sphere::Vec3;

const FOLD_ALIGNMENT_MAX_RADIANS: f64 = 0.35;
const UV_WRAP_EPSILON: f64 = 1.0e-6;
const OLD_MOUNTAIN_OROGENY_AGE_MY: f64 = 100.0;
const PLAIN_BASELINE_THRESHOLD_M: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerrainType {
    Plain,
    AndeanMountains,
    HimalayanMountains,
    OldMountains,
}

/// Per-vertex amplification context needed to classify and blend; mirrors
/// the fields of `VertexOrogenyClass`/`VertexCrustAge` the orchestrator
/// already tracks.
pub struct ContinentalVertexContext<'a> {
    pub position: Vec3,
    pub baseline_elevation_m: f64,
    pub orogeny_age_my: f64,
    pub nearest_boundary: Option<&'a PlateBoundary>,
    pub own_crust: CrustType,
    pub other_crust: Option<CrustType>,
}

/// Classify a continental vertex's terrain type (spec §4.11 step 2,
/// `ClassifyTerrainType`): not-in-orogeny-with-low-baseline is Plain;
/// long-lived orogeny is OldMountains; an orogeny driven by differing crust
/// types (subduction) is Andean; otherwise Himalayan (continent-continent
/// collision).
pub fn classify_terrain_type(ctx: &ContinentalVertexContext) -> TerrainType {
    let in_orogeny = ctx.nearest_boundary.map(|b| b.boundary_type == BoundaryType::Convergent).unwrap_or(false);

    if !in_orogeny && ctx.baseline_elevation_m < PLAIN_BASELINE_THRESHOLD_M {
        return TerrainType::Plain;
    }
    if ctx.orogeny_age_my > OLD_MOUNTAIN_OROGENY_AGE_MY {
        return TerrainType::OldMountains;
    }
    match ctx.other_crust {
        Some(other) if other != ctx.own_crust => TerrainType::AndeanMountains,
        _ => TerrainType::HimalayanMountains,
    }
}

fn region_for_terrain(terrain: TerrainType) -> ExemplarRegion {
    match terrain {
        TerrainType::HimalayanMountains => ExemplarRegion::Himalayan,
        TerrainType::AndeanMountains => ExemplarRegion::Andean,
        // Plain reuses the Ancient library: no "plains" exemplar set exists,
        // and ancient massifs have the low-relief character plains need.
        TerrainType::OldMountains | TerrainType::Plain => ExemplarRegion::Ancient,
    }
}

/// Convert a unit direction to equirectangular UV, matching
/// `EquirectUVFromDirection`: longitude wraps to `[0,1)`, latitude maps
/// `[-pi/2, pi/2]` to `[1,0]` (north is v=0).
fn equirect_uv_from_direction(p: Vec3) -> (f64, f64) {
    let lon = p.y.atan2(p.x);
    let lat = p.z.clamp(-1.0, 1.0).asin();
    let u = (lon / std::f64::consts::TAU) + 0.5;
    let v = 0.5 - (lat / std::f64::consts::PI);
    (u.rem_euclid(1.0), v.clamp(UV_WRAP_EPSILON, 1.0 - UV_WRAP_EPSILON))
}

/// Rotate a local-UV offset by `angle_rad` (`RotateVector2D`).
fn rotate_vector_2d(x: f64, y: f64, angle_rad: f64) -> (f64, f64) {
    let (s, c) = angle_rad.sin_cos();
    (x * c - y * s, x * s + y * c)
}

/// Build the fold-rotation angle for a vertex near a convergent boundary:
/// the angle between the boundary's local tangent and geographic east,
/// clamped to `FOLD_ALIGNMENT_MAX_RADIANS` so exemplars don't get rotated
/// past recognizability (spec §4.11 step 3, `TryComputeFoldDirection`).
fn fold_rotation_angle(position: Vec3, boundary: Option<&PlateBoundary>, mesh_vertices: &[Vec3]) -> Option<f64> {
    let boundary = boundary?;
    if boundary.boundary_type != BoundaryType::Convergent {
        return None;
    }
    let &(v0, v1) = boundary.edges.first()?;
    let edge_vector = mesh_vertices[v1 as usize].sub(mesh_vertices[v0 as usize]);
    let local_east = Vec3::new(0.0, 0.0, 1.0).cross(position).normalize();
    let local_north = position.cross(local_east).normalize();
    let tangent = edge_vector.tangential_component(position).normalize();
    let angle = tangent.dot(local_north).atan2(tangent.dot(local_east));
    Some(angle.clamp(-FOLD_ALIGNMENT_MAX_RADIANS, FOLD_ALIGNMENT_MAX_RADIANS))
}

pub struct ContinentalAmplificationParams<'a> {
    pub library: &'a ExemplarLibrary,
    pub forced_exemplar_id: Option<&'a str>,
    pub disable_random_uv_offset: bool,
    pub seed: u64,
}

fn pseudo_random_uv_offset(vertex_index: u32, seed: u64) -> (f64, f64) {
    let mut state = seed ^ (vertex_index as u64).wrapping_mul(0x9e3779b97f4a7c15);
    state ^= state >> 33;
    state = state.wrapping_mul(0xff51afd7ed558ccd);
    state ^= state >> 33;
    let a = (state & 0xffff) as f64 / 65535.0 - 0.5;
    state = state.wrapping_mul(0xc4ceb9fe1a85ec53);
    let b = ((state >> 16) & 0xffff) as f64 / 65535.0 - 0.5;
    (a * 0.05, b * 0.05)
}

/// Blend up to 3 exemplars for `terrain`, weighted `1, 1/2, 1/3` (spec
/// §4.11 step 4, `BlendContinentalExemplars`).
fn blend_exemplars(exemplars: &[&Exemplar], u: f64, v: f64) -> Option<(f64, f64)> {
    if exemplars.is_empty() {
        return None;
    }
    let mut weighted_height = 0.0;
    let mut weighted_mean = 0.0;
    let mut weight_total = 0.0;
    for (i, exemplar) in exemplars.iter().take(3).enumerate() {
        let weight = 1.0 / (i as f64 + 1.0);
        weighted_height += weight * exemplar.sample_bilinear(u, v);
        weighted_mean += weight * exemplar.elevation_mean_m;
        weight_total += weight;
    }
    Some((weighted_height / weight_total, weighted_mean / weight_total))
}

/// Resolve the expensive, baseline-independent part of amplifying a
/// continental vertex: terrain classification, UV placement (including the
/// per-vertex pseudo-random offset and fold-rotation), and the weighted
/// exemplar blend itself. This is the part [`ContinentalBlendCache`] caches,
/// since it depends only on the vertex's position/terrain/boundary context
/// and not on this step's baseline elevation.
fn resolve_blend(vertex_index: u32, ctx: &ContinentalVertexContext, mesh_vertices: &[Vec3], params: &ContinentalAmplificationParams) -> Option<(f64, f64)> {
    let terrain = classify_terrain_type(ctx);
    let region = region_for_terrain(terrain);

    let (u, v, exemplars) = if let Some(forced_id) = params.forced_exemplar_id {
        let exemplar = params.library.by_id(forced_id)?;
        let (u, v) = match exemplar.bounds {
            Some(bounds) => {
                let (lat_deg, lon_deg) = ctx.position.to_latlon();
                let u = (lon_deg - bounds.west_lon_deg) / (bounds.east_lon_deg - bounds.west_lon_deg);
                let v = 1.0 - (lat_deg - bounds.south_lat_deg) / (bounds.north_lat_deg - bounds.south_lat_deg);
                (u.clamp(UV_WRAP_EPSILON, 1.0 - UV_WRAP_EPSILON), v.clamp(UV_WRAP_EPSILON, 1.0 - UV_WRAP_EPSILON))
            }
            None => equirect_uv_from_direction(ctx.position),
        };
        (u, v, vec![exemplar])
    } else {
        let matches = params.library.matching_region(region);
        if matches.is_empty() {
            return None;
        }
        let (base_u, base_v) = equirect_uv_from_direction(ctx.position);

        let (offset_u, offset_v) = if params.disable_random_uv_offset {
            (0.0, 0.0)
        } else {
            pseudo_random_uv_offset(vertex_index, params.seed)
        };

        let (rotated_u, rotated_v) = match fold_rotation_angle(ctx.position, ctx.nearest_boundary, mesh_vertices) {
            Some(angle) => rotate_vector_2d(offset_u, offset_v, angle),
            None => (offset_u, offset_v),
        };

        let u = (base_u + rotated_u).rem_euclid(1.0);
        let v = (base_v + rotated_v).clamp(UV_WRAP_EPSILON, 1.0 - UV_WRAP_EPSILON);
        (u, v, matches)
    };

    blend_exemplars(&exemplars, u, v)
}

/// Fold a resolved exemplar blend back onto this step's baseline elevation
/// (spec §4.11 step 5): the part of amplification that must always run
/// fresh, since baseline elevation changes every step under erosion/
/// dampening even when the cached blend itself is still valid.
fn combine_blend(ctx: &ContinentalVertexContext, terrain: TerrainType, blended_height: f64, reference_mean: f64) -> f64 {
    let detail_scale = if ctx.baseline_elevation_m > 1000.0 {
        (ctx.baseline_elevation_m / reference_mean.max(1.0)).clamp(0.01, 100.0)
    } else {
        0.5
    };
    let detail = (blended_height - reference_mean) * detail_scale;

    if terrain == TerrainType::OldMountains {
        ctx.baseline_elevation_m + detail * 0.5
    } else {
        ctx.baseline_elevation_m + detail
    }
}

/// Amplify a single continental vertex's baseline elevation. Returns the
/// baseline unchanged (plus a caller-visible warning, via `None`) if the
/// library has no exemplars for the classified terrain type. Uncached:
/// callers amplifying a whole vertex field in a hot loop should use
/// [`amplify_continental`], which consults a [`ContinentalBlendCache`].
pub fn amplify_continental_vertex(
    vertex_index: u32,
    ctx: &ContinentalVertexContext,
    mesh_vertices: &[Vec3],
    params: &ContinentalAmplificationParams,
) -> Option<f64> {
    let terrain = classify_terrain_type(ctx);
    let (blended_height, reference_mean) = resolve_blend(vertex_index, ctx, mesh_vertices, params)?;
    Some(combine_blend(ctx, terrain, blended_height, reference_mean))
}

/// Amplify every vertex owned by a continental plate, leaving oceanic
/// vertices (and vertices whose terrain type has no matching exemplars)
/// at baseline. Returns the amplified field plus a warning per vertex that
/// fell back to baseline for lack of an exemplar match.
///
/// Consults `cache` for the baseline-independent blend before calling
/// [`resolve_blend`], and stores a fresh result for any miss. A stale entry
/// (one cached under an older `current_serial`) is treated as a miss by
/// [`ContinentalBlendCache::get`], so the cache only pays off between steps
/// that don't change topology, LOD, or the exemplar library (spec §4.11).
#[allow(clippy::too_many_arguments)]
pub fn amplify_continental(
    positions: &[Vec3],
    baseline_elevation: &[f64],
    assignment: &[u32],
    plates: &[TectonicPlate],
    orogeny_age_my: &[f64],
    nearest_boundary_for_vertex: &[Option<usize>],
    boundaries: &[PlateBoundary],
    params: &ContinentalAmplificationParams,
    cache: &mut ContinentalBlendCache,
    current_serial: u64,
) -> (Vec<f64>, Vec<u32>) {
    let continental_plate_ids: std::collections::HashSet<u32> = plates
        .iter()
        .filter(|p| p.crust_type == CrustType::Continental)
        .map(|p| p.plate_id)
        .collect();
    let plate_by_id: std::collections::HashMap<u32, &TectonicPlate> = plates.iter().map(|p| (p.plate_id, p)).collect();

    let mut amplified = baseline_elevation.to_vec();
    let mut fallback_vertices = Vec::new();

    for i in 0..positions.len() {
        let owner = assignment[i];
        if !continental_plate_ids.contains(&owner) {
            continue;
        }

        let nearest_boundary = nearest_boundary_for_vertex[i].map(|idx| &boundaries[idx]);
        let other_crust = nearest_boundary.and_then(|b| {
            let (a, b_id) = b.key;
            let other_id = if a == owner { b_id } else { a };
            plate_by_id.get(&other_id).map(|p| p.crust_type)
        });

        let ctx = ContinentalVertexContext {
            position: positions[i],
            baseline_elevation_m: baseline_elevation[i],
            orogeny_age_my: orogeny_age_my[i],
            nearest_boundary,
            own_crust: CrustType::Continental,
            other_crust,
        };
        let terrain = classify_terrain_type(&ctx);

        let blend = match cache.get(i as u32, current_serial) {
            Some(hit) => hit.has_reference_mean.then_some((hit.blended_height_m, hit.reference_mean_m)),
            None => {
                let resolved = resolve_blend(i as u32, &ctx, positions, params);
                cache.put(
                    i as u32,
                    CachedBlend {
                        cached_serial: current_serial,
                        has_reference_mean: resolved.is_some(),
                        reference_mean_m: resolved.map(|(_, mean)| mean).unwrap_or(0.0),
                        blended_height_m: resolved.map(|(height, _)| height).unwrap_or(0.0),
                    },
                );
                resolved
            }
        };

        match blend {
            Some((blended_height, reference_mean)) => amplified[i] = combine_blend(&ctx, terrain, blended_height, reference_mean),
            None => fallback_vertices.push(i as u32),
        }
    }

    (amplified, fallback_vertices)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_exemplar(id: &str, region: ExemplarRegion) -> Exemplar {
        Exemplar {
            id: id.to_string(),
            region,
            elevation_min_m: 0.0,
            elevation_max_m: 8000.0,
            elevation_mean_m: 4000.0,
            width_px: 4,
            height_px: 4,
            bounds: None,
            height_data: vec![20000; 16],
        }
    }

    #[test]
    fn plain_classification_for_low_flat_non_orogeny() {
        let ctx = ContinentalVertexContext {
            position: Vec3::new(1.0, 0.0, 0.0),
            baseline_elevation_m: 200.0,
            orogeny_age_my: 0.0,
            nearest_boundary: None,
            own_crust: CrustType::Continental,
            other_crust: None,
        };
        assert_eq!(classify_terrain_type(&ctx), TerrainType::Plain);
    }

    #[test]
    fn old_mountains_classification_for_long_orogeny() {
        let ctx = ContinentalVertexContext {
            position: Vec3::new(1.0, 0.0, 0.0),
            baseline_elevation_m: 3000.0,
            orogeny_age_my: 150.0,
            nearest_boundary: None,
            own_crust: CrustType::Continental,
            other_crust: None,
        };
        assert_eq!(classify_terrain_type(&ctx), TerrainType::OldMountains);
    }

    #[test]
    fn andean_classification_for_differing_crust_convergence() {
        let boundary = PlateBoundary {
            key: (0, 1),
            boundary_type: BoundaryType::Convergent,
            state: crate::boundary::BoundaryState::Active,
            accumulated_stress_mpa: 80.0,
            rift_width_meters: 0.0,
            active_duration_my: 5.0,
            divergent_duration_my: 0.0,
            relative_velocity_rad_per_my: -0.01,
            edges: vec![(0, 1)],
        };
        let ctx = ContinentalVertexContext {
            position: Vec3::new(1.0, 0.0, 0.0),
            baseline_elevation_m: 3000.0,
            orogeny_age_my: 20.0,
            nearest_boundary: Some(&boundary),
            own_crust: CrustType::Continental,
            other_crust: Some(CrustType::Oceanic),
        };
        assert_eq!(classify_terrain_type(&ctx), TerrainType::AndeanMountains);
    }

    #[test]
    fn himalayan_classification_for_continent_continent_convergence() {
        let boundary = PlateBoundary {
            key: (0, 1),
            boundary_type: BoundaryType::Convergent,
            state: crate::boundary::BoundaryState::Active,
            accumulated_stress_mpa: 80.0,
            rift_width_meters: 0.0,
            active_duration_my: 5.0,
            divergent_duration_my: 0.0,
            relative_velocity_rad_per_my: -0.01,
            edges: vec![(0, 1)],
        };
        let ctx = ContinentalVertexContext {
            position: Vec3::new(1.0, 0.0, 0.0),
            baseline_elevation_m: 3000.0,
            orogeny_age_my: 20.0,
            nearest_boundary: Some(&boundary),
            own_crust: CrustType::Continental,
            other_crust: Some(CrustType::Continental),
        };
        assert_eq!(classify_terrain_type(&ctx), TerrainType::HimalayanMountains);
    }

    #[test]
    fn amplify_vertex_falls_back_to_none_without_matching_exemplars() {
        let library = ExemplarLibrary::default();
        let ctx = ContinentalVertexContext {
            position: Vec3::new(1.0, 0.0, 0.0),
            baseline_elevation_m: 200.0,
            orogeny_age_my: 0.0,
            nearest_boundary: None,
            own_crust: CrustType::Continental,
            other_crust: None,
        };
        let params = ContinentalAmplificationParams { library: &library, forced_exemplar_id: None, disable_random_uv_offset: true, seed: 1 };
        let mesh_vertices = vec![Vec3::new(1.0, 0.0, 0.0)];
        assert!(amplify_continental_vertex(0, &ctx, &mesh_vertices, &params).is_none());
    }

    #[test]
    fn equirect_uv_is_within_unit_square() {
        for p in [Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0), Vec3::new(-1.0, 0.0, 0.0)] {
            let (u, v) = equirect_uv_from_direction(p);
            assert!((0.0..1.0).contains(&u));
            assert!((0.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn amplify_continental_populates_the_cache_for_every_continental_vertex() {
        let library = ExemplarLibrary::from_exemplars(vec![test_exemplar("ancient-1", ExemplarRegion::Ancient)]);
        let positions = vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0)];
        let baseline = vec![200.0, 200.0];
        let assignment = vec![0u32, 0];
        let plates = vec![TectonicPlate {
            plate_id: 0,
            crust_type: CrustType::Continental,
            centroid: Vec3::new(1.0, 0.0, 0.0),
            initial_centroid: Vec3::new(1.0, 0.0, 0.0),
            euler_pole_axis: Vec3::new(0.0, 0.0, 1.0),
            angular_velocity_rad_per_my: 0.01,
            seed_face: [0, 1, 2],
            crust_thickness_m: 35_000.0,
        }];
        let orogeny_age_my = vec![0.0, 0.0];
        let nearest_boundary_for_vertex = vec![None, None];
        let boundaries: Vec<PlateBoundary> = Vec::new();
        let params = ContinentalAmplificationParams { library: &library, forced_exemplar_id: None, disable_random_uv_offset: true, seed: 1 };
        let mut cache = ContinentalBlendCache::with_capacity(positions.len());

        let (amplified, fallback) =
            amplify_continental(&positions, &baseline, &assignment, &plates, &orogeny_age_my, &nearest_boundary_for_vertex, &boundaries, &params, &mut cache, 1);

        assert!(fallback.is_empty(), "an Ancient exemplar matches the Plain terrain type fallback region");
        assert_eq!(amplified.len(), 2);
        for v in 0..2u32 {
            let cached = cache.get(v, 1).expect("amplify_continental must populate the cache at the current serial");
            assert!(cached.has_reference_mean);
        }
    }

    #[test]
    fn cache_hit_reuses_blend_across_a_second_pass_at_the_same_serial() {
        let library = ExemplarLibrary::from_exemplars(vec![test_exemplar("ancient-1", ExemplarRegion::Ancient)]);
        let positions = vec![Vec3::new(1.0, 0.0, 0.0)];
        let baseline = vec![200.0];
        let assignment = vec![0u32];
        let plates = vec![TectonicPlate {
            plate_id: 0,
            crust_type: CrustType::Continental,
            centroid: Vec3::new(1.0, 0.0, 0.0),
            initial_centroid: Vec3::new(1.0, 0.0, 0.0),
            euler_pole_axis: Vec3::new(0.0, 0.0, 1.0),
            angular_velocity_rad_per_my: 0.01,
            seed_face: [0, 1, 2],
            crust_thickness_m: 35_000.0,
        }];
        let orogeny_age_my = vec![0.0];
        let nearest_boundary_for_vertex = vec![None];
        let boundaries: Vec<PlateBoundary> = Vec::new();
        let params = ContinentalAmplificationParams { library: &library, forced_exemplar_id: None, disable_random_uv_offset: true, seed: 1 };
        let mut cache = ContinentalBlendCache::with_capacity(1);

        let (first, _) =
            amplify_continental(&positions, &baseline, &assignment, &plates, &orogeny_age_my, &nearest_boundary_for_vertex, &boundaries, &params, &mut cache, 1);
        // Baseline changes between steps even though the blend stays cached.
        let second_baseline = vec![250.0];
        let (second, _) = amplify_continental(
            &positions,
            &second_baseline,
            &assignment,
            &plates,
            &orogeny_age_my,
            &nearest_boundary_for_vertex,
            &boundaries,
            &params,
            &mut cache,
            1,
        );
        assert_ne!(first[0], second[0], "baseline elevation still feeds into the amplified result on a cache hit");
    }

    #[test]
    fn old_mountains_detail_is_halved_relative_to_himalayan() {
        let mut exemplars = Vec::new();
        let ancient = test_exemplar("ancient-1", ExemplarRegion::Ancient);
        exemplars.push(ancient);
        let himalayan = test_exemplar("hima-1", ExemplarRegion::Himalayan);
        exemplars.push(himalayan);

        let (old_height, old_mean) = blend_exemplars(&[&exemplars[0]], 0.5, 0.5).unwrap();
        let (young_height, young_mean) = blend_exemplars(&[&exemplars[1]], 0.5, 0.5).unwrap();
        let old_detail = (old_height - old_mean) * 50.0 * 0.5;
        let young_detail = (young_height - young_mean) * 50.0;
        assert!(old_detail.abs() <= young_detail.abs() + 1e-9);
    }
}
