//! Step orchestrator: owns every piece of live simulation state and drives
//! it through the fixed 2-My step sequence (spec §2, §4.12): plate motion,
//! terrane transport, boundary reclassification, terrane collision
//! detection/reattachment, stress/state updates, rift propagation, hotspot
//! drift, field interpolation, surface processes, Stage-B amplification, and
//! topology surgery, in that order, every step.
//!
//! Grounded on `PlanetGenerator::generate`'s numbered-stage orchestration
//! style, adapted from a one-shot generation pipeline into a resumable,
//! undo/redo-capable step loop.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::time::Instant;

use crate::amplification::cache::ContinentalBlendCache;
use crate::amplification::continental::{self, ContinentalAmplificationParams};
use crate::amplification::exemplar::ExemplarLibrary;
use crate::amplification::oceanic;
use crate::amplification::oceanic::OceanicAmplificationParams;
use crate::boundary::{self, BoundaryKey, BoundaryState, BoundaryType, PlateBoundary};
use crate::error::{EngineError, EngineResult, EngineWarning};
use crate::hotspot::{self, Hotspot};
use crate::mesh::RenderMesh;
use crate::params::SimulationParameters;
use crate::plate::{self, CrustType, TectonicPlate};
use crate::sphere::{great_circle_distance_rad, Vec3};
use crate::stress_thermal;
use crate::surface::erosion;
use crate::surface::oceanic as oceanic_surface;
use crate::surface::sediment;
use crate::topology::{merge, retessellation, split, terrane, validate_topology};
use crate::voronoi;

/// Every step advances the simulation clock by this many million years
/// (spec §2: "a fixed 2-My step").
const STEP_DURATION_MY: f64 = 2.0;

/// Baseline elevation for newly-formed oceanic crust: the mid-ocean-ridge
/// depth constant (spec §3, `zT`).
const OCEANIC_RIDGE_DEPTH_M: f64 = -1000.0;
/// Baseline elevation for continental crust at `reset` (spec §3).
const CONTINENTAL_BASELINE_M: f64 = 0.0;

const HISTORY_CAPACITY: usize = 50;
/// Arc distance within which a vertex is considered "at" a convergent
/// boundary for orogeny bookkeeping.
const SUBDUCTION_NEAR_RAD: f64 = 0.15;
/// Below this accumulated age a convergent-boundary vertex is a nascent
/// orogeny rather than an established one.
const OROGENY_NASCENT_MY: f64 = 5.0;

/// A continental vertex's mountain-building history, tracked so Stage-B
/// continental amplification can tell a young range from an ancient massif
/// (spec §4.11, `VertexOrogenyClass`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrogenyClass {
    None,
    Nascent,
    Active,
    Dormant,
}

/// Lifecycle state of an extracted continental fragment (spec §3, "a
/// terrane may be Attached, Extracted, Transporting, Colliding, or
/// Reattached").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerraneState {
    Attached,
    Extracted,
    Transporting,
    Colliding,
    Reattached,
}

/// A live terrane record: lifecycle state plus the mesh-surgery payload
/// that carries its geometry independent of the surrounding plate.
#[derive(Debug, Clone)]
pub struct Terrane {
    pub terrane_id: u32,
    pub carrier_plate_id: u32,
    pub state: TerraneState,
    pub payload: terrane::TerranePayload,
}

/// A complete, independently-restorable copy of the engine's live state,
/// used for the undo/redo history ring (spec §4.12, §8 determinism law
/// "undo ∘ advance_steps(1) restores the previous snapshot bit-identically").
#[derive(Clone)]
pub struct SimulationSnapshot {
    plates: Vec<TectonicPlate>,
    boundaries: BTreeMap<BoundaryKey, PlateBoundary>,
    hotspots: Vec<Hotspot>,
    terranes: Vec<Terrane>,
    mesh: RenderMesh,
    assignment: Vec<u32>,
    velocities: Vec<Vec3>,
    stress: Vec<f64>,
    temperature: Vec<f64>,
    elevation: Vec<f64>,
    amplified_elevation: Vec<f64>,
    erosion_rates: Vec<f64>,
    sediment_thickness: Vec<f64>,
    crust_age: Vec<f64>,
    ridge_directions: Vec<Vec3>,
    orogeny_class: Vec<OrogenyClass>,
    orogeny_age_my: Vec<f64>,
    current_time_my: f64,
    step_count: u64,
    next_plate_id: u32,
    next_terrane_id: u32,
    topology_version: u64,
    surface_data_version: u64,
    amplification_data_serial: u64,
    retessellation_count: u64,
}

/// The simulation itself: every step mutates this in place, one fixed
/// 2-My tick at a time.
pub struct PlanetEngine {
    params: SimulationParameters,

    plates: Vec<TectonicPlate>,
    boundaries: BTreeMap<BoundaryKey, PlateBoundary>,
    hotspots: Vec<Hotspot>,
    terranes: Vec<Terrane>,

    mesh: RenderMesh,
    assignment: Vec<u32>,
    velocities: Vec<Vec3>,
    stress: Vec<f64>,
    temperature: Vec<f64>,
    elevation: Vec<f64>,
    amplified_elevation: Vec<f64>,
    erosion_rates: Vec<f64>,
    sediment_thickness: Vec<f64>,
    crust_age: Vec<f64>,
    ridge_directions: Vec<Vec3>,
    orogeny_class: Vec<OrogenyClass>,
    orogeny_age_my: Vec<f64>,

    current_time_my: f64,
    step_count: u64,
    next_plate_id: u32,
    next_terrane_id: u32,

    topology_version: u64,
    surface_data_version: u64,
    amplification_data_serial: u64,
    retessellation_count: u64,
    last_step_time_ms: u64,

    history: VecDeque<SimulationSnapshot>,
    redo_stack: Vec<SimulationSnapshot>,

    exemplar_library: ExemplarLibrary,
    blend_cache: ContinentalBlendCache,

    topology_events: Vec<String>,
    exemplar_load_warnings: Vec<String>,
    warned_exemplar_ids: HashSet<String>,
}

impl PlanetEngine {
    pub fn new(mut params: SimulationParameters) -> Self {
        let _ = params.validate();
        let mut engine = Self {
            params,
            plates: Vec::new(),
            boundaries: BTreeMap::new(),
            hotspots: Vec::new(),
            terranes: Vec::new(),
            mesh: RenderMesh::from_icosphere(0),
            assignment: Vec::new(),
            velocities: Vec::new(),
            stress: Vec::new(),
            temperature: Vec::new(),
            elevation: Vec::new(),
            amplified_elevation: Vec::new(),
            erosion_rates: Vec::new(),
            sediment_thickness: Vec::new(),
            crust_age: Vec::new(),
            ridge_directions: Vec::new(),
            orogeny_class: Vec::new(),
            orogeny_age_my: Vec::new(),
            current_time_my: 0.0,
            step_count: 0,
            next_plate_id: 0,
            next_terrane_id: 0,
            topology_version: 0,
            surface_data_version: 0,
            amplification_data_serial: 0,
            retessellation_count: 0,
            last_step_time_ms: 0,
            history: VecDeque::new(),
            redo_stack: Vec::new(),
            exemplar_library: ExemplarLibrary::default(),
            blend_cache: ContinentalBlendCache::default(),
            topology_events: Vec::new(),
            exemplar_load_warnings: Vec::new(),
            warned_exemplar_ids: HashSet::new(),
        };
        engine.reset();
        engine
    }

    // ── 1. Lifecycle ──────────────────────────────────────────────────

    /// Regenerate plates, mesh, and every per-vertex array from `params`,
    /// discarding all simulation history.
    pub fn reset(&mut self) {
        self.plates = plate::generate_plates(self.params.subdivision_level, self.params.seed);
        self.next_plate_id = self.plates.iter().map(|p| p.plate_id).max().map(|m| m + 1).unwrap_or(0);
        self.terranes.clear();
        self.next_terrane_id = 0;

        self.current_time_my = 0.0;
        self.step_count = 0;
        self.topology_version = 0;
        self.surface_data_version = 0;
        self.amplification_data_serial = 0;
        self.retessellation_count = 0;
        self.topology_events.clear();
        self.exemplar_load_warnings.clear();
        self.warned_exemplar_ids.clear();
        self.history.clear();
        self.redo_stack.clear();

        self.hotspots = if self.params.enable_hotspots {
            hotspot::generate_hotspots(
                self.params.major_hotspot_count,
                self.params.minor_hotspot_count,
                self.params.major_hotspot_thermal_output,
                self.params.minor_hotspot_thermal_output,
                self.params.seed,
            )
        } else {
            Vec::new()
        };

        self.mesh = RenderMesh::from_icosphere(self.params.render_subdivision_level);
        let warp_amp = if self.params.enable_voronoi_warping { self.params.voronoi_warping_amplitude } else { 0.0 };

        self.assignment = if self.params.lloyd_iterations > 0 {
            let assignment = voronoi::lloyd_relax(
                &self.mesh.vertices,
                &mut self.plates,
                self.params.lloyd_iterations,
                warp_amp,
                self.params.voronoi_warping_frequency,
                self.params.seed,
            );
            for p in &mut self.plates {
                p.initial_centroid = p.centroid;
            }
            assignment
        } else {
            voronoi::assign_vertices(&self.mesh.vertices, &self.plates, warp_amp, self.params.voronoi_warping_frequency, self.params.seed)
        };

        self.velocities = self.recompute_velocities();
        self.boundaries = self.rebuild_boundaries_fresh();
        self.elevation = self.generate_baseline_elevation();
        self.amplified_elevation = self.elevation.clone();

        let n = self.mesh.vertex_count();
        self.erosion_rates = vec![0.0; n];
        self.sediment_thickness = vec![0.0; n];
        self.crust_age = vec![0.0; n];
        self.ridge_directions = Self::compute_ridge_directions(&self.mesh);
        self.orogeny_class = vec![OrogenyClass::None; n];
        self.orogeny_age_my = vec![0.0; n];
        self.blend_cache.reset(n);

        self.recompute_stress_and_thermal();
        self.history.push_back(self.snapshot());
    }

    /// Apply new parameters. Parameters other than
    /// `enable_heightmap_visualization` trigger a full [`reset`](Self::reset);
    /// toggling visualization alone only bumps the surface-data version
    /// (spec §6: visualization is a rendering concern, not a physics input).
    pub fn set_parameters(&mut self, mut new_params: SimulationParameters) -> Vec<EngineWarning> {
        let warnings = new_params.validate();

        let mut old_compare = self.params.clone();
        let mut new_compare = new_params.clone();
        old_compare.enable_heightmap_visualization = false;
        new_compare.enable_heightmap_visualization = false;

        let unchanged = self.params == new_params;
        let only_visualization_changed = !unchanged && old_compare == new_compare;

        self.params = new_params;

        if unchanged {
            // no-op
        } else if only_visualization_changed {
            self.surface_data_version += 1;
        } else {
            self.reset();
        }

        warnings
    }

    /// Change the render LOD without otherwise disturbing simulation state:
    /// the mesh and per-vertex arrays are rebuilt and fields transferred by
    /// KNN, but plate count, current time, centroids, and per-boundary
    /// accumulated stress are preserved exactly (spec §8, scenario 2).
    pub fn set_render_subdivision_level(&mut self, level: u32) -> EngineResult<()> {
        self.params.render_subdivision_level = level.min(8);

        let new_mesh = RenderMesh::from_icosphere(self.params.render_subdivision_level);
        let warp_amp = if self.params.enable_voronoi_warping { self.params.voronoi_warping_amplitude } else { 0.0 };
        let new_assignment =
            voronoi::assign_vertices(&new_mesh.vertices, &self.plates, warp_amp, self.params.voronoi_warping_frequency, self.params.seed);

        let elevation = retessellation::transfer_field(&self.mesh, &self.elevation, &new_mesh);
        let amplified = retessellation::transfer_field(&self.mesh, &self.amplified_elevation, &new_mesh);
        let crust_age = retessellation::transfer_field(&self.mesh, &self.crust_age, &new_mesh);
        let erosion_rates = retessellation::transfer_field(&self.mesh, &self.erosion_rates, &new_mesh);
        let sediment_thickness = retessellation::transfer_field(&self.mesh, &self.sediment_thickness, &new_mesh);
        let orogeny_age_my = retessellation::transfer_field(&self.mesh, &self.orogeny_age_my, &new_mesh);

        self.mesh = new_mesh;
        self.assignment = new_assignment;
        self.elevation = elevation;
        self.amplified_elevation = amplified;
        self.crust_age = crust_age;
        self.erosion_rates = erosion_rates;
        self.sediment_thickness = sediment_thickness;
        self.orogeny_age_my = orogeny_age_my;
        self.orogeny_class = vec![OrogenyClass::None; self.mesh.vertex_count()];
        self.ridge_directions = Self::compute_ridge_directions(&self.mesh);
        self.velocities = self.recompute_velocities();
        self.boundaries = self.rebuild_boundaries_preserving_state();
        self.blend_cache.reset(self.mesh.vertex_count());
        self.amplification_data_serial += 1;
        self.recompute_stress_and_thermal();

        self.surface_data_version += 1;
        Ok(())
    }

    /// Load the exemplar library used by continental amplification from
    /// `dir`, returning the load-time warnings (one per exemplar that failed
    /// to decode) rather than failing the whole load.
    pub fn load_exemplar_library(&mut self, dir: &Path) -> EngineResult<Vec<String>> {
        let (library, warnings) = ExemplarLibrary::load(dir).map_err(|source| EngineError::ExemplarLoad { id: dir.display().to_string(), source })?;
        self.exemplar_library = library;
        self.blend_cache.invalidate_all();
        self.amplification_data_serial += 1;
        Ok(warnings)
    }

    // ── 2. Stepping ───────────────────────────────────────────────────

    pub fn advance_steps(&mut self, steps: u32) -> EngineResult<()> {
        for _ in 0..steps {
            self.step_once();
        }
        Ok(())
    }

    fn step_once(&mut self) {
        let start = Instant::now();
        let dt = STEP_DURATION_MY;

        // 1. Plate motion.
        for p in &mut self.plates {
            p.migrate(dt);
        }

        // 2. Terrane transport: riding carriers continue independent of the
        // surrounding mesh while Transporting.
        {
            let plate_map = self.plate_index_map();
            for t in &mut self.terranes {
                if t.state == TerraneState::Transporting {
                    if let Some(&idx) = plate_map.get(&t.carrier_plate_id) {
                        terrane::transport(&mut t.payload, &self.plates[idx], dt);
                    }
                }
            }
        }

        // 3. Boundary reclassification from current plate kinematics.
        {
            let plate_map = self.plate_index_map();
            for b in self.boundaries.values_mut() {
                if let (Some(&ia), Some(&ib)) = (plate_map.get(&b.key.0), plate_map.get(&b.key.1)) {
                    boundary::classify_boundary(b, &self.plates[ia], &self.plates[ib], &self.mesh, self.params.planet_radius_m);
                }
            }
        }

        // 4. Terrane collision detection and automatic reattachment: a
        // transporting terrane that has drifted into a neighboring plate's
        // territory is reattached to it this step, after boundaries have
        // been reclassified against this step's plate motion (spec §2,
        // §4.10; `TectonicSimulationService.cpp`'s per-tick order runs
        // boundary reclassification before terrane collision resolution).
        self.process_terrane_collisions();

        // 5. Stress accumulation.
        for b in self.boundaries.values_mut() {
            boundary::update_stress(b, dt);
        }

        // 6. Boundary lifecycle state machine.
        for b in self.boundaries.values_mut() {
            boundary::update_state(b, self.params.split_velocity_threshold_rad_per_my, self.params.split_duration_threshold_my, dt);
        }

        // 7. Rift propagation.
        if self.params.enable_rift_propagation {
            for b in self.boundaries.values_mut() {
                boundary::propagate_rift(b, self.params.rift_progression_rate, dt);
            }
        }

        // 8. Hotspot drift.
        if self.params.enable_hotspots {
            for h in &mut self.hotspots {
                hotspot::update_drift(h, self.params.hotspot_drift_speed, dt);
            }
        }

        // 9. Advance the clock.
        self.current_time_my += dt;
        self.step_count += 1;

        // 10. Stress-to-vertex interpolation, plus hotspot thermal-to-stress
        // contribution, plus the thermal field (which bakes in hotspot heat
        // directly).
        self.recompute_stress_and_thermal();

        // 11. Surface processes.
        if self.params.enable_continental_erosion {
            let crust_by_plate = self.crust_by_plate();
            let assignment = self.assignment.clone();
            erosion::apply_continental_erosion(
                &self.mesh,
                &mut self.elevation,
                &mut self.erosion_rates,
                &self.stress,
                &self.temperature,
                |v| crust_by_plate.get(&assignment[v]).copied(),
                self.params.erosion_constant,
                self.params.sea_level_m,
                self.params.planet_radius_m,
                dt,
            );
        }

        if self.params.enable_sediment_transport {
            let crust_by_plate = self.crust_by_plate();
            let assignment = self.assignment.clone();
            let elevation_snapshot = self.elevation.clone();
            sediment::diffuse_sediment(
                &self.mesh,
                &mut self.sediment_thickness,
                &elevation_snapshot,
                |v| crust_by_plate.get(&assignment[v]).copied(),
                self.params.sediment_diffusion_rate,
            );
        }

        if self.params.enable_oceanic_dampening {
            let crust_by_plate = self.crust_by_plate();
            let assignment = self.assignment.clone();
            let boundary_refs: Vec<&PlateBoundary> = self.boundaries.values().collect();
            oceanic_surface::apply_oceanic_dampening(
                &self.mesh,
                &mut self.elevation,
                &mut self.crust_age,
                &boundary_refs,
                |v| crust_by_plate.get(&assignment[v]).copied(),
                self.params.sea_level_m,
                self.params.oceanic_dampening_constant,
                self.params.oceanic_age_subsidence_coeff,
                dt,
            );
        }

        // 12. Stage-B amplification.
        self.apply_amplification(dt);

        // 13. Topology surgery: splits and merges.
        self.maybe_split_and_merge();

        // 14. Dynamic re-tessellation.
        self.maybe_retessellate();

        self.surface_data_version += 1;
        self.last_step_time_ms = start.elapsed().as_millis() as u64;

        // 15. History snapshot for undo/redo.
        self.push_history_snapshot();
    }

    fn apply_amplification(&mut self, dt: f64) {
        if self.params.render_subdivision_level < self.params.min_amplification_lod {
            self.amplified_elevation = self.elevation.clone();
            return;
        }

        self.amplified_elevation = if self.params.enable_oceanic_amplification {
            let oc_params = OceanicAmplificationParams {
                fault_amplitude: self.params.oceanic_fault_amplitude,
                fault_frequency: self.params.oceanic_fault_frequency,
                age_falloff: self.params.oceanic_age_falloff,
                seed: self.params.seed as u32,
            };
            oceanic::amplify_oceanic(
                &self.mesh.vertices,
                &self.elevation,
                &self.crust_age,
                &self.ridge_directions,
                &self.assignment,
                &self.plates,
                &oc_params,
            )
        } else {
            self.elevation.clone()
        };

        if self.params.enable_continental_amplification {
            let boundary_vec: Vec<PlateBoundary> = self.boundaries.values().cloned().collect();
            let (nearest_idx, nearest_dist) = self.nearest_boundary_per_vertex(&boundary_vec);
            self.update_orogeny_fields(&boundary_vec, &nearest_idx, &nearest_dist, dt);

            let cparams = ContinentalAmplificationParams {
                library: &self.exemplar_library,
                forced_exemplar_id: self.params.forced_exemplar_id.as_deref(),
                disable_random_uv_offset: self.params.disable_random_uv_offset,
                seed: self.params.seed,
            };
            let (amplified, fallback) = continental::amplify_continental(
                &self.mesh.vertices,
                &self.amplified_elevation,
                &self.assignment,
                &self.plates,
                &self.orogeny_age_my,
                &nearest_idx,
                &boundary_vec,
                &cparams,
                &mut self.blend_cache,
                self.amplification_data_serial,
            );
            self.amplified_elevation = amplified;

            if !fallback.is_empty() && self.warned_exemplar_ids.insert("continental-fallback".to_string()) {
                self.exemplar_load_warnings
                    .push(format!("{} continental vertices had no matching exemplar and remain at baseline", fallback.len()));
            }
        }
    }

    fn update_orogeny_fields(&mut self, boundaries: &[PlateBoundary], nearest_idx: &[Option<usize>], nearest_dist: &[f64], dt: f64) {
        for v in 0..self.mesh.vertex_count() {
            let near_convergent = nearest_idx[v]
                .map(|i| boundaries[i].boundary_type == BoundaryType::Convergent && nearest_dist[v] < SUBDUCTION_NEAR_RAD)
                .unwrap_or(false);

            if near_convergent {
                self.orogeny_age_my[v] += dt;
                let state = boundaries[nearest_idx[v].unwrap()].state;
                self.orogeny_class[v] = if self.orogeny_age_my[v] < OROGENY_NASCENT_MY {
                    OrogenyClass::Nascent
                } else if state == BoundaryState::Dormant {
                    OrogenyClass::Dormant
                } else {
                    OrogenyClass::Active
                };
            } else {
                self.orogeny_age_my[v] = 0.0;
                self.orogeny_class[v] = OrogenyClass::None;
            }
        }
    }

    fn maybe_split_and_merge(&mut self) {
        if !self.params.enable_plate_topology_changes {
            return;
        }

        let split_keys: Vec<BoundaryKey> = self
            .boundaries
            .iter()
            .filter(|(_, b)| b.state == BoundaryState::Rifting && split::should_split(b.rift_width_meters, self.params.rift_split_threshold_meters))
            .map(|(&k, _)| k)
            .collect();
        for key in split_keys {
            self.apply_split(key);
        }

        let merge_keys: Vec<BoundaryKey> = self
            .boundaries
            .iter()
            .filter(|(_, b)| b.boundary_type == BoundaryType::Convergent && merge::should_merge(b.accumulated_stress_mpa, self.params.merge_stress_threshold_mpa))
            .map(|(&k, _)| k)
            .collect();
        for key in merge_keys {
            self.apply_merge(key);
        }
    }

    fn apply_split(&mut self, key: BoundaryKey) {
        let Some(boundary) = self.boundaries.get(&key) else { return };
        if boundary.state != BoundaryState::Rifting {
            return;
        }
        let Some(&(v0, v1)) = boundary.edges.first() else { return };

        let plate_map = self.plate_index_map();
        let (Some(&ia), Some(&ib)) = (plate_map.get(&key.0), plate_map.get(&key.1)) else { return };

        // Split the larger side of the rift (vertex count as an area proxy).
        let count_a = self.assignment.iter().filter(|&&a| a == key.0).count();
        let count_b = self.assignment.iter().filter(|&&a| a == key.1).count();
        let (parent_idx, parent_id) = if count_a >= count_b { (ia, key.0) } else { (ib, key.1) };
        let parent = self.plates[parent_idx].clone();

        let edge_vector = self.mesh.vertices[v1 as usize].sub(self.mesh.vertices[v0 as usize]);
        let rift_tangent = edge_vector.tangential_component(parent.centroid);
        if rift_tangent.length() < 1e-9 {
            self.topology_events
                .push(format!("t={:.1}My: split of plate {parent_id} skipped (degenerate rift tangent)", self.current_time_my));
            return;
        }

        let new_id = self.next_plate_id;
        let (child_a, child_b) = split::split_plate(&parent, rift_tangent, new_id);

        let mut candidate_assignment = self.assignment.clone();
        for v in 0..self.mesh.vertex_count() {
            if candidate_assignment[v] != parent_id {
                continue;
            }
            let pos = self.mesh.vertices[v];
            let da = great_circle_distance_rad(pos, child_a.centroid);
            let db = great_circle_distance_rad(pos, child_b.centroid);
            candidate_assignment[v] = if da <= db { child_a.plate_id } else { child_b.plate_id };
        }

        let allowed_unassigned = self.in_flight_terrane_vertices();
        if let Err(warning) = validate_topology(self.mesh.vertex_count(), self.mesh.faces.len(), &candidate_assignment, &allowed_unassigned) {
            self.topology_events.push(format!("t={:.1}My: split of plate {parent_id} rejected ({warning})", self.current_time_my));
            return;
        }

        self.assignment = candidate_assignment;
        self.plates[parent_idx] = child_a;
        self.plates.push(child_b);
        self.next_plate_id += 1;
        self.boundaries = self.rebuild_boundaries_preserving_state();
        self.blend_cache.invalidate_all();
        self.amplification_data_serial += 1;
        self.topology_version += 1;
        self.topology_events
            .push(format!("t={:.1}My: plate {parent_id} split into {parent_id} and {new_id}", self.current_time_my));
    }

    fn apply_merge(&mut self, key: BoundaryKey) {
        let Some(boundary) = self.boundaries.get(&key) else { return };
        if boundary.boundary_type != BoundaryType::Convergent {
            return;
        }
        if !merge::should_merge(boundary.accumulated_stress_mpa, self.params.merge_stress_threshold_mpa) {
            return;
        }

        let plate_map = self.plate_index_map();
        let (Some(&ia), Some(&ib)) = (plate_map.get(&key.0), plate_map.get(&key.1)) else { return };

        let count_a = self.assignment.iter().filter(|&&a| a == key.0).count();
        let count_b = self.assignment.iter().filter(|&&a| a == key.1).count();
        let (survivor_id, survivor_idx, consumed_id, consumed_idx, wa, wb) = if count_a >= count_b {
            (key.0, ia, key.1, ib, count_a as f64, count_b as f64)
        } else {
            (key.1, ib, key.0, ia, count_b as f64, count_a as f64)
        };

        let mut candidate_assignment = self.assignment.clone();
        merge::reassign_vertices(&mut candidate_assignment, consumed_id, survivor_id);

        let allowed_unassigned = self.in_flight_terrane_vertices();
        if let Err(warning) = validate_topology(self.mesh.vertex_count(), self.mesh.faces.len(), &candidate_assignment, &allowed_unassigned) {
            self.topology_events
                .push(format!("t={:.1}My: merge of plate {consumed_id} into {survivor_id} rejected ({warning})", self.current_time_my));
            return;
        }

        let consumed_plate = self.plates[consumed_idx].clone();
        merge::merge_into(&mut self.plates[survivor_idx], &consumed_plate, wa, wb);
        self.plates.remove(consumed_idx);
        self.assignment = candidate_assignment;
        self.boundaries = self.rebuild_boundaries_preserving_state();
        self.blend_cache.invalidate_all();
        self.amplification_data_serial += 1;
        self.topology_version += 1;
        self.topology_events
            .push(format!("t={:.1}My: plate {consumed_id} merged into {survivor_id}", self.current_time_my));
    }

    fn maybe_retessellate(&mut self) {
        if !self.params.enable_dynamic_retessellation {
            return;
        }
        let threshold_rad = self.params.retessellation_threshold_degrees.to_radians();
        let drifted = self.plates.iter().any(|p| great_circle_distance_rad(p.centroid, p.initial_centroid) > threshold_rad);
        if !drifted {
            return;
        }

        let candidate_mesh = RenderMesh::from_icosphere(self.params.render_subdivision_level);
        let candidate_assignment =
            voronoi::assign_vertices(&candidate_mesh.vertices, &self.plates, 0.0, self.params.voronoi_warping_frequency, self.params.seed);

        let allowed_unassigned = self.in_flight_terrane_vertices();
        if let Err(warning) = validate_topology(candidate_mesh.vertex_count(), candidate_mesh.faces.len(), &candidate_assignment, &allowed_unassigned) {
            self.topology_events.push(format!("t={:.1}My: re-tessellation rejected ({warning})", self.current_time_my));
            return;
        }

        let elevation = retessellation::transfer_field(&self.mesh, &self.elevation, &candidate_mesh);
        let amplified_elevation = retessellation::transfer_field(&self.mesh, &self.amplified_elevation, &candidate_mesh);
        let stress = retessellation::transfer_field(&self.mesh, &self.stress, &candidate_mesh);
        let temperature = retessellation::transfer_field(&self.mesh, &self.temperature, &candidate_mesh);
        let crust_age = retessellation::transfer_field(&self.mesh, &self.crust_age, &candidate_mesh);
        let erosion_rates = retessellation::transfer_field(&self.mesh, &self.erosion_rates, &candidate_mesh);
        let sediment_thickness = retessellation::transfer_field(&self.mesh, &self.sediment_thickness, &candidate_mesh);
        let orogeny_age_my = retessellation::transfer_field(&self.mesh, &self.orogeny_age_my, &candidate_mesh);

        self.mesh = candidate_mesh;
        self.assignment = candidate_assignment;
        self.elevation = elevation;
        self.amplified_elevation = amplified_elevation;
        self.stress = stress;
        self.temperature = temperature;
        self.crust_age = crust_age;
        self.erosion_rates = erosion_rates;
        self.sediment_thickness = sediment_thickness;
        self.orogeny_age_my = orogeny_age_my;
        self.orogeny_class = vec![OrogenyClass::None; self.mesh.vertex_count()];
        self.ridge_directions = Self::compute_ridge_directions(&self.mesh);
        self.velocities = self.recompute_velocities();
        self.boundaries = self.rebuild_boundaries_preserving_state();
        self.blend_cache.reset(self.mesh.vertex_count());
        self.amplification_data_serial += 1;

        self.topology_version += 1;
        self.retessellation_count += 1;
        self.topology_events.push(format!("t={:.1}My: re-tessellation #{}", self.current_time_my, self.retessellation_count));
    }

    // ── 3. Terranes ───────────────────────────────────────────────────

    /// Extract a contiguous patch of `carrier_plate_id`'s crust into a new
    /// terrane, rejecting patches below the 100 km² floor or that fail
    /// [`terrane::validate_extraction`] (spec §4.10, §7: validate before
    /// committing any mutation). Builds the patch-closure face surgery via
    /// [`terrane::patch_closure`] and runs the resulting candidate mesh and
    /// assignment through [`validate_topology`] before touching any live
    /// state, the same two-phase shape splits/merges/re-tessellation use.
    pub fn extract_terrane(&mut self, carrier_plate_id: u32, vertex_ids: Vec<u32>) -> EngineResult<u32> {
        let min_area = terrane::min_terrane_area_steradians(self.params.planet_radius_m);
        let fraction = vertex_ids.len() as f64 / self.mesh.vertex_count().max(1) as f64;
        let approx_area = fraction * 4.0 * std::f64::consts::PI;
        if approx_area < min_area {
            return Err(EngineError::TopologySurgery { reason: "terrane patch area below the 100 km^2 floor".to_string() });
        }

        if let Err(warning) = terrane::validate_extraction(&vertex_ids, &self.assignment, carrier_plate_id) {
            return Err(EngineError::TopologySurgery { reason: warning.to_string() });
        }

        let Some((extracted_triangles, patch_triangles)) = terrane::patch_closure(&self.mesh.faces, &vertex_ids) else {
            return Err(EngineError::TopologySurgery { reason: "terrane patch boundary is not a single simple cycle".to_string() });
        };

        let mut candidate_faces = self.mesh.faces.clone();
        terrane::remove_faces(&mut candidate_faces, &extracted_triangles);
        candidate_faces.extend_from_slice(&patch_triangles);

        let mut candidate_assignment = self.assignment.clone();
        for &v in &vertex_ids {
            candidate_assignment[v as usize] = voronoi::UNASSIGNED;
        }

        let mut allowed_unassigned = self.in_flight_terrane_vertices();
        allowed_unassigned.extend_from_slice(&vertex_ids);
        if let Err(warning) = validate_topology(self.mesh.vertex_count(), candidate_faces.len(), &candidate_assignment, &allowed_unassigned) {
            return Err(EngineError::TopologySurgery { reason: warning.to_string() });
        }

        let payload = terrane::extract(
            &self.mesh.vertices,
            &mut self.assignment,
            &self.elevation,
            &self.crust_age,
            carrier_plate_id,
            &vertex_ids,
            extracted_triangles,
            patch_triangles,
        );
        self.mesh = RenderMesh::from_vertices_and_faces(self.mesh.vertices.clone(), candidate_faces);
        self.blend_cache.reset(self.mesh.vertex_count());
        self.amplification_data_serial += 1;

        let terrane_id = self.next_terrane_id;
        self.next_terrane_id += 1;
        self.terranes.push(Terrane { terrane_id, carrier_plate_id, state: TerraneState::Transporting, payload });
        self.topology_events.push(format!("t={:.1}My: terrane {terrane_id} extracted from plate {carrier_plate_id}", self.current_time_my));
        Ok(terrane_id)
    }

    /// Splice a transporting terrane back onto `target_plate_id`. Validates
    /// that both the terrane and the target plate exist before mutating
    /// anything (spec §7).
    pub fn reattach_terrane(&mut self, terrane_id: u32, target_plate_id: u32) -> EngineResult<()> {
        let idx = self
            .terranes
            .iter()
            .position(|t| t.terrane_id == terrane_id)
            .ok_or_else(|| EngineError::TopologySurgery { reason: format!("no such terrane {terrane_id}") })?;
        if !self.plates.iter().any(|p| p.plate_id == target_plate_id) {
            return Err(EngineError::TopologySurgery { reason: format!("no such plate {target_plate_id}") });
        }

        self.reattach_terrane_at(idx, target_plate_id).map_err(|reason| EngineError::TopologySurgery { reason })
    }

    /// Splice terrane `idx` onto `target_plate_id`, removing it from
    /// `self.terranes`. Shared by the manual [`reattach_terrane`](Self::reattach_terrane)
    /// API and automatic collision-driven reattachment. Caller must already
    /// have validated both the index and the target plate. Builds the
    /// inverse of `extract_terrane`'s patch-closure surgery (dropping
    /// `patch_triangles`, restoring `extracted_triangles`) and validates the
    /// candidate mesh/assignment before committing, same as extraction.
    fn reattach_terrane_at(&mut self, idx: usize, target_plate_id: u32) -> Result<(), String> {
        if !self.plates.iter().any(|p| p.plate_id == target_plate_id) {
            return Err(format!("no such plate {target_plate_id}"));
        }
        let record = self.terranes[idx].clone();

        let mut candidate_faces = self.mesh.faces.clone();
        terrane::remove_faces(&mut candidate_faces, &record.payload.patch_triangles);
        candidate_faces.extend_from_slice(&record.payload.extracted_triangles);

        let mut candidate_assignment = self.assignment.clone();
        for &v in &record.payload.vertex_ids {
            candidate_assignment[v as usize] = target_plate_id;
        }

        let other_terrane_vertices: Vec<u32> =
            self.terranes.iter().enumerate().filter(|&(i, _)| i != idx).flat_map(|(_, t)| t.payload.vertex_ids.iter().copied()).collect();

        if let Err(warning) = validate_topology(self.mesh.vertex_count(), candidate_faces.len(), &candidate_assignment, &other_terrane_vertices) {
            return Err(warning.to_string());
        }

        self.terranes.remove(idx);
        terrane::reattach(&record.payload, &mut self.mesh.vertices, &mut self.assignment, &mut self.elevation, &mut self.crust_age, target_plate_id);
        self.mesh = RenderMesh::from_vertices_and_faces(self.mesh.vertices.clone(), candidate_faces);
        self.blend_cache.reset(self.mesh.vertex_count());
        self.amplification_data_serial += 1;

        self.topology_events
            .push(format!("t={:.1}My: terrane {} reattached to plate {target_plate_id}", self.current_time_my, record.terrane_id));
        Ok(())
    }

    /// Detect terranes that have drifted into a neighboring plate's
    /// territory and reattach them (spec §2, §4.10: "terrane
    /// collisions/reattach" runs as a fixed phase of every step, not only on
    /// manual API calls).
    fn process_terrane_collisions(&mut self) {
        if self.plates.is_empty() {
            return;
        }

        let mut collided: Vec<(usize, u32)> = Vec::new();
        for (idx, t) in self.terranes.iter_mut().enumerate() {
            if t.state != TerraneState::Transporting {
                continue;
            }
            let centroid = terrane::payload_centroid(&t.payload);
            let nearest = self.plates.iter().min_by(|a, b| {
                great_circle_distance_rad(centroid, a.centroid)
                    .partial_cmp(&great_circle_distance_rad(centroid, b.centroid))
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            if let Some(nearest) = nearest {
                if nearest.plate_id != t.carrier_plate_id {
                    t.state = TerraneState::Colliding;
                    collided.push((idx, nearest.plate_id));
                }
            }
        }

        // Reattach highest index first so a removal never invalidates an
        // index still queued for processing.
        collided.sort_by(|a, b| b.0.cmp(&a.0));
        for (idx, target_plate_id) in collided {
            let terrane_id = self.terranes[idx].terrane_id;
            if let Err(reason) = self.reattach_terrane_at(idx, target_plate_id) {
                self.topology_events.push(format!(
                    "t={:.1}My: terrane {terrane_id} collision reattachment to plate {target_plate_id} skipped ({reason})",
                    self.current_time_my
                ));
            }
        }
    }

    // ── 4. Undo/redo ──────────────────────────────────────────────────

    pub fn undo(&mut self) -> EngineResult<()> {
        if self.history.len() < 2 {
            return Err(EngineError::NoSnapshot);
        }
        let current = self.history.pop_back().expect("length checked above");
        self.redo_stack.push(current);
        let previous = self.history.back().expect("length checked above").clone();
        self.restore(previous);
        Ok(())
    }

    pub fn redo(&mut self) -> EngineResult<()> {
        let Some(next) = self.redo_stack.pop() else { return Err(EngineError::NoSnapshot) };
        self.restore(next.clone());
        self.history.push_back(next);
        Ok(())
    }

    fn push_history_snapshot(&mut self) {
        if self.history.len() >= HISTORY_CAPACITY {
            self.history.pop_front();
        }
        self.history.push_back(self.snapshot());
        self.redo_stack.clear();
    }

    fn snapshot(&self) -> SimulationSnapshot {
        SimulationSnapshot {
            plates: self.plates.clone(),
            boundaries: self.boundaries.clone(),
            hotspots: self.hotspots.clone(),
            terranes: self.terranes.clone(),
            mesh: self.mesh.clone(),
            assignment: self.assignment.clone(),
            velocities: self.velocities.clone(),
            stress: self.stress.clone(),
            temperature: self.temperature.clone(),
            elevation: self.elevation.clone(),
            amplified_elevation: self.amplified_elevation.clone(),
            erosion_rates: self.erosion_rates.clone(),
            sediment_thickness: self.sediment_thickness.clone(),
            crust_age: self.crust_age.clone(),
            ridge_directions: self.ridge_directions.clone(),
            orogeny_class: self.orogeny_class.clone(),
            orogeny_age_my: self.orogeny_age_my.clone(),
            current_time_my: self.current_time_my,
            step_count: self.step_count,
            next_plate_id: self.next_plate_id,
            next_terrane_id: self.next_terrane_id,
            topology_version: self.topology_version,
            surface_data_version: self.surface_data_version,
            amplification_data_serial: self.amplification_data_serial,
            retessellation_count: self.retessellation_count,
        }
    }

    fn restore(&mut self, snap: SimulationSnapshot) {
        self.plates = snap.plates;
        self.boundaries = snap.boundaries;
        self.hotspots = snap.hotspots;
        self.terranes = snap.terranes;
        self.mesh = snap.mesh;
        self.assignment = snap.assignment;
        self.velocities = snap.velocities;
        self.stress = snap.stress;
        self.temperature = snap.temperature;
        self.elevation = snap.elevation;
        self.amplified_elevation = snap.amplified_elevation;
        self.erosion_rates = snap.erosion_rates;
        self.sediment_thickness = snap.sediment_thickness;
        self.crust_age = snap.crust_age;
        self.ridge_directions = snap.ridge_directions;
        self.orogeny_class = snap.orogeny_class;
        self.orogeny_age_my = snap.orogeny_age_my;
        self.current_time_my = snap.current_time_my;
        self.step_count = snap.step_count;
        self.next_plate_id = snap.next_plate_id;
        self.next_terrane_id = snap.next_terrane_id;
        self.topology_version = snap.topology_version;
        self.surface_data_version = snap.surface_data_version;
        self.amplification_data_serial = snap.amplification_data_serial;
        self.retessellation_count = snap.retessellation_count;
        self.blend_cache.reset(self.mesh.vertex_count());
    }

    // ── 5. Internal helpers ───────────────────────────────────────────

    fn plate_index_map(&self) -> HashMap<u32, usize> {
        self.plates.iter().enumerate().map(|(i, p)| (p.plate_id, i)).collect()
    }

    fn crust_by_plate(&self) -> HashMap<u32, CrustType> {
        self.plates.iter().map(|p| (p.plate_id, p.crust_type)).collect()
    }

    /// Every vertex currently unassigned for the duration of an in-flight
    /// (Extracted/Transporting/Colliding) terrane — legitimately UNASSIGNED
    /// in `self.assignment` and exempt from [`validate_topology`]'s
    /// full-assignment check (spec §4.10).
    fn in_flight_terrane_vertices(&self) -> Vec<u32> {
        self.terranes.iter().flat_map(|t| t.payload.vertex_ids.iter().copied()).collect()
    }

    fn recompute_velocities(&self) -> Vec<Vec3> {
        let plate_map = self.plate_index_map();
        self.mesh
            .vertices
            .iter()
            .zip(self.assignment.iter())
            .map(|(&pos, &pid)| plate_map.get(&pid).map(|&idx| self.plates[idx].velocity_at(pos, self.params.planet_radius_m)).unwrap_or(Vec3::new(0.0, 0.0, 0.0)))
            .collect()
    }

    fn generate_baseline_elevation(&self) -> Vec<f64> {
        let crust_by_plate = self.crust_by_plate();
        self.assignment
            .iter()
            .map(|&pid| match crust_by_plate.get(&pid) {
                Some(CrustType::Oceanic) => OCEANIC_RIDGE_DEPTH_M,
                _ => CONTINENTAL_BASELINE_M,
            })
            .collect()
    }

    fn compute_ridge_directions(mesh: &RenderMesh) -> Vec<Vec3> {
        let pole = Vec3::new(0.0, 0.0, 1.0);
        let fallback_axis = Vec3::new(1.0, 0.0, 0.0);
        mesh.vertices
            .iter()
            .map(|&v| {
                let t = pole.tangential_component(v);
                if t.length() > 1e-9 {
                    t.normalize()
                } else {
                    fallback_axis.tangential_component(v).normalize()
                }
            })
            .collect()
    }

    fn recompute_stress_and_thermal(&mut self) {
        let boundary_refs: Vec<&PlateBoundary> = self.boundaries.values().collect();
        let mut vertex_stress = stress_thermal::interpolate_stress_to_vertices(&self.mesh, &boundary_refs);
        if self.params.enable_hotspots {
            for (v, value) in vertex_stress.iter_mut().enumerate() {
                *value = (*value + hotspot::hotspot_stress_contribution(&self.hotspots, self.mesh.vertices[v])).min(100.0);
            }
        }
        self.temperature = stress_thermal::compute_thermal_field(&self.mesh, &boundary_refs, &self.hotspots);
        self.stress = vertex_stress;
    }

    fn rebuild_boundaries_fresh(&self) -> BTreeMap<BoundaryKey, PlateBoundary> {
        let mut raw = boundary::build_boundaries(&self.mesh, &self.assignment);
        let plate_map = self.plate_index_map();
        for b in raw.values_mut() {
            if let (Some(&ia), Some(&ib)) = (plate_map.get(&b.key.0), plate_map.get(&b.key.1)) {
                boundary::classify_boundary(b, &self.plates[ia], &self.plates[ib], &self.mesh, self.params.planet_radius_m);
            }
        }
        raw
    }

    /// Rebuild the boundary graph from the current mesh/assignment, carrying
    /// forward the type/state/stress/duration/rift-width of any boundary
    /// key that also existed before the rebuild.
    fn rebuild_boundaries_preserving_state(&self) -> BTreeMap<BoundaryKey, PlateBoundary> {
        let mut fresh = self.rebuild_boundaries_fresh();
        for (key, b) in fresh.iter_mut() {
            if let Some(old) = self.boundaries.get(key) {
                b.state = old.state;
                b.accumulated_stress_mpa = old.accumulated_stress_mpa;
                b.rift_width_meters = old.rift_width_meters;
                b.active_duration_my = old.active_duration_my;
                b.divergent_duration_my = old.divergent_duration_my;
            }
        }
        fresh
    }

    fn nearest_boundary_per_vertex(&self, boundaries: &[PlateBoundary]) -> (Vec<Option<usize>>, Vec<f64>) {
        let midpoints: Vec<Option<Vec3>> =
            boundaries.iter().map(|b| b.edges.first().map(|&(v0, v1)| self.mesh.vertices[v0 as usize].add(self.mesh.vertices[v1 as usize]).normalize())).collect();

        let mut nearest_idx = vec![None; self.mesh.vertex_count()];
        let mut nearest_dist = vec![f64::MAX; self.mesh.vertex_count()];
        for v in 0..self.mesh.vertex_count() {
            let pos = self.mesh.vertices[v];
            for (i, mid) in midpoints.iter().enumerate() {
                let Some(mid) = mid else { continue };
                let d = great_circle_distance_rad(pos, *mid);
                if d < nearest_dist[v] {
                    nearest_dist[v] = d;
                    nearest_idx[v] = Some(i);
                }
            }
        }
        (nearest_idx, nearest_dist)
    }

    // ── 6. Accessors ──────────────────────────────────────────────────

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn plates(&self) -> &[TectonicPlate] {
        &self.plates
    }

    pub fn boundaries(&self) -> &BTreeMap<BoundaryKey, PlateBoundary> {
        &self.boundaries
    }

    pub fn hotspots(&self) -> &[Hotspot] {
        &self.hotspots
    }

    pub fn terranes(&self) -> &[Terrane] {
        &self.terranes
    }

    pub fn mesh(&self) -> &RenderMesh {
        &self.mesh
    }

    pub fn vertex_plate_assignments(&self) -> &[u32] {
        &self.assignment
    }

    pub fn vertex_velocities(&self) -> &[Vec3] {
        &self.velocities
    }

    pub fn vertex_stress(&self) -> &[f64] {
        &self.stress
    }

    pub fn vertex_temperature(&self) -> &[f64] {
        &self.temperature
    }

    pub fn vertex_elevation(&self) -> &[f64] {
        &self.elevation
    }

    pub fn vertex_amplified_elevation(&self) -> &[f64] {
        &self.amplified_elevation
    }

    pub fn vertex_erosion_rates(&self) -> &[f64] {
        &self.erosion_rates
    }

    pub fn vertex_sediment_thickness(&self) -> &[f64] {
        &self.sediment_thickness
    }

    pub fn vertex_crust_age(&self) -> &[f64] {
        &self.crust_age
    }

    pub fn vertex_ridge_directions(&self) -> &[Vec3] {
        &self.ridge_directions
    }

    pub fn vertex_orogeny_class(&self) -> &[OrogenyClass] {
        &self.orogeny_class
    }

    pub fn current_time_my(&self) -> f64 {
        self.current_time_my
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    pub fn topology_version(&self) -> u64 {
        self.topology_version
    }

    pub fn surface_data_version(&self) -> u64 {
        self.surface_data_version
    }

    pub fn amplification_data_serial(&self) -> u64 {
        self.amplification_data_serial
    }

    pub fn retessellation_count(&self) -> u64 {
        self.retessellation_count
    }

    pub fn last_step_time_ms(&self) -> u64 {
        self.last_step_time_ms
    }

    pub fn topology_events(&self) -> &[String] {
        &self.topology_events
    }

    pub fn exemplar_load_warnings(&self) -> &[String] {
        &self.exemplar_load_warnings
    }
}
