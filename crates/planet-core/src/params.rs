//! Simulation parameters: the engine's entire external configuration
//! surface (spec §6), serializable for CLI/tool use and carrying a
//! `Default` impl for the documented defaults.

use crate::error::EngineWarning;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParameters {
    // Topology
    pub seed: u64,
    pub subdivision_level: u32,
    pub render_subdivision_level: u32,
    pub lloyd_iterations: u32,
    pub enable_voronoi_warping: bool,
    pub voronoi_warping_amplitude: f64,
    pub voronoi_warping_frequency: f64,

    // Geometry
    pub planet_radius_m: f64,
    pub sea_level_m: f64,

    // Topology changes
    pub enable_plate_topology_changes: bool,
    pub split_velocity_threshold_rad_per_my: f64,
    pub split_duration_threshold_my: f64,
    pub merge_stress_threshold_mpa: f64,
    pub enable_dynamic_retessellation: bool,
    pub retessellation_threshold_degrees: f64,

    // Rifts
    pub enable_rift_propagation: bool,
    pub rift_progression_rate: f64,
    pub rift_split_threshold_meters: f64,

    // Hotspots
    pub enable_hotspots: bool,
    pub major_hotspot_count: u32,
    pub minor_hotspot_count: u32,
    pub major_hotspot_thermal_output: f64,
    pub minor_hotspot_thermal_output: f64,
    pub hotspot_drift_speed: f64,

    // Surface
    pub enable_continental_erosion: bool,
    pub erosion_constant: f64,
    pub enable_sediment_transport: bool,
    pub sediment_diffusion_rate: f64,
    pub enable_oceanic_dampening: bool,
    pub oceanic_dampening_constant: f64,
    pub oceanic_age_subsidence_coeff: f64,

    // Amplification
    pub enable_oceanic_amplification: bool,
    pub oceanic_fault_amplitude: f64,
    pub oceanic_fault_frequency: f64,
    pub oceanic_age_falloff: f64,
    pub enable_continental_amplification: bool,
    pub min_amplification_lod: u32,

    // Visualization-only
    pub enable_heightmap_visualization: bool,

    // Testing/tooling overrides (spec §6: "take precedence when set")
    pub forced_exemplar_id: Option<String>,
    pub disable_random_uv_offset: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            seed: 42,
            subdivision_level: 0,
            render_subdivision_level: 0,
            lloyd_iterations: 0,
            enable_voronoi_warping: false,
            voronoi_warping_amplitude: 0.0,
            voronoi_warping_frequency: 4.0,

            planet_radius_m: 6_371_000.0,
            sea_level_m: 0.0,

            enable_plate_topology_changes: false,
            split_velocity_threshold_rad_per_my: 0.02,
            split_duration_threshold_my: 10.0,
            merge_stress_threshold_mpa: 80.0,
            enable_dynamic_retessellation: false,
            retessellation_threshold_degrees: 30.0,

            enable_rift_propagation: false,
            rift_progression_rate: 50_000.0,
            rift_split_threshold_meters: 500_000.0,

            enable_hotspots: false,
            major_hotspot_count: 3,
            minor_hotspot_count: 5,
            major_hotspot_thermal_output: 1.0,
            minor_hotspot_thermal_output: 0.5,
            hotspot_drift_speed: 0.01,

            enable_continental_erosion: true,
            erosion_constant: 1.0e-6,
            enable_sediment_transport: true,
            sediment_diffusion_rate: 0.1,
            enable_oceanic_dampening: true,
            oceanic_dampening_constant: 0.1,
            oceanic_age_subsidence_coeff: 350.0,

            enable_oceanic_amplification: false,
            oceanic_fault_amplitude: 1.0,
            oceanic_fault_frequency: 8.0,
            oceanic_age_falloff: 0.02,
            enable_continental_amplification: false,
            min_amplification_lod: 5,

            enable_heightmap_visualization: false,

            forced_exemplar_id: None,
            disable_random_uv_offset: false,
        }
    }
}

impl SimulationParameters {
    /// Clamp out-of-range values to their documented bounds. Never refuses;
    /// every clamp is reported as an [`EngineWarning`].
    pub fn validate(&mut self) -> Vec<EngineWarning> {
        let mut warnings = Vec::new();
        let mut clamp = |field: &'static str, value: &mut f64, lo: f64, hi: f64, warnings: &mut Vec<EngineWarning>| {
            let clamped = value.clamp(lo, hi);
            if clamped != *value {
                warnings.push(EngineWarning::ParameterClamped { field, requested: *value, clamped });
                *value = clamped;
            }
        };

        clamp("planet_radius_m", &mut self.planet_radius_m, 1.0e4, 1.0e7, &mut warnings);
        clamp("voronoi_warping_amplitude", &mut self.voronoi_warping_amplitude, 0.0, 1.0, &mut warnings);

        if self.subdivision_level > 3 {
            warnings.push(EngineWarning::ParameterClamped {
                field: "subdivision_level",
                requested: self.subdivision_level as f64,
                clamped: 3.0,
            });
            self.subdivision_level = 3;
        }
        if self.render_subdivision_level > 8 {
            warnings.push(EngineWarning::ParameterClamped {
                field: "render_subdivision_level",
                requested: self.render_subdivision_level as f64,
                clamped: 8.0,
            });
            self.render_subdivision_level = 8;
        }

        warnings
    }
}
