//! `planet-core`: the deterministic tectonic-plus-surface-process simulation
//! engine. No I/O beyond reading an exemplar library and writing CSV; no
//! global state — callers own a [`PlanetEngine`] value and drive it through
//! its narrow interface (`reset`, `advance_steps`, `set_render_subdivision_level`,
//! `undo`/`redo`, `snapshot`).

pub mod amplification;
pub mod boundary;
pub mod engine;
pub mod error;
pub mod export;
pub mod hotspot;
pub mod icosphere;
pub mod kdtree;
pub mod mesh;
pub mod params;
pub mod plate;
pub mod sampler;
pub mod sphere;
pub mod stress_thermal;
pub mod surface;
pub mod topology;
pub mod voronoi;

pub use engine::{PlanetEngine, SimulationSnapshot};
pub use error::{EngineError, EngineResult, EngineWarning};
pub use params::SimulationParameters;
