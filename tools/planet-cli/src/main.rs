//! Command-line driver for `planet-core`: run a deterministic simulation
//! from a JSON parameter file, advance it a given number of steps, and emit
//! a CSV export or a sampled heightmap PNG-free text dump.
//!
//! Not part of the simulation engine itself — a thin façade over
//! [`planet_core::PlanetEngine`], in the same spirit as the teacher's
//! single-purpose `tools/*` binaries.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use planet_core::export::export_csv_to_file;
use planet_core::sampler::{ElevationSource, HeightmapSampler};
use planet_core::{PlanetEngine, SimulationParameters};

#[derive(Parser, Debug)]
#[command(name = "planet-cli", about = "Drive a planet-core simulation from the command line")]
struct Cli {
    /// JSON file of `SimulationParameters`; defaults are used if omitted.
    #[arg(long)]
    params: Option<PathBuf>,

    /// Directory containing `ExemplarLibrary.json` for continental
    /// amplification. Skipped (continental vertices stay at baseline) if
    /// not given or if loading fails.
    #[arg(long)]
    exemplar_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Advance the simulation N steps and print a one-line summary.
    Advance {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Advance the simulation N steps, then write a CSV export.
    Export {
        #[arg(long, default_value_t = 0)]
        steps: u32,
        #[arg(long)]
        out: PathBuf,
    },
    /// Advance the simulation N steps, then sample elevation at one
    /// equirectangular UV coordinate.
    Sample {
        #[arg(long, default_value_t = 0)]
        steps: u32,
        #[arg(long)]
        u: f64,
        #[arg(long)]
        v: f64,
        /// Sample the Stage-B amplified field instead of baseline.
        #[arg(long)]
        amplified: bool,
    },
}

fn load_params(path: Option<&PathBuf>) -> Result<SimulationParameters> {
    match path {
        Some(p) => {
            let text = fs::read_to_string(p).with_context(|| format!("reading parameters from {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing parameters from {}", p.display()))
        }
        None => Ok(SimulationParameters::default()),
    }
}

fn build_engine(cli: &Cli) -> Result<PlanetEngine> {
    let params = load_params(cli.params.as_ref())?;
    let mut engine = PlanetEngine::new(params);

    if let Some(dir) = &cli.exemplar_dir {
        match engine.load_exemplar_library(dir) {
            Ok(loaded) => eprintln!("loaded {} exemplars from {}", loaded.len(), dir.display()),
            Err(err) => eprintln!("warning: exemplar library load failed ({err}); continental vertices stay at baseline"),
        }
    }

    Ok(engine)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut engine = build_engine(&cli)?;

    match &cli.command {
        Command::Advance { steps } => {
            engine.advance_steps(*steps)?;
            println!(
                "step={} time_my={} plates={} boundaries={} topology_version={} surface_data_version={}",
                engine.step_count(),
                engine.current_time_my(),
                engine.plates().len(),
                engine.boundaries().len(),
                engine.topology_version(),
                engine.surface_data_version(),
            );
        }
        Command::Export { steps, out } => {
            if *steps > 0 {
                engine.advance_steps(*steps)?;
            }
            export_csv_to_file(&engine, out).with_context(|| format!("writing CSV export to {}", out.display()))?;
            println!("wrote CSV export to {}", out.display());
        }
        Command::Sample { steps, u, v, amplified } => {
            if *steps > 0 {
                engine.advance_steps(*steps)?;
            }
            let source = if *amplified { ElevationSource::Amplified } else { ElevationSource::Baseline };
            let sampler = HeightmapSampler::new(engine.mesh(), engine.vertex_elevation(), engine.vertex_amplified_elevation(), source);
            let (elevation_m, info) = sampler.sample(*u, *v);
            println!("elevation_m={elevation_m} hit={} triangle={:?} steps={}", info.hit, info.triangle_index, info.steps);
        }
    }

    Ok(())
}
