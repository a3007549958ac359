//! Versioned CSV export (spec §4.14): plate table, boundary table, hotspot
//! table, topology-event log, and a bounded per-vertex table, all in one
//! file behind a schema-version header comment so older readers can ignore
//! columns added by later minor bumps.
//!
//! No `csv` crate appears anywhere in the example corpus this repo is
//! grounded on, so this writes CSV by hand with `std::fmt::Write`, matching
//! spec §4.14's own description of a hand-rolled versioned tabular export.

use std::fmt::Write as _;

use crate::boundary::{BoundaryState, BoundaryType, PlateBoundary};
use crate::engine::{OrogenyClass, PlanetEngine};
use crate::hotspot::{Hotspot, HotspotKind};
use crate::plate::{CrustType, TectonicPlate};

/// Bumped on any breaking change to column meaning or ordering. Readers are
/// expected to tolerate new trailing columns within the same major version.
pub const SCHEMA_VERSION: &str = "1.0";

/// Per-vertex rows are capped at this many to keep exports bounded at high
/// render LODs (spec §4.14).
pub const MAX_VERTEX_ROWS: usize = 1000;

fn crust_type_label(crust_type: CrustType) -> &'static str {
    match crust_type {
        CrustType::Oceanic => "Oceanic",
        CrustType::Continental => "Continental",
    }
}

fn boundary_type_label(boundary_type: BoundaryType) -> &'static str {
    match boundary_type {
        BoundaryType::Divergent => "Divergent",
        BoundaryType::Convergent => "Convergent",
        BoundaryType::Transform => "Transform",
    }
}

fn boundary_state_label(state: BoundaryState) -> &'static str {
    match state {
        BoundaryState::Nascent => "Nascent",
        BoundaryState::Active => "Active",
        BoundaryState::Dormant => "Dormant",
        BoundaryState::Rifting => "Rifting",
    }
}

fn hotspot_kind_label(kind: HotspotKind) -> &'static str {
    match kind {
        HotspotKind::Major => "Major",
        HotspotKind::Minor => "Minor",
    }
}

fn orogeny_class_label(class: OrogenyClass) -> &'static str {
    match class {
        OrogenyClass::None => "None",
        OrogenyClass::Nascent => "Nascent",
        OrogenyClass::Active => "Active",
        OrogenyClass::Dormant => "Dormant",
    }
}

fn write_plate_table(out: &mut String, plates: &[TectonicPlate]) {
    writeln!(out, "# table: plates").unwrap();
    writeln!(out, "plate_id,crust_type,centroid_x,centroid_y,centroid_z,euler_axis_x,euler_axis_y,euler_axis_z,angular_velocity_rad_per_my,crust_thickness_m").unwrap();
    for plate in plates {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            plate.plate_id,
            crust_type_label(plate.crust_type),
            plate.centroid.x,
            plate.centroid.y,
            plate.centroid.z,
            plate.euler_pole_axis.x,
            plate.euler_pole_axis.y,
            plate.euler_pole_axis.z,
            plate.angular_velocity_rad_per_my,
            plate.crust_thickness_m,
        )
        .unwrap();
    }
}

fn write_boundary_table(out: &mut String, boundaries: &std::collections::BTreeMap<(u32, u32), PlateBoundary>) {
    writeln!(out, "# table: boundaries").unwrap();
    writeln!(out, "plate_a,plate_b,boundary_type,state,active_duration_my,rift_width_meters,relative_velocity_rad_per_my,accumulated_stress_mpa").unwrap();
    for boundary in boundaries.values() {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{}",
            boundary.key.0,
            boundary.key.1,
            boundary_type_label(boundary.boundary_type),
            boundary_state_label(boundary.state),
            boundary.active_duration_my,
            boundary.rift_width_meters,
            boundary.relative_velocity_rad_per_my,
            boundary.accumulated_stress_mpa,
        )
        .unwrap();
    }
}

fn write_hotspot_table(out: &mut String, hotspots: &[Hotspot]) {
    writeln!(out, "# table: hotspots").unwrap();
    writeln!(out, "hotspot_id,kind,position_x,position_y,position_z,thermal_output,influence_radius_rad").unwrap();
    for hotspot in hotspots {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            hotspot.hotspot_id,
            hotspot_kind_label(hotspot.kind),
            hotspot.position.x,
            hotspot.position.y,
            hotspot.position.z,
            hotspot.thermal_output,
            hotspot.influence_radius_rad,
        )
        .unwrap();
    }
}

fn write_topology_event_log(out: &mut String, events: &[String]) {
    writeln!(out, "# table: topology_events").unwrap();
    writeln!(out, "sequence,event").unwrap();
    for (i, event) in events.iter().enumerate() {
        // Events are free-text log lines (spec §4.10's "logged verbatim for
        // determinism audits"); escape embedded commas/quotes minimally.
        let escaped = if event.contains(',') || event.contains('"') {
            format!("\"{}\"", event.replace('"', "\"\""))
        } else {
            event.clone()
        };
        writeln!(out, "{i},{escaped}").unwrap();
    }
}

#[allow(clippy::too_many_arguments)]
fn write_vertex_table(
    out: &mut String,
    mesh_vertices: &[crate::sphere::Vec3],
    assignment: &[u32],
    velocities: &[crate::sphere::Vec3],
    stress: &[f64],
    elevation: &[f64],
    temperature: &[f64],
    orogeny_class: &[OrogenyClass],
) {
    writeln!(out, "# table: vertices (capped at {MAX_VERTEX_ROWS} rows)").unwrap();
    writeln!(out, "vertex_index,position_x,position_y,position_z,plate_id,velocity_x,velocity_y,velocity_z,stress_mpa,elevation_m,temperature_k,orogeny_class").unwrap();

    let row_count = mesh_vertices.len().min(MAX_VERTEX_ROWS);
    for v in 0..row_count {
        let pos = mesh_vertices[v];
        let vel = velocities.get(v).copied().unwrap_or(crate::sphere::Vec3::new(0.0, 0.0, 0.0));
        let plate_id = assignment.get(v).copied().unwrap_or(crate::voronoi::UNASSIGNED);
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{},{},{}",
            v,
            pos.x,
            pos.y,
            pos.z,
            plate_id,
            vel.x,
            vel.y,
            vel.z,
            stress.get(v).copied().unwrap_or(0.0),
            elevation.get(v).copied().unwrap_or(0.0),
            temperature.get(v).copied().unwrap_or(0.0),
            orogeny_class.get(v).map(|c| orogeny_class_label(*c)).unwrap_or("None"),
        )
        .unwrap();
    }
}

/// Render a complete CSV export of the engine's current state as a single
/// string: a schema-version header comment followed by five `# table: ...`
/// sections (spec §4.14).
pub fn export_csv(engine: &PlanetEngine) -> String {
    let mut out = String::new();
    writeln!(out, "# planet-core CSV export, schema v{SCHEMA_VERSION}").unwrap();
    writeln!(out, "# step={} time_my={}", engine.step_count(), engine.current_time_my()).unwrap();

    write_plate_table(&mut out, engine.plates());
    write_boundary_table(&mut out, engine.boundaries());
    write_hotspot_table(&mut out, engine.hotspots());
    write_topology_event_log(&mut out, engine.topology_events());
    write_vertex_table(
        &mut out,
        &engine.mesh().vertices,
        engine.vertex_plate_assignments(),
        engine.vertex_velocities(),
        engine.vertex_stress(),
        engine.vertex_elevation(),
        engine.vertex_temperature(),
        engine.vertex_orogeny_class(),
    );

    out
}

/// Write a CSV export to `path`, timestamped into the filename by the
/// caller (spec §6: "Persisted outputs: CSV files ... timestamped under an
/// output directory" — the timestamp itself is a host/tooling concern, kept
/// out of this pure-export function).
pub fn export_csv_to_file(engine: &PlanetEngine, path: &std::path::Path) -> std::io::Result<()> {
    std::fs::write(path, export_csv(engine))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SimulationParameters;

    #[test]
    fn export_contains_every_spec_table() {
        let params = SimulationParameters { seed: 12345, subdivision_level: 0, render_subdivision_level: 0, ..Default::default() };
        let engine = PlanetEngine::new(params);
        let csv = export_csv(&engine);

        assert!(csv.starts_with("# planet-core CSV export, schema v"));
        assert!(csv.contains("# table: plates"));
        assert!(csv.contains("# table: boundaries"));
        assert!(csv.contains("# table: hotspots"));
        assert!(csv.contains("# table: topology_events"));
        assert!(csv.contains("# table: vertices"));
    }

    #[test]
    fn plate_table_has_one_row_per_plate() {
        let params = SimulationParameters { seed: 12345, subdivision_level: 0, render_subdivision_level: 0, ..Default::default() };
        let engine = PlanetEngine::new(params);
        let csv = export_csv(&engine);

        let plate_section = csv.split("# table: boundaries").next().unwrap();
        let data_rows = plate_section.lines().filter(|l| !l.starts_with('#') && !l.starts_with("plate_id")).count();
        assert_eq!(data_rows, engine.plates().len());
    }

    #[test]
    fn vertex_table_is_capped() {
        let params = SimulationParameters { seed: 7, subdivision_level: 0, render_subdivision_level: 4, ..Default::default() };
        let engine = PlanetEngine::new(params);
        assert!(engine.mesh().vertex_count() > MAX_VERTEX_ROWS);

        let csv = export_csv(&engine);
        let vertex_section = csv.split("# table: vertices").nth(1).unwrap();
        let data_rows = vertex_section.lines().filter(|l| !l.starts_with('#') && !l.starts_with("vertex_index")).count();
        assert_eq!(data_rows, MAX_VERTEX_ROWS);
    }

    #[test]
    fn topology_event_with_embedded_comma_is_quoted() {
        let mut out = String::new();
        write_topology_event_log(&mut out, &["split: plate 3 -> 3,9".to_string()]);
        assert!(out.contains("\"split: plate 3 -> 3,9\""));
    }
}
