//! Exemplar library: JSON metadata plus decoded 16-bit PNG heightfields used
//! by continental amplification. Loaded once on first use and treated as
//! read-only shared data thereafter (spec §5).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExemplarRegion {
    Himalayan,
    Andean,
    Ancient,
}

impl ExemplarRegion {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "Himalayan" => Some(Self::Himalayan),
            "Andean" => Some(Self::Andean),
            "Ancient" => Some(Self::Ancient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ExemplarLibraryFile {
    exemplars: Vec<ExemplarEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExemplarEntry {
    id: String,
    #[allow(dead_code)]
    name: String,
    region: String,
    #[allow(dead_code)]
    feature: String,
    png16_path: String,
    elevation_min_m: f64,
    elevation_max_m: f64,
    elevation_mean_m: f64,
    #[allow(dead_code)]
    elevation_stddev_m: f64,
    resolution: ExemplarResolution,
    bounds: Option<ExemplarBounds>,
}

#[derive(Debug, Clone, Deserialize)]
struct ExemplarResolution {
    width_px: u32,
    height_px: u32,
}

/// Geographic bounds (degrees), used to compute the UV for a forced-exemplar
/// override directly from the vertex's lon/lat rather than the fold-rotated
/// local UV (spec §4.11 step 3, "forced exemplar override").
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct ExemplarBounds {
    pub west_lon_deg: f64,
    pub east_lon_deg: f64,
    pub south_lat_deg: f64,
    pub north_lat_deg: f64,
}

/// A single exemplar heightfield, metadata plus decoded 16-bit samples.
#[derive(Debug, Clone)]
pub struct Exemplar {
    pub id: String,
    pub region: ExemplarRegion,
    pub elevation_min_m: f64,
    pub elevation_max_m: f64,
    pub elevation_mean_m: f64,
    pub width_px: u32,
    pub height_px: u32,
    pub bounds: Option<ExemplarBounds>,
    /// Row-major, `width_px * height_px` raw 16-bit samples.
    pub height_data: Vec<u16>,
}

impl Exemplar {
    /// Decode a raw 16-bit sample to meters: `min + (v/65535)*(max-min)`.
    pub fn decode(&self, raw: u16) -> f64 {
        self.elevation_min_m + (raw as f64 / 65535.0) * (self.elevation_max_m - self.elevation_min_m)
    }

    /// Bilinear-sample the heightfield at `(u, v)` in `[0, 1]`, with UVs
    /// clamped to a small epsilon margin to avoid edge artifacts (spec
    /// §4.11 step 4: "clamped UVs (ε wrap margin)").
    pub fn sample_bilinear(&self, u: f64, v: f64) -> f64 {
        const EPS: f64 = 1.0e-6;
        if self.height_data.is_empty() || self.width_px == 0 || self.height_px == 0 {
            return 0.0;
        }
        let u = u.clamp(EPS, 1.0 - EPS);
        let v = v.clamp(EPS, 1.0 - EPS);

        let fx = u * (self.width_px - 1).max(1) as f64;
        let fy = v * (self.height_px - 1).max(1) as f64;
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.width_px as usize - 1);
        let y1 = (y0 + 1).min(self.height_px as usize - 1);
        let tx = fx - x0 as f64;
        let ty = fy - y0 as f64;

        let at = |x: usize, y: usize| -> f64 { self.decode(self.height_data[y * self.width_px as usize + x]) };

        let top = at(x0, y0) * (1.0 - tx) + at(x1, y0) * tx;
        let bottom = at(x0, y1) * (1.0 - tx) + at(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

/// A loaded exemplar library: read-only shared data, indexed by id and by
/// region for the terrain-type matching pass (spec §4.11 step 2).
#[derive(Debug, Clone, Default)]
pub struct ExemplarLibrary {
    exemplars: Vec<Exemplar>,
    by_id: HashMap<String, usize>,
}

impl ExemplarLibrary {
    #[cfg(test)]
    pub(crate) fn from_exemplars(exemplars: Vec<Exemplar>) -> Self {
        let by_id = exemplars.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();
        Self { exemplars, by_id }
    }

    pub fn is_empty(&self) -> bool {
        self.exemplars.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&Exemplar> {
        self.by_id.get(id).map(|&i| &self.exemplars[i])
    }

    pub fn matching_region(&self, region: ExemplarRegion) -> Vec<&Exemplar> {
        self.exemplars.iter().filter(|e| e.region == region).collect()
    }

    /// Load `ExemplarLibrary.json` plus every listed 16-bit PNG heightfield
    /// from `dir`. An exemplar whose PNG fails to decode is skipped with a
    /// warning rather than aborting the whole load (spec §7: "fail
    /// continental amplification with a single warning per exemplar").
    pub fn load(dir: &Path) -> io::Result<(Self, Vec<String>)> {
        let manifest_path = dir.join("ExemplarLibrary.json");
        let manifest_text = std::fs::read_to_string(&manifest_path)?;
        let manifest: ExemplarLibraryFile = serde_json::from_str(&manifest_text)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut exemplars = Vec::with_capacity(manifest.exemplars.len());
        let mut warnings = Vec::new();

        for entry in manifest.exemplars {
            let Some(region) = ExemplarRegion::parse(&entry.region) else {
                warnings.push(format!("{}: unknown region '{}'", entry.id, entry.region));
                continue;
            };
            match decode_png16(&dir.join(&entry.png16_path)) {
                Ok((width, height, data)) => {
                    exemplars.push(Exemplar {
                        id: entry.id,
                        region,
                        elevation_min_m: entry.elevation_min_m,
                        elevation_max_m: entry.elevation_max_m,
                        elevation_mean_m: entry.elevation_mean_m,
                        width_px: width,
                        height_px: height,
                        bounds: entry.bounds.map(|b| ExemplarBounds {
                            west_lon_deg: b.west_lon_deg,
                            east_lon_deg: b.east_lon_deg,
                            south_lat_deg: b.south_lat_deg,
                            north_lat_deg: b.north_lat_deg,
                        }),
                        height_data: data,
                    });
                    let _ = (entry.resolution.width_px, entry.resolution.height_px);
                }
                Err(e) => warnings.push(format!("{}: {e}", entry.id)),
            }
        }

        let by_id = exemplars.iter().enumerate().map(|(i, e)| (e.id.clone(), i)).collect();
        Ok((Self { exemplars, by_id }, warnings))
    }
}

fn decode_png16(path: &Path) -> io::Result<(u32, u32, Vec<u16>)> {
    let file = std::fs::File::open(path)?;
    let decoder = png::Decoder::new(file);
    let mut reader = decoder.read_info().map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let mut buf = vec![0u8; reader.output_buffer_size()];
    let info = reader.next_frame(&mut buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let width = info.width;
    let height = info.height;

    let samples: Vec<u16> = match info.bit_depth {
        png::BitDepth::Sixteen => buf[..info.buffer_size()]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect(),
        png::BitDepth::Eight => buf[..info.buffer_size()].iter().map(|&b| (b as u16) << 8).collect(),
        other => return Err(io::Error::new(io::ErrorKind::InvalidData, format!("unsupported bit depth {other:?}"))),
    };

    Ok((width, height, samples))
}
