//! Reading a folder of converted products back: `<stem>.png` paired with
//! `<stem>.json`, and the viewing geometry recorded in the metadata.

use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use image::GrayImage;
use log::debug;
use serde_json::Value;

/// One converted product: the path of its PNG and its parsed metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSample {
    pub image_path: PathBuf,
    pub metadata: Value,
}

/// Collect every `<stem>.json` in `dir` that has a matching `<stem>.png`.
///
/// Metadata without an image is ignored. Samples are sorted by path so the
/// order does not depend on the directory listing.
pub fn load_dataset(dir: &Path) -> Result<Vec<DataSample>> {
    let entries = fs::read_dir(dir).with_context(|| format!("reading {}", dir.display()))?;

    let mut samples = Vec::new();
    for entry in entries {
        let path = entry.with_context(|| format!("reading {}", dir.display()))?.path();
        if !path.extension().is_some_and(|ext| ext == "json") {
            continue;
        }
        let image_path = path.with_extension("png");
        if !image_path.is_file() {
            debug!("{}: no matching PNG", path.display());
            continue;
        }
        let text =
            fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        let metadata =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        samples.push(DataSample {
            image_path,
            metadata,
        });
    }

    samples.sort_by(|a, b| a.image_path.cmp(&b.image_path));
    Ok(samples)
}

impl DataSample {
    pub fn image(&self) -> Result<GrayImage> {
        let img = image::open(&self.image_path)
            .with_context(|| format!("opening {}", self.image_path.display()))?;
        Ok(img.to_luma8())
    }

    pub fn product_id(&self) -> Option<&str> {
        self.metadata.get("PRODUCT_ID").and_then(Value::as_str)
    }

    /// Look up `key` at the top level or inside any nested block.
    fn find(&self, key: &str) -> Option<&Value> {
        fn search<'a>(map: &'a Value, key: &str) -> Option<&'a Value> {
            let object = map.as_object()?;
            object
                .get(key)
                .or_else(|| object.values().find_map(|v| search(v, key)))
        }
        search(&self.metadata, key)
    }

    /// A number stored as `[value, unit]`, as a bare number or as numeric text.
    pub fn meta_float(&self, key: &str) -> Result<f64> {
        let value = self
            .find(key)
            .ok_or_else(|| anyhow!("{key} missing from {}", self.image_path.display()))?;
        number(value).ok_or_else(|| anyhow!("{key} is not a number: {value}"))
    }

    /// A three-element list of numbers, each in any form [`meta_float`](Self::meta_float) accepts.
    pub fn meta_vector(&self, key: &str) -> Result<[f64; 3]> {
        let value = self
            .find(key)
            .ok_or_else(|| anyhow!("{key} missing from {}", self.image_path.display()))?;
        let items = value.as_array().map(Vec::as_slice).unwrap_or_default();
        let Ok([x, y, z]) = <&[Value; 3]>::try_from(items) else {
            bail!("{key} is not a 3-vector: {value}");
        };
        match (number(x), number(y), number(z)) {
            (Some(x), Some(y), Some(z)) => Ok([x, y, z]),
            _ => bail!("{key} is not a 3-vector: {value}"),
        }
    }
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Array(pair) if pair.len() == 2 && pair[1].is_string() => pair[0].as_f64(),
        _ => None,
    }
}

/// Camera pointing recorded for one image. Angles are in degrees as
/// written in the label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewGeometry {
    /// Spacecraft to target vector, in the label's frame and unit.
    pub target_position: [f64; 3],
    pub sub_spacecraft_latitude: f64,
    pub sub_spacecraft_longitude: f64,
    pub right_ascension: f64,
    pub declination: f64,
    /// Angle from the image's up direction to celestial north.
    pub celestial_north_clock_angle: f64,
}

impl ViewGeometry {
    pub fn from_sample(sample: &DataSample) -> Result<Self> {
        Ok(Self {
            target_position: sample.meta_vector("SC_TARGET_POSITION_VECTOR")?,
            sub_spacecraft_latitude: sample.meta_float("SUB_SPACECRAFT_LATITUDE")?,
            sub_spacecraft_longitude: sample.meta_float("SUB_SPACECRAFT_LONGITUDE")?,
            right_ascension: sample.meta_float("RIGHT_ASCENSION")?,
            declination: sample.meta_float("DECLINATION")?,
            celestial_north_clock_angle: sample.meta_float("CELESTIAL_NORTH_CLOCK_ANGLE")?,
        })
    }

    /// Unit vector along the boresight, in equatorial coordinates.
    pub fn boresight(&self) -> [f64; 3] {
        let (ra, dec) = (radians(self.right_ascension), radians(self.declination));
        [dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin()]
    }

    /// Celestial north projected onto the image plane, normalized.
    ///
    /// `None` when the boresight points at a celestial pole.
    pub fn celestial_north_in_image(&self) -> Option<[f64; 3]> {
        let dir = self.boresight();
        let north = [0.0, 0.0, 1.0];
        normalize(sub(north, scale(dir, dot(north, dir))))
    }

    /// Image up and right directions: celestial north in the image plane
    /// turned about the boresight by the clock angle.
    pub fn image_axes(&self) -> Option<([f64; 3], [f64; 3])> {
        let dir = self.boresight();
        let north = self.celestial_north_in_image()?;
        let up = rotate(north, dir, -radians(self.celestial_north_clock_angle));
        Some((up, cross(dir, up)))
    }
}

fn radians(degrees: f64) -> f64 {
    degrees / 180.0 * PI
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn scale(a: [f64; 3], k: f64) -> [f64; 3] {
    a.map(|x| x * k)
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn normalize(a: [f64; 3]) -> Option<[f64; 3]> {
    let len = dot(a, a).sqrt();
    (len > 1e-12).then(|| scale(a, 1.0 / len))
}

/// Rodrigues rotation of `v` about the unit `axis`, for `v` perpendicular to it.
fn rotate(v: [f64; 3], axis: [f64; 3], angle: f64) -> [f64; 3] {
    let (s, c) = angle.sin_cos();
    let k = cross(axis, v);
    [
        v[0] * c + k[0] * s,
        v[1] * c + k[1] * s,
        v[2] * c + k[2] * s,
    ]
}
