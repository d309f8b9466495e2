//! Writing converted PDS3 products to disk: a grayscale PNG and a JSON
//! metadata file per label, named after the label's stem, and loading
//! those pairs back with [`dataset`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use log::info;
use ndarray::Array2;
use pds3_pure::{convert_product, ConvertOptions, Outcome, Primitive, SkipReason};

pub mod dataset;

/// What happened to one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Converted,
    /// Both artifacts already existed.
    AlreadyConverted,
    Skipped(SkipReason),
}

/// `<out_dir>/<stem>.png` and `<out_dir>/<stem>.json` for `label`.
pub fn artifact_paths(label: &Path, out_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let stem = label
        .file_stem()
        .ok_or_else(|| anyhow!("{}: no file name", label.display()))?;
    let stem = stem.to_string_lossy();
    Ok((
        out_dir.join(format!("{stem}.png")),
        out_dir.join(format!("{stem}.json")),
    ))
}

pub fn already_converted(label: &Path, out_dir: &Path) -> Result<bool> {
    let (png, json) = artifact_paths(label, out_dir)?;
    Ok(png.is_file() && json.is_file())
}

/// Save a square 8-bit array as a grayscale PNG, row 0 at the top.
pub fn write_png(pixels: &Array2<u8>, path: &Path) -> Result<()> {
    let (height, width) = pixels.dim();
    let gray = GrayImage::from_raw(width as u32, height as u32, pixels.iter().copied().collect())
        .ok_or_else(|| anyhow!("failed to create {width}x{height} image"))?;
    gray.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing {}", path.display()))
}

/// Write metadata as pretty-printed JSON (two-space indent).
pub fn write_json(metadata: &Primitive, path: &Path) -> Result<()> {
    let text = serde_json::to_string_pretty(metadata)?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

/// Convert the product labelled by `label` into `out_dir`.
///
/// Does nothing when both artifacts already exist, unless `force` is set.
pub fn convert_to_folder(
    label: &Path,
    out_dir: &Path,
    options: &ConvertOptions,
    force: bool,
) -> Result<FileStatus> {
    let (png, json) = artifact_paths(label, out_dir)?;
    if !force && png.is_file() && json.is_file() {
        info!("{}: already converted", label.display());
        return Ok(FileStatus::AlreadyConverted);
    }

    let product = match convert_product(label, options)
        .with_context(|| format!("converting {}", label.display()))?
    {
        Outcome::Converted(p) => p,
        Outcome::Skipped(reason) => {
            info!("{}: skipped, {reason}", label.display());
            return Ok(FileStatus::Skipped(reason));
        }
    };

    write_png(&product.image, &png)?;
    write_json(&product.metadata, &json)?;
    info!("{} -> {}", label.display(), png.display());
    Ok(FileStatus::Converted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const LABEL: &str = "RECORD_BYTES = 4
^IMAGE = (\"CAM.IMG\", 1)
TARGET_NAME = \"67P\"
EXPOSURE_DURATION = 0.5 <s>
DETECTOR_TEMPERATURE = -20.0 <degC>
OBJECT = IMAGE
  LINES = 2
  LINE_SAMPLES = 2
  SAMPLE_BITS = 16
END_OBJECT = IMAGE
END
";

    fn product(dir: &Path) -> PathBuf {
        let samples: Vec<u8> = [0u16, 16, 32, 4080]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        fs::write(dir.join("CAM.IMG"), samples).unwrap();
        let label = dir.join("CAM.LBL");
        fs::write(&label, LABEL).unwrap();
        label
    }

    #[test]
    fn artifact_names_follow_stem() {
        let (png, json) = artifact_paths(Path::new("/in/a.b.LBL"), Path::new("/out")).unwrap();
        assert_eq!(png, PathBuf::from("/out/a.b.png"));
        assert_eq!(json, PathBuf::from("/out/a.b.json"));
    }

    #[test]
    fn converts_into_folder() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let label = product(dir.path());

        let status = convert_to_folder(&label, out.path(), &ConvertOptions::default(), false)
            .unwrap();
        assert_eq!(status, FileStatus::Converted);

        let png = image::open(out.path().join("CAM.png")).unwrap().to_luma8();
        assert_eq!(png.dimensions(), (2, 2));
        assert_eq!(png.into_raw(), vec![0, 1, 2, 255]);

        let text = fs::read_to_string(out.path().join("CAM.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["TARGET_NAME"], "67P");
        assert_eq!(json["EXPOSURE_DURATION"], serde_json::json!([0.5, "s"]));
        assert!(json.get("DETECTOR_TEMPERATURE").is_none());
        assert!(text.contains("\n  \"RECORD_BYTES\""));
    }

    #[test]
    fn second_run_is_short_circuited() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let label = product(dir.path());
        let options = ConvertOptions::default();

        convert_to_folder(&label, out.path(), &options, false).unwrap();
        assert!(already_converted(&label, out.path()).unwrap());
        assert_eq!(
            convert_to_folder(&label, out.path(), &options, false).unwrap(),
            FileStatus::AlreadyConverted
        );
        assert_eq!(
            convert_to_folder(&label, out.path(), &options, true).unwrap(),
            FileStatus::Converted
        );
    }

    #[test]
    fn skipped_product_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let label = dir.path().join("NOTE.LBL");
        fs::write(&label, "PDS_VERSION_ID = PDS3\nEND\n").unwrap();

        let status =
            convert_to_folder(&label, out.path(), &ConvertOptions::default(), false).unwrap();
        assert_eq!(status, FileStatus::Skipped(SkipReason::NoImage));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[test]
    fn failure_mentions_label() {
        let dir = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let label = dir.path().join("CAM.LBL");
        fs::write(&label, LABEL).unwrap();

        let err = convert_to_folder(&label, out.path(), &ConvertOptions::default(), false)
            .unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("CAM.LBL"));
        assert!(chain.contains("CAM.IMG"));
    }

    #[test]
    fn png_rows_match_array_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.png");
        write_png(&array![[10u8, 20], [30, 40]], &path).unwrap();
        let img = image::open(&path).unwrap().to_luma8();
        assert_eq!(img.get_pixel(1, 0).0, [20]);
        assert_eq!(img.get_pixel(0, 1).0, [30]);
    }
}
