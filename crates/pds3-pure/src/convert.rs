//! The conversion pipeline for one labelled product: filter, parse, resolve,
//! read, normalize and serialize.

use core::fmt;
use std::path::Path;

use log::{debug, info};
use ndarray::Array2;

use crate::error::Result;
use crate::image::read_samples;
use crate::label::{read_label_text, Label};
use crate::normalize::normalize;
use crate::pointer::{resolve_image, ImageDescriptor};
use crate::serialize::{serialize_label, Primitive};
use crate::units::{UnitFilter, DEFAULT_DISALLOWED_UNITS};

/// Tunable parts of a conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Units whose statements are dropped before parsing (case-insensitive).
    pub disallowed_units: Vec<String>,
    /// Name of the image object; the pointer key is this name with a `^`.
    pub image_pointer: String,
    /// Required extension of a detached data file (case-insensitive).
    pub image_extension: String,
    /// Every sample is divided by this before the 8-bit cast.
    pub sample_divisor: u32,
    /// Largest rescaled value accepted; at most 255.
    pub max_normalized: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            disallowed_units: DEFAULT_DISALLOWED_UNITS
                .iter()
                .map(|u| u.to_string())
                .collect(),
            image_pointer: "IMAGE".into(),
            image_extension: ".IMG".into(),
            sample_divisor: 16,
            max_normalized: 255,
        }
    }
}

impl ConvertOptions {
    pub fn unit_filter(&self) -> UnitFilter {
        UnitFilter::new(&self.disallowed_units)
    }
}

/// Why a product was passed over without producing output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The label has no image pointer.
    NoImage,
    /// The image pointer names a file that is not a raw image.
    UnsupportedContainer { file: String },
    /// The image has more than one band.
    MultiBand { bands: usize },
    /// The image is not square.
    NonSquare { lines: usize, line_samples: usize },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoImage => write!(f, "no image"),
            SkipReason::UnsupportedContainer { file } => {
                write!(f, "unsupported container {file}")
            }
            SkipReason::MultiBand { bands } => write!(f, "multi-band image ({bands} bands)"),
            SkipReason::NonSquare {
                lines,
                line_samples,
            } => write!(f, "non-square image {lines}x{line_samples}"),
        }
    }
}

/// Result of a pipeline step that may decline to process its input.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Converted(T),
    Skipped(SkipReason),
}

impl<T> Outcome<T> {
    pub fn converted(&self) -> Option<&T> {
        match self {
            Outcome::Converted(v) => Some(v),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn into_converted(self) -> Option<T> {
        match self {
            Outcome::Converted(v) => Some(v),
            Outcome::Skipped(_) => None,
        }
    }

    pub fn skip_reason(&self) -> Option<&SkipReason> {
        match self {
            Outcome::Converted(_) => None,
            Outcome::Skipped(r) => Some(r),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Converted(v) => Outcome::Converted(f(v)),
            Outcome::Skipped(r) => Outcome::Skipped(r),
        }
    }
}

/// Both artifacts of a converted product.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertedProduct {
    /// Square 8-bit image.
    pub image: Array2<u8>,
    /// The label as a primitive tree.
    pub metadata: Primitive,
    pub descriptor: ImageDescriptor,
}

/// Read, unit-filter and parse the label at `path`.
pub fn load_label(path: &Path, options: &ConvertOptions) -> Result<Label> {
    let text = read_label_text(path)?;
    let filtered = options.unit_filter().filter(&text);
    debug!("{}: {} bytes of label text", path.display(), filtered.len());
    Label::parse(&filtered)
}

/// Run the whole pipeline on the label at `label_path`.
///
/// Skips are returned as [`Outcome::Skipped`]; everything else that stops
/// the conversion is an error.
pub fn convert_product(
    label_path: &Path,
    options: &ConvertOptions,
) -> Result<Outcome<ConvertedProduct>> {
    let label = load_label(label_path, options)?;

    let descriptor = match resolve_image(&label, label_path, options)? {
        Outcome::Converted(d) => d,
        Outcome::Skipped(reason) => return Ok(Outcome::Skipped(reason)),
    };
    let samples = read_samples(&descriptor)?;
    let image = match normalize(&samples, options)? {
        Outcome::Converted(img) => img,
        Outcome::Skipped(reason) => return Ok(Outcome::Skipped(reason)),
    };

    info!(
        "{}: converted {}x{} image",
        label_path.display(),
        descriptor.lines,
        descriptor.line_samples
    );
    Ok(Outcome::Converted(ConvertedProduct {
        image,
        metadata: serialize_label(&label),
        descriptor,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let o = ConvertOptions::default();
        assert_eq!(o.disallowed_units, vec!["degC".to_string()]);
        assert_eq!(o.image_pointer, "IMAGE");
        assert_eq!(o.image_extension, ".IMG");
        assert_eq!(o.sample_divisor, 16);
        assert_eq!(o.max_normalized, 255);
    }

    #[test]
    fn unit_filter_follows_options() {
        let o = ConvertOptions {
            disallowed_units: vec!["K".into()],
            ..ConvertOptions::default()
        };
        let filter = o.unit_filter();
        assert!(filter.is_disallowed("k"));
        assert!(!filter.is_disallowed("degC"));
    }

    #[test]
    fn skip_reason_display() {
        assert_eq!(SkipReason::NoImage.to_string(), "no image");
        assert_eq!(
            SkipReason::UnsupportedContainer {
                file: "A.TAB".into()
            }
            .to_string(),
            "unsupported container A.TAB"
        );
        assert!(SkipReason::NonSquare {
            lines: 100,
            line_samples: 80
        }
        .to_string()
        .starts_with("non-square"));
        assert!(SkipReason::MultiBand { bands: 3 }.to_string().contains("3 bands"));
    }

    #[test]
    fn outcome_helpers() {
        let ok: Outcome<u8> = Outcome::Converted(7);
        assert_eq!(ok.converted(), Some(&7));
        assert!(!ok.is_skipped());
        assert_eq!(ok.clone().map(u32::from).into_converted(), Some(7u32));

        let skipped: Outcome<u8> = Outcome::Skipped(SkipReason::NoImage);
        assert!(skipped.is_skipped());
        assert_eq!(skipped.skip_reason(), Some(&SkipReason::NoImage));
        assert_eq!(skipped.into_converted(), None);
    }

    #[test]
    fn load_label_filters_units() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.lbl");
        std::fs::write(&path, "A = 1 <degC>\nB = 2 <K>\nEND\n").unwrap();
        let label = load_label(&path, &ConvertOptions::default()).unwrap();
        assert!(!label.contains_key("A"));
        assert!(label.contains_key("B"));
    }
}
