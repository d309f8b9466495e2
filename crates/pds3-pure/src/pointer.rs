//! Image pointer resolution: from a parsed label to a concrete sample layout
//! and an absolute byte position in a data file.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::convert::{ConvertOptions, Outcome, SkipReason};
use crate::endian::ByteOrder;
use crate::error::{Error, Result};
use crate::image::SampleFormat;
use crate::label::Label;
use crate::value::{Group, Pointer, PointerOffset, Value};

/// Numeric interpretation of the stored samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    UnsignedInt,
    SignedInt,
    /// IEEE 754 floating point.
    Real,
}

/// Map a `SAMPLE_TYPE` value to its numeric type and byte order.
///
/// Unprefixed names are most-significant-byte first. VAX floating point is
/// not IEEE 754 and is not supported.
pub fn parse_sample_type(name: &str) -> Option<(SampleType, ByteOrder)> {
    use ByteOrder::{Lsb, Msb};
    use SampleType::{Real, SignedInt, UnsignedInt};

    let layout = match name.trim().to_ascii_uppercase().as_str() {
        "MSB_INTEGER" | "INTEGER" | "SUN_INTEGER" | "MAC_INTEGER" => (SignedInt, Msb),
        "LSB_INTEGER" | "PC_INTEGER" | "VAX_INTEGER" => (SignedInt, Lsb),
        "MSB_UNSIGNED_INTEGER" | "UNSIGNED_INTEGER" | "SUN_UNSIGNED_INTEGER"
        | "MAC_UNSIGNED_INTEGER" => (UnsignedInt, Msb),
        "LSB_UNSIGNED_INTEGER" | "PC_UNSIGNED_INTEGER" | "VAX_UNSIGNED_INTEGER" => {
            (UnsignedInt, Lsb)
        }
        "IEEE_REAL" | "REAL" | "FLOAT" | "SUN_REAL" | "MAC_REAL" => (Real, Msb),
        "PC_REAL" => (Real, Lsb),
        _ => return None,
    };
    Some(layout)
}

/// The file holding the image samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Samples follow the label inside the label file itself.
    Attached(PathBuf),
    /// Samples live in a separate file next to the label.
    Detached(PathBuf),
}

impl DataSource {
    pub fn path(&self) -> &Path {
        match self {
            DataSource::Attached(p) | DataSource::Detached(p) => p,
        }
    }
}

/// Everything needed to read one image plane, derived from the label.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    pub lines: usize,
    pub line_samples: usize,
    pub sample_bits: usize,
    pub sample_type: SampleType,
    pub byte_order: ByteOrder,
    /// Storage type of one sample, from `SAMPLE_TYPE` and `SAMPLE_BITS`.
    pub format: SampleFormat,
    /// Bytes skipped before each line's samples.
    pub line_prefix_bytes: usize,
    /// Bytes skipped after each line's samples.
    pub line_suffix_bytes: usize,
    /// `RECORD_BYTES` of the label, when declared.
    pub record_bytes: Option<u64>,
    pub source: DataSource,
    /// Absolute offset of the first line in `source`.
    pub byte_offset: u64,
}

impl ImageDescriptor {
    /// Bytes occupied by one line, including prefix and suffix.
    pub fn line_bytes(&self) -> Result<usize> {
        self.line_samples
            .checked_mul(self.format.bytes())
            .and_then(|n| n.checked_add(self.line_prefix_bytes))
            .and_then(|n| n.checked_add(self.line_suffix_bytes))
            .ok_or_else(|| self.overflow())
    }

    /// Total bytes of image data to read from `source`.
    pub fn data_len(&self) -> Result<u64> {
        let line_bytes = u64::try_from(self.line_bytes()?).map_err(|_| self.overflow())?;
        u64::try_from(self.lines)
            .ok()
            .and_then(|lines| lines.checked_mul(line_bytes))
            .ok_or_else(|| self.overflow())
    }

    fn overflow(&self) -> Error {
        Error::UnsupportedSampleLayout(format!(
            "{}x{} image of {:?} samples is too large",
            self.lines, self.line_samples, self.format
        ))
    }
}

/// Resolve a pointer to an absolute byte offset in its target file.
///
/// * `Record(n)`: `(n - 1) * RECORD_BYTES`; records are 1-based.
/// * `Bytes(n)`: `n`, whatever `RECORD_BYTES` says.
/// * `FileStart`: `0`.
pub fn resolve_offset(pointer: &Pointer, record_bytes: Option<u64>) -> Result<u64> {
    match pointer.offset {
        PointerOffset::Bytes(n) => Ok(n),
        PointerOffset::FileStart => Ok(0),
        PointerOffset::Record(n) => {
            let record_bytes =
                record_bytes.ok_or_else(|| Error::MissingKeyword("RECORD_BYTES".into()))?;
            (n - 1)
                .checked_mul(record_bytes)
                .ok_or_else(|| Error::invalid(&format!("^{}", pointer.target), "offset overflows"))
        }
    }
}

/// Locate the image pointer and its object in `label` and derive the
/// sample layout.
///
/// Returns a skip, not an error, when the label has no image pointer, when
/// the pointer names a file that is not a raw image, or when the image has
/// more than one band. `label_path` is used for attached data and as the
/// directory in which detached files are looked up.
pub fn resolve_image(
    label: &Label,
    label_path: &Path,
    options: &ConvertOptions,
) -> Result<Outcome<ImageDescriptor>> {
    let object_key = options.image_pointer.as_str();
    let pointer_key = format!("^{object_key}");

    let Some(value) = label.get(&pointer_key) else {
        info!("{}: no {pointer_key} pointer", label_path.display());
        return Ok(Outcome::Skipped(SkipReason::NoImage));
    };
    let pointer = value
        .as_pointer()
        .ok_or_else(|| Error::invalid(&pointer_key, "not a pointer"))?;

    if let Some(file) = &pointer.file {
        if !has_extension(file, &options.image_extension) {
            info!("{}: {pointer_key} points at {file}", label_path.display());
            return Ok(Outcome::Skipped(SkipReason::UnsupportedContainer {
                file: file.clone(),
            }));
        }
    }

    let object = match label.get(object_key) {
        Some(Value::Group(g)) => g,
        Some(_) => return Err(Error::invalid(object_key, "expected an OBJECT block")),
        None => return Err(Error::MissingKeyword(object_key.to_string())),
    };

    let bands = optional_count(object, "BANDS")?.unwrap_or(1);
    if bands > 1 {
        return Ok(Outcome::Skipped(SkipReason::MultiBand { bands }));
    }

    let lines = required_count(object, "LINES")?;
    let line_samples = required_count(object, "LINE_SAMPLES")?;
    if lines == 0 || line_samples == 0 {
        return Err(Error::UnsupportedSampleLayout(format!(
            "empty image {lines}x{line_samples}"
        )));
    }
    let sample_bits = required_count(object, "SAMPLE_BITS")?;
    let (sample_type, byte_order) = match object.get("SAMPLE_TYPE") {
        None => (SampleType::UnsignedInt, ByteOrder::Msb),
        Some(v) => {
            let name = v
                .as_str()
                .ok_or_else(|| Error::invalid("SAMPLE_TYPE", format!("`{v}` is not a name")))?;
            parse_sample_type(name)
                .ok_or_else(|| Error::UnsupportedSampleLayout(format!("SAMPLE_TYPE {name}")))?
        }
    };
    let format = SampleFormat::from_layout(sample_type, sample_bits)?;

    let record_bytes = optional_count(label, "RECORD_BYTES")?.map(|n| n as u64);
    let byte_offset = resolve_offset(pointer, record_bytes)?;

    let source = match &pointer.file {
        Some(file) => DataSource::Detached(locate_data_file(label_path, file)),
        None => DataSource::Attached(label_path.to_path_buf()),
    };

    let descriptor = ImageDescriptor {
        lines,
        line_samples,
        sample_bits,
        sample_type,
        byte_order,
        format,
        line_prefix_bytes: optional_count(object, "LINE_PREFIX_BYTES")?.unwrap_or(0),
        line_suffix_bytes: optional_count(object, "LINE_SUFFIX_BYTES")?.unwrap_or(0),
        record_bytes,
        source,
        byte_offset,
    };
    descriptor.data_len()?;
    debug!(
        "{}: {}x{} {:?} {:?} at byte {} of {}",
        label_path.display(),
        descriptor.lines,
        descriptor.line_samples,
        descriptor.format,
        descriptor.byte_order,
        descriptor.byte_offset,
        descriptor.source.path().display()
    );
    Ok(Outcome::Converted(descriptor))
}

fn has_extension(file: &str, extension: &str) -> bool {
    let (file, extension) = (file.as_bytes(), extension.as_bytes());
    file.len() >= extension.len()
        && file[file.len() - extension.len()..].eq_ignore_ascii_case(extension)
}

fn optional_count(group: &Group, key: &str) -> Result<Option<usize>> {
    let Some(value) = group.get(key) else {
        return Ok(None);
    };
    value
        .as_integer()
        .and_then(|n| usize::try_from(n).ok())
        .map(Some)
        .ok_or_else(|| Error::invalid(key, format!("expected a non-negative integer, found `{value}`")))
}

fn required_count(group: &Group, key: &str) -> Result<usize> {
    optional_count(group, key)?.ok_or_else(|| Error::MissingKeyword(key.to_string()))
}

/// Find a detached data file next to the label.
///
/// Archive labels often name files in upper case while the files on disk
/// are lower case, so a case-insensitive match in the label's directory is
/// used when the exact name does not exist.
fn locate_data_file(label_path: &Path, name: &str) -> PathBuf {
    let dir = label_path.parent().unwrap_or(Path::new(""));
    let exact = dir.join(name);
    if exact.is_file() {
        return exact;
    }

    let search_dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    std::fs::read_dir(search_dir)
        .into_iter()
        .flatten()
        .flatten()
        .map(|entry| entry.path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .unwrap_or(exact)
}
