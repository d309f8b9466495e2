//! Raster sample reading for PDS3 image objects.
//!
//! Reads the byte range described by an [`ImageDescriptor`], strips line
//! prefix and suffix bytes, and decodes the samples into a two-dimensional
//! array of `lines` rows by `line_samples` columns.

use std::borrow::Cow;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

use log::debug;
use ndarray::Array2;

use crate::endian::{decode_samples, FromByteOrder};
use crate::error::{Error, Result};
use crate::pointer::{ImageDescriptor, SampleType};

/// In-memory storage type of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    F32,
    F64,
}

impl SampleFormat {
    /// Pick the storage type for `sample_bits` bits of `sample_type`.
    ///
    /// Integer widths round up to a whole number of bytes, so 12-bit
    /// samples are stored in 16 bits. Widths that do not round to 1, 2 or 4
    /// bytes are unsupported.
    pub fn from_layout(sample_type: SampleType, sample_bits: usize) -> Result<Self> {
        let bytes = sample_bits.div_ceil(8);
        let format = match (sample_type, bytes) {
            (SampleType::UnsignedInt, 1) => SampleFormat::U8,
            (SampleType::SignedInt, 1) => SampleFormat::I8,
            (SampleType::UnsignedInt, 2) => SampleFormat::U16,
            (SampleType::SignedInt, 2) => SampleFormat::I16,
            (SampleType::UnsignedInt, 4) => SampleFormat::U32,
            (SampleType::SignedInt, 4) => SampleFormat::I32,
            (SampleType::Real, _) if sample_bits == 32 => SampleFormat::F32,
            (SampleType::Real, _) if sample_bits == 64 => SampleFormat::F64,
            _ => {
                return Err(Error::UnsupportedSampleLayout(format!(
                    "{sample_bits}-bit {sample_type:?} samples"
                )))
            }
        };
        Ok(format)
    }

    /// Bytes per stored sample.
    pub fn bytes(self) -> usize {
        match self {
            SampleFormat::U8 | SampleFormat::I8 => 1,
            SampleFormat::U16 | SampleFormat::I16 => 2,
            SampleFormat::U32 | SampleFormat::I32 | SampleFormat::F32 => 4,
            SampleFormat::F64 => 8,
        }
    }
}

/// Decoded image samples, typed by [`SampleFormat`].
#[derive(Debug, Clone, PartialEq)]
pub enum SampleArray {
    U8(Array2<u8>),
    I8(Array2<i8>),
    U16(Array2<u16>),
    I16(Array2<i16>),
    U32(Array2<u32>),
    I32(Array2<i32>),
    F32(Array2<f32>),
    F64(Array2<f64>),
}

macro_rules! each_array {
    ($self:expr, $a:ident => $body:expr) => {
        match $self {
            SampleArray::U8($a) => $body,
            SampleArray::I8($a) => $body,
            SampleArray::U16($a) => $body,
            SampleArray::I16($a) => $body,
            SampleArray::U32($a) => $body,
            SampleArray::I32($a) => $body,
            SampleArray::F32($a) => $body,
            SampleArray::F64($a) => $body,
        }
    };
}

impl SampleArray {
    /// `(lines, line_samples)`.
    pub fn dim(&self) -> (usize, usize) {
        each_array!(self, a => a.dim())
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            SampleArray::U8(_) => SampleFormat::U8,
            SampleArray::I8(_) => SampleFormat::I8,
            SampleArray::U16(_) => SampleFormat::U16,
            SampleArray::I16(_) => SampleFormat::I16,
            SampleArray::U32(_) => SampleFormat::U32,
            SampleArray::I32(_) => SampleFormat::I32,
            SampleArray::F32(_) => SampleFormat::F32,
            SampleArray::F64(_) => SampleFormat::F64,
        }
    }

    /// Every sample widened to `f64`, in row-major order.
    pub fn to_f64(&self) -> Array2<f64> {
        each_array!(self, a => a.mapv(|v| v as f64))
    }
}

/// Decode the raw bytes of an image, as laid out on disk, into samples.
///
/// `raw` must hold exactly [`ImageDescriptor::data_len`] bytes.
pub fn decode_image(raw: &[u8], descriptor: &ImageDescriptor) -> Result<SampleArray> {
    let expected = descriptor.data_len()?;
    if raw.len() as u64 != expected {
        return Err(Error::UnsupportedSampleLayout(format!(
            "expected {expected} bytes of image data, got {}",
            raw.len()
        )));
    }

    let prefix = descriptor.line_prefix_bytes;
    let sample_bytes = descriptor.line_samples * descriptor.format.bytes();
    let packed: Cow<'_, [u8]> = if prefix == 0 && descriptor.line_suffix_bytes == 0 {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(
            raw.chunks_exact(descriptor.line_bytes()?)
                .flat_map(|line| &line[prefix..prefix + sample_bytes])
                .copied()
                .collect(),
        )
    };

    let samples = match descriptor.format {
        SampleFormat::U8 => SampleArray::U8(to_array(&packed, descriptor)?),
        SampleFormat::I8 => SampleArray::I8(to_array(&packed, descriptor)?),
        SampleFormat::U16 => SampleArray::U16(to_array(&packed, descriptor)?),
        SampleFormat::I16 => SampleArray::I16(to_array(&packed, descriptor)?),
        SampleFormat::U32 => SampleArray::U32(to_array(&packed, descriptor)?),
        SampleFormat::I32 => SampleArray::I32(to_array(&packed, descriptor)?),
        SampleFormat::F32 => SampleArray::F32(to_array(&packed, descriptor)?),
        SampleFormat::F64 => SampleArray::F64(to_array(&packed, descriptor)?),
    };
    Ok(samples)
}

fn to_array<T: FromByteOrder>(bytes: &[u8], descriptor: &ImageDescriptor) -> Result<Array2<T>> {
    let samples = decode_samples(bytes, descriptor.byte_order);
    Array2::from_shape_vec((descriptor.lines, descriptor.line_samples), samples)
        .map_err(|e| Error::UnsupportedSampleLayout(e.to_string()))
}

/// Read and decode the image described by `descriptor` from its data file.
///
/// A file too short for the declared layout yields
/// [`Error::UnexpectedEof`] naming the file.
pub fn read_samples(descriptor: &ImageDescriptor) -> Result<SampleArray> {
    let path = descriptor.source.path();
    let mut file = File::open(path).map_err(|e| Error::io(path, e))?;
    let available = file.metadata().map_err(|e| Error::io(path, e))?.len();

    let offset = descriptor.byte_offset;
    let expected = descriptor.data_len()?;
    if offset.saturating_add(expected) > available {
        return Err(Error::UnexpectedEof {
            path: path.to_path_buf(),
            offset,
            expected,
            available,
        });
    }

    let len = usize::try_from(expected)
        .map_err(|_| Error::UnsupportedSampleLayout(format!("{expected} bytes do not fit in memory")))?;
    let mut raw = vec![0u8; len];
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| Error::io(path, e))?;
    file.read_exact(&mut raw).map_err(|e| Error::io(path, e))?;
    debug!("{}: read {len} bytes at offset {offset}", path.display());

    decode_image(&raw, descriptor)
}
