//! Reduction of decoded samples to a square 8-bit array.

use log::info;
use ndarray::Array2;

use crate::convert::{ConvertOptions, Outcome, SkipReason};
use crate::error::{Error, Result};
use crate::image::SampleArray;

/// Divide every sample by `options.sample_divisor` and cast to `u8`.
///
/// Non-square images are skipped. Integer samples use integer division and
/// real samples are divided then truncated toward zero. A rescaled value
/// above `options.max_normalized`, a negative value or a NaN fails with
/// [`Error::SampleOutOfRange`]; nothing is clipped.
pub fn normalize(samples: &SampleArray, options: &ConvertOptions) -> Result<Outcome<Array2<u8>>> {
    let (lines, line_samples) = samples.dim();
    if lines != line_samples {
        info!("skipping non-square image {lines}x{line_samples}");
        return Ok(Outcome::Skipped(SkipReason::NonSquare {
            lines,
            line_samples,
        }));
    }

    let divisor = options.sample_divisor.max(1);
    let limit = options.max_normalized.min(u32::from(u8::MAX));
    let out = match samples {
        SampleArray::U8(a) => rescale_int(a, divisor, limit)?,
        SampleArray::I8(a) => rescale_int(a, divisor, limit)?,
        SampleArray::U16(a) => rescale_int(a, divisor, limit)?,
        SampleArray::I16(a) => rescale_int(a, divisor, limit)?,
        SampleArray::U32(a) => rescale_int(a, divisor, limit)?,
        SampleArray::I32(a) => rescale_int(a, divisor, limit)?,
        SampleArray::F32(a) => rescale_real(&a.mapv(f64::from), divisor, limit)?,
        SampleArray::F64(a) => rescale_real(a, divisor, limit)?,
    };
    Ok(Outcome::Converted(out))
}

fn rescale_int<T>(samples: &Array2<T>, divisor: u32, limit: u32) -> Result<Array2<u8>>
where
    T: Copy + Into<i64>,
{
    let divisor = i64::from(divisor);
    let limit_i = i64::from(limit);
    let mut out = Array2::zeros(samples.dim());
    for (dst, &src) in out.iter_mut().zip(samples.iter()) {
        let raw: i64 = src.into();
        let scaled = raw / divisor;
        if raw < 0 || scaled > limit_i {
            return Err(Error::SampleOutOfRange {
                value: raw as f64 / divisor as f64,
                limit,
            });
        }
        *dst = scaled as u8;
    }
    Ok(out)
}

fn rescale_real(samples: &Array2<f64>, divisor: u32, limit: u32) -> Result<Array2<u8>> {
    let divisor = f64::from(divisor);
    let mut out = Array2::zeros(samples.dim());
    for (dst, &src) in out.iter_mut().zip(samples.iter()) {
        let scaled = (src / divisor).trunc();
        if scaled.is_nan() || src < 0.0 || scaled > f64::from(limit) {
            return Err(Error::SampleOutOfRange {
                value: src / divisor,
                limit,
            });
        }
        *dst = scaled as u8;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn converted(samples: SampleArray) -> Array2<u8> {
        match normalize(&samples, &ConvertOptions::default()).unwrap() {
            Outcome::Converted(a) => a,
            Outcome::Skipped(r) => panic!("unexpected skip: {r}"),
        }
    }

    #[test]
    fn twelve_bit_range_maps_to_u8() {
        let out = converted(SampleArray::U16(array![[4095, 16], [0, 15]]));
        assert_eq!(out, array![[255u8, 1], [0, 0]]);
    }

    #[test]
    fn raw_4096_is_out_of_range() {
        let err = normalize(
            &SampleArray::U16(array![[4096, 0], [0, 0]]),
            &ConvertOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            Error::SampleOutOfRange { value, limit: 255 } if value == 256.0
        ));
    }

    #[test]
    fn negative_sample_is_out_of_range() {
        let err = normalize(&SampleArray::I16(array![[-1]]), &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::SampleOutOfRange { .. }));
    }

    #[test]
    fn non_square_is_skipped() {
        let samples = SampleArray::U16(Array2::zeros((100, 80)));
        let out = normalize(&samples, &ConvertOptions::default()).unwrap();
        assert_eq!(
            out.skip_reason(),
            Some(&SkipReason::NonSquare {
                lines: 100,
                line_samples: 80
            })
        );
    }

    #[test]
    fn shape_is_preserved() {
        let out = converted(SampleArray::U8(Array2::from_elem((3, 3), 32)));
        assert_eq!(out.dim(), (3, 3));
        assert!(out.iter().all(|&v| v == 2));
    }

    #[test]
    fn real_samples_truncate() {
        let out = converted(SampleArray::F32(array![[31.9, 4095.5], [0.0, 16.0]]));
        assert_eq!(out, array![[1u8, 255], [0, 1]]);
    }

    #[test]
    fn nan_is_out_of_range() {
        let err = normalize(&SampleArray::F64(array![[f64::NAN]]), &ConvertOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::SampleOutOfRange { .. }));
    }

    #[test]
    fn custom_divisor() {
        let options = ConvertOptions {
            sample_divisor: 1,
            ..ConvertOptions::default()
        };
        let out = normalize(&SampleArray::U16(array![[200]]), &options).unwrap();
        assert_eq!(out.converted(), Some(&array![[200u8]]));
    }
}
