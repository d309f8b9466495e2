//! Byte-order conversion for raster samples.
//!
//! PDS3 products declare their byte order through the `SAMPLE_TYPE` keyword,
//! so unlike fixed-endian formats the order is a runtime parameter here.
//! Raw bytes are first reinterpreted as properly-aligned typed values, then
//! every element is swapped from the declared order to native order in place.

use bytemuck::{pod_collect_to_vec, Pod};

/// Order of the bytes within one stored sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ByteOrder {
    /// Most-significant byte first (`MSB_`, `SUN_`, `MAC_` and unprefixed types).
    #[default]
    Msb,
    /// Least-significant byte first (`LSB_`, `PC_`, `VAX_` types).
    Lsb,
}

/// A sample type that can be converted from a declared byte order to native.
pub trait FromByteOrder: Pod {
    fn from_order(self, order: ByteOrder) -> Self;
}

macro_rules! impl_from_byte_order_int {
    ($($t:ty),*) => {
        $(
            impl FromByteOrder for $t {
                #[inline]
                fn from_order(self, order: ByteOrder) -> Self {
                    match order {
                        ByteOrder::Msb => <$t>::from_be(self),
                        ByteOrder::Lsb => <$t>::from_le(self),
                    }
                }
            }
        )*
    };
}

impl_from_byte_order_int!(u8, i8, u16, i16, u32, i32, u64);

impl FromByteOrder for f32 {
    #[inline]
    fn from_order(self, order: ByteOrder) -> Self {
        f32::from_bits(self.to_bits().from_order(order))
    }
}

impl FromByteOrder for f64 {
    #[inline]
    fn from_order(self, order: ByteOrder) -> Self {
        f64::from_bits(self.to_bits().from_order(order))
    }
}

/// Decode a byte buffer of samples stored in `order` into native values.
///
/// # Panics
/// Panics if `raw.len()` is not a multiple of the sample size.
pub fn decode_samples<T: FromByteOrder>(raw: &[u8], order: ByteOrder) -> Vec<T> {
    let size = core::mem::size_of::<T>();
    assert!(
        raw.len() % size == 0,
        "buffer length must be a multiple of {size}"
    );
    let mut samples: Vec<T> = pod_collect_to_vec(raw);
    for v in &mut samples {
        *v = v.from_order(order);
    }
    samples
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_msb() {
        assert_eq!(ByteOrder::default(), ByteOrder::Msb);
    }

    #[test]
    fn decode_u16_msb() {
        let raw = [0x0F, 0xFF, 0x00, 0x10];
        let v: Vec<u16> = decode_samples(&raw, ByteOrder::Msb);
        assert_eq!(v, vec![4095, 16]);
    }

    #[test]
    fn decode_u16_lsb() {
        let raw = [0xFF, 0x0F, 0x10, 0x00];
        let v: Vec<u16> = decode_samples(&raw, ByteOrder::Lsb);
        assert_eq!(v, vec![4095, 16]);
    }

    #[test]
    fn decode_i16_both_orders() {
        let value: i16 = -1234;
        let be: Vec<i16> = decode_samples(&value.to_be_bytes(), ByteOrder::Msb);
        let le: Vec<i16> = decode_samples(&value.to_le_bytes(), ByteOrder::Lsb);
        assert_eq!(be, vec![value]);
        assert_eq!(le, vec![value]);
    }

    #[test]
    fn decode_u8_ignores_order() {
        let raw = [1u8, 2, 255];
        let msb: Vec<u8> = decode_samples(&raw, ByteOrder::Msb);
        let lsb: Vec<u8> = decode_samples(&raw, ByteOrder::Lsb);
        assert_eq!(msb, lsb);
        assert_eq!(msb, vec![1, 2, 255]);
    }

    #[test]
    fn decode_i32_u32() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&(-70000i32).to_be_bytes());
        raw.extend_from_slice(&(70000i32).to_be_bytes());
        let v: Vec<i32> = decode_samples(&raw, ByteOrder::Msb);
        assert_eq!(v, vec![-70000, 70000]);

        let v: Vec<u32> = decode_samples(&3_000_000_000u32.to_le_bytes(), ByteOrder::Lsb);
        assert_eq!(v, vec![3_000_000_000]);
    }

    #[test]
    fn decode_f32_both_orders() {
        let be: Vec<f32> = decode_samples(&1.5f32.to_be_bytes(), ByteOrder::Msb);
        let le: Vec<f32> = decode_samples(&(-0.25f32).to_le_bytes(), ByteOrder::Lsb);
        assert_eq!(be, vec![1.5]);
        assert_eq!(le, vec![-0.25]);
    }

    #[test]
    fn decode_f64_both_orders() {
        let be: Vec<f64> = decode_samples(&core::f64::consts::PI.to_be_bytes(), ByteOrder::Msb);
        let le: Vec<f64> = decode_samples(&1e-300f64.to_le_bytes(), ByteOrder::Lsb);
        assert_eq!(be, vec![core::f64::consts::PI]);
        assert_eq!(le, vec![1e-300]);
    }

    #[test]
    fn decode_empty() {
        let v: Vec<u16> = decode_samples(&[], ByteOrder::Msb);
        assert!(v.is_empty());
    }

    #[test]
    #[should_panic(expected = "multiple of 2")]
    fn decode_odd_length_panics() {
        let _: Vec<u16> = decode_samples(&[1, 2, 3], ByteOrder::Msb);
    }
}
