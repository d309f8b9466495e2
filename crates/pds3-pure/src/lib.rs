pub mod convert;
pub mod endian;
pub mod error;
pub mod image;
pub mod label;
pub mod normalize;
pub mod pointer;
pub mod serialize;
pub mod units;
pub mod value;

pub use convert::{convert_product, load_label, ConvertOptions, ConvertedProduct, Outcome, SkipReason};
pub use error::{Error, ParseError, ParseErrorKind, Result};
pub use label::{parse_label, Label};
pub use serialize::{serialize_label, serialize_value, Primitive};
pub use units::{filter_units, UnitFilter};
pub use value::{Group, Number, Pointer, PointerOffset, Scalar, Value};
