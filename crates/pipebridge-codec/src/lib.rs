//! Structured values and their JSON wire encoding.
//!
//! Request arguments and handler results travel as JSON documents. Numeric
//! arrays ride inside those documents as reserved records:
//!
//! ```text
//! { "_elementType": "float64", "_shape": [2, 2], "_data": "<base64>" }
//! ```
//!
//! `_data` holds the elements in row-major order, little-endian, whatever the
//! host byte order. Any mapping carrying both `_elementType` and `_data` is
//! decoded as an array, never as user data.

pub mod array;
pub mod element;
pub mod error;
pub mod json;
pub mod value;

pub use array::{decode_array, encode_array, ArrayRecord, TypedArray};
pub use element::ElementType;
pub use error::{CodecError, Result};
pub use json::{decode, decode_str, encode, encode_to_string, from_json, to_json};
pub use value::{Map, Number, Value};
