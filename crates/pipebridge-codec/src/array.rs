use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use serde::{Deserialize, Serialize};

use crate::element::ElementType;
use crate::error::{CodecError, Result};

/// A multi-dimensional float array with a wire-representable element type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

impl TypedArray {
    /// Element type of the array.
    pub fn element_type(&self) -> ElementType {
        match self {
            TypedArray::Float32(_) => ElementType::Float32,
            TypedArray::Float64(_) => ElementType::Float64,
        }
    }

    /// Dimension sizes; empty for a 0-dimensional scalar.
    pub fn shape(&self) -> &[usize] {
        match self {
            TypedArray::Float32(a) => a.shape(),
            TypedArray::Float64(a) => a.shape(),
        }
    }

    /// Number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        match self {
            TypedArray::Float32(a) => a.len(),
            TypedArray::Float64(a) => a.len(),
        }
    }

    /// True when the array has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_f32(&self) -> Option<&ArrayD<f32>> {
        match self {
            TypedArray::Float32(a) => Some(a),
            TypedArray::Float64(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<&ArrayD<f64>> {
        match self {
            TypedArray::Float64(a) => Some(a),
            TypedArray::Float32(_) => None,
        }
    }

    /// Elements widened to f64 in row-major order, regardless of element type.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            TypedArray::Float32(a) => a.iter().map(|&v| f64::from(v)).collect(),
            TypedArray::Float64(a) => a.iter().copied().collect(),
        }
    }

    /// Same element type, same shape and bit-identical elements.
    ///
    /// Unlike `==`, NaN payloads compare equal and `0.0` differs from `-0.0`.
    pub fn bit_eq(&self, other: &TypedArray) -> bool {
        match (self, other) {
            (TypedArray::Float32(a), TypedArray::Float32(b)) => {
                a.shape() == b.shape()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            (TypedArray::Float64(a), TypedArray::Float64(b)) => {
                a.shape() == b.shape()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits())
            }
            _ => false,
        }
    }

    /// Raw elements in row-major order, little-endian.
    pub fn to_le_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len() * self.element_type().width());
        match self {
            TypedArray::Float32(a) => {
                for v in a.iter() {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            TypedArray::Float64(a) => {
                for v in a.iter() {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
        }
        out
    }

    /// Rebuild an array from little-endian row-major bytes.
    ///
    /// A missing or empty `shape` yields a flat 1-D array of every element.
    pub fn from_le_bytes(
        element_type: ElementType,
        bytes: &[u8],
        shape: Option<&[usize]>,
    ) -> Result<Self> {
        let width = element_type.width();
        let count = bytes.len() / width;
        let dims = match shape {
            Some(dims) if !dims.is_empty() => dims.to_vec(),
            _ => vec![count],
        };

        let product = dims.iter().try_fold(1usize, |acc, &d| acc.checked_mul(d));
        if bytes.len() % width != 0 || product != Some(count) {
            return Err(CodecError::ShapeMismatch {
                shape: dims,
                byte_len: bytes.len(),
                element_type,
            });
        }

        let mismatch = |dims: &[usize]| CodecError::ShapeMismatch {
            shape: dims.to_vec(),
            byte_len: bytes.len(),
            element_type,
        };

        match element_type {
            ElementType::Float32 => {
                let values = bytes
                    .chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes(le_array(chunk)))
                    .collect();
                ArrayD::from_shape_vec(IxDyn(&dims), values)
                    .map(TypedArray::Float32)
                    .map_err(|_| mismatch(&dims))
            }
            ElementType::Float64 => {
                let values = bytes
                    .chunks_exact(8)
                    .map(|chunk| f64::from_le_bytes(le_array(chunk)))
                    .collect();
                ArrayD::from_shape_vec(IxDyn(&dims), values)
                    .map(TypedArray::Float64)
                    .map_err(|_| mismatch(&dims))
            }
        }
    }
}

fn le_array<const N: usize>(chunk: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(chunk);
    out
}

impl<D: Dimension> From<Array<f32, D>> for TypedArray {
    fn from(array: Array<f32, D>) -> Self {
        TypedArray::Float32(array.into_dyn())
    }
}

impl<D: Dimension> From<Array<f64, D>> for TypedArray {
    fn from(array: Array<f64, D>) -> Self {
        TypedArray::Float64(array.into_dyn())
    }
}

impl From<Vec<f32>> for TypedArray {
    fn from(values: Vec<f32>) -> Self {
        TypedArray::from(Array::from_vec(values))
    }
}

impl From<Vec<f64>> for TypedArray {
    fn from(values: Vec<f64>) -> Self {
        TypedArray::from(Array::from_vec(values))
    }
}

/// The reserved mapping an array becomes inside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrayRecord {
    /// `float32` or `float64`.
    #[serde(rename = "_elementType")]
    pub element_type: String,
    /// Dimension sizes; absent, null or empty means "flat".
    #[serde(rename = "_shape", default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<Vec<usize>>,
    /// Base64 of the little-endian row-major element bytes.
    #[serde(rename = "_data")]
    pub data: String,
}

/// Key naming the element type of an array record.
pub const ELEMENT_TYPE_KEY: &str = "_elementType";
/// Key holding the dimension sizes of an array record.
pub const SHAPE_KEY: &str = "_shape";
/// Key holding the base64 element bytes of an array record.
pub const DATA_KEY: &str = "_data";

/// Encode an array as its wire record.
pub fn encode_array(array: &TypedArray) -> ArrayRecord {
    ArrayRecord {
        element_type: array.element_type().tag().to_string(),
        shape: Some(array.shape().to_vec()),
        data: STANDARD.encode(array.to_le_bytes()),
    }
}

/// Decode a wire record back into an array.
pub fn decode_array(record: &ArrayRecord) -> Result<TypedArray> {
    let element_type: ElementType = record.element_type.parse()?;
    let bytes = STANDARD.decode(record.data.as_bytes())?;
    TypedArray::from_le_bytes(element_type, &bytes, record.shape.as_deref())
}
