use crate::element::ElementType;

/// Errors that can occur while encoding or decoding structured values.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// An array record names an element type other than float32/float64.
    #[error("unsupported element type '{0}' (expected float32 or float64)")]
    UnsupportedElementType(String),

    /// The array data does not fit the declared shape.
    #[error("shape {shape:?} does not match {byte_len} bytes of {element_type} data")]
    ShapeMismatch {
        shape: Vec<usize>,
        byte_len: usize,
        element_type: ElementType,
    },

    /// A value has no representation in the document format.
    #[error("cannot encode {0}")]
    UnencodableType(String),

    /// A reserved array record is missing fields or has fields of the wrong type.
    #[error("malformed array record: {0}")]
    MalformedArray(String),

    /// The `_data` field is not valid base64.
    #[error("invalid base64 in array data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The document is not valid JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CodecError>;
