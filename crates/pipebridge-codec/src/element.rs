use std::fmt;
use std::str::FromStr;

use crate::error::CodecError;

/// Element types an array may carry on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 4-byte IEEE-754 float.
    Float32,
    /// 8-byte IEEE-754 float.
    Float64,
}

impl ElementType {
    /// Wire tag stored in `_elementType`.
    pub const fn tag(self) -> &'static str {
        match self {
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        }
    }

    /// Bytes per element.
    pub const fn width(self) -> usize {
        match self {
            ElementType::Float32 => 4,
            ElementType::Float64 => 8,
        }
    }
}

impl FromStr for ElementType {
    type Err = CodecError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag {
            "float32" => Ok(ElementType::Float32),
            "float64" => Ok(ElementType::Float64),
            other => Err(CodecError::UnsupportedElementType(other.to_string())),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
