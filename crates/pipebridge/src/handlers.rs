//! Built-in functions served by `pipebridge serve`.

use pipebridge_codec::{Number, TypedArray, Value};
use pipebridge_dispatch::{HandlerError, HandlerRegistry, HandlerResult};

/// A named built-in function.
pub struct Builtin {
    pub name: &'static str,
    pub summary: &'static str,
    pub handler: fn(Value) -> HandlerResult,
}

pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "add",
        summary: "sum of numbers or arrays `a` and `b`, as {\"result\": sum}",
        handler: add,
    },
    Builtin {
        name: "add_scalar_output",
        summary: "sum of numbers or arrays `a` and `b`, returned bare",
        handler: add_scalar_output,
    },
    Builtin {
        name: "add_arrays",
        summary: "element-wise sum of same-shape arrays `a` and `b`",
        handler: add_arrays,
    },
    Builtin {
        name: "add_numpy_arrays",
        summary: "alias of add_arrays",
        handler: add_arrays,
    },
    Builtin {
        name: "identity",
        summary: "returns its argument unchanged",
        handler: identity,
    },
    Builtin {
        name: "verify_1d_array",
        summary: "checks `arr1D` is [1.2, 3.2, 99.1, -14.1], echoes the argument",
        handler: verify_1d_array,
    },
    Builtin {
        name: "verify_2d_array",
        summary: "checks `arr2D` is [[1.2, 3.2], [99.1, -14.1]], echoes the argument",
        handler: verify_2d_array,
    },
];

pub fn registry() -> HandlerRegistry {
    BUILTINS
        .iter()
        .fold(HandlerRegistry::builder(), |builder, builtin| {
            builder.register(builtin.name, builtin.handler)
        })
        .build()
}

fn add(args: Value) -> HandlerResult {
    let sum = sum_fields(&args)?;
    Ok([("result", sum)].into_iter().collect())
}

fn add_scalar_output(args: Value) -> HandlerResult {
    sum_fields(&args)
}

fn add_arrays(args: Value) -> HandlerResult {
    let a = array_field(&args, "a")?;
    let b = array_field(&args, "b")?;
    Ok(Value::Array(sum_arrays(a, b)?))
}

fn identity(args: Value) -> HandlerResult {
    Ok(args)
}

fn verify_1d_array(args: Value) -> HandlerResult {
    expect_array(&args, "arr1D", &[4], &[1.2, 3.2, 99.1, -14.1])?;
    Ok(args)
}

fn verify_2d_array(args: Value) -> HandlerResult {
    expect_array(&args, "arr2D", &[2, 2], &[1.2, 3.2, 99.1, -14.1])?;
    Ok(args)
}

fn field<'a>(args: &'a Value, key: &str) -> Result<&'a Value, HandlerError> {
    args.get(key)
        .ok_or_else(|| format!("missing argument '{key}'").into())
}

fn array_field<'a>(args: &'a Value, key: &str) -> Result<&'a TypedArray, HandlerError> {
    let value = field(args, key)?;
    value
        .as_array()
        .ok_or_else(|| format!("argument '{key}' must be an array, got {}", value.kind()).into())
}

fn sum_fields(args: &Value) -> HandlerResult {
    match (field(args, "a")?, field(args, "b")?) {
        (Value::Number(a), Value::Number(b)) => Ok(Value::Number(sum_numbers(*a, *b))),
        (Value::Array(a), Value::Array(b)) => Ok(Value::Array(sum_arrays(a, b)?)),
        (a, b) => Err(format!("cannot add {} and {}", a.kind(), b.kind()).into()),
    }
}

fn sum_numbers(a: Number, b: Number) -> Number {
    match (a, b) {
        (Number::Integer(x), Number::Integer(y)) => match x.checked_add(y) {
            Some(sum) => Number::Integer(sum),
            None => Number::Float(x as f64 + y as f64),
        },
        _ => Number::Float(a.as_f64() + b.as_f64()),
    }
}

fn sum_arrays(a: &TypedArray, b: &TypedArray) -> Result<TypedArray, HandlerError> {
    if a.shape() != b.shape() {
        return Err(format!("shape mismatch: {:?} vs {:?}", a.shape(), b.shape()).into());
    }
    Ok(match (a, b) {
        (TypedArray::Float32(x), TypedArray::Float32(y)) => TypedArray::Float32(x + y),
        (TypedArray::Float64(x), TypedArray::Float64(y)) => TypedArray::Float64(x + y),
        (TypedArray::Float32(x), TypedArray::Float64(y)) => {
            TypedArray::Float64(x.mapv(f64::from) + y)
        }
        (TypedArray::Float64(x), TypedArray::Float32(y)) => {
            TypedArray::Float64(x + &y.mapv(f64::from))
        }
    })
}

fn expect_array(
    args: &Value,
    key: &str,
    shape: &[usize],
    expected: &[f64],
) -> Result<(), HandlerError> {
    let array = array_field(args, key)?;
    if array.shape() != shape || array.to_f64_vec() != expected {
        return Err(format!(
            "expected {key} of shape {shape:?} with {expected:?}, got shape {:?} with {:?}",
            array.shape(),
            array.to_f64_vec()
        )
        .into());
    }
    Ok(())
}
