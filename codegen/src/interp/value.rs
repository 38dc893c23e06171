//! Runtime values: scalars, SIMD vectors, and the string handles
//! runtime calls pass around.

use rill_dtype::Type;
use rill_ir::ConstValue;
use smallvec::SmallVec;

use crate::error::{RuntimeError, runtime_codes};

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(ConstValue),
    Vector(SmallVec<[ConstValue; 8]>),
    Str(String),
}

impl Value {
    pub fn lanes(&self) -> usize {
        match self {
            Value::Scalar(_) | Value::Str(_) => 1,
            Value::Vector(v) => v.len(),
        }
    }

    /// Lane `i`, broadcasting scalars.
    pub fn lane(&self, i: usize) -> Result<ConstValue, RuntimeError> {
        match self {
            Value::Scalar(v) => Ok(*v),
            Value::Vector(v) => v.get(i).copied().ok_or_else(|| {
                RuntimeError::new(runtime_codes::BAD_INDEX, format!("lane {i} of {}-wide value", v.len()))
            }),
            Value::Str(_) => {
                Err(RuntimeError::new(runtime_codes::UNSUPPORTED_IR, "string used as numeric value"))
            }
        }
    }

    pub fn as_scalar(&self) -> Result<ConstValue, RuntimeError> {
        self.lane(0)
    }

    pub fn as_i64(&self) -> Result<i64, RuntimeError> {
        self.as_scalar()?.as_i64().ok_or_else(|| {
            RuntimeError::new(runtime_codes::UNSUPPORTED_IR, "expected an integer value")
        })
    }

    pub fn as_bool_lane(&self, i: usize) -> Result<bool, RuntimeError> {
        Ok(self.lane(i)?.as_bool())
    }

    /// Assemble from per-lane scalars; one lane collapses to a scalar.
    pub fn from_lanes(mut lanes: SmallVec<[ConstValue; 8]>) -> Value {
        if lanes.len() == 1 {
            Value::Scalar(lanes.remove(0))
        } else {
            Value::Vector(lanes)
        }
    }

    /// The zero of a type, used for masked-off predicated load lanes.
    pub fn zero_of(ty: &Type) -> ConstValue {
        if ty.is_float() {
            ConstValue::Float(0.0)
        } else if ty.is_uint() {
            ConstValue::UInt(0)
        } else {
            ConstValue::Int(0)
        }
    }
}
