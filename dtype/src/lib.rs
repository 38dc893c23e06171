//! Scalar type model for the rill compiler.
//!
//! Every expression in the IR carries a [`Type`]: a type code, a bit width,
//! and a lane count. Lane counts above one denote SIMD vectors of the
//! element type.
//!
//! # Module Organization
//!
//! - [`Type`] / [`TypeCode`] - the type representation itself
//! - [`promote`] - binary promotion and representability rules

pub mod promote;

#[cfg(test)]
mod test;

pub use promote::promote;

/// Kind of scalar a [`Type`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(strum::EnumIter, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum TypeCode {
    /// Signed two's-complement integer.
    Int,
    /// Unsigned integer. `UInt` with 1 bit is the boolean type.
    UInt,
    /// IEEE 754 binary float.
    Float,
    /// Brain float (8-bit exponent, truncated mantissa).
    BFloat,
    /// Opaque 64-bit pointer passed through to extern calls.
    Handle,
}

/// A scalar or SIMD vector type: (code, bits, lanes).
///
/// Invariants, enforced by the constructors:
/// - `bits` is one of 1, 8, 16, 32, 64
/// - `Handle` types always have 64 bits
/// - `lanes >= 1`; `lanes > 1` denotes a SIMD vector
/// - the boolean type is `UInt` with 1 bit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Type {
    code: TypeCode,
    bits: u8,
    lanes: u16,
}

const VALID_BITS: [u8; 5] = [1, 8, 16, 32, 64];

impl Type {
    /// Construct a type, checking the representation invariants.
    ///
    /// # Panics
    ///
    /// Panics on an invalid (code, bits, lanes) combination. Invalid type
    /// construction is a programmer error, not a user-input error.
    pub fn new(code: TypeCode, bits: u8, lanes: u16) -> Self {
        assert!(VALID_BITS.contains(&bits), "invalid bit width {bits} for {code}");
        assert!(lanes >= 1, "lane count must be at least 1");
        match code {
            TypeCode::Handle => assert_eq!(bits, 64, "handle types are 64-bit"),
            TypeCode::Float => assert!(bits >= 16, "float types are 16, 32 or 64-bit"),
            TypeCode::BFloat => assert_eq!(bits, 16, "bfloat types are 16-bit"),
            TypeCode::Int => assert!(bits >= 8, "signed integers are at least 8-bit"),
            TypeCode::UInt => {}
        }
        Self { code, bits, lanes }
    }

    pub fn int(bits: u8) -> Self {
        Self::new(TypeCode::Int, bits, 1)
    }

    pub fn uint(bits: u8) -> Self {
        Self::new(TypeCode::UInt, bits, 1)
    }

    pub fn float(bits: u8) -> Self {
        Self::new(TypeCode::Float, bits, 1)
    }

    pub fn bfloat() -> Self {
        Self::new(TypeCode::BFloat, 16, 1)
    }

    pub fn handle() -> Self {
        Self::new(TypeCode::Handle, 64, 1)
    }

    /// The boolean type: uint with a single bit.
    pub fn bool_() -> Self {
        Self::new(TypeCode::UInt, 1, 1)
    }

    /// The canonical 32-bit signed integer used for loop variables and
    /// buffer indexing.
    pub fn int32() -> Self {
        Self::int(32)
    }

    pub fn float32() -> Self {
        Self::float(32)
    }

    pub const fn code(&self) -> TypeCode {
        self.code
    }

    pub const fn bits(&self) -> u8 {
        self.bits
    }

    pub const fn lanes(&self) -> u16 {
        self.lanes
    }

    /// Storage size of one element in bytes (bits rounded up).
    pub const fn bytes(&self) -> usize {
        (self.bits as usize).div_ceil(8)
    }

    /// The scalar element type of this type (lanes = 1).
    pub const fn element_of(&self) -> Self {
        Self { code: self.code, bits: self.bits, lanes: 1 }
    }

    /// The same element type with a different lane count.
    pub fn with_lanes(&self, lanes: u16) -> Self {
        Self::new(self.code, self.bits, lanes)
    }

    pub const fn is_scalar(&self) -> bool {
        self.lanes == 1
    }

    pub const fn is_vector(&self) -> bool {
        self.lanes > 1
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self.code, TypeCode::UInt) && self.bits == 1
    }

    pub const fn is_int(&self) -> bool {
        matches!(self.code, TypeCode::Int)
    }

    pub const fn is_uint(&self) -> bool {
        matches!(self.code, TypeCode::UInt)
    }

    /// Signed or unsigned integer (bool counts as uint).
    pub const fn is_integral(&self) -> bool {
        self.is_int() || self.is_uint()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self.code, TypeCode::Float | TypeCode::BFloat)
    }

    pub const fn is_handle(&self) -> bool {
        matches!(self.code, TypeCode::Handle)
    }

    /// Whether every value of `other` is exactly representable in `self`.
    ///
    /// Used to decide when casts are value-preserving and may be pushed
    /// through arithmetic by the simplifier. Lane counts must match.
    pub fn can_represent(&self, other: &Type) -> bool {
        if self.lanes != other.lanes {
            return false;
        }
        match (self.code, other.code) {
            (TypeCode::Int, TypeCode::Int) => self.bits >= other.bits,
            (TypeCode::Int, TypeCode::UInt) => self.bits > other.bits,
            (TypeCode::UInt, TypeCode::UInt) => self.bits >= other.bits,
            // Floats represent small integers exactly: f32 has a 24-bit
            // significand, f64 a 53-bit one, bf16 an 8-bit one.
            (TypeCode::Float | TypeCode::BFloat, TypeCode::Int | TypeCode::UInt) => {
                let mantissa: u8 = match (self.code, self.bits) {
                    (TypeCode::BFloat, _) => 8,
                    (_, 16) => 11,
                    (_, 32) => 24,
                    (_, 64) => 53,
                    _ => 0,
                };
                let value_bits = if other.is_int() { other.bits - 1 } else { other.bits };
                mantissa >= value_bits
            }
            (TypeCode::Float, TypeCode::Float) => self.bits >= other.bits,
            (TypeCode::Float, TypeCode::BFloat) => self.bits >= 32,
            (TypeCode::BFloat, TypeCode::BFloat) => true,
            (TypeCode::Handle, TypeCode::Handle) => true,
            _ => false,
        }
    }

    /// Whether the signed constant `v` is exactly representable.
    pub fn can_represent_i64(&self, v: i64) -> bool {
        match self.code {
            TypeCode::Int => {
                if self.bits >= 64 {
                    return true;
                }
                let half = 1i64 << (self.bits - 1);
                (-half..half).contains(&v)
            }
            TypeCode::UInt => {
                if v < 0 {
                    return false;
                }
                self.bits >= 64 || v < (1i64 << self.bits)
            }
            TypeCode::Float | TypeCode::BFloat => true,
            TypeCode::Handle => false,
        }
    }

    /// Maximum representable value for integral types, as i64.
    ///
    /// Returns `None` for floats, handles, and uint64 (whose max exceeds
    /// i64::MAX).
    pub fn max_value(&self) -> Option<i64> {
        match self.code {
            TypeCode::Int => Some(if self.bits >= 64 { i64::MAX } else { (1i64 << (self.bits - 1)) - 1 }),
            TypeCode::UInt if self.bits < 64 => Some((1i64 << self.bits) - 1),
            _ => None,
        }
    }

    /// Minimum representable value for integral types, as i64.
    pub fn min_value(&self) -> Option<i64> {
        match self.code {
            TypeCode::Int => Some(if self.bits >= 64 { i64::MIN } else { -(1i64 << (self.bits - 1)) }),
            TypeCode::UInt => Some(0),
            _ => None,
        }
    }
}

impl std::fmt::Display for Type {
    /// Canonical spelling: `int32`, `uint1`, `float64`, `bfloat16`,
    /// `handle64`; vectors append `x<lanes>`, e.g. `float32x8`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.code, self.bits)?;
        if self.lanes > 1 {
            write!(f, "x{}", self.lanes)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Type {
    type Err = String;

    /// Parse the canonical `Display` spelling back into a type.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use strum::IntoEnumIterator;

        let (elem, lanes) = match s.split_once('x') {
            Some((elem, lanes)) => {
                (elem, lanes.parse::<u16>().map_err(|_| format!("bad lane count in type {s:?}"))?)
            }
            None => (s, 1),
        };
        for code in TypeCode::iter() {
            let prefix = code.to_string();
            if let Some(bits) = elem.strip_prefix(&prefix) {
                let bits = bits.parse::<u8>().map_err(|_| format!("bad bit width in type {s:?}"))?;
                return Ok(Type::new(code, bits, lanes));
            }
        }
        Err(format!("unknown type {s:?}"))
    }
}
