//! Operator enums and constant values shared by every IR node.

use rill_dtype::Type;

/// Unary operations on expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::Display)]
pub enum UnaryOp {
    /// Arithmetic negation.
    Neg,
    /// Boolean negation.
    Not,
}

/// Binary operations on expressions.
///
/// Both operands always have the same [`Type`]; the frontend promotes mixed
/// operands before a node is built. Comparisons produce a boolean with the
/// operand lane count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::Display)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Division. Integer division rounds toward negative infinity.
    Div,
    /// Remainder. For integers the result takes the sign of the divisor.
    Mod,
    Min,
    Max,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinaryOp {
    pub const fn is_commutative(&self) -> bool {
        matches!(self, Self::Add | Self::Mul | Self::Min | Self::Max | Self::Eq | Self::Ne | Self::And | Self::Or)
    }

    pub const fn is_comparison(&self) -> bool {
        matches!(self, Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    pub const fn is_boolean(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// The infix spelling used by the canonical printer, if the operator
    /// prints infix (min/max print as calls).
    pub const fn symbol(&self) -> Option<&'static str> {
        Some(match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Min | Self::Max => return None,
        })
    }
}

/// What kind of thing a `Call` expression refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallType {
    /// A compiler-known operation lowered by the backend (e.g. `likely`).
    Intrinsic,
    /// A free function resolved by the runtime linker.
    Extern,
    /// A call to another pipeline function, replaced by loads during
    /// storage flattening.
    Function,
    /// A multi-dimensional read of an input buffer, replaced by loads
    /// during storage flattening.
    Image,
}

/// Execution discipline of a `For` loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(strum::EnumIter, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ForKind {
    Serial,
    Parallel,
    Vectorized,
    Unrolled,
    GpuBlock,
    GpuThread,
}

impl ForKind {
    pub const fn is_gpu(&self) -> bool {
        matches!(self, Self::GpuBlock | Self::GpuThread)
    }

    /// Whether iterations may observe each other's effects in order.
    pub const fn is_serial(&self) -> bool {
        matches!(self, Self::Serial | Self::Unrolled)
    }
}

/// Where an allocation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[derive(strum::EnumIter, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum MemoryType {
    /// Chosen by the compiler: stack when small and constant-sized,
    /// heap otherwise.
    #[default]
    Auto,
    Heap,
    Stack,
    Register,
    GpuShared,
    GpuTexture,
}

/// A scalar constant as manipulated by constant folding and the
/// interpreter. The carrying [`Type`] lives on the expression node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstValue {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl ConstValue {
    /// Interpret as a boolean. Any nonzero value is true.
    pub fn as_bool(&self) -> bool {
        match self {
            Self::Int(v) => *v != 0,
            Self::UInt(v) => *v != 0,
            Self::Float(v) => *v != 0.0,
        }
    }

    /// The value as an i64 if it is integral and fits.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            Self::Float(_) => None,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Int(v) => *v as f64,
            Self::UInt(v) => *v as f64,
            Self::Float(v) => *v,
        }
    }

    /// Re-type a constant into `ty`'s value domain, wrapping unsigned
    /// values and truncating floats like a cast would.
    pub fn cast_to(&self, ty: &Type) -> ConstValue {
        if ty.is_float() {
            return ConstValue::Float(self.as_f64());
        }
        let wide = match self {
            Self::Int(v) => *v as i128,
            Self::UInt(v) => *v as i128,
            Self::Float(v) => *v as i128,
        };
        if ty.is_uint() {
            let bits = ty.bits() as u32;
            let masked = if bits >= 64 { wide as u64 } else { (wide as u64) & ((1u64 << bits) - 1) };
            ConstValue::UInt(masked)
        } else {
            let bits = ty.bits() as u32;
            let v = if bits >= 64 {
                wide as i64
            } else {
                // Sign-extend the low `bits` bits.
                let shift = 64 - bits;
                (((wide as i64) << shift) >> shift) as i64
            };
            ConstValue::Int(v)
        }
    }
}
