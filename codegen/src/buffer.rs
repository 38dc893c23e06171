//! Runtime buffer descriptors.
//!
//! A [`Buffer`] is the sole interface by which generated code receives
//! inputs and writes outputs: a host allocation plus one
//! (min, extent, stride) triple per dimension. Strides are element
//! counts, not byte counts.

use rill_dtype::Type;
use rill_ir::ConstValue;

use crate::error::RuntimeError;

/// One dimension of a buffer: coordinates span `[min, min + extent)`,
/// consecutive coordinates are `stride` elements apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimSpec {
    pub min: i64,
    pub extent: i64,
    pub stride: i64,
}

/// A host-side buffer with typed element storage.
///
/// The interpreter backend reads and writes elements as [`ConstValue`]s
/// in the declared element type's domain. The `device` handle is an
/// opaque tag maintained by device-copy intrinsics.
#[derive(Debug, Clone)]
pub struct Buffer {
    ty: Type,
    dims: Vec<DimSpec>,
    data: Vec<ConstValue>,
    /// Nonzero after a copy-to-device; purely bookkeeping for the
    /// interpreter.
    pub device: u64,
}

impl Buffer {
    /// A dense buffer: stride 1 in the first dimension, then row-major
    /// products. Elements start at the type's zero.
    pub fn new_dense(ty: Type, extents: &[i64]) -> Self {
        let mut dims = Vec::with_capacity(extents.len());
        let mut stride = 1i64;
        for &extent in extents {
            dims.push(DimSpec { min: 0, extent, stride });
            stride *= extent.max(1);
        }
        let total = extents.iter().product::<i64>().max(0) as usize;
        let zero = if ty.is_float() {
            ConstValue::Float(0.0)
        } else if ty.is_uint() {
            ConstValue::UInt(0)
        } else {
            ConstValue::Int(0)
        };
        Self { ty, dims, data: vec![zero; total], device: 0 }
    }

    /// A dense buffer whose dimensions start at the given minima.
    pub fn new_spanning(ty: Type, ranges: &[(i64, i64)]) -> Self {
        let extents: Vec<i64> = ranges.iter().map(|&(_, e)| e).collect();
        let mut buf = Self::new_dense(ty, &extents);
        for (dim, &(min, _)) in buf.dims.iter_mut().zip(ranges) {
            dim.min = min;
        }
        buf
    }

    /// A dense buffer filled by a coordinate function.
    pub fn from_fn(ty: Type, extents: &[i64], f: impl Fn(&[i64]) -> ConstValue) -> Self {
        let ranges: Vec<(i64, i64)> = extents.iter().map(|&e| (0, e)).collect();
        Self::from_fn_spanning(ty, &ranges, f)
    }

    /// A spanning buffer filled by a coordinate function.
    pub fn from_fn_spanning(ty: Type, ranges: &[(i64, i64)], f: impl Fn(&[i64]) -> ConstValue) -> Self {
        let mut buf = Self::new_spanning(ty, ranges);
        if buf.is_empty() {
            return buf;
        }
        let mut coord: Vec<i64> = ranges.iter().map(|&(min, _)| min).collect();
        'fill: loop {
            let value = f(&coord).cast_to(&ty);
            let index = buf.flat_index(&coord).unwrap_or(0);
            buf.data[index as usize] = value;
            // Odometer increment, first coordinate fastest.
            for d in 0..ranges.len() {
                coord[d] += 1;
                if coord[d] < ranges[d].0 + ranges[d].1 {
                    continue 'fill;
                }
                coord[d] = ranges[d].0;
            }
            break;
        }
        buf
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn dims(&self) -> &[DimSpec] {
        &self.dims
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn flat_index(&self, coord: &[i64]) -> Result<i64, RuntimeError> {
        let mut index = 0;
        for (d, (&c, spec)) in coord.iter().zip(&self.dims).enumerate() {
            if c < spec.min || c >= spec.min + spec.extent {
                return Err(RuntimeError::bounds(format!(
                    "coordinate {c} outside [{}, {}) in dimension {d}",
                    spec.min,
                    spec.min + spec.extent
                )));
            }
            index += (c - spec.min) * spec.stride;
        }
        Ok(index)
    }

    /// Read by multi-dimensional coordinate.
    pub fn at(&self, coord: &[i64]) -> Result<ConstValue, RuntimeError> {
        let index = self.flat_index(coord)?;
        self.get_flat(index)
    }

    /// Write by multi-dimensional coordinate.
    pub fn set(&mut self, coord: &[i64], value: ConstValue) -> Result<(), RuntimeError> {
        let index = self.flat_index(coord)?;
        self.set_flat(index, value)
    }

    /// Read by flat element offset (what lowered loads use).
    pub fn get_flat(&self, index: i64) -> Result<ConstValue, RuntimeError> {
        self.data
            .get(usize::try_from(index).map_err(|_| bad_index(index, self.data.len()))?)
            .copied()
            .ok_or_else(|| bad_index(index, self.data.len()))
    }

    /// Write by flat element offset (what lowered stores use).
    pub fn set_flat(&mut self, index: i64, value: ConstValue) -> Result<(), RuntimeError> {
        let len = self.data.len();
        let slot = self
            .data
            .get_mut(usize::try_from(index).map_err(|_| bad_index(index, len))?)
            .ok_or_else(|| bad_index(index, len))?;
        *slot = value.cast_to(&self.ty);
        Ok(())
    }

    /// All elements as f64, in flat storage order. Test support.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        self.data.iter().map(ConstValue::as_f64).collect()
    }

    /// All elements as i64, in flat storage order. Test support.
    pub fn to_i64_vec(&self) -> Vec<i64> {
        self.data.iter().map(|v| v.as_i64().unwrap_or(0)).collect()
    }
}

fn bad_index(index: i64, len: usize) -> RuntimeError {
    RuntimeError::new(
        crate::error::runtime_codes::BAD_INDEX,
        format!("flat index {index} outside allocation of {len} elements"),
    )
}
