//! Target parsing and buffer descriptor tests.

use std::str::FromStr;

use test_case::test_case;

use crate::buffer::Buffer;
use crate::target::{Arch, Os, Target, TargetFeature};
use rill_dtype::Type;
use rill_ir::ConstValue;

#[test]
fn parses_full_triple_with_features() {
    let t = Target::from_str("x86-64-linux-avx2-gpu").unwrap();
    assert_eq!(t.arch, Arch::X86);
    assert_eq!(t.bits, 64);
    assert_eq!(t.os, Os::Linux);
    assert!(t.has_feature(TargetFeature::Avx2));
    assert!(t.supports_gpu());
    assert_eq!(t.to_string(), "x86-64-linux-avx2-gpu");
}

#[test_case("sparc-64-linux"; "unknown arch")]
#[test_case("x86-48-linux"; "bad word size")]
#[test_case("x86-64-plan9"; "unknown os")]
#[test_case("x86-64-linux-quantum"; "unknown feature")]
#[test_case("x86"; "too short")]
fn rejects_malformed_targets(s: &str) {
    assert!(Target::from_str(s).is_err());
}

#[test_case("arm-64-android-neon")]
#[test_case("wasm-32-wasm-simd128")]
#[test_case("hexagon-32-linux-hvx")]
#[test_case("riscv-64-linux")]
fn round_trips_valid_targets(s: &str) {
    let t = Target::from_str(s).unwrap();
    assert_eq!(t.to_string(), s);
}

#[test]
fn natural_vector_lanes_track_features() {
    assert_eq!(Target::from_str("x86-64-linux-avx512").unwrap().natural_vector_lanes(), 16);
    assert_eq!(Target::from_str("x86-64-linux-avx2").unwrap().natural_vector_lanes(), 8);
    assert_eq!(Target::from_str("arm-64-linux-neon").unwrap().natural_vector_lanes(), 4);
    assert_eq!(Target::from_str("riscv-64-linux").unwrap().natural_vector_lanes(), 1);
}

#[test]
fn dense_buffer_strides_are_row_major() {
    let buf = Buffer::new_dense(Type::float32(), &[4, 3]);
    assert_eq!(buf.len(), 12);
    assert_eq!(buf.dims()[0].stride, 1);
    assert_eq!(buf.dims()[1].stride, 4);
}

#[test]
fn buffer_coordinates_check_bounds() {
    let mut buf = Buffer::new_dense(Type::int32(), &[4]);
    buf.set(&[2], ConstValue::Int(7)).unwrap();
    assert_eq!(buf.at(&[2]).unwrap(), ConstValue::Int(7));
    assert!(buf.at(&[4]).is_err());
    assert!(buf.set(&[-1], ConstValue::Int(0)).is_err());
}

#[test]
fn from_fn_fills_in_storage_order() {
    let buf = Buffer::from_fn(Type::int32(), &[3, 2], |c| ConstValue::Int(c[0] * 10 + c[1]));
    assert_eq!(buf.to_i64_vec(), vec![0, 10, 20, 1, 11, 21]);
}

#[test]
fn stores_cast_into_element_type() {
    let mut buf = Buffer::new_dense(Type::uint(8), &[1]);
    buf.set(&[0], ConstValue::Int(300)).unwrap();
    assert_eq!(buf.at(&[0]).unwrap(), ConstValue::UInt(44));
}
