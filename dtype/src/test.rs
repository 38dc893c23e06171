//! Type model tests.

use std::str::FromStr;

use test_case::test_case;

use crate::{Type, promote};

#[test]
fn bool_is_uint1() {
    let b = Type::bool_();
    assert!(b.is_bool());
    assert!(b.is_uint());
    assert_eq!(b.bits(), 1);
}

#[test]
fn handle_is_64_bit() {
    assert_eq!(Type::handle().bits(), 64);
}

#[test]
#[should_panic]
fn handle_rejects_other_widths() {
    Type::new(crate::TypeCode::Handle, 32, 1);
}

#[test]
fn vector_element_round_trip() {
    let v = Type::float32().with_lanes(8);
    assert!(v.is_vector());
    assert_eq!(v.element_of(), Type::float32());
    assert_eq!(v.bytes(), 4);
}

#[test_case(Type::int(32), Type::int(8), true; "wider int holds narrower")]
#[test_case(Type::int(32), Type::uint(32), false; "same width uint does not fit int")]
#[test_case(Type::int(64), Type::uint(32), true; "int64 holds uint32")]
#[test_case(Type::float(32), Type::int(16), true; "f32 holds int16 exactly")]
#[test_case(Type::float(32), Type::int(32), false; "f32 cannot hold all int32")]
#[test_case(Type::float(64), Type::int(32), true; "f64 holds int32 exactly")]
fn representability(a: Type, b: Type, expect: bool) {
    assert_eq!(a.can_represent(&b), expect);
}

#[test_case(Type::int(32), Type::int(8), Type::int(32); "wider int wins")]
#[test_case(Type::int(32), Type::uint(32), Type::uint(32); "equal width goes unsigned")]
#[test_case(Type::float(32), Type::int(64), Type::float(32); "float beats int")]
#[test_case(Type::bfloat(), Type::float(16), Type::float(32); "bfloat mix widens to f32")]
fn promotion(a: Type, b: Type, expect: Type) {
    assert_eq!(promote(&a, &b), Some(expect));
    assert_eq!(promote(&b, &a), Some(expect));
}

#[test]
fn promotion_broadcasts_scalars() {
    let v = Type::float32().with_lanes(4);
    assert_eq!(promote(&v, &Type::float32()), Some(v));
    assert_eq!(promote(&v, &Type::float32().with_lanes(8)), None);
}

#[test_case("int32"; "scalar int")]
#[test_case("uint1"; "bool spelling")]
#[test_case("float32x8"; "vector float")]
#[test_case("bfloat16"; "bfloat")]
#[test_case("handle64"; "handle")]
fn display_parse_round_trip(spelling: &str) {
    let ty = Type::from_str(spelling).unwrap();
    assert_eq!(ty.to_string(), spelling);
}

mod props {
    use proptest::prelude::*;

    use crate::{Type, TypeCode, promote};

    fn arb_type() -> impl Strategy<Value = Type> {
        prop_oneof![
            prop_oneof![Just(8u8), Just(16), Just(32), Just(64)].prop_map(Type::int),
            prop_oneof![Just(1u8), Just(8), Just(16), Just(32), Just(64)].prop_map(Type::uint),
            prop_oneof![Just(16u8), Just(32), Just(64)].prop_map(Type::float),
            Just(Type::bfloat()),
        ]
    }

    proptest! {
        #[test]
        fn can_represent_is_reflexive(ty in arb_type()) {
            prop_assert!(ty.can_represent(&ty));
        }

        #[test]
        fn promotion_is_commutative(a in arb_type(), b in arb_type()) {
            prop_assert_eq!(promote(&a, &b), promote(&b, &a));
        }

        #[test]
        fn promoted_type_is_no_narrower(a in arb_type(), b in arb_type()) {
            if let Some(p) = promote(&a, &b) {
                if p.code() != TypeCode::Float && p.code() != TypeCode::BFloat {
                    prop_assert!(p.bits() >= a.bits() && p.bits() >= b.bits());
                }
            }
        }
    }
}
