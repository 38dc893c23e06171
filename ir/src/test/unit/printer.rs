//! Canonical form printing and round-trip tests.

use test_case::test_case;

use crate::parser::parse_expr;
use crate::{Expr, ForKind, Stmt};

#[test_case("(x + 3)")]
#[test_case("((x * 8) + xi)")]
#[test_case("min(x, 7)")]
#[test_case("max((x + 1), (y - 2))")]
#[test_case("select((x < y), 1.5f, 2.5f)")]
#[test_case("(x % 4)")]
#[test_case("(let t = (x * 2) in (t + 1))")]
#[test_case("in_buf[(x + 1)]")]
#[test_case("in_buf[ramp(x, 1, 8)]")]
#[test_case("broadcast(x, 4)")]
#[test_case("int16(x)")]
#[test_case("f(x, y)")]
#[test_case("f(x, y).1")]
#[test_case("@likely(c)")]
#[test_case("~par_for(0, 10)")]
#[test_case("(x == -5)")]
#[test_case("((x <= y) && (y != z))")]
#[test_case("true")]
#[test_case("5u")]
#[test_case("uint8(255)")]
fn print_parse_round_trip(text: &str) {
    let parsed = parse_expr(text).expect("canonical text should parse");
    assert_eq!(parsed.to_string(), text);
    // Parsing the printed form gives the same interned node.
    let reparsed = parse_expr(&parsed.to_string()).expect("printed form should parse");
    assert_eq!(parsed, reparsed);
}

#[test]
fn expr_to_text_examples() {
    assert_eq!((Expr::var("x") + 1).to_string(), "(x + 1)");
    assert_eq!(Expr::min(Expr::var("x"), Expr::int(4)).to_string(), "min(x, 4)");
    assert_eq!(Expr::f32(1.0).to_string(), "1.0f");
    assert_eq!(Expr::bool_(true).to_string(), "true");
}

#[test]
fn parse_rejects_garbage() {
    assert!(parse_expr("(x +").is_err());
    assert!(parse_expr("x y").is_err());
    assert!(parse_expr("").is_err());
}

#[test]
fn stmt_printing_is_stable() {
    let body = Stmt::store("f", Expr::var("x"), Expr::var("x") + 1, None);
    let loop_ = Stmt::for_("x", Expr::int(0), Expr::int(4), ForKind::Parallel, body);
    let text = loop_.to_string();
    assert_eq!(text, "parallel (x, 0, 4) {\n  f[x] = (x + 1)\n}\n");
}

#[test]
fn realize_and_producer_print() {
    let provide = Stmt::provide("f", vec![Expr::var("x")], vec![Expr::var("x") + 1], None);
    let produce = Stmt::producer("f", provide);
    let realized = Stmt::realize(
        "f",
        vec![rill_dtype::Type::int32()],
        vec![crate::Range::new(Expr::int(0), Expr::int(4))],
        produce,
    );
    let text = realized.to_string();
    assert!(text.starts_with("realize f<int32>([0, 4]) {"));
    assert!(text.contains("produce f {"));
    assert!(text.contains("f(x) = (x + 1)"));
}
