//! Reader for the canonical expression form.
//!
//! Parses exactly what the printer in [`crate::printer`] emits for
//! expressions, so `parse(print(e))` is structurally equal to `e` for any
//! simplified expression. Free variables read back as int32 (the type of
//! every loop variable) and loads as float32 unless spelled through a
//! cast; statements have no reader - golden tests compare printed text.

use std::str::FromStr;

use crate::error::{Error, Result};
use crate::expr::Expr;
use crate::types::{BinaryOp, CallType};
use rill_dtype::Type;

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

/// Parse the canonical form of an expression.
pub fn parse_expr(src: &str) -> Result<Expr> {
    let mut p = Parser { src, pos: 0 };
    let e = p.expr()?;
    p.skip_ws();
    if p.pos != p.src.len() {
        return Err(p.error("trailing input"));
    }
    Ok(e)
}

impl<'a> Parser<'a> {
    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse { message: message.into(), offset: self.pos }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.src.len() - trimmed.len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) { Ok(()) } else { Err(self.error(format!("expected {token:?}"))) }
    }

    fn ident(&mut self) -> Result<String> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(i, c)| {
                if *i == 0 {
                    !(c.is_ascii_alphabetic() || *c == '_')
                } else {
                    !(c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '$')
                }
            })
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        if end == 0 {
            return Err(self.error("expected identifier"));
        }
        let name = &rest[..end];
        self.pos += end;
        Ok(name.to_string())
    }

    fn number(&mut self, negative: bool) -> Result<Expr> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '-' | '+')))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        // The scan above is greedy about '-'/'+': only keep them when they
        // follow an exponent marker.
        let mut digits = &rest[..end];
        let mut cut = digits.len();
        let bytes = digits.as_bytes();
        for i in 1..bytes.len() {
            if (bytes[i] == b'-' || bytes[i] == b'+') && !(bytes[i - 1] == b'e' || bytes[i - 1] == b'E') {
                cut = i;
                break;
            }
        }
        digits = &digits[..cut];
        if digits.is_empty() {
            return Err(self.error("expected number"));
        }
        self.pos += digits.len();

        let is_float = digits.contains('.') || digits.contains('e') || digits.contains('E');
        if is_float {
            let v: f64 = digits.parse().map_err(|_| self.error("bad float literal"))?;
            let v = if negative { -v } else { v };
            if self.eat("f") {
                Ok(Expr::imm(Type::float32(), crate::types::ConstValue::Float(v)))
            } else {
                Ok(Expr::imm(Type::float(64), crate::types::ConstValue::Float(v)))
            }
        } else if self.eat("u") {
            let v: u64 = digits.parse().map_err(|_| self.error("bad uint literal"))?;
            Ok(Expr::uint(Type::uint(32), v))
        } else {
            let v: i64 = digits.parse().map_err(|_| self.error("bad int literal"))?;
            Ok(Expr::int(if negative { -v } else { v }))
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>> {
        self.expect("(")?;
        let mut out = Vec::new();
        if !self.eat(")") {
            loop {
                out.push(self.expr()?);
                if !self.eat(",") {
                    break;
                }
            }
            self.expect(")")?;
        }
        Ok(out)
    }

    fn binop(&mut self) -> Result<BinaryOp> {
        // Two-character operators first.
        for (tok, op) in [
            ("==", BinaryOp::Eq),
            ("!=", BinaryOp::Ne),
            ("<=", BinaryOp::Le),
            (">=", BinaryOp::Ge),
            ("&&", BinaryOp::And),
            ("||", BinaryOp::Or),
            ("<", BinaryOp::Lt),
            (">", BinaryOp::Gt),
            ("+", BinaryOp::Add),
            ("-", BinaryOp::Sub),
            ("*", BinaryOp::Mul),
            ("/", BinaryOp::Div),
            ("%", BinaryOp::Mod),
        ] {
            if self.eat(tok) {
                return Ok(op);
            }
        }
        Err(self.error("expected binary operator"))
    }

    fn expr(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('(') => {
                self.expect("(")?;
                if self.eat("let ") {
                    let name = self.ident()?;
                    self.expect("=")?;
                    let value = self.expr()?;
                    self.expect("in")?;
                    let body = self.expr()?;
                    self.expect(")")?;
                    return Ok(Expr::let_(name, value, body));
                }
                let lhs = self.expr()?;
                let op = self.binop()?;
                let rhs = self.expr()?;
                self.expect(")")?;
                Expr::try_binary(op, lhs, rhs)
            }
            _ => self.primary(),
        }
    }

    fn index_list(&mut self) -> Result<Vec<u16>> {
        self.expect("[")?;
        let mut out = Vec::new();
        if !self.eat("]") {
            loop {
                self.skip_ws();
                let digits: String = self.rest().chars().take_while(|c| c.is_ascii_digit()).collect();
                if digits.is_empty() {
                    return Err(self.error("expected lane index"));
                }
                self.pos += digits.len();
                out.push(digits.parse::<u16>().map_err(|_| self.error("bad lane index"))?);
                if !self.eat(",") {
                    break;
                }
            }
            self.expect("]")?;
        }
        Ok(out)
    }

    fn call_like(&mut self, call_type: CallType) -> Result<Expr> {
        let name = self.ident()?;
        let args = self.args()?;
        let value_index = if self.eat(".") {
            let digits: String = self.rest().chars().take_while(|c| c.is_ascii_digit()).collect();
            self.pos += digits.len();
            digits.parse::<usize>().map_err(|_| self.error("bad tuple index"))?
        } else {
            0
        };
        Ok(Expr::call_indexed(Type::float32(), name, args, call_type, value_index))
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some('-') => {
                self.expect("-")?;
                self.skip_ws();
                if self.rest().chars().next().is_some_and(|c| c.is_ascii_digit()) {
                    self.number(true)
                } else {
                    Ok(Expr::neg(self.expr()?))
                }
            }
            Some('!') => {
                self.expect("!")?;
                Ok(Expr::not(self.expr()?))
            }
            Some('@') => {
                self.expect("@")?;
                self.call_like(CallType::Intrinsic)
            }
            Some('~') => {
                self.expect("~")?;
                self.call_like(CallType::Extern)
            }
            Some('"') => {
                self.expect("\"")?;
                let rest = self.rest();
                let end = rest.find('"').ok_or_else(|| self.error("unterminated string"))?;
                let s = rest[..end].to_string();
                self.pos += end + 1;
                Ok(Expr::string_imm(s))
            }
            Some(c) if c.is_ascii_digit() => self.number(false),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.keyword_or_name(),
            _ => Err(self.error("expected expression")),
        }
    }

    fn keyword_or_name(&mut self) -> Result<Expr> {
        let name = self.ident()?;
        match name.as_str() {
            "true" => return Ok(Expr::bool_(true)),
            "false" => return Ok(Expr::bool_(false)),
            "min" | "max" => {
                let args = self.args()?;
                let [a, b] = <[Expr; 2]>::try_from(args).map_err(|_| self.error("min/max take 2 args"))?;
                let op = if name == "min" { BinaryOp::Min } else { BinaryOp::Max };
                return Expr::try_binary(op, a, b);
            }
            "select" => {
                let args = self.args()?;
                let [c, t, f] = <[Expr; 3]>::try_from(args).map_err(|_| self.error("select takes 3 args"))?;
                return Expr::try_select(c, t, f);
            }
            "ramp" => {
                let args = self.args()?;
                let [base, stride, lanes] =
                    <[Expr; 3]>::try_from(args).map_err(|_| self.error("ramp takes 3 args"))?;
                let lanes = lanes.as_const_i64().ok_or_else(|| self.error("ramp lanes must be constant"))?;
                return Ok(Expr::ramp(base, stride, lanes as u16));
            }
            "broadcast" => {
                let args = self.args()?;
                let [value, lanes] =
                    <[Expr; 2]>::try_from(args).map_err(|_| self.error("broadcast takes 2 args"))?;
                let lanes =
                    lanes.as_const_i64().ok_or_else(|| self.error("broadcast lanes must be constant"))?;
                return Ok(Expr::broadcast(value, lanes as u16));
            }
            "shuffle" => {
                self.expect("(")?;
                self.expect("[")?;
                let mut vectors = Vec::new();
                loop {
                    vectors.push(self.expr()?);
                    if !self.eat(",") {
                        break;
                    }
                }
                self.expect("]")?;
                self.expect(",")?;
                let indices = self.index_list()?;
                self.expect(")")?;
                return Expr::shuffle(vectors, indices);
            }
            _ => {}
        }

        // A type name applied to an argument is a cast (or a typed
        // immediate, which the cast constructor folds back).
        if let Ok(ty) = Type::from_str(&name) {
            self.expect("(")?;
            self.skip_ws();
            let is_literal = self.rest().chars().next().is_some_and(|c| c.is_ascii_digit() || c == '-');
            let inner = self.expr()?;
            self.expect(")")?;
            if is_literal && let Some(v) = inner.as_const() {
                return Ok(Expr::imm(ty, v));
            }
            return Ok(Expr::cast(ty, inner));
        }

        match self.peek() {
            Some('(') => {
                let args = self.args()?;
                let value_index = if self.eat(".") {
                    let digits: String = self.rest().chars().take_while(|c| c.is_ascii_digit()).collect();
                    self.pos += digits.len();
                    digits.parse::<usize>().map_err(|_| self.error("bad tuple index"))?
                } else {
                    0
                };
                Ok(Expr::call_indexed(Type::float32(), name, args, CallType::Function, value_index))
            }
            Some('[') => {
                self.expect("[")?;
                let index = self.expr()?;
                let predicate = if self.eat("if") { Some(self.expr()?) } else { None };
                self.expect("]")?;
                let lanes = index.ty().lanes();
                Ok(Expr::load(Type::float32().with_lanes(lanes), name, index, predicate))
            }
            _ => Ok(Expr::var(name)),
        }
    }
}
