//! Constant folding over literal operands.
//!
//! Arithmetic is exact over rationals unless one of the operands is
//! already a float. Every helper returns `None` when it declines to
//! fold, e.g. on overflow or when an operand has the wrong kind.

use std::cmp::Ordering;

use crate::expression::hint::compare_comparable;
use crate::expression::node::Node;
use crate::expression::operator::{ArithOp, CmpOp};
use crate::expression::rational::Rational;
use crate::expression::type_checker::CAST_STRING_SOURCES;
use crate::expression::types::TypeSet;

/// Evaluate `l op r` for two constants.
pub fn compare(op: CmpOp, l: &Node, r: &Node) -> Option<bool> {
    if let Some(ord) = compare_comparable(l, r) {
        return match op {
            CmpOp::Eq => Some(ord == Ordering::Equal),
            CmpOp::Ne => Some(ord != Ordering::Equal),
            CmpOp::Lt => Some(ord == Ordering::Less),
            CmpOp::Le => Some(ord != Ordering::Greater),
            CmpOp::Gt => Some(ord == Ordering::Greater),
            CmpOp::Ge => Some(ord != Ordering::Less),
            CmpOp::Like | CmpOp::Ilike => None,
        };
    }
    // NaN
    if l.is_number() && r.is_number() {
        return None;
    }
    match op {
        CmpOp::Eq => Some(l.equals(r)),
        CmpOp::Ne => Some(!l.equals(r)),
        _ => None,
    }
}

/// The value of a numeric literal as a float.
pub fn as_f64(n: &Node) -> Option<f64> {
    match n {
        Node::Integer(i) => Some(*i as f64),
        Node::Float(f) => Some(*f),
        Node::Rational(r) => Some(r.to_f64()),
        _ => None,
    }
}

/// An exact value as an integer literal when it fits, else a rational.
pub fn exact(r: Rational) -> Node {
    r.to_i64().map_or(Node::Rational(r), Node::Integer)
}

/// Fold `l op r` for two numeric literals.
///
/// Division and remainder by zero fold to MISSING.
pub fn arith(op: ArithOp, l: &Node, r: &Node) -> Option<Node> {
    if op.is_bitwise() {
        return bitwise(op, l, r).map(Node::Integer);
    }
    if matches!(l, Node::Float(_)) || matches!(r, Node::Float(_)) {
        return float_arith(op, as_f64(l)?, as_f64(r)?);
    }
    let (a, b) = (l.as_rational()?, r.as_rational()?);
    let out = match op {
        ArithOp::Add => a.checked_add(&b)?,
        ArithOp::Sub => a.checked_sub(&b)?,
        ArithOp::Mul => a.checked_mul(&b)?,
        ArithOp::Div | ArithOp::Mod if b.is_zero() => return Some(Node::Missing),
        ArithOp::Div => a.checked_div(&b)?,
        ArithOp::Mod => a.checked_rem(&b)?,
        _ => return None,
    };
    if matches!((l, r), (Node::Integer(_), Node::Integer(_))) {
        Some(exact(out))
    } else {
        Some(Node::Rational(out))
    }
}

fn float_arith(op: ArithOp, a: f64, b: f64) -> Option<Node> {
    let out = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div | ArithOp::Mod if b == 0.0 => return Some(Node::Missing),
        ArithOp::Div => a / b,
        ArithOp::Mod => a % b,
        _ => return None,
    };
    out.is_finite().then_some(Node::Float(out))
}

// Operands are truncated to integers. Shifting by 64 or more bits
// yields zero, or the sign for an arithmetic right shift.
fn bitwise(op: ArithOp, l: &Node, r: &Node) -> Option<i64> {
    let a = l.as_rational()?.trunc().to_i64()?;
    let b = r.as_rational()?.trunc().to_i64()?;
    let shift = u32::try_from(b).ok().filter(|s| *s < 64);
    Some(match op {
        ArithOp::BitAnd => a & b,
        ArithOp::BitOr => a | b,
        ArithOp::BitXor => a ^ b,
        ArithOp::ShiftLeft => shift.map_or(0, |s| a << s),
        ArithOp::ShiftRightArithmetic => shift.map_or(a >> 63, |s| a >> s),
        ArithOp::ShiftRightLogical => shift.map_or(0, |s| ((a as u64) >> s) as i64),
        _ => return None,
    })
}

/// Fold `-n` for a numeric literal.
pub fn negate(n: &Node) -> Option<Node> {
    match n {
        Node::Integer(i) => i.checked_neg().map(Node::Integer),
        Node::Float(f) => Some(Node::Float(-f)),
        Node::Rational(r) => r.checked_neg().map(Node::Rational),
        _ => None,
    }
}

/// Fold `~n` for an integer literal.
pub fn bit_not(n: &Node) -> Option<Node> {
    match n {
        Node::Integer(i) => Some(Node::Integer(!i)),
        _ => None,
    }
}

/// The source types a CAST to `to` can succeed on.
pub fn cast_sources(to: TypeSet) -> TypeSet {
    match to {
        TypeSet::MISSING | TypeSet::NULL => TypeSet::ANY,
        TypeSet::BOOL => TypeSet::INTEGER | TypeSet::BOOL,
        TypeSet::FLOAT | TypeSet::INTEGER => TypeSet::NUMERIC | TypeSet::BOOL,
        TypeSet::STRING => CAST_STRING_SOURCES,
        other => other,
    }
}

/// Fold `CAST(n AS to)` for a constant.
pub fn cast(n: &Node, to: TypeSet) -> Option<Node> {
    match (to, n) {
        (TypeSet::FLOAT, Node::Float(_)) | (TypeSet::INTEGER, Node::Integer(_)) => None,
        (TypeSet::FLOAT, Node::Bool(b)) => Some(Node::Float(if *b { 1.0 } else { 0.0 })),
        (TypeSet::FLOAT, _) => as_f64(n).filter(|f| f.is_finite()).map(Node::Float),
        (TypeSet::INTEGER, Node::Bool(b)) => Some(Node::Integer(i64::from(*b))),
        (TypeSet::INTEGER, _) => Some(exact(n.as_rational()?.trunc())),
        (TypeSet::BOOL, Node::Integer(i)) => Some(Node::Bool(*i != 0)),
        (TypeSet::STRING, _) if n.is_number() => {
            let r = n.as_rational()?;
            r.is_integer().then(|| Node::String(r.numer().to_string()))
        }
        _ => None,
    }
}

/// The TYPE_BIT of a constant or MISSING.
pub fn type_bit(n: &Node) -> Option<i64> {
    Some(match n {
        Node::Missing => 0,
        Node::Null => 1,
        Node::Bool(_) => 1 << 1,
        Node::Integer(_) | Node::Float(_) | Node::Rational(_) => 1 << 2,
        Node::Timestamp(_) => 1 << 3,
        Node::String(_) => 1 << 4,
        Node::List(_) => 1 << 5,
        Node::Struct(_) => 1 << 6,
        _ => return None,
    })
}

/// Whether a LIKE pattern has no wildcards.
pub fn like_is_literal(pattern: &str) -> bool {
    !pattern.contains(|c| c == '%' || c == '_')
}

/// The search term of a `%term%` pattern with no other wildcards.
pub fn like_substring(pattern: &str) -> Option<&str> {
    let term = pattern.strip_prefix('%')?.strip_suffix('%')?;
    (!term.is_empty() && like_is_literal(term)).then_some(term)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Many,
    One,
    Char(char),
}

fn tokens(pattern: &str, escape: Option<char>) -> Vec<Token> {
    let mut out = Vec::new();
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        out.push(match c {
            c if Some(c) == escape => Token::Char(chars.next().unwrap_or(c)),
            '%' => Token::Many,
            '_' => Token::One,
            c => Token::Char(c),
        });
    }
    out
}

fn same_char(a: char, b: char, case_insensitive: bool) -> bool {
    a == b || (case_insensitive && a.to_lowercase().eq(b.to_lowercase()))
}

/// Evaluate `s LIKE pattern` (or ILIKE when `case_insensitive`).
pub fn like(s: &str, pattern: &str, escape: Option<char>, case_insensitive: bool) -> bool {
    let pat = tokens(pattern, escape);
    let text: Vec<char> = s.chars().collect();
    let (mut ti, mut pi) = (0, 0);
    // pattern position after the last `%` and the text position it matched up to
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < text.len() {
        match pat.get(pi) {
            Some(Token::Many) => {
                backtrack = Some((pi + 1, ti));
                pi += 1;
                continue;
            }
            Some(Token::One) => {
                pi += 1;
                ti += 1;
                continue;
            }
            Some(Token::Char(c)) if same_char(*c, text[ti], case_insensitive) => {
                pi += 1;
                ti += 1;
                continue;
            }
            _ => {}
        }
        match backtrack {
            Some((p, t)) => {
                pi = p;
                ti = t + 1;
                backtrack = Some((p, t + 1));
            }
            None => return false,
        }
    }
    pat[pi..].iter().all(|t| *t == Token::Many)
}
