//! Folding of the numeric builtins.

use std::cmp::Ordering;

use crate::expression::builtin::BuiltinOp;
use crate::expression::hint::compare_comparable;
use crate::expression::node::Node;
use crate::expression::simplify::fold::as_f64;

pub const ROUNDING: [BuiltinOp; 5] = [
    BuiltinOp::Round,
    BuiltinOp::RoundEven,
    BuiltinOp::Trunc,
    BuiltinOp::Floor,
    BuiltinOp::Ceil,
];

pub const FLOAT_FUNCS: [BuiltinOp; 5] = [
    BuiltinOp::Sqrt,
    BuiltinOp::Exp,
    BuiltinOp::Ln,
    BuiltinOp::Log2,
    BuiltinOp::Log10,
];

/// Fold ROUND, ROUND_EVEN, TRUNC, FLOOR or CEIL of a numeric literal.
pub fn round(op: BuiltinOp, n: &Node) -> Option<Node> {
    let v = match n {
        // every float of this magnitude is integral already
        Node::Float(f) if f.is_finite() && f.abs() >= 1e30 => return Some(Node::Float(*f)),
        _ => n.as_rational()?,
    };
    let out = match op {
        BuiltinOp::Round => v.round(),
        BuiltinOp::RoundEven => v.round_even(),
        BuiltinOp::Trunc => v.trunc(),
        BuiltinOp::Floor => v.floor(),
        BuiltinOp::Ceil => v.ceil(),
        _ => return None,
    };
    Some(match out.to_f64_exact() {
        Some(f) => Node::Float(f),
        None => Node::Rational(out),
    })
}

pub fn abs(n: &Node) -> Option<Node> {
    match n {
        Node::Integer(i) => i.checked_abs().map(Node::Integer),
        Node::Float(f) => Some(Node::Float(f.abs())),
        Node::Rational(r) => r.abs().map(Node::Rational),
        _ => None,
    }
}

pub fn sign(n: &Node) -> Option<Node> {
    match n {
        Node::Integer(i) => Some(Node::Integer(i.signum())),
        Node::Float(f) if f.is_nan() => None,
        Node::Float(f) if *f == 0.0 => Some(Node::Float(0.0)),
        Node::Float(f) => Some(Node::Float(f.signum())),
        Node::Rational(r) => Some(Node::Integer(i64::from(r.signum()))),
        _ => None,
    }
}

/// Fold one of [`FLOAT_FUNCS`]; non-finite results are not folded.
pub fn float_func(op: BuiltinOp, n: &Node) -> Option<Node> {
    let x = as_f64(n)?;
    let out = match op {
        BuiltinOp::Sqrt => x.sqrt(),
        BuiltinOp::Exp => x.exp(),
        BuiltinOp::Ln => x.ln(),
        BuiltinOp::Log2 => x.log2(),
        BuiltinOp::Log10 => x.log10(),
        _ => return None,
    };
    out.is_finite().then_some(Node::Float(out))
}

pub fn pow(base: &Node, exp: &Node) -> Option<Node> {
    let out = as_f64(base)?.powf(as_f64(exp)?);
    out.is_finite().then_some(Node::Float(out))
}

/// Fold LEAST or GREATEST over numeric literals to the selected argument.
pub fn extremum(op: BuiltinOp, args: &[Node]) -> Option<Node> {
    let want = match op {
        BuiltinOp::Least => Ordering::Less,
        BuiltinOp::Greatest => Ordering::Greater,
        _ => return None,
    };
    let (first, rest) = args.split_first()?;
    let mut best = first;
    for arg in rest {
        if !arg.is_number() || !best.is_number() {
            return None;
        }
        if compare_comparable(arg, best)? == want {
            best = arg;
        }
    }
    best.is_number().then(|| best.clone())
}

pub fn bit_count(n: &Node) -> Option<Node> {
    match n {
        Node::Integer(i) => Some(Node::Integer(i64::from(i.count_ones()))),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(round(BuiltinOp::Round, &Node::Float(3.5)), Some(Node::Float(4.0)));
        assert_eq!(round(BuiltinOp::Round, &Node::Float(-3.5)), Some(Node::Float(-3.0)));
        assert_eq!(
            round(BuiltinOp::RoundEven, &Node::Float(2.5)),
            Some(Node::Float(2.0))
        );
        assert_eq!(round(BuiltinOp::Trunc, &Node::Float(-3.7)), Some(Node::Float(-3.0)));
        assert_eq!(round(BuiltinOp::Floor, &Node::Float(-3.2)), Some(Node::Float(-4.0)));
        assert_eq!(round(BuiltinOp::Ceil, &Node::Float(3.2)), Some(Node::Float(4.0)));
        assert_eq!(round(BuiltinOp::Ceil, &Node::Integer(3)), Some(Node::Integer(3)));
        assert_eq!(round(BuiltinOp::Floor, &Node::Float(f64::NAN)), None);
    }

    #[test]
    fn test_abs_sign() {
        assert_eq!(abs(&Node::Integer(-3)), Some(Node::Integer(3)));
        assert_eq!(abs(&Node::Integer(i64::MIN)), None);
        assert_eq!(sign(&Node::Float(-0.5)), Some(Node::Float(-1.0)));
        assert_eq!(sign(&Node::Float(0.0)), Some(Node::Float(0.0)));
        assert_eq!(
            sign(&Node::rational(-1, 3).unwrap()),
            Some(Node::Integer(-1))
        );
    }

    #[test]
    fn test_float_funcs() {
        assert_eq!(float_func(BuiltinOp::Sqrt, &Node::Integer(16)), Some(Node::Float(4.0)));
        assert_eq!(float_func(BuiltinOp::Log2, &Node::Float(8.0)), Some(Node::Float(3.0)));
        assert_eq!(float_func(BuiltinOp::Sqrt, &Node::Integer(-1)), None);
        assert_eq!(float_func(BuiltinOp::Ln, &Node::Integer(0)), None);
        assert_eq!(pow(&Node::Integer(2), &Node::Integer(10)), Some(Node::Float(1024.0)));
    }

    #[test]
    fn test_extremum() {
        let args = [Node::Float(2.0), Node::Integer(-8), Node::Float(10.0)];
        assert_eq!(extremum(BuiltinOp::Least, &args), Some(Node::Integer(-8)));
        assert_eq!(extremum(BuiltinOp::Greatest, &args), Some(Node::Float(10.0)));
        let args = [Node::Integer(1), Node::ident("x")];
        assert_eq!(extremum(BuiltinOp::Least, &args), None);
    }

    #[test]
    fn test_bit_count() {
        assert_eq!(bit_count(&Node::Integer(0b1011)), Some(Node::Integer(3)));
        assert_eq!(bit_count(&Node::Float(1.0)), None);
    }
}
