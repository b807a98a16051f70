//! Static type inference and the oracle for free variables.

use std::cmp::Ordering;
use std::fmt;

use crate::expression::node::Node;
use crate::expression::operator::{AggregateOp, ArithOp, CmpOp};
use crate::expression::types::TypeSet;

/// Caller-supplied knowledge about free variables.
pub trait Hint {
    /// The set of types `node` (an identifier or path) may evaluate to.
    fn type_of(&self, node: &Node) -> TypeSet;

    /// The finite set of values `node` is known to take, if any.
    fn values(&self, _node: &Node) -> Option<FiniteSet> {
        None
    }
}

/// The hint that knows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHint;

impl Hint for NoHint {
    fn type_of(&self, _node: &Node) -> TypeSet {
        TypeSet::ANY
    }
}

/// A hint backed by a closure.
pub struct HintFn<F>(pub F);

impl<F> Hint for HintFn<F>
where
    F: Fn(&Node) -> TypeSet,
{
    fn type_of(&self, node: &Node) -> TypeSet {
        (self.0)(node)
    }
}

/// A hint built from explicit per-path facts; unlisted paths are `ANY`.
#[derive(Debug, Clone, Default)]
pub struct PathHint {
    types: Vec<(Node, TypeSet)>,
    values: Vec<(Node, FiniteSet)>,
}

impl PathHint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the type of `path`
    pub fn with_type(mut self, path: Node, ts: TypeSet) -> Self {
        self.types.push((path, ts));
        self
    }

    /// Declare the possible values of `path`; also narrows its type.
    pub fn with_values(mut self, path: Node, set: FiniteSet) -> Self {
        self.values.push((path, set));
        self
    }
}

impl Hint for PathHint {
    fn type_of(&self, node: &Node) -> TypeSet {
        if let Some((_, ts)) = self.types.iter().find(|(p, _)| p == node) {
            return *ts;
        }
        match self.values.iter().find(|(p, _)| p == node) {
            Some((_, set)) => set.type_set(),
            None => TypeSet::ANY,
        }
    }

    fn values(&self, node: &Node) -> Option<FiniteSet> {
        self.values
            .iter()
            .find(|(p, _)| p == node)
            .map(|(_, set)| set.clone())
    }
}

/// Outcome of testing a predicate against every value of a [`FiniteSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    AlwaysFalse,
    AlwaysTrue,
    /// Neither true nor false for every value
    Indefinitive,
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Relation::AlwaysFalse => write!(f, "<always false>"),
            Relation::AlwaysTrue => write!(f, "<always true>"),
            Relation::Indefinitive => write!(f, "<indefinitive>"),
        }
    }
}

/// The non-empty set of constant values a variable can have.
#[derive(Debug, Clone, PartialEq)]
pub struct FiniteSet {
    values: Vec<Node>,
}

impl FiniteSet {
    /// Create a set; `None` if `values` is empty or holds a non-constant.
    pub fn new(values: Vec<Node>) -> Option<Self> {
        if values.is_empty() || !values.iter().all(Node::is_constant) {
            return None;
        }
        Some(Self { values })
    }

    pub fn values(&self) -> &[Node] {
        &self.values
    }

    /// The only value, if the set has exactly one.
    pub fn singleton(&self) -> Option<&Node> {
        match self.values.as_slice() {
            [v] => Some(v),
            _ => None,
        }
    }

    /// Union of the types of the values.
    pub fn type_set(&self) -> TypeSet {
        self.values
            .iter()
            .fold(TypeSet::EMPTY, |acc, v| acc | type_of(v, &NoHint))
    }

    /// Relation between every value of the set and `c` under `op`.
    pub fn compare(&self, op: CmpOp, c: &Node) -> Relation {
        let accept: &[Ordering] = match op {
            CmpOp::Eq => &[Ordering::Equal],
            CmpOp::Ne => &[Ordering::Less, Ordering::Greater],
            CmpOp::Lt => &[Ordering::Less],
            CmpOp::Le => &[Ordering::Less, Ordering::Equal],
            CmpOp::Gt => &[Ordering::Greater],
            CmpOp::Ge => &[Ordering::Greater, Ordering::Equal],
            CmpOp::Like | CmpOp::Ilike => return Relation::Indefinitive,
        };
        let mut seen = None;
        for v in &self.values {
            let Some(ord) = compare_comparable(v, c) else {
                return Relation::Indefinitive;
            };
            let holds = accept.contains(&ord);
            match seen {
                None => seen = Some(holds),
                Some(prev) if prev != holds => return Relation::Indefinitive,
                Some(_) => {}
            }
        }
        relation(seen.unwrap_or(false))
    }

    /// Relation between the set and membership in `list`.
    pub fn member(&self, list: &[Node]) -> Relation {
        let in_list = |v: &Node| list.iter().any(|c| v == c);
        let first = in_list(&self.values[0]);
        if self.values[1..].iter().any(|v| in_list(v) != first) {
            return Relation::Indefinitive;
        }
        relation(first)
    }
}

fn relation(holds: bool) -> Relation {
    if holds {
        Relation::AlwaysTrue
    } else {
        Relation::AlwaysFalse
    }
}

/// Compare constants of mutually comparable kinds: numbers with numbers,
/// strings with strings and timestamps with timestamps. `None` otherwise.
pub fn compare_comparable(a: &Node, b: &Node) -> Option<Ordering> {
    match (a, b) {
        (Node::String(x), Node::String(y)) => Some(x.cmp(y)),
        (Node::Timestamp(x), Node::Timestamp(y)) => Some(x.cmp(y)),
        _ if a.is_number() && b.is_number() => match (a.as_rational(), b.as_rational()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => float_of(a).partial_cmp(&float_of(b)),
        },
        _ => None,
    }
}

fn float_of(n: &Node) -> f64 {
    match n {
        Node::Integer(i) => *i as f64,
        Node::Float(f) => *f,
        Node::Rational(r) => r.to_f64(),
        _ => f64::NAN,
    }
}

/// An over-approximation of the types `node` may evaluate to.
///
/// Paths are answered by `hint`; composite nodes derive their type from
/// their children.
pub fn type_of(node: &Node, hint: &dyn Hint) -> TypeSet {
    match node {
        Node::Null => TypeSet::NULL,
        Node::Missing => TypeSet::MISSING,
        Node::Bool(_) => TypeSet::BOOL,
        Node::Integer(_) => TypeSet::INTEGER,
        Node::Float(_) => TypeSet::FLOAT,
        Node::Rational(_) => TypeSet::NUMERIC,
        Node::String(_) => TypeSet::STRING,
        Node::Timestamp(_) => TypeSet::TIME,
        Node::Struct(_) => TypeSet::STRUCT,
        Node::List(_) => TypeSet::LIST,
        Node::Ident(_) | Node::Dot { .. } | Node::Index { .. } => hint.type_of(node),
        Node::Not(_)
        | Node::Logical { .. }
        | Node::Comparison { .. }
        | Node::StringMatch { .. }
        | Node::Member { .. } => TypeSet::LOGICAL,
        Node::IsKey { .. } => TypeSet::BOOL,
        Node::UnaryArith { child, .. } => {
            let ct = type_of(child, hint);
            let mut out = TypeSet::NUMERIC | (ct & TypeSet::MISSING);
            if !ct.without(TypeSet::MISSING | TypeSet::NUMERIC).is_empty() {
                out |= TypeSet::MISSING;
            }
            out
        }
        Node::Arithmetic { op, left, right } => {
            let lt = type_of(left, hint);
            if !lt.any_of(TypeSet::NUMERIC) {
                return TypeSet::MISSING;
            }
            let rt = type_of(right, hint);
            if !rt.any_of(TypeSet::NUMERIC) {
                return TypeSet::MISSING;
            }
            let mut both = lt | rt;
            if *op == ArithOp::Div || !both.without(TypeSet::NUMERIC).is_empty() {
                both |= TypeSet::MISSING;
            }
            both & (TypeSet::NUMERIC | TypeSet::MISSING)
        }
        Node::Cast { from, to } => {
            let ft = type_of(from, hint);
            if (ft & *to).is_empty() {
                return TypeSet::MISSING;
            }
            if ft & *to != ft {
                *to | TypeSet::MISSING
            } else {
                *to
            }
        }
        Node::Case(c) => {
            let out = c
                .limbs
                .iter()
                .fold(TypeSet::EMPTY, |acc, l| acc | type_of(&l.then, hint));
            match &c.otherwise {
                Some(e) => out | type_of(e, hint),
                None => out | TypeSet::NULL,
            }
        }
        Node::Builtin(b) => b.func.info().map_or(TypeSet::ANY, |i| i.ret),
        Node::Aggregate(a) => match a.op {
            op if op.is_count() => TypeSet::UNSIGNED,
            AggregateOp::SumInt => type_of(&a.inner, hint),
            AggregateOp::Earliest | AggregateOp::Latest => TypeSet::TIME | TypeSet::NULL,
            _ => TypeSet::NUMERIC | TypeSet::NULL,
        },
        Node::Star
        | Node::Appended(_)
        | Node::Table(_)
        | Node::Join(_)
        | Node::Select(_)
        | Node::Union { .. } => TypeSet::ANY,
    }
}
