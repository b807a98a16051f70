//! Expression AST definitions.
//!
//! [`Node`] is a closed sum type covering constants, paths, scalar
//! operators and relational forms. Every subtree is owned by exactly
//! one parent; cloning a node produces a fully independent deep copy.

use std::cmp::Ordering;
use std::mem;

use crate::expression::builtin::BuiltinOp;
use crate::expression::literal::{List, Struct, Timestamp};
use crate::expression::operator::{
    ArithOp, CmpOp, IsKeyword, LogicalOp, StringMatchOp, UnaryArithOp, UnionType,
};
use crate::expression::rational::Rational;
use crate::expression::registry;
use crate::expression::relation::{Aggregate, Binding, Join, Select, Table};
use crate::expression::types::TypeSet;

/// An expression or relation node.
#[derive(Debug, Clone)]
pub enum Node {
    Null,
    /// The absent value of the ternary logic.
    Missing,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Rational(Rational),
    String(String),
    Timestamp(Timestamp),
    Struct(Struct),
    List(List),

    /// A free variable or the first component of a path.
    Ident(String),
    /// `inner.field`
    Dot { inner: Box<Node>, field: String },
    /// `inner[offset]`
    Index { inner: Box<Node>, offset: i64 },
    /// `*`
    Star,

    Not(Box<Node>),
    Logical {
        op: LogicalOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Comparison {
        op: CmpOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    StringMatch {
        op: StringMatchOp,
        expr: Box<Node>,
        pattern: String,
        escape: Option<String>,
    },
    UnaryArith {
        op: UnaryArithOp,
        child: Box<Node>,
    },
    Arithmetic {
        op: ArithOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    IsKey {
        key: IsKeyword,
        inner: Box<Node>,
    },
    Cast {
        from: Box<Node>,
        /// Normally a single type bit
        to: TypeSet,
    },
    Case(Box<Case>),
    Builtin(Builtin),
    /// `arg IN (values...)`; values are constants kept in sorted order.
    Member { arg: Box<Node>, values: Vec<Node> },
    /// Table concatenation `a ++ b ++ ...`
    Appended(Vec<Node>),

    Aggregate(Box<Aggregate>),
    Table(Box<Table>),
    Join(Box<Join>),
    Select(Box<Select>),
    Union {
        kind: UnionType,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Default for Node {
    fn default() -> Self {
        Node::Missing
    }
}

/// A `WHEN ... THEN ...` arm of a CASE expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseLimb {
    pub when: Node,
    pub then: Node,
}

/// `CASE WHEN ... THEN ... [ELSE ...] END`
#[derive(Debug, Clone)]
pub struct Case {
    pub limbs: Vec<CaseLimb>,
    pub otherwise: Option<Node>,
    /// Annotation set by rewrites that know the result kind, e.g. `"logical"`.
    pub valence: Option<String>,
}

impl Case {
    pub fn new(limbs: Vec<CaseLimb>, otherwise: Option<Node>) -> Self {
        Self {
            limbs,
            otherwise,
            valence: None,
        }
    }

    /// Whether every result (THEN and ELSE) is a path, NULL or MISSING.
    pub fn is_path_limbs(&self) -> bool {
        let ok = |n: &Node| n.is_path() || matches!(n, Node::Null | Node::Missing);
        self.otherwise.as_ref().map_or(true, ok) && self.limbs.iter().all(|l| ok(&l.then))
    }
}

impl PartialEq for Case {
    fn eq(&self, other: &Case) -> bool {
        self.limbs == other.limbs && self.otherwise == other.otherwise
    }
}

/// A call to a builtin function.
#[derive(Debug, Clone)]
pub struct Builtin {
    pub func: BuiltinOp,
    /// Spelling of an unrecognised function name
    pub text: String,
    pub args: Vec<Node>,
}

impl Builtin {
    pub fn name(&self) -> &str {
        if self.func == BuiltinOp::Unspecified {
            &self.text
        } else {
            self.func.name()
        }
    }
}

impl PartialEq for Builtin {
    fn eq(&self, other: &Builtin) -> bool {
        self.func == other.func && self.name() == other.name() && self.args == other.args
    }
}

/// Variant discriminant of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Null,
    Missing,
    Bool,
    Integer,
    Float,
    Rational,
    String,
    Timestamp,
    Struct,
    List,
    Ident,
    Dot,
    Index,
    Star,
    Not,
    Logical,
    Comparison,
    StringMatch,
    UnaryArith,
    Arithmetic,
    IsKey,
    Cast,
    Case,
    Builtin,
    Member,
    Appended,
    Aggregate,
    Table,
    Join,
    Select,
    Union,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Null => "Null",
            NodeKind::Missing => "Missing",
            NodeKind::Bool => "Bool",
            NodeKind::Integer => "Integer",
            NodeKind::Float => "Float",
            NodeKind::Rational => "Rational",
            NodeKind::String => "String",
            NodeKind::Timestamp => "Timestamp",
            NodeKind::Struct => "Struct",
            NodeKind::List => "List",
            NodeKind::Ident => "Ident",
            NodeKind::Dot => "Dot",
            NodeKind::Index => "Index",
            NodeKind::Star => "Star",
            NodeKind::Not => "Not",
            NodeKind::Logical => "Logical",
            NodeKind::Comparison => "Comparison",
            NodeKind::StringMatch => "StringMatch",
            NodeKind::UnaryArith => "UnaryArith",
            NodeKind::Arithmetic => "Arithmetic",
            NodeKind::IsKey => "IsKey",
            NodeKind::Cast => "Cast",
            NodeKind::Case => "Case",
            NodeKind::Builtin => "Builtin",
            NodeKind::Member => "Member",
            NodeKind::Appended => "Appended",
            NodeKind::Aggregate => "Aggregate",
            NodeKind::Table => "Table",
            NodeKind::Join => "Join",
            NodeKind::Select => "Select",
            NodeKind::Union => "Union",
        }
    }
}

impl Node {
    /// Create an identifier
    pub fn ident(name: impl Into<String>) -> Node {
        Node::Ident(name.into())
    }

    /// Create a string literal
    pub fn string(s: impl Into<String>) -> Node {
        Node::String(s.into())
    }

    /// Create an exact rational literal `num/den`; `None` if `den` is zero.
    pub fn rational(num: i128, den: i128) -> Option<Node> {
        Rational::new(num, den).map(Node::Rational)
    }

    /// Create `inner.field`
    pub fn dot(inner: Node, field: impl Into<String>) -> Node {
        Node::Dot {
            inner: Box::new(inner),
            field: field.into(),
        }
    }

    /// Create `inner[offset]`
    pub fn index(inner: Node, offset: i64) -> Node {
        Node::Index {
            inner: Box::new(inner),
            offset,
        }
    }

    /// Create a path from dotted components, e.g. `["t", "a", "b"]` for `t.a.b`.
    pub fn path(first: impl Into<String>, rest: &[&str]) -> Node {
        rest.iter()
            .fold(Node::Ident(first.into()), |acc, f| Node::dot(acc, *f))
    }

    pub fn not(inner: Node) -> Node {
        Node::Not(Box::new(inner))
    }

    pub fn logical(op: LogicalOp, left: Node, right: Node) -> Node {
        Node::Logical {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Node, right: Node) -> Node {
        Node::logical(LogicalOp::And, left, right)
    }

    pub fn or(left: Node, right: Node) -> Node {
        Node::logical(LogicalOp::Or, left, right)
    }

    pub fn xor(left: Node, right: Node) -> Node {
        Node::logical(LogicalOp::Xor, left, right)
    }

    pub fn xnor(left: Node, right: Node) -> Node {
        Node::logical(LogicalOp::Xnor, left, right)
    }

    /// Conjunction of every term; `TRUE` when there are none.
    pub fn conjunction(terms: Vec<Node>) -> Node {
        terms
            .into_iter()
            .reduce(Node::and)
            .unwrap_or(Node::Bool(true))
    }

    /// Disjunction of every term; `FALSE` when there are none.
    pub fn disjunction(terms: Vec<Node>) -> Node {
        terms
            .into_iter()
            .reduce(Node::or)
            .unwrap_or(Node::Bool(false))
    }

    pub fn compare(op: CmpOp, left: Node, right: Node) -> Node {
        Node::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `val BETWEEN lo AND hi`
    pub fn between(val: Node, lo: Node, hi: Node) -> Node {
        Node::and(
            Node::compare(CmpOp::Ge, val.clone(), lo),
            Node::compare(CmpOp::Le, val, hi),
        )
    }

    pub fn string_match(op: StringMatchOp, expr: Node, pattern: impl Into<String>) -> Node {
        Node::StringMatch {
            op,
            expr: Box::new(expr),
            pattern: pattern.into(),
            escape: None,
        }
    }

    pub fn like(expr: Node, pattern: impl Into<String>) -> Node {
        Node::string_match(StringMatchOp::Like, expr, pattern)
    }

    pub fn arith(op: ArithOp, left: Node, right: Node) -> Node {
        Node::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn add(left: Node, right: Node) -> Node {
        Node::arith(ArithOp::Add, left, right)
    }

    pub fn sub(left: Node, right: Node) -> Node {
        Node::arith(ArithOp::Sub, left, right)
    }

    pub fn mul(left: Node, right: Node) -> Node {
        Node::arith(ArithOp::Mul, left, right)
    }

    pub fn div(left: Node, right: Node) -> Node {
        Node::arith(ArithOp::Div, left, right)
    }

    pub fn neg(child: Node) -> Node {
        Node::UnaryArith {
            op: UnaryArithOp::Neg,
            child: Box::new(child),
        }
    }

    /// Create `inner IS <key>`
    pub fn is(inner: Node, key: IsKeyword) -> Node {
        Node::IsKey {
            key,
            inner: Box::new(inner),
        }
    }

    pub fn cast(from: Node, to: TypeSet) -> Node {
        Node::Cast {
            from: Box::new(from),
            to,
        }
    }

    /// Create a CASE expression from `(when, then)` pairs.
    pub fn case(limbs: Vec<(Node, Node)>, otherwise: Option<Node>) -> Node {
        let limbs = limbs
            .into_iter()
            .map(|(when, then)| CaseLimb { when, then })
            .collect();
        Node::Case(Box::new(Case::new(limbs, otherwise)))
    }

    /// `COALESCE(a, b, ...)` as the equivalent CASE expression.
    pub fn coalesce(nodes: Vec<Node>) -> Node {
        let limbs = nodes
            .into_iter()
            .map(|n| (Node::is(n.clone(), IsKeyword::IsNotNull), n))
            .collect();
        Node::case(limbs, Some(Node::Null))
    }

    /// `NULLIF(a, b)` as `CASE WHEN a = b THEN NULL ELSE a END`.
    pub fn null_if(a: Node, b: Node) -> Node {
        Node::case(
            vec![(Node::compare(CmpOp::Eq, a.clone(), b), Node::Null)],
            Some(a),
        )
    }

    /// Create a call to a builtin.
    pub fn call(func: BuiltinOp, args: Vec<Node>) -> Node {
        Node::Builtin(Builtin {
            func,
            text: String::new(),
            args,
        })
    }

    /// Create a call by function name; unknown names keep their spelling.
    pub fn call_by_name(name: &str, args: Vec<Node>) -> Node {
        let func = registry::lookup_builtin(name);
        let text = if func == BuiltinOp::Unspecified {
            name.to_string()
        } else {
            String::new()
        };
        Node::Builtin(Builtin { func, text, args })
    }

    /// Create `arg IN (values...)`. Values must be constants; they are sorted.
    pub fn member(arg: Node, mut values: Vec<Node>) -> Node {
        values.sort_by(compare_constants);
        Node::Member {
            arg: Box::new(arg),
            values,
        }
    }

    /// Create `left ++ right`, flattening nested concatenations.
    pub fn append(left: Node, right: Node) -> Node {
        let mut values = Vec::new();
        for n in [left, right] {
            match n {
                Node::Appended(inner) => values.extend(inner),
                other => values.push(other),
            }
        }
        Node::Appended(values)
    }

    /// Create a table reference to `expr`.
    pub fn table(expr: Node) -> Node {
        Node::Table(Box::new(Table::new(Binding::new(expr))))
    }

    pub fn union(kind: UnionType, left: Node, right: Node) -> Node {
        Node::Union {
            kind,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Missing => NodeKind::Missing,
            Node::Bool(_) => NodeKind::Bool,
            Node::Integer(_) => NodeKind::Integer,
            Node::Float(_) => NodeKind::Float,
            Node::Rational(_) => NodeKind::Rational,
            Node::String(_) => NodeKind::String,
            Node::Timestamp(_) => NodeKind::Timestamp,
            Node::Struct(_) => NodeKind::Struct,
            Node::List(_) => NodeKind::List,
            Node::Ident(_) => NodeKind::Ident,
            Node::Dot { .. } => NodeKind::Dot,
            Node::Index { .. } => NodeKind::Index,
            Node::Star => NodeKind::Star,
            Node::Not(_) => NodeKind::Not,
            Node::Logical { .. } => NodeKind::Logical,
            Node::Comparison { .. } => NodeKind::Comparison,
            Node::StringMatch { .. } => NodeKind::StringMatch,
            Node::UnaryArith { .. } => NodeKind::UnaryArith,
            Node::Arithmetic { .. } => NodeKind::Arithmetic,
            Node::IsKey { .. } => NodeKind::IsKey,
            Node::Cast { .. } => NodeKind::Cast,
            Node::Case(_) => NodeKind::Case,
            Node::Builtin(_) => NodeKind::Builtin,
            Node::Member { .. } => NodeKind::Member,
            Node::Appended(_) => NodeKind::Appended,
            Node::Aggregate(_) => NodeKind::Aggregate,
            Node::Table(_) => NodeKind::Table,
            Node::Join(_) => NodeKind::Join,
            Node::Select(_) => NodeKind::Select,
            Node::Union { .. } => NodeKind::Union,
        }
    }

    /// Whether the node is a literal value (MISSING is not a constant).
    pub fn is_constant(&self) -> bool {
        matches!(
            self,
            Node::Null
                | Node::Bool(_)
                | Node::Integer(_)
                | Node::Float(_)
                | Node::Rational(_)
                | Node::String(_)
                | Node::Timestamp(_)
                | Node::Struct(_)
                | Node::List(_)
        )
    }

    /// Whether the node is a numeric literal.
    pub fn is_number(&self) -> bool {
        matches!(self, Node::Integer(_) | Node::Float(_) | Node::Rational(_))
    }

    /// Whether the node is an identifier followed by field and index accesses.
    pub fn is_path(&self) -> bool {
        match self {
            Node::Ident(_) => true,
            Node::Dot { inner, .. } | Node::Index { inner, .. } => inner.is_path(),
            _ => false,
        }
    }

    /// The exact value of a numeric literal.
    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            Node::Integer(i) => Some(Rational::from_int(*i)),
            Node::Float(f) => Rational::from_f64(*f),
            Node::Rational(r) => Some(*r),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    /// The direct children of the node, in traversal order.
    pub fn children(&self) -> Vec<&Node> {
        let mut out = Vec::new();
        match self {
            Node::Null
            | Node::Missing
            | Node::Bool(_)
            | Node::Integer(_)
            | Node::Float(_)
            | Node::Rational(_)
            | Node::String(_)
            | Node::Timestamp(_)
            | Node::Struct(_)
            | Node::List(_)
            | Node::Ident(_)
            | Node::Star => {}
            Node::Dot { inner, .. } | Node::Index { inner, .. } => out.push(&**inner),
            Node::Not(inner) => out.push(&**inner),
            Node::Logical { left, right, .. }
            | Node::Comparison { left, right, .. }
            | Node::Arithmetic { left, right, .. }
            | Node::Union { left, right, .. } => {
                out.push(&**left);
                out.push(&**right);
            }
            Node::StringMatch { expr, .. } => out.push(&**expr),
            Node::UnaryArith { child, .. } => out.push(&**child),
            Node::IsKey { inner, .. } => out.push(&**inner),
            Node::Cast { from, .. } => out.push(&**from),
            Node::Case(c) => {
                for limb in &c.limbs {
                    out.push(&limb.when);
                    out.push(&limb.then);
                }
                out.extend(c.otherwise.as_ref());
            }
            Node::Builtin(b) => out.extend(b.args.iter()),
            Node::Member { arg, values } => {
                out.push(&**arg);
                out.extend(values.iter());
            }
            Node::Appended(values) => out.extend(values.iter()),
            Node::Aggregate(a) => a.children(&mut out),
            Node::Table(t) => out.push(&t.binding.expr),
            Node::Join(j) => j.children(&mut out),
            Node::Select(s) => s.children(&mut out),
        }
        out
    }

    /// Mutable access to the non-constant children of the node.
    pub fn children_mut(&mut self) -> Vec<&mut Node> {
        let mut out = Vec::new();
        match self {
            Node::Null
            | Node::Missing
            | Node::Bool(_)
            | Node::Integer(_)
            | Node::Float(_)
            | Node::Rational(_)
            | Node::String(_)
            | Node::Timestamp(_)
            | Node::Struct(_)
            | Node::List(_)
            | Node::Ident(_)
            | Node::Star => {}
            Node::Dot { inner, .. } | Node::Index { inner, .. } => out.push(&mut **inner),
            Node::Not(inner) => out.push(&mut **inner),
            Node::Logical { left, right, .. }
            | Node::Comparison { left, right, .. }
            | Node::Arithmetic { left, right, .. }
            | Node::Union { left, right, .. } => {
                out.push(&mut **left);
                out.push(&mut **right);
            }
            Node::StringMatch { expr, .. } => out.push(&mut **expr),
            Node::UnaryArith { child, .. } => out.push(&mut **child),
            Node::IsKey { inner, .. } => out.push(&mut **inner),
            Node::Cast { from, .. } => out.push(&mut **from),
            Node::Case(c) => {
                for limb in &mut c.limbs {
                    out.push(&mut limb.when);
                    out.push(&mut limb.then);
                }
                out.extend(c.otherwise.as_mut());
            }
            Node::Builtin(b) => out.extend(b.args.iter_mut()),
            // IN-list values are constants
            Node::Member { arg, .. } => out.push(&mut **arg),
            Node::Appended(values) => out.extend(values.iter_mut()),
            Node::Aggregate(a) => a.children_mut(&mut out),
            Node::Table(t) => out.push(&mut t.binding.expr),
            Node::Join(j) => j.children_mut(&mut out),
            Node::Select(s) => s.children_mut(&mut out),
        }
        out
    }

    /// Structural equality where numeric literals compare by value
    /// across representations.
    pub fn equals(&self, other: &Node) -> bool {
        if self.is_number() && other.is_number() {
            return numbers_equal(self, other);
        }
        match (self, other) {
            (Node::Null, Node::Null)
            | (Node::Missing, Node::Missing)
            | (Node::Star, Node::Star) => true,
            (Node::Bool(a), Node::Bool(b)) => a == b,
            (Node::String(a), Node::String(b)) => a == b,
            (Node::Timestamp(a), Node::Timestamp(b)) => a == b,
            (Node::Struct(a), Node::Struct(b)) => a == b,
            (Node::List(a), Node::List(b)) => a == b,
            (Node::Ident(a), Node::Ident(b)) => a == b,
            (
                Node::Dot { inner: a, field: fa },
                Node::Dot { inner: b, field: fb },
            ) => fa == fb && a.equals(b),
            (
                Node::Index { inner: a, offset: oa },
                Node::Index { inner: b, offset: ob },
            ) => oa == ob && a.equals(b),
            (Node::Not(a), Node::Not(b)) => a.equals(b),
            (
                Node::Logical { op: oa, left: la, right: ra },
                Node::Logical { op: ob, left: lb, right: rb },
            ) => oa == ob && la.equals(lb) && ra.equals(rb),
            (
                Node::Comparison { op: oa, left: la, right: ra },
                Node::Comparison { op: ob, left: lb, right: rb },
            ) => oa == ob && la.equals(lb) && ra.equals(rb),
            (
                Node::StringMatch { op: oa, expr: ea, pattern: pa, escape: sa },
                Node::StringMatch { op: ob, expr: eb, pattern: pb, escape: sb },
            ) => oa == ob && pa == pb && sa == sb && ea.equals(eb),
            (
                Node::UnaryArith { op: oa, child: a },
                Node::UnaryArith { op: ob, child: b },
            ) => oa == ob && a.equals(b),
            (
                Node::Arithmetic { op: oa, left: la, right: ra },
                Node::Arithmetic { op: ob, left: lb, right: rb },
            ) => oa == ob && la.equals(lb) && ra.equals(rb),
            (Node::IsKey { key: ka, inner: a }, Node::IsKey { key: kb, inner: b }) => {
                ka == kb && a.equals(b)
            }
            (Node::Cast { from: a, to: ta }, Node::Cast { from: b, to: tb }) => {
                ta == tb && a.equals(b)
            }
            (Node::Case(a), Node::Case(b)) => a == b,
            (Node::Builtin(a), Node::Builtin(b)) => a == b,
            (
                Node::Member { arg: a, values: va },
                Node::Member { arg: b, values: vb },
            ) => a.equals(b) && va == vb,
            (Node::Appended(a), Node::Appended(b)) => a == b,
            (Node::Aggregate(a), Node::Aggregate(b)) => a == b,
            (Node::Table(a), Node::Table(b)) => a == b,
            (Node::Join(a), Node::Join(b)) => a == b,
            (Node::Select(a), Node::Select(b)) => a == b,
            (
                Node::Union { kind: ka, left: la, right: ra },
                Node::Union { kind: kb, left: lb, right: rb },
            ) => ka == kb && la.equals(lb) && ra.equals(rb),
            _ => false,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Node) -> bool {
        self.equals(other)
    }
}

fn numbers_equal(a: &Node, b: &Node) -> bool {
    match (a, b) {
        (Node::Integer(x), Node::Integer(y)) => x == y,
        (Node::Float(x), Node::Float(y)) => x == y,
        _ => match (a.as_rational(), b.as_rational()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// Whether `a` and `b` are the same expression, with numeric literals
/// compared by value (`3`, `3.0` and `3/1` are equivalent).
pub fn equivalent(a: &Node, b: &Node) -> bool {
    std::ptr::eq(a, b) || a.equals(b)
}

/// Depth-first traversal hooks.
pub trait Visitor {
    /// Called before the children of `node`; returning `false` skips them.
    fn visit(&mut self, node: &Node) -> bool;

    /// Called after the children of a visited node.
    fn leave(&mut self, _node: &Node) {}
}

/// Walk `node` and its descendants in depth-first pre-order.
pub fn walk<V: Visitor + ?Sized>(v: &mut V, node: &Node) {
    if v.visit(node) {
        for child in node.children() {
            walk(v, child);
        }
        v.leave(node);
    }
}

/// Rewrite `node` bottom-up: children first, then `f` on the node itself.
pub fn rewrite<F: FnMut(Node) -> Node>(node: Node, f: &mut F) -> Node {
    let mut node = node;
    for child in node.children_mut() {
        let taken = mem::take(child);
        *child = rewrite(taken, f);
    }
    f(node)
}

fn constant_rank(n: &Node) -> u8 {
    match n {
        Node::Null => 0,
        Node::Missing => 1,
        Node::Bool(_) => 2,
        Node::Integer(_) | Node::Float(_) | Node::Rational(_) => 3,
        Node::Timestamp(_) => 4,
        Node::String(_) => 5,
        Node::List(_) => 6,
        Node::Struct(_) => 7,
        _ => 8,
    }
}

/// A total order over constants: NULL < BOOL < numbers < timestamps
/// < strings < lists < structs. Numbers compare by exact value; values
/// that are not representable exactly (NaN, infinities) fall back to
/// the IEEE total order.
pub fn compare_constants(a: &Node, b: &Node) -> Ordering {
    let (ra, rb) = (constant_rank(a), constant_rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Node::Bool(x), Node::Bool(y)) => x.cmp(y),
        (Node::Timestamp(x), Node::Timestamp(y)) => x.cmp(y),
        (Node::String(x), Node::String(y)) => x.cmp(y),
        (Node::List(x), Node::List(y)) => {
            for (p, q) in x.values.iter().zip(&y.values) {
                match compare_constants(p, q) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
            x.values.len().cmp(&y.values.len())
        }
        (Node::Struct(x), Node::Struct(y)) => {
            for (p, q) in x.fields.iter().zip(&y.fields) {
                match p
                    .label
                    .cmp(&q.label)
                    .then_with(|| compare_constants(&p.value, &q.value))
                {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
            x.fields.len().cmp(&y.fields.len())
        }
        _ if a.is_number() => match (a.as_rational(), b.as_rational()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => number_as_f64(a).total_cmp(&number_as_f64(b)),
        },
        _ => Ordering::Equal,
    }
}

fn number_as_f64(n: &Node) -> f64 {
    match n {
        Node::Integer(i) => *i as f64,
        Node::Float(f) => *f,
        Node::Rational(r) => r.to_f64(),
        _ => f64::NAN,
    }
}
