//! Patterns, guards and the rule type of the simplifier.
//!
//! A [`Pattern`] describes the shape of a node and its immediate
//! descendants. Sub-patterns may bind the node they match to a name;
//! a successful match hands the bindings to the rule's guards and then
//! to its rewrite.

use crate::expression::builtin::BuiltinOp;
use crate::expression::hint::{type_of, Hint};
use crate::expression::node::{equivalent, Builtin, Node, NodeKind};
use crate::expression::operator::{
    ArithOp, CmpOp, IsKeyword, LogicalOp, StringMatchOp, UnaryArithOp,
};
use crate::expression::types::TypeSet;

/// The shape of a node. Operator lists are alternatives; an empty list
/// accepts every operator.
#[derive(Debug)]
pub enum Pattern {
    Any,
    /// Anything, bound to the name
    Var(&'static str),
    /// A node equivalent to an earlier binding
    Same(&'static str),
    /// Whatever the inner pattern matches, bound to the name
    Bind(&'static str, &'static Pattern),
    /// The first alternative that matches
    OneOf(&'static [Pattern]),
    Kind(NodeKind),
    Const,
    NonConst,
    Number,
    Str,
    Int(i64),
    Bool(bool),
    AnyBool,
    /// NULL or MISSING
    Absent,
    Not(&'static Pattern),
    Logical(&'static [LogicalOp], &'static Pattern, &'static Pattern),
    Cmp(&'static [CmpOp], &'static Pattern, &'static Pattern),
    Arith(&'static [ArithOp], &'static Pattern, &'static Pattern),
    Unary(&'static [UnaryArithOp], &'static Pattern),
    Is(&'static [IsKeyword], &'static Pattern),
    StrMatch(&'static [StringMatchOp], &'static Pattern),
    Cast(&'static Pattern),
    Dot(&'static Pattern),
    Index(&'static Pattern),
    /// A call with exactly these arguments
    Call(BuiltinOp, &'static [Pattern]),
    /// A call with any arguments
    CallAny(BuiltinOp),
    /// `x IN (...)` with the pattern applied to `x`
    Member(&'static Pattern),
}

fn accepts<T: PartialEq>(ops: &[T], op: &T) -> bool {
    ops.is_empty() || ops.contains(op)
}

impl Pattern {
    pub fn matches<'a>(&self, node: &'a Node) -> Option<Match<'a>> {
        let mut m = Match {
            node,
            binds: Vec::new(),
        };
        self.bind(node, &mut m).then_some(m)
    }

    fn bind<'a>(&self, node: &'a Node, m: &mut Match<'a>) -> bool {
        match (self, node) {
            (Pattern::Any, _) => true,
            (Pattern::Var(name), _) => {
                m.binds.push((*name, node));
                true
            }
            (Pattern::Same(name), _) => m.get(name).map_or(false, |b| equivalent(b, node)),
            (Pattern::Bind(name, p), _) => {
                if !p.bind(node, m) {
                    return false;
                }
                m.binds.push((*name, node));
                true
            }
            (Pattern::OneOf(alts), _) => {
                let mark = m.binds.len();
                for p in alts.iter() {
                    if p.bind(node, m) {
                        return true;
                    }
                    m.binds.truncate(mark);
                }
                false
            }
            (Pattern::Kind(k), _) => node.kind() == *k,
            (Pattern::Const, _) => node.is_constant(),
            (Pattern::NonConst, _) => !node.is_constant() && !matches!(node, Node::Missing),
            (Pattern::Number, _) => node.is_number(),
            (Pattern::Str, Node::String(_)) => true,
            (Pattern::Int(v), Node::Integer(i)) => v == i,
            (Pattern::Bool(v), Node::Bool(b)) => v == b,
            (Pattern::AnyBool, Node::Bool(_)) => true,
            (Pattern::Absent, Node::Null | Node::Missing) => true,
            (Pattern::Not(p), Node::Not(inner)) => p.bind(inner, m),
            (Pattern::Logical(ops, l, r), Node::Logical { op, left, right }) => {
                accepts(ops, op) && l.bind(left, m) && r.bind(right, m)
            }
            (Pattern::Cmp(ops, l, r), Node::Comparison { op, left, right }) => {
                accepts(ops, op) && l.bind(left, m) && r.bind(right, m)
            }
            (Pattern::Arith(ops, l, r), Node::Arithmetic { op, left, right }) => {
                accepts(ops, op) && l.bind(left, m) && r.bind(right, m)
            }
            (Pattern::Unary(ops, p), Node::UnaryArith { op, child }) => {
                accepts(ops, op) && p.bind(child, m)
            }
            (Pattern::Is(keys, p), Node::IsKey { key, inner }) => {
                accepts(keys, key) && p.bind(inner, m)
            }
            (Pattern::StrMatch(ops, p), Node::StringMatch { op, expr, .. }) => {
                accepts(ops, op) && p.bind(expr, m)
            }
            (Pattern::Cast(p), Node::Cast { from, .. }) => p.bind(from, m),
            (Pattern::Dot(p), Node::Dot { inner, .. }) => p.bind(inner, m),
            (Pattern::Index(p), Node::Index { inner, .. }) => p.bind(inner, m),
            (Pattern::Call(func, args), Node::Builtin(b)) => {
                b.func == *func
                    && b.args.len() == args.len()
                    && args.iter().zip(&b.args).all(|(p, a)| p.bind(a, m))
            }
            (Pattern::CallAny(func), Node::Builtin(b)) => b.func == *func,
            (Pattern::Member(p), Node::Member { arg, .. }) => p.bind(arg, m),
            _ => false,
        }
    }
}

/// The outcome of matching a [`Pattern`].
#[derive(Debug)]
pub struct Match<'a> {
    /// The node the rule is applied to
    pub node: &'a Node,
    binds: Vec<(&'static str, &'a Node)>,
}

impl<'a> Match<'a> {
    pub fn get(&self, name: &str) -> Option<&'a Node> {
        self.binds
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, node)| *node)
    }

    /// A copy of the node bound to `name`.
    pub fn take(&self, name: &str) -> Option<Node> {
        self.get(name).cloned()
    }

    pub fn cmp_op(&self) -> Option<CmpOp> {
        match self.node {
            Node::Comparison { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn logical_op(&self) -> Option<LogicalOp> {
        match self.node {
            Node::Logical { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn arith_op(&self) -> Option<ArithOp> {
        match self.node {
            Node::Arithmetic { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn is_key(&self) -> Option<IsKeyword> {
        match self.node {
            Node::IsKey { key, .. } => Some(*key),
            _ => None,
        }
    }

    pub fn call(&self) -> Option<&'a Builtin> {
        match self.node {
            Node::Builtin(b) => Some(b),
            _ => None,
        }
    }
}

/// What the rules know about the position they rewrite.
pub struct Ctx<'h> {
    pub hint: &'h dyn Hint,
    /// Only the truthiness of the node matters here: a WHERE clause,
    /// a CASE condition or an operand of AND/OR in such a position.
    pub logic: bool,
}

impl Ctx<'_> {
    pub fn type_of(&self, node: &Node) -> TypeSet {
        type_of(node, self.hint)
    }

    /// Whether `node` always evaluates to MISSING.
    pub fn missing(&self, node: &Node) -> bool {
        matches!(node, Node::Missing) || self.type_of(node) == TypeSet::MISSING
    }

    /// Whether `node` always evaluates to NULL.
    pub fn null(&self, node: &Node) -> bool {
        matches!(node, Node::Null) || self.type_of(node) == TypeSet::NULL
    }

    pub fn absent(&self, node: &Node) -> bool {
        self.missing(node) || self.null(node)
    }
}

/// A side condition on a match.
pub type Guard = fn(&Match<'_>, &Ctx<'_>) -> bool;

/// Build the replacement for a match; `None` declines the rewrite.
pub type Rewrite = fn(&Match<'_>, &Ctx<'_>) -> Option<Node>;

/// A named pattern, guard and rewrite.
pub struct Rule {
    pub name: &'static str,
    pub pattern: Pattern,
    pub guards: &'static [Guard],
    pub rewrite: Rewrite,
}

impl Rule {
    /// Apply the rule to `node`, if it matches.
    pub fn apply(&self, node: &Node, ctx: &Ctx<'_>) -> Option<Node> {
        let m = self.pattern.matches(node)?;
        if !self.guards.iter().all(|g| g(&m, ctx)) {
            return None;
        }
        (self.rewrite)(&m, ctx)
    }
}
