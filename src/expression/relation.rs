//! Relational forms: bindings, tables, joins, SELECT and whole queries.

use std::cell::OnceCell;

use crate::expression::node::Node;
use crate::expression::operator::{AggregateOp, ExplainFormat, JoinKind};

/// An expression together with the name of the value it produces.
///
/// Unless a name is set explicitly, the name is derived from the
/// expression the first time it is requested and cached afterwards.
#[derive(Debug, Clone)]
pub struct Binding {
    pub expr: Node,
    name: OnceCell<Option<String>>,
    explicit: bool,
}

impl Binding {
    /// Create a binding whose name is derived from `expr`
    pub fn new(expr: Node) -> Self {
        Self {
            expr,
            name: OnceCell::new(),
            explicit: false,
        }
    }

    /// Create a binding with an explicit `AS name`
    pub fn named(expr: Node, name: impl Into<String>) -> Self {
        let mut b = Self::new(expr);
        b.set_result(name);
        b
    }

    /// Set the result name; an empty name resets it to the derived one.
    pub fn set_result(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.name = OnceCell::new();
        self.explicit = !name.is_empty();
        if self.explicit {
            let _ = self.name.set(Some(name));
        }
    }

    /// Whether the name was given explicitly.
    pub fn explicit(&self) -> bool {
        self.explicit
    }

    /// The name of the produced value, if it has one.
    pub fn result(&self) -> Option<&str> {
        self.name
            .get_or_init(|| default_name(&self.expr))
            .as_deref()
    }
}

fn default_name(expr: &Node) -> Option<String> {
    match expr {
        Node::Ident(name) => Some(name.clone()),
        Node::Dot { field, .. } => Some(field.clone()),
        Node::Aggregate(a) => a.op.default_result().map(str::to_string),
        _ => None,
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Binding) -> bool {
        self.result() == other.result() && self.expr == other.expr
    }
}

impl AggregateOp {
    /// The name an aggregate column gets when it is not bound explicitly.
    pub fn default_result(&self) -> Option<&'static str> {
        match self {
            AggregateOp::Count
            | AggregateOp::CountDistinct
            | AggregateOp::SumCount
            | AggregateOp::ApproxCountDistinct => Some("count"),
            AggregateOp::Sum | AggregateOp::SumInt => Some("sum"),
            AggregateOp::Avg => Some("avg"),
            AggregateOp::Min | AggregateOp::Earliest => Some("min"),
            AggregateOp::Max | AggregateOp::Latest => Some("max"),
            _ => None,
        }
    }
}

/// One ORDER BY item.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: Node,
    pub desc: bool,
    pub nulls_last: bool,
}

impl Order {
    pub fn new(column: Node) -> Self {
        Self {
            column,
            desc: false,
            nulls_last: false,
        }
    }
}

/// `OVER (PARTITION BY ... ORDER BY ...)`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Window {
    pub partition_by: Vec<Node>,
    pub order_by: Vec<Order>,
}

/// An aggregate call such as `COUNT(x) FILTER (WHERE ...) OVER (...)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub op: AggregateOp,
    /// Precision of APPROX_COUNT_DISTINCT; zero means the default.
    pub precision: u8,
    pub inner: Node,
    pub over: Option<Window>,
    pub filter: Option<Node>,
}

impl Aggregate {
    pub fn new(op: AggregateOp, inner: Node) -> Self {
        Self {
            op,
            precision: 0,
            inner,
            over: None,
            filter: None,
        }
    }

    /// Create an aggregate node
    pub fn node(op: AggregateOp, inner: Node) -> Node {
        Node::Aggregate(Box::new(Self::new(op, inner)))
    }

    pub(crate) fn children<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.push(&self.inner);
        if let Some(w) = &self.over {
            out.extend(w.partition_by.iter());
            out.extend(w.order_by.iter().map(|o| &o.column));
        }
        out.extend(self.filter.as_ref());
    }

    pub(crate) fn children_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Node>) {
        out.push(&mut self.inner);
        if let Some(w) = &mut self.over {
            out.extend(w.partition_by.iter_mut());
            out.extend(w.order_by.iter_mut().map(|o| &mut o.column));
        }
        out.extend(self.filter.as_mut());
    }
}

/// A table reference in FROM position.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub binding: Binding,
}

impl Table {
    pub fn new(binding: Binding) -> Self {
        Self { binding }
    }
}

/// `left <kind> right [ON on]`; `left` is a table or another join.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub on: Option<Node>,
    pub left: Node,
    pub right: Binding,
}

impl Join {
    pub(crate) fn children<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.extend(self.on.as_ref());
        out.push(&self.left);
        out.push(&self.right.expr);
    }

    pub(crate) fn children_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Node>) {
        out.extend(self.on.as_mut());
        out.push(&mut self.left);
        out.push(&mut self.right.expr);
    }
}

/// A SELECT-FROM-WHERE block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Select {
    pub distinct: bool,
    /// `DISTINCT ON (...)` expressions
    pub distinct_on: Vec<Node>,
    pub columns: Vec<Binding>,
    /// A table or a join
    pub from: Option<Node>,
    pub where_: Option<Node>,
    pub group_by: Vec<Binding>,
    pub having: Option<Node>,
    pub order_by: Vec<Order>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Select {
    /// Create `SELECT columns [FROM from]`
    pub fn new(columns: Vec<Binding>, from: Option<Node>) -> Self {
        Self {
            columns,
            from,
            ..Default::default()
        }
    }

    pub fn has_distinct(&self) -> bool {
        self.distinct || !self.distinct_on.is_empty()
    }

    // FROM, WHERE, HAVING, GROUP BY, columns, ORDER BY, DISTINCT ON
    pub(crate) fn children<'a>(&'a self, out: &mut Vec<&'a Node>) {
        out.extend(self.from.as_ref());
        out.extend(self.where_.as_ref());
        out.extend(self.having.as_ref());
        out.extend(self.group_by.iter().map(|b| &b.expr));
        out.extend(self.columns.iter().map(|b| &b.expr));
        out.extend(self.order_by.iter().map(|o| &o.column));
        out.extend(self.distinct_on.iter());
    }

    pub(crate) fn children_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Node>) {
        out.extend(self.from.as_mut());
        out.extend(self.where_.as_mut());
        out.extend(self.having.as_mut());
        out.extend(self.group_by.iter_mut().map(|b| &mut b.expr));
        out.extend(self.columns.iter_mut().map(|b| &mut b.expr));
        out.extend(self.order_by.iter_mut().map(|o| &mut o.column));
        out.extend(self.distinct_on.iter_mut());
    }
}

impl From<Select> for Node {
    fn from(s: Select) -> Node {
        Node::Select(Box::new(s))
    }
}

/// A named subquery of a WITH clause.
#[derive(Debug, Clone, PartialEq)]
pub struct CteBinding {
    pub table: String,
    pub select: Select,
}

/// A complete statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub explain: ExplainFormat,
    pub with: Vec<CteBinding>,
    /// Destination of `SELECT ... INTO`
    pub into: Option<Node>,
    /// A SELECT or a UNION
    pub body: Node,
}

impl Query {
    pub fn new(body: Node) -> Self {
        Self {
            explain: ExplainFormat::None,
            with: Vec::new(),
            into: None,
            body,
        }
    }
}
