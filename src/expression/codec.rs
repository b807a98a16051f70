//! Binary encoding of expression trees.
//!
//! Scalar constants are written as plain values (an identifier is a
//! symbol). Every other node is a struct whose `type` field names the
//! variant, followed by its named fields. Decoding rejects unknown
//! variants, unknown fields and out-of-range operator codes.

pub mod datum;

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;

use crate::expression::builtin::BuiltinOp;
use crate::expression::error::{DecodeError, DecodeResult, EncodeError, EncodeResult};
use crate::expression::literal::{Field, List, Struct, Timestamp};
use crate::expression::node::{Builtin, Case, CaseLimb, Node};
use crate::expression::operator::{
    AggregateOp, ArithOp, CmpOp, ExplainFormat, IsKeyword, JoinKind, LogicalOp, StringMatchOp,
    UnaryArithOp, UnionType,
};
use crate::expression::rational::Rational;
use crate::expression::registry;
use crate::expression::relation::{
    Aggregate, Binding, CteBinding, Join, Order, Query, Select, Table, Window,
};
use crate::expression::types::TypeSet;

use self::datum::Datum;

/// Encode a node as a complete stream.
///
/// Fails when a List or Struct literal holds something that is not a
/// constant.
pub fn encode(node: &Node) -> EncodeResult<Bytes> {
    Ok(datum::encode(&to_datum(node)?))
}

/// Decode a stream produced by [`encode`].
pub fn decode(buf: &[u8]) -> DecodeResult<Node> {
    from_datum(datum::decode(buf)?)
}

/// Encode a query as a complete stream.
pub fn encode_query(q: &Query) -> EncodeResult<Bytes> {
    Ok(datum::encode(&query_to_datum(q)?))
}

/// Decode a stream produced by [`encode_query`].
pub fn decode_query(buf: &[u8]) -> DecodeResult<Query> {
    query_from_datum(datum::decode(buf)?)
}

/// A decoded stream holding either a bare node or a query.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Node(Node),
    Query(Query),
}

/// Decode a stream holding either a node or a query.
pub fn decode_any(buf: &[u8]) -> DecodeResult<Decoded> {
    let d = datum::decode(buf)?;
    let is_query = match &d {
        Datum::Struct(fields) => fields
            .iter()
            .any(|(k, v)| k == "type" && matches!(v, Datum::Symbol(s) if s == "query")),
        _ => false,
    };
    if is_query {
        query_from_datum(d).map(Decoded::Query)
    } else {
        from_datum(d).map(Decoded::Node)
    }
}

struct Record {
    fields: Vec<(String, Datum)>,
    /// First field that failed to encode
    error: Option<EncodeError>,
}

impl Record {
    fn new(ty: &str) -> Self {
        Record {
            fields: vec![("type".to_string(), Datum::Symbol(ty.to_string()))],
            error: None,
        }
    }

    fn field(mut self, name: &str, value: Datum) -> Self {
        self.fields.push((name.to_string(), value));
        self
    }

    fn try_field(mut self, name: &str, value: EncodeResult<Datum>) -> Self {
        match value {
            Ok(v) => self.field(name, v),
            Err(e) => {
                if self.error.is_none() {
                    self.error = Some(e);
                }
                self
            }
        }
    }

    fn node(self, name: &str, n: &Node) -> Self {
        self.try_field(name, to_datum(n))
    }

    fn opt_node(self, name: &str, n: Option<&Node>) -> Self {
        match n {
            Some(n) => self.node(name, n),
            None => self,
        }
    }

    fn code(self, name: &str, code: u64) -> Self {
        self.field(name, Datum::Int(code as i64))
    }

    fn nodes<'a>(self, name: &str, nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        let list = nodes
            .into_iter()
            .map(to_datum)
            .collect::<EncodeResult<_>>()
            .map(Datum::List);
        self.try_field(name, list)
    }

    fn done(self) -> EncodeResult<Datum> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(Datum::Struct(self.fields)),
        }
    }
}

/// Convert a node into its tagged-record form.
pub fn to_datum(node: &Node) -> EncodeResult<Datum> {
    match node {
        Node::Null => Ok(Datum::Null),
        Node::Missing => Record::new("missing").done(),
        Node::Bool(b) => Ok(Datum::Bool(*b)),
        Node::Integer(i) => Ok(Datum::Int(*i)),
        Node::Float(f) => Ok(Datum::Float(*f)),
        Node::Rational(r) => Record::new("rat")
            .field("blob", Datum::Blob(rational_blob(r)))
            .done(),
        Node::String(s) => Ok(Datum::String(s.clone())),
        Node::Timestamp(t) => Ok(Datum::Timestamp(t.unix_micros())),
        Node::Struct(_) => Record::new("struct")
            .try_field("value", constant_datum(node))
            .done(),
        Node::List(_) => Record::new("list")
            .try_field("value", constant_datum(node))
            .done(),
        Node::Ident(name) => Ok(Datum::Symbol(name.clone())),
        Node::Dot { inner, field } => Record::new("dot")
            .node("inner", inner)
            .field("field", Datum::Symbol(field.clone()))
            .done(),
        Node::Index { inner, offset } => Record::new("index")
            .node("inner", inner)
            .field("offset", Datum::Int(*offset))
            .done(),
        Node::Star => Record::new("star").done(),
        Node::Not(inner) => Record::new("not").node("inner", inner).done(),
        Node::Logical { op, left, right } => Record::new("logical")
            .code("op", op.code())
            .node("left", left)
            .node("right", right)
            .done(),
        Node::Comparison { op, left, right } => Record::new("cmp")
            .code("op", op.code())
            .node("left", left)
            .node("right", right)
            .done(),
        Node::StringMatch {
            op,
            expr,
            pattern,
            escape,
        } => {
            let r = Record::new("stringmatch")
                .code("op", op.code())
                .node("expr", expr)
                .field("pattern", Datum::String(pattern.clone()));
            match escape {
                Some(e) => r.field("escape", Datum::String(e.clone())).done(),
                None => r.done(),
            }
        }
        Node::UnaryArith { op, child } => Record::new("unaryArith")
            .code("op", op.code())
            .node("child", child)
            .done(),
        Node::Arithmetic { op, left, right } => Record::new("arith")
            .code("op", op.code())
            .node("left", left)
            .node("right", right)
            .done(),
        Node::IsKey { key, inner } => Record::new("is")
            .code("key", key.code())
            .node("inner", inner)
            .done(),
        Node::Cast { from, to } => Record::new("cast")
            .node("from", from)
            .code("to", to.bits() as u64)
            .done(),
        Node::Case(c) => {
            let limbs = c
                .limbs
                .iter()
                .map(|l| -> EncodeResult<Datum> {
                    Ok(Datum::List(vec![to_datum(&l.when)?, to_datum(&l.then)?]))
                })
                .collect::<EncodeResult<_>>()
                .map(Datum::List);
            let mut r = Record::new("case")
                .try_field("limbs", limbs)
                .opt_node("else", c.otherwise.as_ref());
            if let Some(v) = &c.valence {
                r = r.field("valence", Datum::String(v.clone()));
            }
            r.done()
        }
        Node::Builtin(b) => Record::new("builtin")
            .field("func", Datum::String(b.name().to_string()))
            .nodes("args", &b.args)
            .done(),
        Node::Member { arg, values } => Record::new("member")
            .node("arg", arg)
            .nodes("values", values)
            .done(),
        Node::Appended(values) => Record::new("append").nodes("values", values).done(),
        Node::Aggregate(a) => {
            let mut r = Record::new("aggregate").code("op", a.op.code());
            if a.op == AggregateOp::ApproxCountDistinct {
                r = r.code("precision", a.precision as u64);
            }
            r = r.node("inner", &a.inner);
            if let Some(w) = &a.over {
                r = r.nodes("over_partition", &w.partition_by);
                if !w.order_by.is_empty() {
                    r = r.try_field("over_order_by", orders_datum(&w.order_by));
                }
            }
            r.opt_node("filter_where", a.filter.as_ref()).done()
        }
        Node::Table(t) => {
            let r = Record::new("table").node("expr", &t.binding.expr);
            bind_field(r, &t.binding).done()
        }
        Node::Join(j) => {
            let r = Record::new("join")
                .code("kind", j.kind.code())
                .opt_node("on", j.on.as_ref())
                .node("left", &j.left)
                .node("right", &j.right.expr);
            bind_field(r, &j.right).done()
        }
        Node::Select(s) => select_datum(s),
        Node::Union { kind, left, right } => Record::new("union")
            .code("uniontype", kind.code())
            .node("left", left)
            .node("right", right)
            .done(),
    }
}

fn bind_field(r: Record, b: &Binding) -> Record {
    match b.result() {
        Some(name) if b.explicit() => r.field("bind", Datum::String(name.to_string())),
        _ => r,
    }
}

fn bindings_datum(bindings: &[Binding]) -> EncodeResult<Datum> {
    let list = bindings
        .iter()
        .map(|b| -> EncodeResult<Datum> {
            let mut fields = vec![("expr".to_string(), to_datum(&b.expr)?)];
            if let (true, Some(name)) = (b.explicit(), b.result()) {
                fields.push(("bind".to_string(), Datum::String(name.to_string())));
            }
            Ok(Datum::Struct(fields))
        })
        .collect::<EncodeResult<_>>()?;
    Ok(Datum::List(list))
}

fn orders_datum(orders: &[Order]) -> EncodeResult<Datum> {
    let list = orders
        .iter()
        .map(|o| {
            let mut r = Record::new("ord").node("col", &o.column);
            if o.desc {
                r = r.field("desc", Datum::Bool(true));
            }
            if o.nulls_last {
                r = r.field("nulls_last", Datum::Bool(true));
            }
            r.done()
        })
        .collect::<EncodeResult<_>>()?;
    Ok(Datum::List(list))
}

fn select_datum(s: &Select) -> EncodeResult<Datum> {
    let mut r = Record::new("select")
        .try_field("cols", bindings_datum(&s.columns))
        .opt_node("from", s.from.as_ref())
        .opt_node("where", s.where_.as_ref())
        .opt_node("having", s.having.as_ref());
    if !s.group_by.is_empty() {
        r = r.try_field("group_by", bindings_datum(&s.group_by));
    }
    if !s.order_by.is_empty() {
        r = r.try_field("order_by", orders_datum(&s.order_by));
    }
    if s.distinct {
        r = r.field("distinct", Datum::Bool(true));
    }
    if !s.distinct_on.is_empty() {
        r = r.nodes("distinct_expr", &s.distinct_on);
    }
    if let Some(limit) = s.limit {
        r = r.field("limit", Datum::Int(limit));
    }
    if let Some(offset) = s.offset {
        r = r.field("offset", Datum::Int(offset));
    }
    r.done()
}

/// Convert a query into its tagged-record form.
pub fn query_to_datum(q: &Query) -> EncodeResult<Datum> {
    let mut r = Record::new("query").code("explain", q.explain.code());
    if !q.with.is_empty() {
        let mut list = Vec::with_capacity(q.with.len() * 2);
        for cte in &q.with {
            list.push(Datum::String(cte.table.clone()));
            list.push(select_datum(&cte.select)?);
        }
        r = r.field("with", Datum::List(list));
    }
    r.opt_node("into", q.into.as_ref())
        .node("body", &q.body)
        .done()
}

fn rational_blob(r: &Rational) -> Vec<u8> {
    let mut out = Vec::with_capacity(32);
    // writes into a Vec cannot fail
    let _ = out.write_i128::<BigEndian>(r.numer());
    let _ = out.write_i128::<BigEndian>(r.denom());
    out
}

fn rational_from_blob(blob: &[u8]) -> DecodeResult<Rational> {
    if blob.len() != 32 {
        return Err(DecodeError::InvalidRational(format!(
            "blob of {} bytes",
            blob.len()
        )));
    }
    let mut rd = Cursor::new(blob);
    let bad = |_| DecodeError::InvalidRational("short blob".to_string());
    let num = rd.read_i128::<BigEndian>().map_err(bad)?;
    let den = rd.read_i128::<BigEndian>().map_err(bad)?;
    Rational::new(num, den).ok_or_else(|| DecodeError::InvalidRational("zero denominator".into()))
}

/// The plain value of a List or Struct literal. Nested rationals are
/// stored exactly as blobs; anything that is not a constant is an error.
fn constant_datum(node: &Node) -> EncodeResult<Datum> {
    let element = |v: &Node| {
        if v.is_constant() {
            constant_datum(v)
        } else {
            Err(EncodeError::NotConstant {
                literal: node.to_string(),
                element: v.to_string(),
            })
        }
    };
    let d = match node {
        Node::Null => Datum::Null,
        Node::Bool(b) => Datum::Bool(*b),
        Node::Integer(i) => Datum::Int(*i),
        Node::Float(f) => Datum::Float(*f),
        Node::Rational(r) => Datum::Blob(rational_blob(r)),
        Node::String(s) => Datum::String(s.clone()),
        Node::Timestamp(t) => Datum::Timestamp(t.unix_micros()),
        Node::Struct(s) => Datum::Struct(
            s.fields
                .iter()
                .map(|f| -> EncodeResult<(String, Datum)> {
                    Ok((f.label.clone(), element(&f.value)?))
                })
                .collect::<EncodeResult<_>>()?,
        ),
        Node::List(l) => Datum::List(l.values.iter().map(element).collect::<EncodeResult<_>>()?),
        other => {
            return Err(EncodeError::NotConstant {
                literal: other.to_string(),
                element: other.to_string(),
            })
        }
    };
    Ok(d)
}

fn constant_from_datum(d: Datum) -> DecodeResult<Node> {
    let n = match d {
        Datum::Null => Node::Null,
        Datum::Bool(b) => Node::Bool(b),
        Datum::Int(i) => Node::Integer(i),
        Datum::Float(f) => Node::Float(f),
        Datum::Symbol(s) | Datum::String(s) => Node::String(s),
        Datum::Timestamp(t) => Node::Timestamp(Timestamp::from_unix_micros(t)),
        Datum::List(values) => Node::List(List::new(
            values
                .into_iter()
                .map(constant_from_datum)
                .collect::<DecodeResult<_>>()?,
        )),
        Datum::Struct(fields) => Node::Struct(Struct::new(
            fields
                .into_iter()
                .map(|(label, v)| Ok(Field::new(label, constant_from_datum(v)?)))
                .collect::<DecodeResult<_>>()?,
        )),
        Datum::Blob(blob) => Node::Rational(rational_from_blob(&blob)?),
    };
    Ok(n)
}

/// The fields of a record being decoded. Fields are taken by name;
/// whatever is left at the end is an unexpected field.
struct Fields {
    node: &'static str,
    fields: Vec<(String, Datum)>,
}

impl Fields {
    fn take(&mut self, name: &str) -> Option<Datum> {
        let pos = self.fields.iter().position(|(k, _)| k == name)?;
        Some(self.fields.remove(pos).1)
    }

    fn required(&mut self, name: &str) -> DecodeResult<Datum> {
        self.take(name).ok_or_else(|| DecodeError::MissingField {
            node: self.node.to_string(),
            field: name.to_string(),
        })
    }

    fn node(&mut self, name: &str) -> DecodeResult<Node> {
        from_datum(self.required(name)?)
    }

    fn boxed(&mut self, name: &str) -> DecodeResult<Box<Node>> {
        self.node(name).map(Box::new)
    }

    fn opt_node(&mut self, name: &str) -> DecodeResult<Option<Node>> {
        self.take(name).map(from_datum).transpose()
    }

    fn nodes(&mut self, name: &str) -> DecodeResult<Vec<Node>> {
        match self.take(name) {
            Some(d) => d.into_list()?.into_iter().map(from_datum).collect(),
            None => Ok(Vec::new()),
        }
    }

    fn int(&mut self, name: &str) -> DecodeResult<i64> {
        self.required(name)?.into_int()
    }

    fn opt_int(&mut self, name: &str) -> DecodeResult<Option<i64>> {
        self.take(name).map(Datum::into_int).transpose()
    }

    fn flag(&mut self, name: &str) -> DecodeResult<bool> {
        Ok(self.take(name).map(Datum::into_bool).transpose()?.unwrap_or(false))
    }

    fn text(&mut self, name: &str) -> DecodeResult<String> {
        self.required(name)?.into_text()
    }

    fn opt_text(&mut self, name: &str) -> DecodeResult<Option<String>> {
        self.take(name).map(Datum::into_text).transpose()
    }

    fn op<T>(&mut self, name: &'static str, from_code: fn(u64) -> Option<T>) -> DecodeResult<T> {
        let v = self.int(name)?;
        u64::try_from(v)
            .ok()
            .and_then(from_code)
            .ok_or(DecodeError::InvalidDiscriminator { what: name, value: v })
    }

    fn finish(self) -> DecodeResult<()> {
        match self.fields.into_iter().next() {
            Some((field, _)) => Err(DecodeError::UnexpectedField {
                node: self.node.to_string(),
                field,
            }),
            None => Ok(()),
        }
    }
}

fn record(d: Datum) -> DecodeResult<(String, Vec<(String, Datum)>)> {
    let mut fields = d.into_struct()?;
    let pos = fields
        .iter()
        .position(|(k, _)| k == "type")
        .ok_or(DecodeError::MissingType)?;
    let ty = fields.remove(pos).1.into_text()?;
    Ok((ty, fields))
}

/// Reconstruct a node from its tagged-record form.
pub fn from_datum(d: Datum) -> DecodeResult<Node> {
    let fields = match d {
        Datum::Null => return Ok(Node::Null),
        Datum::Bool(b) => return Ok(Node::Bool(b)),
        Datum::Int(i) => return Ok(Node::Integer(i)),
        Datum::Float(f) => return Ok(Node::Float(f)),
        Datum::String(s) => return Ok(Node::String(s)),
        Datum::Symbol(s) => return Ok(Node::Ident(s)),
        Datum::Timestamp(t) => return Ok(Node::Timestamp(Timestamp::from_unix_micros(t))),
        Datum::Struct(fields) => fields,
        other => {
            return Err(DecodeError::TypeMismatch {
                expected: "node",
                found: other.kind_name(),
            })
        }
    };
    let (ty, fields) = record(Datum::Struct(fields))?;
    let (func, node): (&'static str, Decoder) = match ty.as_str() {
        "missing" => ("missing", decode_missing),
        "star" => ("star", decode_star),
        "rat" => ("rat", decode_rational),
        "struct" => ("struct", decode_literal),
        "list" => ("list", decode_literal),
        "dot" => ("dot", decode_dot),
        "index" => ("index", decode_index),
        "not" => ("not", decode_not),
        "logical" => ("logical", decode_logical),
        "cmp" => ("cmp", decode_cmp),
        "stringmatch" => ("stringmatch", decode_string_match),
        "unaryArith" => ("unaryArith", decode_unary_arith),
        "arith" => ("arith", decode_arith),
        "is" => ("is", decode_is),
        "cast" => ("cast", decode_cast),
        "case" => ("case", decode_case),
        "builtin" => ("builtin", decode_builtin),
        "member" => ("member", decode_member),
        "append" => ("append", decode_append),
        "aggregate" => ("aggregate", decode_aggregate),
        "table" => ("table", decode_table),
        "join" => ("join", decode_join),
        "select" => ("select", decode_select_node),
        "union" => ("union", decode_union),
        _ => return Err(DecodeError::UnknownType(ty)),
    };
    let mut fields = Fields { node: func, fields };
    let out = node(&mut fields).and_then(|n| fields.finish().map(|_| n));
    out.map_err(|e| e.context(func))
}

type Decoder = fn(&mut Fields) -> DecodeResult<Node>;

fn decode_missing(_: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Missing)
}

fn decode_star(_: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Star)
}

fn decode_literal(f: &mut Fields) -> DecodeResult<Node> {
    constant_from_datum(f.required("value")?)
}

fn decode_not(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Not(f.boxed("inner")?))
}

fn decode_append(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Appended(f.nodes("values")?))
}

fn decode_select_node(f: &mut Fields) -> DecodeResult<Node> {
    decode_select(f).map(Node::from)
}

fn decode_rational(f: &mut Fields) -> DecodeResult<Node> {
    let blob = f.required("blob")?.into_blob()?;
    rational_from_blob(&blob).map(Node::Rational)
}

fn decode_dot(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Dot {
        inner: f.boxed("inner")?,
        field: f.text("field")?,
    })
}

fn decode_index(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Index {
        inner: f.boxed("inner")?,
        offset: f.int("offset")?,
    })
}

fn decode_logical(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Logical {
        op: f.op("op", LogicalOp::from_code)?,
        left: f.boxed("left")?,
        right: f.boxed("right")?,
    })
}

fn decode_cmp(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Comparison {
        op: f.op("op", CmpOp::from_code)?,
        left: f.boxed("left")?,
        right: f.boxed("right")?,
    })
}

fn decode_string_match(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::StringMatch {
        op: f.op("op", StringMatchOp::from_code)?,
        expr: f.boxed("expr")?,
        pattern: f.text("pattern")?,
        escape: f.opt_text("escape")?,
    })
}

fn decode_unary_arith(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::UnaryArith {
        op: f.op("op", UnaryArithOp::from_code)?,
        child: f.boxed("child")?,
    })
}

fn decode_arith(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Arithmetic {
        op: f.op("op", ArithOp::from_code)?,
        left: f.boxed("left")?,
        right: f.boxed("right")?,
    })
}

fn decode_is(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::IsKey {
        key: f.op("key", IsKeyword::from_code)?,
        inner: f.boxed("inner")?,
    })
}

fn decode_cast(f: &mut Fields) -> DecodeResult<Node> {
    let from = f.boxed("from")?;
    let bits = f.int("to")?;
    let to = u16::try_from(bits).map_err(|_| DecodeError::InvalidDiscriminator {
        what: "to",
        value: bits,
    })?;
    Ok(Node::Cast {
        from,
        to: TypeSet(to),
    })
}

fn decode_case(f: &mut Fields) -> DecodeResult<Node> {
    let mut limbs = Vec::new();
    for limb in f.required("limbs")?.into_list()? {
        let mut pair = limb.into_list()?.into_iter();
        match (pair.next(), pair.next(), pair.next()) {
            (Some(when), Some(then), None) => limbs.push(CaseLimb {
                when: from_datum(when)?,
                then: from_datum(then)?,
            }),
            _ => {
                return Err(DecodeError::TypeMismatch {
                    expected: "[when, then]",
                    found: "list",
                })
            }
        }
    }
    let mut c = Case::new(limbs, f.opt_node("else")?);
    c.valence = f.opt_text("valence")?;
    Ok(Node::Case(Box::new(c)))
}

fn decode_builtin(f: &mut Fields) -> DecodeResult<Node> {
    let name = f.text("func")?;
    let func = registry::lookup_builtin(&name);
    let text = if func == BuiltinOp::Unspecified {
        name
    } else {
        String::new()
    };
    Ok(Node::Builtin(Builtin {
        func,
        text,
        args: f.nodes("args")?,
    }))
}

fn decode_member(f: &mut Fields) -> DecodeResult<Node> {
    let arg = f.node("arg")?;
    let values = f.nodes("values")?;
    if let Some(bad) = values.iter().find(|v| !v.is_constant()) {
        return Err(DecodeError::TypeMismatch {
            expected: "constant",
            found: bad.kind().as_str(),
        });
    }
    Ok(Node::member(arg, values))
}

fn decode_aggregate(f: &mut Fields) -> DecodeResult<Node> {
    let op = f.op("op", AggregateOp::from_code)?;
    let mut a = Aggregate::new(op, f.node("inner")?);
    if let Some(p) = f.opt_int("precision")? {
        a.precision = u8::try_from(p).map_err(|_| DecodeError::InvalidDiscriminator {
            what: "precision",
            value: p,
        })?;
    }
    if let Some(partition) = f.take("over_partition") {
        let partition_by = partition
            .into_list()?
            .into_iter()
            .map(from_datum)
            .collect::<DecodeResult<_>>()?;
        let order_by = match f.take("over_order_by") {
            Some(d) => decode_orders(d)?,
            None => Vec::new(),
        };
        a.over = Some(Window {
            partition_by,
            order_by,
        });
    }
    a.filter = f.opt_node("filter_where")?;
    Ok(Node::Aggregate(Box::new(a)))
}

fn decode_table(f: &mut Fields) -> DecodeResult<Node> {
    let mut binding = Binding::new(f.node("expr")?);
    if let Some(name) = f.opt_text("bind")? {
        binding.set_result(name);
    }
    Ok(Node::Table(Box::new(Table::new(binding))))
}

fn decode_join(f: &mut Fields) -> DecodeResult<Node> {
    let kind = f.op("kind", JoinKind::from_code)?;
    let on = f.opt_node("on")?;
    let left = f.node("left")?;
    let mut right = Binding::new(f.node("right")?);
    if let Some(name) = f.opt_text("bind")? {
        right.set_result(name);
    }
    Ok(Node::Join(Box::new(Join {
        kind,
        on,
        left,
        right,
    })))
}

fn decode_union(f: &mut Fields) -> DecodeResult<Node> {
    Ok(Node::Union {
        kind: f.op("uniontype", UnionType::from_code)?,
        left: f.boxed("left")?,
        right: f.boxed("right")?,
    })
}

fn decode_bindings(d: Datum) -> DecodeResult<Vec<Binding>> {
    d.into_list()?
        .into_iter()
        .map(|item| {
            let mut f = Fields {
                node: "binding",
                fields: item.into_struct()?,
            };
            let mut b = Binding::new(f.node("expr")?);
            if let Some(name) = f.opt_text("bind")? {
                b.set_result(name);
            }
            f.finish()?;
            Ok(b)
        })
        .collect()
}

fn decode_orders(d: Datum) -> DecodeResult<Vec<Order>> {
    d.into_list()?
        .into_iter()
        .map(|item| {
            let (ty, fields) = record(item)?;
            if ty != "ord" {
                return Err(DecodeError::UnknownType(ty));
            }
            let mut f = Fields {
                node: "ord",
                fields,
            };
            let o = Order {
                column: f.node("col")?,
                desc: f.flag("desc")?,
                nulls_last: f.flag("nulls_last")?,
            };
            f.finish()?;
            Ok(o)
        })
        .collect()
}

fn decode_select(f: &mut Fields) -> DecodeResult<Select> {
    let mut s = Select::new(decode_bindings(f.required("cols")?)?, f.opt_node("from")?);
    s.where_ = f.opt_node("where")?;
    s.having = f.opt_node("having")?;
    if let Some(g) = f.take("group_by") {
        s.group_by = decode_bindings(g)?;
    }
    if let Some(o) = f.take("order_by") {
        s.order_by = decode_orders(o)?;
    }
    s.distinct = f.flag("distinct")?;
    s.distinct_on = f.nodes("distinct_expr")?;
    s.limit = f.opt_int("limit")?;
    s.offset = f.opt_int("offset")?;
    Ok(s)
}

fn select_from_datum(d: Datum) -> DecodeResult<Select> {
    let (ty, fields) = record(d)?;
    if ty != "select" {
        return Err(DecodeError::UnknownType(ty));
    }
    let mut f = Fields {
        node: "select",
        fields,
    };
    let s = decode_select(&mut f)?;
    f.finish()?;
    Ok(s)
}

/// Reconstruct a query from its tagged-record form.
pub fn query_from_datum(d: Datum) -> DecodeResult<Query> {
    let decode = |d: Datum| -> DecodeResult<Query> {
        let (ty, fields) = record(d)?;
        if ty != "query" {
            return Err(DecodeError::UnknownType(ty));
        }
        let mut f = Fields {
            node: "query",
            fields,
        };
        let explain = f.op("explain", ExplainFormat::from_code)?;
        let mut with = Vec::new();
        if let Some(list) = f.take("with") {
            let mut items = list.into_list()?.into_iter();
            while let Some(table) = items.next() {
                let select = items.next().ok_or_else(|| DecodeError::MissingField {
                    node: "query".to_string(),
                    field: "with".to_string(),
                })?;
                with.push(CteBinding {
                    table: table.into_text()?,
                    select: select_from_datum(select)?,
                });
            }
        }
        let into = f.opt_node("into")?;
        let body = f.node("body")?;
        f.finish()?;
        Ok(Query {
            explain,
            with,
            into,
            body,
        })
    };
    decode(d).map_err(|e| e.context("query"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(n: &Node) -> Node {
        decode(&encode(n).unwrap()).unwrap()
    }

    #[test]
    fn test_roundtrip_scalars() {
        let nodes = vec![
            Node::Null,
            Node::Missing,
            Node::Bool(true),
            Node::Integer(-7),
            Node::Float(2.5),
            Node::rational(1, 3).unwrap(),
            Node::string("hello"),
            Node::Timestamp(Timestamp::from_parts(2022, 5, 6, 7, 8, 9, 10).unwrap()),
            Node::path("t", &["a", "b"]),
            Node::index(Node::ident("l"), 3),
            Node::Star,
            Node::not(Node::ident("b")),
            Node::xor(Node::ident("a"), Node::ident("b")),
            Node::compare(CmpOp::Le, Node::ident("x"), Node::Integer(4)),
            Node::neg(Node::ident("x")),
            Node::arith(ArithOp::ShiftLeft, Node::ident("x"), Node::Integer(2)),
            Node::is(Node::ident("x"), IsKeyword::IsNotMissing),
            Node::cast(Node::ident("x"), TypeSet::STRING),
            Node::member(Node::ident("x"), vec![Node::Integer(2), Node::string("a")]),
            Node::append(Node::ident("a"), Node::ident("b")),
            Node::call_by_name("frob", vec![Node::Integer(1)]),
            Node::call(BuiltinOp::Upper, vec![Node::ident("s")]),
        ];
        for n in nodes {
            assert_eq!(roundtrip(&n), n, "{}", n);
        }
    }

    #[test]
    fn test_roundtrip_composites() {
        let mut sm = Node::like(Node::ident("s"), "a!%%");
        if let Node::StringMatch { escape, .. } = &mut sm {
            *escape = Some("!".to_string());
        }
        assert_eq!(roundtrip(&sm), sm);

        let mut case = Case::new(
            vec![CaseLimb {
                when: Node::ident("b"),
                then: Node::Integer(1),
            }],
            Some(Node::Missing),
        );
        case.valence = Some("logical".to_string());
        let case = Node::Case(Box::new(case));
        let back = roundtrip(&case);
        assert_eq!(back, case);
        let Node::Case(c) = back else {
            panic!("not a case");
        };
        assert_eq!(c.valence.as_deref(), Some("logical"));

        let s = Node::Struct(Struct::new(vec![
            Field::new("a", Node::Integer(1)),
            Field::new("b", Node::List(List::new(vec![Node::string("x")]))),
        ]));
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn test_roundtrip_query() {
        let mut agg = Aggregate::new(AggregateOp::ApproxCountDistinct, Node::ident("x"));
        agg.precision = 9;
        agg.over = Some(Window {
            partition_by: vec![Node::ident("g")],
            order_by: vec![Order {
                column: Node::ident("t"),
                desc: true,
                nulls_last: true,
            }],
        });
        agg.filter = Some(Node::ident("f"));
        let mut s = Select::new(
            vec![
                Binding::named(Node::Aggregate(Box::new(agg)), "n"),
                Binding::new(Node::ident("g")),
            ],
            Some(Node::Join(Box::new(Join {
                kind: JoinKind::Inner,
                on: Some(Node::Bool(true)),
                left: Node::table(Node::ident("a")),
                right: Binding::named(Node::ident("b"), "bb"),
            }))),
        );
        s.where_ = Some(Node::ident("w"));
        s.group_by = vec![Binding::new(Node::ident("g"))];
        s.order_by = vec![Order::new(Node::ident("g"))];
        s.distinct_on = vec![Node::ident("g")];
        s.limit = Some(5);
        s.offset = Some(2);

        let mut q = Query::new(Node::from(s.clone()));
        q.explain = ExplainFormat::Graphviz;
        q.with = vec![CteBinding {
            table: "c".to_string(),
            select: s,
        }];
        q.into = Some(Node::path("db", &["t"]));
        let buf = encode_query(&q).unwrap();
        let back = decode_query(&buf).unwrap();
        assert_eq!(back, q);
        assert_eq!(back.to_string(), q.to_string());
        assert_eq!(decode_any(&buf).unwrap(), Decoded::Query(q));
    }

    #[test]
    fn test_nested_rational_is_exact() {
        let third = Node::rational(1, 3).unwrap();
        let list = Node::List(List::new(vec![third.clone(), Node::Integer(2)]));
        let back = roundtrip(&list);
        assert_eq!(back, list);
        let Node::List(l) = &back else {
            panic!("not a list");
        };
        assert!(matches!(l.values[0], Node::Rational(_)));

        let s = Node::Struct(Struct::new(vec![
            Field::new("r", third),
            Field::new("l", list),
        ]));
        assert_eq!(roundtrip(&s), s);
    }

    #[test]
    fn test_literal_with_non_constant_is_rejected() {
        let cases = [
            Node::List(List::new(vec![Node::Integer(1), Node::Missing])),
            Node::List(List::new(vec![Node::ident("x")])),
            Node::Struct(Struct::new(vec![Field::new("a", Node::Missing)])),
        ];
        for n in cases {
            let err = encode(&n).unwrap_err();
            assert!(matches!(err, EncodeError::NotConstant { .. }), "{}", n);
        }

        let nested = Node::List(List::new(vec![Node::List(List::new(vec![Node::Missing]))]));
        let err = encode(&Node::not(nested)).unwrap_err();
        assert!(err.to_string().starts_with("\"MISSING\" cannot be stored"), "{}", err);
    }

    fn with_extra_field(n: &Node) -> Datum {
        let Datum::Struct(mut fields) = to_datum(n).unwrap() else {
            panic!("{} is not a record", n);
        };
        fields.push(("bogus".to_string(), Datum::Int(1)));
        Datum::Struct(fields)
    }

    #[test]
    fn test_unknown_field_rejected() {
        let nodes = vec![
            Node::Missing,
            Node::Star,
            Node::rational(1, 3).unwrap(),
            Node::List(List::new(vec![])),
            Node::path("a", &["b"]),
            Node::index(Node::ident("a"), 0),
            Node::not(Node::ident("a")),
            Node::and(Node::ident("a"), Node::ident("b")),
            Node::compare(CmpOp::Eq, Node::ident("a"), Node::Integer(1)),
            Node::like(Node::ident("a"), "x%"),
            Node::neg(Node::ident("a")),
            Node::add(Node::ident("a"), Node::Integer(1)),
            Node::is(Node::ident("a"), IsKeyword::IsNull),
            Node::cast(Node::ident("a"), TypeSet::INTEGER),
            Node::case(vec![(Node::ident("a"), Node::Integer(1))], None),
            Node::call(BuiltinOp::Upper, vec![Node::ident("a")]),
            Node::member(Node::ident("a"), vec![Node::Integer(1)]),
            Node::append(Node::ident("a"), Node::ident("b")),
            Aggregate::node(AggregateOp::Count, Node::Star),
            Node::table(Node::ident("a")),
            Node::union(UnionType::All, Node::ident("a"), Node::ident("b")),
            Node::from(Select::new(vec![Binding::new(Node::ident("a"))], None)),
        ];
        for n in nodes {
            let err = from_datum(with_extra_field(&n)).unwrap_err();
            assert!(
                matches!(
                    err.root(),
                    DecodeError::UnexpectedField { field, .. } if field == "bogus"
                ),
                "{}: {}",
                n,
                err
            );
        }
    }

    #[test]
    fn test_unknown_field_in_nested_records() {
        let s = Select::new(vec![Binding::new(Node::ident("a"))], None);
        let Datum::Struct(mut fields) = to_datum(&Node::from(s)).unwrap() else {
            panic!("select is not a record");
        };
        for (name, value) in &mut fields {
            if name == "cols" {
                *value = Datum::List(vec![Datum::Struct(vec![
                    ("expr".to_string(), Datum::Symbol("a".to_string())),
                    ("alias".to_string(), Datum::String("b".to_string())),
                ])]);
            }
        }
        let err = from_datum(Datum::Struct(fields)).unwrap_err();
        assert!(matches!(
            err.root(),
            DecodeError::UnexpectedField { field, .. } if field == "alias"
        ));

        let q = Query::new(Node::ident("x"));
        let Datum::Struct(mut fields) = query_to_datum(&q).unwrap() else {
            panic!("query is not a record");
        };
        fields.push(("extra".to_string(), Datum::Null));
        let err = query_from_datum(Datum::Struct(fields)).unwrap_err();
        assert!(matches!(err.root(), DecodeError::UnexpectedField { .. }));
    }

    #[test]
    fn test_invalid_discriminators() {
        let bad_op = Datum::Struct(vec![
            ("type".to_string(), Datum::Symbol("cmp".to_string())),
            ("op".to_string(), Datum::Int(42)),
            ("left".to_string(), Datum::Int(1)),
            ("right".to_string(), Datum::Int(2)),
        ]);
        let err = from_datum(bad_op).unwrap_err();
        assert!(matches!(
            err.root(),
            DecodeError::InvalidDiscriminator { what: "op", value: 42 }
        ));
        assert_eq!(err.to_string(), "cmp: invalid op discriminator 42");

        let unknown = Datum::Struct(vec![("type".to_string(), Datum::Symbol("frob".to_string()))]);
        assert_eq!(
            from_datum(unknown),
            Err(DecodeError::UnknownType("frob".to_string()))
        );
        assert_eq!(from_datum(Datum::Struct(vec![])), Err(DecodeError::MissingType));

        let bad_rat = Datum::Struct(vec![
            ("type".to_string(), Datum::Symbol("rat".to_string())),
            ("blob".to_string(), Datum::Blob(vec![1, 2, 3])),
        ]);
        assert!(matches!(
            from_datum(bad_rat).unwrap_err().root(),
            DecodeError::InvalidRational(_)
        ));
    }
}
