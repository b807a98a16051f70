//! SQL-like rendering of nodes and queries.
//!
//! [`fmt::Display`] renders the exact text. [`redacted`] replaces every
//! literal value with a pseudo-random value of the same type, derived
//! from the literal and the configured redaction key, so that query
//! text can be logged without revealing the constants it contains.

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::expression::builtin::BuiltinOp;
use crate::expression::literal::{format_float, Timestamp};
use crate::expression::node::Node;
use crate::expression::operator::{AggregateOp, APPROX_COUNT_DISTINCT_DEFAULT_PRECISION};
use crate::expression::registry;
use crate::expression::relation::{Aggregate, Binding, Order, Query, Select};
use crate::expression::types::TypeSet;

const REDACTED_STRING_LEN: usize = 8;
const REDACTED_INT_RANGE: i64 = 1_000_000;
// 2000-01-01T00:00:00Z and 2030-01-01T00:00:00Z
const REDACTED_TIME_START: i64 = 946_684_800_000_000;
const REDACTED_TIME_END: i64 = 1_893_456_000_000_000;

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer::new(None);
        p.node(self);
        f.write_str(&p.out)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer::new(None);
        p.query(self);
        f.write_str(&p.out)
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut p = Printer::new(None);
        p.binding(self);
        f.write_str(&p.out)
    }
}

impl Query {
    /// The query text with every literal redacted.
    pub fn redacted_text(&self) -> String {
        let mut p = Printer::new(Some(registry::config().redaction_key));
        p.query(self);
        p.out
    }
}

/// Render `node` with every literal redacted.
pub fn redacted(node: &Node) -> String {
    let mut p = Printer::new(Some(registry::config().redaction_key));
    p.node(node);
    p.out
}

struct Printer {
    out: String,
    redact: Option<u64>,
}

impl Printer {
    fn new(redact: Option<u64>) -> Self {
        Self {
            out: String::new(),
            redact,
        }
    }

    fn push(&mut self, s: &str) {
        self.out.push_str(s);
    }

    fn list<T>(&mut self, items: &[T], mut each: impl FnMut(&mut Self, &T)) {
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            each(self, item);
        }
    }

    fn parens(&mut self, wrap: bool, node: &Node) {
        if wrap {
            self.push("(");
        }
        self.node(node);
        if wrap {
            self.push(")");
        }
    }

    fn rng(&self, key: u64, tag: u8, value: &impl Hash) -> StdRng {
        let mut h = DefaultHasher::new();
        key.hash(&mut h);
        tag.hash(&mut h);
        value.hash(&mut h);
        StdRng::seed_from_u64(h.finish())
    }

    fn float(&mut self, v: f64) {
        let v = match self.redact {
            Some(key) => self.rng(key, b'f', &v.to_bits()).gen::<f64>(),
            None => v,
        };
        self.push(&format_float(v));
    }

    fn node(&mut self, node: &Node) {
        match node {
            Node::Null => self.push("NULL"),
            Node::Missing => self.push("MISSING"),
            Node::Bool(true) => self.push("TRUE"),
            Node::Bool(false) => self.push("FALSE"),
            Node::Integer(i) => {
                let v = match self.redact {
                    Some(key) => self.rng(key, b'i', i).gen_range(0..REDACTED_INT_RANGE),
                    None => *i,
                };
                self.push(&v.to_string());
            }
            Node::Float(f) => self.float(*f),
            Node::Rational(r) => match self.redact {
                Some(_) => self.float(r.to_f64()),
                None => self.push(&r.to_string()),
            },
            Node::String(s) => self.string(s),
            Node::Timestamp(t) => {
                let t = match self.redact {
                    Some(key) => Timestamp::from_unix_micros(
                        self.rng(key, b't', t)
                            .gen_range(REDACTED_TIME_START..REDACTED_TIME_END),
                    ),
                    None => *t,
                };
                self.push("`");
                self.push(&t.to_string());
                self.push("`");
            }
            Node::Struct(s) => {
                self.push("{");
                self.list(&s.fields, |p, f| {
                    p.push(&quote(&f.label));
                    p.push(": ");
                    p.node(&f.value);
                });
                self.push("}");
            }
            Node::List(l) => {
                self.push("[");
                self.list(&l.values, |p, v| p.node(v));
                self.push("]");
            }
            Node::Ident(name) => self.push(&quote_id(name)),
            Node::Dot { inner, field } => {
                self.node(inner);
                self.push(".");
                self.push(&quote_id(field));
            }
            Node::Index { inner, offset } => {
                self.node(inner);
                self.push(&format!("[{}]", offset));
            }
            Node::Star => self.push("*"),
            Node::Not(inner) => {
                self.push("!(");
                self.node(inner);
                self.push(")");
            }
            Node::Logical { op, left, right } => {
                self.node(left);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.parens(matches!(**right, Node::Logical { .. }), right);
            }
            Node::Comparison { op, left, right } => {
                self.parens(matches!(**left, Node::Logical { .. }), left);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                let wrap = matches!(**right, Node::Comparison { .. } | Node::Logical { .. });
                self.parens(wrap, right);
            }
            Node::StringMatch {
                op,
                expr,
                pattern,
                escape,
            } => {
                self.node(expr);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.string(pattern);
                if let Some(esc) = escape {
                    self.push(" ESCAPE ");
                    self.push(&quote(esc));
                }
            }
            Node::UnaryArith { op, child } => {
                self.push(op.as_str());
                self.push("(");
                self.node(child);
                self.push(")");
            }
            Node::Arithmetic { op, left, right } => {
                self.node(left);
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                let wrap = matches!(**right, Node::Arithmetic { .. } | Node::Comparison { .. });
                self.parens(wrap, right);
            }
            Node::IsKey { key, inner } => {
                self.node(inner);
                self.push(" ");
                self.push(key.as_str());
            }
            Node::Cast { from, to } => {
                self.push("CAST(");
                self.node(from);
                self.push(" AS ");
                self.push(cast_target_name(*to));
                self.push(")");
            }
            Node::Case(c) => {
                self.push("CASE");
                for limb in &c.limbs {
                    self.push(" WHEN ");
                    self.node(&limb.when);
                    self.push(" THEN ");
                    self.node(&limb.then);
                }
                if let Some(e) = &c.otherwise {
                    self.push(" ELSE ");
                    self.node(e);
                }
                self.push(" END");
            }
            Node::Builtin(b) => match b.func {
                BuiltinOp::MakeList => {
                    self.push("[");
                    self.list(&b.args, |p, a| p.node(a));
                    self.push("]");
                }
                BuiltinOp::MakeStruct if b.args.len() % 2 == 0 => {
                    self.push("{");
                    let pairs: Vec<_> = b.args.chunks(2).collect();
                    self.list(&pairs, |p, kv| {
                        match &kv[0] {
                            Node::String(k) => p.push(&quote(k)),
                            other => p.node(other),
                        }
                        p.push(": ");
                        p.node(&kv[1]);
                    });
                    self.push("}");
                }
                _ => {
                    self.push(b.name());
                    self.push("(");
                    self.list(&b.args, |p, a| p.node(a));
                    self.push(")");
                }
            },
            Node::Member { arg, values } => {
                self.node(arg);
                self.push(" IN (");
                self.list(values, |p, v| p.node(v));
                self.push(")");
            }
            Node::Appended(values) => {
                let wrap = values.len() > 1;
                if wrap {
                    self.push("(");
                }
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(" ++ ");
                    }
                    self.node(v);
                }
                if wrap {
                    self.push(")");
                }
            }
            Node::Aggregate(a) => self.aggregate(a),
            Node::Table(t) => self.binding(&t.binding),
            Node::Join(j) => {
                self.node(&j.left);
                self.push(" ");
                self.push(j.kind.as_str());
                self.push(" ");
                self.binding(&j.right);
                if let Some(on) = &j.on {
                    self.push(" ON ");
                    self.node(on);
                }
            }
            Node::Select(s) => {
                self.push("(");
                self.select(s, None);
                self.push(")");
            }
            Node::Union { kind, left, right } => {
                self.union_operand(left);
                self.push(" ");
                self.push(kind.as_str());
                self.push(" ");
                self.union_operand(right);
            }
        }
    }

    fn string(&mut self, s: &str) {
        match self.redact {
            Some(key) => {
                let mut rng = self.rng(key, b's', &s);
                let masked: String = (0..REDACTED_STRING_LEN)
                    .map(|_| rng.gen_range(b'a'..=b'z') as char)
                    .collect();
                self.push(&quote(&masked));
            }
            None => self.push(&quote(s)),
        }
    }

    fn union_operand(&mut self, n: &Node) {
        match n {
            Node::Select(s) => self.select(s, None),
            other => self.node(other),
        }
    }

    fn binding(&mut self, b: &Binding) {
        self.node(&b.expr);
        if b.explicit() {
            if let Some(name) = b.result() {
                self.push(" AS ");
                self.push(&quote_id(name));
            }
        }
    }

    fn order(&mut self, o: &Order) {
        self.node(&o.column);
        self.push(if o.desc { " DESC" } else { " ASC" });
        self.push(if o.nulls_last {
            " NULLS LAST"
        } else {
            " NULLS FIRST"
        });
    }

    fn aggregate(&mut self, a: &Aggregate) {
        match a.op {
            AggregateOp::CountDistinct => {
                self.push("COUNT(DISTINCT ");
                self.node(&a.inner);
                self.push(")");
            }
            AggregateOp::ApproxCountDistinct => {
                self.push(a.op.as_str());
                self.push("(");
                self.node(&a.inner);
                if a.precision > 0 && a.precision != APPROX_COUNT_DISTINCT_DEFAULT_PRECISION {
                    self.push(&format!(", {}", a.precision));
                }
                self.push(")");
            }
            _ => {
                self.push(a.op.as_str());
                self.push("(");
                self.node(&a.inner);
                self.push(")");
            }
        }
        if let Some(filter) = &a.filter {
            self.push(" FILTER (WHERE ");
            self.node(filter);
            self.push(")");
        }
        if let Some(w) = &a.over {
            self.push(" OVER (");
            if !w.partition_by.is_empty() {
                self.push("PARTITION BY ");
                self.list(&w.partition_by, |p, n| p.node(n));
            }
            if !w.order_by.is_empty() {
                if !w.partition_by.is_empty() {
                    self.push(" ");
                }
                self.push("ORDER BY ");
                self.list(&w.order_by, |p, o| p.order(o));
            }
            self.push(")");
        }
    }

    fn select(&mut self, s: &Select, into: Option<&Node>) {
        self.push("SELECT ");
        if s.distinct {
            self.push("DISTINCT ");
        } else if !s.distinct_on.is_empty() {
            self.push("DISTINCT ON (");
            self.list(&s.distinct_on, |p, n| p.node(n));
            self.push(") ");
        }
        self.list(&s.columns, |p, b| p.binding(b));
        if let Some(into) = into {
            self.push(" INTO ");
            self.node(into);
        }
        if let Some(from) = &s.from {
            self.push(" FROM ");
            self.node(from);
        }
        if let Some(w) = &s.where_ {
            self.push(" WHERE ");
            self.node(w);
        }
        if !s.group_by.is_empty() {
            self.push(" GROUP BY ");
            self.list(&s.group_by, |p, b| p.binding(b));
        }
        if let Some(h) = &s.having {
            self.push(" HAVING ");
            self.node(h);
        }
        if !s.order_by.is_empty() {
            self.push(" ORDER BY ");
            self.list(&s.order_by, |p, o| p.order(o));
        }
        if let Some(limit) = s.limit {
            self.push(&format!(" LIMIT {}", limit));
        }
        if let Some(offset) = s.offset {
            self.push(&format!(" OFFSET {}", offset));
        }
    }

    fn query(&mut self, q: &Query) {
        self.push(q.explain.prefix());
        if !q.with.is_empty() {
            self.push("WITH ");
            self.list(&q.with, |p, cte| {
                p.push(&quote_id(&cte.table));
                p.push(" AS (");
                p.select(&cte.select, None);
                p.push(")");
            });
            self.push(" ");
        }
        match &q.body {
            Node::Select(s) => self.select(s, q.into.as_ref()),
            other => self.node(other),
        }
    }
}

/// The SQL name of a CAST target type.
pub fn cast_target_name(to: TypeSet) -> &'static str {
    match to {
        TypeSet::MISSING => "MISSING",
        TypeSet::NULL => "NULL",
        TypeSet::STRING => "STRING",
        TypeSet::INTEGER => "INTEGER",
        TypeSet::FLOAT => "FLOAT",
        TypeSet::BOOL => "BOOLEAN",
        TypeSet::TIME => "TIMESTAMP",
        TypeSet::STRUCT => "STRUCT",
        TypeSet::LIST => "LIST",
        TypeSet::DECIMAL => "DECIMAL",
        TypeSet::SYMBOL => "SYMBOL",
        _ => "UNKNOWN",
    }
}

/// Quote a string literal with single quotes.
///
/// Control characters use C-style escapes and every non-ASCII
/// character is written as `\uXXXX` (a surrogate pair above the BMP).
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0b' => out.push_str("\\v"),
            '\x0c' => out.push_str("\\f"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\'' => out.push_str("\\'"),
            '/' => out.push_str("\\/"),
            '\\' => out.push_str("\\\\"),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c => {
                let mut buf = [0u16; 2];
                for unit in c.encode_utf16(&mut buf) {
                    out.push_str(&format!("\\u{:04x}", unit));
                }
            }
        }
    }
    out.push('\'');
    out
}

/// Reverse [`quote`]. Raw non-ASCII characters are accepted as-is.
pub fn unquote(s: &str) -> Option<String> {
    let inner = s.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    let mut pending_high: Option<u16> = None;
    while let Some(c) = chars.next() {
        if c != '\\' {
            if pending_high.is_some() || c == '\'' {
                return None;
            }
            out.push(c);
            continue;
        }
        let esc = chars.next()?;
        if esc != 'u' && pending_high.is_some() {
            return None;
        }
        match esc {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'v' => out.push('\x0b'),
            'f' => out.push('\x0c'),
            'a' => out.push('\x07'),
            'b' => out.push('\x08'),
            '\'' | '/' | '\\' | '"' => out.push(esc),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                let unit = u16::from_str_radix(&hex, 16).ok()?;
                match (pending_high.take(), unit) {
                    (None, 0xd800..=0xdbff) => pending_high = Some(unit),
                    (None, _) => out.push(char::from_u32(unit as u32)?),
                    (Some(high), 0xdc00..=0xdfff) => {
                        let c = char::decode_utf16([high, unit]).next()?.ok()?;
                        out.push(c);
                    }
                    (Some(_), _) => return None,
                }
            }
            _ => return None,
        }
    }
    if pending_high.is_some() {
        return None;
    }
    Some(out)
}

/// Render an identifier, double-quoting it when it is a keyword,
/// contains operator characters or contains non-printable characters.
pub fn quote_id(s: &str) -> String {
    let needs_quotes = registry::is_keyword(s)
        || s.contains(|c: char| "%,~+-!<>=(){}[]:".contains(c))
        || s.chars().any(char::is_control);
    if !needs_quotes {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
