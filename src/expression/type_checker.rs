//! Static checking of expressions.
//!
//! Every node kind has a local validation rule. The walk stops
//! descending into a subtree at its first failure but keeps checking
//! siblings, so independent errors are all collected and reported
//! together.

use std::collections::HashSet;

use regex_syntax::ast;

use crate::expression::builtin::{ArgCheck, BuiltinOp};
use crate::expression::error::{CheckError, CheckResult};
use crate::expression::hint::{type_of, Hint, NoHint};
use crate::expression::literal::MAX_YEAR;
use crate::expression::node::{Builtin, Node};
use crate::expression::operator::{ArithOp, CmpOp};
use crate::expression::relation::{Query, Select};
use crate::expression::types::{Kind, TypeSet};

/// Sources accepted by `CAST(... AS STRING)`.
pub const CAST_STRING_SOURCES: TypeSet = TypeSet(TypeSet::STRING.0 | TypeSet::INTEGER.0);

/// Longest regular expression accepted by `~` and `~*`, in characters.
pub const MAX_REGEX_LEN: usize = 1000;

/// Check `node` with no type information for free variables.
pub fn check(node: &Node) -> CheckResult<()> {
    check_hint(node, &NoHint)
}

/// Check `node`, resolving the types of free variables with `hint`.
pub fn check_hint(node: &Node, hint: &dyn Hint) -> CheckResult<()> {
    let mut checker = TypeChecker::new(hint);
    checker.visit(node);
    checker.finish()
}

/// Check every part of a query, including its CTEs.
pub fn check_query(query: &Query, hint: &dyn Hint) -> CheckResult<()> {
    let mut checker = TypeChecker::new(hint);
    let mut seen = HashSet::new();
    for cte in &query.with {
        checker.select(&cte.select);
        if !seen.insert(cte.table.as_str()) {
            checker.errors.push(CheckError::bare_syntax(format!(
                "WITH query name {:?} specified more than once",
                cte.table
            )));
        }
    }
    if let Some(into) = &query.into {
        checker.visit(into);
    }
    checker.visit(&query.body);
    checker.finish()
}

/// Tree walker that collects independent errors.
pub struct TypeChecker<'a> {
    hint: &'a dyn Hint,
    errors: Vec<CheckError>,
}

impl<'a> TypeChecker<'a> {
    /// Create a new checker using `hint` for free variables
    pub fn new(hint: &'a dyn Hint) -> Self {
        Self {
            hint,
            errors: Vec::new(),
        }
    }

    /// The combined result of everything visited so far.
    pub fn finish(self) -> CheckResult<()> {
        match CheckError::combine(self.errors) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn type_of(&self, node: &Node) -> TypeSet {
        type_of(node, self.hint)
    }

    /// Check `node` in value position.
    pub fn visit(&mut self, node: &Node) {
        if let Err(e) = self.check_node(node) {
            self.errors.push(e);
            return;
        }
        match node {
            Node::Appended(_) => {
                self.errors.push(non_table(node));
            }
            Node::Builtin(b) if b.func.is_table() => {
                self.errors.push(non_table(node));
            }
            Node::Table(t) => self.table(&t.binding.expr),
            Node::Join(j) => {
                if let Some(on) = &j.on {
                    self.visit(on);
                }
                self.from(&j.left);
                self.table(&j.right.expr);
            }
            Node::Select(s) => self.select_children(s),
            _ => {
                for child in node.children() {
                    self.visit(child);
                }
            }
        }
    }

    fn select(&mut self, s: &Select) {
        match check_select(s) {
            Ok(()) => self.select_children(s),
            Err(e) => self.errors.push(e),
        }
    }

    fn select_children(&mut self, s: &Select) {
        if let Some(from) = &s.from {
            self.from(from);
        }
        let rest = s
            .where_
            .iter()
            .chain(s.having.iter())
            .chain(s.group_by.iter().map(|b| &b.expr))
            .chain(s.columns.iter().map(|b| &b.expr))
            .chain(s.order_by.iter().map(|o| &o.column))
            .chain(s.distinct_on.iter());
        for child in rest {
            self.visit(child);
        }
    }

    /// A FROM clause holds a table or a join; anything else is
    /// treated as the table expression itself.
    fn from(&mut self, node: &Node) {
        match node {
            Node::Table(_) | Node::Join(_) => self.visit(node),
            other => self.table(other),
        }
    }

    /// Check `node` in table position.
    fn table(&mut self, node: &Node) {
        match node {
            Node::Ident(_) | Node::Dot { .. } | Node::Index { .. } => {}
            Node::Select(_) => self.visit(node),
            Node::Builtin(b) if b.func.is_table() => match self.check_builtin(node, b) {
                Ok(()) => {
                    for arg in &b.args {
                        self.visit(arg);
                    }
                }
                Err(e) => self.errors.push(e),
            },
            Node::Builtin(_) => {
                self.errors.push(CheckError::bare_syntax(format!(
                    "cannot use {} in table position",
                    node
                )));
            }
            Node::Appended(values) => {
                for v in values {
                    self.table(v);
                }
            }
            _ => {
                self.errors.push(CheckError::bare_syntax(format!(
                    "cannot use {} of type {} in table position",
                    node,
                    node.kind().as_str()
                )));
            }
        }
    }

    /// The local rule for a single node.
    fn check_node(&self, node: &Node) -> CheckResult<()> {
        match node {
            Node::Timestamp(t) => {
                if t.year() < 0 || t.year() > MAX_YEAR {
                    return Err(CheckError::bare_syntax(format!(
                        "timestamp {} out of serializeable range",
                        t
                    )));
                }
            }
            Node::Dot { inner, .. } if !inner.is_path() => {
                if !self.type_of(inner).contains(Kind::Struct) {
                    return Err(CheckError::type_error(
                        inner,
                        "cannot use '.' operator on non-struct type",
                    ));
                }
            }
            Node::Index { offset, .. } if *offset < 0 => {
                return Err(CheckError::type_error(node, "illegal index"));
            }
            Node::Not(inner) => {
                if !self.type_of(inner).logical() {
                    return Err(CheckError::type_error(
                        node,
                        "can't compute NOT of non-logical expression",
                    ));
                }
            }
            Node::Logical { left, right, .. } => {
                if !self.type_of(left).logical() {
                    return Err(CheckError::type_error(
                        node,
                        "left-hand-side not a logical expression",
                    ));
                }
                if !self.type_of(right).logical() {
                    return Err(CheckError::type_error(
                        node,
                        "right-hand-side not a logical expression",
                    ));
                }
            }
            Node::Comparison { op, left, right } => {
                let lt = self.type_of(left);
                if matches!(op, CmpOp::Like | CmpOp::Ilike) {
                    if !matches!(**right, Node::String(_)) {
                        return Err(CheckError::syntax(
                            node,
                            format!("{} requires a literal string pattern", op.as_str()),
                        ));
                    }
                    if !lt.any_of(TypeSet::STRING) {
                        return Err(CheckError::type_error(
                            node,
                            "left-hand-side is not a string",
                        ));
                    }
                    return Ok(());
                }
                let rt = self.type_of(right);
                let mut ok = TypeSet::ANY.without(TypeSet::MISSING);
                if op.ordinal() {
                    for types in [TypeSet::NUMERIC, TypeSet::TIME] {
                        if lt.any_of(types) && rt.any_of(types) {
                            return Ok(());
                        }
                    }
                    ok = TypeSet::BOOL | TypeSet::NUMERIC | TypeSet::TIME | TypeSet::STRING;
                }
                if (lt & rt & ok).is_empty() {
                    return Err(CheckError::type_error(
                        node,
                        "lhs and rhs of comparison are never comparable",
                    ));
                }
            }
            Node::StringMatch {
                op,
                pattern,
                escape,
                ..
            } => {
                if let Some(esc) = escape {
                    let mut chars = esc.chars();
                    let c = match (chars.next(), chars.next()) {
                        (Some(c), None) => c,
                        _ => {
                            return Err(CheckError::syntax(
                                node,
                                "ESCAPE must be a single unicode point",
                            ))
                        }
                    };
                    if op.is_like() && (c == '%' || c == '_') {
                        return Err(CheckError::syntax(
                            node,
                            format!(
                                "invalid ESCAPE {:?}; LIKE meta-values '%' and '_' are not accepted as ESCAPE",
                                c
                            ),
                        ));
                    }
                }
                if op.is_regexp() {
                    check_regex(pattern).map_err(|msg| CheckError::syntax(node, msg))?;
                }
            }
            Node::UnaryArith { child, .. } => {
                if !self.type_of(child).any_of(TypeSet::NUMERIC) {
                    return Err(CheckError::type_error(node, "argument is not numeric"));
                }
            }
            Node::Arithmetic { op, left, right } => {
                if *op == ArithOp::Div
                    && right.as_rational().map_or(false, |r| r.is_zero())
                {
                    return Err(CheckError::type_error(node, "division by zero"));
                }
                if !self.type_of(left).any_of(TypeSet::NUMERIC)
                    || !self.type_of(right).any_of(TypeSet::NUMERIC)
                {
                    return Err(CheckError::type_error(node, "arguments are not numeric"));
                }
            }
            Node::Case(c) => {
                for limb in &c.limbs {
                    if !self.type_of(&limb.when).contains(Kind::Bool) {
                        return Err(CheckError::type_error(
                            &limb.when,
                            "not a valid WHEN clause; doesn't evaluate to a boolean",
                        ));
                    }
                }
            }
            Node::Cast { from, to } => self.check_cast(node, from, *to)?,
            Node::Builtin(b) => self.check_builtin(node, b)?,
            Node::Member { values, .. } => {
                if values.iter().any(|v| !v.is_constant()) {
                    return Err(CheckError::syntax(node, "IN list values must be constants"));
                }
            }
            Node::Select(s) => check_select(s)?,
            _ => {}
        }
        Ok(())
    }

    fn check_cast(&self, node: &Node, from: &Node, to: TypeSet) -> CheckResult<()> {
        if to == TypeSet::SYMBOL || to == TypeSet::DECIMAL {
            return Err(CheckError::bare_syntax(format!(
                "unsupported cast {:?}",
                node.to_string()
            )));
        }
        let ft = self.type_of(from);
        let never = if to == TypeSet::STRING {
            !ft.any_of(CAST_STRING_SOURCES)
        } else if to == TypeSet::STRUCT || to == TypeSet::LIST || to == TypeSet::TIME {
            !ft.any_of(to)
        } else {
            false
        };
        if never {
            return Err(CheckError::type_error(
                node,
                "unsupported cast will never succeed",
            ));
        }
        Ok(())
    }

    fn check_builtin(&self, node: &Node, b: &Builtin) -> CheckResult<()> {
        let info = match b.func.info() {
            Some(info) => info,
            None => {
                return Err(CheckError::bare_syntax(format!(
                    "unrecognized builtin {:?}",
                    b.name()
                )))
            }
        };
        match info.check {
            Some(check) => self.check_args(b.func, check, &b.args).map_err(|e| at(e, node)),
            None => Ok(()),
        }
    }

    fn check_args(&self, op: BuiltinOp, check: ArgCheck, args: &[Node]) -> CheckResult<()> {
        let is_string = |n: &Node| self.type_of(n).any_of(TypeSet::STRING);
        let is_number = |n: &Node| self.type_of(n).any_of(TypeSet::NUMERIC);
        match check {
            ArgCheck::Fixed(types) => {
                if types.len() != args.len() {
                    return Err(mismatch(types.len(), args.len()));
                }
                for (arg, ts) in args.iter().zip(types) {
                    if !self.type_of(arg).any_of(*ts) {
                        return Err(CheckError::type_error(
                            arg,
                            format!("not compatible with type {}", ts),
                        ));
                    }
                }
            }
            ArgCheck::Variadic(ts) => {
                if let Some(arg) = args.iter().find(|a| !self.type_of(a).any_of(ts)) {
                    return Err(CheckError::type_error(
                        arg,
                        format!("not compatible with type {}", ts),
                    ));
                }
            }
            ArgCheck::Trim => match args {
                [s] => {
                    if !is_string(s) {
                        return Err(CheckError::type_error(s, "not a string"));
                    }
                }
                [s, cutset] => {
                    if !is_string(s) {
                        return Err(CheckError::type_error(s, "not a string"));
                    }
                    let cutset = cutset.as_str().ok_or_else(|| {
                        CheckError::bare_syntax(format!(
                            "{} requires a constant string argument for cutset",
                            op
                        ))
                    })?;
                    if !cutset.is_ascii() {
                        return Err(CheckError::bare_syntax(
                            "cutset must contain only ASCII chars",
                        ));
                    }
                    if cutset.is_empty() || cutset.len() > 4 {
                        return Err(CheckError::bare_syntax(format!(
                            "the length of cutset has to be from 1 to 4, it is {}",
                            cutset.len()
                        )));
                    }
                }
                _ => {
                    return Err(CheckError::bare_syntax(format!(
                        "{} functions expect 1 or 2 arguments, but found {}",
                        op,
                        args.len()
                    )))
                }
            },
            ArgCheck::Contains => {
                if args.len() != 2 {
                    return Err(mismatch(2, args.len()));
                }
                if !matches!(args[1], Node::String(_)) {
                    return Err(CheckError::bare_syntax(
                        "CONTAINS requires a literal string argument",
                    ));
                }
                if !is_string(&args[0]) {
                    return Err(CheckError::type_error(&args[0], "not a string"));
                }
            }
            ArgCheck::Substring => {
                if args.len() != 2 && args.len() != 3 {
                    return Err(CheckError::bare_syntax(format!(
                        "SUBSTRING expects 2 or 3 arguments, but found {}",
                        args.len()
                    )));
                }
                if !is_string(&args[0]) {
                    return Err(CheckError::type_error(&args[0], "not a string"));
                }
                if let Some(arg) = args[1..].iter().find(|a| !is_number(a)) {
                    return Err(CheckError::type_error(arg, "not a number"));
                }
            }
            ArgCheck::SplitPart => {
                if args.len() != 3 {
                    return Err(CheckError::bare_syntax(format!(
                        "SPLIT_PART expects 3 arguments, but found {}",
                        args.len()
                    )));
                }
                match args[1].as_str() {
                    None => {
                        return Err(CheckError::bare_syntax(
                            "SPLIT_PART argument 1 is not a string",
                        ))
                    }
                    Some(delim) if delim.len() != 1 => {
                        return Err(CheckError::bare_syntax(
                            "SPLIT_PART only accepts single-character delimiters",
                        ))
                    }
                    Some(_) => {}
                }
                if !is_number(&args[2]) {
                    return Err(CheckError::type_error(&args[2], "not a integer"));
                }
            }
            ArgCheck::ObjectSize => {
                if args.len() != 1 {
                    return Err(CheckError::bare_syntax(format!(
                        "SIZE expects one argument, but found {}",
                        args.len()
                    )));
                }
                let arg = &args[0];
                if !(arg.is_path() || matches!(arg, Node::List(_) | Node::Struct(_))) {
                    return Err(CheckError::type_error(
                        arg,
                        format!(
                            "SIZE is undefined for values of type {}",
                            arg.kind().as_str().to_lowercase()
                        ),
                    ));
                }
            }
            ArgCheck::InSubquery => {
                if args.len() != 2 {
                    return Err(mismatch(2, args.len()));
                }
                if !matches!(args[1], Node::Select(_)) {
                    return Err(CheckError::bare_syntax(format!(
                        "second argument to IN_SUBQUERY is {:?}",
                        args[1].to_string()
                    )));
                }
            }
            ArgCheck::HashLookup => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(mismatch(3, args.len()));
                }
                if let Some(arg) = args[1..].iter().find(|a| !a.is_constant()) {
                    return Err(CheckError::bare_syntax(format!(
                        "argument {} to HASH_LOOKUP not a literal",
                        arg
                    )));
                }
            }
            ArgCheck::TablePath => {
                if args.len() != 1 {
                    return Err(mismatch(1, args.len()));
                }
                if !args[0].is_path() {
                    return Err(CheckError::bare_syntax(format!(
                        "argument to {} is {:?}",
                        op,
                        args[0].to_string()
                    )));
                }
            }
        }
        Ok(())
    }
}

fn mismatch(want: usize, got: usize) -> CheckError {
    CheckError::bare_syntax(format!("got {} args; need {}", got, want))
}

fn non_table(node: &Node) -> CheckError {
    CheckError::bare_syntax(format!(
        "cannot use {:?} in non-table position",
        node.to_string()
    ))
}

/// Attach an argument error to the call that received the argument.
fn at(err: CheckError, node: &Node) -> CheckError {
    match err {
        CheckError::Type { reason, .. } => CheckError::type_error(node, reason),
        CheckError::Syntax { message, .. } => CheckError::syntax(node, message),
        other => other,
    }
}

fn check_select(s: &Select) -> CheckResult<()> {
    let star = s.columns.iter().any(|b| matches!(b.expr, Node::Star));
    if star {
        if s.columns.len() > 1 {
            return Err(CheckError::bare_syntax(
                "'*' cannot be mixed with other values",
            ));
        }
        if s.from.is_none() {
            return Err(CheckError::bare_syntax("'*' without FROM is not allowed"));
        }
        if !s.group_by.is_empty() {
            return Err(CheckError::bare_syntax("'*' with GROUP BY is not allowed"));
        }
        if s.has_distinct() {
            return Err(CheckError::bare_syntax("'*' with DISTINCT is not allowed"));
        }
    }
    if s.limit.is_none() && s.offset.is_some() {
        return Err(CheckError::bare_syntax(
            "OFFSET without LIMIT is not supported",
        ));
    }
    if let Some(limit) = s.limit.filter(|l| *l < 0) {
        return Err(CheckError::bare_syntax(format!(
            "negative LIMIT {} is not supported",
            limit
        )));
    }
    if let Some(offset) = s.offset.filter(|o| *o < 0) {
        return Err(CheckError::bare_syntax(format!(
            "negative OFFSET {} is not supported",
            offset
        )));
    }
    Ok(())
}

/// Validate a regular expression used by `~` or `~*`.
pub fn check_regex(pattern: &str) -> Result<(), String> {
    if pattern.chars().count() > MAX_REGEX_LEN {
        return Err(format!(
            "regular expression is longer than {} characters",
            MAX_REGEX_LEN
        ));
    }
    // octal disabled so \1-\9 parse as (unsupported) backreferences
    let parsed = ast::parse::ParserBuilder::new()
        .octal(false)
        .build()
        .parse(pattern);
    match parsed {
        Ok(_) => Ok(()),
        Err(e) => Err(match e.kind() {
            ast::ErrorKind::UnsupportedBackreference => {
                "backreferences are not supported".to_string()
            }
            ast::ErrorKind::UnsupportedLookAround => "look-around is not supported".to_string(),
            kind => format!("invalid regular expression: {}", kind),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::hint::HintFn;
    use crate::expression::literal::Timestamp;
    use crate::expression::operator::{IsKeyword, StringMatchOp};
    use crate::expression::relation::{Binding, CteBinding};

    fn type_err(node: &Node) -> CheckError {
        let err = check(node).unwrap_err();
        assert!(err.is_type_error(), "{} should be a type error: {}", node, err);
        err
    }

    fn syntax_err(node: &Node) -> CheckError {
        let err = check(node).unwrap_err();
        assert!(!err.is_type_error(), "{} should be a syntax error: {}", node, err);
        err
    }

    #[test]
    fn test_logic_and_arithmetic() {
        type_err(&Node::not(Node::Integer(3)));
        type_err(&Node::and(Node::Bool(true), Node::string("xyz")));
        type_err(&Node::add(Node::path("x", &["y"]), Node::Bool(false)));
        let err = type_err(&Node::div(Node::path("x", &["y"]), Node::Integer(0)));
        assert!(err.to_string().ends_with("division by zero"));
        type_err(&Node::div(Node::ident("x"), Node::Float(0.0)));
        assert!(check(&Node::div(Node::ident("x"), Node::Integer(2))).is_ok());
        type_err(&Node::neg(Node::string("a")));
    }

    #[test]
    fn test_comparisons() {
        syntax_err(&Node::compare(CmpOp::Like, Node::ident("x"), Node::Bool(true)));
        type_err(&Node::compare(CmpOp::Like, Node::Integer(1), Node::string("a%")));
        assert!(check(&Node::compare(CmpOp::Like, Node::ident("x"), Node::string("a%"))).is_ok());

        type_err(&Node::compare(CmpOp::Lt, Node::Integer(1), Node::string("a")));
        assert!(check(&Node::compare(CmpOp::Lt, Node::string("a"), Node::string("b"))).is_ok());
        assert!(check(&Node::compare(CmpOp::Le, Node::Integer(1), Node::Float(2.0))).is_ok());
        type_err(&Node::compare(CmpOp::Eq, Node::Integer(1), Node::string("a")));
        type_err(&Node::compare(CmpOp::Eq, Node::Missing, Node::Missing));

        let upper = Node::call(BuiltinOp::CharLength, vec![Node::ident("x")]);
        type_err(&Node::compare(CmpOp::Eq, upper, Node::string("y")));
    }

    #[test]
    fn test_string_match() {
        let mut m = Node::like(Node::ident("s"), "a%");
        if let Node::StringMatch { escape, .. } = &mut m {
            *escape = Some("ab".to_string());
        }
        let err = syntax_err(&m);
        assert!(err.to_string().contains("single unicode point"));

        if let Node::StringMatch { escape, .. } = &mut m {
            *escape = Some("%".to_string());
        }
        syntax_err(&m);

        if let Node::StringMatch { escape, .. } = &mut m {
            *escape = Some("ż".to_string());
        }
        assert!(check(&m).is_ok());

        let re = Node::string_match(StringMatchOp::RegexpMatch, Node::ident("s"), "a(b|c)*");
        assert!(check(&re).is_ok());
        let re = Node::string_match(StringMatchOp::RegexpMatch, Node::ident("s"), "(a");
        syntax_err(&re);
        let re = Node::string_match(StringMatchOp::RegexpMatchCi, Node::ident("s"), "(a)\\1");
        let err = syntax_err(&re);
        assert!(err.to_string().contains("backreferences"));
        let long = "a".repeat(MAX_REGEX_LEN + 1);
        assert!(check_regex(&long).is_err());
    }

    #[test]
    fn test_case_and_cast() {
        let case = Node::case(vec![(Node::Integer(3), Node::ident("x"))], Some(Node::ident("y")));
        type_err(&case);

        for ts in [TypeSet::INTEGER, TypeSet::STRING, TypeSet::LIST, TypeSet::ANY] {
            let h = HintFn(move |_: &Node| ts);
            let err = check_hint(&Node::cast(Node::ident("x"), TypeSet::SYMBOL), &h).unwrap_err();
            assert!(!err.is_type_error());
        }
        syntax_err(&Node::cast(Node::ident("x"), TypeSet::DECIMAL));

        let h = HintFn(|_: &Node| TypeSet::FLOAT);
        let err = check_hint(&Node::cast(Node::ident("x"), TypeSet::STRING), &h).unwrap_err();
        assert!(err.to_string().contains("never succeed"));
        assert!(check_hint(&Node::cast(Node::ident("x"), TypeSet::INTEGER), &h).is_ok());
        assert!(check_hint(&Node::cast(Node::ident("x"), TypeSet::LIST), &h).is_err());
        assert!(check(&Node::cast(Node::ident("x"), TypeSet::STRING)).is_ok());
    }

    #[test]
    fn test_builtin_arguments() {
        syntax_err(&Node::call(BuiltinOp::Contains, vec![Node::ident("x")]));
        type_err(&Node::call(
            BuiltinOp::Contains,
            vec![Node::Integer(3), Node::string("xyz")],
        ));

        let cases = [
            (
                Node::call(BuiltinOp::ObjectSize, vec![Node::string("foo"), Node::Integer(5)]),
                "SIZE expects one argument, but found 2",
            ),
            (
                Node::call(BuiltinOp::ObjectSize, vec![]),
                "SIZE expects one argument, but found 0",
            ),
            (
                Node::call(BuiltinOp::ObjectSize, vec![Node::Null]),
                "SIZE is undefined for values of type null",
            ),
            (
                Node::call(BuiltinOp::ObjectSize, vec![Node::string("foo")]),
                "SIZE is undefined for values of type string",
            ),
            (
                Node::call(BuiltinOp::Trim, vec![Node::ident("s"), Node::string("abcde")]),
                "the length of cutset has to be from 1 to 4, it is 5",
            ),
            (
                Node::call(BuiltinOp::Ltrim, vec![Node::ident("s"), Node::ident("c")]),
                "LTRIM requires a constant string argument for cutset",
            ),
            (
                Node::call(BuiltinOp::Rtrim, vec![]),
                "RTRIM functions expect 1 or 2 arguments, but found 0",
            ),
            (
                Node::call(
                    BuiltinOp::SplitPart,
                    vec![Node::ident("s"), Node::string("ab"), Node::Integer(1)],
                ),
                "SPLIT_PART only accepts single-character delimiters",
            ),
            (
                Node::call(BuiltinOp::Substring, vec![Node::ident("s")]),
                "SUBSTRING expects 2 or 3 arguments, but found 1",
            ),
            (
                Node::call(BuiltinOp::Upper, vec![Node::ident("a"), Node::ident("b")]),
                "got 2 args; need 1",
            ),
            (
                Node::call_by_name("frobnicate", vec![]),
                "unrecognized builtin \"frobnicate\"",
            ),
            (
                Node::call(
                    BuiltinOp::HashLookup,
                    vec![Node::ident("x"), Node::Integer(1), Node::ident("y")],
                ),
                "to HASH_LOOKUP not a literal",
            ),
        ];
        for (node, msg) in cases {
            let err = check(&node).unwrap_err();
            assert!(
                err.to_string().contains(msg),
                "{}: {:?} does not contain {:?}",
                node,
                err.to_string(),
                msg
            );
        }
        assert!(check(&Node::call(BuiltinOp::ObjectSize, vec![Node::ident("x")])).is_ok());
        let trim = Node::call(BuiltinOp::Trim, vec![Node::ident("s"), Node::string("ab")]);
        assert!(check(&trim).is_ok());
    }

    #[test]
    fn test_argument_errors_point_at_call() {
        let call = Node::call(BuiltinOp::Upper, vec![Node::Integer(1)]);
        let err = check(&call).unwrap_err();
        assert_eq!(
            err,
            CheckError::Type {
                text: call.to_string(),
                reason: "not compatible with type string".to_string(),
            }
        );
    }

    #[test]
    fn test_paths_and_literals() {
        type_err(&Node::index(Node::ident("z"), -1));
        let dot = Node::dot(Node::Integer(1), "x");
        type_err(&dot);
        let ts = Timestamp::from_parts(2020, 1, 1, 0, 0, 0, 0).unwrap();
        assert!(check(&Node::Timestamp(ts)).is_ok());
        let ts = Timestamp::from_parts(MAX_YEAR + 1, 1, 1, 0, 0, 0, 0).unwrap();
        let err = check(&Node::Timestamp(ts)).unwrap_err();
        assert!(err.to_string().contains("out of serializeable range"));
    }

    #[test]
    fn test_table_position() {
        let upper = Node::call(BuiltinOp::Upper, vec![Node::string("foo")]);
        let s = Select::new(vec![Binding::new(Node::ident("x"))], Some(Node::table(upper)));
        let err = check(&Node::from(s)).unwrap_err();
        assert!(err.to_string().contains("in table position"), "{}", err);

        let glob = Node::call(BuiltinOp::TableGlob, vec![Node::ident("db")]);
        let s = Select::new(vec![Binding::new(glob.clone())], None);
        let err = check(&Node::from(s)).unwrap_err();
        assert!(err.to_string().contains("non-table position"), "{}", err);

        let s = Select::new(vec![Binding::new(Node::Star)], Some(Node::table(glob)));
        assert!(check(&Node::from(s)).is_ok());

        let bad_glob = Node::call(BuiltinOp::TableGlob, vec![Node::string("db")]);
        let s = Select::new(vec![Binding::new(Node::Star)], Some(Node::table(bad_glob)));
        let err = check(&Node::from(s)).unwrap_err();
        assert!(err.to_string().contains("argument to TABLE_GLOB"), "{}", err);

        let appended = Node::append(Node::ident("a"), Node::ident("b"));
        let s = Select::new(vec![Binding::new(Node::Star)], Some(Node::table(appended.clone())));
        assert!(check(&Node::from(s)).is_ok());
        syntax_err(&appended);
    }

    #[test]
    fn test_select_shape() {
        let mut s = Select::new(
            vec![Binding::new(Node::Star), Binding::new(Node::ident("x"))],
            Some(Node::table(Node::ident("t"))),
        );
        let err = check(&Node::from(s.clone())).unwrap_err();
        assert_eq!(err.to_string(), "'*' cannot be mixed with other values");

        s.columns.truncate(1);
        s.distinct = true;
        assert!(check(&Node::from(s.clone())).is_err());
        s.distinct = false;
        s.offset = Some(3);
        let err = check(&Node::from(s.clone())).unwrap_err();
        assert_eq!(err.to_string(), "OFFSET without LIMIT is not supported");
        s.limit = Some(-1);
        let err = check(&Node::from(s.clone())).unwrap_err();
        assert_eq!(err.to_string(), "negative LIMIT -1 is not supported");
        s.limit = Some(10);
        assert!(check(&Node::from(s.clone())).is_ok());
        s.from = None;
        assert!(check(&Node::from(s)).is_err());
    }

    #[test]
    fn test_errors_are_collected() {
        let node = Node::and(
            Node::is(Node::not(Node::Integer(1)), IsKeyword::IsTrue),
            Node::is(Node::neg(Node::string("a")), IsKeyword::IsTrue),
        );
        let err = check(&node).unwrap_err();
        assert!(matches!(err, CheckError::Combined { others: 1, .. }));
        assert!(err.to_string().contains("and 1 other errors"));
    }

    #[test]
    fn test_check_query() {
        let cte = |name: &str| CteBinding {
            table: name.to_string(),
            select: Select::new(
                vec![Binding::new(Node::ident("a"))],
                Some(Node::table(Node::ident("t"))),
            ),
        };
        let mut q = Query::new(Node::from(Select::new(
            vec![Binding::new(Node::ident("a"))],
            Some(Node::table(Node::ident("c"))),
        )));
        q.with = vec![cte("c"), cte("d")];
        assert!(check_query(&q, &NoHint).is_ok());
        q.with.push(cte("c"));
        let err = check_query(&q, &NoHint).unwrap_err();
        assert_eq!(
            err.to_string(),
            "WITH query name \"c\" specified more than once"
        );
    }
}
