//! Fixpoint simplification of expression trees.
//!
//! Trees are rewritten bottom-up with the ordered table in [`rules`].
//! After a rule fires, the children of its output are simplified again
//! and the rule table is retried at the same position until nothing
//! applies. Whole-tree passes repeat until a pass fires no rule.

pub mod fold;
pub mod math;
pub mod pattern;
pub mod rules;

use std::mem;

use log::{debug, trace, warn};

use crate::expression::hint::Hint;
use crate::expression::node::Node;
use crate::expression::operator::{IsKeyword, LogicalOp};
use crate::expression::registry::{self, Config};
use crate::expression::relation::Query;
use crate::expression::text::redacted;

use self::pattern::Ctx;

/// Simplify `node` to a fixpoint.
pub fn simplify(node: Node, hint: &dyn Hint) -> Node {
    Simplifier::new(hint).run(node, false)
}

/// Simplify `node` where only its truthiness matters, as in a WHERE
/// clause: results that are never TRUE may become FALSE.
pub fn simplify_logic(node: Node, hint: &dyn Hint) -> Node {
    Simplifier::new(hint).run(node, true)
}

/// Simplify every CTE and the body of `query`.
pub fn simplify_query(mut query: Query, hint: &dyn Hint) -> Query {
    let mut s = Simplifier::new(hint);
    for cte in &mut query.with {
        let select = Node::from(cte.select.clone());
        // SELECT rules only ever produce another SELECT
        if let Node::Select(out) = s.run(select, false) {
            cte.select = *out;
        }
    }
    query.body = s.run(mem::take(&mut query.body), false);
    query
}

struct Simplifier<'h> {
    hint: &'h dyn Hint,
    config: Config,
    /// Rules fired during the current pass
    fired: usize,
}

impl<'h> Simplifier<'h> {
    fn new(hint: &'h dyn Hint) -> Self {
        Self {
            hint,
            config: registry::config(),
            fired: 0,
        }
    }

    fn run(&mut self, node: Node, logic: bool) -> Node {
        let mut node = node;
        for pass in 0..self.config.max_passes {
            self.fired = 0;
            node = self.visit(node, logic);
            trace!("simplify pass {}: {} rewrites", pass, self.fired);
            if self.fired == 0 {
                return node;
            }
        }
        warn!(
            "simplification did not settle after {} passes: {}",
            self.config.max_passes,
            redacted(&node)
        );
        node
    }

    fn visit(&mut self, node: Node, logic: bool) -> Node {
        let mut node = node;
        self.visit_children(&mut node, logic);
        self.settle(node, logic)
    }

    fn visit_children(&mut self, node: &mut Node, logic: bool) {
        let contexts = child_contexts(node, logic);
        for (child, logic) in node.children_mut().into_iter().zip(contexts) {
            let taken = mem::take(child);
            *child = self.visit(taken, logic);
        }
    }

    /// Apply rules at this position until none fires.
    fn settle(&mut self, node: Node, logic: bool) -> Node {
        let mut node = node;
        for _ in 0..self.config.max_rule_applications {
            let ctx = Ctx {
                hint: self.hint,
                logic,
            };
            let Some((rule, out)) = rules::apply(&node, &ctx) else {
                return node;
            };
            debug!("{}: {} => {}", rule.name, redacted(&node), redacted(&out));
            self.fired += 1;
            node = out;
            self.visit_children(&mut node, logic);
        }
        warn!(
            "rewrite budget of {} exhausted at {}",
            self.config.max_rule_applications,
            redacted(&node)
        );
        node
    }
}

/// Whether each child, in [`Node::children_mut`] order, is in a
/// position where only its truthiness matters.
fn child_contexts(node: &Node, logic: bool) -> Vec<bool> {
    let leading = match node {
        Node::Logical {
            op: LogicalOp::And | LogicalOp::Or,
            ..
        } => vec![logic, logic],
        Node::IsKey {
            key: IsKeyword::IsTrue,
            ..
        } => vec![true],
        Node::Case(c) => {
            let mut out: Vec<bool> = c.limbs.iter().flat_map(|_| [true, logic]).collect();
            out.extend(c.otherwise.as_ref().map(|_| logic));
            out
        }
        Node::Aggregate(a) => {
            let window = a
                .over
                .as_ref()
                .map_or(0, |w| w.partition_by.len() + w.order_by.len());
            let mut out = vec![false; 1 + window];
            out.extend(a.filter.as_ref().map(|_| true));
            out
        }
        Node::Join(j) => j.on.iter().map(|_| true).collect(),
        Node::Select(s) => {
            let mut out: Vec<bool> = s.from.iter().map(|_| false).collect();
            out.extend(s.where_.iter().map(|_| true));
            out.extend(s.having.iter().map(|_| true));
            out
        }
        _ => Vec::new(),
    };
    let len = node.children().len();
    leading
        .into_iter()
        .chain(std::iter::repeat(false))
        .take(len)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::builtin::BuiltinOp;
    use crate::expression::hint::{FiniteSet, NoHint, PathHint};
    use crate::expression::operator::{AggregateOp, CmpOp, JoinKind};
    use crate::expression::relation::{Aggregate, Binding, CteBinding, Join, Order, Select, Table};
    use crate::expression::types::TypeSet;

    fn x() -> Node {
        Node::ident("x")
    }

    fn typed(ts: TypeSet) -> PathHint {
        PathHint::new().with_type(x(), ts)
    }

    fn ints(vals: &[i64]) -> FiniteSet {
        FiniteSet::new(vals.iter().map(|v| Node::Integer(*v)).collect()).unwrap()
    }

    #[test]
    fn test_arithmetic_folding() {
        let n = Node::add(Node::Integer(1), Node::mul(Node::Integer(2), Node::Integer(3)));
        assert_eq!(simplify(n, &NoHint), Node::Integer(7));

        let n = Node::div(Node::Integer(1), Node::Integer(3));
        assert_eq!(simplify(n, &NoHint), Node::rational(1, 3).unwrap());

        let n = Node::div(Node::Integer(1), Node::Integer(0));
        assert_eq!(simplify(n, &NoHint), Node::Missing);

        let n = Node::add(Node::string("a"), Node::Integer(1));
        assert_eq!(simplify(n, &NoHint), Node::Missing);

        // exact: 20/7 < 3
        let n = Node::compare(
            CmpOp::Lt,
            Node::div(Node::Integer(1000), Node::Integer(350)),
            Node::Float(3.0),
        );
        assert_eq!(simplify(n, &NoHint), Node::Bool(true));

        let n = Node::compare(CmpOp::Lt, Node::Float(0.25), Node::Float(0.5));
        assert_eq!(simplify(n, &NoHint), Node::Bool(true));
    }

    #[test]
    fn test_constant_chains() {
        // (x + 1) + 2 => x + 3
        let n = Node::add(Node::add(x(), Node::Integer(1)), Node::Integer(2));
        assert_eq!(simplify(n, &NoHint), Node::add(x(), Node::Integer(3)));

        // 1 + x => x + 1
        let n = Node::add(Node::Integer(1), x());
        assert_eq!(simplify(n, &NoHint), Node::add(x(), Node::Integer(1)));

        // 2 * (x * 3) => x * 6
        let n = Node::mul(Node::Integer(2), Node::mul(x(), Node::Integer(3)));
        assert_eq!(simplify(n, &NoHint), Node::mul(x(), Node::Integer(6)));
    }

    #[test]
    fn test_add_zero_needs_numeric_type() {
        let n = Node::add(x(), Node::Integer(0));
        assert_eq!(simplify(n.clone(), &NoHint), n);
        assert_eq!(simplify(n, &typed(TypeSet::INTEGER)), x());
    }

    #[test]
    fn test_not_inversion() {
        let n = Node::not(Node::compare(CmpOp::Lt, x(), Node::Integer(3)));
        assert_eq!(
            simplify(n, &NoHint),
            Node::compare(CmpOp::Ge, x(), Node::Integer(3))
        );

        let n = Node::not(Node::is(x(), IsKeyword::IsNull));
        assert_eq!(simplify(n, &NoHint), Node::is(x(), IsKeyword::IsNotNull));

        let n = Node::not(Node::not(x()));
        assert_eq!(simplify(n.clone(), &NoHint), n);
        assert_eq!(simplify(n, &typed(TypeSet::BOOL)), x());
    }

    #[test]
    fn test_logical_identities() {
        let eq = Node::compare(CmpOp::Eq, x(), Node::Integer(1));
        let n = Node::or(eq.clone(), Node::Bool(false));
        assert_eq!(simplify(n, &NoHint), eq);

        let n = Node::and(Node::Bool(false), x());
        assert_eq!(simplify(n, &NoHint), Node::Bool(false));

        // x may not be a boolean, so TRUE AND x is not x
        let n = Node::and(x(), Node::Bool(true));
        assert_eq!(simplify(n.clone(), &NoHint), Node::and(Node::Bool(true), x()));
        assert_eq!(simplify_logic(n, &NoHint), x());
    }

    #[test]
    fn test_left_associative() {
        let (a, b, c) = (Node::ident("a"), Node::ident("b"), Node::ident("c"));
        let n = Node::and(a.clone(), Node::and(b.clone(), c.clone()));
        assert_eq!(simplify(n, &NoHint), Node::and(Node::and(a, b), c));
    }

    #[test]
    fn test_self_comparison() {
        let n = Node::compare(CmpOp::Eq, x(), x());
        assert_eq!(simplify(n.clone(), &typed(TypeSet::INTEGER)), Node::Bool(true));

        let expected = Node::case(
            vec![(Node::is(x(), IsKeyword::IsNotNull), Node::Bool(true))],
            Some(Node::Missing),
        );
        assert_eq!(simplify(n, &NoHint), expected);
    }

    #[test]
    fn test_comparison_with_absent() {
        let n = Node::compare(CmpOp::Eq, x(), Node::Null);
        assert_eq!(simplify(n.clone(), &NoHint), Node::Missing);
        assert_eq!(simplify_logic(n, &NoHint), Node::Bool(false));
    }

    #[test]
    fn test_constant_moves_right() {
        let n = Node::compare(CmpOp::Lt, Node::Integer(3), x());
        assert_eq!(
            simplify(n, &NoHint),
            Node::compare(CmpOp::Gt, x(), Node::Integer(3))
        );
    }

    #[test]
    fn test_is_keywords() {
        let n = Node::is(x(), IsKeyword::IsNotNull);
        assert_eq!(simplify(n.clone(), &NoHint), n);
        assert_eq!(simplify(n, &typed(TypeSet::INTEGER)), Node::Bool(true));

        let n = Node::is(Node::Null, IsKeyword::IsNull);
        assert_eq!(simplify(n, &NoHint), Node::Bool(true));

        let n = Node::is(Node::Bool(false), IsKeyword::IsNotTrue);
        assert_eq!(simplify(n, &NoHint), Node::Bool(true));

        let n = Node::is(x(), IsKeyword::IsTrue);
        assert_eq!(simplify_logic(n, &NoHint), x());
    }

    #[test]
    fn test_in_list() {
        let n = Node::member(x(), vec![Node::Integer(1)]);
        assert_eq!(
            simplify(n, &NoHint),
            Node::compare(CmpOp::Eq, x(), Node::Integer(1))
        );

        let n = Node::member(x(), vec![Node::Integer(2), Node::Integer(1)]);
        assert_eq!(
            simplify(n, &NoHint),
            Node::or(
                Node::compare(CmpOp::Eq, x(), Node::Integer(1)),
                Node::compare(CmpOp::Eq, x(), Node::Integer(2)),
            )
        );

        let n = Node::member(
            x(),
            vec![Node::Integer(3), Node::Integer(1), Node::Integer(2)],
        );
        assert_eq!(
            simplify(n, &NoHint),
            Node::or(
                Node::or(
                    Node::compare(CmpOp::Eq, x(), Node::Integer(1)),
                    Node::compare(CmpOp::Eq, x(), Node::Integer(2)),
                ),
                Node::compare(CmpOp::Eq, x(), Node::Integer(3)),
            )
        );

        let n = Node::member(Node::Integer(2), vec![Node::Integer(1), Node::Float(2.0)]);
        assert_eq!(simplify(n, &NoHint), Node::Bool(true));
    }

    #[test]
    fn test_in_list_prunes_types() {
        let n = Node::member(x(), vec![Node::Integer(1), Node::string("a"), Node::string("b")]);
        let expected = Node::or(
            Node::compare(CmpOp::Eq, x(), Node::string("a")),
            Node::compare(CmpOp::Eq, x(), Node::string("b")),
        );
        assert_eq!(simplify(n, &typed(TypeSet::STRING)), expected);
    }

    #[test]
    fn test_in_list_with_finite_set() {
        let list = vec![Node::Integer(1), Node::Integer(2), Node::Integer(3)];
        let n = Node::member(x(), list.clone());

        let hint = PathHint::new().with_values(x(), ints(&[4, 5, 6]));
        assert_eq!(simplify(n.clone(), &hint), Node::Bool(false));

        let hint = PathHint::new().with_values(x(), ints(&[1, 5, 6]));
        assert_eq!(
            simplify(n, &hint),
            Node::compare(CmpOp::Eq, x(), Node::Integer(1))
        );

        let hint = PathHint::new().with_values(x(), ints(&[1, 3]));
        assert_eq!(simplify(Node::member(x(), list), &hint), Node::Bool(true));
    }

    #[test]
    fn test_comparison_with_finite_set() {
        let hint = PathHint::new().with_values(x(), ints(&[4, 5, 6]));
        let n = Node::compare(CmpOp::Gt, x(), Node::Integer(3));
        assert_eq!(simplify(n, &hint), Node::Bool(true));
        let n = Node::compare(CmpOp::Gt, x(), Node::Integer(5));
        assert_eq!(simplify(n.clone(), &hint), n);
    }

    #[test]
    fn test_case_to_hash_lookup() {
        let n = Node::case(
            vec![
                (Node::compare(CmpOp::Eq, x(), Node::Integer(1)), Node::string("a")),
                (Node::compare(CmpOp::Eq, x(), Node::Integer(2)), Node::string("b")),
            ],
            None,
        );
        let expected = Node::call(
            BuiltinOp::HashLookup,
            vec![
                x(),
                Node::Integer(1),
                Node::string("a"),
                Node::Integer(2),
                Node::string("b"),
                Node::Null,
            ],
        );
        assert_eq!(simplify(n, &NoHint), expected);
    }

    #[test]
    fn test_case_limbs() {
        let y = Node::ident("y");
        let n = Node::case(
            vec![
                (Node::Bool(false), Node::Integer(1)),
                (y.clone(), Node::Integer(2)),
                (Node::Bool(true), Node::Integer(3)),
                (Node::ident("z"), Node::Integer(4)),
            ],
            Some(Node::Integer(5)),
        );
        let expected = Node::case(vec![(y.clone(), Node::Integer(2))], Some(Node::Integer(3)));
        assert_eq!(simplify(n, &NoHint), expected);

        let n = Node::case(vec![(y, Node::Integer(2))], Some(Node::Integer(2)));
        assert_eq!(simplify(n, &NoHint), Node::Integer(2));
    }

    #[test]
    fn test_coalesce_comparison() {
        // COALESCE(x, 'a') = 3 needs x to be the number
        let n = Node::compare(
            CmpOp::Eq,
            Node::coalesce(vec![x(), Node::string("a")]),
            Node::Integer(3),
        );
        assert_eq!(
            simplify(n, &NoHint),
            Node::compare(CmpOp::Eq, x(), Node::Integer(3))
        );
    }

    #[test]
    fn test_like_rewrites() {
        let n = Node::like(x(), "%abc%");
        assert_eq!(
            simplify(n, &NoHint),
            Node::call(BuiltinOp::Contains, vec![x(), Node::string("abc")])
        );

        let n = Node::like(x(), "abc");
        assert_eq!(simplify(n.clone(), &NoHint), n);
        assert_eq!(
            simplify(n, &typed(TypeSet::STRING)),
            Node::compare(CmpOp::Eq, x(), Node::string("abc"))
        );

        let n = Node::like(Node::string("xabcx"), "%b_d%");
        assert_eq!(simplify(n, &NoHint), Node::Bool(false));
    }

    #[test]
    fn test_case_folded_comparisons() {
        let upper = Node::call(BuiltinOp::Upper, vec![x()]);
        let n = Node::compare(CmpOp::Eq, upper.clone(), Node::string("ABC"));
        assert_eq!(
            simplify(n, &NoHint),
            Node::call(BuiltinOp::EqualsCi, vec![x(), Node::string("ABC")])
        );

        let n = Node::compare(CmpOp::Eq, upper.clone(), Node::string("abc"));
        assert_eq!(simplify_logic(n.clone(), &NoHint), Node::Bool(false));
        assert_eq!(simplify(n, &typed(TypeSet::STRING)), Node::Bool(false));

        let n = Node::like(Node::call(BuiltinOp::Lower, vec![x()]), "%abc%");
        assert_eq!(
            simplify(n, &NoHint),
            Node::call(BuiltinOp::ContainsCi, vec![x(), Node::string("abc")])
        );
    }

    #[test]
    fn test_string_folding() {
        let n = Node::call(
            BuiltinOp::Concat,
            vec![Node::string("ab"), Node::call(BuiltinOp::Upper, vec![Node::string("cd")])],
        );
        assert_eq!(simplify(n, &NoHint), Node::string("abCD"));

        let n = Node::call(BuiltinOp::CharLength, vec![Node::string("héllo")]);
        assert_eq!(simplify(n, &NoHint), Node::Integer(5));

        let n = Node::call(
            BuiltinOp::Concat,
            vec![
                Node::call(BuiltinOp::Lower, vec![x()]),
                Node::call(BuiltinOp::Lower, vec![Node::ident("y")]),
            ],
        );
        let expected = Node::call(
            BuiltinOp::Lower,
            vec![Node::call(BuiltinOp::Concat, vec![x(), Node::ident("y")])],
        );
        assert_eq!(simplify(n, &NoHint), expected);
    }

    #[test]
    fn test_numeric_builtins() {
        let n = Node::call(BuiltinOp::Abs, vec![Node::Integer(-4)]);
        assert_eq!(simplify(n, &NoHint), Node::Integer(4));

        let n = Node::call(BuiltinOp::Floor, vec![Node::Float(2.5)]);
        assert_eq!(simplify(n, &NoHint), Node::Float(2.0));

        let n = Node::call(BuiltinOp::Sqrt, vec![Node::Missing]);
        assert_eq!(simplify(n, &NoHint), Node::Missing);
    }

    #[test]
    fn test_cast() {
        let n = Node::cast(Node::Integer(1), TypeSet::FLOAT);
        assert!(matches!(simplify(n, &NoHint), Node::Float(f) if f == 1.0));

        let n = Node::cast(x(), TypeSet::STRING);
        assert_eq!(simplify(n, &typed(TypeSet::STRING)), x());
        let n = Node::cast(x(), TypeSet::INTEGER);
        assert_eq!(simplify(n, &typed(TypeSet::STRUCT)), Node::Missing);
    }

    #[test]
    fn test_paths_into_literals() {
        let n = Node::dot(
            Node::call(
                BuiltinOp::MakeStruct,
                vec![Node::string("a"), x(), Node::string("b"), Node::Integer(2)],
            ),
            "a",
        );
        assert_eq!(simplify(n, &NoHint), x());

        let n = Node::index(
            Node::call(BuiltinOp::MakeList, vec![x(), Node::Integer(2)]),
            5,
        );
        assert_eq!(simplify(n, &NoHint), Node::Missing);
    }

    #[test]
    fn test_aggregates() {
        let n = Aggregate::node(AggregateOp::Sum, x());
        assert_eq!(
            simplify(n, &typed(TypeSet::INTEGER)),
            Aggregate::node(AggregateOp::SumInt, x())
        );

        let mut agg = Aggregate::new(AggregateOp::Count, Node::Star);
        agg.filter = Some(Node::compare(CmpOp::Eq, x(), Node::Null));
        assert_eq!(
            simplify(Node::Aggregate(Box::new(agg)), &NoHint),
            Node::Integer(0)
        );

        let mut agg = Aggregate::new(AggregateOp::Count, Node::Star);
        agg.filter = Some(Node::is(x(), IsKeyword::IsNotMissing));
        assert_eq!(
            simplify(Node::Aggregate(Box::new(agg)), &NoHint),
            Aggregate::node(AggregateOp::Count, x())
        );
    }

    fn table(name: &str) -> Node {
        Node::Table(Box::new(Table::new(Binding::new(Node::ident(name)))))
    }

    #[test]
    fn test_join_on_true() {
        let join = Join {
            kind: JoinKind::Inner,
            on: Some(Node::compare(CmpOp::Eq, Node::Integer(1), Node::Integer(1))),
            left: table("a"),
            right: Binding::new(Node::ident("b")),
        };
        let out = simplify(Node::Join(Box::new(join)), &NoHint);
        let Node::Join(j) = out else {
            panic!("expected a join");
        };
        assert_eq!(j.kind, JoinKind::Cross);
        assert!(j.on.is_none());
    }

    #[test]
    fn test_select_rules() {
        let mut s = Select::new(vec![Binding::new(x())], Some(table("t")));
        s.where_ = Some(Node::and(Node::Bool(true), Node::is(x(), IsKeyword::IsTrue)));
        s.having = Some(Node::Bool(true));
        s.order_by = vec![Order::new(Node::Integer(1)), Order::new(x())];
        s.group_by = vec![Binding::new(Node::string("k")), Binding::new(x())];
        s.distinct_on = vec![Node::Integer(3)];

        let Node::Select(out) = simplify(Node::from(s), &NoHint) else {
            panic!("expected a select");
        };
        assert_eq!(out.where_, Some(x()));
        assert!(out.having.is_none());
        assert_eq!(out.order_by.len(), 1);
        assert_eq!(out.order_by[0].column, x());
        assert_eq!(out.group_by.len(), 1);
        assert!(out.distinct_on.is_empty());
        assert_eq!(out.limit, Some(1));
    }

    #[test]
    fn test_simplify_query() {
        let two = Node::add(Node::Integer(1), Node::Integer(1));
        let mut cte = Select::new(vec![Binding::new(two)], None);
        cte.where_ = Some(Node::Bool(true));
        let mut q = Query::new(Node::from(Select::new(
            vec![Binding::new(Node::not(Node::Bool(true)))],
            Some(table("c")),
        )));
        q.with.push(CteBinding {
            table: "c".to_string(),
            select: cte,
        });
        let out = simplify_query(q, &NoHint);
        assert_eq!(out.with[0].select.columns[0].expr, Node::Integer(2));
        assert!(out.with[0].select.where_.is_none());
        let Node::Select(body) = &out.body else {
            panic!("expected a select");
        };
        assert_eq!(body.columns[0].expr, Node::Bool(false));
    }

    #[test]
    fn test_idempotent() {
        let nodes = vec![
            Node::add(Node::add(x(), Node::Integer(1)), Node::ident("y")),
            Node::member(x(), vec![Node::Integer(1), Node::Integer(2), Node::Integer(3)]),
            Node::compare(CmpOp::Eq, x(), x()),
            Node::coalesce(vec![x(), Node::ident("y"), Node::Integer(0)]),
            Node::like(Node::call(BuiltinOp::Upper, vec![x()]), "AB%"),
        ];
        for n in nodes {
            let once = simplify(n, &NoHint);
            let twice = simplify(once.clone(), &NoHint);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_child_contexts() {
        let n = Node::and(x(), Node::Integer(1));
        assert_eq!(child_contexts(&n, true), vec![true, true]);
        let n = Node::xor(x(), Node::Integer(1));
        assert_eq!(child_contexts(&n, true), vec![false, false]);
        let n = Node::case(vec![(x(), Node::Integer(1))], Some(Node::Integer(2)));
        assert_eq!(child_contexts(&n, false), vec![true, false, false]);
        assert_eq!(child_contexts(&Node::not(x()), true), vec![false]);
    }
}
