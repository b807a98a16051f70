//! The ordered rewrite rule table.
//!
//! Rules are tried in declaration order and the first one whose pattern
//! and guards hold rewrites the node. Later rules may assume that the
//! earlier ones did not apply: folding MISSING operands comes before
//! folding constants, which comes before canonicalization.
//!
//! Every rule preserves the value of the node it rewrites, except that
//! rules restricted to a logical context only preserve its truthiness.

use std::mem;

use crate::expression::builtin::BuiltinOp;
use crate::expression::hint::Relation;
use crate::expression::literal::{Field, List, Struct};
use crate::expression::node::{equivalent, Builtin, Case, CaseLimb, Node, NodeKind};
use crate::expression::operator::{
    AggregateOp, ArithOp, CmpOp, IsKeyword, JoinKind, LogicalOp, StringMatchOp, UnaryArithOp,
};
use crate::expression::relation::{Aggregate, Join, Select};
use crate::expression::simplify::fold;
use crate::expression::simplify::math;
use crate::expression::simplify::pattern::{Ctx, Guard, Match, Pattern as P, Rewrite, Rule};
use crate::expression::types::TypeSet;

use BuiltinOp as B;
use CmpOp::{Eq, Ge, Gt, Ilike, Le, Like, Lt, Ne};
use IsKeyword::{IsFalse, IsMissing, IsNotFalse, IsNotMissing, IsNotNull, IsNotTrue, IsNull, IsTrue};
use LogicalOp::{And, Or, Xnor, Xor};

const fn rule(name: &'static str, pattern: P, guards: &'static [Guard], rewrite: Rewrite) -> Rule {
    Rule {
        name,
        pattern,
        guards,
        rewrite,
    }
}

/// Find the first rule that rewrites `node` and return it with the result.
pub fn apply(node: &Node, ctx: &Ctx<'_>) -> Option<(&'static Rule, Node)> {
    RULES.iter().find_map(|rule| {
        let out = rule.apply(node, ctx)?;
        // a rule that reproduces its input would never settle
        (!out.equals(node)).then_some((rule, out))
    })
}


pub static RULES: &[Rule] = &[
    rule("logic-never-true", P::Any, &[never_true], to_false),
    // paths into literal structures
    rule("dot-of-absent", P::Dot(&P::Absent), &[], to_missing),
    rule(
        "dot-of-struct",
        P::Dot(&P::OneOf(&[P::Kind(NodeKind::Struct), P::CallAny(B::MakeStruct)])),
        &[],
        field_of,
    ),
    rule("index-of-absent", P::Index(&P::Absent), &[], to_missing),
    rule(
        "index-of-list",
        P::Index(&P::OneOf(&[P::Kind(NodeKind::List), P::CallAny(B::MakeList)])),
        &[],
        element_of,
    ),
    // NOT
    rule("not-prune-case", P::Not(&P::Bind("c", &P::Kind(NodeKind::Case))), &[], not_prune_case),
    rule("not-absent", P::Not(&P::Var("x")), &[absent_x], to_missing),
    rule("not-bool", P::Not(&P::Bind("b", &P::AnyBool)), &[], not_bool),
    rule("not-not", P::Not(&P::Not(&P::Var("x"))), &[logical_x], take_x),
    rule("not-comparison", P::Not(&P::Kind(NodeKind::Comparison)), &[], not_comparison),
    rule("not-is", P::Not(&P::Is(&[], &P::Var("x"))), &[], not_is),
    // AND, OR, XOR, XNOR
    rule(
        "exclusive-absent-operand",
        P::Logical(&[Xor, Xnor], &P::Var("l"), &P::Var("r")),
        &[in_logic, absent_operand],
        to_false,
    ),
    rule("xor-self", P::Logical(&[Xor], &P::Var("x"), &P::Same("x")), &[in_logic], to_false),
    rule(
        "xnor-self",
        P::Logical(&[Xnor], &P::Var("x"), &P::Same("x")),
        &[in_logic, logical_x],
        xnor_self,
    ),
    rule(
        "and-or-self",
        P::Logical(&[And, Or], &P::Var("x"), &P::Same("x")),
        &[truthy_x],
        take_x,
    ),
    rule(
        "logical-bool-left",
        P::Logical(&[], &P::Var("x"), &P::Bind("b", &P::AnyBool)),
        &[x_not_bool],
        logical_swap,
    ),
    rule("and-true", P::Logical(&[And], &P::Bool(true), &P::Var("x")), &[truthy_x], take_x),
    rule("and-false", P::Logical(&[And], &P::Bool(false), &P::Any), &[], to_false),
    rule("or-true", P::Logical(&[Or], &P::Bool(true), &P::Any), &[], to_true),
    rule("or-false", P::Logical(&[Or], &P::Bool(false), &P::Var("x")), &[truthy_x], take_x),
    rule("xor-true", P::Logical(&[Xor], &P::Bool(true), &P::Var("x")), &[], not_x),
    rule("xor-false", P::Logical(&[Xor], &P::Bool(false), &P::Var("x")), &[truthy_x], take_x),
    rule("xnor-true", P::Logical(&[Xnor], &P::Bool(true), &P::Var("x")), &[truthy_x], take_x),
    rule("xnor-false", P::Logical(&[Xnor], &P::Bool(false), &P::Var("x")), &[], not_x),
    rule(
        "and-left-assoc",
        P::Logical(&[And], &P::Var("a"), &P::Logical(&[And], &P::Var("b"), &P::Var("c"))),
        &[],
        logical_left_assoc,
    ),
    rule(
        "or-left-assoc",
        P::Logical(&[Or], &P::Var("a"), &P::Logical(&[Or], &P::Var("b"), &P::Var("c"))),
        &[],
        logical_left_assoc,
    ),
    // comparisons
    rule(
        "compare-prune-left",
        P::Cmp(&[], &P::Bind("l", &P::Kind(NodeKind::Case)), &P::Var("r")),
        &[],
        compare_prune_left,
    ),
    rule(
        "compare-prune-right",
        P::Cmp(&[], &P::Var("l"), &P::Bind("r", &P::Kind(NodeKind::Case))),
        &[],
        compare_prune_right,
    ),
    rule(
        "compare-absent",
        P::Cmp(&[], &P::Var("l"), &P::Var("r")),
        &[absent_operand],
        to_missing,
    ),
    rule(
        "compare-constants",
        P::Cmp(&[], &P::Bind("l", &P::Const), &P::Bind("r", &P::Const)),
        &[],
        compare_constants,
    ),
    rule(
        "compare-case-left",
        P::Cmp(&[], &P::Bind("l", &P::Kind(NodeKind::Case)), &P::Var("r")),
        &[],
        compare_case_left,
    ),
    rule(
        "compare-case-right",
        P::Cmp(&[], &P::Var("l"), &P::Bind("r", &P::Kind(NodeKind::Case))),
        &[],
        compare_case_right,
    ),
    rule("compare-self", P::Cmp(&[Eq, Ne], &P::Var("x"), &P::Same("x")), &[], compare_self),
    rule(
        "compare-logical-operands",
        P::Cmp(&[Eq, Ne], &P::Var("l"), &P::Var("r")),
        &[logical_operands],
        compare_logical,
    ),
    rule(
        "compare-upper",
        P::Cmp(
            &[Eq, Ne],
            &P::Call(B::Upper, &[P::Var("s")]),
            &P::Bind("c", &P::Str),
        ),
        &[],
        compare_upper,
    ),
    rule(
        "compare-lower",
        P::Cmp(
            &[Eq, Ne],
            &P::Call(B::Lower, &[P::Var("s")]),
            &P::Bind("c", &P::Str),
        ),
        &[],
        compare_lower,
    ),
    rule(
        "compare-like-pattern",
        P::Cmp(&[Like, Ilike], &P::Var("l"), &P::Bind("r", &P::Str)),
        &[],
        compare_like,
    ),
    rule(
        "compare-finite-set",
        P::Cmp(&[], &P::Var("l"), &P::Bind("r", &P::Const)),
        &[path_l],
        compare_finite_set,
    ),
    rule(
        "compare-constant-right",
        P::Cmp(
            &[Eq, Ne, Lt, Le, Gt, Ge],
            &P::Bind("l", &P::Const),
            &P::Bind("r", &P::NonConst),
        ),
        &[],
        compare_swap,
    ),
    rule(
        "compare-bool-logic",
        P::Cmp(&[], &P::Var("l"), &P::Var("r")),
        &[in_logic],
        compare_bool_logic,
    ),
    // LIKE, ILIKE, SIMILAR TO, regular expressions
    rule("match-absent", P::StrMatch(&[], &P::Var("x")), &[absent_x], to_missing),
    rule(
        "like-constant",
        P::StrMatch(&[StringMatchOp::Like, StringMatchOp::Ilike], &P::Str),
        &[],
        like_constant,
    ),
    rule(
        "like-upper",
        P::StrMatch(&[StringMatchOp::Like], &P::Call(B::Upper, &[P::Var("s")])),
        &[no_escape],
        like_upper,
    ),
    rule(
        "like-lower",
        P::StrMatch(&[StringMatchOp::Like], &P::Call(B::Lower, &[P::Var("s")])),
        &[no_escape],
        like_lower,
    ),
    rule(
        "like-equals",
        P::StrMatch(&[StringMatchOp::Like], &P::Var("x")),
        &[no_escape, no_wildcards, string_x],
        like_equals,
    ),
    rule(
        "like-contains",
        P::StrMatch(&[StringMatchOp::Like, StringMatchOp::Ilike], &P::Var("x")),
        &[no_escape],
        like_contains,
    ),
    rule(
        "ilike-equals",
        P::StrMatch(&[StringMatchOp::Ilike], &P::Var("x")),
        &[no_escape, no_wildcards],
        ilike_equals,
    ),
    // arithmetic
    rule(
        "arith-prune-left",
        P::Arith(&[], &P::Bind("l", &P::Kind(NodeKind::Case)), &P::Var("r")),
        &[],
        arith_prune_left,
    ),
    rule(
        "arith-prune-right",
        P::Arith(&[], &P::Var("l"), &P::Bind("r", &P::Kind(NodeKind::Case))),
        &[],
        arith_prune_right,
    ),
    rule("arith-never-numeric", P::Kind(NodeKind::Arithmetic), &[never_numeric], to_missing),
    rule(
        "arith-constants",
        P::Arith(&[], &P::Bind("l", &P::Number), &P::Bind("r", &P::Number)),
        &[],
        arith_constants,
    ),
    rule(
        "arith-constant-right",
        P::Arith(
            &[ArithOp::Add, ArithOp::Mul],
            &P::Bind("l", &P::Const),
            &P::Bind("r", &P::NonConst),
        ),
        &[],
        arith_swap,
    ),
    rule(
        "add-reassociate",
        P::Arith(
            &[ArithOp::Add],
            &P::Arith(&[ArithOp::Add], &P::Var("x"), &P::Bind("a", &P::Number)),
            &P::Bind("b", &P::Number),
        ),
        &[],
        reassociate,
    ),
    rule(
        "sub-reassociate",
        P::Arith(
            &[ArithOp::Sub],
            &P::Arith(&[ArithOp::Sub], &P::Var("x"), &P::Bind("a", &P::Number)),
            &P::Bind("b", &P::Number),
        ),
        &[],
        reassociate,
    ),
    rule(
        "mul-reassociate",
        P::Arith(
            &[ArithOp::Mul],
            &P::Arith(&[ArithOp::Mul], &P::Var("x"), &P::Bind("a", &P::Number)),
            &P::Bind("b", &P::Number),
        ),
        &[],
        reassociate,
    ),
    rule(
        "add-left-assoc",
        P::Arith(
            &[ArithOp::Add],
            &P::Var("a"),
            &P::Arith(&[ArithOp::Add], &P::Var("b"), &P::Var("c")),
        ),
        &[],
        arith_left_assoc,
    ),
    rule(
        "mul-left-assoc",
        P::Arith(
            &[ArithOp::Mul],
            &P::Var("a"),
            &P::Arith(&[ArithOp::Mul], &P::Var("b"), &P::Var("c")),
        ),
        &[],
        arith_left_assoc,
    ),
    rule(
        "add-constant-outward",
        P::Arith(
            &[ArithOp::Add],
            &P::Arith(&[ArithOp::Add], &P::Var("a"), &P::Bind("c", &P::Number)),
            &P::Bind("b", &P::NonConst),
        ),
        &[],
        constant_outward,
    ),
    rule(
        "mul-constant-outward",
        P::Arith(
            &[ArithOp::Mul],
            &P::Arith(&[ArithOp::Mul], &P::Var("a"), &P::Bind("c", &P::Number)),
            &P::Bind("b", &P::NonConst),
        ),
        &[],
        constant_outward,
    ),
    rule(
        "add-zero",
        P::Arith(&[ArithOp::Add, ArithOp::Sub], &P::Var("x"), &P::Int(0)),
        &[numeric_x],
        take_x,
    ),
    rule(
        "mul-one",
        P::Arith(&[ArithOp::Mul, ArithOp::Div], &P::Var("x"), &P::Int(1)),
        &[numeric_x],
        take_x,
    ),
    rule(
        "unary-prune-case",
        P::Unary(&[], &P::Bind("c", &P::Kind(NodeKind::Case))),
        &[],
        unary_prune_case,
    ),
    rule("unary-never-numeric", P::Unary(&[], &P::Var("x")), &[non_numeric_x], to_missing),
    rule(
        "neg-constant",
        P::Unary(&[UnaryArithOp::Neg], &P::Bind("x", &P::Number)),
        &[],
        neg_constant,
    ),
    rule(
        "bit-not-constant",
        P::Unary(&[UnaryArithOp::BitNot], &P::Bind("x", &P::Number)),
        &[],
        bit_not_constant,
    ),
    rule(
        "neg-neg",
        P::Unary(&[UnaryArithOp::Neg], &P::Unary(&[UnaryArithOp::Neg], &P::Var("x"))),
        &[numeric_x],
        take_x,
    ),
    // IS
    rule(
        "is-truth-of-non-bool",
        P::Is(&[IsTrue, IsFalse, IsNotTrue, IsNotFalse], &P::Var("x")),
        &[non_bool_x],
        is_truth_of_non_bool,
    ),
    rule("is-missing-operand", P::Is(&[], &P::Var("x")), &[missing_x], is_missing_operand),
    rule("is-null-operand", P::Is(&[], &P::Var("x")), &[null_x], is_null_operand),
    rule(
        "is-missing-impossible",
        P::Is(&[IsMissing, IsNotMissing], &P::Var("x")),
        &[never_missing_x],
        is_negative_key,
    ),
    rule(
        "is-null-impossible",
        P::Is(&[IsNull, IsNotNull], &P::Var("x")),
        &[never_null_x],
        is_negative_key,
    ),
    rule("is-bool-constant", P::Is(&[], &P::Bind("x", &P::AnyBool)), &[], is_bool_constant),
    rule("is-constant", P::Is(&[], &P::Const), &[], is_negative_key),
    rule(
        "is-case",
        P::Is(&[], &P::Bind("c", &P::Kind(NodeKind::Case))),
        &[],
        is_case,
    ),
    rule(
        "is-missing-of-not",
        P::Is(&[IsMissing, IsNotMissing], &P::Not(&P::Var("x"))),
        &[logical_x],
        is_through_not,
    ),
    rule("is-true-logic", P::Is(&[IsTrue], &P::Var("x")), &[in_logic], take_x),
    rule("is-false-logic", P::Is(&[IsFalse], &P::Var("x")), &[in_logic], not_x),
    // CAST
    rule("cast-prune-case", P::Cast(&P::Bind("c", &P::Kind(NodeKind::Case))), &[], cast_prune_case),
    rule("cast-to-absent", P::Cast(&P::Any), &[], cast_to_absent),
    rule("cast-never", P::Cast(&P::Var("x")), &[cast_never_succeeds], to_missing),
    rule("cast-identity", P::Cast(&P::Var("x")), &[cast_is_identity], take_x),
    rule("cast-constant", P::Cast(&P::Bind("x", &P::Const)), &[], cast_constant),
    // CASE
    rule("case-logic-else", P::Kind(NodeKind::Case), &[in_logic], case_logic_else),
    rule("case-false-limb", P::Kind(NodeKind::Case), &[], case_false_limb),
    rule("case-true-limb", P::Kind(NodeKind::Case), &[], case_true_limb),
    rule("case-trailing-else", P::Kind(NodeKind::Case), &[], case_trailing_else),
    rule("case-no-limbs", P::Kind(NodeKind::Case), &[], case_no_limbs),
    rule("case-logic-test", P::Kind(NodeKind::Case), &[in_logic], case_logic_test),
    rule("case-hash-lookup", P::Kind(NodeKind::Case), &[], case_hash_lookup),
    // IN
    rule("in-absent", P::Member(&P::Var("x")), &[absent_x], to_missing),
    rule("in-finite-set", P::Member(&P::Var("x")), &[path_x], in_finite_set),
    rule("in-constant", P::Member(&P::Bind("x", &P::Const)), &[], in_constant),
    rule("in-prune-types", P::Member(&P::Var("x")), &[], in_prune_types),
    rule("in-empty", P::Kind(NodeKind::Member), &[], in_empty),
    rule("in-single", P::Member(&P::Var("x")), &[], in_single),
    rule("in-disjunction", P::Member(&P::Var("x")), &[], in_disjunction),
    // builtins
    rule(
        "call-missing-argument",
        P::Kind(NodeKind::Builtin),
        &[strict_missing_argument],
        to_missing,
    ),
    rule(
        "numeric-call-prune-case",
        P::OneOf(&[
            P::Call(B::Abs, &[P::Kind(NodeKind::Case)]),
            P::Call(B::Sign, &[P::Kind(NodeKind::Case)]),
            P::Call(B::Round, &[P::Kind(NodeKind::Case)]),
            P::Call(B::RoundEven, &[P::Kind(NodeKind::Case)]),
            P::Call(B::Trunc, &[P::Kind(NodeKind::Case)]),
            P::Call(B::Floor, &[P::Kind(NodeKind::Case)]),
            P::Call(B::Ceil, &[P::Kind(NodeKind::Case)]),
        ]),
        &[],
        numeric_call_prune_case,
    ),
    rule(
        "round-constant",
        P::OneOf(&[
            P::Call(B::Round, &[P::Var("x")]),
            P::Call(B::RoundEven, &[P::Var("x")]),
            P::Call(B::Trunc, &[P::Var("x")]),
            P::Call(B::Floor, &[P::Var("x")]),
            P::Call(B::Ceil, &[P::Var("x")]),
        ]),
        &[number_x],
        round_constant,
    ),
    rule("abs-constant", P::Call(B::Abs, &[P::Bind("x", &P::Number)]), &[], abs_constant),
    rule("sign-constant", P::Call(B::Sign, &[P::Bind("x", &P::Number)]), &[], sign_constant),
    rule(
        "float-func-constant",
        P::OneOf(&[
            P::Call(B::Sqrt, &[P::Var("x")]),
            P::Call(B::Exp, &[P::Var("x")]),
            P::Call(B::Ln, &[P::Var("x")]),
            P::Call(B::Log2, &[P::Var("x")]),
            P::Call(B::Log10, &[P::Var("x")]),
        ]),
        &[number_x],
        float_func_constant,
    ),
    rule(
        "pow-constant",
        P::Call(B::Pow, &[P::Bind("x", &P::Number), P::Bind("y", &P::Number)]),
        &[],
        pow_constant,
    ),
    rule(
        "extremum-constant",
        P::OneOf(&[P::CallAny(B::Least), P::CallAny(B::Greatest)]),
        &[],
        extremum_constant,
    ),
    rule(
        "bit-count-constant",
        P::Call(B::BitCount, &[P::Bind("x", &P::Number)]),
        &[],
        bit_count_constant,
    ),
    rule("size-absent", P::Call(B::ObjectSize, &[P::Bind("x", &P::Absent)]), &[], take_x),
    rule(
        "size-constant",
        P::Call(
            B::ObjectSize,
            &[P::OneOf(&[
                P::Bind("x", &P::Kind(NodeKind::Struct)),
                P::Bind("x", &P::Kind(NodeKind::List)),
                P::Bind("x", &P::CallAny(B::MakeList)),
                P::Bind("x", &P::CallAny(B::MakeStruct)),
            ])],
        ),
        &[],
        size_constant,
    ),
    rule("type-bit-constant", P::Call(B::TypeBit, &[P::Var("x")]), &[], type_bit_constant),
    rule("make-list-constant", P::CallAny(B::MakeList), &[constant_args], make_list_constant),
    rule("make-struct-constant", P::CallAny(B::MakeStruct), &[], make_struct_constant),
    rule("upper-constant", P::Call(B::Upper, &[P::Bind("x", &P::Str)]), &[], upper_constant),
    rule("lower-constant", P::Call(B::Lower, &[P::Bind("x", &P::Str)]), &[], lower_constant),
    rule(
        "char-length-constant",
        P::Call(B::CharLength, &[P::Bind("x", &P::Str)]),
        &[],
        char_length_constant,
    ),
    rule(
        "char-length-of-case",
        P::Call(
            B::CharLength,
            &[P::OneOf(&[
                P::Call(B::Upper, &[P::Var("x")]),
                P::Call(B::Lower, &[P::Var("x")]),
            ])],
        ),
        &[],
        char_length_of,
    ),
    rule(
        "char-length-of-concat",
        P::Call(B::CharLength, &[P::Call(B::Concat, &[P::Var("a"), P::Var("b")])]),
        &[],
        char_length_of_concat,
    ),
    rule("substring-of-case", P::CallAny(B::Substring), &[], case_fold_outward),
    rule(
        "substring-whole",
        P::Call(B::Substring, &[P::Var("x"), P::Int(1)]),
        &[string_x],
        take_x,
    ),
    rule(
        "trim-of-case",
        P::OneOf(&[P::CallAny(B::Trim), P::CallAny(B::Ltrim), P::CallAny(B::Rtrim)]),
        &[],
        case_fold_outward,
    ),
    rule(
        "concat-constants",
        P::Call(B::Concat, &[P::Bind("a", &P::Str), P::Bind("b", &P::Str)]),
        &[],
        concat_constants,
    ),
    rule(
        "concat-left-assoc",
        P::Call(
            B::Concat,
            &[P::Var("a"), P::Call(B::Concat, &[P::Var("b"), P::Var("c")])],
        ),
        &[],
        concat_left_assoc,
    ),
    rule(
        "concat-reassociate",
        P::Call(
            B::Concat,
            &[
                P::Call(B::Concat, &[P::Var("x"), P::Bind("a", &P::Str)]),
                P::Bind("b", &P::Str),
            ],
        ),
        &[],
        concat_reassociate,
    ),
    rule(
        "concat-of-case",
        P::Call(B::Concat, &[P::Var("a"), P::Var("b")]),
        &[],
        concat_of_case,
    ),
    rule(
        "contains-constant",
        P::Call(B::Contains, &[P::Bind("a", &P::Str), P::Bind("b", &P::Str)]),
        &[],
        contains_constant,
    ),
    rule("hash-lookup-constant", P::CallAny(B::HashLookup), &[], hash_lookup_constant),
    // aggregates
    rule("aggregate-prune-case", P::Kind(NodeKind::Aggregate), &[], aggregate_prune_case),
    rule("sum-of-integers", P::Kind(NodeKind::Aggregate), &[], sum_of_integers),
    rule("aggregate-filter-never", P::Kind(NodeKind::Aggregate), &[], aggregate_filter_never),
    rule("aggregate-filter-always", P::Kind(NodeKind::Aggregate), &[], aggregate_filter_always),
    rule(
        "count-filter-not-missing",
        P::Kind(NodeKind::Aggregate),
        &[],
        count_filter_not_missing,
    ),
    // relations
    rule("join-on-true", P::Kind(NodeKind::Join), &[], join_on_true),
    rule("left-join-on-false", P::Kind(NodeKind::Join), &[], left_join_on_false),
    rule("select-trivial-filter", P::Kind(NodeKind::Select), &[], select_trivial_filter),
    rule("order-by-constant", P::Kind(NodeKind::Select), &[], order_by_constant),
    rule("distinct-on-constant", P::Kind(NodeKind::Select), &[], distinct_on_constant),
    rule("distinct-constant-columns", P::Kind(NodeKind::Select), &[], distinct_constant_columns),
    rule("group-by-constant", P::Kind(NodeKind::Select), &[], group_by_constant),
];

// shared rewrites

fn to_false(_: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::Bool(false))
}

fn to_true(_: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::Bool(true))
}

fn to_missing(_: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::Missing)
}

fn take_x(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    m.take("x")
}

fn not_x(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::not(m.take("x")?))
}

// shared guards

fn in_logic(_: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    ctx.logic
}

fn never_true(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    if !ctx.logic {
        return false;
    }
    let t = ctx.type_of(m.node);
    !t.is_empty() && t.only(TypeSet::NULL | TypeSet::MISSING)
}

fn x_type(m: &Match<'_>, ctx: &Ctx<'_>) -> TypeSet {
    m.get("x").map_or(TypeSet::ANY, |x| ctx.type_of(x))
}

fn absent_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    m.get("x").map_or(false, |x| ctx.absent(x))
}

fn missing_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    m.get("x").map_or(false, |x| ctx.missing(x))
}

fn null_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    m.get("x").map_or(false, |x| ctx.null(x))
}

fn absent_operand(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    ["l", "r"]
        .iter()
        .any(|name| m.get(name).map_or(false, |n| ctx.absent(n)))
}

/// `x` is BOOL or MISSING, so it equals its own truthiness test.
fn logical_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    x_type(m, ctx).only(TypeSet::LOGICAL)
}

fn truthy_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    ctx.logic || logical_x(m, ctx)
}

fn numeric_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    let t = x_type(m, ctx);
    t.any_of(TypeSet::NUMERIC) && t.only(TypeSet::NUMERIC | TypeSet::MISSING)
}

fn non_numeric_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    !x_type(m, ctx).any_of(TypeSet::NUMERIC)
}

fn non_bool_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    !x_type(m, ctx).logical()
}

fn never_missing_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    !x_type(m, ctx).maybe_missing()
}

fn never_null_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    !x_type(m, ctx).any_of(TypeSet::NULL)
}

fn string_x(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    x_type(m, ctx).only(TypeSet::STRING | TypeSet::MISSING)
}

fn number_x(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    m.get("x").map_or(false, Node::is_number)
}

fn x_not_bool(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    !matches!(m.get("x"), Some(Node::Bool(_)))
}

fn path_x(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    m.get("x").map_or(false, Node::is_path)
}

fn path_l(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    m.get("l").map_or(false, Node::is_path)
}

// CASE helpers

fn case_of(node: &Node) -> Option<&Case> {
    match node {
        Node::Case(c) => Some(c),
        _ => None,
    }
}

/// Replace results of `case` whose type is outside `want` by MISSING,
/// for an operator that yields MISSING on such operands. `None` when
/// nothing changes.
fn prune_case(case: &Case, want: TypeSet, ctx: &Ctx<'_>) -> Option<Node> {
    let mut out = case.clone();
    let mut changed = false;
    for limb in &mut out.limbs {
        if !matches!(limb.then, Node::Missing) && !ctx.type_of(&limb.then).any_of(want) {
            limb.then = Node::Missing;
            changed = true;
        }
    }
    let else_type = out
        .otherwise
        .as_ref()
        .map_or(TypeSet::NULL, |e| ctx.type_of(e));
    if !matches!(out.otherwise, Some(Node::Missing)) && !else_type.any_of(want) {
        out.otherwise = Some(Node::Missing);
        changed = true;
    }
    if !want.any_of(TypeSet::NULL | TypeSet::MISSING) {
        if let Some(only) = null_guarded_result(&out) {
            return Some(only);
        }
    }
    changed.then(|| Node::Case(Box::new(out)))
}

// The only non-MISSING result is `x` under a `x IS NOT NULL` test, as
// in a pruned COALESCE. When the test fails `x` is NULL or MISSING,
// which the enclosing operator maps to MISSING anyway.
fn null_guarded_result(case: &Case) -> Option<Node> {
    let (first, rest) = case.limbs.split_first()?;
    let Node::IsKey {
        key: IsNotNull | IsNotMissing,
        inner,
    } = &first.when
    else {
        return None;
    };
    let rest_missing = rest.iter().all(|l| matches!(l.then, Node::Missing));
    let ok = equivalent(inner, &first.then)
        && rest_missing
        && matches!(case.otherwise, Some(Node::Missing));
    ok.then(|| first.then.clone())
}

/// Apply `f` to every result of `case`; an absent ELSE counts as NULL.
fn push_into_case(case: &Case, f: impl Fn(Node) -> Node) -> Node {
    let mut out = case.clone();
    for limb in &mut out.limbs {
        limb.then = f(mem::take(&mut limb.then));
    }
    out.otherwise = Some(f(out.otherwise.take().unwrap_or(Node::Null)));
    out.valence = Some("logical".to_string());
    Node::Case(Box::new(out))
}

// paths

fn field_of(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let Node::Dot { inner, field } = m.node else {
        return None;
    };
    match &**inner {
        Node::Struct(s) => Some(s.field(field).cloned().unwrap_or(Node::Missing)),
        Node::Builtin(b) if b.args.len() % 2 == 0 => {
            for pair in b.args.chunks_exact(2) {
                if pair[0].as_str()? == field.as_str() {
                    return Some(pair[1].clone());
                }
            }
            Some(Node::Missing)
        }
        _ => None,
    }
}

fn element_of(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let Node::Index { inner, offset } = m.node else {
        return None;
    };
    let items = match &**inner {
        Node::List(l) => &l.values,
        Node::Builtin(b) => &b.args,
        _ => return None,
    };
    let item = usize::try_from(*offset).ok().and_then(|i| items.get(i));
    Some(item.cloned().unwrap_or(Node::Missing))
}

// NOT

fn not_prune_case(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let c = case_of(m.get("c")?)?;
    Some(Node::not(prune_case(c, TypeSet::BOOL, ctx)?))
}

fn not_bool(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    match m.get("b")? {
        Node::Bool(b) => Some(Node::Bool(!b)),
        _ => None,
    }
}

fn not_comparison(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let Node::Not(inner) = m.node else {
        return None;
    };
    let Node::Comparison { op, left, right } = &**inner else {
        return None;
    };
    Some(Node::compare(op.invert()?, (**left).clone(), (**right).clone()))
}

fn not_is(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let Node::Not(inner) = m.node else {
        return None;
    };
    let Node::IsKey { key, inner } = &**inner else {
        return None;
    };
    Some(Node::is((**inner).clone(), key.invert()))
}

// logical operators

fn xnor_self(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::is(m.take("x")?, IsNotMissing))
}

fn logical_swap(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::logical(m.logical_op()?, m.take("b")?, m.take("x")?))
}

fn logical_left_assoc(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = m.logical_op()?;
    let ab = Node::logical(op, m.take("a")?, m.take("b")?);
    Some(Node::logical(op, ab, m.take("c")?))
}

// comparisons

fn compare_want(op: CmpOp, other: &Node, ctx: &Ctx<'_>) -> TypeSet {
    let want = TypeSet::ANY.without(TypeSet::MISSING | TypeSet::NULL);
    match op {
        Eq | Ne => want & ctx.type_of(other),
        _ => want,
    }
}

fn compare_prune_left(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let op = m.cmp_op()?;
    let r = m.take("r")?;
    let l = prune_case(case_of(m.get("l")?)?, compare_want(op, &r, ctx), ctx)?;
    Some(Node::compare(op, l, r))
}

fn compare_prune_right(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let op = m.cmp_op()?;
    let l = m.take("l")?;
    let r = prune_case(case_of(m.get("r")?)?, compare_want(op, &l, ctx), ctx)?;
    Some(Node::compare(op, l, r))
}

fn compare_constants(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    fold::compare(m.cmp_op()?, m.get("l")?, m.get("r")?).map(Node::Bool)
}

fn compare_case_left(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = m.cmp_op()?;
    let c = case_of(m.get("l")?)?;
    if c.is_path_limbs() {
        return None;
    }
    let r = m.get("r")?;
    Some(push_into_case(c, |then| Node::compare(op, then, r.clone())))
}

fn compare_case_right(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = m.cmp_op()?;
    let c = case_of(m.get("r")?)?;
    if c.is_path_limbs() {
        return None;
    }
    let l = m.get("l")?;
    Some(push_into_case(c, |then| Node::compare(op, l.clone(), then)))
}

fn compare_self(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let holds = Node::Bool(m.cmp_op()? == Eq);
    let x = m.take("x")?;
    if !ctx.type_of(&x).any_of(TypeSet::NULL | TypeSet::MISSING) {
        return Some(holds);
    }
    let limb = CaseLimb {
        when: Node::is(x, IsNotNull),
        then: holds,
    };
    let mut case = Case::new(vec![limb], Some(Node::Missing));
    case.valence = Some("logical".to_string());
    Some(Node::Case(Box::new(case)))
}

fn logical_operands(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    ["l", "r"].iter().all(|name| {
        m.get(name)
            .map_or(false, |n| ctx.type_of(n).only(TypeSet::LOGICAL))
    })
}

fn compare_logical(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = match m.cmp_op()? {
        Eq => Xnor,
        _ => Xor,
    };
    Some(Node::logical(op, m.take("l")?, m.take("r")?))
}

fn case_folded(s: &str, upper: bool) -> String {
    if upper {
        s.to_uppercase()
    } else {
        s.to_lowercase()
    }
}

fn compare_case_folded(m: &Match<'_>, ctx: &Ctx<'_>, upper: bool) -> Option<Node> {
    let op = m.cmp_op()?;
    let s = m.take("s")?;
    let lit = m.get("c")?.as_str()?;
    if case_folded(lit, upper) != lit {
        // the folded string can never equal the literal
        let strings_only = ctx.type_of(&s).only(TypeSet::STRING);
        return match op {
            Eq if strings_only || ctx.logic => Some(Node::Bool(false)),
            Ne if strings_only => Some(Node::Bool(true)),
            _ => None,
        };
    }
    let equals = Node::call(B::EqualsCi, vec![s, Node::string(lit)]);
    Some(match op {
        Eq => equals,
        _ => Node::not(equals),
    })
}

fn compare_upper(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    compare_case_folded(m, ctx, true)
}

fn compare_lower(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    compare_case_folded(m, ctx, false)
}

fn compare_like(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = match m.cmp_op()? {
        Ilike => StringMatchOp::Ilike,
        _ => StringMatchOp::Like,
    };
    let pattern = m.get("r")?.as_str()?;
    Some(Node::string_match(op, m.take("l")?, pattern))
}

fn compare_finite_set(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let set = ctx.hint.values(m.get("l")?)?;
    match set.compare(m.cmp_op()?, m.get("r")?) {
        Relation::AlwaysTrue => Some(Node::Bool(true)),
        Relation::AlwaysFalse => Some(Node::Bool(false)),
        Relation::Indefinitive => None,
    }
}

fn compare_swap(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::compare(m.cmp_op()?.flip(), m.take("r")?, m.take("l")?))
}

fn compare_bool_logic(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let (l, r) = (m.get("l")?, m.get("r")?);
    let both = ctx.type_of(l) & ctx.type_of(r);
    if both != TypeSet::BOOL && both != TypeSet::LOGICAL {
        return None;
    }
    match m.cmp_op()? {
        Eq => Some(Node::xnor(l.clone(), r.clone())),
        Ne => Some(Node::xor(l.clone(), r.clone())),
        Like | Ilike => None,
        // booleans are unordered
        Lt | Le | Gt | Ge => Some(Node::Bool(false)),
    }
}

// string matching

fn like_parts(node: &Node) -> Option<(StringMatchOp, &str, Option<&str>)> {
    match node {
        Node::StringMatch {
            op,
            pattern,
            escape,
            ..
        } => Some((*op, pattern.as_str(), escape.as_deref())),
        _ => None,
    }
}

fn no_escape(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    matches!(like_parts(m.node), Some((_, _, None)))
}

fn no_wildcards(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    like_parts(m.node).map_or(false, |(_, p, _)| fold::like_is_literal(p))
}

fn like_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let Node::StringMatch { expr, .. } = m.node else {
        return None;
    };
    let (op, pattern, escape) = like_parts(m.node)?;
    let escape = match escape {
        None => None,
        Some(e) => {
            let mut chars = e.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(c),
                _ => return None,
            }
        }
    };
    let s = expr.as_str()?;
    let ci = op == StringMatchOp::Ilike;
    Some(Node::Bool(fold::like(s, pattern, escape, ci)))
}

fn like_case_folded(m: &Match<'_>, ctx: &Ctx<'_>, upper: bool) -> Option<Node> {
    let (_, pattern, _) = like_parts(m.node)?;
    let s = m.take("s")?;
    if case_folded(pattern, upper) != pattern {
        let strings_only = ctx.type_of(&s).only(TypeSet::STRING);
        return (strings_only || ctx.logic).then_some(Node::Bool(false));
    }
    if let Some(term) = fold::like_substring(pattern) {
        return Some(Node::call(B::ContainsCi, vec![s, Node::string(term)]));
    }
    if fold::like_is_literal(pattern) {
        return Some(Node::call(B::EqualsCi, vec![s, Node::string(pattern)]));
    }
    None
}

fn like_upper(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    like_case_folded(m, ctx, true)
}

fn like_lower(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    like_case_folded(m, ctx, false)
}

fn like_equals(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (_, pattern, _) = like_parts(m.node)?;
    Some(Node::compare(Eq, m.take("x")?, Node::string(pattern)))
}

fn like_contains(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (op, pattern, _) = like_parts(m.node)?;
    let term = fold::like_substring(pattern)?;
    let func = match op {
        StringMatchOp::Ilike => B::ContainsCi,
        _ => B::Contains,
    };
    Some(Node::call(func, vec![m.take("x")?, Node::string(term)]))
}

fn ilike_equals(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (_, pattern, _) = like_parts(m.node)?;
    Some(Node::call(B::EqualsCi, vec![m.take("x")?, Node::string(pattern)]))
}

// arithmetic

fn never_numeric(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    ctx.type_of(m.node) == TypeSet::MISSING
}

fn arith_prune_left(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let l = prune_case(case_of(m.get("l")?)?, TypeSet::NUMERIC, ctx)?;
    Some(Node::arith(m.arith_op()?, l, m.take("r")?))
}

fn arith_prune_right(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let r = prune_case(case_of(m.get("r")?)?, TypeSet::NUMERIC, ctx)?;
    Some(Node::arith(m.arith_op()?, m.take("l")?, r))
}

fn arith_constants(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    fold::arith(m.arith_op()?, m.get("l")?, m.get("r")?)
}

fn arith_swap(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::arith(m.arith_op()?, m.take("r")?, m.take("l")?))
}

// (x op a) op b => x op (a op' b), where subtraction combines by adding
fn reassociate(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = m.arith_op()?;
    let combine = match op {
        ArithOp::Sub => ArithOp::Add,
        other => other,
    };
    let c = fold::arith(combine, m.get("a")?, m.get("b")?)?;
    if !c.is_number() {
        return None;
    }
    Some(Node::arith(op, m.take("x")?, c))
}

fn arith_left_assoc(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = m.arith_op()?;
    let ab = Node::arith(op, m.take("a")?, m.take("b")?);
    Some(Node::arith(op, ab, m.take("c")?))
}

// (a op c) op b => (a op b) op c, for a constant c
fn constant_outward(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let op = m.arith_op()?;
    let ab = Node::arith(op, m.take("a")?, m.take("b")?);
    Some(Node::arith(op, ab, m.take("c")?))
}

fn unary_parts(node: &Node) -> Option<UnaryArithOp> {
    match node {
        Node::UnaryArith { op, .. } => Some(*op),
        _ => None,
    }
}

fn unary_prune_case(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let op = unary_parts(m.node)?;
    let child = prune_case(case_of(m.get("c")?)?, TypeSet::NUMERIC, ctx)?;
    Some(Node::UnaryArith {
        op,
        child: Box::new(child),
    })
}

fn neg_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    fold::negate(m.get("x")?)
}

fn bit_not_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    fold::bit_not(m.get("x")?)
}

// IS

fn is_truth_of_non_bool(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::Bool(matches!(m.is_key()?, IsNotTrue | IsNotFalse)))
}

fn is_missing_operand(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let key = m.is_key()?;
    Some(Node::Bool(matches!(key, IsMissing | IsNotTrue | IsNotFalse)))
}

fn is_null_operand(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let key = m.is_key()?;
    Some(Node::Bool(matches!(
        key,
        IsNull | IsNotMissing | IsNotTrue | IsNotFalse
    )))
}

// the operand is neither NULL nor MISSING, as far as the key cares
fn is_negative_key(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::Bool(matches!(m.is_key()?, IsNotMissing | IsNotNull)))
}

fn is_bool_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let Node::Bool(b) = m.get("x")? else {
        return None;
    };
    let want_true = matches!(m.is_key()?, IsTrue | IsNotFalse);
    Some(Node::Bool(*b == want_true))
}

fn is_case(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let key = m.is_key()?;
    let c = case_of(m.get("c")?)?;
    Some(push_into_case(c, |then| Node::is(then, key)))
}

fn is_through_not(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::is(m.take("x")?, m.is_key()?))
}

// CAST

fn cast_target(node: &Node) -> Option<TypeSet> {
    match node {
        Node::Cast { to, .. } => Some(*to),
        _ => None,
    }
}

fn cast_prune_case(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let to = cast_target(m.node)?;
    let from = prune_case(case_of(m.get("c")?)?, fold::cast_sources(to), ctx)?;
    Some(Node::cast(from, to))
}

fn cast_to_absent(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    match cast_target(m.node)? {
        TypeSet::NULL => Some(Node::Null),
        TypeSet::MISSING => Some(Node::Missing),
        _ => None,
    }
}

fn cast_never_succeeds(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    cast_target(m.node).map_or(false, |to| {
        !x_type(m, ctx).any_of(fold::cast_sources(to))
    })
}

fn cast_is_identity(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    cast_target(m.node).map_or(false, |to| x_type(m, ctx).without(TypeSet::MISSING) == to)
}

fn cast_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    fold::cast(m.get("x")?, cast_target(m.node)?)
}

// CASE

fn with_case(m: &Match<'_>, f: impl FnOnce(&mut Case) -> bool) -> Option<Node> {
    let mut c = case_of(m.node)?.clone();
    f(&mut c).then(|| Node::Case(Box::new(c)))
}

fn case_logic_else(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_case(m, |c| {
        if c.otherwise.is_some() {
            return false;
        }
        c.otherwise = Some(Node::Bool(false));
        true
    })
}

fn case_false_limb(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_case(m, |c| {
        let before = c.limbs.len();
        c.limbs.retain(|l| !matches!(l.when, Node::Bool(false)));
        c.limbs.len() != before
    })
}

fn case_true_limb(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_case(m, |c| {
        let Some(at) = c.limbs.iter().position(|l| matches!(l.when, Node::Bool(true))) else {
            return false;
        };
        let taken = c.limbs.swap_remove(at);
        c.limbs.truncate(at);
        c.otherwise = Some(taken.then);
        true
    })
}

fn case_trailing_else(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_case(m, |c| {
        let otherwise = c.otherwise.clone().unwrap_or(Node::Null);
        let trailing = c
            .limbs
            .last()
            .map_or(false, |last| equivalent(&last.then, &otherwise));
        if trailing {
            c.limbs.pop();
        }
        trailing
    })
}

fn case_no_limbs(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let c = case_of(m.node)?;
    if !c.limbs.is_empty() {
        return None;
    }
    Some(c.otherwise.clone().unwrap_or(Node::Null))
}

// CASE WHEN c THEN TRUE ELSE FALSE END tests the truthiness of c
fn case_logic_test(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let c = case_of(m.node)?;
    match (c.limbs.as_slice(), &c.otherwise) {
        ([limb], Some(Node::Bool(false))) if matches!(limb.then, Node::Bool(true)) => {
            Some(limb.when.clone())
        }
        _ => None,
    }
}

fn case_hash_lookup(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let c = case_of(m.node)?;
    if c.limbs.is_empty() || !matches!(c.otherwise, None | Some(Node::Missing)) {
        return None;
    }
    let mut subject: Option<&Node> = None;
    let mut pairs: Vec<Node> = Vec::new();
    for limb in &c.limbs {
        let Node::Comparison {
            op: Eq,
            left,
            right,
        } = &limb.when
        else {
            return None;
        };
        if left.is_constant() || !right.is_constant() || !limb.then.is_constant() {
            return None;
        }
        match subject {
            Some(s) if !equivalent(s, left) => return None,
            _ => subject = Some(left),
        }
        if pairs.iter().step_by(2).any(|k| k.equals(right)) {
            return None;
        }
        pairs.push((**right).clone());
        pairs.push(limb.then.clone());
    }
    let mut args = vec![subject?.clone()];
    args.extend(pairs);
    if c.otherwise.is_none() {
        args.push(Node::Null);
    }
    Some(Node::call(B::HashLookup, args))
}

// IN

fn member_values(node: &Node) -> Option<&[Node]> {
    match node {
        Node::Member { values, .. } => Some(values),
        _ => None,
    }
}

fn compatible(a: TypeSet, b: TypeSet) -> bool {
    a.any_of(b) || (a.any_of(TypeSet::NUMERIC) && b.any_of(TypeSet::NUMERIC))
}

fn in_finite_set(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let x = m.get("x")?;
    let set = ctx.hint.values(x)?;
    let values = member_values(m.node)?;
    match set.member(values) {
        Relation::AlwaysTrue => Some(Node::Bool(true)),
        Relation::AlwaysFalse => Some(Node::Bool(false)),
        Relation::Indefinitive => {
            let kept: Vec<Node> = values
                .iter()
                .filter(|v| set.values().contains(v))
                .cloned()
                .collect();
            (kept.len() != values.len()).then(|| Node::member(x.clone(), kept))
        }
    }
}

fn in_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let x = m.get("x")?;
    let values = member_values(m.node)?;
    Some(Node::Bool(values.iter().any(|v| v.equals(x))))
}

fn in_prune_types(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let x = m.get("x")?;
    let values = member_values(m.node)?;
    let xt = ctx.type_of(x);
    let kept: Vec<Node> = values
        .iter()
        .filter(|v| compatible(ctx.type_of(v), xt))
        .cloned()
        .collect();
    (kept.len() != values.len()).then(|| Node::member(x.clone(), kept))
}

fn in_empty(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    member_values(m.node)?
        .is_empty()
        .then_some(Node::Bool(false))
}

fn in_single(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    match member_values(m.node)? {
        [v] => Some(Node::compare(Eq, m.take("x")?, v.clone())),
        _ => None,
    }
}

fn in_disjunction(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let values = member_values(m.node)?;
    let x = m.get("x")?;
    let terms = values
        .iter()
        .map(|v| Node::compare(Eq, x.clone(), v.clone()))
        .collect();
    Some(Node::disjunction(terms))
}

// builtins

// functions that yield MISSING whenever an argument is MISSING
const STRICT: &[BuiltinOp] = &[
    B::Concat,
    B::Trim,
    B::Ltrim,
    B::Rtrim,
    B::Upper,
    B::Lower,
    B::Contains,
    B::ContainsCi,
    B::EqualsCi,
    B::CharLength,
    B::Substring,
    B::SplitPart,
    B::BitCount,
    B::Abs,
    B::Sign,
    B::Pow,
];

fn strict_missing_argument(m: &Match<'_>, ctx: &Ctx<'_>) -> bool {
    m.call().map_or(false, |b| {
        let strict = STRICT.contains(&b.func)
            || math::ROUNDING.contains(&b.func)
            || math::FLOAT_FUNCS.contains(&b.func);
        strict && b.args.iter().any(|a| ctx.missing(a))
    })
}

fn first_arg<'a>(m: &Match<'a>) -> Option<(&'a Builtin, &'a Node)> {
    let b = m.call()?;
    Some((b, b.args.first()?))
}

fn numeric_call_prune_case(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let (b, arg) = first_arg(m)?;
    let pruned = prune_case(case_of(arg)?, TypeSet::NUMERIC, ctx)?;
    Some(Node::call(b.func, vec![pruned]))
}

fn round_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (b, arg) = first_arg(m)?;
    math::round(b.func, arg)
}

fn abs_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    math::abs(m.get("x")?)
}

fn sign_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    math::sign(m.get("x")?)
}

fn float_func_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (b, arg) = first_arg(m)?;
    math::float_func(b.func, arg)
}

fn pow_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    math::pow(m.get("x")?, m.get("y")?)
}

fn extremum_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let b = m.call()?;
    math::extremum(b.func, &b.args)
}

fn bit_count_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    math::bit_count(m.get("x")?)
}

fn size_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let n = match m.get("x")? {
        Node::Struct(s) => s.fields.len(),
        Node::List(l) => l.values.len(),
        Node::Builtin(b) if b.func == B::MakeStruct => b.args.len() / 2,
        Node::Builtin(b) => b.args.len(),
        _ => return None,
    };
    i64::try_from(n).ok().map(Node::Integer)
}

fn type_bit_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    fold::type_bit(m.get("x")?).map(Node::Integer)
}

fn constant_args(m: &Match<'_>, _: &Ctx<'_>) -> bool {
    m.call()
        .map_or(false, |b| b.args.iter().all(Node::is_constant))
}

fn make_list_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::List(List::new(m.call()?.args.clone())))
}

fn make_struct_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let b = m.call()?;
    if b.args.len() % 2 != 0 {
        return None;
    }
    let mut fields = Vec::with_capacity(b.args.len() / 2);
    for pair in b.args.chunks_exact(2) {
        if !pair[1].is_constant() {
            return None;
        }
        fields.push(Field::new(pair[0].as_str()?, pair[1].clone()));
    }
    Some(Node::Struct(Struct::new(fields)))
}

fn upper_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::string(m.get("x")?.as_str()?.to_uppercase()))
}

fn lower_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::string(m.get("x")?.as_str()?.to_lowercase()))
}

fn char_length_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let n = m.get("x")?.as_str()?.chars().count();
    i64::try_from(n).ok().map(Node::Integer)
}

fn char_length_of(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::call(B::CharLength, vec![m.take("x")?]))
}

fn char_length_of_concat(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    Some(Node::add(
        Node::call(B::CharLength, vec![m.take("a")?]),
        Node::call(B::CharLength, vec![m.take("b")?]),
    ))
}

fn case_fold_of(node: &Node) -> Option<(BuiltinOp, &Node)> {
    match node {
        Node::Builtin(b) if matches!(b.func, B::Upper | B::Lower) && b.args.len() == 1 => {
            Some((b.func, &b.args[0]))
        }
        _ => None,
    }
}

/// Whether folding with `func` leaves the literal unchanged.
fn fold_invariant(func: BuiltinOp, n: &Node) -> bool {
    n.as_str()
        .map_or(false, |s| case_folded(s, func == B::Upper) == s)
}

// SUBSTRING(UPPER(s), ...) => UPPER(SUBSTRING(s, ...)), and TRIM alike
// as long as the cutset is not affected by the case mapping
fn case_fold_outward(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let b = m.call()?;
    let (first, rest) = b.args.split_first()?;
    let (fold, inner) = case_fold_of(first)?;
    let trims = matches!(b.func, B::Trim | B::Ltrim | B::Rtrim);
    if trims && !rest.iter().all(|cut| fold_invariant(fold, cut)) {
        return None;
    }
    let mut args = vec![inner.clone()];
    args.extend(rest.iter().cloned());
    Some(Node::call(fold, vec![Node::call(b.func, args)]))
}

fn concat_constants(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (a, b) = (m.get("a")?.as_str()?, m.get("b")?.as_str()?);
    Some(Node::string(format!("{}{}", a, b)))
}

fn concat_left_assoc(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let ab = Node::call(B::Concat, vec![m.take("a")?, m.take("b")?]);
    Some(Node::call(B::Concat, vec![ab, m.take("c")?]))
}

fn concat_reassociate(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (a, b) = (m.get("a")?.as_str()?, m.get("b")?.as_str()?);
    Some(Node::call(
        B::Concat,
        vec![m.take("x")?, Node::string(format!("{}{}", a, b))],
    ))
}

// CONCAT(LOWER(a), LOWER(b)) => LOWER(CONCAT(a, b)); a literal operand
// qualifies when the case mapping leaves it unchanged
fn concat_of_case(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (a, b) = (m.get("a")?, m.get("b")?);
    let fold = case_fold_of(a).or_else(|| case_fold_of(b))?.0;
    let unfold = |n: &Node| match case_fold_of(n) {
        Some((f, inner)) if f == fold => Some(inner.clone()),
        Some(_) => None,
        None => fold_invariant(fold, n).then(|| n.clone()),
    };
    let inner = Node::call(B::Concat, vec![unfold(a)?, unfold(b)?]);
    Some(Node::call(fold, vec![inner]))
}

fn contains_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let (a, b) = (m.get("a")?.as_str()?, m.get("b")?.as_str()?);
    Some(Node::Bool(a.contains(b)))
}

// HASH_LOOKUP(x, k0, v0, k1, v1, ... [, default])
fn hash_lookup_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let b = m.call()?;
    let (key, rest) = b.args.split_first()?;
    if !key.is_constant() {
        return None;
    }
    let pairs = rest.chunks_exact(2);
    let default = pairs.remainder().first().cloned();
    for pair in pairs {
        if !pair[0].is_constant() {
            return None;
        }
        if pair[0].equals(key) {
            return Some(pair[1].clone());
        }
    }
    Some(default.unwrap_or(Node::Missing))
}

// aggregates

fn aggregate_of(node: &Node) -> Option<&Aggregate> {
    match node {
        Node::Aggregate(a) => Some(a),
        _ => None,
    }
}

fn with_aggregate(m: &Match<'_>, f: impl FnOnce(&mut Aggregate) -> bool) -> Option<Node> {
    let mut a = aggregate_of(m.node)?.clone();
    f(&mut a).then(|| Node::Aggregate(Box::new(a)))
}

fn aggregate_prune_case(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    let a = aggregate_of(m.node)?;
    if !matches!(
        a.op,
        AggregateOp::Min | AggregateOp::Max | AggregateOp::Sum | AggregateOp::Avg
    ) {
        return None;
    }
    let inner = prune_case(case_of(&a.inner)?, TypeSet::NUMERIC, ctx)?;
    with_aggregate(m, |a| {
        a.inner = inner;
        true
    })
}

fn sum_of_integers(m: &Match<'_>, ctx: &Ctx<'_>) -> Option<Node> {
    with_aggregate(m, |a| {
        let t = ctx.type_of(&a.inner);
        if a.op != AggregateOp::Sum
            || !t.any_of(TypeSet::INTEGER)
            || !t.only(TypeSet::INTEGER | TypeSet::MISSING)
        {
            return false;
        }
        a.op = AggregateOp::SumInt;
        true
    })
}

fn aggregate_filter_never(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let a = aggregate_of(m.node)?;
    match a.filter {
        Some(Node::Null | Node::Missing | Node::Bool(false)) if a.op.is_count() => {
            Some(Node::Integer(0))
        }
        Some(Node::Null | Node::Missing | Node::Bool(false)) => Some(Node::Null),
        _ => None,
    }
}

fn aggregate_filter_always(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_aggregate(m, |a| {
        if !matches!(a.filter, Some(Node::Bool(true))) {
            return false;
        }
        a.filter = None;
        true
    })
}

// COUNT(*) FILTER (WHERE x IS NOT MISSING) => COUNT(x)
fn count_filter_not_missing(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_aggregate(m, |a| {
        let Some(Node::IsKey {
            key: IsNotMissing,
            inner,
        }) = &a.filter
        else {
            return false;
        };
        let counts_same = matches!(a.inner, Node::Star) || equivalent(&a.inner, inner);
        if a.op != AggregateOp::Count || a.over.is_some() || !counts_same {
            return false;
        }
        a.inner = (**inner).clone();
        a.filter = None;
        true
    })
}

// relations

fn join_of(node: &Node) -> Option<&Join> {
    match node {
        Node::Join(j) => Some(j),
        _ => None,
    }
}

fn join_on_true(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let j = join_of(m.node)?;
    if j.kind != JoinKind::Inner || !matches!(j.on, Some(Node::Bool(true))) {
        return None;
    }
    let mut out = j.clone();
    out.kind = JoinKind::Cross;
    out.on = None;
    Some(Node::Join(Box::new(out)))
}

// the right side contributes only MISSING fields
fn left_join_on_false(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    let j = join_of(m.node)?;
    match (&j.kind, &j.on) {
        (JoinKind::Left, Some(Node::Bool(false) | Node::Null | Node::Missing)) => {
            Some(j.left.clone())
        }
        _ => None,
    }
}

fn with_select(m: &Match<'_>, f: impl FnOnce(&mut Select) -> bool) -> Option<Node> {
    let mut s = match m.node {
        Node::Select(s) => (**s).clone(),
        _ => return None,
    };
    f(&mut s).then(|| Node::from(s))
}

fn select_trivial_filter(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_select(m, |s| {
        let mut changed = false;
        for clause in [&mut s.where_, &mut s.having] {
            if matches!(clause, Some(Node::Bool(true))) {
                *clause = None;
                changed = true;
            }
        }
        changed
    })
}

fn order_by_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_select(m, |s| {
        let before = s.order_by.len();
        s.order_by.retain(|o| !o.column.is_constant());
        s.order_by.len() != before
    })
}

// constant DISTINCT ON keys put every row in one group
fn distinct_on_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_select(m, |s| {
        if s.distinct_on.is_empty() || !s.distinct_on.iter().any(Node::is_constant) {
            return false;
        }
        if s.distinct_on.iter().all(Node::is_constant) {
            s.distinct_on.clear();
            s.limit = Some(s.limit.map_or(1, |l| l.min(1)));
        } else {
            s.distinct_on.retain(|n| !n.is_constant());
        }
        true
    })
}

fn distinct_constant_columns(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_select(m, |s| {
        if !s.distinct || s.columns.is_empty() || !s.columns.iter().all(|c| c.expr.is_constant())
        {
            return false;
        }
        s.distinct = false;
        s.limit = Some(s.limit.map_or(1, |l| l.min(1)));
        true
    })
}

fn group_by_constant(m: &Match<'_>, _: &Ctx<'_>) -> Option<Node> {
    with_select(m, |s| {
        let before = s.group_by.len();
        s.group_by.retain(|b| !b.expr.is_constant());
        s.group_by.len() != before
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::hint::{NoHint, PathHint};

    fn ctx(hint: &dyn crate::expression::hint::Hint, logic: bool) -> Ctx<'_> {
        Ctx { hint, logic }
    }

    fn fire(node: &Node) -> Option<(&'static str, Node)> {
        apply(node, &ctx(&NoHint, false)).map(|(r, n)| (r.name, n))
    }

    #[test]
    fn test_rule_names_unique() {
        let mut names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        names.sort_unstable();
        let total = names.len();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_first_rule_wins() {
        // a MISSING operand is handled before constant folding
        let n = Node::compare(Lt, Node::Missing, Node::Integer(1));
        assert_eq!(fire(&n), Some(("compare-absent", Node::Missing)));

        let n = Node::compare(Lt, Node::Integer(2), Node::Integer(1));
        assert_eq!(fire(&n), Some(("compare-constants", Node::Bool(false))));
    }

    #[test]
    fn test_nothing_to_do() {
        assert!(fire(&Node::ident("x")).is_none());
        assert!(fire(&Node::Integer(1)).is_none());
        let n = Node::compare(Eq, Node::ident("x"), Node::Integer(1));
        assert!(fire(&n).is_none());
    }

    #[test]
    fn test_prune_case() {
        let c = Case::new(
            vec![CaseLimb {
                when: Node::ident("b"),
                then: Node::string("s"),
            }],
            Some(Node::Integer(1)),
        );
        let pruned = prune_case(&c, TypeSet::NUMERIC, &ctx(&NoHint, false)).unwrap();
        let expected = Node::case(
            vec![(Node::ident("b"), Node::Missing)],
            Some(Node::Integer(1)),
        );
        assert_eq!(pruned, expected);
        let Node::Case(again) = pruned else {
            panic!("expected a CASE");
        };
        assert!(prune_case(&again, TypeSet::NUMERIC, &ctx(&NoHint, false)).is_none());
    }

    #[test]
    fn test_push_into_case() {
        let c = Case::new(
            vec![CaseLimb {
                when: Node::ident("b"),
                then: Node::Integer(1),
            }],
            None,
        );
        let pushed = push_into_case(&c, |n| Node::is(n, IsNull));
        let expected = Node::case(
            vec![(Node::ident("b"), Node::is(Node::Integer(1), IsNull))],
            Some(Node::is(Node::Null, IsNull)),
        );
        assert_eq!(pushed, expected);
    }

    #[test]
    fn test_hash_lookup_needs_distinct_keys() {
        let x = Node::ident("x");
        let n = Node::case(
            vec![
                (Node::compare(Eq, x.clone(), Node::Integer(1)), Node::Integer(10)),
                (Node::compare(Eq, x, Node::Float(1.0)), Node::Integer(20)),
            ],
            Some(Node::Missing),
        );
        assert!(fire(&n).is_none());
    }

    #[test]
    fn test_hash_lookup_folds() {
        let n = Node::call(
            B::HashLookup,
            vec![
                Node::Integer(2),
                Node::Integer(1),
                Node::string("a"),
                Node::Integer(2),
                Node::string("b"),
            ],
        );
        assert_eq!(fire(&n).map(|(_, n)| n), Some(Node::string("b")));

        let n = Node::call(
            B::HashLookup,
            vec![Node::Integer(3), Node::Integer(1), Node::string("a"), Node::Null],
        );
        assert_eq!(fire(&n).map(|(_, n)| n), Some(Node::Null));
    }

    #[test]
    fn test_logic_only_rules() {
        let n = Node::Null;
        assert!(fire(&n).is_none());
        let out = apply(&n, &ctx(&NoHint, true)).map(|(r, n)| (r.name, n));
        assert_eq!(out, Some(("logic-never-true", Node::Bool(false))));

        let b = PathHint::new().with_type(Node::ident("b"), TypeSet::BOOL);
        let n = Node::compare(Lt, Node::ident("b"), Node::Bool(true));
        let out = apply(&n, &ctx(&b, true)).map(|(_, n)| n);
        assert_eq!(out, Some(Node::Bool(false)));
    }

    #[test]
    fn test_upper_mismatch_needs_evidence() {
        let upper = Node::call(B::Upper, vec![Node::ident("s")]);
        let n = Node::compare(Ne, upper, Node::string("abc"));
        // s may not be a string, in which case the comparison is MISSING
        assert!(fire(&n).is_none());
    }

    #[test]
    fn test_distinct_constant_columns() {
        let mut s = Select::new(
            vec![crate::expression::relation::Binding::new(Node::Integer(1))],
            None,
        );
        s.distinct = true;
        s.limit = Some(10);
        let (name, out) = fire(&Node::from(s)).unwrap();
        assert_eq!(name, "distinct-constant-columns");
        let Node::Select(out) = out else {
            panic!("expected a select");
        };
        assert!(!out.distinct);
        assert_eq!(out.limit, Some(1));
    }
}
