//! Expression trees for a SQL-like query engine.
//!
//! This module provides:
//! - The node model for scalar and relational expressions
//! - Static typing against a caller-supplied hint, and the semantic checker
//! - A rule-based simplifier that folds constants to a fixpoint
//! - A tagged binary encoding, plain and redacted text rendering

pub mod builtin;
pub mod codec;
pub mod error;
pub mod hint;
pub mod literal;
pub mod node;
pub mod operator;
pub mod rational;
pub mod registry;
pub mod relation;
pub mod simplify;
pub mod text;
pub mod type_checker;
pub mod types;

pub use builtin::BuiltinOp;
pub use codec::{decode, decode_any, decode_query, encode, encode_query, Decoded};
pub use error::{CheckError, CheckResult, DecodeError, DecodeResult, EncodeError, EncodeResult};
pub use hint::{type_of, FiniteSet, Hint, HintFn, NoHint, PathHint, Relation};
pub use literal::{Field, List, Struct, Timestamp};
pub use node::{equivalent, rewrite, walk, Case, CaseLimb, Node, NodeKind, Visitor};
pub use operator::{
    AggregateOp, ArithOp, CmpOp, ExplainFormat, IsKeyword, JoinKind, LogicalOp, StringMatchOp,
    UnaryArithOp, UnionType,
};
pub use rational::Rational;
pub use relation::{Aggregate, Binding, CteBinding, Join, Order, Query, Select, Table, Window};
pub use simplify::{simplify, simplify_logic, simplify_query};
pub use text::redacted;
pub use type_checker::{check, check_hint, check_query};
pub use types::TypeSet;
