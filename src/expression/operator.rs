//! Operator definitions for expressions.
//!
//! Every operator enum carries a stable numeric code used by the binary
//! encoding; `from_code` rejects codes outside the enumeration.

use std::fmt;

macro_rules! coded_enum {
    ($name:ident { $($variant:ident = $code:literal),+ $(,)? }) => {
        impl $name {
            pub fn code(&self) -> u64 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            pub fn from_code(code: u64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Legacy `LIKE`; rewritten into a string match once the pattern is a literal
    Like,
    Ilike,
}

coded_enum!(CmpOp { Eq = 0, Ne = 1, Lt = 2, Le = 3, Gt = 4, Ge = 5, Like = 6, Ilike = 7 });

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "<>",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Like => "LIKE",
            CmpOp::Ilike => "ILIKE",
        }
    }

    /// Whether the operator imposes an ordering on its operands.
    pub fn ordinal(&self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Le | CmpOp::Gt | CmpOp::Ge)
    }

    /// The operator that yields the same result with the operands swapped.
    pub fn flip(&self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            other => *other,
        }
    }

    /// The logical negation of the operator, if it has one.
    pub fn invert(&self) -> Option<CmpOp> {
        match self {
            CmpOp::Eq => Some(CmpOp::Ne),
            CmpOp::Ne => Some(CmpOp::Eq),
            CmpOp::Lt => Some(CmpOp::Ge),
            CmpOp::Le => Some(CmpOp::Gt),
            CmpOp::Gt => Some(CmpOp::Le),
            CmpOp::Ge => Some(CmpOp::Lt),
            CmpOp::Like | CmpOp::Ilike => None,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    /// Logical equivalence, rendered as `=`
    Xnor,
    /// Logical inequivalence, rendered as `<>`
    Xor,
}

coded_enum!(LogicalOp { And = 0, Or = 1, Xnor = 2, Xor = 3 });

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
            LogicalOp::Xnor => "=",
            LogicalOp::Xor => "<>",
        }
    }

    pub fn apply(&self, a: bool, b: bool) -> bool {
        match self {
            LogicalOp::And => a && b,
            LogicalOp::Or => a || b,
            LogicalOp::Xnor => a == b,
            LogicalOp::Xor => a != b,
        }
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
    ShiftLeft,
    ShiftRightArithmetic,
    ShiftRightLogical,
}

coded_enum!(ArithOp {
    Add = 0,
    Sub = 1,
    Mul = 2,
    Div = 3,
    Mod = 4,
    BitAnd = 5,
    BitOr = 6,
    BitXor = 7,
    ShiftLeft = 8,
    ShiftRightArithmetic = 9,
    ShiftRightLogical = 10,
});

impl ArithOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Mod => "%",
            ArithOp::BitAnd => "&",
            ArithOp::BitOr => "|",
            ArithOp::BitXor => "^",
            ArithOp::ShiftLeft => "<<",
            ArithOp::ShiftRightArithmetic => ">>",
            ArithOp::ShiftRightLogical => ">>>",
        }
    }

    /// Bitwise operators work on 64-bit integers only.
    pub fn is_bitwise(&self) -> bool {
        matches!(
            self,
            ArithOp::BitAnd
                | ArithOp::BitOr
                | ArithOp::BitXor
                | ArithOp::ShiftLeft
                | ArithOp::ShiftRightArithmetic
                | ArithOp::ShiftRightLogical
        )
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unary arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryArithOp {
    Neg,
    BitNot,
}

coded_enum!(UnaryArithOp { Neg = 0, BitNot = 1 });

impl UnaryArithOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnaryArithOp::Neg => "-",
            UnaryArithOp::BitNot => "~",
        }
    }
}

/// Pattern-matching operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StringMatchOp {
    Like,
    Ilike,
    SimilarTo,
    RegexpMatch,
    RegexpMatchCi,
}

coded_enum!(StringMatchOp {
    Like = 0,
    Ilike = 1,
    SimilarTo = 2,
    RegexpMatch = 3,
    RegexpMatchCi = 4,
});

impl StringMatchOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            StringMatchOp::Like => "LIKE",
            StringMatchOp::Ilike => "ILIKE",
            StringMatchOp::SimilarTo => "SIMILAR TO",
            StringMatchOp::RegexpMatch => "~",
            StringMatchOp::RegexpMatchCi => "~*",
        }
    }

    pub fn is_like(&self) -> bool {
        matches!(self, StringMatchOp::Like | StringMatchOp::Ilike)
    }

    pub fn is_regexp(&self) -> bool {
        matches!(self, StringMatchOp::RegexpMatch | StringMatchOp::RegexpMatchCi)
    }
}

/// Keywords of `x IS <keyword>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IsKeyword {
    IsNull,
    IsNotNull,
    IsMissing,
    IsNotMissing,
    IsTrue,
    IsFalse,
    IsNotTrue,
    IsNotFalse,
}

coded_enum!(IsKeyword {
    IsNull = 0,
    IsNotNull = 1,
    IsMissing = 2,
    IsNotMissing = 3,
    IsTrue = 4,
    IsFalse = 5,
    IsNotTrue = 6,
    IsNotFalse = 7,
});

impl IsKeyword {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsKeyword::IsNull => "IS NULL",
            IsKeyword::IsNotNull => "IS NOT NULL",
            IsKeyword::IsMissing => "IS MISSING",
            IsKeyword::IsNotMissing => "IS NOT MISSING",
            IsKeyword::IsTrue => "IS TRUE",
            IsKeyword::IsFalse => "IS FALSE",
            IsKeyword::IsNotTrue => "IS NOT TRUE",
            IsKeyword::IsNotFalse => "IS NOT FALSE",
        }
    }

    pub fn invert(&self) -> IsKeyword {
        match self {
            IsKeyword::IsNull => IsKeyword::IsNotNull,
            IsKeyword::IsNotNull => IsKeyword::IsNull,
            IsKeyword::IsMissing => IsKeyword::IsNotMissing,
            IsKeyword::IsNotMissing => IsKeyword::IsMissing,
            IsKeyword::IsTrue => IsKeyword::IsNotTrue,
            IsKeyword::IsFalse => IsKeyword::IsNotFalse,
            IsKeyword::IsNotTrue => IsKeyword::IsTrue,
            IsKeyword::IsNotFalse => IsKeyword::IsFalse,
        }
    }
}

/// Join kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

coded_enum!(JoinKind { Inner = 1, Left = 2, Right = 3, Full = 4, Cross = 5 });

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Right => "RIGHT JOIN",
            JoinKind::Full => "FULL JOIN",
            JoinKind::Cross => "CROSS JOIN",
        }
    }
}

/// UNION flavours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnionType {
    Distinct,
    All,
}

coded_enum!(UnionType { Distinct = 0, All = 1 });

impl UnionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnionType::Distinct => "UNION",
            UnionType::All => "UNION ALL",
        }
    }
}

/// Default precision of APPROX_COUNT_DISTINCT.
pub const APPROX_COUNT_DISTINCT_DEFAULT_PRECISION: u8 = 11;

/// Aggregate operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    CountDistinct,
    /// SUM over values known to be integers
    SumInt,
    /// SUM of partial COUNTs
    SumCount,
    BitAnd,
    BitOr,
    BitXor,
    BoolAnd,
    BoolOr,
    Earliest,
    Latest,
    ApproxCountDistinct,
}

coded_enum!(AggregateOp {
    Count = 1,
    Sum = 2,
    Avg = 3,
    Min = 4,
    Max = 5,
    CountDistinct = 6,
    SumInt = 7,
    SumCount = 8,
    BitAnd = 9,
    BitOr = 10,
    BitXor = 11,
    BoolAnd = 12,
    BoolOr = 13,
    Earliest = 14,
    Latest = 15,
    ApproxCountDistinct = 16,
});

impl AggregateOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateOp::Count => "COUNT",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::CountDistinct => "COUNT DISTINCT",
            AggregateOp::SumInt => "SUM_INT",
            AggregateOp::SumCount => "SUM_COUNT",
            AggregateOp::BitAnd => "BIT_AND",
            AggregateOp::BitOr => "BIT_OR",
            AggregateOp::BitXor => "BIT_XOR",
            AggregateOp::BoolAnd => "BOOL_AND",
            AggregateOp::BoolOr => "BOOL_OR",
            AggregateOp::Earliest => "EARLIEST",
            AggregateOp::Latest => "LATEST",
            AggregateOp::ApproxCountDistinct => "APPROX_COUNT_DISTINCT",
        }
    }

    /// Whether the op yields a count, i.e. zero rather than NULL for no input.
    pub fn is_count(&self) -> bool {
        matches!(
            self,
            AggregateOp::Count
                | AggregateOp::CountDistinct
                | AggregateOp::SumCount
                | AggregateOp::ApproxCountDistinct
        )
    }
}

/// EXPLAIN output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExplainFormat {
    #[default]
    None,
    Default,
    Text,
    List,
    Graphviz,
}

coded_enum!(ExplainFormat { None = 0, Default = 1, Text = 2, List = 3, Graphviz = 4 });

impl ExplainFormat {
    /// The statement prefix, empty when there is no EXPLAIN.
    pub fn prefix(&self) -> &'static str {
        match self {
            ExplainFormat::None => "",
            ExplainFormat::Default => "EXPLAIN ",
            ExplainFormat::Text => "EXPLAIN AS text ",
            ExplainFormat::List => "EXPLAIN AS list ",
            ExplainFormat::Graphviz => "EXPLAIN AS graphviz ",
        }
    }
}
