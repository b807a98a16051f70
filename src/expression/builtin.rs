//! Builtin function identifiers and their static properties.

use std::fmt;

use crate::expression::types::TypeSet;

/// Builtin function identifiers.
///
/// `Unspecified` stands for a function name that was not recognised;
/// the original spelling is kept on the call node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinOp {
    Concat,
    Trim,
    Ltrim,
    Rtrim,
    Upper,
    Lower,
    Contains,
    ContainsCi,
    EqualsCi,
    CharLength,
    Substring,
    SplitPart,
    BitCount,
    Abs,
    Sign,
    Round,
    RoundEven,
    Trunc,
    Floor,
    Ceil,
    Sqrt,
    Exp,
    Ln,
    Log2,
    Log10,
    Pow,
    Least,
    Greatest,
    ObjectSize,
    HashLookup,
    InSubquery,
    MakeList,
    MakeStruct,
    TypeBit,
    TableGlob,
    TablePattern,
    Unspecified,
}

/// How the arguments of a builtin are validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgCheck {
    /// Exactly one argument per entry, each intersecting the given type.
    Fixed(&'static [TypeSet]),
    /// Any number of arguments, each intersecting the given type.
    Variadic(TypeSet),
    /// `[LR]TRIM(str [, cutset])` with a short ASCII literal cutset.
    Trim,
    /// `CONTAINS(str, 'literal')`
    Contains,
    /// `SUBSTRING(str, start [, len])`
    Substring,
    /// `SPLIT_PART(str, 'c', n)`
    SplitPart,
    /// `SIZE(path|list|struct)`
    ObjectSize,
    /// `IN_SUBQUERY(x, (SELECT ...))`
    InSubquery,
    /// `HASH_LOOKUP(x, k0, v0, ... [, default])`
    HashLookup,
    /// A single path argument naming a table.
    TablePath,
}

/// Static information about a builtin.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinInfo {
    pub check: Option<ArgCheck>,
    /// Return type of the call
    pub ret: TypeSet,
    /// Private builtins are produced by rewrites only, never by user input.
    pub private: bool,
    /// Table builtins are only legal in FROM position.
    pub is_table: bool,
}

const STRING_OR_MISSING: TypeSet = TypeSet(TypeSet::STRING.0 | TypeSet::MISSING.0);
const FLOAT_OR_MISSING: TypeSet = TypeSet(TypeSet::FLOAT.0 | TypeSet::MISSING.0);
const NUMERIC_OR_MISSING: TypeSet = TypeSet(TypeSet::NUMERIC.0 | TypeSet::MISSING.0);

const ONE_STRING: &[TypeSet] = &[TypeSet::STRING];
const TWO_STRINGS: &[TypeSet] = &[TypeSet::STRING, TypeSet::STRING];
const ONE_NUMBER: &[TypeSet] = &[TypeSet::NUMERIC];
const TWO_NUMBERS: &[TypeSet] = &[TypeSet::NUMERIC, TypeSet::NUMERIC];
const ANYTHING: &[TypeSet] = &[TypeSet::ANY];

const fn info(check: Option<ArgCheck>, ret: TypeSet) -> BuiltinInfo {
    BuiltinInfo {
        check,
        ret,
        private: false,
        is_table: false,
    }
}

const fn private(check: Option<ArgCheck>, ret: TypeSet) -> BuiltinInfo {
    BuiltinInfo {
        check,
        ret,
        private: true,
        is_table: false,
    }
}

const fn table(check: ArgCheck) -> BuiltinInfo {
    BuiltinInfo {
        check: Some(check),
        ret: TypeSet::ANY,
        private: false,
        is_table: true,
    }
}

const NUMERIC_FLOAT: BuiltinInfo = info(Some(ArgCheck::Fixed(ONE_NUMBER)), FLOAT_OR_MISSING);

impl BuiltinOp {
    pub const ALL: [BuiltinOp; 36] = [
        BuiltinOp::Concat,
        BuiltinOp::Trim,
        BuiltinOp::Ltrim,
        BuiltinOp::Rtrim,
        BuiltinOp::Upper,
        BuiltinOp::Lower,
        BuiltinOp::Contains,
        BuiltinOp::ContainsCi,
        BuiltinOp::EqualsCi,
        BuiltinOp::CharLength,
        BuiltinOp::Substring,
        BuiltinOp::SplitPart,
        BuiltinOp::BitCount,
        BuiltinOp::Abs,
        BuiltinOp::Sign,
        BuiltinOp::Round,
        BuiltinOp::RoundEven,
        BuiltinOp::Trunc,
        BuiltinOp::Floor,
        BuiltinOp::Ceil,
        BuiltinOp::Sqrt,
        BuiltinOp::Exp,
        BuiltinOp::Ln,
        BuiltinOp::Log2,
        BuiltinOp::Log10,
        BuiltinOp::Pow,
        BuiltinOp::Least,
        BuiltinOp::Greatest,
        BuiltinOp::ObjectSize,
        BuiltinOp::HashLookup,
        BuiltinOp::InSubquery,
        BuiltinOp::MakeList,
        BuiltinOp::MakeStruct,
        BuiltinOp::TypeBit,
        BuiltinOp::TableGlob,
        BuiltinOp::TablePattern,
    ];

    /// The canonical SQL name.
    pub fn name(&self) -> &'static str {
        match self {
            BuiltinOp::Concat => "CONCAT",
            BuiltinOp::Trim => "TRIM",
            BuiltinOp::Ltrim => "LTRIM",
            BuiltinOp::Rtrim => "RTRIM",
            BuiltinOp::Upper => "UPPER",
            BuiltinOp::Lower => "LOWER",
            BuiltinOp::Contains => "CONTAINS",
            BuiltinOp::ContainsCi => "CONTAINS_CI",
            BuiltinOp::EqualsCi => "EQUALS_CI",
            BuiltinOp::CharLength => "CHAR_LENGTH",
            BuiltinOp::Substring => "SUBSTRING",
            BuiltinOp::SplitPart => "SPLIT_PART",
            BuiltinOp::BitCount => "BIT_COUNT",
            BuiltinOp::Abs => "ABS",
            BuiltinOp::Sign => "SIGN",
            BuiltinOp::Round => "ROUND",
            BuiltinOp::RoundEven => "ROUND_EVEN",
            BuiltinOp::Trunc => "TRUNC",
            BuiltinOp::Floor => "FLOOR",
            BuiltinOp::Ceil => "CEIL",
            BuiltinOp::Sqrt => "SQRT",
            BuiltinOp::Exp => "EXP",
            BuiltinOp::Ln => "LN",
            BuiltinOp::Log2 => "LOG2",
            BuiltinOp::Log10 => "LOG10",
            BuiltinOp::Pow => "POW",
            BuiltinOp::Least => "LEAST",
            BuiltinOp::Greatest => "GREATEST",
            BuiltinOp::ObjectSize => "SIZE",
            BuiltinOp::HashLookup => "HASH_LOOKUP",
            BuiltinOp::InSubquery => "IN_SUBQUERY",
            BuiltinOp::MakeList => "MAKE_LIST",
            BuiltinOp::MakeStruct => "MAKE_STRUCT",
            BuiltinOp::TypeBit => "TYPE_BIT",
            BuiltinOp::TableGlob => "TABLE_GLOB",
            BuiltinOp::TablePattern => "TABLE_PATTERN",
            BuiltinOp::Unspecified => "UNKNOWN",
        }
    }

    /// Static information; `None` for `Unspecified`.
    pub fn info(&self) -> Option<BuiltinInfo> {
        use ArgCheck::*;
        let bi = match self {
            BuiltinOp::Concat => private(Some(Fixed(TWO_STRINGS)), STRING_OR_MISSING),
            BuiltinOp::Trim | BuiltinOp::Ltrim | BuiltinOp::Rtrim => {
                info(Some(Trim), STRING_OR_MISSING)
            }
            BuiltinOp::Upper | BuiltinOp::Lower => {
                info(Some(Fixed(ONE_STRING)), STRING_OR_MISSING)
            }
            BuiltinOp::Contains | BuiltinOp::ContainsCi => {
                private(Some(Contains), TypeSet::LOGICAL)
            }
            BuiltinOp::EqualsCi => info(None, TypeSet::LOGICAL),
            BuiltinOp::CharLength => info(
                Some(Fixed(ONE_STRING)),
                TypeSet(TypeSet::UNSIGNED.0 | TypeSet::MISSING.0),
            ),
            BuiltinOp::Substring => info(Some(Substring), STRING_OR_MISSING),
            BuiltinOp::SplitPart => info(Some(SplitPart), STRING_OR_MISSING),
            BuiltinOp::BitCount => info(
                Some(Fixed(ONE_NUMBER)),
                TypeSet(TypeSet::INTEGER.0 | TypeSet::MISSING.0),
            ),
            BuiltinOp::Abs | BuiltinOp::Sign => info(Some(Fixed(ONE_NUMBER)), TypeSet::NUMERIC),
            BuiltinOp::Round
            | BuiltinOp::RoundEven
            | BuiltinOp::Trunc
            | BuiltinOp::Floor
            | BuiltinOp::Ceil
            | BuiltinOp::Sqrt
            | BuiltinOp::Exp
            | BuiltinOp::Ln
            | BuiltinOp::Log2
            | BuiltinOp::Log10 => NUMERIC_FLOAT,
            BuiltinOp::Pow => info(Some(Fixed(TWO_NUMBERS)), FLOAT_OR_MISSING),
            BuiltinOp::Least | BuiltinOp::Greatest => {
                info(Some(Variadic(TypeSet::NUMERIC)), NUMERIC_OR_MISSING)
            }
            BuiltinOp::ObjectSize => info(Some(ObjectSize), NUMERIC_OR_MISSING),
            BuiltinOp::HashLookup => private(Some(HashLookup), TypeSet::ANY),
            BuiltinOp::InSubquery => private(Some(InSubquery), TypeSet::LOGICAL),
            BuiltinOp::MakeList => private(None, TypeSet::LIST),
            BuiltinOp::MakeStruct => private(None, TypeSet::STRUCT),
            BuiltinOp::TypeBit => info(Some(Fixed(ANYTHING)), TypeSet::UNSIGNED),
            BuiltinOp::TableGlob | BuiltinOp::TablePattern => table(TablePath),
            BuiltinOp::Unspecified => return None,
        };
        Some(bi)
    }

    /// Unrecognised builtins are treated as table-producing.
    pub fn is_table(&self) -> bool {
        self.info().map_or(true, |i| i.is_table)
    }

    pub fn is_private(&self) -> bool {
        self.info().map_or(false, |i| i.private)
    }
}

impl fmt::Display for BuiltinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
