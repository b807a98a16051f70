//! The type lattice used for static typing of expressions.
//!
//! A [`TypeSet`] is a bitmask over primitive value kinds. Bit `n` (for `n < 15`)
//! corresponds to the binary datum kind with the same index, and bit 15 is
//! reserved for MISSING.

use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Not};

/// Primitive value kinds, numbered by their bit position in a [`TypeSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Kind {
    Null = 0,
    Bool = 1,
    Uint = 2,
    Int = 3,
    Float = 4,
    Decimal = 5,
    Timestamp = 6,
    Symbol = 7,
    String = 8,
    Clob = 9,
    Blob = 10,
    List = 11,
    Sexp = 12,
    Struct = 13,
    Annotation = 14,
}

impl Kind {
    const ALL: [Kind; 15] = [
        Kind::Null,
        Kind::Bool,
        Kind::Uint,
        Kind::Int,
        Kind::Float,
        Kind::Decimal,
        Kind::Timestamp,
        Kind::Symbol,
        Kind::String,
        Kind::Clob,
        Kind::Blob,
        Kind::List,
        Kind::Sexp,
        Kind::Struct,
        Kind::Annotation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Uint => "uint",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Decimal => "decimal",
            Kind::Timestamp => "timestamp",
            Kind::Symbol => "symbol",
            Kind::String => "string",
            Kind::Clob => "clob",
            Kind::Blob => "blob",
            Kind::List => "list",
            Kind::Sexp => "sexp",
            Kind::Struct => "struct",
            Kind::Annotation => "annotation",
        }
    }
}

/// A set of runtime types a value may have.
///
/// Type sets over-approximate: an expression typed `INTEGER | MISSING`
/// never evaluates to a string, but it is not guaranteed to ever
/// evaluate to MISSING.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeSet(pub u16);

impl TypeSet {
    pub const EMPTY: TypeSet = TypeSet(0);
    /// Every type, including MISSING.
    pub const ANY: TypeSet = TypeSet(0xffff);
    pub const MISSING: TypeSet = TypeSet(1 << 15);
    pub const NULL: TypeSet = TypeSet::of(Kind::Null);
    pub const BOOL: TypeSet = TypeSet::of(Kind::Bool);
    /// Return type of logical operations.
    pub const LOGICAL: TypeSet = TypeSet(TypeSet::BOOL.0 | TypeSet::MISSING.0);
    pub const UNSIGNED: TypeSet = TypeSet::of(Kind::Uint);
    pub const INTEGER: TypeSet = TypeSet(TypeSet::UNSIGNED.0 | TypeSet::of(Kind::Int).0);
    pub const FLOAT: TypeSet = TypeSet::of(Kind::Float);
    pub const NUMERIC: TypeSet = TypeSet(TypeSet::INTEGER.0 | TypeSet::FLOAT.0);
    pub const DECIMAL: TypeSet = TypeSet::of(Kind::Decimal);
    pub const TIME: TypeSet = TypeSet::of(Kind::Timestamp);
    pub const SYMBOL: TypeSet = TypeSet::of(Kind::Symbol);
    pub const STRING: TypeSet = TypeSet::of(Kind::String);
    pub const LIST: TypeSet = TypeSet::of(Kind::List);
    pub const STRUCT: TypeSet = TypeSet::of(Kind::Struct);

    pub const fn of(kind: Kind) -> TypeSet {
        TypeSet(1 << (kind as u16))
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every type in `self` is also in `set`.
    pub const fn only(self, set: TypeSet) -> bool {
        self.0 & !set.0 == 0
    }

    /// Whether `self` and `set` share at least one type.
    pub const fn any_of(self, set: TypeSet) -> bool {
        self.0 & set.0 != 0
    }

    /// `self` with every type in `set` removed.
    pub const fn without(self, set: TypeSet) -> TypeSet {
        TypeSet(self.0 & !set.0)
    }

    /// Whether values of the two sets can be compared under
    /// ordinary typing rules. MISSING never counts as an overlap.
    pub const fn comparable(self, other: TypeSet) -> bool {
        (self.0 & other.0) & !TypeSet::MISSING.0 != 0
    }

    pub const fn contains(self, kind: Kind) -> bool {
        self.0 & TypeSet::of(kind).0 != 0
    }

    pub const fn maybe_missing(self) -> bool {
        self.0 & TypeSet::MISSING.0 != 0
    }

    /// Whether the set includes BOOL, i.e. whether it makes sense
    /// to use a value of this type in a logical expression.
    pub const fn logical(self) -> bool {
        self.contains(Kind::Bool)
    }
}

impl BitOr for TypeSet {
    type Output = TypeSet;

    fn bitor(self, rhs: TypeSet) -> TypeSet {
        TypeSet(self.0 | rhs.0)
    }
}

impl BitOrAssign for TypeSet {
    fn bitor_assign(&mut self, rhs: TypeSet) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for TypeSet {
    type Output = TypeSet;

    fn bitand(self, rhs: TypeSet) -> TypeSet {
        TypeSet(self.0 & rhs.0)
    }
}

impl BitAndAssign for TypeSet {
    fn bitand_assign(&mut self, rhs: TypeSet) {
        self.0 &= rhs.0;
    }
}

impl Not for TypeSet {
    type Output = TypeSet;

    fn not(self) -> TypeSet {
        TypeSet(!self.0)
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        let names = Kind::ALL
            .iter()
            .filter(|k| self.contains(**k))
            .map(|k| k.as_str())
            .chain(self.maybe_missing().then_some("MISSING"));
        for name in names {
            if !first {
                f.write_str("|")?;
            }
            f.write_str(name)?;
            first = false;
        }
        Ok(())
    }
}

impl fmt::Debug for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSet({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lattice_constants() {
        assert_eq!(TypeSet::INTEGER.bits(), 0b1100);
        assert!(TypeSet::INTEGER.only(TypeSet::NUMERIC));
        assert!(!TypeSet::NUMERIC.only(TypeSet::INTEGER));
        assert!(TypeSet::LOGICAL.maybe_missing());
        assert!(TypeSet::LOGICAL.logical());
        assert!(!TypeSet::STRING.logical());
        assert!(TypeSet::ANY.only(TypeSet::ANY));
        assert!(TypeSet::EMPTY.only(TypeSet::BOOL));
    }

    #[test]
    fn test_set_operations() {
        let t = TypeSet::STRING | TypeSet::MISSING;
        assert!(t.any_of(TypeSet::STRING));
        assert!(!t.any_of(TypeSet::NUMERIC));
        assert_eq!(t & TypeSet::STRING, TypeSet::STRING);
        assert_eq!(t.without(TypeSet::MISSING), TypeSet::STRING);
        assert_eq!(!TypeSet::MISSING & TypeSet::ANY, TypeSet(0x7fff));
    }

    #[test]
    fn test_comparable_ignores_missing() {
        let a = TypeSet::STRING | TypeSet::MISSING;
        let b = TypeSet::NUMERIC | TypeSet::MISSING;
        assert!(!a.comparable(b));
        assert!(a.comparable(TypeSet::STRING));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeSet::NUMERIC.to_string(), "uint|int|float");
        assert_eq!(
            (TypeSet::STRING | TypeSet::MISSING).to_string(),
            "string|MISSING"
        );
        assert_eq!(TypeSet::MISSING.to_string(), "MISSING");
        assert_eq!(TypeSet::EMPTY.to_string(), "");
    }
}
