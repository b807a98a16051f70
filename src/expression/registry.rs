//! Process-wide, read-mostly configuration.
//!
//! The keyword table and builtin name table are static. [`Config`] is
//! set once at start-up with [`configure`] and read by the simplifier
//! and the redacting renderer.

use parking_lot::RwLock;

use crate::expression::builtin::BuiltinOp;

/// Words that must be quoted when used as identifiers.
const KEYWORDS: &[&str] = &[
    "ALL", "AND", "AS", "ASC", "AVG", "BETWEEN", "BIT_AND", "BIT_OR", "BIT_XOR", "BY", "CASE",
    "CAST", "COALESCE", "CONCAT", "COUNT", "CROSS", "DATE_ADD", "DATE_DIFF", "DATE_TRUNC", "DESC",
    "DISTINCT", "EARLIEST", "ELSE", "END", "EXISTS", "EXTRACT", "FALSE", "FIRST", "FROM", "GROUP",
    "HAVING", "ILIKE", "IN", "INNER", "INTO", "IS", "JOIN", "LAST", "LATEST", "LEFT", "LIKE",
    "LIMIT", "MAX", "MIN", "MISSING", "NOT", "NULL", "NULLIF", "NULLS", "OFFSET", "ON", "OR",
    "ORDER", "RIGHT", "SELECT", "SUM", "THEN", "TRUE", "UNION", "UTCNOW", "VALUE", "WHEN",
    "WHERE", "WITH",
];

/// Whether `s` matches a keyword, ignoring ASCII case.
pub fn is_keyword(s: &str) -> bool {
    KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(s))
}

/// Alternative spellings accepted for builtins.
const ALIASES: &[(&str, BuiltinOp)] = &[
    ("CHARACTER_LENGTH", BuiltinOp::CharLength),
    ("CEILING", BuiltinOp::Ceil),
    ("POWER", BuiltinOp::Pow),
];

/// Resolve a function name to a builtin, ignoring ASCII case.
/// Unknown names resolve to [`BuiltinOp::Unspecified`].
pub fn lookup_builtin(name: &str) -> BuiltinOp {
    BuiltinOp::ALL
        .iter()
        .copied()
        .find(|op| op.name().eq_ignore_ascii_case(name))
        .or_else(|| {
            ALIASES
                .iter()
                .find(|(alias, _)| alias.eq_ignore_ascii_case(name))
                .map(|(_, op)| *op)
        })
        .unwrap_or(BuiltinOp::Unspecified)
}

/// Tunables shared by every tree processed in this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Rewrites allowed at a single position before the simplifier gives up.
    pub max_rule_applications: usize,
    /// Whole-tree simplification passes before the simplifier gives up.
    pub max_passes: usize,
    /// Seed mixed into every redacted literal.
    pub redaction_key: u64,
}

impl Config {
    pub const fn new() -> Self {
        Self {
            max_rule_applications: 64,
            max_passes: 32,
            redaction_key: 0,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

static CONFIG: RwLock<Config> = parking_lot::const_rwlock(Config::new());

/// Replace the process-wide configuration.
pub fn configure(config: Config) {
    log::debug!("expression config: {:?}", config);
    *CONFIG.write() = config;
}

/// A copy of the process-wide configuration.
pub fn config() -> Config {
    *CONFIG.read()
}
