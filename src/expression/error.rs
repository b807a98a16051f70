//! Error types for checking and decoding expressions.

use thiserror::Error;

use crate::expression::node::Node;

/// Errors reported by the checker.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CheckError {
    /// The operand types can never satisfy the operator.
    #[error("\"{text}\" is ill-typed: {reason}")]
    Type { text: String, reason: String },

    /// The shape of the node is illegal regardless of types.
    #[error("{}", syntax_message(.text, .message))]
    Syntax {
        text: Option<String>,
        message: String,
    },

    /// The first of several independent errors.
    #[error("{first} and {others} other errors")]
    Combined { first: Box<CheckError>, others: usize },
}

fn syntax_message(text: &Option<String>, message: &str) -> String {
    match text {
        Some(t) => format!("\"{}\" {}", t, message),
        None => message.to_string(),
    }
}

impl CheckError {
    /// Create a type error attached to `node`
    pub fn type_error(node: &Node, reason: impl Into<String>) -> Self {
        CheckError::Type {
            text: node.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a syntax error attached to `node`
    pub fn syntax(node: &Node, message: impl Into<String>) -> Self {
        CheckError::Syntax {
            text: Some(node.to_string()),
            message: message.into(),
        }
    }

    /// Create a syntax error with no node attached
    pub fn bare_syntax(message: impl Into<String>) -> Self {
        CheckError::Syntax {
            text: None,
            message: message.into(),
        }
    }

    /// Combine errors into one: the first error plus a count of the rest.
    pub fn combine(mut errors: Vec<CheckError>) -> Option<CheckError> {
        if errors.len() <= 1 {
            return errors.pop();
        }
        let others = errors.len() - 1;
        let first = errors.swap_remove(0);
        Some(CheckError::Combined {
            first: Box::new(first),
            others,
        })
    }

    pub fn is_type_error(&self) -> bool {
        match self {
            CheckError::Type { .. } => true,
            CheckError::Syntax { .. } => false,
            CheckError::Combined { first, .. } => first.is_type_error(),
        }
    }

    /// The first error, unwrapping a combined error.
    pub fn first(&self) -> &CheckError {
        match self {
            CheckError::Combined { first, .. } => first.first(),
            other => other,
        }
    }
}

/// Result type for checker operations.
pub type CheckResult<T> = Result<T, CheckError>;

/// Errors that can occur while decoding an encoded tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("unexpected field {field:?} in {node}")]
    UnexpectedField { node: String, field: String },

    #[error("missing field {field:?} in {node}")]
    MissingField { node: String, field: String },

    #[error("unknown node type {0:?}")]
    UnknownType(String),

    #[error("struct has no node type")]
    MissingType,

    #[error("invalid {what} discriminator {value}")]
    InvalidDiscriminator { what: &'static str, value: i64 },

    #[error("invalid rational: {0}")]
    InvalidRational(String),

    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("symbol id {0} is not in the symbol table")]
    BadSymbol(u64),

    #[error("unexpected end of input")]
    Truncated,

    #[error("bad magic number")]
    BadMagic,

    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),

    #[error("invalid UTF-8 in string")]
    Utf8,

    #[error("{func}: {source}")]
    Context {
        func: &'static str,
        #[source]
        source: Box<DecodeError>,
    },
}

impl DecodeError {
    /// Wrap the error with the name of the decoding function.
    pub fn context(self, func: &'static str) -> Self {
        DecodeError::Context {
            func,
            source: Box::new(self),
        }
    }

    /// The innermost error below any context wrappers.
    pub fn root(&self) -> &DecodeError {
        match self {
            DecodeError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Result type for decoding operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Errors that can occur while encoding a tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodeError {
    /// A List or Struct literal holds a value with no literal encoding,
    /// such as MISSING or a path.
    #[error("\"{element}\" cannot be stored in literal {literal}")]
    NotConstant { literal: String, element: String },
}

/// Result type for encoding operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_error_messages() {
        let e = CheckError::type_error(&Node::ident("x"), "not a number");
        assert_eq!(e.to_string(), "\"x\" is ill-typed: not a number");
        let e = CheckError::bare_syntax("OFFSET without LIMIT");
        assert_eq!(e.to_string(), "OFFSET without LIMIT");
        let e = CheckError::syntax(&Node::ident("x"), "cannot be used here");
        assert_eq!(e.to_string(), "\"x\" cannot be used here");
    }

    #[test]
    fn test_combine() {
        assert_eq!(CheckError::combine(vec![]), None);
        let a = CheckError::bare_syntax("a");
        let b = CheckError::bare_syntax("b");
        let c = CheckError::bare_syntax("c");
        let combined = CheckError::combine(vec![a.clone(), b, c]).unwrap();
        assert_eq!(combined.to_string(), "a and 2 other errors");
        assert_eq!(combined.first(), &a);
    }

    #[test]
    fn test_decode_context() {
        let e = DecodeError::UnknownType("frob".to_string()).context("decode_node");
        assert_eq!(e.to_string(), "decode_node: unknown node type \"frob\"");
        assert_eq!(e.root(), &DecodeError::UnknownType("frob".to_string()));
    }
}
