/*
 * Error Types
 *
 * Parse errors carry the offending span; evaluation errors cover the two
 * programmer-error conditions the binding language defines. Missing names and
 * properties are never errors, they evaluate to undefined.
 */

use thiserror::Error;

use crate::expression_parser::ast::ParseSpan;

/// Error produced while parsing a binding expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (at offset {})", .span.start)]
pub struct ParseError {
    pub span: ParseSpan,
    pub message: String,
}

impl ParseError {
    pub fn new(span: ParseSpan, message: impl Into<String>) -> Self {
        ParseError {
            span,
            message: message.into(),
        }
    }
}

/// Error produced while evaluating or assigning through an expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A call node resolved its callee to something that is not a function.
    #[error("`{name}` is not a function")]
    NotAFunction { name: String },

    /// `assign` was invoked on a node kind that cannot be written through.
    #[error("expression of kind `{kind}` is not assignable")]
    NotAssignable { kind: &'static str },
}

pub type Result<T, E = EvalError> = std::result::Result<T, E>;
