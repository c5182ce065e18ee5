//! Error handling for Weft renders
//!
//! Every fatal condition raised while rendering a template surfaces as a
//! [`TemplateError`]. Failures inside the expression layer carry an
//! [`EvalError`] as their source.

use std::io;

use thiserror::Error;

use crate::expr::EvalError;

/// Render error type
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Malformed directive, invalid name, or mismatched end token
    #[error("Syntax error in token {token_id}: {message}")]
    Syntax { token_id: u64, message: String },

    /// Input ended while scanning a token body. Inside an expanded value,
    /// `offset` counts from the start of that value and `within` names the
    /// token whose value it is.
    #[error("Unterminated token starting at offset {offset}{}", expansion_note(.within))]
    UnterminatedToken { offset: usize, within: Option<u64> },

    /// Input ended with control-flow blocks still open
    #[error("Missing end for '{directive}' opened by token {token_id}")]
    UnterminatedBlock { directive: String, token_id: u64 },

    /// An expression failed where the render cannot continue without its result
    #[error("Expression error in token {token_id}: {source}")]
    Expression {
        token_id: u64,
        #[source]
        source: EvalError,
    },

    /// Nested value expansion went deeper than the configured maximum
    #[error("Recursion depth exceeded maximum ({max_depth}) while expanding token {token_id}")]
    RecursionLimit { max_depth: usize, token_id: u64 },

    /// Seek outside the retained buffer region (internal invariant violation)
    #[error("Internal error: position {position} outside retained buffers {start}..{end}")]
    BufferPosition {
        position: usize,
        start: usize,
        end: usize,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    /// IO error from the template source or output sink
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn expansion_note(within: &Option<u64>) -> String {
    match within {
        Some(id) => format!(" in the value of token {}", id),
        None => String::new(),
    }
}

/// Result type for render operations
pub type TemplateResult<T> = Result<T, TemplateError>;

// Convenience constructors for errors
impl TemplateError {
    pub fn syntax(token_id: u64, message: impl Into<String>) -> Self {
        TemplateError::Syntax {
            token_id,
            message: message.into(),
        }
    }

    pub fn expression(token_id: u64, source: EvalError) -> Self {
        TemplateError::Expression { token_id, source }
    }

    pub fn config(message: impl Into<String>) -> Self {
        TemplateError::Config {
            message: message.into(),
        }
    }

    /// True for errors caused by the template text itself rather than IO or
    /// engine state.
    pub fn is_template_fault(&self) -> bool {
        matches!(
            self,
            TemplateError::Syntax { .. }
                | TemplateError::UnterminatedToken { .. }
                | TemplateError::UnterminatedBlock { .. }
                | TemplateError::Expression { .. }
                | TemplateError::RecursionLimit { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_syntax_error_display() {
        let err = TemplateError::syntax(4, "'else' without matching 'if'");
        let msg = err.to_string();
        assert!(msg.contains("Syntax error"));
        assert!(msg.contains("token 4"));
        assert!(msg.contains("'else'"));
    }

    #[test]
    fn test_unterminated_block_mentions_missing_end() {
        let err = TemplateError::UnterminatedBlock {
            directive: "if".to_string(),
            token_id: 1,
        };
        assert!(err.to_string().contains("Missing end for 'if'"));
    }

    #[test]
    fn test_expression_error_keeps_source() {
        use std::error::Error as _;

        let err = TemplateError::expression(2, EvalError::undefined("counter"));
        assert!(err.source().is_some());
        assert!(err.to_string().contains("counter"));
        assert!(err.is_template_fault());
    }

    #[test]
    fn test_unterminated_token_names_expanded_token() {
        let top = TemplateError::UnterminatedToken {
            offset: 7,
            within: None,
        };
        assert_eq!(top.to_string(), "Unterminated token starting at offset 7");

        let nested = TemplateError::UnterminatedToken {
            offset: 2,
            within: Some(3),
        };
        assert_eq!(
            nested.to_string(),
            "Unterminated token starting at offset 2 in the value of token 3"
        );
    }

    #[test]
    fn test_io_error_converts() {
        let err: TemplateError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, TemplateError::Io(_)));
        assert!(!err.is_template_fault());
    }
}
