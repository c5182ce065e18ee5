//! Value types for the expression evaluator and the value environment.

use std::fmt;

use thiserror::Error;

// ============================================================================
// Values
// ============================================================================

/// A runtime value.
///
/// Templates only ever write strings; [`Value::display`] is the bridge from a
/// typed value to rendered text.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Unset / null
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
}

impl Value {
    /// Get the type name of this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Render this value as template output.
    ///
    /// Booleans print as `True`/`False` so they round-trip through the
    /// truthiness rule; lists join their items with commas.
    pub fn display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => format_float(*f),
            Value::Str(s) => s.clone(),
            Value::List(items) => items
                .iter()
                .map(Value::display)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    pub fn as_bool(&self) -> EvalResult<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            _ => Err(EvalError::type_mismatch("bool", self.type_name())),
        }
    }

    pub fn as_int(&self) -> EvalResult<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            _ => Err(EvalError::type_mismatch("int", self.type_name())),
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_float(&self) -> EvalResult<f64> {
        match self {
            Value::Int(i) => Ok(*i as f64),
            Value::Float(f) => Ok(*f),
            _ => Err(EvalError::type_mismatch("float", self.type_name())),
        }
    }

    pub fn as_str(&self) -> EvalResult<&str> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(EvalError::type_mismatch("string", self.type_name())),
        }
    }

    pub fn as_list(&self) -> EvalResult<&Vec<Value>> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(EvalError::type_mismatch("list", self.type_name())),
        }
    }

    /// Element at `index`, for lists and strings.
    pub fn index(&self, index: i64) -> EvalResult<Value> {
        match self {
            Value::List(items) => usize::try_from(index)
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .ok_or_else(|| EvalError::index_oob(index, items.len())),
            Value::Str(s) => usize::try_from(index)
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| EvalError::index_oob(index, s.chars().count())),
            _ => Err(EvalError::invalid_op(format!(
                "cannot index into {}",
                self.type_name()
            ))),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            // Objects have no template representation beyond their JSON text
            other @ serde_json::Value::Object(_) => Value::Str(other.to_string()),
        }
    }
}

// ============================================================================
// Source Span
// ============================================================================

/// Character range inside an expression text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

impl fmt::Display for SourceSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

// ============================================================================
// Error Types
// ============================================================================

/// The kind of evaluation error (without span information).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalErrorKind {
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },
    #[error("undefined variable: {0}")]
    UndefinedVariable(String),
    #[error("undefined method: {0}")]
    UndefinedMethod(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
    #[error("argument error: {0}")]
    ArgumentError(String),
    #[error("index {index} out of bounds for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("parse error: {0}")]
    ParseError(String),
    #[error("syntax error: {0}")]
    SyntaxError(String),
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur during evaluation, with optional source span.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub span: Option<SourceSpan>,
}

impl EvalError {
    pub fn new(kind: EvalErrorKind) -> Self {
        Self { kind, span: None }
    }

    /// Attach a span to this error.
    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn type_mismatch(expected: &'static str, got: &'static str) -> Self {
        Self::new(EvalErrorKind::TypeMismatch { expected, got })
    }

    pub fn undefined(name: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::UndefinedVariable(name.into()))
    }

    pub fn undefined_method(name: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::UndefinedMethod(name.into()))
    }

    pub fn div_zero() -> Self {
        Self::new(EvalErrorKind::DivisionByZero)
    }

    pub fn invalid_op(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::InvalidOperation(msg.into()))
    }

    pub fn argument(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::ArgumentError(msg.into()))
    }

    pub fn index_oob(index: i64, len: usize) -> Self {
        Self::new(EvalErrorKind::IndexOutOfBounds { index, len })
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::ParseError(msg.into()))
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::SyntaxError(msg.into()))
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::new(EvalErrorKind::Other(msg.into()))
    }

    pub fn kind(&self) -> &EvalErrorKind {
        &self.kind
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(span) = &self.span {
            write!(f, " at {}", span)?;
        }
        Ok(())
    }
}

impl std::error::Error for EvalError {}

impl From<EvalErrorKind> for EvalError {
    fn from(kind: EvalErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Result type for evaluation operations.
pub type EvalResult<T> = Result<T, EvalError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_values() {
        assert_eq!(Value::Null.display(), "");
        assert_eq!(Value::Bool(false).display(), "False");
        assert_eq!(Value::Int(-3).display(), "-3");
        assert_eq!(Value::Float(2.0).display(), "2");
        assert_eq!(Value::Float(2.5).display(), "2.5");
        assert_eq!(Value::from(vec!["a", "b"]).display(), "a,b");
    }

    #[test]
    fn test_index_list_and_string() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert_eq!(list.index(1).unwrap(), Value::Int(2));
        assert!(list.index(3).is_err());
        assert!(list.index(-1).is_err());
        assert_eq!(Value::from("abc").index(2).unwrap(), Value::from("c"));
    }

    #[test]
    fn test_from_json() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"a": [1, 2.5, "x", true, null]}"#).unwrap();
        let items = Value::from(json["a"].clone());
        assert_eq!(
            items,
            Value::List(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x"),
                Value::Bool(true),
                Value::Null,
            ])
        );
    }

    #[test]
    fn test_error_display_with_span() {
        let err = EvalError::undefined("x").with_span(SourceSpan::new(2, 3));
        assert_eq!(err.to_string(), "undefined variable: x at 2..3");
        assert_eq!(EvalError::div_zero().to_string(), "division by zero");
    }
}
