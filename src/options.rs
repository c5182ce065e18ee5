//! Render configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::utils::error::{TemplateError, TemplateResult};

/// Default maximum depth of nested value expansion.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 20;

/// Default read-buffer size in characters (one page).
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Token delimiter pair.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelimiterStyle {
    /// `{{ name }}`
    #[default]
    DoubleBrace,
    /// `${ name }`
    DollarBrace,
    /// `<% name %>`
    AnglePercent,
    /// `[[ name ]]`
    DoubleBracket,
    /// Any other non-empty pair
    Custom { left: String, right: String },
}

impl DelimiterStyle {
    pub fn left(&self) -> &str {
        match self {
            DelimiterStyle::DoubleBrace => "{{",
            DelimiterStyle::DollarBrace => "${",
            DelimiterStyle::AnglePercent => "<%",
            DelimiterStyle::DoubleBracket => "[[",
            DelimiterStyle::Custom { left, .. } => left,
        }
    }

    pub fn right(&self) -> &str {
        match self {
            DelimiterStyle::DoubleBrace => "}}",
            DelimiterStyle::DollarBrace => "}",
            DelimiterStyle::AnglePercent => "%>",
            DelimiterStyle::DoubleBracket => "]]",
            DelimiterStyle::Custom { right, .. } => right,
        }
    }

    /// Parse a CLI spelling: a preset name or `LEFT,RIGHT`.
    pub fn parse(spec: &str) -> TemplateResult<Self> {
        let style = match spec {
            "double-brace" | "{{}}" => DelimiterStyle::DoubleBrace,
            "dollar-brace" | "${}" => DelimiterStyle::DollarBrace,
            "angle-percent" | "<%%>" => DelimiterStyle::AnglePercent,
            "double-bracket" | "[[]]" => DelimiterStyle::DoubleBracket,
            other => match other.split_once(',') {
                Some((left, right)) => DelimiterStyle::Custom {
                    left: left.to_string(),
                    right: right.to_string(),
                },
                None => {
                    return Err(TemplateError::config(format!(
                        "unknown delimiter style '{}'",
                        other
                    )))
                }
            },
        };
        style.validate()?;
        Ok(style)
    }

    fn validate(&self) -> TemplateResult<()> {
        if self.left().is_empty() || self.right().is_empty() {
            return Err(TemplateError::config("delimiters cannot be empty"));
        }
        if self.left().contains('"') || self.right().contains('"') {
            return Err(TemplateError::config("delimiters cannot contain '\"'"));
        }
        Ok(())
    }
}

/// What to do with a value token that resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTokenPolicy {
    /// Write an inline error marker
    #[default]
    Error,
    /// Write nothing
    Ignore,
}

/// Options for rendering a template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Token delimiters
    /// Default: `{{` / `}}`
    pub delimiters: DelimiterStyle,

    /// Handling of undefined value tokens
    /// Default: error marker
    pub missing_tokens: MissingTokenPolicy,

    /// Fall back to process environment variables for unknown names
    /// Default: false
    pub environment_fallback: bool,

    /// Maximum nesting of value expansion before the render fails
    /// Default: 20
    pub max_recursion_depth: usize,

    /// Characters per read buffer on the streaming path
    /// Default: 4096
    pub buffer_size: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            delimiters: DelimiterStyle::DoubleBrace,
            missing_tokens: MissingTokenPolicy::Error,
            environment_fallback: false,
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl RenderOptions {
    /// Undefined tokens render as nothing
    pub fn permissive() -> Self {
        Self {
            missing_tokens: MissingTokenPolicy::Ignore,
            ..Self::default()
        }
    }

    pub fn with_delimiters(mut self, delimiters: DelimiterStyle) -> Self {
        self.delimiters = delimiters;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_environment_fallback(mut self, enabled: bool) -> Self {
        self.environment_fallback = enabled;
        self
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> TemplateResult<()> {
        self.delimiters.validate()?;
        if self.buffer_size == 0 {
            return Err(TemplateError::config("buffer_size must be at least 1"));
        }
        Ok(())
    }

    pub fn from_json(text: &str) -> TemplateResult<Self> {
        let options: Self = serde_json::from_str(text)
            .map_err(|e| TemplateError::config(format!("invalid JSON options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    pub fn from_toml(text: &str) -> TemplateResult<Self> {
        let options: Self = toml::from_str(text)
            .map_err(|e| TemplateError::config(format!("invalid TOML options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a `.json` or `.toml` file.
    pub fn from_file(path: &Path) -> TemplateResult<Self> {
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&text),
            Some("json") => Self::from_json(&text),
            _ => Err(TemplateError::config(format!(
                "unsupported options file '{}' (expected .json or .toml)",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = RenderOptions::default();
        assert_eq!(options.delimiters.left(), "{{");
        assert_eq!(options.delimiters.right(), "}}");
        assert_eq!(options.max_recursion_depth, 20);
        assert_eq!(options.missing_tokens, MissingTokenPolicy::Error);
        assert!(!options.environment_fallback);
    }

    #[test]
    fn test_from_json_partial() {
        let options =
            RenderOptions::from_json(r#"{"missing_tokens": "ignore", "buffer_size": 16}"#)
                .unwrap();
        assert_eq!(options.missing_tokens, MissingTokenPolicy::Ignore);
        assert_eq!(options.buffer_size, 16);
        assert_eq!(options.max_recursion_depth, DEFAULT_MAX_RECURSION_DEPTH);
    }

    #[test]
    fn test_from_toml_custom_delimiters() {
        let text = r#"
max_recursion_depth = 5

[delimiters.custom]
left = "<<"
right = ">>"
"#;
        let options = RenderOptions::from_toml(text).unwrap();
        assert_eq!(options.delimiters.left(), "<<");
        assert_eq!(options.delimiters.right(), ">>");
        assert_eq!(options.max_recursion_depth, 5);
    }

    #[test]
    fn test_rejects_bad_settings() {
        assert!(RenderOptions::from_json(r#"{"buffer_size": 0}"#).is_err());
        assert!(DelimiterStyle::parse(",}}").is_err());
        assert!(DelimiterStyle::parse("weird").is_err());
        assert_eq!(
            DelimiterStyle::parse("<<,>>").unwrap(),
            DelimiterStyle::Custom {
                left: "<<".to_string(),
                right: ">>".to_string()
            }
        );
    }
}
