//! Token classification.
//!
//! Turns the raw body of a token (the text between the delimiters) into a
//! [`TokenDefinition`]. Directives are matched case-insensitively:
//!
//! ```text
//! if [!]name | if x => expr        else        /if
//! while [!]name | while x => expr              /while
//! each name : x => expr                        /each
//! name:value | x => expr | name
//! ```

use phf::phf_map;

use super::scanner::{find_unquoted, wrapped_body, QUOTE};
use crate::utils::error::{TemplateError, TemplateResult};

/// Marker separating a lambda parameter from its body.
pub const LAMBDA_ARROW: &str = "=>";

/// Separator between a defined name and its value.
pub const DEFINE_SEPARATOR: char = ':';

/// Token kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Value,
    Define,
    If,
    Else,
    EndIf,
    While,
    EndWhile,
    Each,
    EndEach,
    /// Empty token body
    Undefined,
}

impl TokenKind {
    /// Directive keyword as written in templates.
    pub fn keyword(self) -> &'static str {
        match self {
            TokenKind::Value => "value",
            TokenKind::Define => "define",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::EndIf => "/if",
            TokenKind::While => "while",
            TokenKind::EndWhile => "/while",
            TokenKind::Each => "each",
            TokenKind::EndEach => "/each",
            TokenKind::Undefined => "undefined",
        }
    }

    /// Kinds that open a replayable loop body.
    pub fn is_loop(self) -> bool {
        matches!(self, TokenKind::While | TokenKind::Each)
    }

    pub fn is_loop_end(self) -> bool {
        matches!(self, TokenKind::EndWhile | TokenKind::EndEach)
    }
}

/// How a token's name or expression is turned into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationMode {
    /// Plain lookup or literal
    #[default]
    None,
    /// Condition holds when the named value is truthy
    Truthy,
    /// Condition holds when the named value is falsy (`!name`)
    Falsy,
    /// Evaluate the expression text
    Expression,
}

/// A classified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenDefinition {
    /// Render-local id, strictly increasing
    pub id: u64,
    /// Looked-up, defined or loop variable name; the expression text for
    /// expression values
    pub name: String,
    pub kind: TokenKind,
    pub mode: EvaluationMode,
    /// Expression text, or the literal value of a non-expression define
    pub expression: Option<String>,
    /// Body length in characters, delimiters excluded
    pub length: usize,
}

impl TokenDefinition {
    fn new(id: u64, kind: TokenKind, length: usize) -> Self {
        Self {
            id,
            name: String::new(),
            kind,
            mode: EvaluationMode::None,
            expression: None,
            length,
        }
    }

    pub fn is_expression(&self) -> bool {
        self.mode == EvaluationMode::Expression
    }
}

/// Directive keywords, lowercased.
static DIRECTIVES: phf::Map<&'static str, TokenKind> = phf_map! {
    "if" => TokenKind::If,
    "else" => TokenKind::Else,
    "/if" => TokenKind::EndIf,
    "while" => TokenKind::While,
    "/while" => TokenKind::EndWhile,
    "each" => TokenKind::Each,
    "/each" => TokenKind::EndEach,
};

/// Classifies token bodies for one delimiter pair.
#[derive(Debug, Clone)]
pub struct TokenLexer {
    left: String,
    right: String,
}

impl TokenLexer {
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Classify a raw token body.
    ///
    /// `is_valid_name` decides whether an identifier is acceptable.
    pub fn classify(
        &self,
        id: u64,
        raw: &str,
        is_valid_name: &dyn Fn(&str) -> bool,
    ) -> TemplateResult<TokenDefinition> {
        let length = raw.chars().count();
        let text = raw.trim();
        if text.is_empty() {
            return Ok(TokenDefinition::new(id, TokenKind::Undefined, length));
        }

        let (keyword, rest) = match text.find(char::is_whitespace) {
            Some(pos) => (&text[..pos], text[pos..].trim()),
            None => (text, ""),
        };
        if let Some(&kind) = DIRECTIVES.get(keyword.to_lowercase().as_str()) {
            let mut token = TokenDefinition::new(id, kind, length);
            match kind {
                TokenKind::If | TokenKind::While => {
                    self.condition(&mut token, rest, is_valid_name)?;
                }
                TokenKind::Each => self.each(&mut token, rest, is_valid_name)?,
                _ if !rest.is_empty() => {
                    return Err(TemplateError::syntax(
                        id,
                        format!("unexpected text after '{}': '{}'", kind.keyword(), rest),
                    ));
                }
                _ => {}
            }
            return Ok(token);
        }

        // Whichever of `:` and `=>` comes first outside quotes decides
        let colon = find_unquoted(text, DEFINE_SEPARATOR);
        let arrow = find_unquoted(text, LAMBDA_ARROW);

        match (colon, arrow) {
            (Some(c), Some(a)) if c < a => self.define(id, text, c, length, is_valid_name),
            (Some(c), None) => self.define(id, text, c, length, is_valid_name),
            (_, Some(_)) => {
                let mut token = TokenDefinition::new(id, TokenKind::Value, length);
                token.name = text.to_string();
                token.mode = EvaluationMode::Expression;
                token.expression = Some(text.to_string());
                Ok(token)
            }
            (None, None) => {
                let mut token = TokenDefinition::new(id, TokenKind::Value, length);
                token.name = validated(id, text, is_valid_name)?;
                Ok(token)
            }
        }
    }

    /// `[!]name` or an expression after `if` / `while`.
    fn condition(
        &self,
        token: &mut TokenDefinition,
        rest: &str,
        is_valid_name: &dyn Fn(&str) -> bool,
    ) -> TemplateResult<()> {
        let keyword = token.kind.keyword();
        if rest.is_empty() {
            return Err(TemplateError::syntax(
                token.id,
                format!("'{}' needs a condition", keyword),
            ));
        }

        if let Some(negated) = rest.strip_prefix('!') {
            let negated = negated.trim();
            if find_unquoted(negated, LAMBDA_ARROW).is_some() {
                return Err(TemplateError::syntax(
                    token.id,
                    format!("'{}' cannot negate an expression with '!'", keyword),
                ));
            }
            token.name = validated(token.id, negated, is_valid_name)?;
            token.mode = EvaluationMode::Falsy;
        } else if find_unquoted(rest, LAMBDA_ARROW).is_some() {
            token.name = rest.to_string();
            token.mode = EvaluationMode::Expression;
            token.expression = Some(rest.to_string());
        } else {
            token.name = validated(token.id, rest, is_valid_name)?;
            token.mode = EvaluationMode::Truthy;
        }
        Ok(())
    }

    /// `name : expr` after `each`.
    fn each(
        &self,
        token: &mut TokenDefinition,
        rest: &str,
        is_valid_name: &dyn Fn(&str) -> bool,
    ) -> TemplateResult<()> {
        let Some(colon) = find_unquoted(rest, DEFINE_SEPARATOR) else {
            return Err(TemplateError::syntax(
                token.id,
                "'each' expects 'name : expression'",
            ));
        };
        let expression = rest[colon + 1..].trim();
        if find_unquoted(expression, LAMBDA_ARROW).is_none() {
            return Err(TemplateError::syntax(
                token.id,
                format!("'each' requires an expression, got '{}'", expression),
            ));
        }
        token.name = validated(token.id, rest[..colon].trim(), is_valid_name)?;
        token.mode = EvaluationMode::Expression;
        token.expression = Some(expression.to_string());
        Ok(())
    }

    /// `name:value`
    fn define(
        &self,
        id: u64,
        text: &str,
        colon: usize,
        length: usize,
        is_valid_name: &dyn Fn(&str) -> bool,
    ) -> TemplateResult<TokenDefinition> {
        let mut token = TokenDefinition::new(id, TokenKind::Define, length);
        token.name = validated(id, text[..colon].trim(), is_valid_name)?;
        let value = text[colon + 1..].trim();

        if let Some(inner) = wrapped_body(value, &self.left, &self.right) {
            let inner = inner.trim();
            if find_unquoted(inner, LAMBDA_ARROW).is_some() {
                token.mode = EvaluationMode::Expression;
                token.expression = Some(inner.to_string());
                return Ok(token);
            }
            // A wrapped fragment is stored as written and expanded on use
            token.expression = Some(value.to_string());
            return Ok(token);
        }

        if find_unquoted(value, LAMBDA_ARROW).is_some() {
            token.mode = EvaluationMode::Expression;
            token.expression = Some(value.to_string());
        } else {
            token.expression = Some(unquote(value).to_string());
        }
        Ok(token)
    }
}

/// Strip one layer of symmetric double quotes.
pub fn unquote(value: &str) -> &str {
    value
        .strip_prefix(QUOTE)
        .and_then(|v| v.strip_suffix(QUOTE))
        .unwrap_or(value)
}

fn validated(id: u64, name: &str, is_valid_name: &dyn Fn(&str) -> bool) -> TemplateResult<String> {
    if is_valid_name(name) {
        Ok(name.to_string())
    } else {
        Err(TemplateError::syntax(
            id,
            format!("invalid token name '{}'", name),
        ))
    }
}
