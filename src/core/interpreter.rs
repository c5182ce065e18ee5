//! Token interpretation.
//!
//! Resolves a [`TokenDefinition`] against the frame stack, the value
//! environment and the expression evaluator, and tells the engine what to do
//! with it through a [`TokenAction`].

use phf::phf_set;

use super::frame::{Frame, TemplateState};
use super::lexer::{EvaluationMode, TokenDefinition, TokenKind};
use crate::environment::ValueEnvironment;
use crate::expr::{EvalResult, ExpressionEvaluator, Value};
use crate::options::{MissingTokenPolicy, RenderOptions};
use crate::utils::error::{TemplateError, TemplateResult};

/// Strings that read as false, compared lowercased.
static FALSY: phf::Set<&'static str> = phf_set! {
    "false",
    "no",
    "off",
    "0",
};

/// Truthiness of a resolved value.
///
/// Unset, null and empty values are falsy, as are `False`, `No`, `Off` and `0`
/// in any letter case.
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            let text = other.display();
            !text.is_empty() && !FALSY.contains(text.to_lowercase().as_str())
        }
    }
}

/// What the engine does with an interpreted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenAction {
    /// Write the value (expanding any tokens inside it)
    Replace,
    /// Write an inline error marker carrying the value as message
    Error,
    /// Write nothing
    Ignore,
    /// Rewind to the top frame's resume position
    ContinueLoop,
}

/// Outcome of interpreting one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub action: TokenAction,
    pub value: Option<String>,
}

impl Resolution {
    pub fn ignore() -> Self {
        Self {
            action: TokenAction::Ignore,
            value: None,
        }
    }

    fn continue_loop() -> Self {
        Self {
            action: TokenAction::ContinueLoop,
            value: None,
        }
    }
}

/// Passed to the token callback for every value token that is rendered.
///
/// The callback may rewrite `action` and `value`.
#[derive(Debug)]
pub struct TokenEvent<'t> {
    pub token: &'t TokenDefinition,
    pub action: TokenAction,
    pub value: Option<String>,
}

/// Per-token callback.
pub type TokenCallback<'cb> = dyn FnMut(&mut TokenEvent<'_>) + 'cb;

pub struct TokenInterpreter<'r, 'cb> {
    options: &'r RenderOptions,
    evaluator: &'r dyn ExpressionEvaluator,
    env: &'r mut dyn ValueEnvironment,
    callback: Option<&'r mut TokenCallback<'cb>>,
}

impl<'r, 'cb> TokenInterpreter<'r, 'cb> {
    pub fn new(
        options: &'r RenderOptions,
        evaluator: &'r dyn ExpressionEvaluator,
        env: &'r mut dyn ValueEnvironment,
        callback: Option<&'r mut TokenCallback<'cb>>,
    ) -> Self {
        Self {
            options,
            evaluator,
            env,
            callback,
        }
    }

    pub fn is_valid_name(&self, name: &str) -> bool {
        self.env.is_valid_name(name)
    }

    /// Interpret `token` at expansion depth `level`.
    ///
    /// `resume_at` is the input offset just past the token, recorded on loop
    /// frames.
    pub fn interpret(
        &mut self,
        token: &TokenDefinition,
        state: &mut TemplateState,
        level: usize,
        resume_at: usize,
    ) -> TemplateResult<Resolution> {
        let suppressed = state.frames.is_suppressed();
        match token.kind {
            TokenKind::Value | TokenKind::Undefined => {
                if suppressed {
                    return Ok(Resolution::ignore());
                }
                Ok(self.value(token))
            }
            TokenKind::Define => {
                if !suppressed {
                    self.define(token)?;
                }
                Ok(Resolution::ignore())
            }
            TokenKind::If => {
                let frame = if suppressed {
                    Frame::skipped(token.clone(), level)
                } else {
                    let truthy = self.condition(token)?;
                    Frame::new(token.clone(), truthy, true, level)
                };
                state.frames.push(frame);
                Ok(Resolution::ignore())
            }
            TokenKind::Else => {
                let (truthy, live) = match state.frames.top() {
                    Some(top) if top.kind() == TokenKind::If && top.level == level => {
                        (top.live && !top.truthy, top.live)
                    }
                    _ => return Err(unmatched(token, "if")),
                };
                state
                    .frames
                    .push(Frame::new(token.clone(), truthy, live, level));
                Ok(Resolution::ignore())
            }
            TokenKind::EndIf => {
                if self.top_is(state, TokenKind::Else, level) {
                    state.frames.pop();
                }
                if !self.top_is(state, TokenKind::If, level) {
                    return Err(unmatched(token, "if"));
                }
                state.frames.pop();
                Ok(Resolution::ignore())
            }
            TokenKind::While => {
                let frame = if suppressed {
                    Frame::skipped(token.clone(), level)
                } else {
                    let truthy = self.condition(token)?;
                    Frame::new(token.clone(), truthy, true, level).with_resume(resume_at)
                };
                state.frames.push(frame);
                Ok(Resolution::ignore())
            }
            TokenKind::EndWhile => {
                if !self.top_is(state, TokenKind::While, level) {
                    return Err(unmatched(token, "while"));
                }
                let Some(frame) = state.frames.top() else {
                    return Err(unmatched(token, "while"));
                };
                if frame.truthy {
                    let opener = frame.token.clone();
                    if self.condition(&opener)? {
                        return Ok(Resolution::continue_loop());
                    }
                }
                state.frames.pop();
                Ok(Resolution::ignore())
            }
            TokenKind::Each => {
                let frame = if suppressed {
                    Frame::skipped(token.clone(), level)
                } else {
                    let mut items = self.sequence(token)?.into_iter();
                    match items.next() {
                        Some(first) => {
                            self.env.set(&token.name, Value::Str(first));
                            Frame::new(token.clone(), true, true, level)
                                .with_resume(resume_at)
                                .with_items(items.collect())
                        }
                        // Empty sequence: the body is skipped and `/each`
                        // closes this frame
                        None => Frame::new(token.clone(), false, true, level),
                    }
                };
                state.frames.push(frame);
                Ok(Resolution::ignore())
            }
            TokenKind::EndEach => {
                if !self.top_is(state, TokenKind::Each, level) {
                    return Err(unmatched(token, "each"));
                }
                let Some(frame) = state.frames.top_mut() else {
                    return Err(unmatched(token, "each"));
                };
                if frame.truthy {
                    let next = frame.items.as_mut().and_then(Iterator::next);
                    let name = frame.token.name.clone();
                    match next {
                        Some(item) => {
                            self.env.set(&name, Value::Str(item));
                            return Ok(Resolution::continue_loop());
                        }
                        None => {
                            self.env.remove(&name);
                        }
                    }
                }
                state.frames.pop();
                Ok(Resolution::ignore())
            }
        }
    }

    fn top_is(&self, state: &TemplateState, kind: TokenKind, level: usize) -> bool {
        state
            .frames
            .top()
            .is_some_and(|top| top.kind() == kind && top.level == level)
    }

    /// Look a name up, falling back to process environment variables when
    /// enabled.
    fn lookup(&self, name: &str) -> Option<Value> {
        let value = self.env.try_get(name).or_else(|| {
            if self.options.environment_fallback {
                std::env::var(name).ok().map(Value::Str)
            } else {
                None
            }
        });
        value.filter(|v| !v.is_null())
    }

    fn evaluate(&self, token: &TokenDefinition) -> EvalResult<Value> {
        let text = token.expression.as_deref().unwrap_or_default();
        self.evaluator.evaluate(text, &*self.env)
    }

    /// Decide an `if` / `while` condition. Expression failures are fatal.
    fn condition(&self, token: &TokenDefinition) -> TemplateResult<bool> {
        match token.mode {
            EvaluationMode::Expression => {
                let value = self
                    .evaluate(token)
                    .map_err(|err| TemplateError::expression(token.id, err))?;
                Ok(is_truthy(Some(&value)))
            }
            EvaluationMode::Falsy => Ok(!is_truthy(self.lookup(&token.name).as_ref())),
            EvaluationMode::Truthy | EvaluationMode::None => {
                Ok(is_truthy(self.lookup(&token.name).as_ref()))
            }
        }
    }

    /// Snapshot the items of an `each` expression.
    fn sequence(&self, token: &TokenDefinition) -> TemplateResult<Vec<String>> {
        let value = self
            .evaluate(token)
            .map_err(|err| TemplateError::expression(token.id, err))?;
        Ok(match value {
            Value::Null => Vec::new(),
            Value::List(items) => items.iter().map(Value::display).collect(),
            other => vec![other.display()],
        })
    }

    fn define(&mut self, token: &TokenDefinition) -> TemplateResult<()> {
        let value = match token.mode {
            EvaluationMode::Expression => self
                .evaluate(token)
                .map_err(|err| TemplateError::expression(token.id, err))?,
            _ => Value::Str(token.expression.clone().unwrap_or_default()),
        };
        log::trace!("define {} = {:?}", token.name, value);
        self.env.set(&token.name, value);
        Ok(())
    }

    fn value(&mut self, token: &TokenDefinition) -> Resolution {
        let resolved = match (token.kind, token.mode) {
            (TokenKind::Undefined, _) => Err("Empty token".to_string()),
            (_, EvaluationMode::Expression) => match self.evaluate(token) {
                Ok(value) if !value.is_null() => Ok(value),
                Ok(_) => Err(format!("'{}' produced no value", token.name)),
                Err(err) => {
                    log::debug!("token {}: expression failed: {}", token.id, err);
                    Err(err.to_string())
                }
            },
            _ => self
                .lookup(&token.name)
                .ok_or_else(|| format!("'{}' is not defined", token.name)),
        };

        let mut resolution = match resolved {
            Ok(value) => Resolution {
                action: TokenAction::Replace,
                value: Some(value.display()),
            },
            Err(message) => match self.options.missing_tokens {
                MissingTokenPolicy::Ignore => {
                    log::warn!("token {}: {}", token.id, message);
                    Resolution::ignore()
                }
                MissingTokenPolicy::Error => Resolution {
                    action: TokenAction::Error,
                    value: Some(message),
                },
            },
        };

        if let Some(callback) = self.callback.as_deref_mut() {
            let mut event = TokenEvent {
                token,
                action: resolution.action,
                value: resolution.value.take(),
            };
            callback(&mut event);
            resolution = Resolution {
                action: event.action,
                value: event.value,
            };
        }
        resolution
    }
}

fn unmatched(token: &TokenDefinition, opener: &str) -> TemplateError {
    TemplateError::syntax(
        token.id,
        format!(
            "'{}' without matching '{}'",
            token.kind.keyword(),
            opener
        ),
    )
}
