//! The scanning state machine.
//!
//! [`ParserEngine::run`] alternates between two states over a
//! [`BufferManager`]:
//!
//! - **Text**: copy literal text to the output (unless suppressed) until a
//!   left delimiter is found.
//! - **Token**: collect the token body until its closing delimiter, then lex
//!   and interpret it.
//!
//! Replaced values that contain delimiters are rendered by a nested `run`
//! over a fixed buffer, sharing the same [`TemplateState`].

use std::io::Write;

use super::buffer::BufferManager;
use super::frame::TemplateState;
use super::interpreter::{TokenAction, TokenInterpreter};
use super::lexer::{TokenDefinition, TokenLexer};
use super::scanner::{CloseScan, TextScan};
use crate::utils::error::{TemplateError, TemplateResult};

pub struct ParserEngine<'r, 'cb> {
    interpreter: TokenInterpreter<'r, 'cb>,
    lexer: TokenLexer,
    left: String,
    right: String,
    max_depth: usize,
}

impl<'r, 'cb> ParserEngine<'r, 'cb> {
    pub fn new(
        interpreter: TokenInterpreter<'r, 'cb>,
        left: &str,
        right: &str,
        max_depth: usize,
    ) -> Self {
        Self {
            interpreter,
            lexer: TokenLexer::new(left, right),
            left: left.to_string(),
            right: right.to_string(),
            max_depth,
        }
    }

    /// Render everything `buffers` yields into `out` at expansion depth `level`.
    ///
    /// Blocks opened during this call must also close during it.
    pub fn run(
        &mut self,
        buffers: &mut BufferManager<'_>,
        out: &mut dyn Write,
        state: &mut TemplateState,
        level: usize,
    ) -> TemplateResult<()> {
        let entry_frames = state.frames.len();
        let mut text = if level == 0 {
            TextScan::new(&self.left)
        } else {
            TextScan::unescaped(&self.left)
        };
        let mut literal = String::new();
        let left_chars = self.left.chars().count();

        loop {
            // Text
            let found = loop {
                let span = buffers.read_span()?;
                if span.is_empty() {
                    break false;
                }
                let step = text.scan(span, &mut literal);
                buffers.advance(step.consumed);
                if step.found {
                    break true;
                }
                flush(out, &mut literal, text.pending_bytes(), state)?;
            };
            flush(out, &mut literal, 0, state)?;
            if !found {
                break;
            }
            text.reset();

            // Token
            let offset = buffers.position() - left_chars;
            let mut close = CloseScan::new(&self.left, &self.right);
            loop {
                let span = buffers.read_span()?;
                if span.is_empty() {
                    return Err(TemplateError::UnterminatedToken {
                        offset,
                        within: None,
                    });
                }
                let step = close.scan(span);
                buffers.advance(step.consumed);
                if step.found {
                    break;
                }
            }
            let body = close.into_body();
            self.token(&body, buffers, out, state, level)?;
        }

        if state.frames.len() > entry_frames {
            if let Some(top) = state.frames.top() {
                return Err(TemplateError::UnterminatedBlock {
                    directive: top.kind().keyword().to_string(),
                    token_id: top.token.id,
                });
            }
        }
        Ok(())
    }

    fn token(
        &mut self,
        body: &str,
        buffers: &mut BufferManager<'_>,
        out: &mut dyn Write,
        state: &mut TemplateState,
        level: usize,
    ) -> TemplateResult<()> {
        let id = state.next_token_id();
        if level == 0 {
            state.position = buffers.position();
        }
        let interpreter = &self.interpreter;
        let token = self
            .lexer
            .classify(id, body, &|name| interpreter.is_valid_name(name))?;
        log::trace!(
            "token {} at level {}: {:?} {:?}",
            id,
            level,
            token.kind,
            token.name
        );

        let resolution = self
            .interpreter
            .interpret(&token, state, level, buffers.position())?;

        if token.kind.is_loop() {
            buffers.set_grow(true);
        } else if token.kind.is_loop_end() && resolution.action != TokenAction::ContinueLoop {
            buffers.set_grow(false);
        }

        match resolution.action {
            TokenAction::ContinueLoop => {
                let resume_at = state.frames.top().and_then(|frame| frame.resume_at);
                match resume_at {
                    Some(position) => buffers.seek(position)?,
                    None => {
                        return Err(TemplateError::syntax(
                            token.id,
                            "loop has no resume position",
                        ))
                    }
                }
            }
            TokenAction::Replace => {
                if let Some(value) = resolution.value {
                    self.expand(&value, &token, out, state, level)?;
                }
            }
            TokenAction::Error => {
                let message = resolution.value.unwrap_or_default();
                write!(
                    out,
                    "{}Error ({}):{}{}",
                    self.left, token.id, message, self.right
                )?;
            }
            TokenAction::Ignore => {}
        }
        Ok(())
    }

    /// Write a resolved value, rendering any tokens it contains one level
    /// deeper.
    fn expand(
        &mut self,
        value: &str,
        token: &TokenDefinition,
        out: &mut dyn Write,
        state: &mut TemplateState,
        level: usize,
    ) -> TemplateResult<()> {
        if !value.contains(self.left.as_str()) {
            out.write_all(value.as_bytes())?;
            return Ok(());
        }
        let next = level + 1;
        if next > self.max_depth {
            return Err(TemplateError::RecursionLimit {
                max_depth: self.max_depth,
                token_id: token.id,
            });
        }
        let mut buffers = BufferManager::fixed(value);
        self.run(&mut buffers, out, state, next)
            .map_err(|err| match err {
                TemplateError::UnterminatedToken {
                    offset,
                    within: None,
                } => TemplateError::UnterminatedToken {
                    offset,
                    within: Some(token.id),
                },
                other => other,
            })
    }
}

/// Write all but the last `keep` bytes of `literal` unless output is
/// suppressed, and drop them from `literal`.
fn flush(
    out: &mut dyn Write,
    literal: &mut String,
    keep: usize,
    state: &TemplateState,
) -> TemplateResult<()> {
    let cut = literal.len().saturating_sub(keep);
    if cut == 0 {
        return Ok(());
    }
    if !state.frames.is_suppressed() {
        out.write_all(literal[..cut].as_bytes())?;
    }
    literal.drain(..cut);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BufferPool;
    use crate::environment::Variables;
    use crate::expr::MiniExpr;
    use crate::options::RenderOptions;
    use crate::utils::source::StrSource;
    use std::sync::Arc;

    fn render(template: &str, env: &mut Variables, buffer_size: Option<usize>) -> TemplateResult<String> {
        let options = RenderOptions::default();
        let evaluator = MiniExpr::new();
        let interpreter = TokenInterpreter::new(&options, &evaluator, env, None);
        let mut engine = ParserEngine::new(interpreter, "{{", "}}", options.max_recursion_depth);
        let mut state = TemplateState::new();
        let mut out = Vec::new();
        match buffer_size {
            Some(size) => {
                let mut source = StrSource::new(template);
                let pool = Arc::new(BufferPool::new(4));
                let mut buffers = BufferManager::streaming(&mut source, size, pool);
                engine.run(&mut buffers, &mut out, &mut state, 0)?;
            }
            None => {
                let mut buffers = BufferManager::fixed(template);
                engine.run(&mut buffers, &mut out, &mut state, 0)?;
            }
        }
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_literal_passthrough() {
        let mut env = Variables::new();
        let text = "no tokens { here } at all";
        assert_eq!(render(text, &mut env, None).unwrap(), text);
        assert_eq!(render(text, &mut env, Some(3)).unwrap(), text);
    }

    #[test]
    fn test_partial_delimiter_at_end_is_literal() {
        let mut env = Variables::new();
        assert_eq!(render("tail {", &mut env, Some(2)).unwrap(), "tail {");
    }

    #[test]
    fn test_while_replays_across_buffers() {
        let template = "{{while x => int.Parse(x.counter) < 3}}{{counter}}\
                        {{counter:{{x => int.Parse(x.counter)+1}}}}{{/while}}";
        for size in [1, 2, 5, 7, 64] {
            let mut env = Variables::new().with("counter", "0");
            assert_eq!(render(template, &mut env, Some(size)).unwrap(), "012", "size {}", size);
        }
    }

    #[test]
    fn test_nested_value_expansion() {
        let mut env = Variables::new()
            .with("greeting", "hello {{who}}")
            .with("who", "{{name}}")
            .with("name", "world");
        assert_eq!(render("{{greeting}}!", &mut env, None).unwrap(), "hello world!");
    }

    #[test]
    fn test_escaped_delimiter_in_value() {
        let mut env = Variables::new().with("v", r"literal \{{name}} and {{name}}").with("name", "n");
        assert_eq!(render("{{v}}", &mut env, None).unwrap(), "literal {{name}} and n");
    }

    #[test]
    fn test_self_reference_hits_limit() {
        let mut env = Variables::new().with("a", "{{b}}").with("b", "{{a}}");
        let err = render("{{a}}", &mut env, None).unwrap_err();
        assert!(matches!(err, TemplateError::RecursionLimit { max_depth: 20, .. }));
    }

    #[test]
    fn test_unterminated_token_offset() {
        let mut env = Variables::new();
        let err = render("abc{{name", &mut env, Some(2)).unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedToken {
                offset: 3,
                within: None
            }));
    }

    #[test]
    fn test_unterminated_token_inside_value() {
        let mut env = Variables::new()
            .with("outer", "x{{inner}}")
            .with("inner", "ab{{name");
        let err = render("12{{outer}}", &mut env, Some(4)).unwrap_err();
        assert!(matches!(
            err,
            TemplateError::UnterminatedToken {
                offset: 2,
                within: Some(2)
            }
        ));
    }

    #[test]
    fn test_block_must_close_inside_value() {
        let mut env = Variables::new().with("frag", "{{if flag}}x");
        let err = render("{{frag}}{{/if}}", &mut env, None).unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedBlock { .. }));
    }

    #[test]
    fn test_error_marker() {
        let mut env = Variables::new();
        let out = render("a{{ghost}}b", &mut env, None).unwrap();
        assert_eq!(out, "a{{Error (1):'ghost' is not defined}}b");
    }

    #[test]
    fn test_state_tracks_top_level_position() {
        let options = RenderOptions::default();
        let evaluator = MiniExpr::new();
        let mut env = Variables::new().with("x", "{{y:1}}");
        let interpreter = TokenInterpreter::new(&options, &evaluator, &mut env, None);
        let mut engine = ParserEngine::new(interpreter, "{{", "}}", options.max_recursion_depth);
        let mut state = TemplateState::new();
        let mut buffers = BufferManager::fixed("ab{{x}}cd{{x}}!");
        let mut out = Vec::new();
        engine.run(&mut buffers, &mut out, &mut state, 0).unwrap();
        assert_eq!(state.position, 14);
        assert_eq!(state.tokens_seen(), 4);
    }
}
