//! Control-flow frames and per-render state.

use super::lexer::{TokenDefinition, TokenKind};

/// One open `if`, `else`, `while` or `each` scope.
#[derive(Debug)]
pub struct Frame {
    /// The token that opened this frame
    pub token: TokenDefinition,
    /// Whether the body is rendered
    pub truthy: bool,
    /// Whether the enclosing context was rendering when this frame opened
    pub live: bool,
    /// Expansion depth the frame was opened at
    pub level: usize,
    /// Input offset right after the opening token (loops only)
    pub resume_at: Option<usize>,
    /// Remaining items of an `each` loop
    pub items: Option<std::vec::IntoIter<String>>,
}

impl Frame {
    pub fn new(token: TokenDefinition, truthy: bool, live: bool, level: usize) -> Self {
        Self {
            token,
            truthy,
            live,
            level,
            resume_at: None,
            items: None,
        }
    }

    /// A frame opened inside suppressed output. Its condition is never evaluated.
    pub fn skipped(token: TokenDefinition, level: usize) -> Self {
        Self::new(token, false, false, level)
    }

    pub fn with_resume(mut self, position: usize) -> Self {
        self.resume_at = Some(position);
        self
    }

    pub fn with_items(mut self, items: Vec<String>) -> Self {
        self.items = Some(items.into_iter());
        self
    }

    pub fn kind(&self) -> TokenKind {
        self.token.kind
    }
}

/// LIFO stack of open frames for one render.
#[derive(Debug, Default)]
pub struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        log::trace!(
            "push {} frame (token {}, truthy: {})",
            frame.kind().keyword(),
            frame.token.id,
            frame.truthy
        );
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn top_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether output is currently suppressed.
    pub fn is_suppressed(&self) -> bool {
        self.top().is_some_and(|frame| !frame.truthy)
    }
}

/// Mutable state of one render call, shared by every expansion level.
#[derive(Debug, Default)]
pub struct TemplateState {
    pub frames: FrameStack,
    /// Absolute input position of the last top-level token end.
    pub position: usize,
    next_id: u64,
}

impl TemplateState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next token id (ids start at 1).
    pub fn next_token_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Ids handed out so far.
    pub fn tokens_seen(&self) -> u64 {
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lexer::TokenLexer;
    use crate::environment::is_valid_name;

    fn token(text: &str) -> TokenDefinition {
        TokenLexer::new("{{", "}}")
            .classify(1, text, &is_valid_name)
            .unwrap()
    }

    #[test]
    fn test_suppression_follows_top() {
        let mut stack = FrameStack::new();
        assert!(!stack.is_suppressed());
        stack.push(Frame::new(token("if a"), true, true, 0));
        assert!(!stack.is_suppressed());
        stack.push(Frame::skipped(token("if b"), 0));
        assert!(stack.is_suppressed());
        stack.pop();
        assert!(!stack.is_suppressed());
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn test_each_frame_items() {
        let mut frame = Frame::new(token("each n : x => x.l"), true, true, 0)
            .with_resume(12)
            .with_items(vec!["b".into(), "c".into()]);
        assert_eq!(frame.resume_at, Some(12));
        let items = frame.items.as_mut().unwrap();
        assert_eq!(items.next().as_deref(), Some("b"));
        assert_eq!(items.next().as_deref(), Some("c"));
        assert_eq!(items.next(), None);
    }

    #[test]
    fn test_token_ids_increase() {
        let mut state = TemplateState::new();
        assert_eq!(state.next_token_id(), 1);
        assert_eq!(state.next_token_id(), 2);
        assert_eq!(state.tokens_seen(), 2);
    }
}
