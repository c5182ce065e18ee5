//! The streaming template engine.
//!
//! ```text
//!  CharSource ──► BufferManager ──► ParserEngine ──► io::Write
//!                                    │        ▲
//!                        TokenLexer ◄┘        │ (nested values)
//!                             │               │
//!                             ▼               │
//!                      TokenInterpreter ──────┘
//!                        │        │
//!                   FrameStack   ValueEnvironment / ExpressionEvaluator
//! ```

pub mod buffer;
pub mod engine;
pub mod frame;
pub mod interpreter;
pub mod lexer;
pub mod scanner;

pub use buffer::{shared_pool, BufferManager, BufferPool};
pub use engine::ParserEngine;
pub use frame::{Frame, FrameStack, TemplateState};
pub use interpreter::{is_truthy, Resolution, TokenAction, TokenCallback, TokenEvent, TokenInterpreter};
pub use lexer::{EvaluationMode, TokenDefinition, TokenKind, TokenLexer};
