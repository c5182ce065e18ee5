//! Weft - streaming token templates
//!
//! Weft renders text mixed with delimited tokens: value lookups, inline
//! expressions, definitions, `if`/`else` blocks and `while`/`each` loops.
//! Input is scanned incrementally, so large templates are rendered without
//! being held in memory; loop bodies are replayed by rewinding the read
//! cursor over buffers kept resident for as long as a loop is open.
//!
//! ```text
//! {{greeting:"Hello"}}{{greeting}}, {{name}}!
//! {{if admin}}(admin){{else}}(user){{/if}}
//! {{each n : x => x.list.Split(",")}}[{{n}}]{{/each}}
//! ```
//!
//! # Quick start
//!
//! ```
//! use weft::{render, Variables};
//!
//! let mut vars = Variables::new().with("token", "base").with("who", "us");
//! let out = render("all your {{token}} are belong to {{who}}.", &mut vars).unwrap();
//! assert_eq!(out, "all your base are belong to us.");
//! ```
//!
//! # Modules
//!
//! - [`core`]: buffers, scanners, lexer, frames, interpreter and engine
//! - [`expr`]: the default expression evaluator
//! - [`environment`]: the value environment
//! - [`options`]: render configuration
//! - [`utils`]: errors and character sources

pub mod core;
pub mod environment;
pub mod expr;
pub mod options;
pub mod renderer;
pub mod utils;

pub use crate::core::{TokenAction, TokenDefinition, TokenEvent, TokenKind};
pub use environment::{is_valid_name, ValueEnvironment, Variables};
pub use expr::{EvalError, EvalErrorKind, ExpressionEvaluator, MiniExpr, Value};
pub use options::{DelimiterStyle, MissingTokenPolicy, RenderOptions};
pub use renderer::Renderer;
pub use utils::error::{TemplateError, TemplateResult};

/// Render an in-memory template with default options.
pub fn render(template: &str, env: &mut dyn ValueEnvironment) -> TemplateResult<String> {
    render_with(template, env, RenderOptions::default())
}

/// Render an in-memory template with the given options.
pub fn render_with(
    template: &str,
    env: &mut dyn ValueEnvironment,
    options: RenderOptions,
) -> TemplateResult<String> {
    Renderer::new(options)?.render_str(template, env)
}
