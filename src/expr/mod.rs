//! MiniExpr: the default expression evaluator.
//!
//! Templates embed expressions as lambdas over the value environment:
//!
//! ```text
//! {{x => int.Parse(x.counter) + 1}}
//! {{each n : x => x.list.Split(",")}}...{{/each}}
//! ```
//!
//! The renderer only depends on the [`ExpressionEvaluator`] trait; [`MiniExpr`]
//! is the implementation used unless another one is plugged in.
//!
//! # Architecture
//!
//! ```text
//! expression text
//!        │
//!        ▼
//!    ┌───────────────┐
//!    │ CompileCache  │  (process-wide, one compile per text)
//!    │   + parser    │
//!    └───────────────┘
//!        │  Arc<Lambda>
//!        ▼
//!    ┌───────────────┐
//!    │   evaluator   │  (param bound to the environment)
//!    └───────────────┘
//!        │
//!        ▼
//!      Value
//! ```

mod cache;
mod eval;
mod library;
mod ops;
mod parser;
mod value;

use std::sync::Arc;

pub use cache::{shared_cache, CompileCache};
pub use parser::{parse_lambda, BinaryOp, Expr, Lambda, UnaryOp};
pub use value::{EvalError, EvalErrorKind, EvalResult, SourceSpan, Value};

use crate::environment::ValueEnvironment;

/// Pluggable capability that executes expression text against an environment.
pub trait ExpressionEvaluator {
    fn evaluate(&self, text: &str, env: &dyn ValueEnvironment) -> EvalResult<Value>;
}

impl<F> ExpressionEvaluator for F
where
    F: Fn(&str, &dyn ValueEnvironment) -> EvalResult<Value>,
{
    fn evaluate(&self, text: &str, env: &dyn ValueEnvironment) -> EvalResult<Value> {
        self(text, env)
    }
}

/// Default evaluator backed by a [`CompileCache`].
#[derive(Debug, Clone)]
pub struct MiniExpr {
    cache: Arc<CompileCache>,
}

impl MiniExpr {
    /// Evaluator using the process-wide shared cache.
    pub fn new() -> Self {
        Self {
            cache: shared_cache(),
        }
    }

    /// Evaluator with a private cache.
    pub fn with_cache(cache: Arc<CompileCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<CompileCache> {
        &self.cache
    }

    /// Drop every compiled expression held by this evaluator's cache.
    pub fn reset_cache(&self) {
        self.cache.clear();
    }
}

impl Default for MiniExpr {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionEvaluator for MiniExpr {
    fn evaluate(&self, text: &str, env: &dyn ValueEnvironment) -> EvalResult<Value> {
        let lambda = self.cache.get_or_compile(text.trim())?;
        eval::eval_lambda(&lambda, env)
    }
}
