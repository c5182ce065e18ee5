//! The public rendering entry point.

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::time::Instant;

use crate::core::buffer::{shared_pool, BufferManager, BufferPool};
use crate::core::engine::ParserEngine;
use crate::core::frame::TemplateState;
use crate::core::interpreter::{TokenCallback, TokenEvent, TokenInterpreter};
use crate::environment::ValueEnvironment;
use crate::expr::{ExpressionEvaluator, MiniExpr};
use crate::options::RenderOptions;
use crate::utils::error::{TemplateError, TemplateResult};
use crate::utils::source::Utf8Source;

/// Renders templates with one set of options, evaluator and callback.
///
/// ```
/// use weft::{Renderer, RenderOptions, Variables};
///
/// let mut vars = Variables::new().with("who", "us");
/// let mut renderer = Renderer::new(RenderOptions::default()).unwrap();
/// let out = renderer.render_str("all your base are belong to {{who}}.", &mut vars).unwrap();
/// assert_eq!(out, "all your base are belong to us.");
/// ```
pub struct Renderer<'cb> {
    options: RenderOptions,
    evaluator: Box<dyn ExpressionEvaluator + 'cb>,
    callback: Option<Box<TokenCallback<'cb>>>,
    pool: Arc<BufferPool>,
}

impl<'cb> Renderer<'cb> {
    pub fn new(options: RenderOptions) -> TemplateResult<Self> {
        options.validate()?;
        Ok(Self {
            options,
            evaluator: Box::new(MiniExpr::new()),
            callback: None,
            pool: shared_pool(),
        })
    }

    /// Replace the default [`MiniExpr`] evaluator.
    pub fn with_evaluator(mut self, evaluator: impl ExpressionEvaluator + 'cb) -> Self {
        self.evaluator = Box::new(evaluator);
        self
    }

    /// Use a private buffer pool instead of the shared one.
    pub fn with_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Observe and override the outcome of every rendered value token.
    pub fn on_token<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&mut TokenEvent<'_>) + 'cb,
    {
        self.callback = Some(Box::new(callback));
        self
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Render an in-memory template.
    pub fn render_str(
        &mut self,
        template: &str,
        env: &mut dyn ValueEnvironment,
    ) -> TemplateResult<String> {
        let mut buffers = BufferManager::fixed(template);
        let mut out = Vec::with_capacity(template.len());
        self.execute(&mut buffers, &mut out, env)?;
        String::from_utf8(out)
            .map_err(|err| TemplateError::Io(io::Error::new(io::ErrorKind::InvalidData, err)))
    }

    /// Render UTF-8 text from `reader` into `writer` without holding the
    /// whole template in memory.
    pub fn render<R: Read, W: Write>(
        &mut self,
        reader: R,
        mut writer: W,
        env: &mut dyn ValueEnvironment,
    ) -> TemplateResult<()> {
        let mut source = Utf8Source::new(reader);
        let mut buffers = BufferManager::streaming(
            &mut source,
            self.options.buffer_size,
            Arc::clone(&self.pool),
        );
        self.execute(&mut buffers, &mut writer, env)?;
        writer.flush()?;
        Ok(())
    }

    fn execute(
        &mut self,
        buffers: &mut BufferManager<'_>,
        out: &mut dyn Write,
        env: &mut dyn ValueEnvironment,
    ) -> TemplateResult<()> {
        let start = Instant::now();
        log::debug!(
            "render start ({} buffers, delimiters {} {})",
            if buffers.is_fixed() { "fixed" } else { "streaming" },
            self.options.delimiters.left(),
            self.options.delimiters.right()
        );

        let interpreter = TokenInterpreter::new(
            &self.options,
            self.evaluator.as_ref(),
            env,
            self.callback.as_deref_mut(),
        );
        let mut engine = ParserEngine::new(
            interpreter,
            self.options.delimiters.left(),
            self.options.delimiters.right(),
            self.options.max_recursion_depth,
        );
        let mut state = TemplateState::new();
        let result = engine.run(buffers, out, &mut state, 0);
        buffers.release();

        match &result {
            Ok(()) => log::debug!(
                "render finished: {} tokens in {:?}",
                state.tokens_seen(),
                start.elapsed()
            ),
            Err(err) if err.is_template_fault() => log::debug!(
                "template rejected near offset {} after {} tokens: {}",
                state.position,
                state.tokens_seen(),
                err
            ),
            Err(err) => log::warn!(
                "render aborted after {} tokens: {}",
                state.tokens_seen(),
                err
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Variables;
    use crate::expr::{EvalResult, Value};

    #[test]
    fn test_render_str_and_stream_agree() {
        let template = "{{if name}}hi {{name}}{{else}}nobody{{/if}}";
        let mut renderer = Renderer::new(RenderOptions::default().with_buffer_size(3)).unwrap();

        let mut vars = Variables::new().with("name", "ann");
        let in_memory = renderer.render_str(template, &mut vars).unwrap();

        let mut out = Vec::new();
        renderer
            .render(template.as_bytes(), &mut out, &mut vars)
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), in_memory);
        assert_eq!(in_memory, "hi ann");
    }

    #[test]
    fn test_pool_released_after_error() {
        let pool = Arc::new(BufferPool::new(8));
        let mut renderer = Renderer::new(RenderOptions::default().with_buffer_size(2))
            .unwrap()
            .with_pool(Arc::clone(&pool));
        let mut vars = Variables::new();
        let mut out = Vec::new();
        let err = renderer
            .render("{{while go}}abc".as_bytes(), &mut out, &mut vars)
            .unwrap_err();
        assert!(matches!(err, TemplateError::UnterminatedBlock { .. }));
        assert_eq!(pool.outstanding(), 0);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "source closed"))
        }
    }

    #[test]
    fn test_source_failure_is_not_a_template_fault() {
        let mut renderer = Renderer::new(RenderOptions::default()).unwrap();
        let mut vars = Variables::new();
        let mut out = Vec::new();
        let err = renderer
            .render(FailingReader, &mut out, &mut vars)
            .unwrap_err();
        assert!(matches!(err, TemplateError::Io(_)));
        assert!(!err.is_template_fault());

        let err = renderer
            .render("{{if x}}".as_bytes(), &mut out, &mut vars)
            .unwrap_err();
        assert!(err.is_template_fault());
    }

    #[test]
    fn test_custom_evaluator() {
        let evaluator = |text: &str, _env: &dyn ValueEnvironment| -> EvalResult<Value> {
            Ok(Value::Str(text.len().to_string()))
        };
        let mut renderer = Renderer::new(RenderOptions::default())
            .unwrap()
            .with_evaluator(evaluator);
        let mut vars = Variables::new();
        assert_eq!(renderer.render_str("{{x => 12}}", &mut vars).unwrap(), "7");
    }

    #[test]
    fn test_rejects_invalid_options() {
        assert!(Renderer::new(RenderOptions::default().with_buffer_size(0)).is_err());
    }
}
