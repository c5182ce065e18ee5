//! Utility modules
//!
//! This module contains shared helpers:
//! - Error types and result types
//! - Character sources for streaming input

pub mod error;
pub mod source;

// Re-export commonly used items
pub use error::{TemplateError, TemplateResult};
pub use source::{CharSource, StrSource, Utf8Source};
