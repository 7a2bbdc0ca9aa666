//! Trait definitions for transformation capabilities.

/// Errors that can occur during transformation.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{line}:{column}: {message}")]
    Syntax {
        line: usize,
        column: usize,
        message: String,
    },

    #[error("Rejected by transform module: {0}")]
    Rejected(String),

    #[error("Transform module I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransformError {
    /// Whether the capability refused the input as malformed source.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. } | Self::Rejected(_))
    }
}

/// A source-to-source transformation capability.
///
/// Implementations are driven through [`crate::TransformEngine`], which
/// guarantees that no two calls overlap.
pub trait Transform: Send {
    /// Identifier used in logs (e.g. "jsx", or the module path)
    fn name(&self) -> &str;

    /// Transform raw source text into compiled script text.
    fn transform(&mut self, source: &str) -> Result<String, TransformError>;
}
