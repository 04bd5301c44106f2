//! The error taxonomy of the interpreter.
//!
//! Three channels exist, and they are deliberately kept apart:
//! - [`Error`] aborts the current page. It is reserved for malformed
//!   content streams, resolver I/O failures and features whose absence
//!   would silently corrupt the output.
//! - [`InterpreterWarning`] reports degraded output (a skipped glyph, a
//!   missing shading). The page keeps rendering.
//! - `log::warn!`/`log::debug!` carry free-form diagnostics.

use std::sync::Arc;

use thiserror::Error;

/// A fatal error while interpreting a page.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The content stream itself is malformed.
    #[error("malformed content stream: {0}")]
    Structural(#[from] StructuralError),
    /// A feature whose silent approximation would produce visibly wrong
    /// output.
    #[error("unsupported feature: {0}")]
    Unsupported(#[from] UnsupportedFeature),
    /// The resource resolver failed to produce an object it should have
    /// been able to produce.
    #[error("resource resolution failed: {0}")]
    Resource(#[from] ResourceError),
}

/// Errors indicating a malformed content stream.
///
/// These are reported as their own class so that a caller running a
/// multi-page pipeline can attribute the failure to a specific page
/// without corrupting its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructuralError {
    /// A restore-state operator arrived with no matching save.
    ///
    /// Continuing after this would desynchronize every following
    /// operator, so it fails loudly instead of no-opping.
    #[error("restore without matching save")]
    UnbalancedRestore,
    /// A paint or clip operator arrived while no path was open.
    #[error("paint operator with no open path")]
    PaintWithoutPath,
}

/// Features the interpreter refuses to approximate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnsupportedFeature {
    /// Painting with a tiling pattern.
    #[error("tiling pattern paint type {0}")]
    TilingPattern(u8),
    /// A soft mask with a subtype other than `Luminosity` or `Alpha`.
    #[error("invalid soft mask subtype {0:?}")]
    InvalidSoftMaskSubtype(Arc<str>),
}

/// An I/O or lookup failure inside the resource resolver.
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct ResourceError {
    /// Human-readable description of the failure.
    pub reason: Arc<str>,
}

impl ResourceError {
    /// Create a new resolution error.
    pub fn new(reason: impl Into<Arc<str>>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Warnings emitted while interpreting a page.
///
/// Unlike [`Error`], a warning never aborts the page; it flags output
/// that was degraded on purpose.
#[derive(Debug, Clone)]
pub enum InterpreterWarning {
    /// An operator was not recognized and has been skipped.
    UnknownOperator(Arc<str>),
    /// An operator carried operands of the wrong shape.
    MalformedOperands(Arc<str>),
    /// A shading was missing from the resources; the region was filled
    /// with nothing.
    MissingShading(Arc<str>),
    /// No outline was available for a glyph; only its advance was kept.
    MissingGlyphOutline { font: Arc<str>, code: u16 },
    /// A character code had no glyph mapping; a placeholder was drawn.
    PlaceholderGlyph { font: Arc<str>, code: u16 },
    /// A blend mode other than `Normal` was requested and approximated.
    ApproximatedBlendMode,
}

/// A callback function receiving warnings during interpretation.
pub type WarningSinkFn = Arc<dyn Fn(InterpreterWarning) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_errors_are_their_own_class() {
        let err = Error::from(StructuralError::UnbalancedRestore);
        assert!(matches!(
            err,
            Error::Structural(StructuralError::UnbalancedRestore)
        ));
    }

    #[test]
    fn error_messages_name_the_feature() {
        let err = Error::from(UnsupportedFeature::TilingPattern(2));
        assert_eq!(
            err.to_string(),
            "unsupported feature: tiling pattern paint type 2"
        );
    }
}
