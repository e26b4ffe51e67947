//! Error types for template loading and rendering.
//!
//! [`RenderError`] is the single error type returned by every public
//! operation. Engine errors (parse and execution failures) are carried
//! verbatim inside [`RenderError::Engine`] rather than re-classified;
//! callers needing finer distinctions inspect the wrapped
//! [`minijinja::Error`] kind.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for template store, build, render, and dispatch operations.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A requested top-level template file does not exist.
    ///
    /// Nested (include-referenced) templates never produce this error
    /// during a build; they are skipped instead.
    #[error("template not found: \"{name}\" ({path})")]
    NotFound {
        /// The logical template name that was requested.
        name: String,
        /// The resolved path that was probed.
        path: PathBuf,
    },

    /// Reading a template file failed for a reason other than absence.
    #[error("failed to read template {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Parse or execution failure from the template engine, unchanged.
    #[error(transparent)]
    Engine(#[from] minijinja::Error),

    /// A render was requested with an empty template name list.
    #[error("no template names requested")]
    EmptyRequest,

    /// A [`Response`](crate::Response) reached the render path without a
    /// bound output writer.
    #[error("response has no bound writer")]
    ResponseUnbound,
}

impl RenderError {
    /// True for the not-found variants (missing file or missing named
    /// sub-template inside a composite).
    pub fn is_not_found(&self) -> bool {
        match self {
            RenderError::NotFound { .. } => true,
            RenderError::Engine(err) => err.kind() == minijinja::ErrorKind::TemplateNotFound,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = RenderError::NotFound {
            name: "index".to_string(),
            path: PathBuf::from("/tpl/index.html"),
        };
        assert!(err.to_string().contains("template not found"));
        assert!(err.to_string().contains("index"));
    }

    #[test]
    fn test_is_not_found() {
        let err = RenderError::NotFound {
            name: "x".into(),
            path: PathBuf::new(),
        };
        assert!(err.is_not_found());

        let engine = RenderError::Engine(minijinja::Error::new(
            minijinja::ErrorKind::TemplateNotFound,
            "template \"x\" does not exist",
        ));
        assert!(engine.is_not_found());

        assert!(!RenderError::EmptyRequest.is_not_found());
    }

    #[test]
    fn test_engine_error_passes_through_verbatim() {
        let inner = minijinja::Error::new(minijinja::ErrorKind::SyntaxError, "unexpected `}`");
        let msg = inner.to_string();
        let err: RenderError = inner.into();
        assert_eq!(err.to_string(), msg);
    }
}
