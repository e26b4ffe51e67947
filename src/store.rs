//! Template store: logical name to file content.
//!
//! The store owns path resolution (base directory + logical name +
//! postfix), raw content reads from disk or an in-memory filesystem, and
//! the include-directive scanner used by the composite builder.
//!
//! # Include scanning
//!
//! [`scan_includes`] is a textual scan over raw template source, not a
//! parse of the engine's grammar. It matches the engine's include family
//! (`{% include %}`, `{% extends %}`, `{% import %}`, `{% from %}`) with
//! single or double quotes around the name and ignores everything after
//! the name up to the closing `%}`. Directives assembled dynamically at
//! render time are invisible to it. This is a deliberate simplification:
//! the scanner only decides which files to load, the engine still parses
//! the directives for real.
//!
//! The scan is pinned to the default `{% %}` block delimiters. Delimiter
//! overrides on the renderer change only the *variable* delimiters, so
//! the scan stays accurate under them.

use std::collections::HashMap;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::RenderError;

static INCLUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{%-?\s*(?:include|extends|import|from)\s+['"]([^'"]+)['"][^%]*%\}"#)
        .expect("include directive regex is valid")
});

/// Extracts every distinct template name referenced by an include
/// directive, in first-occurrence order.
pub fn scan_includes(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in INCLUDE_RE.captures_iter(content) {
        let name = &caps[1];
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Resolves logical template names to file content.
///
/// Content comes from the real filesystem rooted at the base directory,
/// or from an in-memory map when one is configured (keyed by resolved
/// path, useful for embedded template sets and tests).
pub struct TemplateStore {
    root: PathBuf,
    postfix: String,
    memory: Option<HashMap<String, String>>,
}

impl TemplateStore {
    /// Creates a store over the real filesystem.
    ///
    /// A non-empty `postfix` that does not already start with `.` gets
    /// one prepended, so `"html"` and `".html"` behave identically.
    pub fn new(root: impl Into<PathBuf>, postfix: &str) -> Self {
        Self {
            root: root.into(),
            postfix: normalize_postfix(postfix),
            memory: None,
        }
    }

    /// Replaces the backing filesystem with an in-memory map.
    ///
    /// Keys are resolved paths as produced by [`resolve_path`](Self::resolve_path)
    /// (with an empty root, just `name` + postfix).
    pub fn set_memory(&mut self, files: HashMap<String, String>) {
        self.memory = Some(files);
    }

    /// Joins base directory, logical name, and postfix. Pure, no I/O.
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}{}", name, self.postfix))
    }

    /// Reads the content for a logical name.
    ///
    /// Returns [`RenderError::NotFound`] if the resolved path does not
    /// exist (in either backing filesystem), [`RenderError::Io`] for any
    /// other read failure. No retries, no recovery.
    pub fn read(&self, name: &str) -> Result<String, RenderError> {
        let path = self.resolve_path(name);
        match &self.memory {
            Some(files) => files
                .get(path.to_string_lossy().as_ref())
                .cloned()
                .ok_or_else(|| RenderError::NotFound {
                    name: name.to_string(),
                    path,
                }),
            None => std::fs::read_to_string(&path).map_err(|err| {
                if err.kind() == std::io::ErrorKind::NotFound {
                    RenderError::NotFound {
                        name: name.to_string(),
                        path,
                    }
                } else {
                    RenderError::Io { path, source: err }
                }
            }),
        }
    }

    /// The normalized postfix (empty, or starting with `.`).
    pub fn postfix(&self) -> &str {
        &self.postfix
    }
}

fn normalize_postfix(postfix: &str) -> String {
    if postfix.is_empty() || postfix.starts_with('.') {
        postfix.to_string()
    } else {
        format!(".{}", postfix)
    }
}
