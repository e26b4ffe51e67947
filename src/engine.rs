//! Template engine abstraction and composite template sets.
//!
//! [`TemplateEngine`] is the seam between the renderer and the backing
//! engine. The two shipped implementations differ only in escaping
//! policy: [`HtmlEngine`] escapes rendered values for HTML,
//! [`PlainEngine`] writes them through untouched. The flavor is picked
//! once at renderer construction, never inspected at runtime.
//!
//! A [`CompositeTemplate`] is one fully-built set of named sub-templates
//! (a dedicated [`minijinja::Environment`]): the requested top-level
//! names plus everything they transitively include, each parsed exactly
//! once. Composites are immutable after the build and shared out of the
//! renderer's cache.

use std::io;

use minijinja::{AutoEscape, Environment, Value};
use serde::Serialize;

use crate::error::RenderError;

/// Capability set the renderer needs from a template backend.
///
/// An engine hands out fresh, empty environments carrying its escaping
/// policy; the composite builder then installs functions, delimiters,
/// and sub-templates on top.
pub trait TemplateEngine: Send + Sync {
    /// A fresh environment with this engine's escaping policy applied.
    fn environment(&self) -> Environment<'static>;
}

/// HTML-escaping engine flavor.
///
/// Every template in a composite built from this engine auto-escapes
/// interpolated values for HTML, regardless of the template's name.
pub struct HtmlEngine;

impl TemplateEngine for HtmlEngine {
    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::Html);
        env
    }
}

/// Non-escaping engine flavor for plain-text output.
pub struct PlainEngine;

impl TemplateEngine for PlainEngine {
    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env
    }
}

/// One built set of named sub-templates.
///
/// Owned by the renderer's cache once built; sub-templates are addressed
/// by logical name. Executing a name whose include target was never
/// loaded (missing nested file without `ignore missing`) surfaces the
/// engine's own `TemplateNotFound` at execution time.
#[derive(Debug)]
pub struct CompositeTemplate {
    env: Environment<'static>,
}

impl CompositeTemplate {
    pub(crate) fn new(env: Environment<'static>) -> Self {
        Self { env }
    }

    pub(crate) fn add(&mut self, name: &str, source: String) -> Result<(), RenderError> {
        self.env.add_template_owned(name.to_string(), source)?;
        Ok(())
    }

    /// True if a sub-template with this logical name was parsed into the
    /// composite.
    pub fn has(&self, name: &str) -> bool {
        self.env.get_template(name).is_ok()
    }

    /// Executes the named sub-template with `data`, writing to `sink`.
    ///
    /// No partial-output guarantee: the engine may have written bytes
    /// before a mid-render failure.
    pub fn render_to<S: Serialize>(
        &self,
        name: &str,
        data: S,
        sink: &mut dyn io::Write,
    ) -> Result<(), RenderError> {
        let tmpl = self.env.get_template(name)?;
        tmpl.render_to_write(Value::from_serialize(&data), sink)?;
        Ok(())
    }
}
