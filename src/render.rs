//! The renderer: configuration surface, composite builder, render entry
//! points.
//!
//! # Composite builds
//!
//! [`Renderer::template`] turns an ordered list of logical names into one
//! [`CompositeTemplate`]: each requested file is read, scanned for
//! include directives, and every transitively referenced file is loaded
//! into the same composite before its parent is parsed. A visited set
//! shared across the whole build guarantees each logical name is read
//! and parsed at most once, even when reachable through multiple include
//! paths.
//!
//! Requested (top-level) names are required: a missing file fails the
//! build. Nested names discovered through includes are optional: a
//! missing file is skipped silently, leaving the composite without that
//! sub-template.
//!
//! # Caching
//!
//! Built composites are cached under the colon-joined requested name
//! list. Two requests with the same names in the same order share one
//! entry; overlapping but distinct name lists build independently. A
//! name containing `:` collides ambiguously with a different multi-name
//! request; names are expected not to contain the separator.
//!
//! The whole check-build-store sequence runs under one mutex per
//! renderer, serializing all builds (including unrelated keys) behind a
//! single lock. Template execution happens after the lock is released.
//!
//! # Configuration vs rendering
//!
//! Every configuration mutator takes `&mut self`, so the borrow checker
//! rules out configuration changes racing an in-flight render. Share a
//! configured renderer behind `Arc` once setup is done.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use minijinja::syntax::SyntaxConfig;
use minijinja::value::Rest;
use minijinja::Value;

use crate::engine::{CompositeTemplate, HtmlEngine, PlainEngine, TemplateEngine};
use crate::error::RenderError;
use crate::response::{Response, ResponseHandler};
use crate::store::{scan_includes, TemplateStore};

/// Parameter mapping passed to template execution.
pub type Params = serde_json::Map<String, serde_json::Value>;

/// A template function registered on a renderer.
///
/// Functions are variadic over engine values; each composite built after
/// registration exposes them under their registered name.
pub type TemplateFunction =
    Arc<dyn Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync>;

/// Renders named templates from a base directory, with composite caching
/// and per-status response handlers.
///
/// Construct with [`Renderer::html`] (HTML-escaping) or
/// [`Renderer::plain`] (non-escaping), or inject any
/// [`TemplateEngine`] via [`Renderer::with_engine`].
pub struct Renderer {
    store: TemplateStore,
    engine: Box<dyn TemplateEngine>,
    funcs: HashMap<String, TemplateFunction>,
    handlers: HashMap<http::StatusCode, ResponseHandler>,
    params: Params,
    delims: Option<(String, String)>,
    cache_enabled: bool,
    cache: Mutex<HashMap<String, Arc<CompositeTemplate>>>,
}

impl Renderer {
    /// Creates an HTML-escaping renderer over `root`.
    ///
    /// `postfix` is appended to every logical name when resolving files
    /// (`"index"` + `".tpl.html"` → `root/index.tpl.html`); a missing
    /// leading `.` is added. `cache_enabled` controls whether built
    /// composites are kept.
    pub fn html(root: impl Into<std::path::PathBuf>, postfix: &str, cache_enabled: bool) -> Self {
        Self::with_engine(Box::new(HtmlEngine), root, postfix, cache_enabled)
    }

    /// Creates a non-escaping renderer over `root`.
    pub fn plain(root: impl Into<std::path::PathBuf>, postfix: &str, cache_enabled: bool) -> Self {
        Self::with_engine(Box::new(PlainEngine), root, postfix, cache_enabled)
    }

    /// Creates a renderer with an injected engine flavor.
    pub fn with_engine(
        engine: Box<dyn TemplateEngine>,
        root: impl Into<std::path::PathBuf>,
        postfix: &str,
        cache_enabled: bool,
    ) -> Self {
        Self {
            store: TemplateStore::new(root, postfix),
            engine,
            funcs: HashMap::new(),
            handlers: HashMap::new(),
            params: Params::new(),
            delims: None,
            cache_enabled,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Replaces the backing filesystem with an in-memory map, keyed by
    /// resolved path (see [`TemplateStore::resolve_path`]).
    pub fn with_fs(&mut self, files: HashMap<String, String>) -> &mut Self {
        self.store.set_memory(files);
        self.cache.get_mut().unwrap().clear();
        self
    }

    /// Sets the default parameters merged into every render.
    ///
    /// Defaults are copied in after the caller's parameters, so on a key
    /// conflict the default value wins.
    pub fn set_params(&mut self, params: Params) -> &mut Self {
        self.params = params;
        self
    }

    /// Registers a template function. Registering the same name again
    /// overwrites; there is no removal.
    ///
    /// Already-cached composites keep the function set they were built
    /// with.
    pub fn func<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&[Value]) -> Result<Value, minijinja::Error> + Send + Sync + 'static,
    {
        self.funcs.insert(name.to_string(), Arc::new(f));
        self
    }

    /// Registers several template functions at once.
    pub fn funcs(&mut self, entries: impl IntoIterator<Item = (String, TemplateFunction)>) -> &mut Self {
        self.funcs.extend(entries);
        self
    }

    /// Names of all registered template functions.
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(|name| name.as_str())
    }

    /// Registers a handler invoked instead of the render path for
    /// responses carrying `status`. Overwrites any previous handler for
    /// the same status.
    pub fn register_handler<F>(&mut self, status: http::StatusCode, handler: F) -> &mut Self
    where
        F: Fn(&mut Response) -> Result<(), RenderError> + Send + Sync + 'static,
    {
        self.handlers.insert(status, Box::new(handler));
        self
    }

    /// Overrides the variable delimiters for all subsequent builds.
    ///
    /// Delimiters are baked into parsing, so every cached composite is
    /// invalidated. Block delimiters (`{% %}`) are unchanged, which keeps
    /// the include scanner accurate.
    pub fn set_delims(&mut self, open: &str, close: &str) -> &mut Self {
        self.delims = Some((open.to_string(), close.to_string()));
        self.cache.get_mut().unwrap().clear();
        self
    }

    /// Enables or disables composite caching. Disabling does not drop
    /// existing entries; they are simply no longer consulted.
    pub fn enable_cache(&mut self, enabled: bool) -> &mut Self {
        self.cache_enabled = enabled;
        self
    }

    /// Read-only access to the template store.
    pub fn store(&self) -> &TemplateStore {
        &self.store
    }

    /// Builds (or fetches from cache) the composite template for the
    /// ordered name list.
    ///
    /// The last name is conventionally the execution entry point used by
    /// [`render`](Self::render); `template` itself treats all names
    /// alike. See the module docs for the resolution and leniency rules.
    ///
    /// Executing an include of a name that was skipped at build time
    /// raises the engine's `TemplateNotFound`; write
    /// `{% include "x" ignore missing %}` for optional partials.
    pub fn template(&self, names: &[&str]) -> Result<Arc<CompositeTemplate>, RenderError> {
        if names.is_empty() {
            return Err(RenderError::EmptyRequest);
        }
        let key = names.join(":");

        let mut cache = self.cache.lock().unwrap();
        if self.cache_enabled {
            if let Some(hit) = cache.get(&key) {
                tracing::debug!(key = %key, "composite cache hit");
                return Ok(Arc::clone(hit));
            }
        }

        tracing::debug!(key = %key, "building composite template");
        let mut composite = self.new_composite()?;
        let mut exclude: Vec<String> = Vec::new();
        self.init_templates(&mut composite, names, &mut exclude)?;

        let composite = Arc::new(composite);
        if self.cache_enabled {
            cache.insert(key, Arc::clone(&composite));
        }
        Ok(composite)
    }

    /// Renders the last of `names` into `sink` with merged parameters.
    ///
    /// `params = None` starts from an empty mapping; the renderer's
    /// default parameters are then copied in on top either way.
    pub fn render(
        &self,
        sink: &mut dyn io::Write,
        params: Option<Params>,
        names: &[&str],
    ) -> Result<(), RenderError> {
        let entry = *names.last().ok_or(RenderError::EmptyRequest)?;

        let mut params = params.unwrap_or_default();
        for (key, value) in &self.params {
            params.insert(key.clone(), value.clone());
        }

        let composite = self.template(names)?;
        composite.render_to(entry, &params, sink)
    }

    /// Dispatches a bound [`Response`].
    ///
    /// A handler registered for the response's status is invoked
    /// exclusively; otherwise the response's template renders into its
    /// bound writer. The response's parameters are consumed either way.
    pub fn render_response(&self, resp: &mut Response) -> Result<(), RenderError> {
        if let Some(handler) = self.handlers.get(&resp.status) {
            return handler(resp);
        }

        let params = std::mem::take(&mut resp.params);
        let template = resp.template.clone();
        let writer = resp.writer_mut().ok_or(RenderError::ResponseUnbound)?;
        self.render(writer, Some(params), &[template.as_str()])
    }

    /// An empty composite carrying the engine flavor, registered
    /// functions, and delimiter overrides.
    fn new_composite(&self) -> Result<CompositeTemplate, RenderError> {
        let mut env = self.engine.environment();

        if let Some((open, close)) = &self.delims {
            let syntax = SyntaxConfig::builder()
                .variable_delimiters(open.clone(), close.clone())
                .build()?;
            env.set_syntax(syntax);
        }

        for (name, func) in &self.funcs {
            let func = Arc::clone(func);
            env.add_function(name.clone(), move |args: Rest<Value>| func(&args.0));
        }

        Ok(CompositeTemplate::new(env))
    }

    /// Recursive include resolution.
    ///
    /// `exclude` is the visited set of nested names already scheduled
    /// anywhere in this build; it starts empty, so an empty set marks
    /// the top-level call where read failures are fatal.
    fn init_templates<S: AsRef<str>>(
        &self,
        composite: &mut CompositeTemplate,
        names: &[S],
        exclude: &mut Vec<String>,
    ) -> Result<(), RenderError> {
        let top_level = exclude.is_empty();

        for name in names {
            let name = name.as_ref();
            if composite.has(name) {
                continue;
            }

            let content = match self.store.read(name) {
                Ok(content) => content,
                Err(err) if !top_level => {
                    tracing::debug!(template = name, error = %err, "skipping missing nested template");
                    continue;
                }
                Err(err) => return Err(err),
            };

            let nested: Vec<String> = scan_includes(&content)
                .into_iter()
                .filter(|n| !exclude.iter().any(|seen| seen == n))
                .collect();
            exclude.extend(nested.iter().cloned());

            // Descendants register into the composite before the parent
            // parses, so the parent's includes resolve at execution time.
            if !nested.is_empty() {
                self.init_templates(composite, &nested, exclude)?;
            }

            composite.add(name, content)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_renderer(files: &[(&str, &str)]) -> Renderer {
        let mut renderer = Renderer::plain("", ".html", true);
        renderer.with_fs(
            files
                .iter()
                .map(|(name, content)| (format!("{}.html", name), content.to_string()))
                .collect(),
        );
        renderer
    }

    fn render_str(renderer: &Renderer, params: Option<Params>, names: &[&str]) -> String {
        let mut out = Vec::new();
        renderer.render(&mut out, params, names).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_template_empty_request() {
        let renderer = memory_renderer(&[]);
        assert!(matches!(
            renderer.template(&[]),
            Err(RenderError::EmptyRequest)
        ));
    }

    #[test]
    fn test_cache_returns_identical_composite() {
        let renderer = memory_renderer(&[("index", "hello")]);
        let first = renderer.template(&["index"]).unwrap();
        let second = renderer.template(&["index"]).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_disabled_rebuilds() {
        let mut renderer = memory_renderer(&[("index", "hello")]);
        renderer.enable_cache(false);
        let first = renderer.template(&["index"]).unwrap();
        let second = renderer.template(&["index"]).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_cache_key_is_order_sensitive() {
        let renderer = memory_renderer(&[("a", "A"), ("b", "B")]);
        let ab = renderer.template(&["a", "b"]).unwrap();
        let ba = renderer.template(&["b", "a"]).unwrap();
        assert!(!Arc::ptr_eq(&ab, &ba));

        let ab_again = renderer.template(&["a", "b"]).unwrap();
        assert!(Arc::ptr_eq(&ab, &ab_again));
    }

    #[test]
    fn test_nested_includes_resolved_transitively() {
        let renderer = memory_renderer(&[
            ("index", r#"[{% include "header" %}]"#),
            ("header", r#"H({% include "logo" %})"#),
            ("logo", "L"),
        ]);
        let out = render_str(&renderer, None, &["index"]);
        assert_eq!(out, "[H(L)]");
    }

    #[test]
    fn test_diamond_include_parsed_once() {
        // index -> header, footer; both -> shared. The shared partial is
        // loaded once and both includes resolve against it.
        let renderer = memory_renderer(&[
            ("index", r#"{% include "header" %}|{% include "footer" %}"#),
            ("header", r#"h:{% include "shared" %}"#),
            ("footer", r#"f:{% include "shared" %}"#),
            ("shared", "S"),
        ]);
        let composite = renderer.template(&["index"]).unwrap();
        assert!(composite.has("shared"));
        let out = render_str(&renderer, None, &["index"]);
        assert_eq!(out, "h:S|f:S");
    }

    #[test]
    fn test_cyclic_includes_terminate() {
        let renderer = memory_renderer(&[
            ("a", r#"A{% include "b" ignore missing %}"#),
            ("b", r#"B{% include "a" ignore missing %}"#),
        ]);
        let composite = renderer.template(&["a"]).unwrap();
        assert!(composite.has("a"));
        assert!(composite.has("b"));
    }

    #[test]
    fn test_missing_top_level_fails() {
        let renderer = memory_renderer(&[]);
        let err = renderer.template(&["ghost"]).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_nested_is_skipped() {
        let renderer = memory_renderer(&[(
            "index",
            r#"ok {% include "missing-partial" ignore missing %}done"#,
        )]);
        let composite = renderer.template(&["index"]).unwrap();
        assert!(composite.has("index"));
        assert!(!composite.has("missing-partial"));

        let out = render_str(&renderer, None, &["index"]);
        assert_eq!(out, "ok done");
    }

    #[test]
    fn test_nested_parse_failure_aborts_build() {
        let renderer = memory_renderer(&[
            ("index", r#"{% include "bad" %}"#),
            ("bad", "{% if %}"),
        ]);
        let result = renderer.template(&["index"]);
        assert!(matches!(result, Err(RenderError::Engine(_))));

        // Failed builds never populate the cache.
        let retry = renderer.template(&["index"]);
        assert!(retry.is_err());
    }

    #[test]
    fn test_execution_failure_keeps_composite_cached() {
        let mut renderer = memory_renderer(&[("index", "{{ boom() }}")]);
        renderer.func("boom", |_args: &[Value]| {
            Err(minijinja::Error::new(
                minijinja::ErrorKind::InvalidOperation,
                "boom",
            ))
        });

        let built = renderer.template(&["index"]).unwrap();
        let mut out = Vec::new();
        assert!(renderer.render(&mut out, None, &["index"]).is_err());

        // Only the execution failed; the composite is still served.
        let again = renderer.template(&["index"]).unwrap();
        assert!(Arc::ptr_eq(&built, &again));
    }

    #[test]
    fn test_render_uses_last_name_as_entry_point() {
        let renderer = memory_renderer(&[("a", "A"), ("b", "B")]);
        assert_eq!(render_str(&renderer, None, &["a", "b"]), "B");
        assert_eq!(render_str(&renderer, None, &["b", "a"]), "A");
    }

    #[test]
    fn test_default_params_merge() {
        let mut renderer = memory_renderer(&[("index", "{{ global }}/{{ p1 }}")]);
        let mut defaults = Params::new();
        defaults.insert("global".into(), json!("param"));
        renderer.set_params(defaults);

        // None starts from an empty mapping; undefined lookups print empty.
        assert_eq!(render_str(&renderer, None, &["index"]), "param/");

        // Caller-supplied keys survive the merge.
        let mut caller = Params::new();
        caller.insert("p1".into(), json!(1));
        assert_eq!(render_str(&renderer, Some(caller), &["index"]), "param/1");
    }

    #[test]
    fn test_default_params_win_on_conflict() {
        let mut renderer = memory_renderer(&[("index", "{{ v }}")]);
        let mut defaults = Params::new();
        defaults.insert("v".into(), json!("default"));
        renderer.set_params(defaults);

        let mut caller = Params::new();
        caller.insert("v".into(), json!("caller"));
        assert_eq!(render_str(&renderer, Some(caller), &["index"]), "default");
    }

    #[test]
    fn test_registered_function_available() {
        let mut renderer = memory_renderer(&[("index", "{{ f1() }}-{{ f2() }}")]);
        renderer
            .func("f1", |_args: &[Value]| Ok(Value::from("f1")))
            .func("f2", |_args: &[Value]| Ok(Value::from("f2")));
        assert_eq!(renderer.function_names().count(), 2);
        assert_eq!(render_str(&renderer, None, &["index"]), "f1-f2");
    }

    #[test]
    fn test_bulk_function_registration() {
        let mut renderer = memory_renderer(&[("index", "{{ a() }}{{ b() }}")]);
        let entries: Vec<(String, TemplateFunction)> = vec![
            (
                "a".to_string(),
                Arc::new(|_args: &[Value]| Ok(Value::from("A"))),
            ),
            (
                "b".to_string(),
                Arc::new(|_args: &[Value]| Ok(Value::from("B"))),
            ),
        ];
        renderer.funcs(entries);
        assert_eq!(render_str(&renderer, None, &["index"]), "AB");
    }

    #[test]
    fn test_function_reregistration_overwrites() {
        let mut renderer = memory_renderer(&[("index", "{{ f() }}")]);
        renderer.func("f", |_args: &[Value]| Ok(Value::from("old")));
        renderer.func("f", |_args: &[Value]| Ok(Value::from("new")));
        assert_eq!(render_str(&renderer, None, &["index"]), "new");
    }

    #[test]
    fn test_function_receives_arguments() {
        let mut renderer = memory_renderer(&[("index", "{{ join('a', 'b') }}")]);
        renderer.func("join", |args: &[Value]| {
            let parts: Vec<String> = args.iter().map(|v| v.to_string()).collect();
            Ok(Value::from(parts.join("+")))
        });
        assert_eq!(render_str(&renderer, None, &["index"]), "a+b");
    }

    #[test]
    fn test_set_delims_changes_variable_syntax() {
        let mut renderer = memory_renderer(&[("index", "<< v >>")]);
        renderer.set_delims("<<", ">>");
        let mut params = Params::new();
        params.insert("v".into(), json!("x"));
        assert_eq!(render_str(&renderer, Some(params), &["index"]), "x");
    }

    #[test]
    fn test_set_delims_invalidates_cache() {
        let renderer_files: HashMap<String, String> =
            [("index.html".to_string(), "one".to_string())].into();
        let mut renderer = Renderer::plain("", ".html", true);
        renderer.with_fs(renderer_files);

        let before = renderer.template(&["index"]).unwrap();
        renderer.set_delims("{{", "}}");
        let after = renderer.template(&["index"]).unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_html_renderer_escapes_plain_does_not() {
        let files: Vec<(&str, &str)> = vec![("index", "{{ v }}")];

        let html = {
            let mut renderer = Renderer::html("", ".html", true);
            renderer.with_fs(
                files
                    .iter()
                    .map(|(n, c)| (format!("{}.html", n), c.to_string()))
                    .collect(),
            );
            renderer
        };
        let plain = memory_renderer(&files);

        let mut params = Params::new();
        params.insert("v".into(), json!("<b>"));

        assert_eq!(render_str(&html, Some(params.clone()), &["index"]), "&lt;b&gt;");
        assert_eq!(render_str(&plain, Some(params), &["index"]), "<b>");
    }
}
