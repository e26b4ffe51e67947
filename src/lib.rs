//! # tplset - composite template sets with include resolution and caching
//!
//! `tplset` is a convenience layer over [MiniJinja] for applications that
//! keep many small template files on disk and want to render them by
//! name. It adds:
//!
//! - Named-template loading from a base directory (or an in-memory map),
//!   with a filename postfix appended to every logical name
//! - Automatic resolution of `{% include %}` / `{% extends %}` directives
//!   into standalone files: requesting `"index"` loads `index`, scans it,
//!   and transitively loads everything it references into one composite
//!   template set, each file exactly once
//! - Concurrency-safe caching of built composites, keyed by the
//!   requested name list
//! - Per-status-code response handlers and an adapter that turns a
//!   "build a [`Response`]" function into a plain writer/request handler
//!
//! Two engine flavors share one implementation: [`Renderer::html`]
//! escapes rendered values for HTML, [`Renderer::plain`] does not.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tplset::{Params, Renderer};
//!
//! let mut renderer = Renderer::html("./templates", ".tpl.html", true);
//! renderer.func("shout", |args: &[minijinja::Value]| {
//!     Ok(minijinja::Value::from(args[0].to_string().to_uppercase()))
//! });
//!
//! // Renders ./templates/index.tpl.html, pulling in every template it
//! // includes; the composite is cached for the next call.
//! let mut out = Vec::new();
//! renderer.render(&mut out, None, &["index"])?;
//! # Ok::<(), tplset::RenderError>(())
//! ```
//!
//! ## Responses
//!
//! ```rust,no_run
//! use http::StatusCode;
//! use tplset::{http_handler, Params, Renderer, Response};
//!
//! # struct Writer;
//! # impl std::io::Write for Writer {
//! #     fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> { Ok(buf.len()) }
//! #     fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
//! # }
//! # impl tplset::ResponseWriter for Writer {
//! #     fn set_status(&mut self, _status: StatusCode) {}
//! # }
//! let mut renderer = Renderer::html("./templates", ".tpl.html", true);
//! renderer.register_handler(StatusCode::NOT_FOUND, |resp| {
//!     if let Some(writer) = resp.writer_mut() {
//!         writer.set_status(StatusCode::NOT_FOUND);
//!     }
//!     Ok(())
//! });
//!
//! let handler = http_handler(&renderer, |_renderer, _request| {
//!     Some(Response::new(StatusCode::OK, "index", Params::new()))
//! });
//! # let _: &dyn Fn(Writer, tplset::Request) = &handler;
//! ```
//!
//! ## Configuration vs rendering
//!
//! Configuration (functions, handlers, delimiters, defaults) takes
//! `&mut self`; rendering takes `&self`. Configure once at startup, then
//! share the renderer (e.g. behind `Arc`) with request-handling code.
//!
//! [MiniJinja]: https://docs.rs/minijinja

mod engine;
mod error;
mod render;
mod response;
mod store;

pub use engine::{CompositeTemplate, HtmlEngine, PlainEngine, TemplateEngine};
pub use error::RenderError;
pub use render::{Params, Renderer, TemplateFunction};
pub use response::{http_handler, Request, Response, ResponseHandler, ResponseWriter};
pub use store::{scan_includes, TemplateStore};
