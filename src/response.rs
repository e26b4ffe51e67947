//! Response objects, per-status handlers, and the HTTP handler adapter.
//!
//! A [`Response`] is a value object describing what to render for one
//! request outcome: a status code, a logical template name, and a
//! parameter mapping. The adapter binds the output writer and the
//! originating request onto it, and the renderer's dispatch consumes it
//! exactly once.
//!
//! The adapter passes the renderer to the application handler as an
//! explicit argument; there is no ambient request-scoped injection.

use std::io::{self, Write};

use http::StatusCode;

use crate::error::RenderError;
use crate::render::{Params, Renderer};

/// The inbound request type carried by a bound response.
pub type Request = http::Request<Vec<u8>>;

/// Output sink for a response: byte writes plus a status channel.
///
/// This is the seam to the collaborating HTTP layer. Server integrations
/// implement it over their response writer; tests use a recorder.
pub trait ResponseWriter: io::Write + Send {
    /// Records the status code for the response being written.
    fn set_status(&mut self, status: StatusCode);
}

/// A handler registered for one status code, invoked instead of the
/// render path for responses carrying that status.
pub type ResponseHandler = Box<dyn Fn(&mut Response) -> Result<(), RenderError> + Send + Sync>;

/// What to render (or which handler to invoke) for one request outcome.
pub struct Response {
    /// Target status code; decides handler dispatch.
    pub status: StatusCode,
    /// Logical template name rendered when no handler is registered.
    pub template: String,
    /// Parameters for the render, consumed by dispatch.
    pub params: Params,
    writer: Option<Box<dyn ResponseWriter>>,
    request: Option<Request>,
}

impl Response {
    /// Creates an unbound response.
    pub fn new(status: StatusCode, template: impl Into<String>, params: Params) -> Self {
        Self {
            status,
            template: template.into(),
            params,
            writer: None,
            request: None,
        }
    }

    /// Binds the output writer and originating request.
    pub fn bind(&mut self, writer: Box<dyn ResponseWriter>, request: Request) -> &mut Self {
        self.writer = Some(writer);
        self.request = Some(request);
        self
    }

    /// Merges additional parameters in; existing keys keep their value.
    pub fn update_params(&mut self, params: Params) -> &mut Self {
        for (key, value) in params {
            self.params.entry(key).or_insert(value);
        }
        self
    }

    /// The bound output writer, if any.
    pub fn writer_mut(&mut self) -> Option<&mut Box<dyn ResponseWriter>> {
        self.writer.as_mut()
    }

    /// The originating request, once bound.
    pub fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }
}

/// Adapts an application handler into a plain `(writer, request)` entry
/// point.
///
/// Per request, the application handler receives the renderer and the
/// request and returns an optional [`Response`]. A `Some` response is
/// bound and dispatched through [`Renderer::render_response`]; a failed
/// dispatch writes status 500 with the fixed body `Invalid response
/// render`. A `None` return writes status 500 with `Invalid http
/// response`. Exactly one of those outcomes happens per request; the
/// underlying error is logged, never sent to the client.
pub fn http_handler<'r, W, F>(renderer: &'r Renderer, handler: F) -> impl Fn(W, Request) + 'r
where
    W: ResponseWriter + 'static,
    F: Fn(&Renderer, &Request) -> Option<Response> + 'r,
{
    move |mut writer: W, request: Request| {
        match handler(renderer, &request) {
            Some(mut resp) => {
                resp.bind(Box::new(writer), request);
                if let Err(err) = renderer.render_response(&mut resp) {
                    tracing::warn!(error = %err, template = %resp.template, "response render failed");
                    if let Some(w) = resp.writer_mut() {
                        w.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                        let _ = writeln!(w, "Invalid response render");
                    }
                }
            }
            None => {
                tracing::warn!("application handler returned no response");
                writer.set_status(StatusCode::INTERNAL_SERVER_ERROR);
                let _ = writeln!(writer, "Invalid http response");
            }
        }
    }
}
