//! Generic handler contract and the per-request catch-all

use super::{Request, Response};
use crate::error::{Error, Result};
use crate::http::response::build_error_response;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Anything that turns a request into a response or an error
///
/// Routing trees, middleware chains and the static server all sit behind
/// this trait. Handlers run on blocking threads and may do synchronous I/O.
pub trait Handler: Send + Sync + 'static {
    fn handle(&self, req: Request) -> Result<Response>;
}

impl<F> Handler for F
where
    F: Fn(Request) -> Result<Response> + Send + Sync + 'static,
{
    fn handle(&self, req: Request) -> Result<Response> {
        self(req)
    }
}

pub type SharedHandler = Arc<dyn Handler>;

/// Run `handler` and always come back with a response
///
/// Errors become their status response; internal ones are logged with their
/// cause. A panic is contained here so the worker and its connection survive.
pub fn dispatch(handler: &dyn Handler, req: Request) -> Response {
    let method = req.method.clone();
    let target = req.target.clone();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.handle(req)));
    let err = match outcome {
        Ok(Ok(resp)) => return resp,
        Ok(Err(err)) => err,
        Err(payload) => Error::HandlerPanic(panic_message(payload.as_ref())),
    };

    if err.is_internal() {
        tracing::error!(%method, %target, error = %err, "request failed");
    } else {
        tracing::debug!(%method, %target, status = err.status(), error = %err, "request rejected");
    }
    build_error_response(&err)
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_handler() {
        let handler =
            |req: Request| -> Result<Response> { Ok(Response::new(200).with_body(req.target)) };
        let resp = dispatch(&handler, Request::new("GET", "/x"));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body_len(), 2);
    }

    #[test]
    fn test_error_becomes_status() {
        let handler = |_req: Request| -> Result<Response> { Err(Error::NotFound("/gone".into())) };
        let resp = dispatch(&handler, Request::new("GET", "/gone"));
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_panic_is_contained() {
        let handler = |_req: Request| -> Result<Response> { panic!("handler blew up") };
        let resp = dispatch(&handler, Request::new("GET", "/"));
        assert_eq!(resp.status, 500);
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");
    }
}
