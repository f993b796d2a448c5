//! Primary request/response model
//!
//! Plain data structures the handler chain works on. Requests arriving over
//! the bridged transport are translated into these shapes by
//! [`crate::bridge`] and dispatched exactly like native ones.

mod handler;
mod headers;
mod request;
mod response;

pub use handler::{dispatch, Handler, SharedHandler};
pub use headers::HeaderList;
pub use request::{BodyReader, Request, RequestBody, UNRESOLVED_PEER};
pub use response::{FileBody, Response, ResponseBody};
