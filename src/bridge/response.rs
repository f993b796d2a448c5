//! Primary to secondary response conversion

use crate::engine::{FileBody, Response, ResponseBody};
use crate::error::{Error, Result};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::{Body, Bytes, Frame, SizeHint};
use hyper::header::{HeaderName, HeaderValue};
use hyper::StatusCode;
use std::io::{self, Read};
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;

/// Response body type handed to the secondary transport
pub type BridgeBody = UnsyncBoxBody<Bytes, io::Error>;

/// Read size for file-backed bodies
const CHUNK_SIZE: usize = 64 * 1024;
/// Chunks read ahead of the client
const CHUNK_QUEUE_DEPTH: usize = 4;

/// Translate a primary-shape response into the secondary shape
///
/// Invalid status codes, header names or header values are reported as
/// [`Error::Conversion`]. File bodies are read in fixed-size chunks on the
/// blocking pool; a chunk the client does not accept within `write_timeout`
/// ends the stream.
pub fn adapt_response(resp: Response, write_timeout: Duration) -> Result<hyper::Response<BridgeBody>> {
    let status = StatusCode::from_u16(resp.status)
        .map_err(|_| Error::Conversion(format!("invalid status code {}", resp.status)))?;

    let mut headers = hyper::HeaderMap::with_capacity(resp.headers.len());
    for (name, value) in resp.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::Conversion(format!("invalid header name {name:?}")))?;
        let header_value = HeaderValue::from_maybe_shared(value)
            .map_err(|_| Error::Conversion(format!("invalid value for header {name:?}")))?;
        headers.append(header_name, header_value);
    }

    let body = match resp.body {
        ResponseBody::Empty => empty(),
        ResponseBody::Bytes(bytes) => full(bytes),
        ResponseBody::File(file) => stream_file(file, write_timeout).boxed_unsync(),
    };

    let mut out = hyper::Response::new(body);
    *out.status_mut() = status;
    *out.headers_mut() = headers;
    Ok(out)
}

pub fn full(bytes: impl Into<Bytes>) -> BridgeBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

pub fn empty() -> BridgeBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Body fed by a blocking file pump over a bounded channel
///
/// Reports an exact size hint so HTTP/1.1 keeps `Content-Length` framing.
/// If the pump stops early the body ends with an error instead of a short
/// clean end, which makes the transport abort the message.
#[derive(Debug)]
pub struct ChannelBody {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    remaining: u64,
}

impl Body for ChannelBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, io::Error>>> {
        let this = self.get_mut();
        if this.remaining == 0 {
            return Poll::Ready(None);
        }
        match ready!(this.rx.poll_recv(cx)) {
            Some(Ok(chunk)) => {
                this.remaining = this.remaining.saturating_sub(chunk.len() as u64);
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            Some(Err(e)) => {
                this.remaining = 0;
                Poll::Ready(Some(Err(e)))
            }
            None => {
                let missing = this.remaining;
                this.remaining = 0;
                Poll::Ready(Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("response body ended {missing} bytes short"),
                ))))
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        self.remaining == 0
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining)
    }
}

/// Start pumping `file` into a [`ChannelBody`]
///
/// Must be called from within a Tokio runtime. The file handle lives in the
/// pump and is closed when it finishes, fails, or the client goes away.
pub fn stream_file(file: FileBody, write_timeout: Duration) -> ChannelBody {
    let (tx, rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
    let remaining = file.len();
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || pump(file, &tx, &handle, write_timeout));
    ChannelBody { rx, remaining }
}

fn pump(
    file: FileBody,
    tx: &mpsc::Sender<io::Result<Bytes>>,
    handle: &Handle,
    write_timeout: Duration,
) {
    let mut reader = file.into_reader();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => {
                if reader.limit() > 0 {
                    let short = io::Error::new(io::ErrorKind::UnexpectedEof, "file truncated while streaming");
                    let _ = tx.blocking_send(Err(short));
                }
                return;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "failed reading file body");
                let _ = tx.blocking_send(Err(e));
                return;
            }
        };

        let chunk = Bytes::copy_from_slice(&buf[..n]);
        match handle.block_on(tokio::time::timeout(write_timeout, tx.send(Ok(chunk)))) {
            Ok(Ok(())) => {}
            // Receiver dropped: the client is gone or the stream was reset
            Ok(Err(_)) => return,
            Err(_) => {
                tracing::debug!(timeout = ?write_timeout, "client stalled, dropping response body");
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_status_and_headers() {
        let resp = Response::new(201)
            .with_header("X-Multi", "one")
            .with_header("Content-Type", "text/plain")
            .with_header("X-Multi", "two")
            .with_body("created");

        let out = adapt_response(resp, Duration::from_secs(1)).unwrap();
        assert_eq!(out.status(), StatusCode::CREATED);
        let multi: Vec<_> = out.headers().get_all("x-multi").iter().collect();
        assert_eq!(multi, vec!["one", "two"]);
        assert_eq!(out.headers()["content-type"], "text/plain");
        assert_eq!(out.body().size_hint().exact(), Some(7));
    }

    #[test]
    fn test_invalid_status() {
        let err = adapt_response(Response::new(1000), Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_invalid_header() {
        let bad_name = Response::new(200).with_header("Bad Name", "x");
        assert!(matches!(
            adapt_response(bad_name, Duration::from_secs(1)),
            Err(Error::Conversion(_))
        ));

        let bad_value = Response::new(200).with_header("X-Bad", "line\nbreak");
        assert!(matches!(
            adapt_response(bad_value, Duration::from_secs(1)),
            Err(Error::Conversion(_))
        ));
    }

    #[tokio::test]
    async fn test_file_body_streams_window() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&path, &content).unwrap();

        let file = FileBody::open_window(&path, 1000, 150_000).unwrap();
        let resp = Response {
            status: 206,
            headers: crate::engine::HeaderList::new(),
            body: ResponseBody::File(file),
        };
        let out = adapt_response(resp, Duration::from_secs(5)).unwrap();
        assert_eq!(out.body().size_hint().exact(), Some(150_000));

        let bytes = out.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.len(), 150_000);
        assert_eq!(&bytes[..], &content[1000..151_000]);
    }

    #[tokio::test]
    async fn test_file_shrunk_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shrinking.bin");
        fs::write(&path, vec![7u8; 4096]).unwrap();

        let file = FileBody::open_window(&path, 0, 4096).unwrap();
        fs::write(&path, vec![7u8; 100]).unwrap();

        let body = stream_file(file, Duration::from_secs(5));
        assert!(body.collect().await.is_err());
    }
}
