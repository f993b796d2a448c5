//! Secondary to primary request conversion

use crate::engine::{BodyReader, HeaderList, Request, RequestBody, UNRESOLVED_PEER};
use crate::error::{Error, Result};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{CONTENT_LENGTH, HOST};
use hyper::{HeaderMap, Version};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::sync::mpsc;

/// Chunks buffered between the transport and a streaming body reader
const STREAM_CHANNEL_DEPTH: usize = 8;

/// Limits applied while translating a request
#[derive(Debug, Clone)]
pub struct AdaptOptions {
    pub max_body_size: u64,
    pub stream_threshold: u64,
    pub read_timeout: Duration,
    pub secure: bool,
}

/// Translate a secondary-shape request into the primary shape
///
/// Method, target and every header value (duplicates and their order
/// included) carry over. Bodies with a declared length above the stream
/// threshold are forwarded chunk by chunk; anything else is collected up to
/// `max_body_size`.
pub async fn adapt_request<B>(
    req: hyper::Request<B>,
    remote: &str,
    opts: &AdaptOptions,
) -> Result<Request>
where
    B: Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = req.into_parts();

    let target = parts
        .uri
        .path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string());

    let mut headers = HeaderList::with_capacity(parts.headers.len() + 1);
    // HTTP/2 carries the authority as a pseudo-header
    if !parts.headers.contains_key(HOST) {
        if let Some(authority) = parts.uri.authority() {
            headers.append("host", authority.as_str().to_string());
        }
    }
    for (name, value) in &parts.headers {
        headers.append(name.as_str(), Bytes::copy_from_slice(value.as_bytes()));
    }

    let declared = declared_length(&parts.headers)?;
    let body = read_body(body, declared, opts).await?;

    Ok(Request {
        method: parts.method.as_str().to_string(),
        target,
        headers,
        body,
        remote_ip: parse_remote_ip(remote),
        protocol: protocol_label(parts.version),
        secure: opts.secure,
    })
}

/// Peer IP from `ip:port`, `[v6]:port` or a bare address
///
/// Anything unparsable yields [`UNRESOLVED_PEER`] rather than an error.
pub fn parse_remote_ip(remote: &str) -> IpAddr {
    if let Ok(addr) = remote.parse::<SocketAddr>() {
        return addr.ip();
    }
    let bare = remote
        .strip_prefix('[')
        .and_then(|r| r.strip_suffix(']'))
        .unwrap_or(remote);
    bare.parse::<IpAddr>().unwrap_or(UNRESOLVED_PEER)
}

pub const fn protocol_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2",
        Version::HTTP_3 => "HTTP/3",
        _ => "HTTP/1.1",
    }
}

fn declared_length(headers: &HeaderMap) -> Result<Option<u64>> {
    let Some(value) = headers.get(CONTENT_LENGTH) else {
        return Ok(None);
    };
    value
        .to_str()
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Some)
        .ok_or_else(|| Error::Conversion("invalid Content-Length header".to_string()))
}

async fn read_body<B>(body: B, declared: Option<u64>, opts: &AdaptOptions) -> Result<RequestBody>
where
    B: Body<Data = Bytes> + Send + Unpin + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let limit = opts.max_body_size;
    match declared {
        Some(0) => return Ok(RequestBody::Empty),
        Some(len) if len > limit => return Err(Error::BodyTooLarge { limit }),
        Some(len) if len > opts.stream_threshold => {
            let (tx, rx) = mpsc::channel(STREAM_CHANNEL_DEPTH);
            tokio::spawn(forward_body(body, tx, opts.read_timeout));
            return Ok(RequestBody::Streaming(BodyReader::new(rx, len)));
        }
        _ => {}
    }

    let limited = Limited::new(body, usize::try_from(limit).unwrap_or(usize::MAX));
    let collected = tokio::time::timeout(opts.read_timeout, limited.collect())
        .await
        .map_err(|_| Error::Status {
            code: 408,
            message: "request body read timed out".to_string(),
        })?
        .map_err(|e| {
            if e.downcast_ref::<LengthLimitError>().is_some() {
                Error::BodyTooLarge { limit }
            } else {
                Error::Conversion(format!("failed to read request body: {e}"))
            }
        })?;

    let bytes = collected.to_bytes();
    Ok(if bytes.is_empty() {
        RequestBody::Empty
    } else {
        RequestBody::Buffered(bytes)
    })
}

/// Pump body frames to a blocking reader until the body or the reader ends
async fn forward_body<B>(mut body: B, tx: mpsc::Sender<io::Result<Bytes>>, read_timeout: Duration)
where
    B: Body<Data = Bytes> + Unpin,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    loop {
        let item = match tokio::time::timeout(read_timeout, body.frame()).await {
            Ok(Some(Ok(frame))) => match frame.into_data() {
                Ok(data) => Ok(data),
                // Trailers carry no payload
                Err(_) => continue,
            },
            Ok(Some(Err(e))) => Err(io::Error::other(e)),
            Ok(None) => return,
            Err(_) => Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "request body read timed out",
            )),
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return;
        }
    }
}
