//! Primary request shape

use super::HeaderList;
use hyper::body::Bytes;
use std::io::{self, Read};
use std::net::{IpAddr, Ipv4Addr};
use tokio::sync::mpsc;

/// Placeholder peer address when the real one cannot be determined
pub const UNRESOLVED_PEER: IpAddr = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

#[derive(Debug)]
pub struct Request {
    pub method: String,
    /// Path plus optional `?query`
    pub target: String,
    pub headers: HeaderList,
    pub body: RequestBody,
    pub remote_ip: IpAddr,
    /// Protocol version label, e.g. `HTTP/1.1` or `HTTP/2`
    pub protocol: &'static str,
    /// Whether the request arrived over TLS
    pub secure: bool,
}

impl Request {
    pub fn new(method: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            target: target.into(),
            headers: HeaderList::new(),
            body: RequestBody::Empty,
            remote_ip: UNRESOLVED_PEER,
            protocol: "HTTP/1.1",
            secure: false,
        }
    }

    /// Builder-style header append, mostly for native callers and tests
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .append(name, Bytes::copy_from_slice(value.as_bytes()));
        self
    }

    pub fn path(&self) -> &str {
        self.target
            .split_once('?')
            .map_or(self.target.as_str(), |(path, _)| path)
    }

    pub fn query(&self) -> Option<&str> {
        self.target.split_once('?').map(|(_, query)| query)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get_str(name)
    }

    pub fn is_head(&self) -> bool {
        self.method.eq_ignore_ascii_case("HEAD")
    }
}

/// Request payload, either held in memory or pulled on demand
#[derive(Debug, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Buffered(Bytes),
    Streaming(BodyReader),
}

impl RequestBody {
    /// Turn any body variant into a blocking reader
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        match self {
            Self::Empty => Box::new(io::empty()),
            Self::Buffered(bytes) => Box::new(io::Cursor::new(bytes)),
            Self::Streaming(reader) => Box::new(reader),
        }
    }
}

/// Blocking reader over body chunks forwarded from the transport
///
/// Yields at most the declared content length. Reading must happen off the
/// async runtime threads, which is where handlers run.
#[derive(Debug)]
pub struct BodyReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    chunk: Bytes,
    remaining: u64,
}

impl BodyReader {
    pub const fn new(rx: mpsc::Receiver<io::Result<Bytes>>, declared_len: u64) -> Self {
        Self {
            rx,
            chunk: Bytes::new(),
            remaining: declared_len,
        }
    }

    /// Bytes still expected
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        while self.chunk.is_empty() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.chunk = chunk,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "request body ended before the declared length",
                    ))
                }
            }
        }

        let limit = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        let n = buf.len().min(self.chunk.len()).min(limit);
        buf[..n].copy_from_slice(&self.chunk[..n]);
        self.chunk = self.chunk.slice(n..);
        self.remaining -= n as u64;
        Ok(n)
    }
}
