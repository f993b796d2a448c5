//! Multiplexed transport in front of the generic handler
//!
//! Each accepted connection negotiates HTTP/2 (ALPN `h2`, or prior knowledge
//! in cleartext mode) or falls back to HTTP/1.1. Every request is converted
//! to the primary shape, handled on the blocking pool and converted back.

use super::request::{adapt_request, AdaptOptions};
use super::response::{adapt_response, full, BridgeBody};
use super::{tls, BridgeConfig, TransportMode};
use crate::engine::{self, SharedHandler};
use crate::error::{Error, Result};
use crate::http::response::build_error_response;
use crate::logger::{self, AccessLogEntry, AccessLogFormat};
use crate::server::listener::{bind_listener, DEFAULT_BACKLOG};
use http_body_util::BodyExt;
use hyper::body::{Body, Bytes, Frame, Incoming, SizeHint};
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio_rustls::TlsAcceptor;

pub struct TransportBridgeServer {
    config: Arc<BridgeConfig>,
    handler: SharedHandler,
    tls: Option<TlsAcceptor>,
    access_log: Option<AccessLogFormat>,
    active_connections: Arc<AtomicUsize>,
}

impl TransportBridgeServer {
    /// Validate settings and load TLS material
    ///
    /// Fails with [`Error::TransportConfig`] before anything is bound when
    /// TLS is selected without usable certificates.
    pub fn new(config: BridgeConfig, handler: SharedHandler) -> Result<Self> {
        config.validate()?;

        let tls = match (&config.mode, &config.tls) {
            (TransportMode::Tls, Some(tls_config)) => Some(tls::load_acceptor(tls_config)?),
            (TransportMode::Tls, None) => {
                return Err(Error::TransportConfig(
                    "tls mode requires certificate material".to_string(),
                ))
            }
            (TransportMode::Cleartext, _) => {
                tracing::warn!(
                    "cleartext transport enabled; HTTP/2 without TLS is for development only"
                );
                None
            }
        };

        Ok(Self {
            config: Arc::new(config),
            handler,
            tls,
            access_log: None,
            active_connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Emit one access line per request in `format`
    #[must_use]
    pub fn with_access_log(mut self, format: AccessLogFormat) -> Self {
        self.access_log = Some(format);
        self
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Connections currently being served
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }

    /// Bind the configured address
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.socket_addr()?;
        bind_listener(addr, DEFAULT_BACKLOG)
            .map_err(|e| Error::TransportConfig(format!("failed to bind {addr}: {e}")))
    }

    /// Bind and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F, grace: Duration) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind()?;
        self.serve(listener, shutdown, grace).await
    }

    /// Accept on `listener` until `shutdown` resolves, then drain
    ///
    /// On shutdown the listener closes, every connection is told to finish
    /// its in-flight requests (HTTP/2 sends GOAWAY), and whatever is still
    /// open after `grace` is aborted.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F, grace: Duration) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, mode = ?self.config.mode, "bridge accepting connections");
        }

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        self.accept_connection(stream, peer, &mut connections, stop_rx.clone());
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to accept connection"),
                },
                Some(finished) = connections.join_next(), if !connections.is_empty() => {
                    log_task_exit(finished);
                }
            }
        }

        drop(listener);
        let _ = stop_tx.send(true);
        tracing::info!(in_flight = connections.len(), "draining connections");

        let drained = tokio::time::timeout(grace, async {
            while let Some(finished) = connections.join_next().await {
                log_task_exit(finished);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                grace_secs = grace.as_secs(),
                "grace period elapsed, closing remaining connections"
            );
            connections.abort_all();
            while connections.join_next().await.is_some() {}
        }

        tracing::info!("bridge stopped");
        Ok(())
    }

    fn accept_connection(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        connections: &mut JoinSet<()>,
        stop: watch::Receiver<bool>,
    ) {
        // Increment first, then check, so concurrent accepts cannot overshoot
        let prev = self.active_connections.fetch_add(1, Ordering::SeqCst);
        let guard = ConnectionGuard(Arc::clone(&self.active_connections));

        if let Some(max) = self.config.max_connections {
            if prev >= usize::try_from(max).unwrap_or(usize::MAX) {
                tracing::warn!(%peer, active = prev, max, "connection limit reached, rejecting");
                return;
            }
        }

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%peer, error = %e, "failed to set TCP_NODELAY");
        }
        tracing::trace!(%peer, "connection accepted");

        let conn = Connection {
            config: Arc::clone(&self.config),
            handler: Arc::clone(&self.handler),
            tls: self.tls.clone(),
            access_log: self.access_log,
            peer,
        };
        connections.spawn(async move {
            let _guard = guard;
            conn.run(stream, stop).await;
        });
    }
}

/// Decrements the active connection count however the task ends
struct ConnectionGuard(Arc<AtomicUsize>);

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn log_task_exit(result: std::result::Result<(), JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            tracing::error!(error = %e, "connection task panicked");
        }
    }
}

struct Connection {
    config: Arc<BridgeConfig>,
    handler: SharedHandler,
    tls: Option<TlsAcceptor>,
    access_log: Option<AccessLogFormat>,
    peer: SocketAddr,
}

impl Connection {
    async fn run(self, stream: TcpStream, stop: watch::Receiver<bool>) {
        match self.tls.clone() {
            Some(acceptor) => {
                let handshake =
                    tokio::time::timeout(self.config.read_timeout(), acceptor.accept(stream)).await;
                match handshake {
                    Ok(Ok(tls_stream)) => self.serve_io(tls_stream, true, stop).await,
                    Ok(Err(e)) => {
                        tracing::debug!(peer = %self.peer, error = %e, "TLS handshake failed");
                    }
                    Err(_) => tracing::debug!(peer = %self.peer, "TLS handshake timed out"),
                }
            }
            None => self.serve_io(stream, false, stop).await,
        }
    }

    async fn serve_io<I>(self, io: I, secure: bool, mut stop: watch::Receiver<bool>)
    where
        I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let peer = self.peer;
        let builder = connection_builder(&self.config);
        let dispatcher = Arc::new(Dispatcher {
            handler: self.handler,
            options: AdaptOptions {
                max_body_size: self.config.max_body_size,
                stream_threshold: self.config.stream_threshold,
                read_timeout: self.config.read_timeout(),
                secure,
            },
            write_timeout: self.config.write_timeout(),
            access_log: self.access_log,
            peer: peer.to_string(),
        });

        let activity = Arc::new(Activity::new());
        let tracker = Arc::clone(&activity);
        let service = service_fn(move |req| {
            let dispatcher = Arc::clone(&dispatcher);
            let active = tracker.begin();
            async move {
                let response = dispatcher.dispatch(req).await;
                let response = response.map(|body| {
                    TrackedBody {
                        body,
                        _active: active,
                    }
                    .boxed_unsync()
                });
                Ok::<_, Infallible>(response)
            }
        });

        let conn = builder.serve_connection(TokioIo::new(io), service);
        tokio::pin!(conn);

        let idle = self.config.idle_timeout();
        loop {
            let wait = activity
                .idle_for()
                .map_or(idle, |elapsed| idle.saturating_sub(elapsed));
            tokio::select! {
                result = conn.as_mut() => {
                    if let Err(e) = result {
                        tracing::debug!(%peer, error = %e, "connection closed with error");
                    }
                    return;
                }
                _ = stop.changed() => break,
                () = tokio::time::sleep(wait) => {
                    if activity.idle_for().is_some_and(|elapsed| elapsed >= idle) {
                        tracing::debug!(%peer, idle_secs = idle.as_secs(), "closing idle connection");
                        break;
                    }
                }
            }
        }

        conn.as_mut().graceful_shutdown();
        if let Err(e) = conn.await {
            tracing::debug!(%peer, error = %e, "connection closed with error during shutdown");
        }
    }
}

/// Open exchanges on one connection and when the last one ended
///
/// Times are milliseconds since the connection was accepted. A connection
/// that never carried a request counts as idle from the start.
struct Activity {
    started: Instant,
    open: AtomicUsize,
    last_finished_ms: AtomicU64,
}

impl Activity {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            open: AtomicUsize::new(0),
            last_finished_ms: AtomicU64::new(0),
        }
    }

    fn begin(self: &Arc<Self>) -> ActiveExchange {
        self.open.fetch_add(1, Ordering::SeqCst);
        ActiveExchange(Arc::clone(self))
    }

    /// How long the connection has had no open exchange, `None` while busy
    fn idle_for(&self) -> Option<Duration> {
        if self.open.load(Ordering::SeqCst) > 0 {
            return None;
        }
        let last = Duration::from_millis(self.last_finished_ms.load(Ordering::SeqCst));
        Some(self.started.elapsed().saturating_sub(last))
    }
}

/// Held from request arrival until the response body is finished or dropped
struct ActiveExchange(Arc<Activity>);

impl Drop for ActiveExchange {
    fn drop(&mut self) {
        let now = u64::try_from(self.0.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.0.last_finished_ms.fetch_max(now, Ordering::SeqCst);
        self.0.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Response body that keeps its exchange counted as open
struct TrackedBody {
    body: BridgeBody,
    _active: ActiveExchange,
}

impl Body for TrackedBody {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<std::result::Result<Frame<Bytes>, io::Error>>> {
        Pin::new(&mut self.body).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.body.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.body.size_hint()
    }
}

/// Protocol settings for one connection
fn connection_builder(config: &BridgeConfig) -> auto::Builder<TokioExecutor> {
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .keep_alive(true)
        .header_read_timeout(config.idle_timeout());
    builder
        .http2()
        .timer(TokioTimer::new())
        .max_concurrent_streams(config.max_concurrent_streams)
        .initial_stream_window_size(config.stream_window_size)
        .initial_connection_window_size(config.connection_window_size)
        .max_frame_size(config.max_frame_size)
        .max_header_list_size(config.max_header_list_size)
        // Pings only detect dead peers; quiet connections are reaped in serve_io
        .keep_alive_interval(config.idle_timeout() / 2)
        .keep_alive_timeout(config.idle_timeout());
    builder
}

/// Per-connection request pipeline
struct Dispatcher {
    handler: SharedHandler,
    options: AdaptOptions,
    write_timeout: Duration,
    access_log: Option<AccessLogFormat>,
    peer: String,
}

impl Dispatcher {
    async fn dispatch(&self, req: hyper::Request<Incoming>) -> hyper::Response<BridgeBody> {
        let started = Instant::now();

        let request = match adapt_request(req, &self.peer, &self.options).await {
            Ok(request) => request,
            Err(err) => {
                if err.is_internal() {
                    tracing::error!(peer = %self.peer, error = %err, "failed to adapt request");
                } else {
                    tracing::debug!(peer = %self.peer, error = %err, "rejected request");
                }
                return self.convert(build_error_response(&err));
            }
        };

        let entry = self
            .access_log
            .map(|_| AccessLogEntry::from_request(&request));

        // Handlers may block on file or body I/O
        let handler = Arc::clone(&self.handler);
        let response =
            match tokio::task::spawn_blocking(move || engine::dispatch(&*handler, request))
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(error = %e, "handler task failed");
                    build_error_response(&Error::HandlerPanic(e.to_string()))
                }
            };

        if let (Some(entry), Some(format)) = (entry, self.access_log) {
            let entry = entry.finish(response.status, response.body_len(), started.elapsed());
            logger::log_access(&entry, format);
        }

        self.convert(response)
    }

    fn convert(&self, response: engine::Response) -> hyper::Response<BridgeBody> {
        match adapt_response(response, self.write_timeout) {
            Ok(converted) => converted,
            Err(err) => {
                tracing::error!(error = %err, "failed to convert response");
                let mut fallback = hyper::Response::new(full("500 Internal Server Error"));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            }
        }
    }
}
