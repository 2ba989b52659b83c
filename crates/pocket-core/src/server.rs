//! Native HTTP acceptor
//!
//! hyper HTTP/1.1 over tokio:
//! - socket2 listener with SO_REUSEADDR and TCP_NODELAY
//! - sequential (one connection at a time) or task-per-connection mode
//! - header read, body read and connection lifetime timeouts
//! - one shared [`Dispatcher`] behind an `Arc`

use crate::{Dispatcher, Error, Method, Request, Response, Result, StatusCode};
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

/// Listen backlog
const BACKLOG: i32 = 1024;

/// Time a connection gets to finish in-flight requests once asked to close
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// How long the server waits for open connections when it stops
const DRAIN_TIMEOUT: Duration = Duration::from_millis(2_500);

const DRAIN_POLL: Duration = Duration::from_millis(10);

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Runtime worker threads
    pub workers: usize,
    /// Serve one connection at a time instead of a task per connection
    pub sequential: bool,
    pub header_read_timeout: Duration,
    pub body_timeout: Duration,
    /// Lifetime of a keep-alive connection before graceful shutdown
    pub connection_timeout: Duration,
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            workers: num_cpus::get(),
            sequential: false,
            header_read_timeout: Duration::from_secs(5),
            body_timeout: Duration::from_secs(10),
            connection_timeout: Duration::from_secs(60),
            max_body_size: 1024 * 1024,
        }
    }
}

impl ServerConfig {
    /// `host:port` as given
    pub fn display_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve the listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let bind_error = |source| Error::Bind {
            addr: self.display_addr(),
            source,
        };
        (self.host.as_str(), self.port)
            .to_socket_addrs()
            .map_err(bind_error)?
            .next()
            .ok_or_else(|| {
                bind_error(std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "host resolved to no addresses",
                ))
            })
    }
}

/// Create a TCP listening socket with optimizations
pub fn create_optimized_socket(addr: &SocketAddr) -> std::io::Result<Socket> {
    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;

    // SO_REUSEADDR - allow binding to address in TIME_WAIT.
    // No SO_REUSEPORT: a second server on the same port must fail to bind.
    socket.set_reuse_address(true)?;

    // TCP_NODELAY - inherited by accepted sockets on most platforms
    socket.set_nodelay(true)?;

    socket.bind(&(*addr).into())?;
    socket.listen(BACKLOG)?;
    socket.set_nonblocking(true)?;

    Ok(socket)
}

/// Bind the listener. Must be called inside a tokio runtime.
///
/// Failure is fatal for the caller; there is no retry.
pub fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = config.socket_addr()?;
    let socket = create_optimized_socket(&addr).map_err(|source| Error::Bind {
        addr: config.display_addr(),
        source,
    })?;
    let listener = TcpListener::from_std(socket.into())?;
    tracing::info!(addr = %addr, "listening");
    Ok(listener)
}

/// Bind and serve until the process ends
pub async fn serve(config: ServerConfig, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let listener = bind(&config)?;
    serve_with_shutdown(listener, dispatcher, config, std::future::pending()).await
}

/// Serve on `listener` until `signal` completes
///
/// Once the signal fires no new connections are accepted, open ones are
/// asked to close after their in-flight request, and the call returns when
/// they are gone or `DRAIN_TIMEOUT` has passed.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    config: ServerConfig,
    signal: F,
) -> Result<()>
where
    F: Future<Output = ()>,
{
    let config = Arc::new(config);
    let tracker = Arc::new(ConnectionTracker::new());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::pin!(signal);

    tracing::info!(
        sequential = config.sequential,
        routes = dispatcher.route_count(),
        "accepting connections"
    );

    loop {
        let (stream, remote) = tokio::select! {
            _ = &mut signal => break,
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            },
        };

        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "failed to set TCP_NODELAY");
        }

        let conn = serve_connection(
            stream,
            remote,
            dispatcher.clone(),
            config.clone(),
            tracker.clone(),
            shutdown_rx.clone(),
        );
        if config.sequential {
            tokio::pin!(conn);
            tokio::select! {
                _ = conn.as_mut() => {}
                _ = &mut signal => {
                    let _ = shutdown_tx.send(true);
                    conn.as_mut().await;
                    break;
                }
            }
        } else {
            tokio::spawn(conn);
        }
    }

    let _ = shutdown_tx.send(true);
    let active = tracker.count();
    tracing::info!(active, "stopped accepting connections");
    if active > 0 && !tracker.drain(DRAIN_TIMEOUT).await {
        tracing::warn!(active = tracker.count(), "connections still open after drain timeout");
    }
    Ok(())
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    config: Arc<ServerConfig>,
    tracker: Arc<ConnectionTracker>,
    mut shutdown: watch::Receiver<bool>,
) {
    tracker.increment();
    tracing::debug!(remote = %remote, "connection accepted");

    let io = TokioIo::new(stream);
    let service_config = config.clone();
    let service = service_fn(move |req| {
        let dispatcher = dispatcher.clone();
        let config = service_config.clone();
        async move { Ok::<_, Infallible>(handle_request(&dispatcher, &config, req).await) }
    });

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(config.header_read_timeout)
        .keep_alive(true)
        .serve_connection(io, service);
    tokio::pin!(conn);

    let close = tokio::select! {
        res = conn.as_mut() => {
            if let Err(e) = res {
                log_connection_error(&remote, &e);
            }
            false
        }
        _ = tokio::time::sleep(config.connection_timeout) => {
            tracing::debug!(remote = %remote, "connection lifetime reached, shutting down");
            true
        }
        _ = shutdown.changed() => {
            tracing::debug!(remote = %remote, "server stopping, closing connection");
            true
        }
    };

    if close {
        conn.as_mut().graceful_shutdown();
        match tokio::time::timeout(SHUTDOWN_GRACE, conn.as_mut()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log_connection_error(&remote, &e),
            Err(_) => tracing::debug!(remote = %remote, "connection closed after grace period"),
        }
    }

    tracker.decrement();
}

fn log_connection_error(remote: &SocketAddr, err: &hyper::Error) {
    if err.is_incomplete_message() || err.is_canceled() {
        tracing::debug!(remote = %remote, error = %err, "connection closed early");
    } else if err.is_timeout() {
        tracing::debug!(remote = %remote, "header read timed out");
    } else {
        tracing::warn!(remote = %remote, error = %err, "connection error");
    }
}

/// Read the body, then hand the request to the dispatcher
///
/// Requests refused while reading the body still go through the middleware
/// chain via [`Dispatcher::reject`].
pub async fn handle_request(
    dispatcher: &Dispatcher,
    config: &ServerConfig,
    req: hyper::Request<Incoming>,
) -> hyper::Response<Full<Bytes>> {
    let (parts, body) = req.into_parts();

    let collected = tokio::time::timeout(
        config.body_timeout,
        Limited::new(body, config.max_body_size).collect(),
    )
    .await;

    let refused = match collected {
        Ok(Ok(collected)) => {
            let request = from_hyper_parts(parts, collected.to_bytes());
            return to_hyper_response(dispatcher.dispatch(request));
        }
        Ok(Err(e)) if e.downcast_ref::<LengthLimitError>().is_some() => {
            let size = parts
                .headers
                .get(http::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(config.max_body_size + 1);
            Error::PayloadTooLarge {
                size,
                limit: config.max_body_size,
            }
        }
        Ok(Err(e)) => {
            tracing::debug!(error = %e, "failed to read request body");
            Error::MalformedRequest("Corpo da requisição inválido".to_string())
        }
        Err(_) => {
            tracing::debug!(timeout_ms = config.body_timeout.as_millis() as u64, "request body timed out");
            Error::BodyTimeout
        }
    };

    let request = from_hyper_parts(parts, Bytes::new());
    to_hyper_response(dispatcher.reject(request, refused))
}

/// Convert hyper request parts plus a collected body to our Request type
///
/// Methods outside the standard set become [`Method::Extension`] with the
/// token kept, so the dispatcher can answer 405 with the allowed list.
pub fn from_hyper_parts(parts: http::request::Parts, body: Bytes) -> Request {
    let token = parts.method.as_str();
    let method = Method::parse(token.as_bytes()).unwrap_or(Method::Extension);
    let mut request = Request::new(method, parts.uri.path());
    if method == Method::Extension {
        request.method_token = Some(token.to_string());
    }
    request.query = parts.uri.query().map(|s| s.to_string());
    request.body = body;

    for (name, value) in &parts.headers {
        if let Ok(v) = value.to_str() {
            request.headers.push((name.to_string(), v.to_string()));
        }
    }

    request
}

/// Convert our Response to hyper Response
pub fn to_hyper_response(res: Response) -> hyper::Response<Full<Bytes>> {
    let mut builder = hyper::Response::builder().status(res.status.as_u16());

    for (name, value) in &res.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    match builder.body(Full::new(res.body)) {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "invalid response parts");
            let fallback = Response::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                crate::error::INTERNAL_ERROR_MESSAGE,
            );
            let mut response = hyper::Response::new(Full::new(fallback.body));
            *response.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
            response.headers_mut().insert(
                http::header::CONTENT_TYPE,
                http::HeaderValue::from_static("application/json"),
            );
            response
        }
    }
}

/// Tracks active connections
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    active: AtomicU64,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn increment(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn decrement(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.active.load(Ordering::SeqCst)
    }

    /// Wait until no connection is open. Returns false if `timeout` passes first.
    pub async fn drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count() == 0 {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
    }
}
