//! The HTTP transport used to reach daemons through custom streams.
//!
//! Calls to the daemon are short lived and infrequent. Rather than keeping a
//! pool of idle connections around, every request dials a fresh connection,
//! sends a single HTTP/1.1 request with `Connection: close`, and drops the
//! connection once the response body is consumed.

#[cfg(unix)]
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bollard::API_DEFAULT_VERSION;
use http::HeaderValue;
use http::Request;
use http::Response;
use http::Uri;
use http::header;
use http::uri::PathAndQuery;
use hyper::body::Body;
use hyper::body::Incoming;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioIo;
use rustls::pki_types::ServerName;
use tokio::io::AsyncRead;
use tokio::io::AsyncWrite;
#[cfg(unix)]
use tokio::net::UnixStream;
use tokio_rustls::TlsConnector;
use tower::ServiceExt as _;
use tracing::trace;
use tracing::warn;

use crate::DEFAULT_TIMEOUT_SECS;
use crate::ssh;

/// The time allowed to establish a TCP connection.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The interval between TCP keep-alive probes.
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// The time allowed to complete a TLS handshake.
pub const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection tuning for the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    /// The TCP connect timeout.
    connect_timeout: Duration,

    /// The TCP keep-alive probe interval.
    keep_alive_interval: Duration,

    /// The TLS handshake timeout.
    tls_handshake_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            keep_alive_interval: KEEP_ALIVE_INTERVAL,
            tls_handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
        }
    }
}

impl Settings {
    /// Gets the TCP connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Gets the TCP keep-alive probe interval.
    pub fn keep_alive_interval(&self) -> Duration {
        self.keep_alive_interval
    }

    /// Gets the TLS handshake timeout.
    pub fn tls_handshake_timeout(&self) -> Duration {
        self.tls_handshake_timeout
    }
}

/// A bidirectional byte stream to the daemon.
pub trait Stream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Stream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Opens connections to a daemon.
#[derive(Clone)]
pub enum Dialer {
    /// A TCP connection wrapped in TLS.
    Tls {
        /// The `host:port` to connect to.
        authority: String,

        /// The name the server's certificate is checked against.
        server_name: ServerName<'static>,

        /// The TLS connector.
        connector: TlsConnector,

        /// The connection tuning.
        settings: Settings,
    },

    /// A `docker system dial-stdio` session over SSH.
    Ssh(Arc<ssh::Helper>),

    /// A Unix domain socket.
    #[cfg(unix)]
    Unix(PathBuf),
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tls {
                authority,
                server_name,
                settings,
                ..
            } => f
                .debug_struct("Tls")
                .field("authority", authority)
                .field("server_name", server_name)
                .field("settings", settings)
                .finish_non_exhaustive(),
            Self::Ssh(helper) => f.debug_tuple("Ssh").field(helper).finish(),
            #[cfg(unix)]
            Self::Unix(path) => f.debug_tuple("Unix").field(path).finish(),
        }
    }
}

impl Dialer {
    /// Creates a TLS dialer.
    pub fn tls(
        authority: impl Into<String>,
        server_name: ServerName<'static>,
        config: rustls::ClientConfig,
        settings: Settings,
    ) -> Self {
        Self::Tls {
            authority: authority.into(),
            server_name,
            connector: TlsConnector::from(Arc::new(config)),
            settings,
        }
    }

    /// Opens a new connection.
    pub async fn dial(&self) -> std::io::Result<Box<dyn Stream>> {
        match self {
            Self::Tls {
                authority,
                server_name,
                connector,
                settings,
            } => {
                trace!("dialing `{authority}` over TLS");

                let mut http = HttpConnector::new();
                http.set_connect_timeout(Some(settings.connect_timeout()));
                http.set_keepalive(Some(settings.keep_alive_interval()));
                http.set_nodelay(true);

                let uri = format!("http://{authority}")
                    .parse::<Uri>()
                    .map_err(std::io::Error::other)?;
                let tcp = http
                    .oneshot(uri)
                    .await
                    .map_err(std::io::Error::other)?
                    .into_inner();

                let tls = tokio::time::timeout(
                    settings.tls_handshake_timeout(),
                    connector.connect(server_name.clone(), tcp),
                )
                .await
                .map_err(|_| {
                    std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("TLS handshake with `{authority}` timed out"),
                    )
                })??;

                Ok(Box::new(tls))
            }
            Self::Ssh(helper) => {
                trace!("dialing `{}` over SSH", helper.destination());
                Ok(Box::new(helper.dial()?))
            }
            #[cfg(unix)]
            Self::Unix(path) => {
                trace!("dialing `{}`", path.display());
                Ok(Box::new(UnixStream::connect(path).await?))
            }
        }
    }

    /// Sends a single request over a freshly dialed connection.
    pub async fn send<B>(&self, request: Request<B>) -> std::io::Result<Response<Incoming>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let request = origin_form(request)?;
        let stream = self.dial().await?;

        let (mut sender, connection) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
            .await
            .map_err(std::io::Error::other)?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                warn!("connection to the Docker daemon failed: {e}");
            }
        });

        sender
            .send_request(request)
            .await
            .map_err(std::io::Error::other)
    }

    /// Creates a [`bollard::Docker`] that sends every request through this
    /// dialer.
    ///
    /// `client_addr` is the address the requests are addressed to. It is
    /// used for the `Host` header; the connection itself is always opened by
    /// the dialer.
    pub fn connect(self, client_addr: &str) -> Result<bollard::Docker, bollard::errors::Error> {
        bollard::Docker::connect_with_custom_transport(
            move |request: bollard::BollardRequest| {
                let dialer = self.clone();
                async move {
                    dialer
                        .send(request)
                        .await
                        .map_err(bollard::errors::Error::from)
                }
            },
            Some(client_addr),
            DEFAULT_TIMEOUT_SECS,
            API_DEFAULT_VERSION,
        )
    }
}

/// Rewrites an absolute request URI into origin form, moving its authority
/// into the `Host` header.
fn origin_form<B>(request: Request<B>) -> std::io::Result<Request<B>> {
    let (mut parts, body) = request.into_parts();

    if let Some(authority) = parts.uri.authority() {
        if !parts.headers.contains_key(header::HOST) {
            let host = HeaderValue::from_str(authority.as_str())
                .map_err(std::io::Error::other)?;
            parts.headers.insert(header::HOST, host);
        }
    }

    let path = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    parts.uri = Uri::from(path);
    parts
        .headers
        .insert(header::CONNECTION, HeaderValue::from_static("close"));

    Ok(Request::from_parts(parts, body))
}
