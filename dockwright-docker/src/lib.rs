//! Docker clients that use [`bollard`], built and cached per connection
//! configuration.
//!
//! Resource operations obtain a client through
//! [`Provider::make_client()`]. The provider resolves the resource's
//! [override](dockwright_config::connection::Override) against its default
//! configuration, fingerprints the result, and either hands out the client
//! already cached under that fingerprint or builds, caches, and health checks
//! a new one.

use std::path::PathBuf;

use thiserror::Error;

pub mod auth;
pub mod cache;
pub mod client;
pub mod provider;
pub mod ssh;
pub mod strategy;
pub mod tls;
pub mod transport;

pub use crate::auth::AuthConfigs;
pub use crate::cache::Cache;
pub use crate::client::Client;
pub use crate::provider::Provider;
pub use crate::strategy::Strategy;

/// The number of seconds a request to the daemon may take.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// A global error within this crate.
#[derive(Error, Debug)]
pub enum Error {
    /// Only one of the inline certificate and key was provided.
    #[error("cert_material, and key_material must be specified")]
    IncompleteKeyPair,

    /// Inline certificate material was combined with a certificate directory.
    #[error("cert_path must not be specified")]
    ConflictingCertPath,

    /// The certificate authority material held no usable certificate.
    #[error("could not add RootCA pem")]
    RootCertificate,

    /// Certificate or key material could not be parsed.
    #[error("invalid {what} material: {reason}")]
    Material {
        /// The kind of material.
        what: &'static str,
        /// Why the material was rejected.
        reason: String,
    },

    /// A file within a certificate directory could not be read.
    #[error("failed to read `{path}`: {source}")]
    Read {
        /// The path to the file.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// An error from [`rustls`].
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),

    /// The host could not be turned into an SSH connection helper.
    #[error("invalid SSH host `{host}`: {reason}")]
    Ssh {
        /// The host.
        host: String,
        /// Why the host was rejected.
        reason: String,
    },

    /// The host cannot be used with the selected connection strategy.
    #[error("unsupported Docker host `{host}`: {reason}")]
    UnsupportedHost {
        /// The host.
        host: String,
        /// Why the host was rejected.
        reason: String,
    },

    /// An error from [`bollard`].
    #[error("docker error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// The daemon did not answer the health check.
    #[error("error pinging Docker server: {0}")]
    Ping(bollard::errors::Error),

    /// The health check was cancelled.
    #[error("the Docker daemon health check was cancelled")]
    Cancelled,
}

/// A [`Result`](std::result::Result) with an [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
