//! Selecting and building the connection to a daemon.

#[cfg(unix)]
use std::path::PathBuf;
use std::sync::Arc;

use bollard::API_DEFAULT_VERSION;
use dockwright_config::connection::Config;
use dockwright_config::connection::DEFAULT_HOST;
use rustls::pki_types::ServerName;
use tracing::debug;
use url::Url;

use crate::Client;
use crate::DEFAULT_TIMEOUT_SECS;
use crate::Error;
use crate::Result;
use crate::ssh;
use crate::tls::Material;
use crate::transport::Dialer;
use crate::transport::Settings;

/// The port assumed for TLS hosts that don't name one.
const DEFAULT_TLS_PORT: u16 = 2376;

/// The address requests over a Unix socket are addressed to.
#[cfg(unix)]
const UNIX_CLIENT_ADDR: &str = "http://localhost";

/// How a client reaches its daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// TLS with certificate material provided inline.
    InlineTls,

    /// TLS with certificate material read from a directory.
    CertDirectory,

    /// A tunnel through the `ssh` client.
    SshTunnel,

    /// A plain connection to the host.
    Direct,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InlineTls => write!(f, "inline TLS"),
            Self::CertDirectory => write!(f, "certificate directory"),
            Self::SshTunnel => write!(f, "SSH tunnel"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

impl Strategy {
    /// Classifies a resolved configuration.
    ///
    /// The first match wins:
    ///
    /// 1. [`InlineTls`](Self::InlineTls) when a certificate or key is
    ///    provided. Both must be provided, and a certificate directory must
    ///    not be.
    /// 2. [`CertDirectory`](Self::CertDirectory) when a certificate
    ///    directory is provided.
    /// 3. [`SshTunnel`](Self::SshTunnel) when the host is an `ssh://` host.
    /// 4. [`Direct`](Self::Direct) otherwise.
    pub fn classify(config: &Config) -> Result<Self> {
        if !config.cert().is_empty() || !config.key().is_empty() {
            if config.cert().is_empty() || config.key().is_empty() {
                return Err(Error::IncompleteKeyPair);
            }

            if !config.cert_path().is_empty() {
                return Err(Error::ConflictingCertPath);
            }

            return Ok(Self::InlineTls);
        }

        if !config.cert_path().is_empty() {
            return Ok(Self::CertDirectory);
        }

        if config.is_ssh() {
            return Ok(Self::SshTunnel);
        }

        Ok(Self::Direct)
    }

    /// Builds a client for a resolved configuration.
    ///
    /// No connection is made to the daemon. When the configuration is
    /// classified as an SSH tunnel but `program` cannot be located, the host
    /// is connected to directly and the client reports
    /// [`Direct`](Self::Direct).
    pub fn build(config: &Config, program: &ssh::Program) -> Result<Client> {
        let strategy = Self::classify(config)?;
        debug!("building a client for `{}` ({strategy})", config.host());

        match strategy {
            Self::InlineTls => {
                let material = Material::inline(config.ca(), config.cert(), config.key());
                tls(config.host(), strategy, &material)
            }
            Self::CertDirectory => {
                let material = Material::read_directory(config.cert_path())?;
                tls(config.host(), strategy, &material)
            }
            Self::SshTunnel => match ssh::resolve(config.host(), config.ssh_opts(), program)? {
                Some(helper) => {
                    let host = helper.host();
                    let docker = Dialer::Ssh(Arc::new(helper)).connect(host)?;
                    Ok(Client::new(host, strategy, docker))
                }
                None => direct(config.host()),
            },
            Self::Direct => direct(config.host()),
        }
    }
}

/// Builds a client that reaches `host` over TLS.
fn tls(host: &str, strategy: Strategy, material: &Material) -> Result<Client> {
    let unsupported = |reason: &str| Error::UnsupportedHost {
        host: host.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(host).map_err(|e| unsupported(&e.to_string()))?;

    if !matches!(url.scheme(), "tcp" | "http" | "https") {
        return Err(unsupported("TLS requires a `tcp://` or `https://` host"));
    }

    let (Some(name), Some(authority_host)) = (url.host(), url.host_str()) else {
        return Err(unsupported("no host specified"));
    };

    let name = match name {
        url::Host::Domain(domain) => domain.to_string(),
        url::Host::Ipv4(addr) => addr.to_string(),
        url::Host::Ipv6(addr) => addr.to_string(),
    };

    let server_name =
        ServerName::try_from(name).map_err(|e| unsupported(&e.to_string()))?;
    let authority = format!(
        "{authority_host}:{port}",
        port = url.port().unwrap_or(DEFAULT_TLS_PORT)
    );

    let dialer = Dialer::tls(
        authority.clone(),
        server_name,
        material.client_config()?,
        Settings::default(),
    );
    let docker = dialer.connect(&format!("https://{authority}"))?;

    Ok(Client::new(host, strategy, docker))
}

/// Builds a client that reaches `host` without TLS.
///
/// An empty host connects to [`DEFAULT_HOST`].
fn direct(host: &str) -> Result<Client> {
    let target = if host.is_empty() { DEFAULT_HOST } else { host };

    let docker = if let Some(path) = target.strip_prefix("unix://") {
        unix(target, path)?
    } else if let Some(path) = target.strip_prefix("npipe://") {
        named_pipe(target, path)?
    } else {
        bollard::Docker::connect_with_http(target, DEFAULT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
    };

    Ok(Client::new(host, Strategy::Direct, docker))
}

/// Connects to a Unix socket.
///
/// The socket is not required to exist until the first request.
#[cfg(unix)]
fn unix(_: &str, path: &str) -> Result<bollard::Docker> {
    Ok(Dialer::Unix(PathBuf::from(path)).connect(UNIX_CLIENT_ADDR)?)
}

/// Connects to a Unix socket.
#[cfg(not(unix))]
fn unix(host: &str, _: &str) -> Result<bollard::Docker> {
    Err(Error::UnsupportedHost {
        host: host.to_string(),
        reason: String::from("Unix sockets are not supported on this platform"),
    })
}

/// Connects to a named pipe.
#[cfg(windows)]
fn named_pipe(_: &str, path: &str) -> Result<bollard::Docker> {
    Ok(bollard::Docker::connect_with_named_pipe(
        path,
        DEFAULT_TIMEOUT_SECS,
        API_DEFAULT_VERSION,
    )?)
}

/// Connects to a named pipe.
#[cfg(not(windows))]
fn named_pipe(host: &str, _: &str) -> Result<bollard::Docker> {
    Err(Error::UnsupportedHost {
        host: host.to_string(),
        reason: String::from("named pipes are not supported on this platform"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA: &str = include_str!("../tests/fixtures/ca.pem");
    const CERT: &str = include_str!("../tests/fixtures/client-cert.pem");
    const KEY: &str = include_str!("../tests/fixtures/client-key.pem");

    #[test]
    fn only_a_certificate_is_incomplete() {
        let config = Config::builder()
            .host("tcp://d:2376")
            .cert("CERT")
            .build();

        let err = Strategy::classify(&config).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cert_material, and key_material must be specified"
        );

        let config = Config::builder().host("tcp://d:2376").key("KEY").build();
        assert!(matches!(
            Strategy::classify(&config),
            Err(Error::IncompleteKeyPair)
        ));
    }

    #[test]
    fn inline_material_conflicts_with_a_directory() {
        let config = Config::builder()
            .host("tcp://d:2376")
            .cert("CERT")
            .key("KEY")
            .cert_path("/certs")
            .build();

        let err = Strategy::classify(&config).unwrap_err();
        assert_eq!(err.to_string(), "cert_path must not be specified");
    }

    #[test]
    fn classification_order() {
        let inline = Config::builder()
            .host("ssh://me@d")
            .cert("CERT")
            .key("KEY")
            .build();
        assert_eq!(Strategy::classify(&inline).unwrap(), Strategy::InlineTls);

        let directory = Config::builder()
            .host("ssh://me@d")
            .cert_path("/certs")
            .build();
        assert_eq!(
            Strategy::classify(&directory).unwrap(),
            Strategy::CertDirectory
        );

        let ssh = Config::builder().host("ssh://me@d").build();
        assert_eq!(Strategy::classify(&ssh).unwrap(), Strategy::SshTunnel);

        let direct = Config::builder().host("tcp://d:2375").build();
        assert_eq!(Strategy::classify(&direct).unwrap(), Strategy::Direct);

        // A CA alone selects nothing.
        let ca_only = Config::builder().host("tcp://d:2375").ca("CA").build();
        assert_eq!(Strategy::classify(&ca_only).unwrap(), Strategy::Direct);
    }

    #[tokio::test]
    async fn direct_hosts_are_kept() {
        let client = Strategy::build(
            &Config::builder().host("tcp://127.0.0.1:2375").build(),
            &ssh::Program::Disabled,
        )
        .unwrap();

        assert_eq!(client.host(), "tcp://127.0.0.1:2375");
        assert_eq!(client.strategy(), Strategy::Direct);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unix_hosts_are_direct() {
        let client = Strategy::build(
            &Config::builder()
                .host("unix:///nonexistent/docker.sock")
                .build(),
            &ssh::Program::Disabled,
        )
        .unwrap();

        assert_eq!(client.host(), "unix:///nonexistent/docker.sock");
        assert_eq!(client.strategy(), Strategy::Direct);
    }

    #[tokio::test]
    async fn an_empty_host_uses_the_default() {
        let client = Strategy::build(&Config::default(), &ssh::Program::Disabled).unwrap();

        assert_eq!(client.host(), "");
        assert_eq!(client.strategy(), Strategy::Direct);
    }

    #[tokio::test]
    async fn ssh_without_a_program_falls_through() {
        let client = Strategy::build(
            &Config::builder().host("ssh://user@h").build(),
            &ssh::Program::Disabled,
        )
        .unwrap();

        assert_eq!(client.host(), "ssh://user@h");
        assert_eq!(client.strategy(), Strategy::Direct);
    }

    #[tokio::test]
    async fn ssh_with_a_program_tunnels() {
        let dir = tempfile::tempdir().unwrap();
        let program = dir.path().join("ssh");
        std::fs::write(&program, "").unwrap();

        let client = Strategy::build(
            &Config::builder().host("ssh://user@h").build(),
            &ssh::Program::Path(program),
        )
        .unwrap();

        assert_eq!(client.host(), ssh::EFFECTIVE_HOST);
        assert_eq!(client.strategy(), Strategy::SshTunnel);
    }

    #[tokio::test]
    async fn invalid_ssh_hosts_are_fatal() {
        let result = Strategy::build(
            &Config::builder().host("ssh://user@h/path").build(),
            &ssh::Program::Disabled,
        );

        assert!(matches!(result, Err(Error::Ssh { .. })));
    }

    #[tokio::test]
    async fn inline_tls() {
        let client = Strategy::build(
            &Config::builder()
                .host("tcp://127.0.0.1:2376")
                .ca(CA)
                .cert(CERT)
                .key(KEY)
                .build(),
            &ssh::Program::Disabled,
        )
        .unwrap();

        assert_eq!(client.host(), "tcp://127.0.0.1:2376");
        assert_eq!(client.strategy(), Strategy::InlineTls);
    }

    #[tokio::test]
    async fn inline_tls_requires_a_tcp_host() {
        let result = Strategy::build(
            &Config::builder()
                .host("unix:///var/run/docker.sock")
                .cert(CERT)
                .key(KEY)
                .build(),
            &ssh::Program::Disabled,
        );

        assert!(matches!(result, Err(Error::UnsupportedHost { .. })));
    }

    #[tokio::test]
    async fn inline_tls_with_a_bad_ca() {
        let result = Strategy::build(
            &Config::builder()
                .host("tcp://127.0.0.1:2376")
                .ca("not a certificate")
                .cert(CERT)
                .key(KEY)
                .build(),
            &ssh::Program::Disabled,
        );

        assert!(matches!(result, Err(Error::RootCertificate)));
    }

    #[tokio::test]
    async fn a_missing_directory_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let result = Strategy::build(
            &Config::builder()
                .host("tcp://127.0.0.1:2376")
                .cert_path(dir.path().display().to_string())
                .build(),
            &ssh::Program::Disabled,
        );

        assert!(matches!(result, Err(Error::Read { .. })));
    }
}
