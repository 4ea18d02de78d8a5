//! Connection parameters for a single Docker daemon.
//!
//! A [`Config`] is built once from the top-level provider block and,
//! optionally, once more from the `override` block of an individual resource.
//! Neither is ever mutated: [`Config::resolve()`] derives a new value.

use bon::Builder;
use serde::Deserialize;
use serde::Serialize;

/// The Docker host used when no host is configured.
#[cfg(not(windows))]
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

/// The Docker host used when no host is configured.
#[cfg(windows)]
pub const DEFAULT_HOST: &str = "npipe:////./pipe/docker_engine";

/// The scheme prefix of hosts reached through an SSH tunnel.
pub const SSH_SCHEME: &str = "ssh://";

/// Connection parameters for one Docker daemon target.
///
/// An empty string (or an empty list for [`ssh_opts`](Config::ssh_opts))
/// means the parameter was not provided.
#[derive(Builder, Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
#[builder(builder_type = Builder)]
pub struct Config {
    /// The Docker daemon endpoint (e.g., `tcp://host:2376`, `ssh://user@host`).
    #[builder(default, into)]
    host: String,

    /// Additional flags handed to the `ssh` client.
    #[builder(default)]
    ssh_opts: Vec<String>,

    /// PEM-encoded certificate authority material.
    #[serde(rename = "ca_material")]
    #[builder(default, into)]
    ca: String,

    /// PEM-encoded client certificate material.
    #[serde(rename = "cert_material")]
    #[builder(default, into)]
    cert: String,

    /// PEM-encoded client key material.
    #[serde(rename = "key_material")]
    #[builder(default, into)]
    key: String,

    /// A directory containing `ca.pem`, `cert.pem`, and `key.pem`.
    #[builder(default, into)]
    cert_path: String,
}

impl Config {
    /// Gets the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Gets the SSH options.
    pub fn ssh_opts(&self) -> &[String] {
        &self.ssh_opts
    }

    /// Gets the certificate authority material.
    pub fn ca(&self) -> &str {
        &self.ca
    }

    /// Gets the client certificate material.
    pub fn cert(&self) -> &str {
        &self.cert
    }

    /// Gets the client key material.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Gets the certificate directory.
    pub fn cert_path(&self) -> &str {
        &self.cert_path
    }

    /// Whether the host should be reached through an SSH tunnel.
    pub fn is_ssh(&self) -> bool {
        self.host.starts_with(SSH_SCHEME)
    }

    /// Resolves `self` (the provider default) against a resource's override
    /// block.
    ///
    /// Every non-empty value within the override replaces the default. The
    /// SSH options are replaced as a whole when the override lists any; they
    /// are never merged element by element.
    pub fn resolve(&self, overrides: Option<&Override>) -> Config {
        let Some(block) = overrides.and_then(Override::block) else {
            return self.clone();
        };

        Config {
            host: pick(&self.host, &block.host),
            ssh_opts: if block.ssh_opts.is_empty() {
                self.ssh_opts.clone()
            } else {
                block.ssh_opts.clone()
            },
            ca: pick(&self.ca, &block.ca),
            cert: pick(&self.cert, &block.cert),
            key: pick(&self.key, &block.key),
            cert_path: pick(&self.cert_path, &block.cert_path),
        }
    }
}

/// Returns the override value unless it is empty.
fn pick(default: &str, value: &str) -> String {
    if value.is_empty() {
        default.to_string()
    } else {
        value.to_string()
    }
}

/// The `override` block attached to an individual resource.
///
/// Terraform represents the block as a list holding at most one element, so
/// the list shape is kept here. Only the first block is consulted.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Override(Vec<Config>);

impl Override {
    /// Creates an override holding a single block.
    pub fn new(block: Config) -> Self {
        Self(vec![block])
    }

    /// Gets the override block (if one was provided).
    pub fn block(&self) -> Option<&Config> {
        self.0.first()
    }

    /// Whether no override block was provided.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Config> for Override {
    fn from(block: Config) -> Self {
        Self::new(block)
    }
}
