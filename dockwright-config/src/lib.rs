//! Configuration used within Dockwright.
//!
//! A few notes on the structure of this crate.
//!
//! * Configuration objects are considered immutable and are constructed
//!   through their builders or deserialized from the provider's sources.
//! * A per-resource [override](connection::Override) never modifies the
//!   provider default; [resolution](connection::Config::resolve) derives a new
//!   [`Config`](connection::Config).

use std::collections::HashSet;
use std::path::Path;

use anyhow::bail;
use bon::Builder;
use figment::Figment;
use figment::providers::Env;
use figment::providers::Format;
use figment::providers::Serialized;
use figment::providers::Toml;
use serde::Deserialize;
use serde::Serialize;
use tracing::debug;
use tracing::trace;

pub mod connection;
mod fingerprint;
pub mod registry;

pub use fingerprint::Fingerprint;

/// The file name used when looking for configuration files for Dockwright.
pub const FILE_NAME: &str = "dockwright.toml";

/// The prefix of the environment variables consulted while loading.
pub const ENV_PREFIX: &str = "DOCKER_";

/// The keys (sans [`ENV_PREFIX`]) that may be provided through the
/// environment.
const ENV_KEYS: &[&str] = &[
    "host",
    "cert_path",
    "ca_material",
    "cert_material",
    "key_material",
];

/// The provider-level configuration.
///
/// When loading, the sources that are automatically included are (in order
/// of increasing precedence):
///
/// * `host` defaults to [`DEFAULT_HOST`](connection::DEFAULT_HOST).
/// * `<CONFIG DIR>/dockwright/dockwright.toml`.
/// * `<CWD>/dockwright.toml`.
/// * If the environment variable is present, the file pointed to by
///   `DOCKWRIGHT_CONFIG`.
/// * The `DOCKER_HOST`, `DOCKER_CERT_PATH`, `DOCKER_CA_MATERIAL`,
///   `DOCKER_CERT_MATERIAL`, and `DOCKER_KEY_MATERIAL` environment variables.
///
/// Notably, a configuration object may not be valid. You'll need to use the
/// [`validate()`](ProviderConfig::validate) method to ensure the config is
/// valid.
#[derive(Builder, Clone, Debug, Default, Deserialize, Serialize)]
#[builder(builder_type = Builder)]
pub struct ProviderConfig {
    /// The default connection parameters.
    #[serde(flatten)]
    #[builder(default)]
    connection: connection::Config,

    /// Whether to skip contacting the daemon when the provider is configured.
    #[serde(default)]
    #[builder(default)]
    disable_docker_daemon_check: bool,

    /// Credentials for image registries.
    #[serde(default)]
    #[builder(default, into)]
    registry_auth: Vec<registry::Auth>,
}

impl ProviderConfig {
    /// Validates the configuration object.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.registry_auth
            .iter()
            .try_fold(HashSet::new(), |mut found, auth| {
                let address = auth.normalized_address();
                if found.contains(&address) {
                    bail!("duplicate registry address: {address}");
                }

                found.insert(address);
                Ok(found)
            })?;

        Ok(())
    }

    /// Gets the default connection parameters.
    pub fn connection(&self) -> &connection::Config {
        &self.connection
    }

    /// Whether the daemon check at configuration time is disabled.
    pub fn disable_docker_daemon_check(&self) -> bool {
        self.disable_docker_daemon_check
    }

    /// Gets the registry credentials.
    pub fn registry_auth(&self) -> &[registry::Auth] {
        self.registry_auth.as_slice()
    }

    /// Consumes `self` and returns the constituent parts.
    pub fn into_parts(self) -> (connection::Config, bool, Vec<registry::Auth>) {
        (
            self.connection,
            self.disable_docker_daemon_check,
            self.registry_auth,
        )
    }

    /// Gets a builder with the default sources preloaded.
    ///
    /// Each configuration file is merged over the ones before it, so a later
    /// file replaces (rather than extends) any list an earlier file set.
    pub fn default_sources() -> Figment {
        let mut builder =
            Figment::new().merge(Serialized::default("host", connection::DEFAULT_HOST));

        #[cfg(target_os = "macos")]
        {
            if let Some(home) = dirs::home_dir() {
                builder = layer(builder, home.join(".config").join("dockwright").join(FILE_NAME));
            }
        }
        #[cfg(not(target_os = "macos"))]
        {
            if let Some(config_home) = dirs::config_dir() {
                builder = layer(builder, config_home.join("dockwright").join(FILE_NAME));
            }
        }

        if let Ok(mut path) = std::env::current_dir() {
            path.push(FILE_NAME);
            builder = layer(builder, path);
        }

        if let Ok(config_file) = std::env::var("DOCKWRIGHT_CONFIG") {
            builder = layer(builder, config_file);
        }

        builder.merge(Env::prefixed(ENV_PREFIX).only(ENV_KEYS))
    }

    /// Loads a [`ProviderConfig`] from the default set of sources.
    pub fn load() -> figment::Result<Self> {
        Self::default_sources().extract()
    }

    /// Loads the provider configuration from a set of sources.
    ///
    /// The files in `paths` are layered on top of the configuration files
    /// found by [`default_sources()`](Self::default_sources); the environment
    /// still takes precedence over all of them.
    pub fn load_with_paths<I, S>(paths: I) -> figment::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<Path>,
    {
        let mut builder = Self::default_sources();

        for path in paths {
            builder = layer(builder, path.as_ref());
        }

        builder
            .merge(Env::prefixed(ENV_PREFIX).only(ENV_KEYS))
            .extract()
    }

    /// Loads a config from a test fixture.
    #[cfg(test)]
    pub fn fixture(path: impl AsRef<Path>) -> figment::Result<Self> {
        use std::path::PathBuf;

        let mut full_path = PathBuf::from(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/test/fixtures/config/",
        ));

        full_path.push(path);

        Figment::new()
            .merge(Serialized::default("host", connection::DEFAULT_HOST))
            .merge(Toml::file(full_path))
            .extract()
    }
}

/// Merges a configuration file over `builder`.
///
/// Missing files are skipped.
fn layer(builder: Figment, path: impl AsRef<Path>) -> Figment {
    let path = path.as_ref();

    if path.is_file() {
        debug!("layering configuration file `{}`", path.display());
    } else {
        trace!("configuration file `{}` does not exist", path.display());
    }

    builder.merge(Toml::file(path))
}

#[cfg(test)]
mod tests {
    use figment::Jail;

    use super::*;

    #[test]
    fn loading_file_returns_valid_config() {
        let config = ProviderConfig::fixture("example.toml").unwrap();
        config.validate().unwrap();

        let connection = config.connection();
        assert_eq!(connection.host(), "tcp://127.0.0.1:2376");
        assert_eq!(connection.ssh_opts(), ["-o", "StrictHostKeyChecking=no"]);
        assert_eq!(connection.cert_path(), "/etc/docker/certs");
        assert_eq!(connection.ca(), "");
        assert!(config.disable_docker_daemon_check());
        assert_eq!(config.registry_auth().len(), 2);
        assert_eq!(config.registry_auth()[0].username(), Some("robot"));
    }

    #[test]
    fn missing_host_uses_the_default() {
        let config = ProviderConfig::fixture("registries_only.toml").unwrap();
        assert_eq!(config.connection().host(), connection::DEFAULT_HOST);
        assert!(!config.disable_docker_daemon_check());
    }

    #[test]
    fn duplicate_registries() {
        let config = ProviderConfig::fixture("duplicate_registries.toml").unwrap();
        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "duplicate registry address: https://registry.example.com"
        );
    }

    #[test]
    fn environment_overrides_files() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                FILE_NAME,
                r#"
                    host = "tcp://from-file:2375"
                    cert_path = "/from/file"
                "#,
            )?;
            jail.set_env("DOCKER_HOST", "ssh://user@from-env");
            jail.set_env("DOCKER_CA_MATERIAL", "CA");
            jail.set_env("DOCKER_CONFIG", "/ignored");

            let config = ProviderConfig::load()?;
            assert_eq!(config.connection().host(), "ssh://user@from-env");
            assert_eq!(config.connection().cert_path(), "/from/file");
            assert_eq!(config.connection().ca(), "CA");

            Ok(())
        });
    }

    #[test]
    fn explicit_paths_are_layered() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file("extra.toml", r#"host = "tcp://extra:2375""#)?;

            let config = ProviderConfig::load_with_paths(["extra.toml"])?;
            assert_eq!(config.connection().host(), "tcp://extra:2375");

            Ok(())
        });
    }

    #[test]
    fn later_files_replace_lists() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                FILE_NAME,
                r#"
                    host = "ssh://me@from-cwd"
                    ssh_opts = ["-v"]
                    cert_path = "/from/cwd"
                "#,
            )?;
            jail.create_file("extra.toml", r#"ssh_opts = ["-4"]"#)?;

            let config = ProviderConfig::load_with_paths(["extra.toml"])?;
            assert_eq!(config.connection().ssh_opts(), ["-4"]);
            assert_eq!(config.connection().host(), "ssh://me@from-cwd");
            assert_eq!(config.connection().cert_path(), "/from/cwd");

            Ok(())
        });
    }

    #[test]
    fn builder_defaults() {
        let config = ProviderConfig::builder().build();
        assert_eq!(config.connection(), &connection::Config::default());
        assert!(!config.disable_docker_daemon_check());
        assert!(config.registry_auth().is_empty());
    }
}
