//! The provider state shared by every resource operation.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use bon::Builder;
use dockwright_config::ProviderConfig;
use dockwright_config::connection::Config;
use dockwright_config::connection::Override;
use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use crate::AuthConfigs;
use crate::Cache;
use crate::Client;
use crate::Error;
use crate::Result;
use crate::Strategy;
use crate::ssh;

/// The state of a configured provider.
///
/// A provider is built once when it is configured and lives as long as the
/// plugin process. Clients are created lazily, one per distinct resolved
/// configuration, and are never evicted.
#[derive(Builder, Debug)]
#[builder(builder_type = Builder)]
pub struct Provider {
    /// The default connection parameters.
    #[builder(default)]
    config: Config,

    /// Credentials for image registries.
    #[builder(default)]
    auth: AuthConfigs,

    /// The `ssh` client used for `ssh://` hosts.
    #[builder(default)]
    ssh: ssh::Program,

    /// Connection overrides registered per resource.
    #[builder(skip)]
    overrides: RwLock<HashMap<String, Override>>,

    /// The live clients.
    #[builder(skip)]
    cache: Cache,
}

impl Provider {
    /// Configures a provider.
    ///
    /// Unless `disable_docker_daemon_check` is set, a client for the default
    /// configuration is created and health checked before returning.
    pub async fn configure(config: ProviderConfig, token: &CancellationToken) -> Result<Self> {
        let (config, disable_check, auths) = config.into_parts();

        let provider = Self::builder()
            .config(config)
            .auth(AuthConfigs::new(&auths))
            .build();

        if disable_check {
            info!("the Docker daemon check is disabled");
        } else {
            provider.make_client(token, None).await?;
        }

        Ok(provider)
    }

    /// Gets the default connection parameters.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Gets the registry credentials.
    pub fn auth(&self) -> &AuthConfigs {
        &self.auth
    }

    /// Gets the client cache.
    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Gets a client for the default configuration resolved against
    /// `overrides`.
    ///
    /// A client already cached for the resolved configuration is returned
    /// without contacting the daemon. Otherwise, a new client is built,
    /// cached, and health checked. A client that fails its health check stays
    /// cached.
    pub async fn make_client(
        &self,
        token: &CancellationToken,
        overrides: Option<&Override>,
    ) -> Result<Arc<Client>> {
        let config = self.config.resolve(overrides);
        let fingerprint = config.fingerprint();

        if let Some(client) = self.cache.get(fingerprint) {
            debug!(
                "found cached client (fingerprint: {fingerprint}, host: `{}`)",
                config.host()
            );
            return Ok(client);
        }

        let client = Strategy::build(&config, &self.ssh)?;
        let (client, _) = self.cache.insert_if_absent(fingerprint, client);

        select! {
            biased;

            _ = token.cancelled() => return Err(Error::Cancelled),
            res = client.ping() => res?,
        }

        debug!(
            "new client (fingerprint: {fingerprint}, host: `{}`)",
            config.host()
        );
        Ok(client)
    }

    /// Registers the connection override of a resource.
    ///
    /// A later registration for the same resource replaces the earlier one.
    pub fn register_override(&self, id: impl Into<String>, overrides: Override) {
        self.overrides
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), overrides);
    }

    /// Gets a client for a resource using its registered override.
    ///
    /// Resources without a registered override use the default
    /// configuration.
    pub async fn make_client_for(
        &self,
        token: &CancellationToken,
        id: &str,
    ) -> Result<Arc<Client>> {
        let overrides = self
            .overrides
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned();

        self.make_client(token, overrides.as_ref()).await
    }
}
