//! Live Docker clients.

use bollard::secret::SystemVersion;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::Error;
use crate::Result;
use crate::Strategy;

/// A connection to one Docker daemon.
///
/// A client is bound to a single resolved configuration for its whole life.
/// The API version is negotiated with the daemon the first time a versioned
/// client is requested through [`docker()`](Self::docker).
#[derive(Debug)]
pub struct Client {
    /// The host the client talks to.
    host: String,

    /// How the client reaches its daemon.
    strategy: Strategy,

    /// The client before version negotiation.
    inner: bollard::Docker,

    /// The client after version negotiation.
    negotiated: OnceCell<bollard::Docker>,
}

impl Client {
    /// Creates a new [`Client`].
    pub(crate) fn new(host: impl Into<String>, strategy: Strategy, inner: bollard::Docker) -> Self {
        Self {
            host: host.into(),
            strategy,
            inner,
            negotiated: OnceCell::new(),
        }
    }

    /// Gets the host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Gets the connection strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Gets a reference to the inner [`bollard::Docker`].
    ///
    /// This client uses the default API version and has not negotiated with
    /// the daemon.
    pub fn inner(&self) -> &bollard::Docker {
        &self.inner
    }

    /// Confirms that the daemon is reachable.
    pub async fn ping(&self) -> Result<()> {
        debug!("pinging the Docker daemon at `{}`", self.host);
        self.inner.ping().await.map_err(Error::Ping)?;
        Ok(())
    }

    /// Gets a client that speaks the API version negotiated with the daemon.
    ///
    /// The negotiation happens once; later calls return the same client.
    pub async fn docker(&self) -> Result<&bollard::Docker> {
        let docker = self
            .negotiated
            .get_or_try_init(|| async {
                debug!("negotiating the API version with `{}`", self.host);
                self.inner.clone().negotiate_version().await
            })
            .await?;

        Ok(docker)
    }

    /// Gets the version information reported by the daemon.
    pub async fn version(&self) -> Result<SystemVersion> {
        Ok(self.docker().await?.version().await?)
    }
}
