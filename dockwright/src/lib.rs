//! Dockwright.

#[cfg(feature = "config")]
#[doc(inline)]
pub use dockwright_config as config;
#[cfg(feature = "config")]
#[doc(inline)]
pub use dockwright_config::ProviderConfig;
#[cfg(feature = "docker")]
#[doc(inline)]
pub use dockwright_docker as docker;
#[cfg(feature = "docker")]
#[doc(inline)]
pub use dockwright_docker::Provider;
