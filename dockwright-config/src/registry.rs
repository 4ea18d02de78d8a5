//! Configuration related to image registries.

use bon::Builder;
use serde::Deserialize;
use serde::Serialize;

/// The scheme of registries reached without TLS.
const INSECURE_SCHEME: &str = "http://";

/// The scheme assumed for registries listed without one.
const SECURE_SCHEME: &str = "https://";

/// Standardizes a registry address.
///
/// A registry may be referenced with or without its scheme (in an
/// authentication block, a Docker config file, or an image name). Addresses
/// without a scheme are assumed to be served over `https://`. An explicit
/// `http://` is kept so that insecure registries remain reachable.
pub fn normalize_address(address: &str) -> String {
    if address.starts_with(INSECURE_SCHEME) || address.starts_with(SECURE_SCHEME) {
        return address.to_string();
    }

    format!("{SECURE_SCHEME}{address}")
}

/// Credentials for a single registry.
#[derive(Builder, Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[builder(builder_type = Builder)]
pub struct Auth {
    /// The address of the registry.
    #[builder(into)]
    address: String,

    /// The username.
    #[serde(default)]
    #[builder(into)]
    username: Option<String>,

    /// The password.
    #[serde(default)]
    #[builder(into)]
    password: Option<String>,
}

impl Auth {
    /// Gets the address as written in the configuration.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Gets the normalized address.
    pub fn normalized_address(&self) -> String {
        normalize_address(&self.address)
    }

    /// Gets the username (if available).
    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    /// Gets the password (if available).
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_addresses_gain_https() {
        assert_eq!(
            normalize_address("registry.example.com"),
            "https://registry.example.com"
        );
        assert_eq!(
            normalize_address("localhost:5000/v2"),
            "https://localhost:5000/v2"
        );
    }

    #[test]
    fn explicit_schemes_are_kept() {
        assert_eq!(
            normalize_address("http://localhost:5000"),
            "http://localhost:5000"
        );
        assert_eq!(
            normalize_address("https://registry.example.com"),
            "https://registry.example.com"
        );
    }

    #[test]
    fn auth_normalizes_its_address() {
        let auth = Auth::builder()
            .address("ghcr.io")
            .username("robot")
            .build();

        assert_eq!(auth.address(), "ghcr.io");
        assert_eq!(auth.normalized_address(), "https://ghcr.io");
        assert_eq!(auth.username(), Some("robot"));
        assert_eq!(auth.password(), None);
    }
}
