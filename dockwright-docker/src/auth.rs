//! Registry credentials handed to the daemon.

use std::collections::HashMap;

use bollard::auth::DockerCredentials;
use dockwright_config::registry::Auth;
use dockwright_config::registry::normalize_address;

/// Credentials keyed by normalized registry address.
#[derive(Clone, Debug, Default)]
pub struct AuthConfigs(HashMap<String, DockerCredentials>);

impl AuthConfigs {
    /// Creates a new [`AuthConfigs`] from registry authentication blocks.
    ///
    /// When two blocks normalize to the same address, the last one wins.
    pub fn new<'a>(auths: impl IntoIterator<Item = &'a Auth>) -> Self {
        Self(
            auths
                .into_iter()
                .map(|auth| {
                    let address = auth.normalized_address();
                    let credentials = DockerCredentials {
                        username: auth.username().map(String::from),
                        password: auth.password().map(String::from),
                        serveraddress: Some(address.clone()),
                        ..Default::default()
                    };

                    (address, credentials)
                })
                .collect(),
        )
    }

    /// Gets the credentials for a registry.
    ///
    /// The address is normalized before the lookup.
    pub fn get(&self, address: &str) -> Option<&DockerCredentials> {
        self.0.get(&normalize_address(address))
    }

    /// Gets the normalized addresses with credentials.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Gets the number of registries with credentials.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no credentials.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_normalized() {
        let auths = [
            Auth::builder()
                .address("registry.example.com")
                .username("robot")
                .password("hunter2")
                .build(),
            Auth::builder().address("http://localhost:5000").build(),
        ];

        let configs = AuthConfigs::new(&auths);
        assert_eq!(configs.len(), 2);

        let credentials = configs.get("https://registry.example.com").unwrap();
        assert_eq!(credentials.username.as_deref(), Some("robot"));
        assert_eq!(credentials.password.as_deref(), Some("hunter2"));
        assert_eq!(
            credentials.serveraddress.as_deref(),
            Some("https://registry.example.com")
        );
        assert!(configs.get("registry.example.com").is_some());

        assert!(configs.get("http://localhost:5000").is_some());
        assert!(configs.get("localhost:5000").is_none());
    }

    #[test]
    fn empty() {
        let configs = AuthConfigs::default();
        assert!(configs.is_empty());
        assert_eq!(configs.addresses().count(), 0);
    }
}
