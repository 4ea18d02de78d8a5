//! Clients shared across resource operations.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use dockwright_config::Fingerprint;

use crate::Client;

/// At most one client per configuration [fingerprint](Fingerprint).
///
/// Entries are never evicted. The lock is only held to look up or insert an
/// entry; clients are built and health checked outside of it.
#[derive(Debug, Default)]
pub struct Cache(Mutex<HashMap<Fingerprint, Arc<Client>>>);

impl Cache {
    /// Gets the client cached under a fingerprint.
    pub fn get(&self, fingerprint: Fingerprint) -> Option<Arc<Client>> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&fingerprint)
            .cloned()
    }

    /// Stores a client unless one is already cached under the fingerprint.
    ///
    /// Returns the cached client and whether it is the one that was passed
    /// in.
    pub fn insert_if_absent(
        &self,
        fingerprint: Fingerprint,
        client: Client,
    ) -> (Arc<Client>, bool) {
        let mut clients = self.0.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = clients.get(&fingerprint) {
            return (existing.clone(), false);
        }

        let client = Arc::new(client);
        clients.insert(fingerprint, client.clone());
        (client, true)
    }

    /// Gets the number of cached clients.
    pub fn len(&self) -> usize {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no clients are cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use dockwright_config::connection::Config;

    use super::*;
    use crate::Strategy;
    use crate::ssh::Program;

    fn client(host: &str) -> Client {
        Strategy::build(&Config::builder().host(host).build(), &Program::Disabled).unwrap()
    }

    #[tokio::test]
    async fn the_first_insert_wins() {
        let cache = Cache::default();
        let fingerprint = Config::builder().host("tcp://a:2375").build().fingerprint();

        let (first, stored) = cache.insert_if_absent(fingerprint, client("tcp://a:2375"));
        assert!(stored);

        let (second, stored) = cache.insert_if_absent(fingerprint, client("tcp://a:2375"));
        assert!(!stored);
        assert!(Arc::ptr_eq(&first, &second));

        assert!(Arc::ptr_eq(&first, &cache.get(fingerprint).unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn distinct_fingerprints() {
        let cache = Cache::default();
        assert!(cache.is_empty());

        for host in ["tcp://a:2375", "tcp://b:2375"] {
            let fingerprint = Config::builder().host(host).build().fingerprint();
            cache.insert_if_absent(fingerprint, client(host));
        }

        assert_eq!(cache.len(), 2);
        let missing = Config::builder().host("tcp://c:2375").build().fingerprint();
        assert!(cache.get(missing).is_none());
    }
}
