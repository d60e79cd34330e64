use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;

use crate::store::{Store, StoreConfig};

/// One independent store per access token, created on first use.
pub struct Tenants {
    config: StoreConfig,
    stores: Mutex<HashMap<String, Arc<Store>>>,
}

impl Tenants {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self, token: &str) -> Arc<Store> {
        let mut stores = self.stores.lock();
        if let Some(store) = stores.get(token) {
            return Arc::clone(store);
        }
        let store = Arc::new(Store::with_config(self.config));
        stores.insert(token.to_string(), Arc::clone(&store));
        info!(tenants = stores.len(), "new tenant store created");
        store
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_get_isolated_stores() {
        let tenants = Tenants::new(StoreConfig::default());
        let alice = tenants.store("alice");
        alice.create_folder("/private").unwrap();

        assert!(Arc::ptr_eq(&alice, &tenants.store("alice")));
        let bob = tenants.store("bob");
        assert!(bob.get_metadata("/private").is_err());
        assert_eq!(tenants.len(), 2);
    }
}
