//! Optional per-deployment cache of loaded, downsampled resources.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::resources::DeploymentData;

/// Entries are keyed by deployment key alone, so a lookup never yields
/// another deployment's data. Only complete loads are kept; a failed load is
/// retried on the next request.
#[derive(Debug, Default)]
pub struct DeploymentCache {
    entries: RwLock<HashMap<String, Arc<DeploymentData>>>,
}

impl DeploymentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<DeploymentData>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    pub fn get_or_load<F>(&self, key: &str, load: F) -> Arc<DeploymentData>
    where
        F: FnOnce() -> DeploymentData,
    {
        if let Some(hit) = self.get(key) {
            debug!("cache hit for {}", key);
            return hit;
        }
        let data = Arc::new(load());
        if data.is_complete() {
            self.entries
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(key.to_string(), Arc::clone(&data));
        }
        data
    }

    pub fn invalidate(&self, key: &str) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ProfileSet;
    use crate::{HubError, RangeBasis, ResourceKind};
    use std::cell::Cell;

    fn complete(key: &str) -> DeploymentData {
        DeploymentData {
            key: key.to_string(),
            track: Ok(Vec::new()),
            profile: Ok(ProfileSet::new(Vec::new(), 10, RangeBasis::Loaded)),
        }
    }

    #[test]
    fn loads_once_per_key() {
        let cache = DeploymentCache::new();
        let calls = Cell::new(0);
        for _ in 0..3 {
            let data = cache.get_or_load("a", || {
                calls.set(calls.get() + 1);
                complete("a")
            });
            assert_eq!(data.key, "a");
        }
        assert_eq!(calls.get(), 1);

        let other = cache.get_or_load("b", || complete("b"));
        assert_eq!(other.key, "b");
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn failed_loads_are_not_cached() {
        let cache = DeploymentCache::new();
        let failed = cache.get_or_load("a", || DeploymentData {
            key: "a".into(),
            track: Err(HubError::ResourceNotFound {
                key: "a".into(),
                kind: ResourceKind::Track,
            }),
            profile: Ok(ProfileSet::new(Vec::new(), 10, RangeBasis::Loaded)),
        });
        assert!(!failed.is_complete());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_forces_reload() {
        let cache = DeploymentCache::new();
        cache.get_or_load("a", || complete("a"));
        cache.invalidate("a");
        assert!(cache.get("a").is_none());
        cache.get_or_load("a", || complete("a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
