//! Cached view of the active geofence zone set.
//!
//! Check-ins read zones on every request, admins change them rarely. The
//! registry keeps the active set in a small TTL cache in front of the
//! storage port; admin write paths call [`GeofenceRegistry::invalidate`],
//! so a stale read lasts at most one TTL after an uncoordinated write.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use moka::future::Cache;

use crate::model::zone::GeofenceZone;
use crate::store::{Storage, StoreError};

const ACTIVE_ZONES_KEY: &str = "active";

#[derive(Clone)]
pub struct GeofenceRegistry {
    store: Arc<dyn Storage>,
    cache: Cache<&'static str, Arc<Vec<GeofenceZone>>>,
}

impl GeofenceRegistry {
    pub fn new(store: Arc<dyn Storage>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(ttl)
            .build();
        Self { store, cache }
    }

    /// The active zone set, served from cache while fresh. Concurrent
    /// callers on a cold cache share a single storage load.
    pub async fn active_zones(&self) -> Result<Vec<GeofenceZone>, StoreError> {
        let store = self.store.clone();
        let zones = self
            .cache
            .try_get_with(ACTIVE_ZONES_KEY, async move {
                store.active_zones().await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<StoreError>| (*e).clone())?;
        Ok(zones.as_ref().clone())
    }

    /// Drops the cached set. Called after every zone create or update.
    pub async fn invalidate(&self) {
        self.cache.invalidate(&ACTIVE_ZONES_KEY).await;
    }

    /// Prefetch the active set so the first check-in does not pay the load.
    pub async fn warmup(&self) -> Result<()> {
        let zones = self.active_zones().await?;
        tracing::info!(zones = zones.len(), "Geofence cache warmup complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStorage;
    use crate::store::NewZone;

    fn hq_zone() -> NewZone {
        NewZone {
            name: "HQ".to_string(),
            address: "1 Main St".to_string(),
            latitude: 37.7749,
            longitude: -122.4194,
            radius: 100.0,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn serves_cached_set_until_invalidated() {
        let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry = GeofenceRegistry::new(store.clone(), Duration::from_secs(3600));

        store.create_zone(hq_zone()).await.unwrap();
        assert_eq!(registry.active_zones().await.unwrap().len(), 1);

        // A second zone appears in storage but not in the cached view.
        store.create_zone(hq_zone()).await.unwrap();
        assert_eq!(registry.active_zones().await.unwrap().len(), 1);

        registry.invalidate().await;
        assert_eq!(registry.active_zones().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn empty_store_yields_empty_set() {
        let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let registry = GeofenceRegistry::new(store, Duration::from_secs(3600));
        assert!(registry.active_zones().await.unwrap().is_empty());
    }
}
