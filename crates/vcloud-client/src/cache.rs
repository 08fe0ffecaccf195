//! Short-lived cache of resolved entities

use crate::entity::Entity;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Org,
    Vdc,
    VappCatalog,
    MediaCatalog,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Org => write!(f, "org"),
            CacheKey::Vdc => write!(f, "vdc"),
            CacheKey::VappCatalog => write!(f, "vapp-catalog"),
            CacheKey::MediaCatalog => write!(f, "media-catalog"),
        }
    }
}

/// Entities keyed by [`CacheKey`], owned by one client
#[derive(Debug, Default)]
pub struct EntityCache {
    entries: Mutex<HashMap<CacheKey, Entity>>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: CacheKey) -> Option<Entity> {
        self.lock().get(&key).cloned()
    }

    pub fn insert(&self, key: CacheKey, entity: Entity) {
        tracing::debug!("Caching {} -> {}", key, entity.href);
        self.lock().insert(key, entity);
    }

    pub fn contains(&self, key: CacheKey) -> bool {
        self.lock().contains_key(&key)
    }

    pub fn clear(&self) {
        let mut entries = self.lock();
        if !entries.is_empty() {
            tracing::debug!("Clearing {} cached entities", entries.len());
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CacheKey, Entity>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_clear() {
        let cache = EntityCache::new();
        assert!(cache.get(CacheKey::Org).is_none());

        let org = Entity {
            href: "https://vcd/api/org/1".to_string(),
            ..Entity::default()
        };
        cache.insert(CacheKey::Org, org.clone());

        assert_eq!(cache.get(CacheKey::Org), Some(org));
        assert!(!cache.contains(CacheKey::Vdc));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(CacheKey::Org).is_none());
    }
}
