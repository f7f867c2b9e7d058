use std::{collections::BTreeSet, hash::Hash, sync::Arc, time::Duration};

use dashmap::DashMap;
use log::trace;

use crate::model::{ComponentResolveMetadata, ModuleComponentIdentifier, ModuleIdentifier};

use super::CacheError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModuleVersionList {
    pub versions: BTreeSet<String>,
    /// Milliseconds since the Unix epoch.
    pub cached_at: u64,
}

/// A cached metadata lookup. `metadata` is `None` when the repository did not know the
/// component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedMetadata {
    pub metadata: Option<Arc<ComponentResolveMetadata>>,
    pub cached_at: u64,
}

impl CachedMetadata {
    pub fn is_missing(&self) -> bool {
        self.metadata.is_none()
    }
}

pub(crate) fn age(cached_at: u64, now: u64) -> Duration {
    Duration::from_millis(now.saturating_sub(cached_at))
}

/// Storage for what repositories answered, keyed by repository id.
pub trait ModuleMetadataCache: Send + Sync {
    fn cached_versions(
        &self,
        repository: &str,
        module: &ModuleIdentifier,
    ) -> Option<CachedModuleVersionList>;

    fn cache_versions(
        &self,
        repository: &str,
        module: &ModuleIdentifier,
        versions: &BTreeSet<String>,
        now: u64,
    ) -> Result<(), CacheError>;

    fn cached_metadata(
        &self,
        repository: &str,
        id: &ModuleComponentIdentifier,
    ) -> Option<CachedMetadata>;

    fn cache_metadata(
        &self,
        repository: &str,
        id: &ModuleComponentIdentifier,
        metadata: Option<Arc<ComponentResolveMetadata>>,
        now: u64,
    ) -> Result<(), CacheError>;

    fn clear(&self) -> Result<(), CacheError>;
}

pub const DEFAULT_MODULE_CACHE_ENTRIES: usize = 10_000;

/// Keeps repository answers for the lifetime of the engine only.
///
/// Listings and metadata are bounded separately; once a map is full the entry cached
/// longest ago makes room for a new one.
pub struct InMemoryModuleCache {
    versions: DashMap<(String, ModuleIdentifier), CachedModuleVersionList>,
    metadata: DashMap<(String, ModuleComponentIdentifier), CachedMetadata>,
    max_entries: usize,
}

impl Default for InMemoryModuleCache {
    fn default() -> Self {
        Self::with_max_entries(DEFAULT_MODULE_CACHE_ENTRIES)
    }
}

impl InMemoryModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_entries(max_entries: usize) -> Self {
        InMemoryModuleCache {
            versions: DashMap::new(),
            metadata: DashMap::new(),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.versions.len() + self.metadata.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn make_room<K, V>(map: &DashMap<K, V>, key: &K, max_entries: usize, cached_at: fn(&V) -> u64)
where
    K: Eq + Hash + Clone,
{
    if map.contains_key(key) {
        return;
    }
    while map.len() >= max_entries {
        let oldest = map
            .iter()
            .min_by_key(|entry| cached_at(entry.value()))
            .map(|entry| entry.key().clone());
        match oldest {
            Some(oldest) => {
                trace!("Evicting the oldest cached repository answer");
                map.remove(&oldest);
            }
            None => break,
        }
    }
}

impl ModuleMetadataCache for InMemoryModuleCache {
    fn cached_versions(
        &self,
        repository: &str,
        module: &ModuleIdentifier,
    ) -> Option<CachedModuleVersionList> {
        self.versions
            .get(&(repository.to_string(), module.clone()))
            .map(|entry| entry.value().clone())
    }

    fn cache_versions(
        &self,
        repository: &str,
        module: &ModuleIdentifier,
        versions: &BTreeSet<String>,
        now: u64,
    ) -> Result<(), CacheError> {
        let key = (repository.to_string(), module.clone());
        make_room(
            &self.versions,
            &key,
            self.max_entries,
            |entry| entry.cached_at,
        );
        self.versions.insert(
            key,
            CachedModuleVersionList {
                versions: versions.clone(),
                cached_at: now,
            },
        );
        Ok(())
    }

    fn cached_metadata(
        &self,
        repository: &str,
        id: &ModuleComponentIdentifier,
    ) -> Option<CachedMetadata> {
        self.metadata
            .get(&(repository.to_string(), id.clone()))
            .map(|entry| entry.value().clone())
    }

    fn cache_metadata(
        &self,
        repository: &str,
        id: &ModuleComponentIdentifier,
        metadata: Option<Arc<ComponentResolveMetadata>>,
        now: u64,
    ) -> Result<(), CacheError> {
        let key = (repository.to_string(), id.clone());
        make_room(
            &self.metadata,
            &key,
            self.max_entries,
            |entry| entry.cached_at,
        );
        self.metadata.insert(
            key,
            CachedMetadata {
                metadata,
                cached_at: now,
            },
        );
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.versions.clear();
        self.metadata.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn entries_are_scoped_by_repository() {
        let cache = InMemoryModuleCache::new();
        let module = ModuleIdentifier::new("org", "lib");
        let versions = BTreeSet::from(["1.0".to_string()]);
        cache.cache_versions("a", &module, &versions, 5).unwrap();

        assert_eq!(
            cache.cached_versions("a", &module),
            Some(CachedModuleVersionList {
                versions,
                cached_at: 5
            })
        );
        assert_eq!(cache.cached_versions("b", &module), None);
    }

    #[test]
    fn missing_components_are_recorded() {
        let cache = InMemoryModuleCache::new();
        let id = ModuleComponentIdentifier::new(ModuleIdentifier::new("org", "lib"), "1.0");
        cache.cache_metadata("a", &id, None, 7).unwrap();
        assert!(cache.cached_metadata("a", &id).unwrap().is_missing());
        cache.clear().unwrap();
        assert_eq!(cache.cached_metadata("a", &id), None);
    }

    #[test]
    fn full_cache_evicts_the_oldest_answer() {
        let cache = InMemoryModuleCache::with_max_entries(2);
        let versions = BTreeSet::from(["1.0".to_string()]);
        let modules: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|name| ModuleIdentifier::new("org", *name))
            .collect();
        cache.cache_versions("r", &modules[1], &versions, 20).unwrap();
        cache.cache_versions("r", &modules[0], &versions, 10).unwrap();
        cache.cache_versions("r", &modules[2], &versions, 30).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.cached_versions("r", &modules[0]), None);
        assert!(cache.cached_versions("r", &modules[1]).is_some());
        assert!(cache.cached_versions("r", &modules[2]).is_some());
    }

    #[test]
    fn refreshing_a_cached_answer_evicts_nothing() {
        let cache = InMemoryModuleCache::with_max_entries(2);
        let module = ModuleIdentifier::new("org", "lib");
        let first = ModuleComponentIdentifier::new(module.clone(), "1.0");
        let second = ModuleComponentIdentifier::new(module, "1.1");
        cache.cache_metadata("r", &first, None, 1).unwrap();
        cache.cache_metadata("r", &second, None, 2).unwrap();
        cache.cache_metadata("r", &first, None, 3).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.cached_metadata("r", &first).unwrap().cached_at, 3);
        assert_eq!(cache.cached_metadata("r", &second).unwrap().cached_at, 2);
    }

    #[test]
    fn age_never_underflows() {
        assert_eq!(age(10, 5), Duration::ZERO);
        assert_eq!(age(5, 1005), Duration::from_secs(1));
    }
}
