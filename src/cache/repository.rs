use std::{collections::BTreeSet, sync::Arc};

use log::{debug, trace, warn};

use crate::{
    model::{ComponentResolveMetadata, DescriptorHash, ModuleComponentIdentifier, ModuleIdentifier},
    repository::{ModuleComponentRepository, RepositoryError},
};

use super::{
    store::age, CacheEntryKind, CacheError, CachePolicy, Freshness, ModuleMetadataCache,
    TimeProvider,
};

/// Serves repository answers from a [`ModuleMetadataCache`] while the [`CachePolicy`] considers
/// them fresh, and reaches the wrapped repository otherwise.
///
/// Failures are never cached. Entries are only written once the repository call completed.
pub struct CachingModuleComponentRepository {
    delegate: Arc<dyn ModuleComponentRepository>,
    cache: Arc<dyn ModuleMetadataCache>,
    policy: CachePolicy,
    clock: Arc<dyn TimeProvider>,
}

impl CachingModuleComponentRepository {
    pub fn new(
        delegate: Arc<dyn ModuleComponentRepository>,
        cache: Arc<dyn ModuleMetadataCache>,
        policy: CachePolicy,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        CachingModuleComponentRepository {
            delegate,
            cache,
            policy,
            clock,
        }
    }

    fn is_fresh(&self, kind: CacheEntryKind, cached_at: u64, now: u64) -> bool {
        self.policy.freshness(kind, age(cached_at, now)) == Freshness::UseCached
    }

    fn store(&self, what: &dyn std::fmt::Display, result: Result<(), CacheError>) {
        if let Err(error) = result {
            warn!(
                "Could not cache {} for repository {}: {}",
                what,
                self.delegate.id(),
                error
            );
        }
    }

    fn store_metadata(
        &self,
        id: &ModuleComponentIdentifier,
        metadata: Option<Arc<ComponentResolveMetadata>>,
        now: u64,
    ) {
        let result = self
            .cache
            .cache_metadata(self.delegate.id(), id, metadata, now);
        self.store(id, result);
    }

    /// Checks a stale, non-changing entry against the descriptor hash the repository reports.
    /// Returns the answer to use, or `None` when a full fetch is needed.
    fn revalidate_by_hash(
        &self,
        id: &ModuleComponentIdentifier,
        cached: &Arc<ComponentResolveMetadata>,
        cached_hash: &DescriptorHash,
        now: u64,
    ) -> Result<Option<Option<Arc<ComponentResolveMetadata>>>, RepositoryError> {
        match self.delegate.descriptor_hash(id)? {
            Some(current) if &current == cached_hash => {
                debug!(
                    "Descriptor of {} in {} is unchanged, reusing cached metadata",
                    id,
                    self.delegate.id()
                );
                self.store_metadata(id, Some(cached.clone()), now);
                Ok(Some(Some(cached.clone())))
            }
            Some(_) => {
                debug!(
                    "Descriptor of {} in {} has changed, will perform fresh resolve",
                    id,
                    self.delegate.id()
                );
                Ok(None)
            }
            None => {
                debug!("{} is no longer present in {}", id, self.delegate.id());
                self.store_metadata(id, None, now);
                Ok(Some(None))
            }
        }
    }
}

impl ModuleComponentRepository for CachingModuleComponentRepository {
    fn id(&self) -> &str {
        self.delegate.id()
    }

    fn name(&self) -> &str {
        self.delegate.name()
    }

    fn list_versions(
        &self,
        module: &ModuleIdentifier,
    ) -> Result<Option<BTreeSet<String>>, RepositoryError> {
        let now = self.clock.now_millis();
        if let Some(cached) = self.cache.cached_versions(self.delegate.id(), module) {
            let kind = if cached.versions.is_empty() {
                CacheEntryKind::MissingModule
            } else {
                CacheEntryKind::VersionList
            };
            if self.is_fresh(kind, cached.cached_at, now) {
                trace!(
                    "Using cached version list for {} in {}",
                    module,
                    self.delegate.id()
                );
                return Ok(Some(cached.versions).filter(|versions| !versions.is_empty()));
            }
            debug!(
                "Cached version list for {} in {} is stale, will perform fresh resolve",
                module,
                self.delegate.id()
            );
        }

        let versions = self.delegate.list_versions(module)?;
        let result = self.cache.cache_versions(
            self.delegate.id(),
            module,
            &versions.clone().unwrap_or_default(),
            now,
        );
        self.store(module, result);
        Ok(versions)
    }

    fn fetch_metadata(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<Arc<ComponentResolveMetadata>>, RepositoryError> {
        let now = self.clock.now_millis();
        if let Some(cached) = self.cache.cached_metadata(self.delegate.id(), id) {
            match &cached.metadata {
                None => {
                    if self.is_fresh(CacheEntryKind::MissingModule, cached.cached_at, now) {
                        trace!("Using cached missing entry for {}", id);
                        return Ok(None);
                    }
                }
                // Changing modules are republished under the same id: only a full fetch can
                // tell whether the content is still current.
                Some(metadata) if metadata.is_changing() => {
                    if self.is_fresh(CacheEntryKind::ChangingModule, cached.cached_at, now) {
                        trace!("Using cached metadata for changing module {}", id);
                        return Ok(Some(metadata.clone()));
                    }
                    debug!(
                        "Cached metadata for changing module {} is stale, refetching",
                        id
                    );
                }
                Some(metadata) => {
                    if self.is_fresh(CacheEntryKind::Module, cached.cached_at, now) {
                        trace!("Using cached metadata for {}", id);
                        return Ok(Some(metadata.clone()));
                    }
                    if let Some(hash) = metadata.descriptor_hash() {
                        if let Some(answer) = self.revalidate_by_hash(id, metadata, hash, now)? {
                            return Ok(answer);
                        }
                    }
                }
            }
        }

        let metadata = self.delegate.fetch_metadata(id)?;
        self.store_metadata(id, metadata.clone(), now);
        Ok(metadata)
    }

    fn descriptor_hash(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<DescriptorHash>, RepositoryError> {
        self.delegate.descriptor_hash(id)
    }
}
