use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, PoisonError, RwLock,
    },
    time::Duration,
};

use log::trace;

use crate::model::{
    AttributeContainer, ComponentResolveMetadata, DescriptorHash, ModuleComponentIdentifier,
    ModuleIdentifier, ModuleSource,
};

use super::{ModuleComponentRepository, RepositoryError};

type FailureFactory = Arc<dyn Fn() -> RepositoryError + Send + Sync>;

/// A repository held in memory. Counts every call so callers can observe how often the
/// resolution engine reached the repository, and can be scripted to fail.
pub struct InMemoryRepository {
    id: String,
    modules: RwLock<BTreeMap<ModuleIdentifier, BTreeMap<String, Arc<ComponentResolveMetadata>>>>,
    listing_failure: RwLock<Option<FailureFactory>>,
    metadata_failure: RwLock<Option<FailureFactory>>,
    latency: Option<Duration>,
    list_calls: AtomicUsize,
    metadata_calls: AtomicUsize,
    hash_calls: AtomicUsize,
    attribute_calls: AtomicUsize,
}

impl InMemoryRepository {
    pub fn new(id: impl Into<String>) -> Self {
        InMemoryRepository {
            id: id.into(),
            modules: RwLock::new(BTreeMap::new()),
            listing_failure: RwLock::new(None),
            metadata_failure: RwLock::new(None),
            latency: None,
            list_calls: AtomicUsize::new(0),
            metadata_calls: AtomicUsize::new(0),
            hash_calls: AtomicUsize::new(0),
            attribute_calls: AtomicUsize::new(0),
        }
    }

    /// Publishes `release` components for each version.
    pub fn with_versions(self, module: &ModuleIdentifier, versions: &[&str]) -> Self {
        for version in versions {
            self.publish(ComponentResolveMetadata::new(
                ModuleComponentIdentifier::new(module.clone(), *version),
                "release",
            ));
        }
        self
    }

    pub fn with_component(self, metadata: ComponentResolveMetadata) -> Self {
        self.publish(metadata);
        self
    }

    /// Every call sleeps for `latency` before answering.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Adds or replaces a component. Republishing under the same version yields a new
    /// descriptor hash when the content differs.
    pub fn publish(&self, metadata: ComponentResolveMetadata) {
        let metadata = metadata.without_repository_source();
        let hash = metadata
            .compute_descriptor_hash()
            .unwrap_or_else(|_| DescriptorHash::of_bytes(metadata.id.to_string().as_bytes()));
        let changing = metadata.changing;
        let metadata = metadata.with_source(ModuleSource::DescriptorHash { hash, changing });
        trace!("Publishing {} to {}", metadata.id, self.id);
        self.modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(metadata.id.module.clone())
            .or_default()
            .insert(metadata.id.version.clone(), Arc::new(metadata));
    }

    pub fn unpublish(&self, id: &ModuleComponentIdentifier) {
        if let Some(versions) = self
            .modules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(&id.module)
        {
            versions.remove(&id.version);
        }
    }

    pub fn fail_listing_with(&self, failure: impl Fn() -> RepositoryError + Send + Sync + 'static) {
        *self
            .listing_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(failure));
    }

    pub fn fail_metadata_with(
        &self,
        failure: impl Fn() -> RepositoryError + Send + Sync + 'static,
    ) {
        *self
            .metadata_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(failure));
    }

    pub fn clear_failures(&self) {
        *self
            .listing_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
        *self
            .metadata_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn list_versions_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }

    pub fn descriptor_hash_calls(&self) -> usize {
        self.hash_calls.load(Ordering::SeqCst)
    }

    pub fn attributes_calls(&self) -> usize {
        self.attribute_calls.load(Ordering::SeqCst)
    }

    fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }

    fn failure(slot: &RwLock<Option<FailureFactory>>) -> Option<RepositoryError> {
        slot.read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|failure| failure())
    }

    fn component(&self, id: &ModuleComponentIdentifier) -> Option<Arc<ComponentResolveMetadata>> {
        self.modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id.module)
            .and_then(|versions| versions.get(&id.version))
            .cloned()
    }
}

impl ModuleComponentRepository for InMemoryRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn list_versions(
        &self,
        module: &ModuleIdentifier,
    ) -> Result<Option<BTreeSet<String>>, RepositoryError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        if let Some(error) = Self::failure(&self.listing_failure) {
            return Err(error);
        }
        Ok(self
            .modules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(module)
            .filter(|versions| !versions.is_empty())
            .map(|versions| versions.keys().cloned().collect()))
    }

    fn fetch_metadata(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<Arc<ComponentResolveMetadata>>, RepositoryError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency();
        if let Some(error) = Self::failure(&self.metadata_failure) {
            return Err(error);
        }
        Ok(self.component(id))
    }

    fn descriptor_hash(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<DescriptorHash>, RepositoryError> {
        self.hash_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = Self::failure(&self.metadata_failure) {
            return Err(error);
        }
        Ok(self
            .component(id)
            .and_then(|metadata| metadata.descriptor_hash().cloned()))
    }

    fn attributes(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<AttributeContainer, RepositoryError> {
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .component(id)
            .map(|metadata| metadata.attributes.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn lists_published_versions() {
        let module = ModuleIdentifier::new("org", "lib");
        let repository = InMemoryRepository::new("repo").with_versions(&module, &["1.0", "1.2"]);
        assert_eq!(
            repository.list_versions(&module).unwrap(),
            Some(BTreeSet::from(["1.0".to_string(), "1.2".to_string()]))
        );
        assert_eq!(
            repository
                .list_versions(&ModuleIdentifier::new("org", "other"))
                .unwrap(),
            None
        );
        assert_eq!(repository.list_versions_calls(), 2);
    }

    #[test]
    fn republishing_changes_the_hash() {
        let module = ModuleIdentifier::new("org", "lib");
        let id = ModuleComponentIdentifier::new(module, "1.0-SNAPSHOT");
        let repository = InMemoryRepository::new("repo");
        repository.publish(ComponentResolveMetadata::new(id.clone(), "integration"));
        let first = repository.descriptor_hash(&id).unwrap();
        repository.publish(
            ComponentResolveMetadata::new(id.clone(), "integration")
                .with_attributes(AttributeContainer::new().with("build", "2")),
        );
        let second = repository.descriptor_hash(&id).unwrap();
        assert!(first.is_some());
        assert_ne!(first, second);
        assert_eq!(repository.descriptor_hash_calls(), 2);
        assert_eq!(repository.fetch_metadata_calls(), 0);
    }

    #[test]
    fn scripted_failures() {
        let module = ModuleIdentifier::new("org", "lib");
        let repository = InMemoryRepository::new("repo").with_versions(&module, &["1.0"]);
        repository.fail_listing_with(|| RepositoryError::Status {
            status: 503,
            location: "repo".to_string(),
        });
        assert!(repository.list_versions(&module).is_err());
        repository.clear_failures();
        assert!(repository.list_versions(&module).is_ok());
    }
}
