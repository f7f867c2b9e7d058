use std::{cell::OnceCell, sync::Arc};

use log::trace;

use crate::{
    model::{AttributeContainer, ComponentResolveMetadata, ModuleComponentIdentifier},
    repository::{ModuleComponentRepository, RepositoryError},
};

pub type MetadataResult = Result<Option<Arc<ComponentResolveMetadata>>, Arc<RepositoryError>>;

/// One candidate version of one repository. Metadata is fetched on first use and kept for the
/// rest of the resolution.
pub struct ComponentMetadataProvider<'a> {
    repository: &'a dyn ModuleComponentRepository,
    id: ModuleComponentIdentifier,
    metadata: OnceCell<MetadataResult>,
}

impl<'a> ComponentMetadataProvider<'a> {
    pub fn new(
        repository: &'a dyn ModuleComponentRepository,
        id: ModuleComponentIdentifier,
    ) -> Self {
        ComponentMetadataProvider {
            repository,
            id,
            metadata: OnceCell::new(),
        }
    }

    pub fn id(&self) -> &ModuleComponentIdentifier {
        &self.id
    }

    pub fn repository(&self) -> &'a dyn ModuleComponentRepository {
        self.repository
    }

    pub fn metadata(&self) -> MetadataResult {
        self.metadata
            .get_or_init(|| {
                trace!(
                    "Fetching metadata of {} from {}",
                    self.id,
                    self.repository.id()
                );
                self.repository.fetch_metadata(&self.id).map_err(Arc::new)
            })
            .clone()
    }

    pub fn is_metadata_fetched(&self) -> bool {
        self.metadata.get().is_some()
    }

    /// Uses already fetched metadata when there is some, and asks the repository otherwise.
    pub fn attributes(&self) -> Result<AttributeContainer, Arc<RepositoryError>> {
        match self.metadata.get() {
            Some(Ok(Some(metadata))) => Ok(metadata.attributes.clone()),
            _ => self.repository.attributes(&self.id).map_err(Arc::new),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{model::ModuleIdentifier, repository::InMemoryRepository};

    use pretty_assertions::assert_eq;

    #[test]
    fn metadata_is_fetched_once() {
        let module = ModuleIdentifier::new("org", "lib");
        let repository = InMemoryRepository::new("repo").with_versions(&module, &["1.0"]);
        let provider = ComponentMetadataProvider::new(
            &repository,
            ModuleComponentIdentifier::new(module, "1.0"),
        );

        assert!(!provider.is_metadata_fetched());
        let first = provider.metadata().unwrap();
        let second = provider.metadata().unwrap();
        assert_eq!(first, second);
        assert_eq!(repository.fetch_metadata_calls(), 1);

        provider.attributes().unwrap();
        assert_eq!(repository.attributes_calls(), 0);
    }

    #[test]
    fn attributes_do_not_force_a_metadata_fetch() {
        let module = ModuleIdentifier::new("org", "lib");
        let repository = InMemoryRepository::new("repo").with_versions(&module, &["1.0"]);
        let provider = ComponentMetadataProvider::new(
            &repository,
            ModuleComponentIdentifier::new(module, "1.0"),
        );

        provider.attributes().unwrap();
        assert_eq!(repository.attributes_calls(), 1);
        assert_eq!(repository.fetch_metadata_calls(), 0);
    }
}
