mod error;
pub mod filesystem;
pub mod memory;

use std::{collections::BTreeSet, fmt::Display, sync::Arc};

use sha2::{Digest, Sha256};

use crate::model::{
    AttributeContainer, ComponentResolveMetadata, DescriptorHash, ModuleComponentIdentifier,
    ModuleIdentifier,
};

pub use error::RepositoryError;
pub use filesystem::FileSystemRepository;
pub use memory::InMemoryRepository;

/// Access to one repository of the chain. Implementations are blocking and must be safe to
/// share between resolution threads.
pub trait ModuleComponentRepository: Send + Sync {
    /// Stable identifier, used to key cache entries.
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    /// Versions the repository knows for the module, or `None` if it does not know the module.
    fn list_versions(
        &self,
        module: &ModuleIdentifier,
    ) -> Result<Option<BTreeSet<String>>, RepositoryError>;

    fn fetch_metadata(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<Arc<ComponentResolveMetadata>>, RepositoryError>;

    /// Hash of the descriptor currently published for `id`. Repositories that can answer this
    /// without transferring the descriptor should override it.
    fn descriptor_hash(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<DescriptorHash>, RepositoryError> {
        match self.fetch_metadata(id)? {
            None => Ok(None),
            Some(metadata) => match metadata.descriptor_hash() {
                Some(hash) => Ok(Some(hash.clone())),
                None => metadata
                    .compute_descriptor_hash()
                    .map(Some)
                    .map_err(|e| RepositoryError::Other(e.into())),
            },
        }
    }

    fn attributes(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<AttributeContainer, RepositoryError> {
        Ok(self
            .fetch_metadata(id)?
            .map(|metadata| metadata.attributes.clone())
            .unwrap_or_default())
    }
}

/// The ordered repositories consulted for every dependency. Fixed once built: the order is a
/// tie-break between identical versions.
#[derive(Clone)]
pub struct RepositoryChain {
    repositories: Vec<Arc<dyn ModuleComponentRepository>>,
    fingerprint: String,
}

impl RepositoryChain {
    pub fn new(repositories: Vec<Arc<dyn ModuleComponentRepository>>) -> Self {
        let mut hasher = Sha256::new();
        for repository in &repositories {
            hasher.update(repository.id().as_bytes());
            hasher.update([0u8]);
        }
        let fingerprint = hex::encode(hasher.finalize());
        RepositoryChain {
            repositories,
            fingerprint,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ModuleComponentRepository>> {
        self.repositories.iter()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    /// Identifies the ordered set of repository ids.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

impl Display for RepositoryChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, repository) in self.repositories.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(repository.name())?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    fn chain(ids: &[&str]) -> RepositoryChain {
        RepositoryChain::new(
            ids.iter()
                .map(|id| {
                    Arc::new(InMemoryRepository::new(*id)) as Arc<dyn ModuleComponentRepository>
                })
                .collect(),
        )
    }

    #[test]
    fn fingerprint_depends_on_order() {
        assert_eq!(
            chain(&["a", "b"]).fingerprint(),
            chain(&["a", "b"]).fingerprint()
        );
        assert_ne!(
            chain(&["a", "b"]).fingerprint(),
            chain(&["b", "a"]).fingerprint()
        );
        assert_ne!(
            chain(&["ab"]).fingerprint(),
            chain(&["a", "b"]).fingerprint()
        );
    }

    #[test]
    fn display_lists_names() {
        assert_eq!(chain(&["central", "local"]).to_string(), "[central, local]");
    }
}
