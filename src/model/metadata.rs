use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{
    AttributeContainer, ModuleComponentIdentifier, ModuleComponentSelector, ModuleVersionIdentifier,
};

pub const DEFAULT_STATUS_SCHEME: [&str; 3] = ["integration", "milestone", "release"];

/// SHA-256 of a module descriptor, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DescriptorHash(String);

impl DescriptorHash {
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        DescriptorHash(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DescriptorHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provenance attached to resolved metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModuleSource {
    /// Content hash of the descriptor the metadata was read from.
    DescriptorHash { hash: DescriptorHash, changing: bool },
    /// The repository of the chain that provided the metadata. Never persisted.
    Repository { repository: String },
}

/// A module version as seen from one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentResolveMetadata {
    #[serde(flatten)]
    pub id: ModuleComponentIdentifier,
    pub status: String,
    #[serde(default = "default_status_scheme")]
    pub status_scheme: Vec<String>,
    #[serde(default)]
    pub changing: bool,
    #[serde(default, skip_serializing_if = "AttributeContainer::is_empty")]
    pub attributes: AttributeContainer,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<ModuleComponentSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<ModuleSource>,
}

fn default_status_scheme() -> Vec<String> {
    DEFAULT_STATUS_SCHEME.iter().map(|s| s.to_string()).collect()
}

impl ComponentResolveMetadata {
    pub fn new(id: ModuleComponentIdentifier, status: impl Into<String>) -> Self {
        ComponentResolveMetadata {
            id,
            status: status.into(),
            status_scheme: default_status_scheme(),
            changing: false,
            attributes: AttributeContainer::default(),
            dependencies: Vec::new(),
            sources: Vec::new(),
        }
    }

    pub fn with_changing(mut self, changing: bool) -> Self {
        self.changing = changing;
        for source in &mut self.sources {
            if let ModuleSource::DescriptorHash { changing: flag, .. } = source {
                *flag = changing;
            }
        }
        self
    }

    pub fn with_attributes(mut self, attributes: AttributeContainer) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_dependency(mut self, dependency: ModuleComponentSelector) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_status_scheme(mut self, scheme: Vec<String>) -> Self {
        self.status_scheme = scheme;
        self
    }

    /// Replaces any source of the same kind.
    pub fn with_source(mut self, source: ModuleSource) -> Self {
        self.sources
            .retain(|existing| std::mem::discriminant(existing) != std::mem::discriminant(&source));
        self.sources.push(source);
        self
    }

    pub fn without_repository_source(mut self) -> Self {
        self.sources
            .retain(|source| !matches!(source, ModuleSource::Repository { .. }));
        self
    }

    pub fn module_version_id(&self) -> ModuleVersionIdentifier {
        self.id.module_version_id()
    }

    pub fn descriptor_hash(&self) -> Option<&DescriptorHash> {
        self.sources.iter().find_map(|source| match source {
            ModuleSource::DescriptorHash { hash, .. } => Some(hash),
            ModuleSource::Repository { .. } => None,
        })
    }

    /// True if either the metadata or its descriptor-hash source is flagged as changing.
    pub fn is_changing(&self) -> bool {
        self.changing
            || self.sources.iter().any(|source| {
                matches!(source, ModuleSource::DescriptorHash { changing: true, .. })
            })
    }

    pub fn repository(&self) -> Option<&str> {
        self.sources.iter().find_map(|source| match source {
            ModuleSource::Repository { repository } => Some(repository.as_str()),
            ModuleSource::DescriptorHash { .. } => None,
        })
    }

    /// Position of `status` in this component's status scheme.
    pub fn status_rank(&self, status: &str) -> Option<usize> {
        self.status_scheme.iter().position(|s| s == status)
    }

    /// Hash of the descriptor content, ignoring provenance.
    pub fn compute_descriptor_hash(&self) -> Result<DescriptorHash, toml::ser::Error> {
        let content = ComponentResolveMetadata {
            sources: Vec::new(),
            ..self.clone()
        };
        Ok(DescriptorHash::of_bytes(
            toml::to_string(&content)?.as_bytes(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModuleIdentifier;

    use pretty_assertions::assert_eq;

    fn metadata(version: &str) -> ComponentResolveMetadata {
        ComponentResolveMetadata::new(
            ModuleComponentIdentifier::new(ModuleIdentifier::new("org", "lib"), version),
            "release",
        )
    }

    #[test]
    fn hash_of_bytes() {
        assert_eq!(
            DescriptorHash::of_bytes(b"hello world").as_str(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn descriptor_hash_ignores_sources() {
        let plain = metadata("1.0");
        let with_source = plain.clone().with_source(ModuleSource::Repository {
            repository: "central".to_string(),
        });
        assert_eq!(
            plain.compute_descriptor_hash().unwrap(),
            with_source.compute_descriptor_hash().unwrap()
        );
        assert_ne!(
            plain.compute_descriptor_hash().unwrap(),
            metadata("1.1").compute_descriptor_hash().unwrap()
        );
    }

    #[test]
    fn with_source_replaces_same_kind() {
        let m = metadata("1.0")
            .with_source(ModuleSource::Repository {
                repository: "a".to_string(),
            })
            .with_source(ModuleSource::Repository {
                repository: "b".to_string(),
            });
        assert_eq!(m.repository(), Some("b"));
        assert_eq!(m.sources.len(), 1);
        assert_eq!(m.without_repository_source().repository(), None);
    }

    #[test]
    fn changing_flag_is_carried_by_descriptor_source() {
        let hash = DescriptorHash::of_bytes(b"descriptor");
        let m = metadata("1.0-SNAPSHOT").with_source(ModuleSource::DescriptorHash {
            hash: hash.clone(),
            changing: true,
        });
        assert!(m.is_changing());
        assert_eq!(m.descriptor_hash(), Some(&hash));

        let m = m.with_changing(false);
        assert!(!m.is_changing());
    }

    #[test]
    fn status_rank_follows_scheme() {
        let m = metadata("1.0");
        assert_eq!(m.status_rank("integration"), Some(0));
        assert_eq!(m.status_rank("release"), Some(2));
        assert_eq!(m.status_rank("unknown"), None);
    }
}
