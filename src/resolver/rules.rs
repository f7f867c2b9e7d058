use std::{fmt::Debug, sync::Arc};

use crate::model::{ComponentResolveMetadata, ModuleComponentIdentifier};

pub type VersionPredicate = Arc<dyn Fn(&ModuleComponentIdentifier) -> bool + Send + Sync>;
pub type MetadataPredicate = Arc<dyn Fn(&ComponentResolveMetadata) -> bool + Send + Sync>;

/// Excludes candidates that would otherwise be selected.
#[derive(Clone)]
pub enum RejectionRule {
    /// Decided from the identifier alone.
    ByVersion {
        predicate: VersionPredicate,
        reason: Option<String>,
    },
    /// Needs the full metadata of the candidate.
    ByMetadata {
        predicate: MetadataPredicate,
        reason: Option<String>,
    },
}

#[derive(Clone, Default)]
pub struct ComponentSelectionRules {
    rules: Vec<RejectionRule>,
}

impl ComponentSelectionRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_version(
        mut self,
        reason: Option<&str>,
        predicate: impl Fn(&ModuleComponentIdentifier) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(RejectionRule::ByVersion {
            predicate: Arc::new(predicate),
            reason: reason.map(str::to_string),
        });
        self
    }

    pub fn reject_metadata(
        mut self,
        reason: Option<&str>,
        predicate: impl Fn(&ComponentResolveMetadata) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.rules.push(RejectionRule::ByMetadata {
            predicate: Arc::new(predicate),
            reason: reason.map(str::to_string),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn requires_metadata(&self) -> bool {
        self.rules
            .iter()
            .any(|rule| matches!(rule, RejectionRule::ByMetadata { .. }))
    }

    /// First identifier rule rejecting `id`, with its reason.
    pub fn rejected_by_version(&self, id: &ModuleComponentIdentifier) -> Option<Option<String>> {
        self.rules.iter().find_map(|rule| match rule {
            RejectionRule::ByVersion { predicate, reason } if predicate(id) => Some(reason.clone()),
            _ => None,
        })
    }

    pub fn rejected_by_metadata(
        &self,
        metadata: &ComponentResolveMetadata,
    ) -> Option<Option<String>> {
        self.rules.iter().find_map(|rule| match rule {
            RejectionRule::ByMetadata { predicate, reason } if predicate(metadata) => {
                Some(reason.clone())
            }
            _ => None,
        })
    }
}

impl Debug for ComponentSelectionRules {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentSelectionRules")
            .field("rules", &self.rules.len())
            .finish()
    }
}
