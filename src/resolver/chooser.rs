use std::sync::Arc;

use log::trace;

use crate::{
    model::{AttributeContainer, ComponentResolveMetadata, Version, VersionSelector},
    repository::RepositoryError,
};

use super::{
    provider::ComponentMetadataProvider, ComponentSelectionRules, RejectedByRuleVersion,
    RejectedVersion, Rejection,
};

/// What one repository offered for a selector.
#[derive(Debug, Clone, Default)]
pub enum SelectionOutcome {
    Matched(Arc<ComponentResolveMetadata>),
    #[default]
    NoMatch,
    Failed(Arc<RepositoryError>),
}

/// Receives the verdict on every candidate of one repository.
#[derive(Debug, Default)]
pub struct CandidateSelection {
    pub outcome: SelectionOutcome,
    pub unmatched: Vec<String>,
    pub rejected: Vec<RejectedVersion>,
    /// The newest candidate that matched but was excluded by the reject selector or a rule.
    pub first_rejected: Option<RejectedVersion>,
}

impl CandidateSelection {
    fn not_matched(&mut self, version: &str) {
        self.unmatched.push(version.to_string());
    }

    fn reject(&mut self, rejected: RejectedVersion) {
        let by_attributes = matches!(rejected.rejection, Rejection::ByAttributes { .. });
        if self.first_rejected.is_none() && !by_attributes {
            self.first_rejected = Some(rejected.clone());
        }
        self.rejected.push(rejected);
    }
}

/// Orders candidates by version and applies selectors, consumer attributes and selection rules.
#[derive(Debug, Clone, Default)]
pub struct VersionedComponentChooser {
    rules: ComponentSelectionRules,
}

impl VersionedComponentChooser {
    pub fn new(rules: ComponentSelectionRules) -> Self {
        VersionedComponentChooser { rules }
    }

    /// The newer of two candidates. On equal versions `a` wins, so callers pass the candidate
    /// from the earlier repository first.
    pub fn select_newest_component<'a>(
        &self,
        a: Option<&'a ComponentResolveMetadata>,
        b: Option<&'a ComponentResolveMetadata>,
    ) -> Option<&'a ComponentResolveMetadata> {
        match (a, b) {
            (None, b) => b,
            (a, None) => a,
            (Some(a), Some(b)) => {
                if Version::parse(b.id.version.as_str()) > Version::parse(a.id.version.as_str()) {
                    Some(b)
                } else {
                    Some(a)
                }
            }
        }
    }

    /// Walks the candidates from newest to oldest and records the first acceptable one in
    /// `selection`. Metadata is only fetched for candidates that need it.
    pub fn select_newest_matching_component(
        &self,
        mut candidates: Vec<ComponentMetadataProvider<'_>>,
        selector: &VersionSelector,
        reject_selector: Option<&VersionSelector>,
        consumer_attributes: &AttributeContainer,
        selection: &mut CandidateSelection,
    ) {
        candidates.sort_by_cached_key(|candidate| {
            std::cmp::Reverse(Version::parse(candidate.id().version.as_str()))
        });

        for candidate in &candidates {
            let version = candidate.id().version.as_str();

            let matches = if selector.requires_metadata() {
                match candidate.metadata() {
                    Ok(Some(metadata)) => selector.accept_metadata(&metadata),
                    Ok(None) => false,
                    Err(error) => {
                        selection.outcome = SelectionOutcome::Failed(error);
                        return;
                    }
                }
            } else {
                selector.accept(version)
            };
            if !matches {
                selection.not_matched(version);
                continue;
            }

            if let Some(reject_selector) = reject_selector {
                if reject_selector.accept(version) {
                    trace!(
                        "{} rejected by selector {}",
                        candidate.id(),
                        reject_selector
                    );
                    selection.reject(RejectedVersion {
                        id: candidate.id().clone(),
                        rejection: Rejection::BySelector {
                            selector: reject_selector.clone(),
                        },
                    });
                    continue;
                }
            }

            if !consumer_attributes.is_empty() {
                let mismatches = match candidate.attributes() {
                    Ok(attributes) => attributes.mismatches(consumer_attributes),
                    Err(error) => {
                        selection.outcome = SelectionOutcome::Failed(error);
                        return;
                    }
                };
                if !mismatches.is_empty() {
                    selection.reject(RejectedVersion {
                        id: candidate.id().clone(),
                        rejection: Rejection::ByAttributes { mismatches },
                    });
                    continue;
                }
            }

            match self.is_rejected_component(candidate) {
                Ok(Some(rejected)) => {
                    selection.reject(rejected.into());
                    continue;
                }
                Ok(None) => {}
                Err(error) => {
                    selection.outcome = SelectionOutcome::Failed(error);
                    return;
                }
            }

            match candidate.metadata() {
                Ok(Some(metadata)) => {
                    selection.outcome = SelectionOutcome::Matched(metadata);
                    return;
                }
                Ok(None) => {
                    trace!("{} is listed but has no descriptor", candidate.id());
                    selection.not_matched(version);
                }
                Err(error) => {
                    selection.outcome = SelectionOutcome::Failed(error);
                    return;
                }
            }
        }
        selection.outcome = SelectionOutcome::NoMatch;
    }

    /// Applies the selection rules in two phases: identifier rules first, then, only if a
    /// metadata rule exists, the rules that need the fetched metadata.
    pub fn is_rejected_component(
        &self,
        candidate: &ComponentMetadataProvider<'_>,
    ) -> Result<Option<RejectedByRuleVersion>, Arc<RepositoryError>> {
        if let Some(reason) = self.rules.rejected_by_version(candidate.id()) {
            return Ok(Some(RejectedByRuleVersion {
                id: candidate.id().clone(),
                reason,
            }));
        }
        if !self.rules.requires_metadata() {
            return Ok(None);
        }
        let Some(metadata) = candidate.metadata()? else {
            return Ok(None);
        };
        Ok(self
            .rules
            .rejected_by_metadata(&metadata)
            .map(|reason| RejectedByRuleVersion {
                id: candidate.id().clone(),
                reason,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        model::{ModuleComponentIdentifier, ModuleIdentifier},
        repository::InMemoryRepository,
    };

    use pretty_assertions::assert_eq;

    fn module() -> ModuleIdentifier {
        ModuleIdentifier::new("org", "lib")
    }

    fn component(version: &str) -> ComponentResolveMetadata {
        ComponentResolveMetadata::new(ModuleComponentIdentifier::new(module(), version), "release")
    }

    fn candidates<'a>(
        repository: &'a InMemoryRepository,
        versions: &[&str],
    ) -> Vec<ComponentMetadataProvider<'a>> {
        versions
            .iter()
            .map(|version| {
                ComponentMetadataProvider::new(
                    repository,
                    ModuleComponentIdentifier::new(module(), *version),
                )
            })
            .collect()
    }

    fn matched_version(selection: &CandidateSelection) -> Option<String> {
        match &selection.outcome {
            SelectionOutcome::Matched(metadata) => Some(metadata.id.version.clone()),
            _ => None,
        }
    }

    fn choose(
        chooser: &VersionedComponentChooser,
        repository: &InMemoryRepository,
        versions: &[&str],
        selector: &str,
        reject: Option<&str>,
    ) -> CandidateSelection {
        let reject = reject.map(|r| VersionSelector::parse(r).unwrap());
        let mut selection = CandidateSelection::default();
        chooser.select_newest_matching_component(
            candidates(repository, versions),
            &VersionSelector::parse(selector).unwrap(),
            reject.as_ref(),
            &AttributeContainer::new(),
            &mut selection,
        );
        selection
    }

    #[test]
    fn newest_component_prefers_first_on_tie() {
        let chooser = VersionedComponentChooser::default();
        let a = component("2.0");
        let b = component("2.0").with_attributes(AttributeContainer::new().with("from", "b"));
        let newer = component("2.1");

        assert!(std::ptr::eq(
            chooser.select_newest_component(Some(&a), Some(&b)).unwrap(),
            &a
        ));
        assert!(std::ptr::eq(
            chooser.select_newest_component(Some(&a), Some(&newer)).unwrap(),
            &newer
        ));
        assert!(std::ptr::eq(
            chooser.select_newest_component(None, Some(&b)).unwrap(),
            &b
        ));
        assert_eq!(chooser.select_newest_component(None, None), None);
    }

    #[test]
    fn selects_newest_matching_version() {
        let repository = InMemoryRepository::new("repo")
            .with_versions(&module(), &["1.0", "1.10", "1.9", "2.0"]);
        let selection = choose(
            &VersionedComponentChooser::default(),
            &repository,
            &["1.0", "1.10", "1.9", "2.0"],
            "1.+",
            None,
        );
        assert_eq!(matched_version(&selection), Some("1.10".to_string()));
        assert_eq!(selection.unmatched, vec!["2.0".to_string()]);
        // Only the selected candidate is fetched.
        assert_eq!(repository.fetch_metadata_calls(), 1);
    }

    #[test]
    fn reject_selector_skips_to_next_candidate() {
        let repository =
            InMemoryRepository::new("repo").with_versions(&module(), &["1.0", "1.1", "1.2"]);
        let selection = choose(
            &VersionedComponentChooser::default(),
            &repository,
            &["1.0", "1.1", "1.2"],
            "1.+",
            Some("1.2"),
        );
        assert_eq!(matched_version(&selection), Some("1.1".to_string()));
        assert_eq!(
            selection.first_rejected.map(|r| r.id.version),
            Some("1.2".to_string())
        );
    }

    #[test]
    fn rules_reject_without_fetching_when_version_decides() {
        let repository = InMemoryRepository::new("repo").with_versions(&module(), &["1.0", "1.1"]);
        let chooser = VersionedComponentChooser::new(
            ComponentSelectionRules::new().reject_version(Some("broken"), |id| id.version == "1.1"),
        );

        let provider = ComponentMetadataProvider::new(
            &repository,
            ModuleComponentIdentifier::new(module(), "1.1"),
        );
        let rejected = chooser.is_rejected_component(&provider).unwrap().unwrap();
        assert_eq!(rejected.reason, Some("broken".to_string()));
        assert!(!provider.is_metadata_fetched());
        assert_eq!(repository.fetch_metadata_calls(), 0);
    }

    #[test]
    fn metadata_rules_fetch_lazily() {
        let repository = InMemoryRepository::new("repo")
            .with_component(ComponentResolveMetadata::new(
                ModuleComponentIdentifier::new(module(), "1.1"),
                "integration",
            ))
            .with_versions(&module(), &["1.0"]);
        let chooser = VersionedComponentChooser::new(
            ComponentSelectionRules::new()
                .reject_metadata(Some("not a release"), |m| m.status != "release"),
        );

        let selection = choose(&chooser, &repository, &["1.0", "1.1"], "1.+", None);
        assert_eq!(matched_version(&selection), Some("1.0".to_string()));
        assert_eq!(selection.rejected.len(), 1);
        assert_eq!(
            selection.rejected[0].rejection,
            Rejection::ByRule {
                reason: Some("not a release".to_string())
            }
        );
        // Each candidate's metadata is fetched once, even though 1.0 is read twice.
        assert_eq!(repository.fetch_metadata_calls(), 2);
    }

    #[test]
    fn consumer_attributes_discriminate_variants() {
        let repository = InMemoryRepository::new("repo")
            .with_component(
                component("1.1")
                    .with_attributes(AttributeContainer::new().with("platform", "windows")),
            )
            .with_component(
                component("1.0")
                    .with_attributes(AttributeContainer::new().with("platform", "linux")),
            );
        let mut selection = CandidateSelection::default();
        VersionedComponentChooser::default().select_newest_matching_component(
            candidates(&repository, &["1.0", "1.1"]),
            &VersionSelector::parse("1.+").unwrap(),
            None,
            &AttributeContainer::new().with("platform", "linux"),
            &mut selection,
        );
        assert_eq!(matched_version(&selection), Some("1.0".to_string()));
        assert!(matches!(
            selection.rejected[0].rejection,
            Rejection::ByAttributes { .. }
        ));
        assert!(selection.first_rejected.is_none());
    }

    #[test]
    fn latest_selector_reads_status() {
        let repository = InMemoryRepository::new("repo")
            .with_component(ComponentResolveMetadata::new(
                ModuleComponentIdentifier::new(module(), "2.0"),
                "integration",
            ))
            .with_versions(&module(), &["1.5"]);
        let selection = choose(
            &VersionedComponentChooser::default(),
            &repository,
            &["1.5", "2.0"],
            "latest.release",
            None,
        );
        assert_eq!(matched_version(&selection), Some("1.5".to_string()));
        assert_eq!(selection.unmatched, vec!["2.0".to_string()]);
    }

    #[test]
    fn repository_failure_stops_the_selection() {
        let repository = InMemoryRepository::new("repo").with_versions(&module(), &["1.0"]);
        repository.fail_metadata_with(|| RepositoryError::Status {
            status: 500,
            location: "repo".to_string(),
        });
        let selection = choose(
            &VersionedComponentChooser::default(),
            &repository,
            &["1.0"],
            "1.+",
            None,
        );
        assert!(matches!(selection.outcome, SelectionOutcome::Failed(_)));
    }
}
