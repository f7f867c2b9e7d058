use std::sync::Arc;

use log::{debug, warn};

use crate::{
    model::{
        AttributeContainer, ComponentResolveMetadata, ComponentSelectionCause,
        ComponentSelectionDescriptor, ComponentSelectionReason, ModuleComponentIdentifier,
        ModuleComponentSelector, ModuleSource, VersionSelector,
    },
    repository::{ModuleComponentRepository, RepositoryChain},
};

use super::{
    chooser::{CandidateSelection, SelectionOutcome, VersionedComponentChooser},
    provider::ComponentMetadataProvider,
    ComponentIdResolveResult, ModuleVersionNotFound, RejectedComponentId, Rejection,
    RepositoryFailure, ResolveError, ResolvedComponentId,
};

/// How far the chain is searched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPolicy {
    /// Every repository is consulted and the newest candidate overall wins.
    #[default]
    All,
    /// The first repository offering an acceptable candidate wins.
    FirstMatch,
}

struct ChainCandidate<'a> {
    repository: &'a Arc<dyn ModuleComponentRepository>,
    metadata: Arc<ComponentResolveMetadata>,
}

/// Resolves dynamic selectors by walking the repository chain in order.
pub struct DynamicVersionResolver {
    repositories: RepositoryChain,
    chooser: VersionedComponentChooser,
    search_policy: SearchPolicy,
}

impl DynamicVersionResolver {
    pub fn new(
        repositories: RepositoryChain,
        chooser: VersionedComponentChooser,
        search_policy: SearchPolicy,
    ) -> Self {
        DynamicVersionResolver {
            repositories,
            chooser,
            search_policy,
        }
    }

    pub fn repositories(&self) -> &RepositoryChain {
        &self.repositories
    }

    pub fn resolve(
        &self,
        requested: &ModuleComponentSelector,
        selector: &VersionSelector,
        reject_selector: Option<&VersionSelector>,
        consumer_attributes: &AttributeContainer,
        result: &mut ComponentIdResolveResult,
    ) {
        debug!(
            "Attempting to resolve version for {} using repositories {}",
            requested, self.repositories
        );
        if self.repositories.is_empty() {
            result.failed(ResolveError::NoRepositories);
            return;
        }

        let mut failures: Vec<RepositoryFailure> = Vec::new();
        let mut offered: Vec<ChainCandidate<'_>> = Vec::new();
        let mut best: Option<usize> = None;
        let mut first_rejected = None;

        for repository in self.repositories.iter() {
            result.attempted(repository.name());

            let versions = match repository.list_versions(&requested.module) {
                Ok(Some(versions)) => versions,
                Ok(None) => {
                    debug!("{} is not known to {}", requested.module, repository.name());
                    continue;
                }
                Err(error) => {
                    let failure = RepositoryFailure {
                        repository: repository.name().to_string(),
                        error: Arc::new(error),
                    };
                    if self.is_fatal(requested, failure, &mut failures, result) {
                        return;
                    }
                    continue;
                }
            };

            let candidates = versions
                .into_iter()
                .map(|version| {
                    ComponentMetadataProvider::new(
                        repository.as_ref(),
                        ModuleComponentIdentifier::new(requested.module.clone(), version),
                    )
                })
                .collect();
            let mut selection = CandidateSelection::default();
            self.chooser.select_newest_matching_component(
                candidates,
                selector,
                reject_selector,
                consumer_attributes,
                &mut selection,
            );
            result.unmatched(selection.unmatched);
            result.rejections(selection.rejected);
            if first_rejected.is_none() {
                first_rejected = selection.first_rejected;
            }

            match selection.outcome {
                SelectionOutcome::Matched(metadata) => {
                    debug!("Found {} in {}", metadata.id, repository.name());
                    offered.push(ChainCandidate {
                        repository,
                        metadata,
                    });
                    let candidate = offered.len() - 1;
                    best = Some(match best {
                        Some(current) => self.choose_best(&offered, current, candidate),
                        None => candidate,
                    });
                    if self.search_policy == SearchPolicy::FirstMatch {
                        break;
                    }
                }
                SelectionOutcome::NoMatch => {}
                SelectionOutcome::Failed(error) => {
                    let failure = RepositoryFailure {
                        repository: repository.name().to_string(),
                        error,
                    };
                    if self.is_fatal(requested, failure, &mut failures, result) {
                        return;
                    }
                }
            }
        }

        if let Some(best) = best {
            for failure in &failures {
                debug!("Discarding resolve failure: {}", failure);
            }
            self.found(result, &offered, best);
            return;
        }

        if !failures.is_empty() {
            result.failed(ResolveError::Repositories {
                selector: requested.clone(),
                failures,
            });
            return;
        }

        if let Some(rejected) = first_rejected {
            debug!("Every match for {} was rejected", requested);
            result.rejected(RejectedComponentId {
                module_version_id: rejected.id.module_version_id(),
                id: rejected.id,
                rejection: rejected.rejection,
            });
            return;
        }

        let not_found = ModuleVersionNotFound {
            selector: requested.clone(),
            attempted: result.attempted_repositories().to_vec(),
            unmatched: result.unmatched_versions().to_vec(),
            rejected: result.rejected_versions().to_vec(),
        };
        result.failed(not_found.into());
    }

    /// Retryable failures only disqualify the repository. Anything else aborts the resolution.
    fn is_fatal(
        &self,
        requested: &ModuleComponentSelector,
        failure: RepositoryFailure,
        failures: &mut Vec<RepositoryFailure>,
        result: &mut ComponentIdResolveResult,
    ) -> bool {
        if failure.error.is_retryable() {
            warn!(
                "Repository {} failed while resolving {}: {}",
                failure.repository, requested, failure.error
            );
            failures.push(failure);
            false
        } else {
            result.failed(ResolveError::Fatal {
                selector: requested.clone(),
                repository: failure.repository,
                source: failure.error,
            });
            true
        }
    }

    fn choose_best(
        &self,
        offered: &[ChainCandidate<'_>],
        current: usize,
        candidate: usize,
    ) -> usize {
        let newest = self.chooser.select_newest_component(
            Some(offered[current].metadata.as_ref()),
            Some(offered[candidate].metadata.as_ref()),
        );
        match newest {
            Some(newest) if std::ptr::eq(newest, offered[candidate].metadata.as_ref()) => candidate,
            _ => current,
        }
    }

    fn found(
        &self,
        result: &mut ComponentIdResolveResult,
        offered: &[ChainCandidate<'_>],
        best: usize,
    ) {
        let chosen = &offered[best];
        debug!(
            "Using {} from {}",
            chosen.metadata.id,
            chosen.repository.name()
        );

        let mut reason = ComponentSelectionReason::requested();
        if offered.len() > 1 {
            let versions: Vec<&str> = offered
                .iter()
                .map(|candidate| candidate.metadata.id.version.as_str())
                .collect();
            reason.add_cause(
                ComponentSelectionDescriptor::new(ComponentSelectionCause::ConflictResolution)
                    .with_description(format!("between versions {}", versions.join(", "))),
            );
        }
        if let Some(rejected) = result
            .rejected_versions()
            .iter()
            .find(|rejected| !matches!(rejected.rejection, Rejection::ByAttributes { .. }))
        {
            reason.add_cause(
                ComponentSelectionDescriptor::new(ComponentSelectionCause::Rejection)
                    .with_description(rejected.to_string()),
            );
        }

        let metadata = Arc::new((*chosen.metadata).clone().with_source(ModuleSource::Repository {
            repository: chosen.repository.id().to_string(),
        }));
        result.resolved(ResolvedComponentId {
            id: metadata.id.clone(),
            module_version_id: metadata.module_version_id(),
            metadata: Some(metadata),
            repository: Some(chosen.repository.name().to_string()),
            reason,
        });
    }
}
