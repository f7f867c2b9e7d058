use log::trace;

use crate::{
    cache::{ResolutionCache, ResolutionCacheStatistics},
    model::{
        AttributeContainer, ComponentSelectionReason, ModuleComponentIdentifier,
        ModuleComponentSelector, ModuleIdentifier, VersionSelector,
    },
    repository::RepositoryChain,
};

use super::{
    ComponentIdResolveResult, DynamicVersionResolver, RejectedComponentId, Rejection,
    ResolvedComponentId,
};

/// Identity of a dynamic resolution: the same key always asks the same question of the same
/// repositories.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    pub module: ModuleIdentifier,
    pub selector: String,
    pub reject_selector: Option<String>,
    pub attributes: AttributeContainer,
    pub repositories: String,
}

/// Entry point turning a dependency declaration into a component identifier.
pub struct DependencyToComponentIdResolver {
    dynamic: DynamicVersionResolver,
    cache: ResolutionCache<ResolutionKey, ComponentIdResolveResult>,
}

impl DependencyToComponentIdResolver {
    pub fn new(
        dynamic: DynamicVersionResolver,
        cache: ResolutionCache<ResolutionKey, ComponentIdResolveResult>,
    ) -> Self {
        DependencyToComponentIdResolver { dynamic, cache }
    }

    /// Records exactly one outcome in `result`.
    ///
    /// Static selectors never reach a repository. Dynamic selectors are resolved through the
    /// repository chain, and results are shared between identical requests for a short while.
    pub fn resolve(
        &self,
        dependency: &ModuleComponentSelector,
        selector: &VersionSelector,
        reject_selector: Option<&VersionSelector>,
        consumer_attributes: &AttributeContainer,
        result: &mut ComponentIdResolveResult,
    ) {
        if let VersionSelector::Exact { version } = selector {
            let id = ModuleComponentIdentifier::new(dependency.module.clone(), version.as_str());
            let module_version_id = id.module_version_id();
            match reject_selector {
                Some(reject_selector) if reject_selector.accept(version) => {
                    trace!("{} rejected by selector {}", id, reject_selector);
                    result.rejected(RejectedComponentId {
                        id,
                        module_version_id,
                        rejection: Rejection::BySelector {
                            selector: reject_selector.clone(),
                        },
                    });
                }
                _ => result.resolved(ResolvedComponentId {
                    id,
                    module_version_id,
                    metadata: None,
                    repository: None,
                    reason: ComponentSelectionReason::requested(),
                }),
            }
            return;
        }

        let key = ResolutionKey {
            module: dependency.module.clone(),
            selector: selector.to_string(),
            reject_selector: reject_selector.map(ToString::to_string),
            attributes: consumer_attributes.clone(),
            repositories: self.dynamic.repositories().fingerprint().to_string(),
        };
        let resolved = self.cache.get_or_compute(
            &key,
            || {
                let mut fresh = ComponentIdResolveResult::new();
                self.dynamic.resolve(
                    dependency,
                    selector,
                    reject_selector,
                    consumer_attributes,
                    &mut fresh,
                );
                fresh
            },
            ComponentIdResolveResult::is_cacheable,
        );
        result.absorb(resolved);
    }

    pub fn repositories(&self) -> &RepositoryChain {
        self.dynamic.repositories()
    }

    pub fn statistics(&self) -> ResolutionCacheStatistics {
        self.cache.statistics()
    }

    pub fn clear(&self) {
        self.cache.clear();
    }
}
