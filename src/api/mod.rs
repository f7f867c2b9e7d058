use std::{collections::BTreeSet, sync::Arc};

use log::info;

use crate::{
    cache::{CacheError, ModuleMetadataCache, ResolutionCacheStatistics},
    model::{
        AttributeContainer, ModuleComponentSelector, ModuleIdentifier, ParseError,
        VersionSelector,
    },
    repository::{RepositoryChain, RepositoryError},
    resolver::{ComponentIdResolveResult, DependencyToComponentIdResolver},
};

mod builder;

pub use builder::{default_cache_directory, EngineError, ResolutionEngineBuilder};

/// Resolves dependency declarations against a fixed, cached repository chain.
///
/// One engine is meant to live for a build session. It is safe to share between threads.
pub struct ResolutionEngine {
    resolver: DependencyToComponentIdResolver,
    module_cache: Arc<dyn ModuleMetadataCache>,
}

impl ResolutionEngine {
    pub fn builder() -> ResolutionEngineBuilder {
        ResolutionEngineBuilder::default()
    }

    /// Resolves one dependency to a component identifier.
    pub fn resolve_component_id(
        &self,
        dependency: &ModuleComponentSelector,
        selector: &VersionSelector,
        reject_selector: Option<&VersionSelector>,
        consumer_attributes: &AttributeContainer,
    ) -> ComponentIdResolveResult {
        let mut result = ComponentIdResolveResult::new();
        self.resolver.resolve(
            dependency,
            selector,
            reject_selector,
            consumer_attributes,
            &mut result,
        );
        result
    }

    /// Parses `dependency`'s version and an optional reject notation, then resolves.
    pub fn resolve(
        &self,
        dependency: &ModuleComponentSelector,
        reject_notation: Option<&str>,
        consumer_attributes: &AttributeContainer,
    ) -> Result<ComponentIdResolveResult, ParseError> {
        let selector = VersionSelector::parse(&dependency.version)?;
        let reject_selector = reject_notation.map(VersionSelector::parse).transpose()?;
        Ok(self.resolve_component_id(
            dependency,
            &selector,
            reject_selector.as_ref(),
            consumer_attributes,
        ))
    }

    /// What every repository of the chain lists for `module`, in chain order.
    pub fn list_versions(
        &self,
        module: &ModuleIdentifier,
    ) -> Vec<(String, Result<Option<BTreeSet<String>>, RepositoryError>)> {
        self.repositories()
            .iter()
            .map(|repository| {
                (
                    repository.name().to_string(),
                    repository.list_versions(module),
                )
            })
            .collect()
    }

    pub fn repositories(&self) -> &RepositoryChain {
        self.resolver.repositories()
    }

    pub fn cache_statistics(&self) -> ResolutionCacheStatistics {
        self.resolver.statistics()
    }

    /// Forgets every memoized resolution and cached repository answer.
    pub fn clear_cache(&self) -> Result<(), CacheError> {
        info!("Clearing resolution caches");
        self.resolver.clear();
        self.module_cache.clear()
    }
}
