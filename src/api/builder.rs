use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration};

use home::home_dir;
use log::debug;
use thiserror::Error;

use crate::{
    cache::{
        CacheError, CachePolicy, CachingModuleComponentRepository, InMemoryModuleCache,
        ModuleMetadataCache, PersistentModuleCache, ResolutionCache, SystemTimeProvider,
        TimeProvider, DEFAULT_ENTRY_TTL, DEFAULT_MAX_ENTRIES,
    },
    repository::{ModuleComponentRepository, RepositoryChain},
    resolver::{
        ComponentSelectionRules, DependencyToComponentIdResolver, DynamicVersionResolver,
        SearchPolicy, VersionedComponentChooser,
    },
    ResolutionEngine,
};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("At least one repository must be registered")]
    NoRepositories,
    #[error("Repository {id} is registered more than once")]
    DuplicateRepository { id: String },
    #[error("Module cache error: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Default)]
pub struct ResolutionEngineBuilder {
    repositories: Vec<(usize, Arc<dyn ModuleComponentRepository>)>,
    cache_directory: Option<PathBuf>,
    cache_policy: Option<CachePolicy>,
    memory_cache_entries: Option<usize>,
    memory_cache_ttl: Option<Duration>,
    search_policy: SearchPolicy,
    rules: ComponentSelectionRules,
    time_provider: Option<Arc<dyn TimeProvider>>,
}

impl ResolutionEngineBuilder {
    /// Appends a repository to the chain.
    pub fn repository(self, repository: Arc<dyn ModuleComponentRepository>) -> Self {
        let order = self
            .repositories
            .iter()
            .map(|(order, _)| order + 1)
            .max()
            .unwrap_or_default();
        self.register_repository(repository, order)
    }

    /// Places a repository in the chain by `order`, lowest first. Repositories registered with
    /// the same order keep their registration order.
    pub fn register_repository(
        mut self,
        repository: Arc<dyn ModuleComponentRepository>,
        order: usize,
    ) -> Self {
        self.repositories.push((order, repository));
        self
    }

    /// Directory of the persistent module cache.
    ///
    /// Without one, repository answers are only cached in memory.
    pub fn cache_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_directory = Some(path.into());
        self
    }

    /// Defaults to [`CachePolicy::default`].
    pub fn cache_policy(mut self, policy: CachePolicy) -> Self {
        self.cache_policy = Some(policy);
        self
    }

    /// Bounds of the in-memory resolution cache.
    ///
    /// Defaults to 100 entries kept for 10 seconds.
    pub fn memory_cache(mut self, max_entries: usize, ttl: Duration) -> Self {
        self.memory_cache_entries = Some(max_entries);
        self.memory_cache_ttl = Some(ttl);
        self
    }

    pub fn search_policy(mut self, policy: SearchPolicy) -> Self {
        self.search_policy = policy;
        self
    }

    pub fn rules(mut self, rules: ComponentSelectionRules) -> Self {
        self.rules = rules;
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = Some(time_provider);
        self
    }

    pub fn try_build(self) -> Result<ResolutionEngine, EngineError> {
        let Self {
            mut repositories,
            cache_directory,
            cache_policy,
            memory_cache_entries,
            memory_cache_ttl,
            search_policy,
            rules,
            time_provider,
        } = self;

        if repositories.is_empty() {
            return Err(EngineError::NoRepositories);
        }
        let mut ids = HashSet::new();
        for (_, repository) in &repositories {
            if !ids.insert(repository.id().to_string()) {
                return Err(EngineError::DuplicateRepository {
                    id: repository.id().to_string(),
                });
            }
        }
        repositories.sort_by_key(|(order, _)| *order);

        let clock = time_provider.unwrap_or_else(|| Arc::new(SystemTimeProvider));
        let policy = cache_policy.unwrap_or_default();
        let module_cache: Arc<dyn ModuleMetadataCache> = match cache_directory {
            Some(location) => {
                debug!("Using module cache at {}", location.display());
                Arc::new(PersistentModuleCache::new(location)?)
            }
            None => Arc::new(InMemoryModuleCache::new()),
        };

        let chain = RepositoryChain::new(
            repositories
                .into_iter()
                .map(|(_, repository)| {
                    Arc::new(CachingModuleComponentRepository::new(
                        repository,
                        module_cache.clone(),
                        policy,
                        clock.clone(),
                    )) as Arc<dyn ModuleComponentRepository>
                })
                .collect(),
        );
        debug!("Repository chain: {}", chain);

        let dynamic = DynamicVersionResolver::new(
            chain,
            VersionedComponentChooser::new(rules),
            search_policy,
        );
        let resolution_cache = ResolutionCache::new(
            memory_cache_entries.unwrap_or(DEFAULT_MAX_ENTRIES),
            memory_cache_ttl.unwrap_or(DEFAULT_ENTRY_TTL),
            clock,
        );

        Ok(ResolutionEngine {
            resolver: DependencyToComponentIdResolver::new(dynamic, resolution_cache),
            module_cache,
        })
    }
}

/// `$HOME/.modresolve/cache`, if the home directory is known.
pub fn default_cache_directory() -> Option<PathBuf> {
    home_dir().map(|mut cache_directory| {
        cache_directory.push(".modresolve/cache");
        cache_directory
    })
}
