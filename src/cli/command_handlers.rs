use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{anyhow, bail, Context};
use log::{error, info, warn};
use tokio::sync::Semaphore;

use crate::{
    api::{default_cache_directory, ResolutionEngine},
    cache::{CachePolicy, ModuleMetadataCache, PersistentModuleCache},
    config::{ModresolveConfig, RepositoryConfig},
    model::{AttributeContainer, ModuleComponentSelector, ModuleIdentifier, VersionSelector},
    repository::FileSystemRepository,
    resolver::{ComponentIdResolveOutcome, ComponentIdResolveResult, SearchPolicy},
};

/// Command line overrides applied on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct EngineOptions {
    pub cache_directory: Option<PathBuf>,
    pub extra_repositories: Vec<RepositoryConfig>,
    pub first_match: bool,
    pub refresh: bool,
}

/// Parses `name=path`.
pub fn parse_repository(entry: &str) -> anyhow::Result<RepositoryConfig> {
    match entry.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok(RepositoryConfig {
            name: name.to_string(),
            path: PathBuf::from(path),
        }),
        _ => bail!("Invalid repository `{entry}`, expected `name=path`"),
    }
}

pub fn cache_directory(config: &ModresolveConfig, options_dir: Option<&Path>) -> Option<PathBuf> {
    options_dir
        .map(Path::to_path_buf)
        .or_else(|| config.cache_dir.clone())
        .or_else(default_cache_directory)
}

pub fn build_engine(
    config: &ModresolveConfig,
    options: EngineOptions,
) -> anyhow::Result<ResolutionEngine> {
    let mut builder = ResolutionEngine::builder()
        .cache_policy(if options.refresh {
            CachePolicy::refresh()
        } else {
            config.cache_policy
        })
        .memory_cache(config.memory_entries, config.memory_ttl)
        .search_policy(if options.first_match {
            SearchPolicy::FirstMatch
        } else {
            config.search_policy
        });
    if let Some(location) = cache_directory(config, options.cache_directory.as_deref()) {
        builder = builder.cache_directory(location);
    }
    for repository in config.repositories.iter().chain(&options.extra_repositories) {
        builder = builder.repository(Arc::new(FileSystemRepository::new(
            repository.name.as_str(),
            repository.path.as_path(),
        )));
    }
    Ok(builder.try_build()?)
}

/// Handler to resolve command
///
/// Dependencies are independent of each other and resolved concurrently, at most `jobs` at a time.
pub fn do_resolve(
    engine: Arc<ResolutionEngine>,
    dependencies: &[String],
    reject: Option<&str>,
    attributes: &[String],
    jobs: usize,
) -> anyhow::Result<()> {
    let reject = reject.map(VersionSelector::parse).transpose()?;
    let attributes = attributes.iter().try_fold(
        AttributeContainer::new(),
        |container, entry| -> anyhow::Result<_> {
            let (key, value) = AttributeContainer::parse_entry(entry)?;
            Ok(container.with(key, value))
        },
    )?;
    let mut requests = Vec::with_capacity(dependencies.len());
    for notation in dependencies {
        let dependency = ModuleComponentSelector::from_notation(notation)?;
        let selector = VersionSelector::parse(&dependency.version)
            .with_context(|| format!("Invalid version selector in {notation}"))?;
        requests.push((dependency, selector));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
    let results = runtime.block_on(resolve_all(
        engine.clone(),
        requests,
        reject,
        attributes,
        jobs,
    ))?;

    let mut failed = 0;
    for (dependency, result) in &results {
        match describe(dependency, result) {
            Ok(line) => println!("{line}"),
            Err(message) => {
                failed += 1;
                error!("{message}");
            }
        }
    }

    let statistics = engine.cache_statistics();
    info!(
        "Resolution cache: {} hits, {} reads, {:?} average read time",
        statistics.hits, statistics.reads, statistics.average_read_time
    );

    if failed > 0 {
        Err(anyhow!(
            "{failed} of {} dependencies could not be resolved",
            results.len()
        ))
    } else {
        Ok(())
    }
}

async fn resolve_all(
    engine: Arc<ResolutionEngine>,
    requests: Vec<(ModuleComponentSelector, VersionSelector)>,
    reject: Option<VersionSelector>,
    attributes: AttributeContainer,
    jobs: usize,
) -> anyhow::Result<Vec<(ModuleComponentSelector, ComponentIdResolveResult)>> {
    let semaphore = Arc::new(Semaphore::new(jobs.max(1)));
    let reject = Arc::new(reject);
    let attributes = Arc::new(attributes);

    let mut handles = Vec::with_capacity(requests.len());
    for (dependency, selector) in requests {
        let permit = semaphore.clone().acquire_owned().await?;
        let engine = engine.clone();
        let reject = reject.clone();
        let attributes = attributes.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let result = engine.resolve_component_id(
                &dependency,
                &selector,
                Option::as_ref(&reject),
                &attributes,
            );
            (dependency, result)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await?);
    }
    Ok(results)
}

/// One line for a resolved dependency, or the error to report.
pub fn describe(
    dependency: &ModuleComponentSelector,
    result: &ComponentIdResolveResult,
) -> Result<String, String> {
    match result.outcome() {
        Some(ComponentIdResolveOutcome::Resolved(resolved)) => {
            let mut line = format!("{dependency} -> {}", resolved.id);
            if let Some(repository) = &resolved.repository {
                line.push_str(&format!(" from {repository}"));
            }
            line.push_str(&format!(" ({})", resolved.reason));
            Ok(line)
        }
        Some(ComponentIdResolveOutcome::Rejected(rejected)) => Err(format!(
            "{dependency}: {} was {}",
            rejected.id, rejected.rejection
        )),
        Some(ComponentIdResolveOutcome::Failed(error)) => Err(error.to_string()),
        None => Err(format!("{dependency}: no outcome")),
    }
}

/// Handler to list-versions command
pub fn do_list_versions(engine: &ResolutionEngine, module: &str) -> anyhow::Result<()> {
    let module = ModuleIdentifier::from_notation(module)?;
    for (repository, listed) in engine.list_versions(&module) {
        match listed {
            Ok(Some(versions)) => {
                let versions: Vec<_> = versions.into_iter().collect();
                println!("{repository}: {}", versions.join(", "));
            }
            Ok(None) => println!("{repository}: not found"),
            Err(error) => warn!("{repository}: {error}"),
        }
    }
    Ok(())
}

/// Handler to clear-cache command
pub fn do_clear_cache(location: Option<PathBuf>) -> anyhow::Result<()> {
    let Some(location) = location else {
        bail!("No cache directory configured");
    };
    if !location.exists() {
        info!("No cache at {}, nothing to do", location.display());
        return Ok(());
    }
    info!("Clearing module cache {}", location.display());
    PersistentModuleCache::new(location)?.clear()?;
    Ok(())
}
