use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::{
    cache::{
        CachePolicy, DEFAULT_CHANGING_MODULE_TTL, DEFAULT_DYNAMIC_VERSION_TTL,
        DEFAULT_ENTRY_TTL, DEFAULT_MAX_ENTRIES, DEFAULT_MISSING_MODULE_TTL, DEFAULT_MODULE_TTL,
    },
    resolver::SearchPolicy,
};

/// Settings of one run, merged from the configuration file and `MODRESOLVE_*` variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModresolveConfig {
    pub cache_dir: Option<PathBuf>,
    pub cache_policy: CachePolicy,
    pub memory_entries: usize,
    pub memory_ttl: Duration,
    pub search_policy: SearchPolicy,
    pub repositories: Vec<RepositoryConfig>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub name: String,
    pub path: PathBuf,
}

impl ModresolveConfig {
    /// A missing `config_file` is not an error.
    pub fn load(config_file: Option<&Path>) -> anyhow::Result<Self> {
        let raw_config = RawConfig::load(config_file, None)?;
        Ok(raw_config.into())
    }
}

impl From<RawConfig> for ModresolveConfig {
    fn from(raw: RawConfig) -> Self {
        let seconds = |value: Option<u64>, default: Duration| {
            value.map(Duration::from_secs).unwrap_or(default)
        };
        ModresolveConfig {
            cache_dir: raw.cache.dir,
            cache_policy: CachePolicy {
                dynamic_version_ttl: seconds(raw.ttl.dynamic, DEFAULT_DYNAMIC_VERSION_TTL),
                changing_module_ttl: seconds(raw.ttl.changing, DEFAULT_CHANGING_MODULE_TTL),
                missing_module_ttl: seconds(raw.ttl.missing, DEFAULT_MISSING_MODULE_TTL),
                module_ttl: seconds(raw.ttl.module, DEFAULT_MODULE_TTL),
            },
            memory_entries: raw.memory.entries.unwrap_or(DEFAULT_MAX_ENTRIES),
            memory_ttl: seconds(raw.memory.ttl, DEFAULT_ENTRY_TTL),
            search_policy: match raw.search.policy {
                Some(RawSearchPolicy::FirstMatch) => SearchPolicy::FirstMatch,
                Some(RawSearchPolicy::All) | None => SearchPolicy::All,
            },
            repositories: raw.repositories,
        }
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    cache: CacheConfig,
    #[serde(default)]
    ttl: TtlConfig,
    #[serde(default)]
    memory: MemoryConfig,
    #[serde(default)]
    search: SearchConfig,
    #[serde(default)]
    repositories: Vec<RepositoryConfig>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct CacheConfig {
    dir: Option<PathBuf>,
}

/// Seconds.
#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct TtlConfig {
    dynamic: Option<u64>,
    changing: Option<u64>,
    missing: Option<u64>,
    module: Option<u64>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct MemoryConfig {
    entries: Option<usize>,
    ttl: Option<u64>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct SearchConfig {
    policy: Option<RawSearchPolicy>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
enum RawSearchPolicy {
    All,
    FirstMatch,
}

impl RawConfig {
    fn load(
        config_file: Option<&Path>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(config_file) = config_file {
            builder = builder.add_source(File::from(config_file).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("MODRESOLVE")
                    .separator("_")
                    .try_parsing(true)
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_empty() {
        let env = HashMap::from([]);
        let config = RawConfig::load(None, Some(env)).unwrap();
        assert_eq!(config, RawConfig::default());
        assert_eq!(
            ModresolveConfig::from(config),
            ModresolveConfig {
                cache_dir: None,
                cache_policy: CachePolicy::default(),
                memory_entries: 100,
                memory_ttl: Duration::from_secs(10),
                search_policy: SearchPolicy::All,
                repositories: vec![],
            }
        );
    }

    #[test]
    fn load_environment() {
        let env = HashMap::from([
            ("MODRESOLVE_CACHE_DIR".to_owned(), "/cache".to_owned()),
            ("MODRESOLVE_TTL_DYNAMIC".to_owned(), "600".to_owned()),
            ("MODRESOLVE_MEMORY_ENTRIES".to_owned(), "5".to_owned()),
            ("MODRESOLVE_SEARCH_POLICY".to_owned(), "first-match".to_owned()),
        ]);
        let config = RawConfig::load(None, Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                cache: CacheConfig {
                    dir: Some("/cache".into())
                },
                ttl: TtlConfig {
                    dynamic: Some(600),
                    ..Default::default()
                },
                memory: MemoryConfig {
                    entries: Some(5),
                    ttl: None
                },
                search: SearchConfig {
                    policy: Some(RawSearchPolicy::FirstMatch)
                },
                repositories: vec![],
            }
        );
    }

    #[test]
    fn load_file_then_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modresolve.toml");
        std::fs::write(
            &path,
            r#"
[ttl]
dynamic = 60
changing = 5

[[repositories]]
name = "local"
path = "/srv/modules"

[[repositories]]
name = "mirror"
path = "/srv/mirror"
"#,
        )
        .unwrap();
        let env = HashMap::from([("MODRESOLVE_TTL_DYNAMIC".to_owned(), "30".to_owned())]);

        let config = ModresolveConfig::from(RawConfig::load(Some(&path), Some(env)).unwrap());
        assert_eq!(
            config.cache_policy.dynamic_version_ttl,
            Duration::from_secs(30)
        );
        assert_eq!(
            config.cache_policy.changing_module_ttl,
            Duration::from_secs(5)
        );
        assert_eq!(
            config.cache_policy.missing_module_ttl,
            DEFAULT_MISSING_MODULE_TTL
        );
        assert_eq!(
            config.repositories,
            vec![
                RepositoryConfig {
                    name: "local".to_string(),
                    path: "/srv/modules".into()
                },
                RepositoryConfig {
                    name: "mirror".to_string(),
                    path: "/srv/mirror".into()
                },
            ]
        );
    }

    #[test]
    fn missing_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = RawConfig::load(
            Some(&dir.path().join("absent.toml")),
            Some(HashMap::from([])),
        )
        .unwrap();
        assert_eq!(config, RawConfig::default());
    }
}
