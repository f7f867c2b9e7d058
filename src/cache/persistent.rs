use std::{
    collections::BTreeSet,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::{
    flock::FileLock,
    model::{ComponentResolveMetadata, ModuleComponentIdentifier, ModuleIdentifier},
};

use super::{CacheError, CachedMetadata, CachedModuleVersionList, ModuleMetadataCache};

const LOCK_FILE_NAME: &str = ".lock";
const VERSIONS_FILE_NAME: &str = "versions.toml";
const METADATA_FILE_NAME: &str = "metadata.toml";

/// Repository answers stored under a directory, one TOML file per entry:
///
/// ```text
/// <location>/<repository>/<group>/<name>/versions.toml
/// <location>/<repository>/<group>/<name>/<version>/metadata.toml
/// ```
///
/// The directory is locked for the lifetime of the cache.
pub struct PersistentModuleCache {
    location: PathBuf,
    _lock: FileLock,
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionListEntry {
    cached_at: u64,
    versions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct MetadataEntry {
    cached_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<ComponentResolveMetadata>,
}

impl PersistentModuleCache {
    pub fn new(location: PathBuf) -> Result<Self, CacheError> {
        if location.exists() {
            if !location.is_dir() {
                return Err(CacheError::BadLocation {
                    location: location.display().to_string(),
                });
            }
        } else {
            std::fs::create_dir_all(&location)?;
        }

        let lock = Self::acquire_lock(&location)?;
        Ok(PersistentModuleCache {
            location,
            _lock: lock,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    fn acquire_lock(location: &Path) -> Result<FileLock, CacheError> {
        let location = location.join(LOCK_FILE_NAME);
        debug!(
            "Acquiring a lock on the cache location: {}",
            location.display()
        );
        let lock = FileLock::new(&location)?;
        debug!("Acquired a lock on the cache location");
        Ok(lock)
    }

    fn module_path(&self, repository: &str, module: &ModuleIdentifier) -> PathBuf {
        self.location
            .join(path_segment(repository))
            .join(path_segment(&module.group))
            .join(path_segment(&module.name))
    }

    fn versions_path(&self, repository: &str, module: &ModuleIdentifier) -> PathBuf {
        self.module_path(repository, module).join(VERSIONS_FILE_NAME)
    }

    fn metadata_path(&self, repository: &str, id: &ModuleComponentIdentifier) -> PathBuf {
        self.module_path(repository, &id.module)
            .join(path_segment(&id.version))
            .join(METADATA_FILE_NAME)
    }
}

/// Maps an arbitrary string to a single safe path segment. Segments that had to be altered
/// get a hash suffix so that distinct inputs stay distinct.
fn path_segment(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '+') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized == raw && !raw.is_empty() && raw != "." && raw != ".." {
        sanitized
    } else {
        let digest = hex::encode(Sha256::digest(raw.as_bytes()));
        format!("{}-{}", sanitized.replace('.', "_"), &digest[..12])
    }
}

fn read_entry<T>(
    path: &Path,
    decode: impl FnOnce(&str) -> Result<T, toml::de::Error>,
) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(error) if error.kind() == ErrorKind::NotFound => return None,
        Err(error) => {
            warn!(
                "Ignoring unreadable cache entry {}: {}",
                path.display(),
                error
            );
            return None;
        }
    };
    match decode(&content) {
        Ok(entry) => Some(entry),
        Err(error) => {
            warn!("Ignoring corrupt cache entry {}: {}", path.display(), error);
            None
        }
    }
}

fn write_entry(path: &Path, content: &str) -> Result<(), CacheError> {
    let parent = path.parent().ok_or_else(|| CacheError::BadLocation {
        location: path.display().to_string(),
    })?;
    std::fs::create_dir_all(parent)?;
    let mut file = NamedTempFile::new_in(parent)?;
    file.write_all(content.as_bytes())?;
    file.persist(path)?;
    trace!("Wrote cache entry {}", path.display());
    Ok(())
}

fn encode_metadata(
    metadata: Option<&ComponentResolveMetadata>,
    cached_at: u64,
) -> Result<String, CacheError> {
    let entry = MetadataEntry {
        cached_at,
        metadata: metadata.map(|metadata| metadata.clone().without_repository_source()),
    };
    Ok(toml::to_string(&entry)?)
}

fn decode_metadata(content: &str) -> Result<CachedMetadata, toml::de::Error> {
    let entry: MetadataEntry = toml::from_str(content)?;
    Ok(CachedMetadata {
        metadata: entry.metadata.map(Arc::new),
        cached_at: entry.cached_at,
    })
}

impl ModuleMetadataCache for PersistentModuleCache {
    fn cached_versions(
        &self,
        repository: &str,
        module: &ModuleIdentifier,
    ) -> Option<CachedModuleVersionList> {
        read_entry(&self.versions_path(repository, module), |content| {
            toml::from_str::<VersionListEntry>(content)
        })
        .map(|entry| CachedModuleVersionList {
            versions: entry.versions.into_iter().collect(),
            cached_at: entry.cached_at,
        })
    }

    fn cache_versions(
        &self,
        repository: &str,
        module: &ModuleIdentifier,
        versions: &BTreeSet<String>,
        now: u64,
    ) -> Result<(), CacheError> {
        let entry = VersionListEntry {
            cached_at: now,
            versions: versions.iter().cloned().collect(),
        };
        write_entry(
            &self.versions_path(repository, module),
            &toml::to_string(&entry)?,
        )
    }

    fn cached_metadata(
        &self,
        repository: &str,
        id: &ModuleComponentIdentifier,
    ) -> Option<CachedMetadata> {
        let path = self.metadata_path(repository, id);
        let entry = read_entry(&path, decode_metadata)?;
        match &entry.metadata {
            Some(metadata) if &metadata.id != id => {
                warn!(
                    "Ignoring cache entry {} describing {}",
                    path.display(),
                    metadata.id
                );
                None
            }
            _ => Some(entry),
        }
    }

    fn cache_metadata(
        &self,
        repository: &str,
        id: &ModuleComponentIdentifier,
        metadata: Option<Arc<ComponentResolveMetadata>>,
        now: u64,
    ) -> Result<(), CacheError> {
        write_entry(
            &self.metadata_path(repository, id),
            &encode_metadata(metadata.as_deref(), now)?,
        )
    }

    fn clear(&self) -> Result<(), CacheError> {
        info!("Clearing module cache {}", self.location.display());
        for entry in std::fs::read_dir(&self.location)? {
            let entry = entry?;
            if entry.file_name() == LOCK_FILE_NAME {
                continue;
            }
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(entry.path())?;
            } else {
                std::fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}
