use std::{
    collections::BTreeSet,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use log::{debug, trace};

use crate::model::{
    ComponentResolveMetadata, DescriptorHash, ModuleComponentIdentifier, ModuleIdentifier,
    ModuleSource,
};

use super::{ModuleComponentRepository, RepositoryError};

pub const DESCRIPTOR_FILE_NAME: &str = "module.toml";

/// A repository laid out on a local filesystem:
///
/// ```text
/// <root>/<group>/<name>/<version>/module.toml
/// ```
pub struct FileSystemRepository {
    id: String,
    root: PathBuf,
}

impl FileSystemRepository {
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        FileSystemRepository {
            id: id.into(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `None` when a coordinate cannot name a directory below the root.
    fn module_path(&self, module: &ModuleIdentifier) -> Option<PathBuf> {
        if !is_path_segment(&module.group) || !is_path_segment(&module.name) {
            debug!("{} cannot be stored in {}", module, self.id);
            return None;
        }
        Some(self.root.join(&module.group).join(&module.name))
    }

    fn descriptor_path(&self, id: &ModuleComponentIdentifier) -> Option<PathBuf> {
        if !is_path_segment(&id.version) {
            debug!("{} cannot be stored in {}", id, self.id);
            return None;
        }
        Some(
            self.module_path(&id.module)?
                .join(&id.version)
                .join(DESCRIPTOR_FILE_NAME),
        )
    }

    fn read_descriptor(&self, path: &Path) -> Result<Option<Vec<u8>>, RepositoryError> {
        trace!("Reading descriptor {}", path.display());
        match std::fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(None),
            Err(error) => Err(io_error(error, path)),
        }
    }
}

fn is_path_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment.contains(['/', '\\', '\0'])
        && !Path::new(segment).is_absolute()
}

fn io_error(error: std::io::Error, path: &Path) -> RepositoryError {
    if error.kind() == ErrorKind::TimedOut {
        RepositoryError::Timeout {
            location: path.display().to_string(),
        }
    } else {
        RepositoryError::IO(error)
    }
}

impl ModuleComponentRepository for FileSystemRepository {
    fn id(&self) -> &str {
        &self.id
    }

    fn list_versions(
        &self,
        module: &ModuleIdentifier,
    ) -> Result<Option<BTreeSet<String>>, RepositoryError> {
        let Some(path) = self.module_path(module) else {
            return Ok(None);
        };
        let entries = match std::fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                debug!("Module {} not present in {}", module, self.id);
                return Ok(None);
            }
            Err(error) => return Err(io_error(error, &path)),
        };

        let mut versions = BTreeSet::new();
        for entry in entries {
            let entry = entry.map_err(|error| io_error(error, &path))?;
            if !entry.path().join(DESCRIPTOR_FILE_NAME).is_file() {
                continue;
            }
            if let Some(version) = entry.file_name().to_str() {
                versions.insert(version.to_string());
            }
        }

        if versions.is_empty() {
            Ok(None)
        } else {
            Ok(Some(versions))
        }
    }

    fn fetch_metadata(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<Arc<ComponentResolveMetadata>>, RepositoryError> {
        let Some(path) = self.descriptor_path(id) else {
            return Ok(None);
        };
        let Some(bytes) = self.read_descriptor(&path)? else {
            return Ok(None);
        };
        let invalid = |reason: String| RepositoryError::InvalidDescriptor {
            location: path.display().to_string(),
            reason,
        };

        let text = std::str::from_utf8(&bytes).map_err(|e| invalid(e.to_string()))?;
        let metadata: ComponentResolveMetadata =
            toml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        if &metadata.id != id {
            return Err(invalid(format!("descriptor declares {}", metadata.id)));
        }

        let changing = metadata.changing;
        let metadata = metadata
            .without_repository_source()
            .with_source(ModuleSource::DescriptorHash {
                hash: DescriptorHash::of_bytes(&bytes),
                changing,
            });
        Ok(Some(Arc::new(metadata)))
    }

    fn descriptor_hash(
        &self,
        id: &ModuleComponentIdentifier,
    ) -> Result<Option<DescriptorHash>, RepositoryError> {
        let Some(path) = self.descriptor_path(id) else {
            return Ok(None);
        };
        Ok(self
            .read_descriptor(&path)?
            .map(|bytes| DescriptorHash::of_bytes(&bytes)))
    }
}
