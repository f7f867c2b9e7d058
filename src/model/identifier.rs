use std::fmt::Display;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

use crate::model::ParseError;

/// A module family, `group:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ModuleIdentifier {
    pub group: String,
    pub name: String,
}

impl ModuleIdentifier {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        ModuleIdentifier {
            group: group.into(),
            name: name.into(),
        }
    }

    pub fn from_notation(notation: &str) -> Result<Self, ParseError> {
        let re = Regex::new(r"^(?P<group>[^:\s]+):(?P<name>[^:\s]+)$")
            .map_err(|_| ParseError::InvalidNotation(notation.to_string()))?;
        let captures = re
            .captures(notation.trim())
            .ok_or_else(|| ParseError::InvalidNotation(notation.to_string()))?;
        Ok(ModuleIdentifier::new(&captures["group"], &captures["name"]))
    }
}

impl Display for ModuleIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.group, self.name)
    }
}

/// A module at one concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ModuleVersionIdentifier {
    #[serde(flatten)]
    pub module: ModuleIdentifier,
    pub version: String,
}

impl ModuleVersionIdentifier {
    pub fn new(module: ModuleIdentifier, version: impl Into<String>) -> Self {
        ModuleVersionIdentifier {
            module,
            version: version.into(),
        }
    }
}

impl Display for ModuleVersionIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// Identity of a resolved component instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ModuleComponentIdentifier {
    #[serde(flatten)]
    pub module: ModuleIdentifier,
    pub version: String,
}

impl ModuleComponentIdentifier {
    pub fn new(module: ModuleIdentifier, version: impl Into<String>) -> Self {
        ModuleComponentIdentifier {
            module,
            version: version.into(),
        }
    }

    pub fn module_version_id(&self) -> ModuleVersionIdentifier {
        ModuleVersionIdentifier::new(self.module.clone(), self.version.clone())
    }
}

impl Display for ModuleComponentIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}

/// A declared dependency: a module plus the requested version notation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ModuleComponentSelector {
    #[serde(flatten)]
    pub module: ModuleIdentifier,
    pub version: String,
}

impl ModuleComponentSelector {
    pub fn new(module: ModuleIdentifier, version: impl Into<String>) -> Self {
        ModuleComponentSelector {
            module,
            version: version.into(),
        }
    }

    /// Parses `group:name:version`.
    pub fn from_notation(notation: &str) -> Result<Self, ParseError> {
        let re = Regex::new(r"^(?P<group>[^:\s]+):(?P<name>[^:\s]+):(?P<version>\S+)$")
            .map_err(|_| ParseError::InvalidNotation(notation.to_string()))?;
        let captures = re
            .captures(notation.trim())
            .ok_or_else(|| ParseError::InvalidNotation(notation.to_string()))?;
        Ok(ModuleComponentSelector::new(
            ModuleIdentifier::new(&captures["group"], &captures["name"]),
            &captures["version"],
        ))
    }
}

impl Display for ModuleComponentSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}:{}", self.module, self.version)
    }
}
