use thiserror::Error;

pub mod attributes;
pub mod identifier;
pub mod metadata;
pub mod reason;
pub mod selector;
pub mod version;

pub use attributes::AttributeContainer;
pub use identifier::{
    ModuleComponentIdentifier, ModuleComponentSelector, ModuleIdentifier, ModuleVersionIdentifier,
};
pub use metadata::{ComponentResolveMetadata, DescriptorHash, ModuleSource};
pub use reason::{ComponentSelectionCause, ComponentSelectionDescriptor, ComponentSelectionReason};
pub use selector::VersionSelector;
pub use version::Version;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error reading descriptor: {0}")]
    IO(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Empty version selector")]
    EmptySelector,
    #[error("Malformed version range `{0}`")]
    MalformedRange(String),
    #[error("Version range `{0}` cannot match any version")]
    EmptyRange(String),
    #[error("Invalid module notation `{0}`, expected `group:name` or `group:name:version`")]
    InvalidNotation(String),
    #[error("Invalid attribute `{0}`, expected `key=value`")]
    InvalidAttribute(String),
}
