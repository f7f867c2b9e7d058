mod chooser;
mod component_id;
mod dynamic;
mod provider;
mod result;
mod rules;

pub use chooser::{CandidateSelection, SelectionOutcome, VersionedComponentChooser};
pub use component_id::{DependencyToComponentIdResolver, ResolutionKey};
pub use dynamic::{DynamicVersionResolver, SearchPolicy};
pub use provider::{ComponentMetadataProvider, MetadataResult};
pub use result::{
    ComponentIdResolveOutcome, ComponentIdResolveResult, ModuleVersionNotFound,
    RejectedByRuleVersion, RejectedComponentId, RejectedVersion, Rejection, RepositoryFailure,
    ResolveError, ResolvedComponentId,
};
pub use rules::{ComponentSelectionRules, MetadataPredicate, RejectionRule, VersionPredicate};
