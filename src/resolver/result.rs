use std::{fmt::Display, sync::Arc};

use thiserror::Error;

use crate::{
    model::{
        attributes::AttributeMismatch, ComponentResolveMetadata, ComponentSelectionReason,
        ModuleComponentIdentifier, ModuleComponentSelector, ModuleVersionIdentifier,
        VersionSelector,
    },
    repository::RepositoryError,
};

/// Why a candidate that matched the requested selector was excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    BySelector { selector: VersionSelector },
    ByRule { reason: Option<String> },
    ByAttributes { mismatches: Vec<AttributeMismatch> },
}

impl Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::BySelector { selector } => write!(f, "rejected by selector {selector}"),
            Rejection::ByRule { reason: Some(reason) } => write!(f, "rejected by rule: {reason}"),
            Rejection::ByRule { reason: None } => f.write_str("rejected by rule"),
            Rejection::ByAttributes { mismatches } => {
                f.write_str("incompatible attributes: ")?;
                for (i, mismatch) in mismatches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{mismatch}")?;
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedVersion {
    pub id: ModuleComponentIdentifier,
    pub rejection: Rejection,
}

impl Display for RejectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id.version, self.rejection)
    }
}

/// A candidate excluded by a component selection rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedByRuleVersion {
    pub id: ModuleComponentIdentifier,
    pub reason: Option<String>,
}

impl From<RejectedByRuleVersion> for RejectedVersion {
    fn from(rejected: RejectedByRuleVersion) -> Self {
        RejectedVersion {
            id: rejected.id,
            rejection: Rejection::ByRule {
                reason: rejected.reason,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedComponentId {
    pub id: ModuleComponentIdentifier,
    pub module_version_id: ModuleVersionIdentifier,
    /// Absent for static selectors, which are resolved without reaching a repository.
    pub metadata: Option<Arc<ComponentResolveMetadata>>,
    pub repository: Option<String>,
    pub reason: ComponentSelectionReason,
}

impl ResolvedComponentId {
    pub fn is_changing(&self) -> bool {
        self.metadata
            .as_ref()
            .is_some_and(|metadata| metadata.is_changing())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedComponentId {
    pub id: ModuleComponentIdentifier,
    pub module_version_id: ModuleVersionIdentifier,
    pub rejection: Rejection,
}

/// A repository that could not answer because of a transient failure.
#[derive(Debug, Clone)]
pub struct RepositoryFailure {
    pub repository: String,
    pub error: Arc<RepositoryError>,
}

impl Display for RepositoryFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.repository, self.error)
    }
}

/// Nothing in the chain satisfied the selector. Carries what was seen on the way.
#[derive(Debug, Clone)]
pub struct ModuleVersionNotFound {
    pub selector: ModuleComponentSelector,
    pub attempted: Vec<String>,
    pub unmatched: Vec<String>,
    pub rejected: Vec<RejectedVersion>,
}

impl Display for ModuleVersionNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Could not find any version that matches {}.",
            self.selector
        )?;
        if !self.unmatched.is_empty() {
            f.write_str("\nVersions that do not match:")?;
            for version in &self.unmatched {
                write!(f, "\n  - {version}")?;
            }
        }
        if !self.rejected.is_empty() {
            f.write_str("\nVersions rejected:")?;
            for rejected in &self.rejected {
                write!(f, "\n  - {rejected}")?;
            }
        }
        if self.attempted.is_empty() {
            f.write_str("\nNo repository was searched.")?;
        } else {
            f.write_str("\nSearched in the following repositories:")?;
            for repository in &self.attempted {
                write!(f, "\n  - {repository}")?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for ModuleVersionNotFound {}

fn render_failures(failures: &[RepositoryFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("\n  - {failure}"))
        .collect()
}

#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    #[error("No repositories are registered")]
    NoRepositories,
    #[error(transparent)]
    NotFound(#[from] ModuleVersionNotFound),
    #[error("Could not resolve {selector}:{}", render_failures(.failures))]
    Repositories {
        selector: ModuleComponentSelector,
        failures: Vec<RepositoryFailure>,
    },
    #[error("Could not resolve {selector}: repository {repository} failed: {source}")]
    Fatal {
        selector: ModuleComponentSelector,
        repository: String,
        source: Arc<RepositoryError>,
    },
}

#[derive(Debug, Clone)]
pub enum ComponentIdResolveOutcome {
    Resolved(ResolvedComponentId),
    Rejected(RejectedComponentId),
    Failed(ResolveError),
}

/// Collects the outcome of one resolution together with the diagnostics gathered on the way:
/// the repositories consulted, the versions that did not match and the ones rejected.
#[derive(Debug, Clone, Default)]
pub struct ComponentIdResolveResult {
    outcome: Option<ComponentIdResolveOutcome>,
    attempted: Vec<String>,
    unmatched: Vec<String>,
    rejected: Vec<RejectedVersion>,
}

impl ComponentIdResolveResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolved(&mut self, resolved: ResolvedComponentId) {
        self.outcome = Some(ComponentIdResolveOutcome::Resolved(resolved));
    }

    pub fn rejected(&mut self, rejected: RejectedComponentId) {
        self.outcome = Some(ComponentIdResolveOutcome::Rejected(rejected));
    }

    pub fn failed(&mut self, error: ResolveError) {
        self.outcome = Some(ComponentIdResolveOutcome::Failed(error));
    }

    pub fn attempted(&mut self, repository: impl Into<String>) {
        let repository = repository.into();
        if !self.attempted.contains(&repository) {
            self.attempted.push(repository);
        }
    }

    pub fn unmatched(&mut self, versions: impl IntoIterator<Item = String>) {
        for version in versions {
            if !self.unmatched.contains(&version) {
                self.unmatched.push(version);
            }
        }
    }

    pub fn rejections(&mut self, rejected: impl IntoIterator<Item = RejectedVersion>) {
        for rejected in rejected {
            if !self.rejected.contains(&rejected) {
                self.rejected.push(rejected);
            }
        }
    }

    /// Takes over the outcome and diagnostics of `other`.
    pub fn absorb(&mut self, other: ComponentIdResolveResult) {
        for repository in other.attempted {
            self.attempted(repository);
        }
        self.unmatched(other.unmatched);
        self.rejections(other.rejected);
        if let Some(outcome) = other.outcome {
            self.outcome = Some(outcome);
        }
    }

    pub fn outcome(&self) -> Option<&ComponentIdResolveOutcome> {
        self.outcome.as_ref()
    }

    pub fn into_outcome(self) -> Option<ComponentIdResolveOutcome> {
        self.outcome
    }

    pub fn resolved_id(&self) -> Option<&ResolvedComponentId> {
        match &self.outcome {
            Some(ComponentIdResolveOutcome::Resolved(resolved)) => Some(resolved),
            _ => None,
        }
    }

    pub fn rejected_id(&self) -> Option<&RejectedComponentId> {
        match &self.outcome {
            Some(ComponentIdResolveOutcome::Rejected(rejected)) => Some(rejected),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ResolveError> {
        match &self.outcome {
            Some(ComponentIdResolveOutcome::Failed(error)) => Some(error),
            _ => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected_id().is_some()
    }

    pub fn attempted_repositories(&self) -> &[String] {
        &self.attempted
    }

    pub fn unmatched_versions(&self) -> &[String] {
        &self.unmatched
    }

    pub fn rejected_versions(&self) -> &[RejectedVersion] {
        &self.rejected
    }

    /// Failures and changing components must be resolved again on the next request.
    pub fn is_cacheable(&self) -> bool {
        match &self.outcome {
            Some(ComponentIdResolveOutcome::Resolved(resolved)) => !resolved.is_changing(),
            Some(ComponentIdResolveOutcome::Rejected(_)) => true,
            Some(ComponentIdResolveOutcome::Failed(_)) | None => false,
        }
    }
}
