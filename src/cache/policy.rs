use std::time::Duration;

pub const DEFAULT_DYNAMIC_VERSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_CHANGING_MODULE_TTL: Duration = Duration::ZERO;
pub const DEFAULT_MISSING_MODULE_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_MODULE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The class of a cached entry, each with its own time to live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheEntryKind {
    /// Versions a repository lists for a module, used by dynamic selectors.
    VersionList,
    /// Metadata of a module that is never republished under the same version.
    Module,
    /// Metadata of a changing module.
    ChangingModule,
    /// A negative result: the repository did not know the component.
    MissingModule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    UseCached,
    Revalidate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    pub dynamic_version_ttl: Duration,
    pub changing_module_ttl: Duration,
    pub missing_module_ttl: Duration,
    pub module_ttl: Duration,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy {
            dynamic_version_ttl: DEFAULT_DYNAMIC_VERSION_TTL,
            changing_module_ttl: DEFAULT_CHANGING_MODULE_TTL,
            missing_module_ttl: DEFAULT_MISSING_MODULE_TTL,
            module_ttl: DEFAULT_MODULE_TTL,
        }
    }
}

impl CachePolicy {
    /// Every cached entry has to be revalidated.
    pub fn refresh() -> Self {
        CachePolicy {
            dynamic_version_ttl: Duration::ZERO,
            changing_module_ttl: Duration::ZERO,
            missing_module_ttl: Duration::ZERO,
            module_ttl: Duration::ZERO,
        }
    }

    pub fn ttl(&self, kind: CacheEntryKind) -> Duration {
        match kind {
            CacheEntryKind::VersionList => self.dynamic_version_ttl,
            CacheEntryKind::Module => self.module_ttl,
            CacheEntryKind::ChangingModule => self.changing_module_ttl,
            CacheEntryKind::MissingModule => self.missing_module_ttl,
        }
    }

    /// An entry is fresh while it is younger than the TTL of its kind. A zero TTL never
    /// yields a fresh entry.
    pub fn freshness(&self, kind: CacheEntryKind, age: Duration) -> Freshness {
        let ttl = self.ttl(kind);
        if !ttl.is_zero() && age < ttl {
            Freshness::UseCached
        } else {
            Freshness::Revalidate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn fresh_until_ttl() {
        let policy = CachePolicy::default();
        assert_eq!(
            policy.freshness(CacheEntryKind::VersionList, Duration::from_secs(10)),
            Freshness::UseCached
        );
        assert_eq!(
            policy.freshness(CacheEntryKind::VersionList, DEFAULT_DYNAMIC_VERSION_TTL),
            Freshness::Revalidate
        );
    }

    #[test]
    fn changing_modules_are_always_revalidated_by_default() {
        let policy = CachePolicy::default();
        assert_eq!(
            policy.freshness(CacheEntryKind::ChangingModule, Duration::ZERO),
            Freshness::Revalidate
        );
    }

    #[test]
    fn missing_modules_expire_before_present_ones() {
        let policy = CachePolicy::default();
        let age = Duration::from_secs(2 * 60 * 60);
        assert_eq!(
            policy.freshness(CacheEntryKind::MissingModule, age),
            Freshness::Revalidate
        );
        assert_eq!(
            policy.freshness(CacheEntryKind::Module, age),
            Freshness::UseCached
        );
    }

    #[test]
    fn refresh_revalidates_everything() {
        let policy = CachePolicy::refresh();
        for kind in [
            CacheEntryKind::VersionList,
            CacheEntryKind::Module,
            CacheEntryKind::ChangingModule,
            CacheEntryKind::MissingModule,
        ] {
            assert_eq!(
                policy.freshness(kind, Duration::ZERO),
                Freshness::Revalidate
            );
        }
    }
}
