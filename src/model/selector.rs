use std::{fmt::Display, str::FromStr};

use super::{ComponentResolveMetadata, ParseError, Version};

const LATEST_PREFIX: &str = "latest.";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RangeBound {
    pub version: Version,
    pub inclusive: bool,
}

/// The version part of a dependency declaration.
///
/// Selectors are immutable once built. Only [`VersionSelector::Exact`] is static; every other
/// variant has to be resolved against the versions a repository lists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionSelector {
    /// `1.2.3`
    Exact { version: String },
    /// `[1.0,2.0)`, `]1.0,2.0]`, `(,2.0]`, `[1.0,)`
    Range {
        lower: Option<RangeBound>,
        upper: Option<RangeBound>,
    },
    /// `1.+`, or `+` for any version
    SubVersion { prefix: String },
    /// `latest.release`, `latest.integration`, or any other status of the scheme
    Latest { status: String },
}

impl VersionSelector {
    pub fn exact(version: impl Into<String>) -> Self {
        VersionSelector::Exact {
            version: version.into(),
        }
    }

    pub fn sub_version(prefix: impl Into<String>) -> Self {
        VersionSelector::SubVersion {
            prefix: prefix.into(),
        }
    }

    pub fn latest(status: impl Into<String>) -> Self {
        VersionSelector::Latest {
            status: status.into(),
        }
    }

    pub fn parse(notation: &str) -> Result<Self, ParseError> {
        let notation = notation.trim();
        if notation.is_empty() {
            return Err(ParseError::EmptySelector);
        }
        if notation.starts_with(['[', ']', '(']) {
            return parse_range(notation);
        }
        if let Some(status) = notation.strip_prefix(LATEST_PREFIX) {
            if status.is_empty() {
                return Err(ParseError::InvalidNotation(notation.to_string()));
            }
            return Ok(VersionSelector::latest(status));
        }
        if let Some(prefix) = notation.strip_suffix('+') {
            return Ok(VersionSelector::sub_version(prefix));
        }
        Ok(VersionSelector::exact(notation))
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, VersionSelector::Exact { .. })
    }

    /// True when the version string alone cannot decide acceptance.
    pub fn requires_metadata(&self) -> bool {
        matches!(self, VersionSelector::Latest { .. })
    }

    pub fn accept(&self, candidate: &str) -> bool {
        match self {
            VersionSelector::Exact { version } => version == candidate,
            VersionSelector::Range { lower, upper } => {
                let candidate = Version::parse(candidate);
                let above_lower = lower.as_ref().map_or(true, |bound| {
                    if bound.inclusive {
                        candidate >= bound.version
                    } else {
                        candidate > bound.version
                    }
                });
                let below_upper = upper.as_ref().map_or(true, |bound| {
                    if bound.inclusive {
                        candidate <= bound.version
                    } else {
                        candidate < bound.version
                    }
                });
                above_lower && below_upper
            }
            VersionSelector::SubVersion { prefix } => candidate.starts_with(prefix.as_str()),
            // Every listed version is a candidate until its status is known.
            VersionSelector::Latest { .. } => true,
        }
    }

    pub fn accept_metadata(&self, candidate: &ComponentResolveMetadata) -> bool {
        match self {
            VersionSelector::Latest { status } => {
                match (
                    candidate.status_rank(&candidate.status),
                    candidate.status_rank(status),
                ) {
                    (Some(candidate_rank), Some(requested_rank)) => {
                        candidate_rank >= requested_rank
                    }
                    _ => false,
                }
            }
            _ => self.accept(&candidate.id.version),
        }
    }
}

fn parse_range(notation: &str) -> Result<VersionSelector, ParseError> {
    let malformed = || ParseError::MalformedRange(notation.to_string());

    let mut chars = notation.chars();
    let open = chars.next().ok_or_else(malformed)?;
    let close = chars.next_back().ok_or_else(malformed)?;
    if !matches!(close, ']' | '[' | ')') {
        return Err(malformed());
    }
    let (lower, upper) = chars.as_str().split_once(',').ok_or_else(malformed)?;
    if upper.contains(',') {
        return Err(malformed());
    }

    let bound = |text: &str, inclusive: bool| -> Result<Option<RangeBound>, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(None);
        }
        if text.contains(['[', ']', '(', ')']) {
            return Err(malformed());
        }
        Ok(Some(RangeBound {
            version: Version::parse(text),
            inclusive,
        }))
    };

    let lower = bound(lower, open == '[')?;
    let upper = bound(upper, close == ']')?;

    match (&lower, &upper) {
        (None, None) => Err(malformed()),
        (Some(lower), Some(upper)) => {
            let empty = lower.version > upper.version
                || (lower.version == upper.version && !(lower.inclusive && upper.inclusive));
            if empty {
                Err(ParseError::EmptyRange(notation.to_string()))
            } else {
                Ok(VersionSelector::Range {
                    lower: Some(lower.clone()),
                    upper: Some(upper.clone()),
                })
            }
        }
        _ => Ok(VersionSelector::Range { lower, upper }),
    }
}

impl FromStr for VersionSelector {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionSelector::parse(s)
    }
}

impl Display for VersionSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionSelector::Exact { version } => f.write_str(version),
            VersionSelector::Range { lower, upper } => {
                match lower {
                    Some(bound) if bound.inclusive => write!(f, "[{}", bound.version)?,
                    Some(bound) => write!(f, "({}", bound.version)?,
                    None => f.write_str("(")?,
                }
                f.write_str(",")?;
                match upper {
                    Some(bound) if bound.inclusive => write!(f, "{}]", bound.version),
                    Some(bound) => write!(f, "{})", bound.version),
                    None => f.write_str(")"),
                }
            }
            VersionSelector::SubVersion { prefix } => write!(f, "{prefix}+"),
            VersionSelector::Latest { status } => write!(f, "{LATEST_PREFIX}{status}"),
        }
    }
}
