use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
};

/// Qualifiers that rank differently from plain lexical order. Any other text part ranks at 0.
const SPECIAL_MEANINGS: [(&str, i32); 7] = [
    ("dev", -1),
    ("rc", 1),
    ("snapshot", 2),
    ("final", 3),
    ("ga", 4),
    ("release", 5),
    ("sp", 6),
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum VersionPart {
    /// Digits with leading zeros removed, so that length then lexical order is numeric order.
    Numeric(String),
    Text(String),
}

impl VersionPart {
    fn is_numeric(&self) -> bool {
        matches!(self, VersionPart::Numeric(_))
    }
}

/// A parsed version string with the ordering used to pick the newest candidate.
///
/// Parts are separated by `.`, `-`, `_` and `+`, and additionally wherever a run of digits
/// meets a run of letters, so `1.0rc1` has the parts `1`, `0`, `rc`, `1`.
#[derive(Clone)]
pub struct Version {
    source: String,
    parts: Vec<VersionPart>,
}

impl Version {
    pub fn parse(source: impl Into<String>) -> Version {
        let source = source.into();
        let parts = split_parts(&source);
        Version { source, parts }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the version carries a text qualifier, e.g. `1.0-rc1`.
    pub fn is_qualified(&self) -> bool {
        self.parts.iter().any(|part| !part.is_numeric())
    }
}

fn split_parts(source: &str) -> Vec<VersionPart> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_numeric = false;

    let mut flush = |current: &mut String, numeric: bool| {
        if current.is_empty() {
            return;
        }
        let part = if numeric {
            let trimmed = current.trim_start_matches('0');
            let digits = if trimmed.is_empty() { "0" } else { trimmed };
            VersionPart::Numeric(digits.to_string())
        } else {
            VersionPart::Text(std::mem::take(current))
        };
        current.clear();
        parts.push(part);
    };

    for c in source.chars() {
        if matches!(c, '.' | '-' | '_' | '+') {
            flush(&mut current, current_numeric);
            continue;
        }
        let numeric = c.is_ascii_digit();
        if !current.is_empty() && numeric != current_numeric {
            flush(&mut current, current_numeric);
        }
        current_numeric = numeric;
        current.push(c);
    }
    flush(&mut current, current_numeric);
    parts
}

fn special_meaning(text: &str) -> Option<i32> {
    let lower = text.to_ascii_lowercase();
    SPECIAL_MEANINGS
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, rank)| *rank)
}

fn compare_parts(a: &VersionPart, b: &VersionPart) -> Ordering {
    match (a, b) {
        (VersionPart::Numeric(a), VersionPart::Numeric(b)) => {
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (VersionPart::Numeric(_), VersionPart::Text(_)) => Ordering::Greater,
        (VersionPart::Text(_), VersionPart::Numeric(_)) => Ordering::Less,
        (VersionPart::Text(a), VersionPart::Text(b)) => {
            match (special_meaning(a), special_meaning(b)) {
                (None, None) => a.cmp(b),
                (a_rank, b_rank) => a_rank.unwrap_or(0).cmp(&b_rank.unwrap_or(0)),
            }
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        for (a, b) in self.parts.iter().zip(other.parts.iter()) {
            match compare_parts(a, b) {
                Ordering::Equal => continue,
                ordering => return ordering,
            }
        }
        // An extra numeric part makes a version newer, an extra qualifier makes it older.
        match self.parts.len().cmp(&other.parts.len()) {
            Ordering::Greater => {
                if self.parts[other.parts.len()].is_numeric() {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            Ordering::Less => {
                if other.parts[self.parts.len()].is_numeric() {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            Ordering::Equal => Ordering::Equal,
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
    }
}

impl Hash for VersionPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            VersionPart::Numeric(digits) => digits.hash(state),
            VersionPart::Text(text) => match special_meaning(text) {
                Some(rank) => rank.hash(state),
                None => text.hash(state),
            },
        }
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Debug for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Version({})", self.source)
    }
}

impl From<&str> for Version {
    fn from(s: &str) -> Self {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s)
    }

    #[test]
    fn numeric_parts_compare_numerically() {
        assert!(v("1.10") > v("1.9"));
        assert!(v("2.0") > v("1.99.99"));
        assert!(v("1.0.0010") > v("1.0.9"));
        assert!(v("1.2.3") == v("1.2.3"));
        assert!(v("1.02") == v("1.2"));
        assert!(v("123456789012345678901234567890") > v("99999999999999999999"));
    }

    #[test]
    fn separators_are_equivalent() {
        assert_eq!(v("1.0-1"), v("1_0+1"));
        assert_eq!(v("1.0rc1"), v("1.0.rc.1"));
    }

    #[test]
    fn extra_numeric_part_is_newer() {
        assert!(v("1.1.0") > v("1.1"));
        assert!(v("1.1") < v("1.1.1"));
    }

    #[test]
    fn extra_qualifier_is_older() {
        assert!(v("1.1.a") < v("1.1"));
        assert!(v("1.0-beta") < v("1.0"));
        assert!(v("1.0") > v("1.0-SNAPSHOT"));
    }

    #[test]
    fn numeric_ranks_above_text() {
        assert!(v("1.0.1") > v("1.0.final"));
        assert!(v("1.a") < v("1.1"));
    }

    #[test]
    fn special_qualifiers_order() {
        assert!(v("1.0-dev") < v("1.0-alpha"));
        assert!(v("1.0-alpha") < v("1.0-rc"));
        assert!(v("1.0-rc") < v("1.0-snapshot"));
        assert!(v("1.0-snapshot") < v("1.0-final"));
        assert!(v("1.0-final") < v("1.0-ga"));
        assert!(v("1.0-ga") < v("1.0-release"));
        assert!(v("1.0-release") < v("1.0-sp"));
        assert!(v("1.0-RC") == v("1.0-rc"));
    }

    #[test]
    fn plain_text_compares_lexically() {
        assert!(v("1.0-alpha") < v("1.0-beta"));
        assert!(v("1.0-beta2") > v("1.0-beta1"));
    }

    #[test]
    fn source_is_preserved() {
        let version = v("1.0-RC1");
        assert_eq!(version.source(), "1.0-RC1");
        assert_eq!(version.to_string(), "1.0-RC1");
        assert!(version.is_qualified());
        assert!(!v("1.0.3").is_qualified());
    }
}
