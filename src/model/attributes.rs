use std::{collections::BTreeMap, fmt::Display};

use serde::{Deserialize, Serialize};

use crate::model::ParseError;

/// Variant attributes of a component, or the attributes a consumer asks for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeContainer(BTreeMap<String, String>);

impl AttributeContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses `key=value`.
    pub fn parse_entry(entry: &str) -> Result<(String, String), ParseError> {
        match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(ParseError::InvalidAttribute(entry.to_string())),
        }
    }

    /// Consumer attributes this component declares with a different value.
    /// Attributes the component does not declare are compatible with anything.
    pub fn mismatches(&self, consumer: &AttributeContainer) -> Vec<AttributeMismatch> {
        consumer
            .iter()
            .filter_map(|(key, requested)| match self.get(key) {
                Some(provided) if provided != requested => Some(AttributeMismatch {
                    attribute: key.to_string(),
                    requested: requested.to_string(),
                    provided: provided.to_string(),
                }),
                _ => None,
            })
            .collect()
    }

    pub fn is_compatible_with(&self, consumer: &AttributeContainer) -> bool {
        self.mismatches(consumer).is_empty()
    }
}

impl FromIterator<(String, String)> for AttributeContainer {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        AttributeContainer(iter.into_iter().collect())
    }
}

impl Display for AttributeContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("{")?;
        for (i, (key, value)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{key}={value}")?;
        }
        f.write_str("}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMismatch {
    pub attribute: String,
    pub requested: String,
    pub provided: String,
}

impl Display for AttributeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (required '{}', found '{}')",
            self.attribute, self.requested, self.provided
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn missing_attributes_are_compatible() {
        let component = AttributeContainer::new().with("platform", "linux");
        let consumer = AttributeContainer::new().with("usage", "runtime");
        assert!(component.is_compatible_with(&consumer));
    }

    #[test]
    fn differing_values_are_reported() {
        let component = AttributeContainer::new()
            .with("platform", "linux")
            .with("usage", "runtime");
        let consumer = AttributeContainer::new().with("platform", "windows");
        assert_eq!(
            component.mismatches(&consumer),
            vec![AttributeMismatch {
                attribute: "platform".to_string(),
                requested: "windows".to_string(),
                provided: "linux".to_string(),
            }]
        );
        assert!(!component.is_compatible_with(&consumer));
    }

    #[test]
    fn parse_attribute_entry() {
        assert_eq!(
            AttributeContainer::parse_entry("platform = linux").unwrap(),
            ("platform".to_string(), "linux".to_string())
        );
        assert!(AttributeContainer::parse_entry("platform").is_err());
        assert!(AttributeContainer::parse_entry("=linux").is_err());
    }
}
