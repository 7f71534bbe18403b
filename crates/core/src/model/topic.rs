use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validated topic name (trimmed, non-empty).
///
/// Topics tag questions in the catalog and drive mastered-topic exclusion
/// during adaptive selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Create a validated topic name.
    ///
    /// # Errors
    ///
    /// Returns `TopicError::Empty` if the name is empty after trimming.
    pub fn new(value: impl Into<String>) -> Result<Self, TopicError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TopicError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic name cannot be empty")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_keeps_content() {
        let topic = Topic::new("  Energy ").unwrap();
        assert_eq!(topic.as_str(), "Energy");
    }

    #[test]
    fn rejects_blank_names() {
        assert!(matches!(Topic::new("   "), Err(TopicError::Empty)));
    }
}
