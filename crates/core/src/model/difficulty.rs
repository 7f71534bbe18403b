use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

/// Errors that can occur when decoding a difficulty tier.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DifficultyError {
    #[error("invalid difficulty tier: {0}")]
    Invalid(String),
}

//
// ─── DIFFICULTY TIER ──────────────────────────────────────────────────────────
//

/// Three-level difficulty tier for quiz questions.
///
/// Tiers are derived from rolling accuracy when selecting questions:
/// - `Beginner`: accuracy below 60
/// - `Intermediate`: accuracy from 60 up to (but excluding) 80
/// - `Advanced`: accuracy of 80 and above
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// Maps a rolling accuracy percentage onto a tier.
    ///
    /// A fresh learner with no answered questions has undefined accuracy and
    /// is treated as 0, landing in `Beginner`. Boundaries are inclusive on
    /// the lower bound of each tier.
    #[must_use]
    pub fn for_accuracy(accuracy: f64) -> Self {
        if accuracy >= 80.0 {
            Self::Advanced
        } else if accuracy >= 60.0 {
            Self::Intermediate
        } else {
            Self::Beginner
        }
    }

    /// Stable string encoding used by storage and export.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Decodes the stable string encoding.
    ///
    /// # Errors
    ///
    /// Returns `DifficultyError::Invalid` for unknown encodings.
    pub fn parse(value: &str) -> Result<Self, DifficultyError> {
        match value {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(DifficultyError::Invalid(other.to_string())),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_boundaries_are_inclusive_on_lower_bound() {
        assert_eq!(Difficulty::for_accuracy(80.0), Difficulty::Advanced);
        assert_eq!(Difficulty::for_accuracy(79.9), Difficulty::Intermediate);
        assert_eq!(Difficulty::for_accuracy(60.0), Difficulty::Intermediate);
        assert_eq!(Difficulty::for_accuracy(59.9), Difficulty::Beginner);
        assert_eq!(Difficulty::for_accuracy(0.0), Difficulty::Beginner);
        assert_eq!(Difficulty::for_accuracy(100.0), Difficulty::Advanced);
    }

    #[test]
    fn string_encoding_round_trips() {
        for tier in [
            Difficulty::Beginner,
            Difficulty::Intermediate,
            Difficulty::Advanced,
        ] {
            assert_eq!(Difficulty::parse(tier.as_str()).unwrap(), tier);
        }
        assert!(Difficulty::parse("expert").is_err());
    }
}
