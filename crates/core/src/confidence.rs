//! Confidence mapping: numeric 0..100 confidence → symbolic level (spec §4.1).

use serde::{Deserialize, Serialize};

/// Symbolic confidence level derived from a numeric 0..100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    NotFound,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::NotFound => "not_found",
        }
    }
}

/// Map a numeric confidence (0..100) to its symbolic level: `high >=85`,
/// `medium >=65`, `low >=45`, else `not_found`.
pub fn confidence_level(score: u8) -> ConfidenceLevel {
    if score >= 85 {
        ConfidenceLevel::High
    } else if score >= 65 {
        ConfidenceLevel::Medium
    } else if score >= 45 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::NotFound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_map_correctly() {
        assert_eq!(confidence_level(85), ConfidenceLevel::High);
        assert_eq!(confidence_level(84), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(65), ConfidenceLevel::Medium);
        assert_eq!(confidence_level(64), ConfidenceLevel::Low);
        assert_eq!(confidence_level(45), ConfidenceLevel::Low);
        assert_eq!(confidence_level(44), ConfidenceLevel::NotFound);
        assert_eq!(confidence_level(0), ConfidenceLevel::NotFound);
        assert_eq!(confidence_level(100), ConfidenceLevel::High);
    }
}
