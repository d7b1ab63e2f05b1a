// ============================================================
// Layer 3 — Problem Type
// ============================================================
// A closed set of classification problem types. The type
// decides which loss the model trains with and which metric
// strategy scores its outputs:
//
//   MultiLabel  → sigmoid per class, BCE loss, F1 + Hamming
//   SingleLabel → arg-max over classes, CE loss, F1 + accuracy

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemType {
    #[default]
    MultiLabel,
    SingleLabel,
}

impl ProblemType {
    /// Name of the secondary metric reported next to `f1`
    pub fn secondary_metric(&self) -> &'static str {
        match self {
            ProblemType::MultiLabel  => "hamming",
            ProblemType::SingleLabel => "accuracy",
        }
    }
}

impl fmt::Display for ProblemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProblemType::MultiLabel  => write!(f, "multi_label_classification"),
            ProblemType::SingleLabel => write!(f, "single_label_classification"),
        }
    }
}

impl FromStr for ProblemType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "multi_label_classification" | "multi_label" | "multilabel" => {
                Ok(ProblemType::MultiLabel)
            }
            "single_label_classification" | "single_label" | "singlelabel" => {
                Ok(ProblemType::SingleLabel)
            }
            other => anyhow::bail!(
                "unknown problem type '{other}' \
                 (expected multi_label_classification or single_label_classification)"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        for p in [ProblemType::MultiLabel, ProblemType::SingleLabel] {
            assert_eq!(p.to_string().parse::<ProblemType>().unwrap(), p);
        }
    }

    #[test]
    fn test_unknown_problem_type_is_rejected() {
        assert!("regression".parse::<ProblemType>().is_err());
    }
}
