//! Unified error type for feeder synthesis.
//!
//! Every stage of the pipeline returns [`FeederResult`]. A design rule that
//! cannot be met with the given catalog is a different variant from a
//! disconnected road graph. Nothing is clamped or downgraded on the way out.
//!
//! # Example
//!
//! ```ignore
//! use feedgen_core::{FeederError, FeederResult};
//!
//! fn size_feeder(config: &SynthesisConfig) -> FeederResult<()> {
//!     config.validate()?;
//!     let feeder = FeederSynthesizer::new(config.clone()).synthesize(&inputs)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Error type for all synthesis stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeederError {
    /// Out-of-range parameters (negative voltage, bad power factor, ...)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Requested cluster count is outside 1..=points
    #[error("Invalid cluster count {requested}: must be between 1 and {points}")]
    InvalidClusterCount { requested: usize, points: usize },

    /// A terminal cannot be reached from the source vertex
    #[error("Terminal {terminal} is not reachable from source {origin}")]
    UnreachableTerminal { terminal: String, origin: String },

    /// The diversity-factor model produced a physically invalid value
    #[error("Diversity factor {factor} for {customers} customers is negative")]
    NegativeDiversityFactor { customers: usize, factor: f64 },

    /// No catalog entry in scope is large enough
    #[error(
        "No catalog entry{} satisfies required rating {required:.3} (largest available: {})",
        scope_suffix(.scope),
        largest_text(.largest)
    )]
    CapacityExceedsCatalog {
        required: f64,
        largest: Option<f64>,
        scope: Option<String>,
    },

    /// Even the largest conductor exceeds the voltage-drop budget
    #[error("No conductor satisfies {required_ampacity:.2} A within drop budget {budget_pct_per_kva_m:.3e} %/kVA·m (best candidate '{largest}' gives {achieved_pct_per_kva_m:.3e})")]
    NoConductorSatisfiesConstraint {
        required_ampacity: f64,
        budget_pct_per_kva_m: f64,
        achieved_pct_per_kva_m: f64,
        largest: String,
    },

    /// Internal invariant violation while assembling the network
    #[error("Inconsistent topology: {0}")]
    InconsistentTopology(String),
}

fn scope_suffix(scope: &Option<String>) -> String {
    scope
        .as_ref()
        .map(|s| format!(" in scope '{s}'"))
        .unwrap_or_default()
}

fn largest_text(largest: &Option<f64>) -> String {
    largest
        .map(|l| format!("{l:.3}"))
        .unwrap_or_else(|| "none".to_string())
}

/// Convenience type alias for Results using FeederError.
pub type FeederResult<T> = Result<T, FeederError>;

impl FeederError {
    /// Short machine-friendly name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FeederError::InvalidConfiguration(_) => "invalid_configuration",
            FeederError::InvalidClusterCount { .. } => "invalid_cluster_count",
            FeederError::UnreachableTerminal { .. } => "unreachable_terminal",
            FeederError::NegativeDiversityFactor { .. } => "negative_diversity_factor",
            FeederError::CapacityExceedsCatalog { .. } => "capacity_exceeds_catalog",
            FeederError::NoConductorSatisfiesConstraint { .. } => {
                "no_conductor_satisfies_constraint"
            }
            FeederError::InconsistentTopology(_) => "inconsistent_topology",
        }
    }
}

// Conversion from string-like types for convenience
impl From<String> for FeederError {
    fn from(s: String) -> Self {
        FeederError::InvalidConfiguration(s)
    }
}

impl From<&str> for FeederError {
    fn from(s: &str) -> Self {
        FeederError::InvalidConfiguration(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FeederError::InvalidConfiguration("negative kV".into());
        assert!(err.to_string().contains("Invalid configuration"));
        assert!(err.to_string().contains("negative kV"));
    }

    #[test]
    fn test_catalog_error_mentions_scope_and_largest() {
        let err = FeederError::CapacityExceedsCatalog {
            required: 80.0,
            largest: Some(75.0),
            scope: Some("pole-mount".into()),
        };
        let text = err.to_string();
        assert!(text.contains("pole-mount"));
        assert!(text.contains("75.000"));
        assert_eq!(err.kind(), "capacity_exceeds_catalog");
    }

    #[test]
    fn test_catalog_error_without_entries() {
        let err = FeederError::CapacityExceedsCatalog {
            required: 1.0,
            largest: None,
            scope: None,
        };
        assert!(err.to_string().contains("none"));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> FeederResult<()> {
            Err(FeederError::InconsistentTopology("two roots".into()))
        }

        fn outer() -> FeederResult<()> {
            inner()?;
            Ok(())
        }

        assert!(matches!(outer(), Err(FeederError::InconsistentTopology(_))));
    }

    #[test]
    fn test_from_str() {
        let err: FeederError = "bad".into();
        assert!(matches!(err, FeederError::InvalidConfiguration(_)));
    }
}
