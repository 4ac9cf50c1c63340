//! Aggregate demand to required equipment kVA.
//!
//! Demand is grown under two scenarios, planned and actually observed growth,
//! and the larger one governs:
//!
//! ```text
//! planned  = base × (1 + r_planned/100)^y_planned
//! actual   = base × (1 + r_actual/100)^y_actual
//! required = max(planned, actual) × f(n) × adjustment / pf
//! ```
//!
//! `f(n)` is the diversity factor for `n` customers. A single customer has no
//! diversity, so `f` is only consulted for `n > 1`.

use feedgen_core::{DesignFactors, FeederError, FeederResult, KilovoltAmperes, Kilowatts};
use serde::{Deserialize, Serialize};

/// Ratio of coincident to non-coincident peak demand for `n` customers.
pub trait DiversityFactor: Send + Sync {
    fn factor(&self, customers: usize) -> f64;
}

impl<F> DiversityFactor for F
where
    F: Fn(usize) -> f64 + Send + Sync,
{
    fn factor(&self, customers: usize) -> f64 {
        self(customers)
    }
}

/// Serializable diversity curves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DiversityModel {
    /// No diversity: every customer peaks together
    Unity,
    /// `1 / (slope · ln n + intercept)`
    ReciprocalLog { slope: f64, intercept: f64 },
    /// Piecewise linear over `(customers, factor)` points, flat beyond the ends
    Table { points: Vec<(usize, f64)> },
}

impl Default for DiversityModel {
    fn default() -> Self {
        DiversityModel::ReciprocalLog {
            slope: 0.3908524,
            intercept: 1.65180707,
        }
    }
}

impl DiversityModel {
    pub fn validate(&self) -> FeederResult<()> {
        match self {
            DiversityModel::Unity => Ok(()),
            DiversityModel::ReciprocalLog { slope, intercept } => {
                if !slope.is_finite() || !intercept.is_finite() {
                    return Err(FeederError::InvalidConfiguration(
                        "diversity coefficients must be finite".to_string(),
                    ));
                }
                Ok(())
            }
            DiversityModel::Table { points } => {
                if points.is_empty() {
                    return Err(FeederError::InvalidConfiguration(
                        "diversity table is empty".to_string(),
                    ));
                }
                if points.windows(2).any(|w| w[0].0 >= w[1].0) {
                    return Err(FeederError::InvalidConfiguration(
                        "diversity table customer counts must be strictly increasing".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl DiversityFactor for DiversityModel {
    fn factor(&self, customers: usize) -> f64 {
        match self {
            DiversityModel::Unity => 1.0,
            DiversityModel::ReciprocalLog { slope, intercept } => {
                1.0 / (slope * (customers as f64).ln() + intercept)
            }
            DiversityModel::Table { points } => interpolate(points, customers as f64),
        }
    }
}

fn interpolate(points: &[(usize, f64)], x: f64) -> f64 {
    let Some(first) = points.first() else {
        return f64::NAN;
    };
    if x <= first.0 as f64 {
        return first.1;
    }
    for w in points.windows(2) {
        let (x0, y0) = (w[0].0 as f64, w[0].1);
        let (x1, y1) = (w[1].0 as f64, w[1].1);
        if x <= x1 {
            return y0 + (y1 - y0) * (x - x0) / (x1 - x0);
        }
    }
    points.last().map_or(first.1, |p| p.1)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthScenario {
    Planned,
    Actual,
}

/// Outcome of a capacity estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityEstimate {
    pub customers: usize,
    pub base: Kilowatts,
    pub planned: Kilowatts,
    pub actual: Kilowatts,
    pub governing: GrowthScenario,
    pub diversity_factor: f64,
    pub required: KilovoltAmperes,
}

/// Computes required kVA from aggregate demand.
#[derive(Debug, Clone)]
pub struct CapacityEstimator<D> {
    diversity: D,
    factors: DesignFactors,
}

impl<D: DiversityFactor> CapacityEstimator<D> {
    pub fn new(diversity: D, factors: DesignFactors) -> FeederResult<Self> {
        factors.validate()?;
        Ok(Self { diversity, factors })
    }

    pub fn factors(&self) -> &DesignFactors {
        &self.factors
    }

    /// Estimate the required kVA for `customers` sharing `base` kW of
    /// non-coincident peak demand.
    pub fn estimate(&self, customers: usize, base: Kilowatts) -> FeederResult<CapacityEstimate> {
        if !base.is_finite() || base.value() < 0.0 {
            return Err(FeederError::InvalidConfiguration(format!(
                "aggregate demand {base} must be finite and non-negative"
            )));
        }

        let diversity_factor = if customers <= 1 {
            1.0
        } else {
            let f = self.diversity.factor(customers);
            if !f.is_finite() {
                return Err(FeederError::InvalidConfiguration(format!(
                    "diversity factor for {customers} customers is not finite"
                )));
            }
            if f < 0.0 {
                return Err(FeederError::NegativeDiversityFactor {
                    customers,
                    factor: f,
                });
            }
            f
        };

        let grow = |pct: f64, years: u32| base * (1.0 + pct / 100.0).powi(years as i32);
        let planned = grow(self.factors.planned_growth_pct, self.factors.planned_years);
        let actual = grow(self.factors.actual_growth_pct, self.factors.actual_years);
        let (governing, peak) = if actual > planned {
            (GrowthScenario::Actual, actual)
        } else {
            (GrowthScenario::Planned, planned)
        };

        let required = (peak * diversity_factor * self.factors.adjustment_factor)
            .to_apparent(self.factors.power_factor);

        Ok(CapacityEstimate {
            customers,
            base,
            planned,
            actual,
            governing,
            diversity_factor,
            required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factors() -> DesignFactors {
        DesignFactors {
            adjustment_factor: 1.0,
            planned_growth_pct: 2.0,
            actual_growth_pct: 4.0,
            planned_years: 10,
            actual_years: 15,
            power_factor: 1.0,
            allowed_voltage_drop_pct: 3.0,
        }
    }

    #[test]
    fn test_actual_growth_governs() {
        let estimator = CapacityEstimator::new(DiversityModel::Unity, factors()).unwrap();
        let estimate = estimator.estimate(10, Kilowatts(100.0)).unwrap();

        assert!((estimate.planned.value() - 121.899).abs() < 1e-2);
        assert!((estimate.actual.value() - 180.094).abs() < 1e-2);
        assert_eq!(estimate.governing, GrowthScenario::Actual);
        assert!((estimate.required.value() - 180.094).abs() < 1e-2);
    }

    #[test]
    fn test_adjustment_and_power_factor() {
        let f = DesignFactors {
            adjustment_factor: 1.2,
            power_factor: 0.8,
            ..factors()
        };
        let estimator = CapacityEstimator::new(|_n: usize| 0.5, f).unwrap();
        let estimate = estimator.estimate(4, Kilowatts(100.0)).unwrap();
        let expected = 180.094 * 0.5 * 1.2 / 0.8;
        assert!((estimate.required.value() - expected).abs() < 1e-2);
    }

    #[test]
    fn test_single_customer_skips_diversity() {
        let estimator = CapacityEstimator::new(|_n: usize| -3.0, factors()).unwrap();
        let estimate = estimator.estimate(1, Kilowatts(10.0)).unwrap();
        assert_eq!(estimate.diversity_factor, 1.0);
    }

    #[test]
    fn test_negative_diversity_factor() {
        let estimator = CapacityEstimator::new(|_n: usize| -0.1, factors()).unwrap();
        assert!(matches!(
            estimator.estimate(5, Kilowatts(10.0)),
            Err(FeederError::NegativeDiversityFactor { customers: 5, .. })
        ));
    }

    #[test]
    fn test_non_finite_diversity_factor() {
        let estimator = CapacityEstimator::new(|_n: usize| f64::NAN, factors()).unwrap();
        assert!(matches!(
            estimator.estimate(5, Kilowatts(10.0)),
            Err(FeederError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_factors_rejected() {
        let bad = DesignFactors {
            power_factor: 0.0,
            ..factors()
        };
        assert!(CapacityEstimator::new(DiversityModel::Unity, bad).is_err());
    }

    #[test]
    fn test_reciprocal_log_model() {
        let model = DiversityModel::default();
        let f = model.factor(100);
        let expected = 1.0 / (0.3908524 * 100f64.ln() + 1.65180707);
        assert!((f - expected).abs() < 1e-12);
        assert!(f < 1.0);
    }

    #[test]
    fn test_table_model_interpolates() {
        let model = DiversityModel::Table {
            points: vec![(1, 1.0), (10, 0.6), (100, 0.4)],
        };
        assert!(model.validate().is_ok());
        assert_eq!(model.factor(1), 1.0);
        assert!((model.factor(55) - 0.5).abs() < 1e-12);
        assert_eq!(model.factor(1000), 0.4);

        let unsorted = DiversityModel::Table {
            points: vec![(10, 0.6), (1, 1.0)],
        };
        assert!(unsorted.validate().is_err());
    }
}
