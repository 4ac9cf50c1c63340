//! Conductor selection under a voltage-drop budget.
//!
//! The allowed drop is spread over the most heavily loaded root-to-leaf path:
//!
//! ```text
//! k = allowed_drop_pct / longest_path_kva_meters        (% per kVA·m)
//! ```
//!
//! A span of length `L` carrying `S` kVA may then drop at most `k·L·S` percent,
//! which keeps the cumulative drop along every path within the allowance.
//! For each span the smallest conductor that carries the current is tried
//! first and escalated through the catalog until its drop fits:
//!
//! ```text
//! ΔV% = m · I · L · (R cosφ + X sinφ) / V × 100
//! X   = 2πf · 2·10⁻⁴ · ln(GMD / GMR)               (Ω/km)
//! ```
//!
//! with `m = √3, V = V_LL` for two- and three-phase spans and `m = 2,
//! V = V_LN` for single-phase spans.

use feedgen_core::{
    Amperes, FeederError, FeederResult, KilovoltAmperes, Kilovolts, LineConfiguration, Meters,
    NumPhase,
};
use serde::Serialize;
use std::f64::consts::PI;
use tracing::debug;

use crate::catalog::{Catalog, ConductorEntry, Rated};
use crate::topology::TopologyLayer;

/// Electrical context shared by every span of one voltage level.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingParameters {
    pub allowed_drop_pct: f64,
    /// Nominal line-to-line voltage
    pub kv: Kilovolts,
    pub frequency_hz: f64,
    pub power_factor: f64,
    pub configuration: LineConfiguration,
    /// Conductor catalog scope, `None` for the whole catalog
    pub scope: Option<String>,
}

impl SizingParameters {
    pub fn validate(&self) -> FeederResult<()> {
        if !(self.allowed_drop_pct > 0.0 && self.allowed_drop_pct < 100.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "allowed voltage drop {}% outside (0, 100)",
                self.allowed_drop_pct
            )));
        }
        if !(self.kv.value() > 0.0) || !self.kv.is_finite() {
            return Err(FeederError::InvalidConfiguration(format!(
                "nominal voltage {} must be positive",
                self.kv
            )));
        }
        if !(self.frequency_hz > 0.0) || !self.frequency_hz.is_finite() {
            return Err(FeederError::InvalidConfiguration(format!(
                "frequency {} Hz must be positive",
                self.frequency_hz
            )));
        }
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "power factor {} outside (0, 1]",
                self.power_factor
            )));
        }
        self.configuration.validate()
    }
}

/// What a span has to carry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanLoading {
    pub length: Meters,
    pub downstream_kva: KilovoltAmperes,
    pub num_phase: NumPhase,
}

/// The sized conductor for one span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConductorChoice {
    pub conductor: String,
    pub neutral: Option<String>,
    pub rated_ampacity: Amperes,
    pub required_ampacity: Amperes,
    pub voltage_drop_pct: f64,
    /// Drop this span was allowed (`k·L·S`)
    pub budget_pct: f64,
}

/// Series reactance of an overhead line in Ω/km.
pub fn reactance_ohm_per_km(frequency_hz: f64, gmd_m: f64, gmr_m: f64) -> f64 {
    2.0 * PI * frequency_hz * 2e-4 * (gmd_m / gmr_m).ln()
}

/// Line current for `kva` at nominal line-to-line `kv`.
pub fn line_current(kva: KilovoltAmperes, kv: Kilovolts, num_phase: NumPhase) -> Amperes {
    match num_phase {
        NumPhase::Single => kva.single_phase_current(kv),
        NumPhase::Two | NumPhase::Three => kva.three_phase_current(kv),
    }
}

/// Percent voltage drop of `conductor` carrying `loading`.
pub fn voltage_drop_pct(
    conductor: &ConductorEntry,
    loading: &SpanLoading,
    params: &SizingParameters,
) -> f64 {
    let current = line_current(loading.downstream_kva, params.kv, loading.num_phase).value();
    if current == 0.0 || loading.length.value() == 0.0 {
        return 0.0;
    }
    let gmd = params.configuration.geometric_mean_distance(loading.num_phase);
    let x = reactance_ohm_per_km(params.frequency_hz, gmd, conductor.gmr_m);
    let cos = params.power_factor;
    let sin = (1.0 - cos * cos).max(0.0).sqrt();
    let (multiplier, volts) = match loading.num_phase {
        NumPhase::Single => (2.0, params.kv.line_to_neutral().volts()),
        NumPhase::Two | NumPhase::Three => (3f64.sqrt(), params.kv.volts()),
    };
    multiplier * current * loading.length.kilometers() * (conductor.resistance_ohm_per_km * cos + x * sin)
        / volts
        * 100.0
}

pub struct VoltageDropSizer<'a> {
    catalog: &'a Catalog<ConductorEntry>,
    params: SizingParameters,
    budget_per_kva_m: f64,
}

impl<'a> VoltageDropSizer<'a> {
    /// `longest_path_kva_meters` is the heaviest root-to-leaf Σ(L·S) of the
    /// level being sized.
    pub fn new(
        catalog: &'a Catalog<ConductorEntry>,
        params: SizingParameters,
        longest_path_kva_meters: f64,
    ) -> FeederResult<Self> {
        params.validate()?;
        if !longest_path_kva_meters.is_finite() || longest_path_kva_meters < 0.0 {
            return Err(FeederError::InvalidConfiguration(format!(
                "longest path loading {longest_path_kva_meters} kVA·m must be finite and non-negative"
            )));
        }
        let budget_per_kva_m = if longest_path_kva_meters > 0.0 {
            params.allowed_drop_pct / longest_path_kva_meters
        } else {
            f64::INFINITY
        };
        Ok(Self {
            catalog,
            params,
            budget_per_kva_m,
        })
    }

    /// Allowed drop per kVA·m.
    pub fn budget_per_kva_m(&self) -> f64 {
        self.budget_per_kva_m
    }

    pub fn params(&self) -> &SizingParameters {
        &self.params
    }

    pub fn size(&self, loading: &SpanLoading) -> FeederResult<ConductorChoice> {
        let scope = self.params.scope.as_deref();
        let required = line_current(loading.downstream_kva, self.params.kv, loading.num_phase);
        let kva_m = loading.length.value() * loading.downstream_kva.value();
        let budget = if kva_m > 0.0 {
            self.budget_per_kva_m * kva_m
        } else {
            0.0
        };

        let mut candidate = self.catalog.select(required.value(), scope)?;
        loop {
            let drop = voltage_drop_pct(candidate, loading, &self.params);
            if drop <= budget * (1.0 + 1e-12) {
                let neutral = self.neutral_for(candidate, loading.num_phase)?;
                return Ok(ConductorChoice {
                    conductor: candidate.name.clone(),
                    neutral,
                    rated_ampacity: Amperes(candidate.ampacity_a),
                    required_ampacity: required,
                    voltage_drop_pct: drop,
                    budget_pct: budget,
                });
            }
            match self.catalog.next_after(candidate, scope) {
                Some(next) => {
                    debug!(
                        from = %candidate.name,
                        to = %next.name,
                        drop,
                        budget,
                        "escalating conductor"
                    );
                    candidate = next;
                }
                None => {
                    return Err(FeederError::NoConductorSatisfiesConstraint {
                        required_ampacity: required.value(),
                        budget_pct_per_kva_m: self.budget_per_kva_m,
                        achieved_pct_per_kva_m: drop / kva_m,
                        largest: candidate.name(),
                    })
                }
            }
        }
    }

    /// Size every span of `layer`, in span order.
    pub fn size_layer(
        &self,
        layer: &TopologyLayer,
        num_phase: NumPhase,
    ) -> FeederResult<Vec<ConductorChoice>> {
        layer
            .spans
            .iter()
            .map(|span| {
                self.size(&SpanLoading {
                    length: span.length,
                    downstream_kva: span.downstream_kva,
                    num_phase,
                })
            })
            .collect()
    }

    fn neutral_for(
        &self,
        phase_conductor: &ConductorEntry,
        num_phase: NumPhase,
    ) -> FeederResult<Option<String>> {
        if !self.params.configuration.has_neutral() {
            return Ok(None);
        }
        if num_phase == NumPhase::Single {
            return Ok(Some(phase_conductor.name.clone()));
        }
        let neutral = self
            .catalog
            .select(phase_conductor.ampacity_a / 3.0, self.params.scope.as_deref())?;
        Ok(Some(neutral.name.clone()))
    }
}
