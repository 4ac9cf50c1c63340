//! Synthesis configuration.
//!
//! Every section has serde defaults, so an empty document is a valid
//! configuration for an 11 kV / 415 V three-phase network.

use feedgen_core::{
    DesignFactors, FeederError, FeederResult, Kilovolts, Kilowatts, LineConfiguration,
    NumPhase, Phase, ProjectionKind, TransformerClass, TransformerConnection,
};
use serde::{Deserialize, Serialize};

use crate::capacity::DiversityModel;
use crate::cluster::{ClusterCount, KMeansOptions};
use crate::graph::ReduceOptions;
use crate::loads::{
    ConstantConsumption, ConsumptionModel, FixedPhaseAllocator, LoadRecord,
    PhaseAllocator, PiecewiseLinearConsumption, ProportionalConsumption, RandomPhaseAllocator,
};
use crate::voltage_drop::SizingParameters;

/// Pole spacing limits in meters.
pub const POLE_SPAN_RANGE: (f64, f64) = (10.0, 1000.0);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    #[serde(default)]
    pub design: DesignFactors,
    #[serde(default)]
    pub clustering: ClusteringConfig,
    #[serde(default)]
    pub diversity: DiversityModel,
    #[serde(default)]
    pub projection: ProjectionKind,
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    #[serde(default = "default_max_pole_span")]
    pub max_pole_span_m: f64,
    #[serde(default)]
    pub loads: LoadsConfig,
    #[serde(default)]
    pub transformer: TransformerConfig,
    #[serde(default)]
    pub primary: PrimaryConfig,
    #[serde(default)]
    pub secondary: SecondaryConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substation_transformer: Option<TransformerConfig>,
}

fn default_frequency() -> f64 {
    50.0
}

fn default_max_pole_span() -> f64 {
    100.0
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            design: DesignFactors::default(),
            clustering: ClusteringConfig::default(),
            diversity: DiversityModel::default(),
            projection: ProjectionKind::default(),
            frequency_hz: default_frequency(),
            max_pole_span_m: default_max_pole_span(),
            loads: LoadsConfig::default(),
            transformer: TransformerConfig::default(),
            primary: PrimaryConfig::default(),
            secondary: SecondaryConfig::default(),
            substation_transformer: None,
        }
    }
}

impl SynthesisConfig {
    /// Check every section and the consistency between voltage levels.
    pub fn validate(&self) -> FeederResult<()> {
        self.design.validate()?;
        self.diversity.validate()?;
        self.clustering.validate()?;
        self.loads.validate()?;

        if self.frequency_hz != 50.0 && self.frequency_hz != 60.0 {
            return Err(invalid(format!(
                "frequency {} Hz must be 50 or 60",
                self.frequency_hz
            )));
        }
        let (min_span, max_span) = POLE_SPAN_RANGE;
        if !(self.max_pole_span_m >= min_span && self.max_pole_span_m <= max_span) {
            return Err(invalid(format!(
                "max pole span {} m outside [{min_span}, {max_span}]",
                self.max_pole_span_m
            )));
        }

        self.transformer.class().validate()?;
        self.primary_sizing().validate()?;
        self.secondary_sizing().validate()?;
        check_phase(self.primary.phase, self.primary.num_phase, "primary")?;
        check_phase(self.secondary.phase, self.secondary.num_phase, "secondary")?;

        if !same_kv(self.transformer.ht_kv, self.primary.kv) {
            return Err(invalid(format!(
                "transformer HT voltage {} does not match primary voltage {}",
                self.transformer.ht_kv, self.primary.kv
            )));
        }
        if !same_kv(self.transformer.lt_kv, self.secondary.kv) {
            return Err(invalid(format!(
                "transformer LT voltage {} does not match secondary voltage {}",
                self.transformer.lt_kv, self.secondary.kv
            )));
        }
        if let Some(substation) = &self.substation_transformer {
            substation.class().validate()?;
            if !same_kv(substation.lt_kv, self.primary.kv) {
                return Err(invalid(format!(
                    "substation LT voltage {} does not match primary voltage {}",
                    substation.lt_kv, self.primary.kv
                )));
            }
        }
        Ok(())
    }

    pub fn primary_sizing(&self) -> SizingParameters {
        SizingParameters {
            allowed_drop_pct: self
                .primary
                .allowed_drop_pct
                .unwrap_or(self.design.allowed_voltage_drop_pct),
            kv: self.primary.kv,
            frequency_hz: self.frequency_hz,
            power_factor: self.design.power_factor,
            configuration: self.primary.configuration,
            scope: self.primary.conductor_scope.clone(),
        }
    }

    pub fn secondary_sizing(&self) -> SizingParameters {
        SizingParameters {
            allowed_drop_pct: self
                .secondary
                .allowed_drop_pct
                .unwrap_or(self.design.allowed_voltage_drop_pct),
            kv: self.secondary.kv,
            frequency_hz: self.frequency_hz,
            power_factor: self.design.power_factor,
            configuration: self.secondary.configuration,
            scope: self.secondary.conductor_scope.clone(),
        }
    }
}

fn invalid(message: String) -> FeederError {
    FeederError::InvalidConfiguration(message)
}

fn same_kv(a: Kilovolts, b: Kilovolts) -> bool {
    (a.value() - b.value()).abs() <= 1e-6
}

fn check_phase(phase: Phase, num_phase: NumPhase, level: &str) -> FeederResult<()> {
    if phase.num_phase() != num_phase {
        return Err(invalid(format!(
            "{level} phase {phase} does not carry {} phases",
            num_phase.count()
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default)]
    pub count: ClusterCount,
    #[serde(flatten)]
    pub kmeans: KMeansOptions,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            count: ClusterCount::default(),
            kmeans: KMeansOptions::default(),
        }
    }
}

impl ClusteringConfig {
    pub fn validate(&self) -> FeederResult<()> {
        match self.count {
            ClusterCount::Fixed(0) => return Err(invalid("cluster count must be positive".into())),
            ClusterCount::CustomersPerTransformer(0) => {
                return Err(invalid("customers per transformer must be positive".into()))
            }
            ClusterCount::Optimal { max_clusters } if max_clusters < 2 => {
                return Err(invalid(format!(
                    "optimal clustering needs max_clusters >= 2, got {max_clusters}"
                )))
            }
            _ => {}
        }
        if self.kmeans.max_iterations == 0 {
            return Err(invalid("k-means needs at least one iteration".into()));
        }
        if !(self.kmeans.tolerance >= 0.0) {
            return Err(invalid(format!(
                "k-means tolerance {} must be non-negative",
                self.kmeans.tolerance
            )));
        }
        Ok(())
    }
}

/// Voltage class and catalog scope of a transformer level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerConfig {
    #[serde(default = "default_primary_kv")]
    pub ht_kv: Kilovolts,
    #[serde(default = "default_secondary_kv")]
    pub lt_kv: Kilovolts,
    #[serde(default = "default_ht_connection")]
    pub ht_connection: TransformerConnection,
    #[serde(default = "default_lt_connection")]
    pub lt_connection: TransformerConnection,
    #[serde(default = "default_primary_phase")]
    pub ht_phase: Phase,
    #[serde(default = "default_secondary_phase")]
    pub lt_phase: Phase,
    #[serde(default = "default_num_phase")]
    pub num_phase: NumPhase,
    /// Catalog scope tag
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_primary_kv() -> Kilovolts {
    Kilovolts(11.0)
}

fn default_secondary_kv() -> Kilovolts {
    Kilovolts(0.415)
}

fn default_ht_connection() -> TransformerConnection {
    TransformerConnection::Delta
}

fn default_lt_connection() -> TransformerConnection {
    TransformerConnection::Wye
}

fn default_primary_phase() -> Phase {
    Phase::ABC
}

fn default_secondary_phase() -> Phase {
    Phase::ABCN
}

fn default_num_phase() -> NumPhase {
    NumPhase::Three
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            ht_kv: default_primary_kv(),
            lt_kv: default_secondary_kv(),
            ht_connection: default_ht_connection(),
            lt_connection: default_lt_connection(),
            ht_phase: default_primary_phase(),
            lt_phase: default_secondary_phase(),
            num_phase: default_num_phase(),
            scope: None,
        }
    }
}

impl TransformerConfig {
    pub fn class(&self) -> TransformerClass {
        TransformerClass {
            ht_kv: self.ht_kv,
            lt_kv: self.lt_kv,
            ht_connection: self.ht_connection,
            lt_connection: self.lt_connection,
            ht_phase: self.ht_phase,
            lt_phase: self.lt_phase,
            num_phase: self.num_phase,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryConfig {
    #[serde(default = "default_primary_kv")]
    pub kv: Kilovolts,
    #[serde(default = "default_num_phase")]
    pub num_phase: NumPhase,
    #[serde(default = "default_primary_phase")]
    pub phase: Phase,
    #[serde(default)]
    pub configuration: LineConfiguration,
    #[serde(default)]
    pub conductor_scope: Option<String>,
    /// Falls back to `design.allowed_voltage_drop_pct`
    #[serde(default = "default_primary_drop")]
    pub allowed_drop_pct: Option<f64>,
    /// Unloaded dead-end roads are pruned unless turned off here
    #[serde(default = "default_primary_reduce")]
    pub reduce: ReduceOptions,
    /// Split road edges longer than `max_pole_span_m` into pole spans
    #[serde(default = "default_split_spans")]
    pub split_spans: bool,
}

fn default_primary_drop() -> Option<f64> {
    Some(2.0)
}

fn default_primary_reduce() -> ReduceOptions {
    ReduceOptions {
        prune_dead_ends: true,
        ..ReduceOptions::default()
    }
}

fn default_split_spans() -> bool {
    true
}

impl Default for PrimaryConfig {
    fn default() -> Self {
        Self {
            kv: default_primary_kv(),
            num_phase: default_num_phase(),
            phase: default_primary_phase(),
            configuration: LineConfiguration::default(),
            conductor_scope: None,
            allowed_drop_pct: default_primary_drop(),
            reduce: default_primary_reduce(),
            split_spans: default_split_spans(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryConfig {
    #[serde(default = "default_secondary_kv")]
    pub kv: Kilovolts,
    #[serde(default = "default_num_phase")]
    pub num_phase: NumPhase,
    #[serde(default = "default_secondary_phase")]
    pub phase: Phase,
    #[serde(default = "default_secondary_configuration")]
    pub configuration: LineConfiguration,
    #[serde(default)]
    pub conductor_scope: Option<String>,
    /// Falls back to `design.allowed_voltage_drop_pct`
    #[serde(default = "default_secondary_drop")]
    pub allowed_drop_pct: Option<f64>,
}

fn default_secondary_configuration() -> LineConfiguration {
    LineConfiguration::ThreePhaseNeutral {
        spacing_m: 0.4,
        height_m: 9.0,
        neutral_height_m: 8.0,
    }
}

fn default_secondary_drop() -> Option<f64> {
    Some(5.0)
}

impl Default for SecondaryConfig {
    fn default() -> Self {
        Self {
            kv: default_secondary_kv(),
            num_phase: default_num_phase(),
            phase: default_secondary_phase(),
            configuration: default_secondary_configuration(),
            conductor_scope: None,
            allowed_drop_pct: default_secondary_drop(),
        }
    }
}

/// How building records become loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadsConfig {
    #[serde(default)]
    pub phases: PhaseAllocation,
    #[serde(default)]
    pub consumption: ConsumptionSpec,
    #[serde(default = "default_load_power_factor")]
    pub power_factor: f64,
}

fn default_load_power_factor() -> f64 {
    0.9
}

impl Default for LoadsConfig {
    fn default() -> Self {
        Self {
            phases: PhaseAllocation::default(),
            consumption: ConsumptionSpec::default(),
            power_factor: default_load_power_factor(),
        }
    }
}

impl LoadsConfig {
    pub fn validate(&self) -> FeederResult<()> {
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(invalid(format!(
                "load power factor {} outside (0, 1]",
                self.power_factor
            )));
        }
        if let PhaseAllocation::Random(allocator) = &self.phases {
            allocator.validate()?;
        }
        match &self.consumption {
            ConsumptionSpec::Constant { kw } if !(*kw >= 0.0) => {
                Err(invalid(format!("constant demand {kw} kW must be non-negative")))
            }
            ConsumptionSpec::Proportional {
                min_kw,
                max_kw,
                min_area: Some(min_area),
                max_area: Some(max_area),
            } => ProportionalConsumption::new(*min_kw, *max_kw, *min_area, *max_area).map(|_| ()),
            ConsumptionSpec::Proportional { min_kw, max_kw, .. }
                if !(*min_kw >= 0.0 && min_kw < max_kw) =>
            {
                Err(invalid(format!(
                    "demand range [{min_kw}, {max_kw}] kW must be non-negative and increasing"
                )))
            }
            ConsumptionSpec::PiecewiseLinear { curve } => {
                PiecewiseLinearConsumption::new(curve.clone()).map(|_| ())
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PhaseAllocation {
    Fixed { phase: Phase },
    Random(RandomPhaseAllocator),
}

impl Default for PhaseAllocation {
    fn default() -> Self {
        PhaseAllocation::Fixed { phase: Phase::ABCN }
    }
}

impl PhaseAllocator for PhaseAllocation {
    fn allocate(&self, records: &[LoadRecord]) -> FeederResult<Vec<Phase>> {
        match self {
            PhaseAllocation::Fixed { phase } => FixedPhaseAllocator(*phase).allocate(records),
            PhaseAllocation::Random(allocator) => allocator.allocate(records),
        }
    }
}

/// Area to demand model, as written in configuration files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsumptionSpec {
    Constant {
        kw: f64,
    },
    /// Area bounds default to the smallest and largest record
    Proportional {
        min_kw: f64,
        max_kw: f64,
        #[serde(default)]
        min_area: Option<f64>,
        #[serde(default)]
        max_area: Option<f64>,
    },
    PiecewiseLinear {
        curve: Vec<(f64, f64)>,
    },
}

impl Default for ConsumptionSpec {
    fn default() -> Self {
        ConsumptionSpec::Proportional {
            min_kw: 2.0,
            max_kw: 10.0,
            min_area: None,
            max_area: None,
        }
    }
}

impl ConsumptionSpec {
    /// Build the model, fitting missing area bounds to `records`.
    pub fn resolve(&self, records: &[LoadRecord]) -> FeederResult<Consumption> {
        match self {
            ConsumptionSpec::Constant { kw } => {
                Ok(Consumption::Constant(ConstantConsumption(Kilowatts(*kw))))
            }
            ConsumptionSpec::Proportional {
                min_kw,
                max_kw,
                min_area,
                max_area,
            } => {
                let fitted = ProportionalConsumption::fitted(*min_kw, *max_kw, records)?;
                let model = ProportionalConsumption::new(
                    *min_kw,
                    *max_kw,
                    min_area.unwrap_or(fitted.min_area),
                    max_area.unwrap_or(fitted.max_area),
                )?;
                Ok(Consumption::Proportional(model))
            }
            ConsumptionSpec::PiecewiseLinear { curve } => Ok(Consumption::PiecewiseLinear(
                PiecewiseLinearConsumption::new(curve.clone())?,
            )),
        }
    }
}

/// A resolved [`ConsumptionSpec`].
#[derive(Debug, Clone, PartialEq)]
pub enum Consumption {
    Constant(ConstantConsumption),
    Proportional(ProportionalConsumption),
    PiecewiseLinear(PiecewiseLinearConsumption),
}

impl ConsumptionModel for Consumption {
    fn kw(&self, area: f64) -> Kilowatts {
        match self {
            Consumption::Constant(m) => m.kw(area),
            Consumption::Proportional(m) => m.kw(area),
            Consumption::PiecewiseLinear(m) => m.kw(area),
        }
    }
}
