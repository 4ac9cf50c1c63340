//! Turning located building records into [`LoadNode`]s.
//!
//! [`LoadFactory`] composes four small strategies:
//!
//! - [`PhaseAllocator`]: phase designation of every load
//! - [`VoltageSetter`]: nominal kV from the phase count
//! - [`ConnectionSetter`]: wye or delta from the phase count
//! - [`ConsumptionModel`]: peak kW from building area
//!
//! Every strategy is a trait with a blanket impl for matching closures, so
//! one-off rules need no new type.

use feedgen_core::{
    FeederError, FeederResult, GeoPoint, Kilovolts, Kilowatts, LoadConnection, LoadId, LoadNode,
    NumPhase, Phase,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// A located customer as delivered by a geometry provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRecord {
    pub id: String,
    pub location: GeoPoint,
    /// Building footprint (m²)
    pub area: f64,
}

pub trait PhaseAllocator {
    /// One phase per record, in record order.
    fn allocate(&self, records: &[LoadRecord]) -> FeederResult<Vec<Phase>>;
}

impl<F> PhaseAllocator for F
where
    F: Fn(&[LoadRecord]) -> FeederResult<Vec<Phase>>,
{
    fn allocate(&self, records: &[LoadRecord]) -> FeederResult<Vec<Phase>> {
        self(records)
    }
}

pub trait VoltageSetter {
    fn kv(&self, num_phase: NumPhase) -> Kilovolts;
}

impl<F> VoltageSetter for F
where
    F: Fn(NumPhase) -> Kilovolts,
{
    fn kv(&self, num_phase: NumPhase) -> Kilovolts {
        self(num_phase)
    }
}

pub trait ConnectionSetter {
    fn connection(&self, num_phase: NumPhase) -> LoadConnection;
}

impl<F> ConnectionSetter for F
where
    F: Fn(NumPhase) -> LoadConnection,
{
    fn connection(&self, num_phase: NumPhase) -> LoadConnection {
        self(num_phase)
    }
}

pub trait ConsumptionModel {
    fn kw(&self, area: f64) -> Kilowatts;
}

impl<F> ConsumptionModel for F
where
    F: Fn(f64) -> Kilowatts,
{
    fn kw(&self, area: f64) -> Kilowatts {
        self(area)
    }
}

/// Shuffles loads with a seeded RNG and gives the first share three phases,
/// the next share two phases and the rest a single phase. Single- and
/// two-phase loads pick their conductors at random.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomPhaseAllocator {
    pub pct_single: f64,
    pub pct_two: f64,
    pub pct_three: f64,
    #[serde(default)]
    pub seed: u64,
}

impl RandomPhaseAllocator {
    pub fn new(pct_single: f64, pct_two: f64, pct_three: f64, seed: u64) -> FeederResult<Self> {
        let allocator = Self {
            pct_single,
            pct_two,
            pct_three,
            seed,
        };
        allocator.validate()?;
        Ok(allocator)
    }

    pub fn validate(&self) -> FeederResult<()> {
        let shares = [self.pct_single, self.pct_two, self.pct_three];
        if shares.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "phase shares {shares:?} must be non-negative"
            )));
        }
        let total: f64 = shares.iter().sum();
        if (total - 100.0).abs() > 1e-6 {
            return Err(FeederError::InvalidConfiguration(format!(
                "phase shares sum to {total}%, expected 100%"
            )));
        }
        Ok(())
    }
}

impl PhaseAllocator for RandomPhaseAllocator {
    fn allocate(&self, records: &[LoadRecord]) -> FeederResult<Vec<Phase>> {
        self.validate()?;
        let n = records.len();
        let mut order: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(self.seed);
        order.shuffle(&mut rng);

        let three = (n as f64 * self.pct_three / 100.0).floor() as usize;
        let two = ((n as f64 * self.pct_two / 100.0).floor() as usize).min(n - three);
        let mut phases = vec![Phase::AN; n];
        for (rank, &index) in order.iter().enumerate() {
            phases[index] = if rank < three {
                Phase::ABCN
            } else if rank < three + two {
                *[Phase::AB, Phase::BC, Phase::CA]
                    .choose(&mut rng)
                    .unwrap_or(&Phase::AB)
            } else {
                *[Phase::AN, Phase::BN, Phase::CN]
                    .choose(&mut rng)
                    .unwrap_or(&Phase::AN)
            };
        }
        Ok(phases)
    }
}

/// Every load gets the same phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FixedPhaseAllocator(pub Phase);

impl PhaseAllocator for FixedPhaseAllocator {
    fn allocate(&self, records: &[LoadRecord]) -> FeederResult<Vec<Phase>> {
        Ok(vec![self.0; records.len()])
    }
}

/// Single-phase loads get the phase voltage (rounded to 1 V), everything else
/// the line-to-line voltage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleVoltageSetter {
    line_to_line: Kilovolts,
}

impl SimpleVoltageSetter {
    pub fn new(line_to_line: Kilovolts) -> FeederResult<Self> {
        if !(line_to_line.value() > 0.0) || !line_to_line.is_finite() {
            return Err(FeederError::InvalidConfiguration(format!(
                "load voltage {line_to_line} must be positive"
            )));
        }
        Ok(Self { line_to_line })
    }
}

impl VoltageSetter for SimpleVoltageSetter {
    fn kv(&self, num_phase: NumPhase) -> Kilovolts {
        match num_phase {
            NumPhase::Single => {
                Kilovolts((self.line_to_line.line_to_neutral().value() * 1000.0).round() / 1000.0)
            }
            NumPhase::Two | NumPhase::Three => self.line_to_line,
        }
    }
}

/// Two-phase loads are delta connected, all others wye.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DefaultConnectionSetter;

impl ConnectionSetter for DefaultConnectionSetter {
    fn connection(&self, num_phase: NumPhase) -> LoadConnection {
        match num_phase {
            NumPhase::Two => LoadConnection::Delta,
            NumPhase::Single | NumPhase::Three => LoadConnection::Wye,
        }
    }
}

/// Piecewise linear area → kW curve, extended linearly past both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct PiecewiseLinearConsumption {
    curve: Vec<(f64, f64)>,
}

impl PiecewiseLinearConsumption {
    pub fn new(curve: Vec<(f64, f64)>) -> FeederResult<Self> {
        if curve.len() < 2 {
            return Err(FeederError::InvalidConfiguration(
                "consumption curve needs at least two points".to_string(),
            ));
        }
        if curve.iter().any(|(x, y)| !x.is_finite() || !y.is_finite()) {
            return Err(FeederError::InvalidConfiguration(
                "consumption curve has non-finite points".to_string(),
            ));
        }
        if curve.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(FeederError::InvalidConfiguration(
                "consumption curve areas must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { curve })
    }
}

impl ConsumptionModel for PiecewiseLinearConsumption {
    fn kw(&self, area: f64) -> Kilowatts {
        let below = self.curve.iter().filter(|(x, _)| *x <= area).count();
        let upper = below.clamp(1, self.curve.len() - 1);
        let (x0, y0) = self.curve[upper - 1];
        let (x1, y1) = self.curve[upper];
        Kilowatts(y0 + (y1 - y0) * (area - x0) / (x1 - x0))
    }
}

/// Linear between `(min_area, min_kw)` and `(max_area, max_kw)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProportionalConsumption {
    pub min_kw: f64,
    pub max_kw: f64,
    pub min_area: f64,
    pub max_area: f64,
}

impl ProportionalConsumption {
    pub fn new(min_kw: f64, max_kw: f64, min_area: f64, max_area: f64) -> FeederResult<Self> {
        let model = Self {
            min_kw,
            max_kw,
            min_area,
            max_area,
        };
        model.validate()?;
        Ok(model)
    }

    /// Scale between the smallest and largest area of `records`.
    pub fn fitted(min_kw: f64, max_kw: f64, records: &[LoadRecord]) -> FeederResult<Self> {
        let min_area = records.iter().map(|r| r.area).fold(f64::INFINITY, f64::min);
        let max_area = records.iter().map(|r| r.area).fold(f64::NEG_INFINITY, f64::max);
        if records.is_empty() {
            return Self::new(min_kw, max_kw, 0.0, 0.0);
        }
        Self::new(min_kw, max_kw, min_area, max_area)
    }

    pub fn validate(&self) -> FeederResult<()> {
        if !(self.min_kw < self.max_kw) {
            return Err(FeederError::InvalidConfiguration(format!(
                "minimum kW {} must be below maximum kW {}",
                self.min_kw, self.max_kw
            )));
        }
        if self.max_area < self.min_area {
            return Err(FeederError::InvalidConfiguration(format!(
                "maximum area {} is below minimum area {}",
                self.max_area, self.min_area
            )));
        }
        Ok(())
    }
}

impl ConsumptionModel for ProportionalConsumption {
    fn kw(&self, area: f64) -> Kilowatts {
        let span = self.max_area - self.min_area;
        if span <= 0.0 {
            return Kilowatts(self.min_kw);
        }
        Kilowatts(self.min_kw + (self.max_kw - self.min_kw) * (area - self.min_area) / span)
    }
}

/// Same demand for every building.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConstantConsumption(pub Kilowatts);

impl ConsumptionModel for ConstantConsumption {
    fn kw(&self, _area: f64) -> Kilowatts {
        self.0
    }
}

/// Builds [`LoadNode`]s from records with the configured strategies.
pub struct LoadFactory<P, V, C, M> {
    phases: P,
    voltage: V,
    connection: C,
    consumption: M,
    power_factor: f64,
}

impl<P, V, C, M> LoadFactory<P, V, C, M>
where
    P: PhaseAllocator,
    V: VoltageSetter,
    C: ConnectionSetter,
    M: ConsumptionModel,
{
    pub fn new(
        phases: P,
        voltage: V,
        connection: C,
        consumption: M,
        power_factor: f64,
    ) -> FeederResult<Self> {
        if !(power_factor > 0.0 && power_factor <= 1.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "load power factor {power_factor} outside (0, 1]"
            )));
        }
        Ok(Self {
            phases,
            voltage,
            connection,
            consumption,
            power_factor,
        })
    }

    /// Build one load per record; ids follow record order.
    pub fn build(&self, records: &[LoadRecord]) -> FeederResult<Vec<LoadNode>> {
        let phases = self.phases.allocate(records)?;
        if phases.len() != records.len() {
            return Err(FeederError::InvalidConfiguration(format!(
                "phase allocator returned {} phases for {} loads",
                phases.len(),
                records.len()
            )));
        }

        let mut loads = Vec::with_capacity(records.len());
        for (index, (record, phase)) in records.iter().zip(phases).enumerate() {
            if !record.area.is_finite() || record.area < 0.0 {
                return Err(FeederError::InvalidConfiguration(format!(
                    "load '{}' has invalid area {}",
                    record.id, record.area
                )));
            }
            let kw = self.consumption.kw(record.area);
            if !kw.is_finite() || kw.value() < 0.0 {
                return Err(FeederError::InvalidConfiguration(format!(
                    "load '{}' has invalid demand {kw}",
                    record.id
                )));
            }
            if kw.value() == 0.0 {
                warn!(load = %record.id, "load has zero demand");
            }
            let num_phase = phase.num_phase();
            loads.push(LoadNode {
                id: LoadId::new(index),
                name: record.id.clone(),
                location: record.location,
                area: record.area,
                phase,
                num_phase,
                connection: self.connection.connection(num_phase),
                kw,
                kv: self.voltage.kv(num_phase),
                power_factor: self.power_factor,
                vertex: None,
            });
        }
        info!(
            loads = loads.len(),
            total_kw = loads.iter().map(|l| l.kw.value()).sum::<f64>(),
            "built loads"
        );
        Ok(loads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn records(n: usize) -> Vec<LoadRecord> {
        (0..n)
            .map(|i| LoadRecord {
                id: format!("b{i}"),
                location: GeoPoint::new(0.0, i as f64 * 0.0001).unwrap(),
                area: 50.0 + i as f64 * 10.0,
            })
            .collect()
    }

    #[test]
    fn test_random_phase_shares() {
        let allocator = RandomPhaseAllocator::new(50.0, 20.0, 30.0, 7).unwrap();
        let phases = allocator.allocate(&records(10)).unwrap();
        let count = |n: NumPhase| phases.iter().filter(|p| p.num_phase() == n).count();
        assert_eq!(count(NumPhase::Three), 3);
        assert_eq!(count(NumPhase::Two), 2);
        assert_eq!(count(NumPhase::Single), 5);
        assert!(phases
            .iter()
            .filter(|p| p.num_phase() == NumPhase::Single)
            .all(|p| p.has_neutral()));

        // Same seed, same allocation
        assert_eq!(allocator.allocate(&records(10)).unwrap(), phases);
    }

    #[test]
    fn test_random_phase_rejects_bad_shares() {
        assert!(RandomPhaseAllocator::new(50.0, 20.0, 20.0, 0).is_err());
        assert!(RandomPhaseAllocator::new(-10.0, 80.0, 30.0, 0).is_err());
        assert!(RandomPhaseAllocator::new(0.0, 0.0, 100.0, 0)
            .unwrap()
            .allocate(&[])
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_simple_voltage_setter() {
        let setter = SimpleVoltageSetter::new(Kilovolts(0.415)).unwrap();
        assert_eq!(setter.kv(NumPhase::Three), Kilovolts(0.415));
        assert_eq!(setter.kv(NumPhase::Two), Kilovolts(0.415));
        assert_eq!(setter.kv(NumPhase::Single), Kilovolts(0.24));
        assert!(SimpleVoltageSetter::new(Kilovolts(0.0)).is_err());
        assert!(SimpleVoltageSetter::new(Kilovolts(-1.0)).is_err());
    }

    #[test]
    fn test_default_connection() {
        let setter = DefaultConnectionSetter;
        assert_eq!(setter.connection(NumPhase::Two), LoadConnection::Delta);
        assert_eq!(setter.connection(NumPhase::Single), LoadConnection::Wye);
        assert_eq!(setter.connection(NumPhase::Three), LoadConnection::Wye);
    }

    #[test]
    fn test_piecewise_extrapolates() {
        let model = PiecewiseLinearConsumption::new(vec![(10.0, 1.0), (20.0, 3.0), (40.0, 4.0)]).unwrap();
        assert!((model.kw(15.0).value() - 2.0).abs() < 1e-12);
        assert!((model.kw(30.0).value() - 3.5).abs() < 1e-12);
        assert!((model.kw(40.0).value() - 4.0).abs() < 1e-12);
        // Past the ends the outer segments continue
        assert!((model.kw(0.0).value() + 1.0).abs() < 1e-12);
        assert!((model.kw(60.0).value() - 5.0).abs() < 1e-12);
        assert!(PiecewiseLinearConsumption::new(vec![(1.0, 1.0)]).is_err());
        assert!(PiecewiseLinearConsumption::new(vec![(2.0, 1.0), (1.0, 2.0)]).is_err());
    }

    #[test]
    fn test_proportional_consumption() {
        let model = ProportionalConsumption::new(2.0, 10.0, 0.0, 100.0).unwrap();
        assert_eq!(model.kw(50.0), Kilowatts(6.0));
        assert!(ProportionalConsumption::new(5.0, 5.0, 0.0, 10.0).is_err());

        let flat = ProportionalConsumption::new(2.0, 10.0, 30.0, 30.0).unwrap();
        assert_eq!(flat.kw(30.0), Kilowatts(2.0));

        let fitted = ProportionalConsumption::fitted(1.0, 3.0, &records(3)).unwrap();
        assert_eq!(fitted.min_area, 50.0);
        assert_eq!(fitted.max_area, 70.0);
        assert_eq!(fitted.kw(70.0), Kilowatts(3.0));
    }

    #[test]
    fn test_factory_composes_strategies() {
        let factory = LoadFactory::new(
            FixedPhaseAllocator(Phase::BN),
            SimpleVoltageSetter::new(Kilovolts(0.415)).unwrap(),
            DefaultConnectionSetter,
            ConstantConsumption(Kilowatts(4.0)),
            0.95,
        )
        .unwrap();
        let loads = factory.build(&records(3)).unwrap();
        assert_eq!(loads.len(), 3);
        assert_eq!(loads[2].id, LoadId::new(2));
        assert_eq!(loads[2].name, "b2");
        assert_eq!(loads[0].num_phase, NumPhase::Single);
        assert_eq!(loads[0].kv, Kilovolts(0.24));
        assert_eq!(loads[0].connection, LoadConnection::Wye);
        assert_eq!(loads[0].kw, Kilowatts(4.0));
        assert!(loads.iter().all(|l| l.vertex.is_none()));
    }

    #[test]
    fn test_factory_accepts_closures() {
        let factory = LoadFactory::new(
            |records: &[LoadRecord]| Ok::<_, FeederError>(vec![Phase::AB; records.len()]),
            |_: NumPhase| Kilovolts(0.4),
            |_: NumPhase| LoadConnection::Delta,
            |area: f64| Kilowatts(area / 10.0),
            1.0,
        )
        .unwrap();
        let loads = factory.build(&records(2)).unwrap();
        assert_eq!(loads[1].kw, Kilowatts(6.0));
        assert_eq!(loads[1].num_phase, NumPhase::Two);
        assert_eq!(loads[1].connection, LoadConnection::Delta);
    }

    #[test]
    fn test_factory_rejects_negative_demand() {
        let factory = LoadFactory::new(
            FixedPhaseAllocator(Phase::ABCN),
            SimpleVoltageSetter::new(Kilovolts(0.415)).unwrap(),
            DefaultConnectionSetter,
            |_: f64| Kilowatts(-1.0),
            0.9,
        )
        .unwrap();
        assert!(factory.build(&records(1)).is_err());
        assert!(LoadFactory::new(
            FixedPhaseAllocator(Phase::ABCN),
            |_: NumPhase| Kilovolts(0.4),
            DefaultConnectionSetter,
            ConstantConsumption(Kilowatts(1.0)),
            1.5,
        )
        .is_err());
    }
}
