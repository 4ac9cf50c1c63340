//! # feedgen-core: Radial Feeder Data Model
//!
//! Data structures shared by every stage of feeder synthesis: loads,
//! distribution transformers, network vertices, line sections and the
//! assembled [`FeederNetwork`].
//!
//! ## Design Philosophy
//!
//! A synthesized feeder is a **directed tree** rooted at the substation:
//! - **Vertices**: substation, road junctions, poles, transformer LV terminals, loads
//! - **Edges**: line sections (primary or secondary) and transformer branches,
//!   always oriented parent → child
//!
//! Layers are built independently and refer to each other through
//! [`VertexKey`]s. Only the final assembly maps keys to dense [`VertexId`]s,
//! so no layer holds references into another.
//!
//! ## Quick Start
//!
//! ```rust
//! use feedgen_core::*;
//!
//! let mut network = FeederNetwork::new();
//! let here = GeoPoint::new(13.09, 80.27).unwrap();
//! let there = GeoPoint::new(13.091, 80.27).unwrap();
//!
//! let root = network.add_vertex(VertexKey::Substation, here, Kilovolts(11.0));
//! let pole = network.add_vertex(VertexKey::PrimaryPole(0), there, Kilovolts(11.0));
//! network.add_edge(
//!     root,
//!     pole,
//!     Edge::Line(LineSection::unsized_span(
//!         SectionId::new(0),
//!         root,
//!         pole,
//!         LineLevel::Primary,
//!         Meters(here.haversine_m(&there)),
//!     )),
//! );
//!
//! assert_eq!(network.root(), Some(root));
//! assert_eq!(network.parent(pole), Some(root));
//! ```
//!
//! ## Modules
//!
//! - [`units`] - kW / kVA / kV / A / m newtypes
//! - [`geo`] - validated coordinates and planar projection
//! - [`error`] - the [`FeederError`] type
//! - [`diagnostics`] - non-fatal findings
//! - [`graph_utils`] - radial-tree checks and traversal

use petgraph::prelude::*;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

pub mod diagnostics;
pub mod error;
pub mod geo;
pub mod graph_utils;
pub mod units;

pub use crate::geo::{planar_distance, GeoPoint, PlanarPoint, Projection, ProjectionKind};
pub use diagnostics::{category, DiagnosticIssue, Diagnostics, Severity};
pub use error::{FeederError, FeederResult};
pub use graph_utils::*;
pub use petgraph::graph::NodeIndex;
pub use units::{Amperes, KilovoltAmperes, Kilovolts, Kilowatts, Meters};

// Newtype wrappers for IDs for type safety
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($inner:ty), $prefix:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name($inner);

        impl $name {
            #[inline]
            pub fn new(value: $inner) -> Self {
                $name(value)
            }
            #[inline]
            pub fn value(&self) -> $inner {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

define_id!(LoadId(usize), "load:");
define_id!(TransformerId(usize), "transformer:");
define_id!(
    /// Dense index of a vertex in an assembled [`FeederNetwork`]
    VertexId(usize),
    "v"
);
define_id!(SectionId(usize), "section:");
define_id!(
    /// Vertex id as issued by the road-geometry provider
    RoadNodeId(u64),
    "road:"
);

/// Stable arena key for a vertex, valid before assembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexKey {
    Substation,
    Road(RoadNodeId),
    /// Pole inserted while splitting a long primary span
    PrimaryPole(usize),
    Transformer(TransformerId),
    Load(LoadId),
    SecondaryPole {
        transformer: TransformerId,
        index: usize,
    },
}

impl VertexKey {
    /// The role a vertex with this key plays in the network.
    pub fn role(&self) -> VertexRole {
        match self {
            VertexKey::Substation => VertexRole::Substation,
            VertexKey::Road(_) => VertexRole::Junction,
            VertexKey::PrimaryPole(_) | VertexKey::SecondaryPole { .. } => VertexRole::Pole,
            VertexKey::Transformer(_) => VertexRole::Transformer,
            VertexKey::Load(_) => VertexRole::Load,
        }
    }
}

impl std::fmt::Display for VertexKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VertexKey::Substation => write!(f, "substation"),
            VertexKey::Road(id) => write!(f, "{id}"),
            VertexKey::PrimaryPole(index) => write!(f, "primary-pole:{index}"),
            VertexKey::Transformer(id) => write!(f, "{id}"),
            VertexKey::Load(id) => write!(f, "{id}"),
            VertexKey::SecondaryPole { transformer, index } => {
                write!(f, "secondary-pole:{}/{}", transformer.value(), index)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexRole {
    Substation,
    Junction,
    Transformer,
    Load,
    Pole,
}

/// Phase designation of a load, transformer winding or line section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Phase {
    A,
    B,
    C,
    AN,
    BN,
    CN,
    AB,
    BC,
    CA,
    ABC,
    ABCN,
}

impl Phase {
    pub fn num_phase(&self) -> NumPhase {
        match self {
            Phase::A | Phase::B | Phase::C | Phase::AN | Phase::BN | Phase::CN => NumPhase::Single,
            Phase::AB | Phase::BC | Phase::CA => NumPhase::Two,
            Phase::ABC | Phase::ABCN => NumPhase::Three,
        }
    }

    pub fn has_neutral(&self) -> bool {
        matches!(self, Phase::AN | Phase::BN | Phase::CN | Phase::ABCN)
    }

    /// Whether every conductor of `self` is also present in `other`.
    pub fn is_subset_of(&self, other: &Phase) -> bool {
        let mine = self.letters();
        let theirs = other.letters();
        mine.chars().all(|c| c == 'N' || theirs.contains(c))
    }

    fn letters(&self) -> &'static str {
        match self {
            Phase::A => "A",
            Phase::B => "B",
            Phase::C => "C",
            Phase::AN => "AN",
            Phase::BN => "BN",
            Phase::CN => "CN",
            Phase::AB => "AB",
            Phase::BC => "BC",
            Phase::CA => "CA",
            Phase::ABC => "ABC",
            Phase::ABCN => "ABCN",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.letters())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumPhase {
    Single,
    Two,
    Three,
}

impl NumPhase {
    pub fn count(&self) -> usize {
        match self {
            NumPhase::Single => 1,
            NumPhase::Two => 2,
            NumPhase::Three => 3,
        }
    }

    pub fn from_count(count: usize) -> FeederResult<Self> {
        match count {
            1 => Ok(NumPhase::Single),
            2 => Ok(NumPhase::Two),
            3 => Ok(NumPhase::Three),
            other => Err(FeederError::InvalidConfiguration(format!(
                "phase count must be 1, 2 or 3, got {other}"
            ))),
        }
    }

    /// Default phase designation for this phase count.
    pub fn default_phase(&self, neutral: bool) -> Phase {
        match (self, neutral) {
            (NumPhase::Single, true) => Phase::AN,
            (NumPhase::Single, false) => Phase::A,
            (NumPhase::Two, _) => Phase::AB,
            (NumPhase::Three, true) => Phase::ABCN,
            (NumPhase::Three, false) => Phase::ABC,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadConnection {
    #[default]
    Wye,
    Delta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformerConnection {
    Wye,
    Delta,
}

/// A customer connection point.
///
/// Built once by the load factory; only `vertex` is filled in later, by assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadNode {
    pub id: LoadId,
    pub name: String,
    pub location: GeoPoint,
    /// Building footprint the demand was derived from (m²)
    pub area: f64,
    pub phase: Phase,
    pub num_phase: NumPhase,
    pub connection: LoadConnection,
    /// Non-coincident peak demand
    pub kw: Kilowatts,
    pub kv: Kilovolts,
    pub power_factor: f64,
    pub vertex: Option<VertexId>,
}

impl LoadNode {
    pub fn apparent_power(&self) -> KilovoltAmperes {
        self.kw.to_apparent(self.power_factor)
    }
}

/// Voltage class, connections and phasing of a transformer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerClass {
    pub ht_kv: Kilovolts,
    pub lt_kv: Kilovolts,
    pub ht_connection: TransformerConnection,
    pub lt_connection: TransformerConnection,
    pub ht_phase: Phase,
    pub lt_phase: Phase,
    pub num_phase: NumPhase,
}

impl TransformerClass {
    pub fn validate(&self) -> FeederResult<()> {
        if !(self.ht_kv.value() > 0.0) || !(self.lt_kv.value() > 0.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "transformer voltages must be positive (ht {}, lt {})",
                self.ht_kv, self.lt_kv
            )));
        }
        if self.ht_kv < self.lt_kv {
            return Err(FeederError::InvalidConfiguration(format!(
                "transformer HT voltage {} is below LT voltage {}",
                self.ht_kv, self.lt_kv
            )));
        }
        if self.ht_phase.num_phase() < self.num_phase || self.lt_phase.num_phase() < self.num_phase
        {
            return Err(FeederError::InvalidConfiguration(format!(
                "transformer phases {}/{} cannot serve {} phase(s)",
                self.ht_phase,
                self.lt_phase,
                self.num_phase.count()
            )));
        }
        Ok(())
    }
}

/// Nameplate data copied from the chosen catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformerRating {
    pub catalog_entry: String,
    pub kva: KilovoltAmperes,
    pub pct_resistance: f64,
    pub pct_reactance: f64,
    pub pct_no_load_loss: f64,
}

/// A sized distribution (or substation) transformer.
///
/// The rating is fixed at construction and is never smaller than the
/// requirement it was sized for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformerNode {
    pub id: TransformerId,
    pub name: String,
    pub location: GeoPoint,
    #[serde(flatten)]
    pub class: TransformerClass,
    pub loads: BTreeSet<LoadId>,
    required_kva: KilovoltAmperes,
    #[serde(flatten)]
    rating: TransformerRating,
}

impl TransformerNode {
    pub fn new(
        id: TransformerId,
        name: impl Into<String>,
        location: GeoPoint,
        class: TransformerClass,
        loads: BTreeSet<LoadId>,
        required_kva: KilovoltAmperes,
        rating: TransformerRating,
    ) -> FeederResult<Self> {
        if rating.kva < required_kva || !rating.kva.is_finite() {
            return Err(FeederError::CapacityExceedsCatalog {
                required: required_kva.value(),
                largest: Some(rating.kva.value()),
                scope: None,
            });
        }
        Ok(Self {
            id,
            name: name.into(),
            location,
            class,
            loads,
            required_kva,
            rating,
        })
    }

    /// Installed catalog rating.
    pub fn kva(&self) -> KilovoltAmperes {
        self.rating.kva
    }

    pub fn required_kva(&self) -> KilovoltAmperes {
        self.required_kva
    }

    pub fn rating(&self) -> &TransformerRating {
        &self.rating
    }

    pub fn catalog_entry(&self) -> &str {
        &self.rating.catalog_entry
    }
}

/// Growth and sizing margins applied to aggregate demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DesignFactors {
    pub adjustment_factor: f64,
    /// Planned average annual growth (%)
    pub planned_growth_pct: f64,
    /// Observed average annual growth (%)
    pub actual_growth_pct: f64,
    pub planned_years: u32,
    pub actual_years: u32,
    pub power_factor: f64,
    pub allowed_voltage_drop_pct: f64,
}

impl Default for DesignFactors {
    fn default() -> Self {
        Self {
            adjustment_factor: 1.25,
            planned_growth_pct: 2.0,
            actual_growth_pct: 4.0,
            planned_years: 10,
            actual_years: 15,
            power_factor: 0.9,
            allowed_voltage_drop_pct: 3.0,
        }
    }
}

impl DesignFactors {
    pub const ADJUSTMENT_RANGE: (f64, f64) = (0.5, 2.0);
    pub const GROWTH_RANGE: (f64, f64) = (0.0, 100.0);
    pub const YEARS_RANGE: (u32, u32) = (1, 100);

    pub fn validate(&self) -> FeederResult<()> {
        let in_range = |v: f64, (lo, hi): (f64, f64)| v.is_finite() && v >= lo && v <= hi;

        if !in_range(self.adjustment_factor, Self::ADJUSTMENT_RANGE) {
            return Err(FeederError::InvalidConfiguration(format!(
                "adjustment factor {} outside [0.5, 2.0]",
                self.adjustment_factor
            )));
        }
        for (label, pct) in [
            ("planned growth", self.planned_growth_pct),
            ("actual growth", self.actual_growth_pct),
        ] {
            if !in_range(pct, Self::GROWTH_RANGE) {
                return Err(FeederError::InvalidConfiguration(format!(
                    "{label} {pct}% outside [0, 100]"
                )));
            }
        }
        for (label, years) in [
            ("planned years", self.planned_years),
            ("actual years", self.actual_years),
        ] {
            if years < Self::YEARS_RANGE.0 || years > Self::YEARS_RANGE.1 {
                return Err(FeederError::InvalidConfiguration(format!(
                    "{label} {years} outside [1, 100]"
                )));
            }
        }
        if !(self.power_factor > 0.0 && self.power_factor <= 1.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "power factor {} outside (0, 1]",
                self.power_factor
            )));
        }
        if !(self.allowed_voltage_drop_pct > 0.0 && self.allowed_voltage_drop_pct < 100.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "allowed voltage drop {}% outside (0, 100)",
                self.allowed_voltage_drop_pct
            )));
        }
        Ok(())
    }

    /// Same factors with a different voltage-drop allowance.
    pub fn with_allowed_drop(mut self, pct: f64) -> Self {
        self.allowed_voltage_drop_pct = pct;
        self
    }
}

/// Overhead conductor arrangement, in meters.
///
/// Conductors are placed on a cross-arm at `height_m`; `spacing_m` is the
/// distance between adjacent phase conductors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineConfiguration {
    ThreePhase {
        spacing_m: f64,
        height_m: f64,
    },
    ThreePhaseNeutral {
        spacing_m: f64,
        height_m: f64,
        neutral_height_m: f64,
    },
    /// One phase conductor above its neutral
    SinglePhase {
        phase_neutral_spacing_m: f64,
        height_m: f64,
    },
}

impl Default for LineConfiguration {
    fn default() -> Self {
        LineConfiguration::ThreePhase {
            spacing_m: 0.4,
            height_m: 9.0,
        }
    }
}

impl LineConfiguration {
    /// `(x, y)` positions of the phase conductors.
    pub fn phase_positions(&self) -> Vec<(f64, f64)> {
        match *self {
            LineConfiguration::ThreePhase {
                spacing_m,
                height_m,
            }
            | LineConfiguration::ThreePhaseNeutral {
                spacing_m,
                height_m,
                ..
            } => vec![
                (-spacing_m, height_m),
                (0.0, height_m),
                (spacing_m, height_m),
            ],
            LineConfiguration::SinglePhase { height_m, .. } => vec![(0.0, height_m)],
        }
    }

    pub fn neutral_position(&self) -> Option<(f64, f64)> {
        match *self {
            LineConfiguration::ThreePhase { .. } => None,
            LineConfiguration::ThreePhaseNeutral {
                neutral_height_m, ..
            } => Some((0.0, neutral_height_m)),
            LineConfiguration::SinglePhase {
                phase_neutral_spacing_m,
                height_m,
            } => Some((0.0, height_m - phase_neutral_spacing_m)),
        }
    }

    pub fn has_neutral(&self) -> bool {
        self.neutral_position().is_some()
    }

    /// Geometric mean distance between the conductors carrying current for a
    /// line with `num_phase` phases.
    ///
    /// With a single phase conductor the return path is the neutral, or the
    /// adjacent phase position when the arrangement has no neutral.
    pub fn geometric_mean_distance(&self, num_phase: NumPhase) -> f64 {
        let phases = self.phase_positions();
        let used = num_phase.count().min(phases.len());
        let mut conductors: Vec<(f64, f64)> = phases[..used].to_vec();
        if conductors.len() == 1 {
            match (self.neutral_position(), phases.get(1)) {
                (Some(neutral), _) => conductors.push(neutral),
                (None, Some(next)) => conductors.push(*next),
                (None, None) => return 0.0,
            }
        }

        let mut log_sum = 0.0;
        let mut pairs = 0usize;
        for i in 0..conductors.len() {
            for j in (i + 1)..conductors.len() {
                let (xi, yi) = conductors[i];
                let (xj, yj) = conductors[j];
                log_sum += ((xi - xj).powi(2) + (yi - yj).powi(2)).sqrt().ln();
                pairs += 1;
            }
        }
        (log_sum / pairs as f64).exp()
    }

    pub fn validate(&self) -> FeederResult<()> {
        let (spacing, height) = match *self {
            LineConfiguration::ThreePhase {
                spacing_m,
                height_m,
            } => (spacing_m, height_m),
            LineConfiguration::ThreePhaseNeutral {
                spacing_m,
                height_m,
                neutral_height_m,
            } => {
                if !neutral_height_m.is_finite() || (neutral_height_m - height_m).abs() < 1e-6 {
                    return Err(FeederError::InvalidConfiguration(format!(
                        "neutral height {neutral_height_m} m must differ from phase height {height_m} m"
                    )));
                }
                (spacing_m, height_m)
            }
            LineConfiguration::SinglePhase {
                phase_neutral_spacing_m,
                height_m,
            } => (phase_neutral_spacing_m, height_m),
        };
        if !(spacing > 0.0 && spacing <= 20.0) {
            return Err(FeederError::InvalidConfiguration(format!(
                "conductor spacing {spacing} m outside (0, 20]"
            )));
        }
        if !(-9.0..=20.0).contains(&height) {
            return Err(FeederError::InvalidConfiguration(format!(
                "conductor height {height} m outside [-9, 20]"
            )));
        }
        Ok(())
    }
}

/// A vertex of the assembled network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetworkVertex {
    pub id: VertexId,
    pub key: VertexKey,
    pub role: VertexRole,
    pub location: GeoPoint,
    /// Nominal line-to-line voltage at this vertex
    pub kv: Kilovolts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineLevel {
    Primary,
    Secondary,
}

/// A sized conductor span between two vertices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSection {
    pub id: SectionId,
    pub from: VertexId,
    pub to: VertexId,
    pub level: LineLevel,
    pub length: Meters,
    pub num_phase: NumPhase,
    pub phase: Phase,
    pub conductor: String,
    pub neutral_conductor: Option<String>,
    pub configuration: LineConfiguration,
    pub rated_ampacity: Amperes,
    pub required_ampacity: Amperes,
    pub downstream_kva: KilovoltAmperes,
    pub customers: usize,
    pub voltage_drop_pct: f64,
}

impl LineSection {
    /// Geometry-only span with no conductor chosen yet.
    pub fn unsized_span(
        id: SectionId,
        from: VertexId,
        to: VertexId,
        level: LineLevel,
        length: Meters,
    ) -> Self {
        Self {
            id,
            from,
            to,
            level,
            length,
            num_phase: NumPhase::Three,
            phase: Phase::ABC,
            conductor: String::new(),
            neutral_conductor: None,
            configuration: LineConfiguration::default(),
            rated_ampacity: Amperes(0.0),
            required_ampacity: Amperes(0.0),
            downstream_kva: KilovoltAmperes(0.0),
            customers: 0,
            voltage_drop_pct: 0.0,
        }
    }
}

/// Edge from the primary attachment vertex to a transformer's LV vertex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransformerBranch {
    pub transformer: TransformerId,
    pub from: VertexId,
    pub to: VertexId,
    pub kva: KilovoltAmperes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Edge {
    Line(LineSection),
    Transformer(TransformerBranch),
}

impl Edge {
    /// Physical length; transformer branches have none.
    pub fn length(&self) -> Meters {
        match self {
            Edge::Line(section) => section.length,
            Edge::Transformer(_) => Meters::ZERO,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Edge::Line(section) => format!("{} {}", section.id, section.conductor),
            Edge::Transformer(branch) => format!("{} {}", branch.transformer, branch.kva),
        }
    }
}

/// The assembled radial feeder (petgraph `Graph<NetworkVertex, Edge, Directed>`).
///
/// `VertexId(i)` is always the vertex stored at `NodeIndex(i)`; vertices are
/// never removed.
#[derive(Debug, Clone, Default)]
pub struct FeederNetwork {
    pub graph: Graph<NetworkVertex, Edge, Directed>,
}

impl FeederNetwork {
    pub fn new() -> Self {
        Self {
            graph: Graph::new(),
        }
    }

    pub fn add_vertex(&mut self, key: VertexKey, location: GeoPoint, kv: Kilovolts) -> VertexId {
        let id = VertexId(self.graph.node_count());
        self.graph.add_node(NetworkVertex {
            id,
            key,
            role: key.role(),
            location,
            kv,
        });
        id
    }

    /// Connect `parent` → `child`.
    pub fn add_edge(&mut self, parent: VertexId, child: VertexId, edge: Edge) -> EdgeIndex {
        self.graph
            .add_edge(NodeIndex::new(parent.0), NodeIndex::new(child.0), edge)
    }

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&NetworkVertex> {
        self.graph.node_weight(NodeIndex::new(id.0))
    }

    pub fn vertices(&self) -> impl Iterator<Item = &NetworkVertex> {
        self.graph.node_weights()
    }

    /// The unique vertex with no parent, if there is exactly one.
    pub fn root(&self) -> Option<VertexId> {
        let mut roots = self.graph.node_indices().filter(|n| {
            self.graph
                .neighbors_directed(*n, Direction::Incoming)
                .next()
                .is_none()
        });
        let first = roots.next()?;
        match roots.next() {
            Some(_) => None,
            None => Some(VertexId(first.index())),
        }
    }

    pub fn parent(&self, id: VertexId) -> Option<VertexId> {
        self.graph
            .neighbors_directed(NodeIndex::new(id.0), Direction::Incoming)
            .next()
            .map(|n| VertexId(n.index()))
    }

    /// Children in ascending id order.
    pub fn children(&self, id: VertexId) -> Vec<VertexId> {
        let mut children: Vec<VertexId> = self
            .graph
            .neighbors_directed(NodeIndex::new(id.0), Direction::Outgoing)
            .map(|n| VertexId(n.index()))
            .collect();
        children.sort();
        children
    }

    /// The edge entering `id` from its parent.
    pub fn incoming_edge(&self, id: VertexId) -> Option<&Edge> {
        self.graph
            .edges_directed(NodeIndex::new(id.0), Direction::Incoming)
            .next()
            .map(|e| e.weight())
    }

    pub fn sections(&self) -> impl Iterator<Item = &LineSection> {
        self.graph.edge_weights().filter_map(|e| match e {
            Edge::Line(section) => Some(section),
            Edge::Transformer(_) => None,
        })
    }

    pub fn transformer_branches(&self) -> impl Iterator<Item = &TransformerBranch> {
        self.graph.edge_weights().filter_map(|e| match e {
            Edge::Transformer(branch) => Some(branch),
            Edge::Line(_) => None,
        })
    }

    pub fn vertices_with_role(&self, role: VertexRole) -> impl Iterator<Item = &NetworkVertex> {
        self.graph.node_weights().filter(move |v| v.role == role)
    }

    /// Compute basic statistics about the network
    pub fn stats(&self) -> FeederStats {
        let mut stats = FeederStats {
            num_vertices: self.graph.node_count(),
            ..FeederStats::default()
        };

        for vertex in self.graph.node_weights() {
            match vertex.role {
                VertexRole::Load => stats.num_loads += 1,
                VertexRole::Pole => stats.num_poles += 1,
                VertexRole::Junction => stats.num_junctions += 1,
                VertexRole::Transformer | VertexRole::Substation => {}
            }
        }

        for edge in self.graph.edge_weights() {
            match edge {
                Edge::Line(section) => {
                    stats.num_sections += 1;
                    match section.level {
                        LineLevel::Primary => stats.primary_length_m += section.length.value(),
                        LineLevel::Secondary => stats.secondary_length_m += section.length.value(),
                    }
                }
                Edge::Transformer(branch) => {
                    stats.num_transformers += 1;
                    stats.installed_kva += branch.kva.value();
                }
            }
        }
        stats
    }
}

/// Statistics about a feeder's size and loading
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeederStats {
    pub num_vertices: usize,
    pub num_sections: usize,
    pub num_loads: usize,
    pub num_transformers: usize,
    pub num_poles: usize,
    pub num_junctions: usize,
    pub primary_length_m: f64,
    pub secondary_length_m: f64,
    pub total_load_kw: f64,
    pub installed_kva: f64,
}

impl std::fmt::Display for FeederStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} vertices, {} sections ({:.0} m primary, {:.0} m secondary), {} transformers ({:.0} kVA), {} loads ({:.1} kW)",
            self.num_vertices,
            self.num_sections,
            self.primary_length_m,
            self.secondary_length_m,
            self.num_transformers,
            self.installed_kva,
            self.num_loads,
            self.total_load_kw
        )
    }
}
