//! # feedgen-algo: Radial Feeder Synthesis
//!
//! This crate turns geolocated loads and a road network into a fully sized
//! radial distribution feeder: substation, primary lines, distribution
//! transformers, secondary lines and service drops.
//!
//! ## Stages
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Load construction | [`loads`] | [`LoadNode`](feedgen_core::LoadNode)s from building records |
//! | Transformer siting | [`cluster`], [`transformers`] | sized transformers at cluster centroids |
//! | Road reduction | [`graph`] | loop-free tree over the road fragment that reaches the substation |
//! | Primary | [`primary`] | medium-voltage tree with snapped transformers |
//! | Secondary | [`secondary`] | one low-voltage tree per transformer |
//! | Conductor sizing | [`voltage_drop`] | ampacity and voltage-drop constrained conductors |
//! | Assembly | [`assemble`] | validated [`FeederNetwork`](feedgen_core::FeederNetwork) |
//!
//! Sizing decisions go through [`capacity`] (diversified, grown demand) and
//! [`catalog`] (smallest adequate entry). [`pipeline::FeederSynthesizer`] runs
//! all stages in order from a [`config::SynthesisConfig`].
//!
//! ## Example
//!
//! ```ignore
//! use feedgen_algo::{FeederSynthesizer, SynthesisConfig, SynthesisInputs};
//!
//! let synthesizer = FeederSynthesizer::new(SynthesisConfig::default())?;
//! let feeder = synthesizer.synthesize(
//!     SynthesisInputs {
//!         substation,
//!         roads: &roads,
//!         transformers: &transformer_catalog,
//!         conductors: &conductor_catalog,
//!     },
//!     &records,
//! )?;
//! println!("{}", feeder.stats());
//! ```
//!
//! ## Features
//!
//! - `parallel`: build secondary trees on the rayon thread pool.

pub mod assemble;
pub mod capacity;
pub mod catalog;
pub mod cluster;
pub mod config;
pub mod graph;
pub mod loads;
pub mod pipeline;
pub mod primary;
pub mod secondary;
pub mod test_utils;
pub mod topology;
pub mod transformers;
pub mod voltage_drop;

pub use assemble::{assemble, AssemblyInput, SizedLayer, SynthesizedFeeder};
pub use capacity::{CapacityEstimate, CapacityEstimator, DiversityFactor, DiversityModel};
pub use catalog::{Catalog, ConductorEntry, Rated, TransformerEntry};
pub use cluster::{cluster_points, kmeans, ClusterCount, Clustering, KMeansOptions};
pub use config::SynthesisConfig;
pub use graph::{GraphReducer, ReduceOptions, ReducedTree, RoadGraph};
pub use loads::{LoadFactory, LoadRecord};
pub use pipeline::{FeederSynthesizer, SynthesisInputs};
pub use primary::{PrimaryTopology, PrimaryTopologyBuilder};
pub use secondary::{SecondaryTopology, SecondaryTopologyBuilder};
pub use topology::TopologyLayer;
pub use transformers::{TransformerPlan, TransformerPlanner};
pub use voltage_drop::{ConductorChoice, SizingParameters, VoltageDropSizer};
