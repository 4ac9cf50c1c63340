//! End-to-end feeder synthesis.
//!
//! [`FeederSynthesizer`] runs the stages in a fixed order, each consuming the
//! finished output of the ones before it:
//!
//! 1. load records → [`LoadNode`]s
//! 2. clustering and transformer sizing
//! 3. road graph reduction between the substation and the transformer sites
//! 4. primary topology and conductor sizing
//! 5. secondary topology and conductor sizing, one tree per transformer
//! 6. assembly and validation
//!
//! Any failing stage aborts the run; there is no partial output.

use std::collections::{BTreeMap, BTreeSet};

use feedgen_core::{
    category, Diagnostics, FeederError, FeederResult, GeoPoint, LoadNode, Projection,
    RoadNodeId, TransformerId, TransformerNode,
};
use rstar::primitives::GeomWithData;
use rstar::RTree;
use tracing::{info, warn};

use crate::assemble::{assemble, AssemblyInput, SizedLayer, SynthesizedFeeder};
use crate::capacity::CapacityEstimator;
use crate::catalog::{Catalog, ConductorEntry, TransformerEntry};
use crate::config::SynthesisConfig;
use crate::graph::{GraphReducer, RoadGraph};
use crate::loads::{DefaultConnectionSetter, LoadFactory, LoadRecord, SimpleVoltageSetter};
use crate::primary::PrimaryTopologyBuilder;
use crate::secondary::SecondaryTopologyBuilder;
use crate::topology::nearest_lowest_key;
use crate::transformers::{size_substation, TransformerPlanner};
use crate::voltage_drop::VoltageDropSizer;

/// Everything a synthesis run reads besides its configuration.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInputs<'a> {
    pub substation: GeoPoint,
    pub roads: &'a RoadGraph,
    pub transformers: &'a Catalog<TransformerEntry>,
    pub conductors: &'a Catalog<ConductorEntry>,
}

#[derive(Debug, Clone)]
pub struct FeederSynthesizer {
    config: SynthesisConfig,
}

impl FeederSynthesizer {
    pub fn new(config: SynthesisConfig) -> FeederResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Turn building records into loads with the configured strategies.
    pub fn build_loads(&self, records: &[LoadRecord]) -> FeederResult<Vec<LoadNode>> {
        let loads = &self.config.loads;
        let factory = LoadFactory::new(
            loads.phases.clone(),
            SimpleVoltageSetter::new(self.config.secondary.kv)?,
            DefaultConnectionSetter,
            loads.consumption.resolve(records)?,
            loads.power_factor,
        )?;
        factory.build(records)
    }

    pub fn synthesize(
        &self,
        inputs: SynthesisInputs<'_>,
        records: &[LoadRecord],
    ) -> FeederResult<SynthesizedFeeder> {
        let loads = self.build_loads(records)?;
        self.synthesize_loads(inputs, loads)
    }

    /// Synthesize a feeder for loads that were built elsewhere.
    pub fn synthesize_loads(
        &self,
        inputs: SynthesisInputs<'_>,
        loads: Vec<LoadNode>,
    ) -> FeederResult<SynthesizedFeeder> {
        let config = &self.config;
        let mut diagnostics = Diagnostics::new();
        check_loads(&loads, &mut diagnostics);

        let projection = Projection::new(config.projection, inputs.substation);
        let estimator = CapacityEstimator::new(config.diversity.clone(), config.design.clone())?;

        let planner = TransformerPlanner::new(
            &estimator,
            inputs.transformers,
            config.transformer.class(),
            config.transformer.scope.clone(),
            projection,
        )?;
        let plan = planner.plan(&loads, config.clustering.count, &config.clustering.kmeans)?;
        let transformers = plan.transformers;

        let tree = reduce_roads(
            config,
            inputs.roads,
            projection,
            inputs.substation,
            &transformers,
            &mut diagnostics,
        )?;

        let mut primary_builder =
            PrimaryTopologyBuilder::new(&estimator, projection, config.primary.kv);
        if config.primary.split_spans {
            primary_builder = primary_builder.with_max_span(config.max_pole_span_m);
        }
        let primary = primary_builder.build(inputs.substation, &tree, &transformers, &loads)?;
        for (id, snap) in primary.snaps() {
            if snap.distance_m > config.max_pole_span_m {
                warn!(transformer = %id, distance_m = snap.distance_m, "transformer snapped far from the primary");
                diagnostics.add_warning_with_entity(
                    category::SNAPPING,
                    &format!(
                        "attached to {} at {:.1} m, beyond the {:.0} m pole span",
                        snap.vertex, snap.distance_m, config.max_pole_span_m
                    ),
                    &id.to_string(),
                );
            }
        }

        let primary_sizer = VoltageDropSizer::new(
            inputs.conductors,
            config.primary_sizing(),
            primary.longest_path_kva_meters(),
        )?;
        let primary_sizing = primary_sizer.size_layer(primary.layer(), config.primary.num_phase)?;
        info!(spans = primary_sizing.len(), "sized primary conductors");

        let attachments = primary.transformer_vertex_map();
        let sites = attachments
            .iter()
            .map(|(id, key)| {
                primary
                    .layer()
                    .location(key)
                    .map(|location| (*id, location))
                    .ok_or_else(|| {
                        FeederError::InconsistentTopology(format!(
                            "attachment vertex {key} of {id} is not in the primary tree"
                        ))
                    })
            })
            .collect::<FeederResult<BTreeMap<TransformerId, GeoPoint>>>()?;

        let secondary_builder =
            SecondaryTopologyBuilder::new(&estimator, projection, config.max_pole_span_m)?;
        let secondaries = secondary_builder.build_all(&transformers, &sites, &loads)?;
        let secondary_sizing = secondaries
            .iter()
            .map(|tree| {
                VoltageDropSizer::new(
                    inputs.conductors,
                    config.secondary_sizing(),
                    tree.longest_path_kva_meters(),
                )?
                .size_layer(tree.layer(), config.secondary.num_phase)
            })
            .collect::<FeederResult<Vec<_>>>()?;
        info!(
            spans = secondary_sizing.iter().map(Vec::len).sum::<usize>(),
            "sized secondary conductors"
        );

        let substation_transformer = match &config.substation_transformer {
            Some(level) => {
                let substation_planner = TransformerPlanner::new(
                    &estimator,
                    inputs.transformers,
                    level.class(),
                    level.scope.clone(),
                    projection,
                )?;
                Some(size_substation(
                    &substation_planner,
                    inputs.substation,
                    &loads,
                    transformers.len(),
                )?)
            }
            None => None,
        };

        let primary_layer = SizedLayer {
            layer: primary.layer(),
            sizing: &primary_sizing,
            kv: config.primary.kv,
            num_phase: config.primary.num_phase,
            phase: config.primary.phase,
            configuration: config.primary.configuration,
        };
        let secondary_layers = secondaries
            .iter()
            .zip(&secondary_sizing)
            .map(|(tree, sizing)| SizedLayer {
                layer: tree.layer(),
                sizing,
                kv: config.secondary.kv,
                num_phase: config.secondary.num_phase,
                phase: config.secondary.phase,
                configuration: config.secondary.configuration,
            })
            .collect();

        let mut feeder = assemble(AssemblyInput {
            primary: primary_layer,
            attachments: &attachments,
            secondaries: secondary_layers,
            transformers,
            loads,
            substation_transformer,
        })?;
        feeder.diagnostics.merge(diagnostics);

        let stats = feeder.stats();
        info!(
            vertices = stats.num_vertices,
            sections = stats.num_sections,
            transformers = stats.num_transformers,
            loads = stats.num_loads,
            warnings = feeder.diagnostics.warning_count(),
            "synthesized feeder"
        );
        Ok(feeder)
    }
}

/// Zero-demand loads and loads sharing a location are legal but suspicious.
fn check_loads(loads: &[LoadNode], diagnostics: &mut Diagnostics) {
    let mut seen: BTreeMap<(u64, u64), &LoadNode> = BTreeMap::new();
    for load in loads {
        if load.kw.value() == 0.0 {
            diagnostics.add_warning_with_entity(category::LOAD, "load has zero demand", &load.name);
        }
        let key = (
            load.location.latitude().to_bits(),
            load.location.longitude().to_bits(),
        );
        if let Some(first) = seen.get(&key) {
            diagnostics.add_warning_with_entity(
                category::GEOMETRY,
                &format!("load shares its location with '{}'", first.name),
                &load.name,
            );
        } else {
            seen.insert(key, load);
        }
    }
}

/// Reduce the road graph to a tree from the road vertex nearest the
/// substation to the road vertices nearest each transformer.
fn reduce_roads(
    config: &SynthesisConfig,
    roads: &RoadGraph,
    projection: Projection,
    substation: GeoPoint,
    transformers: &[TransformerNode],
    diagnostics: &mut Diagnostics,
) -> FeederResult<crate::graph::ReducedTree> {
    let index = RTree::bulk_load(
        roads
            .nodes()
            .map(|(id, location)| GeomWithData::new(projection.project(&location), id))
            .collect::<Vec<GeomWithData<[f64; 2], RoadNodeId>>>(),
    );
    let nearest = |point: &GeoPoint| nearest_lowest_key(&index, projection.project(point));

    let source = nearest(&substation).ok_or_else(|| {
        FeederError::InvalidConfiguration("road graph has no vertices".to_string())
    })?;
    let terminals: BTreeSet<RoadNodeId> = transformers
        .iter()
        .filter_map(|t| nearest(&t.location))
        .collect();

    let component = roads.component(source)?;
    let outside = roads.node_count() - component.len();
    if outside > 0 {
        diagnostics.add_warning(
            category::TOPOLOGY,
            &format!("{outside} road vertices are not connected to the substation road"),
        );
    }

    let terminals: Vec<RoadNodeId> = terminals.into_iter().collect();
    let tree = GraphReducer::new(config.primary.reduce.clone()).reduce(roads, source, &terminals)?;
    info!(
        source = %source,
        terminals = terminals.len(),
        edges = tree.edges.len(),
        length_m = tree.total_length_m(),
        "reduced road graph"
    );
    Ok(tree)
}
