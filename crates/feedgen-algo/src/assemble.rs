//! Merge the finished layers into one validated radial network.
//!
//! Assembly maps every [`VertexKey`] to a dense [`VertexId`], turns sized
//! spans into [`LineSection`]s and adds a [`TransformerBranch`] from each
//! transformer's attachment vertex to its LV vertex. The result must be a
//! single tree rooted at the substation that reaches every load and
//! transformer; anything else is [`FeederError::InconsistentTopology`].

use std::collections::BTreeMap;

use feedgen_core::{
    check_radial, Diagnostics, Edge, FeederError, FeederNetwork, FeederResult, FeederStats,
    Kilovolts, LineConfiguration, LineSection, LoadId, LoadNode, NumPhase, Phase, SectionId,
    TransformerBranch, TransformerId, TransformerNode, VertexId, VertexKey,
};
use serde::Serialize;
use tracing::info;

use crate::topology::TopologyLayer;
use crate::voltage_drop::ConductorChoice;

/// A layer together with the conductor chosen for each of its spans.
#[derive(Debug, Clone, Copy)]
pub struct SizedLayer<'a> {
    pub layer: &'a TopologyLayer,
    pub sizing: &'a [ConductorChoice],
    pub kv: Kilovolts,
    pub num_phase: NumPhase,
    pub phase: Phase,
    pub configuration: LineConfiguration,
}

pub struct AssemblyInput<'a> {
    pub primary: SizedLayer<'a>,
    /// Attachment vertex (in the primary layer) of every transformer
    pub attachments: &'a BTreeMap<TransformerId, VertexKey>,
    pub secondaries: Vec<SizedLayer<'a>>,
    pub transformers: Vec<TransformerNode>,
    pub loads: Vec<LoadNode>,
    pub substation_transformer: Option<TransformerNode>,
}

/// The final synthesized feeder.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesizedFeeder {
    #[serde(skip)]
    network: FeederNetwork,
    root: VertexId,
    transformers: Vec<TransformerNode>,
    loads: Vec<LoadNode>,
    substation_transformer: Option<TransformerNode>,
    transformer_vertices: BTreeMap<TransformerId, VertexId>,
    load_vertices: BTreeMap<LoadId, VertexId>,
    pub diagnostics: Diagnostics,
}

impl SynthesizedFeeder {
    pub fn network(&self) -> &FeederNetwork {
        &self.network
    }

    /// The substation vertex.
    pub fn root(&self) -> VertexId {
        self.root
    }

    pub fn transformer_vertex_map(&self) -> &BTreeMap<TransformerId, VertexId> {
        &self.transformer_vertices
    }

    pub fn load_vertex_map(&self) -> &BTreeMap<LoadId, VertexId> {
        &self.load_vertices
    }

    pub fn transformers(&self) -> &[TransformerNode] {
        &self.transformers
    }

    pub fn loads(&self) -> &[LoadNode] {
        &self.loads
    }

    pub fn substation_transformer(&self) -> Option<&TransformerNode> {
        self.substation_transformer.as_ref()
    }

    pub fn stats(&self) -> FeederStats {
        let mut stats = self.network.stats();
        stats.total_load_kw = self.loads.iter().map(|l| l.kw.value()).sum();
        stats
    }
}

struct Builder {
    network: FeederNetwork,
    ids: BTreeMap<VertexKey, VertexId>,
    next_section: usize,
}

impl Builder {
    fn vertex(&mut self, key: VertexKey, layer: &TopologyLayer, kv: Kilovolts) -> FeederResult<VertexId> {
        if self.ids.contains_key(&key) {
            return Err(FeederError::InconsistentTopology(format!(
                "vertex {key} appears in more than one place"
            )));
        }
        let location = layer.location(&key).ok_or_else(|| {
            FeederError::InconsistentTopology(format!("vertex {key} has no location"))
        })?;
        let id = self.network.add_vertex(key, location, kv);
        self.ids.insert(key, id);
        Ok(id)
    }

    fn lookup(&self, key: &VertexKey) -> FeederResult<VertexId> {
        self.ids.get(key).copied().ok_or_else(|| {
            FeederError::InconsistentTopology(format!("vertex {key} is referenced before it exists"))
        })
    }

    /// Add the spans of `sized`; its root must already exist unless `new_root`.
    fn merge(&mut self, sized: &SizedLayer<'_>, new_root: bool) -> FeederResult<()> {
        let layer = sized.layer;
        if sized.sizing.len() != layer.spans.len() {
            return Err(FeederError::InconsistentTopology(format!(
                "layer rooted at {} has {} spans but {} sized conductors",
                layer.root,
                layer.spans.len(),
                sized.sizing.len()
            )));
        }
        if new_root {
            self.vertex(layer.root, layer, sized.kv)?;
        } else {
            self.lookup(&layer.root)?;
        }

        for (span, choice) in layer.spans.iter().zip(sized.sizing) {
            let parent = self.lookup(&span.parent)?;
            let child = self.vertex(span.child, layer, sized.kv)?;
            let section = LineSection {
                id: SectionId::new(self.next_section),
                from: parent,
                to: child,
                level: layer.level,
                length: span.length,
                num_phase: sized.num_phase,
                phase: sized.phase,
                conductor: choice.conductor.clone(),
                neutral_conductor: choice.neutral.clone(),
                configuration: sized.configuration,
                rated_ampacity: choice.rated_ampacity,
                required_ampacity: choice.required_ampacity,
                downstream_kva: span.downstream_kva,
                customers: span.customers,
                voltage_drop_pct: choice.voltage_drop_pct,
            };
            self.next_section += 1;
            self.network.add_edge(parent, child, Edge::Line(section));
        }
        Ok(())
    }
}

/// Merge and validate all layers.
pub fn assemble(input: AssemblyInput<'_>) -> FeederResult<SynthesizedFeeder> {
    let AssemblyInput {
        primary,
        attachments,
        secondaries,
        transformers,
        mut loads,
        substation_transformer,
    } = input;

    if primary.layer.root != VertexKey::Substation {
        return Err(FeederError::InconsistentTopology(format!(
            "primary layer is rooted at {} instead of the substation",
            primary.layer.root
        )));
    }

    let mut builder = Builder {
        network: FeederNetwork::new(),
        ids: BTreeMap::new(),
        next_section: 0,
    };
    builder.merge(&primary, true)?;

    let mut transformer_vertices = BTreeMap::new();
    for transformer in &transformers {
        let key = attachments.get(&transformer.id).ok_or_else(|| {
            FeederError::InconsistentTopology(format!("{} is not attached", transformer.id))
        })?;
        let from = builder.lookup(key)?;
        let location = primary.layer.location(key).ok_or_else(|| {
            FeederError::InconsistentTopology(format!("attachment vertex {key} has no location"))
        })?;
        let lv_key = VertexKey::Transformer(transformer.id);
        if builder.ids.contains_key(&lv_key) {
            return Err(FeederError::InconsistentTopology(format!(
                "{} appears twice",
                transformer.id
            )));
        }
        let to = builder.network.add_vertex(lv_key, location, transformer.class.lt_kv);
        builder.ids.insert(lv_key, to);
        builder.network.add_edge(
            from,
            to,
            Edge::Transformer(TransformerBranch {
                transformer: transformer.id,
                from,
                to,
                kva: transformer.kva(),
            }),
        );
        transformer_vertices.insert(transformer.id, to);
    }

    for secondary in &secondaries {
        if !matches!(secondary.layer.root, VertexKey::Transformer(_)) {
            return Err(FeederError::InconsistentTopology(format!(
                "secondary layer is rooted at {} instead of a transformer",
                secondary.layer.root
            )));
        }
        builder.merge(secondary, false)?;
    }

    let mut load_vertices = BTreeMap::new();
    for load in &mut loads {
        let id = builder.lookup(&VertexKey::Load(load.id)).map_err(|_| {
            FeederError::InconsistentTopology(format!("{} is not connected", load.id))
        })?;
        if load_vertices.insert(load.id, id).is_some() {
            return Err(FeederError::InconsistentTopology(format!(
                "{} is listed twice",
                load.id
            )));
        }
        load.vertex = Some(id);
    }
    let stray_loads = builder
        .ids
        .keys()
        .filter(|k| matches!(k, VertexKey::Load(_)))
        .count();
    if stray_loads != load_vertices.len() {
        return Err(FeederError::InconsistentTopology(format!(
            "{stray_loads} load vertices for {} loads",
            load_vertices.len()
        )));
    }

    let root = check_radial(&builder.network)?;
    let substation = builder.lookup(&VertexKey::Substation)?;
    if root != substation {
        return Err(FeederError::InconsistentTopology(format!(
            "network is rooted at {root} instead of the substation"
        )));
    }

    let feeder = SynthesizedFeeder {
        network: builder.network,
        root,
        transformers,
        loads,
        substation_transformer,
        transformer_vertices,
        load_vertices,
        diagnostics: Diagnostics::new(),
    };
    info!(stats = %feeder.stats(), "assembled feeder");
    Ok(feeder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{sample_class, sample_load, sample_rating};
    use feedgen_core::{
        Amperes, GeoPoint, KilovoltAmperes, LineLevel, Meters, RoadNodeId, VertexRole,
    };
    use std::collections::BTreeSet;

    fn choice() -> ConductorChoice {
        ConductorChoice {
            conductor: "c".to_string(),
            neutral: None,
            rated_ampacity: Amperes(100.0),
            required_ampacity: Amperes(1.0),
            voltage_drop_pct: 0.0,
            budget_pct: 0.0,
        }
    }

    fn sized<'a>(layer: &'a TopologyLayer, sizing: &'a [ConductorChoice], kv: f64) -> SizedLayer<'a> {
        SizedLayer {
            layer,
            sizing,
            kv: Kilovolts(kv),
            num_phase: NumPhase::Three,
            phase: Phase::ABC,
            configuration: LineConfiguration::default(),
        }
    }

    struct Fixture {
        primary: TopologyLayer,
        secondary: TopologyLayer,
        attachments: BTreeMap<TransformerId, VertexKey>,
        transformer: TransformerNode,
        loads: Vec<LoadNode>,
    }

    fn fixture() -> Fixture {
        let origin = GeoPoint::new(0.0, 0.0).unwrap();
        let road = VertexKey::Road(RoadNodeId::new(1));
        let mut primary = TopologyLayer::new(LineLevel::Primary, VertexKey::Substation, origin);
        primary.add_vertex(road, GeoPoint::new(0.0, 0.001).unwrap());
        primary.push_span(VertexKey::Substation, road, Meters(111.0));

        let loads = vec![sample_load(0, 0.0001, 0.001, 3.0), sample_load(1, 0.0002, 0.001, 4.0)];
        let tx = TransformerId::new(0);
        let root = VertexKey::Transformer(tx);
        let mut secondary =
            TopologyLayer::new(LineLevel::Secondary, root, GeoPoint::new(0.0, 0.001).unwrap());
        for load in &loads {
            secondary.add_vertex(VertexKey::Load(load.id), load.location);
        }
        secondary.push_span(root, VertexKey::Load(LoadId::new(0)), Meters(11.0));
        secondary.push_span(
            VertexKey::Load(LoadId::new(0)),
            VertexKey::Load(LoadId::new(1)),
            Meters(11.0),
        );

        let transformer = TransformerNode::new(
            tx,
            "t0",
            GeoPoint::new(0.0, 0.001).unwrap(),
            sample_class(),
            BTreeSet::from([LoadId::new(0), LoadId::new(1)]),
            KilovoltAmperes(8.0),
            sample_rating(10.0),
        )
        .unwrap();

        Fixture {
            primary,
            secondary,
            attachments: BTreeMap::from([(tx, road)]),
            transformer,
            loads,
        }
    }

    #[test]
    fn test_assemble_single_transformer() {
        let f = fixture();
        let primary_sizing = vec![choice()];
        let secondary_sizing = vec![choice(), choice()];
        let feeder = assemble(AssemblyInput {
            primary: sized(&f.primary, &primary_sizing, 11.0),
            attachments: &f.attachments,
            secondaries: vec![sized(&f.secondary, &secondary_sizing, 0.415)],
            transformers: vec![f.transformer.clone()],
            loads: f.loads.clone(),
            substation_transformer: None,
        })
        .unwrap();

        let network = feeder.network();
        assert_eq!(network.vertex_count(), 5);
        assert_eq!(network.edge_count(), 4);
        assert_eq!(network.vertex(feeder.root()).unwrap().role, VertexRole::Substation);
        assert_eq!(feeder.load_vertex_map().len(), 2);
        assert!(feeder.loads().iter().all(|l| l.vertex.is_some()));

        let tx_vertex = feeder.transformer_vertex_map()[&TransformerId::new(0)];
        assert_eq!(network.vertex(tx_vertex).unwrap().kv, Kilovolts(0.415));
        assert!(matches!(network.incoming_edge(tx_vertex), Some(Edge::Transformer(_))));

        let stats = feeder.stats();
        assert_eq!(stats.num_transformers, 1);
        assert_eq!(stats.total_load_kw, 7.0);
        assert_eq!(stats.installed_kva, 10.0);
    }

    #[test]
    fn test_missing_load_is_inconsistent() {
        let f = fixture();
        let primary_sizing = vec![choice()];
        let mut loads = f.loads.clone();
        loads.push(sample_load(9, 0.0, 0.0, 1.0));
        let result = assemble(AssemblyInput {
            primary: sized(&f.primary, &primary_sizing, 11.0),
            attachments: &f.attachments,
            secondaries: vec![],
            transformers: vec![f.transformer.clone()],
            loads,
            substation_transformer: None,
        });
        assert!(matches!(result, Err(FeederError::InconsistentTopology(_))));
    }

    #[test]
    fn test_sizing_length_mismatch() {
        let f = fixture();
        let primary_sizing = vec![];
        let result = assemble(AssemblyInput {
            primary: sized(&f.primary, &primary_sizing, 11.0),
            attachments: &f.attachments,
            secondaries: vec![],
            transformers: vec![],
            loads: vec![],
            substation_transformer: None,
        });
        assert!(matches!(result, Err(FeederError::InconsistentTopology(_))));
    }

    #[test]
    fn test_unattached_transformer() {
        let f = fixture();
        let primary_sizing = vec![choice()];
        let result = assemble(AssemblyInput {
            primary: sized(&f.primary, &primary_sizing, 11.0),
            attachments: &BTreeMap::new(),
            secondaries: vec![],
            transformers: vec![f.transformer.clone()],
            loads: vec![],
            substation_transformer: None,
        });
        assert!(matches!(result, Err(FeederError::InconsistentTopology(_))));
    }

    #[test]
    fn test_duplicate_load_vertex() {
        let f = fixture();
        let primary_sizing = vec![choice()];
        let secondary_sizing = vec![choice(), choice()];
        let mut second = f.secondary.clone();
        // Same load reachable from a second transformer
        second.root = VertexKey::Transformer(TransformerId::new(0));
        let result = assemble(AssemblyInput {
            primary: sized(&f.primary, &primary_sizing, 11.0),
            attachments: &f.attachments,
            secondaries: vec![
                sized(&f.secondary, &secondary_sizing, 0.415),
                sized(&second, &secondary_sizing, 0.415),
            ],
            transformers: vec![f.transformer.clone()],
            loads: f.loads.clone(),
            substation_transformer: None,
        });
        assert!(matches!(result, Err(FeederError::InconsistentTopology(_))));
    }
}
