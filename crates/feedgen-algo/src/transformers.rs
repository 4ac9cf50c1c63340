//! Distribution transformer siting and sizing.
//!
//! Loads are clustered in the planar projection; each cluster becomes one
//! transformer at its centroid, sized from the cluster's aggregate demand and
//! matched against the catalog entries of the requested voltage class.

use std::collections::BTreeSet;

use feedgen_core::{
    FeederError, FeederResult, GeoPoint, KilovoltAmperes, Kilowatts, LoadNode, PlanarPoint,
    Projection, TransformerClass, TransformerId, TransformerNode, TransformerRating,
};
use tracing::{debug, info};

use crate::capacity::{CapacityEstimator, DiversityFactor};
use crate::catalog::{Catalog, TransformerEntry};
use crate::cluster::{cluster_points, ClusterCount, Clustering, KMeansOptions};

/// Catalog voltages are compared with this absolute tolerance in kV.
const KV_TOLERANCE: f64 = 1e-6;

/// Sized transformers together with the clustering that placed them.
#[derive(Debug, Clone)]
pub struct TransformerPlan {
    pub transformers: Vec<TransformerNode>,
    pub clustering: Clustering,
}

pub struct TransformerPlanner<'a, D> {
    estimator: &'a CapacityEstimator<D>,
    catalog: &'a Catalog<TransformerEntry>,
    class: TransformerClass,
    scope: Option<String>,
    projection: Projection,
}

impl<'a, D: DiversityFactor> TransformerPlanner<'a, D> {
    pub fn new(
        estimator: &'a CapacityEstimator<D>,
        catalog: &'a Catalog<TransformerEntry>,
        class: TransformerClass,
        scope: Option<String>,
        projection: Projection,
    ) -> FeederResult<Self> {
        class.validate()?;
        Ok(Self {
            estimator,
            catalog,
            class,
            scope,
            projection,
        })
    }

    pub fn class(&self) -> &TransformerClass {
        &self.class
    }

    /// Cluster `loads` and size one transformer per cluster.
    ///
    /// Transformer ids follow cluster labels, starting at 0.
    pub fn plan(
        &self,
        loads: &[LoadNode],
        count: ClusterCount,
        options: &KMeansOptions,
    ) -> FeederResult<TransformerPlan> {
        let points: Vec<PlanarPoint> = loads
            .iter()
            .map(|l| self.projection.project(&l.location))
            .collect();
        let clustering = cluster_points(&points, count, options)?;

        let mut transformers = Vec::with_capacity(clustering.k());
        for (label, members) in clustering.members().into_iter().enumerate() {
            let location = self.projection.unproject(&clustering.centroids[label])?;
            let group: Vec<&LoadNode> = members.iter().map(|&i| &loads[i]).collect();
            let id = TransformerId::new(label);
            transformers.push(self.size(id, format!("tr-{label}"), location, &group)?);
        }

        info!(
            loads = loads.len(),
            transformers = transformers.len(),
            inertia = clustering.inertia,
            "planned distribution transformers"
        );
        Ok(TransformerPlan {
            transformers,
            clustering,
        })
    }

    /// Size a single transformer serving `loads` at `location`.
    pub fn size(
        &self,
        id: TransformerId,
        name: impl Into<String>,
        location: GeoPoint,
        loads: &[&LoadNode],
    ) -> FeederResult<TransformerNode> {
        let name = name.into();
        let base: Kilowatts = loads.iter().map(|l| l.kw).sum();
        let estimate = self.estimator.estimate(loads.len(), base)?;
        let entry = self.select(estimate.required)?;

        debug!(
            transformer = %name,
            customers = loads.len(),
            base_kw = base.value(),
            required_kva = estimate.required.value(),
            entry = %entry.name,
            "sized transformer"
        );

        TransformerNode::new(
            id,
            name,
            location,
            self.class.clone(),
            loads.iter().map(|l| l.id).collect::<BTreeSet<_>>(),
            estimate.required,
            rating_from(entry),
        )
    }

    fn select(&self, required: KilovoltAmperes) -> FeederResult<&'a TransformerEntry> {
        let (ht, lt) = (self.class.ht_kv.value(), self.class.lt_kv.value());
        let in_class = |e: &TransformerEntry| {
            (e.ht_kv - ht).abs() <= KV_TOLERANCE && (e.lt_kv - lt).abs() <= KV_TOLERANCE
        };
        if !self.catalog.in_scope(self.scope.as_deref()).any(in_class) {
            return Err(FeederError::CapacityExceedsCatalog {
                required: required.value(),
                largest: None,
                scope: Some(
                    self.scope
                        .clone()
                        .unwrap_or_else(|| format!("{ht} kV / {lt} kV")),
                ),
            });
        }
        self.catalog
            .select_where(required.value(), self.scope.as_deref(), in_class)
    }
}

/// Size the substation transformer over every load in the feeder.
///
/// Its id follows the last distribution transformer so ids stay unique.
pub fn size_substation<D: DiversityFactor>(
    planner: &TransformerPlanner<'_, D>,
    location: GeoPoint,
    loads: &[LoadNode],
    distribution_count: usize,
) -> FeederResult<TransformerNode> {
    let all: Vec<&LoadNode> = loads.iter().collect();
    let node = planner.size(
        TransformerId::new(distribution_count),
        "substation",
        location,
        &all,
    )?;
    info!(
        kva = node.kva().value(),
        entry = node.catalog_entry(),
        "sized substation transformer"
    );
    Ok(node)
}

fn rating_from(entry: &TransformerEntry) -> TransformerRating {
    TransformerRating {
        catalog_entry: entry.name.clone(),
        kva: KilovoltAmperes(entry.kva),
        pct_resistance: entry.pct_resistance,
        pct_reactance: entry.pct_reactance,
        pct_no_load_loss: entry.pct_no_load_loss,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capacity::DiversityModel;
    use crate::test_utils::{sample_class, sample_load, sample_transformers, DEG_PER_M};
    use feedgen_core::{DesignFactors, Kilovolts, ProjectionKind};

    fn origin() -> GeoPoint {
        GeoPoint::new(0.0, 0.0).unwrap()
    }

    fn estimator() -> CapacityEstimator<DiversityModel> {
        CapacityEstimator::new(DiversityModel::Unity, DesignFactors::default()).unwrap()
    }

    fn two_blocks() -> Vec<LoadNode> {
        let mut loads = Vec::new();
        for i in 0..4 {
            let d = i as f64 * 10.0 * DEG_PER_M;
            loads.push(sample_load(loads.len(), d, d, 3.0));
        }
        for i in 0..4 {
            let d = (1000.0 + i as f64 * 10.0) * DEG_PER_M;
            loads.push(sample_load(loads.len(), d, d, 3.0));
        }
        loads
    }

    #[test]
    fn test_every_load_assigned_once() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            sample_class(),
            None,
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let loads = two_blocks();
        let plan = planner
            .plan(&loads, ClusterCount::Fixed(2), &KMeansOptions::default())
            .unwrap();

        assert_eq!(plan.transformers.len(), 2);
        let mut seen = BTreeSet::new();
        for t in &plan.transformers {
            assert_eq!(t.loads.len(), 4);
            for id in &t.loads {
                assert!(seen.insert(*id), "load {id} assigned twice");
            }
            assert!(t.kva() >= t.required_kva());
            assert!(t.catalog_entry().starts_with("dt-"));
        }
        assert_eq!(seen.len(), loads.len());
    }

    #[test]
    fn test_transformer_sits_at_cluster_centroid() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            sample_class(),
            None,
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let loads = two_blocks();
        let plan = planner
            .plan(&loads, ClusterCount::Fixed(2), &KMeansOptions::default())
            .unwrap();

        for t in &plan.transformers {
            let members: Vec<GeoPoint> = loads
                .iter()
                .filter(|l| t.loads.contains(&l.id))
                .map(|l| l.location)
                .collect();
            let expected = GeoPoint::centroid(&members).unwrap();
            assert!(t.location.haversine_m(&expected) < 0.5);
        }
    }

    #[test]
    fn test_sizing_uses_estimator() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            sample_class(),
            None,
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let loads: Vec<LoadNode> = (0..10)
            .map(|i| sample_load(i, 0.0, i as f64 * DEG_PER_M, 10.0))
            .collect();
        let refs: Vec<&LoadNode> = loads.iter().collect();
        let node = planner
            .size(TransformerId::new(0), "tr-0", origin(), &refs)
            .unwrap();

        // 100 kW grown at 4 % over 15 years, adjustment 1.25, pf 0.9
        let expected = 100.0 * 1.04f64.powi(15) * 1.25 / 0.9;
        assert!((node.required_kva().value() - expected).abs() < 1e-6);
        assert_eq!(node.catalog_entry(), "dt-400");
    }

    #[test]
    fn test_voltage_class_filters_catalog() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let mut class = sample_class();
        class.ht_kv = Kilovolts(22.0);
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            class,
            None,
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let load = sample_load(0, 0.0, 0.0, 1.0);
        let err = planner
            .size(TransformerId::new(0), "tr-0", origin(), &[&load])
            .unwrap_err();
        assert!(matches!(
            err,
            FeederError::CapacityExceedsCatalog { largest: None, .. }
        ));
    }

    #[test]
    fn test_oversized_cluster_fails() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            sample_class(),
            None,
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let load = sample_load(0, 0.0, 0.0, 5000.0);
        let err = planner
            .size(TransformerId::new(0), "tr-0", origin(), &[&load])
            .unwrap_err();
        assert!(matches!(
            err,
            FeederError::CapacityExceedsCatalog {
                largest: Some(l),
                ..
            } if (l - 1000.0).abs() < 1e-9
        ));
    }

    #[test]
    fn test_substation_transformer_covers_all_loads() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let class = TransformerClass {
            ht_kv: Kilovolts(33.0),
            lt_kv: Kilovolts(11.0),
            ..sample_class()
        };
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            class,
            Some("substation".to_string()),
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let loads = two_blocks();
        let node = size_substation(&planner, origin(), &loads, 2).unwrap();

        assert_eq!(node.id, TransformerId::new(2));
        assert_eq!(node.loads.len(), loads.len());
        assert_eq!(node.catalog_entry(), "st-5000");
    }

    #[test]
    fn test_no_loads_is_invalid_cluster_count() {
        let catalog = sample_transformers();
        let estimator = estimator();
        let planner = TransformerPlanner::new(
            &estimator,
            &catalog,
            sample_class(),
            None,
            Projection::new(ProjectionKind::LocalPlanar, origin()),
        )
        .unwrap();
        let err = planner
            .plan(&[], ClusterCount::default(), &KMeansOptions::default())
            .unwrap_err();
        assert!(matches!(err, FeederError::InvalidClusterCount { .. }));
    }
}
