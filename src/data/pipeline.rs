use serde::Serialize;

use super::aggregate::{
    area_share, nested_production, price_distribution, rollup, GroupRollup, KeyedTotal, Kpis,
    NestedTotal, PriceDistribution,
};
use super::filter::{filtered_indices, FilterSpec};
use super::model::{Dataset, Dimension, FarmRecord};

/// Everything the presentation layer shows for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultBundle {
    /// Matching records, in dataset order.
    pub records: Vec<FarmRecord>,
    pub kpis: Kpis,
    pub by_department: Vec<GroupRollup>,
    pub by_soil_type: Vec<GroupRollup>,
    pub by_technification: Vec<GroupRollup>,
    /// Carried over from the dataset so exports keep its column layout.
    #[serde(skip)]
    pub has_audit_date: bool,
}

/// Apply `spec` to `dataset` and summarise the matching records.
///
/// Pure: identical inputs always produce identical bundles.
pub fn evaluate(dataset: &Dataset, spec: &FilterSpec) -> ResultBundle {
    let records: Vec<FarmRecord> = filtered_indices(dataset, spec)
        .into_iter()
        .map(|i| dataset.records[i].clone())
        .collect();

    ResultBundle {
        kpis: Kpis::compute(&records),
        by_department: rollup(&records, Dimension::Department),
        by_soil_type: rollup(&records, Dimension::SoilType),
        by_technification: rollup(&records, Dimension::TechnificationLevel),
        has_audit_date: dataset.has_audit_date,
        records,
    }
}

impl ResultBundle {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rollup along any dimension.
    pub fn rollup(&self, dim: Dimension) -> Vec<GroupRollup> {
        match dim {
            Dimension::Department => self.by_department.clone(),
            Dimension::SoilType => self.by_soil_type.clone(),
            Dimension::TechnificationLevel => self.by_technification.clone(),
            other => rollup(&self.records, other),
        }
    }

    pub fn simulated_income(&self, multiplier_percent: f64) -> f64 {
        self.kpis.simulated_income(multiplier_percent)
    }

    pub fn area_share(&self, dim: Dimension) -> Vec<KeyedTotal> {
        area_share(&self.records, dim)
    }

    pub fn nested_production(&self, outer: Dimension, inner: Dimension) -> Vec<NestedTotal> {
        nested_production(&self.records, outer, inner)
    }

    pub fn price_distribution(&self, dim: Dimension) -> Vec<PriceDistribution> {
        price_distribution(&self.records, dim)
    }
}
