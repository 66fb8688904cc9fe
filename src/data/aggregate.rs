use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use super::model::{Dimension, FarmRecord};

// ---------------------------------------------------------------------------
// Scalar KPIs
// ---------------------------------------------------------------------------

/// Headline metrics over a record set. Every field is zero for an empty set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Kpis {
    pub farm_count: usize,
    pub total_area: f64,
    pub total_production: f64,
    pub average_price: f64,
    /// Mean of per-farm `production / area`, skipping zero-area farms.
    pub average_yield: f64,
}

impl Kpis {
    pub fn compute(records: &[FarmRecord]) -> Self {
        let mut kpis = Kpis {
            farm_count: records.len(),
            ..Kpis::default()
        };
        let mut price_sum = 0.0;
        let mut yield_sum = 0.0;
        let mut yield_count = 0usize;

        for record in records {
            kpis.total_area += record.area_hectares;
            kpis.total_production += record.annual_production_tons;
            price_sum += record.sale_price_per_ton;
            if let Some(y) = record.yield_per_hectare() {
                yield_sum += y;
                yield_count += 1;
            }
        }

        kpis.average_price = mean(price_sum, records.len());
        kpis.average_yield = mean(yield_sum, yield_count);
        kpis
    }

    /// Projected income when market prices move to `multiplier_percent`
    /// of today's (100 = unchanged).
    pub fn simulated_income(&self, multiplier_percent: f64) -> f64 {
        simulated_income(self.total_production, self.average_price, multiplier_percent)
    }
}

pub fn simulated_income(total_production: f64, average_price: f64, multiplier_percent: f64) -> f64 {
    total_production * average_price * (multiplier_percent / 100.0)
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

// ---------------------------------------------------------------------------
// Grouped rollups
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupRollup {
    pub key: String,
    pub production_sum: f64,
    pub mean_area: f64,
    pub mean_price: f64,
    pub farm_count: usize,
}

#[derive(Default)]
struct GroupAcc {
    production: f64,
    area: f64,
    price: f64,
    count: usize,
}

/// Descending by value, ties broken by key ascending.
fn by_value_desc(a_value: f64, a_key: &str, b_value: f64, b_key: &str) -> Ordering {
    b_value.total_cmp(&a_value).then_with(|| a_key.cmp(b_key))
}

/// Production sum, mean area and mean price per distinct value of `dim`,
/// ordered by descending production.
pub fn rollup(records: &[FarmRecord], dim: Dimension) -> Vec<GroupRollup> {
    let mut groups: BTreeMap<String, GroupAcc> = BTreeMap::new();
    for record in records {
        let acc = groups.entry(dim.key(record)).or_default();
        acc.production += record.annual_production_tons;
        acc.area += record.area_hectares;
        acc.price += record.sale_price_per_ton;
        acc.count += 1;
    }

    let mut rows: Vec<GroupRollup> = groups
        .into_iter()
        .map(|(key, acc)| GroupRollup {
            key,
            production_sum: acc.production,
            mean_area: mean(acc.area, acc.count),
            mean_price: mean(acc.price, acc.count),
            farm_count: acc.count,
        })
        .collect();
    rows.sort_by(|a, b| by_value_desc(a.production_sum, &a.key, b.production_sum, &b.key));
    rows
}

// ---------------------------------------------------------------------------
// Chart series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyedTotal {
    pub key: String,
    pub total: f64,
}

fn keyed_totals<'a, I>(records: I, dim: Dimension, value: fn(&FarmRecord) -> f64) -> Vec<KeyedTotal>
where
    I: IntoIterator<Item = &'a FarmRecord>,
{
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for record in records {
        *totals.entry(dim.key(record)).or_default() += value(record);
    }
    let mut rows: Vec<KeyedTotal> = totals
        .into_iter()
        .map(|(key, total)| KeyedTotal { key, total })
        .collect();
    rows.sort_by(|a, b| by_value_desc(a.total, &a.key, b.total, &b.key));
    rows
}

/// Cultivated area per key (donut chart).
pub fn area_share(records: &[FarmRecord], dim: Dimension) -> Vec<KeyedTotal> {
    keyed_totals(records, dim, |r| r.area_hectares)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NestedTotal {
    pub key: String,
    pub total: f64,
    pub children: Vec<KeyedTotal>,
}

/// Two-level production totals (sunburst), both levels ordered like rollups.
pub fn nested_production(
    records: &[FarmRecord],
    outer: Dimension,
    inner: Dimension,
) -> Vec<NestedTotal> {
    let mut buckets: BTreeMap<String, Vec<&FarmRecord>> = BTreeMap::new();
    for record in records {
        buckets.entry(outer.key(record)).or_default().push(record);
    }

    let mut rows: Vec<NestedTotal> = buckets
        .into_iter()
        .map(|(key, members)| {
            let children = keyed_totals(members.iter().copied(), inner, |r| r.annual_production_tons);
            NestedTotal {
                key,
                total: children.iter().map(|c| c.total).sum(),
                children,
            }
        })
        .collect();
    rows.sort_by(|a, b| by_value_desc(a.total, &a.key, b.total, &b.key));
    rows
}

/// Five-number summary of sale prices for one key (box plot).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceDistribution {
    pub key: String,
    pub count: usize,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Price distribution per key, keys ascending.
pub fn price_distribution(records: &[FarmRecord], dim: Dimension) -> Vec<PriceDistribution> {
    let mut prices: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for record in records {
        prices
            .entry(dim.key(record))
            .or_default()
            .push(record.sale_price_per_ton);
    }

    prices
        .into_iter()
        .map(|(key, mut values)| {
            values.sort_by(f64::total_cmp);
            PriceDistribution {
                key,
                count: values.len(),
                min: quantile(&values, 0.0),
                q1: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q3: quantile(&values, 0.75),
                max: quantile(&values, 1.0),
            }
        })
        .collect()
}

/// Linear-interpolated quantile of sorted, non-empty values.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return 0.0;
    };
    let pos = q * last as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
