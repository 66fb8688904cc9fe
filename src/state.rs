use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use log::debug;

use crate::data::export::csv_bytes;
use crate::data::error::ExportError;
use crate::data::filter::{FilterSpec, RangeFilter};
use crate::data::model::{Dataset, Dimension};
use crate::data::pipeline::{evaluate, ResultBundle};

/// Bounds of the market price slider, in percent.
pub const PRICE_FACTOR_RANGE: (u32, u32) = (80, 120);

const NO_MATCH_MESSAGE: &str = "No data matches the current filters";

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// The state of one interactive session, independent of rendering.
#[derive(Debug)]
pub struct Session {
    /// Loaded dataset (None until a source is loaded).
    pub dataset: Option<Arc<Dataset>>,

    /// Current sidebar constraints.
    pub filters: FilterSpec,

    /// Market price adjustment in percent (100 = unchanged).
    pub price_factor: u32,

    /// Result for the current filters (cached).
    pub result: Option<ResultBundle>,

    /// Status / error message shown to the user.
    pub status_message: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            dataset: None,
            filters: FilterSpec::default(),
            price_factor: 100,
            result: None,
            status_message: None,
        }
    }
}

impl Session {
    /// Ingest a newly loaded dataset and reset filters to the dashboard defaults.
    pub fn set_dataset(&mut self, dataset: Arc<Dataset>) {
        self.filters = FilterSpec::dashboard_defaults(&dataset);
        self.status_message = match dataset.rejected_count() {
            0 => None,
            n => Some(format!("{n} rows could not be read and were skipped")),
        };
        self.dataset = Some(dataset);
        self.refilter();
    }

    /// Replace all filters at once.
    pub fn set_filters(&mut self, filters: FilterSpec) {
        self.filters = filters;
        self.refilter();
    }

    /// Recompute `result` after a filter change.
    pub fn refilter(&mut self) {
        if let Some(ds) = &self.dataset {
            let bundle = evaluate(ds, &self.filters);
            debug!(
                "{} of {} farms match {} active constraints",
                bundle.kpis.farm_count,
                ds.len(),
                self.filters.active_constraints()
            );
            if bundle.is_empty() {
                self.status_message = Some(NO_MATCH_MESSAGE.to_string());
            } else if self.status_message.as_deref() == Some(NO_MATCH_MESSAGE) {
                self.status_message = None;
            }
            self.result = Some(bundle);
        }
    }

    /// Toggle a single value in a multi-select filter. A column without a
    /// constraint starts from "everything selected".
    pub fn toggle_filter_value(&mut self, dim: Dimension, value: &str) {
        let all = self.all_values(dim);
        let Some(selection) = self.filters.selection_mut(dim) else {
            return;
        };
        let selected = selection.get_or_insert(all);
        if !selected.remove(value) {
            selected.insert(value.to_string());
        }
        self.refilter();
    }

    /// Select all values in a multi-select filter.
    pub fn select_all(&mut self, dim: Dimension) {
        let all = self.all_values(dim);
        if let Some(selection) = self.filters.selection_mut(dim) {
            *selection = Some(all);
            self.refilter();
        }
    }

    /// Deselect all values in a multi-select filter.
    pub fn select_none(&mut self, dim: Dimension) {
        if let Some(selection) = self.filters.selection_mut(dim) {
            *selection = Some(BTreeSet::new());
            self.refilter();
        }
    }

    pub fn set_soil_type(&mut self, soil: Option<String>) {
        self.filters.soil_type_eq = soil;
        self.refilter();
    }

    pub fn set_technification(&mut self, level: Option<String>) {
        self.filters.technification_eq = level;
        self.refilter();
    }

    pub fn set_area_range(&mut self, range: Option<RangeFilter>) {
        self.filters.area_range = range;
        self.refilter();
    }

    pub fn set_production_range(&mut self, range: Option<RangeFilter>) {
        self.filters.production_range = range;
        self.refilter();
    }

    pub fn set_audit_date_from(&mut self, from: Option<NaiveDate>) {
        self.filters.audit_date_from = from;
        self.refilter();
    }

    pub fn set_id_search(&mut self, needle: Option<String>) {
        self.filters.id_substring = needle.filter(|s| !s.is_empty());
        self.refilter();
    }

    /// Set the price slider, clamped to its bounds. No refilter needed.
    pub fn set_price_factor(&mut self, percent: u32) {
        self.price_factor = percent.clamp(PRICE_FACTOR_RANGE.0, PRICE_FACTOR_RANGE.1);
    }

    /// Projected income for the current filters and price slider.
    pub fn simulated_income(&self) -> f64 {
        self.result
            .as_ref()
            .map(|r| r.simulated_income(f64::from(self.price_factor)))
            .unwrap_or(0.0)
    }

    /// CSV download of the currently filtered records.
    pub fn export_csv(&self) -> Result<Option<Vec<u8>>, ExportError> {
        self.result
            .as_ref()
            .map(|r| csv_bytes(&r.records, r.has_audit_date))
            .transpose()
    }

    fn all_values(&self, dim: Dimension) -> BTreeSet<String> {
        self.dataset
            .as_ref()
            .map(|ds| ds.values(dim).map(String::from).collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::FarmRecord;

    fn farm(id: &str, dept: &str, crop: &str, prod: f64) -> FarmRecord {
        FarmRecord {
            farm_id: id.into(),
            department: dept.into(),
            crop_type: crop.into(),
            soil_type: "Franco".into(),
            technification_level: "Medio".into(),
            irrigation_technified: false,
            area_hectares: 1.0,
            annual_production_tons: prod,
            sale_price_per_ton: 10.0,
            last_audit_date: None,
        }
    }

    fn session() -> Session {
        let mut s = Session::default();
        s.set_dataset(Arc::new(Dataset::from_records(
            vec![
                farm("F1", "Antioquia", "Cafe", 1.0),
                farm("F2", "Boyaca", "Papa", 2.0),
                farm("F3", "Cauca", "Cafe", 3.0),
            ],
            false,
            Vec::new(),
        )));
        s
    }

    fn count(s: &Session) -> usize {
        s.result.as_ref().map(|r| r.kpis.farm_count).unwrap_or(0)
    }

    #[test]
    fn defaults_show_first_two_departments() {
        let s = session();
        assert_eq!(count(&s), 2);
        assert_eq!(s.status_message, None);
    }

    #[test]
    fn toggling_and_bulk_selection() {
        let mut s = session();
        s.toggle_filter_value(Dimension::Department, "Cauca");
        assert_eq!(count(&s), 3);
        s.toggle_filter_value(Dimension::Department, "Antioquia");
        assert_eq!(count(&s), 2);
        s.select_none(Dimension::CropType);
        assert_eq!(count(&s), 0);
        assert!(s.status_message.is_some());
        s.select_all(Dimension::CropType);
        assert_eq!(count(&s), 2);
        assert_eq!(s.status_message, None);
    }

    #[test]
    fn toggle_on_unconstrained_column_starts_from_everything() {
        let mut s = session();
        s.set_filters(FilterSpec::default());
        s.toggle_filter_value(Dimension::CropType, "Papa");
        assert_eq!(count(&s), 2);
    }

    #[test]
    fn price_factor_is_clamped() {
        let mut s = session();
        s.set_price_factor(500);
        assert_eq!(s.price_factor, 120);
        // Antioquia + Boyaca: production 3, price 10.
        assert_eq!(s.simulated_income(), 36.0);
    }

    #[test]
    fn export_is_none_without_dataset() {
        assert!(Session::default().export_csv().unwrap().is_none());
        let bytes = session().export_csv().unwrap().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap().lines().count(), 3);
    }
}
