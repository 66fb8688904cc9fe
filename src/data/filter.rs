use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{Dataset, Dimension, FarmRecord};

// ---------------------------------------------------------------------------
// Filter predicate: which records pass the current sidebar constraints
// ---------------------------------------------------------------------------

/// Inclusive numeric bound, `min <= value <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter {
    pub min: f64,
    pub max: f64,
}

impl RangeFilter {
    pub fn new(min: f64, max: f64) -> Self {
        RangeFilter { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min <= value && value <= self.max
    }
}

/// User-chosen constraints, combined with logical AND.
///
/// `None` on any field means "no constraint on this dimension". For the
/// set-valued fields, `Some(empty set)` is a real constraint that nothing
/// satisfies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FilterSpec {
    pub department_in: Option<BTreeSet<String>>,
    pub crop_type_in: Option<BTreeSet<String>>,
    pub soil_type_eq: Option<String>,
    pub technification_eq: Option<String>,
    pub area_range: Option<RangeFilter>,
    pub production_range: Option<RangeFilter>,
    pub audit_date_from: Option<NaiveDate>,
    /// Case-insensitive substring of `farm_id`.
    pub id_substring: Option<String>,
}

impl FilterSpec {
    /// The dashboard's initial selection: the first two departments in
    /// sorted order and every crop type.
    pub fn dashboard_defaults(dataset: &Dataset) -> Self {
        FilterSpec {
            department_in: Some(
                dataset
                    .values(Dimension::Department)
                    .take(2)
                    .map(String::from)
                    .collect(),
            ),
            crop_type_in: Some(dataset.values(Dimension::CropType).map(String::from).collect()),
            ..FilterSpec::default()
        }
    }

    /// Multi-select state for dimensions filtered by set membership.
    pub fn selection_mut(&mut self, dim: Dimension) -> Option<&mut Option<BTreeSet<String>>> {
        match dim {
            Dimension::Department => Some(&mut self.department_in),
            Dimension::CropType => Some(&mut self.crop_type_in),
            _ => None,
        }
    }

    /// Whether a record satisfies every active constraint.
    pub fn matches(&self, record: &FarmRecord) -> bool {
        if let Some(set) = &self.department_in {
            if !set.contains(&record.department) {
                return false;
            }
        }
        if let Some(set) = &self.crop_type_in {
            if !set.contains(&record.crop_type) {
                return false;
            }
        }
        if let Some(soil) = &self.soil_type_eq {
            if record.soil_type != *soil {
                return false;
            }
        }
        if let Some(level) = &self.technification_eq {
            if record.technification_level != *level {
                return false;
            }
        }
        if let Some(range) = &self.area_range {
            if !range.contains(record.area_hectares) {
                return false;
            }
        }
        if let Some(range) = &self.production_range {
            if !range.contains(record.annual_production_tons) {
                return false;
            }
        }
        if let Some(from) = self.audit_date_from {
            // Never-audited farms cannot satisfy a lower date bound.
            match record.last_audit_date {
                Some(date) if date >= from => {}
                _ => return false,
            }
        }
        if let Some(needle) = &self.id_substring {
            if !record
                .farm_id
                .to_lowercase()
                .contains(&needle.to_lowercase())
            {
                return false;
            }
        }
        true
    }

    /// Number of non-null constraints.
    pub fn active_constraints(&self) -> usize {
        [
            self.department_in.is_some(),
            self.crop_type_in.is_some(),
            self.soil_type_eq.is_some(),
            self.technification_eq.is_some(),
            self.area_range.is_some(),
            self.production_range.is_some(),
            self.audit_date_from.is_some(),
            self.id_substring.is_some(),
        ]
        .iter()
        .filter(|active| **active)
        .count()
    }
}

/// Return indices of records that pass all active filters, in dataset order.
pub fn filtered_indices(dataset: &Dataset, spec: &FilterSpec) -> Vec<usize> {
    dataset
        .records
        .iter()
        .enumerate()
        .filter(|(_, record)| spec.matches(record))
        .map(|(i, _)| i)
        .collect()
}
