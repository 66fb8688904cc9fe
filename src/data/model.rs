use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Column contract of the source file
// ---------------------------------------------------------------------------

pub const COL_FARM_ID: &str = "ID_Finca";
pub const COL_DEPARTMENT: &str = "Departamento";
pub const COL_CROP_TYPE: &str = "Tipo_Cultivo";
pub const COL_SOIL_TYPE: &str = "Tipo_Suelo";
pub const COL_TECHNIFICATION: &str = "Nivel_Tecnificacion";
pub const COL_IRRIGATION: &str = "Sistema_Riego_Tecnificado";
pub const COL_AREA: &str = "Area_Hectareas";
pub const COL_PRODUCTION: &str = "Produccion_Anual_Ton";
pub const COL_PRICE: &str = "Precio_Venta_Por_Ton_COP";
pub const COL_AUDIT_DATE: &str = "Fecha_Ultima_Auditoria";

/// Columns in export order. The audit date is appended only when the source had it.
pub const BASE_COLUMNS: [&str; 9] = [
    COL_FARM_ID,
    COL_DEPARTMENT,
    COL_CROP_TYPE,
    COL_SOIL_TYPE,
    COL_TECHNIFICATION,
    COL_IRRIGATION,
    COL_AREA,
    COL_PRODUCTION,
    COL_PRICE,
];

/// Columns whose absence makes a source unusable.
pub const STRUCTURAL_COLUMNS: [&str; 5] = [
    COL_DEPARTMENT,
    COL_CROP_TYPE,
    COL_AREA,
    COL_PRODUCTION,
    COL_PRICE,
];

// ---------------------------------------------------------------------------
// FarmRecord – one row of the source table
// ---------------------------------------------------------------------------

/// A single farm/plot observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmRecord {
    pub farm_id: String,
    pub department: String,
    pub crop_type: String,
    pub soil_type: String,
    /// Ordinal category, e.g. `Bajo` / `Medio` / `Alto`.
    pub technification_level: String,
    pub irrigation_technified: bool,
    pub area_hectares: f64,
    pub annual_production_tons: f64,
    /// Currency units (COP) per ton.
    pub sale_price_per_ton: f64,
    pub last_audit_date: Option<NaiveDate>,
}

impl FarmRecord {
    /// Production per hectare, `None` when the area is zero.
    pub fn yield_per_hectare(&self) -> Option<f64> {
        if self.area_hectares == 0.0 {
            None
        } else {
            Some(self.annual_production_tons / self.area_hectares)
        }
    }
}

// ---------------------------------------------------------------------------
// Dimension – categorical columns usable for filtering and grouping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Department,
    CropType,
    SoilType,
    TechnificationLevel,
    IrrigationTechnified,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Department,
        Dimension::CropType,
        Dimension::SoilType,
        Dimension::TechnificationLevel,
        Dimension::IrrigationTechnified,
    ];

    /// The grouping key of `record` along this dimension.
    pub fn key(self, record: &FarmRecord) -> String {
        match self {
            Dimension::Department => record.department.clone(),
            Dimension::CropType => record.crop_type.clone(),
            Dimension::SoilType => record.soil_type.clone(),
            Dimension::TechnificationLevel => record.technification_level.clone(),
            Dimension::IrrigationTechnified => format_bool(record.irrigation_technified).to_string(),
        }
    }

    /// Source column backing this dimension.
    pub fn column(self) -> &'static str {
        match self {
            Dimension::Department => COL_DEPARTMENT,
            Dimension::CropType => COL_CROP_TYPE,
            Dimension::SoilType => COL_SOIL_TYPE,
            Dimension::TechnificationLevel => COL_TECHNIFICATION,
            Dimension::IrrigationTechnified => COL_IRRIGATION,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dimension::Department => "department",
            Dimension::CropType => "crop_type",
            Dimension::SoilType => "soil_type",
            Dimension::TechnificationLevel => "technification_level",
            Dimension::IrrigationTechnified => "irrigation_technified",
        };
        f.write_str(name)
    }
}

/// Text form of a boolean cell, as written on export.
pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

// ---------------------------------------------------------------------------
// Row defects – rows excluded during load
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowDefectKind {
    /// A required numeric cell is empty, non-numeric or not finite.
    InvalidNumber { column: String, value: String },
    InvalidBool { column: String, value: String },
    InvalidDate { value: String },
    /// The row could not be read at all (e.g. wrong field count).
    Unreadable { reason: String },
}

impl fmt::Display for RowDefectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowDefectKind::InvalidNumber { column, value } => {
                write!(f, "column '{column}': '{value}' is not a number")
            }
            RowDefectKind::InvalidBool { column, value } => {
                write!(f, "column '{column}': '{value}' is not a boolean")
            }
            RowDefectKind::InvalidDate { value } => {
                write!(f, "column '{COL_AUDIT_DATE}': '{value}' is not a date")
            }
            RowDefectKind::Unreadable { reason } => write!(f, "unreadable row: {reason}"),
        }
    }
}

/// A row excluded from the dataset. `row` is the 1-based data row number
/// (the header is not counted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDefect {
    pub row: usize,
    pub kind: RowDefectKind,
}

impl fmt::Display for RowDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.kind)
    }
}

// ---------------------------------------------------------------------------
// Dataset – the complete loaded table
// ---------------------------------------------------------------------------

/// The parsed dataset with pre-computed per-dimension value indices.
/// Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// Accepted rows, in source order.
    pub records: Vec<FarmRecord>,
    /// Whether the source carried the audit-date column.
    pub has_audit_date: bool,
    /// Rows excluded during load.
    pub rejected: Vec<RowDefect>,
    /// For each dimension the sorted set of distinct values.
    pub unique_values: BTreeMap<Dimension, BTreeSet<String>>,
}

impl Dataset {
    /// Build dimension indices from the loaded records.
    pub fn from_records(
        records: Vec<FarmRecord>,
        has_audit_date: bool,
        rejected: Vec<RowDefect>,
    ) -> Self {
        let mut unique_values: BTreeMap<Dimension, BTreeSet<String>> = Dimension::ALL
            .iter()
            .map(|dim| (*dim, BTreeSet::new()))
            .collect();

        for record in &records {
            for dim in Dimension::ALL {
                unique_values
                    .entry(dim)
                    .or_default()
                    .insert(dim.key(record));
            }
        }

        Dataset {
            records,
            has_audit_date,
            rejected,
            unique_values,
        }
    }

    /// Number of accepted records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the dataset is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of rows excluded during load.
    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    /// Sorted distinct values of a dimension.
    pub fn values(&self, dim: Dimension) -> impl Iterator<Item = &str> {
        self.unique_values
            .get(&dim)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}
