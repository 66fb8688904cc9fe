use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use agro_panda::data::export::DEFAULT_EXPORT_NAME;
use agro_panda::data::filter::{FilterSpec, RangeFilter};
use agro_panda::data::model::{Dataset, Dimension};
use agro_panda::state::PRICE_FACTOR_RANGE;

#[derive(Parser, Debug)]
#[command(
    name = "agro-panda",
    version,
    about = "Filter, summarise and export agricultural farm datasets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print KPIs and grouped rollups for the filtered farms.
    Report(ReportArgs),
    /// Write the filtered farms to a .csv or .parquet file.
    Export(ExportArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Market price adjustment in percent (80..=120).
    #[arg(
        long,
        default_value_t = 100,
        value_parser = clap::value_parser!(u32)
            .range(i64::from(PRICE_FACTOR_RANGE.0)..=i64::from(PRICE_FACTOR_RANGE.1))
    )]
    pub price_factor: u32,

    #[arg(long, value_enum, default_value_t = GroupBy::Department)]
    pub group_by: GroupBy,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    #[arg(long, default_value = DEFAULT_EXPORT_NAME)]
    pub output: PathBuf,
}

/// Input file plus filter configuration shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Source file (.csv, .json or .parquet).
    #[arg(long)]
    pub input: PathBuf,

    /// JSON file holding a filter spec; inline flags override its fields.
    #[arg(long)]
    pub filters: Option<PathBuf>,

    /// Start from the dashboard's initial selection instead of "everything".
    #[arg(long, default_value_t = false)]
    pub dashboard_defaults: bool,

    #[arg(long = "department")]
    pub departments: Vec<String>,

    #[arg(long = "crop")]
    pub crops: Vec<String>,

    #[arg(long)]
    pub soil: Option<String>,

    #[arg(long)]
    pub technification: Option<String>,

    #[arg(long)]
    pub min_area: Option<f64>,

    #[arg(long)]
    pub max_area: Option<f64>,

    #[arg(long)]
    pub min_production: Option<f64>,

    #[arg(long)]
    pub max_production: Option<f64>,

    /// Only farms audited on or after this date (YYYY-MM-DD).
    #[arg(long)]
    pub audit_from: Option<NaiveDate>,

    /// Case-insensitive fragment of the farm id.
    #[arg(long)]
    pub id_contains: Option<String>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum GroupBy {
    Department,
    Crop,
    Soil,
    Technification,
    Irrigation,
}

impl From<GroupBy> for Dimension {
    fn from(value: GroupBy) -> Self {
        match value {
            GroupBy::Department => Dimension::Department,
            GroupBy::Crop => Dimension::CropType,
            GroupBy::Soil => Dimension::SoilType,
            GroupBy::Technification => Dimension::TechnificationLevel,
            GroupBy::Irrigation => Dimension::IrrigationTechnified,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl SourceArgs {
    /// Build the effective filter spec: file or defaults first, then inline flags.
    pub fn filter_spec(&self, dataset: &Dataset) -> Result<FilterSpec> {
        let mut spec = match &self.filters {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read filter file: {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse filter file: {}", path.display()))?
            }
            None if self.dashboard_defaults => FilterSpec::dashboard_defaults(dataset),
            None => FilterSpec::default(),
        };

        if !self.departments.is_empty() {
            spec.department_in = Some(self.departments.iter().cloned().collect());
        }
        if !self.crops.is_empty() {
            spec.crop_type_in = Some(self.crops.iter().cloned().collect());
        }
        if self.soil.is_some() {
            spec.soil_type_eq = self.soil.clone();
        }
        if self.technification.is_some() {
            spec.technification_eq = self.technification.clone();
        }
        if let Some(range) = open_range(self.min_area, self.max_area) {
            spec.area_range = Some(range);
        }
        if let Some(range) = open_range(self.min_production, self.max_production) {
            spec.production_range = Some(range);
        }
        if self.audit_from.is_some() {
            spec.audit_date_from = self.audit_from;
        }
        if self.id_contains.is_some() {
            spec.id_substring = self.id_contains.clone();
        }
        Ok(spec)
    }
}

fn open_range(min: Option<f64>, max: Option<f64>) -> Option<RangeFilter> {
    if min.is_none() && max.is_none() {
        return None;
    }
    Some(RangeFilter::new(
        min.unwrap_or(f64::NEG_INFINITY),
        max.unwrap_or(f64::INFINITY),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> SourceArgs {
        let cli = Cli::try_parse_from(args.iter().copied()).unwrap();
        match cli.command {
            Commands::Report(args) => args.source,
            Commands::Export(args) => args.source,
        }
    }

    #[test]
    fn inline_flags_build_a_spec() {
        let source = parse(&[
            "agro-panda", "report", "--input", "farms.csv", "--department", "Huila",
            "--department", "Meta", "--min-area", "5", "--audit-from", "2024-01-31",
        ]);
        let empty = Dataset::from_records(Vec::new(), false, Vec::new());
        let spec = source.filter_spec(&empty).unwrap();
        assert_eq!(spec.department_in.map(|s| s.len()), Some(2));
        assert_eq!(spec.area_range, Some(RangeFilter::new(5.0, f64::INFINITY)));
        assert_eq!(spec.audit_date_from, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(spec.crop_type_in, None);
    }

    #[test]
    fn export_defaults_to_dashboard_file_name() {
        let cli = Cli::try_parse_from(["agro-panda", "export", "--input", "farms.csv"]).unwrap();
        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.output, PathBuf::from(DEFAULT_EXPORT_NAME));
    }

    #[test]
    fn price_factor_outside_slider_range_is_refused() {
        let with_factor = |factor: &str| {
            Cli::try_parse_from(["agro-panda", "report", "--input", "farms.csv", "--price-factor", factor])
        };
        assert!(with_factor("500").is_err());
        assert!(with_factor("79").is_err());

        let Commands::Report(args) = with_factor("80").unwrap().command else {
            panic!("expected report");
        };
        assert_eq!(args.price_factor, 80);
    }
}
