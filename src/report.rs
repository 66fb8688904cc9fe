use serde::Serialize;

use crate::data::aggregate::GroupRollup;
use crate::data::model::Dimension;
use crate::data::pipeline::ResultBundle;

/// Machine-readable report: the filtered bundle plus the view the user asked
/// for (price adjustment and grouping dimension).
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub price_factor: u32,
    pub simulated_income: f64,
    pub group_by: Dimension,
    pub groups: Vec<GroupRollup>,
    #[serde(flatten)]
    pub bundle: &'a ResultBundle,
}

impl<'a> ReportSummary<'a> {
    pub fn new(bundle: &'a ResultBundle, group_by: Dimension, price_factor: u32) -> Self {
        ReportSummary {
            price_factor,
            simulated_income: bundle.simulated_income(f64::from(price_factor)),
            group_by,
            groups: bundle.rollup(group_by),
            bundle,
        }
    }
}

/// Round to whole units and group thousands with commas: `1234567.8` → `1,234,568`.
pub fn format_thousands(value: f64) -> String {
    let rounded = value.round();
    let digits = format!("{:.0}", rounded.abs());
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// Plain-text dashboard: KPI block followed by the rollup table for `group_by`.
pub fn render_text(bundle: &ResultBundle, group_by: Dimension, price_factor: u32) -> String {
    let mut out = String::new();

    if bundle.is_empty() {
        out.push_str("No data matches the current filters.\n");
        return out;
    }

    let k = &bundle.kpis;
    let adjustment = i64::from(price_factor) - 100;
    let income = format_thousands(bundle.simulated_income(f64::from(price_factor)));
    out.push_str(&format!("Total production   {} Ton\n", format_thousands(k.total_production)));
    out.push_str(&format!("Cultivated area    {} Ha\n", format_thousands(k.total_area)));
    out.push_str(&format!("Projected income   ${income} ({adjustment:+}% price adjustment)\n"));
    out.push_str(&format!("Active farms       {}\n", k.farm_count));
    out.push_str(&format!("Average yield      {:.2} Ton/Ha\n", k.average_yield));
    out.push_str(&format!("Average price      ${}\n", format_thousands(k.average_price)));
    out.push('\n');

    let rows = bundle.rollup(group_by);
    let width = rows
        .iter()
        .map(|r| r.key.chars().count())
        .chain(std::iter::once(group_by.to_string().len()))
        .max()
        .unwrap_or(0);
    out.push_str(&format!(
        "{:<width$}  {:>14}  {:>10}  {:>14}  {:>6}\n",
        group_by.to_string(),
        "production",
        "mean area",
        "mean price",
        "farms"
    ));
    for r in rows {
        out.push_str(&format!(
            "{:<width$}  {:>14}  {:>10.2}  {:>14}  {:>6}\n",
            r.key,
            format_thousands(r.production_sum),
            r.mean_area,
            format_thousands(r.mean_price),
            r.farm_count
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::filter::FilterSpec;
    use crate::data::model::{Dataset, FarmRecord};
    use crate::data::pipeline::evaluate;

    fn farm(dept: &str, crop: &str, prod: f64) -> FarmRecord {
        FarmRecord {
            farm_id: "F".into(),
            department: dept.into(),
            crop_type: crop.into(),
            soil_type: "Franco".into(),
            technification_level: "Alto".into(),
            irrigation_technified: true,
            area_hectares: 2.0,
            annual_production_tons: prod,
            sale_price_per_ton: 1000.0,
            last_audit_date: None,
        }
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(0.0), "0");
        assert_eq!(format_thousands(999.4), "999");
        assert_eq!(format_thousands(1000.0), "1,000");
        assert_eq!(format_thousands(1234567.8), "1,234,568");
        assert_eq!(format_thousands(-4500.0), "-4,500");
    }

    #[test]
    fn text_report_lists_kpis_and_groups() {
        let ds = Dataset::from_records(
            vec![farm("Huila", "Cafe", 1500.0), farm("Meta", "Cafe", 10.0)],
            false,
            Vec::new(),
        );
        let text = render_text(&evaluate(&ds, &FilterSpec::default()), Dimension::Department, 90);
        assert!(text.contains("Total production   1,510 Ton"));
        assert!(text.contains("Projected income   $1,359,000 (-10% price adjustment)"));
        assert!(text.contains("Active farms       2"));
        let huila = text.find("Huila").unwrap();
        let meta = text.find("Meta").unwrap();
        assert!(huila < meta);
    }

    #[test]
    fn empty_report_says_so() {
        let ds = Dataset::from_records(Vec::new(), false, Vec::new());
        let text = render_text(&evaluate(&ds, &FilterSpec::default()), Dimension::SoilType, 100);
        assert_eq!(text, "No data matches the current filters.\n");
    }

    #[test]
    fn every_report_line_is_terminated() {
        let ds = Dataset::from_records(
            vec![farm("Huila", "Cafe", 1500.0), farm("Meta", "Arroz", 10.0)],
            false,
            Vec::new(),
        );
        let text = render_text(&evaluate(&ds, &FilterSpec::default()), Dimension::CropType, 100);
        assert!(text.ends_with('\n'));
        // Six KPI lines, a blank separator, the table header and one row per crop.
        assert_eq!(text.lines().count(), 10);
        assert!(text.lines().nth(7).is_some_and(|l| l.starts_with("crop")));
    }

    #[test]
    fn json_summary_follows_price_and_grouping() {
        let ds = Dataset::from_records(
            vec![farm("Huila", "Cafe", 1500.0), farm("Meta", "Arroz", 10.0)],
            false,
            Vec::new(),
        );
        let bundle = evaluate(&ds, &FilterSpec::default());
        let summary = ReportSummary::new(&bundle, Dimension::CropType, 90);
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["price_factor"], 90);
        assert_eq!(json["simulated_income"], 1_359_000.0);
        assert_eq!(json["group_by"], "crop_type");
        let keys: Vec<&str> = json["groups"]
            .as_array()
            .unwrap()
            .iter()
            .map(|g| g["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, vec!["Cafe", "Arroz"]);
        // Bundle fields stay at the top level.
        assert_eq!(json["kpis"]["farm_count"], 2);
        assert_eq!(json["records"].as_array().map(Vec::len), Some(2));
    }
}
