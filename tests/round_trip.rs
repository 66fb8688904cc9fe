use std::fs;
use std::sync::Arc;

use agro_panda::data::cache::DatasetCache;
use agro_panda::data::export::{csv_bytes, write_parquet};
use agro_panda::data::loader::{load_csv, load_file};
use agro_panda::{evaluate, FarmRecord, FilterSpec, LoadError};
use tempfile::tempdir;

const FARMS: &str = "\
ID_Finca;Departamento;Tipo_Cultivo;Tipo_Suelo;Nivel_Tecnificacion;Sistema_Riego_Tecnificado;Area_Hectareas;Produccion_Anual_Ton;Precio_Venta_Por_Ton_COP;Fecha_Ultima_Auditoria
F001;Huila;Cafe;Franco;Alto;Sí;10.25;12.1;9000000;2024-02-10
F002;Huila;Cafe;Arcilloso;Medio;No;25;20;8800000;10/07/2023
F003;Meta;Arroz;Franco;Alto;True;40.333;210;1600000;
F004;Meta;Maiz;Limoso;Bajo;False;3;x;1300000;2024-05-20
";

fn assert_same_records(a: &[FarmRecord], b: &[FarmRecord]) {
    assert_eq!(a.len(), b.len());
    for (x, y) in a.iter().zip(b) {
        assert_eq!(x.farm_id, y.farm_id);
        assert_eq!(x.department, y.department);
        assert_eq!(x.crop_type, y.crop_type);
        assert_eq!(x.soil_type, y.soil_type);
        assert_eq!(x.technification_level, y.technification_level);
        assert_eq!(x.irrigation_technified, y.irrigation_technified);
        assert!((x.area_hectares - y.area_hectares).abs() < 1e-9);
        assert!((x.annual_production_tons - y.annual_production_tons).abs() < 1e-9);
        assert!((x.sale_price_per_ton - y.sale_price_per_ton).abs() < 1e-6);
        assert_eq!(x.last_audit_date, y.last_audit_date);
    }
}

#[test]
fn csv_export_reloads_to_the_same_records() {
    let ds = load_csv(FARMS.as_bytes()).unwrap();
    assert_eq!(ds.len(), 3);
    assert_eq!(ds.rejected_count(), 1);

    let bundle = evaluate(&ds, &FilterSpec::default());
    let exported = csv_bytes(&bundle.records, bundle.has_audit_date).unwrap();
    let reloaded = load_csv(&exported).unwrap();
    assert!(reloaded.has_audit_date);
    assert_eq!(reloaded.rejected_count(), 0);
    assert_same_records(&bundle.records, &reloaded.records);
}

#[test]
fn parquet_export_reloads_to_the_same_records() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("farms.parquet");
    let ds = load_csv(FARMS.as_bytes()).unwrap();

    write_parquet(&ds.records, ds.has_audit_date, fs::File::create(&path).unwrap()).unwrap();
    let reloaded = load_file(&path).unwrap();
    assert_same_records(&ds.records, &reloaded.records);
}

#[test]
fn json_files_load_by_extension() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("farms.json");
    let ds = load_csv(FARMS.as_bytes()).unwrap();
    fs::write(&path, serde_json::to_string(&raw_rows(&ds.records)).unwrap()).unwrap();

    let reloaded = load_file(&path).unwrap();
    assert_same_records(&ds.records, &reloaded.records);
}

/// Records in the source's column naming, as a records-oriented JSON export would hold them.
fn raw_rows(records: &[FarmRecord]) -> Vec<serde_json::Value> {
    records
        .iter()
        .map(|r| {
            serde_json::json!({
                "ID_Finca": r.farm_id,
                "Departamento": r.department,
                "Tipo_Cultivo": r.crop_type,
                "Tipo_Suelo": r.soil_type,
                "Nivel_Tecnificacion": r.technification_level,
                "Sistema_Riego_Tecnificado": r.irrigation_technified,
                "Area_Hectareas": r.area_hectares,
                "Produccion_Anual_Ton": r.annual_production_tons,
                "Precio_Venta_Por_Ton_COP": r.sale_price_per_ton,
                "Fecha_Ultima_Auditoria": r.last_audit_date.map(|d| d.to_string()),
            })
        })
        .collect()
}

#[test]
fn cache_reuses_identical_file_contents() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("a.csv");
    let second = dir.path().join("b.csv");
    fs::write(&first, FARMS).unwrap();
    fs::write(&second, FARMS).unwrap();

    let cache = DatasetCache::new();
    let a = cache.load_file(&first).unwrap();
    let b = cache.load_file(&second).unwrap();
    assert!(Arc::ptr_eq(&a, &b));

    fs::write(&second, format!("{FARMS}F005;Cauca;Cafe;Franco;Medio;True;8;9;9400000;\n")).unwrap();
    let c = cache.load_file(&second).unwrap();
    assert!(!Arc::ptr_eq(&a, &c));
    assert_eq!(c.len(), 4);
    assert_eq!(cache.len(), 2);
}

#[test]
fn unknown_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("farms.xlsx");
    fs::write(&path, FARMS).unwrap();
    assert!(matches!(load_file(&path), Err(LoadError::UnsupportedFormat(_))));
}
