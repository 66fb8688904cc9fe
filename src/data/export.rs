use std::io::Write;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Date32Array, Float64Array, StringArray};
use chrono::NaiveDate;
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;

use super::error::ExportError;
use super::model::{format_bool, FarmRecord, BASE_COLUMNS, COL_AUDIT_DATE};

/// File name offered for the filtered download.
pub const DEFAULT_EXPORT_NAME: &str = "reporte_agro_clean.csv";

fn header(with_audit_column: bool) -> Vec<&'static str> {
    let mut cols = BASE_COLUMNS.to_vec();
    if with_audit_column {
        cols.push(COL_AUDIT_DATE);
    }
    cols
}

/// Write records as comma-separated UTF-8 text with a header row and no
/// index column. Dates are ISO `YYYY-MM-DD`, booleans `True` / `False`.
pub fn write_csv<W: Write>(
    records: &[FarmRecord],
    with_audit_column: bool,
    writer: W,
) -> Result<(), ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(header(with_audit_column))?;

    for r in records {
        let area = r.area_hectares.to_string();
        let production = r.annual_production_tons.to_string();
        let price = r.sale_price_per_ton.to_string();
        let mut row = vec![
            r.farm_id.as_str(),
            r.department.as_str(),
            r.crop_type.as_str(),
            r.soil_type.as_str(),
            r.technification_level.as_str(),
            format_bool(r.irrigation_technified),
            area.as_str(),
            production.as_str(),
            price.as_str(),
        ];
        let audit = r
            .last_audit_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        if with_audit_column {
            row.push(audit.as_str());
        }
        out.write_record(&row)?;
    }

    out.flush()?;
    info!("exported {} records as csv", records.len());
    Ok(())
}

/// Render the CSV export into memory, ready for a download button.
pub fn csv_bytes(records: &[FarmRecord], with_audit_column: bool) -> Result<Vec<u8>, ExportError> {
    let mut buf = Vec::new();
    write_csv(records, with_audit_column, &mut buf)?;
    Ok(buf)
}

/// Write records as a single-batch Parquet file with the source column names.
pub fn write_parquet<W: Write + Send>(
    records: &[FarmRecord],
    with_audit_column: bool,
    writer: W,
) -> Result<(), ExportError> {
    let text = |f: fn(&FarmRecord) -> &str| -> ArrayRef {
        Arc::new(StringArray::from(records.iter().map(f).collect::<Vec<&str>>()))
    };
    let number = |f: fn(&FarmRecord) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(records.iter().map(f).collect::<Vec<f64>>()))
    };

    let mut fields = vec![
        Field::new(BASE_COLUMNS[0], DataType::Utf8, false),
        Field::new(BASE_COLUMNS[1], DataType::Utf8, false),
        Field::new(BASE_COLUMNS[2], DataType::Utf8, false),
        Field::new(BASE_COLUMNS[3], DataType::Utf8, false),
        Field::new(BASE_COLUMNS[4], DataType::Utf8, false),
        Field::new(BASE_COLUMNS[5], DataType::Boolean, false),
        Field::new(BASE_COLUMNS[6], DataType::Float64, false),
        Field::new(BASE_COLUMNS[7], DataType::Float64, false),
        Field::new(BASE_COLUMNS[8], DataType::Float64, false),
    ];
    let mut columns: Vec<ArrayRef> = vec![
        text(|r| r.farm_id.as_str()),
        text(|r| r.department.as_str()),
        text(|r| r.crop_type.as_str()),
        text(|r| r.soil_type.as_str()),
        text(|r| r.technification_level.as_str()),
        Arc::new(BooleanArray::from(
            records.iter().map(|r| r.irrigation_technified).collect::<Vec<bool>>(),
        )),
        number(|r| r.area_hectares),
        number(|r| r.annual_production_tons),
        number(|r| r.sale_price_per_ton),
    ];
    if with_audit_column {
        fields.push(Field::new(COL_AUDIT_DATE, DataType::Date32, true));
        columns.push(Arc::new(Date32Array::from(
            records
                .iter()
                .map(|r| r.last_audit_date.and_then(days_since_epoch))
                .collect::<Vec<Option<i32>>>(),
        )));
    }

    let schema = Arc::new(Schema::new(fields));
    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let mut out = ArrowWriter::try_new(writer, schema, None)?;
    out.write(&batch)?;
    out.close()?;
    info!("exported {} records as parquet", records.len());
    Ok(())
}

/// Arrow `Date32` value: whole days since 1970-01-01.
fn days_since_epoch(date: NaiveDate) -> Option<i32> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    i32::try_from(date.signed_duration_since(epoch).num_days()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn farm(audit: Option<NaiveDate>) -> FarmRecord {
        FarmRecord {
            farm_id: "F, 1".into(),
            department: "Huila".into(),
            crop_type: "Cafe".into(),
            soil_type: "Franco".into(),
            technification_level: "Alto".into(),
            irrigation_technified: true,
            area_hectares: 2.5,
            annual_production_tons: 10.0,
            sale_price_per_ton: 1500000.0,
            last_audit_date: audit,
        }
    }

    #[test]
    fn csv_layout_matches_source_columns() {
        let bytes = csv_bytes(&[farm(NaiveDate::from_ymd_opt(2024, 5, 2)), farm(None)], true).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "ID_Finca,Departamento,Tipo_Cultivo,Tipo_Suelo,Nivel_Tecnificacion,Sistema_Riego_Tecnificado,Area_Hectareas,Produccion_Anual_Ton,Precio_Venta_Por_Ton_COP,Fecha_Ultima_Auditoria"
        );
        assert_eq!(lines[1], "\"F, 1\",Huila,Cafe,Franco,Alto,True,2.5,10,1500000,2024-05-02");
        assert_eq!(lines[2], "\"F, 1\",Huila,Cafe,Franco,Alto,True,2.5,10,1500000,");
    }

    #[test]
    fn audit_column_omitted_when_source_lacked_it() {
        let text = String::from_utf8(csv_bytes(&[farm(None)], false).unwrap()).unwrap();
        assert!(!text.contains(COL_AUDIT_DATE));
        assert_eq!(text.lines().nth(1).map(|l| l.split(',').count()), Some(10));
    }

    #[test]
    fn parquet_audit_column_is_a_date() {
        use arrow::array::{Array, AsArray};
        use arrow::datatypes::Date32Type;
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = tempfile::tempfile().unwrap();
        write_parquet(
            &[farm(NaiveDate::from_ymd_opt(2024, 5, 2)), farm(None)],
            true,
            file.try_clone().unwrap(),
        )
        .unwrap();
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)
            .unwrap()
            .build()
            .unwrap();
        let batches: Vec<RecordBatch> = reader.map(|b| b.unwrap()).collect();
        let audit = batches[0].column_by_name(COL_AUDIT_DATE).unwrap();
        assert_eq!(audit.data_type(), &DataType::Date32);
        let days = audit.as_primitive::<Date32Type>();
        assert_eq!(days.value(0), 19845);
        assert!(days.is_null(1));
    }
}
