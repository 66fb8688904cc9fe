use std::fs::File;
use std::io::BufWriter;

use agro_panda::data::export::{write_csv, write_parquet};
use agro_panda::data::model::FarmRecord;
use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

const DEPARTMENTS: [&str; 6] = ["Antioquia", "Boyaca", "Cauca", "Huila", "Meta", "Tolima"];
const SOILS: [&str; 4] = ["Arcilloso", "Arenoso", "Franco", "Limoso"];
const LEVELS: [&str; 4] = ["Bajo", "Medio", "Alto", "Muy Alto"];

/// Crop name, tons per hectare, price per ton (COP).
const CROPS: [(&str, f64, f64); 5] = [
    ("Cafe", 1.2, 9_500_000.0),
    ("Platano", 9.0, 1_100_000.0),
    ("Maiz", 4.5, 1_300_000.0),
    ("Arroz", 5.5, 1_600_000.0),
    ("Aguacate", 10.0, 4_200_000.0),
];

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn main() -> Result<()> {
    env_logger::init();
    let mut rng = SimpleRng::new(42);
    let first_audit = NaiveDate::from_ymd_opt(2022, 1, 1).context("invalid base date")?;

    let records: Vec<FarmRecord> = (1..=500)
        .map(|i| {
            let (crop, base_yield, base_price) = CROPS[(rng.next_u64() % CROPS.len() as u64) as usize];
            let level_idx = (rng.next_u64() % LEVELS.len() as u64) as usize;
            // Higher technification lifts yield.
            let boost = 1.0 + 0.15 * level_idx as f64;
            let area = round2(rng.uniform(0.5, 120.0));
            let production = round2(area * base_yield * boost * rng.uniform(0.7, 1.3));
            let audited = rng.next_f64() < 0.9;
            let audit_offset = rng.uniform(0.0, 1000.0) as u64;

            FarmRecord {
                farm_id: format!("F{i:04}"),
                department: rng.pick(&DEPARTMENTS).to_string(),
                crop_type: crop.to_string(),
                soil_type: rng.pick(&SOILS).to_string(),
                technification_level: LEVELS[level_idx].to_string(),
                irrigation_technified: level_idx >= 2 || rng.next_f64() < 0.2,
                area_hectares: area,
                annual_production_tons: production,
                sale_price_per_ton: (base_price * rng.uniform(0.85, 1.15)).round(),
                last_audit_date: audited
                    .then(|| first_audit.checked_add_days(chrono::Days::new(audit_offset)))
                    .flatten(),
            }
        })
        .collect();

    let csv_path = "agro_colombia.csv";
    let file = File::create(csv_path).with_context(|| format!("failed to create {csv_path}"))?;
    write_csv(&records, true, BufWriter::new(file))
        .with_context(|| format!("failed to write {csv_path}"))?;

    let parquet_path = "agro_colombia.parquet";
    let file =
        File::create(parquet_path).with_context(|| format!("failed to create {parquet_path}"))?;
    write_parquet(&records, true, file)
        .with_context(|| format!("failed to write {parquet_path}"))?;

    println!(
        "Wrote {} farms to {csv_path} and {parquet_path}",
        records.len()
    );
    Ok(())
}
