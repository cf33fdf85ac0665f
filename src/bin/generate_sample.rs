//! Writes a synthetic `Dummy_dashboardV2.csv` (and a `.parquet` twin) into
//! the current directory so the viewer has something to open locally.

use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const RECEIPTS: usize = 6;
const SLIDES_PER_RECEIPT: usize = 8;
const REGIONS: [&str; 4] = ["Tumor", "Stroma", "Margin", "Necrosis"];

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
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[(self.next_u64() % items.len() as u64) as usize]
    }
}

#[derive(Default)]
struct Columns {
    receipt: Vec<String>,
    region: Vec<String>,
    slide: Vec<i64>,
    cells: Vec<i64>,
    area: Vec<f64>,
    intensity: Vec<f64>,
    positive: Vec<f64>,
}

fn generate(rng: &mut SimpleRng) -> Columns {
    let mut cols = Columns::default();
    for r in 0..RECEIPTS {
        // each receipt gets its own staining batch offset
        let batch_shift = rng.gauss(0.0, 15.0);
        for s in 0..SLIDES_PER_RECEIPT {
            let area = rng.gauss(12.0, 3.0).max(0.5);
            let density = rng.gauss(2_800.0, 400.0).max(100.0);
            cols.receipt.push(format!("R{:03}", r + 1));
            cols.region.push(rng.pick(&REGIONS).to_string());
            cols.slide.push((r * SLIDES_PER_RECEIPT + s + 1) as i64);
            cols.cells.push((area * density) as i64);
            cols.area.push((area * 100.0).round() / 100.0);
            cols.intensity.push(rng.gauss(120.0 + batch_shift, 10.0));
            cols.positive.push(rng.next_f64() * 0.6);
        }
    }
    cols
}

fn write_csv(cols: &Columns, path: &str) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record([
        "Receipt_ID",
        "analysisjobs_getRegion",
        "slide_number",
        "cell_count",
        "tissue_area_mm2",
        "mean_intensity",
        "positive_fraction",
    ])?;
    for i in 0..cols.receipt.len() {
        writer.write_record([
            cols.receipt[i].clone(),
            cols.region[i].clone(),
            cols.slide[i].to_string(),
            cols.cells[i].to_string(),
            cols.area[i].to_string(),
            format!("{:.3}", cols.intensity[i]),
            format!("{:.4}", cols.positive[i]),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(cols: &Columns, path: &str) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("Receipt_ID", DataType::Utf8, false),
        Field::new("analysisjobs_getRegion", DataType::Utf8, false),
        Field::new("slide_number", DataType::Int64, false),
        Field::new("cell_count", DataType::Int64, false),
        Field::new("tissue_area_mm2", DataType::Float64, false),
        Field::new("mean_intensity", DataType::Float64, false),
        Field::new("positive_fraction", DataType::Float64, false),
    ]));

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(StringArray::from(cols.receipt.clone())),
        Arc::new(StringArray::from(cols.region.clone())),
        Arc::new(Int64Array::from(cols.slide.clone())),
        Arc::new(Int64Array::from(cols.cells.clone())),
        Arc::new(Float64Array::from(cols.area.clone())),
        Arc::new(Float64Array::from(cols.intensity.clone())),
        Arc::new(Float64Array::from(cols.positive.clone())),
    ];
    let batch = RecordBatch::try_new(schema.clone(), arrays).context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let cols = generate(&mut rng);

    write_csv(&cols, "Dummy_dashboardV2.csv")?;
    write_parquet(&cols, "Dummy_dashboardV2.parquet")?;

    println!(
        "Wrote {} rows to Dummy_dashboardV2.csv and Dummy_dashboardV2.parquet",
        cols.receipt.len()
    );
    Ok(())
}
