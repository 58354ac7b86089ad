//! Standardizes the breast cancer feature matrix and projects it onto its
//! leading principal components.
//!
//! ```text
//! RUST_LOG=debug cargo run --example breast_cancer -- [path/to/data.csv] [n_components]
//! ```

use log::info;
use scaled_pca::matrix::from_rows;
use scaled_pca::StandardizedPca;
use std::error::Error;
use std::path::{Path, PathBuf};

fn read_csv(path: &Path) -> Result<Vec<Vec<f64>>, Box<dyn Error>> {
    let text = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let row = line
            .split(',')
            .map(|field| field.trim().parse::<f64>())
            .collect::<Result<Vec<f64>, _>>()?;
        rows.push(row);
    }
    Ok(rows)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let path = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/data/breast_cancer.csv"));
    let n_components = match args.next() {
        Some(arg) => arg.parse::<usize>()?,
        None => 2,
    };

    let data = from_rows(&read_csv(&path)?)?;
    info!("Loaded {:?} with shape {:?}.", path, data.dim());

    let mut model = StandardizedPca::new();
    let scores = model.fit_transform(data.view(), n_components)?;

    println!("Input shape: {:?}", data.dim());
    println!("Output shape: {:?}", scores.dim());
    if let Some(ratio) = model.projector().explained_variance_ratio() {
        println!("Explained variance ratio: {:.4}", ratio);
    }
    let preview = scores.nrows().min(5);
    println!("First {} projected rows:", preview);
    for row in scores.rows().into_iter().take(preview) {
        println!("  {:.4}", row);
    }
    Ok(())
}
