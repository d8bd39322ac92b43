use anyhow::{Context, Result};
use clap::Parser;
use foodgram::models::Ingredient;
use foodgram::storage::RecipeStorage;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "load_ingredients")]
#[command(about = "Bulk-load ingredient reference data from a CSV file", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "ingredients.csv", help = "CSV file with name,measurement_unit columns")]
    file: PathBuf,

    #[arg(short, long, default_value = "data", help = "Server data directory")]
    data_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    name: String,
    measurement_unit: String,
}

/// Parse the reference-data file into one ingredient per data row.
fn read_rows(path: &Path) -> Result<Vec<Ingredient>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut batch = Vec::new();
    for record in reader.deserialize() {
        let row: CsvRow = record.context("Malformed CSV row")?;
        batch.push(Ingredient::new(row.name, row.measurement_unit));
    }
    Ok(batch)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let batch = read_rows(&args.file)?;
    let total = batch.len();

    let storage = RecipeStorage::new(&args.data_dir)?;
    let inserted = storage.add_ingredients_bulk(batch).await?;

    println!(
        "Loaded {} ingredients from {} ({} already present)",
        inserted,
        args.file.display(),
        total - inserted
    );
    Ok(())
}
