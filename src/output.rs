//! # Table Output Module
//!
//! This module handles writing processed DataFrames to disk. The format is
//! chosen from the output path's extension: `.parquet` writes Parquet,
//! `.csv` writes CSV, anything else falls back to Parquet.
//!
//! ## Features
//!
//! - **Detailed logging**: Shows DataFrame statistics and writing progress
//! - **Schema validation**: Displays DataFrame schema before writing
//!

use log::debug;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Writes a DataFrame to disk, choosing the format from the extension.
///
/// # Arguments
///
/// * `df` - The DataFrame containing aggregated data
/// * `output_path` - Path where the table should be written
///
/// # Returns
///
/// Returns `Ok(())` on successful write, or an error if writing fails.
///
/// # Errors
///
/// This function will return an error if:
/// - The output path is not writable
/// - The DataFrame contains unsupported data types for the target format
pub fn write_dataframe(
    df: &DataFrame,
    output_path: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!("Writing DataFrame to: {}\n", output_path);

    // Show DataFrame info
    debug!("DataFrame shape: {:?}", df.shape());
    debug!("DataFrame schema:\n{:?}", df.schema());
    debug!("First few rows:\n{}", df.head(Some(5)));

    let extension = Path::new(output_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("parquet");

    match extension {
        "csv" => write_csv(df, output_path)?,
        _ => write_parquet(df, output_path)?,
    }

    debug!("Successfully wrote: {}", output_path);
    Ok(())
}

/// Reads a table from disk, choosing the format from the extension.
///
/// # Errors
///
/// This function will return an error if the file cannot be opened or is
/// not a valid table of the expected format.
pub fn read_dataframe(input_path: &str) -> Result<DataFrame, Box<dyn std::error::Error>> {
    debug!("Reading DataFrame from: {}", input_path);

    let extension = Path::new(input_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("parquet");

    let df = match extension {
        "csv" => CsvReadOptions::default()
            .try_into_reader_with_file_path(Some(input_path.into()))?
            .finish()?,
        _ => ParquetReader::new(File::open(input_path)?).finish()?,
    };

    debug!("DataFrame shape: {:?}", df.shape());
    Ok(df)
}

fn write_parquet(df: &DataFrame, output_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(output_path)?;
    let writer = ParquetWriter::new(file);
    let mut df_clone = df.clone();
    writer.finish(&mut df_clone)?;
    Ok(())
}

fn write_csv(df: &DataFrame, output_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = File::create(output_path)?;
    let mut df_clone = df.clone();
    CsvWriter::new(file).finish(&mut df_clone)?;
    Ok(())
}
