use crate::aggregate::RegionOutcome;
use crate::download::{DownloadOutcome, DownloadStatus};
use crate::input::JobConfig;
use crate::inventory::GapEntry;
use std::time::Duration;

pub fn show_greeting(config_path: &str) {
    println!("=== NetCDF to NUTS Aggregator ===");
    println!("Loading configuration from: {}", config_path);
}

pub fn config_echo(config: &JobConfig) {
    println!("\nConfiguration:");
    println!("  Input NetCDF: {}", config.nc_key);
    println!("  Boundary file: {}", config.regions_key);
    println!("  Output table: {}", config.output_key);
    println!("  NUTS levels: {:?}", config.levels);
    match &config.countries {
        Some(countries) => println!("  Countries: {}", countries.join(", ")),
        None => println!("  Countries: all"),
    }
    println!("  Workers: {}", config.workers);
    if let Some(dataset) = &config.eurostat_dataset {
        println!("  Eurostat dataset: {}", dataset);
    }
}

pub fn show_netcdf_file_info(file: &netcdf::File) -> Result<(), Box<dyn std::error::Error>> {
    println!("\nNetCDF File Info:");
    println!("Dimensions:");
    for dim in file.dimensions() {
        println!("  {}: {}", dim.name(), dim.len());
    }
    println!("Variables:");
    for var in file.variables() {
        let dims: Vec<String> = var.dimensions().iter().map(|d| d.name().to_string()).collect();
        println!("  {}: {:?}", var.name(), dims);
    }
    Ok(())
}

pub fn show_gap_report(gaps: &[GapEntry]) {
    if gaps.is_empty() {
        println!("\nNo missing months found.");
        return;
    }
    println!("\nMissing months per year:");
    for gap in gaps {
        println!("  {}: {:?}", gap.year, gap.months_missing);
    }
}

pub fn show_region_outcomes(outcomes: &[RegionOutcome]) {
    let failed: Vec<_> = outcomes.iter().filter(|o| !o.is_success()).collect();
    println!(
        "\nRegions: {} aggregated, {} failed",
        outcomes.len() - failed.len(),
        failed.len()
    );
    for outcome in failed {
        if let Some(error) = &outcome.error {
            println!("  {}: {}", outcome.nuts_id, error);
        }
    }
}

pub fn show_download_summary(outcomes: &[DownloadOutcome]) {
    let downloaded = outcomes
        .iter()
        .filter(|o| o.status == DownloadStatus::Downloaded)
        .count();
    let skipped = outcomes
        .iter()
        .filter(|o| o.status == DownloadStatus::Skipped)
        .count();
    println!(
        "\nDownloads: {} fetched, {} already on disk, {} failed",
        downloaded,
        skipped,
        outcomes.len() - downloaded - skipped
    );
    for outcome in outcomes.iter().filter(|o| o.is_failure()) {
        if let DownloadStatus::Failed(message) = &outcome.status {
            println!("  {}-{}: {}", outcome.year, outcome.month, message);
        }
    }
}

pub fn show_farewell_with_timing(elapsed: Duration) {
    println!("\n=== Completed successfully in {:.2?} ===", elapsed);
}
