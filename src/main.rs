use clap::{CommandFactory, Parser};
use nc2nuts::analysis::lagged_cross_correlation;
use nc2nuts::cli::{Cli, Commands, OutputFormat};
use nc2nuts::download::{self, CdsClient, DownloadPlan};
use nc2nuts::info;
use nc2nuts::input::JobConfig;
use nc2nuts::inventory;
use nc2nuts::log::{
    config_echo, show_download_summary, show_farewell_with_timing, show_gap_report,
    show_greeting, show_region_outcomes,
};
use nc2nuts::output::{read_dataframe, write_dataframe};
use nc2nuts::raster::RasterTable;
use nc2nuts::temporal;
use nc2nuts::{process_aggregation_job, process_join_job};
use std::fs::File;
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    run(cli)
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();

    match cli.command {
        Commands::Aggregate {
            input,
            regions,
            output,
            levels,
            countries,
            workers,
        } => {
            let mut config = match &cli.config {
                Some(path) => {
                    show_greeting(&path.display().to_string());
                    JobConfig::from_file(path)?
                }
                None => {
                    let nc_key = input
                        .clone()
                        .ok_or("INPUT is required when no config file is given")?;
                    show_greeting(&nc_key);
                    JobConfig {
                        nc_key,
                        regions_key: regions
                            .clone()
                            .ok_or("REGIONS is required when no config file is given")?,
                        output_key: output
                            .clone()
                            .ok_or("OUTPUT is required when no config file is given")?,
                        levels: vec![3],
                        countries: None,
                        workers: 1,
                        eurostat_dataset: None,
                    }
                }
            };

            // Command-line arguments override the config file.
            if cli.config.is_some() {
                if let Some(input) = input {
                    config.nc_key = input;
                }
                if let Some(regions) = regions {
                    config.regions_key = regions;
                }
                if let Some(output) = output {
                    config.output_key = output;
                }
            }
            if let Some(levels) = levels {
                config.levels = levels.0;
            }
            if let Some(countries) = countries {
                config.countries = Some(countries.0);
            }
            if let Some(workers) = workers {
                config.workers = workers;
            }

            config_echo(&config);
            let report = process_aggregation_job(&config)?;
            show_region_outcomes(&report.outcomes);
        }

        Commands::Join {
            climate,
            dataset,
            output,
        } => {
            let joined = process_join_job(&climate, &dataset, &output)?;
            println!("Wrote {} rows to {}", joined.height(), output);
        }

        Commands::Download {
            dir,
            start,
            end,
            dataset,
            prefix,
            variables,
            area,
            fill_gaps,
            refresh,
            threshold,
        } => {
            let client = CdsClient::from_env()?;
            let mut plan = DownloadPlan::era5_land(&dir);
            plan.dataset = dataset;
            plan.prefix = prefix;
            if let Some(variables) = variables {
                plan.variables = variables.0;
            }
            if let Some(area) = area {
                plan.area = area.0;
            }

            let outcomes = if fill_gaps {
                download::fill_gaps(&client, &plan)?
            } else if refresh {
                download::refresh(&client, &plan, threshold)?
            } else {
                let start = start.ok_or("START is required unless --fill-gaps or --refresh is given")?;
                let end = end.ok_or("END is required unless --fill-gaps or --refresh is given")?;
                download::download_range(
                    &client,
                    &plan,
                    start.year,
                    start.month,
                    end.year,
                    end.month,
                )
            };
            show_download_summary(&outcomes);
        }

        Commands::Weekly {
            dir,
            prefix,
            out_dir,
        } => {
            let result = temporal::weekly_means(&dir, &prefix, out_dir.as_deref())?;
            show_gap_report(&result.gaps);
            if !result.excluded.is_empty() {
                println!("Excluded files: {:?}", result.excluded);
            }
            println!("Weekly means written to {}", result.path.display());
        }

        Commands::Daily {
            input,
            output,
            temperature,
            dewpoint,
            no_humidity,
        } => {
            let raster = RasterTable::from_file(&input)?;
            let dewpoint = if no_humidity {
                None
            } else {
                Some(dewpoint.as_str())
            };
            let daily = temporal::daily_statistics(&raster, &temperature, dewpoint)?;
            write_dataframe(&daily, &output)?;
        }

        Commands::Inventory {
            dir,
            prefix,
            check_variables,
        } => {
            let files = inventory::list_inventory(&dir, &prefix)?;
            println!("Files matching '{}' in {}:", prefix, dir.display());
            for file in &files {
                println!(
                    "  {}-{:02} [{}] {}",
                    file.year, file.month, file.resolution, file.filename
                );
            }
            show_gap_report(&inventory::check_years(&files));
            if check_variables {
                let flagged = inventory::check_variables(&dir, &prefix)?;
                if flagged.is_empty() {
                    println!("All files share the same variable set.");
                } else {
                    println!("Files with a different variable set: {:?}", flagged);
                }
            }
        }

        Commands::Tlcc {
            input,
            nuts_id,
            output,
            age,
            start,
            end,
        } => {
            let joined = read_dataframe(&input)?;
            let correlations = lagged_cross_correlation(&joined, &nuts_id, &age, start, end)?;
            write_dataframe(&correlations, &output)?;
        }

        Commands::Info {
            file,
            detailed,
            variable,
            format,
        } => {
            let file_info = info::get_netcdf_info(&file, variable.as_deref(), detailed)?;
            match format.unwrap_or(cli.output_format) {
                OutputFormat::Human => info::print_file_info_human(&file_info),
                OutputFormat::Json => info::print_file_info_json(&file_info)?,
                OutputFormat::Yaml => info::print_file_info_yaml(&file_info)?,
                OutputFormat::Csv => info::print_file_info_csv(&file_info)?,
            }
        }

        Commands::Completions { shell, output } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            match output {
                Some(path) => {
                    let mut file = File::create(path)?;
                    clap_complete::generate(shell, &mut cmd, name, &mut file);
                }
                None => {
                    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
                }
            }
        }
    }

    if !cli.quiet {
        show_farewell_with_timing(start_time.elapsed());
    }
    Ok(())
}
