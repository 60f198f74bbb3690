//! # CLI Integration Tests
//!
//! This module provides tests for the command-line interface, covering
//! argument parsing for every subcommand, global flags, and the typed
//! value parsers.

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::path::PathBuf;

    use crate::cli::{Cli, Commands, OutputFormat};

    /// Test basic CLI argument parsing
    #[test]
    fn test_cli_help() {
        let result = Cli::try_parse_from(["nc2nuts", "--help"]);
        assert!(result.is_err()); // --help causes early exit with "error"

        let error = result.unwrap_err();
        assert!(error
            .to_string()
            .contains("Aggregate gridded climate data onto NUTS administrative regions"));
    }

    /// Test version argument
    #[test]
    fn test_cli_version() {
        let result = Cli::try_parse_from(["nc2nuts", "--version"]);
        assert!(result.is_err()); // --version causes early exit
    }

    /// Test global flags
    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "--verbose",
            "--output-format",
            "json",
            "--config",
            "/path/to/job.yaml",
            "inventory",
            "./data",
        ]);

        assert!(cli.verbose);
        assert_eq!(cli.output_format, OutputFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/job.yaml")));
    }

    /// Test that verbose and quiet exclude each other
    #[test]
    fn test_verbose_quiet_conflict() {
        let result = Cli::try_parse_from(["nc2nuts", "--verbose", "--quiet", "inventory", "./data"]);
        assert!(result.is_err());
    }

    /// Test aggregate command argument parsing
    #[test]
    fn test_aggregate_command_basic() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "aggregate",
            "weekly.nc",
            "nuts.geojson",
            "out.parquet",
        ]);

        if let Commands::Aggregate {
            input,
            regions,
            output,
            levels,
            countries,
            workers,
        } = &cli.command
        {
            assert_eq!(input, &Some("weekly.nc".to_string()));
            assert_eq!(regions, &Some("nuts.geojson".to_string()));
            assert_eq!(output, &Some("out.parquet".to_string()));
            assert!(levels.is_none());
            assert!(countries.is_none());
            assert!(workers.is_none());
        } else {
            panic!("Expected Aggregate command");
        }
    }

    /// Test aggregate command with all region filters
    #[test]
    fn test_aggregate_command_with_filters() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "aggregate",
            "weekly.nc",
            "nuts.geojson",
            "out.parquet",
            "--levels",
            "2,3",
            "--countries",
            "EL,IT",
            "--workers",
            "4",
        ]);

        if let Commands::Aggregate {
            levels,
            countries,
            workers,
            ..
        } = &cli.command
        {
            assert_eq!(levels.as_ref().unwrap().0, vec![2, 3]);
            assert_eq!(
                countries.as_ref().unwrap().0,
                vec!["EL".to_string(), "IT".to_string()]
            );
            assert_eq!(workers, &Some(4));
        } else {
            panic!("Expected Aggregate command");
        }
    }

    /// Test aggregate where everything comes from a config file
    #[test]
    fn test_aggregate_command_config_only() {
        let cli = Cli::parse_from(["nc2nuts", "--config", "job.json", "aggregate"]);

        assert_eq!(cli.config, Some(PathBuf::from("job.json")));
        if let Commands::Aggregate { input, regions, output, .. } = &cli.command {
            assert!(input.is_none());
            assert!(regions.is_none());
            assert!(output.is_none());
        } else {
            panic!("Expected Aggregate command");
        }
    }

    /// Test join command parsing
    #[test]
    fn test_join_command() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "join",
            "climate.parquet",
            "demo_r_mweek3",
            "joined.parquet",
        ]);

        if let Commands::Join {
            climate,
            dataset,
            output,
        } = &cli.command
        {
            assert_eq!(climate, "climate.parquet");
            assert_eq!(dataset, "demo_r_mweek3");
            assert_eq!(output, "joined.parquet");
        } else {
            panic!("Expected Join command");
        }
    }

    /// Test download command parsing
    #[test]
    fn test_download_command() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "download",
            "./data",
            "2019-01",
            "2020-12",
            "--area",
            "43,18,33,36",
            "--variables",
            "2m_temperature,total_precipitation",
        ]);

        if let Commands::Download {
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
        } = &cli.command
        {
            assert_eq!(dir, &PathBuf::from("./data"));
            let start = start.as_ref().unwrap();
            assert_eq!((start.year, start.month), (2019, 1));
            let end = end.as_ref().unwrap();
            assert_eq!((end.year, end.month), (2020, 12));
            assert_eq!(dataset, "reanalysis-era5-land");
            assert_eq!(prefix, "ERA_land");
            assert_eq!(area.as_ref().unwrap().0, [43.0, 18.0, 33.0, 36.0]);
            assert_eq!(
                variables.as_ref().unwrap().0,
                vec!["2m_temperature".to_string(), "total_precipitation".to_string()]
            );
            assert!(!fill_gaps);
            assert!(!refresh);
            assert_eq!(*threshold, 65);
        } else {
            panic!("Expected Download command");
        }
    }

    /// Test the gap-filling download mode, which needs no month range
    #[test]
    fn test_download_fill_gaps() {
        let cli = Cli::parse_from(["nc2nuts", "download", "--fill-gaps", "./data"]);

        if let Commands::Download {
            dir,
            start,
            end,
            fill_gaps,
            ..
        } = &cli.command
        {
            assert_eq!(dir, &PathBuf::from("./data"));
            assert!(start.is_none());
            assert!(end.is_none());
            assert!(fill_gaps);
        } else {
            panic!("Expected Download command");
        }

        // Without a mode flag the month range is required
        let result = Cli::try_parse_from(["nc2nuts", "download", "./data"]);
        assert!(result.is_err());
    }

    /// Test the archive-refresh download mode
    #[test]
    fn test_download_refresh() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "download",
            "--refresh",
            "--threshold",
            "90",
            "./data",
        ]);

        if let Commands::Download {
            dir,
            start,
            refresh,
            threshold,
            ..
        } = &cli.command
        {
            assert_eq!(dir, &PathBuf::from("./data"));
            assert!(start.is_none());
            assert!(refresh);
            assert_eq!(*threshold, 90);
        } else {
            panic!("Expected Download command");
        }

        // Refresh and gap-filling are separate modes
        let result = Cli::try_parse_from([
            "nc2nuts", "download", "--refresh", "--fill-gaps", "./data",
        ]);
        assert!(result.is_err());
    }

    /// Test weekly command parsing
    #[test]
    fn test_weekly_command() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "weekly",
            "./data",
            "--prefix",
            "ERA_land",
            "--out-dir",
            "./weekly",
        ]);

        if let Commands::Weekly {
            dir,
            prefix,
            out_dir,
        } = &cli.command
        {
            assert_eq!(dir, &PathBuf::from("./data"));
            assert_eq!(prefix, "ERA_land");
            assert_eq!(out_dir, &Some(PathBuf::from("./weekly")));
        } else {
            panic!("Expected Weekly command");
        }
    }

    /// Test daily command parsing with variable overrides
    #[test]
    fn test_daily_command() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "daily",
            "hourly.nc",
            "daily.parquet",
            "--temperature",
            "2t",
            "--no-humidity",
        ]);

        if let Commands::Daily {
            input,
            output,
            temperature,
            dewpoint,
            no_humidity,
        } = &cli.command
        {
            assert_eq!(input, "hourly.nc");
            assert_eq!(output, "daily.parquet");
            assert_eq!(temperature, "2t");
            assert_eq!(dewpoint, "d2m"); // default stays
            assert!(no_humidity);
        } else {
            panic!("Expected Daily command");
        }
    }

    /// Test inventory command parsing
    #[test]
    fn test_inventory_command() {
        let cli = Cli::parse_from(["nc2nuts", "inventory", "./data", "--check-variables"]);

        if let Commands::Inventory {
            dir,
            prefix,
            check_variables,
        } = &cli.command
        {
            assert_eq!(dir, &PathBuf::from("./data"));
            assert_eq!(prefix, "ERA_land");
            assert!(check_variables);
        } else {
            panic!("Expected Inventory command");
        }
    }

    /// Test tlcc command parsing, including negative lags
    #[test]
    fn test_tlcc_command() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "tlcc",
            "joined.parquet",
            "EL301",
            "corr.csv",
            "--start",
            "-10",
            "--end",
            "11",
        ]);

        if let Commands::Tlcc {
            input,
            nuts_id,
            output,
            age,
            start,
            end,
        } = &cli.command
        {
            assert_eq!(input, "joined.parquet");
            assert_eq!(nuts_id, "EL301");
            assert_eq!(output, "corr.csv");
            assert_eq!(age, "TOTAL");
            assert_eq!(*start, -10);
            assert_eq!(*end, 11);
        } else {
            panic!("Expected Tlcc command");
        }
    }

    /// Test info command parsing
    #[test]
    fn test_info_command() {
        let cli = Cli::parse_from([
            "nc2nuts",
            "info",
            "weekly.nc",
            "--detailed",
            "-n",
            "t2m",
            "--format",
            "json",
        ]);

        if let Commands::Info {
            file,
            detailed,
            variable,
            format,
        } = &cli.command
        {
            assert_eq!(file, "weekly.nc");
            assert!(detailed);
            assert_eq!(variable, &Some("t2m".to_string()));
            assert_eq!(format, &Some(OutputFormat::Json));
        } else {
            panic!("Expected Info command");
        }
    }

    /// Test completions command parsing
    #[test]
    fn test_completions_command() {
        let cli = Cli::parse_from(["nc2nuts", "completions", "bash"]);

        if let Commands::Completions { shell, output } = &cli.command {
            assert_eq!(shell.to_string(), "bash");
            assert!(output.is_none());
        } else {
            panic!("Expected Completions command");
        }
    }

    /// Test output format enum parsing
    #[test]
    fn test_output_format_values() {
        for (name, expected) in [
            ("human", OutputFormat::Human),
            ("json", OutputFormat::Json),
            ("yaml", OutputFormat::Yaml),
            ("csv", OutputFormat::Csv),
        ] {
            let cli = Cli::parse_from(["nc2nuts", "--output-format", name, "inventory", "./data"]);
            assert_eq!(cli.output_format, expected);
        }

        let result =
            Cli::try_parse_from(["nc2nuts", "--output-format", "xml", "inventory", "./data"]);
        assert!(result.is_err());
    }

    /// Test malformed typed arguments
    #[test]
    fn test_invalid_argument_values() {
        // Level outside 0..=3
        let result = Cli::try_parse_from([
            "nc2nuts", "aggregate", "a.nc", "b.geojson", "c.parquet", "--levels", "7",
        ]);
        assert!(result.is_err());

        // Bounding box with north below south
        let result = Cli::try_parse_from([
            "nc2nuts", "download", "./data", "2020-01", "2020-02", "--area", "33,18,43,36",
        ]);
        assert!(result.is_err());

        // Month outside 1..=12
        let result = Cli::try_parse_from(["nc2nuts", "download", "./data", "2020-13", "2020-12"]);
        assert!(result.is_err());
    }

    /// Verify the whole command tree against clap's own debug assertions
    #[test]
    fn test_command_tree_is_well_formed() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
