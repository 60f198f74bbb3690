//! # NetCDF File Information Module
//!
//! Extracts and displays structural information about NetCDF files, namely
//! dimensions, variables, attributes, and metadata. Used by the `info`
//! subcommand to inspect downloaded or aggregated datasets.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Information about a NetCDF dimension
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfDimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Information about a NetCDF variable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfVariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub attributes: HashMap<String, String>,
    pub shape: Vec<usize>,
}

/// Complete information about a NetCDF file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetCdfInfo {
    pub path: String,
    pub dimensions: Vec<NetCdfDimensionInfo>,
    pub variables: Vec<NetCdfVariableInfo>,
    pub global_attributes: HashMap<String, String>,
    pub file_size: Option<u64>,
    pub total_variables: usize,
    pub total_dimensions: usize,
}

/// Extract comprehensive information from a NetCDF file
pub fn get_netcdf_info(
    file_path: &str,
    variable: Option<&str>,
    detailed: bool,
) -> Result<NetCdfInfo> {
    debug!("Opening NetCDF file: {}", file_path);
    let file = netcdf::open(file_path)
        .with_context(|| format!("Failed to open NetCDF file: {}", file_path))?;

    let file_size = std::fs::metadata(file_path)
        .ok()
        .map(|metadata| metadata.len());

    let mut dimensions = Vec::new();
    for dim in file.dimensions() {
        dimensions.push(NetCdfDimensionInfo {
            name: dim.name().to_string(),
            length: dim.len(),
            is_unlimited: dim.is_unlimited(),
        });
    }

    let mut variables = Vec::new();
    for var in file.variables() {
        // Skip if a specific variable was requested and this isn't it
        if let Some(var_name) = variable {
            if var.name() != var_name {
                continue;
            }
        }

        let mut attributes = HashMap::new();
        for attr in var.attributes() {
            if let Ok(value) = attr.value() {
                attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }

        let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

        variables.push(NetCdfVariableInfo {
            name: var.name().to_string(),
            data_type: format_variable_type(&var.vartype()),
            dimensions: var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect(),
            attributes,
            shape,
        });
    }

    let mut global_attributes = HashMap::new();
    if detailed {
        for attr in file.attributes() {
            if let Ok(value) = attr.value() {
                global_attributes.insert(attr.name().to_string(), format_attribute_value(&value));
            }
        }
    }

    file.close().context("Failed to close NetCDF file")?;

    Ok(NetCdfInfo {
        path: file_path.to_string(),
        total_dimensions: dimensions.len(),
        total_variables: variables.len(),
        dimensions,
        variables,
        global_attributes,
        file_size,
    })
}

/// Format netcdf attribute value for display
fn format_attribute_value(value: &netcdf::AttributeValue) -> String {
    format!("{:?}", value)
}

/// Format netcdf variable type for display
fn format_variable_type(var_type: &netcdf::types::NcVariableType) -> String {
    format!("{:?}", var_type)
}

/// Print NetCDF info in human-readable format
pub fn print_file_info_human(info: &NetCdfInfo) {
    println!("NetCDF File Information:");
    println!("  Path: {}", info.path);
    if let Some(size) = info.file_size {
        println!("  File Size: {:.2} MB", size as f64 / 1_048_576.0);
    }
    println!("  Dimensions: {} total", info.total_dimensions);
    for dim in &info.dimensions {
        println!(
            "    {} ({}{})",
            dim.name,
            dim.length,
            if dim.is_unlimited { ", unlimited" } else { "" }
        );
    }
    println!("  Variables: {} total", info.total_variables);
    for var in &info.variables {
        println!(
            "    {} ({}) - dimensions: [{}]",
            var.name,
            var.data_type,
            var.dimensions.join(", ")
        );
        for (name, value) in &var.attributes {
            println!("      @{}: {}", name, value);
        }
    }
    if !info.global_attributes.is_empty() {
        println!("  Global Attributes:");
        for (name, value) in &info.global_attributes {
            println!("    @{}: {}", name, value);
        }
    }
}

/// Print NetCDF info in JSON format
pub fn print_file_info_json(info: &NetCdfInfo) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(info)?);
    Ok(())
}

/// Print NetCDF info in YAML format
pub fn print_file_info_yaml(info: &NetCdfInfo) -> Result<()> {
    let yaml = serde_yaml::to_string(info).context("Failed to serialize NetCDF info to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Print NetCDF info in CSV format (variables only)
pub fn print_file_info_csv(info: &NetCdfInfo) -> Result<()> {
    println!("variable_name,data_type,dimensions,shape,attributes_count");
    for var in &info.variables {
        let dims = var.dimensions.join(";");
        let shape = var
            .shape
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";");
        println!(
            "{},{},\"{}\",\"{}\",{}",
            var.name,
            var.data_type,
            dims,
            shape,
            var.attributes.len()
        );
    }
    Ok(())
}
