//! NetCDF file inspection
//!
//! Summarises what a file holds in the terms the regridding passes care about:
//! dimensions, variables, the resolved horizontal coordinates and the time axis.

use crate::errors::Result;
use crate::grid::LonConvention;
use crate::reader::{read_grid_from, read_times, resolve_coordinates, CoordinateAliases, CoordinateNames};
use chrono::NaiveDateTime;
use netcdf::AttributeValue;
use std::path::Path;

/// Information about a dimension
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionInfo {
    pub name: String,
    pub length: usize,
    pub is_unlimited: bool,
}

/// Structured metadata for one variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub name: String,
    pub data_type: String,
    pub dimensions: Vec<String>,
    pub shape: Vec<usize>,
    pub units: Option<String>,
}

/// Range of one horizontal coordinate
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateRange {
    pub name: String,
    pub len: usize,
    pub min: f64,
    pub max: f64,
}

/// Everything [`print_metadata`] reports
#[derive(Debug, Clone)]
pub struct FileSummary {
    pub dimensions: Vec<DimensionInfo>,
    pub variables: Vec<VariableInfo>,
    /// `None` when the coordinates cannot be resolved with the given aliases
    pub coordinates: Option<(CoordinateRange, CoordinateRange)>,
    pub lon_convention: Option<LonConvention>,
    pub times: Vec<NaiveDateTime>,
}

/// Collect a [`FileSummary`] for `path`
pub fn describe_file(path: &Path, aliases: &CoordinateAliases) -> Result<FileSummary> {
    let file = netcdf::open(path)?;

    let mut dimensions: Vec<DimensionInfo> = file
        .dimensions()
        .map(|d| DimensionInfo {
            name: d.name().to_string(),
            length: d.len(),
            is_unlimited: d.is_unlimited(),
        })
        .collect();
    dimensions.sort_by(|a, b| a.name.cmp(&b.name));

    let mut variables: Vec<VariableInfo> = file
        .variables()
        .map(|var| {
            let units = match var.attribute("units").and_then(|a| a.value().ok()) {
                Some(AttributeValue::Str(units)) => Some(units),
                _ => None,
            };
            VariableInfo {
                name: var.name().to_string(),
                data_type: format!("{:?}", var.vartype()).to_lowercase(),
                dimensions: var
                    .dimensions()
                    .iter()
                    .map(|d| d.name().to_string())
                    .collect(),
                shape: var.dimensions().iter().map(|d| d.len()).collect(),
                units,
            }
        })
        .collect();
    variables.sort_by(|a, b| a.name.cmp(&b.name));

    let (coordinates, lon_convention) = match resolve_coordinates(&file, aliases) {
        Ok(names) => {
            let (lon, lat, convention) = coordinate_ranges(&file, &names)?;
            (Some((lon, lat)), Some(convention))
        }
        Err(_) => (None, None),
    };

    Ok(FileSummary {
        dimensions,
        variables,
        coordinates,
        lon_convention,
        times: read_times(&file)?,
    })
}

fn coordinate_ranges(
    file: &netcdf::File,
    names: &CoordinateNames,
) -> Result<(CoordinateRange, CoordinateRange, LonConvention)> {
    let grid = read_grid_from(file, names)?;
    let range = |name: &str, values: &[f64]| CoordinateRange {
        name: name.to_string(),
        len: values.len(),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    Ok((
        range(&names.lon, &grid.lon),
        range(&names.lat, &grid.lat),
        grid.lon_convention(),
    ))
}

/// Prints dimensions, variables, coordinates and the time axis of a NetCDF file.
pub fn print_metadata(path: &Path, aliases: &CoordinateAliases) -> Result<()> {
    let summary = describe_file(path, aliases)?;

    println!("\n Dimensions");
    println!("==============");
    if summary.dimensions.is_empty() {
        println!("   (No dimensions found)");
    }
    for dim in &summary.dimensions {
        if dim.is_unlimited {
            println!("    {} = {} (unlimited)", dim.name, dim.length);
        } else {
            println!("    {} = {}", dim.name, dim.length);
        }
    }

    println!("\n Variables");
    println!("=============");
    if summary.variables.is_empty() {
        println!("   (No variables found)");
    }
    for var in &summary.variables {
        let shape: Vec<String> = var.shape.iter().map(|n| n.to_string()).collect();
        print!(
            "    {} ({}): [{}] = ({})",
            var.name,
            var.data_type,
            var.dimensions.join(", "),
            shape.join(" x ")
        );
        match &var.units {
            Some(units) => println!("  units: {}", units),
            None => println!(),
        }
    }

    println!("\n Coordinates");
    println!("===============");
    match (&summary.coordinates, summary.lon_convention) {
        (Some((lon, lat)), Some(convention)) => {
            println!(
                "    longitude '{}': {} values in [{}, {}] ({:?})",
                lon.name, lon.len, lon.min, lon.max, convention
            );
            println!(
                "    latitude  '{}': {} values in [{}, {}]",
                lat.name, lat.len, lat.min, lat.max
            );
        }
        _ => println!("   (No longitude/latitude among {:?} / {:?})", aliases.lon, aliases.lat),
    }

    println!("\n Time");
    println!("========");
    match (summary.times.first(), summary.times.last()) {
        (Some(first), Some(last)) => println!(
            "    {} steps from {} to {}",
            summary.times.len(),
            first,
            last
        ),
        _ => println!("   (No time axis)"),
    }

    Ok(())
}
