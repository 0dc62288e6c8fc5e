//! The two preprocessing passes
//!
//! Pass A ([`run_daily`]) regrids the configured variables onto a coarse grid one
//! day at a time, writes one file per day and concatenates them. Pass B
//! ([`run_masked`]) derives a land mask from the first per-day file and regrids
//! the full-resolution source onto the mask grid in one go.

use crate::config::{ConcatMode, PipelineConfig};
use crate::dataset::concat_time;
use crate::errors::{MldError, Result};
use crate::file_regrid::{regrid_file, RegridRequest};
use crate::grid::Grid;
use crate::qc::{apply_mask, clamp, coarsen, fill_masked, mask_to_values, nan_mask, zero_mask};
use crate::reader::{read_grid, read_variables, CoordinateAliases, Selection};
use crate::regrid::{orient, regrid_field};
use crate::time::{midnight, TIME_DIM};
use crate::writer::{FileTemplate, GridWriter, Layout, VariableUpdate};
use chrono::{NaiveDate, NaiveDateTime};
use ndarray::{Array2, ArrayD, Axis, Ix2};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files produced by [`run_daily`]
#[derive(Debug, Clone)]
pub struct DailyOutputs {
    pub daily_files: Vec<PathBuf>,
    pub combined: PathBuf,
}

/// Run Pass A followed by Pass B
pub fn run_all(config: &PipelineConfig) -> Result<(DailyOutputs, PathBuf)> {
    let daily = run_daily(config)?;
    let masked = run_masked(config)?;
    Ok((daily, masked))
}

/// Pass A: per-day coarse regridding, then concatenation along time
pub fn run_daily(config: &PipelineConfig) -> Result<DailyOutputs> {
    config.validate()?;
    let source = config.source_path();
    let full = read_grid(&source, &config.aliases)?;

    let lon: Vec<f64> = match config.lon_min {
        Some(min) => full.lon.iter().copied().filter(|&x| x > min).collect(),
        None => full.lon.clone(),
    };
    if lon.is_empty() {
        return Err(MldError::grid_mismatch(format!(
            "no source longitude is greater than {:?}",
            config.lon_min
        )));
    }
    let fine = Grid::new(lon, full.lat.clone());
    let coarse = fine.coarsen(config.stride)?;
    info!(
        source = %source.display(),
        fine = ?fine.shape(),
        coarse = ?coarse.shape(),
        "Starting daily regridding"
    );

    let mut daily_files = Vec::with_capacity(config.dates.len());
    for &date in &config.dates {
        daily_files.push(regrid_day(config, &source, &fine, &coarse, date)?);
    }

    let combined = config.resolve(&config.combined_output);
    match config.concat {
        ConcatMode::Ncrcat => config.tools.concatenate_records(&daily_files, &combined)?,
        ConcatMode::Native => {
            concat_time(&daily_files, &combined)?;
        }
    }
    info!(output = %combined.display(), days = daily_files.len(), "Combined daily files");

    Ok(DailyOutputs {
        daily_files,
        combined,
    })
}

fn regrid_day(
    config: &PipelineConfig,
    source: &Path,
    fine: &Grid,
    coarse: &Grid,
    date: NaiveDate,
) -> Result<PathBuf> {
    let time = midnight(date);
    let (nlat, nlon) = fine.shape();
    let selection = Selection::default()
        .at_time(time)
        .with_lon(fine.lon.clone());

    let fields = read_variables(source, &config.variables, &selection, &config.aliases)?
        .into_iter()
        .map(|data| as_field(data, nlat, nlon))
        .collect::<Result<Vec<_>>>()?;

    // Land is wherever the first variable is missing
    let land = nan_mask(&fields[0].view());
    let coarse_land = coarsen(&land.view(), config.stride)?;
    debug!(%date, land = land.iter().filter(|&&l| l).count(), "Derived land mask");

    let lat_name = config.output_lat_name.as_str();
    let lon_name = config.output_lon_name.as_str();
    let mut updates = vec![
        VariableUpdate::coordinate(lon_name, &coarse.lon),
        VariableUpdate::coordinate(lat_name, &coarse.lat),
    ];

    for (name, mut field) in config.variables.iter().zip(fields) {
        fill_masked(&mut field, &land.view(), 0.0)?;
        let mut regridded = regrid_field(fine, field.view(), coarse, config.method)?;
        apply_mask(&mut regridded, &coarse_land.view())?;
        clamp(&mut regridded, config.clamp);
        updates.push(VariableUpdate::new(
            name,
            &[TIME_DIM, lat_name, lon_name],
            regridded.insert_axis(Axis(0)).into_dyn(),
        ));
    }

    let path = config.daily_path(date);
    let template = match &config.daily_template {
        Some(cdl) => FileTemplate::Cdl(config.resolve(cdl)),
        None => FileTemplate::Layout(Layout::for_updates(&updates)?),
    };
    GridWriter::new(&path)
        .with_template(template)
        .with_tools(config.tools.clone())
        .write(&updates, &[time])?;

    info!(%date, file = %path.display(), "Wrote daily file");
    Ok(path)
}

/// Pass B: build the mask file, regrid the source onto it and clamp the result
pub fn run_masked(config: &PipelineConfig) -> Result<PathBuf> {
    config.validate()?;
    let aliases = reading_aliases(config);

    let mask_path = write_mask_file(config, &aliases)?;

    let output = config.resolve(&config.masked_output);
    let request = RegridRequest::new(
        config.source_path(),
        config.variables.clone(),
        &output,
        &mask_path,
    )
    .with_method(config.method)
    .with_aliases(aliases)
    .with_mask_variable(config.mask_variable.as_str());
    let result = regrid_file(&request)?;

    let times = result.times()?;
    let mut updates = Vec::with_capacity(config.variables.len() + 2);
    for name in [&config.output_lon_name, &config.output_lat_name] {
        let coord = result
            .variable(name)
            .ok_or_else(|| MldError::VariableNotFound { var: name.clone() })?;
        let values: Vec<f64> = coord.data.iter().copied().collect();
        updates.push(VariableUpdate::coordinate(name, &values));
    }
    for name in &config.variables {
        let var = result
            .variable(name)
            .ok_or_else(|| MldError::VariableNotFound { var: name.clone() })?;
        let mut data = var.data.clone();
        clamp(&mut data, config.clamp);
        let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
        updates.push(VariableUpdate::new(name, &dims, data));
    }

    GridWriter::new(&output)
        .with_tools(config.tools.clone())
        .write(&updates, &times)?;

    info!(output = %output.display(), "Wrote masked file");
    Ok(output)
}

/// Mask of the first per-day file, repeated for every configured day
fn write_mask_file(config: &PipelineConfig, aliases: &CoordinateAliases) -> Result<PathBuf> {
    let first_day = config.daily_path(config.dates[0]);
    let grid = read_grid(&first_day, aliases)?;
    let (nlat, nlon) = grid.shape();

    let reference = read_variables(
        &first_day,
        &config.variables[..1],
        &Selection::default().at_time(midnight(config.dates[0])),
        aliases,
    )?
    .into_iter()
    .next()
    .ok_or_else(|| MldError::VariableNotFound {
        var: config.variables[0].clone(),
    })?;
    let reference = as_field(reference, nlat, nlon)?;

    let land = zero_mask(&reference.view());
    let values = mask_to_values(&land.view());
    let steps = config.dates.len();
    let tiled = values
        .broadcast((steps, nlat, nlon))
        .ok_or_else(|| MldError::grid_mismatch("cannot repeat the mask over time"))?
        .to_owned();
    let times: Vec<NaiveDateTime> = config.dates.iter().map(|&d| midnight(d)).collect();

    let lat_name = config.output_lat_name.as_str();
    let lon_name = config.output_lon_name.as_str();
    let updates = vec![
        VariableUpdate::coordinate(lon_name, &grid.lon),
        VariableUpdate::coordinate(lat_name, &grid.lat),
        VariableUpdate::new(
            &config.mask_variable,
            &[TIME_DIM, lat_name, lon_name],
            tiled.into_dyn(),
        ),
    ];

    let mask_path = config.resolve(&config.mask_file);
    let template = match &config.mask_template {
        Some(cdl) => FileTemplate::Cdl(config.resolve(cdl)),
        None => FileTemplate::Layout(Layout::for_updates(&updates)?),
    };
    GridWriter::new(&mask_path)
        .with_template(template)
        .with_tools(config.tools.clone())
        .write(&updates, &times)?;

    info!(
        file = %mask_path.display(),
        land = land.iter().filter(|&&l| l).count(),
        "Wrote land mask"
    );
    Ok(mask_path)
}

/// Configured aliases extended with the names written to new files
fn reading_aliases(config: &PipelineConfig) -> CoordinateAliases {
    let mut aliases = config.aliases.clone();
    if !aliases.lon.contains(&config.output_lon_name) {
        aliases.lon.push(config.output_lon_name.clone());
    }
    if !aliases.lat.contains(&config.output_lat_name) {
        aliases.lat.push(config.output_lat_name.clone());
    }
    aliases
}

/// A squeezed read back as a `(lat, lon)` field
fn as_field(data: ArrayD<f64>, nlat: usize, nlon: usize) -> Result<Array2<f64>> {
    if data.ndim() == 2 {
        let data = data.into_dimensionality::<Ix2>()?;
        return orient(data.view(), nlat, nlon);
    }
    // A singleton axis was squeezed away
    if data.len() == nlat * nlon {
        return Ok(Array2::from_shape_vec(
            (nlat, nlon),
            data.iter().copied().collect(),
        )?);
    }
    Err(MldError::grid_mismatch(format!(
        "field shaped {:?} does not fit a {}x{} grid",
        data.shape(),
        nlat,
        nlon
    )))
}
