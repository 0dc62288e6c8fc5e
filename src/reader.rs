//! Coordinate and variable reading
//!
//! Longitude and latitude coordinates are located by checking a list of
//! candidate names against the variables a file declares. Variables can be
//! restricted to one timestamp and to nearest-neighbour subsets along either
//! horizontal axis; singleton dimensions are dropped from what is returned.

use crate::dataset::read_decoded;
use crate::errors::{MldError, Result};
use crate::grid::{nearest_indices, Grid};
use crate::time::{TimeUnits, TIME_DIM};
use chrono::NaiveDateTime;
use ndarray::{ArrayD, Axis, IxDyn};
use netcdf::AttributeValue;
use serde::Deserialize;
use std::path::Path;

/// Candidate names for the horizontal coordinates, checked in order
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CoordinateAliases {
    pub lon: Vec<String>,
    pub lat: Vec<String>,
}

impl Default for CoordinateAliases {
    fn default() -> Self {
        Self {
            lon: vec!["lon".into(), "longitude".into()],
            lat: vec!["lat".into(), "latitude".into()],
        }
    }
}

/// Coordinate variable names as declared by one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinateNames {
    pub lon: String,
    pub lat: String,
}

/// Optional restrictions applied by [`read_variables`]
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Exact timestamp to extract
    pub time: Option<NaiveDateTime>,
    /// Longitudes to pick by nearest neighbour
    pub lon: Option<Vec<f64>>,
    /// Latitudes to pick by nearest neighbour
    pub lat: Option<Vec<f64>>,
}

impl Selection {
    pub fn at_time(mut self, time: NaiveDateTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn with_lon(mut self, lon: Vec<f64>) -> Self {
        self.lon = Some(lon);
        self
    }

    pub fn with_lat(mut self, lat: Vec<f64>) -> Self {
        self.lat = Some(lat);
        self
    }
}

/// First candidate declared as a variable in `file`, or failing that as a dimension
pub fn resolve_coordinate(file: &netcdf::File, candidates: &[String], axis: &str) -> Result<String> {
    candidates
        .iter()
        .find(|name| file.variable(name).is_some())
        .or_else(|| candidates.iter().find(|name| file.dimension(name).is_some()))
        .cloned()
        .ok_or_else(|| MldError::CoordinateNotFound {
            axis: axis.to_string(),
            candidates: candidates.to_vec(),
        })
}

pub fn resolve_coordinates(file: &netcdf::File, aliases: &CoordinateAliases) -> Result<CoordinateNames> {
    Ok(CoordinateNames {
        lon: resolve_coordinate(file, &aliases.lon, "longitude")?,
        lat: resolve_coordinate(file, &aliases.lat, "latitude")?,
    })
}

/// Longitude and latitude coordinate values of a file
pub fn read_grid(path: &Path, aliases: &CoordinateAliases) -> Result<Grid> {
    let file = netcdf::open(path)?;
    let names = resolve_coordinates(&file, aliases)?;
    read_grid_from(&file, &names)
}

/// Read `names` from `path`, each restricted by `selection` and squeezed
pub fn read_variables<S: AsRef<str>>(
    path: &Path,
    names: &[S],
    selection: &Selection,
    aliases: &CoordinateAliases,
) -> Result<Vec<ArrayD<f64>>> {
    let file = netcdf::open(path)?;
    let coords = resolve_coordinates(&file, aliases)?;
    let grid = read_grid_from(&file, &coords)?;

    let time_index = match selection.time {
        Some(t) => Some(
            read_times(&file)?
                .iter()
                .position(|&x| x == t)
                .ok_or_else(|| MldError::TimeNotFound {
                    time: t.to_string(),
                })?,
        ),
        None => None,
    };
    let lon_pick = match &selection.lon {
        Some(targets) => Some((coordinate_dimension(&file, &coords.lon)?, nearest_indices(&grid.lon, targets)?)),
        None => None,
    };
    let lat_pick = match &selection.lat {
        Some(targets) => Some((coordinate_dimension(&file, &coords.lat)?, nearest_indices(&grid.lat, targets)?)),
        None => None,
    };

    names
        .iter()
        .map(|name| {
            let name = name.as_ref();
            let (mut data, mut dims) = read_labeled(&file, name)?;

            if let Some(index) = time_index {
                let axis = find_axis(&dims, name, TIME_DIM)?;
                data = data.index_axis(Axis(axis), index).to_owned();
                dims.remove(axis);
            }
            for (dim, indices) in lon_pick.iter().chain(lat_pick.iter()) {
                let axis = find_axis(&dims, name, dim)?;
                data = data.select(Axis(axis), indices);
            }

            squeeze(data)
        })
        .collect()
}

/// Decoded data of one variable together with its dimension names
pub(crate) fn read_labeled(file: &netcdf::File, name: &str) -> Result<(ArrayD<f64>, Vec<String>)> {
    let var = file
        .variable(name)
        .ok_or_else(|| MldError::VariableNotFound {
            var: name.to_string(),
        })?;
    let dims = var
        .dimensions()
        .iter()
        .map(|d| d.name().to_string())
        .collect();
    Ok((read_decoded(&var)?, dims))
}

pub(crate) fn read_grid_from(file: &netcdf::File, names: &CoordinateNames) -> Result<Grid> {
    let lon = coordinate_values(file, &names.lon)?;
    let lat = coordinate_values(file, &names.lat)?;
    if lon.ndim() != 1 || lat.ndim() != 1 {
        return Err(MldError::grid_mismatch(format!(
            "coordinates '{}'/'{}' must be one-dimensional",
            names.lon, names.lat
        )));
    }
    Ok(Grid::new(
        lon.iter().copied().collect(),
        lat.iter().copied().collect(),
    ))
}

/// Values of a coordinate variable; a bare dimension is indexed `0, 1, ...`
fn coordinate_values(file: &netcdf::File, name: &str) -> Result<ArrayD<f64>> {
    if file.variable(name).is_none() {
        if let Some(dim) = file.dimension(name) {
            return Ok(ArrayD::from_shape_fn(IxDyn(&[dim.len()]), |i| i[0] as f64));
        }
    }
    Ok(read_labeled(file, name)?.0)
}

/// Decoded time coordinate; empty when the file has none
pub(crate) fn read_times(file: &netcdf::File) -> Result<Vec<NaiveDateTime>> {
    let Some(var) = file.variable(TIME_DIM) else {
        return Ok(Vec::new());
    };
    let units = match var.attribute("units").and_then(|attr| attr.value().ok()) {
        Some(AttributeValue::Str(units)) => TimeUnits::parse(&units)?,
        _ => TimeUnits::default(),
    };
    read_decoded(&var)?
        .iter()
        .map(|&v| units.decode(v))
        .collect()
}

/// Dimension that a 1-D coordinate variable runs along
pub(crate) fn coordinate_dimension(file: &netcdf::File, coord: &str) -> Result<String> {
    if file.variable(coord).is_none() && file.dimension(coord).is_some() {
        return Ok(coord.to_string());
    }
    let var = file
        .variable(coord)
        .ok_or_else(|| MldError::VariableNotFound {
            var: coord.to_string(),
        })?;
    match var.dimensions() {
        [dim] => Ok(dim.name().to_string()),
        _ => Err(MldError::grid_mismatch(format!(
            "coordinate '{}' must be one-dimensional",
            coord
        ))),
    }
}

pub(crate) fn find_axis(dims: &[String], var: &str, dim: &str) -> Result<usize> {
    dims.iter()
        .position(|d| d == dim)
        .ok_or_else(|| MldError::DimensionNotFound {
            var: var.to_string(),
            dim: dim.to_string(),
        })
}

/// Drop every length-1 axis
pub fn squeeze(data: ArrayD<f64>) -> Result<ArrayD<f64>> {
    let shape: Vec<usize> = data.shape().iter().copied().filter(|&n| n != 1).collect();
    if shape.len() == data.ndim() {
        return Ok(data);
    }
    Ok(ArrayD::from_shape_vec(
        IxDyn(&shape),
        data.iter().copied().collect(),
    )?)
}
