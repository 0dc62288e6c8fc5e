//! Regridding whole files onto the grid of a land-mask file
//!
//! Every requested variable is regridded, time step by time step, from the
//! source grid onto the mask grid; masked points become NaN and the variables
//! are saved together in one output file.
//!
//! The mask grid may use a different longitude convention than the source.
//! Target longitudes are expressed in the source's convention only for the
//! interpolation; the output keeps the mask's own longitude values, sorted
//! ascending, with the mask columns permuted to match. The caller's mask grid is
//! never modified.

use crate::dataset::{read_decoded, DataVariable, Dataset};
use crate::errors::{MldError, Result};
use crate::grid::{ascending_order, permute, Grid, LonConvention};
use crate::qc::apply_mask;
use crate::reader::{
    coordinate_dimension, find_axis, read_grid_from, read_labeled, resolve_coordinates, squeeze,
    CoordinateAliases, CoordinateNames,
};
use crate::regrid::{regrid_field, InterpMethod};
use crate::time::TIME_DIM;
use ndarray::{Array2, Array3, ArrayD, Axis, Ix2};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default name of the land-mask variable
pub const LANDMASK_VAR: &str = "LANDMASK";

/// Inputs of [`regrid_file`]
#[derive(Debug, Clone)]
pub struct RegridRequest {
    pub source: PathBuf,
    pub variables: Vec<String>,
    pub output: PathBuf,
    pub mask: PathBuf,
    pub mask_variable: String,
    pub method: InterpMethod,
    pub aliases: CoordinateAliases,
}

impl RegridRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        variables: Vec<String>,
        output: impl Into<PathBuf>,
        mask: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source: source.into(),
            variables,
            output: output.into(),
            mask: mask.into(),
            mask_variable: LANDMASK_VAR.to_string(),
            method: InterpMethod::default(),
            aliases: CoordinateAliases::default(),
        }
    }

    pub fn with_method(mut self, method: InterpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_aliases(mut self, aliases: CoordinateAliases) -> Self {
        self.aliases = aliases;
        self
    }

    pub fn with_mask_variable(mut self, name: impl Into<String>) -> Self {
        self.mask_variable = name.into();
        self
    }
}

/// A land mask and the grid it lives on
#[derive(Debug, Clone)]
pub struct LandMask {
    pub grid: Grid,
    pub names: CoordinateNames,
    /// `(lat, lon)`, `true` on land
    pub mask: Array2<bool>,
}

/// Target longitudes prepared for interpolation from a source of another convention
#[derive(Debug, Clone, PartialEq)]
pub struct LonReconciliation {
    /// Original index of each output column
    pub order: Vec<usize>,
    /// Target longitudes in output order, unchanged from the target grid
    pub lon: Vec<f64>,
    /// The same longitudes in the source's convention
    pub interp_lon: Vec<f64>,
}

/// Sort target longitudes ascending and express them in the `source` convention
pub fn reconcile_longitudes(target_lon: &[f64], source: LonConvention) -> LonReconciliation {
    let order = ascending_order(target_lon);
    let lon = permute(target_lon, &order);
    let interp_lon = source.normalize_all(&lon);
    LonReconciliation {
        order,
        lon,
        interp_lon,
    }
}

/// Read the mask variable of `path`. A time-dependent mask contributes its first step;
/// points equal to `1` are land.
pub fn read_land_mask(path: &Path, variable: &str, aliases: &CoordinateAliases) -> Result<LandMask> {
    let file = netcdf::open(path)?;
    let names = resolve_coordinates(&file, aliases)?;
    let grid = read_grid_from(&file, &names)?;

    let (data, dims) = read_labeled(&file, variable)?;
    let data = match dims.iter().position(|d| d == TIME_DIM) {
        Some(axis) if data.len_of(Axis(axis)) == 0 => {
            return Err(MldError::grid_mismatch(format!(
                "mask '{}' in {} has no time steps",
                variable,
                path.display()
            )))
        }
        Some(axis) => data.index_axis(Axis(axis), 0).to_owned(),
        None => data,
    };
    let data = squeeze(data)?.into_dimensionality::<Ix2>()?;

    let (nlat, nlon) = grid.shape();
    let data = if data.dim() == (nlat, nlon) {
        data
    } else if data.dim() == (nlon, nlat) {
        data.reversed_axes()
    } else {
        return Err(MldError::grid_mismatch(format!(
            "mask shaped {:?} does not fit its {}x{} grid",
            data.dim(),
            nlat,
            nlon
        )));
    };

    Ok(LandMask {
        grid,
        names,
        mask: data.mapv(|v| v == 1.0),
    })
}

/// Regrid `request.variables` from the source file onto the mask grid and save the result
pub fn regrid_file(request: &RegridRequest) -> Result<Dataset> {
    let land = read_land_mask(&request.mask, &request.mask_variable, &request.aliases)?;

    let file = netcdf::open(&request.source)?;
    let names = resolve_coordinates(&file, &request.aliases)?;
    let src = read_grid_from(&file, &names)?;
    let lon_dim = coordinate_dimension(&file, &names.lon)?;
    let lat_dim = coordinate_dimension(&file, &names.lat)?;

    let convention = src.lon_convention();
    let lons = reconcile_longitudes(&land.grid.lon, convention);
    let target = Grid::new(lons.interp_lon.clone(), land.grid.lat.clone());
    let mask = land.mask.select(Axis(1), &lons.order);
    debug!(?convention, columns = lons.lon.len(), "Reconciled target longitudes");

    let out_lon = land.names.lon.clone();
    let out_lat = land.names.lat.clone();

    let mut dataset = Dataset::new();
    if file.variable(TIME_DIM).is_some() {
        dataset.insert_variable(copy_variable(&file, TIME_DIM)?)?;
    }
    dataset.insert_variable(
        DataVariable::new(
            out_lon.as_str(),
            vec![out_lon.clone()],
            ArrayD::from_shape_vec(vec![lons.lon.len()], lons.lon.clone())?,
        )
        .with_attribute("units", "degrees_east")
        .with_attribute("standard_name", "longitude"),
    )?;
    dataset.insert_variable(
        DataVariable::new(
            out_lat.as_str(),
            vec![out_lat.clone()],
            ArrayD::from_shape_vec(vec![land.grid.lat.len()], land.grid.lat.clone())?,
        )
        .with_attribute("units", "degrees_north")
        .with_attribute("standard_name", "latitude"),
    )?;

    for name in &request.variables {
        let (data, dims) = read_labeled(&file, name)?;
        let has_time = dims.iter().any(|d| d == TIME_DIM);
        let field = to_time_lat_lon(data, &dims, name, &lat_dim, &lon_dim)?;

        let (nlat, nlon) = target.shape();
        let mut out = Array3::from_elem((field.len_of(Axis(0)), nlat, nlon), f64::NAN);
        for (t, slice) in field.outer_iter().enumerate() {
            let mut regridded = regrid_field(&src, slice, &target, request.method)?;
            apply_mask(&mut regridded, &mask.view())?;
            out.index_axis_mut(Axis(0), t).assign(&regridded);
        }

        let mut var = copy_variable(&file, name)?;
        if has_time {
            var.dims = vec![TIME_DIM.to_string(), out_lat.clone(), out_lon.clone()];
            var.data = out.into_dyn();
        } else {
            var.dims = vec![out_lat.clone(), out_lon.clone()];
            var.data = out.index_axis(Axis(0), 0).to_owned().into_dyn();
        }
        dataset.insert_variable(var)?;
        debug!(variable = %name, "Regridded variable");
    }

    dataset.clear_global_attributes();
    dataset.save(&request.output)?;
    info!(output = %request.output.display(), "Interpolated file");
    Ok(dataset)
}

/// Decoded data and attributes of one variable
fn copy_variable(file: &netcdf::File, name: &str) -> Result<DataVariable> {
    let var = file
        .variable(name)
        .ok_or_else(|| MldError::VariableNotFound {
            var: name.to_string(),
        })?;

    let mut copied = DataVariable::new(
        name,
        var.dimensions()
            .iter()
            .map(|d| d.name().to_string())
            .collect(),
        read_decoded(&var)?,
    );
    for attr in var.attributes() {
        copied.set_attribute(attr.name(), attr.value()?);
    }
    Ok(copied)
}

/// Rearrange a variable to `(time, lat, lon)`; a variable without time gets one step.
/// Any other dimension must have length 1.
fn to_time_lat_lon(
    data: ArrayD<f64>,
    dims: &[String],
    name: &str,
    lat_dim: &str,
    lon_dim: &str,
) -> Result<Array3<f64>> {
    let lat_axis = find_axis(dims, name, lat_dim)?;
    let lon_axis = find_axis(dims, name, lon_dim)?;
    let time_axis = dims.iter().position(|d| d == TIME_DIM);

    let mut order: Vec<usize> = time_axis.into_iter().chain([lat_axis, lon_axis]).collect();
    for (axis, &len) in data.shape().iter().enumerate() {
        if order.contains(&axis) {
            continue;
        }
        if len != 1 {
            return Err(MldError::grid_mismatch(format!(
                "variable '{}' has extra dimension '{}' of length {}",
                name, dims[axis], len
            )));
        }
        order.push(axis);
    }

    let steps = time_axis.map_or(1, |axis| data.len_of(Axis(axis)));
    let (nlat, nlon) = (data.len_of(Axis(lat_axis)), data.len_of(Axis(lon_axis)));
    let permuted = data.permuted_axes(order);
    Ok(Array3::from_shape_vec(
        (steps, nlat, nlon),
        permuted.iter().copied().collect(),
    )?)
}
