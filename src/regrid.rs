//! Two-dimensional regridding of a single field
//!
//! The regridder first fills NaN gaps, once along each axis, averages the two
//! filled versions to soften the directional bias of 1-D filling, and then
//! interpolates onto the target grid, extrapolating past the source extent.
//! Values far outside the source grid are extrapolations and should be treated
//! with care. Land is not known here; callers apply their own mask afterwards.

use crate::errors::{MldError, Result};
use crate::grid::{monotonic, nearest_indices, Grid, Monotonic};
use interpn::{multicubic, multilinear};
use ndarray::{s, Array2, ArrayView2, Axis};
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// Interpolation used to sample the target grid
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterpMethod {
    /// Bilinear
    #[default]
    Linear,
    /// Nearest source point
    Nearest,
    /// Bicubic
    Cubic,
}

impl FromStr for InterpMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "linear" | "bilinear" => Ok(Self::Linear),
            "nearest" => Ok(Self::Nearest),
            "cubic" | "bicubic" => Ok(Self::Cubic),
            other => Err(format!(
                "Unknown interpolation method '{}': expected linear, nearest or cubic",
                other
            )),
        }
    }
}

impl fmt::Display for InterpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linear => "linear",
            Self::Nearest => "nearest",
            Self::Cubic => "cubic",
        };
        f.write_str(name)
    }
}

/// Fill NaN entries of `ys` by linear interpolation over the coordinates `xs`.
///
/// Gaps before the first or after the last valid value are extrapolated from the
/// two nearest valid values. A lane with one valid value is filled with it; a
/// lane without any is left untouched.
pub fn fill_gaps_1d(xs: &[f64], ys: &mut [f64]) {
    let valid: Vec<usize> = (0..ys.len()).filter(|&i| !ys[i].is_nan()).collect();

    match valid.len() {
        0 => return,
        n if n == ys.len() => return,
        1 => {
            let only = ys[valid[0]];
            ys.iter_mut().for_each(|y| *y = only);
            return;
        }
        _ => {}
    }

    for i in 0..ys.len() {
        if !ys[i].is_nan() {
            continue;
        }
        let k = valid.partition_point(|&j| j < i);
        let (a, b) = if k == 0 {
            (valid[0], valid[1])
        } else if k == valid.len() {
            (valid[k - 2], valid[k - 1])
        } else {
            (valid[k - 1], valid[k])
        };
        ys[i] = ys[a] + (ys[b] - ys[a]) * (xs[i] - xs[a]) / (xs[b] - xs[a]);
    }
}

/// Apply [`fill_gaps_1d`] to every lane of `values` running along `axis`
pub fn fill_gaps(values: &ArrayView2<f64>, coord: &[f64], axis: Axis) -> Array2<f64> {
    let mut filled = values.to_owned();
    for mut lane in filled.lanes_mut(axis) {
        let mut ys: Vec<f64> = lane.iter().copied().collect();
        fill_gaps_1d(coord, &mut ys);
        lane.iter_mut().zip(ys).for_each(|(dst, v)| *dst = v);
    }
    filled
}

/// Regrid `values` from `src` onto `dst`.
///
/// `values` may be shaped `(lat, lon)` or `(lon, lat)`. The result is shaped
/// `(dst.lat.len(), dst.lon.len())` in the order of `dst`'s coordinates, which
/// need not be sorted.
pub fn regrid_field(
    src: &Grid,
    values: ArrayView2<f64>,
    dst: &Grid,
    method: InterpMethod,
) -> Result<Array2<f64>> {
    let (nlat, nlon) = src.shape();
    if nlat == 0 || nlon == 0 {
        return Err(MldError::grid_mismatch("source grid is empty"));
    }
    let values = orient(values, nlat, nlon)?;
    let (lat, lon, values) = ascending(src, values)?;

    let along_lon = fill_gaps(&values.view(), &lon, Axis(1));
    let along_lat = fill_gaps(&values.view(), &lat, Axis(0));
    let filled = (&along_lon + &along_lat) / 2.0;

    sample(&lat, &lon, &filled, dst, method)
}

/// Put latitude on axis 0, transposing when only the swapped shape fits
pub fn orient(values: ArrayView2<f64>, nlat: usize, nlon: usize) -> Result<Array2<f64>> {
    let shape = values.dim();
    if shape == (nlat, nlon) {
        Ok(values.to_owned())
    } else if shape == (nlon, nlat) {
        Ok(values.t().to_owned())
    } else {
        Err(MldError::grid_mismatch(format!(
            "values shaped {:?} do not fit a grid of {} latitudes by {} longitudes",
            shape, nlat, nlon
        )))
    }
}

/// Reverse descending axes (with the data) so both run strictly upward
fn ascending(src: &Grid, values: Array2<f64>) -> Result<(Vec<f64>, Vec<f64>, Array2<f64>)> {
    let mut lat = src.lat.clone();
    let mut lon = src.lon.clone();
    let mut values = values;

    match monotonic(&lat) {
        Some(Monotonic::Increasing) => {}
        Some(Monotonic::Decreasing) => {
            lat.reverse();
            values = values.slice(s![..;-1, ..]).to_owned();
        }
        None => return Err(MldError::grid_mismatch("latitude is not strictly monotonic")),
    }
    match monotonic(&lon) {
        Some(Monotonic::Increasing) => {}
        Some(Monotonic::Decreasing) => {
            lon.reverse();
            values = values.slice(s![.., ..;-1]).to_owned();
        }
        None => return Err(MldError::grid_mismatch("longitude is not strictly monotonic")),
    }

    Ok((lat, lon, values))
}

fn sample(
    lat: &[f64],
    lon: &[f64],
    filled: &Array2<f64>,
    dst: &Grid,
    method: InterpMethod,
) -> Result<Array2<f64>> {
    let (out_lat, out_lon) = dst.shape();

    if method == InterpMethod::Nearest {
        let rows = nearest_indices(lat, &dst.lat)?;
        let cols = nearest_indices(lon, &dst.lon)?;
        return Ok(Array2::from_shape_fn((out_lat, out_lon), |(j, i)| {
            filled[[rows[j], cols[i]]]
        }));
    }

    if lat.len() < 2 || lon.len() < 2 {
        return Err(MldError::grid_mismatch(format!(
            "{} interpolation needs at least two source points per axis, got {}x{}",
            method,
            lat.len(),
            lon.len()
        )));
    }

    // Observation points in row-major (lat, lon) order
    let obs_lat: Vec<f64> = dst
        .lat
        .iter()
        .flat_map(|&y| std::iter::repeat(y).take(out_lon))
        .collect();
    let obs_lon: Vec<f64> = (0..out_lat).flat_map(|_| dst.lon.iter().copied()).collect();

    let grids = [lat, lon];
    let obs = [obs_lat.as_slice(), obs_lon.as_slice()];
    let vals: Vec<f64> = filled.iter().copied().collect();
    let mut out = vec![0.0; out_lat * out_lon];

    match method {
        InterpMethod::Cubic => multicubic::rectilinear::interpn(&grids, &vals, false, &obs, &mut out),
        _ => multilinear::rectilinear::interpn(&grids, &vals, &obs, &mut out),
    }
    .map_err(|e| MldError::InterpolationError(e.to_string()))?;

    Ok(Array2::from_shape_vec((out_lat, out_lon), out)?)
}
