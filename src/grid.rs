//! Longitude/latitude grids and coordinate bookkeeping

use crate::errors::{MldError, Result};
use std::cmp::Ordering;

/// Ordered longitude and latitude coordinates of a rectilinear grid
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
}

impl Grid {
    pub fn new(lon: Vec<f64>, lat: Vec<f64>) -> Self {
        Self { lon, lat }
    }

    /// Shape of a field on this grid, `(lat, lon)`
    pub fn shape(&self) -> (usize, usize) {
        (self.lat.len(), self.lon.len())
    }

    /// Keep every `stride`-th coordinate along both axes, starting at the first
    pub fn coarsen(&self, stride: usize) -> Result<Self> {
        if stride == 0 {
            return Err(MldError::ConfigError("stride must be at least 1".into()));
        }
        Ok(Self {
            lon: self.lon.iter().step_by(stride).copied().collect(),
            lat: self.lat.iter().step_by(stride).copied().collect(),
        })
    }

    /// Longitude convention of this grid
    pub fn lon_convention(&self) -> LonConvention {
        LonConvention::detect(&self.lon)
    }
}

/// Range convention of a longitude axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LonConvention {
    /// -180..180
    Signed,
    /// 0..360
    Unsigned,
}

impl LonConvention {
    /// Any negative longitude means the signed convention
    pub fn detect(lon: &[f64]) -> Self {
        if lon.iter().any(|&x| x < 0.0) {
            Self::Signed
        } else {
            Self::Unsigned
        }
    }

    /// Express a longitude in this convention
    pub fn normalize(self, lon: f64) -> f64 {
        match self {
            Self::Signed if lon > 180.0 => lon - 360.0,
            Self::Unsigned if lon < 0.0 => lon + 360.0,
            _ => lon,
        }
    }

    pub fn normalize_all(self, lon: &[f64]) -> Vec<f64> {
        lon.iter().map(|&x| self.normalize(x)).collect()
    }
}

/// Direction of a strictly monotonic axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Monotonic {
    Increasing,
    Decreasing,
}

/// `None` unless every step has the same strict sign. Single-point axes count as increasing.
pub fn monotonic(values: &[f64]) -> Option<Monotonic> {
    if values.iter().any(|v| v.is_nan()) {
        return None;
    }
    if values.windows(2).all(|w| w[0] < w[1]) {
        Some(Monotonic::Increasing)
    } else if values.windows(2).all(|w| w[0] > w[1]) {
        Some(Monotonic::Decreasing)
    } else {
        None
    }
}

/// Permutation that sorts `values` ascending (stable; NaN last)
pub fn ascending_order(values: &[f64]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&a, &b| match (values[a].is_nan(), values[b].is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => values[a].total_cmp(&values[b]),
    });
    order
}

/// Index of the coordinate closest to `target`; ties go to the first one.
/// `None` when `target` is NaN or no coordinate is valid.
pub fn nearest_index(coord: &[f64], target: f64) -> Option<usize> {
    if target.is_nan() {
        return None;
    }
    coord
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_nan())
        .fold(None, |best: Option<(usize, f64)>, (i, &c)| {
            let distance = (c - target).abs();
            match best {
                Some((_, d)) if d <= distance => best,
                _ => Some((i, distance)),
            }
        })
        .map(|(i, _)| i)
}

/// Nearest-neighbour index for each target value
pub fn nearest_indices(coord: &[f64], targets: &[f64]) -> Result<Vec<usize>> {
    targets
        .iter()
        .map(|&t| {
            nearest_index(coord, t).ok_or_else(|| {
                MldError::grid_mismatch(format!("no valid coordinate near {}", t))
            })
        })
        .collect()
}

/// Reorder `values` by `order`
pub fn permute<T: Copy>(values: &[T], order: &[usize]) -> Vec<T> {
    order.iter().map(|&i| values[i]).collect()
}
