//! Land masks and quality-control clamps

use crate::errors::{MldError, Result};
use ndarray::{s, Array, Array2, ArrayView2, Dimension};
use serde::Deserialize;

/// Closed range that valid values are clamped into
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClampRange {
    pub min: f64,
    pub max: f64,
}

impl Default for ClampRange {
    /// Plausible mixed-layer depths, in metres
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 500.0,
        }
    }
}

impl ClampRange {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        if !(min <= max) {
            return Err(MldError::ConfigError(format!(
                "clamp range [{}, {}] is empty",
                min, max
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Clamp every value into `range`, leaving NaN untouched
pub fn clamp<D: Dimension>(field: &mut Array<f64, D>, range: ClampRange) {
    field.mapv_inplace(|v| if v.is_nan() { v } else { v.clamp(range.min, range.max) });
}

/// `true` where the field is NaN
pub fn nan_mask(field: &ArrayView2<f64>) -> Array2<bool> {
    field.mapv(f64::is_nan)
}

/// `true` where the field is exactly zero
pub fn zero_mask(field: &ArrayView2<f64>) -> Array2<bool> {
    field.mapv(|v| v == 0.0)
}

/// Set masked points to `value`
pub fn fill_masked(field: &mut Array2<f64>, mask: &ArrayView2<bool>, value: f64) -> Result<()> {
    if field.dim() != mask.dim() {
        return Err(MldError::grid_mismatch(format!(
            "mask shaped {:?} does not match field shaped {:?}",
            mask.dim(),
            field.dim()
        )));
    }
    field.zip_mut_with(mask, |v, &land| {
        if land {
            *v = value;
        }
    });
    Ok(())
}

/// Set masked points to NaN
pub fn apply_mask(field: &mut Array2<f64>, mask: &ArrayView2<bool>) -> Result<()> {
    fill_masked(field, mask, f64::NAN)
}

/// Every `stride`-th row and column, starting at the first
pub fn coarsen<T: Clone>(field: &ArrayView2<T>, stride: usize) -> Result<Array2<T>> {
    if stride == 0 {
        return Err(MldError::ConfigError("stride must be at least 1".into()));
    }
    let step = stride as isize;
    Ok(field.slice(s![..;step, ..;step]).to_owned())
}

/// Serialised form of a mask: `1.0` for land, `0.0` for ocean
pub fn mask_to_values(mask: &ArrayView2<bool>) -> Array2<f64> {
    mask.mapv(|land| if land { 1.0 } else { 0.0 })
}
