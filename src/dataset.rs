//! In-memory image of a NetCDF file
//!
//! Files are read completely into a [`Dataset`], amended in memory and written
//! back with [`Dataset::save`], which replaces the file on disk. Variable data is
//! held as CF-decoded `f64`; on save every variable except the time coordinate
//! is stored as `f32` and no `_FillValue` is declared, so NaN is kept literally.
//! Char and string variables are carried through verbatim as [`TextVariable`]s.

use crate::errors::{MldError, Result};
use crate::time::{TimeUnits, TIME_DIM};
use chrono::NaiveDateTime;
use ndarray::{ArrayD, Axis, Dimension as _, IxDyn};
use netcdf::types::{NcTypeDescriptor, NcVariableType};
use netcdf::AttributeValue;
use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// Attributes describing packing or fill values; meaningless once data is decoded
const ENCODING_ATTRIBUTES: &[&str] = &["_FillValue", "missing_value", "scale_factor", "add_offset"];

/// Write `values` over the full extent of `shape`. Explicit ranges let the
/// write grow a record dimension that is still empty.
macro_rules! put_ranges {
    ($var:ident, $values:expr, $shape:expr) => {{
        let r: Vec<std::ops::Range<usize>> = $shape.iter().map(|&n| 0..n).collect();
        match r.len() {
            0 => $var.put_values($values, ..)?,
            1 => $var.put_values($values, r[0].clone())?,
            2 => $var.put_values($values, (r[0].clone(), r[1].clone()))?,
            3 => $var.put_values($values, (r[0].clone(), r[1].clone(), r[2].clone()))?,
            4 => $var.put_values(
                $values,
                (r[0].clone(), r[1].clone(), r[2].clone(), r[3].clone()),
            )?,
            n => {
                return Err(MldError::grid_mismatch(format!(
                    "cannot write {}-D variable",
                    n
                )))
            }
        }
    }};
}

/// One `NC_CHAR` element
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NcChar(pub u8);

// SAFETY: a single byte, laid out exactly as NC_CHAR
unsafe impl NcTypeDescriptor for NcChar {
    fn type_descriptor() -> NcVariableType {
        NcVariableType::Char
    }
}

/// A named dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub name: String,
    pub len: usize,
    pub unlimited: bool,
}

/// A named variable with its dimensions, decoded data and attributes
#[derive(Debug, Clone)]
pub struct DataVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
    pub attributes: Vec<(String, AttributeValue)>,
}

impl DataVariable {
    pub fn new(name: impl Into<String>, dims: Vec<String>, data: ArrayD<f64>) -> Self {
        Self {
            name: name.into(),
            dims,
            data,
            attributes: Vec::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Position of `dim` among this variable's dimensions
    pub fn axis_of(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// A variable named after its only dimension
    pub fn is_coordinate(&self) -> bool {
        self.dims.len() == 1 && self.dims[0] == self.name
    }
}

/// Contents of a text variable, in row-major order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextData {
    Chars(Vec<u8>),
    Strings(Vec<String>),
}

/// A char or string variable, kept unchanged across rewrites
#[derive(Debug, Clone)]
pub struct TextVariable {
    pub name: String,
    pub dims: Vec<String>,
    pub data: TextData,
    pub attributes: Vec<(String, AttributeValue)>,
}

/// Dimensions, variables and global attributes of one file
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    dimensions: Vec<Dimension>,
    variables: Vec<DataVariable>,
    text_variables: Vec<TextVariable>,
    attributes: Vec<(String, AttributeValue)>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a whole file into memory. Numeric variables are decoded, char and
    /// string variables are kept as they are; any other type is rejected so a
    /// later [`save`](Self::save) cannot drop it.
    pub fn open(path: &Path) -> Result<Self> {
        let file = netcdf::open(path)?;
        let mut dataset = Self::new();

        for dim in file.dimensions() {
            dataset.dimensions.push(Dimension {
                name: dim.name().to_string(),
                len: dim.len(),
                unlimited: dim.is_unlimited(),
            });
        }

        for attr in file.attributes() {
            dataset
                .attributes
                .push((attr.name().to_string(), attr.value()?));
        }

        for var in file.variables() {
            let mut attributes = Vec::new();
            for attr in var.attributes() {
                attributes.push((attr.name().to_string(), attr.value()?));
            }
            let name = var.name().to_string();
            let dims: Vec<String> = var
                .dimensions()
                .iter()
                .map(|d| d.name().to_string())
                .collect();

            let text = match var.vartype() {
                NcVariableType::Int(_) | NcVariableType::Float(_) => {
                    dataset.variables.push(DataVariable {
                        name,
                        dims,
                        data: read_decoded(&var)?,
                        attributes,
                    });
                    continue;
                }
                NcVariableType::Char => TextData::Chars(if var.len() == 0 {
                    Vec::new()
                } else {
                    var.get_values::<NcChar, _>(..)?
                        .into_iter()
                        .map(|c| c.0)
                        .collect()
                }),
                NcVariableType::String => {
                    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
                    let mut strings = Vec::with_capacity(var.len());
                    for index in ndarray::indices(IxDyn(&shape)) {
                        strings.push(var.get_string(index.slice())?);
                    }
                    TextData::Strings(strings)
                }
                other => {
                    return Err(MldError::Generic(format!(
                        "variable '{}' in {} has unsupported type {:?}",
                        name,
                        path.display(),
                        other
                    )))
                }
            };
            debug!(variable = %name, "Keeping text variable verbatim");
            dataset.text_variables.push(TextVariable {
                name,
                dims,
                data: text,
                attributes,
            });
        }

        debug!(
            path = %path.display(),
            variables = dataset.variables.len(),
            "Loaded dataset"
        );
        Ok(dataset)
    }

    /// Replace `path` with the contents of this dataset. The file is written
    /// next to `path` first and renamed over it, so a failed write leaves the
    /// previous contents in place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let staging = staging_path(path);
        if staging.exists() {
            fs::remove_file(&staging)?;
        }

        if let Err(e) = self.write_file(&staging) {
            if staging.exists() {
                fs::remove_file(&staging)?;
            }
            return Err(e);
        }
        fs::rename(&staging, path)?;
        Ok(())
    }

    fn write_file(&self, path: &Path) -> Result<()> {
        let mut file = netcdf::create(path)?;

        for dim in &self.dimensions {
            if dim.unlimited {
                file.add_unlimited_dimension(&dim.name)?;
            } else {
                file.add_dimension(&dim.name, dim.len)?;
            }
        }

        for (name, value) in &self.attributes {
            file.add_attribute(name, value.clone())?;
        }

        for var in &self.variables {
            let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
            let shape = var.data.shape().to_vec();

            if var.name == TIME_DIM {
                let mut nc_var = file.add_variable::<f64>(&var.name, &dims)?;
                for (name, value) in storable_attributes(&var.attributes) {
                    nc_var.put_attribute(name, value.clone())?;
                }
                let values: Vec<f64> = var.data.iter().copied().collect();
                if !values.is_empty() {
                    put_ranges!(nc_var, &values, shape);
                }
            } else {
                let mut nc_var = file.add_variable::<f32>(&var.name, &dims)?;
                for (name, value) in storable_attributes(&var.attributes) {
                    nc_var.put_attribute(name, value.clone())?;
                }
                let values: Vec<f32> = var.data.iter().map(|&v| v as f32).collect();
                if !values.is_empty() {
                    put_ranges!(nc_var, &values, shape);
                }
            }
        }

        for var in &self.text_variables {
            let dims: Vec<&str> = var.dims.iter().map(String::as_str).collect();
            let shape = self.text_shape(var)?;

            match &var.data {
                TextData::Chars(bytes) => {
                    let mut nc_var = file.add_variable::<NcChar>(&var.name, &dims)?;
                    for (name, value) in &var.attributes {
                        nc_var.put_attribute(name, value.clone())?;
                    }
                    let chars: Vec<NcChar> = bytes.iter().map(|&b| NcChar(b)).collect();
                    if !chars.is_empty() {
                        put_ranges!(nc_var, &chars, shape);
                    }
                }
                TextData::Strings(strings) => {
                    let mut nc_var = file.add_string_variable(&var.name, &dims)?;
                    for (name, value) in &var.attributes {
                        nc_var.put_attribute(name, value.clone())?;
                    }
                    for (index, value) in ndarray::indices(IxDyn(&shape)).into_iter().zip(strings) {
                        nc_var.put_string(value, index.slice())?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Shape of a text variable under the current dimension lengths; errors when
    /// its stored contents no longer fit
    fn text_shape(&self, var: &TextVariable) -> Result<Vec<usize>> {
        let shape = var
            .dims
            .iter()
            .map(|d| {
                self.dimension_len(d).ok_or_else(|| MldError::DimensionNotFound {
                    var: var.name.clone(),
                    dim: d.clone(),
                })
            })
            .collect::<Result<Vec<usize>>>()?;
        let stored = match &var.data {
            TextData::Chars(bytes) => bytes.len(),
            TextData::Strings(strings) => strings.len(),
        };
        if shape.iter().product::<usize>() != stored {
            return Err(MldError::grid_mismatch(format!(
                "text variable '{}' holds {} values but its dimensions {:?} need {}",
                var.name,
                stored,
                shape,
                shape.iter().product::<usize>()
            )));
        }
        Ok(shape)
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    pub fn dimension_len(&self, name: &str) -> Option<usize> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.len)
    }

    /// Add a dimension or change its length; `time` is created as the record dimension
    pub fn set_dimension(&mut self, name: &str, len: usize) {
        match self.dimensions.iter_mut().find(|d| d.name == name) {
            Some(dim) => dim.len = len,
            None => self.dimensions.push(Dimension {
                name: name.to_string(),
                len,
                unlimited: name == TIME_DIM,
            }),
        }
    }

    /// Grow a zero-length dimension, reshaping the (necessarily empty) variables on it
    pub fn resize_empty_dimension(&mut self, name: &str, len: usize) -> Result<()> {
        match self.dimension_len(name) {
            Some(0) | None => {}
            Some(existing) if existing == len => return Ok(()),
            Some(existing) => {
                return Err(MldError::grid_mismatch(format!(
                    "dimension '{}' has length {}, cannot resize to {}",
                    name, existing, len
                )))
            }
        }

        self.set_dimension(name, len);
        let lengths: Vec<(String, usize)> = self
            .dimensions
            .iter()
            .map(|d| (d.name.clone(), d.len))
            .collect();
        for var in self.variables.iter_mut().filter(|v| v.axis_of(name).is_some()) {
            let shape: Vec<usize> = var
                .dims
                .iter()
                .map(|d| {
                    lengths
                        .iter()
                        .find(|(n, _)| n == d)
                        .map_or(0, |(_, l)| *l)
                })
                .collect();
            var.data = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
        }
        Ok(())
    }

    pub fn variables(&self) -> &[DataVariable] {
        &self.variables
    }

    pub fn variable(&self, name: &str) -> Option<&DataVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn text_variables(&self) -> &[TextVariable] {
        &self.text_variables
    }

    pub fn text_variable(&self, name: &str) -> Option<&TextVariable> {
        self.text_variables.iter().find(|v| v.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut DataVariable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    /// Add or replace a variable. Missing dimensions are created from the data shape;
    /// existing dimensions must match it.
    pub fn insert_variable(&mut self, var: DataVariable) -> Result<()> {
        if var.dims.len() != var.data.ndim() {
            return Err(MldError::grid_mismatch(format!(
                "variable '{}' declares {} dimensions but has {}-D data",
                var.name,
                var.dims.len(),
                var.data.ndim()
            )));
        }

        for (dim, &len) in var.dims.iter().zip(var.data.shape()) {
            match self.dimension_len(dim) {
                Some(existing) if existing != len => {
                    return Err(MldError::grid_mismatch(format!(
                        "variable '{}' has {} values along '{}', file has {}",
                        var.name, len, dim, existing
                    )))
                }
                Some(_) => {}
                None => self.set_dimension(dim, len),
            }
        }

        self.text_variables.retain(|t| t.name != var.name);
        match self.variables.iter_mut().find(|v| v.name == var.name) {
            Some(slot) => *slot = var,
            None => self.variables.push(var),
        }
        Ok(())
    }

    pub fn global_attributes(&self) -> &[(String, AttributeValue)] {
        &self.attributes
    }

    pub fn clear_global_attributes(&mut self) {
        self.attributes.clear();
    }

    /// Units of the time coordinate, or the default epoch-based days
    pub fn time_units(&self) -> Result<TimeUnits> {
        match self.variable(TIME_DIM).and_then(|v| v.attribute("units")) {
            Some(AttributeValue::Str(units)) => TimeUnits::parse(units),
            _ => Ok(TimeUnits::default()),
        }
    }

    /// Decoded time axis; empty when the file has no time coordinate
    pub fn times(&self) -> Result<Vec<NaiveDateTime>> {
        let Some(var) = self.variable(TIME_DIM) else {
            return Ok(Vec::new());
        };
        let units = self.time_units()?;
        var.data.iter().map(|&v| units.decode(v)).collect()
    }

    /// Conform every time-dependent variable to `axis`. Slots whose timestamp was
    /// already present keep their data, new slots are NaN.
    pub fn reindex_time(&mut self, axis: &[NaiveDateTime]) -> Result<()> {
        let units = self.time_units()?;
        let old = self.times()?;
        let slots: Vec<Option<usize>> = axis
            .iter()
            .map(|t| old.iter().position(|o| o == t))
            .collect();

        for var in self.variables.iter_mut().filter(|v| v.name != TIME_DIM) {
            let Some(t_axis) = var.axis_of(TIME_DIM) else {
                continue;
            };
            let old_len = var.data.len_of(Axis(t_axis));
            let mut shape = var.data.shape().to_vec();
            shape[t_axis] = axis.len();

            let mut data = ArrayD::from_elem(IxDyn(&shape), f64::NAN);
            for (new_idx, slot) in slots.iter().enumerate() {
                if let Some(old_idx) = slot.filter(|&i| i < old_len) {
                    data.index_axis_mut(Axis(t_axis), new_idx)
                        .assign(&var.data.index_axis(Axis(t_axis), old_idx));
                }
            }
            var.data = data;
        }

        self.set_dimension(TIME_DIM, axis.len());
        let encoded: Vec<f64> = axis.iter().map(|&t| units.encode(t)).collect();
        let encoded = ArrayD::from_shape_vec(IxDyn(&[axis.len()]), encoded)?;
        match self.variable_mut(TIME_DIM) {
            Some(var) => var.data = encoded,
            None => self.variables.push(
                DataVariable::new(TIME_DIM, vec![TIME_DIM.to_string()], encoded)
                    .with_attribute("units", units.to_string())
                    .with_attribute("calendar", "standard")
                    .with_attribute("standard_name", "time"),
            ),
        }
        Ok(())
    }
}

/// Concatenate files along `time` in the given order and save the result to `output`
pub fn concat_time(inputs: &[PathBuf], output: &Path) -> Result<Dataset> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| MldError::Generic("no input files to concatenate".into()))?;

    let mut combined = Dataset::open(first)?;
    let units = combined.time_units()?;

    for path in rest {
        let next = Dataset::open(path)?;
        let next_units = next.time_units()?;

        for var in combined.variables.iter_mut() {
            let Some(t_axis) = var.axis_of(TIME_DIM) else {
                continue;
            };
            let other = next
                .variable(&var.name)
                .ok_or_else(|| MldError::VariableNotFound {
                    var: format!("{} (in {})", var.name, path.display()),
                })?;
            if other.axis_of(TIME_DIM) != Some(t_axis) {
                return Err(MldError::grid_mismatch(format!(
                    "variable '{}' in {} has a different time layout",
                    var.name,
                    path.display()
                )));
            }

            let appended = if var.name == TIME_DIM {
                let values = other
                    .data
                    .iter()
                    .map(|&v| next_units.decode(v).map(|t| units.encode(t)))
                    .collect::<Result<Vec<f64>>>()?;
                ArrayD::from_shape_vec(other.data.raw_dim(), values)?
            } else {
                other.data.clone()
            };

            var.data = ndarray::concatenate(Axis(t_axis), &[var.data.view(), appended.view()])?;
        }
    }

    let records = combined
        .variables
        .iter()
        .find_map(|v| v.axis_of(TIME_DIM).map(|a| v.data.len_of(Axis(a))))
        .unwrap_or(0);
    combined.set_dimension(TIME_DIM, records);
    if let Some(dim) = combined.dimensions.iter_mut().find(|d| d.name == TIME_DIM) {
        dim.unlimited = true;
    }

    combined.save(output)?;
    info!(
        inputs = inputs.len(),
        records,
        output = %output.display(),
        "Concatenated files along time"
    );
    Ok(combined)
}

/// Read a variable as `f64`, applying `_FillValue`/`missing_value` masking and
/// `scale_factor`/`add_offset` unpacking
pub(crate) fn read_decoded(var: &netcdf::Variable) -> Result<ArrayD<f64>> {
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();

    let mut values: Vec<f64> = if shape.iter().product::<usize>() == 0 {
        Vec::new()
    } else {
        var.get_values::<f64, _>(..)?
    };

    let fill = attribute_f64(var, "_FillValue");
    let missing = attribute_f64(var, "missing_value");
    let scale = attribute_f64(var, "scale_factor").unwrap_or(1.0);
    let offset = attribute_f64(var, "add_offset").unwrap_or(0.0);

    for v in values.iter_mut() {
        if Some(*v) == fill || Some(*v) == missing {
            *v = f64::NAN;
        } else {
            *v = *v * scale + offset;
        }
    }

    Ok(ArrayD::from_shape_vec(IxDyn(&shape), values)?)
}

/// Numeric value of a scalar attribute
pub(crate) fn attribute_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    var.attribute(name)
        .and_then(|attr| attr.value().ok())
        .and_then(|value| match value {
            AttributeValue::Double(v) => Some(v),
            AttributeValue::Float(v) => Some(f64::from(v)),
            AttributeValue::Int(v) => Some(f64::from(v)),
            AttributeValue::Short(v) => Some(f64::from(v)),
            AttributeValue::Uint(v) => Some(f64::from(v)),
            AttributeValue::Ushort(v) => Some(f64::from(v)),
            AttributeValue::Uchar(v) => Some(f64::from(v)),
            AttributeValue::Doubles(vs) => vs.first().copied(),
            AttributeValue::Floats(vs) => vs.first().map(|&v| f64::from(v)),
            _ => None,
        })
}

/// Hidden sibling of `path` used while a save is in progress
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".partial");
    path.with_file_name(name)
}

fn storable_attributes(
    attributes: &[(String, AttributeValue)],
) -> impl Iterator<Item = (&str, &AttributeValue)> {
    attributes
        .iter()
        .filter(|(name, _)| !ENCODING_ATTRIBUTES.contains(&name.as_str()))
        .map(|(name, value)| (name.as_str(), value))
}
