//! Time-merging NetCDF writer
//!
//! [`GridWriter::write`] amends a target file in place: timestamps already in the
//! file and not being written are preserved, the slots of the written timestamps
//! are replaced, and variables not touched by the call keep their data. A target
//! that does not exist yet is first instantiated from a [`FileTemplate`].

use crate::dataset::{DataVariable, Dataset};
use crate::errors::{MldError, Result};
use crate::reader::find_axis;
use crate::time::{TimeUnits, TIME_DIM};
use crate::tools::ExternalTools;
use chrono::NaiveDateTime;
use ndarray::{Array1, ArrayD, Axis, IxDyn};
use netcdf::AttributeValue;
use std::path::{Path, PathBuf};
use tracing::info;

/// Data for one variable, named and labelled with its dimensions
#[derive(Debug, Clone)]
pub struct VariableUpdate {
    pub name: String,
    pub dims: Vec<String>,
    pub data: ArrayD<f64>,
}

impl VariableUpdate {
    pub fn new(name: &str, dims: &[&str], data: ArrayD<f64>) -> Self {
        Self {
            name: name.to_string(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data,
        }
    }

    /// Values of a coordinate variable, which runs along a dimension of its own name
    pub fn coordinate(name: &str, values: &[f64]) -> Self {
        Self {
            name: name.to_string(),
            dims: vec![name.to_string()],
            data: Array1::from(values.to_vec()).into_dyn(),
        }
    }

    pub fn is_coordinate(&self) -> bool {
        self.dims.len() == 1 && self.dims[0] == self.name
    }
}

/// How to create a target file that does not exist yet
#[derive(Debug, Clone)]
pub enum FileTemplate {
    /// CDL schema, instantiated with `ncgen`
    Cdl(PathBuf),
    /// Dimensions and variables declared in code
    Layout(Layout),
}

/// Native schema: dimensions, variables and the time units of an empty file
#[derive(Debug, Clone)]
pub struct Layout {
    pub dimensions: Vec<(String, usize)>,
    pub variables: Vec<(String, Vec<String>)>,
    pub time_units: TimeUnits,
}

impl Layout {
    pub fn new(time_units: TimeUnits) -> Self {
        Self {
            dimensions: Vec::new(),
            variables: Vec::new(),
            time_units,
        }
    }

    /// Layout able to hold `updates`, with an empty time dimension
    pub fn for_updates(updates: &[VariableUpdate]) -> Result<Self> {
        let mut layout = Self::new(TimeUnits::default());
        for update in updates {
            if update.dims.len() != update.data.ndim() {
                return Err(MldError::grid_mismatch(format!(
                    "'{}' declares {} dimensions for {}-D data",
                    update.name,
                    update.dims.len(),
                    update.data.ndim()
                )));
            }
            for (dim, &len) in update.dims.iter().zip(update.data.shape()) {
                let len = if dim == TIME_DIM { 0 } else { len };
                match layout.dimensions.iter().find(|(name, _)| name == dim) {
                    Some((_, existing)) if *existing != len => {
                        return Err(MldError::grid_mismatch(format!(
                            "dimension '{}' used with lengths {} and {}",
                            dim, existing, len
                        )))
                    }
                    Some(_) => {}
                    None => layout.dimensions.push((dim.clone(), len)),
                }
            }
            layout
                .variables
                .push((update.name.clone(), update.dims.clone()));
        }
        Ok(layout)
    }

    /// Write an empty file with this layout
    pub fn instantiate(&self, path: &Path) -> Result<()> {
        let mut dataset = Dataset::new();
        for (name, len) in &self.dimensions {
            dataset.set_dimension(name, *len);
        }

        if self.dimensions.iter().any(|(name, _)| name == TIME_DIM) {
            dataset.insert_variable(
                DataVariable::new(
                    TIME_DIM,
                    vec![TIME_DIM.to_string()],
                    ArrayD::zeros(IxDyn(&[0])),
                )
                .with_attribute("units", self.time_units.to_string())
                .with_attribute("calendar", "standard")
                .with_attribute("standard_name", "time"),
            )?;
        }

        for (name, dims) in &self.variables {
            if name == TIME_DIM {
                continue;
            }
            let shape: Vec<usize> = dims
                .iter()
                .map(|d| dataset.dimension_len(d).unwrap_or(0))
                .collect();
            let mut var = DataVariable::new(
                name.as_str(),
                dims.clone(),
                ArrayD::from_elem(IxDyn(&shape), f64::NAN),
            );
            for (attr, value) in coordinate_attributes(name, dims) {
                var.set_attribute(attr, value);
            }
            dataset.insert_variable(var)?;
        }

        dataset.save(path)
    }
}

/// Writes variables for a set of timestamps into one target file
#[derive(Debug, Clone)]
pub struct GridWriter {
    path: PathBuf,
    template: Option<FileTemplate>,
    tools: ExternalTools,
}

impl GridWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            template: None,
            tools: ExternalTools::default(),
        }
    }

    pub fn with_template(mut self, template: FileTemplate) -> Self {
        self.template = Some(template);
        self
    }

    pub fn with_tools(mut self, tools: ExternalTools) -> Self {
        self.tools = tools;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merge `updates` into the target for `times`.
    ///
    /// Time-dependent updates carry one slice per entry of `times`, in the same
    /// order. Updates without a time dimension replace the whole variable.
    pub fn write(&self, updates: &[VariableUpdate], times: &[NaiveDateTime]) -> Result<()> {
        self.ensure_exists()?;
        info!(file = %self.path.display(), "Ready to write variables");

        let mut dataset = Dataset::open(&self.path)?;

        if !times.is_empty() {
            let mut axis: Vec<NaiveDateTime> = dataset
                .times()?
                .into_iter()
                .filter(|t| !times.contains(t))
                .collect();
            axis.extend_from_slice(times);
            axis.sort();
            axis.dedup();
            dataset.reindex_time(&axis)?;
        }

        for update in updates {
            if update.name == TIME_DIM {
                return Err(MldError::grid_mismatch(
                    "the time axis is written through the timestamp list",
                ));
            }

            if update.is_coordinate() {
                write_coordinate(&mut dataset, update)?;
            } else if update.dims.iter().any(|d| d == TIME_DIM) {
                merge_time_slices(&mut dataset, update, times)?;
            } else {
                replace_variable(&mut dataset, update)?;
            }
            info!(variable = %update.name, "Wrote variable");
        }

        dataset.save(&self.path)
    }

    fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        match &self.template {
            None => Err(MldError::MissingTemplate {
                path: self.path.display().to_string(),
            }),
            Some(FileTemplate::Cdl(cdl)) => self.tools.generate_from_cdl(cdl, &self.path),
            Some(FileTemplate::Layout(layout)) => {
                layout.instantiate(&self.path)?;
                info!(file = %self.path.display(), "Created file from layout");
                Ok(())
            }
        }
    }
}

fn write_coordinate(dataset: &mut Dataset, update: &VariableUpdate) -> Result<()> {
    let len = update.data.len();
    match dataset.dimension_len(&update.name) {
        Some(0) => dataset.resize_empty_dimension(&update.name, len)?,
        Some(existing) if existing != len => {
            return Err(MldError::grid_mismatch(format!(
                "coordinate '{}' has {} values, file dimension has {}",
                update.name, len, existing
            )))
        }
        _ => {}
    }

    let mut var = DataVariable::new(update.name.as_str(), update.dims.clone(), update.data.clone());
    var.attributes = match dataset.variable(&update.name) {
        Some(existing) => existing.attributes.clone(),
        None => coordinate_attributes(&update.name, &update.dims)
            .into_iter()
            .map(|(n, v)| (n.to_string(), v))
            .collect(),
    };
    dataset.insert_variable(var)
}

fn merge_time_slices(
    dataset: &mut Dataset,
    update: &VariableUpdate,
    times: &[NaiveDateTime],
) -> Result<()> {
    let u_axis = find_axis(&update.dims, &update.name, TIME_DIM)?;
    if update.data.len_of(Axis(u_axis)) != times.len() {
        return Err(MldError::grid_mismatch(format!(
            "'{}' holds {} time steps for {} timestamps",
            update.name,
            update.data.len_of(Axis(u_axis)),
            times.len()
        )));
    }

    let axis = dataset.times()?;
    let slots = times
        .iter()
        .map(|t| {
            axis.iter()
                .position(|a| a == t)
                .ok_or_else(|| MldError::TimeNotFound {
                    time: t.to_string(),
                })
        })
        .collect::<Result<Vec<usize>>>()?;

    if dataset.variable(&update.name).is_none() {
        let shape: Vec<usize> = update
            .dims
            .iter()
            .zip(update.data.shape())
            .map(|(d, &len)| if d == TIME_DIM { axis.len() } else { len })
            .collect();
        dataset.insert_variable(DataVariable::new(
            update.name.as_str(),
            update.dims.clone(),
            ArrayD::from_elem(IxDyn(&shape), f64::NAN),
        ))?;
    }

    let target = dataset
        .variable_mut(&update.name)
        .ok_or_else(|| MldError::VariableNotFound {
            var: update.name.clone(),
        })?;
    let t_axis = find_axis(&target.dims, &target.name, TIME_DIM)?;

    let mut target_rest = target.data.shape().to_vec();
    target_rest.remove(t_axis);
    let mut update_rest = update.data.shape().to_vec();
    update_rest.remove(u_axis);
    if target_rest != update_rest {
        return Err(MldError::grid_mismatch(format!(
            "'{}' slices are shaped {:?}, file expects {:?}",
            update.name, update_rest, target_rest
        )));
    }

    for (i, &slot) in slots.iter().enumerate() {
        target
            .data
            .index_axis_mut(Axis(t_axis), slot)
            .assign(&update.data.index_axis(Axis(u_axis), i));
    }
    Ok(())
}

fn replace_variable(dataset: &mut Dataset, update: &VariableUpdate) -> Result<()> {
    let mut var = DataVariable::new(update.name.as_str(), update.dims.clone(), update.data.clone());
    if let Some(existing) = dataset.variable(&update.name) {
        var.attributes = existing.attributes.clone();
    }
    dataset.insert_variable(var)
}

/// CF attributes for recognisable horizontal coordinates
fn coordinate_attributes(name: &str, dims: &[String]) -> Vec<(&'static str, AttributeValue)> {
    if dims.len() != 1 || dims[0] != name {
        return Vec::new();
    }
    let lower = name.to_ascii_lowercase();
    if lower.starts_with("lon") {
        vec![
            ("units", "degrees_east".into()),
            ("standard_name", "longitude".into()),
        ]
    } else if lower.starts_with("lat") {
        vec![
            ("units", "degrees_north".into()),
            ("standard_name", "latitude".into()),
        ]
    } else {
        Vec::new()
    }
}
