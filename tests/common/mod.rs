//! NetCDF fixtures shared by the integration tests

#![allow(dead_code)]

use chrono::NaiveDate;
use mld_regrid::errors::Result;
use netcdf::create;
use std::path::Path;

pub const TIME_UNITS: &str = "days since 1970-01-01 00:00:00";

/// Days since the Unix epoch at midnight of `date`
pub fn epoch_days(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch");
    (date - epoch).num_days() as f64
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Layout of a `(time, lat, lon)` fixture file
pub struct GridFixture<'a> {
    pub lon_name: &'a str,
    pub lat_name: &'a str,
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    /// Days since the epoch; no time axis when empty
    pub times: Vec<f64>,
}

impl<'a> GridFixture<'a> {
    pub fn new(lon: Vec<f64>, lat: Vec<f64>) -> Self {
        Self {
            lon_name: "lon",
            lat_name: "lat",
            lon,
            lat,
            times: Vec::new(),
        }
    }

    pub fn names(mut self, lon_name: &'a str, lat_name: &'a str) -> Self {
        self.lon_name = lon_name;
        self.lat_name = lat_name;
        self
    }

    pub fn times(mut self, times: Vec<f64>) -> Self {
        self.times = times;
        self
    }

    /// Write the grid and `variables`, each given as flattened `(time, lat, lon)`
    /// (or `(lat, lon)` without a time axis) values
    pub fn write(&self, path: &Path, variables: &[(&str, Vec<f32>)]) -> Result<()> {
        let mut file = create(path)?;

        if !self.times.is_empty() {
            file.add_dimension("time", self.times.len())?;
        }
        file.add_dimension(self.lat_name, self.lat.len())?;
        file.add_dimension(self.lon_name, self.lon.len())?;

        if !self.times.is_empty() {
            let mut time = file.add_variable::<f64>("time", &["time"])?;
            time.put_attribute("units", TIME_UNITS)?;
            time.put_values(&self.times, ..)?;
        }

        let mut lon = file.add_variable::<f64>(self.lon_name, &[self.lon_name])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put_values(&self.lon, ..)?;

        let mut lat = file.add_variable::<f64>(self.lat_name, &[self.lat_name])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_values(&self.lat, ..)?;

        let dims: Vec<&str> = if self.times.is_empty() {
            vec![self.lat_name, self.lon_name]
        } else {
            vec!["time", self.lat_name, self.lon_name]
        };
        for (name, values) in variables {
            let mut var = file.add_variable::<f32>(name, &dims)?;
            var.put_attribute("units", "m")?;
            var.put_values(values, ..)?;
        }

        file.add_attribute("title", "fixture")?;
        Ok(())
    }
}

/// `f(t, lat, lon)` evaluated over a fixture grid in `(time, lat, lon)` order
pub fn field(
    steps: usize,
    lat: &[f64],
    lon: &[f64],
    f: impl Fn(usize, f64, f64) -> f32,
) -> Vec<f32> {
    let mut values = Vec::with_capacity(steps * lat.len() * lon.len());
    for t in 0..steps {
        for &y in lat {
            for &x in lon {
                values.push(f(t, y, x));
            }
        }
    }
    values
}

pub fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-3
}
