mod common;

use common::{epoch_days, field, ymd, GridFixture};
use mld_regrid::errors::Result;
use mld_regrid::grid::LonConvention;
use mld_regrid::metadata::{describe_file, print_metadata};
use mld_regrid::reader::CoordinateAliases;
use mld_regrid::time::midnight;
use tempfile::tempdir;

#[test]
fn test_describe_file() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("fields.nc");
    let lon = vec![-10.0, 0.0, 10.0];
    let lat = vec![40.0, 50.0];
    GridFixture::new(lon.clone(), lat.clone())
        .names("longitude", "latitude")
        .times(vec![epoch_days(ymd(2019, 1, 1)), epoch_days(ymd(2019, 1, 3))])
        .write(&path, &[("mld", field(2, &lat, &lon, |_, _, _| 20.0))])?;

    let summary = describe_file(&path, &CoordinateAliases::default())?;

    let names: Vec<&str> = summary.dimensions.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["latitude", "longitude", "time"]);

    let mld = summary
        .variables
        .iter()
        .find(|v| v.name == "mld")
        .expect("mld listed");
    assert_eq!(mld.shape, vec![2, 2, 3]);
    assert_eq!(mld.units.as_deref(), Some("m"));

    let (lon_range, lat_range) = summary.coordinates.clone().expect("coordinates resolved");
    assert_eq!(lon_range.name, "longitude");
    assert_eq!((lon_range.min, lon_range.max), (-10.0, 10.0));
    assert_eq!(lat_range.len, 2);
    assert_eq!(summary.lon_convention, Some(LonConvention::Signed));
    assert_eq!(
        summary.times,
        vec![midnight(ymd(2019, 1, 1)), midnight(ymd(2019, 1, 3))]
    );

    // Printing should not panic
    print_metadata(&path, &CoordinateAliases::default())?;
    Ok(())
}

#[test]
fn test_describe_file_without_coordinates() -> Result<()> {
    let temp_dir = tempdir()?;
    let path = temp_dir.path().join("plain.nc");
    GridFixture::new(vec![0.0], vec![0.0])
        .names("x", "y")
        .write(&path, &[])?;

    let summary = describe_file(&path, &CoordinateAliases::default())?;
    assert!(summary.coordinates.is_none());
    assert!(summary.times.is_empty());
    print_metadata(&path, &CoordinateAliases::default())?;
    Ok(())
}
