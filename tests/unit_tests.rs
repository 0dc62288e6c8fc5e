//! Unit tests for the coordinate, time, quality-control and configuration helpers

use chrono::NaiveDate;
use mld_regrid::{
    config::{ConcatMode, PipelineConfig},
    errors::{MldError, Result},
    file_regrid::reconcile_longitudes,
    grid::{ascending_order, monotonic, nearest_index, Grid, LonConvention, Monotonic},
    qc::{apply_mask, clamp, coarsen, fill_masked, mask_to_values, nan_mask, zero_mask, ClampRange},
    regrid::InterpMethod,
    time::{midnight, parse_timestamp, TimeUnit, TimeUnits},
    tools::ExternalTools,
};
use ndarray::{array, Array2};
use std::path::{Path, PathBuf};

#[test]
fn test_error_display() {
    let var_err = MldError::VariableNotFound {
        var: "MLD".to_string(),
    };
    assert!(format!("{}", var_err).contains("Variable 'MLD' not found"));

    let coord_err = MldError::CoordinateNotFound {
        axis: "longitude".to_string(),
        candidates: vec!["lon".to_string(), "longitude".to_string()],
    };
    let message = coord_err.to_string();
    assert!(message.contains("longitude"));
    assert!(message.contains("lon"));

    let generic_err = MldError::Generic("Test error".to_string());
    assert_eq!(format!("{}", generic_err), "Test error");
}

#[test]
fn test_grid_coarsen_keeps_first_point() -> Result<()> {
    let grid = Grid::new((0..25).map(f64::from).collect(), (0..11).map(f64::from).collect());
    let coarse = grid.coarsen(10)?;
    assert_eq!(coarse.lon, vec![0.0, 10.0, 20.0]);
    assert_eq!(coarse.lat, vec![0.0, 10.0]);
    assert!(matches!(grid.coarsen(0), Err(MldError::ConfigError(_))));
    Ok(())
}

#[test]
fn test_lon_convention() {
    assert_eq!(LonConvention::detect(&[-170.0, 0.0, 170.0]), LonConvention::Signed);
    assert_eq!(LonConvention::detect(&[0.0, 180.0, 359.0]), LonConvention::Unsigned);

    assert_eq!(LonConvention::Signed.normalize(190.0), -170.0);
    assert_eq!(LonConvention::Signed.normalize(180.0), 180.0);
    assert_eq!(LonConvention::Unsigned.normalize(-10.0), 350.0);
    assert_eq!(LonConvention::Unsigned.normalize(10.0), 10.0);
}

#[test]
fn test_reconcile_longitudes_sorts_and_converts() {
    let target = [170.0, 190.0, 350.0, 10.0];
    let lons = reconcile_longitudes(&target, LonConvention::Signed);

    assert_eq!(lons.order, vec![3, 0, 1, 2]);
    assert_eq!(lons.lon, vec![10.0, 170.0, 190.0, 350.0]);
    assert_eq!(lons.interp_lon, vec![10.0, 170.0, -170.0, -10.0]);
    // The input is only borrowed
    assert_eq!(target, [170.0, 190.0, 350.0, 10.0]);
}

#[test]
fn test_reconcile_signed_target_for_unsigned_source() {
    let lons = reconcile_longitudes(&[-10.0, 10.0, -170.0], LonConvention::Unsigned);

    assert_eq!(lons.order, vec![2, 0, 1]);
    assert_eq!(lons.lon, vec![-170.0, -10.0, 10.0]);
    assert_eq!(lons.interp_lon, vec![190.0, 350.0, 10.0]);
}

#[test]
fn test_coordinate_helpers() {
    assert_eq!(monotonic(&[1.0, 2.0, 3.0]), Some(Monotonic::Increasing));
    assert_eq!(monotonic(&[3.0, 2.0]), Some(Monotonic::Decreasing));
    assert_eq!(monotonic(&[1.0, 3.0, 2.0]), None);
    assert_eq!(monotonic(&[1.0, f64::NAN]), None);

    assert_eq!(ascending_order(&[3.0, f64::NAN, 1.0]), vec![2, 0, 1]);

    assert_eq!(nearest_index(&[0.0, 1.0, 2.0], 1.4), Some(1));
    assert_eq!(nearest_index(&[0.0, 1.0], 0.5), Some(0));
    assert_eq!(nearest_index(&[], 0.5), None);
    assert_eq!(nearest_index(&[0.0, 1.0], f64::NAN), None);
}

#[test]
fn test_time_units_round_trip() -> Result<()> {
    let units = TimeUnits::parse("hours since 2019-01-01 00:00:00")?;
    assert_eq!(units.unit, TimeUnit::Hours);

    let t = units.decode(30.0)?;
    assert_eq!(t, parse_timestamp("2019-01-02 06:00")?);
    assert_eq!(units.encode(t), 30.0);

    let default = TimeUnits::default();
    assert_eq!(default.to_string(), "days since 1970-01-01 00:00:00");
    assert!(matches!(
        TimeUnits::parse("fortnights since 2019-01-01"),
        Err(MldError::InvalidTime { .. })
    ));
    assert!(default.decode(f64::NAN).is_err());
    Ok(())
}

#[test]
fn test_parse_timestamp_formats() -> Result<()> {
    let expected = midnight(NaiveDate::from_ymd_opt(2019, 1, 3).expect("valid date"));
    assert_eq!(parse_timestamp("2019-01-03")?, expected);
    assert_eq!(parse_timestamp("2019-01-03T00:00:00Z")?, expected);
    assert_eq!(parse_timestamp("2019-01-03 00:00:00 UTC")?, expected);
    assert!(parse_timestamp("3 Jan 2019").is_err());
    Ok(())
}

#[test]
fn test_clamp_is_idempotent_and_keeps_nan() {
    let range = ClampRange::default();
    let mut field = array![[-5.0, 250.0], [f64::NAN, 900.0]];

    clamp(&mut field, range);
    assert_eq!(field[[0, 0]], 0.0);
    assert_eq!(field[[0, 1]], 250.0);
    assert!(field[[1, 0]].is_nan());
    assert_eq!(field[[1, 1]], 500.0);

    let once = field.clone();
    clamp(&mut field, range);
    assert_eq!(field[[1, 1]], once[[1, 1]]);
    assert!(field.iter().filter(|v| !v.is_nan()).all(|&v| range.contains(v)));

    assert!(ClampRange::new(10.0, 1.0).is_err());
}

#[test]
fn test_masks() -> Result<()> {
    let field = array![[f64::NAN, 0.0, 3.0], [1.0, f64::NAN, 0.0]];

    let land = nan_mask(&field.view());
    assert_eq!(land, array![[true, false, false], [false, true, false]]);
    assert_eq!(
        zero_mask(&field.view()),
        array![[false, true, false], [false, false, true]]
    );
    assert_eq!(
        mask_to_values(&land.view()),
        array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]
    );

    let mut filled = field.clone();
    fill_masked(&mut filled, &land.view(), 0.0)?;
    assert_eq!(filled, array![[0.0, 0.0, 3.0], [1.0, 0.0, 0.0]]);

    let mut masked = Array2::from_elem((2, 3), 5.0);
    apply_mask(&mut masked, &land.view())?;
    assert!(masked[[0, 0]].is_nan());
    assert_eq!(masked[[0, 1]], 5.0);

    let wrong = Array2::from_elem((3, 3), false);
    assert!(matches!(
        fill_masked(&mut filled, &wrong.view(), 0.0),
        Err(MldError::GridMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_coarsen_mask() -> Result<()> {
    let mask = Array2::from_shape_fn((5, 5), |(j, i)| j == i);
    let coarse = coarsen(&mask.view(), 2)?;
    assert_eq!(coarse.dim(), (3, 3));
    assert!(coarse[[1, 1]]);
    assert!(!coarse[[0, 1]]);
    Ok(())
}

#[test]
fn test_config_defaults() {
    let config = PipelineConfig::default();
    assert_eq!(config.variables, vec!["MLD_Tdiff_est", "MLD_Tdiff_dia"]);
    assert_eq!(config.dates.len(), 3);
    assert_eq!(config.stride, 10);
    assert_eq!(config.lon_min, Some(120.0));
    assert_eq!(config.concat, ConcatMode::Ncrcat);
    assert_eq!(config.mask_variable, "LANDMASK");
    assert!(config.validate().is_ok());
}

#[test]
fn test_config_from_json_overrides() -> Result<()> {
    let config = PipelineConfig::from_json_str(
        r#"{
            "work_dir": "/data/run",
            "dates": ["2020-02-28", "2020-02-29"],
            "stride": 4,
            "method": "nearest",
            "concat": "native",
            "clamp": { "max": 300.0 },
            "tools": { "ncrcat": "/opt/nco/bin/ncrcat" }
        }"#,
    )?;

    assert_eq!(config.stride, 4);
    assert_eq!(config.method, InterpMethod::Nearest);
    assert_eq!(config.concat, ConcatMode::Native);
    assert_eq!(config.clamp, ClampRange { min: 0.0, max: 300.0 });
    assert_eq!(config.tools.ncrcat, "/opt/nco/bin/ncrcat");
    assert_eq!(config.tools.ncgen, "ncgen");
    assert_eq!(
        config.daily_path(config.dates[1]),
        PathBuf::from("/data/run/HYCOM_inv_20200229_int.nc")
    );
    assert_eq!(config.source_path(), Path::new("/data/run/HYCOM_inv_20190101-0103.nc"));
    Ok(())
}

#[test]
fn test_config_rejects_invalid_values() {
    assert!(matches!(
        PipelineConfig::from_json_str(r#"{ "stride": 0 }"#),
        Err(MldError::ConfigError(_))
    ));
    assert!(matches!(
        PipelineConfig::from_json_str(r#"{ "variables": [] }"#),
        Err(MldError::ConfigError(_))
    ));
    assert!(matches!(
        PipelineConfig::from_json_str(r#"{ "daily_pattern": "out.nc" }"#),
        Err(MldError::ConfigError(_))
    ));
    assert!(PipelineConfig::from_json_str("{ not json").is_err());
}

#[test]
fn test_missing_tool_is_reported() {
    let tools = ExternalTools {
        ncgen: "definitely-not-an-installed-ncgen".to_string(),
        ncrcat: "definitely-not-an-installed-ncrcat".to_string(),
    };
    match tools.concatenate_records(&[PathBuf::from("a.nc")], Path::new("b.nc")) {
        Err(MldError::ExternalTool { status, .. }) => assert_eq!(status, None),
        other => panic!("Expected ExternalTool error, got {:?}", other),
    }
}
