use mld_regrid::errors::{MldError, Result};
use mld_regrid::grid::Grid;
use mld_regrid::regrid::{fill_gaps, fill_gaps_1d, regrid_field, InterpMethod};
use ndarray::{array, Array2, Axis};

fn plane(grid: &Grid) -> Array2<f64> {
    Array2::from_shape_fn(grid.shape(), |(j, i)| 2.0 * grid.lat[j] + 0.5 * grid.lon[i] + 1.0)
}

#[test]
fn test_fill_gaps_interior_and_ends() {
    let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
    let mut ys = [f64::NAN, 1.0, f64::NAN, 3.0, f64::NAN];
    fill_gaps_1d(&xs, &mut ys);
    assert_eq!(ys, [0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_fill_gaps_uses_coordinates() {
    let xs = [0.0, 1.0, 10.0];
    let mut ys = [0.0, f64::NAN, 10.0];
    fill_gaps_1d(&xs, &mut ys);
    assert_eq!(ys[1], 1.0);
}

#[test]
fn test_fill_gaps_degenerate_lanes() {
    let xs = [0.0, 1.0, 2.0];

    let mut single = [f64::NAN, 7.0, f64::NAN];
    fill_gaps_1d(&xs, &mut single);
    assert_eq!(single, [7.0, 7.0, 7.0]);

    let mut empty = [f64::NAN; 3];
    fill_gaps_1d(&xs, &mut empty);
    assert!(empty.iter().all(|v| v.is_nan()));

    let mut full = [1.0, 5.0, 2.0];
    fill_gaps_1d(&xs, &mut full);
    assert_eq!(full, [1.0, 5.0, 2.0]);
}

#[test]
fn test_fill_gaps_along_axis() {
    let values = array![[1.0, f64::NAN, 3.0], [f64::NAN, f64::NAN, f64::NAN]];
    let along_lon = fill_gaps(&values.view(), &[0.0, 1.0, 2.0], Axis(1));
    assert_eq!(along_lon.row(0).to_vec(), vec![1.0, 2.0, 3.0]);
    assert!(along_lon.row(1).iter().all(|v| v.is_nan()));

    let along_lat = fill_gaps(&values.view(), &[0.0, 1.0], Axis(0));
    assert_eq!(along_lat[[1, 0]], 1.0);
    assert_eq!(along_lat[[1, 2]], 3.0);
    assert!(along_lat[[1, 1]].is_nan());
}

#[test]
fn test_regrid_identity() -> Result<()> {
    let grid = Grid::new(vec![0.0, 1.0, 2.0, 3.0], vec![10.0, 11.0, 12.0]);
    let values = plane(&grid);

    let out = regrid_field(&grid, values.view(), &grid, InterpMethod::Linear)?;
    assert_eq!(out.dim(), (3, 4));
    for (a, b) in out.iter().zip(values.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_regrid_reproduces_linear_plane() -> Result<()> {
    let src = Grid::new((0..10).map(f64::from).collect(), (0..8).map(f64::from).collect());
    let dst = Grid::new(vec![0.5, 3.25, 8.9], vec![0.1, 6.6]);
    let out = regrid_field(&src, plane(&src).view(), &dst, InterpMethod::Linear)?;

    let expected = plane(&dst);
    for (a, b) in out.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }
    Ok(())
}

#[test]
fn test_regrid_extrapolates_beyond_source() -> Result<()> {
    let src = Grid::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 2.0, 3.0]);
    let dst = Grid::new(vec![-2.0, 5.0], vec![-1.0, 4.0]);
    let out = regrid_field(&src, plane(&src).view(), &dst, InterpMethod::Linear)?;

    let expected = array![[-2.0, 1.5], [8.0, 11.5]];
    for (a, b) in out.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }
    Ok(())
}

#[test]
fn test_regrid_accepts_transposed_input() -> Result<()> {
    let grid = Grid::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0]);
    let values = plane(&grid);

    let out = regrid_field(&grid, values.t(), &grid, InterpMethod::Linear)?;
    for (a, b) in out.iter().zip(values.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_regrid_shape_mismatch() {
    let grid = Grid::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0]);
    let values = Array2::<f64>::zeros((4, 4));
    let result = regrid_field(&grid, values.view(), &grid, InterpMethod::Linear);
    assert!(matches!(result, Err(MldError::GridMismatch { .. })));
}

#[test]
fn test_regrid_descending_latitude() -> Result<()> {
    let src = Grid::new(vec![0.0, 1.0, 2.0], vec![2.0, 1.0, 0.0]);
    let dst = Grid::new(vec![0.5, 1.5], vec![0.5, 1.5]);
    let out = regrid_field(&src, plane(&src).view(), &dst, InterpMethod::Linear)?;

    let expected = plane(&dst);
    for (a, b) in out.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn test_regrid_fills_gaps_before_sampling() -> Result<()> {
    let grid = Grid::new(vec![0.0, 1.0, 2.0], vec![0.0, 1.0, 2.0]);
    let mut values = plane(&grid);
    values[[1, 1]] = f64::NAN;

    let out = regrid_field(&grid, values.view(), &grid, InterpMethod::Linear)?;
    assert!((out[[1, 1]] - plane(&grid)[[1, 1]]).abs() < 1e-9);
    assert!(out.iter().all(|v| v.is_finite()));
    Ok(())
}

#[test]
fn test_regrid_nearest() -> Result<()> {
    let src = Grid::new(vec![0.0, 10.0], vec![0.0, 10.0]);
    let values = array![[1.0, 2.0], [3.0, 4.0]];
    let dst = Grid::new(vec![9.0, 1.0], vec![2.0]);

    let out = regrid_field(&src, values.view(), &dst, InterpMethod::Nearest)?;
    assert_eq!(out, array![[2.0, 1.0]]);
    Ok(())
}

#[test]
fn test_regrid_nearest_rejects_nan_target() {
    let src = Grid::new(vec![0.0, 10.0], vec![0.0, 10.0]);
    let values = array![[1.0, 2.0], [3.0, 4.0]];
    let dst = Grid::new(vec![f64::NAN], vec![5.0]);

    let result = regrid_field(&src, values.view(), &dst, InterpMethod::Nearest);
    assert!(matches!(result, Err(MldError::GridMismatch { .. })));
}

#[test]
fn test_interp_method_parsing() {
    assert_eq!("bilinear".parse::<InterpMethod>(), Ok(InterpMethod::Linear));
    assert_eq!("Nearest".parse::<InterpMethod>(), Ok(InterpMethod::Nearest));
    assert!("spline".parse::<InterpMethod>().is_err());
    assert_eq!(InterpMethod::Cubic.to_string(), "cubic");
}
