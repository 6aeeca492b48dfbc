use anyhow::Result;

use thermalvision::detect::{self, DetectionConfig};
use thermalvision::format::parse_data;
use thermalvision::{
    format_payload, FrameLayout, FrameReducer, PixelGrid, PolicyKind, Precision, RawFrame,
    SENSOR_COLS, SENSOR_NAME, SENSOR_ROWS,
};

/// Row-major 16x12 scene: uniform background with `hot` cells set to `body`.
fn scene(background: f32, body: f32, hot: &[(usize, usize)]) -> Vec<f32> {
    let mut cells = vec![background; SENSOR_ROWS * SENSOR_COLS];
    for &(r, c) in hot {
        cells[r * SENSOR_COLS + c] = body;
    }
    cells
}

fn plus(row: usize, col: usize) -> Vec<(usize, usize)> {
    vec![
        (row, col),
        (row - 1, col),
        (row + 1, col),
        (row, col - 1),
        (row, col + 1),
    ]
}

/// Emit a row-major scene in the sensor's native column-cascade order.
fn as_cascade(cells: Vec<f32>) -> Result<RawFrame> {
    let grid = PixelGrid::from_row_major(SENSOR_ROWS, SENSOR_COLS, cells)?;
    Ok(RawFrame::new(grid.flatten(FrameLayout::ColumnCascade)))
}

fn run(cells: Vec<f32>, config: &DetectionConfig) -> Result<bool> {
    let mut reducer = FrameReducer::new(SENSOR_ROWS, SENSOR_COLS, FrameLayout::ColumnCascade);
    let stats = reducer.reduce(&as_cascade(cells)?)?;
    Ok(detect::detect(reducer.grid(), &stats, config).occupied)
}

#[test]
fn plus_shaped_body_is_detected() -> Result<()> {
    let cells = scene(20.0, 30.0, &plus(5, 5));
    assert!(run(cells, &DetectionConfig::default())?);
    Ok(())
}

#[test]
fn isolated_pair_is_not_a_person() -> Result<()> {
    // Centre plus two warm neighbours: support 3, which does not exceed 3.
    let cells = scene(20.0, 30.0, &[(5, 5), (5, 6), (6, 5)]);
    assert!(!run(cells, &DetectionConfig::default())?);
    Ok(())
}

#[test]
fn band_edges_are_exclusive() -> Result<()> {
    let config = DetectionConfig::default();
    assert!(!run(scene(20.0, 26.0, &plus(8, 6)), &config)?);
    assert!(!run(scene(20.0, 40.0, &plus(8, 6)), &config)?);
    assert!(run(scene(20.0, 26.01, &plus(8, 6)), &config)?);
    Ok(())
}

#[test]
fn uniform_scene_is_empty_under_both_policies() -> Result<()> {
    let mut config = DetectionConfig::default();
    assert!(!run(scene(22.0, 22.0, &[]), &config)?);

    config.apply_update("policy", "adaptive");
    assert_eq!(config.policy(), PolicyKind::Adaptive);
    assert!(!run(scene(22.0, 22.0, &[]), &config)?);
    Ok(())
}

#[test]
fn adaptive_policy_requires_peak_temperature() -> Result<()> {
    let mut config = DetectionConfig::default();
    config.apply_update("policy", "adaptive");
    assert!(run(scene(20.0, 30.0, &plus(10, 3)), &config)?);

    config.apply_update("minimumPeakTemperature", "31");
    assert!(!run(scene(20.0, 30.0, &plus(10, 3)), &config)?);
    Ok(())
}

#[test]
fn payload_matches_reduced_frame() -> Result<()> {
    let mut cells: Vec<f32> = (0..SENSOR_ROWS * SENSOR_COLS)
        .map(|i| 18.0 + (i % 17) as f32 * 0.5)
        .collect();
    cells[37] = 12.25;
    cells[150] = 41.5;

    let mut reducer = FrameReducer::new(SENSOR_ROWS, SENSOR_COLS, FrameLayout::ColumnCascade);
    let stats = reducer.reduce(&as_cascade(cells.clone())?)?;
    let result = detect::detect(reducer.grid(), &stats, &DetectionConfig::default());
    let payload = format_payload(
        SENSOR_NAME,
        &stats,
        reducer.grid(),
        result.occupied,
        Precision::Two,
    );

    assert_eq!(payload.min, 12.25);
    assert_eq!(payload.max, 41.5);
    assert_eq!(payload.min_index, 37);
    assert_eq!(payload.max_index, 150);

    let expected_mean = cells.iter().map(|&t| t as f64).sum::<f64>() / cells.len() as f64;
    assert!((payload.avg as f64 - expected_mean).abs() < 1e-4);
    assert_eq!(payload.temp, payload.avg);

    let values = parse_data(&payload.data)?;
    assert_eq!(values.len(), cells.len());
    for (value, cell) in values.iter().zip(&cells) {
        assert!((value - cell).abs() <= Precision::Two.tolerance());
        assert!(payload.min <= *value && *value <= payload.max);
    }
    assert_eq!(values[payload.min_index], payload.min);
    assert_eq!(values[payload.max_index], payload.max);
    Ok(())
}

#[test]
fn one_decimal_precision_rounds_data() -> Result<()> {
    let cells = scene(21.26, 21.26, &[]);
    let mut reducer = FrameReducer::new(SENSOR_ROWS, SENSOR_COLS, FrameLayout::ColumnCascade);
    let stats = reducer.reduce(&as_cascade(cells)?)?;
    let payload = format_payload(SENSOR_NAME, &stats, reducer.grid(), false, Precision::One);
    assert!(payload.data.split(',').all(|v| v == "21.3"));
    Ok(())
}
