//! The extraction engine.
//!
//! All three geometry kinds run against a materialized variable cube.
//! Area aggregation weights each cell by its ice or cell area, falling
//! back to the uniform cell footprint when the dataset carries no area
//! variable. Variables flagged as uncertainties aggregate in quadrature:
//! sqrt(sum(w * v^2) / sum(w)) instead of the weighted mean.

use tracing::debug;

use is2_assembler::{AssembledDataset, GridWindow, VariableCube};
use is2_common::Is2Result;

use crate::geometry::{point_along, polyline_length, BoundingBox, Geometry};
use crate::series::{ExtractedSeries, SeriesMetadata, SeriesRecord, TransectProfile};

/// Cells of margin around a geometry's bounding box when materializing.
/// One cell covers nearest-cell rounding at the half-step bounds and the
/// far corner of a bilinear sample.
const WINDOW_PAD: usize = 1;

/// A window-shaped cube addressed with full-grid indices.
///
/// Static variables keep a single time slice; `get` clamps the epoch so
/// they read the same at every time step.
struct CubeView<'a> {
    cube: &'a VariableCube,
    row0: usize,
    col0: usize,
}

impl CubeView<'_> {
    fn new<'a>(cube: &'a VariableCube, window: &GridWindow) -> CubeView<'a> {
        CubeView {
            cube,
            row0: window.row_start,
            col0: window.col_start,
        }
    }

    fn get(&self, t: usize, row: usize, col: usize) -> f64 {
        self.cube
            .get(t.min(self.cube.nt - 1), row - self.row0, col - self.col0)
    }

    fn nt(&self) -> usize {
        self.cube.nt
    }
}

/// How transect and point samples read the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interpolation {
    /// Value of the nearest cell center.
    #[default]
    Nearest,
    /// Bilinear blend of the four surrounding cell centers; NaN when any
    /// corner is NaN or the sample falls outside the cell-center hull.
    Bilinear,
}

/// Options controlling extraction.
#[derive(Debug, Clone, Default)]
pub struct ExtractOptions {
    pub interpolation: Interpolation,
    /// Companion uncertainty variable; defaults to `<variable>_sigma`
    /// when the dataset carries it.
    pub uncertainty_variable: Option<String>,
}

/// Extract a time series for one geometry.
pub fn extract(
    dataset: &AssembledDataset,
    geometry: &Geometry,
    variable: &str,
    options: &ExtractOptions,
) -> Is2Result<ExtractedSeries> {
    geometry.validate()?;
    let metadata = series_metadata(dataset, variable);
    let bbox = geometry.bbox();
    let Some(window) = dataset.window(bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y, WINDOW_PAD)
    else {
        debug!(variable, "geometry misses the grid");
        return Ok(ExtractedSeries::empty(metadata));
    };
    let cube = dataset.resolve_window(variable, &window)?;
    let values = CubeView::new(&cube, &window);
    let quadrature = dataset
        .meta(variable)
        .map(|m| m.is_uncertainty)
        .unwrap_or(false);
    let sigma = sigma_cube(dataset, variable, options, quadrature, &window)?;
    let sigma = sigma.as_ref().map(|c| CubeView::new(c, &window));

    match geometry {
        Geometry::Point { x, y } => {
            point_series(dataset, &values, sigma.as_ref(), &window, *x, *y, metadata)
        }
        Geometry::Polyline(vertices) => transect_series(
            dataset,
            &values,
            sigma.as_ref(),
            vertices,
            quadrature,
            options.interpolation,
            metadata,
        ),
        Geometry::Polygon(_) | Geometry::BoundingBox(_) => region_series(
            dataset,
            &values,
            sigma.as_ref(),
            &window,
            geometry,
            quadrature,
            metadata,
        ),
    }
}

/// Sample a variable along a polyline at the grid's native step.
///
/// Returns the full distance-by-time matrix; [`extract`] with a polyline
/// reduces the same samples to one summary value per epoch.
pub fn transect_profile(
    dataset: &AssembledDataset,
    vertices: &[(f64, f64)],
    variable: &str,
    options: &ExtractOptions,
) -> Is2Result<TransectProfile> {
    let line = Geometry::Polyline(vertices.to_vec());
    line.validate()?;
    let metadata = series_metadata(dataset, variable);
    let bbox = line.bbox();
    let Some(window) = dataset.window(bbox.min_x, bbox.max_x, bbox.min_y, bbox.max_y, WINDOW_PAD)
    else {
        debug!(variable, "transect misses the grid");
        return Ok(TransectProfile {
            distances: Vec::new(),
            points: Vec::new(),
            times: Vec::new(),
            values: Vec::new(),
            metadata,
        });
    };
    let cube = dataset.resolve_window(variable, &window)?;
    let view = CubeView::new(&cube, &window);

    let (distances, points) = transect_samples(dataset, vertices);
    let times = epoch_times(dataset, view.nt());
    let mut values = Vec::with_capacity(times.len() * points.len());
    let mut any_valid = false;
    for t in 0..times.len() {
        for &(x, y) in &points {
            let v = sample(dataset, &view, t, x, y, options.interpolation);
            any_valid |= !v.is_nan();
            values.push(v);
        }
    }
    if !any_valid {
        debug!(variable, "transect intersects no valid cells");
        return Ok(TransectProfile {
            distances: Vec::new(),
            points: Vec::new(),
            times: Vec::new(),
            values: Vec::new(),
            metadata,
        });
    }
    Ok(TransectProfile {
        distances,
        points,
        times,
        values,
        metadata,
    })
}

fn series_metadata(dataset: &AssembledDataset, variable: &str) -> SeriesMetadata {
    let meta = dataset.meta(variable).cloned().unwrap_or_default();
    SeriesMetadata {
        variable: variable.to_string(),
        units: meta.units,
        long_name: meta.long_name,
        group: dataset.group.clone(),
        lag_quarters: dataset.lag_quarters,
        crs_wkt: dataset.crs_wkt.clone(),
    }
}

/// Resolve the companion uncertainty cube, when one applies.
fn sigma_cube(
    dataset: &AssembledDataset,
    variable: &str,
    options: &ExtractOptions,
    variable_is_uncertainty: bool,
    window: &GridWindow,
) -> Is2Result<Option<VariableCube>> {
    if variable_is_uncertainty {
        return Ok(None);
    }
    let name = match &options.uncertainty_variable {
        Some(name) => name.clone(),
        None => {
            let default = format!("{variable}_sigma");
            if dataset.meta(&default).is_none() {
                return Ok(None);
            }
            default
        }
    };
    dataset.resolve_window(&name, window).map(Some)
}

/// Epoch times matching a cube's time dimension. Static cubes collapse to
/// the first epoch.
fn epoch_times(dataset: &AssembledDataset, nt: usize) -> Vec<f64> {
    dataset.time[..nt.min(dataset.time.len())].to_vec()
}

/// Nearest index on an axis, or None outside the cell-edge bounds.
fn nearest_index(axis: &[f64], step: f64, value: f64) -> Option<usize> {
    let half = step.abs() / 2.0;
    if value < axis[0] - half || value > axis[axis.len() - 1] + half {
        return None;
    }
    let idx = ((value - axis[0]) / step).round();
    Some((idx.max(0.0) as usize).min(axis.len() - 1))
}

/// Sample a view at a projected coordinate, in full-grid indices.
fn sample(
    dataset: &AssembledDataset,
    view: &CubeView,
    t: usize,
    x: f64,
    y: f64,
    interpolation: Interpolation,
) -> f64 {
    let (dx, dy) = dataset.spacing();
    let (nx, ny) = (dataset.x.len(), dataset.y.len());
    match interpolation {
        Interpolation::Nearest => {
            match (
                nearest_index(&dataset.x, dx, x),
                nearest_index(&dataset.y, dy, y),
            ) {
                (Some(col), Some(row)) => view.get(t, row, col),
                _ => f64::NAN,
            }
        }
        Interpolation::Bilinear => {
            let fx = (x - dataset.x[0]) / dx;
            let fy = (y - dataset.y[0]) / dy;
            if fx < 0.0 || fy < 0.0 || fx > (nx - 1) as f64 || fy > (ny - 1) as f64 {
                return f64::NAN;
            }
            let col0 = (fx.floor() as usize).min(nx - 1);
            let row0 = (fy.floor() as usize).min(ny - 1);
            let col1 = (col0 + 1).min(nx - 1);
            let row1 = (row0 + 1).min(ny - 1);
            let wx = fx - col0 as f64;
            let wy = fy - row0 as f64;
            let v00 = view.get(t, row0, col0);
            let v01 = view.get(t, row0, col1);
            let v10 = view.get(t, row1, col0);
            let v11 = view.get(t, row1, col1);
            (v00 * (1.0 - wx) + v01 * wx) * (1.0 - wy) + (v10 * (1.0 - wx) + v11 * wx) * wy
        }
    }
}

fn point_series(
    dataset: &AssembledDataset,
    values: &CubeView,
    sigma: Option<&CubeView>,
    window: &GridWindow,
    x: f64,
    y: f64,
    metadata: SeriesMetadata,
) -> Is2Result<ExtractedSeries> {
    let (dx, dy) = dataset.spacing();
    let (col, row) = match (
        nearest_index(&dataset.x, dx, x),
        nearest_index(&dataset.y, dy, y),
    ) {
        (Some(col), Some(row)) => (col, row),
        _ => {
            debug!(x, y, "point outside grid bounds");
            return Ok(ExtractedSeries::empty(metadata));
        }
    };

    let weights = area_cube(dataset, window)?;
    let weights = weights.as_ref().map(|c| CubeView::new(c, window));
    let times = epoch_times(dataset, values.nt());
    let records = times
        .iter()
        .enumerate()
        .map(|(t, &time)| SeriesRecord {
            time,
            value: values.get(t, row, col),
            uncertainty: sigma.map(|s| s.get(t, row, col)),
            area: weights.as_ref().map(|w| w.get(t, row, col)),
        })
        .collect();
    Ok(ExtractedSeries { records, metadata })
}

fn transect_samples(dataset: &AssembledDataset, vertices: &[(f64, f64)]) -> (Vec<f64>, Vec<(f64, f64)>) {
    let (dx, dy) = dataset.spacing();
    let step = dx.abs().min(dy.abs());
    let length = polyline_length(vertices);
    let n = (length / step).floor() as usize + 1;
    let distances: Vec<f64> = (0..n).map(|i| i as f64 * step).collect();
    let points = distances
        .iter()
        .map(|&d| point_along(vertices, d))
        .collect();
    (distances, points)
}

fn transect_series(
    dataset: &AssembledDataset,
    values: &CubeView,
    sigma: Option<&CubeView>,
    vertices: &[(f64, f64)],
    quadrature: bool,
    interpolation: Interpolation,
    metadata: SeriesMetadata,
) -> Is2Result<ExtractedSeries> {
    let (_, points) = transect_samples(dataset, vertices);
    let times = epoch_times(dataset, values.nt());

    let mut records = Vec::with_capacity(times.len());
    let mut any_valid = false;
    for (t, &time) in times.iter().enumerate() {
        let mut sum = 0.0;
        let mut count = 0usize;
        // sigma gaps shrink the uncertainty divisor, not the estimate
        let mut sigma_sq_sum = 0.0;
        let mut sigma_count = 0usize;
        for &(x, y) in &points {
            let v = sample(dataset, values, t, x, y, interpolation);
            if v.is_nan() {
                continue;
            }
            sum += if quadrature { v * v } else { v };
            if let Some(s) = sigma {
                let sv = sample(dataset, s, t, x, y, interpolation);
                if !sv.is_nan() {
                    sigma_sq_sum += sv * sv;
                    sigma_count += 1;
                }
            }
            count += 1;
        }
        let (value, uncertainty) = if count == 0 {
            (f64::NAN, None)
        } else {
            any_valid = true;
            let mean = sum / count as f64;
            let value = if quadrature { mean.sqrt() } else { mean };
            let uncertainty =
                (sigma_count > 0).then(|| (sigma_sq_sum / sigma_count as f64).sqrt());
            (value, uncertainty)
        };
        records.push(SeriesRecord {
            time,
            value,
            uncertainty,
            area: None,
        });
    }

    if !any_valid {
        debug!("transect intersects no valid cells");
        return Ok(ExtractedSeries::empty(metadata));
    }
    Ok(ExtractedSeries { records, metadata })
}

/// The area-weight cube over a window, when the dataset carries an area
/// variable.
fn area_cube(dataset: &AssembledDataset, window: &GridWindow) -> Is2Result<Option<VariableCube>> {
    match dataset.area_variable() {
        Some(name) => {
            let name = name.to_string();
            dataset.resolve_window(&name, window).map(Some)
        }
        None => Ok(None),
    }
}

fn region_series(
    dataset: &AssembledDataset,
    values: &CubeView,
    sigma: Option<&CubeView>,
    window: &GridWindow,
    geometry: &Geometry,
    quadrature: bool,
    metadata: SeriesMetadata,
) -> Is2Result<ExtractedSeries> {
    let cells = covered_cells(dataset, geometry);
    if cells.is_empty() {
        debug!("region covers no cell centers");
        return Ok(ExtractedSeries::empty(metadata));
    }

    let weights = area_cube(dataset, window)?;
    let weights = weights.as_ref().map(|c| CubeView::new(c, window));
    let (dx, dy) = dataset.spacing();
    let uniform = (dx * dy).abs();
    let times = epoch_times(dataset, values.nt());

    let mut records = Vec::with_capacity(times.len());
    for (t, &time) in times.iter().enumerate() {
        let mut weight_sum = 0.0;
        let mut value_sum = 0.0;
        // sigma gaps shrink the uncertainty divisor, not the estimate
        let mut sigma_sq_sum = 0.0;
        let mut sigma_weight_sum = 0.0;
        for &(row, col) in &cells {
            let v = values.get(t, row, col);
            let w = match &weights {
                Some(a) => a.get(t, row, col),
                None => uniform,
            };
            if v.is_nan() || w.is_nan() || w <= 0.0 {
                continue;
            }
            weight_sum += w;
            value_sum += if quadrature { w * v * v } else { w * v };
            if let Some(s) = sigma {
                let sv = s.get(t, row, col);
                if !sv.is_nan() {
                    sigma_sq_sum += w * sv * sv;
                    sigma_weight_sum += w;
                }
            }
        }
        let (value, uncertainty) = if weight_sum > 0.0 {
            let mean = value_sum / weight_sum;
            (
                if quadrature { mean.sqrt() } else { mean },
                (sigma_weight_sum > 0.0).then(|| (sigma_sq_sum / sigma_weight_sum).sqrt()),
            )
        } else {
            (f64::NAN, None)
        };
        records.push(SeriesRecord {
            time,
            value,
            uncertainty,
            area: Some(weight_sum),
        });
    }
    Ok(ExtractedSeries { records, metadata })
}

/// Grid cells whose centers fall inside the geometry.
fn covered_cells(dataset: &AssembledDataset, geometry: &Geometry) -> Vec<(usize, usize)> {
    let bbox = geometry.bbox();
    let grid_bbox = BoundingBox {
        min_x: dataset.x[0],
        min_y: dataset.y[0],
        max_x: dataset.x[dataset.x.len() - 1],
        max_y: dataset.y[dataset.y.len() - 1],
    };
    if !bbox.intersects(&grid_bbox) {
        return Vec::new();
    }
    let mut cells = Vec::new();
    for (row, &y) in dataset.y.iter().enumerate() {
        if y < bbox.min_y || y > bbox.max_y {
            continue;
        }
        for (col, &x) in dataset.x.iter().enumerate() {
            if x < bbox.min_x || x > bbox.max_x {
                continue;
            }
            if geometry.contains(x, y) {
                cells.push((row, col));
            }
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use is2_assembler::VariableMeta;
    use is2_common::{Product, Region, Release};

    fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    fn meta(units: &str, is_uncertainty: bool) -> VariableMeta {
        VariableMeta {
            units: units.to_string(),
            long_name: String::new(),
            is_uncertainty,
        }
    }

    /// 4x4 grid at 10 km, two epochs; delta_h = t*100 + row*10 + col.
    fn dataset(area: Option<Vec<f64>>) -> AssembledDataset {
        let (nx, ny, nt) = (4, 4, 2);
        let mut values = Vec::with_capacity(nt * ny * nx);
        for t in 0..nt {
            for row in 0..ny {
                for col in 0..nx {
                    values.push((t * 100 + row * 10 + col) as f64);
                }
            }
        }
        let sigma: Vec<f64> = values.iter().map(|_| 2.0).collect();
        let mut variables = vec![
            (
                "delta_h".to_string(),
                meta("meters", false),
                VariableCube::from_values(nt, ny, nx, values).unwrap(),
            ),
            (
                "delta_h_sigma".to_string(),
                meta("meters", true),
                VariableCube::from_values(nt, ny, nx, sigma).unwrap(),
            ),
        ];
        if let Some(area) = area {
            variables.push((
                "ice_area".to_string(),
                meta("meters^2", false),
                VariableCube::from_values(1, ny, nx, area).unwrap(),
            ));
        }
        AssembledDataset::from_parts(
            Product::Atl15,
            Release::new("003").unwrap(),
            Region::GL,
            Some("delta_h".to_string()),
            0,
            axis(0.0, 10_000.0, nx),
            axis(0.0, 10_000.0, ny),
            vec![45.0, 137.0],
            variables,
            vec!["ice_area".to_string(), "cell_area".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_point_nearest_cell() {
        let ds = dataset(None);
        let series = extract(
            &ds,
            &Geometry::Point { x: 10_900.0, y: 200.0 },
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(series.len(), 2);
        // nearest cell is (row 0, col 1)
        assert_eq!(series.values(), vec![1.0, 101.0]);
        assert_eq!(series.records[0].uncertainty, Some(2.0));
        assert_eq!(series.times(), vec![45.0, 137.0]);
    }

    #[test]
    fn test_point_outside_bounds_is_empty() {
        let ds = dataset(None);
        let series = extract(
            &ds,
            &Geometry::Point { x: 90_000.0, y: 0.0 },
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        assert!(series.is_empty());
        assert_eq!(series.metadata.variable, "delta_h");
    }

    #[test]
    fn test_region_uniform_weights() {
        let ds = dataset(None);
        // covers the four cells rows 0-1, cols 0-1
        let bbox = BoundingBox::new(-5_000.0, -5_000.0, 15_000.0, 15_000.0).unwrap();
        let series = extract(
            &ds,
            &Geometry::BoundingBox(bbox),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        // mean of {0, 1, 10, 11}
        assert!((series.records[0].value - 5.5).abs() < 1e-12);
        assert!((series.records[1].value - 105.5).abs() < 1e-12);
        // uniform weight is the cell footprint
        let area = series.records[0].area.unwrap();
        assert!((area - 4.0 * 1.0e8).abs() < 1.0);
        // sigma aggregates in quadrature: all 2.0 -> 2.0
        assert!((series.records[0].uncertainty.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_region_area_weighted_mean() {
        // weight col 1 nine times heavier in the first two rows
        let mut area = vec![1.0; 16];
        area[1] = 9.0;
        area[5] = 9.0;
        let ds = dataset(Some(area));
        let bbox = BoundingBox::new(-5_000.0, -5_000.0, 15_000.0, 15_000.0).unwrap();
        let series = extract(
            &ds,
            &Geometry::BoundingBox(bbox),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        // (1*0 + 9*1 + 1*10 + 9*11) / 20
        assert!((series.records[0].value - 118.0 / 20.0).abs() < 1e-12);
        assert!((series.records[0].area.unwrap() - 20.0).abs() < 1e-12);
    }

    #[test]
    fn test_subregion_series_recombine_exactly() {
        let mut area = vec![1.0; 16];
        area[0] = 3.0;
        area[10] = 7.0;
        let ds = dataset(Some(area));
        let left = BoundingBox::new(-5_000.0, -5_000.0, 15_000.0, 35_000.0).unwrap();
        let right = BoundingBox::new(15_000.0, -5_000.0, 35_000.0, 35_000.0).unwrap();
        let both = BoundingBox::new(-5_000.0, -5_000.0, 35_000.0, 35_000.0).unwrap();

        let opts = ExtractOptions::default();
        let a = extract(&ds, &Geometry::BoundingBox(left), "delta_h", &opts).unwrap();
        let b = extract(&ds, &Geometry::BoundingBox(right), "delta_h", &opts).unwrap();
        let whole = extract(&ds, &Geometry::BoundingBox(both), "delta_h", &opts).unwrap();

        for t in 0..2 {
            let (wa, wb) = (a.records[t].area.unwrap(), b.records[t].area.unwrap());
            let combined =
                (wa * a.records[t].value + wb * b.records[t].value) / (wa + wb);
            assert!((combined - whole.records[t].value).abs() < 1e-9);
            assert!((wa + wb - whole.records[t].area.unwrap()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_region_outside_grid_is_empty() {
        let ds = dataset(None);
        let bbox = BoundingBox::new(100_000.0, 100_000.0, 200_000.0, 200_000.0).unwrap();
        let series = extract(
            &ds,
            &Geometry::BoundingBox(bbox),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_transect_step_matches_grid_spacing() {
        let ds = dataset(None);
        let line = vec![(0.0, 0.0), (30_000.0, 0.0)];
        let profile =
            transect_profile(&ds, &line, "delta_h", &ExtractOptions::default()).unwrap();
        assert_eq!(profile.distances, vec![0.0, 10_000.0, 20_000.0, 30_000.0]);
        assert_eq!(profile.times, vec![45.0, 137.0]);
        // row 0 values at each epoch
        assert_eq!(profile.value(0, 2), 2.0);
        assert_eq!(profile.value(1, 3), 103.0);

        let series = extract(
            &ds,
            &Geometry::Polyline(line),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        // mean of {0, 1, 2, 3}
        assert!((series.records[0].value - 1.5).abs() < 1e-12);
        assert_eq!(series.records[0].area, None);
    }

    #[test]
    fn test_transect_step_scales_with_cell_size() {
        // same line over a grid twice as coarse takes half the samples
        let coarse = AssembledDataset::from_parts(
            Product::Atl15,
            Release::new("003").unwrap(),
            Region::GL,
            Some("delta_h".to_string()),
            0,
            axis(0.0, 20_000.0, 4),
            axis(0.0, 20_000.0, 4),
            vec![45.0],
            vec![(
                "delta_h".to_string(),
                meta("meters", false),
                VariableCube::from_values(1, 4, 4, vec![1.0; 16]).unwrap(),
            )],
            vec![],
        )
        .unwrap();
        let line = vec![(0.0, 0.0), (60_000.0, 0.0)];
        let profile =
            transect_profile(&coarse, &line, "delta_h", &ExtractOptions::default()).unwrap();
        assert_eq!(profile.distances.len(), 4);

        let fine = dataset(None);
        let short = vec![(0.0, 0.0), (30_000.0, 0.0)];
        let fine_profile =
            transect_profile(&fine, &short, "delta_h", &ExtractOptions::default()).unwrap();
        assert_eq!(fine_profile.distances.len(), 4);
        // half the length at half the spacing keeps the sample count
        assert_eq!(fine_profile.distances[1], 10_000.0);
        assert_eq!(profile.distances[1], 20_000.0);
    }

    #[test]
    fn test_transect_outside_grid_is_empty() {
        let ds = dataset(None);
        let line = vec![(200_000.0, 0.0), (230_000.0, 0.0)];
        let profile =
            transect_profile(&ds, &line, "delta_h", &ExtractOptions::default()).unwrap();
        assert!(profile.is_empty());
        let series = extract(
            &ds,
            &Geometry::Polyline(line),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_uncertainty_variable_aggregates_in_quadrature() {
        let ds = dataset(None);
        let bbox = BoundingBox::new(-5_000.0, -5_000.0, 35_000.0, 5_000.0).unwrap();
        let series = extract(
            &ds,
            &Geometry::BoundingBox(bbox),
            "delta_h_sigma",
            &ExtractOptions::default(),
        )
        .unwrap();
        // all sigmas are 2.0; RSS of a constant is the constant
        assert!((series.records[0].value - 2.0).abs() < 1e-12);
        // an uncertainty series carries no companion uncertainty
        assert_eq!(series.records[0].uncertainty, None);
    }

    #[test]
    fn test_bilinear_point_sampling() {
        let ds = dataset(None);
        let cube = ds.resolve("delta_h").unwrap();
        let view = CubeView::new(&cube, &ds.full_window());
        // halfway between cols 0 and 1 on row 0
        let v = sample(&ds, &view, 0, 5_000.0, 0.0, Interpolation::Bilinear);
        assert!((v - 0.5).abs() < 1e-12);
        // outside the cell-center hull
        let v = sample(&ds, &view, 0, -1.0, 0.0, Interpolation::Bilinear);
        assert!(v.is_nan());
    }

    #[test]
    fn test_sigma_gaps_do_not_dilute_uncertainty() {
        // sigma missing at a cell whose primary value is valid; the
        // propagated uncertainty averages over the sigma-valid cells only
        let (nx, ny) = (4, 4);
        let mut sigma = vec![2.0; ny * nx];
        sigma[1] = f64::NAN; // row 0, col 1
        let ds = AssembledDataset::from_parts(
            Product::Atl15,
            Release::new("003").unwrap(),
            Region::GL,
            Some("delta_h".to_string()),
            0,
            axis(0.0, 10_000.0, nx),
            axis(0.0, 10_000.0, ny),
            vec![45.0],
            vec![
                (
                    "delta_h".to_string(),
                    meta("meters", false),
                    VariableCube::from_values(1, ny, nx, vec![1.0; ny * nx]).unwrap(),
                ),
                (
                    "delta_h_sigma".to_string(),
                    meta("meters", true),
                    VariableCube::from_values(1, ny, nx, sigma).unwrap(),
                ),
            ],
            vec![],
        )
        .unwrap();

        // region covering row 0, cols 0-1
        let bbox = BoundingBox::new(-5_000.0, -5_000.0, 15_000.0, 5_000.0).unwrap();
        let series = extract(
            &ds,
            &Geometry::BoundingBox(bbox),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        assert!((series.records[0].uncertainty.unwrap() - 2.0).abs() < 1e-12);

        // transect over row 0, cols 0-3
        let line = vec![(0.0, 0.0), (30_000.0, 0.0)];
        let series = extract(
            &ds,
            &Geometry::Polyline(line),
            "delta_h",
            &ExtractOptions::default(),
        )
        .unwrap();
        assert!((series.records[0].uncertainty.unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_polygon_region() {
        let ds = dataset(None);
        // triangle covering the three cells (0,0), (0,1), (1,0)... by center
        let poly = Geometry::Polygon(vec![
            (-2_000.0, -2_000.0),
            (16_000.0, -2_000.0),
            (-2_000.0, 16_000.0),
        ]);
        let series = extract(&ds, &poly, "delta_h", &ExtractOptions::default()).unwrap();
        // mean of {0, 1, 10}
        assert!((series.records[0].value - 11.0 / 3.0).abs() < 1e-12);
    }
}
