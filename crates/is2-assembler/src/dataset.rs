//! The assembled dataset and the assembly entry point.
//!
//! Assembly opens every resolved granule concurrently, verifies grid
//! compatibility, and produces a dataset on the union grid. Variables stay
//! deferred until [`AssembledDataset::resolve`] or
//! [`AssembledDataset::resolve_window`] materializes one by overlaying each
//! granule's data at its lattice offset, in resolved order, so later
//! granules take precedence where valid cells overlap. Windowed
//! materialization reads only the granule subsets the window touches; the
//! high-resolution grids do not fit in memory whole.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{debug, warn};

use is2_common::{
    days_to_decimal_years, Is2Error, Is2Result, Product, Region, Release,
};
use is2_catalog::ResolvedGranuleSet;

use crate::granule::{open_granule, OpenGranule};
use crate::merge::union_grid;
use crate::schema::descriptor_for;
use crate::store::CloudStoreConfig;

pub use crate::granule::VariableMeta;

/// A materialized variable of shape `(nt, ny, nx)`, time-major.
///
/// Static variables in a time-resolved dataset keep `nt == 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableCube {
    pub nt: usize,
    pub ny: usize,
    pub nx: usize,
    values: Vec<f64>,
}

impl VariableCube {
    /// Create a cube filled with NaN.
    pub fn new_filled(nt: usize, ny: usize, nx: usize) -> Self {
        Self {
            nt,
            ny,
            nx,
            values: vec![f64::NAN; nt * ny * nx],
        }
    }

    /// Wrap existing values, validating the length.
    pub fn from_values(nt: usize, ny: usize, nx: usize, values: Vec<f64>) -> Is2Result<Self> {
        if values.len() != nt * ny * nx {
            return Err(Is2Error::metadata(format!(
                "variable data length {} does not match shape ({nt}, {ny}, {nx})",
                values.len()
            )));
        }
        Ok(Self { nt, ny, nx, values })
    }

    pub fn get(&self, t: usize, row: usize, col: usize) -> f64 {
        self.values[(t * self.ny + row) * self.nx + col]
    }

    pub fn set(&mut self, t: usize, row: usize, col: usize, value: f64) {
        self.values[(t * self.ny + row) * self.nx + col] = value;
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

/// An index window onto the union grid; `row_end` and `col_end` are
/// exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridWindow {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl GridWindow {
    pub fn rows(&self) -> usize {
        self.row_end - self.row_start
    }

    pub fn cols(&self) -> usize {
        self.col_end - self.col_start
    }
}

#[derive(Debug)]
struct VariableEntry {
    meta: VariableMeta,
    /// Materialized data; `None` reads from the granules on demand.
    data: Option<VariableCube>,
}

#[derive(Debug)]
struct GranuleOverlay {
    granule: OpenGranule,
    x_offset: usize,
    y_offset: usize,
}

/// Options controlling assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleOptions {
    /// Group to assemble; defaults to the schema's first group.
    pub group: Option<String>,
    /// Variables to read; defaults to the group's standard set.
    pub variables: Option<Vec<String>>,
    pub cloud: CloudStoreConfig,
}

/// A merged, group-scoped view over one or more granules.
#[derive(Debug)]
pub struct AssembledDataset {
    pub product: Product,
    pub release: Release,
    /// Region as requested, before composite expansion.
    pub region: Region,
    /// Group name, `None` for the flat layout.
    pub group: Option<String>,
    pub lag_quarters: u32,
    /// Ascending union x axis (projected meters).
    pub x: Vec<f64>,
    /// Ascending union y axis (projected meters).
    pub y: Vec<f64>,
    /// Time axis in days since the mission epoch.
    pub time: Vec<f64>,
    pub crs_wkt: Option<String>,
    /// Whether every requested sub-tile contributed a granule.
    pub complete: bool,
    spacing: (f64, f64),
    area_preference: Vec<String>,
    granules: Vec<GranuleOverlay>,
    entries: BTreeMap<String, VariableEntry>,
}

impl AssembledDataset {
    /// Build a fully materialized dataset from in-memory parts.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        product: Product,
        release: Release,
        region: Region,
        group: Option<String>,
        lag_quarters: u32,
        x: Vec<f64>,
        y: Vec<f64>,
        time: Vec<f64>,
        variables: Vec<(String, VariableMeta, VariableCube)>,
        area_preference: Vec<String>,
    ) -> Is2Result<Self> {
        if x.len() < 2 || y.len() < 2 {
            return Err(Is2Error::metadata(
                "dataset axes need at least two coordinates",
            ));
        }
        let spacing = (
            (x[x.len() - 1] - x[0]) / (x.len() - 1) as f64,
            (y[y.len() - 1] - y[0]) / (y.len() - 1) as f64,
        );
        let mut entries = BTreeMap::new();
        for (name, meta, cube) in variables {
            if cube.ny != y.len() || cube.nx != x.len() {
                return Err(Is2Error::metadata(format!(
                    "variable {name} shape ({}, {}) does not match axes",
                    cube.ny, cube.nx
                )));
            }
            entries.insert(
                name,
                VariableEntry {
                    meta,
                    data: Some(cube),
                },
            );
        }
        Ok(Self {
            product,
            release,
            region,
            group,
            lag_quarters,
            x,
            y,
            time,
            crs_wkt: None,
            complete: true,
            spacing,
            area_preference,
            granules: Vec::new(),
            entries,
        })
    }

    /// Grid spacing (dx, dy) in projected meters.
    pub fn spacing(&self) -> (f64, f64) {
        self.spacing
    }

    /// Variable names available on this dataset, sorted.
    pub fn variable_names(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn meta(&self, variable: &str) -> Option<&VariableMeta> {
        self.entries.get(variable).map(|e| &e.meta)
    }

    /// The preferred area-weight variable present on this dataset.
    pub fn area_variable(&self) -> Option<&str> {
        self.area_preference
            .iter()
            .map(String::as_str)
            .find(|name| self.entries.contains_key(*name))
    }

    /// The time axis as fractional calendar years.
    pub fn decimal_years(&self) -> Vec<f64> {
        self.time.iter().map(|&d| days_to_decimal_years(d)).collect()
    }

    /// The window spanning the whole grid.
    pub fn full_window(&self) -> GridWindow {
        GridWindow {
            row_start: 0,
            row_end: self.y.len(),
            col_start: 0,
            col_end: self.x.len(),
        }
    }

    /// The index window covering a coordinate range, padded by `pad` cells
    /// on each side. `None` when the range misses the grid entirely.
    pub fn window(
        &self,
        min_x: f64,
        max_x: f64,
        min_y: f64,
        max_y: f64,
        pad: usize,
    ) -> Option<GridWindow> {
        let (col_start, col_end) = axis_window(&self.x, self.spacing.0, min_x, max_x, pad)?;
        let (row_start, row_end) = axis_window(&self.y, self.spacing.1, min_y, max_y, pad)?;
        Some(GridWindow {
            row_start,
            row_end,
            col_start,
            col_end,
        })
    }

    /// Materialize a variable onto the full union grid.
    ///
    /// Reads every cell; prefer [`AssembledDataset::resolve_window`] when
    /// only part of the grid is needed.
    pub fn resolve(&self, variable: &str) -> Is2Result<VariableCube> {
        self.resolve_window(variable, &self.full_window())
    }

    /// Materialize a variable over an index window of the union grid.
    ///
    /// The returned cube is window-shaped; callers translate grid indices
    /// by the window origin. Granules overlay in resolved order; a later
    /// granule's valid cells overwrite earlier ones, and cells no granule
    /// covers stay NaN.
    pub fn resolve_window(&self, variable: &str, window: &GridWindow) -> Is2Result<VariableCube> {
        let entry = self.entries.get(variable).ok_or_else(|| {
            Is2Error::invalid_query(format!("unknown variable: {variable}"))
        })?;
        let (wrows, wcols) = (window.rows(), window.cols());
        if wrows == 0 || wcols == 0 || window.row_end > self.y.len() || window.col_end > self.x.len()
        {
            return Err(Is2Error::invalid_query(format!(
                "window {window:?} outside grid ({}, {})",
                self.y.len(),
                self.x.len()
            )));
        }

        if let Some(cube) = &entry.data {
            if wrows == self.y.len() && wcols == self.x.len() {
                return Ok(cube.clone());
            }
            let mut out = VariableCube::new_filled(cube.nt, wrows, wcols);
            for t in 0..cube.nt {
                for row in 0..wrows {
                    for col in 0..wcols {
                        out.set(
                            t,
                            row,
                            col,
                            cube.get(t, window.row_start + row, window.col_start + col),
                        );
                    }
                }
            }
            return Ok(out);
        }

        let has_time = self.granules.iter().any(|o| {
            o.granule
                .variable(variable)
                .map(|v| v.has_time_dim)
                .unwrap_or(false)
        });
        let nt = if has_time { self.time.len() } else { 1 };
        let mut cube = VariableCube::new_filled(nt, wrows, wcols);

        for overlay in &self.granules {
            let var = match overlay.granule.variable(variable) {
                Some(var) => var,
                None => continue,
            };
            let gny = overlay.granule.y.len();
            let gnx = overlay.granule.x.len();
            // the granule's footprint clipped to the window, in grid indices
            let row_start = window.row_start.max(overlay.y_offset);
            let row_end = window.row_end.min(overlay.y_offset + gny);
            let col_start = window.col_start.max(overlay.x_offset);
            let col_end = window.col_end.min(overlay.x_offset + gnx);
            if row_start >= row_end || col_start >= col_end {
                continue;
            }
            let data = var.read_window(
                overlay.granule.y_descending,
                (row_start - overlay.y_offset)..(row_end - overlay.y_offset),
                (col_start - overlay.x_offset)..(col_end - overlay.x_offset),
            )?;
            let (rrows, rcols) = (row_end - row_start, col_end - col_start);
            let gnt = if var.has_time_dim { nt } else { 1 };
            for t in 0..gnt {
                for row in 0..rrows {
                    for col in 0..rcols {
                        let value = data[(t * rrows + row) * rcols + col];
                        if value.is_nan() {
                            continue;
                        }
                        cube.set(
                            t,
                            row_start - window.row_start + row,
                            col_start - window.col_start + col,
                            value,
                        );
                    }
                }
            }
            debug!(
                variable,
                granule = %overlay.granule.name,
                rows = rrows,
                cols = rcols,
                "granule window overlaid"
            );
        }
        Ok(cube)
    }
}

/// Index span of cells covering `[min, max]` on one ascending axis, with
/// `pad` extra cells on each side, clamped to the axis.
fn axis_window(axis: &[f64], step: f64, min: f64, max: f64, pad: usize) -> Option<(usize, usize)> {
    let n = axis.len() as i64;
    let first = ((min - axis[0]) / step).floor() as i64 - pad as i64;
    let last = ((max - axis[0]) / step).ceil() as i64 + pad as i64;
    if last < 0 || first >= n {
        return None;
    }
    let start = first.max(0) as usize;
    let end = (last + 1).min(n) as usize;
    (start < end).then_some((start, end))
}

/// Assemble a dataset from a resolved granule set.
pub async fn assemble(
    set: &ResolvedGranuleSet,
    options: &AssembleOptions,
) -> Is2Result<AssembledDataset> {
    let first = set.granules.first().ok_or_else(|| {
        Is2Error::invalid_query("cannot assemble an empty granule set")
    })?;
    let product = first.name.product;
    let release = first.name.release.clone();
    let schema = descriptor_for(product, &release);
    let group = schema.group(options.group.as_deref())?;
    let variables = options
        .variables
        .clone()
        .unwrap_or_else(|| group.default_variables());

    if !set.complete {
        warn!(missing = ?set.missing, "assembling an incomplete granule set");
    }

    let mut handles = Vec::with_capacity(set.granules.len());
    for granule in set.granules.clone() {
        let variables = variables.clone();
        let cloud = options.cloud.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            open_granule(&granule, schema, group, &variables, &cloud)
        }));
    }
    let mut opened = Vec::with_capacity(handles.len());
    for joined in join_all(handles).await {
        let granule = joined.map_err(|e| Is2Error::storage(format!("open task: {e}")))??;
        opened.push(granule);
    }

    let (x_axis, y_axis) = union_grid(&opened)?;
    let time = opened[0].time.clone();
    if time.windows(2).any(|pair| pair[1] <= pair[0]) {
        return Err(Is2Error::metadata(format!(
            "time axis is not strictly increasing in {}",
            opened[0].name
        )));
    }
    let crs_wkt = opened.iter().find_map(|g| g.crs_wkt.clone());

    let mut entries = BTreeMap::new();
    for name in &variables {
        let Some(meta) = opened
            .iter()
            .find_map(|g| g.variable(name).map(|v| v.meta.clone()))
        else {
            continue;
        };
        entries.insert(name.clone(), VariableEntry { meta, data: None });
    }

    let granules = opened
        .into_iter()
        .zip(x_axis.offsets.iter().zip(&y_axis.offsets))
        .map(|(granule, (&x_offset, &y_offset))| GranuleOverlay {
            granule,
            x_offset,
            y_offset,
        })
        .collect();

    Ok(AssembledDataset {
        product,
        release,
        region: set.region,
        group: (!group.name.is_empty()).then(|| group.name.to_string()),
        lag_quarters: group.lag_quarters,
        x: x_axis.values,
        y: y_axis.values,
        time,
        crs_wkt,
        complete: set.complete,
        spacing: (x_axis.step, y_axis.step),
        area_preference: group.area.iter().map(|s| s.to_string()).collect(),
        granules,
        entries,
    })
}
