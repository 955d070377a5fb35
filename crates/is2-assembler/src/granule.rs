//! Opening individual granule stores.
//!
//! Opening a granule reads its coordinate and time axes eagerly (they are
//! small) and keeps the data arrays as open handles for deferred reads.
//! Stored y axes may run north-to-south; coordinates are normalized to
//! ascending order here and data rows are flipped to match when the
//! variable is eventually read.

use std::ops::Range;

use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;

use is2_common::{GranuleName, Is2Error, Is2Result, StorageBackend};
use is2_catalog::ResolvedGranule;
use tracing::debug;

use crate::schema::{GroupDescriptor, Layout, SchemaDescriptor};
use crate::store::{open_cloud_store, open_local_store, CloudStoreConfig, GranuleStorage};

/// Descriptive metadata for one variable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VariableMeta {
    pub units: String,
    pub long_name: String,
    /// Aggregate in quadrature instead of linearly.
    pub is_uncertainty: bool,
}

/// An open data array within a granule.
pub struct GranuleVariable {
    pub name: String,
    pub meta: VariableMeta,
    /// Whether the array has a leading time dimension.
    pub has_time_dim: bool,
    array: Array<dyn ReadableStorageTraits>,
}

impl std::fmt::Debug for GranuleVariable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GranuleVariable")
            .field("name", &self.name)
            .field("meta", &self.meta)
            .field("has_time_dim", &self.has_time_dim)
            .finish_non_exhaustive()
    }
}

impl GranuleVariable {
    /// Read a spatial window across every epoch, row order normalized to
    /// ascending y.
    ///
    /// `rows` and `cols` index the ascending-y grid; only the chunks the
    /// window touches are retrieved, so a small geometry against a
    /// continental grid never pulls the full raster. Returns time-major
    /// data of shape `(nt, rows.len(), cols.len())`; arrays without a time
    /// dimension come back as a single slice.
    pub fn read_window(
        &self,
        y_descending: bool,
        rows: Range<usize>,
        cols: Range<usize>,
    ) -> Is2Result<Vec<f64>> {
        let shape = self.array.shape().to_vec();
        let (nt, ny, nx) = match shape.len() {
            2 => (1, shape[0] as usize, shape[1] as usize),
            3 => (shape[0] as usize, shape[1] as usize, shape[2] as usize),
            n => {
                return Err(Is2Error::metadata(format!(
                    "{} has {n} dimensions, expected 2 or 3",
                    self.name
                )))
            }
        };
        if rows.is_empty() || cols.is_empty() || rows.end > ny || cols.end > nx {
            return Err(Is2Error::read_failed(format!(
                "window rows {rows:?} cols {cols:?} outside {} shape ({ny}, {nx})",
                self.name
            )));
        }
        let (wrows, wcols) = (rows.len(), cols.len());
        // an ascending row range maps to stored rows counted from the
        // other end when the stored axis runs north-to-south
        let stored_row_start = if y_descending { ny - rows.end } else { rows.start };
        let (start, window_shape) = if shape.len() == 2 {
            (
                vec![stored_row_start as u64, cols.start as u64],
                vec![wrows as u64, wcols as u64],
            )
        } else {
            (
                vec![0, stored_row_start as u64, cols.start as u64],
                vec![nt as u64, wrows as u64, wcols as u64],
            )
        };
        let subset = ArraySubset::new_with_start_shape(start, window_shape)
            .map_err(|e| Is2Error::read_failed(e.to_string()))?;
        let data: Vec<f32> = self
            .array
            .retrieve_array_subset_elements(&subset)
            .map_err(|e| Is2Error::read_failed(format!("{}: {e}", self.name)))?;

        let mut out = Vec::with_capacity(data.len());
        if y_descending {
            for slice in data.chunks(wrows * wcols) {
                for row in (0..wrows).rev() {
                    out.extend(slice[row * wcols..(row + 1) * wcols].iter().map(|&v| f64::from(v)));
                }
            }
        } else {
            out.extend(data.iter().map(|&v| f64::from(v)));
        }
        Ok(out)
    }

    /// Array shape as stored.
    pub fn shape(&self) -> &[u64] {
        self.array.shape()
    }
}

/// One opened granule, scoped to a single group.
#[derive(Debug)]
pub struct OpenGranule {
    pub name: GranuleName,
    /// Ascending x coordinates (projected meters).
    pub x: Vec<f64>,
    /// Ascending y coordinates (projected meters).
    pub y: Vec<f64>,
    /// Whether the stored y axis ran descending.
    pub y_descending: bool,
    /// Time axis in days since the mission epoch. A single zero entry for
    /// the static height model.
    pub time: Vec<f64>,
    pub crs_wkt: Option<String>,
    pub variables: Vec<GranuleVariable>,
}

impl OpenGranule {
    pub fn variable(&self, name: &str) -> Option<&GranuleVariable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Grid spacing derived from the coordinate axes.
    pub fn spacing(&self) -> Is2Result<(f64, f64)> {
        let dx = axis_spacing(&self.x, "x")?;
        let dy = axis_spacing(&self.y, "y")?;
        Ok((dx, dy))
    }
}

fn axis_spacing(axis: &[f64], name: &str) -> Is2Result<f64> {
    if axis.len() < 2 {
        return Err(Is2Error::metadata(format!(
            "{name} axis has fewer than two entries"
        )));
    }
    Ok((axis[axis.len() - 1] - axis[0]) / (axis.len() - 1) as f64)
}

/// Open one granule's group and the requested variables.
///
/// Variables named as area weights in the group descriptor are optional;
/// anything else missing from the store is a metadata error.
pub fn open_granule(
    granule: &ResolvedGranule,
    schema: &SchemaDescriptor,
    group: &GroupDescriptor,
    variables: &[String],
    cloud: &CloudStoreConfig,
) -> Is2Result<OpenGranule> {
    let handle = match granule.storage {
        StorageBackend::Local => open_local_store(&granule.location)?,
        StorageBackend::Cloud => open_cloud_store(&granule.location, cloud)?,
    };
    let prefix = if group.name.is_empty() {
        handle.prefix.clone()
    } else {
        format!("{}/{}", handle.prefix, group.name)
    };

    let x = read_axis(&handle.storage, &format!("{prefix}/x"))?;
    let mut y = read_axis(&handle.storage, &format!("{prefix}/y"))?;
    let y_descending = y.len() >= 2 && y[1] < y[0];
    if y_descending {
        y.reverse();
    }

    let time = match schema.layout {
        Layout::Flat => vec![0.0],
        Layout::Grouped => read_axis(&handle.storage, &format!("{prefix}/time"))?,
    };

    let mut opened = Vec::new();
    let mut crs_wkt = None;
    for name in variables {
        let path = format!("{prefix}/{name}");
        let array = match Array::open(handle.storage.clone(), &path) {
            Ok(array) => array,
            Err(_) if group.area.contains(&name.as_str()) => {
                debug!(granule = %granule.name, variable = %name, "optional area variable absent");
                continue;
            }
            Err(e) => {
                return Err(Is2Error::metadata(format!(
                    "open {name} in {}: {e}",
                    granule.name
                )))
            }
        };
        check_shape(&array, name, &x, &y, &time, &granule.name)?;

        let attrs = array.attributes();
        if crs_wkt.is_none() {
            crs_wkt = attrs
                .get("crs_wkt")
                .and_then(|v| v.as_str())
                .map(String::from);
        }
        let meta = VariableMeta {
            units: attr_string(attrs, "units"),
            long_name: attr_string(attrs, "long_name"),
            is_uncertainty: schema.is_uncertainty(name),
        };
        let has_time_dim = array.shape().len() == 3;
        opened.push(GranuleVariable {
            name: name.clone(),
            meta,
            has_time_dim,
            array,
        });
    }

    Ok(OpenGranule {
        name: granule.name.clone(),
        x,
        y,
        y_descending,
        time,
        crs_wkt,
        variables: opened,
    })
}

fn attr_string(attrs: &serde_json::Map<String, serde_json::Value>, key: &str) -> String {
    attrs
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn check_shape(
    array: &Array<dyn ReadableStorageTraits>,
    name: &str,
    x: &[f64],
    y: &[f64],
    time: &[f64],
    granule: &GranuleName,
) -> Is2Result<()> {
    let shape = array.shape();
    let spatial_ok = match shape.len() {
        2 => shape[0] as usize == y.len() && shape[1] as usize == x.len(),
        3 => {
            shape[0] as usize == time.len()
                && shape[1] as usize == y.len()
                && shape[2] as usize == x.len()
        }
        _ => false,
    };
    if !spatial_ok {
        return Err(Is2Error::metadata(format!(
            "{name} shape {shape:?} does not match axes ({}, {}, {}) in {granule}",
            time.len(),
            y.len(),
            x.len(),
        )));
    }
    Ok(())
}

fn read_axis(storage: &GranuleStorage, path: &str) -> Is2Result<Vec<f64>> {
    let array = Array::open(storage.clone(), path)
        .map_err(|e| Is2Error::metadata(format!("open axis {path}: {e}")))?;
    let shape = array.shape().to_vec();
    if shape.len() != 1 {
        return Err(Is2Error::metadata(format!(
            "axis {path} is not one-dimensional"
        )));
    }
    let subset = ArraySubset::new_with_start_shape(vec![0], shape)
        .map_err(|e| Is2Error::read_failed(e.to_string()))?;
    array
        .retrieve_array_subset_elements(&subset)
        .map_err(|e| Is2Error::read_failed(format!("axis {path}: {e}")))
}
