//! Granule store writer.
//!
//! Writes a granule store in the layout the assembler reads back: per-group
//! coordinate axes and time axis as float64, data variables as float32 with
//! NaN fill. Used when converting granules from their archive format and by
//! the test suites to build fixture stores.

use std::path::Path;
use std::sync::Arc;

use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

use is2_common::{Is2Error, Is2Result};

/// One data variable to write.
#[derive(Debug, Clone)]
pub struct VariableData {
    pub name: String,
    pub units: String,
    pub long_name: String,
    /// Time-major values; length `nt * ny * nx`, or `ny * nx` when
    /// `with_time` is false.
    pub values: Vec<f32>,
    pub with_time: bool,
}

/// One group subtree (the flat layout is a single unnamed group).
#[derive(Debug, Clone)]
pub struct GroupData {
    /// Group name; `None` writes at the store root.
    pub name: Option<String>,
    /// Time axis in days since the mission epoch.
    pub time: Option<Vec<f64>>,
    pub variables: Vec<VariableData>,
}

/// A complete granule store to write.
#[derive(Debug, Clone)]
pub struct GranuleStoreSpec {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub crs_wkt: Option<String>,
    pub groups: Vec<GroupData>,
}

/// Write a granule store at `root`.
pub fn write_granule(root: &Path, spec: &GranuleStoreSpec) -> Is2Result<()> {
    std::fs::create_dir_all(root)?;
    let store = Arc::new(
        FilesystemStore::new(root)
            .map_err(|e| Is2Error::storage(format!("create store at {}: {e}", root.display())))?,
    );

    let (nx, ny) = (spec.x.len(), spec.y.len());
    for group in &spec.groups {
        let prefix = match &group.name {
            Some(name) => format!("/{name}"),
            None => String::new(),
        };

        write_axis(&store, &format!("{prefix}/x"), &spec.x)?;
        write_axis(&store, &format!("{prefix}/y"), &spec.y)?;
        let nt = match &group.time {
            Some(time) => {
                write_axis(&store, &format!("{prefix}/time"), time)?;
                time.len()
            }
            None => 1,
        };

        for variable in &group.variables {
            let shape: Vec<u64> = if variable.with_time {
                vec![nt as u64, ny as u64, nx as u64]
            } else {
                vec![ny as u64, nx as u64]
            };
            let expected: u64 = shape.iter().product();
            if variable.values.len() as u64 != expected {
                return Err(Is2Error::metadata(format!(
                    "variable {} has {} values, shape {shape:?} needs {expected}",
                    variable.name,
                    variable.values.len()
                )));
            }

            let mut attrs = serde_json::Map::new();
            attrs.insert("units".to_string(), serde_json::json!(variable.units));
            attrs.insert(
                "long_name".to_string(),
                serde_json::json!(variable.long_name),
            );
            if let Some(crs_wkt) = &spec.crs_wkt {
                attrs.insert("crs_wkt".to_string(), serde_json::json!(crs_wkt));
            }

            let chunk_grid: zarrs::array::ChunkGrid = shape
                .clone()
                .try_into()
                .map_err(|e| Is2Error::storage(format!("chunk grid: {e:?}")))?;
            let mut binding = ArrayBuilder::new(
                shape.clone(),
                DataType::Float32,
                chunk_grid,
                FillValue::from(f32::NAN),
            );
            let builder = binding.attributes(attrs);
            let array = builder
                .build(store.clone(), &format!("{prefix}/{}", variable.name))
                .map_err(|e| Is2Error::storage(e.to_string()))?;
            store_all(&array, &shape, &variable.values)?;
        }
    }
    Ok(())
}

fn write_axis(store: &Arc<FilesystemStore>, path: &str, values: &[f64]) -> Is2Result<()> {
    let shape = vec![values.len() as u64];
    let chunk_grid: zarrs::array::ChunkGrid = shape
        .clone()
        .try_into()
        .map_err(|e| Is2Error::storage(format!("chunk grid: {e:?}")))?;
    let binding = ArrayBuilder::new(
        shape.clone(),
        DataType::Float64,
        chunk_grid,
        FillValue::from(f64::NAN),
    );
    let array = binding
        .build(store.clone(), path)
        .map_err(|e| Is2Error::storage(e.to_string()))?;
    store_all(&array, &shape, values)
}

fn store_all<S, T>(array: &Array<S>, shape: &[u64], values: &[T]) -> Is2Result<()>
where
    S: zarrs::storage::ReadableStorageTraits
        + zarrs::storage::WritableStorageTraits
        + 'static,
    T: zarrs::array::Element + Copy,
{
    array
        .store_metadata()
        .map_err(|e| Is2Error::storage(e.to_string()))?;
    let subset = ArraySubset::new_with_start_shape(vec![0; shape.len()], shape.to_vec())
        .map_err(|e| Is2Error::storage(e.to_string()))?;
    array
        .store_array_subset_elements(&subset, values)
        .map_err(|e| Is2Error::storage(e.to_string()))
}
