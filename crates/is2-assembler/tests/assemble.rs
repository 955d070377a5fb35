//! End-to-end assembly over filesystem granule stores.

use std::path::Path;

use is2_assembler::{
    assemble, AssembleOptions, GranuleStoreSpec, GroupData, VariableData,
};
use is2_common::{GranuleName, Region, StorageBackend};
use is2_catalog::{ResolvedGranule, ResolvedGranuleSet};

fn axis(start: f64, step: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| start + i as f64 * step).collect()
}

fn resolved(dir: &Path, region: Region, name: &str) -> ResolvedGranule {
    ResolvedGranule {
        region,
        name: GranuleName::parse(name).unwrap(),
        location: dir.join(name).to_str().unwrap().to_string(),
        storage: StorageBackend::Local,
    }
}

fn variable(name: &str, units: &str, values: Vec<f32>, with_time: bool) -> VariableData {
    VariableData {
        name: name.to_string(),
        units: units.to_string(),
        long_name: name.to_string(),
        values,
        with_time,
    }
}

/// A height-change granule with one lag group, deterministic values
/// `base + t*100 + row*10 + col`.
fn write_height_change(dir: &Path, name: &str, x: Vec<f64>, y: Vec<f64>, base: f32) {
    let (nx, ny, nt) = (x.len(), y.len(), 2);
    let mut delta_h = Vec::with_capacity(nt * ny * nx);
    for t in 0..nt {
        for row in 0..ny {
            for col in 0..nx {
                delta_h.push(base + (t * 100 + row * 10 + col) as f32);
            }
        }
    }
    let sigma: Vec<f32> = delta_h.iter().map(|v| v * 0.01).collect();
    let ice_area = vec![1.0_f32; nt * ny * nx];
    let cell_area = vec![1.0e8_f32; ny * nx];

    let spec = GranuleStoreSpec {
        x,
        y,
        crs_wkt: Some("PROJCS[\"polar stereographic\"]".to_string()),
        groups: vec![GroupData {
            name: Some("delta_h".to_string()),
            time: Some(vec![45.0, 137.0]),
            variables: vec![
                variable("delta_h", "meters", delta_h, true),
                variable("delta_h_sigma", "meters", sigma, true),
                variable("ice_area", "meters^2", ice_area, true),
                variable("cell_area", "meters^2", cell_area, false),
            ],
        }],
    };
    is2_assembler::write_granule(&dir.join(name), &spec).unwrap();
}

#[tokio::test]
async fn test_assemble_merges_adjacent_tiles_last_wins() {
    let dir = tempfile::tempdir().unwrap();
    // tiles overlap at x = 20km; the second one listed wins there
    write_height_change(
        dir.path(),
        "ATL15-003_A1-10km_0314.zarr",
        axis(0.0, 10_000.0, 3),
        axis(0.0, 10_000.0, 2),
        0.0,
    );
    write_height_change(
        dir.path(),
        "ATL15-003_A2-10km_0314.zarr",
        axis(20_000.0, 10_000.0, 3),
        axis(0.0, 10_000.0, 2),
        1000.0,
    );

    let set = ResolvedGranuleSet {
        region: Region::AA,
        granules: vec![
            resolved(dir.path(), Region::A1, "ATL15-003_A1-10km_0314.zarr"),
            resolved(dir.path(), Region::A2, "ATL15-003_A2-10km_0314.zarr"),
        ],
        complete: false,
        missing: vec![Region::A3, Region::A4],
    };

    let ds = assemble(&set, &AssembleOptions::default()).await.unwrap();
    assert_eq!(ds.region, Region::AA);
    assert_eq!(ds.group.as_deref(), Some("delta_h"));
    assert_eq!(ds.x, axis(0.0, 10_000.0, 5));
    assert_eq!(ds.y, axis(0.0, 10_000.0, 2));
    assert_eq!(ds.time, vec![45.0, 137.0]);
    assert!(!ds.complete);
    assert!(ds.crs_wkt.is_some());

    let cube = ds.resolve("delta_h").unwrap();
    assert_eq!((cube.nt, cube.ny, cube.nx), (2, 2, 5));
    // unshared cells keep their own granule's values
    assert_eq!(cube.get(0, 0, 0), 0.0);
    assert_eq!(cube.get(1, 1, 4), 1112.0);
    // the overlapped column takes the later granule's value
    assert_eq!(cube.get(0, 0, 2), 1000.0);

    // a static variable resolves to a single slice
    let area = ds.resolve("cell_area").unwrap();
    assert_eq!(area.nt, 1);
    assert_eq!(area.get(0, 0, 0), 1.0e8);
    assert_eq!(ds.area_variable(), Some("ice_area"));
}

#[tokio::test]
async fn test_resolve_window_reads_tile_subsets() {
    let dir = tempfile::tempdir().unwrap();
    write_height_change(
        dir.path(),
        "ATL15-003_A1-10km_0314.zarr",
        axis(0.0, 10_000.0, 3),
        axis(0.0, 10_000.0, 2),
        0.0,
    );
    write_height_change(
        dir.path(),
        "ATL15-003_A2-10km_0314.zarr",
        axis(20_000.0, 10_000.0, 3),
        axis(0.0, 10_000.0, 2),
        1000.0,
    );

    let set = ResolvedGranuleSet {
        region: Region::AA,
        granules: vec![
            resolved(dir.path(), Region::A1, "ATL15-003_A1-10km_0314.zarr"),
            resolved(dir.path(), Region::A2, "ATL15-003_A2-10km_0314.zarr"),
        ],
        complete: false,
        missing: vec![Region::A3, Region::A4],
    };
    let ds = assemble(&set, &AssembleOptions::default()).await.unwrap();

    // a window straddling the tile seam reads a subset of each store
    let window = ds.window(10_000.0, 30_000.0, 0.0, 10_000.0, 0).unwrap();
    let cube = ds.resolve_window("delta_h", &window).unwrap();
    assert_eq!((cube.nt, cube.ny, cube.nx), (2, 2, 3));

    let full = ds.resolve("delta_h").unwrap();
    for t in 0..2 {
        for row in 0..2 {
            for col in 0..3 {
                assert_eq!(cube.get(t, row, col), full.get(t, row, col + 1));
            }
        }
    }
    // the overlapped column still takes the later granule's value
    assert_eq!(cube.get(0, 0, 1), 1000.0);
}

#[tokio::test]
async fn test_assemble_rejects_mismatched_spacing() {
    let dir = tempfile::tempdir().unwrap();
    write_height_change(
        dir.path(),
        "ATL15-003_A1-10km_0314.zarr",
        axis(0.0, 10_000.0, 3),
        axis(0.0, 10_000.0, 2),
        0.0,
    );
    write_height_change(
        dir.path(),
        "ATL15-003_A2-10km_0314.zarr",
        axis(0.0, 20_000.0, 3),
        axis(0.0, 20_000.0, 2),
        0.0,
    );

    let set = ResolvedGranuleSet {
        region: Region::AA,
        granules: vec![
            resolved(dir.path(), Region::A1, "ATL15-003_A1-10km_0314.zarr"),
            resolved(dir.path(), Region::A2, "ATL15-003_A2-10km_0314.zarr"),
        ],
        complete: false,
        missing: vec![Region::A3, Region::A4],
    };

    let err = assemble(&set, &AssembleOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, is2_common::Is2Error::IncompatibleGrid { .. }));
}

#[tokio::test]
async fn test_assemble_empty_set_is_an_error() {
    let set = ResolvedGranuleSet {
        region: Region::GL,
        granules: vec![],
        complete: false,
        missing: vec![Region::GL],
    };
    assert!(assemble(&set, &AssembleOptions::default()).await.is_err());
}

#[tokio::test]
async fn test_assemble_flat_store_normalizes_descending_y() {
    let dir = tempfile::tempdir().unwrap();
    let name = "ATL14-003_GL_0314.zarr";
    // stored north-to-south: first row is the largest y
    let spec = GranuleStoreSpec {
        x: axis(0.0, 100.0, 3),
        y: vec![200.0, 100.0, 0.0],
        crs_wkt: None,
        groups: vec![GroupData {
            name: None,
            time: None,
            variables: vec![
                variable(
                    "h",
                    "meters",
                    vec![
                        20.0, 21.0, 22.0, // y = 200
                        10.0, 11.0, 12.0, // y = 100
                        0.0, 1.0, 2.0, // y = 0
                    ],
                    false,
                ),
                variable("h_sigma", "meters", vec![0.5; 9], false),
                variable("cell_area", "meters^2", vec![1.0e4; 9], false),
            ],
        }],
    };
    is2_assembler::write_granule(&dir.path().join(name), &spec).unwrap();

    let set = ResolvedGranuleSet {
        region: Region::GL,
        granules: vec![resolved(dir.path(), Region::GL, name)],
        complete: true,
        missing: vec![],
    };
    let ds = assemble(&set, &AssembleOptions::default()).await.unwrap();
    assert_eq!(ds.group, None);
    assert_eq!(ds.time, vec![0.0]);
    assert_eq!(ds.y, vec![0.0, 100.0, 200.0]);

    let cube = ds.resolve("h").unwrap();
    // row 0 is now the southernmost row
    assert_eq!(cube.get(0, 0, 0), 0.0);
    assert_eq!(cube.get(0, 2, 2), 22.0);
}

#[tokio::test]
async fn test_assemble_rejects_non_increasing_time() {
    let dir = tempfile::tempdir().unwrap();
    let name = "ATL15-003_GL-10km_0314.zarr";
    // corrupt store: the time axis runs backwards
    let spec = GranuleStoreSpec {
        x: axis(0.0, 10_000.0, 2),
        y: axis(0.0, 10_000.0, 2),
        crs_wkt: None,
        groups: vec![GroupData {
            name: Some("delta_h".to_string()),
            time: Some(vec![137.0, 45.0]),
            variables: vec![
                variable("delta_h", "meters", vec![0.0; 8], true),
                variable("delta_h_sigma", "meters", vec![0.1; 8], true),
            ],
        }],
    };
    is2_assembler::write_granule(&dir.path().join(name), &spec).unwrap();

    let set = ResolvedGranuleSet {
        region: Region::GL,
        granules: vec![resolved(dir.path(), Region::GL, name)],
        complete: true,
        missing: vec![],
    };
    let err = assemble(&set, &AssembleOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, is2_common::Is2Error::Metadata(_)));
}

#[tokio::test]
async fn test_assemble_rejects_unknown_group() {
    let set = ResolvedGranuleSet {
        region: Region::GL,
        granules: vec![ResolvedGranule {
            region: Region::GL,
            name: GranuleName::parse("ATL15-003_GL-10km_0314.zarr").unwrap(),
            location: "/nonexistent".to_string(),
            storage: StorageBackend::Local,
        }],
        complete: true,
        missing: vec![],
    };
    let options = AssembleOptions {
        group: Some("dhdt_lag2".to_string()),
        ..Default::default()
    };
    assert!(assemble(&set, &options).await.is_err());
}
