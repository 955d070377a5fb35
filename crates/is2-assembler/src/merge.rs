//! Grid compatibility and union-extent merging.
//!
//! Granules merge only when their grids share spacing and sit on a common
//! lattice; nothing is ever resampled. The union grid covers every
//! granule's extent, with cells no granule covers left as NaN.

use is2_common::{Is2Error, Is2Result};

use crate::granule::OpenGranule;

/// Relative tolerance for spacing and lattice alignment comparisons.
const GRID_TOLERANCE: f64 = 1e-6;

/// A merged coordinate axis with per-granule offsets.
#[derive(Debug, Clone)]
pub struct UnionAxis {
    pub values: Vec<f64>,
    pub step: f64,
    /// Index of each granule's first coordinate on the union axis, in
    /// input order.
    pub offsets: Vec<usize>,
}

/// Verify that all granules share spacing, lattice alignment and time
/// axes, then build the union axes.
pub fn union_grid(granules: &[OpenGranule]) -> Is2Result<(UnionAxis, UnionAxis)> {
    let first = granules
        .first()
        .ok_or_else(|| Is2Error::invalid_query("cannot merge an empty granule set"))?;
    let (dx, dy) = first.spacing()?;

    for other in &granules[1..] {
        let (odx, ody) = other.spacing()?;
        if !close(dx, odx) || !close(dy, ody) {
            return Err(Is2Error::incompatible_grid(
                format!("spacing ({dx}, {dy}) from {}", first.name),
                format!("spacing ({odx}, {ody}) from {}", other.name),
            ));
        }
        check_aligned(first.x[0], other.x[0], dx, &other.name.to_string(), "x")?;
        check_aligned(first.y[0], other.y[0], dy, &other.name.to_string(), "y")?;
        if !same_axis(&first.time, &other.time) {
            return Err(Is2Error::incompatible_grid(
                format!("time axis of {} ({} epochs)", first.name, first.time.len()),
                format!("time axis of {} ({} epochs)", other.name, other.time.len()),
            ));
        }
    }

    Ok((
        build_axis(granules.iter().map(|g| g.x.as_slice()), dx),
        build_axis(granules.iter().map(|g| g.y.as_slice()), dy),
    ))
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= GRID_TOLERANCE * a.abs().max(b.abs())
}

fn same_axis(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| close(*x, *y))
}

/// Require the offset between two axis origins to be a whole number of
/// steps.
fn check_aligned(origin: f64, other: f64, step: f64, granule: &str, axis: &str) -> Is2Result<()> {
    let steps = (other - origin) / step;
    if (steps - steps.round()).abs() > GRID_TOLERANCE {
        return Err(Is2Error::incompatible_grid(
            format!("{axis} lattice anchored at {origin}"),
            format!("{axis} origin {other} from {granule}"),
        ));
    }
    Ok(())
}

fn build_axis<'a>(axes: impl Iterator<Item = &'a [f64]> + Clone, step: f64) -> UnionAxis {
    let start = axes
        .clone()
        .map(|a| a[0])
        .fold(f64::INFINITY, f64::min);
    let end = axes
        .clone()
        .map(|a| a[a.len() - 1])
        .fold(f64::NEG_INFINITY, f64::max);
    let n = ((end - start) / step).round() as usize + 1;
    let values = (0..n).map(|i| start + i as f64 * step).collect();
    let offsets = axes
        .map(|a| ((a[0] - start) / step).round() as usize)
        .collect();
    UnionAxis {
        values,
        step,
        offsets,
    }
}
