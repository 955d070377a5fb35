//! Time-series extraction from assembled datasets.
//!
//! Three extraction shapes share one engine: a point samples its nearest
//! grid cell, a polyline is walked at the grid's native step and averaged
//! per epoch, and a polygon or bounding box aggregates covered cells with
//! area weighting. Uncertainty variables aggregate in quadrature; all
//! aggregations skip NaN cells; geometry that touches no valid cells
//! yields an empty series, never an error.

pub mod engine;
pub mod geometry;
pub mod series;

pub use engine::{extract, transect_profile, ExtractOptions, Interpolation};
pub use geometry::{BoundingBox, Geometry};
pub use series::{ExtractedSeries, SeriesMetadata, SeriesRecord, TransectProfile};
