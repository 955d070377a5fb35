//! Extraction geometries in projected grid coordinates.

use serde::{Deserialize, Serialize};

use is2_common::{Is2Error, Is2Result};

/// Axis-aligned bounding box in projected meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Is2Result<Self> {
        if min_x > max_x || min_y > max_y {
            return Err(Is2Error::invalid_query(format!(
                "degenerate bounding box ({min_x}, {min_y}, {max_x}, {max_y})"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }
}

/// The shapes the extraction engine accepts.
///
/// Coordinates are in the dataset's projected CRS; no reprojection happens
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// A single sample location.
    Point { x: f64, y: f64 },
    /// An ordered path of at least two vertices.
    Polyline(Vec<(f64, f64)>),
    /// A ring of at least three distinct vertices; closure is implicit.
    Polygon(Vec<(f64, f64)>),
    /// Axis-aligned region.
    BoundingBox(BoundingBox),
}

impl Geometry {
    /// Validate vertex counts and degeneracy.
    pub fn validate(&self) -> Is2Result<()> {
        match self {
            Geometry::Point { .. } | Geometry::BoundingBox(_) => Ok(()),
            Geometry::Polyline(vertices) => {
                if vertices.len() < 2 {
                    return Err(Is2Error::invalid_query(
                        "polyline needs at least two vertices",
                    ));
                }
                Ok(())
            }
            Geometry::Polygon(vertices) => {
                let ring = open_ring(vertices);
                if ring.len() < 3 {
                    return Err(Is2Error::invalid_query(
                        "polygon needs at least three distinct vertices",
                    ));
                }
                Ok(())
            }
        }
    }

    /// The geometry's bounding box.
    pub fn bbox(&self) -> BoundingBox {
        match self {
            Geometry::Point { x, y } => BoundingBox {
                min_x: *x,
                min_y: *y,
                max_x: *x,
                max_y: *y,
            },
            Geometry::Polyline(vertices) | Geometry::Polygon(vertices) => {
                let mut bbox = BoundingBox {
                    min_x: f64::INFINITY,
                    min_y: f64::INFINITY,
                    max_x: f64::NEG_INFINITY,
                    max_y: f64::NEG_INFINITY,
                };
                for &(x, y) in vertices {
                    bbox.min_x = bbox.min_x.min(x);
                    bbox.min_y = bbox.min_y.min(y);
                    bbox.max_x = bbox.max_x.max(x);
                    bbox.max_y = bbox.max_y.max(y);
                }
                bbox
            }
            Geometry::BoundingBox(bbox) => *bbox,
        }
    }

    /// Whether a point falls inside this geometry (polygons and boxes).
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Geometry::Polygon(vertices) => {
                polygon_contains(&open_ring(vertices), x, y)
            }
            Geometry::BoundingBox(bbox) => bbox.contains(x, y),
            _ => false,
        }
    }
}

/// Drop an explicit closing vertex so the ring is open.
fn open_ring(vertices: &[(f64, f64)]) -> Vec<(f64, f64)> {
    let mut ring = vertices.to_vec();
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

/// Ray-casting point-in-polygon test.
///
/// Casts a ray in +x and counts edge crossings; an odd count is inside.
/// Points exactly on an edge may land on either side.
fn polygon_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if ((yi > y) != (yj > y)) && (x < (xj - xi) * (y - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Total length of a polyline.
pub fn polyline_length(vertices: &[(f64, f64)]) -> f64 {
    vertices
        .windows(2)
        .map(|pair| {
            let (x0, y0) = pair[0];
            let (x1, y1) = pair[1];
            ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt()
        })
        .sum()
}

/// The point a given distance along a polyline, clamped to its ends.
pub fn point_along(vertices: &[(f64, f64)], distance: f64) -> (f64, f64) {
    let mut remaining = distance.max(0.0);
    for pair in vertices.windows(2) {
        let (x0, y0) = pair[0];
        let (x1, y1) = pair[1];
        let segment = ((x1 - x0).powi(2) + (y1 - y0).powi(2)).sqrt();
        if remaining <= segment && segment > 0.0 {
            let f = remaining / segment;
            return (x0 + f * (x1 - x0), y0 + f * (y1 - y0));
        }
        remaining -= segment;
    }
    *vertices.last().unwrap_or(&(f64::NAN, f64::NAN))
}
