//! Product, release, resolution and storage backend identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Is2Error, Is2Result};

/// Gridded land ice products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Product {
    /// Static land ice height model (flat variable layout, 100 m grid).
    Atl14,
    /// Land ice height change model (grouped lag layout, km-scale grids).
    Atl15,
}

impl Product {
    /// Parse a product short name.
    pub fn parse(s: &str) -> Is2Result<Self> {
        match s {
            "ATL14" => Ok(Self::Atl14),
            "ATL15" => Ok(Self::Atl15),
            other => Err(Is2Error::invalid_query(format!(
                "unknown product: {other}"
            ))),
        }
    }

    /// The catalog short name token.
    pub fn short_name(&self) -> &'static str {
        match self {
            Self::Atl14 => "ATL14",
            Self::Atl15 => "ATL15",
        }
    }

    /// Whether granule names and queries for this product carry a
    /// resolution token.
    pub fn has_resolution(&self) -> bool {
        matches!(self, Self::Atl15)
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

/// A three-digit zero-padded data release (e.g. "003").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Release(String);

impl Release {
    /// Validate and construct a release token.
    pub fn new(s: impl Into<String>) -> Is2Result<Self> {
        let s = s.into();
        if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Is2Error::invalid_query(format!(
                "release must be a 3-digit zero-padded string, got \"{s}\""
            )));
        }
        Ok(Self(s))
    }

    /// The release token as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The release as an integer.
    pub fn number(&self) -> u16 {
        // validated as ASCII digits at construction
        self.0.parse().unwrap_or(0)
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grid resolutions across both products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    /// 100 meters (height model only).
    R100m,
    /// 1 kilometer.
    R01km,
    /// 10 kilometers.
    R10km,
    /// 20 kilometers.
    R20km,
    /// 40 kilometers.
    R40km,
}

impl Resolution {
    /// Parse a resolution token.
    pub fn parse(s: &str) -> Is2Result<Self> {
        match s {
            "100m" => Ok(Self::R100m),
            "01km" => Ok(Self::R01km),
            "10km" => Ok(Self::R10km),
            "20km" => Ok(Self::R20km),
            "40km" => Ok(Self::R40km),
            other => Err(Is2Error::invalid_query(format!(
                "unknown resolution: {other}"
            ))),
        }
    }

    /// The filename/query token.
    pub fn token(&self) -> &'static str {
        match self {
            Self::R100m => "100m",
            Self::R01km => "01km",
            Self::R10km => "10km",
            Self::R20km => "20km",
            Self::R40km => "40km",
        }
    }

    /// Nominal grid spacing in meters.
    pub fn spacing_m(&self) -> f64 {
        match self {
            Self::R100m => 100.0,
            Self::R01km => 1_000.0,
            Self::R10km => 10_000.0,
            Self::R20km => 20_000.0,
            Self::R40km => 40_000.0,
        }
    }

    /// Resolutions valid for a given product.
    pub fn for_product(product: Product) -> &'static [Resolution] {
        match product {
            Product::Atl14 => &[Self::R100m],
            Product::Atl15 => &[Self::R01km, Self::R10km, Self::R20km, Self::R40km],
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Where granule data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageBackend {
    /// Local filesystem or on-prem https endpoint.
    #[default]
    Local,
    /// S3-compatible object storage.
    Cloud,
}

impl StorageBackend {
    /// Media type used to filter catalog response links.
    ///
    /// The catalog tags each access link with a media type; local-http and
    /// object-storage endpoints advertise different types, and querying with
    /// the wrong one silently yields zero matches. That is a valid empty
    /// result, not an error.
    pub fn media_type(&self) -> &'static str {
        match self {
            Self::Local => "application/x-zarr",
            Self::Cloud => "application/x-zarr+s3",
        }
    }
}
