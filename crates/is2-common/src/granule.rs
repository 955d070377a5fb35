//! The granule naming convention.
//!
//! Granule stores are named
//! `<PRODUCT>-<release>_<REGION>[-<resolution>]_<ccCC>[.zarr]` where `cc`
//! and `CC` are the two-digit start and end repeat cycles. The resolution
//! segment is present only for the height-change product. The convention is
//! consumed in both directions: to build catalog filter patterns and to
//! parse catalog results back into selector fields.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Is2Error, Is2Result};
use crate::product::{Product, Release, Resolution};
use crate::region::Region;

/// Suffix on granule store names.
pub const STORE_SUFFIX: &str = ".zarr";

/// A parsed granule name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GranuleName {
    pub product: Product,
    pub release: Release,
    pub region: Region,
    pub resolution: Option<Resolution>,
    pub cycle_range: (u16, u16),
}

impl GranuleName {
    /// Parse a granule name or path basename.
    pub fn parse(name: &str) -> Is2Result<Self> {
        let base = name
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(name)
            .trim_end_matches(STORE_SUFFIX);

        let mut segments = base.split('_');
        let head = segments
            .next()
            .ok_or_else(|| Is2Error::metadata(format!("empty granule name: {name}")))?;
        let (product_token, release_token) = head
            .split_once('-')
            .ok_or_else(|| Is2Error::metadata(format!("missing release in granule name: {name}")))?;
        let product = Product::parse(product_token)?;
        let release = Release::new(release_token)?;

        let tile = segments
            .next()
            .ok_or_else(|| Is2Error::metadata(format!("missing region in granule name: {name}")))?;
        let (region, resolution) = match tile.split_once('-') {
            Some((region_token, resolution_token)) => (
                Region::parse(region_token)?,
                Some(Resolution::parse(resolution_token)?),
            ),
            None => (Region::parse(tile)?, None),
        };
        if product.has_resolution() != resolution.is_some() {
            return Err(Is2Error::metadata(format!(
                "resolution segment mismatch for {product} granule: {name}"
            )));
        }

        let cycles = segments
            .next()
            .ok_or_else(|| Is2Error::metadata(format!("missing cycle range in granule name: {name}")))?;
        if cycles.len() != 4 || !cycles.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Is2Error::metadata(format!(
                "cycle range must be four digits, got \"{cycles}\" in {name}"
            )));
        }
        let start: u16 = cycles[..2].parse().map_err(|_| {
            Is2Error::metadata(format!("unparseable cycle start in {name}"))
        })?;
        let end: u16 = cycles[2..].parse().map_err(|_| {
            Is2Error::metadata(format!("unparseable cycle end in {name}"))
        })?;
        if start > end {
            return Err(Is2Error::metadata(format!(
                "cycle range start {start} exceeds end {end} in {name}"
            )));
        }

        if segments.next().is_some() {
            return Err(Is2Error::metadata(format!(
                "trailing segments in granule name: {name}"
            )));
        }

        Ok(Self {
            product,
            release,
            region,
            resolution,
            cycle_range: (start, end),
        })
    }

    /// Build the catalog filter pattern for a (product, release, region,
    /// resolution) combination, wildcarding the cycle range.
    pub fn wildcard_pattern(
        product: Product,
        release: &Release,
        region: Region,
        resolution: Option<Resolution>,
    ) -> String {
        match resolution {
            Some(res) => format!("{product}-{release}_{region}-{res}_????*"),
            None => format!("{product}-{release}_{region}_????*"),
        }
    }
}

impl fmt::Display for GranuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}_{}", self.product, self.release, self.region)?;
        if let Some(res) = self.resolution {
            write!(f, "-{res}")?;
        }
        write!(
            f,
            "_{:02}{:02}{}",
            self.cycle_range.0, self.cycle_range.1, STORE_SUFFIX
        )
    }
}
