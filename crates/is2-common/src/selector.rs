//! Granule selection parameters.

use serde::{Deserialize, Serialize};

use crate::error::{Is2Error, Is2Result};
use crate::product::{Product, Release, Resolution, StorageBackend};
use crate::region::Region;

/// A validated request for granules of one product/release/region.
///
/// Build with [`GranuleSelector::new`] and the `with_*` methods, then call
/// [`GranuleSelector::validate`] before handing it to the catalog or
/// resolver. Resolution is required for the height-change product and
/// meaningless for the height model; a cycle range, when present, must be
/// ordered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GranuleSelector {
    pub product: Product,
    pub release: Release,
    pub region: Region,
    pub resolution: Option<Resolution>,
    pub cycle_range: Option<(u16, u16)>,
    pub storage: StorageBackend,
}

impl GranuleSelector {
    /// Create a selector with no resolution or cycle constraints.
    pub fn new(product: Product, release: Release, region: Region) -> Self {
        Self {
            product,
            release,
            region,
            resolution: None,
            cycle_range: None,
            storage: StorageBackend::default(),
        }
    }

    /// Constrain to a grid resolution.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = Some(resolution);
        self
    }

    /// Constrain to a repeat-cycle range.
    pub fn with_cycle_range(mut self, start: u16, end: u16) -> Self {
        self.cycle_range = Some((start, end));
        self
    }

    /// Select the storage backend to resolve against.
    pub fn with_storage(mut self, storage: StorageBackend) -> Self {
        self.storage = storage;
        self
    }

    /// Check selector invariants.
    pub fn validate(&self) -> Is2Result<()> {
        match (self.product.has_resolution(), self.resolution) {
            (true, None) => {
                return Err(Is2Error::invalid_query(format!(
                    "{} selectors require a resolution",
                    self.product
                )));
            }
            (false, Some(res)) => {
                return Err(Is2Error::invalid_query(format!(
                    "{} selectors do not take a resolution (got {res})",
                    self.product
                )));
            }
            (true, Some(res)) if !Resolution::for_product(self.product).contains(&res) => {
                return Err(Is2Error::invalid_query(format!(
                    "resolution {res} is not valid for {}",
                    self.product
                )));
            }
            _ => {}
        }
        if let Some((start, end)) = self.cycle_range {
            if start > end {
                return Err(Is2Error::invalid_query(format!(
                    "cycle range start {start} exceeds end {end}"
                )));
            }
        }
        Ok(())
    }

    /// The sub-tile selectors this selector expands to, in enumeration
    /// order. Single-tile regions yield one selector, composites one per
    /// constituent sub-tile.
    pub fn expand(&self) -> Vec<GranuleSelector> {
        self.region
            .subtiles()
            .into_iter()
            .map(|region| GranuleSelector {
                region,
                ..self.clone()
            })
            .collect()
    }
}
