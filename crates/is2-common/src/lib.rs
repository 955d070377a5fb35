//! Common types shared across the ICESat-2 gridded land ice crates.

pub mod error;
pub mod granule;
pub mod product;
pub mod region;
pub mod selector;
pub mod time;

pub use error::{Is2Error, Is2Result};
pub use granule::GranuleName;
pub use product::{Product, Release, Resolution, StorageBackend};
pub use region::Region;
pub use selector::GranuleSelector;
pub use time::{days_to_decimal_years, decimal_years_to_days, MISSION_EPOCH};
