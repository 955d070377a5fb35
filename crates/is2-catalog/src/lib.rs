//! Catalog query engine and granule resolver.
//!
//! The catalog client runs paginated metadata searches against a remote
//! granule catalog, filtering access links by the media type appropriate to
//! the requested storage backend. The resolver turns a validated selector
//! plus a set of known locations into concrete, openable granule paths,
//! expanding composite regions deterministically and reporting partial
//! coverage instead of failing.

pub mod client;
pub mod resolver;

pub use client::{CatalogClient, CatalogConfig, CatalogQuery, CatalogQueryResult, GranuleRecord};
pub use resolver::{resolve, GranuleLocation, ResolvedGranule, ResolvedGranuleSet};
