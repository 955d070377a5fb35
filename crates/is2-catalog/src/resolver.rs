//! Selector-to-location resolution.
//!
//! Takes a validated selector and the set of known granule locations
//! (catalog records or a local directory listing) and produces the concrete
//! locations to open, in deterministic sub-tile order. Partial coverage of
//! a composite region is reported, never silently dropped and never an
//! error: downstream assembly decides whether an incomplete set is usable.

use tracing::debug;

use is2_common::{GranuleName, GranuleSelector, Is2Result, Region, StorageBackend};

use crate::client::GranuleRecord;

/// Object-storage bucket backing the cloud access links.
const CLOUD_BUCKET: &str = "nsidc-cumulus-prod-protected";

/// A candidate granule location, before selector matching.
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleLocation {
    /// Granule store name (used for selector matching).
    pub name: String,
    /// Path or URL of the store.
    pub url: String,
}

impl GranuleLocation {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Build a location from a catalog record.
    pub fn from_record(record: &GranuleRecord) -> Self {
        Self {
            name: record.granule_id.clone(),
            url: record.access_url.clone(),
        }
    }
}

/// One granule chosen for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedGranule {
    /// Sub-tile the granule covers.
    pub region: Region,
    /// Parsed granule name.
    pub name: GranuleName,
    /// Openable location: a filesystem path, https URL, or `s3://` URL.
    pub location: String,
    pub storage: StorageBackend,
}

/// The outcome of resolution, ordered by sub-tile enumeration order.
#[derive(Debug, Clone)]
pub struct ResolvedGranuleSet {
    /// Region as requested, before composite expansion.
    pub region: Region,
    pub granules: Vec<ResolvedGranule>,
    /// Whether every requested sub-tile was matched.
    pub complete: bool,
    /// Sub-tiles with no matching granule.
    pub missing: Vec<Region>,
}

impl ResolvedGranuleSet {
    pub fn is_empty(&self) -> bool {
        self.granules.is_empty()
    }
}

/// Resolve a selector against the available locations.
///
/// Composite regions expand to their sub-tiles in enumeration order; within
/// a sub-tile, candidates keep the order they were listed in. Locations
/// whose names do not parse under the naming convention are skipped. When a
/// cycle range is requested, a granule matches if its own cycle span
/// intersects the requested one. Cloud-backend https locations are
/// rewritten to their `s3://` equivalents.
pub fn resolve(
    selector: &GranuleSelector,
    available: &[GranuleLocation],
) -> Is2Result<ResolvedGranuleSet> {
    selector.validate()?;

    let mut set = ResolvedGranuleSet {
        region: selector.region,
        granules: Vec::new(),
        complete: true,
        missing: Vec::new(),
    };
    let mut seen_locations: Vec<String> = Vec::new();

    for sub in selector.expand() {
        let mut matched = false;
        for candidate in available {
            let name = match GranuleName::parse(&candidate.name) {
                Ok(name) => name,
                Err(_) => {
                    debug!(name = %candidate.name, "skipping unparseable granule name");
                    continue;
                }
            };
            if !matches_selector(&name, &sub) {
                continue;
            }
            let location = match selector.storage {
                StorageBackend::Cloud => to_s3_url(&candidate.url),
                StorageBackend::Local => candidate.url.clone(),
            };
            if seen_locations.contains(&location) {
                continue;
            }
            seen_locations.push(location.clone());
            set.granules.push(ResolvedGranule {
                region: sub.region,
                name,
                location,
                storage: selector.storage,
            });
            matched = true;
        }
        if !matched {
            set.complete = false;
            set.missing.push(sub.region);
        }
    }

    debug!(
        granules = set.granules.len(),
        complete = set.complete,
        "selector resolved"
    );
    Ok(set)
}

fn matches_selector(name: &GranuleName, selector: &GranuleSelector) -> bool {
    if name.product != selector.product
        || name.release != selector.release
        || name.region != selector.region
        || name.resolution != selector.resolution
    {
        return false;
    }
    match selector.cycle_range {
        Some((start, end)) => name.cycle_range.0 <= end && name.cycle_range.1 >= start,
        None => true,
    }
}

/// Rewrite an archive https URL to its object-storage equivalent.
///
/// The archive nests granules under `<ARCHIVE>/<PRODUCT>.<RELEASE>/<date>/`
/// paths whose dotted components become nested key prefixes in the bucket.
/// URLs that are already `s3://` pass through unchanged.
pub fn to_s3_url(url: &str) -> String {
    if url.starts_with("s3://") {
        return url.to_string();
    }
    let path = url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(url);
    let components: Vec<&str> = path.split('/').filter(|c| !c.is_empty()).collect();
    if components.len() < 4 {
        return url.to_string();
    }
    let tail = &components[components.len() - 4..];
    let mut key_parts: Vec<&str> = Vec::new();
    for component in &tail[..3] {
        key_parts.extend(component.split('.'));
    }
    key_parts.push(tail[3]);
    format!("s3://{}/{}", CLOUD_BUCKET, key_parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use is2_common::{Product, Release, Resolution};

    fn selector(region: Region) -> GranuleSelector {
        GranuleSelector::new(Product::Atl15, Release::new("003").unwrap(), region)
            .with_resolution(Resolution::R10km)
    }

    fn location(name: &str) -> GranuleLocation {
        GranuleLocation::new(name, format!("/data/granules/{name}"))
    }

    #[test]
    fn test_resolve_single_region() {
        let available = vec![
            location("ATL15-003_GL-10km_0314.zarr"),
            location("ATL15-003_GL-01km_0314.zarr"),
            location("ATL14-003_GL_0314.zarr"),
        ];
        let set = resolve(&selector(Region::GL), &available).unwrap();
        assert!(set.complete);
        assert_eq!(set.granules.len(), 1);
        assert_eq!(
            set.granules[0].location,
            "/data/granules/ATL15-003_GL-10km_0314.zarr"
        );
    }

    #[test]
    fn test_composite_resolution_order_and_missing() {
        // A3 is absent, so the set is incomplete but still usable
        let available = vec![
            location("ATL15-003_A4-10km_0314.zarr"),
            location("ATL15-003_A1-10km_0314.zarr"),
            location("ATL15-003_A2-10km_0314.zarr"),
        ];
        let set = resolve(&selector(Region::AA), &available).unwrap();
        assert!(!set.complete);
        assert_eq!(set.missing, vec![Region::A3]);
        let regions: Vec<Region> = set.granules.iter().map(|g| g.region).collect();
        assert_eq!(regions, vec![Region::A1, Region::A2, Region::A4]);
    }

    #[test]
    fn test_cycle_range_intersection_filter() {
        let available = vec![
            location("ATL15-003_GL-10km_0306.zarr"),
            location("ATL15-003_GL-10km_0714.zarr"),
            location("ATL15-003_GL-10km_1518.zarr"),
        ];
        let sel = selector(Region::GL).with_cycle_range(3, 10);
        let set = resolve(&sel, &available).unwrap();
        let names: Vec<String> = set.granules.iter().map(|g| g.name.to_string()).collect();
        assert_eq!(
            names,
            vec!["ATL15-003_GL-10km_0306.zarr", "ATL15-003_GL-10km_0714.zarr"]
        );
    }

    #[test]
    fn test_no_matches_is_empty_not_error() {
        let set = resolve(&selector(Region::SV), &[]).unwrap();
        assert!(set.is_empty());
        assert!(!set.complete);
        assert_eq!(set.missing, vec![Region::SV]);
    }

    #[test]
    fn test_unparseable_names_are_skipped() {
        let available = vec![
            GranuleLocation::new("README.txt", "/data/granules/README.txt"),
            location("ATL15-003_GL-10km_0314.zarr"),
        ];
        let set = resolve(&selector(Region::GL), &available).unwrap();
        assert_eq!(set.granules.len(), 1);
    }

    #[test]
    fn test_duplicate_locations_resolved_once() {
        let available = vec![
            location("ATL15-003_GL-10km_0314.zarr"),
            location("ATL15-003_GL-10km_0314.zarr"),
        ];
        let set = resolve(&selector(Region::GL), &available).unwrap();
        assert_eq!(set.granules.len(), 1);
    }

    #[test]
    fn test_cloud_locations_rewritten_to_s3() {
        let available = vec![GranuleLocation::new(
            "ATL15-003_GL-10km_0314.zarr",
            "https://n5eil01u.ecs.nsidc.org/ATLAS/ATL15.003/2019.03.29/ATL15-003_GL-10km_0314.zarr",
        )];
        let sel = selector(Region::GL).with_storage(StorageBackend::Cloud);
        let set = resolve(&sel, &available).unwrap();
        assert_eq!(
            set.granules[0].location,
            "s3://nsidc-cumulus-prod-protected/ATLAS/ATL15/003/2019/03/29/ATL15-003_GL-10km_0314.zarr"
        );
    }

    #[test]
    fn test_s3_urls_pass_through() {
        let url = "s3://nsidc-cumulus-prod-protected/ATLAS/ATL15/003/g.zarr";
        assert_eq!(to_s3_url(url), url);
    }
}
