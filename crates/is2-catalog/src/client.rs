//! Paginated granule metadata catalog client.
//!
//! The catalog exposes a CMR-style JSON search endpoint. Queries are keyed
//! by product short name and release, constrained to the requested regions
//! and resolutions through readable-granule-name wildcard patterns, and
//! paginated with an opaque scroll token carried in a response header.
//! Access links in each entry are filtered down to the media type the
//! requested storage backend understands; an entry with no matching link is
//! skipped, not an error.

use std::collections::HashSet;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use is2_common::{
    GranuleName, GranuleSelector, Is2Error, Is2Result, Product, Region, Release, Resolution,
    StorageBackend,
};

/// Response header carrying the pagination scroll token.
const SCROLL_ID_HEADER: &str = "cmr-scroll-id";

/// Configuration for the catalog client.
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Granule search endpoint (JSON feed).
    pub endpoint: String,
    /// Archive provider identifier.
    pub provider: String,
    /// Entries per page.
    pub page_size: usize,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cmr.earthdata.nasa.gov/search/granules.json".to_string(),
            provider: "NSIDC_CPRD".to_string(),
            page_size: 2000,
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// A fully specified catalog search.
///
/// Built from one or more validated selectors sharing a product and
/// release; composite regions are expanded to their sub-tiles before the
/// name patterns are generated.
#[derive(Debug, Clone)]
pub struct CatalogQuery {
    pub product: Product,
    pub release: Release,
    pub regions: Vec<Region>,
    pub resolutions: Vec<Resolution>,
    pub storage: StorageBackend,
}

impl CatalogQuery {
    /// Build a query from a validated selector.
    pub fn from_selector(selector: &GranuleSelector) -> Is2Result<Self> {
        selector.validate()?;
        Ok(Self {
            product: selector.product,
            release: selector.release.clone(),
            regions: selector.region.subtiles(),
            resolutions: selector.resolution.into_iter().collect(),
            storage: selector.storage,
        })
    }

    /// The readable-granule-name wildcard patterns for this query, one per
    /// (region, resolution) combination, in region enumeration order.
    pub fn name_patterns(&self) -> Vec<String> {
        let mut patterns = Vec::new();
        for &region in &self.regions {
            if self.resolutions.is_empty() {
                patterns.push(GranuleName::wildcard_pattern(
                    self.product,
                    &self.release,
                    region,
                    None,
                ));
            } else {
                for &resolution in &self.resolutions {
                    patterns.push(GranuleName::wildcard_pattern(
                        self.product,
                        &self.release,
                        region,
                        Some(resolution),
                    ));
                }
            }
        }
        patterns
    }

    /// Release tokens to match against the catalog, widest padding first.
    ///
    /// Archive metadata is inconsistent about zero padding, so a release of
    /// "003" must also match entries versioned "03" and "3".
    pub fn release_tokens(&self) -> Vec<String> {
        let bare = self.release.as_str().trim_start_matches('0');
        let bare = if bare.is_empty() { "0" } else { bare };
        let mut tokens = Vec::new();
        for width in (bare.len()..=3).rev() {
            tokens.push(format!("{bare:0>width$}"));
        }
        tokens
    }
}

/// One granule entry surviving the media-type filter.
#[derive(Debug, Clone, PartialEq)]
pub struct GranuleRecord {
    /// Producer granule identifier (the store name).
    pub granule_id: String,
    /// Access URL whose media type matched the requested backend.
    pub access_url: String,
    /// Granule size in bytes, when the catalog reports one.
    pub size: Option<u64>,
    /// Checksum, when the catalog reports one.
    pub checksum: Option<String>,
}

/// The outcome of a catalog query. Zero records is a valid result.
#[derive(Debug, Clone, Default)]
pub struct CatalogQueryResult {
    pub records: Vec<GranuleRecord>,
    /// Total pages fetched, for observability.
    pub pages_fetched: usize,
}

impl CatalogQueryResult {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[derive(Debug, Deserialize)]
struct SearchPage {
    feed: SearchFeed,
}

#[derive(Debug, Default, Deserialize)]
struct SearchFeed {
    #[serde(default)]
    entry: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    producer_granule_id: String,
    #[serde(default)]
    links: Vec<SearchLink>,
    /// Reported in megabytes as a decimal string.
    #[serde(default)]
    granule_size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchLink {
    href: String,
    #[serde(rename = "type", default)]
    media_type: Option<String>,
}

/// Runs paginated searches against the granule catalog.
pub struct CatalogClient {
    client: Client,
    config: CatalogConfig,
}

impl CatalogClient {
    /// Create a client with the given configuration.
    pub fn new(config: CatalogConfig) -> Is2Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| Is2Error::catalog_unavailable(format!("http client setup: {e}")))?;
        Ok(Self { client, config })
    }

    /// Run a query, following scroll pagination to exhaustion.
    ///
    /// Records are deduplicated by granule id, first occurrence wins, and
    /// returned in catalog sort order (start date, then granule id).
    pub async fn query(&self, query: &CatalogQuery) -> Is2Result<CatalogQueryResult> {
        let params = self.build_params(query);
        let mut scroll_id: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut result = CatalogQueryResult::default();

        loop {
            let mut request = self.client.get(&self.config.endpoint).query(&params);
            if let Some(id) = &scroll_id {
                request = request.header(SCROLL_ID_HEADER, id);
            }
            let response = request
                .send()
                .await
                .map_err(|e| Is2Error::catalog_unavailable(format!("catalog request: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                return Err(Is2Error::catalog_unavailable(format!(
                    "catalog returned {status}"
                )));
            }
            if scroll_id.is_none() {
                scroll_id = response
                    .headers()
                    .get(SCROLL_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
            }

            let page: SearchPage = response
                .json()
                .await
                .map_err(|e| Is2Error::catalog_unavailable(format!("catalog response: {e}")))?;
            result.pages_fetched += 1;

            let entries = page.feed.entry;
            if entries.is_empty() {
                break;
            }
            let page_len = entries.len();
            for record in filter_entries(entries, query.storage) {
                if seen.insert(record.granule_id.clone()) {
                    result.records.push(record);
                }
            }
            debug!(
                page = result.pages_fetched,
                entries = page_len,
                kept = result.records.len(),
                "catalog page fetched"
            );

            // a short page is the last one; without a scroll id there is
            // nothing to continue with either
            if page_len < self.config.page_size || scroll_id.is_none() {
                break;
            }
        }

        if result.is_empty() {
            debug!(product = %query.product, "catalog query matched no granules");
        }
        Ok(result)
    }

    fn build_params(&self, query: &CatalogQuery) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = vec![
            ("provider".into(), self.config.provider.clone()),
            ("short_name".into(), query.product.short_name().into()),
            ("page_size".into(), self.config.page_size.to_string()),
            ("scroll".into(), "true".into()),
            ("sort_key[]".into(), "start_date".into()),
            ("sort_key[]".into(), "producer_granule_id".into()),
            (
                "options[readable_granule_name][pattern]".into(),
                "true".into(),
            ),
        ];
        for token in query.release_tokens() {
            params.push(("version".into(), token));
        }
        for pattern in query.name_patterns() {
            params.push(("readable_granule_name[]".into(), pattern));
        }
        params
    }
}

/// Keep entries with an access link of the backend's media type.
fn filter_entries(entries: Vec<SearchEntry>, storage: StorageBackend) -> Vec<GranuleRecord> {
    let media_type = storage.media_type();
    let mut records = Vec::new();
    for entry in entries {
        let link = entry
            .links
            .iter()
            .find(|l| l.media_type.as_deref() == Some(media_type));
        match link {
            Some(link) => records.push(GranuleRecord {
                granule_id: entry.producer_granule_id,
                access_url: link.href.clone(),
                size: entry.granule_size.as_deref().and_then(parse_size_mb),
                checksum: None,
            }),
            None => {
                warn!(
                    granule = %entry.producer_granule_id,
                    media_type,
                    "no access link for requested backend, skipping"
                );
            }
        }
    }
    records
}

/// Parse the catalog's decimal-megabyte size string into bytes.
fn parse_size_mb(size: &str) -> Option<u64> {
    let mb: f64 = size.trim().parse().ok()?;
    if !mb.is_finite() || mb < 0.0 {
        return None;
    }
    Some((mb * 1024.0 * 1024.0).round() as u64)
}
