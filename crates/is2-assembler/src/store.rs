//! Storage backends for granule stores.
//!
//! Local granules open through a filesystem store rooted at the store
//! directory. Cloud granules open through an object_store S3 client wrapped
//! in an async-to-sync adapter, so the same synchronous array API serves
//! both backends.

use std::sync::Arc;

use object_store::aws::AmazonS3Builder;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;
use zarrs_object_store::AsyncObjectStore;
use zarrs_storage::storage_adapter::async_to_sync::{
    AsyncToSyncBlockOn, AsyncToSyncStorageAdapter,
};

use is2_common::{Is2Error, Is2Result};

/// Blocking executor usable from within a tokio runtime.
///
/// `block_in_place` moves the current task off the async worker thread so
/// the runtime handle can drive the future without nesting runtimes.
#[derive(Clone, Copy)]
pub struct TokioBlockOn;

impl AsyncToSyncBlockOn for TokioBlockOn {
    fn block_on<F: core::future::Future>(&self, future: F) -> F::Output {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
    }
}

/// Configuration for the object-storage backend.
#[derive(Debug, Clone)]
pub struct CloudStoreConfig {
    /// AWS region hosting the archive buckets.
    pub region: String,
    /// Optional custom endpoint (S3-compatible stores, test servers).
    pub endpoint: Option<String>,
    /// Allow plain-http endpoints.
    pub allow_http: bool,
    /// Send unsigned requests (public buckets).
    pub skip_signature: bool,
}

impl Default for CloudStoreConfig {
    fn default() -> Self {
        Self {
            region: "us-west-2".to_string(),
            endpoint: None,
            allow_http: false,
            skip_signature: true,
        }
    }
}

impl CloudStoreConfig {
    /// Create config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-west-2".to_string()),
            endpoint: std::env::var("S3_ENDPOINT").ok(),
            allow_http: std::env::var("S3_ALLOW_HTTP")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            skip_signature: std::env::var("S3_SKIP_SIGNATURE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(true),
        }
    }
}

/// Type-erased readable storage shared by both backends.
pub type GranuleStorage = Arc<dyn ReadableStorageTraits>;

/// An opened storage root plus the array path prefix inside it.
pub struct StoreHandle {
    pub storage: GranuleStorage,
    /// Prefix prepended to array paths ("" for local stores).
    pub prefix: String,
}

/// Open the store backing a local granule directory.
pub fn open_local_store(location: &str) -> Is2Result<StoreHandle> {
    let store = FilesystemStore::new(location)
        .map_err(|e| Is2Error::storage(format!("open {location}: {e}")))?;
    Ok(StoreHandle {
        storage: Arc::new(store),
        prefix: String::new(),
    })
}

/// Open the store backing an `s3://bucket/key` granule location.
///
/// The store is rooted at the bucket; the returned prefix addresses the
/// granule key inside it.
pub fn open_cloud_store(location: &str, config: &CloudStoreConfig) -> Is2Result<StoreHandle> {
    let (bucket, key) = split_s3_url(location)?;

    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&config.region)
        .with_allow_http(config.allow_http)
        .with_skip_signature(config.skip_signature);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    let s3 = builder
        .build()
        .map_err(|e| Is2Error::storage(format!("s3 client for {location}: {e}")))?;

    let async_store = Arc::new(AsyncObjectStore::new(s3));
    let sync_store = AsyncToSyncStorageAdapter::new(async_store, TokioBlockOn);

    Ok(StoreHandle {
        storage: Arc::new(sync_store),
        prefix: format!("/{key}"),
    })
}

/// Split an `s3://bucket/key` URL into bucket and key.
fn split_s3_url(url: &str) -> Is2Result<(&str, &str)> {
    let rest = url
        .strip_prefix("s3://")
        .ok_or_else(|| Is2Error::storage(format!("not an s3 url: {url}")))?;
    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| Is2Error::storage(format!("s3 url missing key: {url}")))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(Is2Error::storage(format!("malformed s3 url: {url}")));
    }
    Ok((bucket, key.trim_end_matches('/')))
}
