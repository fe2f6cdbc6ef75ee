pub mod store;

use crate::model::QueryParams;
use chrono::Utc;
use std::sync::Arc;
use store::{CacheEntry, CacheStore};
use tracing::{debug, warn};

/// Fingerprint of a generation request.
///
/// The prompt is length-prefixed so no prompt can run into the params text,
/// and the params are serialized with sorted keys.
pub fn fingerprint(prompt: &str, params: &QueryParams) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&(prompt.len() as u64).to_le_bytes());
    hasher.update(prompt.as_bytes());
    hasher.update(params.canonical_json().as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Fingerprint-keyed module cache.
///
/// Store failures are logged and never returned: a lookup failure reads as a
/// miss and a write failure as `false`.
#[derive(Clone)]
pub struct ModuleCache {
    store: Arc<dyn CacheStore>,
}

impl ModuleCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub async fn get(&self, prompt: &str, params: &QueryParams) -> Option<String> {
        let key = fingerprint(prompt, params);
        match self.store.load(&key).await {
            Ok(found) => found,
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Cache get failed, treating as miss");
                None
            }
        }
    }

    pub async fn set(&self, prompt: &str, params: &QueryParams, module_source: &str) -> bool {
        let key = fingerprint(prompt, params);
        let entry = CacheEntry {
            fingerprint: key.clone(),
            query_params: params.canonical_json(),
            module_source: module_source.to_string(),
            created_at: Utc::now(),
        };

        match self.store.upsert(entry).await {
            Ok(()) => {
                debug!(fingerprint = %key, "Cached module");
                true
            }
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "Cache set failed");
                false
            }
        }
    }

    pub async fn close(&self) {
        if let Err(e) = self.store.close().await {
            warn!(error = %e, "Closing cache store failed");
        }
    }
}
