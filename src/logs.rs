//! Log download with a TTL cache.
//!
//! Logs are fetched through the `rwx` CLI and cached per id. Which ids are
//! eligible for caching is a policy decision ([`CachePolicy`]): under the
//! default `CompletedRunsOnly` the store asks the cloud API whether the id
//! names a completed run, and any failure of that check (the id may be a
//! task id the runs endpoint does not know) silently skips caching rather
//! than failing the fetch.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::cloud::CloudClient;
use crate::config::{CachePolicy, LogCacheConfig};
use crate::rwx_cli::run_rwx_command;
use crate::Result;

/// Page size shared by the log windowing tools.
pub const MAX_LINES_PER_PAGE: usize = 50;

struct CacheEntry {
    content: String,
    stored_at: Instant,
}

/// Downloads logs by run/task id and caches eligible results.
pub struct LogStore {
    cloud: CloudClient,
    ttl: Duration,
    policy: CachePolicy,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl std::fmt::Debug for LogStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogStore")
            .field("ttl", &self.ttl)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl LogStore {
    /// Create a store with the given cache settings.
    #[must_use]
    pub fn new(cloud: CloudClient, config: &LogCacheConfig) -> Self {
        Self {
            cloud,
            ttl: Duration::from_secs(config.ttl_seconds),
            policy: config.policy,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the full log text for a run or task id.
    ///
    /// Serves from cache when a fresh entry exists; otherwise downloads via
    /// the CLI and caches per the configured policy.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Cli` when the download fails. Cache-eligibility
    /// check failures never propagate.
    pub async fn fetch(&self, id: &str) -> Result<String> {
        if let Some(content) = self.lookup(id).await {
            debug!(id, "log cache hit");
            return Ok(content);
        }

        let content = run_rwx_command(&["logs".into(), id.into()], None).await?;

        if self.should_cache(id).await {
            self.store(id, content.clone()).await;
        }

        Ok(content)
    }

    async fn lookup(&self, id: &str) -> Option<String> {
        let mut cache = self.cache.lock().await;
        match cache.get(id) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.content.clone()),
            Some(_) => {
                cache.remove(id);
                None
            }
            None => None,
        }
    }

    async fn store(&self, id: &str, content: String) {
        self.cache.lock().await.insert(
            id.to_owned(),
            CacheEntry {
                content,
                stored_at: Instant::now(),
            },
        );
    }

    /// Policy gate: is this id eligible for caching?
    ///
    /// `CompletedRunsOnly` asks the cloud API; a failed check (unknown id,
    /// missing token, transport error) is treated as "not cacheable", never
    /// as a fetch failure.
    async fn should_cache(&self, id: &str) -> bool {
        match self.policy {
            CachePolicy::Never => false,
            CachePolicy::Always => true,
            CachePolicy::CompletedRunsOnly => match self.cloud.fetch_run_status(id).await {
                Ok(summary) => summary.is_complete,
                Err(err) => {
                    debug!(id, %err, "completion check failed, skipping log cache");
                    false
                }
            },
        }
    }
}
