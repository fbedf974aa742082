use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::ContextError;
use crate::error::Result;

const MAX_DISPATCH_PERMITS: usize = 32;

/// Engine configuration. Only the project root is required; every other
/// field has a serde default so a partial JSON document deserializes into
/// a working config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextManagerConfig {
    pub root: PathBuf,

    /// Result cap applied after merge.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Budget for one retriever on one request, in milliseconds.
    #[serde(default = "default_retriever_timeout_ms")]
    pub retriever_timeout_ms: u64,

    /// Budget for a whole `resolve` call; on expiry partial results are
    /// returned rather than discarded.
    #[serde(default = "default_overall_deadline_ms")]
    pub overall_deadline_ms: u64,

    #[serde(default = "default_cache_max_bytes")]
    pub cache_max_bytes: usize,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    /// Git-kind answers churn faster and get a shorter TTL.
    #[serde(default = "default_git_cache_ttl_secs")]
    pub git_cache_ttl_secs: u64,

    /// Files scanned per index rebuild; the rest roll into the next one.
    #[serde(default = "default_file_cap")]
    pub file_cap: usize,

    #[serde(default = "default_index_refresh_secs")]
    pub index_refresh_secs: u64,

    #[serde(default = "default_concurrency_multiplier")]
    pub concurrency_multiplier: usize,

    #[serde(default = "default_git_log_limit")]
    pub git_log_limit: usize,
}

fn default_max_results() -> usize {
    20
}

fn default_retriever_timeout_ms() -> u64 {
    2_000
}

fn default_overall_deadline_ms() -> u64 {
    5_000
}

fn default_cache_max_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_cache_ttl_secs() -> u64 {
    600
}

fn default_git_cache_ttl_secs() -> u64 {
    60
}

fn default_file_cap() -> usize {
    500
}

fn default_index_refresh_secs() -> u64 {
    300
}

fn default_concurrency_multiplier() -> usize {
    2
}

fn default_git_log_limit() -> usize {
    10
}

impl ContextManagerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_results: default_max_results(),
            retriever_timeout_ms: default_retriever_timeout_ms(),
            overall_deadline_ms: default_overall_deadline_ms(),
            cache_max_bytes: default_cache_max_bytes(),
            cache_ttl_secs: default_cache_ttl_secs(),
            git_cache_ttl_secs: default_git_cache_ttl_secs(),
            file_cap: default_file_cap(),
            index_refresh_secs: default_index_refresh_secs(),
            concurrency_multiplier: default_concurrency_multiplier(),
            git_log_limit: default_git_log_limit(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(ContextError::Config("max_results must be > 0".into()));
        }
        if self.retriever_timeout_ms == 0 || self.overall_deadline_ms == 0 {
            return Err(ContextError::Config(
                "retriever_timeout_ms and overall_deadline_ms must be > 0".into(),
            ));
        }
        if self.retriever_timeout_ms > self.overall_deadline_ms {
            return Err(ContextError::Config(
                "retriever_timeout_ms cannot exceed overall_deadline_ms".into(),
            ));
        }
        if self.cache_max_bytes == 0 {
            return Err(ContextError::Config("cache_max_bytes must be > 0".into()));
        }
        if self.file_cap == 0 {
            return Err(ContextError::Config("file_cap must be > 0".into()));
        }
        if self.concurrency_multiplier == 0 {
            return Err(ContextError::Config(
                "concurrency_multiplier must be > 0".into(),
            ));
        }
        Ok(())
    }

    pub fn retriever_timeout(&self) -> Duration {
        Duration::from_millis(self.retriever_timeout_ms)
    }

    pub fn overall_deadline(&self) -> Duration {
        Duration::from_millis(self.overall_deadline_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn git_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.git_cache_ttl_secs)
    }

    pub fn index_refresh(&self) -> Duration {
        Duration::from_secs(self.index_refresh_secs)
    }

    /// Process-wide dispatch permits: a small multiple of the core count,
    /// capped against oversubscription.
    pub fn dispatch_permits(&self) -> usize {
        (num_cpus::get() * self.concurrency_multiplier).clamp(1, MAX_DISPATCH_PERMITS)
    }
}

/// Per-call knobs for `resolve`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Overrides the configured result cap when set.
    #[serde(default)]
    pub max_results: Option<usize>,

    /// Skip the request cache for this call; results are still stored.
    #[serde(default)]
    pub bypass_cache: bool,
}
