//! Shared parallel processing configuration types.

use serde::{Deserialize, Serialize};

use super::{ConfigError, ConfigValidator};

/// Configuration for tile-level parallelism in the detector.
///
/// Binarization and per-tile component statistics are computed independently for
/// every tile; this policy decides whether those loops run on rayon workers.
/// Output never depends on the policy, only throughput does.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Maximum number of threads to use for parallel processing.
    /// If None, rayon's current pool is used (typically one thread per core).
    /// Default: None
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Number of tiles to process sequentially (<= this uses sequential).
    /// Default: 4
    #[serde(default = "ParallelPolicy::default_tile_threshold")]
    pub tile_threshold: usize,

    /// Threshold for image loading in batch helpers (<= this uses sequential).
    /// Default: 4
    #[serde(default = "ParallelPolicy::default_utility_threshold")]
    pub utility_threshold: usize,

    /// Master switch. When false every stage runs on the calling thread.
    /// Default: true
    #[serde(default = "ParallelPolicy::default_enabled")]
    pub enabled: bool,
}

impl ParallelPolicy {
    /// Create a new ParallelPolicy with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never uses worker threads.
    pub fn sequential() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Set the maximum number of threads.
    pub fn with_max_threads(mut self, max_threads: Option<usize>) -> Self {
        self.max_threads = max_threads;
        self
    }

    /// Set the tile processing threshold.
    pub fn with_tile_threshold(mut self, threshold: usize) -> Self {
        self.tile_threshold = threshold;
        self
    }

    /// Set the utility operations threshold.
    pub fn with_utility_threshold(mut self, threshold: usize) -> Self {
        self.utility_threshold = threshold;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns true when `tile_count` tiles should be processed on worker threads.
    pub fn parallel_tiles(&self, tile_count: usize) -> bool {
        self.enabled && tile_count > self.tile_threshold
    }

    /// Builds a dedicated pool when `max_threads` is set.
    ///
    /// Returns `Ok(None)` when the policy defers to rayon's global pool.
    pub fn build_thread_pool(&self) -> Result<Option<rayon::ThreadPool>, rayon::ThreadPoolBuildError> {
        match self.max_threads {
            Some(num_threads) if self.enabled => rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|index| format!("textdetect-worker-{index}"))
                .build()
                .map(Some),
            _ => Ok(None),
        }
    }

    /// Configure the global rayon thread pool based on this policy.
    ///
    /// This should be called at most once per process, before any parallel work.
    /// If `max_threads` is None this does nothing.
    ///
    /// # Returns
    ///
    /// - `Ok(true)` if the thread pool was successfully configured
    /// - `Ok(false)` if `max_threads` is None (no configuration needed)
    /// - `Err` if the global thread pool has already been initialized
    pub fn install_global_thread_pool(&self) -> Result<bool, rayon::ThreadPoolBuildError> {
        if let Some(num_threads) = self.max_threads {
            rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .build_global()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn default_tile_threshold() -> usize {
        4
    }

    fn default_utility_threshold() -> usize {
        4
    }

    fn default_enabled() -> bool {
        true
    }
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            max_threads: None,
            tile_threshold: Self::default_tile_threshold(),
            utility_threshold: Self::default_utility_threshold(),
            enabled: Self::default_enabled(),
        }
    }
}

impl ConfigValidator for ParallelPolicy {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threads) = self.max_threads {
            self.validate_thread_count(threads)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parallel_tiles_threshold() {
        let policy = ParallelPolicy::new().with_tile_threshold(2);
        assert!(!policy.parallel_tiles(2));
        assert!(policy.parallel_tiles(3));
        assert!(!ParallelPolicy::sequential().parallel_tiles(100));
    }

    #[test]
    fn test_deserialize_partial_policy() {
        let policy: ParallelPolicy = serde_json::from_str(r#"{"max_threads": 2}"#).unwrap();
        assert_eq!(policy.max_threads, Some(2));
        assert_eq!(policy.tile_threshold, 4);
        assert!(policy.enabled);
    }

    #[test]
    fn test_build_thread_pool() {
        assert!(ParallelPolicy::new().build_thread_pool().unwrap().is_none());
        let pool = ParallelPolicy::new()
            .with_max_threads(Some(2))
            .build_thread_pool()
            .unwrap()
            .unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }

    #[test]
    fn test_validate_thread_count() {
        assert!(ParallelPolicy::new().with_max_threads(Some(0)).validate().is_err());
        assert!(ParallelPolicy::new().with_max_threads(Some(8)).validate().is_ok());
    }
}
