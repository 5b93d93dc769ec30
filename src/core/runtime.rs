//! Process-wide initialization.
//!
//! Worker threads for tile processing come from rayon's global pool unless an
//! engine owns a dedicated pool. [`initialize`] sizes the global pool once per
//! process; the pool lives until the process exits.

use once_cell::sync::OnceCell;
use serde::Serialize;
use tracing::debug;

use crate::core::config::{ConfigValidator, ParallelPolicy};
use crate::core::errors::DetectResult;

/// What [`initialize`] configured.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuntimeInfo {
    /// Worker threads in the global pool.
    pub worker_threads: usize,
    /// Whether the policy sized the global pool, as opposed to rayon's default.
    pub custom_pool: bool,
}

static RUNTIME: OnceCell<RuntimeInfo> = OnceCell::new();

/// Initializes the global worker pool from `policy`.
///
/// Only the first call has an effect; later calls return the first result
/// regardless of the policy passed.
///
/// # Errors
///
/// Fails if the policy is invalid or if rayon's global pool was already built
/// by someone else with a different configuration.
pub fn initialize(policy: &ParallelPolicy) -> DetectResult<&'static RuntimeInfo> {
    RUNTIME.get_or_try_init(|| {
        policy.validate()?;
        let custom_pool = policy.install_global_thread_pool()?;
        let info = RuntimeInfo {
            worker_threads: rayon::current_num_threads(),
            custom_pool,
        };
        debug!(
            worker_threads = info.worker_threads,
            custom_pool, "runtime initialized"
        );
        Ok(info)
    })
}

/// Returns the runtime configuration if [`initialize`] has succeeded.
pub fn runtime_info() -> Option<&'static RuntimeInfo> {
    RUNTIME.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let first = initialize(&ParallelPolicy::default()).unwrap();
        let second = initialize(&ParallelPolicy::default().with_max_threads(Some(3))).unwrap();
        assert!(std::ptr::eq(first, second));
        assert!(runtime_info().is_some());
        assert!(!first.custom_pool);
    }
}
