//! # Ports
//!
//! The executor's pluggable observation capability. The core itself holds
//! no process-wide hooks; callers wanting cross-checks (state diffing,
//! tracing exports) inject an observer, disabled by default.

use shared_types::{Hash, Receipt};

/// Callbacks fired during block execution. All default to no-ops.
pub trait ExecutionObserver {
    /// A transaction finished and produced its receipt.
    fn transaction_executed(&self, _index: usize, _receipt: &Receipt) {}

    /// The post-block state root was computed, before it is compared to
    /// the header commitment.
    fn state_root_computed(&self, _computed: Hash, _expected: Hash) {}
}

/// The default observer: observes nothing.
pub struct NoopObserver;

impl ExecutionObserver for NoopObserver {}
