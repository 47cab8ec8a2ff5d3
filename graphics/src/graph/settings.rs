//! Render graph configuration.

use ember_core::pool::DEFAULT_EVICTION_THRESHOLD;

/// Per-graph settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphSettings {
    /// Allow passes to move to the async compute queue.
    pub async_compute: bool,
    /// Failed pool matches after which a free allocation is dropped.
    pub pool_eviction_threshold: u32,
    /// Wrap every pass in a debug marker region.
    pub debug_markers: bool,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            async_compute: true,
            pool_eviction_threshold: DEFAULT_EVICTION_THRESHOLD,
            debug_markers: true,
        }
    }
}

impl GraphSettings {
    /// Create the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable async compute.
    pub fn with_async_compute(mut self, enabled: bool) -> Self {
        self.async_compute = enabled;
        self
    }

    /// Set the pool eviction threshold.
    pub fn with_pool_eviction_threshold(mut self, threshold: u32) -> Self {
        self.pool_eviction_threshold = threshold;
        self
    }

    /// Enable or disable per-pass debug markers.
    pub fn with_debug_markers(mut self, enabled: bool) -> Self {
        self.debug_markers = enabled;
        self
    }
}
