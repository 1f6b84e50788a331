//! Engine configuration
//!
//! Tunables shared by the cache, history store and traversal engine.
//! Command line flags in `main.rs` override the defaults.

/// Values at or above this many bytes are staged in pooled buffers
/// instead of on the stack.
pub const BIG_VALUE_THRESHOLD: usize = 512;

/// Engine tunables
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Cache page size in bytes (power of two)
    pub page_size: usize,
    /// Minimum interval between buffer pool flushes
    pub pool_flush_ms: u64,
    /// Minimum interval between history store cycles
    pub history_cycle_ms: u64,
    /// First read window for NUL-terminated strings
    pub string_initial_size: usize,
    /// Largest read window for NUL-terminated strings
    pub string_max_size: usize,
    /// Upper bound for arrays sized by another field
    pub max_dynamic_elements: usize,
    /// Arrays with more elements start collapsed and are skipped by expand-all
    pub eager_array_limit: usize,
    /// Seconds for a change highlight to fade out
    pub fade_secs: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: 4096,
            pool_flush_ms: 30_000,
            history_cycle_ms: 5_000,
            string_initial_size: 32,
            string_max_size: 1024,
            max_dynamic_elements: 4096,
            eager_array_limit: 64,
            fade_secs: 3.0,
        }
    }
}
