//! Configuration for the disk cache
//!
//! The cache geometry (`app_version`, `value_count`, `max_size`) is fixed for
//! the lifetime of a cache directory: a mismatch between the configured
//! geometry and the journal header is treated as corruption and the directory
//! is rebuilt from scratch.

/// Disk cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Application version stamped into the journal header. Bumping it
    /// invalidates the whole cache directory on the next open.
    pub app_version: u32,
    /// Number of value files per entry. Fixed at open; every entry has
    /// exactly this many value slots.
    pub value_count: usize,
    /// Byte budget across all clean files. Size may transiently exceed this
    /// while a trim is pending.
    pub max_size: u64,
    /// Whether dangling dirty files left by an interrupted edit are deleted
    /// during open. When false they are preserved for a later edit to pick
    /// up (the entry is still not readable).
    pub delete_dirty_on_open: bool,
    /// When true, an editor's value writer opens the dirty file in append
    /// mode instead of truncating, so an edit resumed over a preserved dirty
    /// file continues where the previous one stopped.
    pub append_to_dirty: bool,
}

impl CacheConfig {
    /// Configuration with the given geometry and default knobs.
    pub fn new(app_version: u32, value_count: usize, max_size: u64) -> Self {
        Self {
            app_version,
            value_count,
            max_size,
            delete_dirty_on_open: true,
            append_to_dirty: false,
        }
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.value_count == 0 {
            return Err("value_count must be > 0".into());
        }
        if self.max_size == 0 {
            return Err("max_size must be > 0".into());
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(1, 1, 10 * 1024 * 1024)
    }
}
