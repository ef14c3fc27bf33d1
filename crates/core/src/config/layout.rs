//! Partition naming and retention policy.

use std::time::Duration;

/// Names of the partitions owned by the worker and how they are retained.
///
/// Everything that refers to a partition goes through this struct instead of
/// building names locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    /// Current generation of the static partition, e.g. `mbm-connect-static-v1`.
    pub static_partition: String,
    /// Dynamic partition, e.g. `mbm-connect-dynamic`.
    pub dynamic_partition: String,
    /// Names starting with this belong to some static generation.
    pub static_generation_prefix: String,
    /// Names starting with this belong to some dynamic generation.
    pub dynamic_generation_prefix: String,
    /// Whether the dynamic partition is generation-qualified and pruned on activate.
    pub version_dynamic: bool,
    /// Dynamic entries older than this are not served and are purged on activate.
    pub dynamic_max_age: Option<Duration>,
}

impl CacheLayout {
    pub fn new(prefix: &str, version: &str, version_dynamic: bool) -> Self {
        let static_generation_prefix = format!("{prefix}-static-");
        let dynamic_generation_prefix = format!("{prefix}-dynamic");
        let dynamic_partition = if version_dynamic {
            format!("{dynamic_generation_prefix}-{version}")
        } else {
            dynamic_generation_prefix.clone()
        };

        Self {
            static_partition: format!("{static_generation_prefix}{version}"),
            dynamic_partition,
            static_generation_prefix,
            dynamic_generation_prefix,
            version_dynamic,
            dynamic_max_age: None,
        }
    }

    pub fn with_dynamic_max_age(mut self, max_age: Option<Duration>) -> Self {
        self.dynamic_max_age = max_age;
        self
    }

    /// Whether activation should delete the named partition.
    ///
    /// Static generations other than the current one are always stale. Older
    /// dynamic generations are stale only when the dynamic partition is
    /// versioned. Partitions outside our prefixes are never touched.
    pub fn is_stale(&self, name: &str) -> bool {
        if name.starts_with(&self.static_generation_prefix) {
            return name != self.static_partition;
        }
        if self.version_dynamic && name.starts_with(&self.dynamic_generation_prefix) {
            return name != self.dynamic_partition;
        }
        false
    }
}
