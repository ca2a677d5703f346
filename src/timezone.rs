//! Timezone-change detection.
//!
//! The engine caches the last observed zone identifier; a change means
//! every registration was planned against stale local offsets and the
//! whole set gets rebuilt.

use tracing::info;

/// Caches the current zone identifier and detects changes.
#[derive(Debug, Clone)]
pub struct TimezoneMonitor {
    current: String,
}

impl TimezoneMonitor {
    /// Create a monitor anchored at the given zone identifier.
    pub fn new(zone_id: impl Into<String>) -> Self {
        Self {
            current: zone_id.into(),
        }
    }

    /// The cached zone identifier.
    pub fn current(&self) -> &str {
        &self.current
    }

    /// Record an observed zone identifier.
    ///
    /// Returns `true` and updates the cache when it differs from the
    /// cached one; an unchanged identifier is a no-op.
    pub fn observe(&mut self, zone_id: &str) -> bool {
        if self.current == zone_id {
            return false;
        }
        info!(from = %self.current, to = %zone_id, "timezone changed");
        self.current = zone_id.to_owned();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unchanged_zone_is_a_no_op() {
        let mut monitor = TimezoneMonitor::new("Europe/London");
        assert!(!monitor.observe("Europe/London"));
        assert_eq!(monitor.current(), "Europe/London");
    }

    #[test]
    fn changed_zone_updates_the_cache() {
        let mut monitor = TimezoneMonitor::new("Europe/London");
        assert!(monitor.observe("America/New_York"));
        assert_eq!(monitor.current(), "America/New_York");
        // Observing the new zone again is a no-op.
        assert!(!monitor.observe("America/New_York"));
    }
}
