//! Configuration types for the scheduling engine.

use serde::{Deserialize, Serialize};

/// Tunables for validation and planning.
///
/// Defaults carry the host platform constants; embedders override fields
/// only in tests or on platforms with a different scheduler ceiling.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Hard capacity ceiling of the host scheduler (total pending
    /// registrations across all subsystems sharing it).
    pub registration_limit: usize,
    /// Fraction of the ceiling past which a non-blocking headroom warning
    /// is emitted, expressed in percent.
    pub headroom_warning_percent: u8,
    /// Horizon in days past which a next trigger earns a far-future warning.
    pub far_future_days: i64,
    /// Snooze duration in seconds applied when a snooze request carries
    /// no explicit duration and the alarm's policy duration is zero.
    pub default_snooze_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            registration_limit: 64,
            headroom_warning_percent: 75,
            far_future_days: 365,
            default_snooze_secs: 540,
        }
    }
}

impl EngineConfig {
    /// Live-registration count at which the headroom warning starts firing.
    pub fn headroom_warning_threshold(&self) -> usize {
        self.registration_limit * usize::from(self.headroom_warning_percent) / 100
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_constants() {
        let config = EngineConfig::default();
        assert_eq!(config.registration_limit, 64);
        assert_eq!(config.far_future_days, 365);
        assert_eq!(config.headroom_warning_threshold(), 48);
    }

    #[test]
    fn config_serde_round_trip() {
        let config = EngineConfig {
            registration_limit: 32,
            ..EngineConfig::default()
        };
        let json = serde_json::to_string(&config).expect("serialize");
        let restored: EngineConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored.registration_limit, 32);
        assert_eq!(restored.far_future_days, 365);
    }
}
