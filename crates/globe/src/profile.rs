use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::GlobeConfig;

/// Device class the viewer is tuned for.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceProfile {
    #[default]
    Desktop,
    Mobile,
}

impl DeviceProfile {
    pub fn is_constrained(self) -> bool {
        matches!(self, DeviceProfile::Mobile)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Some(DeviceProfile::Desktop),
            "mobile" | "constrained" => Some(DeviceProfile::Mobile),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceProfile::Desktop => f.write_str("desktop"),
            DeviceProfile::Mobile => f.write_str("mobile"),
        }
    }
}

/// Performance settings resolved once from the device profile.
///
/// Every profile-dependent decision reads from this struct; nothing else in
/// the crate branches on `DeviceProfile`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ProfileSettings {
    pub profile: DeviceProfile,
    /// Multiplier on the renderer's tile detail (1.0 = full resolution).
    pub tile_resolution_scale: f64,
    pub msaa_samples: u32,
    /// Camera inertia damping; higher settles faster.
    pub camera_damping: f64,
    pub target_frame_rate: u32,
    pub pointer_throttle: Duration,
    /// `None` disables periodic cache trimming.
    pub cleanup_interval: Option<Duration>,
}

impl ProfileSettings {
    pub fn resolve(config: &GlobeConfig) -> Self {
        let base = match config.profile {
            DeviceProfile::Desktop => Self {
                profile: DeviceProfile::Desktop,
                tile_resolution_scale: 1.0,
                msaa_samples: 4,
                camera_damping: 4.0,
                target_frame_rate: 60,
                pointer_throttle: Duration::from_millis(16),
                cleanup_interval: None,
            },
            DeviceProfile::Mobile => Self {
                profile: DeviceProfile::Mobile,
                tile_resolution_scale: 0.5,
                msaa_samples: 1,
                camera_damping: 8.0,
                target_frame_rate: 30,
                pointer_throttle: Duration::from_millis(100),
                cleanup_interval: Some(Duration::from_millis(config.cleanup_interval_ms)),
            },
        };

        match config.pointer_throttle_ms {
            Some(ms) => Self {
                pointer_throttle: Duration::from_millis(ms),
                ..base
            },
            None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceProfile, ProfileSettings};
    use crate::config::GlobeConfig;
    use std::time::Duration;

    #[test]
    fn desktop_never_schedules_cleanup() {
        let s = ProfileSettings::resolve(&GlobeConfig::default());
        assert_eq!(s.profile, DeviceProfile::Desktop);
        assert_eq!(s.cleanup_interval, None);
        assert_eq!(s.pointer_throttle, Duration::from_millis(16));
    }

    #[test]
    fn mobile_lowers_quality_and_enables_cleanup() {
        let cfg = GlobeConfig {
            profile: DeviceProfile::Mobile,
            ..GlobeConfig::default()
        };
        let s = ProfileSettings::resolve(&cfg);
        assert!(s.tile_resolution_scale < 1.0);
        assert_eq!(s.msaa_samples, 1);
        assert_eq!(s.cleanup_interval, Some(Duration::from_secs(60)));
    }

    #[test]
    fn throttle_override_wins_over_profile() {
        let cfg = GlobeConfig {
            profile: DeviceProfile::Mobile,
            pointer_throttle_ms: Some(50),
            ..GlobeConfig::default()
        };
        assert_eq!(
            ProfileSettings::resolve(&cfg).pointer_throttle,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn parses_profile_names() {
        assert_eq!(DeviceProfile::parse(" Mobile "), Some(DeviceProfile::Mobile));
        assert_eq!(DeviceProfile::parse("desktop"), Some(DeviceProfile::Desktop));
        assert_eq!(DeviceProfile::parse("tablet"), None);
    }
}
