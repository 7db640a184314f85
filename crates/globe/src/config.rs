use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::profile::DeviceProfile;

pub const ENV_TILE_URL: &str = "GLOBE_TILE_URL";
pub const ENV_ACCESS_TOKEN: &str = "GLOBE_ACCESS_TOKEN";
pub const ENV_PROFILE: &str = "GLOBE_PROFILE";

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    InvalidField { field: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "config io error: {msg}"),
            ConfigError::Parse(msg) => write!(f, "config parse error: {msg}"),
            ConfigError::InvalidField { field, reason } => {
                write!(f, "invalid config field `{field}`: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Camera position the globe opens on, looking straight down.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialView {
    pub lat: f64,
    pub lng: f64,
    pub height_m: f64,
}

impl Default for InitialView {
    fn default() -> Self {
        Self {
            lat: 20.0,
            lng: 0.0,
            height_m: 2.0e7,
        }
    }
}

/// Viewer configuration. Every field has a default, so partial JSON works.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobeConfig {
    /// Imagery tile base URL. The renderer must not require a token for it.
    pub tile_url: String,
    /// Optional token for a premium imagery provider.
    pub access_token: Option<String>,
    pub profile: DeviceProfile,
    pub initial_view: InitialView,
    pub hover_threshold_px: f64,
    /// Overrides the profile's pointer throttle interval.
    pub pointer_throttle_ms: Option<u64>,
    pub grid_size_deg: f64,
    pub cluster_base_radius_deg: f64,
    pub batch_size: u32,
    /// Total construction attempts before giving up.
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    /// Cache-trim period for constrained devices.
    pub cleanup_interval_ms: u64,
}

impl Default for GlobeConfig {
    fn default() -> Self {
        Self {
            tile_url: "https://a.tile.openstreetmap.org/".to_string(),
            access_token: None,
            profile: DeviceProfile::Desktop,
            initial_view: InitialView::default(),
            hover_threshold_px: 40.0,
            pointer_throttle_ms: None,
            grid_size_deg: scene::spatial::DEFAULT_GRID_SIZE_DEG,
            cluster_base_radius_deg: scene::cluster::DEFAULT_BASE_RADIUS_DEG,
            batch_size: 25,
            max_attempts: 3,
            retry_delay_ms: 2000,
            cleanup_interval_ms: 60_000,
        }
    }
}

impl GlobeConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&s)
    }

    /// Defaults overlaid with the `GLOBE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Applies `GLOBE_*` overrides from `lookup`. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_TILE_URL) {
            self.tile_url = url;
        }
        if let Some(token) = get(ENV_ACCESS_TOKEN) {
            self.access_token = Some(token);
        }
        if let Some(raw) = get(ENV_PROFILE) {
            self.profile = DeviceProfile::parse(&raw).ok_or(ConfigError::InvalidField {
                field: "profile",
                reason: format!("unknown device profile `{raw}`"),
            })?;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &'static str, reason: &str) -> ConfigError {
            ConfigError::InvalidField {
                field,
                reason: reason.to_string(),
            }
        }

        if self.tile_url.trim().is_empty() {
            return Err(invalid("tile_url", "must not be empty"));
        }
        if !(self.hover_threshold_px.is_finite() && self.hover_threshold_px > 0.0) {
            return Err(invalid("hover_threshold_px", "must be a positive number"));
        }
        if !(self.grid_size_deg.is_finite() && self.grid_size_deg > 0.0) {
            return Err(invalid("grid_size_deg", "must be a positive number"));
        }
        if !(self.cluster_base_radius_deg.is_finite() && self.cluster_base_radius_deg >= 0.0) {
            return Err(invalid("cluster_base_radius_deg", "must be zero or positive"));
        }
        if self.batch_size == 0 {
            return Err(invalid("batch_size", "must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts", "must be at least 1"));
        }
        if self.cleanup_interval_ms == 0 {
            return Err(invalid("cleanup_interval_ms", "must be at least 1"));
        }
        let v = &self.initial_view;
        if !(v.lat.is_finite() && v.lng.is_finite() && (-90.0..=90.0).contains(&v.lat)) {
            return Err(invalid("initial_view", "latitude must be within [-90, 90]"));
        }
        if !(v.height_m.is_finite() && v.height_m > 0.0) {
            return Err(invalid("initial_view", "height must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, ENV_PROFILE, ENV_TILE_URL, GlobeConfig};
    use crate::profile::DeviceProfile;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_are_valid_and_token_free() {
        let cfg = GlobeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.access_token, None);
        assert_eq!(cfg.hover_threshold_px, 40.0);
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.retry_delay_ms, 2000);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = GlobeConfig::from_json_str(r#"{ "profile": "mobile", "batch_size": 10 }"#)
            .unwrap();
        assert_eq!(cfg.profile, DeviceProfile::Mobile);
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.grid_size_deg, 2.0);
    }

    #[test]
    fn rejects_zero_batch() {
        let err = GlobeConfig::from_json_str(r#"{ "batch_size": 0 }"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidField {
                field: "batch_size",
                ..
            }
        ));
    }

    #[test]
    fn env_overrides_apply_and_validate() {
        let mut cfg = GlobeConfig::default();
        cfg.apply_overrides(|k| match k {
            ENV_TILE_URL => Some("https://tiles.example/".to_string()),
            ENV_PROFILE => Some("mobile".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.tile_url, "https://tiles.example/");
        assert_eq!(cfg.profile, DeviceProfile::Mobile);

        let err = cfg
            .apply_overrides(|k| (k == ENV_PROFILE).then(|| "tablet".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("tablet"));
    }
}
