use crate::error::{IdolError, Result};
use crate::idol::{escape_path, ImageLocation};

/// Runtime configuration, loaded from `IDOLFACE_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Rekognition collection holding the reference faces.
    pub collection_id: String,
    /// S3 bucket reference images are uploaded to.
    pub bucket: String,
    /// Key prefix under which `<idol_id>/<file>` reference images are stored.
    pub profile_root: String,
    /// Minimum similarity (0-100) for a search hit to count as a match.
    pub match_threshold: f32,
    /// Maximum matches requested from a search.
    pub max_matches: u32,
    /// Log per-item progress of batch uploads at info level.
    pub verbose: bool,
    /// Webhook that receives a message when a command fails. Unset disables alerts.
    pub alert_webhook: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            collection_id: "idols".to_string(),
            bucket: "idols".to_string(),
            profile_root: "profiles".to_string(),
            match_threshold: 80.0,
            max_matches: 1,
            verbose: false,
            alert_webhook: None,
        }
    }
}

impl Config {
    /// Reads the environment on top of the defaults and rejects values the
    /// service would not accept.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            collection_id: env_string("IDOLFACE_COLLECTION_ID", defaults.collection_id),
            bucket: env_string("IDOLFACE_BUCKET", defaults.bucket),
            profile_root: env_string("IDOLFACE_PROFILE_ROOT", defaults.profile_root),
            match_threshold: env_f32("IDOLFACE_MATCH_THRESHOLD", defaults.match_threshold),
            max_matches: env_u32("IDOLFACE_MAX_MATCHES", defaults.max_matches),
            verbose: std::env::var("IDOLFACE_VERBOSE")
                .map(|v| v != "0" && !v.is_empty())
                .unwrap_or(defaults.verbose),
            alert_webhook: std::env::var("IDOLFACE_ALERT_WEBHOOK")
                .ok()
                .filter(|v| !v.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.match_threshold) {
            return Err(IdolError::InvalidConfig(format!(
                "match threshold must be within 0-100, got {}",
                self.match_threshold
            )));
        }
        if self.max_matches == 0 {
            return Err(IdolError::InvalidConfig(
                "max matches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Location of a reference image for `idol_id` in the configured bucket.
    pub fn profile_location(&self, idol_id: &str, file_name: &str) -> ImageLocation {
        let key = escape_path(&format!("{}/{}/{}", self.profile_root, idol_id, file_name));
        ImageLocation::new(&self.bucket, &key)
    }
}

fn env_string(key: &str, default: String) -> String {
    std::env::var(key).ok().filter(|v| !v.is_empty()).unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_location_joins_root_and_idol() {
        let config = Config {
            profile_root: "/profiles/".to_string(),
            ..Config::default()
        };
        let location = config.profile_location("alice", "001.jpg");
        assert_eq!(location.bucket, "idols");
        assert_eq!(location.key, "profiles/alice/001.jpg");
    }

    #[test]
    fn out_of_range_search_settings_are_rejected() {
        assert!(Config::default().validate().is_ok());
        for config in [
            Config {
                match_threshold: 150.0,
                ..Config::default()
            },
            Config {
                match_threshold: -1.0,
                ..Config::default()
            },
            Config {
                match_threshold: f32::NAN,
                ..Config::default()
            },
            Config {
                max_matches: 0,
                ..Config::default()
            },
        ] {
            assert!(
                matches!(config.validate(), Err(IdolError::InvalidConfig(_))),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_profile_root_is_dropped() {
        let config = Config {
            profile_root: String::new(),
            ..Config::default()
        };
        assert_eq!(config.profile_location("bob", "b.png").key, "bob/b.png");
    }
}
