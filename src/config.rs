use std::time::Duration;

use serde::Deserialize;

use crate::error::SettingsError;

/// Prefix of every environment variable read by [`Settings::from_env`].
pub const ENV_PREFIX: &str = "SPELLFILES";

/// Runtime settings shared by every component of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Base URL of the DB2 table browser.
    pub db2_base: String,
    /// Base URL of the file search service.
    pub files_base: String,
    /// Base URL of the page used to find a spell's class.
    pub classify_base: String,
    /// Maximum number of outbound calls in flight at once.
    pub max_in_flight: usize,
    /// Progress redraw cadence.
    pub tick: Duration,
    /// Data version used by every side-chain lookup.
    pub side_build: String,
    /// `SpellVisualEvent.TargetType` the side chain follows.
    pub side_target_type: String,
    /// Per-request timeout of the HTTP client.
    pub timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db2_base: "https://wago.tools/db2".to_string(),
            files_base: "https://wago.tools/files".to_string(),
            classify_base: "https://www.wowhead.com/spell".to_string(),
            max_in_flight: 16,
            tick: Duration::from_millis(50),
            side_build: "11.0.2.56421".to_string(),
            side_target_type: "2".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Values found in the environment, each one optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Overrides {
    db2_base: Option<String>,
    files_base: Option<String>,
    classify_base: Option<String>,
    max_in_flight: Option<usize>,
    tick_ms: Option<u64>,
    side_build: Option<String>,
    side_target_type: Option<String>,
    timeout_secs: Option<u64>,
}

impl Settings {
    /// Defaults overridden by any `SPELLFILES_*` variables in the process
    /// environment, e.g. `SPELLFILES_MAX_IN_FLIGHT=8`.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_source(config::Environment::with_prefix(ENV_PREFIX))
    }

    pub(crate) fn from_source(env: config::Environment) -> Result<Self, SettingsError> {
        let overrides: Overrides = config::Config::builder()
            .add_source(env)
            .build()?
            .try_deserialize()?;

        let defaults = Self::default();
        let settings = Self {
            db2_base: overrides.db2_base.unwrap_or(defaults.db2_base),
            files_base: overrides.files_base.unwrap_or(defaults.files_base),
            classify_base: overrides.classify_base.unwrap_or(defaults.classify_base),
            max_in_flight: overrides.max_in_flight.unwrap_or(defaults.max_in_flight),
            tick: overrides
                .tick_ms
                .map_or(defaults.tick, Duration::from_millis),
            side_build: overrides.side_build.unwrap_or(defaults.side_build),
            side_target_type: overrides
                .side_target_type
                .unwrap_or(defaults.side_target_type),
            timeout: overrides
                .timeout_secs
                .map_or(defaults.timeout, Duration::from_secs),
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Rejects values the resolver can't run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_in_flight == 0 {
            return Err(SettingsError::Invalid("max_in_flight", "at least 1"));
        }
        if self.tick.is_zero() {
            return Err(SettingsError::Invalid("tick_ms", "at least 1"));
        }
        if self.timeout.is_zero() {
            return Err(SettingsError::Invalid("timeout_secs", "at least 1"));
        }
        Ok(())
    }
}
