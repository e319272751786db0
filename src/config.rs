//! Switcher configuration.
//!
//! The host hands the switcher one configuration block. The schedule lives
//! under [`SCHEDULE_KEY`]; the remaining keys are options, all optional:
//!
//! ```json
//! {
//!     "schemeSwitch": { "10": { "ddtSchemes": { "default": "Euler" } } },
//!     "target": "region0",
//!     "fallbackTarget": "defaultRegion",
//!     "duplicates": "last_wins",
//!     "onReload": "reset"
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::patch::json_kind;
use crate::registry::TargetNames;
use crate::schedule::DuplicatePolicy;

/// Key holding the schedule inside the configuration block.
pub const SCHEDULE_KEY: &str = "schemeSwitch";
/// Default primary registry name of the live configuration.
pub const DEFAULT_TARGET: &str = "region0";
/// Default fallback registry name.
pub const DEFAULT_FALLBACK_TARGET: &str = "defaultRegion";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "SCHEMESWITCH_LOG";

/// What a successful reload does to the high-water mark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPolicy {
    /// Forget what was applied; entries still due apply again on the next tick.
    #[default]
    Reset,
    /// Keep the mark; only entries later than it can still apply.
    Keep,
}

/// Options read alongside the schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwitcherOptions {
    /// Primary registry name of the live configuration.
    pub target: String,
    /// Alternate name tried when the primary is absent. `null` disables it.
    pub fallback_target: Option<String>,
    /// Handling of keys that parse to the same trigger time.
    pub duplicates: DuplicatePolicy,
    /// Handling of the high-water mark on reload.
    pub on_reload: ReloadPolicy,
}

impl Default for SwitcherOptions {
    fn default() -> Self {
        Self {
            target: DEFAULT_TARGET.to_string(),
            fallback_target: Some(DEFAULT_FALLBACK_TARGET.to_string()),
            duplicates: DuplicatePolicy::default(),
            on_reload: ReloadPolicy::default(),
        }
    }
}

impl SwitcherOptions {
    /// Reads the options from a configuration block. Unknown keys, including
    /// the schedule itself, are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the block is not a mapping or an option has
    /// an invalid value.
    pub fn from_block(block: &Value) -> Result<Self, ConfigError> {
        if !block.is_object() {
            return Err(ConfigError::NotAMapping {
                found: json_kind(block),
            });
        }
        let options: Self = serde_json::from_value(block.clone()).map_err(|e| ConfigError::InvalidOption {
            key: "options".to_string(),
            reason: e.to_string(),
        })?;
        if options.target.trim().is_empty() {
            return Err(ConfigError::InvalidOption {
                key: "target".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(options)
    }

    /// Registry names to resolve the live configuration with.
    #[must_use]
    pub fn target_names(&self) -> TargetNames {
        TargetNames::new(self.target.clone(), self.fallback_target.clone())
    }
}

/// The raw schedule inside a configuration block.
///
/// # Errors
///
/// Returns `ConfigError::MissingEntry` if the block has no schedule.
pub fn schedule_block(block: &Value) -> Result<&Value, ConfigError> {
    block.get(SCHEDULE_KEY).ok_or_else(|| ConfigError::MissingEntry {
        key: SCHEDULE_KEY.to_string(),
    })
}
