//! Error types for schemeswitch.
//!
//! All errors are strongly typed using thiserror so hosts can pattern
//! match on the failure class: a rejected reload (`ConfigError`) is
//! recoverable by fixing the input, a missing live configuration object
//! (`LookupError`) aborts the current step.

use thiserror::Error;

/// Errors raised while loading a schedule or its options.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Required entry '{key}' is missing")]
    MissingEntry {
        key: String,
    },

    #[error("Schedule must be a mapping of trigger time to patch, found {found}")]
    NotAMapping {
        found: &'static str,
    },

    #[error("Trigger time '{key}' is not a real number")]
    InvalidTriggerTime {
        key: String,
    },

    #[error("Trigger time '{key}' is not finite")]
    NonFiniteTriggerTime {
        key: String,
    },

    #[error("Duplicate trigger time {time} (keys '{first}' and '{second}')")]
    DuplicateTriggerTime {
        time: f64,
        first: String,
        second: String,
    },

    #[error("Patch at '{trigger}' must be a mapping of sections, found {found}")]
    MalformedPatch {
        trigger: String,
        found: &'static str,
    },

    #[error("Section '{section}' at '{trigger}' must be a mapping of settings, found {found}")]
    MalformedSection {
        trigger: String,
        section: String,
        found: &'static str,
    },

    #[error("Setting '{section}::{setting}' at '{trigger}' must be a textual token, found {found}")]
    MalformedSetting {
        trigger: String,
        section: String,
        setting: String,
        found: &'static str,
    },

    #[error("Invalid option '{key}': {reason}")]
    InvalidOption {
        key: String,
        reason: String,
    },
}

/// Errors resolving the live configuration object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("Live configuration '{primary}' not found (fallback: {fallback})")]
    ConfigNotFound {
        primary: String,
        fallback: String,
    },
}

/// Top-level error type for schemeswitch.
#[derive(Debug, Error)]
pub enum SwitchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl SwitchError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Returns true if this is a lookup error.
    #[must_use]
    pub const fn is_lookup(&self) -> bool {
        matches!(self, Self::Lookup(_))
    }

    /// Returns true if this is an internal error.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::Internal { .. })
    }

    /// Returns true if this error is retryable.
    ///
    /// Nothing here is: a bad schedule needs a new reload and a missing live
    /// configuration means the simulation setup itself is broken.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        false
    }
}

/// Result type alias for schemeswitch operations.
pub type SwitchResult<T> = Result<T, SwitchError>;
