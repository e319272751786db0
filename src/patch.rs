//! Configuration patches.
//!
//! A patch is a two-level mapping: section name → setting name → value.
//! Values are opaque tokens; nothing here interprets scheme semantics, the
//! literal text is forwarded into the live configuration as-is.
//!
//! Section and setting order follows the source document so audit output
//! reads in the order the schedule was written.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Human-readable JSON kind, used in error messages.
pub(crate) const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "mapping",
    }
}

/// An opaque setting token, e.g. `Euler` or `Gauss linearUpwind grad(U)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingValue(String);

impl SettingValue {
    /// Wraps a token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The literal token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The token as it is written into the live tree.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::String(self.0.clone())
    }

    /// Reads a token from raw input.
    ///
    /// Strings are taken verbatim, numbers and booleans by their textual
    /// form. Anything structured is not a token.
    pub fn from_json(value: &Value) -> Result<Self, &'static str> {
        match value {
            Value::String(s) => Ok(Self(s.clone())),
            Value::Number(n) => Ok(Self(n.to_string())),
            Value::Bool(b) => Ok(Self(b.to_string())),
            other => Err(json_kind(other)),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SettingValue {
    fn from(v: &str) -> Self {
        Self::new(v)
    }
}

impl From<String> for SettingValue {
    fn from(v: String) -> Self {
        Self(v)
    }
}

/// Overwrites for one named section of the live configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionPatch {
    /// Section name, e.g. `ddtSchemes`.
    pub name: String,
    /// Settings in document order.
    pub settings: Vec<(String, SettingValue)>,
}

impl SectionPatch {
    /// Creates an empty section patch.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            settings: Vec::new(),
        }
    }

    /// Adds (or replaces) a setting, builder style.
    #[must_use]
    pub fn set(mut self, setting: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        let setting = setting.into();
        let value = value.into();
        match self.settings.iter_mut().find(|(name, _)| *name == setting) {
            Some(slot) => slot.1 = value,
            None => self.settings.push((setting, value)),
        }
        self
    }

    /// Looks up a setting by name.
    #[must_use]
    pub fn get(&self, setting: &str) -> Option<&SettingValue> {
        self.settings
            .iter()
            .find(|(name, _)| name == setting)
            .map(|(_, value)| value)
    }

    /// Number of settings in this section.
    #[must_use]
    pub fn len(&self) -> usize {
        self.settings.len()
    }

    /// Returns true if the section carries no settings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

/// A partial, two-level set of configuration overwrites.
///
/// # Examples
///
/// ```
/// use schemeswitch::{ConfigPatch, SectionPatch};
///
/// let patch = ConfigPatch::new()
///     .with_section(SectionPatch::new("ddtSchemes").set("default", "Euler"));
/// assert_eq!(patch.setting_count(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    /// Sections in document order.
    pub sections: Vec<SectionPatch>,
}

impl ConfigPatch {
    /// Creates an empty patch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a section, builder style. A section with the same name is replaced.
    #[must_use]
    pub fn with_section(mut self, section: SectionPatch) -> Self {
        match self.sections.iter_mut().find(|s| s.name == section.name) {
            Some(slot) => *slot = section,
            None => self.sections.push(section),
        }
        self
    }

    /// Looks up a section by name.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionPatch> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Total number of settings across all sections.
    #[must_use]
    pub fn setting_count(&self) -> usize {
        self.sections.iter().map(SectionPatch::len).sum()
    }

    /// Parses the raw patch stored under trigger key `trigger`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the patch, any of its sections, or any
    /// setting value has the wrong shape.
    pub fn from_json(trigger: &str, raw: &Value) -> Result<Self, ConfigError> {
        let Value::Object(sections) = raw else {
            return Err(ConfigError::MalformedPatch {
                trigger: trigger.to_string(),
                found: json_kind(raw),
            });
        };

        let mut patch = Self::new();
        for (section_name, section_raw) in sections {
            let Value::Object(settings) = section_raw else {
                return Err(ConfigError::MalformedSection {
                    trigger: trigger.to_string(),
                    section: section_name.clone(),
                    found: json_kind(section_raw),
                });
            };

            let mut section = SectionPatch::new(section_name.clone());
            for (setting_name, value_raw) in settings {
                let value = SettingValue::from_json(value_raw).map_err(|found| {
                    ConfigError::MalformedSetting {
                        trigger: trigger.to_string(),
                        section: section_name.clone(),
                        setting: setting_name.clone(),
                        found,
                    }
                })?;
                section.settings.push((setting_name.clone(), value));
            }
            patch.sections.push(section);
        }
        Ok(patch)
    }

    /// Feeds the patch content into a hasher in a stable layout.
    pub(crate) fn hash_into(&self, hasher: &mut blake3::Hasher) {
        for section in &self.sections {
            hasher.update(b"S");
            hasher.update(section.name.as_bytes());
            hasher.update(&[0]);
            for (name, value) in &section.settings {
                hasher.update(b"K");
                hasher.update(name.as_bytes());
                hasher.update(&[0]);
                hasher.update(value.as_str().as_bytes());
                hasher.update(&[0]);
            }
        }
    }
}
