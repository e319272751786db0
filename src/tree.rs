//! The live configuration tree.
//!
//! The tree is owned by the host simulation and read every step to decide
//! numerical behavior. Top-level entries whose value is a mapping are
//! sections; anything else (scalars, lists) is left alone by patching.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::patch::json_kind;

/// Shared handle to a live configuration tree.
///
/// The mutex serializes patching against any other configuration writer.
/// It is locked for one tick at most.
pub type LiveConfig = Arc<Mutex<ConfigTree>>;

/// Result of looking a section up for writing.
#[derive(Debug)]
pub enum SectionSlot<'a> {
    /// No entry by that name.
    Missing,
    /// An entry exists but is not a mapping.
    NotASection(&'static str),
    /// A writable section.
    Section(&'a mut Map<String, Value>),
}

/// Nested key-value configuration, e.g. a solver's discretization schemes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigTree {
    entries: Map<String, Value>,
}

impl ConfigTree {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a JSON mapping.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotAMapping` if `raw` is not an object.
    pub fn from_json(raw: Value) -> Result<Self, ConfigError> {
        match raw {
            Value::Object(entries) => Ok(Self { entries }),
            other => Err(ConfigError::NotAMapping {
                found: json_kind(&other),
            }),
        }
    }

    /// Wraps this tree in a shareable handle.
    #[must_use]
    pub fn into_live(self) -> LiveConfig {
        Arc::new(Mutex::new(self))
    }

    /// Adds a section (replacing any entry with that name).
    ///
    /// This is the host's tool for building the tree; patching never calls it.
    pub fn insert_section(&mut self, name: impl Into<String>, settings: Map<String, Value>) {
        self.entries.insert(name.into(), Value::Object(settings));
    }

    /// Returns true if `name` exists and is a mapping.
    #[must_use]
    pub fn has_section(&self, name: &str) -> bool {
        matches!(self.entries.get(name), Some(Value::Object(_)))
    }

    /// Read access to a section.
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&Map<String, Value>> {
        match self.entries.get(name) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Write access to a section, distinguishing "absent" from "not a mapping".
    pub fn section_slot(&mut self, name: &str) -> SectionSlot<'_> {
        match self.entries.get_mut(name) {
            None => SectionSlot::Missing,
            Some(Value::Object(map)) => SectionSlot::Section(map),
            Some(other) => SectionSlot::NotASection(json_kind(other)),
        }
    }

    /// The raw value of `section::setting`.
    #[must_use]
    pub fn setting(&self, section: &str, setting: &str) -> Option<&Value> {
        self.section(section)?.get(setting)
    }

    /// The value of `section::setting` if it is a string.
    #[must_use]
    pub fn setting_str(&self, section: &str, setting: &str) -> Option<&str> {
        self.setting(section, setting)?.as_str()
    }

    /// Names of all top-level entries, in tree order.
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of top-level entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the tree has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// A JSON view of the whole tree.
    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Object(self.entries.clone())
    }
}
