//! Patch application.
//!
//! Merge rules:
//! - A section missing from the live tree is skipped; patching never creates
//!   top-level sections.
//! - A live entry with the section's name that is not a mapping is skipped
//!   and left untouched.
//! - Every setting of a matching section is written, whether or not it
//!   existed before. Nothing else in the tree is touched.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audit::{AuditSink, SettingChange};
use crate::schedule::ScheduleEntry;
use crate::tree::{ConfigTree, SectionSlot};

/// Why a patch section was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The live tree has no entry by that name.
    Missing,
    /// The live entry is not a mapping.
    NotASection,
}

/// What one `apply` call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyOutcome {
    /// Changes in application order.
    pub changes: Vec<SettingChange>,
    /// Patch sections that were skipped.
    pub skipped: Vec<(String, SkipReason)>,
}

impl ApplyOutcome {
    /// Number of settings written.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.changes.len()
    }
}

/// Merges schedule entries into a live configuration tree.
#[derive(Clone, Default)]
pub struct PatchApplier {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl fmt::Debug for PatchApplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatchApplier")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl PatchApplier {
    /// An applier that only logs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an audit sink.
    pub fn add_sink(&mut self, sink: Arc<dyn AuditSink>) {
        self.sinks.push(sink);
    }

    /// Number of attached audit sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Applies `entry`'s patch to `tree` in place.
    ///
    /// `time` is the simulation time of the current tick and is carried into
    /// every change record.
    pub fn apply(&self, time: f64, entry: &ScheduleEntry, tree: &mut ConfigTree) -> ApplyOutcome {
        let mut outcome = ApplyOutcome::default();

        for section in &entry.patch.sections {
            let target = match tree.section_slot(&section.name) {
                SectionSlot::Section(target) => target,
                SectionSlot::Missing => {
                    debug!(
                        trigger = %entry.trigger,
                        section = %section.name,
                        "Section not in live configuration, skipping"
                    );
                    outcome.skipped.push((section.name.clone(), SkipReason::Missing));
                    continue;
                }
                SectionSlot::NotASection(found) => {
                    warn!(
                        trigger = %entry.trigger,
                        section = %section.name,
                        found,
                        "Live entry is not a section, skipping"
                    );
                    outcome.skipped.push((section.name.clone(), SkipReason::NotASection));
                    continue;
                }
            };

            for (setting, value) in &section.settings {
                let previous = target.insert(setting.clone(), value.to_json());
                let change = SettingChange {
                    time,
                    trigger: entry.trigger,
                    section: section.name.clone(),
                    setting: setting.clone(),
                    previous,
                    value: value.clone(),
                    recorded_at: Utc::now(),
                };

                info!(
                    time,
                    section = %change.section,
                    setting = %change.setting,
                    value = %change.value,
                    "{change}"
                );
                for sink in &self.sinks {
                    sink.record(&change);
                }
                outcome.changes.push(change);
            }
        }

        outcome
    }
}
