//! Schedule store.
//!
//! Key invariants:
//! - Entries are keyed by trigger time; at most one entry per time.
//! - A schedule is immutable once built. Reloading swaps in a new one.
//! - Due entries come back in ascending trigger order, so a step that jumps
//!   over several trigger times applies them oldest first.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::patch::{json_kind, ConfigPatch};
use crate::time::{HighWaterMark, TriggerTime};

/// What to do when two keys parse to the same trigger time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The entry appearing later in the source replaces the earlier one.
    #[default]
    LastWins,
    /// Fail the load with `ConfigError::DuplicateTriggerTime`.
    Reject,
}

/// A single scheduled patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    /// When the patch becomes eligible.
    pub trigger: TriggerTime,
    /// The key as written in the source, e.g. `"10"` or `"1e1"`.
    pub key: String,
    /// The overwrites to apply.
    pub patch: ConfigPatch,
}

impl ScheduleEntry {
    /// Creates an entry whose key is the trigger's canonical text.
    #[must_use]
    pub fn new(trigger: TriggerTime, patch: ConfigPatch) -> Self {
        Self {
            trigger,
            key: trigger.to_string(),
            patch,
        }
    }
}

/// Content digest of a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScheduleFingerprint([u8; 32]);

impl ScheduleFingerprint {
    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for ScheduleFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..8] {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Ordered (trigger time → patch) entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    entries: BTreeMap<TriggerTime, ScheduleEntry>,
    fingerprint: ScheduleFingerprint,
}

impl Default for Schedule {
    fn default() -> Self {
        Self::from_map(BTreeMap::new())
    }
}

impl Schedule {
    /// An empty schedule.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a schedule from already-typed entries.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::DuplicateTriggerTime` under `DuplicatePolicy::Reject`
    /// when two entries share a trigger time.
    pub fn from_entries<I>(entries: I, policy: DuplicatePolicy) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ScheduleEntry>,
    {
        let mut map = BTreeMap::new();
        for entry in entries {
            insert_entry(&mut map, entry, policy)?;
        }
        Ok(Self::from_map(map))
    }

    /// Parses a raw `trigger time → patch` mapping.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `raw` is not a mapping, a key is not a finite
    /// real, a patch is malformed, or a duplicate is hit under
    /// `DuplicatePolicy::Reject`.
    ///
    /// # Examples
    ///
    /// ```
    /// use schemeswitch::{DuplicatePolicy, Schedule};
    /// use serde_json::json;
    ///
    /// let raw = json!({ "10": { "ddtSchemes": { "default": "Euler" } } });
    /// let schedule = Schedule::from_json(&raw, DuplicatePolicy::LastWins).unwrap();
    /// assert_eq!(schedule.len(), 1);
    /// ```
    pub fn from_json(raw: &Value, policy: DuplicatePolicy) -> Result<Self, ConfigError> {
        let Value::Object(items) = raw else {
            return Err(ConfigError::NotAMapping {
                found: json_kind(raw),
            });
        };

        let mut map = BTreeMap::new();
        for (key, patch_raw) in items {
            let trigger: TriggerTime = key.parse()?;
            let patch = ConfigPatch::from_json(key, patch_raw)?;
            insert_entry(
                &mut map,
                ScheduleEntry {
                    trigger,
                    key: key.clone(),
                    patch,
                },
                policy,
            )?;
        }
        Ok(Self::from_map(map))
    }

    fn from_map(entries: BTreeMap<TriggerTime, ScheduleEntry>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for (trigger, entry) in &entries {
            hasher.update(b"T");
            hasher.update(&trigger.value().to_bits().to_le_bytes());
            entry.patch.hash_into(&mut hasher);
        }
        let fingerprint = ScheduleFingerprint(*hasher.finalize().as_bytes());
        Self {
            entries,
            fingerprint,
        }
    }

    /// Entries with `hwm < trigger <= current_time`, ascending.
    ///
    /// A NaN `current_time` reaches nothing.
    pub fn due_entries(
        &self,
        current_time: f64,
        hwm: HighWaterMark,
    ) -> impl Iterator<Item = &ScheduleEntry> + '_ {
        let lower = match hwm.get() {
            Some(mark) => Bound::Excluded(mark),
            None => Bound::Unbounded,
        };
        self.entries
            .range((lower, Bound::Unbounded))
            .map(|(_, entry)| entry)
            .take_while(move |entry| entry.trigger.is_reached_by(current_time))
    }

    /// The entry at exactly `trigger`.
    #[must_use]
    pub fn get(&self, trigger: TriggerTime) -> Option<&ScheduleEntry> {
        self.entries.get(&trigger)
    }

    /// All entries, ascending.
    pub fn iter(&self) -> impl Iterator<Item = &ScheduleEntry> + '_ {
        self.entries.values()
    }

    /// The earliest trigger time still ahead of `hwm`.
    #[must_use]
    pub fn next_after(&self, hwm: HighWaterMark) -> Option<TriggerTime> {
        let lower = match hwm.get() {
            Some(mark) => Bound::Excluded(mark),
            None => Bound::Unbounded,
        };
        self.entries
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(t, _)| *t)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is scheduled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Content digest; identical input gives an identical fingerprint.
    #[must_use]
    pub const fn fingerprint(&self) -> ScheduleFingerprint {
        self.fingerprint
    }
}

fn insert_entry(
    map: &mut BTreeMap<TriggerTime, ScheduleEntry>,
    entry: ScheduleEntry,
    policy: DuplicatePolicy,
) -> Result<(), ConfigError> {
    if let Some(existing) = map.get(&entry.trigger) {
        match policy {
            DuplicatePolicy::Reject => {
                return Err(ConfigError::DuplicateTriggerTime {
                    time: entry.trigger.value(),
                    first: existing.key.clone(),
                    second: entry.key,
                });
            }
            DuplicatePolicy::LastWins => {
                debug!(
                    time = %entry.trigger,
                    replaced = %existing.key,
                    by = %entry.key,
                    "Duplicate trigger time, later entry wins"
                );
            }
        }
    }
    map.insert(entry.trigger, entry);
    Ok(())
}

/// Owns the current schedule and the high-water mark.
#[derive(Debug, Clone, Default)]
pub struct ScheduleStore {
    schedule: Arc<Schedule>,
    mark: HighWaterMark,
    policy: DuplicatePolicy,
}

impl ScheduleStore {
    /// An empty store using `policy` for duplicate trigger times.
    #[must_use]
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            schedule: Arc::new(Schedule::empty()),
            mark: HighWaterMark::UNSET,
            policy,
        }
    }

    /// Parses `raw`, replaces the whole schedule and resets the mark.
    ///
    /// On error the store is left exactly as it was.
    ///
    /// # Errors
    ///
    /// See [`Schedule::from_json`].
    pub fn load(&mut self, raw: &Value) -> Result<&Schedule, ConfigError> {
        let schedule = Schedule::from_json(raw, self.policy)?;
        self.replace(schedule, true);
        Ok(self.schedule.as_ref())
    }

    /// Installs a prebuilt schedule, optionally resetting the mark.
    pub fn replace(&mut self, schedule: Schedule, reset_mark: bool) {
        info!(
            entries = schedule.len(),
            fingerprint = %schedule.fingerprint(),
            reset_mark,
            "Loaded switch schedule"
        );
        self.schedule = Arc::new(schedule);
        if reset_mark {
            self.mark = HighWaterMark::UNSET;
        }
    }

    /// Changes the duplicate policy used by later loads.
    pub fn set_policy(&mut self, policy: DuplicatePolicy) {
        self.policy = policy;
    }

    /// The duplicate policy used by `load`.
    #[must_use]
    pub const fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// The current schedule.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// A shared handle to the current schedule, stable across later reloads.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Schedule> {
        Arc::clone(&self.schedule)
    }

    /// The current high-water mark.
    #[must_use]
    pub const fn mark(&self) -> HighWaterMark {
        self.mark
    }

    /// Entries due at `current_time` that the mark has not passed.
    pub fn due_entries(&self, current_time: f64) -> impl Iterator<Item = &ScheduleEntry> + '_ {
        self.schedule.due_entries(current_time, self.mark)
    }

    /// Records that the entry at `trigger` has been fully applied.
    pub fn record_applied(&mut self, trigger: TriggerTime) {
        self.mark.advance(trigger);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::SectionPatch;
    use serde_json::json;

    fn t(v: f64) -> TriggerTime {
        TriggerTime::new(v).unwrap()
    }

    fn patch(value: &str) -> ConfigPatch {
        ConfigPatch::new().with_section(SectionPatch::new("ddtSchemes").set("default", value))
    }

    fn sample() -> Schedule {
        Schedule::from_entries(
            [
                ScheduleEntry::new(t(8.0), patch("CrankNicolson 0.9")),
                ScheduleEntry::new(t(5.0), patch("backward")),
                ScheduleEntry::new(t(10.0), patch("Euler")),
            ],
            DuplicatePolicy::Reject,
        )
        .unwrap()
    }

    fn due(schedule: &Schedule, now: f64, hwm: HighWaterMark) -> Vec<f64> {
        schedule.due_entries(now, hwm).map(|e| e.trigger.value()).collect()
    }

    #[test]
    fn test_due_entries_ascending_and_bounded() {
        let s = sample();
        assert_eq!(due(&s, 4.9, HighWaterMark::UNSET), Vec::<f64>::new());
        assert_eq!(due(&s, 5.0, HighWaterMark::UNSET), vec![5.0]);
        assert_eq!(due(&s, 9.0, HighWaterMark::UNSET), vec![5.0, 8.0]);
        assert_eq!(due(&s, 100.0, HighWaterMark::UNSET), vec![5.0, 8.0, 10.0]);
    }

    #[test]
    fn test_due_entries_respects_mark() {
        let s = sample();
        let mark = HighWaterMark::at(t(5.0));
        assert_eq!(due(&s, 9.0, mark), vec![8.0]);
        assert_eq!(due(&s, 5.0, mark), Vec::<f64>::new());
        // Clock behind the mark is not an error, just nothing due.
        assert_eq!(due(&s, 1.0, HighWaterMark::at(t(8.0))), Vec::<f64>::new());
    }

    #[test]
    fn test_due_entries_non_finite_clock() {
        let s = sample();
        assert!(due(&s, f64::NAN, HighWaterMark::UNSET).is_empty());
        assert!(due(&s, f64::NEG_INFINITY, HighWaterMark::UNSET).is_empty());
        assert_eq!(due(&s, f64::INFINITY, HighWaterMark::UNSET).len(), 3);
    }

    #[test]
    fn test_from_json_parses_keys() {
        let raw = json!({
            "1e1": { "ddtSchemes": { "default": "Euler" } },
            "2.5": { "gradSchemes": { "default": "Gauss linear" } }
        });
        let s = Schedule::from_json(&raw, DuplicatePolicy::LastWins).unwrap();
        let keys: Vec<&str> = s.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["2.5", "1e1"]);
        assert_eq!(s.get(t(10.0)).unwrap().key, "1e1");
    }

    #[test]
    fn test_from_json_rejects_bad_key() {
        let raw = json!({ "later": { "ddtSchemes": { "default": "Euler" } } });
        let err = Schedule::from_json(&raw, DuplicatePolicy::LastWins).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTriggerTime { .. }));
    }

    #[test]
    fn test_from_json_rejects_non_mapping() {
        let err = Schedule::from_json(&json!([]), DuplicatePolicy::LastWins).unwrap_err();
        assert_eq!(err, ConfigError::NotAMapping { found: "array" });
    }

    #[test]
    fn test_duplicate_last_wins() {
        let raw = json!({
            "10": { "ddtSchemes": { "default": "Euler" } },
            "10.0": { "ddtSchemes": { "default": "backward" } }
        });
        let s = Schedule::from_json(&raw, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(s.len(), 1);
        let entry = s.get(t(10.0)).unwrap();
        assert_eq!(entry.key, "10.0");
        assert_eq!(
            entry.patch.section("ddtSchemes").unwrap().get("default").unwrap().as_str(),
            "backward"
        );
    }

    #[test]
    fn test_duplicate_reject() {
        let raw = json!({
            "10": { "ddtSchemes": { "default": "Euler" } },
            "10.0": { "ddtSchemes": { "default": "backward" } }
        });
        let err = Schedule::from_json(&raw, DuplicatePolicy::Reject).unwrap_err();
        assert_eq!(
            err,
            ConfigError::DuplicateTriggerTime {
                time: 10.0,
                first: "10".to_string(),
                second: "10.0".to_string(),
            }
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let raw = json!({ "10": { "ddtSchemes": { "default": "Euler" } } });
        let a = Schedule::from_json(&raw, DuplicatePolicy::LastWins).unwrap();
        let b = Schedule::from_json(&raw, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint(), b.fingerprint());

        let other = json!({ "10": { "ddtSchemes": { "default": "backward" } } });
        let c = Schedule::from_json(&other, DuplicatePolicy::LastWins).unwrap();
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_ne!(a.fingerprint(), Schedule::empty().fingerprint());
    }

    #[test]
    fn test_next_after() {
        let s = sample();
        assert_eq!(s.next_after(HighWaterMark::UNSET), Some(t(5.0)));
        assert_eq!(s.next_after(HighWaterMark::at(t(8.0))), Some(t(10.0)));
        assert_eq!(s.next_after(HighWaterMark::at(t(10.0))), None);
    }

    #[test]
    fn test_store_load_resets_mark() {
        let raw = json!({ "5": { "ddtSchemes": { "default": "Euler" } } });
        let mut store = ScheduleStore::new(DuplicatePolicy::LastWins);
        store.load(&raw).unwrap();
        store.record_applied(t(5.0));
        assert_eq!(store.mark(), HighWaterMark::at(t(5.0)));
        assert_eq!(store.due_entries(6.0).count(), 0);

        store.load(&raw).unwrap();
        assert_eq!(store.mark(), HighWaterMark::UNSET);
        assert_eq!(store.due_entries(6.0).count(), 1);
    }

    #[test]
    fn test_store_failed_load_keeps_state() {
        let good = json!({ "5": { "ddtSchemes": { "default": "Euler" } } });
        let mut store = ScheduleStore::new(DuplicatePolicy::LastWins);
        store.load(&good).unwrap();
        store.record_applied(t(5.0));
        let before = store.schedule().fingerprint();

        let bad = json!({ "soon": {} });
        assert!(store.load(&bad).is_err());
        assert_eq!(store.schedule().fingerprint(), before);
        assert_eq!(store.mark(), HighWaterMark::at(t(5.0)));
    }

    #[test]
    fn test_snapshot_survives_reload() {
        let mut store = ScheduleStore::new(DuplicatePolicy::LastWins);
        store.load(&json!({ "5": {} })).unwrap();
        let snap = store.snapshot();
        store.load(&json!({})).unwrap();
        assert_eq!(snap.len(), 1);
        assert!(store.schedule().is_empty());
    }
}
