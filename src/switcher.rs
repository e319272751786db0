//! Per-step orchestration.
//!
//! The host drives a `SchemeSwitcher` through the `StepHook` lifecycle:
//! `read` when its configuration is (re)loaded, `execute` once per
//! simulation step, `write` when the host writes output. Each `execute`:
//!
//! 1. asks the schedule for entries due at the current time,
//! 2. returns immediately if there are none (no lookup, no side effects),
//! 3. otherwise resolves the live configuration once, locks it, and applies
//!    every due entry oldest first, advancing the high-water mark right after
//!    each entry is applied.

use std::cell::Cell;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::applier::{PatchApplier, SkipReason};
use crate::audit::{AuditSink, SettingChange};
use crate::config::{schedule_block, ReloadPolicy, SwitcherOptions};
use crate::error::{ConfigError, SwitchError, SwitchResult};
use crate::registry::ConfigRegistry;
use crate::schedule::{Schedule, ScheduleStore};
use crate::time::{HighWaterMark, TriggerTime};

/// Source of the current simulation time.
pub trait SimClock {
    /// The simulation time of the step being executed.
    fn current_time(&self) -> f64;
}

impl SimClock for f64 {
    fn current_time(&self) -> f64 {
        *self
    }
}

/// A clock the driver advances by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    /// A clock reading `start`.
    #[must_use]
    pub fn new(start: f64) -> Self {
        Self { now: Cell::new(start) }
    }

    /// Moves the clock forward by `dt` and returns the new time.
    pub fn advance(&self, dt: f64) -> f64 {
        let next = self.now.get() + dt;
        self.now.set(next);
        next
    }

    /// Sets the clock to `t`.
    pub fn set(&self, t: f64) {
        self.now.set(t);
    }
}

impl SimClock for ManualClock {
    fn current_time(&self) -> f64 {
        self.now.get()
    }
}

/// Lifecycle a host simulation drives once per step.
pub trait StepHook {
    /// What `execute` reports back.
    type Report;

    /// Instance name, as configured by the host.
    fn name(&self) -> &str;

    /// Loads or reloads configuration.
    fn read(&mut self, block: &Value) -> SwitchResult<()>;

    /// Runs one simulation step.
    fn execute(&mut self, clock: &dyn SimClock) -> SwitchResult<Self::Report>;

    /// Writes output.
    fn write(&mut self) -> SwitchResult<()>;
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Simulation time of the tick.
    pub time: f64,
    /// Trigger times of the entries applied, ascending.
    pub applied: Vec<TriggerTime>,
    /// Every setting written, in order.
    pub changes: Vec<SettingChange>,
    /// Patch sections that found no section to write into.
    pub skipped: Vec<(TriggerTime, String, SkipReason)>,
}

impl TickReport {
    fn idle(time: f64) -> Self {
        Self {
            time,
            applied: Vec::new(),
            changes: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Returns true if no entry was due.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.applied.is_empty()
    }

    /// Number of schedule entries applied.
    #[must_use]
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    /// Number of settings written.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.changes.len()
    }
}

/// Switches live configuration settings at scheduled simulation times.
///
/// # Examples
///
/// ```
/// use schemeswitch::{ConfigTree, InMemoryRegistry, SchemeSwitcher};
/// use serde_json::json;
///
/// let live = ConfigTree::from_json(json!({ "ddtSchemes": { "default": "steadyState" } }))
///     .unwrap()
///     .into_live();
/// let registry = InMemoryRegistry::new();
/// registry.register("region0", live.clone());
///
/// let block = json!({ "schemeSwitch": { "10": { "ddtSchemes": { "default": "Euler" } } } });
/// let mut switcher = SchemeSwitcher::new("switch", registry, &block).unwrap();
///
/// assert!(switcher.tick(5.0).unwrap().is_idle());
/// assert_eq!(switcher.tick(10.0).unwrap().change_count(), 1);
/// assert_eq!(live.lock().unwrap().setting_str("ddtSchemes", "default"), Some("Euler"));
/// ```
#[derive(Debug)]
pub struct SchemeSwitcher<R> {
    name: String,
    registry: R,
    options: SwitcherOptions,
    store: ScheduleStore,
    applier: PatchApplier,
}

impl<R: ConfigRegistry> SchemeSwitcher<R> {
    /// Constructs a switcher and reads `block` into it.
    ///
    /// # Errors
    ///
    /// Returns `SwitchError::Config` if `block` is not a valid configuration.
    pub fn new(name: impl Into<String>, registry: R, block: &Value) -> SwitchResult<Self> {
        let mut switcher = Self::with_schedule(name, registry, SwitcherOptions::default(), Schedule::empty());
        switcher.reload(block)?;
        Ok(switcher)
    }

    /// Constructs a switcher from an already-built schedule.
    pub fn with_schedule(
        name: impl Into<String>,
        registry: R,
        options: SwitcherOptions,
        schedule: Schedule,
    ) -> Self {
        let mut store = ScheduleStore::new(options.duplicates);
        store.replace(schedule, true);
        Self {
            name: name.into(),
            registry,
            options,
            store,
            applier: PatchApplier::new(),
        }
    }

    /// Attaches an audit sink that receives every setting change.
    pub fn add_sink(&mut self, sink: Arc<dyn AuditSink>) {
        self.applier.add_sink(sink);
    }

    /// Replaces schedule and options from a configuration block.
    ///
    /// On error the previous schedule, options and high-water mark stay in
    /// effect.
    ///
    /// # Errors
    ///
    /// Returns `SwitchError::Config` if the block, its options or its
    /// schedule are malformed.
    pub fn reload(&mut self, block: &Value) -> SwitchResult<()> {
        let parsed = SwitcherOptions::from_block(block).and_then(|options| {
            let schedule = Schedule::from_json(schedule_block(block)?, options.duplicates)?;
            Ok::<_, ConfigError>((options, schedule))
        });

        let (options, schedule) = match parsed {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(name = %self.name, error = %err, "Rejected schedule reload");
                return Err(err.into());
            }
        };

        if schedule.fingerprint() == self.store.schedule().fingerprint() {
            debug!(name = %self.name, "Reloaded schedule is unchanged");
        }
        self.store.set_policy(options.duplicates);
        self.store.replace(schedule, options.on_reload == ReloadPolicy::Reset);
        self.options = options;
        Ok(())
    }

    /// Applies every entry due at `current_time`.
    ///
    /// # Errors
    ///
    /// Returns `SwitchError::Lookup` if entries are due but the live
    /// configuration cannot be found; nothing is applied and the mark does
    /// not move. Returns `SwitchError::Internal` if the live configuration's
    /// lock is poisoned.
    pub fn tick(&mut self, current_time: f64) -> SwitchResult<TickReport> {
        let schedule = self.store.snapshot();
        let mut due = schedule.due_entries(current_time, self.store.mark()).peekable();
        if due.peek().is_none() {
            debug!(name = %self.name, time = current_time, "No scheme switch due");
            return Ok(TickReport::idle(current_time));
        }

        let live = self.options.target_names().resolve(&self.registry)?;
        let mut tree = live
            .lock()
            .map_err(|_| SwitchError::internal("poisoned lock: live configuration"))?;

        let mut report = TickReport::idle(current_time);
        for entry in due {
            let outcome = self.applier.apply(current_time, entry, &mut tree);
            self.store.record_applied(entry.trigger);

            info!(
                name = %self.name,
                time = current_time,
                trigger = %entry.trigger,
                settings = outcome.applied_count(),
                "Applied scheme switch"
            );
            report.applied.push(entry.trigger);
            report.changes.extend(outcome.changes);
            report
                .skipped
                .extend(outcome.skipped.into_iter().map(|(section, reason)| (entry.trigger, section, reason)));
        }
        Ok(report)
    }

    /// The high-water mark.
    #[must_use]
    pub fn high_water_mark(&self) -> HighWaterMark {
        self.store.mark()
    }

    /// The earliest trigger time that has not been applied yet.
    #[must_use]
    pub fn next_trigger(&self) -> Option<TriggerTime> {
        self.store.schedule().next_after(self.store.mark())
    }

    /// The current schedule.
    #[must_use]
    pub fn schedule(&self) -> &Schedule {
        self.store.schedule()
    }

    /// The options in effect.
    #[must_use]
    pub fn options(&self) -> &SwitcherOptions {
        &self.options
    }

    /// The registry live configurations are looked up in.
    #[must_use]
    pub fn registry(&self) -> &R {
        &self.registry
    }
}

impl<R: ConfigRegistry> StepHook for SchemeSwitcher<R> {
    type Report = TickReport;

    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, block: &Value) -> SwitchResult<()> {
        self.reload(block)
    }

    fn execute(&mut self, clock: &dyn SimClock) -> SwitchResult<TickReport> {
        self.tick(clock.current_time())
    }

    fn write(&mut self) -> SwitchResult<()> {
        Ok(())
    }
}
