//! # schemeswitch - Time-triggered configuration switching for simulations
//!
//! A long-running solver often wants different numerical settings at
//! different stages of a run: a robust first-order time scheme while the flow
//! develops, a second-order one afterwards. schemeswitch holds a schedule of
//! (simulation time → configuration patch) entries and, once per step, merges
//! every patch whose time has been reached into the solver's live
//! configuration.
//!
//! ## Core Concepts
//!
//! - **Trigger time**: the simulation time at which an entry becomes eligible
//! - **Patch**: partial `section → setting → value` overwrites
//! - **High-water mark**: the latest trigger applied; nothing at or below it applies again
//! - **Live configuration**: the host-owned tree, looked up by name each tick
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schemeswitch::{InMemoryRegistry, SchemeSwitcher, StepHook};
//!
//! let mut switcher = SchemeSwitcher::new("schemeSwitcher", registry, &block)?;
//! loop {
//!     clock.advance(dt);
//!     switcher.execute(&clock)?;
//!     // ... solve the step with the (possibly switched) schemes
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod applier;
pub mod audit;
pub mod config;
pub mod error;
pub mod patch;
pub mod registry;
pub mod schedule;
pub mod switcher;
pub mod telemetry;
pub mod time;
pub mod tree;

// Re-export primary types at crate root for convenience
pub use applier::{ApplyOutcome, PatchApplier, SkipReason};
pub use audit::{AuditSink, AuditStream, ChannelSink, SettingChange};
pub use config::{ReloadPolicy, SwitcherOptions};
pub use error::{ConfigError, LookupError, SwitchError, SwitchResult};
pub use patch::{ConfigPatch, SectionPatch, SettingValue};
pub use registry::{ConfigRegistry, InMemoryRegistry, TargetNames};
pub use schedule::{DuplicatePolicy, Schedule, ScheduleEntry, ScheduleFingerprint, ScheduleStore};
pub use switcher::{ManualClock, SchemeSwitcher, SimClock, StepHook, TickReport};
pub use time::{HighWaterMark, TriggerTime};
pub use tree::{ConfigTree, LiveConfig, SectionSlot};
