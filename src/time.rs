//! Simulation-time types.
//!
//! Trigger times are simulation-clock values, not wall-clock instants. They
//! are finite reals with a total order so they can key an ordered map; the
//! high-water mark tracks the latest trigger time whose patch has been fully
//! applied.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A finite simulation time at which a schedule entry becomes eligible.
///
/// `-0.0` is normalized to `0.0` so equal times always compare and hash
/// equal.
///
/// # Examples
///
/// ```
/// use schemeswitch::TriggerTime;
///
/// let t: TriggerTime = "10.0".parse().unwrap();
/// assert_eq!(t, TriggerTime::new(10.0).unwrap());
/// assert!("nan".parse::<TriggerTime>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct TriggerTime(f64);

impl TriggerTime {
    /// Creates a trigger time, returning `None` for NaN or infinities.
    #[must_use]
    pub fn new(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // Collapse -0.0 so ordering and hashing agree with `==`.
        Some(Self(if value == 0.0 { 0.0 } else { value }))
    }

    /// Returns the raw simulation time.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns true if a clock reading of `current_time` has reached this trigger.
    #[must_use]
    pub fn is_reached_by(self, current_time: f64) -> bool {
        current_time >= self.0
    }
}

impl PartialEq for TriggerTime {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for TriggerTime {}

impl PartialOrd for TriggerTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TriggerTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for TriggerTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for TriggerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TriggerTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed: f64 = s.trim().parse().map_err(|_| ConfigError::InvalidTriggerTime {
            key: s.to_string(),
        })?;
        Self::new(parsed).ok_or_else(|| ConfigError::NonFiniteTriggerTime { key: s.to_string() })
    }
}

impl TryFrom<f64> for TriggerTime {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| ConfigError::NonFiniteTriggerTime {
            key: value.to_string(),
        })
    }
}

impl From<TriggerTime> for f64 {
    fn from(t: TriggerTime) -> Self {
        t.0
    }
}

/// The trigger time of the most recently applied schedule entry.
///
/// Starts unset, which behaves as negative infinity: every trigger time is
/// above it. Only moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HighWaterMark(Option<TriggerTime>);

impl HighWaterMark {
    /// The initial mark, below every trigger time.
    pub const UNSET: Self = Self(None);

    /// A mark already at `t`.
    #[must_use]
    pub const fn at(t: TriggerTime) -> Self {
        Self(Some(t))
    }

    /// The trigger time this mark sits at, if anything was applied.
    #[must_use]
    pub const fn get(self) -> Option<TriggerTime> {
        self.0
    }

    /// The mark as a raw time; negative infinity while unset.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0.map_or(f64::NEG_INFINITY, TriggerTime::value)
    }

    /// Returns true if an entry at `t` has not been passed by this mark yet.
    #[must_use]
    pub fn admits(self, t: TriggerTime) -> bool {
        match self.0 {
            Some(mark) => t > mark,
            None => true,
        }
    }

    /// Moves the mark up to `t`. A lower `t` leaves the mark where it is.
    pub fn advance(&mut self, t: TriggerTime) {
        if self.admits(t) {
            self.0 = Some(t);
        }
    }
}

impl fmt::Display for HighWaterMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(t) => write!(f, "{t}"),
            None => write!(f, "-inf"),
        }
    }
}
