//! Time algebra value types.
//!
//! These are plain `Copy` structs. They cross the host boundary by value,
//! never by reference, so they carry no identity and no ownership state.

use serde::{Deserialize, Serialize};

/// A point in time expressed as `value` ticks at `rate` ticks per second.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RationalTime {
    pub value: f64,
    pub rate: f64,
}

impl RationalTime {
    pub fn new(value: f64, rate: f64) -> Self {
        RationalTime { value, rate }
    }

    /// Seconds represented by this time, or 0 when the rate is degenerate.
    pub fn to_seconds(&self) -> f64 {
        if self.rate != 0.0 {
            self.value / self.rate
        } else {
            0.0
        }
    }
}

impl Default for RationalTime {
    fn default() -> Self {
        RationalTime {
            value: 0.0,
            rate: 1.0,
        }
    }
}

/// A half-open interval `[start_time, start_time + duration)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_time: RationalTime,
    pub duration: RationalTime,
}

impl TimeRange {
    pub fn new(start_time: RationalTime, duration: RationalTime) -> Self {
        TimeRange {
            start_time,
            duration,
        }
    }

    pub fn end_time_exclusive(&self) -> RationalTime {
        RationalTime::new(
            self.start_time.value + self.duration.value,
            self.start_time.rate,
        )
    }
}

/// An affine mapping applied to times and ranges: scale about zero, then offset.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeTransform {
    pub offset: RationalTime,
    pub scale: f64,
}

impl TimeTransform {
    pub fn new(offset: RationalTime, scale: f64) -> Self {
        TimeTransform { offset, scale }
    }

    pub fn applied_to(&self, time: RationalTime) -> RationalTime {
        RationalTime::new(time.value * self.scale + self.offset.value, time.rate)
    }
}

impl Default for TimeTransform {
    fn default() -> Self {
        TimeTransform {
            offset: RationalTime::default(),
            scale: 1.0,
        }
    }
}
