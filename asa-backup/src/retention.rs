//! Retention slot naming.
//!
//! A run is filed under a slot derived from its date alone:
//!
//! | Date               | Slot               |
//! |--------------------|--------------------|
//! | 1st of January     | `yearly_<year>`    |
//! | 1st of any month   | `monthly_<month>`  |
//! | any other day      | `daily_<weekday>`  |
//!
//! Weekdays count from Monday = 0. Running once a day keeps at most seven
//! daily, twelve monthly and one yearly slot per year; older runs are
//! overwritten by name.

use chrono::Datelike;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetentionSlot(String);

impl RetentionSlot {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RetentionSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map a timestamp to its retention slot.
pub fn retention_slot<T: Datelike>(ts: &T) -> RetentionSlot {
    let name = match (ts.day(), ts.month()) {
        (1, 1) => format!("yearly_{}", ts.year()),
        (1, month) => format!("monthly_{}", month),
        _ => format!("daily_{}", ts.weekday().num_days_from_monday()),
    };
    RetentionSlot(name)
}
