//! Business calendar date.

use chrono::{Duration, NaiveDate, Utc};

/// "Today" in the business timezone, a fixed UTC offset (UTC+7 by default).
/// Refund eligibility and visit-date passage both count days against it.
#[derive(Debug, Clone, Copy)]
pub enum BusinessClock {
    Offset { hours: i32 },
    Fixed(NaiveDate),
}

impl BusinessClock {
    /// Offsets are clamped to the -12..=14 hours real zones use.
    pub fn with_offset(hours: i32) -> Self {
        BusinessClock::Offset {
            hours: hours.clamp(-12, 14),
        }
    }

    pub fn fixed(date: NaiveDate) -> Self {
        BusinessClock::Fixed(date)
    }

    pub fn today(&self) -> NaiveDate {
        match self {
            BusinessClock::Offset { hours } => {
                let now = Utc::now();
                now.checked_add_signed(Duration::hours(i64::from(*hours)))
                    .unwrap_or(now)
                    .date_naive()
            }
            BusinessClock::Fixed(date) => *date,
        }
    }
}

impl Default for BusinessClock {
    fn default() -> Self {
        BusinessClock::with_offset(7)
    }
}
