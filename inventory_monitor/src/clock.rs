//! Wall clock of the station
//!
//! Snapshot timestamps and the aggregation day are local times. Without a
//! configured zone the host's local time is used.

use chrono::{Local, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StationClock {
    tz: Option<Tz>,
}

impl StationClock {
    pub fn new(tz: Option<Tz>) -> Self {
        Self { tz }
    }

    /// Current local date and time at the station
    pub fn now(&self) -> NaiveDateTime {
        match self.tz {
            Some(tz) => Utc::now().with_timezone(&tz).naive_local(),
            None => Local::now().naive_local(),
        }
    }

    /// Current local date at the station
    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }

    pub fn describe(&self) -> String {
        match self.tz {
            Some(tz) => tz.name().to_string(),
            None => "host local time".to_string(),
        }
    }
}
