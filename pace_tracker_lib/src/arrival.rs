use std::{fmt, str::FromStr};

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TripError;

// Longest forward clock change searched past
const MAX_GAP_MINUTES: i64 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Meridiem {
    Am,
    Pm,
}

/// The wall-clock time a driver asks to arrive at, without a date.
///
/// Stored as a 24-hour time of day. The date is only fixed when it is resolved
/// against the current instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalSpec {
    hour: u32,
    minute: u32,
    second: u32,
}

impl ArrivalSpec {
    pub fn new(hour: u32, minute: u32, second: u32) -> Result<Self, TripError> {
        if hour > 23 {
            return Err(TripError::InvalidArrivalSpec(format!("hour {hour} is out of range")));
        }
        if minute > 59 {
            return Err(TripError::InvalidArrivalSpec(format!("minute {minute} is out of range")));
        }
        if second > 59 {
            return Err(TripError::InvalidArrivalSpec(format!("second {second} is out of range")));
        }

        Ok(Self { hour, minute, second })
    }

    /// 12-hour clock: 12 AM is midnight, 12 PM is noon.
    pub fn from_12h(hour: u32, minute: u32, second: u32, meridiem: Meridiem) -> Result<Self, TripError> {
        if !(1..=12).contains(&hour) {
            return Err(TripError::InvalidArrivalSpec(format!("hour {hour} is not on a 12-hour clock")));
        }

        let hour = match (meridiem, hour) {
            (Meridiem::Am, 12) => 0,
            (Meridiem::Am, h) => h,
            (Meridiem::Pm, 12) => 12,
            (Meridiem::Pm, h) => h + 12,
        };

        Self::new(hour, minute, second)
    }

    /// Accepts `"h:mm"`, `"h:mm:ss"`, each optionally followed by `AM`/`PM`.
    /// Without a meridiem the hour is read on a 24-hour clock.
    pub fn parse(text: &str) -> Result<Self, TripError> {
        let invalid = || TripError::InvalidArrivalSpec(format!("cannot read {text:?} as a time of day"));

        let lower = text.trim().to_ascii_lowercase();
        let (clock, meridiem) = if let Some(rest) = lower.strip_suffix("am") {
            (rest.trim_end(), Some(Meridiem::Am))
        } else if let Some(rest) = lower.strip_suffix("pm") {
            (rest.trim_end(), Some(Meridiem::Pm))
        } else {
            (lower.as_str(), None)
        };

        let parts = clock
            .split(':')
            .map(str::trim)
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                part.parse::<u32>().map_err(|_| invalid())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let (hour, minute, second) = match parts.as_slice() {
            [h, m] => (*h, *m, 0),
            [h, m, s] => (*h, *m, *s),
            _ => return Err(invalid()),
        };

        match meridiem {
            Some(meridiem) => Self::from_12h(hour, minute, second, meridiem),
            None => Self::new(hour, minute, second),
        }
    }

    pub fn time_of_day(&self) -> NaiveTime {
        // Fields are validated on construction
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second).unwrap_or_default()
    }

    /// Fixes the next occurrence of this time of day strictly after `now`.
    ///
    /// A time at or before `now` on today's date rolls over to tomorrow. A
    /// time skipped by a forward clock change becomes the first minute after
    /// the change, and one that occurs twice is read as the earlier one.
    pub fn resolve<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<DateTime<Utc>, TripError> {
        let today = now.date_naive();

        if let Some(candidate) = self.on_date(today, &now.timezone()) {
            if candidate > *now {
                return Ok(candidate.with_timezone(&Utc));
            }
        }

        let tomorrow = today
            .succ_opt()
            .ok_or_else(|| TripError::InvalidArrivalSpec("date out of range".into()))?;

        self.on_date(tomorrow, &now.timezone())
            .map(|candidate| candidate.with_timezone(&Utc))
            .ok_or_else(|| TripError::InvalidArrivalSpec(format!("{self} does not exist in the local time zone")))
    }

    fn on_date<Tz: TimeZone>(&self, date: NaiveDate, tz: &Tz) -> Option<DateTime<Tz>> {
        let local = date.and_time(self.time_of_day());
        if let Some(at) = tz.from_local_datetime(&local).earliest() {
            return Some(at);
        }

        let minute = local.with_second(0)?;
        (1..=MAX_GAP_MINUTES).find_map(|minutes| {
            let later = minute.checked_add_signed(TimeDelta::minutes(minutes))?;
            tz.from_local_datetime(&later).earliest()
        })
    }
}

impl FromStr for ArrivalSpec {
    type Err = TripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ArrivalSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

/// The time zone arrival times are read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArrivalZone {
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl ArrivalZone {
    pub fn resolve(&self, arrival: &ArrivalSpec, now: DateTime<Utc>) -> Result<DateTime<Utc>, TripError> {
        match self {
            ArrivalZone::Local => arrival.resolve(&now.with_timezone(&Local)),
            ArrivalZone::Fixed(offset) => arrival.resolve(&now.with_timezone(offset)),
        }
    }
}
