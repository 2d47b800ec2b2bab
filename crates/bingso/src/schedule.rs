//! Funeral schedule calculator.
//!
//! Given the time of death (or, failing that, the room check-in time) and
//! the length of the funeral in days, derives the procession, checkout,
//! casketing and shrouding times.

use chrono::{Days, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{wall_clock, FuneralRecord};

/// Longest funeral the calculator accepts.
pub const MAX_DAYS: u32 = 10;

const PROCESSION_HOUR: u32 = 7;
const CASKET_HOUR: u32 = 14;
const SHROUD_HOUR: u32 = 11;

/// Inputs to the calculator, as posted by the room form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleRequest {
    /// Time of death.
    #[serde(with = "wall_clock::option")]
    pub death_time: Option<NaiveDateTime>,
    /// Room check-in time, used when the time of death is unknown.
    #[serde(with = "wall_clock::option")]
    pub placement_time: Option<NaiveDateTime>,
    /// Funeral length in days (3일장, 4일장, ...).
    pub days: u32,
}

/// Derived schedule times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Procession (발인).
    #[serde(with = "wall_clock::option")]
    pub funeral_time: Option<NaiveDateTime>,
    /// Room checkout, same as the procession.
    #[serde(with = "wall_clock::option")]
    pub checkout_time: Option<NaiveDateTime>,
    /// Casketing (입관), the afternoon before.
    #[serde(with = "wall_clock::option")]
    pub casket_time: Option<NaiveDateTime>,
    /// Shrouding (염습), the morning before.
    #[serde(with = "wall_clock::option")]
    pub shroud_time: Option<NaiveDateTime>,
}

fn at_hour(date: chrono::NaiveDate, hour: u32) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN))
}

impl ScheduleRequest {
    /// The reference time: death time, else check-in time.
    #[must_use]
    pub fn base_time(&self) -> Option<NaiveDateTime> {
        self.death_time.or(self.placement_time)
    }

    /// Compute the schedule.
    ///
    /// # Errors
    ///
    /// Returns a validation error when neither reference time is set, when
    /// `days` is outside `1..=MAX_DAYS`, or when the date overflows.
    pub fn compute(&self) -> Result<Schedule> {
        let base = self.base_time().ok_or_else(|| {
            Error::validation("set the time of death or the check-in time first")
        })?;
        if self.days == 0 || self.days > MAX_DAYS {
            return Err(Error::validation(format!(
                "funeral length must be between 1 and {MAX_DAYS} days"
            )));
        }

        let procession_date = base
            .date()
            .checked_add_days(Days::new(u64::from(self.days)))
            .ok_or_else(|| Error::validation("funeral date out of range"))?;
        let eve = procession_date
            .pred_opt()
            .ok_or_else(|| Error::validation("funeral date out of range"))?;

        let funeral_time = at_hour(procession_date, PROCESSION_HOUR);
        Ok(Schedule {
            funeral_time: Some(funeral_time),
            checkout_time: Some(funeral_time),
            casket_time: Some(at_hour(eve, CASKET_HOUR)),
            shroud_time: Some(at_hour(eve, SHROUD_HOUR)),
        })
    }
}

impl Schedule {
    /// Copy the computed times onto a record.
    pub fn apply_to(&self, record: &mut FuneralRecord) {
        record.funeral_time = self.funeral_time;
        record.checkout_time = self.checkout_time;
        record.casket_time = self.casket_time;
        record.shroud_time = self.shroud_time;
    }
}
