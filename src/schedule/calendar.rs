use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, Result};

/// accrual window of a single period, both ends inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccrualWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl AccrualWindow {
    /// actual elapsed days
    pub fn days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1).max(0) as u32
    }
}

/// maps period indexes to accrual windows and charge dates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingCalendar {
    signing_date: NaiveDate,
    charge_day: u32,
    charge_in_arrears: bool,
}

impl BillingCalendar {
    pub fn new(signing_date: NaiveDate, charge_day: u8, charge_in_arrears: bool) -> Result<Self> {
        if !(1..=31).contains(&charge_day) {
            return Err(EngineError::validation(
                "charge_day_of_month",
                format!("{} is not between 1 and 31", charge_day),
            ));
        }
        Ok(Self {
            signing_date,
            charge_day: charge_day as u32,
            charge_in_arrears,
        })
    }

    /// accrual month of period 0 is the signing month
    pub fn accrual_window(&self, index: u32) -> Result<AccrualWindow> {
        let month_start = add_months(first_of_month(self.signing_date), index)?;
        let end = last_of_month(month_start)?;
        let start = if index == 0 { self.signing_date } else { month_start };
        Ok(AccrualWindow { start, end })
    }

    /// charge date of period `index`, clipped to the month length
    pub fn charge_date(&self, index: u32) -> Result<NaiveDate> {
        let window = self.accrual_window(index)?;
        let charge_month = if self.charge_in_arrears {
            add_months(first_of_month(window.end), 1)?
        } else {
            first_of_month(window.end)
        };
        let date = clip_day(charge_month.year(), charge_month.month(), self.charge_day)?;

        // same-month charging never bills before the loan exists
        if date < window.start {
            return Ok(window.end);
        }
        Ok(date)
    }

    /// index of the first period charged strictly after `date`
    pub fn first_period_charged_after(&self, date: NaiveDate, term: u32) -> Result<Option<u32>> {
        for index in 0..term {
            if self.charge_date(index)? > date {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }
}

/// `day` clipped to the last valid day of the month
pub fn clip_day(year: i32, month: u32, day: u32) -> Result<NaiveDate> {
    let last = days_in_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.clamp(1, last)).ok_or_else(|| EngineError::InvalidDate {
        message: format!("{}-{:02}-{:02}", year, month, day),
    })
}

/// real calendar length of a month
pub fn days_in_month(year: i32, month: u32) -> Result<u32> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| EngineError::InvalidDate {
        message: format!("{}-{:02}", year, month),
    })?;
    Ok(last_of_month(first)?.day())
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> Result<NaiveDate> {
    let next = add_months(first_of_month(date), 1)?;
    next.pred_opt().ok_or_else(|| EngineError::InvalidDate {
        message: format!("no day before {}", next),
    })
}

/// calendar month arithmetic, clipping to the end of shorter months
pub fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| EngineError::InvalidDate {
            message: format!("{} + {} months is out of range", date, months),
        })
}
