use std::sync::Arc;

use chrono::NaiveDate;

use crate::{error::AppError, service::holiday::HolidayCalendar};

/// Working days and holidays of one inclusive range.
#[derive(Debug, Default, PartialEq)]
pub struct DayTally {
    pub working_days: u32,
    /// Ascending, weekends included.
    pub holidays: Vec<NaiveDate>,
}

/// Counts leave days over inclusive date ranges.
#[derive(Clone)]
pub struct WorkingDaysCounter {
    calendar: Arc<HolidayCalendar>,
    max_span_days: u32,
}

impl WorkingDaysCounter {
    pub fn new(calendar: Arc<HolidayCalendar>, max_span_days: u32) -> Self {
        Self {
            calendar,
            max_span_days,
        }
    }

    pub fn calendar(&self) -> &HolidayCalendar {
        &self.calendar
    }

    /// Rejects reversed ranges and ranges longer than `max_span_days`.
    pub fn check_span(&self, start: NaiveDate, end: NaiveDate) -> Result<(), AppError> {
        if end < start {
            return Err(AppError::InvalidRange);
        }
        let span = (end - start).num_days() + 1;
        if span > i64::from(self.max_span_days) {
            return Err(AppError::RangeTooLong {
                days: span,
                limit: self.max_span_days,
            });
        }
        Ok(())
    }

    /// Walks `start..=end` once, collecting working days and holidays.
    pub async fn tally(&self, start: NaiveDate, end: NaiveDate) -> Result<DayTally, AppError> {
        self.check_span(start, end)?;

        let mut tally = DayTally::default();
        for day in start.iter_days().take_while(|d| *d <= end) {
            if self.calendar.is_holiday(day).await {
                tally.holidays.push(day);
            } else if !HolidayCalendar::is_weekend(day) {
                tally.working_days += 1;
            }
        }
        Ok(tally)
    }

    /// Days in `start..=end` that are neither weekend nor holiday; 0 for a
    /// reversed or oversized range.
    pub async fn count(&self, start: NaiveDate, end: NaiveDate) -> u32 {
        self.tally(start, end)
            .await
            .map(|t| t.working_days)
            .unwrap_or_default()
    }

    /// Holidays falling in `start..=end`, ascending.
    pub async fn holidays_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        self.tally(start, end)
            .await
            .map(|t| t.holidays)
            .unwrap_or_default()
    }
}
