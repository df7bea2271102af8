use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Wall clock pinned to the configured business offset.
///
/// Nothing in the service layer reads the process timezone; every local
/// date or time-of-day goes through this type.
#[derive(Debug, Clone, Copy)]
pub struct BusinessClock {
    offset: FixedOffset,
}

impl BusinessClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.offset)
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn yesterday(&self) -> NaiveDate {
        self.today() - Duration::days(1)
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<FixedOffset> {
        instant.with_timezone(&self.offset)
    }

    /// The instant at which the business clock shows `time` on `date`.
    pub fn at(&self, date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
        let local = date.and_time(time);
        let shift = Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&(local - shift))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// UTC+7, the default business offset.
    pub fn jakarta() -> BusinessClock {
        BusinessClock::new(FixedOffset::east_opt(7 * 3600).unwrap())
    }

    pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Instant for a local business time.
    pub fn local(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        jakarta().at(date(y, m, d), NaiveTime::from_hms_opt(h, min, s).unwrap())
    }
}
