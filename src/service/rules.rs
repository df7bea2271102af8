use chrono::{DateTime, NaiveTime, Utc};

use crate::{model::attendance::AttendanceStatus, service::clock::BusinessClock};

const fn hms(h: u32, m: u32, s: u32) -> NaiveTime {
    match NaiveTime::from_hms_opt(h, m, s) {
        Some(t) => t,
        None => panic!("invalid time constant"),
    }
}

/// Latest check-in that still counts as on time (inclusive).
pub const ON_TIME_CUTOFF: NaiveTime = hms(7, 30, 0);
pub const ON_TIME_CHECKOUT: NaiveTime = hms(17, 0, 0);
pub const LATE_CHECKOUT: NaiveTime = hms(19, 0, 0);

/// Derives lateness and the earliest allowed check-out from a check-in time.
#[derive(Debug, Clone, Copy)]
pub struct AttendanceRules {
    clock: BusinessClock,
}

impl AttendanceRules {
    pub fn new(clock: BusinessClock) -> Self {
        Self { clock }
    }

    fn is_on_time(&self, check_in: DateTime<Utc>) -> bool {
        self.clock.local(check_in).time() <= ON_TIME_CUTOFF
    }

    pub fn status_for(&self, check_in: DateTime<Utc>) -> AttendanceStatus {
        if self.is_on_time(check_in) {
            AttendanceStatus::OnTime
        } else {
            AttendanceStatus::Late
        }
    }

    /// 17:00 for on-time arrivals, 19:00 otherwise, on the check-in's local day.
    pub fn required_checkout(&self, check_in: DateTime<Utc>) -> DateTime<Utc> {
        let day = self.clock.local(check_in).date_naive();
        let at = if self.is_on_time(check_in) {
            ON_TIME_CHECKOUT
        } else {
            LATE_CHECKOUT
        };
        self.clock.at(day, at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::clock::test_support::{jakarta, local};

    fn rules() -> AttendanceRules {
        AttendanceRules::new(jakarta())
    }

    #[test]
    fn check_in_at_cutoff_is_on_time() {
        let t = local(2026, 3, 2, 7, 30, 0);
        assert_eq!(rules().status_for(t), AttendanceStatus::OnTime);
        assert_eq!(rules().required_checkout(t), local(2026, 3, 2, 17, 0, 0));
    }

    #[test]
    fn one_second_after_cutoff_is_late() {
        let t = local(2026, 3, 2, 7, 30, 1);
        assert_eq!(rules().status_for(t), AttendanceStatus::Late);
        assert_eq!(rules().required_checkout(t), local(2026, 3, 2, 19, 0, 0));
    }

    #[test]
    fn mid_morning_check_in_is_late() {
        let t = local(2026, 3, 2, 10, 0, 0);
        assert_eq!(rules().status_for(t), AttendanceStatus::Late);
        assert_eq!(rules().required_checkout(t), local(2026, 3, 2, 19, 0, 0));
    }

    #[test]
    fn early_morning_uses_local_day() {
        // 06:00 local is 23:00 UTC the previous day.
        let t = local(2026, 3, 2, 6, 0, 0);
        assert_eq!(rules().status_for(t), AttendanceStatus::OnTime);
        assert_eq!(rules().required_checkout(t), local(2026, 3, 2, 17, 0, 0));
    }
}
