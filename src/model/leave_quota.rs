use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Annual leave balance of one user for one year.
///
/// `used_quota + remaining_quota == total_quota` holds after every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveQuota {
    #[schema(example = 42)]
    pub user_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
    #[schema(example = 12)]
    pub total_quota: i32,
    #[schema(example = 3)]
    pub used_quota: i32,
    #[schema(example = 9)]
    pub remaining_quota: i32,
}

impl LeaveQuota {
    pub fn fresh(user_id: u64, year: i32, total: i32) -> Self {
        Self {
            user_id,
            year,
            total_quota: total,
            used_quota: 0,
            remaining_quota: total,
        }
    }

    /// Takes `days` from the balance. Leaves the entry untouched and returns
    /// false when the balance can't cover it.
    pub fn deduct(&mut self, days: i32) -> bool {
        if days < 0 || self.remaining_quota < days {
            return false;
        }
        self.used_quota += days;
        self.remaining_quota -= days;
        true
    }

    /// Gives `days` back, never beyond `total_quota`. Returns how many days
    /// did not fit.
    pub fn restore(&mut self, days: i32) -> i32 {
        let days = days.max(0);
        let restored = days.min(self.used_quota);
        self.used_quota -= restored;
        self.remaining_quota += restored;
        days - restored
    }

    pub fn percentage_used(&self) -> f64 {
        if self.total_quota <= 0 {
            return 0.0;
        }
        let pct = f64::from(self.used_quota) / f64::from(self.total_quota) * 100.0;
        (pct * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_balanced(q: &LeaveQuota) {
        assert_eq!(q.used_quota + q.remaining_quota, q.total_quota);
        assert!(q.remaining_quota >= 0 && q.remaining_quota <= q.total_quota);
    }

    #[test]
    fn deduct_is_all_or_nothing() {
        let mut q = LeaveQuota::fresh(1, 2026, 12);
        assert!(q.deduct(5));
        assert!(!q.deduct(8));
        assert_eq!(q.remaining_quota, 7);
        assert_eq!(q.used_quota, 5);
        assert_balanced(&q);
    }

    #[test]
    fn restore_returns_deducted_days() {
        let mut q = LeaveQuota::fresh(1, 2026, 12);
        assert!(q.deduct(5));
        assert_eq!(q.restore(5), 0);
        assert_eq!(q.remaining_quota, 12);
        assert_balanced(&q);
    }

    #[test]
    fn restore_never_exceeds_total() {
        let mut q = LeaveQuota::fresh(1, 2026, 12);
        assert!(q.deduct(3));
        assert_eq!(q.restore(5), 2);
        assert_eq!(q.remaining_quota, 12);
        assert_eq!(q.used_quota, 0);
        assert_balanced(&q);
    }

    #[test]
    fn percentage_is_rounded() {
        let mut q = LeaveQuota::fresh(1, 2026, 12);
        q.deduct(1);
        assert_eq!(q.percentage_used(), 8.33);
        assert_eq!(LeaveQuota::fresh(1, 2026, 0).percentage_used(), 0.0);
    }
}
