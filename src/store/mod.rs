//! Persistence seams for the attendance and leave services.
//!
//! Each trait is a narrow view over one table. `MySqlStore` implements all of
//! them against the production database; tests use `MemoryStore`.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    error::AppError,
    model::{
        attendance::{AttendanceRecord, Checkout, NewAttendance},
        leave_quota::LeaveQuota,
        leave_request::{LeaveRequest, NewLeave},
    },
};

#[cfg(test)]
pub mod memory;
pub mod mysql;

/// 1-based page with a bounded size.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub per_page: u32,
}

impl Page {
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(20).clamp(1, 100),
        }
    }

    pub fn offset(&self) -> u32 {
        (self.page - 1) * self.per_page
    }
}

/// Inclusive range of work dates; open ends are unbounded.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start.is_none_or(|s| day >= s) && self.end.is_none_or(|e| day <= e)
    }
}

#[async_trait]
pub trait AttendanceStore: Send + Sync {
    async fn find_for_day(
        &self,
        user_id: u64,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AppError>;

    /// Fails with `DuplicateCheckIn` when the (user, work date) key is taken.
    async fn insert(&self, record: NewAttendance) -> Result<AttendanceRecord, AppError>;

    /// Closes a record. Returns false when it was already closed.
    async fn close(&self, id: u64, checkout: &Checkout) -> Result<bool, AppError>;

    async fn find_open_for_day(&self, work_date: NaiveDate)
    -> Result<Vec<AttendanceRecord>, AppError>;

    /// Newest check-in first, with the unpaged total.
    async fn history(
        &self,
        user_id: u64,
        range: DateRange,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), AppError>;
}

#[async_trait]
pub trait LeaveStore: Send + Sync {
    async fn insert(&self, leave: NewLeave) -> Result<LeaveRequest, AppError>;

    async fn find(&self, id: u64) -> Result<Option<LeaveRequest>, AppError>;

    /// Writes the decision fields of a request that is still pending.
    /// Returns false when another writer moved it first.
    async fn update_pending(&self, leave: &LeaveRequest) -> Result<bool, AppError>;

    async fn list_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequest>, AppError>;

    async fn list_pending_for_supervisor(
        &self,
        supervisor_id: u64,
    ) -> Result<Vec<LeaveRequest>, AppError>;

    /// Approved requests whose range covers `day`.
    async fn list_active_on(&self, day: NaiveDate) -> Result<Vec<LeaveRequest>, AppError>;
}

#[async_trait]
pub trait QuotaStore: Send + Sync {
    async fn find(&self, user_id: u64, year: i32) -> Result<Option<LeaveQuota>, AppError>;

    /// Returns false when an entry for (user, year) already exists.
    async fn insert_if_absent(&self, quota: &LeaveQuota) -> Result<bool, AppError>;

    /// Saves `quota` only if the stored `used_quota` still equals `expected_used`.
    async fn save_if_used(&self, quota: &LeaveQuota, expected_used: i32)
    -> Result<bool, AppError>;

    async fn active_users_without_quota(&self, year: i32) -> Result<Vec<u64>, AppError>;
}
