use std::{
    collections::{BTreeMap, HashSet},
    sync::Mutex,
};

use async_trait::async_trait;
use chrono::NaiveDate;

use super::{AttendanceStore, DateRange, LeaveStore, Page, QuotaStore};
use crate::{
    error::AppError,
    model::{
        attendance::{AttendanceRecord, Checkout, NewAttendance},
        leave_quota::LeaveQuota,
        leave_request::{LeaveRequest, LeaveStatus, NewLeave},
    },
};

#[derive(Default)]
struct Inner {
    attendances: BTreeMap<u64, AttendanceRecord>,
    leaves: BTreeMap<u64, LeaveRequest>,
    quotas: BTreeMap<(u64, i32), LeaveQuota>,
    active_users: Vec<u64>,

    fail_next_leave_insert: bool,
    fail_close_for: HashSet<u64>,
}

/// In-process store used by the service tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_active_users(users: &[u64]) -> Self {
        let store = Self::default();
        store.inner.lock().unwrap().active_users = users.to_vec();
        store
    }

    pub fn fail_next_leave_insert(&self) {
        self.inner.lock().unwrap().fail_next_leave_insert = true;
    }

    pub fn fail_close_for(&self, id: u64) {
        self.inner.lock().unwrap().fail_close_for.insert(id);
    }

    pub fn attendance(&self, id: u64) -> Option<AttendanceRecord> {
        self.inner.lock().unwrap().attendances.get(&id).cloned()
    }

    pub fn leave_count(&self) -> usize {
        self.inner.lock().unwrap().leaves.len()
    }

    pub fn quota(&self, user_id: u64, year: i32) -> Option<LeaveQuota> {
        self.inner.lock().unwrap().quotas.get(&(user_id, year)).cloned()
    }

    pub fn put_quota(&self, quota: LeaveQuota) {
        self.inner
            .lock()
            .unwrap()
            .quotas
            .insert((quota.user_id, quota.year), quota);
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn find_for_day(
        &self,
        user_id: u64,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .attendances
            .values()
            .find(|r| r.user_id == user_id && r.work_date == work_date)
            .cloned())
    }

    async fn insert(&self, record: NewAttendance) -> Result<AttendanceRecord, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .attendances
            .values()
            .any(|r| r.user_id == record.user_id && r.work_date == record.work_date)
        {
            return Err(AppError::DuplicateCheckIn(record.work_date));
        }

        let id = inner.attendances.len() as u64 + 1;
        let row = AttendanceRecord {
            id,
            user_id: record.user_id,
            work_date: record.work_date,
            check_in_time: record.check_in_time,
            check_in_latitude: record.latitude,
            check_in_longitude: record.longitude,
            check_in_location: record.location,
            check_in_photo_url: record.photo_url,
            check_out_time: None,
            check_out_latitude: None,
            check_out_longitude: None,
            check_out_location: None,
            check_out_photo_url: None,
            required_checkout_time: record.required_checkout_time,
            status: record.status,
            notes: None,
        };
        inner.attendances.insert(id, row.clone());
        Ok(row)
    }

    async fn close(&self, id: u64, checkout: &Checkout) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_close_for.contains(&id) {
            return Err(AppError::Storage(format!("injected failure closing {id}")));
        }
        let Some(row) = inner.attendances.get_mut(&id) else {
            return Ok(false);
        };
        if !row.is_open() {
            return Ok(false);
        }

        row.check_out_time = Some(checkout.time);
        row.check_out_latitude = Some(checkout.latitude);
        row.check_out_longitude = Some(checkout.longitude);
        row.check_out_location = Some(checkout.location.clone());
        row.check_out_photo_url = checkout.photo_url.clone();
        if let Some(status) = checkout.status {
            row.status = status;
        }
        Ok(true)
    }

    async fn find_open_for_day(
        &self,
        work_date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .attendances
            .values()
            .filter(|r| r.work_date == work_date && r.is_open())
            .cloned()
            .collect())
    }

    async fn history(
        &self,
        user_id: u64,
        range: DateRange,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), AppError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<_> = inner
            .attendances
            .values()
            .filter(|r| r.user_id == user_id && range.contains(r.work_date))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.check_in_time.cmp(&a.check_in_time));

        let total = rows.len() as i64;
        let rows = rows
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.per_page as usize)
            .collect();
        Ok((rows, total))
    }
}

#[async_trait]
impl LeaveStore for MemoryStore {
    async fn insert(&self, leave: NewLeave) -> Result<LeaveRequest, AppError> {
        let mut inner = self.inner.lock().unwrap();
        if std::mem::take(&mut inner.fail_next_leave_insert) {
            return Err(AppError::Storage("injected leave insert failure".into()));
        }

        let id = inner.leaves.len() as u64 + 1;
        let row = LeaveRequest {
            id,
            user_id: leave.user_id,
            supervisor_id: leave.supervisor_id,
            leave_type: leave.category.leave_type(),
            category: leave.category,
            start_date: leave.start_date,
            end_date: leave.end_date,
            total_days: leave.total_days,
            reason: leave.reason,
            attachment_url: leave.attachment_url,
            status: LeaveStatus::Pending,
            approved_by_level_1: None,
            approved_at_level_1: None,
            approval_notes_level_1: None,
            approved_by_level_2: None,
            approved_at_level_2: None,
            approval_notes_level_2: None,
            rejected_by: None,
            rejected_at: None,
            rejection_reason: None,
            deducted_from_quota: leave.deducted_from_quota,
            quota_year: leave.quota_year,
            created_at: leave.created_at,
        };
        inner.leaves.insert(id, row.clone());
        Ok(row)
    }

    async fn find(&self, id: u64) -> Result<Option<LeaveRequest>, AppError> {
        Ok(self.inner.lock().unwrap().leaves.get(&id).cloned())
    }

    async fn update_pending(&self, leave: &LeaveRequest) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.leaves.get_mut(&leave.id) {
            Some(row) if row.status == LeaveStatus::Pending => {
                *row = leave.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequest>, AppError> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<_> = inner
            .leaves
            .values()
            .filter(|l| l.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn list_pending_for_supervisor(
        &self,
        supervisor_id: u64,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .leaves
            .values()
            .filter(|l| l.supervisor_id == Some(supervisor_id) && l.status == LeaveStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_active_on(&self, day: NaiveDate) -> Result<Vec<LeaveRequest>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .leaves
            .values()
            .filter(|l| l.status.is_approved() && l.start_date <= day && day <= l.end_date)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl QuotaStore for MemoryStore {
    async fn find(&self, user_id: u64, year: i32) -> Result<Option<LeaveQuota>, AppError> {
        Ok(self.quota(user_id, year))
    }

    async fn insert_if_absent(&self, quota: &LeaveQuota) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        let key = (quota.user_id, quota.year);
        if inner.quotas.contains_key(&key) {
            return Ok(false);
        }
        inner.quotas.insert(key, quota.clone());
        Ok(true)
    }

    async fn save_if_used(
        &self,
        quota: &LeaveQuota,
        expected_used: i32,
    ) -> Result<bool, AppError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.quotas.get_mut(&(quota.user_id, quota.year)) {
            Some(row) if row.used_quota == expected_used => {
                *row = quota.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn active_users_without_quota(&self, year: i32) -> Result<Vec<u64>, AppError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .active_users
            .iter()
            .copied()
            .filter(|u| !inner.quotas.contains_key(&(*u, year)))
            .collect())
    }
}
