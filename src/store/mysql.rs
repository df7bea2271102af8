use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use super::{AttendanceStore, DateRange, LeaveStore, Page, QuotaStore};
use crate::{
    error::AppError,
    model::{
        attendance::{AttendanceRecord, Checkout, NewAttendance},
        leave_quota::LeaveQuota,
        leave_request::{LeaveRequest, LeaveStatus, NewLeave},
    },
};

const ATTENDANCE_COLUMNS: &str = r#"
    id, user_id, work_date,
    check_in_time, check_in_latitude, check_in_longitude, check_in_location, check_in_photo_url,
    check_out_time, check_out_latitude, check_out_longitude, check_out_location, check_out_photo_url,
    required_checkout_time, status, notes
"#;

const LEAVE_COLUMNS: &str = r#"
    id, user_id, supervisor_id, leave_type, category, start_date, end_date, total_days,
    reason, attachment_url, status,
    approved_by_level_1, approved_at_level_1, approval_notes_level_1,
    approved_by_level_2, approved_at_level_2, approval_notes_level_2,
    rejected_by, rejected_at, rejection_reason,
    deducted_from_quota, quota_year, created_at
"#;

fn is_duplicate_key(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23000"))
}

/// MySQL-backed implementation of every store trait.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn attendance_by_id(&self, id: u64) -> Result<AttendanceRecord, AppError> {
        let sql = format!("SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE id = ?");
        Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn find_for_day(
        &self,
        user_id: u64,
        work_date: NaiveDate,
    ) -> Result<Option<AttendanceRecord>, AppError> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = ? AND work_date = ?"
        );
        Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(user_id)
            .bind(work_date)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert(&self, record: NewAttendance) -> Result<AttendanceRecord, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO attendances (
                user_id, work_date, check_in_time, check_in_latitude, check_in_longitude,
                check_in_location, check_in_photo_url, required_checkout_time, status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.user_id)
        .bind(record.work_date)
        .bind(record.check_in_time)
        .bind(record.latitude)
        .bind(record.longitude)
        .bind(&record.location)
        .bind(&record.photo_url)
        .bind(record.required_checkout_time)
        .bind(record.status.as_ref())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => self.attendance_by_id(done.last_insert_id()).await,
            Err(e) if is_duplicate_key(&e) => Err(AppError::DuplicateCheckIn(record.work_date)),
            Err(e) => Err(e.into()),
        }
    }

    async fn close(&self, id: u64, checkout: &Checkout) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE attendances
            SET check_out_time = ?,
                check_out_latitude = ?,
                check_out_longitude = ?,
                check_out_location = ?,
                check_out_photo_url = ?,
                status = COALESCE(?, status),
                updated_at = NOW()
            WHERE id = ?
              AND check_out_time IS NULL
            "#,
        )
        .bind(checkout.time)
        .bind(checkout.latitude)
        .bind(checkout.longitude)
        .bind(&checkout.location)
        .bind(&checkout.photo_url)
        .bind(checkout.status.map(|s| s.as_ref().to_string()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_open_for_day(
        &self,
        work_date: NaiveDate,
    ) -> Result<Vec<AttendanceRecord>, AppError> {
        let sql = format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances \
             WHERE work_date = ? AND check_out_time IS NULL ORDER BY id"
        );
        Ok(sqlx::query_as::<_, AttendanceRecord>(&sql)
            .bind(work_date)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn history(
        &self,
        user_id: u64,
        range: DateRange,
        page: Page,
    ) -> Result<(Vec<AttendanceRecord>, i64), AppError> {
        let mut count = QueryBuilder::<MySql>::new("SELECT COUNT(*) FROM attendances WHERE user_id = ");
        count.push_bind(user_id);
        let mut rows = QueryBuilder::<MySql>::new(format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendances WHERE user_id = "
        ));
        rows.push_bind(user_id);

        for qb in [&mut count, &mut rows] {
            if let Some(start) = range.start {
                qb.push(" AND work_date >= ").push_bind(start);
            }
            if let Some(end) = range.end {
                qb.push(" AND work_date <= ").push_bind(end);
            }
        }

        rows.push(" ORDER BY check_in_time DESC LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let total: i64 = count.build_query_scalar::<i64>().fetch_one(&self.pool).await?;
        let items = rows
            .build_query_as::<AttendanceRecord>()
            .fetch_all(&self.pool)
            .await?;

        Ok((items, total))
    }
}

#[async_trait]
impl LeaveStore for MySqlStore {
    async fn insert(&self, leave: NewLeave) -> Result<LeaveRequest, AppError> {
        let done = sqlx::query(
            r#"
            INSERT INTO leaves (
                user_id, supervisor_id, leave_type, category, start_date, end_date,
                total_days, reason, attachment_url, status, deducted_from_quota,
                quota_year, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?, ?)
            "#,
        )
        .bind(leave.user_id)
        .bind(leave.supervisor_id)
        .bind(leave.category.leave_type().as_ref())
        .bind(leave.category.as_ref())
        .bind(leave.start_date)
        .bind(leave.end_date)
        .bind(leave.total_days)
        .bind(&leave.reason)
        .bind(&leave.attachment_url)
        .bind(leave.deducted_from_quota)
        .bind(leave.quota_year)
        .bind(leave.created_at)
        .execute(&self.pool)
        .await?;

        LeaveStore::find(self, done.last_insert_id())
            .await?
            .ok_or(AppError::NotFound("Leave request"))
    }

    async fn find(&self, id: u64) -> Result<Option<LeaveRequest>, AppError> {
        let sql = format!("SELECT {LEAVE_COLUMNS} FROM leaves WHERE id = ?");
        Ok(sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_pending(&self, leave: &LeaveRequest) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE leaves
            SET status = ?,
                approved_by_level_1 = ?, approved_at_level_1 = ?, approval_notes_level_1 = ?,
                approved_by_level_2 = ?, approved_at_level_2 = ?, approval_notes_level_2 = ?,
                rejected_by = ?, rejected_at = ?, rejection_reason = ?,
                updated_at = NOW()
            WHERE id = ?
              AND status = ?
            "#,
        )
        .bind(leave.status.as_ref())
        .bind(leave.approved_by_level_1)
        .bind(leave.approved_at_level_1)
        .bind(&leave.approval_notes_level_1)
        .bind(leave.approved_by_level_2)
        .bind(leave.approved_at_level_2)
        .bind(&leave.approval_notes_level_2)
        .bind(leave.rejected_by)
        .bind(leave.rejected_at)
        .bind(&leave.rejection_reason)
        .bind(leave.id)
        .bind(LeaveStatus::Pending.as_ref())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequest>, AppError> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves WHERE user_id = ? ORDER BY created_at DESC"
        );
        Ok(sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_pending_for_supervisor(
        &self,
        supervisor_id: u64,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves \
             WHERE supervisor_id = ? AND status = 'pending' ORDER BY created_at"
        );
        Ok(sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(supervisor_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_active_on(&self, day: NaiveDate) -> Result<Vec<LeaveRequest>, AppError> {
        let sql = format!(
            "SELECT {LEAVE_COLUMNS} FROM leaves \
             WHERE status IN ('approved_level_1', 'approved_level_2') \
               AND start_date <= ? AND end_date >= ? \
             ORDER BY start_date"
        );
        Ok(sqlx::query_as::<_, LeaveRequest>(&sql)
            .bind(day)
            .bind(day)
            .fetch_all(&self.pool)
            .await?)
    }
}

#[async_trait]
impl QuotaStore for MySqlStore {
    async fn find(&self, user_id: u64, year: i32) -> Result<Option<LeaveQuota>, AppError> {
        Ok(sqlx::query_as::<_, LeaveQuota>(
            r#"
            SELECT user_id, year, total_quota, used_quota, remaining_quota
            FROM leave_quotas
            WHERE user_id = ? AND year = ?
            "#,
        )
        .bind(user_id)
        .bind(year)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_if_absent(&self, quota: &LeaveQuota) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT IGNORE INTO leave_quotas (user_id, year, total_quota, used_quota, remaining_quota)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(quota.user_id)
        .bind(quota.year)
        .bind(quota.total_quota)
        .bind(quota.used_quota)
        .bind(quota.remaining_quota)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn save_if_used(
        &self,
        quota: &LeaveQuota,
        expected_used: i32,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE leave_quotas
            SET used_quota = ?, remaining_quota = ?, updated_at = NOW()
            WHERE user_id = ? AND year = ? AND used_quota = ?
            "#,
        )
        .bind(quota.used_quota)
        .bind(quota.remaining_quota)
        .bind(quota.user_id)
        .bind(quota.year)
        .bind(expected_used)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn active_users_without_quota(&self, year: i32) -> Result<Vec<u64>, AppError> {
        Ok(sqlx::query_scalar::<_, u64>(
            r#"
            SELECT u.id
            FROM users u
            LEFT JOIN leave_quotas q ON q.user_id = u.id AND q.year = ?
            WHERE u.is_active = TRUE AND q.user_id IS NULL
            ORDER BY u.id
            "#,
        )
        .bind(year)
        .fetch_all(&self.pool)
        .await?)
    }
}
