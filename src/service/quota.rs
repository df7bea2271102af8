use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{error::AppError, model::leave_quota::LeaveQuota, store::QuotaStore};

const MAX_CAS_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, ToSchema)]
pub struct QuotaInfo {
    #[serde(flatten)]
    pub quota: LeaveQuota,
    #[schema(example = 25.0)]
    pub percentage_used: f64,
}

/// Per-user, per-year annual leave balances.
pub struct LeaveQuotaLedger {
    store: Arc<dyn QuotaStore>,
    default_total: i32,
}

impl LeaveQuotaLedger {
    pub fn new(store: Arc<dyn QuotaStore>, default_total: i32) -> Self {
        Self {
            store,
            default_total,
        }
    }

    pub async fn get_or_create(&self, user_id: u64, year: i32) -> Result<LeaveQuota, AppError> {
        if let Some(q) = self.store.find(user_id, year).await? {
            return Ok(q);
        }

        let fresh = LeaveQuota::fresh(user_id, year, self.default_total);
        if self.store.insert_if_absent(&fresh).await? {
            info!(user_id, year, total = fresh.total_quota, "Created leave quota");
            return Ok(fresh);
        }

        // lost the insert race; the winner's row is authoritative
        self.store
            .find(user_id, year)
            .await?
            .ok_or(AppError::NotFound("Leave quota"))
    }

    pub async fn quota_info(&self, user_id: u64, year: i32) -> Result<QuotaInfo, AppError> {
        let quota = self.get_or_create(user_id, year).await?;
        Ok(QuotaInfo {
            percentage_used: quota.percentage_used(),
            quota,
        })
    }

    /// Takes `days` from the balance. Returns false, writing nothing, when
    /// the remaining balance is too small.
    pub async fn deduct(&self, user_id: u64, days: i32, year: i32) -> Result<bool, AppError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut quota = self.get_or_create(user_id, year).await?;
            let expected = quota.used_quota;
            if !quota.deduct(days) {
                return Ok(false);
            }
            if self.store.save_if_used(&quota, expected).await? {
                info!(user_id, year, days, remaining = quota.remaining_quota, "Quota deducted");
                return Ok(true);
            }
        }
        Err(AppError::ConcurrentUpdate)
    }

    /// Gives `days` back, capped so the balance never exceeds its total.
    pub async fn restore(&self, user_id: u64, days: i32, year: i32) -> Result<(), AppError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let mut quota = self.get_or_create(user_id, year).await?;
            let expected = quota.used_quota;
            let overflow = quota.restore(days);
            if self.store.save_if_used(&quota, expected).await? {
                if overflow > 0 {
                    warn!(user_id, year, days, overflow, "Restore exceeded used quota, capped");
                }
                info!(user_id, year, days, remaining = quota.remaining_quota, "Quota restored");
                return Ok(());
            }
        }
        Err(AppError::ConcurrentUpdate)
    }

    /// Creates the year's entry for every active user lacking one.
    pub async fn reset_annual(&self, year: i32) -> Result<usize, AppError> {
        let mut created = 0;
        for user_id in self.store.active_users_without_quota(year).await? {
            let fresh = LeaveQuota::fresh(user_id, year, self.default_total);
            if self.store.insert_if_absent(&fresh).await? {
                created += 1;
            }
        }
        info!(year, created, "Annual quota reset finished");
        Ok(created)
    }
}
