use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    model::leave_request::{LeaveCategory, LeaveRequest, LeaveStatus, LeaveType, NewLeave},
    service::{
        notification::Notifier, quota::LeaveQuotaLedger, working_days::WorkingDaysCounter,
    },
    storage::{PhotoStore, Upload},
    store::LeaveStore,
};

#[derive(Debug)]
pub struct LeaveSubmission {
    pub user_id: u64,
    pub leave_type: LeaveType,
    pub category: LeaveCategory,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub attachment: Option<Upload>,
    pub supervisor_id: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubmittedLeave {
    pub leave: LeaveRequest,
    /// Holidays inside the range that were not counted.
    #[schema(value_type = Vec<String>)]
    pub holidays_excluded: Vec<NaiveDate>,
}

/// Who is acting on a request.
#[derive(Debug, Clone, Copy)]
pub struct Approver {
    pub user_id: u64,
    /// HR and admins may act at every level.
    pub is_hr: bool,
}

impl Approver {
    fn may_act_as_supervisor(&self, leave: &LeaveRequest) -> bool {
        self.is_hr || leave.supervisor_id == Some(self.user_id)
    }
}

/// Leave request lifecycle: submission, approval, rejection, cancellation.
pub struct LeaveApprovalWorkflow {
    store: Arc<dyn LeaveStore>,
    ledger: Arc<LeaveQuotaLedger>,
    days: WorkingDaysCounter,
    uploads: Arc<dyn PhotoStore>,
    notifier: Notifier,
    approval_levels: u8,
}

impl LeaveApprovalWorkflow {
    pub fn new(
        store: Arc<dyn LeaveStore>,
        ledger: Arc<LeaveQuotaLedger>,
        days: WorkingDaysCounter,
        uploads: Arc<dyn PhotoStore>,
        notifier: Notifier,
        approval_levels: u8,
    ) -> Self {
        Self {
            store,
            ledger,
            days,
            uploads,
            notifier,
            approval_levels,
        }
    }

    pub async fn submit(&self, sub: LeaveSubmission) -> Result<SubmittedLeave, AppError> {
        if sub.category.leave_type() != sub.leave_type {
            return Err(AppError::InvalidCategory {
                leave_type: sub.leave_type,
                category: sub.category,
            });
        }
        let tally = self.days.tally(sub.start_date, sub.end_date).await?;
        if tally.working_days == 0 {
            return Err(AppError::ZeroWorkingDays);
        }
        let total_days = i32::try_from(tally.working_days).map_err(|_| AppError::InvalidRange)?;
        let holidays_excluded = tally.holidays;

        if sub.category.requires_attachment() && sub.attachment.is_none() {
            return Err(AppError::MissingAttachment);
        }

        let quota_year = sub.start_date.year();
        let deducts = sub.category.deducts_quota();
        if deducts && !self.ledger.deduct(sub.user_id, total_days, quota_year).await? {
            let available = self
                .ledger
                .get_or_create(sub.user_id, quota_year)
                .await?
                .remaining_quota;
            return Err(AppError::InsufficientQuota {
                available,
                required: total_days,
            });
        }

        let attachment_url = match sub.attachment {
            Some(upload) => match self
                .uploads
                .store(sub.user_id, upload.bytes, &upload.extension)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => {
                    if deducts {
                        self.give_back(sub.user_id, total_days, quota_year).await;
                    }
                    return Err(e);
                }
            },
            None => None,
        };

        let new_leave = NewLeave {
            user_id: sub.user_id,
            supervisor_id: sub.supervisor_id,
            category: sub.category,
            start_date: sub.start_date,
            end_date: sub.end_date,
            total_days,
            reason: sub.reason,
            attachment_url,
            deducted_from_quota: deducts,
            quota_year,
            created_at: Utc::now(),
        };

        let leave = match self.store.insert(new_leave).await {
            Ok(leave) => leave,
            Err(e) => {
                if deducts {
                    self.give_back(sub.user_id, total_days, quota_year).await;
                }
                return Err(e);
            }
        };

        info!(
            leave_id = leave.id,
            user_id = leave.user_id,
            category = %leave.category,
            days = total_days,
            deducted = deducts,
            "Leave submitted"
        );
        self.notifier.leave_pending_approval(&leave);

        Ok(SubmittedLeave {
            leave,
            holidays_excluded,
        })
    }

    /// Undoes a deduction made earlier in a failed submission.
    async fn give_back(&self, user_id: u64, days: i32, year: i32) {
        if let Err(e) = self.ledger.restore(user_id, days, year).await {
            error!(
                error = %e,
                user_id,
                days,
                "Failed to give back quota after a failed submission"
            );
        }
    }

    async fn load_pending(&self, id: u64) -> Result<LeaveRequest, AppError> {
        let leave = self.find(id).await?;
        if leave.status != LeaveStatus::Pending {
            return Err(AppError::NotPending(leave.status));
        }
        Ok(leave)
    }

    /// Persists a decision; a writer that got there first turns into NOT_PENDING.
    async fn commit(&self, leave: &LeaveRequest) -> Result<(), AppError> {
        if self.store.update_pending(leave).await? {
            return Ok(());
        }
        let current = self.store.find(leave.id).await?;
        Err(match current {
            Some(row) => AppError::NotPending(row.status),
            None => AppError::NotFound("Leave request"),
        })
    }

    pub async fn approve(
        &self,
        id: u64,
        level: u8,
        approver: Approver,
        notes: Option<String>,
    ) -> Result<LeaveRequest, AppError> {
        if level == 0 || level > self.approval_levels {
            return Err(AppError::InvalidLevel(level));
        }

        let mut leave = self.load_pending(id).await?;
        let now = Utc::now();

        if level == 1 {
            if !approver.may_act_as_supervisor(&leave) {
                return Err(AppError::Forbidden(
                    "Only the chosen supervisor or HR can approve at level 1".to_string(),
                ));
            }
            if leave.approved_by_level_1.is_some() {
                return Err(AppError::AlreadyApproved);
            }
            leave.approved_by_level_1 = Some(approver.user_id);
            leave.approved_at_level_1 = Some(now);
            leave.approval_notes_level_1 = notes;
            if self.approval_levels == 1 {
                leave.status = LeaveStatus::ApprovedLevel1;
            }
        } else {
            if !approver.is_hr {
                return Err(AppError::Forbidden(
                    "Only HR can approve at level 2".to_string(),
                ));
            }
            if leave.approved_by_level_1.is_none() {
                return Err(AppError::Level1Required);
            }
            leave.approved_by_level_2 = Some(approver.user_id);
            leave.approved_at_level_2 = Some(now);
            leave.approval_notes_level_2 = notes;
            leave.status = LeaveStatus::ApprovedLevel2;
        }

        self.commit(&leave).await?;
        info!(
            leave_id = id,
            level,
            approver = approver.user_id,
            status = %leave.status,
            "Leave approved"
        );
        self.notifier.leave_approved(&leave, level);
        Ok(leave)
    }

    /// Rejects a pending request and returns its deducted days to the ledger.
    pub async fn reject(
        &self,
        id: u64,
        approver: Approver,
        reason: String,
    ) -> Result<LeaveRequest, AppError> {
        let mut leave = self.load_pending(id).await?;
        if !approver.may_act_as_supervisor(&leave) {
            return Err(AppError::Forbidden(
                "Only the chosen supervisor or HR can reject this request".to_string(),
            ));
        }

        leave.status = LeaveStatus::Rejected;
        leave.rejected_by = Some(approver.user_id);
        leave.rejected_at = Some(Utc::now());
        leave.rejection_reason = Some(reason);

        self.commit(&leave).await?;
        self.refund(&leave).await;

        info!(
            leave_id = id,
            rejected_by = approver.user_id,
            refunded = leave.deducted_from_quota,
            "Leave rejected"
        );
        self.notifier.leave_rejected(&leave);
        Ok(leave)
    }

    /// Withdraws the owner's own pending request.
    pub async fn cancel(&self, id: u64, user_id: u64) -> Result<LeaveRequest, AppError> {
        let mut leave = self.load_pending(id).await?;
        if leave.user_id != user_id {
            return Err(AppError::Forbidden(
                "Only the requester can cancel a leave request".to_string(),
            ));
        }

        leave.status = LeaveStatus::Cancelled;
        self.commit(&leave).await?;
        self.refund(&leave).await;

        info!(leave_id = id, user_id, refunded = leave.deducted_from_quota, "Leave cancelled");
        Ok(leave)
    }

    /// The status change is already stored, so a failed refund is logged
    /// for manual correction instead of failing the request.
    async fn refund(&self, leave: &LeaveRequest) {
        if !leave.deducted_from_quota {
            return;
        }
        if let Err(e) = self
            .ledger
            .restore(leave.user_id, leave.total_days, leave.quota_year)
            .await
        {
            warn!(
                error = %e,
                leave_id = leave.id,
                user_id = leave.user_id,
                days = leave.total_days,
                "Quota refund failed"
            );
        }
    }

    pub async fn find(&self, id: u64) -> Result<LeaveRequest, AppError> {
        self.store
            .find(id)
            .await?
            .ok_or(AppError::NotFound("Leave request"))
    }

    pub async fn list_for_user(&self, user_id: u64) -> Result<Vec<LeaveRequest>, AppError> {
        self.store.list_for_user(user_id).await
    }

    pub async fn pending_for_supervisor(
        &self,
        supervisor_id: u64,
    ) -> Result<Vec<LeaveRequest>, AppError> {
        self.store.list_pending_for_supervisor(supervisor_id).await
    }

    pub async fn active_on(&self, day: NaiveDate) -> Result<Vec<LeaveRequest>, AppError> {
        self.store.list_active_on(day).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::{
            clock::test_support::date, holiday::HolidayCalendar,
            holiday::test_support::StaticHolidays,
        },
        storage::test_support::MemoryPhotoStore,
        store::memory::MemoryStore,
    };

    const EMPLOYEE: u64 = 10;
    const SUPERVISOR: u64 = 20;
    const HR: Approver = Approver {
        user_id: 30,
        is_hr: true,
    };
    const BOSS: Approver = Approver {
        user_id: SUPERVISOR,
        is_hr: false,
    };

    struct Fixture {
        store: Arc<MemoryStore>,
        photos: Arc<MemoryPhotoStore>,
        workflow: LeaveApprovalWorkflow,
    }

    fn fixture_with(levels: u8, photos: MemoryPhotoStore) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(photos);
        let calendar = HolidayCalendar::new(Arc::new(StaticHolidays::new(&[date(2026, 3, 20)])));
        let workflow = LeaveApprovalWorkflow::new(
            store.clone(),
            Arc::new(LeaveQuotaLedger::new(store.clone(), 12)),
            WorkingDaysCounter::new(Arc::new(calendar), 366),
            photos.clone(),
            Notifier,
            levels,
        );
        Fixture {
            store,
            photos,
            workflow,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(2, MemoryPhotoStore::default())
    }

    fn annual(start: NaiveDate, end: NaiveDate) -> LeaveSubmission {
        LeaveSubmission {
            user_id: EMPLOYEE,
            leave_type: LeaveType::Annual,
            category: LeaveCategory::Annual,
            start_date: start,
            end_date: end,
            reason: "family event".to_string(),
            attachment: None,
            supervisor_id: Some(SUPERVISOR),
        }
    }

    fn remaining(f: &Fixture) -> Option<i32> {
        f.store.quota(EMPLOYEE, 2026).map(|q| q.remaining_quota)
    }

    #[actix_web::test]
    async fn annual_leave_deducts_working_days() {
        let f = fixture();
        // Monday 16th .. Sunday 22nd, Friday 20th is a holiday
        let out = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 22)))
            .await
            .unwrap();

        assert_eq!(out.leave.total_days, 4);
        assert_eq!(out.leave.status, LeaveStatus::Pending);
        assert!(out.leave.deducted_from_quota);
        assert_eq!(out.leave.quota_year, 2026);
        assert_eq!(out.holidays_excluded, vec![date(2026, 3, 20)]);
        assert_eq!(remaining(&f), Some(8));
    }

    #[actix_web::test]
    async fn mismatched_category_is_rejected() {
        let f = fixture();
        let mut sub = annual(date(2026, 3, 16), date(2026, 3, 16));
        sub.category = LeaveCategory::Personal;
        let err = f.workflow.submit(sub).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_CATEGORY");
    }

    #[actix_web::test]
    async fn reversed_range_is_rejected() {
        let f = fixture();
        let err = f
            .workflow
            .submit(annual(date(2026, 3, 17), date(2026, 3, 16)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange));
    }

    #[actix_web::test]
    async fn weekend_only_request_is_rejected_without_touching_quota() {
        let f = fixture();
        let err = f
            .workflow
            .submit(annual(date(2026, 3, 7), date(2026, 3, 8)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ZeroWorkingDays));
        assert_eq!(remaining(&f), None);
    }

    #[actix_web::test]
    async fn certified_sick_leave_needs_attachment_and_keeps_quota() {
        let f = fixture();
        let ledger_before = remaining(&f);
        let sub = LeaveSubmission {
            leave_type: LeaveType::Sick,
            category: LeaveCategory::SickWithCertificate,
            ..annual(date(2026, 3, 16), date(2026, 3, 17))
        };
        let err = f.workflow.submit(sub).await.unwrap_err();
        assert!(matches!(err, AppError::MissingAttachment));
        assert_eq!(remaining(&f), ledger_before);

        let sub = LeaveSubmission {
            leave_type: LeaveType::Sick,
            category: LeaveCategory::SickWithCertificate,
            attachment: Some(Upload {
                bytes: b"%PDF".to_vec(),
                extension: "pdf".to_string(),
            }),
            ..annual(date(2026, 3, 16), date(2026, 3, 17))
        };
        let out = f.workflow.submit(sub).await.unwrap();
        assert!(!out.leave.deducted_from_quota);
        assert!(out.leave.attachment_url.unwrap().ends_with(".pdf"));
        assert_eq!(f.photos.stored.lock().unwrap().len(), 1);
        assert_eq!(remaining(&f), ledger_before);
    }

    #[actix_web::test]
    async fn insufficient_quota_reports_balance() {
        let f = fixture();
        f.workflow
            .submit(annual(date(2026, 3, 2), date(2026, 3, 4)))
            .await
            .unwrap();

        // Monday 2nd .. Tuesday 17th: 12 working days
        let err = f
            .workflow
            .submit(annual(date(2026, 3, 2), date(2026, 3, 17)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::InsufficientQuota {
                available: 9,
                required: 12
            }
        ));
        assert_eq!(remaining(&f), Some(9));
    }

    #[actix_web::test]
    async fn failed_insert_gives_quota_back() {
        let f = fixture();
        f.store.fail_next_leave_insert();

        let err = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 17)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert_eq!(remaining(&f), Some(12));
        assert_eq!(f.store.leave_count(), 0);
    }

    #[actix_web::test]
    async fn failed_attachment_upload_gives_quota_back() {
        let f = fixture_with(
            2,
            MemoryPhotoStore {
                fail: true,
                ..Default::default()
            },
        );
        let sub = LeaveSubmission {
            attachment: Some(Upload {
                bytes: vec![1, 2, 3],
                extension: "jpg".to_string(),
            }),
            ..annual(date(2026, 3, 16), date(2026, 3, 17))
        };
        let err = f.workflow.submit(sub).await.unwrap_err();
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert_eq!(remaining(&f), Some(12));
        assert_eq!(f.store.leave_count(), 0);
    }

    #[actix_web::test]
    async fn refused_submissions_store_no_attachment() {
        let f = fixture();
        let with_file = |start, end| LeaveSubmission {
            attachment: Some(Upload {
                bytes: b"%PDF".to_vec(),
                extension: "pdf".to_string(),
            }),
            ..annual(start, end)
        };

        f.workflow
            .submit(annual(date(2026, 3, 2), date(2026, 3, 13)))
            .await
            .unwrap();
        // 10 days used, 3 requested
        let err = f
            .workflow
            .submit(with_file(date(2026, 3, 23), date(2026, 3, 25)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InsufficientQuota { available: 2, .. }));

        let err = f
            .workflow
            .submit(with_file(date(2026, 3, 7), date(2026, 3, 8)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ZeroWorkingDays));

        assert!(f.photos.stored.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn overlong_range_is_rejected_without_touching_quota() {
        let f = fixture();
        let err = f
            .workflow
            .submit(annual(date(2026, 1, 1), date(2027, 6, 30)))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_RANGE");
        assert!(matches!(err, AppError::RangeTooLong { limit: 366, .. }));
        assert_eq!(remaining(&f), None);
    }

    #[actix_web::test]
    async fn level_two_requires_level_one() {
        let f = fixture();
        let id = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 17)))
            .await
            .unwrap()
            .leave
            .id;

        let err = f.workflow.approve(id, 2, HR, None).await.unwrap_err();
        assert!(matches!(err, AppError::Level1Required));

        let l1 = f
            .workflow
            .approve(id, 1, BOSS, Some("ok".into()))
            .await
            .unwrap();
        assert_eq!(l1.status, LeaveStatus::Pending);
        assert_eq!(l1.approved_by_level_1, Some(SUPERVISOR));

        let err = f.workflow.approve(id, 1, BOSS, None).await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyApproved));

        let l2 = f.workflow.approve(id, 2, HR, None).await.unwrap();
        assert_eq!(l2.status, LeaveStatus::ApprovedLevel2);

        let err = f.workflow.approve(id, 2, HR, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotPending(LeaveStatus::ApprovedLevel2)));
        assert_eq!(remaining(&f), Some(10));
    }

    #[actix_web::test]
    async fn single_level_depth_finishes_at_level_one() {
        let f = fixture_with(1, MemoryPhotoStore::default());
        let id = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 16)))
            .await
            .unwrap()
            .leave
            .id;

        let err = f.workflow.approve(id, 2, HR, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidLevel(2)));

        let done = f.workflow.approve(id, 1, BOSS, None).await.unwrap();
        assert_eq!(done.status, LeaveStatus::ApprovedLevel1);
    }

    #[actix_web::test]
    async fn unknown_level_and_strangers_are_refused() {
        let f = fixture();
        let id = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 16)))
            .await
            .unwrap()
            .leave
            .id;

        let err = f.workflow.approve(id, 3, HR, None).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidLevel(3)));

        let stranger = Approver {
            user_id: 99,
            is_hr: false,
        };
        let err = f.workflow.approve(id, 1, stranger, None).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let err = f.workflow.approve(404, 1, HR, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[actix_web::test]
    async fn reject_refunds_exactly_the_deducted_days() {
        let f = fixture();
        let id = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 18)))
            .await
            .unwrap()
            .leave
            .id;
        assert_eq!(remaining(&f), Some(9));

        let rejected = f
            .workflow
            .reject(id, BOSS, "busy period".into())
            .await
            .unwrap();
        assert_eq!(rejected.status, LeaveStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("busy period"));
        assert_eq!(remaining(&f), Some(12));

        let err = f
            .workflow
            .reject(id, BOSS, "again".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotPending(LeaveStatus::Rejected)));
        assert_eq!(remaining(&f), Some(12));
    }

    #[actix_web::test]
    async fn rejecting_non_deducting_leave_leaves_quota_alone() {
        let f = fixture();
        f.workflow
            .submit(annual(date(2026, 3, 2), date(2026, 3, 2)))
            .await
            .unwrap();
        let sub = LeaveSubmission {
            leave_type: LeaveType::Permission,
            category: LeaveCategory::OfficialTrip,
            ..annual(date(2026, 3, 16), date(2026, 3, 17))
        };
        let id = f.workflow.submit(sub).await.unwrap().leave.id;

        f.workflow.reject(id, HR, "no".into()).await.unwrap();
        assert_eq!(remaining(&f), Some(11));
    }

    #[actix_web::test]
    async fn owner_can_cancel_pending_request() {
        let f = fixture();
        let id = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 17)))
            .await
            .unwrap()
            .leave
            .id;

        let err = f.workflow.cancel(id, SUPERVISOR).await.unwrap_err();
        assert_eq!(err.code(), "FORBIDDEN");

        let cancelled = f.workflow.cancel(id, EMPLOYEE).await.unwrap();
        assert_eq!(cancelled.status, LeaveStatus::Cancelled);
        assert_eq!(remaining(&f), Some(12));
    }

    #[actix_web::test]
    async fn queries_follow_status() {
        let f = fixture();
        let id = f
            .workflow
            .submit(annual(date(2026, 3, 16), date(2026, 3, 18)))
            .await
            .unwrap()
            .leave
            .id;

        assert_eq!(f.workflow.pending_for_supervisor(SUPERVISOR).await.unwrap().len(), 1);
        assert!(f.workflow.active_on(date(2026, 3, 17)).await.unwrap().is_empty());

        f.workflow.approve(id, 1, BOSS, None).await.unwrap();
        f.workflow.approve(id, 2, HR, None).await.unwrap();

        assert!(f.workflow.pending_for_supervisor(SUPERVISOR).await.unwrap().is_empty());
        assert_eq!(f.workflow.active_on(date(2026, 3, 17)).await.unwrap().len(), 1);
        assert!(f.workflow.active_on(date(2026, 3, 19)).await.unwrap().is_empty());
        assert_eq!(f.workflow.list_for_user(EMPLOYEE).await.unwrap().len(), 1);
    }
}
