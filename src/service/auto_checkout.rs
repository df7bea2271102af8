use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    model::attendance::{AttendanceStatus, Checkout},
    service::clock::BusinessClock,
    store::AttendanceStore,
};

const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(t) => t,
    None => panic!("invalid time constant"),
};

#[derive(Debug, Serialize, ToSchema)]
pub struct SweepReport {
    #[schema(example = "2026-03-01", value_type = String, format = "date")]
    pub target_date: NaiveDate,
    /// Open records found for the date.
    pub found: usize,
    /// Records actually closed.
    pub processed: usize,
}

/// Closes attendance records nobody checked out of.
pub struct AutoCheckoutSweeper {
    store: Arc<dyn AttendanceStore>,
    clock: BusinessClock,
}

impl AutoCheckoutSweeper {
    pub fn new(store: Arc<dyn AttendanceStore>, clock: BusinessClock) -> Self {
        Self { store, clock }
    }

    /// Closes every open record of `target_date` at 23:59:59 local time,
    /// reusing the check-in position and marking it incomplete.
    pub async fn sweep(&self, target_date: NaiveDate) -> Result<SweepReport, AppError> {
        let open = self.store.find_open_for_day(target_date).await?;
        let found = open.len();
        let mut processed = 0;

        for record in open {
            let checkout = Checkout {
                time: self
                    .clock
                    .at(self.clock.local(record.check_in_time).date_naive(), END_OF_DAY),
                latitude: record.check_in_latitude,
                longitude: record.check_in_longitude,
                location: format!("{} (Auto Checkout)", record.check_in_location),
                photo_url: record.check_in_photo_url.clone(),
                status: Some(AttendanceStatus::Incomplete),
            };

            match self.store.close(record.id, &checkout).await {
                Ok(true) => processed += 1,
                // checked out by the user between the scan and the update
                Ok(false) => {}
                Err(e) => {
                    error!(
                        error = %e,
                        attendance_id = record.id,
                        user_id = record.user_id,
                        "Auto checkout failed"
                    );
                }
            }
        }

        info!(%target_date, found, processed, "Auto checkout sweep finished");
        Ok(SweepReport {
            target_date,
            found,
            processed,
        })
    }

    /// Manual reconciliation; future dates are refused.
    pub async fn sweep_for_date(&self, target_date: NaiveDate) -> Result<SweepReport, AppError> {
        if target_date > self.clock.today() {
            return Err(AppError::InvalidDate(format!(
                "Cannot run auto checkout for a future date ({target_date})"
            )));
        }
        self.sweep(target_date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::{
            attendance::test_support::{AT_OFFICE, manager, punch},
            clock::test_support::{date, jakarta, local},
        },
        store::memory::MemoryStore,
    };

    #[actix_web::test]
    async fn sweep_closes_open_records_only() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store.clone());

        let mut open = Vec::new();
        for user in 1..=3 {
            open.push(
                m.check_in(punch(user, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
                    .await
                    .unwrap(),
            );
        }
        let closed = m
            .check_in(punch(4, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();
        m.check_out(punch(4, AT_OFFICE, local(2026, 3, 2, 17, 10, 0)))
            .await
            .unwrap();
        let other_day = m
            .check_in(punch(5, AT_OFFICE, local(2026, 3, 3, 7, 0, 0)))
            .await
            .unwrap();

        let sweeper = AutoCheckoutSweeper::new(store.clone(), jakarta());
        let report = sweeper.sweep(date(2026, 3, 2)).await.unwrap();
        assert_eq!((report.found, report.processed), (3, 3));

        for rec in open {
            let row = store.attendance(rec.id).unwrap();
            assert_eq!(row.status, AttendanceStatus::Incomplete);
            assert_eq!(row.check_out_time, Some(local(2026, 3, 2, 23, 59, 59)));
            assert_eq!(row.check_out_location.as_deref(), Some("MNC Tower (Auto Checkout)"));
            assert_eq!(row.check_out_latitude, Some(rec.check_in_latitude));
            assert_eq!(row.check_out_photo_url, rec.check_in_photo_url);
        }

        let untouched = store.attendance(closed.id).unwrap();
        assert_eq!(untouched.status, AttendanceStatus::OnTime);
        assert_eq!(untouched.check_out_time, Some(local(2026, 3, 2, 17, 10, 0)));
        assert!(store.attendance(other_day.id).unwrap().is_open());
    }

    #[actix_web::test]
    async fn failing_record_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store.clone());
        let a = m
            .check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();
        let b = m
            .check_in(punch(2, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();
        store.fail_close_for(a.id);

        let report = AutoCheckoutSweeper::new(store.clone(), jakarta())
            .sweep(date(2026, 3, 2))
            .await
            .unwrap();
        assert_eq!((report.found, report.processed), (2, 1));
        assert!(store.attendance(a.id).unwrap().is_open());
        assert!(!store.attendance(b.id).unwrap().is_open());
    }

    #[actix_web::test]
    async fn future_dates_are_refused() {
        let sweeper = AutoCheckoutSweeper::new(Arc::new(MemoryStore::new()), jakarta());
        let tomorrow = jakarta().today().succ_opt().unwrap();
        let err = sweeper.sweep_for_date(tomorrow).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_DATE");

        let report = sweeper.sweep_for_date(jakarta().yesterday()).await.unwrap();
        assert_eq!(report.processed, 0);
    }
}
