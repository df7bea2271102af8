use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::{
    error::AppError,
    model::attendance::{AttendanceRecord, Checkout, NewAttendance},
    service::{clock::BusinessClock, geo::GeoValidator, rules::AttendanceRules},
    storage::{PhotoStore, Upload},
    store::{AttendanceStore, DateRange, Page},
};

/// A position report from the client, for check-in or check-out.
#[derive(Debug, Clone)]
pub struct Punch {
    pub user_id: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Stored only once the punch is accepted.
    pub photo: Option<Upload>,
    /// Defaults to now.
    pub at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceHistory {
    pub items: Vec<AttendanceRecord>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

pub struct AttendanceRecordManager {
    store: Arc<dyn AttendanceStore>,
    geo: Arc<GeoValidator>,
    rules: AttendanceRules,
    clock: BusinessClock,
    photos: Arc<dyn PhotoStore>,
}

impl AttendanceRecordManager {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        geo: Arc<GeoValidator>,
        rules: AttendanceRules,
        clock: BusinessClock,
        photos: Arc<dyn PhotoStore>,
    ) -> Self {
        Self {
            store,
            geo,
            rules,
            clock,
            photos,
        }
    }

    async fn save_photo(
        &self,
        user_id: u64,
        photo: Option<Upload>,
    ) -> Result<Option<String>, AppError> {
        match photo {
            Some(upload) => Ok(Some(
                self.photos
                    .store(user_id, upload.bytes, &upload.extension)
                    .await?,
            )),
            None => Ok(None),
        }
    }

    fn locate(&self, latitude: f64, longitude: f64) -> Result<String, AppError> {
        match self.geo.validate(latitude, longitude) {
            Some(site) => Ok(site.to_string()),
            None => Err(AppError::LocationInvalid {
                nearest: self.geo.nearest(latitude, longitude),
            }),
        }
    }

    pub async fn check_in(&self, punch: Punch) -> Result<AttendanceRecord, AppError> {
        let at = punch.at.unwrap_or_else(Utc::now);
        let work_date = self.clock.local(at).date_naive();

        if self
            .store
            .find_for_day(punch.user_id, work_date)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateCheckIn(work_date));
        }

        let location = self.locate(punch.latitude, punch.longitude).inspect_err(|_| {
            warn!(
                user_id = punch.user_id,
                lat = punch.latitude,
                lon = punch.longitude,
                "Check-in outside allowed sites"
            );
        })?;
        let photo_url = self.save_photo(punch.user_id, punch.photo).await?;

        let record = self
            .store
            .insert(NewAttendance {
                user_id: punch.user_id,
                work_date,
                check_in_time: at,
                latitude: punch.latitude,
                longitude: punch.longitude,
                location,
                photo_url,
                required_checkout_time: self.rules.required_checkout(at),
                status: self.rules.status_for(at),
            })
            .await?;

        info!(
            user_id = record.user_id,
            attendance_id = record.id,
            status = %record.status,
            site = %record.check_in_location,
            "Checked in"
        );
        Ok(record)
    }

    pub async fn check_out(&self, punch: Punch) -> Result<AttendanceRecord, AppError> {
        let at = punch.at.unwrap_or_else(Utc::now);
        let work_date = self.clock.local(at).date_naive();

        let record = self
            .store
            .find_for_day(punch.user_id, work_date)
            .await?
            .ok_or(AppError::NoCheckIn)?;

        if !record.is_open() {
            return Err(AppError::AlreadyCheckedOut);
        }

        if at < record.required_checkout_time {
            let remaining_ms = (record.required_checkout_time - at).num_milliseconds();
            let remaining_seconds = (remaining_ms + 999) / 1000;
            return Err(AppError::TooEarly {
                hours: remaining_seconds / 3600,
                minutes: (remaining_seconds % 3600) / 60,
                remaining_seconds,
            });
        }

        let location = self.locate(punch.latitude, punch.longitude)?;
        let photo_url = self.save_photo(punch.user_id, punch.photo).await?;

        let checkout = Checkout {
            time: at,
            latitude: punch.latitude,
            longitude: punch.longitude,
            location,
            photo_url,
            status: None,
        };
        if !self.store.close(record.id, &checkout).await? {
            return Err(AppError::AlreadyCheckedOut);
        }

        info!(user_id = record.user_id, attendance_id = record.id, "Checked out");
        Ok(AttendanceRecord {
            check_out_time: Some(checkout.time),
            check_out_latitude: Some(checkout.latitude),
            check_out_longitude: Some(checkout.longitude),
            check_out_location: Some(checkout.location),
            check_out_photo_url: checkout.photo_url,
            ..record
        })
    }

    pub async fn get_today(&self, user_id: u64) -> Result<Option<AttendanceRecord>, AppError> {
        self.store.find_for_day(user_id, self.clock.today()).await
    }

    pub async fn get_history(
        &self,
        user_id: u64,
        range: DateRange,
        page: Page,
    ) -> Result<AttendanceHistory, AppError> {
        let (items, total) = self.store.history(user_id, range, page).await?;
        Ok(AttendanceHistory {
            items,
            total,
            page: page.page,
            per_page: page.per_page,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::{
        model::attendance::AttendanceStatus,
        service::clock::test_support::{date, local},
        storage::test_support::MemoryPhotoStore,
        store::memory::MemoryStore,
    };

    #[actix_web::test]
    async fn on_time_check_in_sets_deadline_and_site() {
        let store = Arc::new(MemoryStore::new());
        let rec = manager(store)
            .check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 15, 0)))
            .await
            .unwrap();

        assert_eq!(rec.status, AttendanceStatus::OnTime);
        assert_eq!(rec.work_date, date(2026, 3, 2));
        assert_eq!(rec.required_checkout_time, local(2026, 3, 2, 17, 0, 0));
        assert_eq!(rec.check_in_location, "MNC Tower");
        assert!(rec.is_open());
    }

    #[actix_web::test]
    async fn second_check_in_same_day_is_duplicate_even_from_elsewhere() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store);
        m.check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 8, 0, 0)))
            .await
            .unwrap();

        let err = m
            .check_in(punch(1, AWAY, local(2026, 3, 2, 9, 0, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DuplicateCheckIn(d) if d == date(2026, 3, 2)));
    }

    #[actix_web::test]
    async fn check_in_outside_sites_reports_nearest() {
        let store = Arc::new(MemoryStore::new());
        let err = manager(store)
            .check_in(punch(1, AWAY, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap_err();

        match err {
            AppError::LocationInvalid { nearest: Some(n) } => assert_eq!(n.name, "MNC Tower"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[actix_web::test]
    async fn early_check_out_reports_positive_shrinking_wait() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store);
        m.check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();

        let remaining = |err: AppError| match err {
            AppError::TooEarly {
                remaining_seconds, ..
            } => remaining_seconds,
            other => panic!("unexpected {other:?}"),
        };

        let first = remaining(
            m.check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 15, 0, 0)))
                .await
                .unwrap_err(),
        );
        let later = remaining(
            m.check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 16, 59, 59)))
                .await
                .unwrap_err(),
        );

        assert_eq!(first, 2 * 3600);
        assert_eq!(later, 1);
        assert!(later < first);
    }

    #[actix_web::test]
    async fn too_early_splits_hours_and_minutes() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store);
        m.check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();

        let err = m
            .check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 14, 45, 30)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::TooEarly {
                hours: 2,
                minutes: 14,
                remaining_seconds: 8070
            }
        ));
    }

    #[actix_web::test]
    async fn check_out_after_deadline_closes_once() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store.clone());
        let rec = m
            .check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 45, 0)))
            .await
            .unwrap();

        let closed = m
            .check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 19, 0, 0)))
            .await
            .unwrap();
        assert_eq!(closed.check_out_time, Some(local(2026, 3, 2, 19, 0, 0)));
        assert_eq!(closed.status, AttendanceStatus::Late);
        assert!(!store.attendance(rec.id).unwrap().is_open());

        let err = m
            .check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 19, 5, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AlreadyCheckedOut));
    }

    #[actix_web::test]
    async fn check_out_without_check_in_fails() {
        let store = Arc::new(MemoryStore::new());
        let err = manager(store)
            .check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 18, 0, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoCheckIn));
    }

    #[actix_web::test]
    async fn check_out_from_outside_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store);
        m.check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();

        let err = m
            .check_out(punch(1, AWAY, local(2026, 3, 2, 17, 30, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::LocationInvalid { .. }));
    }

    #[actix_web::test]
    async fn history_is_newest_first_and_paged() {
        let store = Arc::new(MemoryStore::new());
        let m = manager(store);
        for day in 2..=6 {
            m.check_in(punch(1, AT_OFFICE, local(2026, 3, day, 7, 0, 0)))
                .await
                .unwrap();
        }

        let page = m
            .get_history(1, DateRange::default(), Page::new(Some(1), Some(2)))
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0].work_date, date(2026, 3, 6));

        let ranged = m
            .get_history(
                1,
                DateRange {
                    start: Some(date(2026, 3, 3)),
                    end: Some(date(2026, 3, 4)),
                },
                Page::new(None, None),
            )
            .await
            .unwrap();
        assert_eq!(ranged.total, 2);
    }

    #[actix_web::test]
    async fn rejected_punches_store_no_photo() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(MemoryPhotoStore::default());
        let m = manager_with_photos(store, photos.clone());

        for hour in 7..10 {
            m.check_in(punch(1, AWAY, local(2026, 3, 2, hour, 0, 0)))
                .await
                .unwrap_err();
        }
        m.check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 18, 0, 0)))
            .await
            .unwrap_err();
        assert!(photos.stored.lock().unwrap().is_empty());

        m.check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap();
        m.check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 8, 0, 0)))
            .await
            .unwrap_err();
        m.check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 12, 0, 0)))
            .await
            .unwrap_err();
        m.check_out(punch(1, AWAY, local(2026, 3, 2, 17, 30, 0)))
            .await
            .unwrap_err();
        assert_eq!(photos.stored.lock().unwrap().len(), 1);

        let closed = m
            .check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 17, 30, 0)))
            .await
            .unwrap();
        assert_eq!(photos.stored.lock().unwrap().len(), 2);
        assert_eq!(closed.check_out_photo_url.as_deref(), Some("mem://1/2.jpg"));
    }

    #[actix_web::test]
    async fn photo_storage_failure_writes_no_record() {
        let store = Arc::new(MemoryStore::new());
        let photos = Arc::new(MemoryPhotoStore {
            fail: true,
            ..Default::default()
        });
        let m = manager_with_photos(store, photos);

        let err = m
            .check_in(punch(1, AT_OFFICE, local(2026, 3, 2, 7, 0, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));

        let err = m
            .check_out(punch(1, AT_OFFICE, local(2026, 3, 2, 18, 0, 0)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoCheckIn));
    }
}
