use std::sync::Arc;

use crate::{
    config::Config,
    storage::PhotoStore,
    store::{AttendanceStore, LeaveStore, QuotaStore},
};

pub mod attendance;
pub mod auto_checkout;
pub mod clock;
pub mod geo;
pub mod holiday;
pub mod leave;
pub mod notification;
pub mod quota;
pub mod rules;
pub mod scheduler;
pub mod working_days;

use attendance::AttendanceRecordManager;
use auto_checkout::AutoCheckoutSweeper;
use clock::BusinessClock;
use geo::GeoValidator;
use holiday::{HolidayCalendar, HolidaySource};
use leave::LeaveApprovalWorkflow;
use notification::Notifier;
use quota::LeaveQuotaLedger;
use rules::AttendanceRules;
use scheduler::Scheduler;
use working_days::WorkingDaysCounter;

/// Everything the handlers need, shared as `web::Data<Services>`.
#[derive(Clone)]
pub struct Services {
    pub clock: BusinessClock,
    pub geo: Arc<GeoValidator>,
    pub attendance: Arc<AttendanceRecordManager>,
    pub sweeper: Arc<AutoCheckoutSweeper>,
    pub ledger: Arc<LeaveQuotaLedger>,
    pub leaves: Arc<LeaveApprovalWorkflow>,
    pub days: WorkingDaysCounter,
    pub notifier: Notifier,
}

impl Services {
    pub fn new<S>(
        config: &Config,
        store: Arc<S>,
        holidays: Arc<dyn HolidaySource>,
        photos: Arc<dyn PhotoStore>,
    ) -> Self
    where
        S: AttendanceStore + LeaveStore + QuotaStore + 'static,
    {
        let clock = BusinessClock::new(config.business_offset);
        let geo = Arc::new(GeoValidator::new(config.sites.clone()));
        let days = WorkingDaysCounter::new(
            Arc::new(HolidayCalendar::new(holidays)),
            config.max_leave_span_days,
        );
        let ledger = Arc::new(LeaveQuotaLedger::new(
            store.clone(),
            config.annual_leave_quota,
        ));
        let notifier = Notifier;

        Self {
            clock,
            geo: geo.clone(),
            attendance: Arc::new(AttendanceRecordManager::new(
                store.clone(),
                geo,
                AttendanceRules::new(clock),
                clock,
                photos.clone(),
            )),
            sweeper: Arc::new(AutoCheckoutSweeper::new(store.clone(), clock)),
            leaves: Arc::new(LeaveApprovalWorkflow::new(
                store,
                ledger.clone(),
                days.clone(),
                photos,
                notifier.clone(),
                config.approval_levels,
            )),
            ledger,
            days,
            notifier,
        }
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::with_maintenance_jobs(self.clock, self.sweeper.clone(), self.ledger.clone())
    }
}
