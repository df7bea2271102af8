//! Wall-clock job scheduler for the nightly maintenance jobs.
//!
//! Each job runs on its own task, sleeping until the next firing time in
//! business time. `stop` signals every task through a watch channel and
//! waits for them to finish.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use futures::{FutureExt, future::BoxFuture};
use tokio::{sync::watch, task::JoinHandle};
use tracing::{error, info, warn};

use crate::service::{
    auto_checkout::AutoCheckoutSweeper, clock::BusinessClock, quota::LeaveQuotaLedger,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    Daily { at: NaiveTime },
    Yearly { month: u32, day: u32, at: NaiveTime },
}

impl Schedule {
    /// First firing strictly after `now`.
    pub fn next_after(&self, clock: &BusinessClock, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = clock.local(now).date_naive();
        match *self {
            Schedule::Daily { at } => today
                .iter_days()
                .take(2)
                .map(|d| clock.at(d, at))
                .find(|t| *t > now),
            // Feb 29 only exists in leap years, so look a few years ahead.
            Schedule::Yearly { month, day, at } => (today.year()..=today.year() + 8)
                .filter_map(|y| NaiveDate::from_ymd_opt(y, month, day))
                .map(|d| clock.at(d, at))
                .find(|t| *t > now),
        }
    }
}

pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

struct ScheduledJob {
    name: &'static str,
    schedule: Schedule,
    job: Job,
}

pub struct Scheduler {
    clock: BusinessClock,
    jobs: Vec<ScheduledJob>,
    shutdown: Option<watch::Sender<bool>>,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(clock: BusinessClock) -> Self {
        Self {
            clock,
            jobs: Vec::new(),
            shutdown: None,
            handles: Vec::new(),
        }
    }

    /// Auto checkout of yesterday at 00:00 and the yearly quota reset on
    /// January 1st at 00:01.
    pub fn with_maintenance_jobs(
        clock: BusinessClock,
        sweeper: Arc<AutoCheckoutSweeper>,
        ledger: Arc<LeaveQuotaLedger>,
    ) -> Self {
        let mut scheduler = Self::new(clock);

        scheduler.add(
            "auto_checkout",
            Schedule::Daily {
                at: NaiveTime::MIN,
            },
            Arc::new(move || {
                let sweeper = sweeper.clone();
                async move {
                    let target = clock.yesterday();
                    if let Err(e) = sweeper.sweep(target).await {
                        error!(error = %e, %target, "Scheduled auto checkout failed");
                    }
                }
                .boxed()
            }),
        );

        scheduler.add(
            "annual_quota_reset",
            Schedule::Yearly {
                month: 1,
                day: 1,
                at: NaiveTime::from_hms_opt(0, 1, 0).unwrap_or(NaiveTime::MIN),
            },
            Arc::new(move || {
                let ledger = ledger.clone();
                async move {
                    let year = clock.today().year();
                    if let Err(e) = ledger.reset_annual(year).await {
                        error!(error = %e, year, "Scheduled quota reset failed");
                    }
                }
                .boxed()
            }),
        );

        scheduler
    }

    pub fn add(&mut self, name: &'static str, schedule: Schedule, job: Job) {
        self.jobs.push(ScheduledJob {
            name,
            schedule,
            job,
        });
    }

    pub fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }

    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let (tx, rx) = watch::channel(false);

        for scheduled in &self.jobs {
            let clock = self.clock;
            let name = scheduled.name;
            let schedule = scheduled.schedule;
            let job = scheduled.job.clone();
            let mut rx = rx.clone();

            self.handles.push(tokio::spawn(async move {
                loop {
                    let now = Utc::now();
                    let Some(next) = schedule.next_after(&clock, now) else {
                        warn!(job = name, "No upcoming run, stopping job");
                        break;
                    };
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    info!(job = name, next_run = %clock.local(next), "Job scheduled");

                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {
                            info!(job = name, "Running scheduled job");
                            (job)().await;
                        }
                        _ = rx.changed() => break,
                    }
                }
            }));
        }

        self.shutdown = Some(tx);
        info!(jobs = self.jobs.len(), "Scheduler started");
    }

    pub async fn stop(&mut self) {
        let Some(tx) = self.shutdown.take() else {
            return;
        };
        let _ = tx.send(true);
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Scheduled job task ended abnormally");
            }
        }
        info!("Scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        service::clock::test_support::{jakarta, local},
        store::memory::MemoryStore,
    };

    fn hm(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn daily_fires_at_next_local_midnight() {
        let clock = jakarta();
        let daily = Schedule::Daily { at: NaiveTime::MIN };

        let next = daily.next_after(&clock, local(2026, 3, 2, 23, 30, 0)).unwrap();
        assert_eq!(next, local(2026, 3, 3, 0, 0, 0));

        // exactly at the firing time moves to the next day
        let next = daily.next_after(&clock, local(2026, 3, 3, 0, 0, 0)).unwrap();
        assert_eq!(next, local(2026, 3, 4, 0, 0, 0));
    }

    #[test]
    fn yearly_rolls_into_next_year() {
        let clock = jakarta();
        let reset = Schedule::Yearly {
            month: 1,
            day: 1,
            at: hm(0, 1),
        };
        assert_eq!(
            reset.next_after(&clock, local(2026, 12, 31, 23, 0, 0)),
            Some(local(2027, 1, 1, 0, 1, 0))
        );
        assert_eq!(
            reset.next_after(&clock, local(2027, 1, 1, 0, 0, 30)),
            Some(local(2027, 1, 1, 0, 1, 0))
        );
    }

    #[test]
    fn leap_day_waits_for_leap_year() {
        let leap = Schedule::Yearly {
            month: 2,
            day: 29,
            at: hm(9, 0),
        };
        assert_eq!(
            leap.next_after(&jakarta(), local(2026, 3, 1, 0, 0, 0)),
            Some(local(2028, 2, 29, 9, 0, 0))
        );
    }

    #[actix_web::test]
    async fn start_and_stop() {
        let store = Arc::new(MemoryStore::new());
        let clock = jakarta();
        let mut scheduler = Scheduler::with_maintenance_jobs(
            clock,
            Arc::new(AutoCheckoutSweeper::new(store.clone(), clock)),
            Arc::new(LeaveQuotaLedger::new(store, 12)),
        );

        scheduler.start();
        assert!(scheduler.is_running());
        scheduler.start();
        assert_eq!(scheduler.handles.len(), 2);

        scheduler.stop().await;
        assert!(!scheduler.is_running());
        assert!(scheduler.handles.is_empty());
    }
}
