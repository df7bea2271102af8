use std::{collections::BTreeSet, sync::Arc, time::Duration};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use moka::future::Cache;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Where public holidays come from.
#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn fetch(&self, year: i32) -> anyhow::Result<BTreeSet<NaiveDate>>;
}

/// Public holiday API answering `GET <url>?year=YYYY`.
pub struct HttpHolidaySource {
    client: reqwest::Client,
    url: String,
}

impl HttpHolidaySource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build holiday HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl HolidaySource for HttpHolidaySource {
    async fn fetch(&self, year: i32) -> anyhow::Result<BTreeSet<NaiveDate>> {
        let resp = self
            .client
            .get(&self.url)
            .query(&[("year", year)])
            .send()
            .await
            .with_context(|| format!("holiday request for {year} failed"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("holiday source answered {status} for {year}"));
        }

        let payload: Value = resp.json().await.context("holiday payload is not JSON")?;
        Ok(parse_holiday_payload(&payload))
    }
}

/// Accepts either a flat array of `{holiday_date}` objects or an object whose
/// values are such arrays. Entries without a usable date are skipped.
pub fn parse_holiday_payload(payload: &Value) -> BTreeSet<NaiveDate> {
    let entries: Vec<&Value> = match payload {
        Value::Array(items) => items.iter().collect(),
        Value::Object(groups) => groups
            .values()
            .filter_map(Value::as_array)
            .flatten()
            .collect(),
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|e| e.get("holiday_date").and_then(Value::as_str))
        .filter_map(parse_loose_date)
        .collect()
}

/// `YYYY-M-D` with optional zero padding.
fn parse_loose_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().splitn(3, '-');
    let year = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let day = parts.next()?.parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[derive(Debug, Clone)]
pub struct HolidayEntry {
    pub dates: BTreeSet<NaiveDate>,
    pub fetched_at: DateTime<Utc>,
}

/// Year-keyed holiday cache in front of a [`HolidaySource`].
///
/// A year is fetched at most once for the life of the process unless
/// [`refresh`](Self::refresh) is called. A failed fetch caches an empty set.
pub struct HolidayCalendar {
    source: Arc<dyn HolidaySource>,
    cache: Cache<i32, Arc<HolidayEntry>>,
}

impl HolidayCalendar {
    pub fn new(source: Arc<dyn HolidaySource>) -> Self {
        Self {
            source,
            cache: Cache::builder().build(),
        }
    }

    async fn load(&self, year: i32) -> Arc<HolidayEntry> {
        let dates = match self.source.fetch(year).await {
            Ok(dates) => {
                info!(year, count = dates.len(), "Fetched public holidays");
                dates
            }
            Err(e) => {
                warn!(year, error = %e, "Holiday fetch failed, treating year as holiday-free");
                BTreeSet::new()
            }
        };
        Arc::new(HolidayEntry {
            dates,
            fetched_at: Utc::now(),
        })
    }

    pub async fn holidays_for(&self, year: i32) -> Arc<HolidayEntry> {
        self.cache.get_with(year, self.load(year)).await
    }

    pub async fn refresh(&self, year: i32) -> Arc<HolidayEntry> {
        let entry = self.load(year).await;
        self.cache.insert(year, entry.clone()).await;
        debug!(year, "Holiday cache refreshed");
        entry
    }

    pub fn is_weekend(date: NaiveDate) -> bool {
        matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
    }

    pub async fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays_for(date.year()).await.dates.contains(&date)
    }

    pub async fn is_working_day(&self, date: NaiveDate) -> bool {
        !Self::is_weekend(date) && !self.is_holiday(date).await
    }
}
