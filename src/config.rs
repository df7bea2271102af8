use std::{env, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, anyhow};
use chrono::FixedOffset;
use dotenvy::dotenv;

use crate::model::site::{Site, default_sites};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,
    pub log_dir: String,
    pub log_level: tracing::Level,

    /// Every attendance and leave rule is evaluated in this offset.
    pub business_offset: FixedOffset,
    pub sites: Vec<Site>,

    pub holiday_api_url: String,
    pub holiday_fetch_timeout: Duration,

    pub annual_leave_quota: i32,
    /// Longest date range, in days, accepted for leave and holiday queries.
    pub max_leave_span_days: u32,
    /// 1: supervisor approval is final. 2: HR approval follows the supervisor.
    pub approval_levels: u8,

    pub upload_dir: PathBuf,
    pub max_attachment_bytes: usize,
    pub scheduler_enabled: bool,
}

fn var_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{key} has an invalid value {raw:?}: {e}")),
        Err(_) => Ok(default),
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();

        let offset_minutes: i32 = var_or("BUSINESS_UTC_OFFSET_MINUTES", 7 * 60)?; // Asia/Jakarta
        let business_offset = FixedOffset::east_opt(offset_minutes * 60)
            .ok_or_else(|| anyhow!("BUSINESS_UTC_OFFSET_MINUTES out of range: {offset_minutes}"))?;

        let sites = match env::var("ATTENDANCE_SITES") {
            Ok(raw) => serde_json::from_str::<Vec<Site>>(&raw)
                .context("ATTENDANCE_SITES must be a JSON array of sites")?,
            Err(_) => default_sites(),
        };

        let approval_levels: u8 = var_or("LEAVE_APPROVAL_LEVELS", 2)?;
        if !(1..=2).contains(&approval_levels) {
            return Err(anyhow!("LEAVE_APPROVAL_LEVELS must be 1 or 2"));
        }

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: var_or("ACCESS_TOKEN_TTL", 900)?, // default 15 min
            refresh_token_ttl: var_or("REFRESH_TOKEN_TTL", 604_800)?, // default 7 days

            rate_login_per_min: var_or("RATE_LOGIN_PER_MIN", 60)?,
            rate_refresh_per_min: var_or("RATE_REFRESH_PER_MIN", 30)?,
            rate_protected_per_min: var_or("RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api".to_string()),
            log_dir: env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_level: var_or("LOG_LEVEL", tracing::Level::DEBUG)?,

            business_offset,
            sites,

            holiday_api_url: env::var("HOLIDAY_API_URL")
                .unwrap_or_else(|_| "https://api-harilibur.vercel.app/api".to_string()),
            holiday_fetch_timeout: Duration::from_secs(var_or("HOLIDAY_FETCH_TIMEOUT_SECS", 10)?),

            annual_leave_quota: var_or("ANNUAL_LEAVE_QUOTA", 12)?,
            max_leave_span_days: var_or("MAX_LEAVE_SPAN_DAYS", 366)?,
            approval_levels,

            upload_dir: PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string())),
            max_attachment_bytes: var_or("MAX_ATTACHMENT_BYTES", 5 * 1024 * 1024)?,
            scheduler_enabled: var_or("SCHEDULER_ENABLED", true)?,
        })
    }
}

#[cfg(test)]
impl Config {
    pub fn for_tests() -> Self {
        Self {
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            server_addr: "127.0.0.1:0".to_string(),
            access_token_ttl: 900,
            refresh_token_ttl: 3600,
            rate_login_per_min: 60,
            rate_refresh_per_min: 30,
            rate_protected_per_min: 1000,
            api_prefix: "/api".to_string(),
            log_dir: "logs".to_string(),
            log_level: tracing::Level::DEBUG,
            business_offset: FixedOffset::east_opt(7 * 3600).expect("valid offset"),
            sites: default_sites(),
            holiday_api_url: String::new(),
            holiday_fetch_timeout: Duration::from_secs(1),
            annual_leave_quota: 12,
            max_leave_span_days: 366,
            approval_levels: 2,
            upload_dir: std::env::temp_dir().join("absensi-test-uploads"),
            max_attachment_bytes: 1024,
            scheduler_enabled: false,
        }
    }
}
