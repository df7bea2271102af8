use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    OnTime,
    Late,
    Absent,
    /// Closed by the nightly sweep instead of a real check-out.
    Incomplete,
}

try_from_string!(AttendanceStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 42)]
    pub user_id: u64,
    /// Calendar day of the check-in, in business time.
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub work_date: NaiveDate,

    #[schema(example = "2026-01-05T00:25:00Z", value_type = String, format = "date-time")]
    pub check_in_time: DateTime<Utc>,
    pub check_in_latitude: f64,
    pub check_in_longitude: f64,
    #[schema(example = "MNC Tower")]
    pub check_in_location: String,
    pub check_in_photo_url: Option<String>,

    #[schema(value_type = Option<String>, format = "date-time")]
    pub check_out_time: Option<DateTime<Utc>>,
    pub check_out_latitude: Option<f64>,
    pub check_out_longitude: Option<f64>,
    pub check_out_location: Option<String>,
    pub check_out_photo_url: Option<String>,

    #[schema(example = "2026-01-05T10:00:00Z", value_type = String, format = "date-time")]
    pub required_checkout_time: DateTime<Utc>,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub notes: Option<String>,
}

impl AttendanceRecord {
    pub fn is_open(&self) -> bool {
        self.check_out_time.is_none()
    }
}

/// Row written at check-in.
#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: u64,
    pub work_date: NaiveDate,
    pub check_in_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub location: String,
    pub photo_url: Option<String>,
    pub required_checkout_time: DateTime<Utc>,
    pub status: AttendanceStatus,
}

/// Fields set when a record is closed, by the user or by the sweep.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub location: String,
    pub photo_url: Option<String>,
    /// `None` keeps the status computed at check-in.
    pub status: Option<AttendanceStatus>,
}
