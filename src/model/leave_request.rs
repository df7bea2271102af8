use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveType {
    Annual,
    Sick,
    Permission,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveCategory {
    Annual,
    SickWithCertificate,
    SickWithoutCertificate,
    OfficialTrip,
    Personal,
}

impl LeaveCategory {
    /// The leave type this category belongs to.
    pub fn leave_type(self) -> LeaveType {
        match self {
            LeaveCategory::Annual => LeaveType::Annual,
            LeaveCategory::SickWithCertificate | LeaveCategory::SickWithoutCertificate => {
                LeaveType::Sick
            }
            LeaveCategory::OfficialTrip | LeaveCategory::Personal => LeaveType::Permission,
        }
    }

    pub fn deducts_quota(self) -> bool {
        matches!(
            self,
            LeaveCategory::Annual | LeaveCategory::SickWithoutCertificate
        )
    }

    pub fn requires_attachment(self) -> bool {
        self == LeaveCategory::SickWithCertificate
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    #[serde(rename = "approved_level_1")]
    #[strum(serialize = "approved_level_1")]
    ApprovedLevel1,
    #[serde(rename = "approved_level_2")]
    #[strum(serialize = "approved_level_2")]
    ApprovedLevel2,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn is_approved(self) -> bool {
        matches!(self, LeaveStatus::ApprovedLevel1 | LeaveStatus::ApprovedLevel2)
    }
}

try_from_string!(LeaveType, LeaveCategory, LeaveStatus);

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveRequest {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 42)]
    pub user_id: u64,
    /// Level-1 approver chosen by the submitter.
    pub supervisor_id: Option<u64>,
    #[sqlx(try_from = "String")]
    pub leave_type: LeaveType,
    #[sqlx(try_from = "String")]
    pub category: LeaveCategory,
    #[schema(example = "2026-01-05", value_type = String, format = "date")]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", value_type = String, format = "date")]
    pub end_date: NaiveDate,
    /// Working days in the range, fixed at submission.
    #[schema(example = 3)]
    pub total_days: i32,
    pub reason: String,
    pub attachment_url: Option<String>,
    #[sqlx(try_from = "String")]
    pub status: LeaveStatus,

    pub approved_by_level_1: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at_level_1: Option<DateTime<Utc>>,
    pub approval_notes_level_1: Option<String>,
    pub approved_by_level_2: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub approved_at_level_2: Option<DateTime<Utc>>,
    pub approval_notes_level_2: Option<String>,

    pub rejected_by: Option<u64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,

    pub deducted_from_quota: bool,
    #[schema(example = 2026)]
    pub quota_year: i32,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
}

/// Row written at submission.
#[derive(Debug, Clone)]
pub struct NewLeave {
    pub user_id: u64,
    pub supervisor_id: Option<u64>,
    pub category: LeaveCategory,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i32,
    pub reason: String,
    pub attachment_url: Option<String>,
    pub deducted_from_quota: bool,
    pub quota_year: i32,
    pub created_at: DateTime<Utc>,
}
