use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use chrono::NaiveDate;
use derive_more::Display;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::model::leave_request::{LeaveCategory, LeaveStatus, LeaveType};

/// Closest configured site to a rejected coordinate.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct NearestSite {
    pub name: String,
    /// Rounded to two decimals.
    pub distance_km: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub address: String,
}

fn nearest_label(nearest: &Option<NearestSite>) -> String {
    match nearest {
        Some(n) => format!("{} ({} km)", n.name, n.distance_km),
        None => "none configured".to_string(),
    }
}

#[derive(Debug, Display)]
pub enum AppError {
    // validation
    #[display(fmt = "End date must not be before start date")]
    InvalidRange,
    #[display(fmt = "Date range spans {} days, the limit is {}", days, limit)]
    RangeTooLong { days: i64, limit: u32 },
    #[display(fmt = "Category {} is not valid for leave type {}", category, leave_type)]
    InvalidCategory {
        leave_type: LeaveType,
        category: LeaveCategory,
    },
    #[display(fmt = "{}", _0)]
    InvalidDate(String),
    #[display(fmt = "Invalid approval level {}", _0)]
    InvalidLevel(u8),
    #[display(fmt = "{}", _0)]
    BadRequest(String),

    // conflict
    #[display(fmt = "Already checked in on {}", _0)]
    DuplicateCheckIn(NaiveDate),
    #[display(fmt = "Already checked out today")]
    AlreadyCheckedOut,
    #[display(fmt = "Leave request is not pending approval (status: {})", _0)]
    NotPending(LeaveStatus),
    #[display(fmt = "Level-1 approval is already recorded")]
    AlreadyApproved,
    #[display(fmt = "Record was modified concurrently, please retry")]
    ConcurrentUpdate,

    // policy
    #[display(
        fmt = "Location is outside every allowed site. Nearest site: {}",
        "nearest_label(nearest)"
    )]
    LocationInvalid { nearest: Option<NearestSite> },
    #[display(fmt = "Too early to check out. You can check out in {} h {} min", hours, minutes)]
    TooEarly {
        hours: i64,
        minutes: i64,
        remaining_seconds: i64,
    },
    #[display(fmt = "No check-in found for today")]
    NoCheckIn,
    #[display(
        fmt = "Insufficient leave quota. Available: {} days, required: {} days",
        available,
        required
    )]
    InsufficientQuota { available: i32, required: i32 },
    #[display(fmt = "Selected dates contain no working days (only weekends or holidays)")]
    ZeroWorkingDays,
    #[display(fmt = "An attachment is required for sick leave with a certificate")]
    MissingAttachment,
    #[display(fmt = "Level-1 approval is required before level-2 approval")]
    Level1Required,

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),
    #[display(fmt = "{}", _0)]
    Forbidden(String),

    #[display(fmt = "Storage error: {}", _0)]
    Storage(String),
    #[display(fmt = "Database error: {}", _0)]
    Database(sqlx::Error),
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e)
    }
}

impl AppError {
    /// Stable machine-readable code returned in the `error` field.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidRange | AppError::RangeTooLong { .. } => "INVALID_RANGE",
            AppError::InvalidCategory { .. } => "INVALID_CATEGORY",
            AppError::InvalidDate(_) => "INVALID_DATE",
            AppError::InvalidLevel(_) => "INVALID_LEVEL",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::DuplicateCheckIn(_) => "DUPLICATE_CHECKIN",
            AppError::AlreadyCheckedOut => "ALREADY_CHECKED_OUT",
            AppError::NotPending(_) => "NOT_PENDING",
            AppError::AlreadyApproved => "ALREADY_APPROVED",
            AppError::ConcurrentUpdate => "CONCURRENT_UPDATE",
            AppError::LocationInvalid { .. } => "LOCATION_INVALID",
            AppError::TooEarly { .. } => "TOO_EARLY",
            AppError::NoCheckIn => "NO_CHECKIN",
            AppError::InsufficientQuota { .. } => "INSUFFICIENT_QUOTA",
            AppError::ZeroWorkingDays => "ZERO_WORKING_DAYS",
            AppError::MissingAttachment => "MISSING_ATTACHMENT",
            AppError::Level1Required => "LEVEL_1_REQUIRED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Database(_) => "INTERNAL_ERROR",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRange
            | AppError::RangeTooLong { .. }
            | AppError::InvalidCategory { .. }
            | AppError::InvalidDate(_)
            | AppError::InvalidLevel(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,

            AppError::DuplicateCheckIn(_)
            | AppError::AlreadyCheckedOut
            | AppError::NotPending(_)
            | AppError::AlreadyApproved
            | AppError::ConcurrentUpdate => StatusCode::CONFLICT,

            AppError::LocationInvalid { .. }
            | AppError::TooEarly { .. }
            | AppError::NoCheckIn
            | AppError::InsufficientQuota { .. }
            | AppError::ZeroWorkingDays
            | AppError::MissingAttachment
            | AppError::Level1Required => StatusCode::UNPROCESSABLE_ENTITY,

            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Storage(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = json!({
            "error": self.code(),
            "message": self.to_string(),
        });

        match self {
            AppError::LocationInvalid { nearest } => {
                body["nearest_site"] = json!(nearest);
            }
            AppError::TooEarly {
                hours,
                minutes,
                remaining_seconds,
            } => {
                body["remaining"] = json!({
                    "hours": hours,
                    "minutes": minutes,
                    "seconds": remaining_seconds,
                });
            }
            AppError::InsufficientQuota {
                available,
                required,
            } => {
                body["available"] = json!(available);
                body["required"] = json!(required);
            }
            AppError::Storage(detail) => {
                tracing::error!(error = %detail, "Storage failure");
                body["message"] = json!("Internal Server Error");
            }
            AppError::Database(e) => {
                tracing::error!(error = %e, "Database failure");
                body["message"] = json!("Internal Server Error");
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(body)
    }
}
