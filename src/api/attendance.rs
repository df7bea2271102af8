use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{attendance::AttendanceRecord, site::Site},
    service::{
        Services,
        attendance::{AttendanceHistory, Punch},
        auto_checkout::SweepReport,
    },
    storage::decode_upload,
    store::{DateRange, Page},
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct PunchReq {
    #[schema(example = -6.1840816)]
    pub latitude: f64,
    #[schema(example = 106.8266783)]
    pub longitude: f64,
    /// Location label shown by the client; the stored site name comes from the coordinates.
    #[schema(example = "MNC Tower")]
    pub location: Option<String>,
    /// Selfie as base64 or a `data:image/...;base64,` URL.
    pub photo: Option<String>,
    /// Only honoured for HR/Admin, for corrections.
    #[schema(value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct TodayResponse {
    pub has_checked_in: bool,
    pub has_checked_out: bool,
    pub attendance: Option<AttendanceRecord>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct HistoryQuery {
    #[schema(example = "2026-01-01", format = "date", value_type = Option<String>)]
    pub start_date: Option<NaiveDate>,
    #[schema(example = "2026-01-31", format = "date", value_type = Option<String>)]
    pub end_date: Option<NaiveDate>,
    #[schema(example = 1)]
    pub page: Option<u32>,
    #[schema(example = 20)]
    pub page_size: Option<u32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct AutoCheckoutQuery {
    /// Defaults to yesterday.
    #[schema(example = "2026-01-05", format = "date", value_type = Option<String>)]
    pub target_date: Option<NaiveDate>,
}

fn build_punch(auth: &AuthUser, req: PunchReq, config: &Config) -> Result<Punch, AppError> {
    if !(-90.0..=90.0).contains(&req.latitude) || !(-180.0..=180.0).contains(&req.longitude) {
        return Err(AppError::BadRequest("Coordinates out of range".to_string()));
    }

    let photo = req
        .photo
        .as_deref()
        .map(|raw| decode_upload(raw, "jpg", config.max_attachment_bytes))
        .transpose()?;

    let at = match req.timestamp {
        Some(ts) if auth.role.is_hr_or_admin() => Some(ts),
        Some(_) => {
            tracing::debug!(user_id = auth.user_id, "Ignoring client timestamp");
            None
        }
        None => None,
    };

    Ok(Punch {
        user_id: auth.user_id,
        latitude: req.latitude,
        longitude: req.longitude,
        photo,
        at,
    })
}

/// Check-in endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-in",
    request_body = PunchReq,
    responses(
        (status = 200, description = "Checked in successfully", body = AttendanceRecord),
        (status = 409, description = "Already checked in today", body = Object, example = json!({
            "error": "DUPLICATE_CHECKIN",
            "message": "Already checked in on 2026-01-05"
        })),
        (status = 422, description = "Outside every allowed site", body = Object, example = json!({
            "error": "LOCATION_INVALID",
            "message": "Location is outside every allowed site. Nearest site: MNC Tower (1.27 km)",
            "nearest_site": {"name": "MNC Tower", "distance_km": 1.27, "radius_km": 0.5}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_in(
    auth: AuthUser,
    services: web::Data<Services>,
    config: web::Data<Config>,
    payload: web::Json<PunchReq>,
) -> actix_web::Result<impl Responder> {
    let punch = build_punch(&auth, payload.into_inner(), &config)?;
    let record = services.attendance.check_in(punch).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked in successfully",
        "data": record,
    })))
}

/// Check-out endpoint
#[utoipa::path(
    post,
    path = "/api/attendance/check-out",
    request_body = PunchReq,
    responses(
        (status = 200, description = "Checked out successfully", body = AttendanceRecord),
        (status = 409, description = "Already checked out"),
        (status = 422, description = "No check-in today, too early, or outside every site", body = Object, example = json!({
            "error": "TOO_EARLY",
            "message": "Too early to check out. You can check out in 2 h 5 min",
            "remaining": {"hours": 2, "minutes": 5, "seconds": 7500}
        })),
        (status = 401, description = "Unauthorized"),
        (status = 500, description = "Internal server error")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn check_out(
    auth: AuthUser,
    services: web::Data<Services>,
    config: web::Data<Config>,
    payload: web::Json<PunchReq>,
) -> actix_web::Result<impl Responder> {
    let punch = build_punch(&auth, payload.into_inner(), &config)?;
    let record = services.attendance.check_out(punch).await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Checked out successfully",
        "data": record,
    })))
}

#[utoipa::path(
    get,
    path = "/api/attendance/today",
    responses(
        (status = 200, description = "Today's attendance, if any", body = TodayResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn today(
    auth: AuthUser,
    services: web::Data<Services>,
) -> actix_web::Result<impl Responder> {
    let record = services.attendance.get_today(auth.user_id).await?;

    Ok(HttpResponse::Ok().json(TodayResponse {
        has_checked_in: record.is_some(),
        has_checked_out: record.as_ref().is_some_and(|r| !r.is_open()),
        attendance: record,
    }))
}

#[utoipa::path(
    get,
    path = "/api/attendance/history",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Paginated attendance history", body = AttendanceHistory),
        (status = 400, description = "end_date before start_date"),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn history(
    auth: AuthUser,
    services: web::Data<Services>,
    query: web::Query<HistoryQuery>,
) -> actix_web::Result<impl Responder> {
    let range = DateRange {
        start: query.start_date,
        end: query.end_date,
    };
    if let (Some(start), Some(end)) = (range.start, range.end) {
        if end < start {
            return Err(AppError::InvalidRange.into());
        }
    }

    let page = services
        .attendance
        .get_history(auth.user_id, range, Page::new(query.page, query.page_size))
        .await?;

    Ok(HttpResponse::Ok().json(page))
}

#[utoipa::path(
    get,
    path = "/api/attendance/locations",
    responses(
        (status = 200, description = "Sites where attendance is accepted", body = [Site]),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn locations(_auth: AuthUser, services: web::Data<Services>) -> impl Responder {
    HttpResponse::Ok().json(services.geo.sites())
}

/// Closes open records of a past day (HR/Admin)
#[utoipa::path(
    post,
    path = "/api/attendance/admin/auto-checkout",
    params(AutoCheckoutQuery),
    responses(
        (status = 200, description = "Sweep finished", body = SweepReport),
        (status = 400, description = "Target date is in the future"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Attendance"
)]
pub async fn auto_checkout(
    auth: AuthUser,
    services: web::Data<Services>,
    query: web::Query<AutoCheckoutQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_admin()?;

    let target = query
        .target_date
        .unwrap_or_else(|| services.clock.yesterday());
    let report = services.sweeper.sweep_for_date(target).await?;

    tracing::info!(
        triggered_by = auth.user_id,
        %target,
        processed = report.processed,
        "Manual auto checkout"
    );
    Ok(HttpResponse::Ok().json(report))
}
