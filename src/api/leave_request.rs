use crate::{
    auth::auth::AuthUser,
    config::Config,
    error::AppError,
    model::{
        leave_request::{LeaveCategory, LeaveRequest, LeaveType},
        user::UserSummary,
    },
    service::{
        Services,
        leave::{LeaveSubmission, SubmittedLeave},
        quota::QuotaInfo,
    },
    storage::decode_upload,
};
use actix_web::{HttpResponse, Responder, web};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct SubmitLeave {
    #[schema(example = "annual")]
    pub leave_type: LeaveType,
    #[schema(example = "annual")]
    pub category: LeaveCategory,
    #[schema(example = "2026-01-05", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-07", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family event")]
    pub reason: String,
    /// Level-1 approver, picked from `/leave/supervisors`.
    #[schema(example = 20)]
    pub supervisor_id: Option<u64>,
    /// Base64 file or data URL; required for `sick_with_certificate`.
    pub attachment: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct ApproveLeave {
    /// 1 = supervisor, 2 = HR
    #[schema(example = 1)]
    pub level: u8,
    pub notes: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeave {
    #[schema(example = "Project deadline in that week")]
    pub reason: String,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct QuotaQuery {
    /// Defaults to the current year.
    #[schema(example = 2026)]
    pub year: Option<i32>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct RangeQuery {
    #[schema(example = "2026-01-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-01-31", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct HolidayRangeResponse {
    #[schema(value_type = Vec<String>)]
    pub holidays: Vec<NaiveDate>,
    #[schema(example = 21)]
    pub working_days: u32,
}

#[utoipa::path(
    get,
    path = "/api/leave/quota",
    params(QuotaQuery),
    responses(
        (status = 200, description = "Annual leave balance", body = QuotaInfo),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn quota(
    auth: AuthUser,
    services: web::Data<Services>,
    query: web::Query<QuotaQuery>,
) -> actix_web::Result<impl Responder> {
    let year = query.year.unwrap_or_else(|| services.clock.today().year());
    let info = services.ledger.quota_info(auth.user_id, year).await?;
    Ok(HttpResponse::Ok().json(info))
}

/// Active colleagues of the same department who can approve at level 1
#[utoipa::path(
    get,
    path = "/api/leave/supervisors",
    responses(
        (status = 200, description = "Possible level-1 approvers", body = [UserSummary]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn supervisors(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let Some(department) = auth.department.as_deref() else {
        return Ok(HttpResponse::Ok().json(Vec::<UserSummary>::new()));
    };

    let users = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, name, nip, department
        FROM users
        WHERE department = ?
          AND id <> ?
          AND is_active = TRUE
        ORDER BY name
        "#,
    )
    .bind(department)
    .bind(auth.user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, user_id = auth.user_id, "Failed to list supervisors");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/api/leave/list",
    responses(
        (status = 200, description = "Own leave requests, newest first", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    services: web::Data<Services>,
) -> actix_web::Result<impl Responder> {
    let leaves = services.leaves.list_for_user(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leave/pending-approvals",
    responses(
        (status = 200, description = "Pending requests naming the caller as supervisor", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending_approvals(
    auth: AuthUser,
    services: web::Data<Services>,
) -> actix_web::Result<impl Responder> {
    let leaves = services.leaves.pending_for_supervisor(auth.user_id).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leave/active-leaves",
    responses(
        (status = 200, description = "Approved leaves covering today", body = [LeaveRequest]),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn active_leaves(
    _auth: AuthUser,
    services: web::Data<Services>,
) -> actix_web::Result<impl Responder> {
    let leaves = services.leaves.active_on(services.clock.today()).await?;
    Ok(HttpResponse::Ok().json(leaves))
}

#[utoipa::path(
    get,
    path = "/api/leave/holidays",
    params(RangeQuery),
    responses(
        (status = 200, description = "Public holidays and working days in the range", body = HolidayRangeResponse),
        (status = 400, description = "end_date before start_date, or range too long"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn holidays(
    _auth: AuthUser,
    services: web::Data<Services>,
    query: web::Query<RangeQuery>,
) -> actix_web::Result<impl Responder> {
    let tally = services.days.tally(query.start_date, query.end_date).await?;

    Ok(HttpResponse::Ok().json(HolidayRangeResponse {
        holidays: tally.holidays,
        working_days: tally.working_days,
    }))
}

#[utoipa::path(
    post,
    path = "/api/leave/submit",
    request_body = SubmitLeave,
    responses(
        (status = 200, description = "Leave request submitted", body = SubmittedLeave),
        (status = 400, description = "Invalid category, range or attachment"),
        (status = 422, description = "Quota, working days or attachment policy", body = Object, example = json!({
            "error": "INSUFFICIENT_QUOTA",
            "message": "Insufficient leave quota. Available: 2 days, required: 3 days",
            "available": 2,
            "required": 3
        })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn submit_leave(
    auth: AuthUser,
    services: web::Data<Services>,
    config: web::Data<Config>,
    payload: web::Json<SubmitLeave>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    if payload.reason.trim().is_empty() {
        return Err(AppError::BadRequest("Reason must not be empty".to_string()).into());
    }
    if payload.supervisor_id == Some(auth.user_id) {
        return Err(
            AppError::BadRequest("You cannot supervise your own request".to_string()).into(),
        );
    }

    let attachment = payload
        .attachment
        .as_deref()
        .map(|raw| decode_upload(raw, "pdf", config.max_attachment_bytes))
        .transpose()?;

    let submitted = services
        .leaves
        .submit(LeaveSubmission {
            user_id: auth.user_id,
            leave_type: payload.leave_type,
            category: payload.category,
            start_date: payload.start_date,
            end_date: payload.end_date,
            reason: payload.reason.trim().to_string(),
            attachment,
            supervisor_id: payload.supervisor_id,
        })
        .await?;

    Ok(HttpResponse::Ok().json(submitted))
}

/// Detail of one request; visible to its owner, its supervisor and HR
#[utoipa::path(
    get,
    path = "/api/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    services: web::Data<Services>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = services.leaves.find(path.into_inner()).await?;

    let visible = leave.user_id == auth.user_id
        || leave.supervisor_id == Some(auth.user_id)
        || auth.role.is_hr_or_admin();
    if !visible {
        return Err(AppError::Forbidden("Not your leave request".to_string()).into());
    }

    Ok(HttpResponse::Ok().json(leave))
}

#[utoipa::path(
    post,
    path = "/api/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to approve")
    ),
    request_body = ApproveLeave,
    responses(
        (status = 200, description = "Approval recorded", body = LeaveRequest),
        (status = 400, description = "Invalid level"),
        (status = 403, description = "Caller may not approve at this level"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Not pending, or level 1 already recorded"),
        (status = 422, description = "Level 1 approval missing", body = Object, example = json!({
            "error": "LEVEL_1_REQUIRED",
            "message": "Level-1 approval is required before level-2 approval"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn approve_leave(
    auth: AuthUser,
    services: web::Data<Services>,
    path: web::Path<u64>,
    payload: web::Json<ApproveLeave>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let leave = services
        .leaves
        .approve(path.into_inner(), payload.level, auth.approver(), payload.notes)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Leave approved at level {}", payload.level),
        "data": leave,
    })))
}

#[utoipa::path(
    post,
    path = "/api/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to reject")
    ),
    request_body = RejectLeave,
    responses(
        (status = 200, description = "Leave rejected; deducted days returned", body = LeaveRequest),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn reject_leave(
    auth: AuthUser,
    services: web::Data<Services>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeave>,
) -> actix_web::Result<impl Responder> {
    let leave = services
        .leaves
        .reject(path.into_inner(), auth.approver(), payload.into_inner().reason)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave rejected",
        "quota_refunded": leave.deducted_from_quota,
        "data": leave,
    })))
}

#[utoipa::path(
    post,
    path = "/api/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to cancel")
    ),
    responses(
        (status = 200, description = "Leave cancelled; deducted days returned", body = LeaveRequest),
        (status = 403, description = "Not the requester"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request is not pending")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn cancel_leave(
    auth: AuthUser,
    services: web::Data<Services>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave = services
        .leaves
        .cancel(path.into_inner(), auth.user_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "message": "Leave cancelled",
        "quota_refunded": leave.deducted_from_quota,
        "data": leave,
    })))
}
