use crate::api::attendance::{AutoCheckoutQuery, HistoryQuery, PunchReq, TodayResponse};
use crate::api::leave_request::{
    ApproveLeave, HolidayRangeResponse, QuotaQuery, RangeQuery, RejectLeave, SubmitLeave,
};
use crate::api::task::{CreateTask, TaskView, UpdateTaskStatus};
use crate::error::NearestSite;
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::leave_quota::LeaveQuota;
use crate::model::leave_request::{LeaveCategory, LeaveRequest, LeaveStatus, LeaveType};
use crate::model::site::Site;
use crate::model::task::{Task, TaskPriority, TaskStatus};
use crate::model::user::UserSummary;
use crate::models::{LoginReqDto, TokenPair};
use crate::service::attendance::AttendanceHistory;
use crate::service::auto_checkout::SweepReport;
use crate::service::leave::SubmittedLeave;
use crate::service::quota::QuotaInfo;
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Absensi API",
        version = "1.0.0",
        description = r#"
## Attendance & Leave Management

Backend for employee attendance and leave.

### Key Features
- **Attendance**
  - GPS-validated check-in and check-out against configured sites
  - Lateness and required check-out time derived from check-in time
  - Nightly auto checkout for forgotten check-outs
- **Leave**
  - Annual quota per user and year, working days only (weekends and public holidays excluded)
  - Two-level approval: supervisor, then HR
- **Tasks**
  - Assign tasks to colleagues and track their status

### Security
Endpoints under `/api` require a **JWT Bearer** access token from `/auth/login`.

### Errors
Every error body is `{"error": CODE, "message": text}` plus context such as
`nearest_site`, `remaining` or `available`/`required`.

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,
        crate::auth::handlers::profile,

        crate::api::attendance::check_in,
        crate::api::attendance::check_out,
        crate::api::attendance::today,
        crate::api::attendance::history,
        crate::api::attendance::locations,
        crate::api::attendance::auto_checkout,

        crate::api::leave_request::quota,
        crate::api::leave_request::supervisors,
        crate::api::leave_request::leave_list,
        crate::api::leave_request::pending_approvals,
        crate::api::leave_request::active_leaves,
        crate::api::leave_request::holidays,
        crate::api::leave_request::submit_leave,
        crate::api::leave_request::get_leave,
        crate::api::leave_request::approve_leave,
        crate::api::leave_request::reject_leave,
        crate::api::leave_request::cancel_leave,

        crate::api::task::submit_task,
        crate::api::task::assigned_to_me,
        crate::api::task::assigned_by_me,
        crate::api::task::update_status,
        crate::api::task::task_detail
    ),
    components(
        schemas(
            LoginReqDto,
            TokenPair,
            PunchReq,
            TodayResponse,
            HistoryQuery,
            AutoCheckoutQuery,
            AttendanceRecord,
            AttendanceStatus,
            AttendanceHistory,
            SweepReport,
            NearestSite,
            Site,
            SubmitLeave,
            ApproveLeave,
            RejectLeave,
            QuotaQuery,
            RangeQuery,
            HolidayRangeResponse,
            LeaveRequest,
            LeaveType,
            LeaveCategory,
            LeaveStatus,
            LeaveQuota,
            QuotaInfo,
            SubmittedLeave,
            UserSummary,
            CreateTask,
            UpdateTaskStatus,
            Task,
            TaskView,
            TaskStatus,
            TaskPriority
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Login and token management"),
        (name = "Attendance", description = "Attendance management APIs"),
        (name = "Leave", description = "Leave management APIs"),
        (name = "Task", description = "Task assignment APIs"),
    )
)]
pub struct ApiDoc;
