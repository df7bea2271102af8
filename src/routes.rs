use crate::{
    api::{attendance, leave_request, task},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(
    requests_per_min: u32,
) -> anyhow::Result<Governor<PeerIpKeyExtractor, NoOpMiddleware>> {
    let requests_per_min = requests_per_min.max(1);
    let per_ms = (60_000 / u64::from(requests_per_min)).max(1);
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms)
        .burst_size(requests_per_min)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .ok_or_else(|| anyhow::anyhow!("invalid rate limit: {requests_per_min}/min"))?;
    Ok(Governor::new(&cfg))
}

/// Rate limiters shared by every worker.
#[derive(Clone)]
pub struct Limiters {
    login: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    refresh: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
    protected: Arc<Governor<PeerIpKeyExtractor, NoOpMiddleware>>,
}

impl Limiters {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            login: Arc::new(build_limiter(config.rate_login_per_min)?),
            refresh: Arc::new(build_limiter(config.rate_refresh_per_min)?),
            protected: Arc::new(build_limiter(config.rate_protected_per_min)?),
        })
    }
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config, limiters: &Limiters) {
    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(limiters.refresh.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(limiters.login.clone())
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware)) // authentication
            .wrap(limiters.protected.clone()) // rate limiting
            .service(handlers::profile)
            .service(
                web::scope("/attendance")
                    .route("/check-in", web::post().to(attendance::check_in))
                    .route("/check-out", web::post().to(attendance::check_out))
                    .route("/today", web::get().to(attendance::today))
                    .route("/history", web::get().to(attendance::history))
                    .route("/locations", web::get().to(attendance::locations))
                    .route(
                        "/admin/auto-checkout",
                        web::post().to(attendance::auto_checkout),
                    ),
            )
            .service(
                web::scope("/leave")
                    .route("/quota", web::get().to(leave_request::quota))
                    .route("/supervisors", web::get().to(leave_request::supervisors))
                    .route("/list", web::get().to(leave_request::leave_list))
                    .route(
                        "/pending-approvals",
                        web::get().to(leave_request::pending_approvals),
                    )
                    .route("/active-leaves", web::get().to(leave_request::active_leaves))
                    .route("/holidays", web::get().to(leave_request::holidays))
                    .route("/submit", web::post().to(leave_request::submit_leave))
                    // /leave/{id}
                    .route("/{id}", web::get().to(leave_request::get_leave))
                    .route("/{id}/approve", web::post().to(leave_request::approve_leave))
                    .route("/{id}/reject", web::post().to(leave_request::reject_leave))
                    .route("/{id}/cancel", web::post().to(leave_request::cancel_leave)),
            )
            .service(
                web::scope("/task")
                    .route("/submit", web::post().to(task::submit_task))
                    .route("/assigned-to-me", web::get().to(task::assigned_to_me))
                    .route("/assigned-by-me", web::get().to(task::assigned_by_me))
                    .route("/{id}/update-status", web::post().to(task::update_status))
                    .route("/{id}", web::get().to(task::task_detail)),
            ),
    );
}

// LOGIN
//  ├─ access_token (15 min)
//  └─ refresh_token (7 days)

// API REQUEST
//  └─ Authorization: Bearer access_token

// ACCESS EXPIRED
//  └─ POST /auth/refresh with refresh_token
//       └─ returns a new pair; the old refresh token is revoked
