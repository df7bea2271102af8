use crate::{
    auth::{
        auth::AuthUser,
        jwt::{Subject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    model::user::User,
    models::{Claims, LoginReqDto, TokenPair, TokenType},
};
use actix_web::{HttpRequest, HttpResponse, Responder, get, web};
use serde_json::json;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues a token pair and records the refresh token's jti.
async fn issue_pair(
    subject: &Subject,
    pool: &MySqlPool,
    config: &Config,
) -> Result<TokenPair, HttpResponse> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            HttpResponse::InternalServerError().finish()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                HttpResponse::InternalServerError().finish()
            },
        )?;

    debug!(user_id = subject.user_id, jti = %refresh_claims.jti, "Storing refresh token");

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginReqDto,
    responses(
        (status = 200, description = "Token pair issued", body = TokenPair),
        (status = 400, description = "Email or password missing"),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Auth"
)]
#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(email = %user.email)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.email.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty email or password");
        return HttpResponse::BadRequest().body("Email or password required");
    }

    let db_user = match sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, nip, role_id, department, is_active
        FROM users
        WHERE email = ?
        "#,
    )
    .bind(user.email.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(u)) if u.is_active => {
            debug!(user_id = u.id, "User found");
            u
        }
        Ok(Some(_)) => {
            info!("Login refused: account inactive");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password_hash) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    let subject = Subject {
        user_id: db_user.id,
        email: db_user.email.clone(),
        role: db_user.role_id,
        department: db_user.department.clone(),
    };

    let pair = match issue_pair(&subject, pool.get_ref(), &config).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(db_user.id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = db_user.id, "Login successful");
    HttpResponse::Ok().json(pair)
}

#[derive(sqlx::FromRow)]
struct StoredRefresh {
    id: u64,
    revoked: bool,
}

#[utoipa::path(
    post,
    path = "/auth/refresh",
    responses(
        (status = 200, description = "Rotated token pair", body = TokenPair),
        (status = 401, description = "Missing, invalid or revoked refresh token")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::Unauthorized().body("No token");
    };

    let claims: Claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    let record = match sqlx::query_as::<_, StoredRefresh>(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(r)) if !r.revoked => r,
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // rotate: the presented token can't be used again
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ?")
        .bind(record.id)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token");
        return HttpResponse::InternalServerError().finish();
    }

    match issue_pair(&Subject::from(&claims), pool.get_ref(), &config).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    responses((status = 204, description = "Refresh token revoked (idempotent)")),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[utoipa::path(
    get,
    path = "/api/auth/profile",
    responses(
        (status = 200, description = "Current user", body = Object, example = json!({
            "id": 42,
            "email": "siti@example.ac.id",
            "name": "Siti Rahma",
            "nip": "198702012015",
            "role_id": 3,
            "department": "Faculty of Engineering"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Auth"
)]
#[get("/auth/profile")]
pub async fn profile(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, password_hash, name, nip, role_id, department, is_active
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        error!(error = %e, user_id = auth.user_id, "Failed to load profile");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?
    .ok_or_else(|| actix_web::error::ErrorNotFound("User not found"))?;

    Ok(HttpResponse::Ok().json(json!({
        "id": user.id,
        "email": user.email,
        "name": user.name,
        "nip": user.nip,
        "role_id": user.role_id,
        "department": user.department,
        "is_active": user.is_active,
    })))
}
