use crate::{config::Config, model::role::Role, models::TokenType, service::leave::Approver};
use actix_web::{
    FromRequest, HttpMessage, HttpRequest, dev::Payload, error::ErrorUnauthorized, web::Data,
};
use futures::future::{Ready, ready};

use super::jwt::verify_token;

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ErrorUnauthorized("Missing token"))),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(actix_web::error::ErrorInternalServerError(
                    "Config missing",
                )));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) if c.token_type == TokenType::Access => c,
            _ => return ready(Err(ErrorUnauthorized("Invalid token"))),
        };

        let role = match Role::from_id(claims.role) {
            Some(r) => r,
            None => return ready(Err(ErrorUnauthorized("Invalid role"))),
        };

        ready(Ok(AuthUser {
            user_id: claims.user_id,
            email: claims.sub,
            role,
            department: claims.department,
        }))
    }
}

impl AuthUser {
    pub fn require_hr_or_admin(&self) -> actix_web::Result<()> {
        if self.role.is_hr_or_admin() {
            Ok(())
        } else {
            Err(actix_web::error::ErrorForbidden("HR/Admin only"))
        }
    }

    pub fn approver(&self) -> Approver {
        Approver {
            user_id: self.user_id,
            is_hr: self.role.is_hr_or_admin(),
        }
    }
}
