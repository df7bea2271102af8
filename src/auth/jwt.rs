use std::time::{SystemTime, UNIX_EPOCH};

use crate::models::{Claims, TokenType};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use uuid::Uuid;

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or_default()
}

/// Identity carried inside every token.
#[derive(Debug, Clone)]
pub struct Subject {
    pub user_id: u64,
    pub email: String,
    pub role: u8,
    pub department: Option<String>,
}

fn issue(
    subject: &Subject,
    token_type: TokenType,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    let claims = Claims {
        user_id: subject.user_id,
        sub: subject.email.clone(),
        role: subject.role,
        department: subject.department.clone(),
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok((token, claims))
}

pub fn generate_access_token(subject: &Subject, secret: &str, ttl: usize) -> Result<String, Error> {
    issue(subject, TokenType::Access, secret, ttl).map(|(token, _)| token)
}

pub fn generate_refresh_token(
    subject: &Subject,
    secret: &str,
    ttl: usize,
) -> Result<(String, Claims), Error> {
    issue(subject, TokenType::Refresh, secret, ttl)
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| e.to_string())
}

impl From<&Claims> for Subject {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.user_id,
            email: claims.sub.clone(),
            role: claims.role,
            department: claims.department.clone(),
        }
    }
}
