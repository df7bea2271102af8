use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: u64,
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub nip: String,
    pub role_id: u8,
    pub department: Option<String>,
    pub is_active: bool,
}

/// User fields that are safe to return from the API.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct UserSummary {
    #[schema(example = 42)]
    pub id: u64,
    #[schema(example = "Siti Rahma")]
    pub name: String,
    #[schema(example = "198702012015")]
    pub nip: String,
    #[schema(example = "Faculty of Engineering")]
    pub department: Option<String>,
}
