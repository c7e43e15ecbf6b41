use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    /// Never leaves the server. Excluded from every serialized response.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub name: Option<String>,
    pub created_at: String,
}

/// The non-secret projection of a [`User`] persisted client-side in the
/// session cookie. Must never carry credential material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<User> for SessionUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Dataset {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Template {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub created_at: String,
}

/// A user row with its relations eager-loaded, as returned by the
/// listing endpoint.
#[derive(Debug, Serialize)]
pub struct UserWithRelations {
    #[serde(flatten)]
    pub user: User,
    pub datasets: Vec<Dataset>,
    pub templates: Vec<Template>,
}

// DTOs for API

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub success: bool,
    pub user: SessionUser,
}
