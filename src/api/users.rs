//! User listing endpoint.

use axum::{extract::State, Json};
use std::collections::HashMap;
use std::sync::Arc;

use crate::db::{Dataset, Template, User, UserWithRelations};
use crate::AppState;

use super::error::ApiError;

/// List every user with datasets and templates eager-loaded. No
/// filtering or pagination; password hashes are stripped during
/// serialization.
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserWithRelations>>, ApiError> {
    let users: Vec<User> = sqlx::query_as("SELECT * FROM users ORDER BY created_at")
        .fetch_all(&state.db)
        .await?;

    let datasets: Vec<Dataset> = sqlx::query_as("SELECT * FROM datasets ORDER BY created_at")
        .fetch_all(&state.db)
        .await?;

    let templates: Vec<Template> = sqlx::query_as("SELECT * FROM templates ORDER BY created_at")
        .fetch_all(&state.db)
        .await?;

    let mut datasets_by_user: HashMap<String, Vec<Dataset>> = HashMap::new();
    for dataset in datasets {
        datasets_by_user
            .entry(dataset.user_id.clone())
            .or_default()
            .push(dataset);
    }

    let mut templates_by_user: HashMap<String, Vec<Template>> = HashMap::new();
    for template in templates {
        templates_by_user
            .entry(template.user_id.clone())
            .or_default()
            .push(template);
    }

    let listing = users
        .into_iter()
        .map(|user| {
            let datasets = datasets_by_user.remove(&user.id).unwrap_or_default();
            let templates = templates_by_user.remove(&user.id).unwrap_or_default();
            UserWithRelations {
                user,
                datasets,
                templates,
            }
        })
        .collect();

    Ok(Json(listing))
}
