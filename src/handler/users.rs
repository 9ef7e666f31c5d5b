use std::sync::Arc;

use axum::{
    response::IntoResponse,
    routing::{get, put},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::userdb::UserExt,
    error::HttpError,
    middleware::AuthUser,
    models::usermodel::{UserProfile, UserRole},
    AppState,
};

#[derive(Debug, Deserialize)]
pub struct SetRoleDto {
    pub role: UserRole,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub role: Option<UserRole>,
}

pub fn users_handler() -> Router {
    Router::new()
        .route("/me", get(get_me))
        .route("/me/role", put(set_role))
}

/// Session bootstrap: the identity comes from the token, the role from the
/// server-held profile record.
pub async fn get_me(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, HttpError> {
    let profile: Option<UserProfile> = app_state
        .db_client
        .get_user_profile(auth.id)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    Ok(Json(MeResponse {
        role: profile.map(|p| p.role),
        user: auth,
    }))
}

pub async fn set_role(
    Extension(app_state): Extension<Arc<AppState>>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<SetRoleDto>,
) -> Result<impl IntoResponse, HttpError> {
    let profile = app_state
        .db_client
        .set_user_role(auth.id, body.role)
        .await
        .map_err(|e| HttpError::server_error(e.to_string()))?;

    tracing::info!("User {} selected the {} role", auth.id, profile.role.to_str());

    Ok(Json(profile))
}
