use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::services::auth::{is_admin, load_user};
use crate::services::session::Session;

/// Drop every cached game data lookup (admin only)
///
/// The next request for heroes, items, leagues, profiles or UGC files goes
/// back to Steam.
#[utoipa::path(
    delete,
    path = "/api/cache",
    responses(
        (status = 204, description = "Caches cleared"),
        (status = 403, description = "Caller is not an admin"),
    ),
    tag = "lookups"
)]
pub async fn clear_lookup_cache(
    State(state): State<AppState>,
    mut session: Session,
) -> AppResult<Response> {
    let current = load_user(&state, &mut session).await?;
    if !is_admin(current.as_ref()) {
        return Err(AppError::Forbidden(
            "Only admins can clear the lookup cache".to_string(),
        ));
    }

    state.lookups.invalidate_all();
    tracing::info!(by = ?current.map(|u| u.id), "Lookup cache cleared");

    Ok((session, StatusCode::NO_CONTENT).into_response())
}
