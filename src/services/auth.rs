use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::Utc;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};

use crate::common::AppState;
use crate::entity::users;
use crate::error::AppResult;
use crate::services::session::Session;

pub const LOGIN_PATH: &str = "/users/login/";
pub const LOGIN_REQUIRED_MESSAGE: &str = "Please log in to access this page.";

/// Load the signed-in user for this session and stamp their `last_seen`.
///
/// A session pointing at a user that no longer exists is downgraded to
/// anonymous.
///
/// # Errors
///
/// Returns `AppError::Database` if the user lookup fails. Failing to update
/// `last_seen` is logged and ignored.
pub async fn load_user(state: &AppState, session: &mut Session) -> AppResult<Option<users::Model>> {
    let Some(user_id) = session.user_id() else {
        return Ok(None);
    };

    let Some(mut user) = users::Entity::find_by_id(user_id).one(&state.db).await? else {
        tracing::info!(user_id, "Session refers to missing user, logging out");
        session.set_user_id(None);
        return Ok(None);
    };

    let now = Utc::now().fixed_offset();
    let update = users::Entity::update_many()
        .col_expr(users::Column::LastSeen, Expr::value(now))
        .filter(users::Column::Id.eq(user_id))
        .exec(&state.db)
        .await;

    match update {
        Ok(_) => user.last_seen = now,
        Err(e) => tracing::warn!(user_id, error = %e, "Failed to update last_seen"),
    }

    Ok(Some(user))
}

/// Mark the session as belonging to `user`. Disabled accounts are refused.
pub fn login_user(session: &mut Session, user: &users::Model) -> bool {
    if !user.enabled {
        return false;
    }
    session.set_user_id(Some(user.id));
    true
}

pub fn logout_user(session: &mut Session) {
    session.set_user_id(None);
}

#[must_use]
pub fn is_admin(user: Option<&users::Model>) -> bool {
    user.is_some_and(|u| u.is_admin)
}

/// Only same-site relative paths are followed after login or a form post.
#[must_use]
pub fn safe_next(next: Option<&str>) -> String {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path.to_string()
        }
        _ => "/".to_string(),
    }
}

/// Where to send the browser "back" to: the referring page when it is on
/// this site, otherwise the index.
#[must_use]
pub fn redirect_back_target(headers: &HeaderMap, public_url: &str) -> String {
    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if let Some(path) = referer.strip_prefix(public_url)
        && (path.is_empty() || path.starts_with('/'))
    {
        return safe_next(Some(if path.is_empty() { "/" } else { path }));
    }

    safe_next(Some(referer))
}

/// Flash `message` and redirect back to the referring page.
pub fn redirect_back(
    mut session: Session,
    headers: &HeaderMap,
    public_url: &str,
    category: &str,
    message: impl Into<String>,
) -> Response {
    session.flash(category, message);
    let target = redirect_back_target(headers, public_url);
    (session, Redirect::to(&target)).into_response()
}

/// Send an anonymous visitor to the login page, returning to `path` afterwards.
pub fn login_required(mut session: Session, path: &str) -> Response {
    session.flash("info", LOGIN_REQUIRED_MESSAGE);
    let next: String = url::form_urlencoded::byte_serialize(path.as_bytes()).collect();
    (session, Redirect::to(&format!("{LOGIN_PATH}?next={next}"))).into_response()
}
