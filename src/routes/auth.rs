use axum::{
    extract::{Query, RawQuery, State},
    http::Uri,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use sea_orm::{sea_query::OnConflict, EntityTrait, Set};

use crate::common::AppState;
use crate::entity::users;
use crate::error::{AppError, AppResult};
use crate::filters::accountid_from_steamid;
use crate::services::auth::{load_user, login_required, login_user, logout_user, safe_next};
use crate::services::session::Session;
use crate::steam::openid::{self, AssertionVerifier};

use super::users::NextQuery;

pub const CALLBACK_PATH: &str = "/users/login/callback";

fn callback_url(state: &AppState) -> String {
    format!("{}{CALLBACK_PATH}", state.config.public_url)
}

/// `GET /users/login/`
///
/// Already signed-in visitors go straight to `next`; everyone else is sent
/// to Steam.
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    let next = safe_next(query.next.as_deref());

    if load_user(&state, &mut session).await?.is_some() {
        return Ok((session, Redirect::to(&next)).into_response());
    }

    session.set_next(Some(next));

    let url = openid::login_url(
        state.steam_client.openid_url(),
        &state.config.public_url,
        &callback_url(&state),
    )
    .map_err(|e| AppError::Internal(format!("Invalid OpenID provider URL: {e}")))?;

    Ok((session, Redirect::to(url.as_str())).into_response())
}

/// Find the user for a Steam account, creating it on first sign-in.
async fn find_or_create_user(state: &AppState, account_id: u32) -> AppResult<users::Model> {
    if let Some(user) = users::Entity::find_by_id(i64::from(account_id))
        .one(&state.db)
        .await?
    {
        return Ok(user);
    }

    // A missing or unreachable profile is no reason to refuse the sign-in.
    let persona = match state.lookups.get_account_by_id(account_id).await {
        Ok(profile) => profile.map(|p| p.personaname).filter(|n| !n.trim().is_empty()),
        Err(e) => {
            tracing::warn!(account_id, error = %e, "Could not fetch Steam profile for new user");
            None
        }
    };

    let now = Utc::now().fixed_offset();
    let new_user = users::ActiveModel {
        id: Set(i64::from(account_id)),
        name: Set(persona.unwrap_or_else(|| account_id.to_string())),
        email: Set(None),
        show_ads: Set(true),
        enabled: Set(true),
        is_admin: Set(false),
        first_seen: Set(now),
        last_seen: Set(now),
    };

    // A concurrent first sign-in may have inserted the row already.
    let inserted = users::Entity::insert(new_user)
        .on_conflict(OnConflict::column(users::Column::Id).do_nothing().to_owned())
        .exec_without_returning(&state.db)
        .await?;

    let user = users::Entity::find_by_id(i64::from(account_id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::Internal(format!("User {account_id} vanished after insert")))?;

    if inserted == 0 {
        tracing::debug!(user_id = user.id, "User created by a concurrent sign-in");
        return Ok(user);
    }

    tracing::info!(user_id = user.id, name = %user.name, "Created user on first sign-in");
    Ok(user)
}

/// `GET /users/login/callback`
///
/// Return point for Steam's OpenID assertion.
pub async fn login_callback(
    State(state): State<AppState>,
    mut session: Session,
    RawQuery(raw): RawQuery,
) -> AppResult<Response> {
    let params: Vec<(String, String)> =
        url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes())
            .into_owned()
            .collect();

    let next = safe_next(session.take_next().as_deref());

    let steam_id = match state.openid.verify(&params, &callback_url(&state)).await {
        Ok(steam_id) => steam_id,
        Err(e) => {
            tracing::warn!(error = %e, "Steam sign-in failed");
            session.flash("danger", "Error logging you in, please try again later.");
            return Ok((session, Redirect::to(&next)).into_response());
        }
    };

    let account_id = accountid_from_steamid(steam_id);
    let user = find_or_create_user(&state, account_id).await?;

    if login_user(&mut session, &user) {
        tracing::info!(user_id = user.id, "User signed in");
        session.flash("success", format!("You are logged in as {}", user.name));
    } else {
        tracing::info!(user_id = user.id, "Disabled user refused sign-in");
        session.flash(
            "danger",
            format!(
                "Cannot log you in as {}, your account has been disabled.  If you believe this is in error, please contact {}.",
                user.name, state.config.contact_email
            ),
        );
    }

    Ok((session, Redirect::to(&next)).into_response())
}

/// `GET /users/logout/`
pub async fn logout(
    State(state): State<AppState>,
    mut session: Session,
    uri: Uri,
    Query(query): Query<NextQuery>,
) -> AppResult<Response> {
    if load_user(&state, &mut session).await?.is_none() {
        return Ok(login_required(session, uri.path()));
    }

    logout_user(&mut session);
    let next = safe_next(query.next.as_deref());
    Ok((session, Redirect::to(&next)).into_response())
}
