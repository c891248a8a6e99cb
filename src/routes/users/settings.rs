use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Redirect, Response},
    Form, Json,
};
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::collections::BTreeMap;

use crate::common::AppState;
use crate::entity::users;
use crate::error::AppResult;
use crate::services::auth::{load_user, login_required, redirect_back, safe_next};
use crate::services::session::Session;

use super::handlers::{context, not_found};
use super::types::{NextQuery, SettingsForm, SettingsFormInput, SettingsPage, UserProfile};

pub const NAME_MAX_CHARS: usize = 32;
pub const EMAIL_MAX_CHARS: usize = 254;

/// Settings that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSettings {
    pub name: String,
    pub email: Option<String>,
    pub show_ads: bool,
}

type FormErrors = BTreeMap<&'static str, Vec<String>>;

fn looks_like_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|label| !label.is_empty())
}

/// Validate a submitted settings form against the session's CSRF token.
///
/// # Errors
///
/// Returns the field errors, keyed by field name.
pub fn validate(input: &SettingsFormInput, session: &Session) -> Result<ValidSettings, FormErrors> {
    let mut errors = FormErrors::new();

    if !session.csrf_matches(&input.csrf_token) {
        errors
            .entry("csrf_token")
            .or_default()
            .push("The CSRF token is missing or invalid.".to_string());
    }

    let name = input.name.trim();
    let name_chars = name.chars().count();
    if name_chars == 0 {
        errors
            .entry("name")
            .or_default()
            .push("This field is required.".to_string());
    } else if name_chars > NAME_MAX_CHARS {
        errors
            .entry("name")
            .or_default()
            .push(format!("Field must be between 1 and {NAME_MAX_CHARS} characters long."));
    }

    let email = input
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());
    if let Some(email) = email {
        if email.chars().count() > EMAIL_MAX_CHARS {
            errors
                .entry("email")
                .or_default()
                .push(format!("Field cannot be longer than {EMAIL_MAX_CHARS} characters."));
        } else if !looks_like_email(email) {
            errors
                .entry("email")
                .or_default()
                .push("Invalid email address.".to_string());
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(ValidSettings {
        name: name.to_string(),
        email: email.map(ToString::to_string),
        show_ads: input.show_ads.is_some(),
    })
}

enum Access {
    Granted(Session, Option<users::Model>, users::Model),
    Denied(Response),
}

/// Login, authorisation and existence checks shared by GET and POST.
async fn check_access(
    state: &AppState,
    mut session: Session,
    headers: &HeaderMap,
    uri: &Uri,
    id: i64,
) -> AppResult<Access> {
    let Some(current) = load_user(state, &mut session).await? else {
        return Ok(Access::Denied(login_required(session, uri.path())));
    };

    if current.id != id && !current.is_admin {
        return Ok(Access::Denied(redirect_back(
            session,
            headers,
            &state.config.public_url,
            "danger",
            format!("You are not authorised to edit user {id}'s settings."),
        )));
    }

    let target = if current.id == id {
        Some(current.clone())
    } else {
        users::Entity::find_by_id(id).one(&state.db).await?
    };

    match target {
        Some(user) => Ok(Access::Granted(session, Some(current), user)),
        None => Ok(Access::Denied(not_found(state, session, headers, id))),
    }
}

/// `GET /users/{id}/settings/`
pub async fn settings_form(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let (mut session, current, user) = match check_access(&state, session, &headers, &uri, id).await? {
        Access::Granted(session, current, user) => (session, current, user),
        Access::Denied(response) => return Ok(response),
    };

    let form = SettingsForm {
        name: user.name.clone(),
        email: user.email.clone(),
        show_ads: user.show_ads,
        csrf_token: session.csrf_token(),
        errors: FormErrors::new(),
    };

    let body = SettingsPage {
        context: context(&mut session, current.as_ref()),
        user: UserProfile::from(&user),
        form,
    };
    Ok((session, Json(body)).into_response())
}

/// `POST /users/{id}/settings/`
pub async fn update_settings(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    uri: Uri,
    Path(id): Path<i64>,
    Query(query): Query<NextQuery>,
    Form(input): Form<SettingsFormInput>,
) -> AppResult<Response> {
    let (mut session, current, user) = match check_access(&state, session, &headers, &uri, id).await? {
        Access::Granted(session, current, user) => (session, current, user),
        Access::Denied(response) => return Ok(response),
    };

    match validate(&input, &session) {
        Ok(settings) => {
            let mut active: users::ActiveModel = user.into();
            active.name = Set(settings.name);
            active.email = Set(settings.email);
            active.show_ads = Set(settings.show_ads);
            let saved = active.update(&state.db).await?;

            tracing::info!(user_id = saved.id, by = ?current.as_ref().map(|u| u.id), "User settings updated");

            let target = safe_next(query.next.as_deref());
            Ok((session, Redirect::to(&target)).into_response())
        }
        Err(errors) => {
            let form = SettingsForm {
                name: input.name.clone(),
                email: input.email.clone(),
                show_ads: input.show_ads.is_some(),
                csrf_token: session.csrf_token(),
                errors,
            };
            let body = SettingsPage {
                context: context(&mut session, current.as_ref()),
                user: UserProfile::from(&user),
                form,
            };
            Ok((session, (StatusCode::UNPROCESSABLE_ENTITY, Json(body))).into_response())
        }
    }
}
