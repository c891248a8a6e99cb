use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sea_orm::{
    sea_query::NullOrdering, ColumnTrait, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect,
    SelectTwo,
};

use crate::common::AppState;
use crate::entity::{
    replay_downloads, replay_favourites, replay_players, replay_ratings, replays, searches, users,
};
use crate::error::AppResult;
use crate::services::auth::{is_admin, load_user, redirect_back};
use crate::services::pagination::{paginate, Page};
use crate::services::session::Session;

use super::types::{
    ActivityEntry, CurrentUser, PageContext, PlayerEntry, RatingEntry, SearchEntry, UserListPage,
    UserListPath, UserPage, UserProfile, UserSummary, UsersPage,
};

pub(crate) fn context(session: &mut Session, current: Option<&users::Model>) -> PageContext {
    PageContext {
        current_user: current.map(CurrentUser::from),
        flashes: session.take_flashes(),
    }
}

pub(crate) fn not_found(
    state: &AppState,
    session: Session,
    headers: &HeaderMap,
    id: i64,
) -> Response {
    redirect_back(
        session,
        headers,
        &state.config.public_url,
        "danger",
        format!("User {id} not found."),
    )
}

fn activity(
    id: i64,
    replay_id: i64,
    created_at: sea_orm::prelude::DateTimeWithTimeZone,
    replay: Option<replays::Model>,
) -> ActivityEntry {
    ActivityEntry {
        id,
        replay_id,
        created_at: created_at.with_timezone(&Utc),
        replay: replay.map(Into::into),
    }
}

fn rating(r: replay_ratings::Model, replay: Option<replays::Model>) -> RatingEntry {
    RatingEntry {
        id: r.id,
        replay_id: r.replay_id,
        positive: r.positive,
        created_at: r.created_at.with_timezone(&Utc),
        replay: replay.map(Into::into),
    }
}

/// Matches an account played, newest first. Undated matches sort last.
fn matches_played(account_id: i64) -> SelectTwo<replay_players::Entity, replays::Entity> {
    replay_players::Entity::find()
        .filter(replay_players::Column::AccountId.eq(account_id))
        .inner_join(replays::Entity)
        .select_also(replays::Entity)
        .order_by_with_nulls(replays::Column::StartTime, Order::Desc, NullOrdering::Last)
}

/// Attach hero metadata to played matches, one lookup for the whole list.
async fn player_entries(
    state: &AppState,
    rows: Vec<(replay_players::Model, Option<replays::Model>)>,
) -> Vec<PlayerEntry> {
    let hero_ids: Vec<i64> = rows.iter().filter_map(|(p, _)| p.hero_id).collect();
    let mut heroes = state.lookups.get_heroes_by_id(&hero_ids).await.into_iter();

    rows.into_iter()
        .map(|(player, replay)| {
            let hero = player.hero_id.and_then(|_| heroes.next());
            PlayerEntry::new(player, hero, replay)
        })
        .collect()
}

async fn list_users_at(
    state: AppState,
    mut session: Session,
    headers: HeaderMap,
    page: u64,
) -> AppResult<Response> {
    let current = load_user(&state, &mut session).await?;

    if !is_admin(current.as_ref()) {
        return Ok(redirect_back(
            session,
            &headers,
            &state.config.public_url,
            "danger",
            "User list is admin only atm.",
        ));
    }

    let users_page = paginate(
        &state.db,
        users::Entity::find().order_by_asc(users::Column::Id),
        page,
        state.config.users_per_page,
    )
    .await?
    .map(UserSummary::from);

    let body = UsersPage {
        context: context(&mut session, current.as_ref()),
        users: users_page,
    };
    Ok((session, Json(body)).into_response())
}

/// `GET /users/`
pub async fn list_users(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> AppResult<Response> {
    list_users_at(state, session, headers, 1).await
}

/// `GET /users/page/{page}/`
pub async fn list_users_page(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(page): Path<u64>,
) -> AppResult<Response> {
    list_users_at(state, session, headers, page).await
}

/// `GET /users/{id}/`
pub async fn user_profile(
    State(state): State<AppState>,
    mut session: Session,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let current = load_user(&state, &mut session).await?;

    let Some(user) = users::Entity::find_by_id(id).one(&state.db).await? else {
        return Ok(not_found(&state, session, &headers, id));
    };

    let limit = state.config.latest_replays_limit;

    let favourites = replay_favourites::Entity::find()
        .filter(replay_favourites::Column::UserId.eq(user.id))
        .find_also_related(replays::Entity)
        .order_by_desc(replay_favourites::Column::CreatedAt)
        .limit(limit)
        .all(&state.db)
        .await?;

    let ratings = replay_ratings::Entity::find()
        .filter(replay_ratings::Column::UserId.eq(user.id))
        .find_also_related(replays::Entity)
        .order_by_desc(replay_ratings::Column::CreatedAt)
        .limit(limit)
        .all(&state.db)
        .await?;

    let searches = searches::Entity::find()
        .filter(searches::Column::UserId.eq(user.id))
        .find_also_related(replays::Entity)
        .order_by_desc(searches::Column::CreatedAt)
        .limit(limit)
        .all(&state.db)
        .await?;

    // Downloads and played matches only count when the replay still exists.
    let downloads = replay_downloads::Entity::find()
        .filter(replay_downloads::Column::UserId.eq(user.id))
        .inner_join(replays::Entity)
        .select_also(replays::Entity)
        .order_by_desc(replay_downloads::Column::CreatedAt)
        .limit(limit)
        .all(&state.db)
        .await?;

    let participated = matches_played(user.id)
        .limit(limit)
        .all(&state.db)
        .await?;

    let body = UserPage {
        context: context(&mut session, current.as_ref()),
        user: UserProfile::from(&user),
        favourites: favourites
            .into_iter()
            .map(|(f, r)| activity(f.id, f.replay_id, f.created_at, r))
            .collect(),
        ratings: ratings.into_iter().map(|(r, replay)| rating(r, replay)).collect(),
        searches: searches
            .into_iter()
            .map(|(s, r)| SearchEntry::new(s, r))
            .collect(),
        downloads: downloads
            .into_iter()
            .map(|(d, r)| activity(d.id, d.replay_id, d.created_at, r))
            .collect(),
        replays_participated: player_entries(&state, participated).await,
    };

    Ok((session, Json(body)).into_response())
}

/// Which per-user list a paginated page shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserList {
    Replays,
    Favourites,
    Ratings,
    Searches,
    Downloads,
}

impl UserList {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Replays => "replays",
            Self::Favourites => "favourites",
            Self::Ratings => "ratings",
            Self::Searches => "searches",
            Self::Downloads => "downloads",
        }
    }
}

fn list_page<T>(
    session: &mut Session,
    current: Option<&users::Model>,
    user: &users::Model,
    list: UserList,
    page: Page<T>,
) -> UserListPage<T> {
    UserListPage {
        context: context(session, current),
        user: UserProfile::from(user),
        list: list.name(),
        page,
    }
}

async fn user_list(
    state: AppState,
    mut session: Session,
    headers: HeaderMap,
    path: UserListPath,
    list: UserList,
) -> AppResult<Response> {
    let current = load_user(&state, &mut session).await?;

    let Some(user) = users::Entity::find_by_id(path.id).one(&state.db).await? else {
        return Ok(not_found(&state, session, &headers, path.id));
    };

    let db = &state.db;
    let page = path.page.unwrap_or(1);
    let per_page = state.config.replays_per_page;
    let current = current.as_ref();

    let response = match list {
        UserList::Replays => {
            let rows = paginate(
                db,
                matches_played(user.id),
                page,
                per_page,
            )
            .await?;

            let Page {
                items,
                page,
                per_page,
                total,
                ..
            } = rows;
            let rows = Page::new(player_entries(&state, items).await, page, per_page, total);

            Json(list_page(&mut session, current, &user, list, rows)).into_response()
        }
        UserList::Favourites => {
            let rows = paginate(
                db,
                replay_favourites::Entity::find()
                    .filter(replay_favourites::Column::UserId.eq(user.id))
                    .find_also_related(replays::Entity)
                    .order_by_desc(replay_favourites::Column::CreatedAt),
                page,
                per_page,
            )
            .await?
            .map(|(f, r)| activity(f.id, f.replay_id, f.created_at, r));

            Json(list_page(&mut session, current, &user, list, rows)).into_response()
        }
        UserList::Ratings => {
            let rows = paginate(
                db,
                replay_ratings::Entity::find()
                    .filter(replay_ratings::Column::UserId.eq(user.id))
                    .find_also_related(replays::Entity)
                    .order_by_desc(replay_ratings::Column::CreatedAt),
                page,
                per_page,
            )
            .await?
            .map(|(r, replay)| rating(r, replay));

            Json(list_page(&mut session, current, &user, list, rows)).into_response()
        }
        UserList::Searches => {
            let rows = paginate(
                db,
                searches::Entity::find()
                    .filter(searches::Column::UserId.eq(user.id))
                    .find_also_related(replays::Entity)
                    .order_by_desc(searches::Column::CreatedAt),
                page,
                per_page,
            )
            .await?
            .map(|(s, r)| SearchEntry::new(s, r));

            Json(list_page(&mut session, current, &user, list, rows)).into_response()
        }
        UserList::Downloads => {
            let rows = paginate(
                db,
                replay_downloads::Entity::find()
                    .filter(replay_downloads::Column::UserId.eq(user.id))
                    .inner_join(replays::Entity)
                    .select_also(replays::Entity)
                    .order_by_desc(replay_downloads::Column::CreatedAt),
                page,
                per_page,
            )
            .await?
            .map(|(d, r)| activity(d.id, d.replay_id, d.created_at, r));

            Json(list_page(&mut session, current, &user, list, rows)).into_response()
        }
    };

    Ok((session, response).into_response())
}

/// `GET /users/{id}/replays/[{page}/]`
pub async fn user_replays(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(path): Path<UserListPath>,
) -> AppResult<Response> {
    user_list(state, session, headers, path, UserList::Replays).await
}

/// `GET /users/{id}/favourites/[{page}/]`
pub async fn user_favourites(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(path): Path<UserListPath>,
) -> AppResult<Response> {
    user_list(state, session, headers, path, UserList::Favourites).await
}

/// `GET /users/{id}/ratings/[{page}/]`
pub async fn user_ratings(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(path): Path<UserListPath>,
) -> AppResult<Response> {
    user_list(state, session, headers, path, UserList::Ratings).await
}

/// `GET /users/{id}/searches/[{page}/]`
pub async fn user_searches(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(path): Path<UserListPath>,
) -> AppResult<Response> {
    user_list(state, session, headers, path, UserList::Searches).await
}

/// `GET /users/{id}/downloads/[{page}/]`
pub async fn user_downloads(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Path(path): Path<UserListPath>,
) -> AppResult<Response> {
    user_list(state, session, headers, path, UserList::Downloads).await
}
