pub mod auth;
pub mod cache;
pub mod health;
pub mod lookups;
pub mod users;

use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use std::sync::Arc;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::error::AppResult;
use crate::services::auth::load_user;
use crate::services::rate_limit::ClientIpKeyExtractor;
use crate::services::session::Session;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        health::readyz,
        lookups::list_heroes,
        lookups::get_hero,
        lookups::get_item,
        lookups::get_league,
        lookups::get_account,
        lookups::list_accounts,
        lookups::get_ugc_file,
        cache::clear_lookup_cache,
    ),
    components(
        schemas(
            lookups::HeroResponse,
            lookups::ItemResponse,
            lookups::AccountResponse,
            crate::steam::models::League,
            crate::steam::models::Item,
            crate::steam::models::UgcFile,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "lookups", description = "Cached Dota 2 game data and Steam profiles"),
    ),
    info(
        title = "Dotabank API",
        description = "Dota 2 replay archive: cached game data lookups",
        version = "0.1.0"
    )
)]
struct ApiDoc;

/// `GET /`
///
/// Landing document; carries flashes queued by redirects that land here.
pub async fn index(State(state): State<AppState>, mut session: Session) -> AppResult<Response> {
    let current = load_user(&state, &mut session).await?;
    let body = users::context(&mut session, current.as_ref());
    Ok((session, Json(body)).into_response())
}

pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
    } else {
        tracing::info!(
            rate = %format!("{}/s burst {}", config.rate_limit_per_second, config.rate_limit_burst),
            "Rate limiting configured"
        );
    }

    // Server-rendered pages (JSON page documents)
    let page_routes = Router::new()
        .route("/", get(index))
        .route("/users/", get(users::list_users))
        .route("/users/page/{page}/", get(users::list_users_page))
        .route("/users/login/", get(auth::login))
        .route(auth::CALLBACK_PATH, get(auth::login_callback))
        .route("/users/logout/", get(auth::logout))
        .route("/users/{id}/", get(users::user_profile))
        .route("/users/{id}/replays/", get(users::user_replays))
        .route("/users/{id}/replays/{page}/", get(users::user_replays))
        .route("/users/{id}/favourites/", get(users::user_favourites))
        .route("/users/{id}/favourites/{page}/", get(users::user_favourites))
        .route("/users/{id}/ratings/", get(users::user_ratings))
        .route("/users/{id}/ratings/{page}/", get(users::user_ratings))
        .route("/users/{id}/searches/", get(users::user_searches))
        .route("/users/{id}/searches/{page}/", get(users::user_searches))
        .route("/users/{id}/downloads/", get(users::user_downloads))
        .route("/users/{id}/downloads/{page}/", get(users::user_downloads))
        .route(
            "/users/{id}/settings/",
            get(users::settings_form).post(users::update_settings),
        )
        .layer(RequestBodyLimitLayer::new(64 * 1024)); // 64KB form limit

    // Lookups hit Steam on a cache miss, so they sit behind the limiter
    let api_routes_base = Router::new()
        .route("/heroes", get(lookups::list_heroes))
        .route("/heroes/{hero}", get(lookups::get_hero))
        .route("/items/{item_id}", get(lookups::get_item))
        .route("/leagues/{league_id}", get(lookups::get_league))
        .route("/accounts", get(lookups::list_accounts))
        .route("/accounts/{account_id}", get(lookups::get_account))
        .route("/ugc/{ugcid}", get(lookups::get_ugc_file))
        .route("/cache", delete(cache::clear_lookup_cache));

    let api_routes = if config.disable_rate_limiting {
        api_routes_base
    } else {
        let limiter = GovernorConfigBuilder::default()
            .key_extractor(ClientIpKeyExtractor)
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .finish();

        match limiter {
            Some(limiter) => api_routes_base.layer(GovernorLayer {
                config: Arc::new(limiter),
            }),
            None => {
                tracing::error!("Invalid rate limit settings, serving lookups without a limiter");
                api_routes_base
            }
        }
    };

    // Health check routes (NO rate limiting)
    let health_routes = Router::new()
        .route("/healthz", get(health::healthz))
        .route("/readyz", get(health::readyz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Router::new()
        .merge(page_routes)
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
