//! Router-level tests against a mock database.
//!
//! Run with: cargo test --test routes_test

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response, StatusCode},
    Router,
};
use chrono::Utc;
use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult, Value};
use tower::ServiceExt;

use dotabank::common::AppState;
use dotabank::config::Config;
use dotabank::entity::{replay_downloads, replay_favourites, replay_players, replays, users};
use dotabank::error::{AppError, AppResult};
use dotabank::routes::build_router;
use dotabank::services::lookup::GameDataSource;
use dotabank::services::session::{SessionData, SessionKey};
use dotabank::steam::models::{Hero, Item, League, PlayerSummary, UgcFile};
use dotabank::steam::openid::{AssertionVerifier, OpenIdError};
use dotabank::steam::SteamClient;

/// Steam with the hero list only; profiles resolve to `persona` when set.
#[derive(Default)]
struct FakeSteam {
    persona: Option<&'static str>,
}

#[async_trait]
impl GameDataSource for FakeSteam {
    async fn heroes(&self) -> AppResult<Vec<Hero>> {
        Ok(vec![Hero {
            name: "npc_dota_hero_antimage".to_string(),
            id: 1,
            localized_name: "Anti-Mage".to_string(),
        }])
    }

    async fn leagues(&self) -> AppResult<Vec<League>> {
        Err(AppError::SteamApi("offline".to_string()))
    }

    async fn items(&self) -> AppResult<Vec<Item>> {
        Err(AppError::SteamApi("offline".to_string()))
    }

    async fn player_summaries(&self, steam_ids: &[u64]) -> AppResult<Vec<PlayerSummary>> {
        let persona = self
            .persona
            .ok_or_else(|| AppError::SteamApi("offline".to_string()))?;
        Ok(steam_ids
            .iter()
            .map(|&steamid| PlayerSummary {
                steamid,
                personaname: persona.to_string(),
                profileurl: None,
                avatar: None,
                avatarmedium: None,
                avatarfull: None,
                communityvisibilitystate: None,
            })
            .collect())
    }

    async fn ugc_file(&self, _ugcid: u64) -> AppResult<UgcFile> {
        Err(AppError::SteamApi("offline".to_string()))
    }
}

/// Accepts every assertion as the given Steam id.
struct SignsInAs(u64);

#[async_trait]
impl AssertionVerifier for SignsInAs {
    async fn verify(
        &self,
        _params: &[(String, String)],
        _expected_return_to: &str,
    ) -> Result<u64, OpenIdError> {
        Ok(self.0)
    }
}

/// Steam id for account 22202.
const RABSCUTTLE_STEAM_ID: u64 = 76_561_197_960_287_930;

fn state(db: DatabaseConnection, steam: FakeSteam) -> AppState {
    let config = Config::for_tests();
    let client = Arc::new(SteamClient::new(&config).unwrap());
    AppState::with_source(db, config, client, Arc::new(steam))
}

fn app(db: DatabaseConnection) -> Router {
    build_router(state(db, FakeSteam::default()))
}

fn signing_in_app(db: DatabaseConnection, persona: Option<&'static str>) -> Router {
    build_router(
        state(db, FakeSteam { persona }).with_openid(Arc::new(SignsInAs(RABSCUTTLE_STEAM_ID))),
    )
}

fn empty_db() -> DatabaseConnection {
    MockDatabase::new(DatabaseBackend::Postgres).into_connection()
}

fn user(id: i64, is_admin: bool) -> users::Model {
    let now = Utc::now().fixed_offset();
    users::Model {
        id,
        name: "Rabscuttle".to_string(),
        email: None,
        show_ads: true,
        enabled: true,
        is_admin,
        first_seen: now,
        last_seen: now,
    }
}

fn session_key() -> SessionKey {
    SessionKey::new(Config::for_tests().secret_key.as_bytes(), false)
}

fn cookie_for(data: &SessionData) -> String {
    format!("session={}", session_key().sign(data))
}

fn replay(id: i64, start_time: Option<i64>) -> replays::Model {
    replays::Model {
        id,
        state: "ARCHIVED".to_string(),
        league_id: None,
        game_mode: Some(2),
        duration: Some(2400),
        start_time,
        radiant_win: Some(true),
        ugcid: None,
        created_at: Utc::now().fixed_offset(),
    }
}

fn played(replay_id: i64, account_id: i64) -> replay_players::Model {
    replay_players::Model {
        id: replay_id * 10,
        replay_id,
        account_id: Some(account_id),
        hero_id: Some(1),
        player_slot: 0,
        kills: Some(10),
        deaths: Some(2),
        assists: Some(7),
    }
}

fn count_row(n: i64) -> Vec<BTreeMap<&'static str, Value>> {
    vec![BTreeMap::from([("num_items", Value::BigInt(Some(n)))])]
}

fn exec_ok(rows_affected: u64) -> MockExecResult {
    MockExecResult {
        last_insert_id: 0,
        rows_affected,
    }
}

fn signed_in(user_id: i64) -> SessionData {
    SessionData {
        user_id: Some(user_id),
        csrf_token: Some("csrf-token".to_string()),
        ..SessionData::default()
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn location(response: &Response<Body>) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

/// Session the response asks the browser to store.
fn stored_session(response: &Response<Body>) -> SessionData {
    let cookie = session_cookie(response);
    let value = cookie.strip_prefix("session=").unwrap();
    session_key().verify(value).unwrap()
}

/// `name=value` part of the response's session cookie.
fn session_cookie(response: &Response<Body>) -> String {
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

async fn json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_is_ok() {
    let response = app(empty_db()).oneshot(get("/healthz")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn anonymous_user_list_redirects_with_flash() {
    let router = app(empty_db());

    let response = router.clone().oneshot(get("/users/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = session_cookie(&response);

    // The flash shows up on the page the redirect lands on, once.
    let response = router
        .clone()
        .oneshot(get_with_cookie("/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = session_cookie(&response);
    let body = json(response).await;
    assert_eq!(body["flashes"][0]["category"], "danger");
    assert_eq!(body["flashes"][0]["message"], "User list is admin only atm.");
    assert!(body["current_user"].is_null());

    let body = json(router.oneshot(get_with_cookie("/", &cookie)).await.unwrap()).await;
    assert_eq!(body["flashes"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn tampered_session_cookie_is_ignored() {
    let mut cookie = cookie_for(&signed_in(1));
    cookie.push('x');

    // No DB results queued: a verified session would have queried for the user.
    let response = app(empty_db())
        .oneshot(get_with_cookie("/", &cookie))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(json(response).await["current_user"].is_null());
}

#[tokio::test]
async fn admin_sees_paginated_user_list() {
    let admin = user(1, true);
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![admin.clone()]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .append_query_results([vec![BTreeMap::from([(
            "num_items",
            Value::BigInt(Some(1)),
        )])]])
        .append_query_results([vec![admin]])
        .into_connection();

    let response = app(db)
        .oneshot(get_with_cookie("/users/", &cookie_for(&signed_in(1))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["current_user"]["id"], 1);
    assert_eq!(body["users"]["total"], 1);
    assert_eq!(body["users"]["pages"], 1);
    assert_eq!(body["users"]["has_next"], false);
    assert_eq!(body["users"]["items"][0]["name"], "Rabscuttle");
}

#[tokio::test]
async fn unknown_user_redirects_back() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<users::Model>::new()])
        .into_connection();

    let response = app(db)
        .oneshot(
            Request::builder()
                .uri("/users/42/")
                .header(header::REFERER, "http://localhost:3000/users/7/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/7/");
}

#[tokio::test]
async fn settings_require_login() {
    let response = app(empty_db())
        .oneshot(get("/users/1/settings/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/users/login/?next=%2Fusers%2F1%2Fsettings%2F"
    );
}

#[tokio::test]
async fn settings_of_another_user_are_refused() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(2, false)]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let response = app(db)
        .oneshot(get_with_cookie(
            "/users/1/settings/",
            &cookie_for(&signed_in(2)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

fn settings_post(cookie: &str, form: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/users/1/settings/?next=/users/1/")
        .header(header::COOKIE, cookie)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form.to_string()))
        .unwrap()
}

#[tokio::test]
async fn invalid_settings_are_rejected() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(1, false)]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .into_connection();

    let response = app(db)
        .oneshot(settings_post(
            &cookie_for(&signed_in(1)),
            "name=&email=nope&csrf_token=wrong",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = json(response).await;
    let errors = &body["form"]["errors"];
    assert!(errors["csrf_token"].is_array());
    assert!(errors["name"].is_array());
    assert!(errors["email"].is_array());
}

#[tokio::test]
async fn valid_settings_are_saved() {
    let mut saved = user(1, false);
    saved.name = "Rab".to_string();
    saved.show_ads = false;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(1, false)]])
        .append_exec_results([MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }])
        .append_query_results([vec![saved]])
        .into_connection();

    let response = app(db)
        .oneshot(settings_post(
            &cookie_for(&signed_in(1)),
            "name=Rab&email=&csrf_token=csrf-token",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/1/");
}

#[tokio::test]
async fn login_redirects_to_steam() {
    let response = app(empty_db())
        .oneshot(get("/users/login/?next=/users/5/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let target = location(&response);
    assert!(target.starts_with("https://steamcommunity.com/openid/login?"));
    assert!(target.contains("openid.mode=checkid_setup"));
    assert!(response.headers().contains_key(header::SET_COOKIE));
}

#[tokio::test]
async fn cancelled_login_flashes_an_error() {
    let cookie = cookie_for(&SessionData {
        next: Some("/users/5/".to_string()),
        ..SessionData::default()
    });

    let router = app(empty_db());
    let response = router
        .clone()
        .oneshot(get_with_cookie(
            "/users/login/callback?openid.mode=cancel",
            &cookie,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/5/");

    let cookie = session_cookie(&response);
    let body = json(router.oneshot(get_with_cookie("/", &cookie)).await.unwrap()).await;
    assert_eq!(
        body["flashes"][0]["message"],
        "Error logging you in, please try again later."
    );
}

#[tokio::test]
async fn logout_requires_login() {
    let response = app(empty_db())
        .oneshot(get("/users/logout/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/login/?next=%2Fusers%2Flogout%2F");
}

#[tokio::test]
async fn hero_lookups_come_from_the_cache() {
    let router = app(empty_db());

    let body = json(router.clone().oneshot(get("/api/heroes/1")).await.unwrap()).await;
    assert_eq!(body["localized_name"], "Anti-Mage");
    assert_eq!(body["dotabuff_url"], "http://dotabuff.com/heroes/anti-mage");

    let body = json(
        router
            .clone()
            .oneshot(get("/api/heroes/npc_dota_hero_antimage"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(body["id"], 1);

    // Unknown heroes fall back to a placeholder rather than an error.
    let body = json(router.oneshot(get("/api/heroes/999")).await.unwrap()).await;
    assert_eq!(body["name"], "999");
}

#[tokio::test]
async fn upstream_failures_map_to_bad_gateway() {
    let response = app(empty_db())
        .oneshot(get("/api/accounts/22"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

    let response = app(empty_db())
        .oneshot(get("/api/accounts?ids=1,x"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cache_clear_is_admin_only() {
    let response = app(empty_db())
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/cache")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn profile_lists_latest_activity() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(1, false)]])
        .append_query_results([vec![(
            replay_favourites::Model {
                id: 7,
                replay_id: 100,
                user_id: 1,
                created_at: Utc::now().fixed_offset(),
            },
            replay(100, Some(1_400_000_000)),
        )]])
        .append_query_results([Vec::<(dotabank::entity::replay_ratings::Model, replays::Model)>::new()])
        .append_query_results([Vec::<(dotabank::entity::searches::Model, replays::Model)>::new()])
        .append_query_results([vec![(
            replay_downloads::Model {
                id: 8,
                replay_id: 101,
                user_id: 1,
                created_at: Utc::now().fixed_offset(),
            },
            replay(101, None),
        )]])
        .append_query_results([vec![(played(102, 1), replay(102, Some(1_400_000_000)))]])
        .into_connection();

    let response = app(db).oneshot(get("/users/1/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json(response).await;
    assert_eq!(body["user"]["id"], 1);
    assert_eq!(body["favourites"][0]["replay"]["id"], 100);
    assert_eq!(body["ratings"].as_array().unwrap().len(), 0);
    assert_eq!(body["searches"].as_array().unwrap().len(), 0);
    assert_eq!(body["downloads"][0]["replay_id"], 101);

    let match_played = &body["replays_participated"][0];
    assert_eq!(match_played["replay"]["id"], 102);
    assert_eq!(match_played["hero"]["localized_name"], "Anti-Mage");
    assert_eq!(match_played["kills"], 10);
}

#[tokio::test]
async fn every_user_list_route_resolves_with_and_without_a_page() {
    for list in ["replays", "favourites", "ratings", "searches", "downloads"] {
        for (uri, page) in [
            (format!("/users/1/{list}/"), 1),
            (format!("/users/1/{list}/3/"), 3),
        ] {
            // An empty COUNT skips the page fetch
            let db = MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![user(1, false)]])
                .append_query_results([count_row(0)])
                .into_connection();

            let response = app(db).oneshot(get(&uri)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{uri}");

            let body = json(response).await;
            assert_eq!(body["list"], list, "{uri}");
            assert_eq!(body["user"]["id"], 1, "{uri}");
            assert_eq!(body["page"]["page"], page, "{uri}");
            assert_eq!(body["page"]["total"], 0, "{uri}");
            assert_eq!(body["page"]["items"].as_array().unwrap().len(), 0, "{uri}");
        }
    }
}

#[tokio::test]
async fn replays_list_attaches_heroes() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(1, false)]])
        .append_query_results([count_row(21)])
        .append_query_results([vec![(played(300, 1), replay(300, Some(1_400_000_000)))]])
        .into_connection();

    let response = app(db).oneshot(get("/users/1/replays/2/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = &json(response).await["page"];
    assert_eq!(page["page"], 2);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["has_prev"], true);
    assert_eq!(page["has_next"], false);
    assert_eq!(page["items"][0]["replay_id"], 300);
    assert_eq!(page["items"][0]["hero"]["name"], "npc_dota_hero_antimage");
}

#[tokio::test]
async fn huge_page_numbers_come_back_empty() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(1, false)]])
        .append_query_results([count_row(5)])
        .into_connection();

    let response = app(db)
        .oneshot(get("/users/1/favourites/18446744073709551615/"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = &json(response).await["page"];
    assert_eq!(page["total"], 5);
    assert_eq!(page["items"].as_array().unwrap().len(), 0);
    assert_eq!(page["has_next"], false);
}

#[tokio::test]
async fn signed_in_visitor_skips_steam_on_login() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![user(1, false)]])
        .append_exec_results([exec_ok(1)])
        .into_connection();

    let response = app(db)
        .oneshot(get_with_cookie(
            "/users/login/?next=/users/5/",
            &cookie_for(&signed_in(1)),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/5/");
}

fn callback(next: &str) -> Request<Body> {
    let cookie = cookie_for(&SessionData {
        next: Some(next.to_string()),
        ..SessionData::default()
    });
    get_with_cookie("/users/login/callback?openid.mode=id_res", &cookie)
}

#[tokio::test]
async fn first_sign_in_creates_user_from_steam_profile() {
    let mut created = user(22_202, false);
    created.name = "Rabscuttle".to_string();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<users::Model>::new()])
        .append_exec_results([exec_ok(1)])
        .append_query_results([vec![created]])
        .into_connection();

    let response = signing_in_app(db.clone(), Some("Rabscuttle"))
        .oneshot(callback("/users/5/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/5/");

    let session = stored_session(&response);
    assert_eq!(session.user_id, Some(22_202));
    assert_eq!(session.next, None);
    assert_eq!(session.flashes[0].category, "success");
    assert_eq!(session.flashes[0].message, "You are logged in as Rabscuttle");

    let log = format!("{:?}", db.into_transaction_log());
    assert!(log.contains("INSERT INTO"), "{log}");
    assert!(log.contains(r#""Rabscuttle""#), "{log}");
}

#[tokio::test]
async fn first_sign_in_without_profile_uses_account_id() {
    let mut created = user(22_202, false);
    created.name = "22202".to_string();

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<users::Model>::new()])
        .append_exec_results([exec_ok(1)])
        .append_query_results([vec![created]])
        .into_connection();

    let response = signing_in_app(db.clone(), None)
        .oneshot(callback("/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let session = stored_session(&response);
    assert_eq!(session.user_id, Some(22_202));
    assert_eq!(session.flashes[0].message, "You are logged in as 22202");

    let log = format!("{:?}", db.into_transaction_log());
    assert!(log.contains(r#""22202""#), "{log}");
}

#[tokio::test]
async fn racing_first_sign_in_reuses_the_inserted_row() {
    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([Vec::<users::Model>::new()])
        // ON CONFLICT DO NOTHING: another request created the row first
        .append_exec_results([exec_ok(0)])
        .append_query_results([vec![user(22_202, false)]])
        .into_connection();

    let response = signing_in_app(db, Some("Rabscuttle"))
        .oneshot(callback("/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(stored_session(&response).user_id, Some(22_202));
}

#[tokio::test]
async fn disabled_account_is_refused_with_contact_address() {
    let mut disabled = user(22_202, false);
    disabled.enabled = false;

    let db = MockDatabase::new(DatabaseBackend::Postgres)
        .append_query_results([vec![disabled]])
        .into_connection();

    let response = signing_in_app(db, Some("Rabscuttle"))
        .oneshot(callback("/users/5/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/users/5/");

    let session = stored_session(&response);
    assert_eq!(session.user_id, None);
    assert_eq!(session.flashes[0].category, "danger");
    assert_eq!(
        session.flashes[0].message,
        "Cannot log you in as Rabscuttle, your account has been disabled.  \
         If you believe this is in error, please contact admin@example.com."
    );
}
