use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entity::{replay_players, replays, searches, users};
use crate::filters::{
    dotabuff_match_link, escape_every_character, seconds_to_time, steamid_from_accountid,
    timestamp_to_datestring, DEFAULT_DATE_FORMAT,
};
use crate::services::pagination::Page;
use crate::services::session::Flash;
use crate::steam::models::Hero;

/// The signed-in user as every page sees it
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: i64,
    pub name: String,
    pub is_admin: bool,
}

impl From<&users::Model> for CurrentUser {
    fn from(u: &users::Model) -> Self {
        Self {
            id: u.id,
            name: u.name.clone(),
            is_admin: u.is_admin,
        }
    }
}

/// Context shared by every rendered page
#[derive(Debug, Serialize)]
pub struct PageContext {
    pub current_user: Option<CurrentUser>,
    pub flashes: Vec<Flash>,
}

#[derive(Debug, Serialize)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
    pub enabled: bool,
    pub is_admin: bool,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl From<users::Model> for UserSummary {
    fn from(u: users::Model) -> Self {
        Self {
            id: u.id,
            name: u.name,
            enabled: u.enabled,
            is_admin: u.is_admin,
            first_seen: u.first_seen.with_timezone(&Utc),
            last_seen: u.last_seen.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub steam_id: Option<u64>,
    pub name: String,
    /// E-mail as HTML entities, for display without scraping
    pub email_obfuscated: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl From<&users::Model> for UserProfile {
    fn from(u: &users::Model) -> Self {
        Self {
            id: u.id,
            steam_id: u32::try_from(u.id).ok().map(steamid_from_accountid),
            name: u.name.clone(),
            email_obfuscated: u.email.as_deref().map(escape_every_character),
            first_seen: u.first_seen.with_timezone(&Utc),
            last_seen: u.last_seen.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    pub id: i64,
    pub state: String,
    pub league_id: Option<i64>,
    pub started: Option<String>,
    pub duration: String,
    pub radiant_win: Option<bool>,
    pub dotabuff_url: String,
}

impl From<replays::Model> for ReplaySummary {
    fn from(r: replays::Model) -> Self {
        Self {
            id: r.id,
            state: r.state,
            league_id: r.league_id,
            started: r
                .start_time
                .map(|ts| timestamp_to_datestring(ts, DEFAULT_DATE_FORMAT)),
            duration: seconds_to_time(r.duration),
            radiant_win: r.radiant_win,
            dotabuff_url: dotabuff_match_link(r.id),
        }
    }
}

/// A favourite or a download
#[derive(Debug, Serialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub replay_id: i64,
    pub created_at: DateTime<Utc>,
    pub replay: Option<ReplaySummary>,
}

#[derive(Debug, Serialize)]
pub struct RatingEntry {
    pub id: i64,
    pub replay_id: i64,
    pub positive: bool,
    pub created_at: DateTime<Utc>,
    pub replay: Option<ReplaySummary>,
}

#[derive(Debug, Serialize)]
pub struct SearchEntry {
    pub id: i64,
    pub match_id: i64,
    pub success: bool,
    pub created_at: DateTime<Utc>,
    pub replay: Option<ReplaySummary>,
}

impl SearchEntry {
    pub fn new(s: searches::Model, replay: Option<replays::Model>) -> Self {
        Self {
            id: s.id,
            match_id: s.match_id,
            success: s.success,
            created_at: s.created_at.with_timezone(&Utc),
            replay: replay.map(ReplaySummary::from),
        }
    }
}

/// A match the user played in
#[derive(Debug, Serialize)]
pub struct PlayerEntry {
    pub replay_id: i64,
    pub player_slot: i16,
    pub hero: Option<Hero>,
    pub kills: Option<i32>,
    pub deaths: Option<i32>,
    pub assists: Option<i32>,
    pub replay: Option<ReplaySummary>,
}

impl PlayerEntry {
    pub fn new(p: replay_players::Model, hero: Option<Hero>, replay: Option<replays::Model>) -> Self {
        Self {
            replay_id: p.replay_id,
            player_slot: p.player_slot,
            hero,
            kills: p.kills,
            deaths: p.deaths,
            assists: p.assists,
            replay: replay.map(ReplaySummary::from),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UsersPage {
    #[serde(flatten)]
    pub context: PageContext,
    pub users: Page<UserSummary>,
}

#[derive(Debug, Serialize)]
pub struct UserPage {
    #[serde(flatten)]
    pub context: PageContext,
    pub user: UserProfile,
    pub favourites: Vec<ActivityEntry>,
    pub ratings: Vec<RatingEntry>,
    pub searches: Vec<SearchEntry>,
    pub downloads: Vec<ActivityEntry>,
    pub replays_participated: Vec<PlayerEntry>,
}

/// One of the per-user paginated lists
#[derive(Debug, Serialize)]
pub struct UserListPage<T> {
    #[serde(flatten)]
    pub context: PageContext,
    pub user: UserProfile,
    /// `replays`, `favourites`, `ratings`, `searches` or `downloads`
    pub list: &'static str,
    pub page: Page<T>,
}

#[derive(Debug, Deserialize)]
pub struct UserListPath {
    pub id: i64,
    #[serde(default)]
    pub page: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Settings form as submitted by the browser
#[derive(Debug, Default, Deserialize)]
pub struct SettingsFormInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Checkbox: present when ticked
    #[serde(default)]
    pub show_ads: Option<String>,
    #[serde(default)]
    pub csrf_token: String,
}

#[derive(Debug, Serialize)]
pub struct SettingsForm {
    pub name: String,
    pub email: Option<String>,
    pub show_ads: bool,
    pub csrf_token: String,
    pub errors: BTreeMap<&'static str, Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct SettingsPage {
    #[serde(flatten)]
    pub context: PageContext,
    pub user: UserProfile,
    pub form: SettingsForm,
}
