use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::common::AppState;
use crate::error::{AppError, AppResult};
use crate::filters::{dota_wiki_link, dotabuff_hero_link, dotabuff_item_link, steamid_from_accountid};
use crate::steam::models::{Hero, Item, League, PlayerSummary, UgcFile};

/// Upper bound on ids accepted by the batch account lookup.
pub const MAX_BATCH_ACCOUNTS: usize = 500;

#[derive(Debug, Serialize, ToSchema)]
pub struct HeroResponse {
    pub id: i64,
    pub name: String,
    pub localized_name: String,
    pub dotabuff_url: String,
    pub wiki_url: String,
}

impl From<Hero> for HeroResponse {
    fn from(h: Hero) -> Self {
        Self {
            dotabuff_url: dotabuff_hero_link(&h.localized_name),
            wiki_url: dota_wiki_link(&h.localized_name),
            id: h.id,
            name: h.name,
            localized_name: h.localized_name,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ItemResponse {
    #[serde(flatten)]
    pub item: Item,
    pub dotabuff_url: String,
    pub wiki_url: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountResponse {
    pub account_id: u32,
    pub steam_id: u64,
    pub persona_name: String,
    pub profile_url: Option<String>,
    pub avatar: Option<String>,
}

impl AccountResponse {
    fn new(account_id: u32, p: PlayerSummary) -> Self {
        Self {
            account_id,
            steam_id: steamid_from_accountid(account_id),
            persona_name: p.personaname,
            profile_url: p.profileurl,
            avatar: p.avatarfull.or(p.avatar),
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccountsQuery {
    /// Comma-separated 32-bit account ids
    pub ids: String,
}

/// Parse `1,2, 3` into account ids.
///
/// # Errors
///
/// Returns `AppError::BadRequest` on an unparsable id or too many ids.
pub fn parse_account_ids(raw: &str) -> AppResult<Vec<u32>> {
    let ids = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|_| AppError::BadRequest(format!("Invalid account id '{s}'")))
        })
        .collect::<AppResult<Vec<u32>>>()?;

    if ids.len() > MAX_BATCH_ACCOUNTS {
        return Err(AppError::BadRequest(format!(
            "At most {MAX_BATCH_ACCOUNTS} account ids per request"
        )));
    }
    Ok(ids)
}

/// List all heroes
#[utoipa::path(
    get,
    path = "/api/heroes",
    responses(
        (status = 200, description = "Heroes retrieved successfully", body = Vec<HeroResponse>),
        (status = 502, description = "Steam API unavailable"),
    ),
    tag = "lookups"
)]
pub async fn list_heroes(State(state): State<AppState>) -> AppResult<Json<Vec<HeroResponse>>> {
    let heroes = state.lookups.fetch_heroes().await?;
    Ok(Json(
        heroes.iter().cloned().map(HeroResponse::from).collect(),
    ))
}

/// Get a hero by numeric id or internal name
///
/// Unknown heroes resolve to a placeholder that echoes the lookup key.
#[utoipa::path(
    get,
    path = "/api/heroes/{hero}",
    params(
        ("hero" = String, Path, description = "Hero id or internal name (npc_dota_hero_*)"),
    ),
    responses(
        (status = 200, description = "Hero retrieved", body = HeroResponse),
    ),
    tag = "lookups"
)]
pub async fn get_hero(
    State(state): State<AppState>,
    Path(hero): Path<String>,
) -> AppResult<Json<HeroResponse>> {
    let hero = match hero.parse::<i64>() {
        Ok(id) => state.lookups.get_hero_by_id(id).await,
        Err(_) => state.lookups.get_hero_by_name(&hero).await,
    };
    Ok(Json(hero.into()))
}

/// Get an item by id
#[utoipa::path(
    get,
    path = "/api/items/{item_id}",
    params(
        ("item_id" = i64, Path, description = "Item id"),
    ),
    responses(
        (status = 200, description = "Item retrieved", body = ItemResponse),
        (status = 404, description = "Item not found"),
    ),
    tag = "lookups"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> AppResult<Json<ItemResponse>> {
    let item = state
        .lookups
        .get_item_by_id(item_id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Item {item_id} not found")))?;

    Ok(Json(ItemResponse {
        dotabuff_url: dotabuff_item_link(&item.dname),
        wiki_url: dota_wiki_link(&item.dname),
        item,
    }))
}

/// Get a league by id
#[utoipa::path(
    get,
    path = "/api/leagues/{league_id}",
    params(
        ("league_id" = i64, Path, description = "League id"),
    ),
    responses(
        (status = 200, description = "League retrieved", body = League),
        (status = 404, description = "League not found"),
    ),
    tag = "lookups"
)]
pub async fn get_league(
    State(state): State<AppState>,
    Path(league_id): Path<i64>,
) -> AppResult<Json<League>> {
    state
        .lookups
        .get_league_by_id(league_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("League {league_id} not found")))
}

/// Get the Steam profile behind an account id
#[utoipa::path(
    get,
    path = "/api/accounts/{account_id}",
    params(
        ("account_id" = u32, Path, description = "32-bit Steam account id"),
    ),
    responses(
        (status = 200, description = "Profile retrieved", body = AccountResponse),
        (status = 404, description = "No such Steam profile"),
        (status = 502, description = "Steam API unavailable"),
    ),
    tag = "lookups"
)]
pub async fn get_account(
    State(state): State<AppState>,
    Path(account_id): Path<u32>,
) -> AppResult<Json<AccountResponse>> {
    state
        .lookups
        .get_account_by_id(account_id)
        .await?
        .map(|p| Json(AccountResponse::new(account_id, p)))
        .ok_or_else(|| AppError::NotFound(format!("Account {account_id} not found")))
}

/// Get Steam profiles for many account ids
///
/// The result lines up with the requested ids; unknown accounts are null.
#[utoipa::path(
    get,
    path = "/api/accounts",
    params(AccountsQuery),
    responses(
        (status = 200, description = "Profiles retrieved", body = Vec<Option<AccountResponse>>),
        (status = 400, description = "Malformed id list"),
        (status = 502, description = "Steam API unavailable"),
    ),
    tag = "lookups"
)]
pub async fn list_accounts(
    State(state): State<AppState>,
    Query(query): Query<AccountsQuery>,
) -> AppResult<Json<Vec<Option<AccountResponse>>>> {
    let ids = parse_account_ids(&query.ids)?;
    let profiles = state.lookups.get_accounts_by_id(&ids).await?;

    Ok(Json(
        ids.into_iter()
            .zip(profiles)
            .map(|(id, p)| p.map(|p| AccountResponse::new(id, p)))
            .collect(),
    ))
}

/// Resolve a replay's UGC handle to its download
#[utoipa::path(
    get,
    path = "/api/ugc/{ugcid}",
    params(
        ("ugcid" = u64, Path, description = "Steam UGC id"),
    ),
    responses(
        (status = 200, description = "File details retrieved", body = UgcFile),
        (status = 502, description = "Steam API unavailable"),
    ),
    tag = "lookups"
)]
pub async fn get_ugc_file(
    State(state): State<AppState>,
    Path(ugcid): Path<u64>,
) -> AppResult<Json<UgcFile>> {
    Ok(Json(state.lookups.get_file_by_ugcid(ugcid).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_ids() {
        assert_eq!(parse_account_ids("1, 2,3,").unwrap(), vec![1, 2, 3]);
        assert!(parse_account_ids("").unwrap().is_empty());
        assert!(matches!(
            parse_account_ids("1,x"),
            Err(AppError::BadRequest(_))
        ));
        assert!(parse_account_ids("-1").is_err());
    }

    #[test]
    fn rejects_oversized_batches() {
        let raw = (0..=MAX_BATCH_ACCOUNTS)
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        assert!(parse_account_ids(&raw).is_err());
    }

    #[test]
    fn hero_response_carries_links() {
        let hero = Hero {
            id: 39,
            name: "npc_dota_hero_queenofpain".to_string(),
            localized_name: "Queen of Pain".to_string(),
        };
        let response = HeroResponse::from(hero);
        assert_eq!(response.dotabuff_url, "http://dotabuff.com/heroes/queen-of-pain");
        assert_eq!(response.wiki_url, "http://dota2wiki.com/wiki/Queen_of_Pain");
    }
}
