use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use utoipa::ToSchema;

/// Envelope used by most Dota 2 interfaces: `{"result": {...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ResultEnvelope<T> {
    pub result: T,
}

/// Response from `IEconDOTA2_570/GetHeroes`
#[derive(Debug, Clone, Deserialize)]
pub struct HeroesResult {
    #[serde(default)]
    pub heroes: Vec<Hero>,
    #[serde(default)]
    pub status: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Hero {
    /// Internal name, e.g. `npc_dota_hero_antimage`
    pub name: String,
    pub id: i64,
    #[serde(default)]
    pub localized_name: String,
}

impl Hero {
    /// Stand-in for a hero id the API does not know about.
    #[must_use]
    pub fn placeholder_for_id(id: i64) -> Self {
        Self {
            name: id.to_string(),
            localized_name: id.to_string(),
            id,
        }
    }

    /// Stand-in for a hero name the API does not know about.
    #[must_use]
    pub fn placeholder_for_name(name: &str) -> Self {
        Self {
            name: name.to_string(),
            localized_name: name.to_string(),
            id: -1,
        }
    }
}

/// Response from `IDOTA2Match_570/GetLeagueListing`
#[derive(Debug, Clone, Deserialize)]
pub struct LeagueListingResult {
    #[serde(default)]
    pub leagues: Vec<League>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct League {
    pub leagueid: i64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tournament_url: Option<String>,
    #[serde(default)]
    pub itemdef: Option<i64>,
}

/// Response from `ISteamUser/GetPlayerSummaries/v2`
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSummariesResponse {
    pub response: PlayerSummaries,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlayerSummaries {
    #[serde(default)]
    pub players: Vec<PlayerSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PlayerSummary {
    /// 64-bit Steam id, sent by Steam as a string
    #[serde(deserialize_with = "u64_from_string")]
    pub steamid: u64,
    #[serde(default)]
    pub personaname: String,
    #[serde(default)]
    pub profileurl: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub avatarmedium: Option<String>,
    #[serde(default)]
    pub avatarfull: Option<String>,
    #[serde(default)]
    pub communityvisibilitystate: Option<i32>,
}

fn u64_from_string<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Num(u64),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        Raw::Num(n) => Ok(n),
    }
}

/// Response from `ISteamRemoteStorage/GetUGCFileDetails`
#[derive(Debug, Clone, Deserialize)]
pub struct UgcFileResponse {
    pub data: UgcFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UgcFile {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub size: u64,
}

/// Response from the Dota 2 item data feed
#[derive(Debug, Clone, Deserialize)]
pub struct ItemDataResponse {
    pub itemdata: HashMap<String, Item>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    pub id: i64,
    /// Display name, e.g. `Blink Dagger`
    #[serde(default)]
    pub dname: String,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub qual: Option<String>,
    #[serde(default)]
    pub cost: Option<i64>,
    #[serde(default)]
    pub desc: Option<String>,
    #[serde(default)]
    pub lore: Option<String>,
    #[serde(default)]
    pub created: Option<bool>,
}
