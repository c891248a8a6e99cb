//! Memoized lookups of Dota 2 game data and Steam profiles.
//!
//! Every lookup is backed by a moka cache with a shared time to live (one
//! hour by default):
//!
//! | Cache | Key | Value |
//! |-------|-----|-------|
//! | `heroes` | - | hero list as returned by Steam |
//! | `heroes_by_id` | - | hero id → hero |
//! | `heroes_by_name` | - | internal name → hero |
//! | `items` | - | item id → item |
//! | `leagues` | - | league id → league |
//! | `accounts` | account id | profile, if Steam has one |
//! | `ugc_files` | UGC id | file details |
//!
//! Upstream failures are never stored. The derived maps (`heroes_by_*`,
//! `items`, `leagues`) degrade to an empty map when Steam is unreachable so
//! that pages still render with placeholder data; the next call retries.

use async_trait::async_trait;
use futures::future::try_join_all;
use moka::future::Cache;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, AppResult};
use crate::filters::steamid_from_accountid;
use crate::steam::client::{DOTA2_APP_ID, MAX_SUMMARIES_PER_REQUEST};
use crate::steam::models::{Hero, Item, League, PlayerSummary, UgcFile};
use crate::steam::SteamClient;

/// Upstream the lookup cache fills itself from.
#[async_trait]
pub trait GameDataSource: Send + Sync {
    async fn heroes(&self) -> AppResult<Vec<Hero>>;
    async fn leagues(&self) -> AppResult<Vec<League>>;
    async fn items(&self) -> AppResult<Vec<Item>>;
    /// At most [`MAX_SUMMARIES_PER_REQUEST`] ids per call.
    async fn player_summaries(&self, steam_ids: &[u64]) -> AppResult<Vec<PlayerSummary>>;
    async fn ugc_file(&self, ugcid: u64) -> AppResult<UgcFile>;
}

#[async_trait]
impl GameDataSource for SteamClient {
    async fn heroes(&self) -> AppResult<Vec<Hero>> {
        self.get_heroes().await
    }

    async fn leagues(&self) -> AppResult<Vec<League>> {
        self.get_league_listing().await
    }

    async fn items(&self) -> AppResult<Vec<Item>> {
        Ok(self.get_item_data().await?.itemdata.into_values().collect())
    }

    async fn player_summaries(&self, steam_ids: &[u64]) -> AppResult<Vec<PlayerSummary>> {
        self.get_player_summaries(steam_ids).await
    }

    async fn ugc_file(&self, ugcid: u64) -> AppResult<UgcFile> {
        self.get_ugc_file_details(DOTA2_APP_ID, ugcid).await
    }
}

pub struct LookupCache {
    source: Arc<dyn GameDataSource>,
    heroes: Cache<(), Arc<Vec<Hero>>>,
    heroes_by_id: Cache<(), Arc<HashMap<i64, Hero>>>,
    heroes_by_name: Cache<(), Arc<HashMap<String, Hero>>>,
    items: Cache<(), Arc<HashMap<i64, Item>>>,
    leagues: Cache<(), Arc<HashMap<i64, League>>>,
    accounts: Cache<u32, Option<PlayerSummary>>,
    ugc_files: Cache<u64, UgcFile>,
}

fn single<V: Clone + Send + Sync + 'static>(ttl: Duration) -> Cache<(), V> {
    Cache::builder().max_capacity(1).time_to_live(ttl).build()
}

fn keyed<K, V>(ttl: Duration, max_entries: u64) -> Cache<K, V>
where
    K: std::hash::Hash + Eq + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    Cache::builder()
        .max_capacity(max_entries)
        .time_to_live(ttl)
        .build()
}

fn unshare(e: Arc<AppError>) -> AppError {
    AppError::SteamApi(e.to_string())
}

impl LookupCache {
    pub fn new(source: Arc<dyn GameDataSource>, ttl: Duration, max_entries: u64) -> Self {
        Self {
            source,
            heroes: single(ttl),
            heroes_by_id: single(ttl),
            heroes_by_name: single(ttl),
            items: single(ttl),
            leagues: single(ttl),
            accounts: keyed(ttl, max_entries),
            ugc_files: keyed(ttl, max_entries),
        }
    }

    /// Hero list exactly as Steam returns it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if the hero list cannot be fetched.
    pub async fn fetch_heroes(&self) -> AppResult<Arc<Vec<Hero>>> {
        self.heroes
            .try_get_with((), async {
                tracing::debug!(cache = "heroes", "cache_miss");
                self.source.heroes().await.map(Arc::new)
            })
            .await
            .map_err(unshare)
    }

    pub async fn fetch_heroes_by_id(&self) -> Arc<HashMap<i64, Hero>> {
        let result = self
            .heroes_by_id
            .try_get_with((), async {
                let heroes = self.fetch_heroes().await?;
                Ok::<_, AppError>(Arc::new(
                    heroes.iter().map(|h| (h.id, h.clone())).collect(),
                ))
            })
            .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, cache = "heroes_by_id", "lookup_degraded");
            Arc::default()
        })
    }

    pub async fn fetch_heroes_by_name(&self) -> Arc<HashMap<String, Hero>> {
        let result = self
            .heroes_by_name
            .try_get_with((), async {
                let heroes = self.fetch_heroes().await?;
                Ok::<_, AppError>(Arc::new(
                    heroes.iter().map(|h| (h.name.clone(), h.clone())).collect(),
                ))
            })
            .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, cache = "heroes_by_name", "lookup_degraded");
            Arc::default()
        })
    }

    pub async fn fetch_items(&self) -> Arc<HashMap<i64, Item>> {
        let result = self
            .items
            .try_get_with((), async {
                tracing::debug!(cache = "items", "cache_miss");
                let items = self.source.items().await?;
                Ok::<_, AppError>(Arc::new(items.into_iter().map(|i| (i.id, i)).collect()))
            })
            .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, cache = "items", "lookup_degraded");
            Arc::default()
        })
    }

    pub async fn fetch_leagues(&self) -> Arc<HashMap<i64, League>> {
        let result = self
            .leagues
            .try_get_with((), async {
                tracing::debug!(cache = "leagues", "cache_miss");
                let leagues = self.source.leagues().await?;
                Ok::<_, AppError>(Arc::new(
                    leagues.into_iter().map(|l| (l.leagueid, l)).collect(),
                ))
            })
            .await;

        result.unwrap_or_else(|e| {
            tracing::warn!(error = %e, cache = "leagues", "lookup_degraded");
            Arc::default()
        })
    }

    /// Hero by numeric id, or a placeholder named after the id.
    pub async fn get_hero_by_id(&self, hero_id: i64) -> Hero {
        self.fetch_heroes_by_id()
            .await
            .get(&hero_id)
            .cloned()
            .unwrap_or_else(|| Hero::placeholder_for_id(hero_id))
    }

    pub async fn get_heroes_by_id(&self, hero_ids: &[i64]) -> Vec<Hero> {
        let heroes = self.fetch_heroes_by_id().await;
        hero_ids
            .iter()
            .map(|id| {
                heroes
                    .get(id)
                    .cloned()
                    .unwrap_or_else(|| Hero::placeholder_for_id(*id))
            })
            .collect()
    }

    /// Hero by internal name, or a placeholder with id `-1`.
    pub async fn get_hero_by_name(&self, hero_name: &str) -> Hero {
        self.fetch_heroes_by_name()
            .await
            .get(hero_name)
            .cloned()
            .unwrap_or_else(|| Hero::placeholder_for_name(hero_name))
    }

    pub async fn get_heroes_by_name(&self, hero_names: &[String]) -> Vec<Hero> {
        let heroes = self.fetch_heroes_by_name().await;
        hero_names
            .iter()
            .map(|name| {
                heroes
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| Hero::placeholder_for_name(name))
            })
            .collect()
    }

    pub async fn get_item_by_id(&self, item_id: i64) -> Option<Item> {
        self.fetch_items().await.get(&item_id).cloned()
    }

    pub async fn get_items_by_id(&self, item_ids: &[i64]) -> Vec<Option<Item>> {
        let items = self.fetch_items().await;
        item_ids.iter().map(|id| items.get(id).cloned()).collect()
    }

    pub async fn get_league_by_id(&self, league_id: i64) -> Option<League> {
        self.fetch_leagues().await.get(&league_id).cloned()
    }

    pub async fn get_leagues_by_id(&self, league_ids: &[i64]) -> Vec<Option<League>> {
        let leagues = self.fetch_leagues().await;
        league_ids.iter().map(|id| leagues.get(id).cloned()).collect()
    }

    /// Steam profile for a 32-bit account id.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if Steam cannot be reached. A profile
    /// Steam does not know is `Ok(None)` and is cached like any other answer.
    pub async fn get_account_by_id(&self, account_id: u32) -> AppResult<Option<PlayerSummary>> {
        self.accounts
            .try_get_with(account_id, async move {
                tracing::debug!(cache = "accounts", account_id, "cache_miss");
                let steam_id = steamid_from_accountid(account_id);
                let players = self.source.player_summaries(&[steam_id]).await?;
                Ok::<_, AppError>(players.into_iter().find(|p| p.steamid == steam_id))
            })
            .await
            .map_err(unshare)
    }

    /// Steam profiles for many account ids, in the order requested.
    ///
    /// Ids already cached are served locally; the rest are fetched in
    /// batches of [`MAX_SUMMARIES_PER_REQUEST`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if any batch fails.
    pub async fn get_accounts_by_id(
        &self,
        account_ids: &[u32],
    ) -> AppResult<Vec<Option<PlayerSummary>>> {
        let mut found: HashMap<u32, Option<PlayerSummary>> = HashMap::new();
        let mut missing: Vec<u32> = Vec::new();

        for &account_id in account_ids {
            if found.contains_key(&account_id) || missing.contains(&account_id) {
                continue;
            }
            match self.accounts.get(&account_id).await {
                Some(profile) => {
                    found.insert(account_id, profile);
                }
                None => missing.push(account_id),
            }
        }

        if !missing.is_empty() {
            tracing::debug!(cache = "accounts", missing = missing.len(), "cache_miss");
            let batches = missing.chunks(MAX_SUMMARIES_PER_REQUEST).map(|chunk| {
                let steam_ids: Vec<u64> =
                    chunk.iter().map(|id| steamid_from_accountid(*id)).collect();
                async move { self.source.player_summaries(&steam_ids).await }
            });

            let mut by_steam_id: HashMap<u64, PlayerSummary> = try_join_all(batches)
                .await?
                .into_iter()
                .flatten()
                .map(|p| (p.steamid, p))
                .collect();

            for account_id in missing {
                let profile = by_steam_id.remove(&steamid_from_accountid(account_id));
                self.accounts.insert(account_id, profile.clone()).await;
                found.insert(account_id, profile);
            }
        }

        Ok(account_ids
            .iter()
            .map(|id| found.get(id).cloned().flatten())
            .collect())
    }

    /// Download details for a replay uploaded to Steam's UGC storage.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if Steam cannot be reached.
    pub async fn get_file_by_ugcid(&self, ugcid: u64) -> AppResult<UgcFile> {
        self.ugc_files
            .try_get_with(ugcid, async move {
                tracing::debug!(cache = "ugc_files", ugcid, "cache_miss");
                self.source.ugc_file(ugcid).await
            })
            .await
            .map_err(unshare)
    }

    /// Drop every cached lookup.
    pub fn invalidate_all(&self) {
        self.heroes.invalidate_all();
        self.heroes_by_id.invalidate_all();
        self.heroes_by_name.invalidate_all();
        self.items.invalidate_all();
        self.leagues.invalidate_all();
        self.accounts.invalidate_all();
        self.ugc_files.invalidate_all();
        tracing::info!("lookup_cache_invalidated");
    }
}
