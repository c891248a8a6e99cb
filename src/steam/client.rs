use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::steam::models::{
    Hero, HeroesResult, ItemDataResponse, League, LeagueListingResult, PlayerSummariesResponse,
    PlayerSummary, ResultEnvelope, UgcFile, UgcFileResponse,
};

/// Steam caps `GetPlayerSummaries` at 100 ids per request.
pub const MAX_SUMMARIES_PER_REQUEST: usize = 100;

/// Dota 2 app id, used for UGC lookups.
pub const DOTA2_APP_ID: u32 = 570;

pub struct SteamClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    openid_url: String,
    item_data_url: String,
}

impl SteamClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("dotabank/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url: config.steam_api_base_url.trim_end_matches('/').to_string(),
            api_key: config.steam_api_key.clone(),
            openid_url: config.steam_openid_url.clone(),
            item_data_url: config.item_data_url.clone(),
        })
    }

    #[must_use]
    pub fn openid_url(&self) -> &str {
        &self.openid_url
    }

    fn interface_url(&self, interface: &str, method: &str, version: u8) -> String {
        format!("{}/{interface}/{method}/v{version}/", self.base_url)
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> AppResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| AppError::SteamApi(format!("{what}: request failed: {e}")))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::SteamApi(format!("{what}: Rate limited (429)")));
        }

        if !response.status().is_success() {
            return Err(AppError::SteamApi(format!(
                "{what}: HTTP {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AppError::SteamApi(format!("{what}: failed to read body: {e}")))?;

        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                call = what,
                body_preview = %text.chars().take(500).collect::<String>(),
                "Failed to parse Steam response"
            );
            AppError::SteamApi(format!("{what}: failed to parse response: {e}"))
        })
    }

    /// Fetch the full hero list.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if the request fails or returns an error status.
    pub async fn get_heroes(&self) -> AppResult<Vec<Hero>> {
        let request = self
            .http_client
            .get(self.interface_url("IEconDOTA2_570", "GetHeroes", 1))
            .query(&[("key", self.api_key.as_str()), ("language", "en_US")]);

        let envelope: ResultEnvelope<HeroesResult> = Self::send_json(request, "GetHeroes").await?;
        Ok(envelope.result.heroes)
    }

    /// Fetch every league Steam knows about.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if the request fails or returns an error status.
    pub async fn get_league_listing(&self) -> AppResult<Vec<League>> {
        let request = self
            .http_client
            .get(self.interface_url("IDOTA2Match_570", "GetLeagueListing", 1))
            .query(&[("key", self.api_key.as_str()), ("language", "en_US")]);

        let envelope: ResultEnvelope<LeagueListingResult> =
            Self::send_json(request, "GetLeagueListing").await?;
        Ok(envelope.result.leagues)
    }

    /// Fetch profiles for up to [`MAX_SUMMARIES_PER_REQUEST`] Steam ids.
    ///
    /// Steam silently omits unknown ids, so the result can be shorter than the
    /// input and is not guaranteed to be in request order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` when given too many ids, or
    /// `AppError::SteamApi` if the request fails.
    pub async fn get_player_summaries(&self, steam_ids: &[u64]) -> AppResult<Vec<PlayerSummary>> {
        if steam_ids.is_empty() {
            return Ok(Vec::new());
        }
        if steam_ids.len() > MAX_SUMMARIES_PER_REQUEST {
            return Err(AppError::BadRequest(format!(
                "At most {MAX_SUMMARIES_PER_REQUEST} Steam ids per request"
            )));
        }

        let ids = steam_ids
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let request = self
            .http_client
            .get(self.interface_url("ISteamUser", "GetPlayerSummaries", 2))
            .query(&[("key", self.api_key.as_str()), ("steamids", ids.as_str())]);

        let parsed: PlayerSummariesResponse =
            Self::send_json(request, "GetPlayerSummaries").await?;
        Ok(parsed.response.players)
    }

    /// Resolve a UGC handle (replay upload) to its download details.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if the request fails or returns an error status.
    pub async fn get_ugc_file_details(&self, app_id: u32, ugcid: u64) -> AppResult<UgcFile> {
        let app_id = app_id.to_string();
        let ugcid = ugcid.to_string();
        let request = self
            .http_client
            .get(self.interface_url("ISteamRemoteStorage", "GetUGCFileDetails", 1))
            .query(&[
                ("key", self.api_key.as_str()),
                ("appid", app_id.as_str()),
                ("ugcid", ugcid.as_str()),
            ]);

        let parsed: UgcFileResponse = Self::send_json(request, "GetUGCFileDetails").await?;
        Ok(parsed.data)
    }

    /// Fetch the Dota 2 item feed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if the request fails or returns an error status.
    pub async fn get_item_data(&self) -> AppResult<ItemDataResponse> {
        let request = self.http_client.get(&self.item_data_url);
        Self::send_json(request, "itemdata").await
    }

    /// Ask the OpenID provider to confirm a positive assertion.
    ///
    /// Sends the received `openid.*` parameters back with the mode switched
    /// to `check_authentication`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::SteamApi` if the provider cannot be reached.
    pub async fn check_authentication(&self, params: &[(String, String)]) -> AppResult<bool> {
        let mut form: Vec<(&str, &str)> = params
            .iter()
            .filter(|(k, _)| k != "openid.mode")
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        form.push(("openid.mode", "check_authentication"));

        let response = self
            .http_client
            .post(&self.openid_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::SteamApi(format!("OpenID: request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::SteamApi(format!(
                "OpenID: HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::SteamApi(format!("OpenID: failed to read body: {e}")))?;

        Ok(crate::steam::openid::is_valid_response(&body))
    }
}
