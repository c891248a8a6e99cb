use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::services::lookup::{GameDataSource, LookupCache};
use crate::services::session::SessionKey;
use crate::steam::openid::AssertionVerifier;
use crate::steam::SteamClient;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<Config>,
    pub steam_client: Arc<SteamClient>,
    pub lookups: Arc<LookupCache>,
    pub session_key: Arc<SessionKey>,
    pub openid: Arc<dyn AssertionVerifier>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, config: Config, steam_client: SteamClient) -> Self {
        let steam_client = Arc::new(steam_client);
        let source: Arc<dyn GameDataSource> = steam_client.clone();
        Self::with_source(db, config, steam_client, source)
    }

    /// Build state with a custom upstream for the lookup cache.
    pub fn with_source(
        db: DatabaseConnection,
        config: Config,
        steam_client: Arc<SteamClient>,
        source: Arc<dyn GameDataSource>,
    ) -> Self {
        let lookups = LookupCache::new(
            source,
            Duration::from_secs(config.lookup_ttl_seconds),
            config.lookup_max_entries,
        );
        let session_key = SessionKey::new(config.secret_key.as_bytes(), config.secure_cookies());
        let openid: Arc<dyn AssertionVerifier> = steam_client.clone();

        Self {
            db,
            config: Arc::new(config),
            steam_client,
            lookups: Arc::new(lookups),
            session_key: Arc::new(session_key),
            openid,
        }
    }

    /// Replace how sign-in assertions are checked.
    #[must_use]
    pub fn with_openid(mut self, openid: Arc<dyn AssertionVerifier>) -> Self {
        self.openid = openid;
        self
    }
}
