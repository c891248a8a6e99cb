use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Deployment {
    Local,
    Dev,
    Stage,
    Prod,
}

impl Deployment {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Self::Dev,
            "stage" | "staging" => Self::Stage,
            "prod" | "production" => Self::Prod,
            _ => Self::Local,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Steam Web API
    pub steam_api_key: String,
    pub steam_api_base_url: String,
    pub steam_openid_url: String,
    pub item_data_url: String,

    // Site
    pub public_url: String,
    pub secret_key: String,
    pub contact_email: String,
    pub users_per_page: u64,
    pub replays_per_page: u64,
    pub latest_replays_limit: u64,

    // API settings
    pub api_host: String,
    pub api_port: u16,

    // Rate limiting
    pub disable_rate_limiting: bool,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,

    // Lookup caching
    pub lookup_ttl_seconds: u64,
    pub lookup_max_entries: u64,

    // Application metadata
    pub deployment: Deployment,
}

fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let secret_key =
            env::var("SECRET_KEY").map_err(|_| ConfigError::Missing("SECRET_KEY"))?;
        if secret_key.len() < 16 {
            return Err(ConfigError::Invalid(
                "SECRET_KEY",
                "must be at least 16 bytes".to_string(),
            ));
        }

        Ok(Self {
            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,

            // Steam Web API
            steam_api_key: env::var("STEAM_API_KEY")
                .map_err(|_| ConfigError::Missing("STEAM_API_KEY"))?,
            steam_api_base_url: env::var("STEAM_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.steampowered.com".to_string()),
            steam_openid_url: env::var("STEAM_OPENID_URL")
                .unwrap_or_else(|_| "https://steamcommunity.com/openid/login".to_string()),
            item_data_url: env::var("ITEM_DATA_URL")
                .unwrap_or_else(|_| "http://www.dota2.com/jsfeed/itemdata".to_string()),

            // Site
            public_url: env::var("PUBLIC_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string())
                .trim_end_matches('/')
                .to_string(),
            secret_key,
            contact_email: env::var("CONTACT_EMAIL")
                .unwrap_or_else(|_| "admin@localhost".to_string()),
            users_per_page: var_or("USERS_PER_PAGE", 50),
            replays_per_page: var_or("REPLAYS_PER_PAGE", 20),
            latest_replays_limit: var_or("LATEST_REPLAYS_LIMIT", 5),

            // API settings
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: var_or("API_PORT", 3000),

            // Rate limiting
            disable_rate_limiting: var_or("DISABLE_RATE_LIMITING", false),
            rate_limit_per_second: var_or("RATE_LIMIT_PER_SECOND", 5),
            rate_limit_burst: var_or("RATE_LIMIT_BURST", 60),

            // Lookup caching
            lookup_ttl_seconds: var_or("LOOKUP_TTL_SECONDS", 60 * 60), // 1 hour default
            lookup_max_entries: var_or("LOOKUP_MAX_ENTRIES", 10_000),

            // Application metadata
            deployment: Deployment::from_str(
                &env::var("DEPLOYMENT").unwrap_or_else(|_| "local".to_string()),
            ),
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.deployment == Deployment::Prod
    }

    /// Configuration with fixed values, for tests and local tooling.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            database_url: "postgres://localhost/dotabank_test".to_string(),
            steam_api_key: "test-key".to_string(),
            steam_api_base_url: "http://127.0.0.1:9".to_string(),
            steam_openid_url: "https://steamcommunity.com/openid/login".to_string(),
            item_data_url: "http://127.0.0.1:9/itemdata".to_string(),
            public_url: "http://localhost:3000".to_string(),
            secret_key: "test-secret-key-0123456789".to_string(),
            contact_email: "admin@example.com".to_string(),
            users_per_page: 50,
            replays_per_page: 20,
            latest_replays_limit: 5,
            api_host: "127.0.0.1".to_string(),
            api_port: 3000,
            disable_rate_limiting: true,
            rate_limit_per_second: 5,
            rate_limit_burst: 60,
            lookup_ttl_seconds: 3600,
            lookup_max_entries: 1000,
            deployment: Deployment::Local,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
