// Centralized configuration management for the FID MFERS backend
// Load ALL env vars ONCE at startup; fail fast on anything missing

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Global application configuration loaded once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(|| {
    // For tests, load .env file first
    #[cfg(test)]
    dotenv::dotenv().ok();

    AppConfig::from_env().expect("Failed to load configuration")
});

/// Accessor used by modules that prefer a function call over the static
pub fn config() -> &'static AppConfig {
    &CONFIG
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    // Server
    pub bind_address: String,
    pub port: u16,
    pub environment: Environment,
    pub rust_log: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub database_min_connections: u32,
    pub database_connect_timeout: u64,
    pub database_idle_timeout: u64,
    pub database_max_lifetime: u64,

    // Directory service (Neynar)
    pub neynar_api_base: String,
    pub neynar_api_key: String,
    pub neynar_webhook_secret: Option<String>,

    // Image generation service
    pub generator_url: String,

    // IPFS pinning (Pinata)
    pub pinata_api_base: String,
    pub pinata_jwt: String,
    pub ipfs_gateway: String,

    // Chain
    pub rpc_url: String,
    pub chain_id: u64,
    pub nft_contract_address: String,
    pub token_contract_address: String,
    pub nft_signer_private_key: String,
    pub confirm_poll_interval_secs: u64,
    pub confirm_max_wait_secs: u64,

    // Eligibility policy
    pub required_token_balance: u64,
    pub mint_price: String,
    pub mint_cost_units: String,

    // Auth (Farcaster Quick Auth)
    pub quickauth_issuer: String,
    pub quickauth_audience: String,

    // Application
    pub app_url: String,
    pub admin_wallet_address: String,
    pub cors_allowed_origins: Vec<String>,
}

/// Environment type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Environment {
    Development,
    Test,
    Staging,
    Production,
}

impl From<String> for Environment {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            bind_address: env_or("BIND_ADDRESS", "0.0.0.0"),
            port: parse_env("PORT", 8080)?,
            environment: Environment::from(env_or("ENVIRONMENT", "development")),
            rust_log: env_or("RUST_LOG", "fidmfers_backend=debug,tower_http=info"),

            database_url: require("DATABASE_URL")?,
            database_max_connections: parse_env("DATABASE_MAX_CONNECTIONS", 20)?,
            database_min_connections: parse_env("DATABASE_MIN_CONNECTIONS", 2)?,
            database_connect_timeout: parse_env("DATABASE_CONNECT_TIMEOUT", 10)?,
            database_idle_timeout: parse_env("DATABASE_IDLE_TIMEOUT", 600)?,
            database_max_lifetime: parse_env("DATABASE_MAX_LIFETIME", 1800)?,

            neynar_api_base: env_or("NEYNAR_API_BASE", "https://api.neynar.com"),
            neynar_api_key: require("NEYNAR_API_KEY")?,
            neynar_webhook_secret: env::var("NEYNAR_WEBHOOK_SECRET").ok(),

            generator_url: require("GENERATOR_URL")?,

            pinata_api_base: env_or("PINATA_API_BASE", "https://uploads.pinata.cloud"),
            pinata_jwt: require("PINATA_JWT")?,
            ipfs_gateway: env_or("IPFS_GATEWAY", "https://gateway.pinata.cloud/ipfs"),

            // Public endpoint as fallback so local setups work out of the box
            rpc_url: env_or("BASE_RPC_URL", "https://mainnet.base.org"),
            chain_id: parse_env("CHAIN_ID", 8453)?,
            nft_contract_address: require("NFT_CONTRACT_ADDRESS")?,
            token_contract_address: require("TOKEN_CONTRACT_ADDRESS")?,
            nft_signer_private_key: require("NFT_SIGNER_PRIVATE_KEY")?,
            confirm_poll_interval_secs: parse_env("CONFIRM_POLL_INTERVAL_SECS", 3)?,
            confirm_max_wait_secs: parse_env("CONFIRM_MAX_WAIT_SECS", 90)?,

            required_token_balance: parse_env("REQUIRED_TOKEN_BALANCE", 200_000)?,
            mint_price: env_or("MINT_PRICE", "0.99"),
            mint_cost_units: env_or("MINT_COST_UNITS", "990000"),

            quickauth_issuer: env_or("QUICKAUTH_ISSUER", "https://auth.farcaster.xyz"),
            quickauth_audience: require("QUICKAUTH_AUDIENCE")?,

            app_url: require("APP_URL")?,
            admin_wallet_address: require("ADMIN_WALLET_ADDRESS")?,
            cors_allowed_origins: env_or("CORS_ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        })
    }
}

fn require(name: &str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(v) => v
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), v)),
        Err(_) => Ok(default),
    }
}
