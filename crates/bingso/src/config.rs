//! Configuration management for bingso.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::photo::DEFAULT_MAX_BYTES;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "bingso";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "bingso.db";

/// Environment variable prefix; nested keys are separated by `__`.
const ENV_PREFIX: &str = "BINGSO_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `BINGSO_`, e.g. `BINGSO_SERVER__BIND`)
/// 2. TOML config file at `~/.config/bingso/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Home accounts and session signing.
    pub auth: AuthConfig,
    /// Status board configuration.
    pub board: BoardConfig,
    /// Obituary venue details.
    pub obituary: ObituaryConfig,
    /// Photo upload limits.
    pub photo: PhotoConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: SocketAddr,
    /// Origins allowed by CORS. Empty means same-origin only.
    pub cors_origins: Vec<String>,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/bingso/bingso.db`
    pub database_path: Option<PathBuf>,
}

/// One funeral home that may sign in to the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HomeAccount {
    /// Identifier stored on every record and in the session cookie.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Argon2 PHC string of the password (see `bingso hash-password`).
    pub password_hash: String,
}

impl HomeAccount {
    /// Check a password against the stored hash.
    #[must_use]
    pub fn verify_password(&self, password: &str) -> bool {
        PasswordHash::new(self.password_hash.trim()).is_ok_and(|stored| {
            Argon2::default()
                .verify_password(password.as_bytes(), &stored)
                .is_ok()
        })
    }
}

/// Hash a password for a [`HomeAccount`] with a fresh random salt.
///
/// # Errors
///
/// Returns an internal error if hashing fails.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("password hashing failed: {e}")))
}

fn is_argon2_hash(value: &str) -> bool {
    PasswordHash::new(value.trim()).is_ok_and(|hash| hash.algorithm.as_str().starts_with("argon2"))
}

/// Authentication configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Homes allowed to sign in.
    pub homes: Vec<HomeAccount>,
    /// Secret used to sign session cookies. When unset a random secret is
    /// used and sessions end on restart.
    pub session_secret: Option<String>,
}

impl AuthConfig {
    /// Find a home account by id.
    #[must_use]
    pub fn home(&self, id: &str) -> Option<&HomeAccount> {
        self.homes.iter().find(|h| h.id == id)
    }

    /// The requested home, or the only configured one when none is named.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown id and a validation error
    /// when no id is given and there is not exactly one home.
    pub fn resolve_home(&self, requested: Option<&str>) -> Result<&HomeAccount> {
        match (requested, self.homes.as_slice()) {
            (Some(id), _) => self
                .home(id)
                .ok_or_else(|| Error::not_found("funeral home", id)),
            (None, [only]) => Ok(only),
            (None, []) => Err(Error::validation("no funeral homes are configured")),
            (None, _) => Err(Error::validation(
                "funeral_home_id is required when several homes are configured",
            )),
        }
    }
}

/// Status board configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Seconds between data refreshes.
    pub refresh_secs: u64,
    /// Seconds between slide changes.
    pub rotate_secs: u64,
    /// Facility name shown in the board header.
    pub facility_name: String,
}

/// Obituary venue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObituaryConfig {
    /// Venue name.
    pub venue_name: String,
    /// Street address.
    pub address: String,
    /// Front-desk phone number.
    pub phone: String,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

/// Photo upload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhotoConfig {
    /// Largest accepted upload in bytes.
    pub max_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([127, 0, 0, 1], 8080)),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            refresh_secs: 10,
            rotate_secs: 15,
            facility_name: "영동병원장례식장".to_string(),
        }
    }
}

impl Default for ObituaryConfig {
    fn default() -> Self {
        Self {
            venue_name: "영동병원장례식장".to_string(),
            address: "충청북도 영동군 영동읍 대학로 106".to_string(),
            phone: "043-740-1004".to_string(),
            latitude: 36.185_342_4,
            longitude: 127.780_959_2,
        }
    }
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(Error::ConfigValidation { message });

        if self.board.refresh_secs == 0 {
            return invalid("board.refresh_secs must be greater than 0".to_string());
        }
        if self.board.rotate_secs == 0 {
            return invalid("board.rotate_secs must be greater than 0".to_string());
        }
        if self.photo.max_bytes == 0 {
            return invalid("photo.max_bytes must be greater than 0".to_string());
        }
        if !(-90.0..=90.0).contains(&self.obituary.latitude) {
            return invalid(format!(
                "obituary.latitude {} is outside -90..=90",
                self.obituary.latitude
            ));
        }
        if !(-180.0..=180.0).contains(&self.obituary.longitude) {
            return invalid(format!(
                "obituary.longitude {} is outside -180..=180",
                self.obituary.longitude
            ));
        }

        let home_id = Regex::new(r"^[A-Za-z0-9_-]{1,64}$").map_err(|e| Error::internal(e.to_string()))?;
        let mut seen = HashSet::new();
        for home in &self.auth.homes {
            if !home_id.is_match(&home.id) {
                return invalid(format!(
                    "home id {:?} must be 1-64 letters, digits, '-' or '_'",
                    home.id
                ));
            }
            if !seen.insert(home.id.as_str()) {
                return invalid(format!("duplicate home id: {}", home.id));
            }
            if !is_argon2_hash(&home.password_hash) {
                return invalid(format!(
                    "password_hash for home {} must be an Argon2 PHC string",
                    home.id
                ));
            }
        }

        if self
            .auth
            .session_secret
            .as_deref()
            .is_some_and(|s| s.len() < 32)
        {
            return invalid("auth.session_secret must be at least 32 characters".to_string());
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the board refresh interval.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.board.refresh_secs)
    }

    /// Get the board rotation interval.
    #[must_use]
    pub fn rotate_interval(&self) -> Duration {
        Duration::from_secs(self.board.rotate_secs)
    }
}
