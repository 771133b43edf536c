//! Configuration management for bookshelf-sync
//!
//! Sources, later wins: built-in defaults → `bookshelf.toml` (optional) →
//! `BOOKSHELF_*` environment variables (`BOOKSHELF_LIBRARY__BASE_URL` etc.).
//! `OPENLIBRARY_SEARCH_URL` overrides `metadata.search_url`.

use std::env;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::application::search::SearchSettings;

pub const DEFAULT_CONFIG_FILE: &str = "bookshelf.toml";

#[derive(Debug, Deserialize, Clone)]
pub struct LibraryConfig {
    /// ライブラリバックエンドのベースURL（`/books/` はこの下）
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetadataConfig {
    pub search_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    pub quiet_period_ms: u64,
    pub min_metadata_chars: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub library: LibraryConfig,
    pub metadata: MetadataConfig,
    pub http: HttpConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from the default file and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .set_default("library.base_url", "http://localhost:8000")?
            .set_default("metadata.search_url", "https://openlibrary.org/search.json")?
            .set_default("http.timeout_secs", 30)?
            .set_default(
                "http.user_agent",
                concat!("bookshelf-sync/", env!("CARGO_PKG_VERSION")),
            )?
            .set_default("search.quiet_period_ms", 300)?
            .set_default("search.min_metadata_chars", 3)?
            .set_default("logging.level", "info")?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("BOOKSHELF")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("metadata.search_url", env::var("OPENLIBRARY_SEARCH_URL").ok())?
            .build()?;

        config.try_deserialize()
    }

    pub fn search_settings(&self) -> SearchSettings {
        SearchSettings {
            quiet_period: Duration::from_millis(self.search.quiet_period_ms),
            min_metadata_chars: self.search.min_metadata_chars,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http.timeout_secs)
    }
}
