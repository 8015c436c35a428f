use std::{env, fs, path::PathBuf};

use chrono::FixedOffset;
use serde::Deserialize;

use crate::error::ConfigError;

const DEFAULT_CONFIG_PATH: &str = "privateKey.json";
const DEFAULT_FILES_DIR: &str = "files";
const SEOUL_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Secrets document (`privateKey.json`) using the deployed key names.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretsDocument {
    #[serde(rename = "DATABASE_URL")]
    pub database_url: String,
    #[serde(rename = "CLOVA-HOST")]
    pub clova_host: String,
    #[serde(rename = "X-NCP-CLOVASTUDIO-API-KEY")]
    pub clova_api_key: String,
    #[serde(rename = "X-NCP-APIGW-API-KEY")]
    pub apigw_api_key: String,
    #[serde(rename = "X-NCP-CLOVASTUDIO-REQUEST-ID-1")]
    pub summarize_request_id: String,
    #[serde(rename = "X-NCP-CLOVASTUDIO-REQUEST-ID-2")]
    pub feedback_request_id: String,
}

/// Process-wide settings. Loaded once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub clova: ClovaCredentials,
    pub files_dir: PathBuf,
    pub headless: bool,
    pub timezone: FixedOffset,
}

#[derive(Debug, Clone)]
pub struct ClovaCredentials {
    pub host: String,
    pub api_key: String,
    pub apigw_api_key: String,
    pub summarize_request_id: String,
    pub feedback_request_id: String,
}

impl Config {
    /// Reads `.env`, then the secrets document at `PRIVATE_KEY_PATH`
    /// (default `privateKey.json`). `DATABASE_URL` in the environment wins
    /// over the document.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let path = env::var("PRIVATE_KEY_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let raw = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let document: SecretsDocument =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        let mut config = Self::from_document(document)?;
        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(dir) = env::var("FILES_DIR") {
            config.files_dir = PathBuf::from(dir);
        }
        if let Ok(raw) = env::var("BROWSER_HEADLESS") {
            config.headless = parse_flag("BROWSER_HEADLESS", &raw)?;
        }
        Ok(config)
    }

    pub fn from_document(document: SecretsDocument) -> Result<Self, ConfigError> {
        let timezone = FixedOffset::east_opt(SEOUL_UTC_OFFSET_SECS).ok_or(ConfigError::Invalid {
            key: "timezone",
            value: SEOUL_UTC_OFFSET_SECS.to_string(),
        })?;

        Ok(Self {
            database_url: document.database_url,
            clova: ClovaCredentials {
                host: document.clova_host.trim_end_matches('/').to_string(),
                api_key: document.clova_api_key,
                apigw_api_key: document.apigw_api_key,
                summarize_request_id: document.summarize_request_id,
                feedback_request_id: document.feedback_request_id,
            },
            files_dir: PathBuf::from(DEFAULT_FILES_DIR),
            headless: true,
            timezone,
        })
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: raw.to_string(),
        }),
    }
}
