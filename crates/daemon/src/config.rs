use std::{collections::HashMap, fs};

use anyhow::Context;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub database_url: String,
    /// Empty string disables all sync behavior.
    pub external_state_api: String,
    pub event_timezone: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite://./data/cueline.db".into(),
            external_state_api: "http://127.0.0.1:3100/api/state".into(),
            event_timezone: "Europe/Berlin".into(),
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("cueline.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            if let Some(v) = file_cfg.get("database_url") {
                settings.database_url = v.clone();
            }
            if let Some(v) = file_cfg.get("external_state_api") {
                settings.external_state_api = v.clone();
            }
            if let Some(v) = file_cfg.get("event_timezone") {
                settings.event_timezone = v.clone();
            }
        }
    }

    if let Ok(v) = std::env::var("DATABASE_URL") {
        settings.database_url = v;
    }
    if let Ok(v) = std::env::var("EXTERNAL_STATE_API") {
        settings.external_state_api = v;
    }
    if let Ok(v) = std::env::var("EVENT_TIMEZONE") {
        settings.event_timezone = v;
    }

    settings
}

pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}

/// An empty endpoint string means sync is disabled, not misconfigured.
pub fn parse_external_endpoint(raw: &str) -> anyhow::Result<Option<Url>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let url = raw
        .parse::<Url>()
        .with_context(|| format!("invalid external state API url '{raw}'"))?;
    Ok(Some(url))
}
