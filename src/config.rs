use std::path::PathBuf;
use std::str::FromStr;
use std::{env, io};

use secrecy::SecretString;
use serde::Serialize;
use tracing::debug;

use crate::resolver::BuildingGuard;

const DEFAULT_MAPS_API_BASE: &str = "https://maps.googleapis.com/maps/api";
const DEFAULT_JOURNAL_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_JOURNAL_MAX_FILES: usize = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub google_maps_api_key: Option<SecretString>,
    pub maps_api_base: String,
    pub default_language: String,
    pub http_timeout_secs: u64,
    pub geocode_rate_limit_qps: u32,
    pub geocode_retry_attempts: u32,
    pub nearby_radius_m: u32,
    pub building_guard: BuildingGuard,
    pub journal_dir: Option<PathBuf>,
    pub journal_batch_size: usize,
    pub journal_max_bytes: u64,
    pub journal_max_files: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct PublicAppConfig {
    pub maps_api_base: String,
    pub default_language: String,
    pub http_timeout_secs: u64,
    pub geocode_rate_limit_qps: u32,
    pub geocode_retry_attempts: u32,
    pub nearby_radius_m: u32,
    pub building_guard: &'static str,
    pub journal_dir: Option<String>,
    pub has_google_maps_key: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            google_maps_api_key: env::var("GOOGLE_MAPS_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(SecretString::from),
            maps_api_base: env::var("GOOGLE_MAPS_API_BASE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MAPS_API_BASE.to_string()),
            default_language: env::var("RESOLVER_LANGUAGE")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| "en".to_string()),
            http_timeout_secs: parse_var("RESOLVER_HTTP_TIMEOUT_SECS", 5),
            geocode_rate_limit_qps: parse_var("GEOCODE_RATE_LIMIT_QPS", 3),
            geocode_retry_attempts: parse_var("GEOCODE_RETRY_ATTEMPTS", 3).max(1),
            nearby_radius_m: parse_var("NEARBY_SEARCH_RADIUS_M", 30),
            building_guard: env::var("BUILDING_GUARD")
                .ok()
                .and_then(|v| BuildingGuard::parse(&v))
                .unwrap_or_default(),
            journal_dir: env::var("RESOLVER_JOURNAL_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            journal_batch_size: parse_var("JOURNAL_BATCH_SIZE", 25),
            journal_max_bytes: parse_var("JOURNAL_MAX_BYTES", DEFAULT_JOURNAL_MAX_BYTES),
            journal_max_files: parse_var("JOURNAL_MAX_FILES", DEFAULT_JOURNAL_MAX_FILES).max(1),
        }
    }

    pub fn public_profile(&self) -> PublicAppConfig {
        PublicAppConfig {
            maps_api_base: self.maps_api_base.clone(),
            default_language: self.default_language.clone(),
            http_timeout_secs: self.http_timeout_secs,
            geocode_rate_limit_qps: self.geocode_rate_limit_qps,
            geocode_retry_attempts: self.geocode_retry_attempts,
            nearby_radius_m: self.nearby_radius_m,
            building_guard: self.building_guard.as_tag(),
            journal_dir: self
                .journal_dir
                .as_ref()
                .map(|dir| dir.display().to_string()),
            has_google_maps_key: self.google_maps_api_key.is_some(),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !(cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)) {
        return;
    }
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(err)) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => debug!(?err, "unable to load .env file"),
    }
}

fn parse_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
