use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const DEFAULT_TEXT_MODEL: &str = "llama3-70b-8192";
const DEFAULT_VISION_MODEL: &str = "meta-llama/llama-4-maverick-17b-128e-instruct";
const DEFAULT_TTS_MODEL: &str = "playai-tts";

const MEGABYTE: usize = 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is required")]
    Missing(&'static str),

    #[error("{var} has an invalid value: {value}")]
    Invalid { var: &'static str, value: String },

    #[error("incomplete Appwrite configuration, missing {0}")]
    PartialBackend(&'static str),
}

/// Size ceilings for uploaded images, in whole megabytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLimits {
    pub ecg_mb: usize,
    pub lab_report_mb: usize,
    pub skin_mb: usize,
}

impl ImageLimits {
    pub fn largest_bytes(&self) -> usize {
        self.ecg_mb.max(self.lab_report_mb).max(self.skin_mb) * MEGABYTE
    }
}

/// Megabyte count to byte count.
pub fn megabytes(mb: usize) -> usize {
    mb * MEGABYTE
}

/// Log output: JSON lines unless `LOG_FORMAT=pretty`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub api_key: String,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub tts_model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub endpoint: String,
    pub project_id: String,
    pub api_key: String,
    pub database_id: String,
    pub user_collection_id: String,
    pub medical_records_collection_id: String,
    pub storage_bucket_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub gateway: GatewayConfig,
    pub image_limits: ImageLimits,
    pub lab_report_timeout: Duration,
    pub log_format: LogFormat,
    /// `None` when no Appwrite variables are set; the account and record routes are then not served.
    pub backend: Option<BackendConfig>,
}

impl Config {
    /// Load configuration from the process environment (after `.env`, if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));
        let or_default = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());

        let gateway = GatewayConfig {
            api_key: required("GROQ_API_KEY")?,
            base_url: or_default("GROQ_BASE_URL", DEFAULT_GROQ_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            text_model: or_default("TEXT_MODEL", DEFAULT_TEXT_MODEL),
            vision_model: or_default("VISION_MODEL", DEFAULT_VISION_MODEL),
            tts_model: or_default("TTS_MODEL", DEFAULT_TTS_MODEL),
        };

        let image_limits = ImageLimits {
            ecg_mb: parse_or(&var, "ECG_MAX_IMAGE_MB", 10)?,
            lab_report_mb: parse_or(&var, "LAB_REPORT_MAX_IMAGE_MB", 5)?,
            skin_mb: parse_or(&var, "SKIN_MAX_IMAGE_MB", 10)?,
        };

        Ok(Self {
            port: parse_or(&var, "PORT", 3000)?,
            gateway,
            image_limits,
            lab_report_timeout: Duration::from_secs(parse_or(&var, "LAB_REPORT_TIMEOUT_SECS", 120)?),
            log_format: match var("LOG_FORMAT").as_deref().map(str::trim) {
                Some("pretty") => LogFormat::Pretty,
                _ => LogFormat::Json,
            },
            backend: backend_config(&var)?,
        })
    }
}

fn parse_or<T, F>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: name,
            value: raw,
        }),
        None => Ok(default),
    }
}

fn backend_config<F>(var: &F) -> Result<Option<BackendConfig>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    const NAMES: [&str; 7] = [
        "APPWRITE_ENDPOINT",
        "APPWRITE_PROJECT_ID",
        "APPWRITE_API_KEY",
        "APPWRITE_DATABASE_ID",
        "APPWRITE_USER_COLLECTION_ID",
        "APPWRITE_MEDICAL_RECORDS_COLLECTION_ID",
        "APPWRITE_STORAGE_BUCKET_ID",
    ];

    let values: Vec<Option<String>> = NAMES.iter().map(|&name| var(name)).collect();
    if values.iter().all(Option::is_none) {
        return Ok(None);
    }
    if let Some(index) = values.iter().position(Option::is_none) {
        return Err(ConfigError::PartialBackend(NAMES[index]));
    }

    let mut values = values.into_iter().flatten();
    let mut next = || values.next().unwrap_or_default();
    Ok(Some(BackendConfig {
        endpoint: next().trim_end_matches('/').to_string(),
        project_id: next(),
        api_key: next(),
        database_id: next(),
        user_collection_id: next(),
        medical_records_collection_id: next(),
        storage_bucket_id: next(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(
            Config::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("GROQ_API_KEY"))
        );
        assert_eq!(
            Config::from_lookup(lookup(&[("GROQ_API_KEY", "  ")])),
            Err(ConfigError::Missing("GROQ_API_KEY"))
        );
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("GROQ_API_KEY", "k")])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.gateway.base_url, DEFAULT_GROQ_BASE_URL);
        assert_eq!(config.gateway.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.image_limits.lab_report_mb, 5);
        assert_eq!(config.image_limits.largest_bytes(), 10 * MEGABYTE);
        assert_eq!(config.lab_report_timeout, Duration::from_secs(120));
        assert!(config.backend.is_none());
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn pretty_logs_are_opt_in() {
        let config =
            Config::from_lookup(lookup(&[("GROQ_API_KEY", "k"), ("LOG_FORMAT", "pretty")])).unwrap();
        assert_eq!(config.log_format, LogFormat::Pretty);

        let config =
            Config::from_lookup(lookup(&[("GROQ_API_KEY", "k"), ("LOG_FORMAT", "text")])).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let err = Config::from_lookup(lookup(&[("GROQ_API_KEY", "k"), ("PORT", "http")]));
        assert_eq!(
            err,
            Err(ConfigError::Invalid {
                var: "PORT",
                value: "http".into()
            })
        );
    }

    #[test]
    fn backend_group_is_all_or_nothing() {
        let err = Config::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("APPWRITE_ENDPOINT", "https://appwrite.example/v1"),
        ]));
        assert_eq!(err, Err(ConfigError::PartialBackend("APPWRITE_PROJECT_ID")));

        let config = Config::from_lookup(lookup(&[
            ("GROQ_API_KEY", "k"),
            ("APPWRITE_ENDPOINT", "https://appwrite.example/v1/"),
            ("APPWRITE_PROJECT_ID", "project"),
            ("APPWRITE_API_KEY", "secret"),
            ("APPWRITE_DATABASE_ID", "db"),
            ("APPWRITE_USER_COLLECTION_ID", "users"),
            ("APPWRITE_MEDICAL_RECORDS_COLLECTION_ID", "records"),
            ("APPWRITE_STORAGE_BUCKET_ID", "bucket"),
        ]))
        .unwrap();
        let backend = config.backend.unwrap();
        assert_eq!(backend.endpoint, "https://appwrite.example/v1");
        assert_eq!(backend.storage_bucket_id, "bucket");
    }
}
