use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    domain::Destination,
    errors::Error,
    rewrite::{DEFAULT_MODEL, DEFAULT_PERSONA},
    Result,
};

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MAX_REQUESTS_PER_MINUTE: u32 = 5;
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 60;

/// Typed configuration, sourced from the environment (and `.env` if present).
#[derive(Clone)]
pub struct Config {
    // Required
    pub telegram_bot_token: String,
    pub openai_api_key: String,
    pub destination: Destination,

    // Operators; empty means nobody may use the bot.
    pub allowed_users: Vec<i64>,

    // Generation
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_timeout: Duration,
    pub persona_prompt: String,

    // Rate limiting
    pub max_requests_per_minute: u32,

    // Logging
    pub log_file: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the process environment in production).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = required(&get, "TELEGRAM_BOT_TOKEN")?;
        let openai_api_key = required(&get, "OPENAI_API_KEY")?;
        let destination = Destination::parse(&required(&get, "TELEGRAM_CHANNEL_ID")?)?;

        let allowed_users = parse_csv_i64("ADMIN_USER_ID", get("ADMIN_USER_ID"))?;

        let openai_model = get("OPENAI_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let openai_base_url = get("OPENAI_BASE_URL")
            .and_then(non_empty)
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        let openai_timeout = Duration::from_secs(
            parse_num("OPENAI_TIMEOUT_SECS", get("OPENAI_TIMEOUT_SECS"))?
                .unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS),
        );

        let persona_prompt = match get("PERSONA_FILE").and_then(non_empty) {
            Some(path) => {
                let text = fs::read_to_string(path.trim()).map_err(|e| {
                    Error::Config(format!("PERSONA_FILE {}: {e}", path.trim()))
                })?;
                non_empty(text).ok_or_else(|| {
                    Error::Config(format!("PERSONA_FILE {} is empty", path.trim()))
                })?
            }
            None => DEFAULT_PERSONA.to_string(),
        };

        let max_requests_per_minute =
            parse_num("MAX_REQUESTS_PER_MINUTE", get("MAX_REQUESTS_PER_MINUTE"))?
                .unwrap_or(DEFAULT_MAX_REQUESTS_PER_MINUTE);
        if max_requests_per_minute == 0 {
            return Err(Error::Config(
                "MAX_REQUESTS_PER_MINUTE must be at least 1".to_string(),
            ));
        }

        let log_file = get("LOG_FILE").and_then(non_empty).map(PathBuf::from);

        Ok(Self {
            telegram_bot_token,
            openai_api_key,
            destination,
            allowed_users,
            openai_model,
            openai_base_url,
            openai_timeout,
            persona_prompt,
            max_requests_per_minute,
            log_file,
        })
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("openai_api_key", &"<redacted>")
            .field("destination", &self.destination)
            .field("allowed_users", &self.allowed_users)
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_timeout", &self.openai_timeout)
            .field("max_requests_per_minute", &self.max_requests_per_minute)
            .field("log_file", &self.log_file)
            .finish_non_exhaustive()
    }
}

fn required(get: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    get(key)
        .and_then(non_empty)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| Error::Config(format!("{key} environment variable is required")))
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim().trim_start_matches("export ").trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, v: Option<String>) -> Result<Option<T>> {
    let Some(v) = v.and_then(non_empty) else {
        return Ok(None);
    };
    v.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got {v:?}")))
}

fn parse_csv_i64(key: &str, v: Option<String>) -> Result<Vec<i64>> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("{key} contains a non-integer id: {s:?}")))
        })
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
