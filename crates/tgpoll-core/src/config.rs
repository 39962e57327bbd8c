use std::{collections::HashSet, env, fmt, fs, path::Path};

use crate::{
    domain::UPDATE_KINDS,
    errors::Error,
    filters::parse_id_list,
    polling::{
        normalize_allowed_updates, PollingOptions, ALL_UPDATES, DEFAULT_LIMIT,
        DEFAULT_TIMEOUT_SECS,
    },
    Result,
};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Typed configuration for the polling trigger, read from the environment.
#[derive(Clone)]
pub struct Config {
    // Credentials / endpoint
    pub telegram_bot_token: String,
    pub telegram_api_url: String,

    // getUpdates parameters
    /// Kinds as configured, `*` included if given. See [`Config::polling_options`].
    pub allowed_updates: Vec<String>,
    pub limit: u32,
    pub timeout: u32,

    // Restrictions
    pub restrict_chat_ids: HashSet<String>,
    pub restrict_user_ids: HashSet<String>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the config from an arbitrary variable lookup (the environment in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        if telegram_bot_token.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let telegram_api_url = lookup("TELEGRAM_API_URL")
            .and_then(non_empty)
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());

        // No implicit default: the operator picks kinds explicitly (or `*`).
        let allowed_updates = parse_list(lookup("POLL_UPDATES"));
        if allowed_updates.is_empty() {
            return Err(Error::Config(
                "POLL_UPDATES environment variable is required (use * for all updates)"
                    .to_string(),
            ));
        }
        if let Some(unknown) = allowed_updates
            .iter()
            .find(|k| k.as_str() != ALL_UPDATES && !UPDATE_KINDS.contains(&k.as_str()))
        {
            return Err(Error::Config(format!(
                "POLL_UPDATES contains unknown update kind: {unknown}"
            )));
        }

        let limit = parse_u32(&lookup, "POLL_LIMIT")?.unwrap_or(DEFAULT_LIMIT);
        if limit < 1 {
            return Err(Error::Config("POLL_LIMIT must be at least 1".to_string()));
        }
        let timeout = parse_u32(&lookup, "POLL_TIMEOUT")?.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let restrict_chat_ids = parse_id_list(&lookup("RESTRICT_CHAT_IDS").unwrap_or_default());
        let restrict_user_ids = parse_id_list(&lookup("RESTRICT_USER_IDS").unwrap_or_default());

        Ok(Self {
            telegram_bot_token,
            telegram_api_url,
            allowed_updates,
            limit,
            timeout,
            restrict_chat_ids,
            restrict_user_ids,
        })
    }

    /// Options for one trigger activation (`*` collapsed to "all kinds").
    pub fn polling_options(&self) -> PollingOptions {
        PollingOptions {
            allowed_updates: normalize_allowed_updates(self.allowed_updates.clone()),
            limit: self.limit,
            timeout: self.timeout,
            restrict_chat_ids: self.restrict_chat_ids.clone(),
            restrict_user_ids: self.restrict_user_ids.clone(),
        }
    }
}

// Keeps the token out of logs.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("telegram_api_url", &self.telegram_api_url)
            .field("allowed_updates", &self.allowed_updates)
            .field("limit", &self.limit)
            .field("timeout", &self.timeout)
            .field("restrict_chat_ids", &self.restrict_chat_ids)
            .field("restrict_user_ids", &self.restrict_user_ids)
            .finish()
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn parse_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u32>> {
    let Some(raw) = lookup(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<u32>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a non-negative integer, got {raw:?}")))
}

/// Comma/whitespace separated list, order kept, duplicates dropped.
fn parse_list(v: Option<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in v
        .unwrap_or_default()
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
    {
        if !out.iter().any(|seen| seen == item) {
            out.push(item.to_string());
        }
    }
    out
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
