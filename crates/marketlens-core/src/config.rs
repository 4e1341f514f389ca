use std::fmt::{Debug, Formatter};

use thiserror::Error;

use crate::provider_policy::{SourceKind, SourcePolicy};
use crate::sources::RedditCredentials;

pub const ENV_FINNHUB_API_KEY: &str = "MARKETLENS_FINNHUB_API_KEY";
pub const ENV_NEWSAPI_KEY: &str = "MARKETLENS_NEWSAPI_KEY";
pub const ENV_REDDIT_CLIENT_ID: &str = "MARKETLENS_REDDIT_CLIENT_ID";
pub const ENV_REDDIT_CLIENT_SECRET: &str = "MARKETLENS_REDDIT_CLIENT_SECRET";
pub const ENV_REDDIT_USER_AGENT: &str = "MARKETLENS_REDDIT_USER_AGENT";
pub const ENV_ALPACA_API_KEY: &str = "MARKETLENS_ALPACA_API_KEY";
pub const ENV_ALPACA_SECRET_KEY: &str = "MARKETLENS_ALPACA_SECRET_KEY";
pub const ENV_SYMBOLS: &str = "MARKETLENS_SYMBOLS";
pub const ENV_SUBREDDIT: &str = "MARKETLENS_SUBREDDIT";
pub const ENV_MAX_CONCURRENCY: &str = "MARKETLENS_MAX_CONCURRENCY";
pub const ENV_FALLBACK_DAYS: &str = "MARKETLENS_FALLBACK_DAYS";
pub const ENV_RETRY_JITTER: &str = "MARKETLENS_RETRY_JITTER";

const DEFAULT_USER_AGENT: &str = concat!("marketlens/", env!("CARGO_PKG_VERSION"));

/// Built-in company universe used when no symbols are supplied.
pub const DEFAULT_UNIVERSE: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("MSFT", "Microsoft Corporation"),
    ("NVDA", "NVIDIA Corporation"),
    ("GOOGL", "Alphabet Inc."),
    ("AMZN", "Amazon.com Inc."),
    ("TSLA", "Tesla, Inc."),
    ("META", "Meta Platforms, Inc."),
    ("BRK.B", "Berkshire Hathaway Inc."),
    ("TSM", "Taiwan Semiconductor Manufacturing Company"),
    ("LLY", "Eli Lilly and Company"),
    ("AVGO", "Broadcom Inc."),
    ("JPM", "JPMorgan Chase & Co."),
    ("NVO", "Novo Nordisk A/S"),
    ("WMT", "Walmart Inc."),
    ("UNH", "UnitedHealth Group Incorporated"),
    ("XOM", "Exxon Mobil Corporation"),
    ("V", "Visa Inc."),
    ("MA", "Mastercard Incorporated"),
    ("PG", "Procter & Gamble Co."),
    ("ORCL", "Oracle Corporation"),
    ("ASML", "ASML Holding N.V."),
    ("SHEL", "Shell plc"),
    ("KO", "The Coca-Cola Company"),
    ("PEP", "PepsiCo, Inc."),
    ("CSCO", "Cisco Systems, Inc."),
];

pub fn default_symbols() -> Vec<String> {
    DEFAULT_UNIVERSE
        .iter()
        .map(|(symbol, _)| (*symbol).to_owned())
        .collect()
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing credential {name} required by the {source_name} source")]
    MissingCredential {
        name: &'static str,
        source_name: &'static str,
    },
    #[error("invalid value for {name}: '{value}' ({reason})")]
    InvalidValue {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// API credentials. Each is optional until the stage that needs it runs.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub finnhub_api_key: Option<String>,
    pub newsapi_key: Option<String>,
    pub reddit_client_id: Option<String>,
    pub reddit_client_secret: Option<String>,
    pub reddit_user_agent: Option<String>,
    pub alpaca_api_key: Option<String>,
    pub alpaca_secret_key: Option<String>,
}

impl Credentials {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            finnhub_api_key: read(ENV_FINNHUB_API_KEY),
            newsapi_key: read(ENV_NEWSAPI_KEY),
            reddit_client_id: read(ENV_REDDIT_CLIENT_ID),
            reddit_client_secret: read(ENV_REDDIT_CLIENT_SECRET),
            reddit_user_agent: read(ENV_REDDIT_USER_AGENT),
            alpaca_api_key: read(ENV_ALPACA_API_KEY),
            alpaca_secret_key: read(ENV_ALPACA_SECRET_KEY),
        }
    }

    pub fn finnhub(&self) -> Result<&str, ConfigError> {
        require(&self.finnhub_api_key, ENV_FINNHUB_API_KEY, SourceKind::Fundamentals)
    }

    pub fn newsapi(&self) -> Result<&str, ConfigError> {
        require(&self.newsapi_key, ENV_NEWSAPI_KEY, SourceKind::News)
    }

    pub fn reddit(&self) -> Result<RedditCredentials, ConfigError> {
        Ok(RedditCredentials {
            client_id: require(&self.reddit_client_id, ENV_REDDIT_CLIENT_ID, SourceKind::Discussions)?
                .to_owned(),
            client_secret: require(
                &self.reddit_client_secret,
                ENV_REDDIT_CLIENT_SECRET,
                SourceKind::Discussions,
            )?
            .to_owned(),
            user_agent: self
                .reddit_user_agent
                .clone()
                .unwrap_or_else(|| String::from(DEFAULT_USER_AGENT)),
        })
    }

    pub fn alpaca(&self) -> Result<(&str, &str), ConfigError> {
        Ok((
            require(&self.alpaca_api_key, ENV_ALPACA_API_KEY, SourceKind::Bars)?,
            require(&self.alpaca_secret_key, ENV_ALPACA_SECRET_KEY, SourceKind::Bars)?,
        ))
    }
}

impl Debug for Credentials {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mask = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("finnhub_api_key", &mask(&self.finnhub_api_key))
            .field("newsapi_key", &mask(&self.newsapi_key))
            .field("reddit_client_id", &mask(&self.reddit_client_id))
            .field("reddit_client_secret", &mask(&self.reddit_client_secret))
            .field("reddit_user_agent", &self.reddit_user_agent)
            .field("alpaca_api_key", &mask(&self.alpaca_api_key))
            .field("alpaca_secret_key", &mask(&self.alpaca_secret_key))
            .finish()
    }
}

fn require<'a>(
    value: &'a Option<String>,
    name: &'static str,
    kind: SourceKind,
) -> Result<&'a str, ConfigError> {
    value.as_deref().ok_or(ConfigError::MissingCredential {
        name,
        source_name: kind.provider(),
    })
}

/// Everything a run needs apart from the sources themselves.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub symbols: Vec<String>,
    pub fundamentals: SourcePolicy,
    pub news: SourcePolicy,
    pub discussions: SourcePolicy,
    pub bars: SourcePolicy,
    /// Trailing window length used when no document has a usable timestamp.
    pub fallback_days: u32,
    pub max_concurrency: usize,
    pub subreddit: String,
    pub credentials: Credentials,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            symbols: default_symbols(),
            fundamentals: SourcePolicy::fundamentals_default(),
            news: SourcePolicy::news_default(),
            discussions: SourcePolicy::discussions_default(),
            bars: SourcePolicy::bars_default(),
            fallback_days: 365,
            max_concurrency: 1,
            subreddit: String::from("stocks"),
            credentials: Credentials::default(),
        }
    }
}

impl PipelineConfig {
    /// Reads the process environment. Load a `.env` file beforehand if wanted.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self {
            credentials: Credentials::from_lookup(&lookup),
            ..Self::default()
        };

        if let Some(raw) = lookup(ENV_SYMBOLS) {
            let symbols = split_symbols(&raw);
            if !symbols.is_empty() {
                config.symbols = symbols;
            }
        }
        if let Some(subreddit) = lookup(ENV_SUBREDDIT).filter(|value| !value.trim().is_empty()) {
            config.subreddit = subreddit.trim().to_owned();
        }
        if let Some(raw) = lookup(ENV_MAX_CONCURRENCY) {
            config.max_concurrency = parse_positive(ENV_MAX_CONCURRENCY, &raw)?;
        }
        if let Some(raw) = lookup(ENV_FALLBACK_DAYS) {
            config.fallback_days = parse_number(ENV_FALLBACK_DAYS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_RETRY_JITTER) {
            config = config.with_retry_jitter(parse_flag(ENV_RETRY_JITTER, &raw)?);
        }

        Ok(config)
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        if !symbols.is_empty() {
            self.symbols = symbols;
        }
        self
    }

    pub fn with_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Scales every retry base delay and pacing interval.
    pub fn with_delay_scale(mut self, factor: f64) -> Self {
        self.fundamentals = self.fundamentals.scaled(factor);
        self.news = self.news.scaled(factor);
        self.discussions = self.discussions.scaled(factor);
        self.bars = self.bars.scaled(factor);
        self
    }

    /// Turns backoff jitter on or off for every source.
    pub fn with_retry_jitter(mut self, jitter: bool) -> Self {
        self.fundamentals = self.fundamentals.with_jitter(jitter);
        self.news = self.news.with_jitter(jitter);
        self.discussions = self.discussions.with_jitter(jitter);
        self.bars = self.bars.with_jitter(jitter);
        self
    }

    pub fn policy(&self, kind: SourceKind) -> &SourcePolicy {
        match kind {
            SourceKind::Fundamentals => &self.fundamentals,
            SourceKind::News => &self.news,
            SourceKind::Discussions => &self.discussions,
            SourceKind::Bars => &self.bars,
        }
    }
}

/// Splits a comma or whitespace separated ticker list.
pub fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(|ch: char| ch == ',' || ch.is_whitespace())
        .map(str::trim)
        .filter(|symbol| !symbol.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_flag(name: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            name,
            value: raw.to_owned(),
            reason: String::from("expected true or false"),
        }),
    }
}

fn parse_number<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|error| ConfigError::InvalidValue {
            name,
            value: raw.to_owned(),
            reason: error.to_string(),
        })
}

fn parse_positive<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let parsed = parse_number::<T>(name, raw)?;
    if parsed <= T::default() {
        return Err(ConfigError::InvalidValue {
            name,
            value: raw.to_owned(),
            reason: String::from("must be greater than zero"),
        });
    }
    Ok(parsed)
}
