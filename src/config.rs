use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Webhook of the external automation engine
    pub webhook_url: reqwest::Url,
    /// Port the relay listens on
    pub port: u16,
    /// Interval between `ping` events on open streams
    pub heartbeat_interval: Duration,
    /// Timeout for the outbound webhook call
    pub webhook_timeout: Duration,
}

impl RelayConfig {
    pub const DEFAULT_PORT: u16 = 3001;
    pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(25);
    pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key).and_then(|value| {
                let trimmed = value.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
        };

        let raw_url = get("N8N_WEBHOOK_URL").ok_or(ConfigError::Missing("N8N_WEBHOOK_URL"))?;
        let webhook_url = reqwest::Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            name: "N8N_WEBHOOK_URL",
            reason: e.to_string(),
        })?;
        if !matches!(webhook_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                name: "N8N_WEBHOOK_URL",
                reason: format!("unsupported scheme '{}'", webhook_url.scheme()),
            });
        }

        let port = match get("PORT") {
            Some(s) => s.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("'{}' is not a port number", s),
            })?,
            None => Self::DEFAULT_PORT,
        };

        let heartbeat_interval = parse_secs(get("HEARTBEAT_SECS"), "HEARTBEAT_SECS")?
            .unwrap_or(Self::DEFAULT_HEARTBEAT);
        let webhook_timeout = parse_secs(get("WEBHOOK_TIMEOUT_SECS"), "WEBHOOK_TIMEOUT_SECS")?
            .unwrap_or(Self::DEFAULT_WEBHOOK_TIMEOUT);

        Ok(Self {
            webhook_url,
            port,
            heartbeat_interval,
            webhook_timeout,
        })
    }
}

fn parse_secs(value: Option<String>, name: &'static str) -> Result<Option<Duration>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.parse::<u64>() {
        Ok(0) | Err(_) => Err(ConfigError::Invalid {
            name,
            reason: format!("'{}' is not a positive number of seconds", value),
        }),
        Ok(secs) => Ok(Some(Duration::from_secs(secs))),
    }
}
