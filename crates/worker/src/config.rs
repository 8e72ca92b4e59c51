use std::time::Duration;

use blockjobs_core::orphan::OrphanPolicy;

/// Default OpenAI-compatible API base URL.
const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Default chat model used for book summaries.
const DEFAULT_SUMMARY_MODEL: &str = "gpt-4o";

/// Upper bound for any `*_SECS` variable (ten years).
const MAX_SECS: u64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {message}")]
    Invalid { var: &'static str, message: String },
}

/// Engine configuration: handler collaborators and orphan reconciliation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the book content service. Book summaries fail when unset.
    pub content_api_url: Option<String>,
    pub content_api_key: Option<String>,
    pub openai_api_url: String,
    /// Book summaries fail when unset.
    pub openai_api_key: Option<String>,
    pub summary_model: String,
    /// Endpoint that performs `transcription` jobs.
    pub transcription_endpoint: Option<String>,
    /// Endpoint that performs `indexing` jobs.
    pub indexing_endpoint: Option<String>,
    /// Per-request timeout for handler HTTP calls.
    pub handler_timeout_secs: u64,
    pub orphan_policy: OrphanPolicy,
    /// How long a job may sit in `PROCESSING` without log activity before
    /// it counts as orphaned.
    pub orphan_timeout_secs: u64,
    /// Interval between reconciliation passes in the worker binary.
    pub reconcile_interval_secs: u64,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default                     |
    /// |---------------------------|-----------------------------|
    /// | `CONTENT_API_URL`         | unset                       |
    /// | `CONTENT_API_KEY`         | unset                       |
    /// | `OPENAI_API_URL`          | `https://api.openai.com/v1` |
    /// | `OPENAI_API_KEY`          | unset                       |
    /// | `SUMMARY_MODEL`           | `gpt-4o`                    |
    /// | `TRANSCRIPTION_ENDPOINT`  | unset                       |
    /// | `INDEXING_ENDPOINT`       | unset                       |
    /// | `HANDLER_TIMEOUT_SECS`    | `120`                       |
    /// | `ORPHAN_POLICY`           | `report`                    |
    /// | `ORPHAN_TIMEOUT_SECS`     | `3600`                      |
    /// | `RECONCILE_INTERVAL_SECS` | `300`                       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let orphan_policy = match optional("ORPHAN_POLICY") {
            Some(value) => OrphanPolicy::from_str_value(value.trim()).map_err(|message| {
                ConfigError::Invalid {
                    var: "ORPHAN_POLICY",
                    message,
                }
            })?,
            None => OrphanPolicy::default(),
        };

        Ok(Self {
            content_api_url: optional("CONTENT_API_URL"),
            content_api_key: optional("CONTENT_API_KEY"),
            openai_api_url: optional("OPENAI_API_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.into()),
            openai_api_key: optional("OPENAI_API_KEY"),
            summary_model: optional("SUMMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.into()),
            transcription_endpoint: optional("TRANSCRIPTION_ENDPOINT"),
            indexing_endpoint: optional("INDEXING_ENDPOINT"),
            handler_timeout_secs: parse_secs(&lookup, "HANDLER_TIMEOUT_SECS", 120)?,
            orphan_policy,
            orphan_timeout_secs: parse_secs(&lookup, "ORPHAN_TIMEOUT_SECS", 3600)?,
            reconcile_interval_secs: parse_secs(&lookup, "RECONCILE_INTERVAL_SECS", 300)?,
        })
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }

    pub fn orphan_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.orphan_timeout_secs.min(MAX_SECS) as i64)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    let Some(value) = lookup(var).filter(|v| !v.trim().is_empty()) else {
        return Ok(default);
    };
    let secs: u64 = value.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        message: format!("expected a whole number of seconds, got '{value}'"),
    })?;
    if !(1..=MAX_SECS).contains(&secs) {
        return Err(ConfigError::Invalid {
            var,
            message: format!("must be between 1 and {MAX_SECS} seconds, got {secs}"),
        });
    }
    Ok(secs)
}
