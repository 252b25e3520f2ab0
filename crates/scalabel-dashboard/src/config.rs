use crate::sync::{FailurePolicy, SyncOptions};
use clap::Parser;
use scalabel_core::BootstrapInput;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_METADATA_ENDPOINT: &str = "http://localhost:8686/taskMetaData";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid metadata endpoint '{value}': {source}")]
    InvalidEndpoint {
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid value '{value}' for {name}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("failed to read bootstrap {path}: {source}")]
    BootstrapRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse bootstrap {path}: {source}")]
    BootstrapParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "scalabel-dashboard", about = "Fetch per-task labeling progress for a project")]
pub struct Args {
    /// JSON file with projectMetadata, taskMetaDatas, taskKeys and numUsers.
    #[arg(long)]
    pub bootstrap: PathBuf,
    #[arg(long, default_value = "")]
    pub endpoint: String,
    #[arg(long)]
    pub max_in_flight: Option<usize>,
    #[arg(long)]
    pub fetch_timeout_secs: Option<u64>,
    /// Show failed fetches as failed instead of leaving them pending.
    #[arg(long, default_value_t = false)]
    pub mark_failed: bool,
    #[arg(long, default_value_t = false)]
    pub vendor: bool,
    /// Environment variable holding the Authorization header value.
    #[arg(long, default_value = "")]
    pub auth_token_env: String,
    #[arg(long, default_value_t = false)]
    pub debug: bool,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bootstrap_path: PathBuf,
    pub endpoint: Url,
    pub credential_env: Option<String>,
    pub vendor: bool,
    pub debug: bool,
    pub sync: SyncOptions,
}

impl Config {
    /// Merges command-line arguments with environment overrides. Arguments win.
    pub fn resolve<E>(args: Args, env: E) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let endpoint_raw = non_empty(args.endpoint)
            .or_else(|| env_non_empty(&env, "SCALABEL_METADATA_ENDPOINT"))
            .unwrap_or_else(|| DEFAULT_METADATA_ENDPOINT.to_string());
        let endpoint = Url::parse(&endpoint_raw).map_err(|source| ConfigError::InvalidEndpoint {
            value: endpoint_raw.clone(),
            source,
        })?;

        let max_in_flight = match args.max_in_flight {
            Some(value) => Some(value),
            None => parse_env_number(&env, "SCALABEL_MAX_IN_FLIGHT")?.map(|v| v as usize),
        }
        .filter(|value| *value > 0);

        let fetch_timeout = match args.fetch_timeout_secs {
            Some(value) => Some(value),
            None => parse_env_number(&env, "SCALABEL_FETCH_TIMEOUT_SECS")?,
        }
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

        let mark_failed = args.mark_failed || env_flag(&env, "SCALABEL_MARK_FAILED");
        let failure_policy = if mark_failed {
            FailurePolicy::MarkFailed
        } else {
            FailurePolicy::StayPending
        };

        Ok(Self {
            bootstrap_path: args.bootstrap,
            endpoint,
            credential_env: non_empty(args.auth_token_env)
                .or_else(|| env_non_empty(&env, "SCALABEL_AUTH_TOKEN_ENV")),
            vendor: args.vendor || env_flag(&env, "SCALABEL_VENDOR"),
            debug: args.debug || env_flag(&env, "SCALABEL_DEBUG"),
            sync: SyncOptions {
                max_in_flight,
                fetch_timeout,
                failure_policy,
            },
        })
    }
}

pub fn load_config() -> Result<Config, ConfigError> {
    Config::resolve(Args::parse(), |name| std::env::var(name).ok())
}

pub fn load_bootstrap(path: &Path) -> Result<BootstrapInput, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::BootstrapRead {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ConfigError::BootstrapParse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn env_non_empty<E: Fn(&str) -> Option<String>>(env: &E, name: &str) -> Option<String> {
    env(name).and_then(non_empty)
}

fn env_flag<E: Fn(&str) -> Option<String>>(env: &E, name: &str) -> bool {
    env(name)
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}

fn parse_env_number<E: Fn(&str) -> Option<String>>(
    env: &E,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match env_non_empty(env, name) {
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
        None => Ok(None),
    }
}
