use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// =============================================================================
// HTTP-related constants
// =============================================================================

/// Timeout for a single HTTP request in milliseconds (10 seconds)
pub const HTTP_TIMEOUT_MS: u64 = 10_000;

/// Number of retries after the first failed HTTP attempt
pub const HTTP_MAX_RETRIES: u32 = 3;

/// Base delay between HTTP retries; attempt `n` waits `n` times this (linear backoff)
pub const HTTP_RETRY_BACKOFF_MS: u64 = 500;

/// GitHub release listing pages requested for a catalog (100 releases each)
pub const GITHUB_RELEASE_PAGES: [u32; 3] = [1, 2, 3];

// =============================================================================
// Default locations
// =============================================================================

pub const DEFAULT_HEXPM_MIRROR: &str = "https://builds.hex.pm";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
pub const DEFAULT_GITHUB_URL: &str = "https://github.com";
pub const DEFAULT_OTP_BUILDS_URL: &str =
    "https://raw.githubusercontent.com/erlef/otp_builds/refs/heads/main/builds";
pub const DEFAULT_REBAR3_NIGHTLY_URL: &str = "https://s3.amazonaws.com/rebar3-nightly/rebar3";

/// How a version spec is matched against a catalog
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Exact (post-canonicalization) string match only
    Strict,
    /// Range and bucket matching with highest-version tie-break
    #[default]
    Loose,
}

impl std::str::FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strict" => Ok(MatchMode::Strict),
            "loose" => Ok(MatchMode::Loose),
            other => Err(format!(
                "invalid version-type '{}', expected 'strict' or 'loose'",
                other
            )),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Setup configuration
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SetupConfig {
    pub version_type: MatchMode,
    /// Ordered hex.pm mirrors; the first one is primary
    pub hexpm_mirrors: Vec<String>,
    pub github_api_url: String,
    pub github_url: String,
    pub otp_builds_url: String,
    pub rebar3_nightly_url: String,
    pub github_token: Option<String>,
    pub http: HttpConfig,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            version_type: MatchMode::default(),
            hexpm_mirrors: vec![DEFAULT_HEXPM_MIRROR.to_string()],
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_url: DEFAULT_GITHUB_URL.to_string(),
            otp_builds_url: DEFAULT_OTP_BUILDS_URL.to_string(),
            rebar3_nightly_url: DEFAULT_REBAR3_NIGHTLY_URL.to_string(),
            github_token: None,
            http: HttpConfig::default(),
        }
    }
}

impl SetupConfig {
    /// Load a JSON config file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// HTTP retry policy
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: HTTP_TIMEOUT_MS,
            max_retries: HTTP_MAX_RETRIES,
            retry_backoff_ms: HTTP_RETRY_BACKOFF_MS,
        }
    }
}

/// Split a multi-line mirror input into an ordered list.
/// Accepts newline- or comma-separated entries and drops blanks and trailing slashes.
pub fn parse_mirror_list(input: &str) -> Vec<String> {
    input
        .split(['\n', ','])
        .map(|m| m.trim().trim_end_matches('/'))
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// Returns the directory holding cached toolchain artifacts.
/// Uses $RUNNER_TOOL_CACHE if set, then $XDG_CACHE_HOME/setup-beam,
/// then ~/.cache/setup-beam, or ./setup-beam if none is available.
pub fn tool_cache_dir() -> PathBuf {
    cache_dir_with_env(
        std::env::var("RUNNER_TOOL_CACHE").ok(),
        std::env::var("XDG_CACHE_HOME").ok(),
        dirs::home_dir(),
    )
}

/// Returns the writable, run-local root that installed tools are copied into.
/// Uses $RUNNER_TEMP if set, otherwise the system temp directory.
pub fn install_root() -> PathBuf {
    std::env::var("RUNNER_TEMP")
        .ok()
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
}

fn cache_dir_with_env(
    runner_tool_cache: Option<String>,
    xdg_cache_home: Option<String>,
    home_dir: Option<PathBuf>,
) -> PathBuf {
    if let Some(runner_cache) = runner_tool_cache {
        return PathBuf::from(runner_cache);
    }

    let cache_dir = xdg_cache_home
        .map(PathBuf::from)
        .or_else(|| home_dir.map(|home| home.join(".cache")))
        .unwrap_or_else(|| PathBuf::from("."));

    cache_dir.join("setup-beam")
}
