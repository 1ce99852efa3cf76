//! hex.pm builds listing (`builds.txt`) implementation
//!
//! Each line is `<label> <sha> <date...>`. OTP labels look like
//! `OTP-25.1.2`, `maint-27` or `master`; Elixir labels like `v1.14.2-otp-25`,
//! `v1.0.0` or `main-otp-25`.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::platform::{Os, Platform};
use crate::tool::Tool;
use crate::version::error::RegistryError;
use crate::version::http::HttpClient;
use crate::version::registry::Registry;
use crate::version::types::{ToolVersions, VersionCatalog};

static ELIXIR_OTP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^v?(.+)-otp-(\S+)$").expect("valid Elixir label regex"));

/// Registry implementation for a single hex.pm builds mirror
pub struct HexpmRegistry {
    http: HttpClient,
    base_url: String,
}

impl HexpmRegistry {
    /// Creates a registry reading listings from `base_url` (a hex.pm mirror)
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn listing_url(&self, tool: Tool, platform: &Platform) -> Result<String, RegistryError> {
        match (tool, platform.os, platform.os_version.as_deref()) {
            (Tool::Otp, Os::Linux, Some(os_version)) => Ok(format!(
                "{}/builds/otp/{}/{}/builds.txt",
                self.base_url,
                platform.arch.debian_name(),
                os_version
            )),
            (Tool::Elixir, _, _) => Ok(format!("{}/builds/elixir/builds.txt", self.base_url)),
            _ => Err(RegistryError::Unsupported {
                tool,
                platform: platform.tag(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl Registry for HexpmRegistry {
    async fn fetch_versions(
        &self,
        tool: Tool,
        platform: &Platform,
    ) -> Result<ToolVersions, RegistryError> {
        let url = self.listing_url(tool, platform)?;
        let listing = self.http.get_text(&url).await?;
        debug!("{} listing from {}: {} lines", tool, url, listing.lines().count());

        let versions = match tool {
            Tool::Elixir => parse_elixir_builds(&listing),
            _ => ToolVersions::new(parse_otp_builds(&listing)),
        };
        debug!("{} versions from {}: {:?}", tool, url, versions.catalog);

        Ok(versions)
    }
}

fn labels(listing: &str) -> impl Iterator<Item = &str> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
}

/// Key is the label without `OTP-`; the reference keeps the label
pub fn parse_otp_builds(listing: &str) -> VersionCatalog {
    labels(listing)
        .map(|label| (label.strip_prefix("OTP-").unwrap_or(label), label))
        .collect()
}

/// Key and reference are the Elixir version without `v` or `-otp-N`; the
/// `-otp-N` majors of each version are collected into the compatibility map
pub fn parse_elixir_builds(listing: &str) -> ToolVersions {
    let mut catalog = VersionCatalog::new();
    let mut otp_compat: HashMap<String, Vec<String>> = HashMap::new();

    for label in labels(listing) {
        let (version, otp) = match ELIXIR_OTP_RE.captures(label) {
            Some(caps) => (caps[1].to_string(), Some(caps[2].to_string())),
            None => (label.strip_prefix('v').unwrap_or(label).to_string(), None),
        };

        let compat = otp_compat.entry(version.clone()).or_default();
        if let Some(otp) = otp
            && !compat.contains(&otp)
        {
            compat.push(otp);
        }
        catalog.insert(version.clone(), version);
    }

    ToolVersions::new(catalog).with_otp_compat(otp_compat)
}
