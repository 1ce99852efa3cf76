//! GitHub Releases API registry implementation
//!
//! Serves the Gleam and rebar3 release tags and the Windows OTP installers
//! attached to erlang/otp releases.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::GITHUB_RELEASE_PAGES;
use crate::platform::{Os, Platform};
use crate::tool::Tool;
use crate::version::error::RegistryError;
use crate::version::http::HttpClient;
use crate::version::registry::Registry;
use crate::version::resolver::NIGHTLY;
use crate::version::types::{ToolVersions, VersionCatalog};

static WINDOWS_OTP_ASSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^otp_win64_(.*)\.exe$").expect("valid asset regex"));

/// Response from GitHub Releases API
#[derive(Debug, Deserialize)]
struct Release {
    tag_name: String,
    #[serde(default)]
    assets: Vec<Asset>,
}

#[derive(Debug, Deserialize)]
struct Asset {
    name: String,
}

/// Registry implementation for GitHub Releases API
pub struct GitHubRegistry {
    http: HttpClient,
    base_url: String,
}

impl GitHubRegistry {
    /// Creates a new GitHubRegistry against `base_url` (the API root)
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn repository(tool: Tool, platform: &Platform) -> Result<&'static str, RegistryError> {
        match (tool, platform.os) {
            (Tool::Gleam, _) => Ok("gleam-lang/gleam"),
            (Tool::Rebar3, _) => Ok("erlang/rebar3"),
            (Tool::Otp, Os::Windows) => Ok("erlang/otp"),
            _ => Err(RegistryError::Unsupported {
                tool,
                platform: platform.tag(),
            }),
        }
    }

    async fn fetch_releases(&self, repository: &str) -> Result<Vec<Release>, RegistryError> {
        let url = format!("{}/repos/{}/releases?per_page=100", self.base_url, repository);
        let pages = self.http.get_pages(&url, &GITHUB_RELEASE_PAGES).await?;

        let mut releases = Vec::new();
        for page in pages {
            let parsed: Vec<Release> = serde_json::from_str(&page).map_err(|e| {
                warn!("Failed to parse GitHub releases response: {}", e);
                RegistryError::InvalidResponse(e.to_string())
            })?;
            releases.extend(parsed);
        }
        debug!("Fetched {} releases of {}", releases.len(), repository);

        Ok(releases)
    }
}

#[async_trait::async_trait]
impl Registry for GitHubRegistry {
    async fn fetch_versions(
        &self,
        tool: Tool,
        platform: &Platform,
    ) -> Result<ToolVersions, RegistryError> {
        let repository = Self::repository(tool, platform)?;
        let releases = self.fetch_releases(repository).await?;

        let catalog = match tool {
            Tool::Gleam => with_nightly(
                releases
                    .iter()
                    .map(|r| r.tag_name.strip_prefix('v').unwrap_or(&r.tag_name))
                    .map(|tag| (tag, tag))
                    .collect(),
            ),
            Tool::Rebar3 => with_nightly(
                releases
                    .iter()
                    .map(|r| (r.tag_name.as_str(), r.tag_name.as_str()))
                    .collect(),
            ),
            _ => windows_otp_catalog(&releases),
        };

        Ok(ToolVersions::new(catalog))
    }
}

fn with_nightly(mut catalog: VersionCatalog) -> VersionCatalog {
    catalog.insert(NIGHTLY, NIGHTLY);
    catalog
}

fn windows_otp_catalog(releases: &[Release]) -> VersionCatalog {
    releases
        .iter()
        .flat_map(|r| &r.assets)
        .filter_map(|asset| WINDOWS_OTP_ASSET_RE.captures(&asset.name))
        .filter_map(|caps| caps.get(1))
        .map(|version| (version.as_str(), version.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::platform::Arch;
    use mockito::{Matcher, Mock, Server, ServerGuard};

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X64, Some("ubuntu-24.04".to_string()))
    }

    async fn mock_releases(server: &mut ServerGuard, repository: &str, pages: [&str; 3]) -> Vec<Mock> {
        let mut mocks = Vec::new();
        for (i, body) in pages.iter().enumerate() {
            mocks.push(
                server
                    .mock("GET", format!("/repos/{}/releases", repository).as_str())
                    .match_query(Matcher::AllOf(vec![
                        Matcher::UrlEncoded("per_page".into(), "100".into()),
                        Matcher::UrlEncoded("page".into(), (i + 1).to_string()),
                    ]))
                    .with_status(200)
                    .with_header("content-type", "application/json")
                    .with_body(*body)
                    .create_async()
                    .await,
            );
        }
        mocks
    }

    fn registry(server: &ServerGuard) -> GitHubRegistry {
        let http = HttpClient::new(&HttpConfig::default(), None, &server.url()).unwrap();
        GitHubRegistry::new(http, &server.url())
    }

    #[tokio::test]
    async fn fetch_versions_strips_v_from_gleam_tags_and_adds_nightly() {
        let mut server = Server::new_async().await;
        let mocks = mock_releases(
            &mut server,
            "gleam-lang/gleam",
            [
                r#"[{"tag_name": "v1.5.1"}, {"tag_name": "v1.5.0"}]"#,
                r#"[{"tag_name": "v0.13.2"}]"#,
                "[]",
            ],
        )
        .await;

        let result = registry(&server)
            .fetch_versions(Tool::Gleam, &linux())
            .await
            .unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
        assert_eq!(
            result.catalog.keys().collect::<Vec<_>>(),
            vec!["1.5.1", "1.5.0", "0.13.2", "nightly"]
        );
        assert_eq!(result.catalog.get("0.13.2"), Some("0.13.2"));
    }

    #[tokio::test]
    async fn fetch_versions_keeps_rebar3_tags_as_is() {
        let mut server = Server::new_async().await;
        let _mocks = mock_releases(
            &mut server,
            "erlang/rebar3",
            [
                r#"[{"tag_name": "3.24.0"}, {"tag_name": "3.10.0"}]"#,
                "[]",
                "[]",
            ],
        )
        .await;

        let result = registry(&server)
            .fetch_versions(Tool::Rebar3, &linux())
            .await
            .unwrap();

        assert_eq!(
            result.catalog.keys().collect::<Vec<_>>(),
            vec!["3.24.0", "3.10.0", "nightly"]
        );
    }

    #[tokio::test]
    async fn fetch_versions_lists_windows_otp_installers() {
        let mut server = Server::new_async().await;
        let _mocks = mock_releases(
            &mut server,
            "erlang/otp",
            [
                r#"[{"tag_name": "OTP-27.1", "assets": [
                    {"name": "otp_win64_27.1.exe"},
                    {"name": "otp_win32_27.1.exe"},
                    {"name": "otp_doc_html_27.1.tar.gz"}
                ]}]"#,
                r#"[{"tag_name": "OTP-26.2.5", "assets": [{"name": "otp_win64_26.2.5.exe"}]}]"#,
                "[]",
            ],
        )
        .await;

        let result = registry(&server)
            .fetch_versions(Tool::Otp, &Platform::new(Os::Windows, Arch::X64, None))
            .await
            .unwrap();

        assert_eq!(
            result.catalog.keys().collect::<Vec<_>>(),
            vec!["27.1", "26.2.5"]
        );
        assert!(!result.catalog.contains(NIGHTLY));
    }

    #[tokio::test]
    async fn fetch_versions_returns_invalid_response_for_malformed_json() {
        let mut server = Server::new_async().await;
        let _mocks = mock_releases(
            &mut server,
            "erlang/rebar3",
            [r#"{"message": "API rate limit exceeded"}"#, "[]", "[]"],
        )
        .await;

        let result = registry(&server)
            .fetch_versions(Tool::Rebar3, &linux())
            .await;

        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_versions_rejects_elixir() {
        let server = Server::new_async().await;

        let result = registry(&server)
            .fetch_versions(Tool::Elixir, &linux())
            .await;

        assert!(matches!(result, Err(RegistryError::Unsupported { .. })));
    }
}
