//! erlef/otp_builds listing for macOS
//!
//! One CSV per target triple (`aarch64-apple-darwin.csv`) with a header row;
//! the `ref_name` column holds `OTP-28.0`, `maint-27`, `master` and so on.

use tracing::debug;

use crate::platform::{Os, Platform};
use crate::tool::Tool;
use crate::version::error::RegistryError;
use crate::version::http::HttpClient;
use crate::version::registry::Registry;
use crate::version::types::{ToolVersions, VersionCatalog};

const REF_NAME_COLUMN: &str = "ref_name";

pub struct OtpBuildsRegistry {
    http: HttpClient,
    base_url: String,
}

impl OtpBuildsRegistry {
    pub fn new(http: HttpClient, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Registry for OtpBuildsRegistry {
    async fn fetch_versions(
        &self,
        tool: Tool,
        platform: &Platform,
    ) -> Result<ToolVersions, RegistryError> {
        if tool != Tool::Otp || platform.os != Os::MacOs {
            return Err(RegistryError::Unsupported {
                tool,
                platform: platform.tag(),
            });
        }

        let url = format!(
            "{}/{}-apple-darwin.csv",
            self.base_url,
            platform.arch.triple_name()
        );
        let listing = self.http.get_text(&url).await?;
        let catalog = parse_builds_csv(&listing)?;
        debug!("{} versions from {}: {:?}", tool, url, catalog);

        Ok(ToolVersions::new(catalog))
    }
}

/// Key is `ref_name` without `OTP-`; the reference keeps `ref_name`
pub fn parse_builds_csv(listing: &str) -> Result<VersionCatalog, RegistryError> {
    let mut lines = listing.lines().filter(|line| !line.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| RegistryError::InvalidResponse("empty builds listing".to_string()))?;
    let column = fields(header)
        .position(|name| name == REF_NAME_COLUMN)
        .ok_or_else(|| {
            RegistryError::InvalidResponse(format!("no {} column in builds listing", REF_NAME_COLUMN))
        })?;

    Ok(lines
        .filter_map(|line| fields(line).nth(column))
        .filter(|ref_name| !ref_name.is_empty())
        .map(|ref_name| (ref_name.strip_prefix("OTP-").unwrap_or(ref_name), ref_name))
        .collect())
}

fn fields(line: &str) -> impl Iterator<Item = &str> {
    line.split(',').map(|field| field.trim().trim_matches('"'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::config::MatchMode;
    use crate::platform::Arch;
    use crate::version::resolver::resolve;
    use mockito::Server;

    const BUILDS_CSV: &str = "\
ref_name,date,ref_oid
OTP-28.0,2025-05-21T00:00:00Z,5f0b8d0c
OTP-27.3.4,2025-05-01T00:00:00Z,1a2b3c4d
OTP-28.0-rc1,2025-02-12T00:00:00Z,9e8d7c6b
maint-27,2025-05-20T00:00:00Z,0f1e2d3c
master,2025-05-22T00:00:00Z,aabbccdd
";

    #[test]
    fn parse_builds_csv_reads_ref_name_column() {
        let catalog = parse_builds_csv(BUILDS_CSV).unwrap();

        assert_eq!(catalog.len(), 5);
        assert_eq!(catalog.get("28.0"), Some("OTP-28.0"));
        assert_eq!(catalog.get("maint-27"), Some("maint-27"));
        assert_eq!(resolve("latest", &catalog, MatchMode::Loose), Some("OTP-28.0"));
        assert_eq!(resolve("28.0", &catalog, MatchMode::Strict), Some("OTP-28.0"));
    }

    #[test]
    fn parse_builds_csv_finds_column_anywhere_in_header() {
        let catalog = parse_builds_csv("date,\"ref_name\"\n2025,\"OTP-26.2.5\"\n").unwrap();
        assert_eq!(catalog.get("26.2.5"), Some("OTP-26.2.5"));
    }

    #[test]
    fn parse_builds_csv_rejects_listing_without_ref_name() {
        let result = parse_builds_csv("name,date\nOTP-28.0,2025\n");
        assert!(matches!(result, Err(RegistryError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn fetch_versions_uses_arch_triple_listing() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/aarch64-apple-darwin.csv")
            .with_status(200)
            .with_body(BUILDS_CSV)
            .create_async()
            .await;

        let http = HttpClient::new(&HttpConfig::default(), None, "https://api.github.com").unwrap();
        let registry = OtpBuildsRegistry::new(http, &server.url());
        let result = registry
            .fetch_versions(Tool::Otp, &Platform::new(Os::MacOs, Arch::Arm64, None))
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.catalog.contains("27.3.4"));
    }

    #[tokio::test]
    async fn fetch_versions_rejects_linux() {
        let http = HttpClient::new(&HttpConfig::default(), None, "https://api.github.com").unwrap();
        let registry = OtpBuildsRegistry::new(http, "https://example.invalid");

        let result = registry
            .fetch_versions(Tool::Otp, &Platform::new(Os::Linux, Arch::X64, None))
            .await;

        assert!(matches!(result, Err(RegistryError::Unsupported { .. })));
    }
}
