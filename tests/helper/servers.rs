//! Wiring a `Setup` against mock servers

use std::path::Path;
use std::sync::Arc;

use mockito::{Matcher, Mock, ServerGuard};

use setup_beam::config::{HttpConfig, MatchMode, SetupConfig};
use setup_beam::install::Installer;
use setup_beam::install::cache::ToolCache;
use setup_beam::install::recipe::RecipeOptions;
use setup_beam::install::runner::CommandRunner;
use setup_beam::platform::{Arch, Os, Platform};
use setup_beam::setup::Setup;
use setup_beam::version::http::HttpClient;

pub fn linux() -> Platform {
    Platform::new(Os::Linux, Arch::X64, Some("ubuntu-22.04".to_string()))
}

/// A `Setup` for Linux x64 that talks to `mirrors` for hex.pm content and to
/// `github` for the GitHub API and release downloads. All state lives in `root`.
pub fn setup_for(
    mirrors: Vec<String>,
    github: &ServerGuard,
    mode: MatchMode,
    root: &Path,
    runner: Arc<dyn CommandRunner>,
) -> Setup {
    let config = SetupConfig {
        version_type: mode,
        hexpm_mirrors: mirrors,
        github_api_url: github.url(),
        github_url: github.url(),
        rebar3_nightly_url: format!("{}/rebar3-nightly/rebar3", github.url()),
        http: HttpConfig {
            timeout_ms: 5_000,
            max_retries: 0,
            retry_backoff_ms: 1,
        },
        ..SetupConfig::default()
    };
    let http = HttpClient::new(&config.http, None, &config.github_api_url).unwrap();
    let installer = Installer::new(
        http.clone(),
        ToolCache::new(root.join("tool-cache")),
        root.join("runner-temp"),
        linux(),
        runner,
    );
    let recipe_options = RecipeOptions {
        github_url: config.github_url.clone(),
        rebar3_nightly_url: config.rebar3_nightly_url.clone(),
        home_dir: root.join("home"),
        debug: false,
    };
    Setup::new(config, linux(), http, installer, recipe_options)
}

/// Serve `releases` (a JSON array) as page 1 of a repository's releases and
/// empty pages after it
pub async fn mock_github_releases(
    server: &mut ServerGuard,
    repository: &str,
    releases: &str,
) -> Vec<Mock> {
    let mut mocks = Vec::new();
    for page in 1..=3 {
        let body = if page == 1 { releases } else { "[]" };
        mocks.push(
            server
                .mock("GET", format!("/repos/{}/releases", repository).as_str())
                .match_query(Matcher::AllOf(vec![
                    Matcher::UrlEncoded("per_page".into(), "100".into()),
                    Matcher::UrlEncoded("page".into(), page.to_string()),
                ]))
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(body)
                .create_async()
                .await,
        );
    }
    mocks
}
