//! Install layer: download, unpack, cache and verify toolchains
//!
//! # Modules
//!
//! - [`recipe`]: Where each tool's builds live and how they are finished
//! - [`archive`]: tar.gz / zip extraction
//! - [`cache`]: Persistent tool cache keyed by version and platform
//! - [`context`]: Paths and variables handed to later steps
//! - [`mirrors`]: Sequential fallback across hex.pm mirrors
//! - [`runner`]: Subprocess execution
//! - [`error`]: Error types for installs

pub mod archive;
pub mod cache;
pub mod context;
pub mod error;
pub mod mirrors;
pub mod recipe;
pub mod runner;

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::install::archive::extract;
use crate::install::cache::{ToolCache, copy_dir_all};
use crate::install::context::InstallationContext;
use crate::install::error::InstallError;
use crate::install::recipe::{Extraction, Recipe};
use crate::install::runner::CommandRunner;
use crate::platform::Platform;
use crate::tool::Tool;
use crate::version::http::HttpClient;

/// Directory under the install root holding one directory per tool
pub const INSTALL_DIR_NAME: &str = ".setup-beam";

/// Progress of a single install, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotCached,
    Downloading,
    Extracting,
    PostExtracting,
    Published,
    VersionReported,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstallState::NotCached => "not cached",
            InstallState::Downloading => "downloading",
            InstallState::Extracting => "extracting",
            InstallState::PostExtracting => "post-extracting",
            InstallState::Published => "published",
            InstallState::VersionReported => "version reported",
        };
        f.write_str(name)
    }
}

/// A finished install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledTool {
    pub tool: Tool,
    pub version: String,
    pub install_dir: PathBuf,
    pub bin_dir: PathBuf,
    /// What the tool printed when asked for its version
    pub reported_version: String,
    pub from_cache: bool,
}

pub struct Installer {
    http: HttpClient,
    cache: ToolCache,
    install_root: PathBuf,
    platform: Platform,
    runner: Arc<dyn CommandRunner>,
}

impl Installer {
    pub fn new(
        http: HttpClient,
        cache: ToolCache,
        install_root: impl Into<PathBuf>,
        platform: Platform,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            http,
            cache,
            install_root: install_root.into(),
            platform,
            runner,
        }
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Run-local directory the tool is installed into
    pub fn install_dir(&self, tool: Tool) -> PathBuf {
        self.install_root.join(INSTALL_DIR_NAME).join(tool.as_str())
    }

    /// Install `version` (a download reference) of the recipe's tool.
    ///
    /// `mirror` is only used by mirrored recipes. On success `ctx` holds the
    /// tool's `bin` directory and `INSTALL_DIR_FOR_<TOOL>`. If finishing or
    /// verifying the build fails, its cache entry is removed.
    pub async fn install(
        &self,
        recipe: &dyn Recipe,
        version: &str,
        mirror: &str,
        ctx: &mut InstallationContext,
    ) -> Result<InstalledTool, InstallError> {
        let tool = recipe.tool();
        let key = format!("{}-{}", version, self.platform.tag());

        let (cached, from_cache) = match self.cache.find(tool, &key) {
            Some(dir) => {
                debug!("{} {} found in cache at {:?}", tool, version, dir);
                (dir, true)
            }
            None => {
                log_state(tool, version, InstallState::NotCached);
                (self.fetch_into_cache(recipe, version, mirror, &key).await?, false)
            }
        };

        let published = self.publish(recipe, version, &cached, ctx).await;
        let (install_dir, bin_dir, reported_version) = match published {
            Ok(published) => published,
            Err(e) => {
                // A build that can't be installed must not be found again
                debug!("Evicting {} {} from cache: {}", tool, version, e);
                if let Err(evict) = self.cache.remove(tool, &key) {
                    warn!("Could not evict {} {} from cache: {}", tool, version, evict);
                }
                return Err(e);
            }
        };

        Ok(InstalledTool {
            tool,
            version: version.to_string(),
            install_dir,
            bin_dir,
            reported_version,
            from_cache,
        })
    }

    /// Copy `cached` into the run-local install dir, finish it and check the
    /// version it reports. Returns the install dir, its `bin` and the report.
    async fn publish(
        &self,
        recipe: &dyn Recipe,
        version: &str,
        cached: &Path,
        ctx: &mut InstallationContext,
    ) -> Result<(PathBuf, PathBuf, String), InstallError> {
        let tool = recipe.tool();
        let install_dir = self.install_dir(tool);
        if install_dir.exists() {
            fs::remove_dir_all(&install_dir)?;
        }
        copy_dir_all(cached, &install_dir)?;

        log_state(tool, version, InstallState::PostExtracting);
        recipe
            .post_extract(&install_dir, ctx, self.runner())
            .await?;

        let bin_dir = recipe.bin_dir(&install_dir);
        ctx.add_path(&bin_dir);
        ctx.export_variable(
            format!("INSTALL_DIR_FOR_{}", tool.as_str().to_uppercase()),
            install_dir.display().to_string(),
        );
        log_state(tool, version, InstallState::Published);

        let command = recipe.report_version().envs(ctx.command_env());
        let reported_version =
            self.runner
                .run(&command)
                .await
                .map_err(|e| InstallError::Verification {
                    tool,
                    version: version.to_string(),
                    program: command.display(),
                    details: e.to_string(),
                })?;
        log_state(tool, version, InstallState::VersionReported);
        info!("{} {} reports: {}", tool, version, reported_version);

        Ok((install_dir, bin_dir, reported_version))
    }

    async fn fetch_into_cache(
        &self,
        recipe: &dyn Recipe,
        version: &str,
        mirror: &str,
        key: &str,
    ) -> Result<PathBuf, InstallError> {
        let tool = recipe.tool();
        let url = recipe.download_url(version, mirror)?;
        let staging = self.cache.staging_dir(tool, key);
        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        let contents = staging.join("contents");
        fs::create_dir_all(&contents)?;

        let result = self
            .download_and_extract(recipe, version, &url, &staging, &contents)
            .await
            .and_then(|()| {
                self.cache
                    .store(&contents, tool, key)
                    .map_err(InstallError::from)
            });

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        result
    }

    async fn download_and_extract(
        &self,
        recipe: &dyn Recipe,
        version: &str,
        url: &str,
        staging: &Path,
        contents: &Path,
    ) -> Result<(), InstallError> {
        let tool = recipe.tool();
        log_state(tool, version, InstallState::Downloading);

        match recipe.extraction() {
            Extraction::File { filename } => {
                self.download(url, &contents.join(filename)).await?;
            }
            Extraction::Archive {
                kind,
                strip_top_dir,
            } => {
                let archive = staging.join(format!("download.{}", kind.extension()));
                self.download(url, &archive).await?;
                log_state(tool, version, InstallState::Extracting);
                extract(&archive, kind, contents, strip_top_dir)?;
            }
        }

        Ok(())
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), InstallError> {
        self.http
            .download(url, dest)
            .await
            .map_err(|source| InstallError::Download {
                url: url.to_string(),
                source,
            })
    }
}

fn log_state(tool: Tool, version: &str, state: InstallState) {
    info!("{} {}: {}", tool, version, state);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HttpConfig;
    use crate::install::archive::test_support::tar_gz;
    use crate::install::recipe::{RecipeOptions, recipe_for};
    use crate::install::runner::MockCommandRunner;
    use crate::platform::{Arch, Os};
    use mockito::{Server, ServerGuard};
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        cache_root: PathBuf,
        install_root: PathBuf,
        options: RecipeOptions,
    }

    fn fixture(server: &ServerGuard) -> Fixture {
        let temp = TempDir::new().unwrap();
        let options = RecipeOptions {
            github_url: server.url(),
            rebar3_nightly_url: format!("{}/rebar3-nightly/rebar3", server.url()),
            home_dir: temp.path().join("home"),
            debug: false,
        };
        Fixture {
            cache_root: temp.path().join("cache"),
            install_root: temp.path().join("runner-temp"),
            options,
            _temp: temp,
        }
    }

    fn linux() -> Platform {
        Platform::new(Os::Linux, Arch::X64, Some("ubuntu-24.04".to_string()))
    }

    fn installer(server: &ServerGuard, fixture: &Fixture, runner: MockCommandRunner) -> Installer {
        let http = HttpClient::new(&HttpConfig::default(), None, &server.url()).unwrap();
        Installer::new(
            http,
            ToolCache::new(&fixture.cache_root),
            &fixture.install_root,
            linux(),
            Arc::new(runner),
        )
    }

    #[tokio::test]
    async fn second_install_is_served_from_cache() {
        let mut server = Server::new_async().await;
        let download = server
            .mock("GET", "/erlang/rebar3/releases/download/3.24.0/rebar3")
            .with_status(200)
            .with_body("#!/usr/bin/env escript\n")
            .expect(1)
            .create_async()
            .await;
        let fixture = fixture(&server);

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| cmd.program == "rebar3" && cmd.args == vec!["version".to_string()])
            .times(2)
            .returning(|_| Ok("rebar 3.24.0 on Erlang/OTP 27 Erts 15.0".to_string()));

        let installer = installer(&server, &fixture, runner);
        let recipe = recipe_for(Tool::Rebar3, &linux(), &fixture.options).unwrap();

        let mut ctx = InstallationContext::new();
        let first = installer
            .install(recipe.as_ref(), "3.24.0", "", &mut ctx)
            .await
            .unwrap();
        let second = installer
            .install(recipe.as_ref(), "3.24.0", "", &mut ctx)
            .await
            .unwrap();

        download.assert_async().await;
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert!(second.bin_dir.join("rebar3").is_file());
        assert_eq!(
            second.install_dir,
            fixture.install_root.join(".setup-beam").join("rebar3")
        );
        assert_eq!(second.reported_version, "rebar 3.24.0 on Erlang/OTP 27 Erts 15.0");
    }

    #[tokio::test]
    async fn install_records_path_and_install_dir_variable() {
        let mut server = Server::new_async().await;
        let _download = server
            .mock(
                "GET",
                "/gleam-lang/gleam/releases/download/v1.5.1/gleam-v1.5.1-x86_64-unknown-linux-musl.tar.gz",
            )
            .with_status(200)
            .with_body(tar_gz(&[("gleam", "binary", 0o755)]))
            .create_async()
            .await;
        let fixture = fixture(&server);

        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|cmd| {
                cmd.program == "gleam"
                    && cmd
                        .env
                        .iter()
                        .any(|(k, v)| k == "PATH" && v.contains(".setup-beam"))
            })
            .times(1)
            .returning(|_| Ok("gleam 1.5.1".to_string()));

        let installer = installer(&server, &fixture, runner);
        let recipe = recipe_for(Tool::Gleam, &linux(), &fixture.options).unwrap();
        let mut ctx = InstallationContext::new();

        let installed = installer
            .install(recipe.as_ref(), "v1.5.1", "", &mut ctx)
            .await
            .unwrap();

        assert_eq!(ctx.paths, vec![installed.bin_dir.clone()]);
        assert_eq!(
            ctx.variables.get("INSTALL_DIR_FOR_GLEAM"),
            Some(&installed.install_dir.display().to_string())
        );
        assert!(installed.bin_dir.join("gleam").is_file());
    }

    #[tokio::test]
    async fn failed_version_report_is_a_verification_error() {
        let mut server = Server::new_async().await;
        let _download = server
            .mock("GET", "/erlang/rebar3/releases/download/3.10.0/rebar3")
            .with_status(200)
            .with_body("escript")
            .create_async()
            .await;
        let fixture = fixture(&server);

        let mut runner = MockCommandRunner::new();
        runner.expect_run().returning(|cmd| {
            Err(InstallError::Command {
                program: cmd.display(),
                details: "exit status: 127".to_string(),
            })
        });

        let installer = installer(&server, &fixture, runner);
        let recipe = recipe_for(Tool::Rebar3, &linux(), &fixture.options).unwrap();

        let result = installer
            .install(recipe.as_ref(), "3.10.0", "", &mut InstallationContext::new())
            .await;

        match result {
            Err(InstallError::Verification { tool, program, .. }) => {
                assert_eq!(tool, Tool::Rebar3);
                assert_eq!(program, "rebar3 version");
            }
            other => panic!("expected verification error, got {:?}", other),
        }
        let cache = ToolCache::new(&fixture.cache_root);
        assert!(cache.find(Tool::Rebar3, "3.10.0-ubuntu-24.04-amd64").is_none());
    }

    #[tokio::test]
    async fn failed_post_extract_evicts_cached_build() {
        let mut server = Server::new_async().await;
        let download = server
            .mock(
                "GET",
                "/gleam-lang/gleam/releases/download/v1.5.1/gleam-v1.5.1-x86_64-unknown-linux-musl.tar.gz",
            )
            .with_status(200)
            .with_body(tar_gz(&[("README.md", "no binary here", 0o644)]))
            .expect(2)
            .create_async()
            .await;
        let fixture = fixture(&server);

        let installer = installer(&server, &fixture, MockCommandRunner::new());
        let recipe = recipe_for(Tool::Gleam, &linux(), &fixture.options).unwrap();

        for _ in 0..2 {
            let result = installer
                .install(recipe.as_ref(), "v1.5.1", "", &mut InstallationContext::new())
                .await;
            assert!(matches!(result, Err(InstallError::Io(_))));
        }

        download.assert_async().await;
        let cache = ToolCache::new(&fixture.cache_root);
        assert!(cache.find(Tool::Gleam, "v1.5.1-ubuntu-24.04-amd64").is_none());
    }

    #[tokio::test]
    async fn failed_download_leaves_nothing_in_cache() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/erlang/rebar3/releases/download/9.9.9/rebar3")
            .with_status(404)
            .create_async()
            .await;
        let fixture = fixture(&server);

        let installer = installer(&server, &fixture, MockCommandRunner::new());
        let recipe = recipe_for(Tool::Rebar3, &linux(), &fixture.options).unwrap();

        let result = installer
            .install(recipe.as_ref(), "9.9.9", "", &mut InstallationContext::new())
            .await;

        assert!(matches!(result, Err(InstallError::Download { .. })));
        let cache = ToolCache::new(&fixture.cache_root);
        assert!(cache.find(Tool::Rebar3, "9.9.9-ubuntu-24.04-amd64").is_none());
        assert!(!cache.staging_dir(Tool::Rebar3, "9.9.9-ubuntu-24.04-amd64").exists());
    }
}
