//! Resolve requested toolchain versions and install them in order
//!
//! Erlang/OTP comes first, then Elixir (built against that OTP) with the
//! optional `mix local.rebar` / `mix local.hex` steps, then Gleam and rebar3.
//! Listings and downloads hosted on hex.pm go through every configured mirror.

use indexmap::IndexMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{MatchMode, SetupConfig};
use crate::install::context::InstallationContext;
use crate::install::error::InstallError;
use crate::install::mirrors::{MirrorError, with_mirrors};
use crate::install::recipe::{RecipeOptions, recipe_for};
use crate::install::runner::ToolCommand;
use crate::install::{InstalledTool, Installer};
use crate::platform::{Os, Platform};
use crate::tool::Tool;
use crate::version::comparator::{is_known_branch, maybe_prepend_v};
use crate::version::error::RegistryError;
use crate::version::http::HttpClient;
use crate::version::registries::{GitHubRegistry, HexpmRegistry, OtpBuildsRegistry};
use crate::version::registry::Registry;
use crate::version::resolver::{NIGHTLY, resolve};
use crate::version::types::ToolVersions;

/// `otp-version` value that skips installing Erlang/OTP
pub const OTP_DISABLED: &str = "false";

const ELIXIR_COMPATIBILITY_URL: &str =
    "https://hexdocs.pm/elixir/compatibility-and-deprecations.html";

const ELIXIR_OTP_SUFFIX: &str = "-otp-";

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(
        "Requested {tool} version ({spec}) not found in version list \
         (should you be using option 'version-type': 'strict'?)"
    )]
    SpecNotFound { tool: Tool, spec: String },

    #[error(
        "Requested Elixir / Erlang/OTP version ({elixir} / {otp}) not found in version list \
         (did you check Compatibility between Elixir and Erlang/OTP?). \
         Elixir and Erlang/OTP compatibility can be found at: {url}",
        url = ELIXIR_COMPATIBILITY_URL
    )]
    ElixirOtpIncompatible { elixir: String, otp: String },

    #[error("otp-version=false is only available when installing Gleam")]
    OtpRequired,

    #[error("Elixir needs Erlang/OTP; it can't be installed with otp-version=false")]
    ElixirWithoutOtp,

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Listing(#[from] MirrorError<RegistryError>),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Mirror(#[from] MirrorError<InstallError>),
}

/// What to set up. Unset tools are skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupRequest {
    /// OTP spec, or `false` to skip OTP (Gleam only)
    pub otp_version: Option<String>,
    pub elixir_version: Option<String>,
    pub gleam_version: Option<String>,
    pub rebar3_version: Option<String>,
    pub install_hex: bool,
    pub install_rebar: bool,
}

impl SetupRequest {
    /// The OTP spec, unless OTP is not wanted
    pub fn otp_spec(&self) -> Option<&str> {
        self.otp_version
            .as_deref()
            .filter(|spec| !spec.is_empty() && *spec != OTP_DISABLED)
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.otp_spec().is_some() {
            return Ok(());
        }
        if self.elixir_version.is_some() {
            return Err(SetupError::ElixirWithoutOtp);
        }
        if self.gleam_version.is_none() {
            return Err(SetupError::OtpRequired);
        }
        Ok(())
    }
}

/// Result of a successful run
#[derive(Debug, Clone, Default)]
pub struct SetupOutcome {
    /// Download reference per tool, in install order
    pub versions: IndexMap<Tool, String>,
    pub installed: Vec<InstalledTool>,
    pub context: InstallationContext,
}

impl SetupOutcome {
    /// `otp-version`, `elixir-version`, ... → resolved version
    pub fn outputs(&self) -> IndexMap<String, String> {
        versions_as_outputs(&self.versions)
    }
}

pub fn versions_as_outputs(versions: &IndexMap<Tool, String>) -> IndexMap<String, String> {
    versions
        .iter()
        .map(|(tool, version)| (format!("{}-version", tool.as_str()), version.clone()))
        .collect()
}

/// Where a tool's listing lives on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListingSource {
    Hexpm,
    GitHub,
    OtpBuilds,
}

fn listing_source(tool: Tool, platform: &Platform) -> ListingSource {
    match (tool, platform.os) {
        (Tool::Otp, Os::Linux) | (Tool::Elixir, _) => ListingSource::Hexpm,
        (Tool::Otp, Os::MacOs) => ListingSource::OtpBuilds,
        _ => ListingSource::GitHub,
    }
}

pub struct Setup {
    config: SetupConfig,
    platform: Platform,
    http: HttpClient,
    installer: Installer,
    recipe_options: RecipeOptions,
}

impl Setup {
    pub fn new(
        config: SetupConfig,
        platform: Platform,
        http: HttpClient,
        installer: Installer,
        recipe_options: RecipeOptions,
    ) -> Self {
        Self {
            config,
            platform,
            http,
            installer,
            recipe_options,
        }
    }

    fn mode(&self) -> MatchMode {
        self.config.version_type
    }

    /// Fetch every published version of `tool` for this platform
    pub async fn versions(&self, tool: Tool) -> Result<ToolVersions, SetupError> {
        let platform = &self.platform;
        let versions = match listing_source(tool, platform) {
            ListingSource::Hexpm => {
                let action = format!("fetch {} builds listing", tool);
                with_mirrors(&self.config.hexpm_mirrors, &action, |mirror| {
                    let registry = HexpmRegistry::new(self.http.clone(), &mirror);
                    async move { registry.fetch_versions(tool, platform).await }
                })
                .await?
            }
            ListingSource::GitHub => {
                GitHubRegistry::new(self.http.clone(), &self.config.github_api_url)
                    .fetch_versions(tool, platform)
                    .await?
            }
            ListingSource::OtpBuilds => {
                OtpBuildsRegistry::new(self.http.clone(), &self.config.otp_builds_url)
                    .fetch_versions(tool, platform)
                    .await?
            }
        };
        debug!("{} has {} published versions", tool, versions.catalog.len());
        Ok(versions)
    }

    pub async fn otp_version(&self, spec: &str) -> Result<String, SetupError> {
        let versions = self.versions(Tool::Otp).await?;
        let bare = spec.strip_prefix("OTP-").unwrap_or(spec);
        pick_version(Tool::Otp, bare, &versions, self.mode())
            .map_err(|_| not_found(Tool::Otp, spec))
    }

    /// Elixir download reference for `spec` built against `otp_version`
    pub async fn elixir_version(&self, spec: &str, otp_version: &str) -> Result<String, SetupError> {
        let versions = self.versions(Tool::Elixir).await?;
        elixir_for_otp(spec, otp_version, &versions, self.mode())
    }

    pub async fn gleam_version(&self, spec: &str) -> Result<String, SetupError> {
        let versions = self.versions(Tool::Gleam).await?;
        pick_version(Tool::Gleam, spec, &versions, self.mode()).map(|v| maybe_prepend_v(&v))
    }

    pub async fn rebar3_version(&self, spec: &str) -> Result<String, SetupError> {
        if spec == NIGHTLY {
            return Ok(NIGHTLY.to_string());
        }
        let versions = self.versions(Tool::Rebar3).await?;
        pick_version(Tool::Rebar3, spec, &versions, self.mode())
    }

    /// Resolve every requested tool without installing anything
    pub async fn resolve_all(
        &self,
        request: &SetupRequest,
    ) -> Result<IndexMap<Tool, String>, SetupError> {
        request.validate()?;
        let mut versions = IndexMap::new();

        if let Some(otp_spec) = request.otp_spec() {
            let otp = self.otp_version(otp_spec).await?;
            versions.insert(Tool::Otp, otp.clone());
            if let Some(spec) = &request.elixir_version {
                versions.insert(Tool::Elixir, self.elixir_version(spec, &otp).await?);
            }
        }
        if let Some(spec) = &request.gleam_version {
            versions.insert(Tool::Gleam, self.gleam_version(spec).await?);
        }
        if let Some(spec) = &request.rebar3_version {
            versions.insert(Tool::Rebar3, self.rebar3_version(spec).await?);
        }

        for (tool, version) in &versions {
            info!("Resolved {} to {}", tool, version);
        }
        Ok(versions)
    }

    /// Resolve and install everything in `request`
    pub async fn run(&self, request: &SetupRequest) -> Result<SetupOutcome, SetupError> {
        let versions = self.resolve_all(request).await?;
        let mut ctx = InstallationContext::new();
        let mut installed = Vec::new();

        for (tool, version) in &versions {
            installed.push(self.install(*tool, version, &mut ctx).await?);

            if *tool == Tool::Elixir {
                if request.install_rebar {
                    self.mix("rebar", &ctx).await?;
                }
                if request.install_hex {
                    self.mix("hex", &ctx).await?;
                }
            }
        }

        Ok(SetupOutcome {
            versions,
            installed,
            context: ctx,
        })
    }

    async fn install(
        &self,
        tool: Tool,
        version: &str,
        ctx: &mut InstallationContext,
    ) -> Result<InstalledTool, SetupError> {
        let recipe = recipe_for(tool, &self.platform, &self.recipe_options)?;
        info!("Installing {} {}", tool, version);

        if !recipe.mirrored() {
            return Ok(self.installer.install(recipe.as_ref(), version, "", ctx).await?);
        }

        // Every attempt starts from the context as it was before this tool
        let base = ctx.clone();
        let action = format!("install {} {}", tool, version);
        let (installed, attempt_ctx) =
            with_mirrors(&self.config.hexpm_mirrors, &action, |mirror| {
                let mut attempt = base.clone();
                let recipe = recipe.as_ref();
                async move {
                    let installed = self
                        .installer
                        .install(recipe, version, &mirror, &mut attempt)
                        .await?;
                    Ok::<_, InstallError>((installed, attempt))
                }
            })
            .await?;

        *ctx = attempt_ctx;
        Ok(installed)
    }

    /// `mix local.<what> --force`, with `HEX_MIRROR` set per attempt
    async fn mix(&self, what: &str, ctx: &InstallationContext) -> Result<(), SetupError> {
        let program = match self.platform.os {
            Os::Windows => "mix.bat",
            _ => "mix",
        };
        let command = ToolCommand::new(program)
            .arg(format!("local.{}", what))
            .arg("--force")
            .envs(ctx.command_env());
        let runner = self.installer.runner();

        with_mirrors(&self.config.hexpm_mirrors, &format!("mix {}", what), |mirror| {
            let command = command.clone().env("HEX_MIRROR", mirror);
            async move { runner.run(&command).await }
        })
        .await?;
        Ok(())
    }
}

fn not_found(tool: Tool, spec: &str) -> SetupError {
    SetupError::SpecNotFound {
        tool,
        spec: spec.to_string(),
    }
}

/// Resolve `spec` in `versions`, or fail with [`SetupError::SpecNotFound`]
pub fn pick_version(
    tool: Tool,
    spec: &str,
    versions: &ToolVersions,
    mode: MatchMode,
) -> Result<String, SetupError> {
    resolve(spec, &versions.catalog, mode)
        .map(str::to_string)
        .ok_or_else(|| not_found(tool, spec))
}

/// OTP major of an OTP reference: `OTP-26.0` → `26`, `maint-27` → `27`,
/// `27.0-rc3` → `27`. Branches without a number (`master`) come back as-is.
fn otp_major(otp_version: &str) -> &str {
    let bare = otp_version.strip_prefix("OTP-").unwrap_or(otp_version);
    let bare = match bare.split_once('-') {
        Some((_, number)) if is_known_branch(bare) => number,
        _ => bare,
    };
    let major_len = bare.find(|c: char| !c.is_ascii_digit()).unwrap_or(bare.len());
    if major_len == 0 { bare } else { &bare[..major_len] }
}

/// Elixir download reference (`v1.17.3-otp-27`) for `spec` built against
/// `otp_version`.
///
/// A `-otp-N` suffix on the spec is ignored; the build always follows the
/// OTP in use. When that OTP has no number (`master`), the generic build
/// without a suffix is used.
pub fn elixir_for_otp(
    spec: &str,
    otp_version: &str,
    versions: &ToolVersions,
    mode: MatchMode,
) -> Result<String, SetupError> {
    let elixir_spec = spec.split_once(ELIXIR_OTP_SUFFIX).map_or(spec, |(elixir, _)| elixir);
    let otp_major = otp_major(otp_version);

    let elixir = resolve(elixir_spec, &versions.catalog, mode)
        .ok_or_else(|| not_found(Tool::Elixir, spec))?;

    if !otp_major.chars().all(|c| c.is_ascii_digit()) {
        info!("Using Elixir {} (built for Erlang/OTP {})", elixir, otp_major);
        return Ok(maybe_prepend_v(elixir));
    }

    let compatible = versions
        .otp_compat
        .get(elixir)
        .is_some_and(|majors| majors.iter().any(|major| major == otp_major));
    if !compatible {
        return Err(SetupError::ElixirOtpIncompatible {
            elixir: spec.to_string(),
            otp: otp_version.to_string(),
        });
    }
    info!("Using Elixir {} (built for Erlang/OTP {})", elixir, otp_major);

    Ok(maybe_prepend_v(&format!("{}-otp-{}", elixir, otp_major)))
}
