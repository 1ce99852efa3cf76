use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{ArgAction, Args, Parser, Subcommand};
use indexmap::IndexMap;
use tracing::info;
use tracing_subscriber::EnvFilter;

use setup_beam::config::{self, MatchMode, SetupConfig, parse_mirror_list};
use setup_beam::install::Installer;
use setup_beam::install::cache::ToolCache;
use setup_beam::install::context::InstallationContext;
use setup_beam::install::recipe::RecipeOptions;
use setup_beam::install::runner::ProcessRunner;
use setup_beam::platform::{Arch, Os, Platform};
use setup_beam::setup::{Setup, SetupRequest, versions_as_outputs};
use setup_beam::version::http::HttpClient;

#[derive(Parser)]
#[command(name = "setup-beam")]
#[command(version, about = "Resolve and install Erlang/OTP, Elixir, Gleam and rebar3")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and install the requested tools
    Install(SetupArgs),
    /// Print the versions the requested tools resolve to
    Resolve(SetupArgs),
}

#[derive(Args, Debug)]
struct SetupArgs {
    /// Erlang/OTP version spec, or `false` to skip OTP (Gleam only)
    #[arg(long)]
    otp_version: Option<String>,

    #[arg(long)]
    elixir_version: Option<String>,

    #[arg(long)]
    gleam_version: Option<String>,

    #[arg(long)]
    rebar3_version: Option<String>,

    /// `strict` matches specs exactly, `loose` treats them as ranges
    #[arg(long)]
    version_type: Option<MatchMode>,

    /// hex.pm mirrors in order of preference (repeatable, or newline/comma separated)
    #[arg(long)]
    hexpm_mirrors: Vec<String>,

    /// Runner image the Linux OTP build was made for, e.g. `ubuntu-24.04`
    #[arg(long)]
    os_version: Option<String>,

    /// CPU architecture (`X64`, `ARM64`, `amd64`, `aarch64`, ...)
    #[arg(long, env = "RUNNER_ARCH")]
    arch: Option<String>,

    /// Run `mix local.hex --force` after installing Elixir
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    install_hex: bool,

    /// Run `mix local.rebar --force` after installing Elixir
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    install_rebar: bool,

    /// Token sent to the GitHub API to raise rate limits
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Directory tools are installed into [default: $RUNNER_TEMP]
    #[arg(long)]
    install_root: Option<PathBuf>,

    /// Directory for cached downloads [default: $RUNNER_TOOL_CACHE]
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// JSON file with settings (mirrors, API URLs, HTTP retry policy)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose logging (also enabled by RUNNER_DEBUG=1)
    #[arg(long)]
    debug: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl SetupArgs {
    fn debug_enabled(&self) -> bool {
        self.debug || std::env::var("RUNNER_DEBUG").is_ok_and(|v| v == "1")
    }

    fn request(&self) -> SetupRequest {
        SetupRequest {
            otp_version: self.otp_version.clone(),
            elixir_version: self.elixir_version.clone(),
            gleam_version: self.gleam_version.clone(),
            rebar3_version: self.rebar3_version.clone(),
            install_hex: self.install_hex,
            install_rebar: self.install_rebar,
        }
    }

    fn load_config(&self) -> Result<SetupConfig> {
        let mut config = match &self.config {
            Some(path) => SetupConfig::load(path)?,
            None => SetupConfig::default(),
        };

        if let Some(version_type) = self.version_type {
            config.version_type = version_type;
        }
        let mirrors: Vec<String> = self
            .hexpm_mirrors
            .iter()
            .flat_map(|m| parse_mirror_list(m))
            .collect();
        if !mirrors.is_empty() {
            config.hexpm_mirrors = mirrors;
        }
        if let Some(token) = &self.github_token {
            config.github_token = Some(token.clone());
        }

        Ok(config)
    }

    fn platform(&self) -> Result<Platform> {
        let os = Os::current()
            .ok_or_else(|| anyhow!("unsupported operating system: {}", std::env::consts::OS))?;
        let arch = match &self.arch {
            Some(arch) => Arch::parse(arch),
            None => Arch::current(),
        }
        .ok_or_else(|| {
            anyhow!(
                "unsupported architecture: {}",
                self.arch.as_deref().unwrap_or(std::env::consts::ARCH)
            )
        })?;
        Ok(Platform::new(os, arch, self.os_version.clone()))
    }
}

fn init_tracing(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let (install, args) = match cli.command {
        Command::Install(args) => (true, args),
        Command::Resolve(args) => (false, args),
    };
    init_tracing(args.debug_enabled(), args.log_json);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(install, args))
}

async fn run(install: bool, args: SetupArgs) -> Result<()> {
    let config = args.load_config()?;
    let platform = args.platform()?;
    info!("Setting up on {}", platform.tag());

    let http = HttpClient::new(&config.http, config.github_token.clone(), &config.github_api_url)?;
    let installer = Installer::new(
        http.clone(),
        ToolCache::new(args.cache_dir.clone().unwrap_or_else(config::tool_cache_dir)),
        args.install_root.clone().unwrap_or_else(config::install_root),
        platform.clone(),
        Arc::new(ProcessRunner),
    );
    let recipe_options = RecipeOptions {
        github_url: config.github_url.clone(),
        rebar3_nightly_url: config.rebar3_nightly_url.clone(),
        home_dir: dirs::home_dir().context("could not determine the home directory")?,
        debug: args.debug_enabled(),
    };
    let setup = Setup::new(config, platform, http, installer, recipe_options);
    let request = args.request();

    if !install {
        let versions = setup.resolve_all(&request).await?;
        for (name, value) in versions_as_outputs(&versions) {
            println!("{}={}", name, value);
        }
        return Ok(());
    }

    let outcome = setup.run(&request).await?;
    apply_context(&outcome.context)?;
    write_outputs(&outcome.outputs())?;
    Ok(())
}

/// Hand paths and variables to the next steps: through the runner's files
/// when present, otherwise as shell exports on stdout
fn apply_context(ctx: &InstallationContext) -> Result<()> {
    match env_path("GITHUB_PATH") {
        Some(file) => ctx
            .append_path_file(&file)
            .with_context(|| format!("writing {:?}", file))?,
        None => {
            for path in &ctx.paths {
                println!("export PATH=\"{}:$PATH\"", path.display());
            }
        }
    }

    match env_path("GITHUB_ENV") {
        Some(file) => ctx
            .append_env_file(&file)
            .with_context(|| format!("writing {:?}", file))?,
        None => {
            for (name, value) in &ctx.variables {
                println!("export {}=\"{}\"", name, value);
            }
        }
    }

    Ok(())
}

fn write_outputs(outputs: &IndexMap<String, String>) -> Result<()> {
    let Some(file) = env_path("GITHUB_OUTPUT") else {
        for (name, value) in outputs {
            info!("{}: {}", name, value);
        }
        return Ok(());
    };

    append_lines(&file, outputs).with_context(|| format!("writing {:?}", file))
}

fn append_lines(file: &Path, outputs: &IndexMap<String, String>) -> std::io::Result<()> {
    let mut out = OpenOptions::new().create(true).append(true).open(file)?;
    for (name, value) in outputs {
        writeln!(out, "{}={}", name, value)?;
    }
    Ok(())
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
