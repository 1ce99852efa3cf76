//! Per-tool, per-OS install recipes
//!
//! A recipe knows where a build lives, how it is packaged, what has to happen
//! after unpacking, and how to ask the installed tool for its version. The
//! [`Installer`](crate::install::Installer) drives the steps.

use std::fs;
use std::path::{Path, PathBuf};

use crate::install::archive::ArchiveKind;
use crate::install::context::InstallationContext;
use crate::install::error::InstallError;
use crate::install::runner::{CommandRunner, ToolCommand};
use crate::platform::{Arch, Os, Platform};
use crate::tool::Tool;
use crate::version::comparator::{compare, is_version};
use crate::version::resolver::NIGHTLY;

/// First Gleam release published with target-triple asset names
const GLEAM_TRIPLE_NAMES_SINCE: &str = "v0.22.0";

const OTP_RELEASE_EVAL: &str = "io:format(\"~s\", [erlang:system_info(otp_release)]), halt().";

const REBAR3_CMD_SHIM: &str = "@echo off\r\nescript.exe \"%~dpn0\" %*\r\n";

/// How a download turns into an install directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Archive {
        kind: ArchiveKind,
        strip_top_dir: bool,
    },
    /// The download is a single file saved under this name
    File { filename: &'static str },
}

/// Settings shared by all recipes
#[derive(Debug, Clone)]
pub struct RecipeOptions {
    pub github_url: String,
    pub rebar3_nightly_url: String,
    /// Home directory for per-user tool state (`~/.mix`)
    pub home_dir: PathBuf,
    pub debug: bool,
}

#[async_trait::async_trait]
pub trait Recipe: Send + Sync {
    fn tool(&self) -> Tool;

    /// Whether downloads come from the hex.pm mirrors (and so should be
    /// retried across them)
    fn mirrored(&self) -> bool {
        false
    }

    /// URL of the build for `version`; `mirror` is used by mirrored recipes
    fn download_url(&self, version: &str, mirror: &str) -> Result<String, InstallError>;

    fn extraction(&self) -> Extraction;

    /// Finish the install inside `install_dir`
    async fn post_extract(
        &self,
        _install_dir: &Path,
        _ctx: &mut InstallationContext,
        _runner: &dyn CommandRunner,
    ) -> Result<(), InstallError> {
        Ok(())
    }

    /// Command printing the installed version
    fn report_version(&self) -> ToolCommand;

    fn bin_dir(&self, install_dir: &Path) -> PathBuf {
        install_dir.join("bin")
    }
}

/// Pick the recipe for `tool` on `platform`
pub fn recipe_for(
    tool: Tool,
    platform: &Platform,
    options: &RecipeOptions,
) -> Result<Box<dyn Recipe>, InstallError> {
    let github_url = options.github_url.trim_end_matches('/').to_string();
    let recipe: Box<dyn Recipe> = match (tool, platform.os) {
        (Tool::Otp, Os::Linux) => {
            let os_version = platform.os_version.clone().ok_or_else(|| {
                InstallError::UnsupportedPlatform {
                    tool,
                    platform: format!("{} without an OS version", platform.os.as_str()),
                }
            })?;
            Box::new(OtpLinux {
                arch: platform.arch,
                os_version,
            })
        }
        (Tool::Otp, Os::Windows) => Box::new(OtpWindows { github_url }),
        (Tool::Otp, Os::MacOs) => Box::new(OtpMacOs {
            github_url,
            arch: platform.arch,
        }),
        (Tool::Elixir, os) => Box::new(Elixir {
            windows: os == Os::Windows,
            home_dir: options.home_dir.clone(),
            debug: options.debug,
        }),
        (Tool::Gleam, Os::Windows) if platform.arch == Arch::Arm64 => {
            return Err(InstallError::UnsupportedPlatform {
                tool,
                platform: platform.tag(),
            });
        }
        (Tool::Gleam, os) => Box::new(Gleam {
            github_url,
            os,
            arch: platform.arch,
        }),
        (Tool::Rebar3, os) => Box::new(Rebar3 {
            github_url,
            nightly_url: options.rebar3_nightly_url.clone(),
            windows: os == Os::Windows,
        }),
    };
    Ok(recipe)
}

fn otp_report_version(program: &str) -> ToolCommand {
    ToolCommand::new(program).args(["-noshell", "-eval", OTP_RELEASE_EVAL])
}

/// Move `name` from the install root into `bin/` and make it executable
fn move_into_bin(install_dir: &Path, name: &str) -> Result<PathBuf, InstallError> {
    let bin = install_dir.join("bin");
    fs::create_dir_all(&bin)?;
    let target = bin.join(name);
    fs::rename(install_dir.join(name), &target)?;
    set_executable(&target)?;
    Ok(target)
}

fn set_executable(path: &Path) -> Result<(), InstallError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(path, perms)?;
    }

    #[cfg(not(unix))]
    let _ = path;

    Ok(())
}

/// hex.pm precompiled OTP for a Linux image
struct OtpLinux {
    arch: Arch,
    os_version: String,
}

#[async_trait::async_trait]
impl Recipe for OtpLinux {
    fn tool(&self) -> Tool {
        Tool::Otp
    }

    fn mirrored(&self) -> bool {
        true
    }

    fn download_url(&self, version: &str, mirror: &str) -> Result<String, InstallError> {
        Ok(format!(
            "{}/builds/otp/{}/{}/{}.tar.gz",
            mirror.trim_end_matches('/'),
            self.arch.debian_name(),
            self.os_version,
            version
        ))
    }

    fn extraction(&self) -> Extraction {
        Extraction::Archive {
            kind: ArchiveKind::TarGz,
            strip_top_dir: true,
        }
    }

    async fn post_extract(
        &self,
        install_dir: &Path,
        _ctx: &mut InstallationContext,
        runner: &dyn CommandRunner,
    ) -> Result<(), InstallError> {
        let command = ToolCommand::new(install_dir.join("Install").display().to_string())
            .arg("-minimal")
            .arg(install_dir.display().to_string())
            .current_dir(install_dir);
        runner.run(&command).await?;
        Ok(())
    }

    fn report_version(&self) -> ToolCommand {
        otp_report_version("erl")
    }
}

/// Official Windows installer from erlang/otp releases
struct OtpWindows {
    github_url: String,
}

#[async_trait::async_trait]
impl Recipe for OtpWindows {
    fn tool(&self) -> Tool {
        Tool::Otp
    }

    fn download_url(&self, version: &str, _mirror: &str) -> Result<String, InstallError> {
        Ok(format!(
            "{}/erlang/otp/releases/download/OTP-{v}/otp_win64_{v}.exe",
            self.github_url,
            v = version
        ))
    }

    fn extraction(&self) -> Extraction {
        Extraction::File {
            filename: "otp.exe",
        }
    }

    async fn post_extract(
        &self,
        install_dir: &Path,
        _ctx: &mut InstallationContext,
        runner: &dyn CommandRunner,
    ) -> Result<(), InstallError> {
        let command = ToolCommand::new(install_dir.join("otp.exe").display().to_string())
            .arg("/S")
            .arg(format!("/D={}", install_dir.display()));
        runner.run(&command).await?;
        Ok(())
    }

    fn report_version(&self) -> ToolCommand {
        otp_report_version("erl.exe")
    }
}

/// erlef/otp_builds macOS tarballs
struct OtpMacOs {
    github_url: String,
    arch: Arch,
}

#[async_trait::async_trait]
impl Recipe for OtpMacOs {
    fn tool(&self) -> Tool {
        Tool::Otp
    }

    fn download_url(&self, version: &str, _mirror: &str) -> Result<String, InstallError> {
        Ok(format!(
            "{}/erlef/otp_builds/releases/download/{v}/{v}-macos-{}.tar.gz",
            self.github_url,
            self.arch.debian_name(),
            v = version
        ))
    }

    fn extraction(&self) -> Extraction {
        Extraction::Archive {
            kind: ArchiveKind::TarGz,
            strip_top_dir: true,
        }
    }

    fn report_version(&self) -> ToolCommand {
        otp_report_version("erl")
    }
}

/// hex.pm precompiled Elixir (one zip per Elixir/OTP pair)
struct Elixir {
    windows: bool,
    home_dir: PathBuf,
    debug: bool,
}

#[async_trait::async_trait]
impl Recipe for Elixir {
    fn tool(&self) -> Tool {
        Tool::Elixir
    }

    fn mirrored(&self) -> bool {
        true
    }

    fn download_url(&self, version: &str, mirror: &str) -> Result<String, InstallError> {
        Ok(format!(
            "{}/builds/elixir/{}.zip",
            mirror.trim_end_matches('/'),
            version
        ))
    }

    fn extraction(&self) -> Extraction {
        Extraction::Archive {
            kind: ArchiveKind::Zip,
            strip_top_dir: false,
        }
    }

    async fn post_extract(
        &self,
        _install_dir: &Path,
        ctx: &mut InstallationContext,
        _runner: &dyn CommandRunner,
    ) -> Result<(), InstallError> {
        let escripts = self.home_dir.join(".mix").join("escripts");
        fs::create_dir_all(&escripts)?;
        ctx.add_path(escripts);
        if self.debug {
            ctx.export_variable("ELIXIR_CLI_ECHO", "true");
        }
        Ok(())
    }

    fn report_version(&self) -> ToolCommand {
        let program = if self.windows { "elixir.bat" } else { "elixir" };
        ToolCommand::new(program).arg("-v")
    }
}

/// Gleam release binaries from GitHub
struct Gleam {
    github_url: String,
    os: Os,
    arch: Arch,
}

impl Gleam {
    fn uses_triple_names(version: &str) -> bool {
        !is_version(version) || compare(version, GLEAM_TRIPLE_NAMES_SINCE).is_ge()
    }

    fn target(&self, version: &str) -> Result<&'static str, InstallError> {
        let target = if Self::uses_triple_names(version) {
            match (self.os, self.arch) {
                (Os::Linux, Arch::X64) => Some("x86_64-unknown-linux-musl"),
                (Os::Linux, Arch::Arm64) => Some("aarch64-unknown-linux-musl"),
                (Os::MacOs, Arch::X64) => Some("x86_64-apple-darwin"),
                (Os::MacOs, Arch::Arm64) => Some("aarch64-apple-darwin"),
                (Os::Windows, Arch::X64) => Some("x86_64-pc-windows-msvc"),
                (Os::Windows, Arch::Arm64) => None,
            }
        } else {
            match (self.os, self.arch) {
                (Os::Linux, Arch::X64) => Some("linux-amd64"),
                (Os::MacOs, _) => Some("macos"),
                (Os::Windows, Arch::X64) => Some("windows-64bit"),
                _ => None,
            }
        };
        target.ok_or_else(|| InstallError::UnsupportedPlatform {
            tool: Tool::Gleam,
            platform: format!("{}-{} for {}", self.os.as_str(), self.arch.triple_name(), version),
        })
    }

    fn archive_kind(&self) -> ArchiveKind {
        match self.os {
            Os::Windows => ArchiveKind::Zip,
            _ => ArchiveKind::TarGz,
        }
    }

    fn binary_name(&self) -> &'static str {
        match self.os {
            Os::Windows => "gleam.exe",
            _ => "gleam",
        }
    }
}

#[async_trait::async_trait]
impl Recipe for Gleam {
    fn tool(&self) -> Tool {
        Tool::Gleam
    }

    fn download_url(&self, version: &str, _mirror: &str) -> Result<String, InstallError> {
        Ok(format!(
            "{}/gleam-lang/gleam/releases/download/{v}/gleam-{v}-{}.{}",
            self.github_url,
            self.target(version)?,
            self.archive_kind().extension(),
            v = version
        ))
    }

    fn extraction(&self) -> Extraction {
        Extraction::Archive {
            kind: self.archive_kind(),
            strip_top_dir: false,
        }
    }

    async fn post_extract(
        &self,
        install_dir: &Path,
        _ctx: &mut InstallationContext,
        _runner: &dyn CommandRunner,
    ) -> Result<(), InstallError> {
        move_into_bin(install_dir, self.binary_name())?;
        Ok(())
    }

    fn report_version(&self) -> ToolCommand {
        ToolCommand::new("gleam").arg("--version")
    }
}

/// rebar3 escript from GitHub releases (or the nightly bucket)
struct Rebar3 {
    github_url: String,
    nightly_url: String,
    windows: bool,
}

#[async_trait::async_trait]
impl Recipe for Rebar3 {
    fn tool(&self) -> Tool {
        Tool::Rebar3
    }

    fn download_url(&self, version: &str, _mirror: &str) -> Result<String, InstallError> {
        if version == NIGHTLY {
            return Ok(self.nightly_url.clone());
        }
        Ok(format!(
            "{}/erlang/rebar3/releases/download/{}/rebar3",
            self.github_url, version
        ))
    }

    fn extraction(&self) -> Extraction {
        Extraction::File {
            filename: "rebar3",
        }
    }

    async fn post_extract(
        &self,
        install_dir: &Path,
        _ctx: &mut InstallationContext,
        _runner: &dyn CommandRunner,
    ) -> Result<(), InstallError> {
        let rebar3 = move_into_bin(install_dir, "rebar3")?;
        if self.windows {
            fs::write(rebar3.with_extension("cmd"), REBAR3_CMD_SHIM)?;
        }
        Ok(())
    }

    fn report_version(&self) -> ToolCommand {
        let program = if self.windows { "rebar3.cmd" } else { "rebar3" };
        ToolCommand::new(program).arg("version")
    }
}
