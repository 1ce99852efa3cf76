//! Platform descriptor: operating system, CPU architecture and OS version tag

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    Linux,
    MacOs,
    Windows,
}

impl Os {
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Linux => "linux",
            Os::MacOs => "macos",
            Os::Windows => "windows",
        }
    }

    /// The OS this binary was built for, if it is one we install toolchains on
    pub fn current() -> Option<Self> {
        Self::parse(std::env::consts::OS)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "linux" => Some(Os::Linux),
            "macos" | "darwin" => Some(Os::MacOs),
            "windows" | "win32" => Some(Os::Windows),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    X64,
    Arm64,
}

impl Arch {
    /// Accepts CI runner names (`X64`, `ARM64`) as well as the usual
    /// toolchain spellings (`amd64`, `x86_64`, `arm64`, `aarch64`)
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "X64" | "x64" | "amd64" | "x86_64" => Some(Arch::X64),
            "ARM64" | "arm64" | "aarch64" => Some(Arch::Arm64),
            _ => None,
        }
    }

    pub fn current() -> Option<Self> {
        Self::parse(std::env::consts::ARCH)
    }

    /// Debian-style name used by the hex.pm OTP builds (`amd64`, `arm64`)
    pub fn debian_name(&self) -> &'static str {
        match self {
            Arch::X64 => "amd64",
            Arch::Arm64 => "arm64",
        }
    }

    /// Target-triple prefix (`x86_64`, `aarch64`)
    pub fn triple_name(&self) -> &'static str {
        match self {
            Arch::X64 => "x86_64",
            Arch::Arm64 => "aarch64",
        }
    }
}

/// Where a toolchain is being installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
    /// Runner image tag such as `ubuntu-24.04`; only Linux OTP builds depend on it
    pub os_version: Option<String>,
}

impl Platform {
    pub fn new(os: Os, arch: Arch, os_version: Option<String>) -> Self {
        Self {
            os,
            arch,
            os_version,
        }
    }

    /// Platform tag used in cache keys
    pub fn tag(&self) -> String {
        let os = self.os_version.as_deref().unwrap_or(self.os.as_str());
        format!("{}-{}", os, self.arch.debian_name())
    }
}
