//! Canonical forms and ordering for toolchain version strings
//!
//! Toolchain versions are not strict semver: Erlang/OTP publishes up to six
//! numeric components (`6.0.2.0.1.0`), Elixir builds carry an `-otp-N` suffix,
//! release candidates are spelled `-rc3` or `-rc.3`, and branches such as
//! `main` or `maint-27` sit in the same listings.

use std::cmp::Ordering;
use std::sync::LazyLock;

use regex::Regex;

/// Maximum number of numeric components in a version
pub const MAX_COMPONENTS: usize = 6;

/// Branch names that are published alongside numbered builds
const KNOWN_BRANCHES: [&str; 3] = ["main", "master", "maint"];

/// Sentinel specs that never take part in ordering
const SENTINELS: [&str; 2] = ["latest", "nightly"];

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:OTP-|v)?(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:\.(\d+))?(?:-rc\.?(\d+))?(?:-otp-(\d+))?$",
    )
    .expect("version grammar is a valid regex")
});

static TRAILING_EXTRA_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.[^.]+)?(?:\.[^.]+)?\.?(.*)").expect("trailing extra is a valid regex")
});

/// A version broken into its comparable parts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedVersion {
    /// Numeric components as written (1 to 6 of them)
    pub components: Vec<u64>,
    /// Release-candidate number, when the version carries `-rc[.]N`
    pub rc: Option<u64>,
    /// OTP major pinned by an `-otp-N` suffix
    pub otp: Option<u64>,
}

impl ParsedVersion {
    pub fn parse(s: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(s)?;
        let number = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<u64>().ok());

        let components = (1..=MAX_COMPONENTS).map_while(number).collect::<Vec<_>>();
        // A gap (e.g. `1..2`) can't match the grammar, but a component that overflows u64 can
        let written = (1..=MAX_COMPONENTS).filter(|&i| caps.get(i).is_some()).count();
        if components.len() != written {
            return None;
        }

        Some(Self {
            components,
            rc: caps.get(7).and_then(|m| m.as_str().parse().ok()),
            otp: caps.get(8).and_then(|m| m.as_str().parse().ok()),
        })
    }

    fn padded(&self) -> [u64; MAX_COMPONENTS] {
        let mut padded = [0; MAX_COMPONENTS];
        for (slot, component) in padded.iter_mut().zip(&self.components) {
            *slot = *component;
        }
        padded
    }
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.padded()
            .cmp(&other.padded())
            // a final release outranks its release candidates
            .then_with(|| match (self.rc, other.rc) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(&b),
            })
            .then_with(|| self.components.len().cmp(&other.components.len()))
            .then_with(|| self.otp.cmp(&other.otp))
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// True if `s` matches the multi-component version grammar
pub fn is_version(s: &str) -> bool {
    ParsedVersion::parse(s).is_some()
}

/// True if `s` is a version carrying a release-candidate suffix
pub fn is_release_candidate(s: &str) -> bool {
    ParsedVersion::parse(s).is_some_and(|v| v.rc.is_some())
}

/// True for `main`, `master`, `maint` and their suffixed forms (`maint-27`, `main-otp-25`)
pub fn is_known_branch(s: &str) -> bool {
    KNOWN_BRANCHES.iter().any(|branch| {
        s == *branch
            || s.strip_prefix(branch)
                .is_some_and(|rest| rest.len() > 1 && rest.starts_with('-'))
    })
}

/// True for `latest` and `nightly`
pub fn is_sentinel(s: &str) -> bool {
    SENTINELS.contains(&s)
}

/// Strip a leading `OTP-` or `v` from a version; anything else is returned unchanged
pub fn canonicalize(s: &str) -> &str {
    if !is_version(s) {
        return s;
    }
    s.strip_prefix("OTP-")
        .or_else(|| s.strip_prefix('v'))
        .unwrap_or(s)
}

/// Reduce a version to its bucket key.
///
/// Ordinary versions become `major.minor.patch`; release candidates keep their
/// full canonical form so that they never share a bucket; branches and other
/// non-versions are returned unchanged.
pub fn coerce(s: &str) -> String {
    if is_known_branch(s) {
        return s.to_string();
    }
    match ParsedVersion::parse(s) {
        Some(parsed) if parsed.rc.is_none() => {
            let [major, minor, patch, ..] = parsed.padded();
            format!("{}.{}.{}", major, minor, patch)
        }
        Some(_) => canonicalize(s).to_string(),
        None => s.to_string(),
    }
}

/// Total order over version strings.
///
/// Versions compare component-wise (missing components are zero), then
/// release above RC, then deeper above shallower, then by `-otp-` suffix.
/// Strings that aren't versions sort below every version.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (ParsedVersion::parse(a), ParsedVersion::parse(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// The part of a version past its first three components.
///
/// `3.4.5.4.1` gives `4.1`, `1.1.0` gives an empty string. Also applied to
/// specs, where `22.3.4.2.1` gives `2.1` and `^19.3` gives an empty string.
pub fn trailing_extra(version: &str) -> &str {
    TRAILING_EXTRA_RE
        .captures(version)
        .and_then(|caps| caps.get(1))
        .map_or("", |m| m.as_str())
}

/// Prefix a version with `v` as Elixir and Gleam download references expect.
/// Branch names and other non-versions are returned unchanged.
pub fn maybe_prepend_v(s: &str) -> String {
    if is_version(s) {
        format!("v{}", canonicalize(s))
    } else {
        s.to_string()
    }
}
