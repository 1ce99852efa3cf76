//! Range specs for loose matching
//!
//! Supports the npm-style forms users write in CI configs:
//! - `1`, `1.2`, `1.2.x`, `*` - X-ranges (`1.2` means `>=1.2.0 <1.3.0`)
//! - `1.2.3` - exact
//! - `^1.2`, `~1.2.3` - caret and tilde
//! - `>20`, `> 0`, `>=1.0 <2` - comparisons, optionally space-separated from the version
//! - `1.0 - 2.3` - hyphen ranges
//! - `^1 || ^2` - alternatives
//!
//! Evaluation is delegated to `semver::VersionReq` on three-component versions.

use semver::{Version, VersionReq};

/// A parsed range spec; satisfied when any alternative is
#[derive(Debug, Clone)]
pub struct SpecRange {
    alternatives: Vec<VersionReq>,
}

impl SpecRange {
    /// Parse a range spec, or `None` if `spec` isn't a valid range
    /// (e.g. `22.3.4.2` has too many components to be one)
    pub fn parse(spec: &str) -> Option<Self> {
        let alternatives = spec
            .trim()
            .split("||")
            .map(parse_alternative)
            .collect::<Option<Vec<_>>>()?;
        Some(Self { alternatives })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The highest candidate satisfying this range; candidates that aren't
    /// semver versions are skipped
    pub fn max_satisfying<'a, I>(&self, candidates: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates
            .into_iter()
            .filter_map(|c| Version::parse(c).ok().map(|v| (c, v)))
            .filter(|(_, v)| self.matches(v))
            .max_by(|(_, a), (_, b)| a.cmp(b))
            .map(|(c, _)| c)
    }
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "^", "~"];

fn parse_alternative(alternative: &str) -> Option<VersionReq> {
    let alternative = alternative.trim();
    if alternative.is_empty() {
        return Some(VersionReq::STAR);
    }

    let comparators = match alternative.split_once(" - ") {
        Some((from, to)) => hyphen_comparators(from.trim(), to.trim())?,
        None => {
            let mut comparators = Vec::new();
            let mut pending_op: Option<&str> = None;
            for token in alternative.split_whitespace() {
                if OPERATORS.contains(&token) {
                    if pending_op.is_some() {
                        return None;
                    }
                    pending_op = Some(token);
                    continue;
                }
                let (op, version) = match pending_op.take() {
                    Some(op) => (op, token),
                    None => split_operator(token),
                };
                comparators.extend(translate(op, version)?);
            }
            if pending_op.is_some() {
                return None;
            }
            comparators
        }
    };

    VersionReq::parse(&comparators.join(", ")).ok()
}

fn split_operator(token: &str) -> (&str, &str) {
    OPERATORS
        .iter()
        .find_map(|op| token.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", token))
}

/// Translate one `op version` pair into comparators `semver` understands
fn translate(op: &str, version: &str) -> Option<Vec<String>> {
    let x = XRange::parse(version)?;

    match op {
        "" | "=" => x.as_bounds(),
        _ => match x.major {
            None if op == ">=" || op == "<=" => Some(vec![">=0.0.0".to_string()]),
            None => None,
            Some(_) => Some(vec![format!("{}{}", op, x.numeric_text())]),
        },
    }
}

fn hyphen_comparators(from: &str, to: &str) -> Option<Vec<String>> {
    let from = XRange::parse(from)?;
    let to = XRange::parse(to)?;

    let mut comparators = Vec::new();
    if from.major.is_some() {
        comparators.push(format!(">={}", from.numeric_text()));
    }
    if to.major.is_some() {
        comparators.push(format!("<={}", to.numeric_text()));
    }
    if comparators.is_empty() {
        comparators.push(">=0.0.0".to_string());
    }
    Some(comparators)
}

/// Trailing components of a catalog version or spec as a half-open interval
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtraRange {
    lower: Version,
    /// Exclusive; `None` is unbounded
    upper: Option<Version>,
}

impl ExtraRange {
    /// Parse the extra part of a version (see `comparator::trailing_extra`).
    /// An empty extra matches anything; anything that isn't a plain X-range
    /// of at most three components is rejected.
    pub fn parse(extra: &str) -> Option<Self> {
        let extra = extra.trim();
        if extra.is_empty() {
            return Some(Self::any());
        }

        let x = XRange::parse(extra)?;
        if x.pre.is_some() {
            return None;
        }

        let range = match (x.major, x.minor, x.patch) {
            (None, _, _) => Self::any(),
            (Some(major), None, _) => Self {
                lower: Version::new(major, 0, 0),
                upper: Some(Version::new(major.checked_add(1)?, 0, 0)),
            },
            (Some(major), Some(minor), None) => Self {
                lower: Version::new(major, minor, 0),
                upper: Some(Version::new(major, minor.checked_add(1)?, 0)),
            },
            (Some(major), Some(minor), Some(patch)) => Self {
                lower: Version::new(major, minor, patch),
                upper: Some(Version::new(major, minor, patch.checked_add(1)?)),
            },
        };
        Some(range)
    }

    fn any() -> Self {
        Self {
            lower: Version::new(0, 0, 0),
            upper: None,
        }
    }

    pub fn intersects(&self, other: &Self) -> bool {
        let below = |lower: &Version, upper: &Option<Version>| {
            upper.as_ref().is_none_or(|upper| lower < upper)
        };
        below(&self.lower, &other.upper) && below(&other.lower, &self.upper)
    }
}

/// A possibly partial version; `None` components are wildcards or missing
#[derive(Debug, Clone, PartialEq, Eq)]
struct XRange {
    major: Option<u64>,
    minor: Option<u64>,
    patch: Option<u64>,
    pre: Option<String>,
}

impl XRange {
    fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let text = text.strip_prefix('v').unwrap_or(text);
        if text.is_empty() {
            return None;
        }

        let mut parts = text.splitn(3, '.');
        let major = parts.next()?;
        let minor = parts.next();
        let (patch, pre) = match parts.next() {
            Some(patch) => match patch.split_once(['-', '+']) {
                Some((patch, pre)) => (Some(patch), Some(pre.to_string())),
                None => (Some(patch), None),
            },
            None => (None, None),
        };

        let major = component(major)?;
        let minor = minor.map(component).unwrap_or(Some(None))?;
        let patch = patch.map(component).unwrap_or(Some(None))?;

        // nothing numeric may follow a wildcard
        if (major.is_none() && (minor.is_some() || patch.is_some()))
            || (minor.is_none() && patch.is_some())
        {
            return None;
        }
        if pre.is_some() && patch.is_none() {
            return None;
        }

        Some(Self {
            major,
            minor,
            patch,
            pre,
        })
    }

    /// Comparators for a bare X-range; `None` when the upper bound
    /// can't be represented
    fn as_bounds(&self) -> Option<Vec<String>> {
        let bounds = match (self.major, self.minor, self.patch) {
            (None, _, _) => vec![">=0.0.0".to_string()],
            (Some(major), None, _) => vec![
                format!(">={}.0.0", major),
                format!("<{}.0.0", major.checked_add(1)?),
            ],
            (Some(major), Some(minor), None) => vec![
                format!(">={}.{}.0", major, minor),
                format!("<{}.{}.0", major, minor.checked_add(1)?),
            ],
            (Some(_), Some(_), Some(_)) => vec![format!("={}", self.numeric_text())],
        };
        Some(bounds)
    }

    /// The numeric prefix as text, e.g. `19.3` or `1.2.3-rc.1`
    fn numeric_text(&self) -> String {
        let numbers = [self.major, self.minor, self.patch]
            .into_iter()
            .map_while(|c| c)
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".");
        match &self.pre {
            Some(pre) => format!("{}-{}", numbers, pre),
            None => numbers,
        }
    }
}

/// Parse one component; `Some(None)` is a wildcard, `None` is invalid
fn component(text: &str) -> Option<Option<u64>> {
    match text {
        "x" | "X" | "*" => Some(None),
        _ if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => {
            text.parse().ok().map(Some)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[rstest]
    #[case("1", "1.9.9", true)]
    #[case("1", "2.0.0", false)]
    #[case("1.0", "1.0.9", true)]
    #[case("1.0", "1.1.0", false)]
    #[case("20.x", "20.3.8", true)]
    #[case("20.0.x", "20.1.0", false)]
    #[case("19.3.x", "19.3.6", true)]
    #[case("^19.3", "19.9.0", true)]
    #[case("^19.3", "20.0.0", false)]
    #[case("^19.3.6", "19.3.5", false)]
    #[case("~1.2.3", "1.2.9", true)]
    #[case("~1.2.3", "1.3.0", false)]
    #[case(">20", "21.0.0", true)]
    #[case(">20", "20.3.0", false)]
    #[case("> 0", "1.0.0", true)]
    #[case(">= 1.0 < 2", "1.5.0", true)]
    #[case(">= 1.0 < 2", "2.0.0", false)]
    #[case("1.0 - 2.3", "2.3.0", true)]
    #[case("^1 || ^3", "3.1.0", true)]
    #[case("^1 || ^3", "2.1.0", false)]
    #[case("23.3.3", "23.3.3", true)]
    #[case("23.3.3", "23.3.4", false)]
    #[case("v1.14.2", "1.14.2", true)]
    #[case("*", "0.1.0", true)]
    fn parse_and_match(#[case] spec: &str, #[case] version: &str, #[case] expected: bool) {
        let range = SpecRange::parse(spec).unwrap();
        assert_eq!(range.matches(&v(version)), expected, "{} vs {}", spec, version);
    }

    #[rstest]
    #[case("22.3.4.2")]
    #[case("24.0-rc3")]
    #[case("main")]
    #[case("latest")]
    #[case(">")]
    #[case("1.x.2")]
    #[case("18446744073709551615")]
    #[case("1.18446744073709551615")]
    fn parse_rejects_non_ranges(#[case] spec: &str) {
        assert!(SpecRange::parse(spec).is_none(), "{} should not parse", spec);
    }

    #[test]
    fn max_satisfying_skips_non_semver_candidates() {
        let range = SpecRange::parse("1").unwrap();
        let candidates = ["1.0.0", "main", "1.1.0", "1.0.9", "2.0.0", "24.0-rc3"];

        assert_eq!(range.max_satisfying(candidates), Some("1.1.0"));
    }

    #[test]
    fn max_satisfying_returns_none_when_nothing_matches() {
        let range = SpecRange::parse("^5").unwrap();
        assert_eq!(range.max_satisfying(["1.0.0", "2.0.0"]), None);
    }

    #[rstest]
    #[case("", "4.1", true)]
    #[case("2", "2.1.0", true)]
    #[case("2", "12.1", false)]
    #[case("2.1", "2.1.0", true)]
    #[case("3", "3.0", true)]
    #[case("3", "4", false)]
    #[case("2.1.0", "2.1.0", true)]
    #[case("2.1.0", "2.1.1", false)]
    fn extra_range_intersects(#[case] a: &str, #[case] b: &str, #[case] expected: bool) {
        let a = ExtraRange::parse(a).unwrap();
        let b = ExtraRange::parse(b).unwrap();
        assert_eq!(a.intersects(&b), expected);
        assert_eq!(b.intersects(&a), expected);
    }

    #[rstest]
    #[case("2.1.0.1")]
    #[case("rc3")]
    #[case("4-rc1")]
    #[case("18446744073709551615")]
    #[case("2.1.18446744073709551615")]
    fn extra_range_rejects_invalid_extras(#[case] extra: &str) {
        assert!(ExtraRange::parse(extra).is_none());
    }
}
