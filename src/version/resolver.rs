//! Resolve a version spec against a catalog of published versions
//!
//! - `latest` resolves to the highest non-branch version.
//! - Branches, release candidates, `nightly` and everything in strict mode
//!   resolve by exact match only.
//! - Other specs in loose mode pick a `major.minor.patch` bucket (by range or
//!   by coercion) and then the highest bucket member whose extra components
//!   agree with the spec.

use std::collections::HashMap;

use tracing::debug;

use crate::config::MatchMode;
use crate::version::comparator::{
    canonicalize, coerce, compare, is_known_branch, is_release_candidate, is_sentinel,
    trailing_extra,
};
use crate::version::range::{ExtraRange, SpecRange};
use crate::version::types::VersionCatalog;

/// Spec that always resolves to the highest published version
pub const LATEST: &str = "latest";

/// Spec for builds of the development head
pub const NIGHTLY: &str = "nightly";

/// The raw catalog key of the highest published version.
///
/// Branches and sentinels are never candidates. Release candidates are, but
/// rank below their final release, so they only win when no release exists.
pub fn latest(catalog: &VersionCatalog) -> Option<&str> {
    catalog
        .keys()
        .filter(|raw| !is_known_branch(raw) && !is_sentinel(raw))
        .max_by(|a, b| compare(a, b))
}

/// Resolve `spec` to the reference of a published version, or `None` if
/// nothing in the catalog satisfies it. The catalog is never modified.
pub fn resolve<'a>(spec: &str, catalog: &'a VersionCatalog, mode: MatchMode) -> Option<&'a str> {
    if spec == LATEST {
        return latest(catalog).and_then(|raw| catalog.get(raw));
    }

    if mode == MatchMode::Strict
        || is_known_branch(spec)
        || is_release_candidate(spec)
        || spec == NIGHTLY
    {
        return resolve_exact(spec, catalog);
    }

    resolve_loose(spec, catalog)
}

fn resolve_exact<'a>(spec: &str, catalog: &'a VersionCatalog) -> Option<&'a str> {
    let wanted = canonicalize(spec);
    catalog.get(wanted).or_else(|| {
        catalog
            .iter()
            .find(|(raw, _)| canonicalize(raw) == wanted)
            .map(|(_, reference)| reference)
    })
}

fn resolve_loose<'a>(spec: &str, catalog: &'a VersionCatalog) -> Option<&'a str> {
    let buckets = bucket(catalog);
    let spec_canonical = canonicalize(spec);

    let bucket_key = match SpecRange::parse(spec) {
        Some(range) => range
            .max_satisfying(buckets.keys().map(String::as_str))?
            .to_string(),
        None => coerce(spec_canonical),
    };
    let members = buckets.get(&bucket_key)?;
    debug!("Spec {} selected bucket {} {:?}", spec, bucket_key, members);

    let wanted = ExtraRange::parse(trailing_extra(spec_canonical))?;
    members
        .iter()
        .rev()
        .find(|member| {
            ExtraRange::parse(trailing_extra(member)).is_some_and(|extra| extra.intersects(&wanted))
        })
        .and_then(|raw| catalog.get(raw))
}

/// Group raw keys by their coerced `major.minor.patch`, each group sorted
/// ascending. Release candidates and branches are opt-in only and left out.
fn bucket(catalog: &VersionCatalog) -> HashMap<String, Vec<&str>> {
    let mut buckets: HashMap<String, Vec<&str>> = HashMap::new();
    for raw in catalog.keys() {
        if is_release_candidate(raw) || is_known_branch(raw) || is_sentinel(raw) {
            continue;
        }
        buckets.entry(coerce(raw)).or_default().push(raw);
    }
    for members in buckets.values_mut() {
        members.sort_by(|a, b| compare(a, b));
    }
    buckets
}
