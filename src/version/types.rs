//! Catalog types shared by registries and the resolver

use std::collections::HashMap;

use indexmap::IndexMap;

/// Published versions of a tool: raw version string → download reference.
///
/// The two differ when a listing labels builds differently from how users
/// request them, e.g. raw `19.3.6.13` → reference `OTP-19.3.6.13`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionCatalog {
    entries: IndexMap<String, String>,
}

impl VersionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; a later entry for the same raw version replaces the earlier one
    pub fn insert(&mut self, raw: impl Into<String>, reference: impl Into<String>) {
        self.entries.insert(raw.into(), reference.into());
    }

    pub fn get(&self, raw: &str) -> Option<&str> {
        self.entries.get(raw).map(String::as_str)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.entries.contains_key(raw)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for VersionCatalog {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for (raw, reference) in iter {
            catalog.insert(raw, reference);
        }
        catalog
    }
}

/// Everything a registry knows about a tool's published builds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolVersions {
    pub catalog: VersionCatalog,
    /// OTP majors each Elixir version was built for (empty for other tools)
    pub otp_compat: HashMap<String, Vec<String>>,
}

impl ToolVersions {
    pub fn new(catalog: VersionCatalog) -> Self {
        Self {
            catalog,
            otp_compat: HashMap::new(),
        }
    }

    pub fn with_otp_compat(mut self, otp_compat: HashMap<String, Vec<String>>) -> Self {
        self.otp_compat = otp_compat;
        self
    }
}
