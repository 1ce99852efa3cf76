//! Registry trait for fetching published toolchain versions

use crate::platform::Platform;
use crate::tool::Tool;
use crate::version::error::RegistryError;
use crate::version::types::ToolVersions;

/// A source of published build listings
#[async_trait::async_trait]
pub trait Registry: Send + Sync {
    /// Fetches every published version of `tool` for `platform`
    ///
    /// # Returns
    /// * `Ok(ToolVersions)` - Raw version → download reference, in listing order
    /// * `Err(RegistryError::Unsupported)` - If this source has no listing for the pair
    /// * `Err(RegistryError)` - If the fetch or parse fails
    async fn fetch_versions(
        &self,
        tool: Tool,
        platform: &Platform,
    ) -> Result<ToolVersions, RegistryError>;
}
