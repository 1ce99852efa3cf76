use std::path::PathBuf;

use thiserror::Error;

use crate::tool::Tool;
use crate::version::error::RegistryError;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("Failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: RegistryError,
    },

    #[error("Failed to extract {archive:?}: {details}")]
    Extract { archive: PathBuf, details: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{program}` failed: {details}")]
    Command { program: String, details: String },

    #[error("{tool} {version} was installed but `{program}` could not run: {details}")]
    Verification {
        tool: Tool,
        version: String,
        program: String,
        details: String,
    },

    #[error("Installing {tool} is not supported on {platform}")]
    UnsupportedPlatform { tool: Tool, platform: String },
}
