use std::path::PathBuf;

use thiserror::Error;

use crate::tool::Tool;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Got {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No {tool} version listing for {platform}")]
    Unsupported { tool: Tool, platform: String },
}
