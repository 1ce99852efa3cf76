//! Version layer: fetching build listings and resolving version specs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Registry   │────▶│   Catalog   │◀────│  Resolver   │
//! │  (fetch)    │     │ (raw → ref) │     │ (spec → ref)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       │
//!        ▼                                       ▼
//! ┌─────────────┐                         ┌─────────────┐
//! │ Registries  │                         │ Comparator  │
//! │(hexpm, gh..)│                         │  + ranges   │
//! └─────────────┘                         └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`comparator`]: Version grammar, ordering and normalisation helpers
//! - [`range`]: Range expressions (`^1`, `>20`, `1.0 - 2.0`) over semver
//! - [`resolver`]: Spec resolution in strict and loose mode
//! - [`registry`]: Registry trait for fetching listings from remote sources
//! - [`registries`]: hex.pm, GitHub Releases and otp_builds implementations
//! - [`http`]: Shared HTTP client with retries and page fan-out
//! - [`error`]: Error types for registry operations
//! - [`types`]: `VersionCatalog` and `ToolVersions`

pub mod comparator;
pub mod error;
pub mod http;
pub mod range;
pub mod registries;
pub mod registry;
pub mod resolver;
pub mod types;
