//! Shared test utilities
#![allow(dead_code)]

pub mod archives;
pub mod runner;
pub mod servers;

pub use archives::{tar_gz, zip};
pub use runner::RecordingRunner;
pub use servers::{mock_github_releases, setup_for};
