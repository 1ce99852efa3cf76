//! Registry implementations for fetching published toolchain builds

pub mod github;
pub mod hexpm;
pub mod otp_builds;

pub use github::GitHubRegistry;
pub use hexpm::HexpmRegistry;
pub use otp_builds::OtpBuildsRegistry;
