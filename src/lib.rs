pub mod config;
pub mod install;
pub mod platform;
pub mod setup;
pub mod tool;
pub mod version;
