//! CLI command implementations.

pub mod cluster;
pub mod config;
pub mod init;
pub mod start;
pub mod version;
