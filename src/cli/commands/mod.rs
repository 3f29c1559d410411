//! CLI command implementations.

pub mod diagnose;
pub mod init;
pub mod plan;
pub mod up;
pub mod validate;
