//! CLI command implementations.

pub mod assign;
pub mod assignment;
pub mod audit;
pub mod daemon;
pub mod import;
pub mod init;
pub mod overlap;
pub mod pool;
pub mod sweep;
