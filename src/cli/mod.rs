//! CLI command implementations

pub mod hook;
pub mod init;
pub mod watch;
