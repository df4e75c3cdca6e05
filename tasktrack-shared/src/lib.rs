//! # Tasktrack Shared Library
//!
//! Domain types, persistence, and auth primitives used by the Tasktrack API
//! server.
//!
//! ## Module Organization
//!
//! - `db`: connection pool and migrations
//! - `models`: database models and their queries
//! - `auth`: password hashing, session tokens, and the permission policy
//! - `progress`: status grouping for the progress board
//! - `storage`: upload storage for task attachments

pub mod auth;
pub mod db;
pub mod models;
pub mod progress;
pub mod storage;

/// Current version of the Tasktrack shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
