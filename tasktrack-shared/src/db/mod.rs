/// Database layer
///
/// - `pool`: connection pool lifecycle and health checks
/// - `migrations`: embedded schema migrations
///
/// Table access lives in [`crate::models`].

pub mod migrations;
pub mod pool;
