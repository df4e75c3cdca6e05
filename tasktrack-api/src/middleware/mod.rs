/// Middleware modules for the API server
///
/// - `auth`: session token lookup and the HTML / JSON guards
/// - `policy`: per-route permission check producing a `Grant`
/// - `method_override`: `_method` tunnelling for HTML forms
/// - `security`: security response headers

pub mod auth;
pub mod method_override;
pub mod policy;
pub mod security;
