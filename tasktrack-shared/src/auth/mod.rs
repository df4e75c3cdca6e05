/// Authentication and authorization primitives
///
/// - [`password`]: Argon2id hashing for stored credentials
/// - [`jwt`]: session tokens carried in the `jwt` cookie or a Bearer header
/// - [`policy`]: the action → permission table and its evaluator
///
/// The HTTP guard that ties these together lives in the API crate.

pub mod jwt;
pub mod password;
pub mod policy;
