/// Session tokens
///
/// A successful signup or login issues one HS256-signed JWT whose subject is
/// the user id. The browser keeps it in the `jwt` cookie; API clients may
/// send it as a Bearer token instead. Permissions are not embedded in the
/// token: they are resolved from the database on every request so role
/// changes apply immediately.
///
/// # Example
///
/// ```
/// use tasktrack_shared::auth::jwt::{create_token, validate_token, Claims};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "an-example-secret-that-is-32-bytes!";
/// let token = create_token(&Claims::new(7), secret)?;
///
/// let claims = validate_token(&token, secret)?;
/// assert_eq!(claims.sub, 7);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Value of the `iss` claim
pub const ISSUER: &str = "tasktrack";

/// Default session lifetime
pub const DEFAULT_SESSION_HOURS: i64 = 24;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to sign a token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token signature, issuer or shape is wrong
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token is past its `exp`
    #[error("Token has expired")]
    Expired,
}

/// Session claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: i32,

    /// Always [`ISSUER`]
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Claims valid for [`DEFAULT_SESSION_HOURS`]
    pub fn new(user_id: i32) -> Self {
        Self::with_expiration(user_id, Duration::hours(DEFAULT_SESSION_HOURS))
    }

    /// Claims valid for `expires_in` from now
    pub fn with_expiration(user_id: i32, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
        }
    }

    /// Whether `exp` has passed
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
///
/// # Errors
///
/// Returns `JwtError::CreateError` if encoding fails.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, `exp` and `nbf`, then returns the claims
///
/// # Errors
///
/// Returns `JwtError::Expired` for expired tokens and
/// `JwtError::ValidationError` for anything else that fails.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::ValidationError(e.to_string()),
        })
}
