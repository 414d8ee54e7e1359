use thiserror::Error;

use shared_models::auth::{Principal, Role};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    SecretNotSet,

    #[error("Invalid token format")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Invalid claims: {0}")]
    InvalidClaims(String),

    #[error("Token expired")]
    Expired,

    #[error("Token carries no recognised role")]
    MissingRole,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Issues and checks bearer tokens. Signature and expiry handling live behind
/// this trait; callers only see subjects, roles and principals.
pub trait TokenService: Send + Sync {
    fn issue(&self, principal: &Principal) -> Result<String, TokenError>;

    fn principal(&self, token: &str) -> Result<Principal, TokenError>;

    /// True when the token verifies and was issued for `role`.
    fn validate(&self, token: &str, role: Role) -> bool {
        self.principal(token)
            .map(|principal| principal.role == role)
            .unwrap_or(false)
    }

    fn extract_subject(&self, token: &str) -> Option<String> {
        self.principal(token).ok().map(|principal| principal.subject)
    }
}
