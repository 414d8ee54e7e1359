use std::sync::Arc;

use tracing::{debug, warn};

use shared_models::auth::{Principal, Role};
use shared_models::error::AppError;
use shared_utils::token::TokenService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Authorized(Principal),
    Unauthorized,
}

impl AccessDecision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, AccessDecision::Authorized(_))
    }
}

/// Role gate in front of every scheduling operation. Signature and expiry are
/// the token service's business; the gate only decides whether the verified
/// role matches the one required.
#[derive(Clone)]
pub struct AccessGate {
    tokens: Arc<dyn TokenService>,
}

impl AccessGate {
    pub fn new(tokens: Arc<dyn TokenService>) -> Self {
        Self { tokens }
    }

    pub fn validate(&self, token: &str, role: Role) -> AccessDecision {
        match self.tokens.principal(token) {
            Ok(principal) if principal.is(role) => {
                debug!("Access granted to {} as {}", principal.subject, role);
                AccessDecision::Authorized(principal)
            }
            Ok(principal) => {
                warn!("Access denied: {} holds role {}, {} required", principal.subject, principal.role, role);
                AccessDecision::Unauthorized
            }
            Err(err) => {
                warn!("Access denied for role {}: {}", role, err);
                AccessDecision::Unauthorized
            }
        }
    }

    /// Boundary form of `validate`: an unauthorized token becomes a 401.
    pub fn authorize(&self, token: &str, role: Role) -> Result<Principal, AppError> {
        match self.validate(token, role) {
            AccessDecision::Authorized(principal) => Ok(principal),
            AccessDecision::Unauthorized => Err(AppError::Auth("Unauthorized".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mockall::mock;
    use shared_utils::token::TokenError;

    mock! {
        pub Tokens {}

        impl TokenService for Tokens {
            fn issue(&self, principal: &Principal) -> Result<String, TokenError>;
            fn principal(&self, token: &str) -> Result<Principal, TokenError>;
        }
    }

    fn principal(role: Role) -> Principal {
        Principal {
            subject: "user-1".to_string(),
            email: Some("user@example.com".to_string()),
            role,
        }
    }

    fn gate_with(result: Result<Principal, TokenError>) -> AccessGate {
        let mut tokens = MockTokens::new();
        tokens
            .expect_principal()
            .withf(|token: &str| token == "token-abc")
            .times(1)
            .return_const(result);
        AccessGate::new(Arc::new(tokens))
    }

    #[test]
    fn matching_role_is_authorized() {
        let gate = gate_with(Ok(principal(Role::Patient)));

        let decision = gate.validate("token-abc", Role::Patient);

        assert_eq!(decision, AccessDecision::Authorized(principal(Role::Patient)));
    }

    #[test]
    fn role_mismatch_is_unauthorized() {
        let gate = gate_with(Ok(principal(Role::Patient)));

        assert_eq!(gate.validate("token-abc", Role::Doctor), AccessDecision::Unauthorized);
    }

    #[test]
    fn admin_is_not_a_wildcard() {
        let gate = gate_with(Ok(principal(Role::Admin)));

        assert!(!gate.validate("token-abc", Role::Patient).is_authorized());
    }

    #[test]
    fn rejected_token_is_unauthorized() {
        let gate = gate_with(Err(TokenError::Expired));

        assert_eq!(gate.validate("token-abc", Role::Patient), AccessDecision::Unauthorized);
    }

    #[test]
    fn authorize_maps_rejection_to_auth_error() {
        let gate = gate_with(Err(TokenError::InvalidSignature));

        assert_matches!(gate.authorize("token-abc", Role::Doctor), Err(AppError::Auth(_)));
    }
}
