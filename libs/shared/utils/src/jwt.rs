use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::{JwtClaims, JwtHeader, Principal, Role};

use crate::token::{TokenError, TokenService};

type HmacSha256 = Hmac<Sha256>;

/// HS256 bearer tokens signed with a shared secret.
#[derive(Clone)]
pub struct HmacTokenService {
    secret: String,
    ttl: Duration,
}

impl HmacTokenService {
    pub fn new(secret: impl Into<String>, ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            ttl,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.jwt_secret.clone(), Duration::hours(config.token_ttl_hours))
    }

    fn mac(&self) -> Result<HmacSha256, TokenError> {
        if self.secret.is_empty() {
            return Err(TokenError::SecretNotSet);
        }
        HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify the signature and expiry and return the raw claims.
    pub fn decode(&self, token: &str) -> Result<JwtClaims, TokenError> {
        let mut mac = self.mac()?;

        // Split token into parts
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(TokenError::Malformed);
        }

        let header_b64 = parts[0];
        let claims_b64 = parts[1];
        let signature_b64 = parts[2];

        let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
            debug!("Failed to decode signature: {}", e);
            TokenError::Malformed
        })?;

        mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());
        if mac.verify_slice(&signature).is_err() {
            debug!("Token signature verification failed");
            return Err(TokenError::InvalidSignature);
        }

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::InvalidClaims("claims are not base64".to_string()))?;

        let claims: JwtClaims = serde_json::from_slice(&claims_json).map_err(|e| {
            debug!("Failed to parse claims: {}", e);
            TokenError::InvalidClaims(e.to_string())
        })?;

        if let Some(exp) = claims.exp {
            let now = Utc::now().timestamp().max(0) as u64;
            if exp < now {
                debug!("Token expired at {} (now: {})", exp, now);
                return Err(TokenError::Expired);
            }
        }

        Ok(claims)
    }

    /// Issue a token with an explicit lifetime; a negative lifetime yields an
    /// already expired token.
    pub fn issue_with_ttl(&self, subject: &str, email: Option<&str>, role: Role, ttl: Duration) -> Result<String, TokenError> {
        let mut mac = self.mac()?;

        let now = Utc::now();
        let claims = JwtClaims {
            sub: subject.to_string(),
            exp: Some((now + ttl).timestamp().max(0) as u64),
            email: email.map(str::to_string),
            role: Some(role.to_string()),
            iat: Some(now.timestamp().max(0) as u64),
        };

        let header_json = serde_json::to_vec(&JwtHeader::default())
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        let claims_json = serde_json::to_vec(&claims)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );

        mac.update(signing_input.as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        Ok(format!("{}.{}", signing_input, signature))
    }
}

impl TokenService for HmacTokenService {
    fn issue(&self, principal: &Principal) -> Result<String, TokenError> {
        self.issue_with_ttl(&principal.subject, principal.email.as_deref(), principal.role, self.ttl)
    }

    fn principal(&self, token: &str) -> Result<Principal, TokenError> {
        let claims = self.decode(token)?;

        let role = claims
            .role
            .as_deref()
            .and_then(|role| role.parse::<Role>().ok())
            .ok_or(TokenError::MissingRole)?;

        debug!("Token validated successfully for user: {}", claims.sub);

        Ok(Principal {
            subject: claims.sub,
            email: claims.email,
            role,
        })
    }
}
