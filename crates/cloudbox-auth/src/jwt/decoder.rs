//! JWT token validation.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::de::DeserializeOwned;

use cloudbox_core::config::AuthConfig;
use cloudbox_core::error::AppError;

use super::claims::{Claims, ServiceClaims};

/// Validates HS256 bearer tokens issued by the identity service.
#[derive(Clone)]
pub struct JwtDecoder {
    /// HMAC secret key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration.
    validation: Validation,
}

impl std::fmt::Debug for JwtDecoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtDecoder")
            .field("validation", &self.validation)
            .finish()
    }
}

impl JwtDecoder {
    /// Creates a new decoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = config.leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
        }
    }

    /// Decodes and validates an access token string.
    ///
    /// Checks the signature and expiry. Whether the subject still exists is
    /// left to the caller.
    pub fn decode_access_token(&self, token: &str) -> Result<Claims, AppError> {
        self.decode_claims(token)
    }

    /// Decodes a service token and requires it to grant `scope`.
    pub fn decode_service_token(&self, token: &str, scope: &str) -> Result<ServiceClaims, AppError> {
        let claims: ServiceClaims = self.decode_claims(token)?;
        if !claims.has_scope(scope) {
            return Err(AppError::authorization(format!(
                "Service token lacks the '{scope}' scope"
            )));
        }
        Ok(claims)
    }

    fn decode_claims<T: DeserializeOwned>(&self, token: &str) -> Result<T, AppError> {
        let token_data =
            decode::<T>(token, &self.decoding_key, &self.validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                        AppError::authentication("Token has expired")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidToken => {
                        AppError::authentication("Invalid token format")
                    }
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        AppError::authentication("Invalid token signature")
                    }
                    _ => AppError::authentication(format!("Token validation failed: {e}")),
                }
            })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jwt::JwtEncoder;
    use crate::jwt::claims::REGISTER_SCOPE;
    use cloudbox_core::error::ErrorKind;
    use cloudbox_entity::user::UserRole;
    use uuid::Uuid;

    fn config(secret: &str) -> AuthConfig {
        AuthConfig {
            jwt_secret: secret.to_string(),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_round_trip_preserves_subject_and_role() {
        let cfg = config("test-secret");
        let user_id = Uuid::new_v4();
        let (token, _) = JwtEncoder::new(&cfg)
            .generate_access_token(user_id, UserRole::Admin)
            .unwrap();

        let claims = JwtDecoder::new(&cfg).decode_access_token(&token).unwrap();
        assert_eq!(claims.user_id(), user_id);
        assert_eq!(claims.role, UserRole::Admin);
        assert!(!claims.is_expired());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let (token, _) = JwtEncoder::new(&config("issuer-secret"))
            .generate_access_token(Uuid::new_v4(), UserRole::User)
            .unwrap();

        let err = JwtDecoder::new(&config("other-secret"))
            .decode_access_token(&token)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let cfg = AuthConfig {
            jwt_secret: "test-secret".to_string(),
            leeway_seconds: 0,
            access_ttl_minutes: -5,
        };
        let (token, _) = JwtEncoder::new(&cfg)
            .generate_access_token(Uuid::new_v4(), UserRole::User)
            .unwrap();

        let err = JwtDecoder::new(&cfg).decode_access_token(&token).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
        assert!(err.message.contains("expired"));
    }

    #[test]
    fn test_service_token_needs_scope() {
        let cfg = config("test-secret");
        let encoder = JwtEncoder::new(&cfg);
        let decoder = JwtDecoder::new(&cfg);

        let (token, _) = encoder
            .generate_service_token("identity", &[REGISTER_SCOPE])
            .unwrap();
        let claims = decoder.decode_service_token(&token, REGISTER_SCOPE).unwrap();
        assert_eq!(claims.sub, "identity");

        let (narrow, _) = encoder.generate_service_token("reports", &["reports:read"]).unwrap();
        let err = decoder.decode_service_token(&narrow, REGISTER_SCOPE).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authorization);
    }

    #[test]
    fn test_user_token_is_not_a_service_token() {
        let cfg = config("test-secret");
        let (token, _) = JwtEncoder::new(&cfg)
            .generate_access_token(Uuid::new_v4(), UserRole::Owner)
            .unwrap();

        let err = JwtDecoder::new(&cfg)
            .decode_service_token(&token, REGISTER_SCOPE)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = JwtDecoder::new(&config("test-secret"))
            .decode_access_token("not-a-jwt")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Authentication);
    }
}
