//! Signed access and refresh tokens (HS256, zero clock leeway).
//!
//! Every token carries `sub`, a unique `jti`, `iat`, `exp` and a `type`
//! discriminator. Access tokens additionally carry `sid`, the `jti` of the
//! refresh token (session) they were issued under.

use chrono::Utc;
use gatekeep_core::error::AuthError;
use gatekeep_core::types::DbId;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;

/// Discriminates access tokens from refresh tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Optional claims copied into issued tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Session (refresh token `jti`) an access token belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
}

/// JWT claims embedded in every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// Unique token identifier (UUID v4) for revocation and session lookup.
    pub jti: String,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    #[serde(rename = "type")]
    pub token_type: TokenType,
    #[serde(flatten)]
    pub extra: ExtraClaims,
}

impl Claims {
    /// Seconds until expiry, clamped at zero.
    pub fn remaining_secs(&self, now: i64) -> u64 {
        u64::try_from(self.exp - now).unwrap_or(0)
    }
}

/// A freshly issued token together with its decoded claims.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub claims: Claims,
}

/// Access and refresh tokens issued together at login.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedToken,
    pub refresh: IssuedToken,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed token, or wrong token type.
    #[error("Invalid token")]
    Invalid,

    #[error("Token has expired")]
    Expired,

    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Expired => AuthError::ExpiredToken,
            TokenError::Encoding(msg) => AuthError::Internal(msg),
        }
    }
}

/// Whether [`TokenCodec::decode`] rejects expired tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Enforce,
    /// Used at logout so an expired refresh token can still close its session.
    Ignore,
}

/// Issues and verifies tokens with a single shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            access_ttl_secs: config.access_ttl().num_seconds(),
            refresh_ttl_secs: config.refresh_ttl().num_seconds(),
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issue a token of the given type for `subject`.
    pub fn issue(
        &self,
        subject: DbId,
        token_type: TokenType,
        extra: ExtraClaims,
    ) -> Result<IssuedToken, TokenError> {
        self.issue_at(subject, token_type, extra, Utc::now().timestamp())
    }

    /// Issue a refresh token and an access token bound to it.
    ///
    /// `email` and `role` are copied into both tokens.
    pub fn issue_pair(
        &self,
        subject: DbId,
        email: Option<String>,
        role: Option<String>,
    ) -> Result<TokenPair, TokenError> {
        let extra = ExtraClaims {
            email,
            role,
            sid: None,
        };
        let refresh = self.issue(subject, TokenType::Refresh, extra.clone())?;
        let access = self.issue(
            subject,
            TokenType::Access,
            ExtraClaims {
                sid: Some(refresh.claims.jti.clone()),
                ..extra
            },
        )?;
        Ok(TokenPair { access, refresh })
    }

    /// Issue a token with an explicit issued-at time (Unix seconds).
    pub fn issue_at(
        &self,
        subject: DbId,
        token_type: TokenType,
        extra: ExtraClaims,
        issued_at: i64,
    ) -> Result<IssuedToken, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        let claims = Claims {
            sub: subject,
            jti: Uuid::new_v4().to_string(),
            iat: issued_at,
            exp: issued_at + ttl,
            token_type,
            extra,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))?;
        Ok(IssuedToken { token, claims })
    }

    /// Verify the signature (and optionally expiry) and return the claims.
    pub fn decode(&self, token: &str, expiry: Expiry) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = expiry == Expiry::Enforce;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            })
    }

    /// Like [`decode`](Self::decode), but also require a specific token type.
    pub fn decode_as(
        &self,
        token: &str,
        expected: TokenType,
        expiry: Expiry,
    ) -> Result<Claims, TokenError> {
        let claims = self.decode(token, expiry)?;
        if claims.token_type != expected {
            return Err(TokenError::Invalid);
        }
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .finish_non_exhaustive()
    }
}
