use axum_extra::extract::cookie::{Cookie, SameSite};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config;

/// Claims carried by the signed session token in the session cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    pub email: String,
    pub tenant_slug: String,
    pub business_name: String,
    pub iat: i64,
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(email: String, tenant_slug: String, business_name: String) -> Self {
        let now = Utc::now();
        let expiry_days = config::config().session.expiry_days;
        Self {
            email,
            tenant_slug,
            business_name,
            iat: now.timestamp(),
            exp: (now + Duration::days(expiry_days)).timestamp(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Session secret not configured")]
    MissingSecret,
    #[error("Invalid or expired session token")]
    InvalidToken,
    #[error("Token generation failed: {0}")]
    TokenGeneration(String),
}

/// Sign session claims into a JWT (HS256).
pub fn generate_session_token(claims: &SessionClaims) -> Result<String, SessionError> {
    let secret = &config::config().session.secret;
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }

    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| SessionError::TokenGeneration(e.to_string()))
}

/// Verify a session token; tampered or expired tokens are rejected.
pub fn verify_session_token(token: &str) -> Result<SessionClaims, SessionError> {
    let secret = &config::config().session.secret;
    if secret.is_empty() {
        return Err(SessionError::MissingSecret);
    }

    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| SessionError::InvalidToken)
}

/// Build the httpOnly session cookie. `Secure` everywhere but development,
/// where the dashboard runs over plain http.
pub fn session_cookie(token: String) -> Cookie<'static> {
    let session = &config::config().session;
    let mut cookie = Cookie::new(session.cookie_name.clone(), token);
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_secure(!crate::is_development!());
    cookie.set_max_age(time::Duration::days(session.expiry_days));
    cookie
}

/// Expired cookie that clears the session.
pub fn clear_session_cookie() -> Cookie<'static> {
    let session = &config::config().session;
    let mut cookie = Cookie::new(session.cookie_name.clone(), "");
    cookie.set_http_only(true);
    cookie.set_same_site(SameSite::Lax);
    cookie.set_path("/");
    cookie.set_secure(!crate::is_development!());
    cookie.set_max_age(time::Duration::seconds(0));
    cookie
}

/// Magic token kind. Login tokens are short-lived; verification tokens get
/// a day so a signup email can sit unread for a while.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MagicTokenType {
    Login,
    Verification,
}

impl MagicTokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MagicTokenType::Login => "login",
            MagicTokenType::Verification => "verification",
        }
    }

    pub fn expiry(&self) -> Duration {
        match self {
            MagicTokenType::Login => Duration::hours(1),
            MagicTokenType::Verification => Duration::hours(24),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "login" => Some(MagicTokenType::Login),
            "verification" => Some(MagicTokenType::Verification),
            _ => None,
        }
    }
}

/// 32 random bytes as lowercase hex. Used for magic tokens and share tokens.
pub fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Magic tokens are stored hashed; a leaked `magic_tokens` table must not
/// be enough to log in.
pub fn hash_magic_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_token_round_trips() {
        let claims = SessionClaims::new(
            "owner@acesgarage.co.uk".into(),
            "aces-garage".into(),
            "Aces Garage".into(),
        );
        let token = generate_session_token(&claims).unwrap();
        let decoded = verify_session_token(&token).unwrap();
        assert_eq!(decoded.email, claims.email);
        assert_eq!(decoded.tenant_slug, "aces-garage");
    }

    #[test]
    fn tampered_token_is_rejected() {
        let claims = SessionClaims::new("a@b.co".into(), "slug".into(), "Biz".into());
        let mut token = generate_session_token(&claims).unwrap();
        token.push('x');
        assert!(verify_session_token(&token).is_err());
    }

    #[test]
    fn random_tokens_are_64_hex_chars() {
        let token = random_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, random_token());
    }

    #[test]
    fn token_hash_is_stable_and_hex() {
        let hash = hash_magic_token("some-token");
        assert_eq!(hash, hash_magic_token("some-token"));
        assert_eq!(hash.len(), 64);
        assert_ne!(hash, hash_magic_token("other-token"));
    }

    #[test]
    fn token_types_parse_and_expire() {
        assert_eq!(MagicTokenType::parse("login"), Some(MagicTokenType::Login));
        assert_eq!(
            MagicTokenType::parse("verification"),
            Some(MagicTokenType::Verification)
        );
        assert_eq!(MagicTokenType::parse("other"), None);
        assert!(MagicTokenType::Login.expiry() < MagicTokenType::Verification.expiry());
    }
}
