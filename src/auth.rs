//! Identity tokens carried in the `token` cookie.
//!
//! Tokens are HS256 JWTs issued by the account service (or the `issue-token`
//! command) with `sub`, `role` and `exp` claims.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EcommerceError, Result};

pub const COOKIE_NAME: &str = "token";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role { Customer, Admin }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    secure_cookies: bool,
}

impl SessionKeys {
    pub fn new(secret: impl AsRef<[u8]>, secure_cookies: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_ref()),
            decoding: DecodingKey::from_secret(secret.as_ref()),
            validation,
            secure_cookies,
        }
    }

    pub fn issue(&self, sub: Uuid, role: Role, ttl: Duration) -> jsonwebtoken::errors::Result<String> {
        let claims = Claims { sub, role, exp: (Utc::now() + ttl).timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Checks signature, algorithm and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!(error = %e, "session token rejected");
                EcommerceError::Unauthorized
            })
    }

    /// `Set-Cookie` value for a freshly issued token.
    pub fn session_cookie(&self, token: &str) -> String {
        let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", COOKIE_NAME, token);
        if self.secure_cookies { cookie.push_str("; Secure"); }
        cookie
    }
}

fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    let from_cookie = headers.get_all(header::COOKIE).iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == COOKIE_NAME)
        .map(|(_, value)| value.to_string());
    from_cookie.or_else(|| {
        headers.get(header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ").map(str::to_string)
    })
}

/// Any signed-in user.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Claims);

impl CurrentUser {
    pub fn id(&self) -> Uuid { self.0.sub }
    pub fn is_admin(&self) -> bool { self.0.role == Role::Admin }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let token = token_from_headers(&parts.headers).ok_or(EcommerceError::Unauthorized)?;
        let claims = SessionKeys::from_ref(state).verify(&token)?;
        Ok(Self(claims))
    }
}

/// A signed-in user with the admin role.
#[derive(Clone, Debug)]
pub struct AdminUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    SessionKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() { return Err(EcommerceError::Forbidden); }
        Ok(Self(user.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_issue_and_verify() {
        let keys = SessionKeys::new("secret", false);
        let user = Uuid::now_v7();
        let token = keys.issue(user, Role::Admin, Duration::hours(1)).unwrap();
        assert_eq!(token.split('.').count(), 3);
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_accepts_account_service_jwt() {
        let user = Uuid::now_v7();
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let claims = serde_json::json!({ "sub": user, "role": "customer", "exp": exp, "iat": exp - 3600, "email": "ada@example.com" });
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(b"shared")).unwrap();
        let verified = SessionKeys::new("shared", false).verify(&token).unwrap();
        assert_eq!(verified.sub, user);
        assert_eq!(verified.role, Role::Customer);
    }

    #[test]
    fn test_rejects_tampered_expired_and_foreign_tokens() {
        let keys = SessionKeys::new("secret", false);
        let token = keys.issue(Uuid::now_v7(), Role::Customer, Duration::hours(1)).unwrap();
        let forged = SessionKeys::new("other", false).issue(Uuid::now_v7(), Role::Admin, Duration::hours(1)).unwrap();
        assert!(keys.verify(&forged).is_err());
        let (head, _) = token.rsplit_once('.').unwrap();
        assert!(keys.verify(&format!("{}.AAAA", head)).is_err());
        let expired = keys.issue(Uuid::now_v7(), Role::Customer, Duration::hours(-1)).unwrap();
        assert!(matches!(keys.verify(&expired), Err(EcommerceError::Unauthorized)));
        assert!(keys.verify("nonsense").is_err());
    }

    #[test]
    fn test_rejects_other_algorithms() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let claims = Claims { sub: Uuid::now_v7(), role: Role::Admin, exp };
        let token = encode(&Header::new(Algorithm::HS512), &claims, &EncodingKey::from_secret(b"secret")).unwrap();
        assert!(SessionKeys::new("secret", false).verify(&token).is_err());
    }

    #[test]
    fn test_cookie_flags() {
        assert_eq!(SessionKeys::new("s", false).session_cookie("abc"), "token=abc; Path=/; HttpOnly; SameSite=Strict");
        assert!(SessionKeys::new("s", true).session_cookie("abc").ends_with("; Secure"));
    }

    #[test]
    fn test_token_from_cookie_or_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("theme=dark; token=abc.def"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def"));
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer xyz"));
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
    }
}
