//! Signed cookie sessions.
//!
//! The whole session lives client-side in the `session` cookie as
//! `base64url(json).base64url(hmac_sha256(json))`. A cookie that fails to
//! decode or verify is ignored and the request proceeds with an empty
//! session.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponseParts, ResponseParts},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::convert::Infallible;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::common::AppState;

pub const COOKIE_NAME: &str = "session";

/// A one-shot message shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Flash {
    /// `success`, `info`, `warning` or `danger`
    pub category: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flashes: Vec<Flash>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csrf_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

pub struct SessionKey {
    mac: Hmac<Sha256>,
    secure: bool,
}

impl SessionKey {
    #[must_use]
    pub fn new(secret: &[u8], secure: bool) -> Self {
        // HMAC accepts keys of any length
        let mac = Hmac::<Sha256>::new_from_slice(secret)
            .unwrap_or_else(|_| unreachable!("HMAC-SHA256 takes keys of any size"));
        Self { mac, secure }
    }

    /// Serialize and sign session data into a cookie value.
    #[must_use]
    pub fn sign(&self, data: &SessionData) -> String {
        let json = serde_json::to_vec(data).unwrap_or_default();
        let mut mac = self.mac.clone();
        mac.update(&json);
        let signature = mac.finalize().into_bytes();

        format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(&json),
            URL_SAFE_NO_PAD.encode(signature)
        )
    }

    /// Verify a cookie value and decode its session data.
    #[must_use]
    pub fn verify(&self, value: &str) -> Option<SessionData> {
        let (payload, signature) = value.rsplit_once('.')?;
        let json = URL_SAFE_NO_PAD.decode(payload).ok()?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

        let mut mac = self.mac.clone();
        mac.update(&json);
        mac.verify_slice(&signature).ok()?;

        serde_json::from_slice(&json).ok()
    }

    fn set_cookie_header(&self, data: &SessionData) -> String {
        let mut cookie = format!(
            "{COOKIE_NAME}={}; Path=/; HttpOnly; SameSite=Lax",
            self.sign(data)
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(k, _)| *k == name)
        .map(|(_, v)| v)
}

/// Per-request session handle.
///
/// Extract it in a handler, mutate it, and return it alongside the response
/// so changes are written back as a `Set-Cookie` header.
pub struct Session {
    data: SessionData,
    key: Arc<SessionKey>,
    dirty: bool,
}

impl Session {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap, key: Arc<SessionKey>) -> Self {
        let data = cookie_value(headers, COOKIE_NAME)
            .and_then(|value| key.verify(value))
            .unwrap_or_default();

        Self {
            data,
            key,
            dirty: false,
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<i64> {
        self.data.user_id
    }

    pub fn set_user_id(&mut self, user_id: Option<i64>) {
        if self.data.user_id != user_id {
            self.data.user_id = user_id;
            self.dirty = true;
        }
    }

    pub fn flash(&mut self, category: &str, message: impl Into<String>) {
        self.data.flashes.push(Flash {
            category: category.to_string(),
            message: message.into(),
        });
        self.dirty = true;
    }

    /// Drain queued flash messages.
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        if self.data.flashes.is_empty() {
            return Vec::new();
        }
        self.dirty = true;
        std::mem::take(&mut self.data.flashes)
    }

    /// CSRF token for forms, created on first use.
    pub fn csrf_token(&mut self) -> String {
        if let Some(token) = &self.data.csrf_token {
            return token.clone();
        }
        let token = uuid::Uuid::new_v4().simple().to_string();
        self.data.csrf_token = Some(token.clone());
        self.dirty = true;
        token
    }

    #[must_use]
    pub fn csrf_matches(&self, submitted: &str) -> bool {
        self.data
            .csrf_token
            .as_deref()
            .is_some_and(|token| !token.is_empty() && token == submitted)
    }

    pub fn set_next(&mut self, next: Option<String>) {
        if self.data.next != next {
            self.data.next = next;
            self.dirty = true;
        }
    }

    pub fn take_next(&mut self) -> Option<String> {
        let next = self.data.next.take();
        if next.is_some() {
            self.dirty = true;
        }
        next
    }

    #[must_use]
    pub const fn data(&self) -> &SessionData {
        &self.data
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers, state.session_key.clone()))
    }
}

impl IntoResponseParts for Session {
    type Error = Infallible;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if self.dirty {
            match HeaderValue::from_str(&self.key.set_cookie_header(&self.data)) {
                Ok(value) => {
                    res.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, "Failed to encode session cookie"),
            }
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Arc<SessionKey> {
        Arc::new(SessionKey::new(b"test-secret-key-0123456789", false))
    }

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("theme=dark; {COOKIE_NAME}={value}")).unwrap(),
        );
        headers
    }

    #[test]
    fn signed_data_round_trips_through_cookie_header() {
        let key = key();
        let data = SessionData {
            user_id: Some(22_202),
            flashes: vec![Flash {
                category: "success".to_string(),
                message: "hi".to_string(),
            }],
            csrf_token: None,
            next: Some("/users/1/".to_string()),
        };

        let session = Session::from_headers(&headers_with_cookie(&key.sign(&data)), key);
        assert_eq!(session.data(), &data);
    }

    #[test]
    fn tampered_or_foreign_cookies_are_ignored() {
        let key = key();
        let signed = key.sign(&SessionData {
            user_id: Some(1),
            ..SessionData::default()
        });

        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"user_id":2}"#);
        let (_, signature) = signed.rsplit_once('.').unwrap();
        let forged = format!("{forged_payload}.{signature}");
        let session = Session::from_headers(&headers_with_cookie(&forged), key.clone());
        assert_eq!(session.user_id(), None);

        let other_key = SessionKey::new(b"some-other-secret-key", false);
        let foreign = other_key.sign(&SessionData {
            user_id: Some(1),
            ..SessionData::default()
        });
        let session = Session::from_headers(&headers_with_cookie(&foreign), key.clone());
        assert_eq!(session.user_id(), None);

        let session = Session::from_headers(&headers_with_cookie("garbage"), key);
        assert_eq!(session.user_id(), None);
    }

    #[test]
    fn flashes_drain_once() {
        let mut session = Session::from_headers(&HeaderMap::new(), key());
        session.flash("danger", "User 7 not found.");
        session.flash("info", "second");

        let flashes = session.take_flashes();
        assert_eq!(flashes.len(), 2);
        assert_eq!(flashes[0].message, "User 7 not found.");
        assert!(session.take_flashes().is_empty());
    }

    #[test]
    fn csrf_token_is_stable_and_checked() {
        let mut session = Session::from_headers(&HeaderMap::new(), key());
        assert!(!session.csrf_matches(""));

        let token = session.csrf_token();
        assert_eq!(session.csrf_token(), token);
        assert!(session.csrf_matches(&token));
        assert!(!session.csrf_matches("nope"));
    }

    #[test]
    fn untouched_session_writes_no_cookie() {
        let session = Session::from_headers(&HeaderMap::new(), key());
        assert!(!session.dirty);

        let mut session = Session::from_headers(&HeaderMap::new(), key());
        session.set_user_id(Some(5));
        assert!(session.dirty);
    }
}
