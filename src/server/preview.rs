//! Preview session cookie
//!
//! Entering preview stores the draft ref in a signed cookie; every later
//! request carrying a valid cookie reads content at that ref. Tampered or
//! foreign cookies are ignored.

use axum::http::{header, HeaderMap};
use cookie::{time::Duration, Cookie, CookieJar, Key, SameSite};

/// Minimum secret length accepted by [`Key::from`]
const MIN_SECRET_LEN: usize = 64;

pub struct PreviewSession {
    key: Key,
    cookie_name: String,
}

impl PreviewSession {
    /// Sign with `secret`, or with a random key when it is absent or too short
    pub fn new(secret: Option<&str>, cookie_name: &str) -> Self {
        let key = match secret {
            Some(secret) if secret.len() >= MIN_SECRET_LEN => Key::from(secret.as_bytes()),
            Some(_) => {
                tracing::warn!(
                    "Preview secret shorter than {} bytes, using a random key",
                    MIN_SECRET_LEN
                );
                Key::generate()
            }
            None => Key::generate(),
        };

        Self {
            key,
            cookie_name: cookie_name.to_string(),
        }
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Signed cookie holding `reference`
    pub fn start(&self, reference: &str) -> Cookie<'static> {
        let cookie = Cookie::build((self.cookie_name.clone(), reference.to_string()))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(cookie);
        jar.delta()
            .next()
            .cloned()
            .unwrap_or_else(|| Cookie::new(self.cookie_name.clone(), String::new()))
    }

    /// Expired cookie that ends the session
    pub fn clear(&self) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), ""))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(Duration::ZERO)
            .build()
    }

    /// The ref of a valid session carried by the request, if any
    pub fn read(&self, headers: &HeaderMap) -> Option<String> {
        let mut jar = CookieJar::new();
        for value in headers.get_all(header::COOKIE) {
            let Ok(value) = value.to_str() else {
                continue;
            };
            for cookie in Cookie::split_parse_encoded(value).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }

        jar.signed(&self.key)
            .get(&self.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .filter(|reference| !reference.is_empty())
    }
}
