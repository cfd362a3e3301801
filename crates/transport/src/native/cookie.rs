//! A minimal host scoped cookie jar.
//!
//! Cookies are captured from `Set-Cookie` response headers and sent back in a
//! single `Cookie` header to the same host, honouring the `Path` attribute and
//! `Max-Age` removal. Domain widening is not supported, cookies stay host-only.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use http::header::SET_COOKIE;
use http::{HeaderMap, HeaderValue, Uri};
use tracing::{trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    name: String,
    value: String,
    path: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into(), path: "/".to_string() }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn matches_path(&self, request_path: &str) -> bool {
        request_path == self.path
            || (request_path.starts_with(&self.path)
                && (self.path.ends_with('/') || request_path[self.path.len()..].starts_with('/')))
    }
}

/// Parses one `Set-Cookie` header value. Returns the cookie and whether it asks for removal.
fn parse_set_cookie(value: &str) -> Option<(Cookie, bool)> {
    let mut attributes = value.split(';');
    let (name, value) = attributes.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie::new(name, value.trim().trim_matches('"'));
    let mut expired = false;
    for attribute in attributes {
        let (key, value) = attribute.split_once('=').unwrap_or((attribute, ""));
        let key = key.trim();
        if key.eq_ignore_ascii_case("path") && value.trim().starts_with('/') {
            cookie.path = value.trim().to_string();
        } else if key.eq_ignore_ascii_case("max-age") {
            expired = value.trim().parse::<i64>().is_ok_and(|max_age| max_age <= 0);
        }
    }
    Some((cookie, expired))
}

/// Shared cookie storage, cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct CookieContainer {
    inner: Arc<Mutex<HashMap<String, Vec<Cookie>>>>,
}

impl CookieContainer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Cookie>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a cookie for `host`, replacing one with the same name and path.
    pub fn add(&self, host: &str, cookie: Cookie) {
        let mut jar = self.lock();
        let cookies = jar.entry(host.to_ascii_lowercase()).or_default();
        cookies.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        cookies.push(cookie);
    }

    fn remove(&self, host: &str, cookie: &Cookie) {
        if let Some(cookies) = self.lock().get_mut(&host.to_ascii_lowercase()) {
            cookies.retain(|c| !(c.name == cookie.name && c.path == cookie.path));
        }
    }

    /// Captures every `Set-Cookie` header of a response received from `uri`.
    pub fn set_cookies(&self, uri: &Uri, headers: &HeaderMap) {
        let Some(host) = uri.host() else {
            return;
        };

        for value in headers.get_all(SET_COOKIE) {
            let Some((cookie, expired)) = value.to_str().ok().and_then(parse_set_cookie) else {
                warn!(host, "ignore malformed set-cookie header");
                continue;
            };

            trace!(host, name = cookie.name(), expired, "capture cookie");
            if expired {
                self.remove(host, &cookie);
            } else {
                self.add(host, cookie);
            }
        }
    }

    /// Cookies that apply to a request for `uri`.
    pub fn cookies(&self, uri: &Uri) -> Vec<Cookie> {
        let Some(host) = uri.host() else {
            return Vec::new();
        };

        self.lock()
            .get(&host.to_ascii_lowercase())
            .map(|cookies| cookies.iter().filter(|c| c.matches_path(uri.path())).cloned().collect())
            .unwrap_or_default()
    }

    /// The `Cookie` header value for a request to `uri`, if any cookie applies.
    pub fn cookie_header(&self, uri: &Uri) -> Option<HeaderValue> {
        let cookies = self.cookies(uri);
        if cookies.is_empty() {
            return None;
        }

        let value = cookies.iter().map(|c| format!("{}={}", c.name, c.value)).collect::<Vec<_>>().join("; ");
        HeaderValue::from_str(&value).ok()
    }

    /// Number of cookies stored over all hosts.
    pub fn count(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }
}
