//! Page fetching and session state
//!
//! Every network access goes through the [`Fetch`] trait so the resolver can
//! be exercised with canned responses. Session state (request headers and
//! cookies) is modelled as an immutable [`Session`] snapshot: a fetch receives
//! the current snapshot and hands back the next one with its response.

mod http;
mod session_store;

#[cfg(test)]
pub(crate) mod canned;

pub use http::HttpFetcher;
pub use session_store::{SessionStore, SessionStoreError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors that can occur while fetching a page
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or no response was received
    #[error("Request to {url} failed: {source}")]
    RequestFailed { url: String, source: reqwest::Error },

    /// The server answered with something other than 200 OK
    #[error("HTTP {status} while fetching {url}")]
    Status { url: String, status: u16 },

    /// The response body could not be read
    #[error("Failed to read response body from {url}: {source}")]
    BodyFailed { url: String, source: reqwest::Error },
}

/// Request headers sent by default, mimicking a desktop browser
const DEFAULT_HEADERS: &[(&str, &str)] = &[
    (
        "User-Agent",
        "Mozilla/5.0 (Windows NT 10.0; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) \
         Chrome/50.0.2661.102 Safari/537.36",
    ),
    ("Accept-Language", "en, en-gb;q=0.9, en-us;q=0.9"),
    ("Accept-Charset", "utf-8, iso-8859-1;q=0.5"),
    ("Referer", ""),
];

/// Snapshot of the headers and cookies sent with the next request
///
/// Snapshots are never modified in place; the `with_*` methods return a new
/// snapshot. The struct serializes to `{"headers": {...}, "cookies": {...}}`
/// so it can be persisted across runs.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, String>,
}

impl Session {
    /// A fresh session carrying the default browser headers and no cookies
    pub fn browser() -> Self {
        Self {
            headers: DEFAULT_HEADERS
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            cookies: BTreeMap::new(),
        }
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// The `Referer` header of this snapshot, if set and not empty
    pub fn referer(&self) -> Option<&str> {
        self.headers
            .get("Referer")
            .map(String::as_str)
            .filter(|referer| !referer.is_empty())
    }

    /// Returns a copy of this snapshot with `Referer` set to `url`
    pub fn with_referer(&self, url: &str) -> Self {
        let mut next = self.clone();
        next.headers.insert("Referer".to_string(), url.to_string());
        next
    }

    /// Returns a copy of this snapshot with the given cookies added or replaced
    pub fn with_cookies<I, K, V>(&self, cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut next = self.clone();
        next.cookies
            .extend(cookies.into_iter().map(|(k, v)| (k.into(), v.into())));
        next
    }

    /// Value for a `Cookie` request header, or `None` without cookies
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(name, value)| format!("{name}={value}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

/// A successful response together with the session snapshot that follows it
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub session: Session,
}

impl FetchResponse {
    /// Body decoded as UTF-8, replacing invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Capability to fetch a URL using a given session snapshot
///
/// Implementations must fail on any status other than 200 and must return a
/// snapshot whose `Referer` is the fetched URL.
pub trait Fetch {
    fn fetch(&self, url: &str, session: &Session) -> Result<FetchResponse, TransportError>;
}

impl<T: Fetch + ?Sized> Fetch for &T {
    fn fetch(&self, url: &str, session: &Session) -> Result<FetchResponse, TransportError> {
        (**self).fetch(url, session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_browser_session() {
        let session = Session::browser();
        assert!(session.headers()["User-Agent"].starts_with("Mozilla/5.0"));
        assert_eq!(session.referer(), None);
        assert_eq!(session.cookie_header(), None);
    }

    #[test]
    fn test_with_referer_does_not_touch_original() {
        let session = Session::browser();
        let next = session.with_referer("https://example.com/series.php");
        assert_eq!(next.referer(), Some("https://example.com/series.php"));
        assert_eq!(session.referer(), None);
    }

    #[test]
    fn test_cookies_are_merged() {
        let session = Session::default().with_cookies([("a", "1"), ("b", "2")]);
        let next = session.with_cookies([("b", "3")]);
        assert_eq!(next.cookie_header().as_deref(), Some("a=1; b=3"));
        assert_eq!(session.cookie_header().as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn test_session_serialization() {
        let session = Session::browser().with_cookies([("PHPSESSID", "abc")]);
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);

        let partial: Session = serde_json::from_str(r#"{"cookies": {"x": "y"}}"#).unwrap();
        assert!(partial.headers().is_empty());
        assert_eq!(partial.cookie_header().as_deref(), Some("x=y"));
    }
}
