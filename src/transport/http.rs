//! HTTP implementation of the [`Fetch`] capability.

use super::{Fetch, FetchResponse, Session, TransportError};
use reqwest::StatusCode;
use reqwest::header::{COOKIE, SET_COOKIE};
use tracing::debug;

/// Fetches pages over HTTP(S) with a blocking reqwest client.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Creates a new fetcher with a default client.
    pub fn new() -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Creates a fetcher around an already configured client.
    pub fn with_client(client: reqwest::blocking::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str, session: &Session) -> Result<FetchResponse, TransportError> {
        let mut request = self.client.get(url);
        for (name, value) in session.headers().iter().filter(|(_, v)| !v.is_empty()) {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = session.cookie_header() {
            request = request.header(COOKIE, cookie);
        }

        let response = request
            .send()
            .map_err(|e| TransportError::RequestFailed {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        // Collect cookies before the body consumes the response
        let cookies: Vec<(String, String)> = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();

        let body = response
            .bytes()
            .map_err(|e| TransportError::BodyFailed {
                url: url.to_string(),
                source: e,
            })?
            .to_vec();

        debug!(
            url,
            status = status.as_u16(),
            bytes = body.len(),
            cookies = cookies.len(),
            "fetched"
        );

        Ok(FetchResponse {
            status: status.as_u16(),
            body,
            session: session.with_referer(url).with_cookies(cookies),
        })
    }
}

/// Extracts the name/value pair of a `Set-Cookie` header, ignoring attributes
fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), value.trim().to_string()))
}
