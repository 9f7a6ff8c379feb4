//! Fetcher serving fixed responses, for tests.

use super::{Fetch, FetchResponse, Session, TransportError};
use std::cell::RefCell;
use std::collections::HashMap;

/// A request seen by [`CannedFetcher`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SeenRequest {
    pub url: String,
    pub referer: Option<String>,
    pub cookie: Option<String>,
}

/// Serves registered bodies by URL and answers 404 for anything else.
#[derive(Debug, Default)]
pub(crate) struct CannedFetcher {
    responses: HashMap<String, Vec<u8>>,
    cookie: Option<(String, String)>,
    seen: RefCell<Vec<SeenRequest>>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the body returned for `url`
    pub fn respond(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.responses.insert(url.to_string(), body.into());
        self
    }

    /// Makes every successful response set the given cookie
    pub fn setting_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookie = Some((name.to_string(), value.to_string()));
        self
    }

    /// Requests received so far, in order
    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.borrow().clone()
    }
}

impl Fetch for CannedFetcher {
    fn fetch(&self, url: &str, session: &Session) -> Result<FetchResponse, TransportError> {
        self.seen.borrow_mut().push(SeenRequest {
            url: url.to_string(),
            referer: session.referer().map(str::to_string),
            cookie: session.cookie_header(),
        });

        let body = self
            .responses
            .get(url)
            .cloned()
            .ok_or_else(|| TransportError::Status {
                url: url.to_string(),
                status: 404,
            })?;

        Ok(FetchResponse {
            status: 200,
            body,
            session: session.with_referer(url).with_cookies(self.cookie.clone()),
        })
    }
}
