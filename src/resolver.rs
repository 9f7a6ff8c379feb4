//! Subtitle resolution
//!
//! Ties the fuzzy matcher, the page parsers and an injected [`Fetch`]
//! capability together: a show name is resolved to a series id, a series id
//! and season to the list of available subtitles, and a video filename to
//! the best matching subtitle for a language.

use crate::filename::{FileKind, FilenameClassifier, ReleaseNameClassifier};
use crate::matcher::{MatchError, resolve, similarity};
use crate::page_parser::{ParseError, SeasonRecord, parse_season_index, parse_series_index};
use crate::transport::{Fetch, FetchResponse, Session, TransportError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Root of the subtitle site
pub const DEFAULT_BASE_URL: &str = "https://www.tusubtitulo.com";

/// Errors that can occur while resolving subtitles
#[derive(Debug, Error)]
pub enum ResolverError {
    /// No show on the series index matches the requested name
    #[error("Series not found: {0}")]
    SeriesNotFound(String),

    /// A page did not have the expected structure
    #[error("Failed to parse page: {0}")]
    Parse(#[from] ParseError),

    /// The filename does not describe a single episode
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// The season has no subtitle matching the filters
    #[error("No subtitles found for {series} season {season} episode {episode} in {language}")]
    NoSubtitlesFound {
        series: String,
        season: u32,
        episode: u32,
        language: String,
    },

    /// Fetching a page failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

impl From<MatchError> for ResolverError {
    fn from(error: MatchError) -> Self {
        match error {
            MatchError::SeriesNotFound(name) => ResolverError::SeriesNotFound(name),
        }
    }
}

impl ResolverError {
    /// Whether the error would repeat for every language of the same file
    pub fn affects_whole_file(&self) -> bool {
        matches!(
            self,
            ResolverError::InvalidFilename(_)
                | ResolverError::SeriesNotFound(_)
                | ResolverError::Parse(_)
        )
    }
}

/// Location of the subtitle site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    pub base_url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl SiteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// URL of the page listing every show
    pub fn series_index_url(&self) -> String {
        format!("{}/series.php", self.root())
    }

    /// URL of the page listing the subtitles of one season
    pub fn season_url(&self, series_id: &str, season: u32) -> String {
        format!(
            "{}/ajax_loadShow.php?show={}&season={}",
            self.root(),
            series_id,
            season
        )
    }

    /// Resolves a link found on a page against the site root
    fn absolute_url(&self, href: &str) -> String {
        Url::parse(self.root())
            .and_then(|base| base.join(href))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string())
    }
}

/// A downloadable subtitle for one episode, version and language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subtitle {
    /// Series name as requested by the caller
    pub series: String,
    pub series_id: String,
    pub season: u32,
    /// Episode number, when the season page exposes it
    pub number: Option<u32>,
    pub version: String,
    pub language: String,
    pub url: String,
}

/// Resolves show names, seasons and filenames to subtitles
///
/// The resolver owns the current [`Session`] snapshot and replaces it with the
/// one returned by every successful fetch. Callers wanting to persist session
/// state read it back with [`SubtitleResolver::session`].
pub struct SubtitleResolver<F, C = ReleaseNameClassifier> {
    fetcher: F,
    classifier: C,
    site: SiteConfig,
    session: Session,
}

impl<F> SubtitleResolver<F>
where
    F: Fetch,
{
    /// Creates a resolver for the default site with a fresh browser session
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            classifier: ReleaseNameClassifier,
            site: SiteConfig::default(),
            session: Session::browser(),
        }
    }
}

impl<F, C> SubtitleResolver<F, C>
where
    F: Fetch,
    C: FilenameClassifier,
{
    /// Replaces the filename classifier
    pub fn with_classifier<D: FilenameClassifier>(self, classifier: D) -> SubtitleResolver<F, D> {
        SubtitleResolver {
            fetcher: self.fetcher,
            classifier,
            site: self.site,
            session: self.session,
        }
    }

    /// Points the resolver to another site root
    pub fn with_site(self, site: SiteConfig) -> Self {
        Self { site, ..self }
    }

    /// Continues from a previously saved session
    pub fn with_session(self, session: Session) -> Self {
        Self { session, ..self }
    }

    /// The session snapshot that will be used for the next request
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn site(&self) -> &SiteConfig {
        &self.site
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Resolves a show name to its series id
    ///
    /// # Errors
    ///
    /// [`ResolverError::SeriesNotFound`] if no show matches exactly, ignoring
    /// case, or by similarity.
    pub fn get_series_id(&mut self, name: &str) -> Result<String, ResolverError> {
        let url = self.site.series_index_url();
        let page = self.request(&url)?.text();
        let index = parse_series_index(&page)?;

        let found = resolve(name, index.keys().map(String::as_str))?;
        let id = index[found].clone();
        info!(query = name, series = found, series_id = %id, "resolved series");

        Ok(id)
    }

    /// Fetches and parses the subtitle listing of one season
    pub fn get_season_info(
        &mut self,
        series_id: &str,
        season: u32,
    ) -> Result<Vec<SeasonRecord>, ResolverError> {
        let url = self.site.season_url(series_id, season);
        let page = self.request(&url)?.text();
        let records = parse_season_index(&page)?;
        debug!(series_id, season, records = records.len(), "loaded season");

        Ok(records)
    }

    /// Lists the subtitles of a season, optionally narrowed to one episode and language
    ///
    /// Results keep the order of the season page.
    pub fn search(
        &mut self,
        series: &str,
        season: u32,
        episode: Option<u32>,
        language: Option<&str>,
    ) -> Result<Vec<Subtitle>, ResolverError> {
        let series_id = self.get_series_id(series)?;
        let records = self.get_season_info(&series_id, season)?;

        let subtitles: Vec<Subtitle> = records
            .into_iter()
            .filter(|record| episode.is_none_or(|wanted| record.episode == Some(wanted)))
            .filter(|record| language.is_none_or(|wanted| record.language == wanted))
            .map(|record| Subtitle {
                series: series.to_string(),
                series_id: series_id.clone(),
                season,
                number: record.episode,
                version: record.version,
                language: record.language,
                url: self.site.absolute_url(&record.url),
            })
            .collect();

        debug!(
            series,
            season,
            episode = ?episode,
            language = ?language,
            found = subtitles.len(),
            "search finished"
        );
        Ok(subtitles)
    }

    /// Finds subtitles for a video file in the given language
    ///
    /// The filename is classified first; anything that is not an episode with
    /// title, season and episode number is rejected before any request is
    /// made. Candidates are ranked by how similar their version label is to
    /// the file name (without directories), best first.
    ///
    /// # Errors
    ///
    /// - [`ResolverError::InvalidFilename`] if the filename is not a usable episode
    /// - [`ResolverError::NoSubtitlesFound`] if nothing matches the episode and language
    pub fn search_from_filename(
        &mut self,
        path: &str,
        language: &str,
    ) -> Result<Vec<Subtitle>, ResolverError> {
        let info = self.classifier.classify(path);

        if info.kind != FileKind::Episode {
            return Err(ResolverError::InvalidFilename(format!(
                "detected file type is '{}', expected 'episode'",
                info.kind
            )));
        }
        let (Some(title), Some(season), Some(episode)) = (info.title, info.season, info.episode)
        else {
            return Err(ResolverError::InvalidFilename(
                "missing title, season or episode".to_string(),
            ));
        };

        let subtitles = self.search(&title, season, Some(episode), Some(language))?;
        if subtitles.is_empty() {
            return Err(ResolverError::NoSubtitlesFound {
                series: title,
                season,
                episode,
                language: language.to_string(),
            });
        }

        let file_name = Path::new(path)
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_else(|| path.into());
        let mut ranked: Vec<(f64, Subtitle)> = subtitles
            .into_iter()
            .map(|subtitle| (similarity(&subtitle.version, &file_name), subtitle))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(ranked.into_iter().map(|(_, subtitle)| subtitle).collect())
    }

    /// Downloads the subtitle file
    ///
    /// The season page is sent as referer, as a browser following the
    /// download link from that page would.
    pub fn download(&mut self, subtitle: &Subtitle) -> Result<Vec<u8>, ResolverError> {
        let referer = self.site.season_url(&subtitle.series_id, subtitle.season);
        self.session = self.session.with_referer(&referer);

        let response = self.request(&subtitle.url)?;
        info!(url = %subtitle.url, bytes = response.body.len(), "downloaded subtitle");

        Ok(response.body)
    }

    /// Fetches `url` and moves on to the session snapshot returned with it
    fn request(&mut self, url: &str) -> Result<FetchResponse, TransportError> {
        let response = self.fetcher.fetch(url, &self.session)?;
        self.session = response.session.clone();
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filename::FileInfo;
    use crate::transport::canned::CannedFetcher;

    const SERIES_INDEX: &str = include_str!("../tests/fixtures/series-index.html");
    const SEASON_PAGE: &str = include_str!("../tests/fixtures/season-90-6.html");

    const INDEX_URL: &str = "https://www.tusubtitulo.com/series.php";
    const SEASON_URL: &str = "https://www.tusubtitulo.com/ajax_loadShow.php?show=90&season=6";

    fn fetcher() -> CannedFetcher {
        CannedFetcher::new()
            .respond(INDEX_URL, SERIES_INDEX)
            .respond(SEASON_URL, SEASON_PAGE)
    }

    #[test]
    fn test_get_series_id() {
        let mut resolver = SubtitleResolver::new(fetcher());
        assert_eq!(resolver.get_series_id("Black Mirror").unwrap(), "1168");
        assert_eq!(resolver.get_series_id("black mirror").unwrap(), "1168");
        assert_eq!(resolver.get_series_id("black-miror").unwrap(), "1168");
        assert_eq!(resolver.get_series_id("z nation").unwrap(), "2201");
        assert_eq!(resolver.get_series_id("Hawaii Five 0").unwrap(), "695");
        assert_eq!(resolver.get_series_id("mad man").unwrap(), "79");
    }

    #[test]
    fn test_unknown_series() {
        let mut resolver = SubtitleResolver::new(fetcher());
        assert!(matches!(
            resolver.get_series_id("Completely Unknown"),
            Err(ResolverError::SeriesNotFound(_))
        ));
    }

    #[test]
    fn test_get_season_info() {
        let mut resolver = SubtitleResolver::new(fetcher());
        let records = resolver.get_season_info("90", 6).unwrap();
        assert_eq!(records.len(), 168);
        assert_eq!(records.iter().filter(|r| r.episode == Some(2)).count(), 13);
    }

    #[test]
    fn test_search_filters_keep_page_order() {
        let mut resolver = SubtitleResolver::new(fetcher());
        let all = resolver.search("Lost", 6, None, None).unwrap();
        assert_eq!(all.len(), 168);

        let episode = resolver.search("Lost", 6, Some(2), None).unwrap();
        assert_eq!(episode.len(), 13);
        assert!(episode.iter().all(|s| s.number == Some(2) && s.series_id == "90"));

        let spanish = resolver.search("Lost", 6, Some(2), Some("es-es")).unwrap();
        let versions: Vec<&str> = spanish.iter().map(|s| s.version.as_str()).collect();
        assert_eq!(versions, vec!["720p CTRLHD", "LOL", "1080p WEB-DL"]);

        assert!(resolver.search("Lost", 6, Some(2), Some("fr-fr")).unwrap().is_empty());
    }

    #[test]
    fn test_search_is_idempotent() {
        let mut resolver = SubtitleResolver::new(fetcher());
        let first = resolver.search("lost", 6, Some(5), Some("en-us")).unwrap();
        let second = resolver.search("lost", 6, Some(5), Some("en-us")).unwrap();
        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_search_from_filename() {
        let mut resolver = SubtitleResolver::new(fetcher());
        let subtitles = resolver.search_from_filename("lost.s06e02.mkv", "es-es").unwrap();

        assert_eq!(subtitles.len(), 3);
        assert_eq!(
            subtitles[0],
            Subtitle {
                series: "lost".to_string(),
                series_id: "90".to_string(),
                season: 6,
                number: Some(2),
                version: "LOL".to_string(),
                language: "es-es".to_string(),
                url: "https://www.tusubtitulo.com/updated/5/40002/1".to_string(),
            }
        );
    }

    #[test]
    fn test_search_from_filename_without_subtitles() {
        let mut resolver = SubtitleResolver::new(fetcher());
        assert!(matches!(
            resolver.search_from_filename("lost.s06e02.mkv", "fr-fr"),
            Err(ResolverError::NoSubtitlesFound { episode: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_filename_fails_before_fetching() {
        let mut resolver = SubtitleResolver::new(fetcher());
        let error = resolver
            .search_from_filename("holiday-video.mp4", "es-es")
            .unwrap_err();
        assert!(matches!(error, ResolverError::InvalidFilename(_)));
        assert!(error.affects_whole_file());
        assert!(resolver.fetcher().seen().is_empty());
    }

    struct IncompleteClassifier;

    impl FilenameClassifier for IncompleteClassifier {
        fn classify(&self, _path: &str) -> FileInfo {
            FileInfo {
                kind: FileKind::Episode,
                title: Some("Lost".to_string()),
                season: Some(6),
                episode: None,
                year: None,
            }
        }
    }

    #[test]
    fn test_classifier_missing_fields() {
        let mut resolver = SubtitleResolver::new(fetcher()).with_classifier(IncompleteClassifier);
        assert!(matches!(
            resolver.search_from_filename("whatever.mkv", "es-es"),
            Err(ResolverError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_referer_and_cookies_are_threaded() {
        let subtitle_url = "https://www.tusubtitulo.com/updated/5/40002/1";
        let fetcher = fetcher()
            .respond(subtitle_url, "1\n00:00:01,000 --> 00:00:02,000\nHola\n")
            .setting_cookie("PHPSESSID", "canned");
        let mut resolver = SubtitleResolver::new(fetcher);

        let best = resolver
            .search_from_filename("lost.s06e02.mkv", "es-es")
            .unwrap()
            .remove(0);
        let body = resolver.download(&best).unwrap();
        assert!(body.starts_with(b"1\n00:00:01,000"));

        let seen = resolver.fetcher().seen();
        let urls: Vec<&str> = seen.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec![INDEX_URL, SEASON_URL, subtitle_url]);
        assert_eq!(seen[0].referer, None);
        assert_eq!(seen[0].cookie, None);
        assert_eq!(seen[1].referer.as_deref(), Some(INDEX_URL));
        assert_eq!(seen[1].cookie.as_deref(), Some("PHPSESSID=canned"));
        assert_eq!(seen[2].referer.as_deref(), Some(SEASON_URL));

        assert_eq!(resolver.session().referer(), Some(subtitle_url));
    }

    #[test]
    fn test_saved_session_is_used() {
        let session = Session::browser().with_cookies([("PHPSESSID", "saved")]);
        let mut resolver = SubtitleResolver::new(fetcher()).with_session(session);
        resolver.get_series_id("Lost").unwrap();
        assert_eq!(
            resolver.fetcher().seen()[0].cookie.as_deref(),
            Some("PHPSESSID=saved")
        );
    }

    #[test]
    fn test_transport_errors_propagate() {
        let mut resolver = SubtitleResolver::new(CannedFetcher::new());
        assert!(matches!(
            resolver.get_series_id("Lost"),
            Err(ResolverError::Transport(TransportError::Status { status: 404, .. }))
        ));
    }

    #[test]
    fn test_site_urls() {
        let site = SiteConfig::new("http://localhost:8080/");
        assert_eq!(site.series_index_url(), "http://localhost:8080/series.php");
        assert_eq!(
            site.season_url("1168", 5),
            "http://localhost:8080/ajax_loadShow.php?show=1168&season=5"
        );
        assert_eq!(
            site.absolute_url("/updated/5/1/0"),
            "http://localhost:8080/updated/5/1/0"
        );
        assert_eq!(
            site.absolute_url("https://www.tusubtitulo.com/updated/5/1/0"),
            "https://www.tusubtitulo.com/updated/5/1/0"
        );
    }
}
