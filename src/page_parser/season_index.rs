//! Season listing parser
//!
//! The season page is a flat run of table cells, not a tree grouped by
//! episode. Grouping is rebuilt by walking the cells in document order and
//! carrying the current episode and version forward:
//!
//! - a cell spanning 5 columns starts a new episode
//! - a cell spanning 3 columns starts a new version (`Versión 720p ...`)
//! - a `td.language` cell is one language row; the next cell holds the
//!   completion status and the one after that the download link
//!
//! Older pages used a different markup where every episode lives in its own
//! table, introduced by an `/episodes/<id>/<slug>-<season>x<episode>` link.
//! That layout is still understood as a fallback when no 5-column episode
//! header is present.

use super::{ParseError, element_text, language_code, selector};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tracing::{debug, trace};

/// Status text (lower-cased) of a finished translation
const COMPLETED_MARKER: &str = "completado";

/// Episode link in the current layout: `.../<season>/<episode>/<show_id>/`
static EPISODE_HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/(\d+)/(\d+)/(\d+)/?$").expect("valid episode href pattern"));

/// `NxM` marker inside an episode title
static EPISODE_TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)x(\d+)").expect("valid episode title pattern"));

/// Episode link in the legacy layout
static LEGACY_EPISODE_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/episodes/\d+/.+?-\d+x(\d+)").expect("valid legacy episode pattern")
});

/// Version header row in the legacy layout
static LEGACY_VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)versi[oó]n(.*)").expect("valid legacy version pattern"));

/// One downloadable (episode, version, language) combination from a season page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonRecord {
    /// Episode number, when the episode header exposes it
    pub episode: Option<u32>,
    /// Episode title as shown in the episode header
    pub title: Option<String>,
    /// Release version the subtitle was synced for (e.g. `720p CTRLHD`)
    pub version: String,
    /// Normalized language code (e.g. `es-es`)
    pub language: String,
    /// Download link
    pub url: String,
}

/// Parses a season listing page into its records, in document order
///
/// Rows whose translation is not completed, rows without a download link and
/// rows in a language missing from the language table are dropped.
///
/// # Errors
///
/// Returns [`ParseError::NoEpisodes`] if the page contains no episode block in
/// either the current or the legacy layout.
pub fn parse_season_index(html: &str) -> Result<Vec<SeasonRecord>, ParseError> {
    let document = Html::parse_document(html);

    if let Some(records) = parse_cell_layout(&document)? {
        return Ok(records);
    }

    if let Some(records) = parse_legacy_layout(&document)? {
        debug!(records = records.len(), "parsed season page using legacy layout");
        return Ok(records);
    }

    Err(ParseError::NoEpisodes)
}

/// Parses the current layout, returning `None` if it has no episode headers
fn parse_cell_layout(document: &Html) -> Result<Option<Vec<SeasonRecord>>, ParseError> {
    let cells = selector("td")?;
    let anchors = selector("a")?;

    let mut records = Vec::new();
    let mut headers = 0usize;
    let mut episode: Option<u32> = None;
    let mut title: Option<String> = None;
    let mut version: Option<String> = None;

    for cell in document.select(&cells) {
        match cell.value().attr("colspan").map(str::trim) {
            Some("5") => {
                headers += 1;
                let text = element_text(&cell);
                episode = cell
                    .select(&anchors)
                    .filter_map(|a| a.value().attr("href"))
                    .find_map(episode_from_href)
                    .or_else(|| episode_from_title(&text));
                title = Some(text).filter(|t| !t.is_empty());
                trace!(episode = ?episode, title = ?title, "episode header");
                continue;
            }
            Some("3") => {
                version = Some(version_label(&element_text(&cell)));
                continue;
            }
            _ => {}
        }

        if !cell.value().classes().any(|class| class == "language") {
            continue;
        }

        let label = element_text(&cell);
        let mut following = cell
            .next_siblings()
            .filter_map(ElementRef::wrap)
            .filter(|sibling| sibling.value().name() == "td");

        let status = following
            .next()
            .map(|status| element_text(&status).to_lowercase())
            .unwrap_or_default();
        if status != COMPLETED_MARKER {
            debug!(
                episode = ?episode,
                language = %label,
                status = %status,
                "skipping unfinished subtitle"
            );
            continue;
        }

        let Some(href) = following
            .next()
            .and_then(|link_cell| link_cell.select(&anchors).next())
            .and_then(|anchor| anchor.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
        else {
            debug!(
                episode = ?episode,
                language = %label,
                "skipping subtitle without download link"
            );
            continue;
        };

        let Some(code) = language_code(&label) else {
            debug!(episode = ?episode, language = %label, "skipping unknown language");
            continue;
        };

        records.push(SeasonRecord {
            episode,
            title: title.clone(),
            version: version.clone().unwrap_or_default(),
            language: code.to_string(),
            url: with_protocol(href),
        });
    }

    if headers == 0 {
        return Ok(None);
    }

    debug!(episodes = headers, records = records.len(), "parsed season page");
    Ok(Some(records))
}

/// Parses the legacy one-table-per-episode layout
fn parse_legacy_layout(document: &Html) -> Result<Option<Vec<SeasonRecord>>, ParseError> {
    let episode_links = selector(r#"a[href*="/episodes/"]"#)?;
    let rows = selector("tr")?;
    let language_cells = selector("td.language")?;
    let anchors = selector("a")?;

    let mut blocks: Vec<(u32, String, ElementRef<'_>)> = Vec::new();
    for link in document.select(&episode_links) {
        let Some(number) = link
            .value()
            .attr("href")
            .and_then(|href| LEGACY_EPISODE_HREF_RE.captures(href))
            .and_then(|caps| caps[1].parse::<u32>().ok())
        else {
            continue;
        };

        let Some(table) = link
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "table")
        else {
            continue;
        };

        if blocks.iter().any(|(_, _, known)| known.id() == table.id()) {
            continue;
        }
        blocks.push((number, element_text(&link), table));
    }

    if blocks.is_empty() {
        return Ok(None);
    }

    let mut records = Vec::new();
    for (number, title, table) in blocks {
        let mut untitled = 0usize;
        let mut version: Option<String> = None;

        for row in table.select(&rows) {
            let text = element_text(&row);
            if let Some(caps) = LEGACY_VERSION_RE.captures(&text) {
                let label = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
                version = Some(if label.is_empty() {
                    let auto = format!("ver-{untitled}");
                    untitled += 1;
                    auto
                } else {
                    label.to_string()
                });
            }

            let Some(language) = row.select(&language_cells).next() else {
                continue;
            };
            let label = element_text(&language);
            let Some(code) = language_code(&label) else {
                debug!(episode = number, language = %label, "skipping unknown language");
                continue;
            };
            let Some(href) = row
                .select(&anchors)
                .filter_map(|a| a.value().attr("href"))
                .map(str::trim)
                .find(|href| !href.is_empty())
            else {
                continue;
            };

            records.push(SeasonRecord {
                episode: Some(number),
                title: Some(title.clone()).filter(|t| !t.is_empty()),
                version: version.clone().unwrap_or_default(),
                language: code.to_string(),
                url: with_protocol(href),
            });
        }
    }

    Ok(Some(records))
}

/// Extracts the episode number from a `.../<season>/<episode>/<show_id>/` link
fn episode_from_href(href: &str) -> Option<u32> {
    EPISODE_HREF_RE
        .captures(href)
        .and_then(|caps| caps[2].parse().ok())
}

/// Extracts the episode number from the last `NxM` marker of a title
fn episode_from_title(title: &str) -> Option<u32> {
    EPISODE_TITLE_RE
        .captures_iter(title)
        .last()
        .and_then(|caps| caps[2].parse().ok())
}

/// Strips the leading word of a version header (`Versión 720p` -> `720p`)
///
/// A single-word header is kept as is.
fn version_label(header: &str) -> String {
    let header = header.trim();
    header
        .split_once(' ')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_else(|| header.to_string())
}

/// Adds the protocol to scheme-relative links (`//host/path`)
fn with_protocol(href: &str) -> String {
    if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    }
}
