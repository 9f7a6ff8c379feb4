//! HTML page parsing for the subtitle site
//!
//! Two page types are understood: the series index, which lists every show
//! with a link to its page, and the season listing, which lists every
//! episode/version/language combination available for a season.
//!
//! All functions in this module are pure: they receive the page text and
//! never touch the network.

mod languages;
mod season_index;
mod series_index;

pub use languages::{LANGUAGE_CODES, language_code};
pub use season_index::{SeasonRecord, parse_season_index};
pub use series_index::{SeriesIndex, parse_series_index};

use scraper::Selector;
use thiserror::Error;

/// Errors that can occur while parsing a page
#[derive(Debug, Error)]
pub enum ParseError {
    /// The series index did not contain a single show link
    #[error("No series links found in series index page")]
    EmptySeriesIndex,

    /// The season page did not contain any recognizable episode block
    #[error("No episode blocks found in season page")]
    NoEpisodes,

    /// A CSS selector could not be compiled
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

/// Compiles a CSS selector, mapping failures into a [`ParseError`]
pub(crate) fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::InvalidSelector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// Visible text of an element with runs of whitespace collapsed
pub(crate) fn element_text(element: &scraper::ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
