use super::{ParseError, element_text, selector};
use scraper::Html;
use std::collections::BTreeMap;

/// Show display name (as rendered on the site) mapped to its series id.
///
/// Ordered by name so that every lookup over the index iterates the same way.
pub type SeriesIndex = BTreeMap<String, String>;

/// Path prefix of every link pointing to a show page
const SHOW_PATH_PREFIX: &str = "/show/";

/// Parses the series index page into a [`SeriesIndex`]
///
/// Every anchor whose `href` starts with `/show/` contributes one entry: its
/// visible text is the key and the last path segment of the link is the id.
/// Links without visible text (image-only links) are kept under `""`.
///
/// # Errors
///
/// Returns [`ParseError::EmptySeriesIndex`] when no show link is present,
/// which usually means an unrelated or broken page was fetched.
pub fn parse_series_index(html: &str) -> Result<SeriesIndex, ParseError> {
    let document = Html::parse_document(html);
    let show_links = selector(r#"a[href^="/show/"]"#)?;

    let index: SeriesIndex = document
        .select(&show_links)
        .filter_map(|anchor| {
            let href = anchor.value().attr("href")?;
            let id = href
                .strip_prefix(SHOW_PATH_PREFIX)?
                .trim_end_matches('/')
                .rsplit('/')
                .next()?;
            Some((element_text(&anchor), id.to_string()))
        })
        .filter(|(_, id)| !id.is_empty())
        .collect();

    if index.is_empty() {
        return Err(ParseError::EmptySeriesIndex);
    }

    Ok(index)
}
