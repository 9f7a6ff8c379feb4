//! Fuzzy show-name matching
//!
//! Resolves a loosely typed show name (usually the title guessed from a video
//! filename) against the display names listed on the series index page.

use thiserror::Error;
use tracing::debug;

/// A candidate is only accepted by similarity when its ratio is strictly above this value.
pub const SIMILARITY_THRESHOLD: f64 = 0.80;

/// Errors that can occur while resolving a show name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchError {
    /// No exact, case-insensitive or similar enough candidate exists
    #[error("Series not found: {0}")]
    SeriesNotFound(String),
}

/// Normalized similarity between two strings, ignoring case
///
/// Returns a value between 0.0 (nothing in common) and 1.0 (equal). The ratio
/// is symmetric and decreases with the edit distance between both inputs.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&a.to_lowercase(), &b.to_lowercase())
}

/// Picks the candidate that best matches `target`
///
/// Strategies are tried in order:
///
/// 1. exact match
/// 2. case-insensitive match (first hit in candidate order)
/// 3. highest [`similarity`] ratio, if above [`SIMILARITY_THRESHOLD`]
///
/// Candidates with equal ratios keep their iteration order, so the result is
/// deterministic as long as the candidates are iterated in a fixed order.
///
/// # Examples
///
/// ```
/// use tusubtitulo::resolve;
///
/// let shows = ["Black Mirror", "Lost", "Mad Men"];
/// assert_eq!(resolve("black-miror", shows), Ok("Black Mirror"));
/// assert!(resolve("Friends", shows).is_err());
/// ```
pub fn resolve<'a, I>(target: &str, candidates: I) -> Result<&'a str, MatchError>
where
    I: IntoIterator<Item = &'a str>,
{
    let candidates: Vec<&'a str> = candidates.into_iter().collect();

    if let Some(exact) = candidates.iter().copied().find(|c| *c == target) {
        debug!(query = target, "exact series match");
        return Ok(exact);
    }

    let lowered = target.to_lowercase();
    if let Some(found) = candidates.iter().copied().find(|c| c.to_lowercase() == lowered) {
        debug!(query = target, candidate = found, "case-insensitive series match");
        return Ok(found);
    }

    let mut ratios: Vec<(&'a str, f64)> = candidates
        .iter()
        .map(|c| (*c, similarity(&lowered, c)))
        .collect();
    ratios.sort_by(|a, b| b.1.total_cmp(&a.1));

    match ratios.first() {
        Some((best, ratio)) if *ratio > SIMILARITY_THRESHOLD => {
            debug!(query = target, candidate = *best, ratio = *ratio, "similar series match");
            Ok(*best)
        }
        best => {
            debug!(query = target, best = ?best, "no series candidate above threshold");
            Err(MatchError::SeriesNotFound(target.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHOWS: &[&str] = &["Black Mirror", "Black Sails", "Lost", "Lost Girl", "Mad Men"];

    #[test]
    fn test_similarity_bounds() {
        assert_eq!(similarity("Lost", "Lost"), 1.0);
        assert_eq!(similarity("LOST", "lost"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("mad man", "Mad Men"), similarity("Mad Men", "mad man"));
        assert!(similarity("black mirror", "black miror") > similarity("black mirror", "blak miror"));
    }

    #[test]
    fn test_exact_match_wins() {
        for show in SHOWS {
            assert_eq!(resolve(show, SHOWS.iter().copied()), Ok(*show));
        }
    }

    #[test]
    fn test_case_insensitive_match() {
        assert_eq!(resolve("LOST", SHOWS.iter().copied()), Ok("Lost"));
        assert_eq!(resolve("black mirror", SHOWS.iter().copied()), Ok("Black Mirror"));
        assert_eq!(resolve("Z NATION", ["z nation"]), Ok("z nation"));
    }

    #[test]
    fn test_case_insensitive_collision_takes_first() {
        assert_eq!(resolve("the office", ["The Office", "THE OFFICE"]), Ok("The Office"));
    }

    #[test]
    fn test_similarity_match() {
        assert_eq!(resolve("black-miror", SHOWS.iter().copied()), Ok("Black Mirror"));
        assert_eq!(resolve("mad man", SHOWS.iter().copied()), Ok("Mad Men"));
    }

    #[test]
    fn test_below_threshold_fails() {
        assert_eq!(
            resolve("Friends", SHOWS.iter().copied()),
            Err(MatchError::SeriesNotFound("Friends".to_string()))
        );
        // "lst grl" vs "lost girl" is exactly 7/9 similar
        assert!(resolve("lst grl", SHOWS.iter().copied()).is_err());
    }

    #[test]
    fn test_empty_candidates_fail() {
        assert!(resolve("Lost", std::iter::empty()).is_err());
    }

    #[test]
    fn test_ties_keep_candidate_order() {
        // both candidates are one edit away from the target
        assert_eq!(resolve("abcdefghij", ["abcdefghiX", "abcdefghiY"]), Ok("abcdefghiX"));
        assert_eq!(resolve("abcdefghij", ["abcdefghiY", "abcdefghiX"]), Ok("abcdefghiY"));
    }
}
