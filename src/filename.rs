//! Filename classification
//!
//! Extracts title, season and episode hints from a video filename such as
//! `The.Walking.Dead.S01E02.720p.HDTV.x264-LOL.mkv`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Extensions stripped before a filename is classified
const KNOWN_EXTENSIONS: &[&str] = &[
    "avi", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ogm", "ts", "webm", "wmv",
];

/// `S01E02` marker
static SXXEXX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)\bs(\d{1,2})\s?e(\d{1,3})\b").expect("valid SxxEyy pattern")
});

/// `1x02` marker
static NXNN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(.*?)\b(\d{1,2})x(\d{1,3})\b").expect("valid NxNN pattern"));

/// `Season 1 Episode 2` marker
static VERBOSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(.*?)\bseason\s*(\d{1,2})\D*?episode\s*(\d{1,3})\b")
        .expect("valid verbose season pattern")
});

/// Four digit year
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").expect("valid year pattern"));

/// Kind of media a filename describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileKind {
    Episode,
    Movie,
    Unknown,
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FileKind::Episode => "episode",
            FileKind::Movie => "movie",
            FileKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Hints extracted from a filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub kind: FileKind,
    pub title: Option<String>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub year: Option<u32>,
}

/// Trait for anything able to guess what a video file contains
///
/// The resolver only relies on this trait, so alternative classifiers (or
/// canned ones in tests) can be plugged in.
pub trait FilenameClassifier {
    /// Classifies the given path; only the file name part is considered
    fn classify(&self, path: &str) -> FileInfo;
}

/// Classifier for scene-style release names
#[derive(Debug, Clone, Copy, Default)]
pub struct ReleaseNameClassifier;

impl FilenameClassifier for ReleaseNameClassifier {
    fn classify(&self, path: &str) -> FileInfo {
        let cleaned = normalize(&strip_extension(path));
        let year = YEAR_RE
            .captures(&cleaned)
            .and_then(|caps| caps[1].parse().ok());

        let marker = [&*SXXEXX_RE, &*NXNN_RE, &*VERBOSE_RE]
            .into_iter()
            .find_map(|re| re.captures(&cleaned));

        let info = match marker {
            Some(caps) => FileInfo {
                kind: FileKind::Episode,
                title: clean_title(&caps[1]),
                season: caps[2].parse().ok(),
                episode: caps[3].parse().ok(),
                year,
            },
            None => match YEAR_RE.find(&cleaned) {
                Some(found) => FileInfo {
                    kind: FileKind::Movie,
                    title: clean_title(&cleaned[..found.start()]),
                    season: None,
                    episode: None,
                    year,
                },
                None => FileInfo {
                    kind: FileKind::Unknown,
                    title: clean_title(&cleaned),
                    season: None,
                    episode: None,
                    year,
                },
            },
        };

        debug!(
            path,
            kind = %info.kind,
            title = ?info.title,
            season = ?info.season,
            episode = ?info.episode,
            "classified filename"
        );

        info
    }
}

/// File name part of a path, without a known video extension
fn strip_extension(path: &str) -> String {
    let path = Path::new(path);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match path.extension().map(|e| e.to_string_lossy().to_lowercase()) {
        Some(ext) if KNOWN_EXTENSIONS.contains(&ext.as_str()) => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name),
        _ => name,
    }
}

/// Turns separators into spaces and collapses whitespace
fn normalize(name: &str) -> String {
    name.replace(['.', '_'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trims separators and a trailing year or bracketed tag from a title
fn clean_title(raw: &str) -> Option<String> {
    let mut title = raw.trim_matches(|c: char| c.is_whitespace() || c == '-' || c == '[');
    if let Some(found) = YEAR_RE.find_iter(title).last() {
        // a title made of nothing but a year ("1923") is the title itself
        if found.start() > 0
            && title[found.end()..]
                .trim_matches(|c: char| !c.is_alphanumeric())
                .is_empty()
        {
            title = &title[..found.start()];
        }
    }
    let title = title
        .trim_end_matches(|c: char| c.is_whitespace() || "-([".contains(c))
        .trim();

    (!title.is_empty()).then(|| title.to_string())
}
