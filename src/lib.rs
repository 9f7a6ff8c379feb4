//! tusubtitulo - Subtitle downloader for tusubtitulo.com
//!
//! This library resolves loosely written show names to the site's series ids,
//! lists the subtitles published for a season, and picks the best subtitle
//! for a video file.

mod file_operations;
mod filename;
mod matcher;
mod page_parser;
mod resolver;
mod transport;

use std::path::PathBuf;
use thiserror::Error;

// Re-export error types
pub use file_operations::FileOperationError;
pub use matcher::MatchError;
pub use page_parser::ParseError;
pub use resolver::ResolverError;
pub use transport::{SessionStoreError, TransportError};

pub use file_operations::{PlannedDownload, plan_downloads, subtitle_path, write_subtitle};
pub use filename::{FileInfo, FileKind, FilenameClassifier, ReleaseNameClassifier};
pub use matcher::{SIMILARITY_THRESHOLD, resolve, similarity};
pub use page_parser::{
    LANGUAGE_CODES, SeasonRecord, SeriesIndex, language_code, parse_season_index,
    parse_series_index,
};
pub use resolver::{DEFAULT_BASE_URL, SiteConfig, Subtitle, SubtitleResolver};
pub use transport::{Fetch, FetchResponse, HttpFetcher, Session, SessionStore};

/// Top-level error type for tusubtitulo operations
#[derive(Debug, Error)]
pub enum TuSubtituloError {
    /// Error while resolving subtitles
    #[error(transparent)]
    Resolver(#[from] ResolverError),

    /// Error while writing a subtitle file
    #[error(transparent)]
    FileOperation(#[from] FileOperationError),

    /// Error while loading or storing the session
    #[error("Session store error: {0}")]
    SessionStore(#[from] SessionStoreError),
}

/// Progress event emitted while fetching subtitles for a batch of files
#[derive(Debug)]
pub enum ProgressEvent {
    /// Starting with a video file
    ProcessingFile {
        index: usize,
        total: usize,
        video: PathBuf,
    },

    /// The subtitle file already exists and overwriting is disabled
    AlreadyExists {
        video: PathBuf,
        language: String,
        output: PathBuf,
    },

    /// A subtitle was selected for download
    Selected {
        video: PathBuf,
        subtitle: Subtitle,
        candidates: usize,
    },

    /// A subtitle was written to disk
    Saved {
        video: PathBuf,
        language: String,
        output: PathBuf,
        bytes: usize,
    },

    /// Fetching a subtitle failed
    ///
    /// When `skips_file` is set the remaining languages of this video are
    /// skipped as well, because the same failure would repeat for them.
    Failed {
        video: PathBuf,
        language: String,
        error: TuSubtituloError,
        skips_file: bool,
    },

    /// Batch finished
    Complete(BatchReport),
}

/// Counters describing the outcome of a batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Fetches subtitles for every (video, language) pair
///
/// Each pair writes `<video without extension>.<language>.srt` unless that
/// file already exists and `overwrite` is false. Failures never abort the
/// batch: they are reported through the progress callback and the next pair
/// is processed. Errors that would repeat for every language of a video
/// (unusable filename, unknown series, unparsable page) skip the remaining
/// languages of that video. A video listed twice is processed once.
///
/// # Examples
///
/// ```no_run
/// use tusubtitulo::{HttpFetcher, ProgressEvent, SubtitleResolver, fetch_subtitles};
/// use std::path::PathBuf;
///
/// let mut resolver = SubtitleResolver::new(HttpFetcher::new());
/// let report = fetch_subtitles(
///     &mut resolver,
///     &[PathBuf::from("Lost.S06E02.720p.HDTV.x264-CTU.mkv")],
///     &["es-es".to_string()],
///     false,
///     |event| {
///         if let ProgressEvent::Saved { output, .. } = event {
///             println!("Saved {}", output.display());
///         }
///     },
/// );
/// println!("{} subtitle(s) saved", report.saved);
/// ```
pub fn fetch_subtitles<F, C, P>(
    resolver: &mut SubtitleResolver<F, C>,
    videos: &[PathBuf],
    languages: &[String],
    overwrite: bool,
    mut progress_callback: P,
) -> BatchReport
where
    F: Fetch,
    C: FilenameClassifier,
    P: FnMut(ProgressEvent),
{
    let unique = file_operations::unique_videos(videos);
    let plans = plan_downloads(videos, languages, overwrite);
    let mut report = BatchReport::default();
    let mut current: Option<&PathBuf> = None;
    let mut abandoned: Option<&PathBuf> = None;

    for plan in &plans {
        if current != Some(&plan.video) {
            current = Some(&plan.video);
            let index = unique
                .iter()
                .position(|v| **v == plan.video)
                .unwrap_or_default();
            progress_callback(ProgressEvent::ProcessingFile {
                index,
                total: unique.len(),
                video: plan.video.clone(),
            });
        }

        if abandoned == Some(&plan.video) {
            continue;
        }

        if plan.skip {
            report.skipped += 1;
            progress_callback(ProgressEvent::AlreadyExists {
                video: plan.video.clone(),
                language: plan.language.clone(),
                output: plan.output.clone(),
            });
            continue;
        }

        match fetch_one(resolver, plan, &mut progress_callback) {
            Ok(bytes) => {
                report.saved += 1;
                progress_callback(ProgressEvent::Saved {
                    video: plan.video.clone(),
                    language: plan.language.clone(),
                    output: plan.output.clone(),
                    bytes,
                });
            }
            Err(error) => {
                report.failed += 1;
                let skips_file = matches!(
                    &error,
                    TuSubtituloError::Resolver(e) if e.affects_whole_file()
                );
                if skips_file {
                    abandoned = Some(&plan.video);
                }
                progress_callback(ProgressEvent::Failed {
                    video: plan.video.clone(),
                    language: plan.language.clone(),
                    error,
                    skips_file,
                });
            }
        }
    }

    progress_callback(ProgressEvent::Complete(report));
    report
}

/// Resolves, downloads and writes a single planned subtitle
fn fetch_one<F, C, P>(
    resolver: &mut SubtitleResolver<F, C>,
    plan: &PlannedDownload,
    progress_callback: &mut P,
) -> Result<usize, TuSubtituloError>
where
    F: Fetch,
    C: FilenameClassifier,
    P: FnMut(ProgressEvent),
{
    let video = plan.video.to_string_lossy();
    let mut candidates = resolver.search_from_filename(&video, &plan.language)?;
    let candidate_count = candidates.len();
    let best = candidates.swap_remove(0);

    progress_callback(ProgressEvent::Selected {
        video: plan.video.clone(),
        subtitle: best.clone(),
        candidates: candidate_count,
    });

    let content = resolver.download(&best)?;
    write_subtitle(&plan.output, &content)?;

    Ok(content.len())
}
