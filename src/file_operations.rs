use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while writing subtitle files
#[derive(Debug, Error)]
pub enum FileOperationError {
    #[error("Failed to write subtitle file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },
}

/// One subtitle file to fetch for a video in a language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDownload {
    /// Video file the subtitle belongs to
    pub video: PathBuf,
    /// Language code requested
    pub language: String,
    /// Where the subtitle will be written
    pub output: PathBuf,
    /// The output already exists and overwriting was not requested
    pub skip: bool,
}

/// Path of the subtitle file for a video and language
///
/// The last extension of the video is replaced by `<language>.srt`:
/// `lost.s06e02.mkv` becomes `lost.s06e02.es-es.srt`. A video without an
/// extension gets the suffix appended.
pub fn subtitle_path(video: &Path, language: &str) -> PathBuf {
    video.with_extension(format!("{language}.srt"))
}

/// Videos in their first-seen order, with repeated paths removed
pub(crate) fn unique_videos(videos: &[PathBuf]) -> Vec<&PathBuf> {
    let mut seen = HashSet::new();
    videos.iter().filter(|video| seen.insert(*video)).collect()
}

/// Plans one download per (video, language) pair, video by video
///
/// A video listed more than once is planned only once.
pub fn plan_downloads(
    videos: &[PathBuf],
    languages: &[String],
    overwrite: bool,
) -> Vec<PlannedDownload> {
    unique_videos(videos)
        .into_iter()
        .flat_map(|video| {
            languages.iter().map(move |language| {
                let output = subtitle_path(video, language);
                let skip = !overwrite && output.exists();
                PlannedDownload {
                    video: video.clone(),
                    language: language.clone(),
                    output,
                    skip,
                }
            })
        })
        .collect()
}

/// Writes a subtitle file
///
/// Content goes to a temporary file next to the target first and is then
/// renamed into place, so an interrupted write never leaves a truncated
/// subtitle behind.
pub fn write_subtitle(output: &Path, content: &[u8]) -> Result<(), FileOperationError> {
    let temp_path = output.with_extension("srt.tmp");

    fs::write(&temp_path, content).map_err(|e| FileOperationError::WriteFailed {
        path: temp_path.clone(),
        source: e,
    })?;

    fs::rename(&temp_path, output).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        FileOperationError::WriteFailed {
            path: output.to_path_buf(),
            source: e,
        }
    })?;

    Ok(())
}
