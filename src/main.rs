use clap::{ArgAction, Parser};
use humansize::{DECIMAL, format_size};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tusubtitulo::{
    DEFAULT_BASE_URL, HttpFetcher, ProgressEvent, SessionStore, SiteConfig, SubtitleResolver,
    fetch_subtitles,
};

/// Log levels selectable with -v/-q, from quietest to loudest
const LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Index into LOG_LEVELS used without -v/-q
const DEFAULT_LOG_LEVEL: usize = 1;

/// Download subtitles from tusubtitulo.com for video files
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Language code to download (en-us, es-es, es-lat, es-ca, es-gl, pt-br); repeatable
    #[arg(short, long = "language", required = true, value_name = "CODE")]
    languages: Vec<String>,

    /// Overwrite existing subtitle files
    #[arg(short, long)]
    force: bool,

    /// Increase log verbosity; repeatable
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease log verbosity; repeatable, offsets -v
    #[arg(short, long, action = ArgAction::Count)]
    quiet: u8,

    /// Root URL of the subtitle site
    #[arg(long, default_value = DEFAULT_BASE_URL, value_name = "URL")]
    base_url: String,

    /// File used to persist cookies and headers between runs
    #[arg(long, value_name = "PATH")]
    session_file: Option<PathBuf>,

    /// Neither load nor store session state
    #[arg(long, conflicts_with = "session_file")]
    no_session: bool,

    /// Video files to fetch subtitles for
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

impl Cli {
    fn log_level(&self) -> &'static str {
        let level = (DEFAULT_LOG_LEVEL + self.verbose as usize)
            .saturating_sub(self.quiet as usize)
            .min(LOG_LEVELS.len() - 1);
        LOG_LEVELS[level]
    }
}

/// Sets up tracing output on stderr; `RUST_LOG` takes precedence over -v/-q
fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("tusubtitulo={default_level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Opens the session store requested on the command line
fn session_store(cli: &Cli) -> Option<SessionStore> {
    if cli.no_session {
        return None;
    }

    match &cli.session_file {
        Some(path) => Some(SessionStore::at(path)),
        None => match SessionStore::open_default() {
            Ok(store) => Some(store),
            Err(e) => {
                warn!("Session state disabled: {}", e);
                None
            }
        },
    }
}

/// Handles progress events and reports them through the log
fn handle_progress_event(event: ProgressEvent) {
    match event {
        ProgressEvent::ProcessingFile {
            index,
            total,
            video,
        } => {
            info!("[{}/{}] Processing: {}", index + 1, total, video.display());
        }
        ProgressEvent::AlreadyExists {
            video,
            language,
            output,
        } => {
            error!(
                "{}: Destination '{}' for {} already exists, skip",
                video.display(),
                output.display(),
                language
            );
        }
        ProgressEvent::Selected {
            subtitle,
            candidates,
            ..
        } => {
            info!(
                "  {} {}x{:02} [{}] version '{}' ({} candidate(s))",
                subtitle.series,
                subtitle.season,
                subtitle.number.unwrap_or_default(),
                subtitle.language,
                subtitle.version,
                candidates
            );
        }
        ProgressEvent::Saved {
            video,
            language,
            output,
            bytes,
        } => {
            info!(
                "{}: subtitles for {} saved to {} ({})",
                video.display(),
                language,
                output.display(),
                format_size(bytes, DECIMAL)
            );
        }
        ProgressEvent::Failed {
            video,
            language,
            error,
            skips_file,
        } => {
            if skips_file {
                error!("{}: {}", video.display(), error);
            } else {
                error!("{}: {} ({})", video.display(), error, language);
            }
        }
        ProgressEvent::Complete(report) => {
            info!(
                "Done: {} saved, {} skipped, {} failed",
                report.saved, report.skipped, report.failed
            );
        }
    }
}

fn main() {
    let mut cli = Cli::parse();
    init_logging(cli.log_level());

    cli.languages = cli.languages.iter().map(|l| l.to_lowercase()).collect();

    let store = session_store(&cli);
    let session = match store.as_ref().map(|s| s.load()) {
        Some(Ok(session)) => session,
        Some(Err(e)) => {
            warn!("Ignoring saved session: {}", e);
            None
        }
        None => None,
    };

    let mut resolver =
        SubtitleResolver::new(HttpFetcher::new()).with_site(SiteConfig::new(&cli.base_url));
    if let Some(session) = session {
        resolver = resolver.with_session(session);
    }

    let report = fetch_subtitles(
        &mut resolver,
        &cli.files,
        &cli.languages,
        cli.force,
        handle_progress_event,
    );

    if let Some(store) = &store {
        if let Err(e) = store.store(resolver.session()) {
            warn!("Failed to save session: {}", e);
        }
    }

    if report.saved == 0 && report.failed > 0 {
        process::exit(1);
    }
}
