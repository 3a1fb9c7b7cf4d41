//! meta-sniffer CLI
//!
//! Tallies the authors of the PDF documents posted to a channel.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use meta_sniffer::report::render_report;
use meta_sniffer::utils::{parse_date, validate_date_window};
use meta_sniffer::{Config, Error, Event, MetaSniffer, OutputFormat, cancel_on_signal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, format};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, fmt};

/// Author statistics for the PDF documents of a channel.
///
/// Downloads every PDF attachment posted in the channel (optionally within a
/// date window), reads the author from its metadata with exiftool and prints
/// how many documents each author wrote. Credentials are read from
/// TELEGRAM_API_ID and TELEGRAM_API_HASH (a `.env` file is honored).
///
/// ## Examples
///
///   meta-sniffer some_channel
///
///   meta-sniffer some_channel --after 2024-01-01 --before 2024-07-01 --details
#[derive(Parser, Debug)]
#[command(name = "meta-sniffer")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Channel username or identifier
    channel: String,

    /// Only messages strictly before this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    before: Option<String>,

    /// Only messages strictly after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    after: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: FormatArg,

    /// Also print one row per retained file
    #[arg(long)]
    details: bool,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Do not draw the extraction progress bar
    #[arg(long)]
    no_progress: bool,

    /// Scoped download directory (emptied after every run)
    #[arg(long, env = "META_SNIFFER_DOWNLOAD_DIR")]
    download_dir: Option<PathBuf>,

    /// Path to the exiftool binary
    #[arg(long, env = "EXIFTOOL_PATH")]
    exiftool: Option<PathBuf>,
}

/// Output format argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    /// Bordered text tables
    Table,
    /// Pretty-printed JSON report
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Table => OutputFormat::Table,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Log level argument.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

/// `time - target - level - message` lines, prefixed by the active spans
struct LogFormat;

impl<S, N> FormatEvent<S, N> for LogFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let meta = event.metadata();
        write!(
            writer,
            "{} - {} - {} - ",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            meta.target(),
            meta.level()
        )?;
        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}: ", span.name())?;
            }
        }
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Initialize logging to stderr so stdout only carries the result.
///
/// `RUST_LOG` takes precedence over the command line level.
fn init_logging(level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .event_format(LogFormat)
        .init();
}

fn make_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {pos}/{len} files inspected {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_draw_target(ProgressDrawTarget::stderr_with_hz(12));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        args.log_level.into()
    };
    init_logging(level);

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Ok(ExitCode::FAILURE);
        }
    };
    if let Some(dir) = args.download_dir.clone() {
        config.storage.download_dir = dir;
    }
    if let Some(path) = args.exiftool.clone() {
        config.tools.exiftool_path = Some(path);
    }

    let before = args.before.as_deref().map(parse_date).transpose()?;
    let after = args.after.as_deref().map(parse_date).transpose()?;
    validate_date_window(before, after)?;

    let sniffer = MetaSniffer::from_config(config).context("failed to set up the pipeline")?;
    let progress = (!args.no_progress).then(make_progress_bar);
    spawn_event_listener(&sniffer, progress.clone(), level >= Level::DEBUG);
    let signal_watcher = cancel_on_signal(sniffer.cancel_token());

    let result = sniffer
        .run_with_report(&args.channel, before, after)
        .await;
    signal_watcher.abort();
    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(Error::Cancelled) => {
            tracing::warn!("analysis cancelled");
            return Ok(ExitCode::from(130));
        }
        Err(e) => {
            tracing::error!(error = %e, "analysis failed");
            return Ok(ExitCode::FAILURE);
        }
    };

    let rendered = render_report(&report, args.format.into(), args.details)?;
    println!("{}", rendered.trim_end());
    Ok(ExitCode::SUCCESS)
}

/// Drive the progress bar from pipeline events, logging them at debug level
/// if asked to
fn spawn_event_listener(sniffer: &MetaSniffer, progress: Option<ProgressBar>, log_events: bool) {
    if progress.is_none() && !log_events {
        return;
    }
    let mut events = sniffer.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let Some(pb) = &progress {
                match &event {
                    Event::FetchStarted { channel } => {
                        pb.set_message(format!("scanning {channel}"));
                    }
                    Event::FetchComplete { files, .. } => {
                        pb.set_length(*files as u64);
                        pb.set_message(String::new());
                    }
                    Event::MetadataExtracted {
                        done,
                        total,
                        author,
                    } => {
                        pb.set_length(*total as u64);
                        pb.set_position(*done as u64);
                        if let Some(author) = author {
                            pb.set_message(author.clone());
                        }
                    }
                    _ => {}
                }
            }
            if log_events {
                match event {
                    Event::MetadataExtracted { done, total, .. } => {
                        tracing::debug!(done, total, "metadata progress");
                    }
                    other => tracing::debug!(event = ?other, "event"),
                }
            }
        }
    });
}
