use chrono::Local;
use facesearch_experiment::persist::FILE_TIMESTAMP;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;

const LINE_TIMESTAMP: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// `2025-03-01 14:02:11,408 - INFO - message`
pub struct LogLineFormat;

impl<S, N> FormatEvent<S, N> for LogLineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        write!(
            writer,
            "{} - {} - ",
            Local::now().format(LINE_TIMESTAMP),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

pub fn log_file_path(data_root: &Path, sub_id: &str, stamp: &str) -> PathBuf {
    data_root
        .join("logs")
        .join(format!("log-subject_{sub_id}_{stamp}.log"))
}

fn subscriber<W>(writer: W, level: Level) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .event_format(LogLineFormat)
        .with_writer(writer)
        .finish()
}

fn open_log(path: &Path) -> io::Result<fs::File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// Installs the global subscriber. Returns the log file in use, or `None`
/// when logging fell back to stderr.
pub fn init(data_root: &Path, sub_id: &str, debug_mode: bool) -> Option<PathBuf> {
    let level = if debug_mode { Level::DEBUG } else { Level::WARN };
    let stamp = Local::now().format(FILE_TIMESTAMP).to_string();
    let path = log_file_path(data_root, sub_id, &stamp);

    let (installed, log_file) = match open_log(&path) {
        Ok(file) => (
            tracing::subscriber::set_global_default(subscriber(Mutex::new(file), level)),
            Some(path),
        ),
        Err(err) => {
            eprintln!(
                "Could not open log file {}: {err}. Logging to stderr.",
                path.display()
            );
            (
                tracing::subscriber::set_global_default(subscriber(io::stderr, level)),
                None,
            )
        }
    };
    if let Err(err) = installed {
        eprintln!("Logging already initialised: {err}");
    }
    log_file
}
