//! Logging setup.
//!
//! All diagnostics go through `tracing`. The sink is chosen with `--log`:
//! `0`/`off`, `1`/`stdout`, `2`/`stderr`, or a file name (appended to).

use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Where log lines are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    Off,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl LogSink {
    /// Parse a `--log` argument.
    pub fn parse(s: &str) -> Self {
        match s {
            "0" | "off" => LogSink::Off,
            "1" | "stdout" => LogSink::Stdout,
            "2" | "stderr" => LogSink::Stderr,
            filename => LogSink::File(PathBuf::from(filename)),
        }
    }

    /// Keep stdout free for the rendered document when it is written there.
    pub fn avoiding_stdout(self, stdout_in_use: bool) -> Self {
        match self {
            LogSink::Stdout if stdout_in_use => LogSink::Stderr,
            other => other,
        }
    }
}

/// Install the global subscriber.
pub fn init(sink: &LogSink, verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    match sink {
        LogSink::Off => {}
        LogSink::Stdout => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogSink::Stderr => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        LogSink::File(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}
