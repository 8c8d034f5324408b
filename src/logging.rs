//! Logging configuration for askdb.
//!
//! Logs go to stderr and, when the configured log file can be opened, to that
//! file as well. Interactive sessions share stdout with the user, so file
//! logging keeps the transcript readable.

use std::fs::OpenOptions;
use std::path::Path;

use tracing_subscriber::EnvFilter;

/// Initializes logging to stderr.
///
/// Used by one-shot commands where interleaving with stdout output is fine.
pub fn init_stderr_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Initializes logging to the given file, falling back to stderr.
///
/// The file is appended to across runs. Failure to open the file is reported
/// but never fatal.
pub fn init_file_logging(path: &Path) {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Warning: could not create log directory: {e}");
                init_stderr_logging();
                return;
            }
        }
    }

    let log_file = match OpenOptions::new().create(true).append(true).open(path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: could not open log file {}: {e}", path.display());
            init_stderr_logging();
            return;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(log_file)
        .with_ansi(false) // No ANSI colors in file output
        .init();
}
