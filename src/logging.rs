use std::io;
use std::io::{stderr, IsTerminal};

use tracing::metadata::LevelFilter;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_TRACE_LEVEL: LevelFilter = LevelFilter::WARN;

/// Installs a global subscriber writing to stderr.
///
/// Stdout is reserved for the one result line, everything else goes here.
/// `RUST_LOG=info` shows the outcome histogram of a run.
pub fn init_stderr_tracing(level: Option<LevelFilter>) {
    let level = level.unwrap_or(DEFAULT_TRACE_LEVEL);

    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(stderr().is_terminal())
        .with_target(false)
        .finish()
        .try_init();

    // A subscriber is already there (tests). Keep it.
    if let Err(err) = installed {
        tracing::debug!(%err, "tracing subscriber not installed");
    }
}

#[test]
fn init_twice_is_harmless() {
    init_stderr_tracing(None);
    init_stderr_tracing(Some(LevelFilter::DEBUG));
}
