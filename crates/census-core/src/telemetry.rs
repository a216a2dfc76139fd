//! Log output for the census binary.
//!
//! Everything a run reports about itself goes through `tracing`: lifecycle
//! events from [`crate::obs`], per-listing `warn!`s from the walker, circuit
//! and backoff messages from the invoker, and the invoker stats flushed at the
//! end of a run. With `--json` each of those becomes one object per line, so
//! `event = "run.finished"` and friends can be picked out by a log shipper.
//!
//! `RUST_LOG` wins over the CLI verbosity, e.g.
//! `RUST_LOG=census_core::invoker=debug` to watch pacing decisions only.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Default verbosity for the CLI: `-v` shows pacing and cache decisions.
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

/// Install the process-wide subscriber, writing to stderr.
///
/// stdout carries the run summary, so logs stay off it. Only the first call
/// in a process takes effect; later ones are ignored.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(layer.json()).try_init().ok();
    } else {
        registry.with(layer).try_init().ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_flag_selects_debug() {
        assert_eq!(level_for(true), Level::DEBUG);
        assert_eq!(level_for(false), Level::INFO);
    }

    #[test]
    fn test_second_init_is_ignored() {
        init_tracing(false, Level::WARN);
        init_tracing(true, Level::DEBUG);
        crate::obs::emit_report_delivered("memory", 0, true);
    }
}
