//! Diagnostics for the board and the CLI.
//!
//! Log lines always go to stderr, so `--format json` output stays parseable.
//! Quiet and normal runs get short lines (level and message). Verbose runs
//! add timestamps, targets and source locations.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// How much the CLI logs, picked by `-q` / `-v` / `-vv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Warnings and errors.
    #[default]
    Normal,
    /// Store calls, fetches and guard decisions.
    Verbose,
    /// Everything.
    Trace,
}

impl Verbosity {
    /// Most verbose level emitted for this crate.
    #[must_use]
    pub fn level(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::ERROR,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }

    fn detailed(self) -> bool {
        matches!(self, Self::Verbose | Self::Trace)
    }
}

/// Filter directives for `verbosity`: this crate at its level, every
/// dependency held at warnings.
fn directives(verbosity: Verbosity) -> String {
    let dependencies = verbosity.level().min(LevelFilter::WARN);
    format!("{dependencies},fortnightly={}", verbosity.level())
}

/// Build the filter from an explicit directive string, falling back to the
/// verbosity default when it is unset, blank or does not parse.
fn filter_for(verbosity: Verbosity, overrides: Option<&str>) -> EnvFilter {
    if let Some(raw) = overrides.map(str::trim).filter(|raw| !raw.is_empty()) {
        match EnvFilter::try_new(raw) {
            Ok(filter) => return filter,
            Err(e) => eprintln!("ignoring {}={raw:?}: {e}", EnvFilter::DEFAULT_ENV),
        }
    }
    EnvFilter::new(directives(verbosity))
}

/// Install the global subscriber. `RUST_LOG` replaces the verbosity default.
///
/// Calling this again is harmless; only the first call installs anything.
///
/// ```no_run
/// use fortnightly::{init_logging, logging::Verbosity};
///
/// init_logging(Verbosity::Verbose);
/// ```
pub fn init_logging(verbosity: Verbosity) {
    let overrides = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = filter_for(verbosity, overrides.as_deref());

    let detailed = verbosity.detailed().then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_ids(verbosity == Verbosity::Trace)
            .with_file(true)
            .with_line_number(true)
    });
    let terse = (!verbosity.detailed()).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .compact()
    });

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(detailed)
        .with(terse)
        .try_init();
}

/// Warnings and above, captured by the test harness.
#[cfg(test)]
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use tracing_subscriber::{Layer, Registry};

    use super::*;

    fn max_level(filter: &EnvFilter) -> Option<LevelFilter> {
        Layer::<Registry>::max_level_hint(filter)
    }

    #[test]
    fn test_levels() {
        assert_eq!(Verbosity::Quiet.level(), LevelFilter::ERROR);
        assert_eq!(Verbosity::default().level(), LevelFilter::WARN);
        assert_eq!(Verbosity::Verbose.level(), LevelFilter::DEBUG);
        assert_eq!(Verbosity::Trace.level(), LevelFilter::TRACE);
    }

    #[test]
    fn test_directives_hold_dependencies_at_warn() {
        assert_eq!(directives(Verbosity::Quiet), "error,fortnightly=error");
        assert_eq!(directives(Verbosity::Normal), "warn,fortnightly=warn");
        assert_eq!(directives(Verbosity::Trace), "warn,fortnightly=trace");
    }

    #[test]
    fn test_filter_defaults_to_verbosity() {
        let filter = filter_for(Verbosity::Verbose, None);
        assert_eq!(max_level(&filter), Some(LevelFilter::DEBUG));

        let blank = filter_for(Verbosity::Quiet, Some("  "));
        assert_eq!(max_level(&blank), Some(LevelFilter::ERROR));
    }

    #[test]
    fn test_filter_override_wins() {
        let filter = filter_for(Verbosity::Quiet, Some("fortnightly::board=trace"));
        assert_eq!(max_level(&filter), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_unparseable_override_falls_back() {
        let filter = filter_for(Verbosity::Normal, Some("fortnightly=loud"));
        assert_eq!(max_level(&filter), Some(LevelFilter::WARN));
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging(Verbosity::Trace);
        init_logging(Verbosity::Quiet);
    }
}
