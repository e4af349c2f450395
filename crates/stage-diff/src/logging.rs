//! Tracing setup for tools embedding stage-sync
//!
//! Events go to stderr so a tool's stdout stays free for diff reports. The
//! default filter keeps dependencies at `warn` and the stage crates at
//! `info`; [`LogOptions::verbose`] lowers the stage crates to `debug`, which
//! shows every resolved rule, tried chunk size and remote call.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Environment variable consulted before `RUST_LOG`.
pub const LOG_ENV: &str = "STAGE_SYNC_LOG";

const STAGE_TARGETS: [&str; 3] = ["stage_fs", "stage_bundle", "stage_diff"];

/// Subscriber settings for [`init_with`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Stage crates log at `debug` instead of `info`.
    pub verbose: bool,
    /// Include source file and line in every event.
    pub with_location: bool,
}

impl LogOptions {
    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    pub fn with_location(mut self) -> Self {
        self.with_location = true;
        self
    }

    /// Filter used when neither [`LOG_ENV`] nor `RUST_LOG` is set.
    pub fn default_directives(&self) -> String {
        let level = if self.verbose { "debug" } else { "info" };
        std::iter::once("warn".to_string())
            .chain(STAGE_TARGETS.iter().map(|target| format!("{target}={level}")))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn env_filter(&self) -> Result<EnvFilter, tracing_subscriber::filter::ParseError> {
        for var in [LOG_ENV, EnvFilter::DEFAULT_ENV] {
            if let Ok(directives) = std::env::var(var)
                && !directives.trim().is_empty()
            {
                return EnvFilter::try_new(directives);
            }
        }
        EnvFilter::try_new(self.default_directives())
    }
}

/// Install the global subscriber with [`LogOptions::default`].
pub fn init() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_with(LogOptions::default())
}

/// Install the global subscriber.
///
/// Fails if the filter directives do not parse or a global subscriber is
/// already installed.
pub fn init_with(options: LogOptions) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_file(options.with_location)
        .with_line_number(options.with_location)
        .compact();

    tracing_subscriber::registry()
        .with(options.env_filter()?)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tracing::{info, warn};

    #[test]
    fn default_filter_quiets_dependencies() {
        assert_eq!(
            LogOptions::default().default_directives(),
            "warn,stage_fs=info,stage_bundle=info,stage_diff=info"
        );
    }

    #[test]
    fn verbose_filter_lowers_stage_crates_only() {
        let directives = LogOptions::default().verbose().default_directives();
        assert_eq!(
            directives,
            "warn,stage_fs=debug,stage_bundle=debug,stage_diff=debug"
        );
        assert!(EnvFilter::try_new(directives).is_ok());
    }

    #[test]
    fn init_is_usable_once_per_process() {
        let first = init();
        let second = init_with(LogOptions::default().with_location());
        // only one global subscriber can win
        assert!(first.is_err() || second.is_err());

        info!(files = 3, "Computed stage diff");
        warn!(path = "app/old.py", "Retained stage file");
    }
}
