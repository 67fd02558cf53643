//! Process-wide log output.
//!
//! Applications call [`init`] once at startup. Everything else logs through `tracing` and the
//! per-application span owned by [`App`](crate::App), so nothing here has to be passed around.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Everything down to `TRACE`, human-readable.
    Development,
    /// Errors only, one line per event.
    Production,
}

impl LogMode {
    pub fn level(self) -> Level {
        match self {
            LogMode::Development => Level::TRACE,
            LogMode::Production => Level::ERROR,
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` takes precedence over the mode's level.
///
/// Fails if a global subscriber is already installed.
pub fn init(mode: LogMode) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(mode.level().as_str()));

    match mode {
        LogMode::Development => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_target(true))
            .try_init(),
        LogMode::Production => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().compact().with_ansi(false))
            .try_init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_fails() {
        // the first call may already have lost the race against another test
        let _ = init(LogMode::Production);
        assert!(init(LogMode::Development).is_err());
    }

    #[test]
    fn modes_map_to_levels() {
        assert_eq!(LogMode::Development.level(), Level::TRACE);
        assert_eq!(LogMode::Production.level(), Level::ERROR);
    }
}
