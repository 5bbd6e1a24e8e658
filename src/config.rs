//! Process configuration.
//!
//! Everything comes from the environment (optionally seeded from `.env.local`
//! or `.env` by `lib::run`). The only knob today is the dialog timeout.

use std::time::Duration;

/// Env var holding the dialog timeout in seconds.
pub const TIMEOUT_ENV: &str = "MCP_DIALOG_TIMEOUT";

/// Default dialog timeout: 10 minutes.
pub const DEFAULT_TIMEOUT_SECS: i64 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Raw timeout in seconds. `<= 0` means wait indefinitely.
    pub dialog_timeout_secs: i64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dialog_timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    /// Read settings from the process environment.
    pub fn from_env() -> Self {
        let raw = std::env::var(TIMEOUT_ENV).ok();
        Self {
            dialog_timeout_secs: parse_timeout(raw.as_deref()),
        }
    }

    /// The configured timeout as a duration; `None` disables the timer.
    pub fn dialog_timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.dialog_timeout_secs)
    }
}

/// Parse the timeout env value, falling back to the default on garbage.
pub fn parse_timeout(raw: Option<&str>) -> i64 {
    match raw.map(str::trim) {
        None | Some("") => DEFAULT_TIMEOUT_SECS,
        Some(value) => match value.parse::<i64>() {
            Ok(secs) => secs,
            Err(e) => {
                log::warn!(
                    "[STARTUP] Ignoring {}={:?} ({}), using {}s",
                    TIMEOUT_ENV,
                    value,
                    e,
                    DEFAULT_TIMEOUT_SECS
                );
                DEFAULT_TIMEOUT_SECS
            }
        },
    }
}

/// `<= 0` disables the timeout.
pub fn timeout_from_secs(secs: i64) -> Option<Duration> {
    if secs > 0 {
        Some(Duration::from_secs(secs as u64))
    } else {
        None
    }
}
