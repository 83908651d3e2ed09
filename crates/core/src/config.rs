//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into
//! core services. The intent is to avoid reading process-wide environment
//! variables during request handling, which can lead to inconsistent
//! behaviour in multi-threaded runtimes and test harnesses.

use crate::appointment::CheckInWindow;
use crate::error::{ReceptionError, ReceptionResult};

/// Default minutes before the scheduled start at which check-in opens.
pub const DEFAULT_OPENS_BEFORE_MIN: i64 = 15;
/// Default minutes after the scheduled start at which check-in closes.
pub const DEFAULT_CLOSES_AFTER_MIN: i64 = 10;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    check_in_window: CheckInWindow,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(check_in_window: CheckInWindow) -> Self {
        Self { check_in_window }
    }

    pub fn check_in_window(&self) -> &CheckInWindow {
        &self.check_in_window
    }
}

/// Parse the check-in window from optional environment values.
///
/// Each value, when present, must be a non-negative whole number of
/// minutes; `None` or empty/whitespace values fall back to the defaults.
pub fn check_in_window_from_env_values(
    opens_before: Option<String>,
    closes_after: Option<String>,
) -> ReceptionResult<CheckInWindow> {
    fn parse_minutes(value: Option<String>, default: i64) -> ReceptionResult<i64> {
        let value = value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        match value {
            None => Ok(default),
            Some(v) => v.parse::<i64>().map_err(|e| {
                ReceptionError::Validation(format!("invalid check-in window minutes '{v}': {e}"))
            }),
        }
    }

    CheckInWindow::from_minutes(
        parse_minutes(opens_before, DEFAULT_OPENS_BEFORE_MIN)?,
        parse_minutes(closes_after, DEFAULT_CLOSES_AFTER_MIN)?,
    )
}
