//! Logging setup for strata.
//!
//! All strata components log through the `tracing` macros. Pool acquisition,
//! dataset compilation, statement preparation and transaction control are
//! logged at `debug`; reaped handles and failed closes at `warn`; rollback
//! failures at `error`. Nothing is printed until a subscriber is installed.
//!
//! # Environment Variables
//!
//! - `STRATA_DEBUG=true|1|yes` - Enable debug logging
//! - `STRATA_LOG_LEVEL=trace|debug|info|warn|error` - Set a specific log level
//! - `STRATA_LOG_FORMAT=json|pretty|compact` - Output format (default: json)
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_query::logging;
//!
//! // Installs a subscriber once; later calls are no-ops.
//! logging::init();
//! ```

use std::env;
use std::sync::Once;

use crate::config::LoggingConfig;

static INIT: Once = Once::new();

const DEBUG_VAR: &str = "STRATA_DEBUG";
const LEVEL_VAR: &str = "STRATA_LOG_LEVEL";
const FORMAT_VAR: &str = "STRATA_LOG_FORMAT";

/// Check if debug logging is enabled via `STRATA_DEBUG`.
#[inline]
pub fn is_debug_enabled() -> bool {
    env::var(DEBUG_VAR)
        .map(|v| parse_flag(&v))
        .unwrap_or(false)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Normalize a level name, falling back to `debug` or `warn` depending on
/// whether debug logging is on.
pub fn normalize_level(level: Option<&str>, debug: bool) -> &'static str {
    let fallback = if debug { "debug" } else { "warn" };
    match level.map(str::to_lowercase).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

/// Normalize a format name. Unknown values select `json`.
pub fn normalize_format(format: Option<&str>) -> &'static str {
    match format.map(str::to_lowercase).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// The log level selected by `STRATA_LOG_LEVEL` and `STRATA_DEBUG`.
pub fn get_log_level() -> &'static str {
    normalize_level(env::var(LEVEL_VAR).ok().as_deref(), is_debug_enabled())
}

/// The log format selected by `STRATA_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    normalize_format(env::var(FORMAT_VAR).ok().as_deref())
}

/// Initialize logging from the environment.
///
/// Does nothing unless `STRATA_DEBUG` or `STRATA_LOG_LEVEL` is set.
pub fn init() {
    if !is_debug_enabled() && env::var(LEVEL_VAR).is_err() {
        return;
    }
    install(get_log_level(), get_log_format());
}

/// Initialize logging from a `[logging]` configuration section.
///
/// Environment variables still take precedence over the file.
pub fn init_with_config(config: &LoggingConfig) {
    let debug = is_debug_enabled() || config.debug;
    let level = env::var(LEVEL_VAR)
        .ok()
        .or_else(|| config.level.clone());
    if !debug && level.is_none() {
        return;
    }
    let format = env::var(FORMAT_VAR).ok().or_else(|| config.format.clone());
    install(
        normalize_level(level.as_deref(), debug),
        normalize_format(format.as_deref()),
    );
}

#[cfg_attr(not(feature = "tracing-subscriber"), allow(unused_variables))]
fn install(level: &'static str, format: &'static str) {
    INIT.call_once(|| {
        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let filter = EnvFilter::try_new(format!("strata={},strata_query={}", level, level))
                .unwrap_or_else(|_| EnvFilter::new("warn"));

            let installed = match format {
                "json" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json())
                    .try_init(),
                "compact" => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().compact())
                    .try_init(),
                _ => tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().pretty())
                    .try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format, "strata logging initialized");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_level() {
        assert_eq!(normalize_level(Some("TRACE"), false), "trace");
        assert_eq!(normalize_level(Some("bogus"), false), "warn");
        assert_eq!(normalize_level(Some("bogus"), true), "debug");
        assert_eq!(normalize_level(None, true), "debug");
        assert_eq!(normalize_level(None, false), "warn");
    }

    #[test]
    fn test_normalize_format() {
        assert_eq!(normalize_format(Some("Pretty")), "pretty");
        assert_eq!(normalize_format(Some("compact")), "compact");
        assert_eq!(normalize_format(Some("xml")), "json");
        assert_eq!(normalize_format(None), "json");
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("yes"));
        assert!(parse_flag("TRUE"));
        assert!(!parse_flag("0"));
    }
}
