//! Diagnostic logging. Not to be confused with the per-day results of a run, which are written by
//! [`crate::report`].
//!
//! The five `log` macros are re-exported from here. The engine uses them as follows:
//!
//!  - `info!`: batch and run lifecycle (batch directory created, run finished)
//!  - `debug!`: one summary line per simulated day
//!  - `trace!`: detail inside a day-step (agents detached, contacts traced, ...)
//!
//! Nothing is logged until a level is set, either with `--log-level <level>` on the command line
//! or from code:
//!
//! ```rust
//! use sirqis::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! // Batch progress everywhere, plus every contact-tracing decision.
//! set_log_level(LevelFilter::Info);
//! set_module_filter("sirqis::general_population", LevelFilter::Trace);
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex, MutexGuard};

#[cfg(feature = "logging")]
use log4rs::Handle;

use crate::error::SimError;

static LOG_SETTINGS: LazyLock<Mutex<LogSettings>> = LazyLock::new(Mutex::default);

/// The process-wide logger state: a root level, per-module overrides keyed by module path
/// (e.g. `"sirqis::quarantine"`), and the handle of the installed backend.
#[derive(Debug)]
pub(in crate::log) struct LogSettings {
    pub(in crate::log) root_level: LevelFilter,
    pub(in crate::log) module_levels: BTreeMap<String, LevelFilter>,

    #[cfg(feature = "logging")]
    handle: Option<Handle>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            root_level: LevelFilter::Off,
            module_levels: BTreeMap::new(),

            #[cfg(feature = "logging")]
            handle: None,
        }
    }
}

impl LogSettings {
    /// Records `level` for `module`. Returns false if nothing changed.
    fn put_module_level(&mut self, module: &str, level: LevelFilter) -> bool {
        self.module_levels.insert(module.to_string(), level) != Some(level)
    }
}

fn settings() -> MutexGuard<'static, LogSettings> {
    LOG_SETTINGS
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Logs everything. Same as `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Logs nothing. Same as `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the level applied to every module without its own filter.
pub fn set_log_level(level: LevelFilter) {
    let mut settings = settings();
    settings.root_level = level;
    settings.apply();
}

/// Sets the level for messages whose target starts with `module_path`.
pub fn set_module_filter(module_path: &str, level: LevelFilter) {
    let mut settings = settings();
    if settings.put_module_level(module_path, level) {
        settings.apply();
    }
}

/// Sets several module filters at once, reconfiguring the backend only once.
pub fn set_module_filters<S: ToString>(module_filters: &[(&S, LevelFilter)]) {
    let mut settings = settings();
    let mut changed = false;
    for (module, level) in module_filters {
        changed |= settings.put_module_level(&module.to_string(), *level);
    }
    if changed {
        settings.apply();
    }
}

/// Drops the filter of `module_path`, which falls back to the root level.
pub fn remove_module_filter(module_path: &str) {
    let mut settings = settings();
    if settings.module_levels.remove(module_path).is_some() {
        settings.apply();
    }
}

/// Parses a level name as accepted on the command line (`off`, `error`, `warn`, `info`,
/// `debug`, `trace`; case-insensitive).
///
/// # Errors
///
/// Returns a `SimError::ParameterError` for an unknown level name.
pub fn parse_log_level(level: &str) -> Result<LevelFilter, SimError> {
    LevelFilter::from_str(level)
        .map_err(|_| SimError::ParameterError(format!("unknown log level \"{level}\"")))
}
