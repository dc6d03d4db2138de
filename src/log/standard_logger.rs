use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use log4rs::Config;

use crate::log::LogSettings;

// ISO 8601 timestamp, colored level, target
const LOG_PATTERN: &str = "{d(%Y-%m-%dT%H:%M:%SZ)} {h({l})} {t} - {m}{n}";
const APPENDER: &str = "stderr";

impl LogSettings {
    /// Installs the log4rs console backend on first use and reconfigures it afterwards.
    pub(in crate::log) fn apply(&mut self) {
        // stdout is reserved for the batch summary line.
        let console = ConsoleAppender::builder()
            .target(Target::Stderr)
            .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
            .build();
        let loggers = self
            .module_levels
            .iter()
            .map(|(module, level)| Logger::builder().build(module.clone(), *level));
        let config = match Config::builder()
            .appender(Appender::builder().build(APPENDER, Box::new(console)))
            .loggers(loggers)
            .build(Root::builder().appender(APPENDER).build(self.root_level))
        {
            Ok(config) => config,
            Err(err) => {
                eprintln!("invalid logger configuration: {err}");
                return;
            }
        };

        match &self.handle {
            Some(handle) => handle.set_config(config),
            None => match log4rs::init_config(config) {
                Ok(handle) => self.handle = Some(handle),
                // Another logger is already installed by the embedding application.
                Err(err) => eprintln!("failed to install logger: {err}"),
            },
        }
    }
}
