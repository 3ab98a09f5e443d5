//! Logging.
//!
//! All diagnostic output is done via the `log` crate. Logging is set up in
//! two stages: [`Logger::init`] installs a provisional logger that writes
//! warnings and errors to stderr so that problems while reading the
//! configuration can be reported. Once the configuration is known,
//! [`Logger::switch_logging`] reroutes all output to the configured target.

use std::{fmt, io};
use log::{LevelFilter, Record, error};
use crate::config::{Config, LogTarget};
use crate::error::Failed;


/// The format of the timestamp of messages written to a log file.
const LOG_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";


//------------ Logger --------------------------------------------------------

/// Setting up and switching logging.
pub struct Logger;

impl Logger {
    /// Initialize logging.
    ///
    /// It is important to initialize logging before doing anything else
    /// that may result in diagnostic output. This function sets a maximum
    /// log level of `warn`, leading only printing important information,
    /// and directs all logging to stderr.
    pub fn init() -> Result<(), Failed> {
        log::set_max_level(LevelFilter::Warn);
        if let Err(err) = log_reroute::init() {
            eprintln!("Failed to initialize logger: {}.\nAborting.", err);
            return Err(Failed)
        }
        let (_, logger) = Self::stderr_dispatch(LevelFilter::Warn).into_log();
        log_reroute::reroute_boxed(logger);
        Ok(())
    }

    /// Switches logging to the configured target.
    ///
    /// Once the configuration has been successfully loaded, logging should
    /// be switched to whatever the user asked for via this method.
    pub fn switch_logging(config: &Config) -> Result<(), Failed> {
        let dispatch = match config.log_target {
            LogTarget::Stderr => Self::stderr_dispatch(config.log_level),
            LogTarget::File(ref path) => {
                let file = match fern::log_file(path) {
                    Ok(file) => file,
                    Err(err) => {
                        error!(
                            "Failed to open log file '{}': {}",
                            path.display(), err
                        );
                        return Err(Failed)
                    }
                };
                fern::Dispatch::new()
                    .level(config.log_level)
                    .format(|out, message, record| {
                        out.finish(format_args!(
                            "[{}] {}",
                            chrono::Local::now().format(LOG_TIME_FORMAT),
                            Self::format_message(record, message)
                        ))
                    })
                    .chain(file)
            }
        };
        let (_, logger) = dispatch.into_log();
        log_reroute::reroute_boxed(logger);
        log::set_max_level(config.log_level);
        Ok(())
    }

    /// Creates a dispatch writing to stderr.
    fn stderr_dispatch(level: LevelFilter) -> fern::Dispatch {
        fern::Dispatch::new()
            .level(level)
            .format(|out, message, record| {
                out.finish(format_args!(
                    "{}", Self::format_message(record, message)
                ))
            })
            .chain(io::stderr())
    }

    /// Formats the level and message of a record.
    fn format_message(record: &Record, message: &fmt::Arguments) -> String {
        format!("[{}] {}", record.level(), message)
    }
}
