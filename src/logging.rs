// Logging module
// Console output through env_logger, degradations always mirrored to syslog

use log::{LevelFilter, Log, Metadata, Record};
use syslog::{BasicLogger, Facility, Formatter3164};

/// Records at or above this level always reach the system log
const SYSTEM_LEVEL: LevelFilter = LevelFilter::Warn;

/// Console filter when `RUST_LOG` is unset: silent unless verbose
fn console_filter(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "off"
    }
}

/// Only this crate's warnings go to syslog; dependency chatter stays local
fn for_system_log(metadata: &Metadata) -> bool {
    metadata.level() <= SYSTEM_LEVEL && metadata.target().starts_with(env!("CARGO_CRATE_NAME"))
}

struct Dispatch {
    console: env_logger::Logger,
    system: Option<BasicLogger>,
}

impl Log for Dispatch {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || (self.system.is_some() && for_system_log(metadata))
    }

    fn log(&self, record: &Record) {
        self.console.log(record);
        if let Some(system) = &self.system {
            if for_system_log(record.metadata()) {
                system.log(record);
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(system) = &self.system {
            system.flush();
        }
    }
}

fn connect_system_log() -> Result<BasicLogger, syslog::Error> {
    let formatter = Formatter3164 {
        facility: Facility::LOG_USER,
        hostname: None,
        process: env!("CARGO_PKG_NAME").to_string(),
        pid: std::process::id() as _,
    };
    syslog::unix(formatter).map(BasicLogger::new)
}

/// Install the logger; -v raises the console level, RUST_LOG overrides it
pub fn init(verbose: bool) {
    let console = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(console_filter(verbose)),
    )
    .build();

    let (system, unavailable) = match connect_system_log() {
        Ok(system) => (Some(system), None),
        Err(e) => (None, Some(e)),
    };
    let mut max_level = console.filter();
    if system.is_some() {
        max_level = max_level.max(SYSTEM_LEVEL);
    }

    let dispatch = Dispatch { console, system };
    if log::set_boxed_logger(Box::new(dispatch)).is_ok() {
        log::set_max_level(max_level);
    }
    if let Some(e) = unavailable {
        log::debug!("System log unavailable: {}", e);
    }
}
