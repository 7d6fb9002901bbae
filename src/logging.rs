//! Process-wide log setup.
//!
//! Level names follow the command line: `FATAL`, `ERROR`, `WARNING`, `INFO`,
//! `DEBUG`. Inside an Azure Pipelines job (`TF_BUILD` set) warnings and errors
//! carry the `##[warning]` / `##[error]` prefixes so the pipeline UI picks
//! them up.

use std::io::Write;

use log::{Level, LevelFilter, debug, warn};

const AZURE_ENV: &str = "TF_BUILD";

/// Map a level name to a filter. Case-insensitive; `None` if unknown.
pub fn parse_level(name: &str) -> Option<LevelFilter> {
    match name.trim().to_ascii_uppercase().as_str() {
        "FATAL" | "CRITICAL" | "ERROR" => Some(LevelFilter::Error),
        "WARNING" | "WARN" => Some(LevelFilter::Warn),
        "INFO" => Some(LevelFilter::Info),
        "DEBUG" => Some(LevelFilter::Debug),
        "NOTSET" | "TRACE" => Some(LevelFilter::Trace),
        _ => None,
    }
}

pub fn is_azure_pipeline() -> bool {
    std::env::var_os(AZURE_ENV).is_some()
}

/// Pipeline log-command prefix for `level`.
pub fn azure_prefix(level: Level) -> &'static str {
    match level {
        Level::Error => "##[error]",
        Level::Warn => "##[warning]",
        _ => "",
    }
}

/// Source locations are shown when debugging and for warnings-only runs.
pub fn shows_location(filter: LevelFilter) -> bool {
    filter >= LevelFilter::Debug || filter <= LevelFilter::Warn
}

/// Install the global logger and set the level.
///
/// The logger itself is installed once; later calls only change the level.
/// The line format chosen by the first call stays. Returns the filter in
/// effect.
pub fn init(level_name: &str) -> LevelFilter {
    let parsed = parse_level(level_name);
    let filter = parsed.unwrap_or(LevelFilter::Info);
    let detailed = shows_location(filter);
    let azure = is_azure_pipeline();

    let result = env_logger::Builder::from_default_env()
        .format(move |buf, record| {
            let prefix = if azure { azure_prefix(record.level()) } else { "" };
            if detailed {
                writeln!(
                    buf,
                    "{prefix}[{} {:<7} {}:{}] {}",
                    buf.timestamp_millis(),
                    record.level(),
                    record.file().unwrap_or("unknown"),
                    record.line().unwrap_or(0),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{prefix}[{} {:<7}] {}",
                    buf.timestamp_seconds(),
                    record.level(),
                    record.args()
                )
            }
        })
        .filter_level(LevelFilter::Trace)
        .try_init();

    log::set_max_level(filter);
    if result.is_err() {
        debug!("Logger already initialised");
    }
    if parsed.is_none() {
        warn!(
            "Unable to set log level by given log level name {}. Falling back to INFO.",
            level_name.to_uppercase()
        );
    }
    debug!("Log level set to {filter}");
    log::max_level()
}
