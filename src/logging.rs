use std::io::Write;

use chrono::Local;
use env_logger::{Builder, Env};
use log::{LevelFilter, SetLoggerError};

/// Environment variable that overrides the level chosen on the command line,
/// using the usual `env_logger` filter syntax.
pub const LOG_ENV: &str = "HEYSTACK_LOG";

/// Maps `-v` occurrences to a level: info by default, then debug and trace.
/// `--quiet` keeps warnings and errors only.
pub fn level_for_verbosity(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Warn;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the stderr logger. Fails if a logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    builder(level).try_init()?;
    log::debug!("Logging initialized at {}", level);
    Ok(())
}

fn builder(level: LevelFilter) -> Builder {
    let mut builder = Builder::new();
    builder
        .filter_level(level)
        .parse_env(Env::new().filter(LOG_ENV))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] {}",
                Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.args()
            )
        });
    builder
}
