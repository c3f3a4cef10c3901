use colored::*;
use log::{Level, LevelFilter, Metadata, Record};

/// stderr logger with coloured level tags and the thread (pid) name.
struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = match record.level() {
            Level::Error => "ERROR".red().bold(),
            Level::Warn => "WARN".yellow(),
            Level::Info => "INFO".green(),
            Level::Debug => "DEBUG".bright_black(),
            Level::Trace => "TRACE".bright_black(),
        };
        let thread = std::thread::current();
        eprintln!("[{}] {}: {}", tag, thread.name().unwrap_or("host"), record.args());
    }

    fn flush(&self) {}
}

/// Level for `-v` repeated `verbosity` times.
pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

pub fn init(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_steps() {
        assert_eq!(level_for(0), LevelFilter::Error);
        assert_eq!(level_for(2), LevelFilter::Info);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }
}
