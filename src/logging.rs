use log::{Level, LevelFilter, Metadata, Record};
use once_cell::sync::OnceCell;
use std::fs::{OpenOptions, create_dir_all};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::error::AppError;

#[derive(Debug)]
struct SimpleLogger {
    log_path: PathBuf,
    level: Level,
}

static LOGGER: OnceCell<SimpleLogger> = OnceCell::new();

impl log::Log for SimpleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let log_entry = format!(
                "{} {} - {}\n",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            );
            let log_file = self.log_path.join("log.txt");

            if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(log_file) {
                let _ = file.write_all(log_entry.as_bytes());
            }
        }
    }

    fn flush(&self) {}
}

pub fn default_log_dir() -> io::Result<PathBuf> {
    dir::home_dir()
        .map(|home| home.join("rann").join("data"))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Failed to get home directory"))
}

// Install the file logger. `debug` lowers the threshold from Info to Debug.
pub fn init(log_dir: Option<PathBuf>, debug: bool) -> Result<(), AppError> {
    let log_path = match log_dir {
        Some(path) => path,
        None => default_log_dir()?,
    };
    create_dir_all(&log_path)?;

    let level = if debug { Level::Debug } else { Level::Info };
    let logger = LOGGER.get_or_init(|| SimpleLogger { log_path, level });
    log::set_logger(logger)?;
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
    Ok(())
}
