//! Logger setup: console output plus an optional daily log file.
//!
//! Records go to stderr and, when a log directory is configured, are also
//! appended to `<dir>/app_YYYYMMDD.log`.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};

/// Name of the log file for `date`.
pub fn log_file_name(date: NaiveDate) -> String {
    format!("app_{}.log", date.format("%Y%m%d"))
}

/// Open today's log file in `dir` for appending, creating the directory.
pub fn open_log_file(dir: &Path) -> io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(log_file_name(Local::now().date_naive()));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    Ok((path, file))
}

/// Writer that copies everything to stderr and a second sink.
pub struct TeeWriter<W: Write> {
    sink: W,
}

impl<W: Write> TeeWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // Console output is best effort; the file is the durable copy.
        let _ = io::stderr().write_all(buf);
        self.sink.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let _ = io::stderr().flush();
        self.sink.flush()
    }
}

/// Install env_logger with `default_level` as the filter unless `RUST_LOG` is set.
///
/// Returns the log file path when `log_dir` is given. If the file cannot be
/// opened, logging falls back to stderr only and the error is returned after
/// the logger is installed so the caller can report it.
pub fn init(default_level: &str, log_dir: Option<&Path>) -> io::Result<Option<PathBuf>> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    builder
        .filter_module("reqwest", log::LevelFilter::Warn)
        .filter_module("hyper", log::LevelFilter::Warn)
        .format_timestamp_millis();

    let opened = log_dir.map(open_log_file).transpose();
    match opened {
        Ok(Some((path, file))) => {
            builder
                .target(env_logger::Target::Pipe(Box::new(TeeWriter::new(file))))
                .init();
            log::debug!("Logging to file: {}", path.display());
            Ok(Some(path))
        }
        Ok(None) => {
            builder.init();
            Ok(None)
        }
        Err(e) => {
            builder.init();
            Err(e)
        }
    }
}
