use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use chrono::Local;
use env_logger::{Builder, Target};
use log::LevelFilter;

static SESSION_LOG: OnceLock<Mutex<Option<File>>> = OnceLock::new();

fn session_log() -> &'static Mutex<Option<File>> {
    SESSION_LOG.get_or_init(|| Mutex::new(None))
}

/// Writes every line to stderr and, once attached, to the session log file.
struct TeeWriter;

impl Write for TeeWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Ok(mut guard) = session_log().lock() {
            if let Some(file) = guard.as_mut() {
                // Session log write errors are ignored.
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Ok(mut guard) = session_log().lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

pub fn init() {
    let result = Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Info)
        .parse_default_env()
        .target(Target::Pipe(Box::new(TeeWriter)))
        .try_init();

    if result.is_ok() {
        log::info!("Logger initialized.");
    }
}

/// Appends all further log lines to `path`.
pub fn attach_session_log(path: &Path) -> io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    if let Ok(mut guard) = session_log().lock() {
        *guard = Some(file);
    }
    log::info!("Session log: {:?}", path);
    Ok(())
}
