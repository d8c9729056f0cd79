use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Local};
use env_logger::{Env, Target};
use log::Record;

static INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install the global logger.
///
/// Lines go to `<logs_dir>/<MM_DD_YYYY_HH_MM_SS>.log`; if that file cannot be
/// created they go to stderr instead.  The filter defaults to `info` and
/// follows `RUST_LOG`.  Returns the log file path when one is in use.
/// Only the first call installs a logger; later calls return `None` without
/// touching `logs_dir`.
pub fn init(logs_dir: &Path) -> Option<PathBuf> {
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return None;
    }

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| write_record(buf, Local::now(), record));

    let log_file = match open_log_file(logs_dir, Local::now()) {
        Ok((path, file)) => {
            builder.target(Target::Pipe(Box::new(file)));
            Some(path)
        }
        Err(err) => {
            eprintln!("could not open log file in {}: {err}", logs_dir.display());
            None
        }
    };

    if builder.try_init().is_err() {
        // Someone else owns the global logger; drop our unused file.
        if let Some(path) = &log_file {
            let _ = std::fs::remove_file(path);
        }
        return None;
    }
    log_file
}

fn log_file_name(now: DateTime<Local>) -> String {
    format!("{}.log", now.format("%m_%d_%Y_%H_%M_%S"))
}

/// `[ <timestamp> ] <line> <target> - <LEVEL> - <message>`
fn write_record<W: Write + ?Sized>(out: &mut W, now: DateTime<Local>, record: &Record) -> std::io::Result<()> {
    writeln!(
        out,
        "[ {} ] {} {} - {} - {}",
        now.format("%Y-%m-%d %H:%M:%S,%3f"),
        record.line().unwrap_or(0),
        record.target(),
        record.level(),
        record.args()
    )
}

fn open_log_file(logs_dir: &Path, now: DateTime<Local>) -> std::io::Result<(PathBuf, File)> {
    std::fs::create_dir_all(logs_dir)?;
    let path = logs_dir.join(log_file_name(now));
    let file = File::create(&path)?;
    Ok((path, file))
}
