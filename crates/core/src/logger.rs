use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    sink: Option<mpsc::Sender<String>>,
    prefixes: HashSet<String>,
}

/// Initialize the global logger. Clears the log file.
/// Calls made before `init` (or when it was never called) are dropped.
pub fn init(log_dir: &Path) {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("bridge.log");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .ok();

    LOGGER
        .set(Mutex::new(Logger { file, sink: None, prefixes: HashSet::new() }))
        .ok();
}

/// Initialize without a log file; lines only go to the sink, if any.
pub fn init_memory() {
    LOGGER
        .set(Mutex::new(Logger { file: None, sink: None, prefixes: HashSet::new() }))
        .ok();
}

/// Wire an extra channel that receives every formatted line.
pub fn set_sink(tx: mpsc::Sender<String>) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.sink = Some(tx);
        }
    }
}

/// Register a prefix. Only registered prefixes are printed; unknown ones
/// are logged without a prefix.
pub fn register_prefix(prefix: &str) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.prefixes.insert(prefix.to_string());
        }
    }
}

fn write_log(level: &str, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let Ok(mut l) = logger.lock() else { return };

    let ts = Local::now().format("%H:%M:%S%.3f").to_string();
    let line = if prefix.is_empty() || !l.prefixes.contains(prefix) {
        format!("[{}] [{}] {}", ts, level, msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level, prefix, msg)
    };

    if let Some(file) = l.file.as_mut() {
        writeln!(file, "{}", line).ok();
    }
    if let Some(tx) = &l.sink {
        tx.send(line).ok();
    }
}

pub fn info(msg: &str) {
    write_log("INFO", "", msg);
}

pub fn warn(msg: &str) {
    write_log("WARN", "", msg);
}

pub fn error(msg: &str) {
    write_log("ERROR", "", msg);
}

/// Log with a registered prefix.
pub fn info_p(prefix: &str, msg: &str) {
    write_log("INFO", prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log("WARN", prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log("ERROR", prefix, msg);
}
