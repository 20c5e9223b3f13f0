use std::{
    env,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
};

use chrono;

use crate::paths;

/* =========================
   GLOBAL STATE
   ========================= */

static DEBUG: AtomicBool = AtomicBool::new(false);
static SINK: OnceLock<Mutex<LogSink>> = OnceLock::new();

const MAX_LOG_BYTES: u64 = 500_000;
const MAX_BACKUPS: u32 = 3;

struct LogSink {
    path: PathBuf,
    file: Option<File>,
    written: u64,
}

/* =========================
   PUBLIC API
   ========================= */

/// `LIFEGRID_DEBUG=1` elevates the threshold from INFO to DEBUG.
pub fn init() {
    if SINK.get().is_some() {
        panic!("logging::init() called more than once");
    }

    let debug = env::var("LIFEGRID_DEBUG").map(|v| v == "1").unwrap_or(false);
    DEBUG.store(debug, Ordering::Relaxed);

    let path = paths::log_path();
    let written = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    let _ = SINK.set(Mutex::new(LogSink {
        path,
        file: None,
        written,
    }));
}

#[inline]
pub fn should_log(level: &str) -> bool {
    if level == "DEBUG" {
        return DEBUG.load(Ordering::Relaxed);
    }
    true
}

/* =========================
   INTERNAL
   ========================= */

#[inline]
pub fn enqueue(level: &str, msg: String) {
    let Some(sink) = SINK.get() else {
        return;
    };
    let Ok(mut sink) = sink.lock() else {
        return;
    };

    let ts = timestamp();
    sink.write_line(&format!("{ts} [{level}] {msg}"));
}

impl LogSink {
    fn write_line(&mut self, line: &str) {
        if self.written + line.len() as u64 + 1 > MAX_LOG_BYTES {
            self.file = None;
            rotate_backups(&self.path);
            self.written = 0;
        }

        if self.file.is_none() {
            self.file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .ok();
        }

        if let Some(file) = self.file.as_mut() {
            let _ = writeln!(file, "{line}");
            let _ = file.flush();
            self.written += line.len() as u64 + 1;
        }
    }
}

/// Shift `<log>.1 -> <log>.2 -> ...`, dropping the oldest, then move the
/// live file to `<log>.1`.
fn rotate_backups(path: &Path) {
    let backup = |n: u32| PathBuf::from(format!("{}.{n}", path.display()));

    let _ = fs::remove_file(backup(MAX_BACKUPS));
    for n in (1..MAX_BACKUPS).rev() {
        let _ = fs::rename(backup(n), backup(n + 1));
    }
    let _ = fs::rename(path, backup(1));
}

fn timestamp() -> String {
    let now = chrono::Local::now();
    now.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}

/* =========================
   MACROS
   ========================= */

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("DEBUG") {
            $crate::logging::enqueue(
                "DEBUG",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {{
        if $crate::logging::should_log("INFO") {
            $crate::logging::enqueue(
                "INFO",
                format!($($arg)*)
            );
        }
    }};
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "WARN",
            format!($($arg)*)
        );
    }};
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {{
        $crate::logging::enqueue(
            "ERROR",
            format!($($arg)*)
        );
    }};
}
