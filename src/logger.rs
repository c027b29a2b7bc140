//! Session log for the GeoCanvas window.
//!
//! One file per run, truncated on start:
//!   Windows:  `%APPDATA%\GeoCanvas\geocanvas.log`
//!   Linux:    `$XDG_DATA_HOME/GeoCanvas/geocanvas.log` (or `~/.local/share/...`)
//!   macOS:    `~/Library/Application Support/GeoCanvas/geocanvas.log`
//!
//! Fetch failures, listing problems and clamped placements are reported
//! through `log_info!` / `log_warn!` / `log_err!`. Until [`init`] installs a
//! session (unit tests, headless inspect mode) the macros do nothing.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
    Panic,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
            Level::Panic => "PANIC",
        })
    }
}

/// A line-oriented log sink shared between the UI thread and fetch workers.
pub struct SessionLog {
    out: Mutex<Box<dyn Write + Send>>,
}

impl SessionLog {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self { out: Mutex::new(out) }
    }

    /// Append one entry stamped with the current UTC time of day.
    pub fn record(&self, level: Level, msg: &str) {
        self.raw(&format_entry(&clock(unix_secs()), level, msg));
    }

    /// Append text without a stamp. Write errors are dropped.
    pub fn raw(&self, line: &str) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", line);
            let _ = out.flush();
        }
    }
}

static SESSION: OnceLock<SessionLog> = OnceLock::new();

/// Used by the `log_*!` macros.
pub fn write(level: Level, msg: &str) {
    if let Some(log) = SESSION.get() {
        log.record(level, msg);
    }
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*))
    };
}

/// Open the session log file and route panics into it.
/// Only the first call has any effect.
pub fn init() {
    let path = data_dir().join("GeoCanvas").join("geocanvas.log");
    if let Some(dir) = path.parent() {
        let _ = fs::create_dir_all(dir);
    }
    let file = match OpenOptions::new().create(true).write(true).truncate(true).open(&path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("[logger] cannot open {}: {}", path.display(), e);
            return;
        }
    };
    if SESSION.set(SessionLog::new(Box::new(file))).is_err() {
        return;
    }

    write(
        Level::Info,
        &format!("GeoCanvas {} session log at {}", env!("CARGO_PKG_VERSION"), path.display()),
    );

    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write(Level::Panic, &info.to_string());
        default_hook(info);
    }));
}

fn format_entry(stamp: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", stamp, level, msg)
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join("Library").join("Application Support");
        }
    }
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|h| PathBuf::from(h).join(".local").join("share")))
        .unwrap_or_else(|_| PathBuf::from("."))
}

fn unix_secs() -> Option<u64> {
    SystemTime::now().duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
}

/// `HH:MM:SS` within the UTC day, or `??:??:??` when the clock is before 1970.
fn clock(secs: Option<u64>) -> String {
    match secs {
        Some(secs) => format!("{:02}:{:02}:{:02}", (secs % 86_400) / 3_600, (secs % 3_600) / 60, secs % 60),
        None => "??:??:??".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Sink that keeps everything written so the test can read it back.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn clock_wraps_at_midnight() {
        assert_eq!(clock(Some(0)), "00:00:00");
        assert_eq!(clock(Some(3_725)), "01:02:05");
        assert_eq!(clock(Some(86_400 + 59)), "00:00:59");
        assert_eq!(clock(None), "??:??:??");
    }

    #[test]
    fn entries_carry_level_tags() {
        assert_eq!(format_entry("12:00:00", Level::Warn, "oops"), "[12:00:00] [WARN] oops");

        let sink = Captured::default();
        let log = SessionLog::new(Box::new(sink.clone()));
        log.record(Level::Error, "fetch failed");
        log.raw("plain");
        let text = sink.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("] [ERROR] fetch failed"), "{}", lines[0]);
        assert_eq!(lines[1], "plain");
    }

    #[test]
    fn macros_without_a_session_are_silent() {
        crate::log_warn!("nothing to see {}", 1);
        assert!(SESSION.get().is_none());
    }
}
