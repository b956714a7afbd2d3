use chrono::Local;
use std::{fmt::Display, io::Write, path::PathBuf, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogContext {
    Boot,
    Logger,
    Config,
    Engine,
    Supervisor,
    Mtc,
    Artnet,
    Ltc,
    Passthru,
    Audio,
}

impl Display for LogContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            LogContext::Boot => "boot",
            LogContext::Logger => "logger",
            LogContext::Config => "config",
            LogContext::Engine => "engine",
            LogContext::Supervisor => "supervisor",
            LogContext::Mtc => "mtc",
            LogContext::Artnet => "artnet",
            LogContext::Ltc => "ltc",
            LogContext::Passthru => "passthru",
            LogContext::Audio => "audio",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Note,
    Command,
    Error,
    Debug,
}

impl Display for LogKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            LogKind::Note => "NOTE",
            LogKind::Command => "COMMAND",
            LogKind::Error => "ERROR",
            LogKind::Debug => "DEBUG",
        };
        write!(f, "{s}")
    }
}

const LOG_PATH_STR: &str = "logs";
const LOG_FILE: &str = "log.txt";
const LOG_BUDGET_BYTES: u64 = 1024 * 1024 * 1024;

pub fn get_path() -> PathBuf {
    PathBuf::from_str(LOG_PATH_STR).expect("log path is constant")
}

/// Rotates the previous run's log under a timestamp-hashed name and starts a fresh one.
pub fn init() {
    let log_path = get_path();
    if !std::fs::exists(&log_path).unwrap_or(false) {
        let _ = std::fs::create_dir(&log_path);
    }

    let log_size_total: u64 = std::fs::read_dir(&log_path)
        .into_iter()
        .flatten()
        .flatten()
        .filter_map(|f| f.metadata().ok())
        .map(|m| m.len())
        .sum();

    if log_size_total > LOG_BUDGET_BYTES {
        if let Ok(entries) = std::fs::read_dir(&log_path) {
            for entry in entries.flatten() {
                let stale = entry
                    .metadata()
                    .and_then(|m| m.modified())
                    .map(|t| t.elapsed().unwrap_or_default().as_secs() > 3600 * 24 * 7)
                    .unwrap_or(false);
                if stale {
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
    }

    let mut time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let mut time_hash = String::new();
    while time > 0 {
        time_hash.push(char::from_digit((time & 0x1F) as u32, 32).expect("moduloed to fit base 32"));
        time >>= 5;
    }

    let _ = std::fs::rename(LOG_FILE, log_path.join(format!("log_{time_hash}.txt")));
    let _ = std::fs::write(LOG_FILE, []);
    log(
        format!("log start, previous logs total {log_size_total} bytes"),
        LogContext::Logger,
        LogKind::Note,
    );
}

pub fn log(msg: String, context: LogContext, kind: LogKind) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let mut line = format!("[{timestamp}] {kind} {context}: {msg}");
    line = line.trim().to_string();
    line.push('\n');
    print!("{line}");

    if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open(LOG_FILE) {
        let _ = file.write_all(line.as_bytes());
    }
}
