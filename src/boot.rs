use crate::config::{self, ConfigError, RootSettings};
use crate::logger::{self, LogContext, LogKind};
use std::{fmt::Display, path::PathBuf, str::FromStr};

#[derive(Debug)]
pub enum BootError {
    FileDoesNotExist,
    ConfigReadError(String),
    ConfigWriteError(String),
    ConfigParseError(String),
    LogCopyFailure(String),
}

impl Display for BootError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            BootError::FileDoesNotExist => write!(f, "Could not find a settings file. No results. Exiting."),
            BootError::ConfigReadError(errstr) => write!(f, "Could not read settings file: {errstr}"),
            BootError::ConfigWriteError(errstr) => write!(f, "An error occured when writing settings: {errstr}"),
            BootError::ConfigParseError(errstr) => write!(f, "An error occured when parsing settings: {errstr}"),
            BootError::LogCopyFailure(errstr) => write!(f, "An error occured when copying log files: {errstr}"),
        }
    }
}

impl From<ConfigError> for BootError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Io(e) => BootError::ConfigReadError(e.to_string()),
            ConfigError::Parse(e) => BootError::ConfigParseError(e.to_string()),
        }
    }
}

pub fn log_boot_error(err: BootError) {
    logger::log(err.to_string(), LogContext::Boot, LogKind::Error);
}

/// What `main` should do this run, selected by `-m`/`--manual-boot` or,
/// absent that, always `Run`. The on-disk settings file carries no boot
/// order of its own, unlike the Pi-targeted teacher build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootProgramOrder {
    Run,
    WriteConfig,
    ExtractLogs,
}

pub fn get_config_path() -> PathBuf {
    PathBuf::from_str(".config/chase/chase.json").expect("PathBuf cannot fail from_str")
}

pub fn find_config_path(override_path: &str) -> Result<PathBuf, BootError> {
    if !override_path.is_empty() {
        return PathBuf::from_str(override_path).map_err(|_| BootError::FileDoesNotExist);
    }
    Ok(get_config_path())
}

pub fn get_config(path: PathBuf) -> Result<RootSettings, BootError> {
    if !std::fs::exists(&path).unwrap_or_default() {
        write_default_config(path.clone())?;
    }
    let file_string = std::fs::read_to_string(&path).map_err(|e| BootError::ConfigReadError(e.to_string()))?;
    Ok(config::parse(&file_string)?)
}

pub fn write_default_config(path: PathBuf) -> Result<(), BootError> {
    write_config(path, &RootSettings::default())
}

pub fn write_config(path: PathBuf, settings: &RootSettings) -> Result<(), BootError> {
    logger::log("saving settings file".to_string(), LogContext::Boot, LogKind::Note);
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let json = config::to_json(settings)?;
    std::fs::write(path, json).map_err(|e| BootError::ConfigWriteError(e.to_string()))
}

pub fn copy_logs(dest: PathBuf) -> Result<(), BootError> {
    std::fs::copy(logger::get_path(), dest.join("logs/")).map(|_| ()).map_err(|e| BootError::LogCopyFailure(e.to_string()))
}
