use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::limits::*;
use crate::model::*;

/// Runtime settings, read from `HALLBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub halls: Vec<String>,
    pub policy: SlotPolicy,
    pub create_timeout: Duration,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            halls: vec!["Hall A".into(), "Hall B".into(), "Hall C".into()],
            policy: SlotPolicy::default(),
            create_timeout: Duration::from_secs(10),
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys fall back to defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let data_dir = get("HALLBOOK_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir);
        let halls = match get("HALLBOOK_HALLS") {
            Some(raw) => parse_halls(&raw)?,
            None => defaults.halls,
        };

        let open_hour: u16 = parse_var(&get, "HALLBOOK_OPEN_HOUR")?.unwrap_or(defaults.policy.open.hour());
        let close_hour: u16 = parse_var(&get, "HALLBOOK_CLOSE_HOUR")?.unwrap_or(defaults.policy.close.hour());
        let step_minutes: u16 = parse_var(&get, "HALLBOOK_SLOT_MINUTES")?.unwrap_or(defaults.policy.step_minutes);
        let open = TimeOfDay::new(open_hour, 0).ok_or(ConfigError::Invalid("HALLBOOK_OPEN_HOUR"))?;
        // 24 is not representable; the last bookable minute is 23:59.
        let close = TimeOfDay::new(close_hour, 0).ok_or(ConfigError::Invalid("HALLBOOK_CLOSE_HOUR"))?;
        if open >= close {
            return Err(ConfigError::Invalid("HALLBOOK_OPEN_HOUR must be before HALLBOOK_CLOSE_HOUR"));
        }
        if step_minutes == 0 {
            return Err(ConfigError::Invalid("HALLBOOK_SLOT_MINUTES"));
        }

        let create_timeout = parse_var::<u64>(&get, "HALLBOOK_CREATE_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.create_timeout);
        let metrics_port = parse_var(&get, "HALLBOOK_METRICS_PORT")?;

        Ok(Self {
            data_dir,
            halls,
            policy: SlotPolicy { open, close, step_minutes },
            create_timeout,
            metrics_port,
        })
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("bookings.journal")
    }
}

fn parse_var<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match get(key) {
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| ConfigError::Invalid(key)),
        None => Ok(None),
    }
}

fn parse_halls(raw: &str) -> Result<Vec<String>, ConfigError> {
    let mut halls: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if name.len() > MAX_HALL_NAME_LEN {
            return Err(ConfigError::Invalid("HALLBOOK_HALLS: hall name too long"));
        }
        if !halls.iter().any(|h| h == name) {
            halls.push(name.to_string());
        }
    }
    if halls.is_empty() {
        return Err(ConfigError::Invalid("HALLBOOK_HALLS: no halls"));
    }
    if halls.len() > MAX_HALLS {
        return Err(ConfigError::Invalid("HALLBOOK_HALLS: too many halls"));
    }
    Ok(halls)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(what) => write!(f, "invalid configuration: {what}"),
        }
    }
}

impl std::error::Error for ConfigError {}
