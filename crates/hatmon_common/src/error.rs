//! Error types for hatmon.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A missing or invalid setting. Always fatal, always raised before any
/// GPIO line is touched.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{key} not defined, quitting")]
    Missing { key: &'static str },

    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("shutdown pin and running pin are both GPIO {0}")]
    PinConflict(u32),

    #[error("cannot read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    FileParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn invalid(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Failure to take or keep control of a GPIO line.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("GPIO {pin}: cannot {op}: {source}")]
    Io {
        pin: u32,
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("GPIO {pin}: unexpected value {value:?}")]
    BadValue { pin: u32, value: String },

    #[error("GPIO {pin}: sysfs node did not appear after export")]
    ExportTimeout { pin: u32 },

    #[error("GPIO {pin}: cannot configure pull resistor: {reason}")]
    Bias { pin: u32, reason: String },
}

impl HardwareError {
    pub fn io(pin: u32, op: &'static str, source: io::Error) -> Self {
        HardwareError::Io { pin, op, source }
    }
}

/// Best-effort termination problems. Logged, never fatal.
#[derive(Error, Debug)]
pub enum TerminationError {
    #[error("user {0:?} does not exist")]
    UnknownUser(String),

    #[error("cannot look up user {user:?}: {reason}")]
    UserLookup { user: String, reason: String },

    #[error("invalid process pattern {pattern:?}: {reason}")]
    Pattern { pattern: String, reason: String },

    #[error("cannot signal pid {pid}: {reason}")]
    Signal { pid: u32, reason: String },
}

/// The power-off request was refused or could not be issued. The host may
/// still be up while the running line is stale.
#[derive(Error, Debug)]
pub enum PowerOffError {
    #[error("cannot spawn power-off command {command:?}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("power-off command {command:?} failed with {status}")]
    Failed { command: String, status: String },
}

/// Top-level fatal error. Each variant maps to a distinct exit status.
#[derive(Error, Debug)]
pub enum DaemonError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("hardware error: {0}")]
    Hardware(#[from] HardwareError),

    #[error("power-off failed: {0}")]
    PowerOff(#[from] PowerOffError),
}

impl DaemonError {
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Config(_) => 2,
            DaemonError::Hardware(_) => 3,
            DaemonError::PowerOff(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let config: DaemonError = ConfigError::Missing { key: "HATMON_TARGET_USER" }.into();
        let hardware: DaemonError = HardwareError::ExportTimeout { pin: 22 }.into();
        let power: DaemonError = PowerOffError::Failed {
            command: "poweroff".into(),
            status: "exit status: 1".into(),
        }
        .into();

        assert_eq!(config.exit_code(), 2);
        assert_eq!(hardware.exit_code(), 3);
        assert_eq!(power.exit_code(), 4);
    }

    #[test]
    fn missing_key_message_names_the_key() {
        let err = ConfigError::Missing { key: "OPENCPN_PKILL_DELAY" };
        assert_eq!(err.to_string(), "OPENCPN_PKILL_DELAY not defined, quitting");
    }
}
