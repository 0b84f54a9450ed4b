//! Configuration: defaults, optional TOML file, then environment.
//!
//! Everything is validated here so that a doomed startup fails before any
//! GPIO line is exported or written.

use crate::error::ConfigError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/hatmon/config.toml";

pub const ENV_SHUTDOWN_PIN: &str = "HATMON_SHUTDOWN_PIN";
pub const ENV_SHUTDOWN_POLARITY: &str = "HATMON_SHUTDOWN_POLARITY";
pub const ENV_SHUTDOWN_PULL: &str = "HATMON_SHUTDOWN_PULL";
pub const ENV_MIN_HOLD_MS: &str = "HATMON_MIN_HOLD_MS";
pub const ENV_RUNNING_PIN: &str = "HATMON_RUNNING_PIN";
pub const ENV_RUNNING_ACTIVE_HIGH: &str = "HATMON_RUNNING_ACTIVE_HIGH";
pub const ENV_RUNNING_INITIAL: &str = "HATMON_RUNNING_INITIAL";
pub const ENV_IDLE_POLL_MS: &str = "HATMON_IDLE_POLL_MS";
pub const ENV_ACTIVE_POLL_MS: &str = "HATMON_ACTIVE_POLL_MS";
pub const ENV_TARGET_USER: &str = "HATMON_TARGET_USER";
pub const ENV_TARGET_APP: &str = "HATMON_TARGET_APP";
pub const ENV_GRACE_MS: &str = "HATMON_GRACE_MS";
pub const ENV_POWEROFF_COMMAND: &str = "HATMON_POWEROFF_COMMAND";
pub const ENV_GPIO_SYSFS: &str = "HATMON_GPIO_SYSFS";

/// Older deployments set these for the OpenCPN kill step.
pub const LEGACY_ENV_USER: &str = "OPENCPN_USER";
/// Seconds, not milliseconds.
pub const LEGACY_ENV_DELAY_SECS: &str = "OPENCPN_PKILL_DELAY";

/// Which electrical level means "shutdown requested".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl Polarity {
    pub fn is_active(self, level: bool) -> bool {
        match self {
            Polarity::ActiveHigh => level,
            Polarity::ActiveLow => !level,
        }
    }
}

impl FromStr for Polarity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active-high" | "active_high" | "high" => Ok(Polarity::ActiveHigh),
            "active-low" | "active_low" | "low" => Ok(Polarity::ActiveLow),
            other => Err(format!("expected active-high or active-low, got {other:?}")),
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Polarity::ActiveHigh => write!(f, "active-high"),
            Polarity::ActiveLow => write!(f, "active-low"),
        }
    }
}

/// Internal bias resistor on the shutdown pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pull {
    None,
    PullUp,
    PullDown,
}

impl FromStr for Pull {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" | "float" => Ok(Pull::None),
            "up" | "pull-up" | "pullup" | "pu" => Ok(Pull::PullUp),
            "down" | "pull-down" | "pulldown" | "pd" => Ok(Pull::PullDown),
            other => Err(format!("expected none, up or down, got {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PinConfig {
    pub pin_id: u32,
    pub polarity: Polarity,
    pub pull: Pull,
    pub min_hold_ms: u64,
}

impl PinConfig {
    pub fn min_hold(&self) -> Duration {
        Duration::from_millis(self.min_hold_ms)
    }
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            pin_id: 22,
            polarity: Polarity::ActiveHigh,
            pull: Pull::None,
            min_hold_ms: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunningSignalConfig {
    pub pin_id: u32,
    pub active_high: bool,
    pub initial_asserted: bool,
}

impl Default for RunningSignalConfig {
    fn default() -> Self {
        Self {
            pin_id: 23,
            active_high: true,
            initial_asserted: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShutdownPolicy {
    pub target_user: String,
    /// Process-name pattern, matched like `pkill` does.
    pub target_app: String,
    pub post_kill_grace_ms: u64,
}

impl ShutdownPolicy {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.post_kill_grace_ms)
    }
}

/// Poll cadence: coarse while idle, tight once a press has begun.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollTiming {
    pub idle_ms: u64,
    pub active_ms: u64,
}

impl PollTiming {
    pub fn idle(&self) -> Duration {
        Duration::from_millis(self.idle_ms)
    }

    pub fn active(&self) -> Duration {
        Duration::from_millis(self.active_ms)
    }
}

impl Default for PollTiming {
    fn default() -> Self {
        Self {
            idle_ms: 1000,
            active_ms: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PowerOffConfig {
    pub command: Vec<String>,
}

impl Default for PowerOffConfig {
    fn default() -> Self {
        Self {
            command: vec!["/usr/bin/sudo".to_string(), "/sbin/poweroff".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GpioConfig {
    pub sysfs_root: PathBuf,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            sysfs_root: PathBuf::from("/sys/class/gpio"),
        }
    }
}

/// Fully validated daemon configuration. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    pub shutdown: PinConfig,
    pub running: RunningSignalConfig,
    pub policy: ShutdownPolicy,
    pub poll: PollTiming,
    pub power: PowerOffConfig,
    pub gpio: GpioConfig,
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    shutdown: RawShutdownConfig,
    #[serde(default)]
    running: RawRunningConfig,
    #[serde(default)]
    policy: RawPolicyConfig,
    #[serde(default)]
    poll: RawPollConfig,
    #[serde(default)]
    power: RawPowerConfig,
    #[serde(default)]
    gpio: RawGpioConfig,
}

#[derive(Debug, Deserialize, Default)]
struct RawShutdownConfig {
    #[serde(default)]
    pin: Option<u32>,
    #[serde(default)]
    polarity: Option<String>,
    #[serde(default)]
    pull: Option<String>,
    #[serde(default)]
    min_hold_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawRunningConfig {
    #[serde(default)]
    pin: Option<u32>,
    #[serde(default)]
    active_high: Option<bool>,
    #[serde(default)]
    initial_asserted: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct RawPolicyConfig {
    #[serde(default)]
    target_user: Option<String>,
    #[serde(default)]
    target_app: Option<String>,
    #[serde(default)]
    grace_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawPollConfig {
    #[serde(default)]
    idle_ms: Option<u64>,
    #[serde(default)]
    active_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawPowerConfig {
    #[serde(default)]
    command: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct RawGpioConfig {
    #[serde(default)]
    sysfs_root: Option<PathBuf>,
}

impl Config {
    /// Load from `path` (or [`DEFAULT_CONFIG_PATH`] when it exists) and
    /// overlay the environment looked up through `env`.
    ///
    /// An explicitly given path must exist; the default one is optional.
    pub fn load<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = match path {
            Some(path) => read_file(path)?,
            None => {
                let default = Path::new(DEFAULT_CONFIG_PATH);
                if default.exists() {
                    read_file(default)?
                } else {
                    debug!("no {} present, using defaults and environment", DEFAULT_CONFIG_PATH);
                    RawConfig::default()
                }
            }
        };
        resolve(raw, &env)
    }

    /// Defaults plus environment only.
    pub fn from_env<F>(env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        resolve(RawConfig::default(), &env)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.shutdown.min_hold_ms == 0 {
            return Err(ConfigError::invalid(ENV_MIN_HOLD_MS, "0", "must be greater than zero"));
        }
        if self.poll.idle_ms == 0 {
            return Err(ConfigError::invalid(ENV_IDLE_POLL_MS, "0", "must be greater than zero"));
        }
        if self.poll.active_ms == 0 {
            return Err(ConfigError::invalid(ENV_ACTIVE_POLL_MS, "0", "must be greater than zero"));
        }
        if self.poll.active_ms > self.poll.idle_ms {
            return Err(ConfigError::invalid(
                ENV_ACTIVE_POLL_MS,
                self.poll.active_ms.to_string(),
                format!("must not exceed the idle interval ({} ms)", self.poll.idle_ms),
            ));
        }
        if self.shutdown.pin_id == self.running.pin_id {
            return Err(ConfigError::PinConflict(self.shutdown.pin_id));
        }
        if self.policy.target_user.trim().is_empty() {
            return Err(ConfigError::invalid(ENV_TARGET_USER, "", "must not be empty"));
        }
        if let Err(e) = Regex::new(&self.policy.target_app) {
            return Err(ConfigError::invalid(
                ENV_TARGET_APP,
                self.policy.target_app.clone(),
                e.to_string(),
            ));
        }
        if self.power.command.is_empty() || self.power.command[0].trim().is_empty() {
            return Err(ConfigError::invalid(ENV_POWEROFF_COMMAND, "", "must name a program"));
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    debug!("reading config file {}", path.display());
    let text = fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::FileParse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve(raw: RawConfig, env: &dyn Fn(&str) -> Option<String>) -> Result<Config, ConfigError> {
    let pin_defaults = PinConfig::default();
    let shutdown = PinConfig {
        pin_id: env_parse(env, ENV_SHUTDOWN_PIN)?
            .or(raw.shutdown.pin)
            .unwrap_or(pin_defaults.pin_id),
        polarity: layered(env, ENV_SHUTDOWN_POLARITY, raw.shutdown.polarity, "shutdown.polarity")?
            .unwrap_or(pin_defaults.polarity),
        pull: layered(env, ENV_SHUTDOWN_PULL, raw.shutdown.pull, "shutdown.pull")?
            .unwrap_or(pin_defaults.pull),
        min_hold_ms: env_parse(env, ENV_MIN_HOLD_MS)?
            .or(raw.shutdown.min_hold_ms)
            .unwrap_or(pin_defaults.min_hold_ms),
    };

    let running_defaults = RunningSignalConfig::default();
    let running = RunningSignalConfig {
        pin_id: env_parse(env, ENV_RUNNING_PIN)?
            .or(raw.running.pin)
            .unwrap_or(running_defaults.pin_id),
        active_high: env_bool(env, ENV_RUNNING_ACTIVE_HIGH)?
            .or(raw.running.active_high)
            .unwrap_or(running_defaults.active_high),
        initial_asserted: env_bool(env, ENV_RUNNING_INITIAL)?
            .or(raw.running.initial_asserted)
            .unwrap_or(running_defaults.initial_asserted),
    };

    let target_user = env_value(env, ENV_TARGET_USER)
        .or_else(|| env_value(env, LEGACY_ENV_USER))
        .or(raw.policy.target_user)
        .ok_or(ConfigError::Missing { key: ENV_TARGET_USER })?;

    let grace_ms = match env_parse::<u64>(env, ENV_GRACE_MS)? {
        Some(ms) => Some(ms),
        None => env_parse::<u64>(env, LEGACY_ENV_DELAY_SECS)?.map(|s| s.saturating_mul(1000)),
    };
    let post_kill_grace_ms = grace_ms
        .or(raw.policy.grace_ms)
        .ok_or(ConfigError::Missing { key: ENV_GRACE_MS })?;

    let policy = ShutdownPolicy {
        target_user,
        target_app: env_value(env, ENV_TARGET_APP)
            .or(raw.policy.target_app)
            .unwrap_or_else(|| "opencpn".to_string()),
        post_kill_grace_ms,
    };

    let poll_defaults = PollTiming::default();
    let poll = PollTiming {
        idle_ms: env_parse(env, ENV_IDLE_POLL_MS)?
            .or(raw.poll.idle_ms)
            .unwrap_or(poll_defaults.idle_ms),
        active_ms: env_parse(env, ENV_ACTIVE_POLL_MS)?
            .or(raw.poll.active_ms)
            .unwrap_or(poll_defaults.active_ms),
    };

    let power = PowerOffConfig {
        command: env_value(env, ENV_POWEROFF_COMMAND)
            .map(|v| v.split_whitespace().map(str::to_string).collect())
            .or(raw.power.command)
            .unwrap_or_else(|| PowerOffConfig::default().command),
    };

    let gpio = GpioConfig {
        sysfs_root: env_value(env, ENV_GPIO_SYSFS)
            .map(PathBuf::from)
            .or(raw.gpio.sysfs_root)
            .unwrap_or_else(|| GpioConfig::default().sysfs_root),
    };

    let config = Config {
        shutdown,
        running,
        policy,
        poll,
        power,
        gpio,
    };
    config.validate()?;
    Ok(config)
}

/// Empty values count as unset, like an unexported variable.
fn env_value(env: &dyn Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    env(key).filter(|v| !v.trim().is_empty())
}

fn parse_value<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::invalid(key, value, e.to_string()))
}

fn env_parse<T>(env: &dyn Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    env_value(env, key).map(|v| parse_value(key, &v)).transpose()
}

/// Parse the env value if set, else the file value; errors name whichever
/// setting the value came from.
fn layered<T>(
    env: &dyn Fn(&str) -> Option<String>,
    env_key: &'static str,
    file_value: Option<String>,
    file_key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    if let Some(v) = env_value(env, env_key) {
        return parse_value(env_key, &v).map(Some);
    }
    file_value.map(|v| parse_value(file_key, &v)).transpose()
}

fn env_bool(env: &dyn Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    let Some(value) = env_value(env, key) else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::invalid(key, value, "expected a boolean")),
    }
}
