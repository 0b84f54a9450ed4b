//! Linux sysfs GPIO lines.
//!
//! Pins are exported through `<root>/export` and left exported on exit: the
//! running line must keep its level until the power rail drops.

use hatmon_common::{
    Hardware, HardwareError, InputLine, OutputLine, PinConfig, Pull, RunningSignalConfig,
};
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const EXPORT_TIMEOUT: Duration = Duration::from_millis(500);
const EXPORT_POLL: Duration = Duration::from_millis(10);

/// Tools that can set pin bias on a Raspberry Pi; sysfs cannot.
const BIAS_TOOLS: [&str; 2] = ["pinctrl", "raspi-gpio"];

pub struct SysfsGpio {
    root: PathBuf,
    export_timeout: Duration,
}

impl SysfsGpio {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            export_timeout: EXPORT_TIMEOUT,
        }
    }

    pub fn with_export_timeout(mut self, timeout: Duration) -> Self {
        self.export_timeout = timeout;
        self
    }

    fn export(&self, pin: u32) -> Result<PathBuf, HardwareError> {
        let dir = self.root.join(format!("gpio{pin}"));
        if dir.join("direction").exists() {
            debug!("GPIO {pin} already exported");
            return Ok(dir);
        }

        fs::write(self.root.join("export"), pin.to_string())
            .map_err(|e| HardwareError::io(pin, "export", e))?;

        // udev creates the node asynchronously after the export write.
        let deadline = Instant::now() + self.export_timeout;
        while !dir.join("direction").exists() {
            if Instant::now() >= deadline {
                return Err(HardwareError::ExportTimeout { pin });
            }
            thread::sleep(EXPORT_POLL);
        }
        Ok(dir)
    }
}

/// Keep the kernel from inverting levels; polarity is applied in software.
fn clear_active_low(dir: &Path, pin: u32) -> Result<(), HardwareError> {
    let path = dir.join("active_low");
    if path.exists() {
        write_attr(&path, pin, "set active_low", "0")?;
    }
    Ok(())
}

fn write_attr(path: &Path, pin: u32, op: &'static str, value: &str) -> Result<(), HardwareError> {
    fs::write(path, value).map_err(|e| HardwareError::io(pin, op, e))
}

fn apply_pull(pin: u32, pull: Pull) -> Result<(), HardwareError> {
    let mode = match pull {
        Pull::None => return Ok(()),
        Pull::PullUp => "pu",
        Pull::PullDown => "pd",
    };

    let tool = BIAS_TOOLS
        .iter()
        .find_map(|name| which::which(name).ok())
        .ok_or_else(|| HardwareError::Bias {
            pin,
            reason: format!("none of {} found on PATH", BIAS_TOOLS.join(", ")),
        })?;

    let pin_arg = pin.to_string();
    let status = Command::new(&tool)
        .args(["set", pin_arg.as_str(), "ip", mode])
        .status()
        .map_err(|e| HardwareError::Bias {
            pin,
            reason: format!("cannot run {}: {e}", tool.display()),
        })?;
    if !status.success() {
        return Err(HardwareError::Bias {
            pin,
            reason: format!("{} exited with {status}", tool.display()),
        });
    }
    debug!("GPIO {pin} bias set to {mode} via {}", tool.display());
    Ok(())
}

impl Hardware for SysfsGpio {
    type Input = SysfsInput;
    type Output = SysfsOutput;

    fn open_input(&mut self, cfg: &PinConfig) -> Result<SysfsInput, HardwareError> {
        let pin = cfg.pin_id;
        let dir = self.export(pin)?;
        write_attr(&dir.join("direction"), pin, "set direction", "in")?;
        clear_active_low(&dir, pin)?;
        apply_pull(pin, cfg.pull)?;

        let value = File::open(dir.join("value")).map_err(|e| HardwareError::io(pin, "open value", e))?;
        info!(target: "hatmond", "shutdown line on GPIO {pin} ({}, pull {:?})", cfg.polarity, cfg.pull);
        Ok(SysfsInput {
            pin,
            value,
            buf: String::with_capacity(4),
        })
    }

    fn open_output(&mut self, cfg: &RunningSignalConfig) -> Result<SysfsOutput, HardwareError> {
        let pin = cfg.pin_id;
        let dir = self.export(pin)?;
        clear_active_low(&dir, pin)?;

        // "high"/"low" sets direction and initial level in one step, so the
        // line never glitches through the opposite level.
        let level = cfg.initial_asserted == cfg.active_high;
        let direction = if level { "high" } else { "low" };
        write_attr(&dir.join("direction"), pin, "set direction", direction)?;

        info!(
            target: "hatmond",
            "running line on GPIO {pin} (active-{})",
            if cfg.active_high { "high" } else { "low" }
        );
        Ok(SysfsOutput {
            pin,
            value: dir.join("value"),
        })
    }
}

pub struct SysfsInput {
    pin: u32,
    value: File,
    buf: String,
}

impl InputLine for SysfsInput {
    fn read_level(&mut self) -> Result<bool, HardwareError> {
        let pin = self.pin;
        self.buf.clear();
        self.value
            .seek(SeekFrom::Start(0))
            .map_err(|e| HardwareError::io(pin, "seek value", e))?;
        self.value
            .read_to_string(&mut self.buf)
            .map_err(|e| HardwareError::io(pin, "read value", e))?;

        match self.buf.trim() {
            "0" => Ok(false),
            "1" => Ok(true),
            other => Err(HardwareError::BadValue {
                pin,
                value: other.to_string(),
            }),
        }
    }
}

pub struct SysfsOutput {
    pin: u32,
    value: PathBuf,
}

impl OutputLine for SysfsOutput {
    fn write_level(&mut self, level: bool) -> Result<(), HardwareError> {
        write_attr(&self.value, self.pin, "write value", if level { "1" } else { "0" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pull_needs_no_tool() {
        assert!(apply_pull(22, Pull::None).is_ok());
    }
}
