//! Host power-off.

use hatmon_common::PowerOffError;
use std::io;
use std::process::Command;
use tracing::info;

pub trait PowerControl {
    /// Ask the OS to halt the host. `Ok` means the request was accepted;
    /// the caller has nothing left to do but exit.
    fn power_off(&mut self) -> Result<(), PowerOffError>;
}

/// Runs a power-off command such as `sudo /sbin/poweroff`.
pub struct CommandPowerOff {
    command: Vec<String>,
    dry_run: bool,
}

impl CommandPowerOff {
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            dry_run: false,
        }
    }

    pub fn dry_run(command: Vec<String>) -> Self {
        Self {
            command,
            dry_run: true,
        }
    }

    fn display(&self) -> String {
        self.command.join(" ")
    }
}

impl PowerControl for CommandPowerOff {
    fn power_off(&mut self) -> Result<(), PowerOffError> {
        let shown = self.display();
        if self.dry_run {
            info!(target: "hatmond", "dry run: would run {shown:?}");
            return Ok(());
        }

        let Some((program, args)) = self.command.split_first() else {
            return Err(PowerOffError::Spawn {
                command: shown,
                source: io::Error::new(io::ErrorKind::InvalidInput, "empty command"),
            });
        };

        info!(target: "hatmond", "running {shown:?}");
        let status = Command::new(program)
            .args(args)
            .status()
            .map_err(|source| PowerOffError::Spawn {
                command: shown.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(PowerOffError::Failed {
                command: shown,
                status: status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn successful_command_is_accepted() {
        let mut power = CommandPowerOff::new(cmd(&["true"]));
        assert!(power.power_off().is_ok());
    }

    #[test]
    fn failing_command_is_reported() {
        let mut power = CommandPowerOff::new(cmd(&["false"]));
        let err = power.power_off().unwrap_err();
        assert!(matches!(err, PowerOffError::Failed { .. }));
    }

    #[test]
    fn missing_program_is_reported() {
        let mut power = CommandPowerOff::new(cmd(&["/nonexistent/hatmon-poweroff"]));
        let err = power.power_off().unwrap_err();
        assert!(matches!(err, PowerOffError::Spawn { .. }));
    }

    #[test]
    fn empty_command_is_reported() {
        let mut power = CommandPowerOff::new(Vec::new());
        assert!(matches!(power.power_off(), Err(PowerOffError::Spawn { .. })));
    }

    #[test]
    fn dry_run_runs_nothing() {
        let mut power = CommandPowerOff::dry_run(cmd(&["/nonexistent/hatmon-poweroff"]));
        assert!(power.power_off().is_ok());
    }
}
