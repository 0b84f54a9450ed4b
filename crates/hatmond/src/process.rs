//! Best-effort termination of the target application.
//!
//! Matching follows `pkill -u USER PATTERN`: the process must belong to the
//! user and its name must match the pattern. Nothing here is fatal.

use hatmon_common::TerminationError;
use nix::sys::signal::{self, Signal};
use nix::unistd::{Pid, User};
use regex::Regex;
use sysinfo::{ProcessRefreshKind, System, UpdateKind};
use tracing::{debug, info, warn};

pub trait ProcessTerminator {
    /// Ask every matching process to exit. Does not wait for them.
    fn terminate_all(&mut self, user: &str, app: &str) -> Result<TerminationReport, TerminationError>;
}

#[derive(Debug, Default)]
pub struct TerminationReport {
    pub matched: Vec<u32>,
    pub signalled: usize,
    pub failures: Vec<TerminationError>,
}

impl TerminationReport {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

/// One row of the process table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
    pub pid: u32,
    pub uid: Option<u32>,
    pub name: String,
}

/// Pick the pids owned by `uid` whose name matches `pattern`.
pub fn select_targets(entries: &[ProcessEntry], uid: u32, pattern: &Regex, own_pid: u32) -> Vec<u32> {
    let mut pids: Vec<u32> = entries
        .iter()
        .filter(|e| e.pid != own_pid)
        .filter(|e| e.uid == Some(uid))
        .filter(|e| pattern.is_match(&e.name))
        .map(|e| e.pid)
        .collect();
    pids.sort_unstable();
    pids
}

/// SIGTERMs matching processes found through `sysinfo`.
pub struct SystemProcessTerminator {
    dry_run: bool,
}

impl SystemProcessTerminator {
    pub fn new() -> Self {
        Self { dry_run: false }
    }

    /// Match and log, but never send a signal.
    pub fn dry_run() -> Self {
        Self { dry_run: true }
    }

    fn process_table() -> Vec<ProcessEntry> {
        // A plain refresh leaves owners unset; matching needs them.
        let mut system = System::new();
        system.refresh_processes_specifics(ProcessRefreshKind::new().with_user(UpdateKind::Always));
        system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessEntry {
                pid: pid.as_u32(),
                uid: process.user_id().map(|uid| **uid),
                name: process.name().to_string(),
            })
            .collect()
    }
}

impl Default for SystemProcessTerminator {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_uid(user: &str) -> Result<u32, TerminationError> {
    match User::from_name(user) {
        Ok(Some(u)) => Ok(u.uid.as_raw()),
        Ok(None) => Err(TerminationError::UnknownUser(user.to_string())),
        Err(e) => Err(TerminationError::UserLookup {
            user: user.to_string(),
            reason: e.to_string(),
        }),
    }
}

impl ProcessTerminator for SystemProcessTerminator {
    fn terminate_all(&mut self, user: &str, app: &str) -> Result<TerminationReport, TerminationError> {
        let uid = resolve_uid(user)?;
        let pattern = Regex::new(app).map_err(|e| TerminationError::Pattern {
            pattern: app.to_string(),
            reason: e.to_string(),
        })?;

        let entries = Self::process_table();
        let matched = select_targets(&entries, uid, &pattern, std::process::id());
        debug!("{} of {} processes match {app:?} for {user}", matched.len(), entries.len());

        let mut report = TerminationReport {
            matched,
            ..Default::default()
        };
        for &pid in &report.matched {
            if self.dry_run {
                info!(target: "hatmond", "dry run: would send SIGTERM to pid {pid}");
                continue;
            }
            let raw = match i32::try_from(pid) {
                Ok(raw) => raw,
                Err(_) => {
                    report.failures.push(TerminationError::Signal {
                        pid,
                        reason: "pid out of range".to_string(),
                    });
                    continue;
                }
            };
            match signal::kill(Pid::from_raw(raw), Signal::SIGTERM) {
                Ok(()) => report.signalled += 1,
                Err(e) => {
                    warn!(target: "hatmond", "cannot signal pid {pid}: {e}");
                    report.failures.push(TerminationError::Signal {
                        pid,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }
}
