//! Shutdown sequencer.
//!
//! Strictly linear and one-shot:
//! `Triggered -> TerminatingTarget -> GracePeriod -> PoweringOff -> Terminated`.
//! [`ShutdownSequencer::trigger`] consumes the sequencer, so a second run
//! for the same process is impossible. Termination is best-effort; a failed
//! power-off is returned to the caller and never retried.

use crate::power::PowerControl;
use crate::process::{ProcessTerminator, TerminationReport};
use hatmon_common::{Clock, PowerOffError, ShutdownPolicy};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    Triggered,
    TerminatingTarget,
    GracePeriod,
    PoweringOff,
    Terminated,
}

impl fmt::Display for SequencePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SequencePhase::Triggered => "triggered",
            SequencePhase::TerminatingTarget => "terminating target",
            SequencePhase::GracePeriod => "grace period",
            SequencePhase::PoweringOff => "powering off",
            SequencePhase::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// What happened during a completed sequence.
#[derive(Debug)]
pub struct ShutdownReport {
    pub phases: Vec<SequencePhase>,
    /// `None` when the target could not even be looked up.
    pub termination: Option<TerminationReport>,
    pub grace_waited: Duration,
}

pub struct ShutdownSequencer {
    policy: ShutdownPolicy,
    terminator: Box<dyn ProcessTerminator>,
    power: Box<dyn PowerControl>,
    phases: Vec<SequencePhase>,
}

impl ShutdownSequencer {
    pub fn new(
        policy: ShutdownPolicy,
        terminator: Box<dyn ProcessTerminator>,
        power: Box<dyn PowerControl>,
    ) -> Self {
        Self {
            policy,
            terminator,
            power,
            phases: Vec::with_capacity(5),
        }
    }

    fn enter(&mut self, phase: SequencePhase) {
        info!(target: "hatmond", "shutdown sequence: {phase}");
        self.phases.push(phase);
    }

    /// Run the whole sequence. Returns `Ok` only once the OS has accepted the
    /// power-off request; the caller must then exit.
    pub fn trigger(mut self, clock: &dyn Clock) -> Result<ShutdownReport, PowerOffError> {
        self.enter(SequencePhase::Triggered);
        info!(target: "hatmond", "Detected shutdown signal, powering off..");

        self.enter(SequencePhase::TerminatingTarget);
        let termination = self.terminate_target();

        self.enter(SequencePhase::GracePeriod);
        let grace = self.policy.grace();
        let started = clock.now();
        clock.sleep(grace);
        let grace_waited = clock.now().saturating_duration_since(started);

        self.enter(SequencePhase::PoweringOff);
        if let Err(e) = self.power.power_off() {
            error!(target: "hatmond", "power-off failed, host may still be running: {e}");
            return Err(e);
        }

        self.enter(SequencePhase::Terminated);
        Ok(ShutdownReport {
            phases: self.phases,
            termination,
            grace_waited,
        })
    }

    fn terminate_target(&mut self) -> Option<TerminationReport> {
        let user = &self.policy.target_user;
        let app = &self.policy.target_app;
        match self.terminator.terminate_all(user, app) {
            Ok(report) => {
                if report.is_empty() {
                    info!(target: "hatmond", "no {app:?} processes for {user}");
                } else {
                    info!(
                        target: "hatmond",
                        "sent SIGTERM to {} of {} {app:?} processes for {user}",
                        report.signalled,
                        report.matched.len()
                    );
                }
                for failure in &report.failures {
                    warn!(target: "hatmond", "termination: {failure}");
                }
                Some(report)
            }
            Err(e) => {
                warn!(target: "hatmond", "skipping termination of {app:?}: {e}");
                None
            }
        }
    }
}
