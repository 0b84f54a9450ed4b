//! Wiring from a validated [`Config`] to a ready [`PollScheduler`].

use crate::power::{CommandPowerOff, PowerControl};
use crate::process::{ProcessTerminator, SystemProcessTerminator};
use crate::scheduler::PollScheduler;
use crate::sequencer::ShutdownSequencer;
use hatmon_common::{Clock, Config, DaemonError, Hardware, HoldDetector, RunningSignal};
use tracing::info;

/// The two irreversible side effects of a shutdown.
pub struct Actions {
    pub terminator: Box<dyn ProcessTerminator>,
    pub power: Box<dyn PowerControl>,
}

impl Actions {
    pub fn system(config: &Config, dry_run: bool) -> Self {
        let command = config.power.command.clone();
        if dry_run {
            info!(target: "hatmond", "dry run: processes and power stay untouched");
            Self {
                terminator: Box::new(SystemProcessTerminator::dry_run()),
                power: Box::new(CommandPowerOff::dry_run(command)),
            }
        } else {
            Self {
                terminator: Box::new(SystemProcessTerminator::new()),
                power: Box::new(CommandPowerOff::new(command)),
            }
        }
    }
}

/// Open both lines and assemble the scheduler. Only call this with a
/// configuration that already loaded cleanly.
pub fn bootstrap<H, C>(
    config: &Config,
    hardware: &mut H,
    clock: C,
    actions: Actions,
) -> Result<PollScheduler<H::Input, H::Output, C>, DaemonError>
where
    H: Hardware,
    C: Clock,
{
    let input = hardware.open_input(&config.shutdown)?;
    let output = hardware.open_output(&config.running)?;

    let detector = HoldDetector::new(input, &config.shutdown);
    let running = RunningSignal::new(output, &config.running);
    let sequencer = ShutdownSequencer::new(config.policy.clone(), actions.terminator, actions.power);

    Ok(PollScheduler::new(
        detector,
        running,
        config.running.initial_asserted,
        config.poll,
        clock,
        sequencer,
    ))
}
