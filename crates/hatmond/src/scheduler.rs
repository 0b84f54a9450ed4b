//! Poll scheduler: owns the lines, drives the detector, fires the sequencer.

use crate::sequencer::{ShutdownReport, ShutdownSequencer};
use hatmon_common::{
    Clock, DaemonError, HoldDetector, InputLine, OutputLine, PollTiming, RunningSignal, Sample,
};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Sleep after a sample: coarse while idle, tight while a press may be in
/// progress so the hold boundary is seen with low latency.
pub fn poll_interval(sample: Sample, timing: &PollTiming) -> Duration {
    match sample {
        Sample::Inactive => timing.idle(),
        Sample::ActiveNotYetHeld | Sample::ActiveHeld => timing.active(),
    }
}

pub struct PollScheduler<I, O, C> {
    detector: HoldDetector<I>,
    running: RunningSignal<O>,
    initial_asserted: bool,
    timing: PollTiming,
    clock: C,
    sequencer: ShutdownSequencer,
}

impl<I, O, C> PollScheduler<I, O, C>
where
    I: InputLine,
    O: OutputLine,
    C: Clock,
{
    pub fn new(
        detector: HoldDetector<I>,
        running: RunningSignal<O>,
        initial_asserted: bool,
        timing: PollTiming,
        clock: C,
        sequencer: ShutdownSequencer,
    ) -> Self {
        Self {
            detector,
            running,
            initial_asserted,
            timing,
            clock,
            sequencer,
        }
    }

    /// Assert the running line and poll until a held press is seen.
    ///
    /// Returns only after the shutdown sequence finished or on a fatal
    /// error. The sequencer is consumed on the first held sample, so the
    /// loop can never fire it twice.
    pub fn run(self) -> Result<ShutdownReport, DaemonError> {
        let Self {
            mut detector,
            mut running,
            initial_asserted,
            timing,
            clock,
            sequencer,
        } = self;

        if !initial_asserted {
            warn!(target: "hatmond", "running line starts deasserted; the hat will treat the host as down");
        }
        running.set(initial_asserted)?;
        info!(
            target: "hatmond",
            "monitoring shutdown line (hold {} ms, idle poll {} ms, active poll {} ms)",
            detector.min_hold().as_millis(),
            timing.idle_ms,
            timing.active_ms
        );

        let mut previous = Sample::Inactive;
        loop {
            let sample = detector.sample(clock.now())?;

            if sample == Sample::ActiveHeld {
                info!(target: "hatmond", "shutdown line held for {} ms", detector.min_hold().as_millis());
                return sequencer.trigger(&clock).map_err(DaemonError::from);
            }

            match (previous.is_active(), sample.is_active()) {
                (false, true) => debug!("shutdown line active, polling every {} ms", timing.active_ms),
                (true, false) => debug!("shutdown line released before hold time"),
                _ => {}
            }
            previous = sample;

            clock.sleep(poll_interval(sample, &timing));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_is_adaptive() {
        let timing = PollTiming::default();
        assert_eq!(poll_interval(Sample::Inactive, &timing), Duration::from_millis(1000));
        assert_eq!(poll_interval(Sample::ActiveNotYetHeld, &timing), Duration::from_millis(20));
        assert_eq!(poll_interval(Sample::ActiveHeld, &timing), Duration::from_millis(20));
    }
}
