//! Hold-duration detector for the shutdown line.
//!
//! One read per [`HoldDetector::sample`] call; the caller owns the polling
//! cadence. Any inactive sample resets the hold timer, so a bounce during
//! the hold window restarts the wait from zero rather than accumulating.

use crate::config::{PinConfig, Polarity};
use crate::error::HardwareError;
use crate::line::InputLine;
use std::time::{Duration, Instant};

/// What one sample of the shutdown line means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sample {
    Inactive,
    ActiveNotYetHeld,
    ActiveHeld,
}

impl Sample {
    pub fn is_active(self) -> bool {
        !matches!(self, Sample::Inactive)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectorState {
    pub is_active: bool,
    pub active_since: Option<Instant>,
}

pub struct HoldDetector<L> {
    line: L,
    polarity: Polarity,
    min_hold: Duration,
    state: DetectorState,
}

impl<L: InputLine> HoldDetector<L> {
    pub fn new(line: L, cfg: &PinConfig) -> Self {
        Self {
            line,
            polarity: cfg.polarity,
            min_hold: cfg.min_hold(),
            state: DetectorState::default(),
        }
    }

    /// Read the line once and classify it at time `now`.
    pub fn sample(&mut self, now: Instant) -> Result<Sample, HardwareError> {
        let level = self.line.read_level()?;
        Ok(self.observe(level, now))
    }

    /// Classify an already-read electrical level.
    pub fn observe(&mut self, level: bool, now: Instant) -> Sample {
        if !self.polarity.is_active(level) {
            self.state = DetectorState::default();
            return Sample::Inactive;
        }

        let since = *self.state.active_since.get_or_insert(now);
        self.state.is_active = true;

        // A clock that steps backwards yields zero, never a panic.
        if now.saturating_duration_since(since) >= self.min_hold {
            Sample::ActiveHeld
        } else {
            Sample::ActiveNotYetHeld
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn min_hold(&self) -> Duration {
        self.min_hold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Pull;

    struct Fixed(bool);

    impl InputLine for Fixed {
        fn read_level(&mut self) -> Result<bool, HardwareError> {
            Ok(self.0)
        }
    }

    fn detector(polarity: Polarity) -> HoldDetector<Fixed> {
        let cfg = PinConfig {
            pin_id: 22,
            polarity,
            pull: Pull::None,
            min_hold_ms: 600,
        };
        HoldDetector::new(Fixed(false), &cfg)
    }

    #[test]
    fn first_active_sample_records_start() {
        let mut det = detector(Polarity::ActiveHigh);
        let t0 = Instant::now();
        assert_eq!(det.observe(true, t0), Sample::ActiveNotYetHeld);
        assert_eq!(det.state().active_since, Some(t0));
        assert!(det.state().is_active);
    }

    #[test]
    fn inactive_sample_clears_state() {
        let mut det = detector(Polarity::ActiveHigh);
        let t0 = Instant::now();
        det.observe(true, t0);
        assert_eq!(det.observe(false, t0 + Duration::from_millis(5)), Sample::Inactive);
        assert_eq!(det.state(), DetectorState::default());
    }

    #[test]
    fn active_low_treats_low_level_as_request() {
        let mut det = detector(Polarity::ActiveLow);
        let t0 = Instant::now();
        assert_eq!(det.observe(true, t0), Sample::Inactive);
        assert_eq!(det.observe(false, t0), Sample::ActiveNotYetHeld);
        assert_eq!(det.observe(false, t0 + Duration::from_millis(600)), Sample::ActiveHeld);
    }

    #[test]
    fn sample_reads_the_line() {
        let mut det = detector(Polarity::ActiveHigh);
        det.line.0 = true;
        assert_eq!(det.sample(Instant::now()).unwrap(), Sample::ActiveNotYetHeld);
    }
}
