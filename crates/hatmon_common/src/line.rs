//! Digital line capabilities.
//!
//! Levels here are raw electrical levels (`true` = high). Polarity is
//! applied by the detector and by [`RunningSignal`], never by the line.

use crate::config::{PinConfig, RunningSignalConfig};
use crate::error::HardwareError;

pub trait InputLine {
    fn read_level(&mut self) -> Result<bool, HardwareError>;
}

pub trait OutputLine {
    fn write_level(&mut self, level: bool) -> Result<(), HardwareError>;
}

/// Opens the two lines the daemon needs.
pub trait Hardware {
    type Input: InputLine;
    type Output: OutputLine;

    fn open_input(&mut self, cfg: &PinConfig) -> Result<Self::Input, HardwareError>;
    fn open_output(&mut self, cfg: &RunningSignalConfig) -> Result<Self::Output, HardwareError>;
}

/// The "host is running" heartbeat line with its polarity applied.
pub struct RunningSignal<O> {
    line: O,
    active_high: bool,
    asserted: bool,
}

impl<O: OutputLine> RunningSignal<O> {
    pub fn new(line: O, cfg: &RunningSignalConfig) -> Self {
        Self {
            line,
            active_high: cfg.active_high,
            asserted: false,
        }
    }

    pub fn set(&mut self, asserted: bool) -> Result<(), HardwareError> {
        self.line.write_level(asserted == self.active_high)?;
        self.asserted = asserted;
        Ok(())
    }

    pub fn is_asserted(&self) -> bool {
        self.asserted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder(Vec<bool>);

    impl OutputLine for &mut Recorder {
        fn write_level(&mut self, level: bool) -> Result<(), HardwareError> {
            self.0.push(level);
            Ok(())
        }
    }

    #[test]
    fn active_low_running_line_drives_low_when_asserted() {
        let mut rec = Recorder::default();
        let cfg = RunningSignalConfig {
            pin_id: 23,
            active_high: false,
            initial_asserted: true,
        };
        let mut signal = RunningSignal::new(&mut rec, &cfg);
        signal.set(true).unwrap();
        assert!(signal.is_asserted());
        drop(signal);
        assert_eq!(rec.0, vec![false]);
    }
}
