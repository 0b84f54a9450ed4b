//! hatmon common library: configuration, error taxonomy, line capabilities
//! and the hold-duration detector shared by the daemon and its tests.

pub mod clock;
pub mod config;
pub mod detector;
pub mod error;
pub mod line;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    Config, GpioConfig, PinConfig, Polarity, PollTiming, PowerOffConfig, Pull, RunningSignalConfig,
    ShutdownPolicy,
};
pub use detector::{DetectorState, HoldDetector, Sample};
pub use error::{ConfigError, DaemonError, HardwareError, PowerOffError, TerminationError};
pub use line::{Hardware, InputLine, OutputLine, RunningSignal};
