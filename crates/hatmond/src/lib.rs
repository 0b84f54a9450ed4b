//! hatmon daemon library - exposes modules for testing.

pub mod cli;
pub mod daemon;
pub mod gpio;
pub mod power;
pub mod process;
pub mod scheduler;
pub mod sequencer;

pub use daemon::{bootstrap, Actions};
pub use scheduler::PollScheduler;
pub use sequencer::{SequencePhase, ShutdownReport, ShutdownSequencer};
