//! In-process sampling profiler core.
//!
//! - Capture the stack of a thread through a [`FrameSource`] (bounded, with
//!   truncation and garbage-collection placeholders)
//! - Aggregate samples into a double-buffered [`StackRecorder`] that never
//!   blocks the sampler
//! - Periodically flip and take the finished profile for encoding

#[macro_use]
extern crate serde_derive;

mod init;

#[cfg(unix)]
pub mod cpu_time;
pub mod error;
pub mod flush_scheduler;
pub mod frame_source;
pub mod profile;
#[cfg(feature = "ruby")]
pub mod ruby_frame_source;
pub mod sample;
pub mod sampling_buffer;
pub mod serialization;
pub mod session;
pub mod stack_collector;
pub mod stack_recorder;

#[cfg(test)]
mod testing;

pub use error::{RecordError, SampleError, SchedulerError, SessionError};
pub use flush_scheduler::FlushScheduler;
pub use frame_source::{FrameSource, Walk};
pub use init::init;
pub use profile::{Profile, ProfileStore};
pub use sample::{Frame, Label, LabelValue, Metric, MetricValues, Sample};
pub use session::configuration::{Configuration, EnabledMetrics};
pub use session::Session;
pub use stack_collector::{DropReason, RecordOutcome, StackCollector};
pub use stack_recorder::{SerializedProfile, StackRecorder};

/// Callback receiving each flushed profile.
pub type ExportFunc<P = Profile> = Box<dyn FnMut(SerializedProfile<P>) + Send + 'static>;
