pub mod configuration;

use std::sync::Arc;
use std::time::SystemTime;

use self::configuration::Configuration;
use crate::error::{SampleError, SchedulerError, SessionError};
use crate::flush_scheduler::FlushScheduler;
use crate::frame_source::FrameSource;
use crate::profile::{Profile, ProfileStore};
use crate::sample::{Label, MetricValues};
use crate::stack_collector::{self, DropReason, RecordOutcome, StackCollector};
use crate::stack_recorder::{SerializedProfile, StackRecorder};
use crate::ExportFunc;

/// Owns the live recorder of a profiling session.
///
/// Samplers get the recorder by reference through `record_sample` (or an
/// `Arc` through `recorder`); nothing here is global, so a child process
/// after `fork` or a test can simply build its own.
pub struct Session<P: ProfileStore = Profile> {
    configuration: Configuration,
    recorder: Option<Arc<StackRecorder<P>>>,
}

impl<P: ProfileStore + Send> Session<P> {
    pub fn new(configuration: Configuration) -> Self {
        crate::init();
        Session {
            configuration,
            recorder: None,
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn start(&mut self) -> Result<Arc<StackRecorder<P>>, SessionError> {
        if self.recorder.is_some() {
            return Err(SessionError::AlreadyStarted);
        }
        let recorder = Arc::new(StackRecorder::new(self.configuration.enabled_metrics));
        self.recorder = Some(Arc::clone(&recorder));
        log::debug!(
            "Session started with value types {:?}",
            recorder.value_types()
        );
        Ok(recorder)
    }

    pub fn is_started(&self) -> bool {
        self.recorder.is_some()
    }

    pub fn recorder(&self) -> Result<Arc<StackRecorder<P>>, SessionError> {
        self.recorder
            .as_ref()
            .map(Arc::clone)
            .ok_or(SessionError::NotInitialized)
    }

    /// Sample `thread` and record it.
    ///
    /// Input is validated before anything else happens. A session that is not
    /// started drops the sample instead of failing.
    #[allow(clippy::too_many_arguments)]
    pub fn record_sample<S: FrameSource>(
        &self,
        collector: &mut StackCollector<S>,
        thread: S::Thread,
        values: MetricValues,
        string_labels: &[(&str, &str)],
        numeric_labels: &[(&str, i64)],
        max_frames: i64,
        in_gc: bool,
    ) -> Result<RecordOutcome, SampleError> {
        stack_collector::validate_max_frames(max_frames)?;
        let labels = Label::from_pairs(string_labels, numeric_labels)?;

        let recorder: &StackRecorder<P> = match &self.recorder {
            Some(recorder) => recorder,
            None => return Ok(RecordOutcome::Dropped(DropReason::NotStarted)),
        };
        collector.sample(recorder, thread, values, &labels, max_frames, in_gc)
    }

    /// `record_sample` with the configured `max_frames`.
    pub fn sample_thread<S: FrameSource>(
        &self,
        collector: &mut StackCollector<S>,
        thread: S::Thread,
        values: MetricValues,
        string_labels: &[(&str, &str)],
        numeric_labels: &[(&str, i64)],
        in_gc: bool,
    ) -> Result<RecordOutcome, SampleError> {
        let max_frames = i64::try_from(self.configuration.max_frames).unwrap_or(i64::MAX);
        self.record_sample(
            collector,
            thread,
            values,
            string_labels,
            numeric_labels,
            max_frames,
            in_gc,
        )
    }

    /// Flush the live recorder every `flush_interval` into `exporter`.
    pub fn start_flush_scheduler(
        &self,
        exporter: ExportFunc<P>,
    ) -> Result<FlushScheduler, SchedulerError>
    where
        P: 'static,
    {
        let recorder = self.recorder()?;
        FlushScheduler::start(recorder, self.configuration.flush_interval, exporter)
    }

    /// Flip the recorder and return the profile gathered since the last call.
    pub fn serialize(&self, finish: SystemTime) -> Result<SerializedProfile<P>, SessionError> {
        let recorder = self.recorder.as_ref().ok_or(SessionError::NotInitialized)?;
        Ok(recorder.serialize(finish))
    }

    /// Serialize one last time and release the recorder.
    pub fn stop(&mut self) -> Result<SerializedProfile<P>, SessionError> {
        let serialized = self.serialize(SystemTime::now())?;
        self.recorder = None;
        log::debug!("Session stopped");
        Ok(serialized)
    }

    /// Replace the recorder with a fresh one. Call in the child after `fork`:
    /// locks inherited from the parent are never reused.
    pub fn reset_after_fork(&mut self) {
        if let Some(recorder) = self.recorder.as_mut() {
            *recorder = Arc::new(StackRecorder::new(self.configuration.enabled_metrics));
            log::debug!("Session reset after fork");
        }
    }
}
