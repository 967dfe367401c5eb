use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::error::SchedulerError;
use crate::profile::ProfileStore;
use crate::stack_recorder::StackRecorder;
use crate::ExportFunc;

pub const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct Shared {
    stop_requested: Mutex<bool>,
    wakeup: Condvar,
}

/// Background thread flipping a recorder every `interval` and handing each
/// non-empty profile to an exporter.
///
/// Stopping (explicitly or by dropping) wakes the thread, joins it and
/// flushes once more so nothing recorded before the stop is lost.
#[derive(Debug)]
pub struct FlushScheduler {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    pub fn start<P: ProfileStore + Send + 'static>(
        recorder: Arc<StackRecorder<P>>,
        interval: Duration,
        exporter: ExportFunc<P>,
    ) -> Result<Self, SchedulerError> {
        if interval < MIN_FLUSH_INTERVAL {
            return Err(SchedulerError::IntervalTooShort(interval));
        }

        let shared = Arc::new(Shared::default());
        let thread_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("stackrec-flush".to_owned())
            .spawn(move || Self::thread_main_loop(thread_shared, recorder, interval, exporter))?;
        log::debug!("Flush thread started (interval: {:?})", interval);

        Ok(FlushScheduler {
            shared,
            handle: Some(handle),
        })
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        let handle = match self.handle.take() {
            Some(handle) => handle,
            None => return,
        };
        *self.shared.stop_requested.lock() = true;
        self.shared.wakeup.notify_one();
        if handle.join().is_err() {
            log::warn!("Flush thread panicked");
        }
        log::debug!("Flush thread stopped");
    }

    fn thread_main_loop<P: ProfileStore + Send>(
        shared: Arc<Shared>,
        recorder: Arc<StackRecorder<P>>,
        interval: Duration,
        mut exporter: ExportFunc<P>,
    ) {
        let mut stop_requested = shared.stop_requested.lock();
        loop {
            if !*stop_requested {
                shared.wakeup.wait_for(&mut stop_requested, interval);
            }
            let stopping = *stop_requested;
            MutexGuard::unlocked(&mut stop_requested, || flush(&recorder, &mut exporter));
            if stopping {
                break;
            }
        }
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn flush<P: ProfileStore + Send>(recorder: &StackRecorder<P>, exporter: &mut ExportFunc<P>) {
    let serialized = recorder.serialize(SystemTime::now());
    if serialized.profile.is_empty() {
        log::trace!("Nothing recorded since last flush, skipping");
        return;
    }
    log::debug!(
        "Flushing profile covering {:?}",
        serialized
            .finish
            .duration_since(serialized.start)
            .unwrap_or_default()
    );
    exporter(serialized);
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::sample::{Frame, Metric, MetricValues, Sample};
    use crate::session::configuration::EnabledMetrics;
    use crate::stack_recorder::SerializedProfile;

    fn record(recorder: &StackRecorder, cpu_time_ns: u64) {
        let frames = vec![Frame::new("main", "app.rb", 1, false)];
        let values = MetricValues {
            cpu_time_ns,
            ..Default::default()
        };
        recorder
            .record_sample(&Sample::new(&frames, &[], values).unwrap())
            .unwrap();
    }

    fn channel_exporter() -> (ExportFunc, mpsc::Receiver<SerializedProfile>) {
        let (tx, rx) = mpsc::channel();
        let exporter: ExportFunc = Box::new(move |serialized| {
            let _ = tx.send(serialized);
        });
        (exporter, rx)
    }

    #[test]
    fn test_interval_too_short() {
        let recorder = Arc::new(StackRecorder::new(EnabledMetrics::default()));
        let (exporter, _rx) = channel_exporter();
        assert!(matches!(
            FlushScheduler::start(recorder, Duration::ZERO, exporter),
            Err(SchedulerError::IntervalTooShort(_))
        ));
    }

    #[test]
    fn test_periodic_flush() {
        let recorder = Arc::new(StackRecorder::new(EnabledMetrics::default()));
        let (exporter, rx) = channel_exporter();
        let scheduler =
            FlushScheduler::start(Arc::clone(&recorder), Duration::from_millis(5), exporter)
                .unwrap();

        record(&recorder, 7);
        let serialized = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(serialized.profile.total(Metric::CpuTime), Some(7));
        scheduler.stop();
    }

    #[test]
    fn test_empty_profiles_are_skipped() {
        let recorder: Arc<StackRecorder> = Arc::new(StackRecorder::new(EnabledMetrics::default()));
        let (exporter, rx) = channel_exporter();
        let scheduler =
            FlushScheduler::start(Arc::clone(&recorder), Duration::from_millis(1), exporter)
                .unwrap();
        thread::sleep(Duration::from_millis(30));
        scheduler.stop();
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_stop_flushes_pending_samples() {
        let recorder = Arc::new(StackRecorder::new(EnabledMetrics::default()));
        let (exporter, rx) = channel_exporter();
        let scheduler =
            FlushScheduler::start(Arc::clone(&recorder), Duration::from_secs(3600), exporter)
                .unwrap();

        record(&recorder, 3);
        record(&recorder, 4);
        scheduler.stop();

        let serialized = rx.try_recv().unwrap();
        assert_eq!(serialized.profile.total(Metric::CpuTime), Some(7));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_stops_thread() {
        let recorder = Arc::new(StackRecorder::new(EnabledMetrics::default()));
        let (exporter, rx) = channel_exporter();
        {
            let _scheduler =
                FlushScheduler::start(Arc::clone(&recorder), Duration::from_secs(3600), exporter)
                    .unwrap();
            record(&recorder, 1);
        }
        assert_eq!(
            rx.try_recv().unwrap().profile.total(Metric::CpuTime),
            Some(1)
        );
        // The flush thread held the only other reference.
        assert_eq!(Arc::strong_count(&recorder), 1);
    }
}
