use std::time::Duration;

use thiserror::Error;

/// Caller-input errors. Returned before the recorder or the frame source is
/// touched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SampleError {
    #[error("invalid max_frames {0}: must be between 0 and 10000")]
    InvalidMaxFrames(i64),
    #[error("label key must not be empty")]
    EmptyLabelKey,
    #[error("duplicate label key {0:?}")]
    DuplicateLabelKey(String),
    #[error("unknown metric {0:?}")]
    UnknownMetric(String),
}

/// Producer-side recording failure. The sample is dropped.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("no active profile slot found, sample dropped")]
    NoActiveSlot,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is not initialized (call start first)")]
    NotInitialized,
    #[error("session already started")]
    AlreadyStarted,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("flush interval {0:?} is too short (minimum is 1ms)")]
    IntervalTooShort(Duration),
    #[error("failed to spawn flush thread")]
    Spawn(#[from] std::io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}
