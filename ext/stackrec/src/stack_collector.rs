//! Turns a stack walk of one thread into a `Sample` and records it.

use std::borrow::Cow;

use crate::error::{RecordError, SampleError};
use crate::frame_source::{FrameSource, Walk};
use crate::profile::ProfileStore;
use crate::sample::{validate_labels, Frame, Label, MetricValues, Sample};
use crate::sampling_buffer::{BufferView, SamplingBuffer};
use crate::stack_recorder::StackRecorder;

pub const MAX_FRAMES_LIMIT: usize = 10_000;

/// File name of the synthetic frame marking time spent in garbage collection.
pub const GC_FRAME: &str = "Garbage Collection";
/// File name of the placeholder frame used when a thread has no managed frames.
pub const NATIVE_CODE_FRAME: &str = "In native code";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    Dropped(DropReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// The recorder could not find an active slot in time.
    NoActiveSlot,
    /// There is no recorder to record into.
    NotStarted,
}

/// Samples threads through a `FrameSource`.
///
/// Owns its sampling buffer, which is reused as long as `max_frames` stays
/// the same.
pub struct StackCollector<S: FrameSource> {
    source: S,
    buffer: Option<SamplingBuffer<S::RawFrame>>,
    // Stack reported for `in_gc` with a zero frame budget.
    gc_only: Frame,
}

impl<S: FrameSource> StackCollector<S> {
    pub fn new(source: S) -> Self {
        let mut gc_only = Frame::default();
        gc_only.assign_placeholder(GC_FRAME);
        StackCollector {
            source,
            buffer: None,
            gc_only,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Capture `thread` and record the result into `recorder`.
    pub fn sample<P: ProfileStore>(
        &mut self,
        recorder: &StackRecorder<P>,
        thread: S::Thread,
        values: MetricValues,
        labels: &[Label],
        max_frames: i64,
        in_gc: bool,
    ) -> Result<RecordOutcome, SampleError> {
        let sample = self.capture(thread, max_frames, in_gc, values, labels)?;
        Ok(match recorder.record_sample(&sample) {
            Ok(()) => RecordOutcome::Recorded,
            Err(RecordError::NoActiveSlot) => RecordOutcome::Dropped(DropReason::NoActiveSlot),
        })
    }

    /// Capture the stack of `thread` into a sample borrowing this collector's
    /// buffer.
    ///
    /// With `in_gc`, the first frame is always the synthetic garbage
    /// collection frame. When the stack is deeper than the buffer, the last
    /// frame is replaced by a placeholder stating how many frames were left
    /// out.
    pub fn capture<'a>(
        &'a mut self,
        thread: S::Thread,
        max_frames: i64,
        in_gc: bool,
        values: MetricValues,
        labels: &'a [Label],
    ) -> Result<Sample<'a>, SampleError> {
        let max_frames = validate_max_frames(max_frames)?;
        validate_labels(labels)?;

        if max_frames == 0 {
            // Nothing is walked, but being in GC is still worth reporting.
            let frames: &[Frame] = if in_gc {
                std::slice::from_ref(&self.gc_only)
            } else {
                &[]
            };
            return Ok(Sample {
                frames,
                labels,
                values,
            });
        }

        let buffer = match self.buffer.take() {
            Some(buffer) if buffer.max_frames() == max_frames => self.buffer.insert(buffer),
            _ => self.buffer.insert(SamplingBuffer::new(max_frames)?),
        };

        let view = buffer.view();
        let captured = if in_gc {
            let (gc_frame, rest) = view.split_first();
            gc_frame.assign_placeholder(GC_FRAME);
            1 + Self::walk_into(&self.source, thread, rest)
        } else {
            Self::walk_into(&self.source, thread, view)
        };

        Ok(Sample {
            frames: &buffer.locations()[..captured],
            labels,
            values,
        })
    }

    /// Walk `thread` into `view`, resolve the frames, and apply the truncation
    /// placeholder. Returns the number of frames written.
    fn walk_into(source: &S, thread: S::Thread, view: BufferView<'_, S::RawFrame>) -> usize {
        let capacity = view.capacity();
        if capacity == 0 {
            return 0;
        }
        let BufferView {
            stack,
            lines,
            is_native,
            locations,
        } = view;

        let captured = match source.walk(thread, 0, &mut *stack, &mut *lines, &mut *is_native) {
            Walk::Complete(n) => n.min(capacity),
            Walk::Interrupted(n) => {
                log::debug!("Stack walk interrupted after {} frames", n);
                n.min(capacity)
            }
            Walk::ThreadNotAlive => {
                log::trace!("Thread is not alive. Recording an empty stack.");
                return 0;
            }
            Walk::InNativeCode => {
                locations[0].assign_placeholder(NATIVE_CODE_FRAME);
                return 1;
            }
        };

        // Outermost first, so that native frames can take the file and line
        // of the closest managed caller.
        let mut caller: Option<usize> = None;
        for i in (0..captured).rev() {
            let frame = stack[i];
            let name = source.function_name(frame);
            if is_native[i] {
                let (filename, line) = match caller {
                    Some(c) => (source.file_name(stack[c]), to_line(lines[c])),
                    None => (Cow::Borrowed(""), 0),
                };
                locations[i].assign(&name, &filename, line, true);
            } else {
                let filename = source.file_name(frame);
                locations[i].assign(&name, &filename, to_line(lines[i]), false);
                caller = Some(i);
            }
        }

        if captured == capacity {
            let depth = source.stack_depth(thread);
            if depth > capacity {
                // +1: the placeholder itself takes the place of a real frame.
                locations[capacity - 1].assign_frames_omitted(depth - capacity + 1);
            }
        }

        captured
    }
}

pub(crate) fn validate_max_frames(max_frames: i64) -> Result<usize, SampleError> {
    match usize::try_from(max_frames) {
        Ok(n) if n <= MAX_FRAMES_LIMIT => Ok(n),
        _ => Err(SampleError::InvalidMaxFrames(max_frames)),
    }
}

fn to_line(line: i32) -> u32 {
    u32::try_from(line).unwrap_or(0)
}
