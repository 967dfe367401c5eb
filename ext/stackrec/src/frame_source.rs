use std::borrow::Cow;

/// Result of walking a thread's stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Walk {
    /// The walk finished; this many frames were written.
    Complete(usize),
    /// The walk stopped early; the frames written so far are valid.
    Interrupted(usize),
    /// The thread is dead (or not yet started).
    ThreadNotAlive,
    /// The thread is alive but has no managed frames to report.
    InNativeCode,
}

/// Provides raw stack frames for threads of the host runtime.
///
/// `walk` and `stack_depth` run on the sampling path and should avoid
/// allocating.
pub trait FrameSource {
    type Thread: Copy;
    /// Opaque frame handle, resolved through `function_name` and `file_name`.
    type RawFrame: Copy + Default;

    /// Write up to `frames.len()` frames of `thread`, starting `start` frames
    /// below the top of the stack. `lines` and `is_native` are parallel to
    /// `frames` and always have the same length.
    fn walk(
        &self,
        thread: Self::Thread,
        start: usize,
        frames: &mut [Self::RawFrame],
        lines: &mut [i32],
        is_native: &mut [bool],
    ) -> Walk;

    /// Total depth of the stack of `thread` (0 if it is not alive).
    fn stack_depth(&self, thread: Self::Thread) -> usize;

    fn function_name(&self, frame: Self::RawFrame) -> Cow<'_, str>;

    fn file_name(&self, frame: Self::RawFrame) -> Cow<'_, str>;
}
