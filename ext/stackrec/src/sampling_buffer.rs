use crate::error::SampleError;
use crate::sample::Frame;
use crate::stack_collector::MAX_FRAMES_LIMIT;

/// Scratch space for one capture.
///
/// All arrays have exactly `max_frames` entries; index `i` in each of them
/// refers to the same frame.
#[derive(Debug)]
pub struct SamplingBuffer<R> {
    max_frames: usize,
    stack: Vec<R>,
    lines: Vec<i32>,
    is_native: Vec<bool>,
    locations: Vec<Frame>,
}

/// Mutable window over a `SamplingBuffer`.
pub(crate) struct BufferView<'a, R> {
    pub stack: &'a mut [R],
    pub lines: &'a mut [i32],
    pub is_native: &'a mut [bool],
    pub locations: &'a mut [Frame],
}

impl<R: Copy + Default> SamplingBuffer<R> {
    pub fn new(max_frames: usize) -> Result<Self, SampleError> {
        if max_frames > MAX_FRAMES_LIMIT {
            return Err(SampleError::InvalidMaxFrames(max_frames as i64));
        }
        Ok(SamplingBuffer {
            max_frames,
            stack: vec![R::default(); max_frames],
            lines: vec![0; max_frames],
            is_native: vec![false; max_frames],
            locations: vec![Frame::default(); max_frames],
        })
    }
}

impl<R> SamplingBuffer<R> {
    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub(crate) fn view(&mut self) -> BufferView<'_, R> {
        BufferView {
            stack: &mut self.stack,
            lines: &mut self.lines,
            is_native: &mut self.is_native,
            locations: &mut self.locations,
        }
    }

    pub(crate) fn locations(&self) -> &[Frame] {
        &self.locations
    }
}

impl<'a, R> BufferView<'a, R> {
    pub fn capacity(&self) -> usize {
        self.locations.len()
    }

    /// Detach slot 0 and return it with a view over the remaining slots.
    /// The caller must check `capacity() > 0`.
    pub fn split_first(self) -> (&'a mut Frame, BufferView<'a, R>) {
        let BufferView {
            stack,
            lines,
            is_native,
            locations,
        } = self;
        let (first, locations) = locations.split_at_mut(1);
        let (_, stack) = stack.split_at_mut(1);
        let (_, lines) = lines.split_at_mut(1);
        let (_, is_native) = is_native.split_at_mut(1);
        (
            &mut first[0],
            BufferView {
                stack,
                lines,
                is_native,
                locations,
            },
        )
    }
}
