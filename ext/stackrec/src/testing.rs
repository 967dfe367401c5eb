use std::borrow::Cow;
use std::collections::HashMap;

use crate::frame_source::{FrameSource, Walk};
use crate::sample::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ThreadState {
    Alive,
    Dead,
    InNativeCode,
    /// The walk fails after writing this many frames.
    InterruptAfter(usize),
}

struct FakeFrame {
    name: String,
    filename: String,
    line: i32,
    is_native: bool,
}

struct FakeThread {
    // Indices into `frames`, top of stack first.
    stack: Vec<usize>,
    state: ThreadState,
}

/// In-memory frame source with scripted threads.
pub(crate) struct FakeFrameSource {
    frames: Vec<FakeFrame>,
    threads: HashMap<u64, FakeThread>,
}

impl FakeFrameSource {
    pub fn new() -> Self {
        FakeFrameSource {
            frames: vec![],
            threads: HashMap::new(),
        }
    }

    /// Register `thread` with `stack` (name, filename, line, is_native), top first.
    pub fn add_thread(&mut self, thread: u64, stack: &[(&str, &str, i32, bool)]) {
        let stack = stack
            .iter()
            .map(|(name, filename, line, is_native)| {
                self.frames.push(FakeFrame {
                    name: name.to_string(),
                    filename: filename.to_string(),
                    line: *line,
                    is_native: *is_native,
                });
                self.frames.len() - 1
            })
            .collect();
        self.threads.insert(
            thread,
            FakeThread {
                stack,
                state: ThreadState::Alive,
            },
        );
    }

    /// Register `thread` with `depth` managed frames named `frame_<i>` on line `i`.
    pub fn add_deep_thread(&mut self, thread: u64, depth: usize) {
        let names: Vec<String> = (0..depth).map(|i| format!("frame_{}", i)).collect();
        let stack: Vec<(&str, &str, i32, bool)> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), "deep.rb", i as i32, false))
            .collect();
        self.add_thread(thread, &stack);
    }

    pub fn set_state(&mut self, thread: u64, state: ThreadState) {
        if let Some(t) = self.threads.get_mut(&thread) {
            t.state = state;
        }
    }

    /// Expected recorded frame for managed frame `i` of a deep thread.
    pub fn deep_frame(i: usize) -> Frame {
        Frame::new(&format!("frame_{}", i), "deep.rb", i as u32, false)
    }
}

impl FrameSource for FakeFrameSource {
    type Thread = u64;
    type RawFrame = usize;

    fn walk(
        &self,
        thread: u64,
        start: usize,
        frames: &mut [usize],
        lines: &mut [i32],
        is_native: &mut [bool],
    ) -> Walk {
        let t = match self.threads.get(&thread) {
            Some(t) => t,
            None => return Walk::ThreadNotAlive,
        };
        let limit = match t.state {
            ThreadState::Dead => return Walk::ThreadNotAlive,
            ThreadState::InNativeCode => return Walk::InNativeCode,
            ThreadState::Alive => frames.len(),
            ThreadState::InterruptAfter(n) => n.min(frames.len()),
        };

        let mut written = 0;
        for &index in t.stack.iter().skip(start).take(limit) {
            frames[written] = index;
            lines[written] = self.frames[index].line;
            is_native[written] = self.frames[index].is_native;
            written += 1;
        }

        match t.state {
            ThreadState::InterruptAfter(n) if t.stack.len().saturating_sub(start) > n => {
                Walk::Interrupted(written)
            }
            _ => Walk::Complete(written),
        }
    }

    fn stack_depth(&self, thread: u64) -> usize {
        match self.threads.get(&thread) {
            Some(t) if t.state != ThreadState::Dead => t.stack.len(),
            _ => 0,
        }
    }

    fn function_name(&self, frame: usize) -> Cow<'_, str> {
        Cow::Borrowed(&self.frames[frame].name)
    }

    fn file_name(&self, frame: usize) -> Cow<'_, str> {
        Cow::Borrowed(&self.frames[frame].filename)
    }
}
