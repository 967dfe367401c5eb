#![deny(unsafe_op_in_unsafe_fn)]

//! `FrameSource` backed by the public CRuby profiling API.
//!
//! Every method must be called while holding the GVL (for example from a
//! postponed job). Frame handles are resolved within the same capture, before
//! the VM gets a chance to collect them.

use std::borrow::Cow;
use std::ffi::CStr;

use rb_sys::*;

use crate::frame_source::{FrameSource, Walk};

// Convert str literal to C string literal
macro_rules! cstr {
    ($s:expr) => {
        concat!($s, "\0").as_ptr() as *const std::ffi::c_char
    };
}

// Frames fetched per call while measuring the depth of a stack.
const DEPTH_CHUNK: usize = 256;

#[allow(non_snake_case)]
fn RTEST(v: VALUE) -> bool {
    v != Qfalse as VALUE && v != Qnil as VALUE
}

#[derive(Clone, Copy, Debug, Default)]
pub struct RubyFrameSource;

impl RubyFrameSource {
    pub fn new() -> Self {
        RubyFrameSource
    }

    fn is_alive(thread: VALUE) -> bool {
        RTEST(unsafe { rb_funcall(thread, rb_intern(cstr!("alive?")), 0) })
    }

    fn string_value(mut value: VALUE) -> Cow<'static, str> {
        if !RTEST(value) {
            return Cow::Borrowed("");
        }
        let ptr = unsafe { rb_string_value_cstr(&mut value) };
        Cow::Owned(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }
}

impl FrameSource for RubyFrameSource {
    type Thread = VALUE;
    type RawFrame = VALUE;

    fn walk(
        &self,
        thread: VALUE,
        start: usize,
        frames: &mut [VALUE],
        lines: &mut [i32],
        is_native: &mut [bool],
    ) -> Walk {
        if !Self::is_alive(thread) {
            return Walk::ThreadNotAlive;
        }
        let limit = frames.len().min(lines.len()).min(is_native.len());
        let written = unsafe {
            rb_profile_thread_frames(
                thread,
                start as i32,
                limit as i32,
                frames.as_mut_ptr(),
                lines.as_mut_ptr(),
            )
        };
        let written = usize::try_from(written).unwrap_or(0).min(limit);
        for (frame, native) in frames[..written].iter().zip(is_native.iter_mut()) {
            // Only iseq-backed frames have a path.
            *native = !RTEST(unsafe { rb_profile_frame_path(*frame) });
        }
        Walk::Complete(written)
    }

    fn stack_depth(&self, thread: VALUE) -> usize {
        if !Self::is_alive(thread) {
            return 0;
        }
        let mut frames = [0 as VALUE; DEPTH_CHUNK];
        let mut lines = [0i32; DEPTH_CHUNK];
        let mut depth = 0;
        loop {
            let n = unsafe {
                rb_profile_thread_frames(
                    thread,
                    depth as i32,
                    DEPTH_CHUNK as i32,
                    frames.as_mut_ptr(),
                    lines.as_mut_ptr(),
                )
            };
            let n = usize::try_from(n).unwrap_or(0);
            depth += n;
            if n < DEPTH_CHUNK {
                return depth;
            }
        }
    }

    fn function_name(&self, frame: VALUE) -> Cow<'_, str> {
        Self::string_value(unsafe { rb_profile_frame_full_label(frame) })
    }

    fn file_name(&self, frame: VALUE) -> Cow<'_, str> {
        Self::string_value(unsafe { rb_profile_frame_path(frame) })
    }
}
