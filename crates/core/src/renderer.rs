//! Pixel sink abstraction
//!
//! Video hardware does not own a window or a texture. At the end of every
//! frame it hands the finished framebuffer to a [`PixelSink`], and the front
//! end decides what to do with it (blit it, encode it, or drop it).
//!
//! ```text
//! VDP (state management) -> PixelSink trait -> {FrameCapture, NullSink, front end}
//! ```
//!
//! # Usage
//!
//! ```rust
//! use emu_core::renderer::{FrameCapture, PixelSink};
//! use emu_core::types::Frame;
//!
//! let mut sink = FrameCapture::default();
//! sink.present(&Frame::new(320, 256));
//! assert_eq!(sink.frames_presented(), 1);
//! ```

use crate::types::Frame;

/// Receiver for completed frames.
///
/// Pixels are ARGB8888 (0xAARRGGBB).
pub trait PixelSink: Send {
    /// Called once per completed frame
    fn present(&mut self, frame: &Frame);

    /// Get the name of this sink (for debugging/UI)
    fn name(&self) -> &str;
}

/// Sink that discards every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl PixelSink for NullSink {
    fn present(&mut self, _frame: &Frame) {}

    fn name(&self) -> &str {
        "Null Sink"
    }
}

/// Sink that keeps a copy of the most recent frame.
#[derive(Debug, Default)]
pub struct FrameCapture {
    last: Option<Frame>,
    presented: u64,
}

impl FrameCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_frame(&self) -> Option<&Frame> {
        self.last.as_ref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }
}

impl PixelSink for FrameCapture {
    fn present(&mut self, frame: &Frame) {
        match self.last.as_mut() {
            // Reuse the allocation when the geometry did not change.
            Some(last) if last.width == frame.width && last.height == frame.height => {
                last.pixels.copy_from_slice(&frame.pixels);
            }
            _ => self.last = Some(frame.clone()),
        }
        self.presented += 1;
    }

    fn name(&self) -> &str {
        "Frame Capture"
    }
}
