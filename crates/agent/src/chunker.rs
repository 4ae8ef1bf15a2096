//! Output chunker — turns a stream of text fragments into frames.
//!
//! Chat platforms rate-limit edits and cap message length, so text is not
//! forwarded fragment by fragment. Instead the current frame is flushed
//! when its length crosses a threshold that grows after every flush, and a
//! new platform message (segment) is started when the hard ceiling is hit.
//!
//! The chunker is pure: it returns the frames to send and leaves the
//! sending to the engine.

use streambot_core::frame::{OutboundFrame, utf16_len};

/// Flush thresholds, all in UTF-16 code units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerSettings {
    /// Threshold of the first frame of a request or continuation
    pub first_send_len: usize,
    /// Growth of the threshold after each flush; also the threshold of a
    /// segment started by a ceiling flush
    pub send_len_step: usize,
    /// Hard per-message ceiling
    pub message_ceiling: usize,
}

impl Default for ChunkerSettings {
    fn default() -> Self {
        Self {
            first_send_len: 30,
            send_len_step: 500,
            message_ceiling: 3896,
        }
    }
}

pub struct OutputChunker {
    settings: ChunkerSettings,
    frame: OutboundFrame,
    /// UTF-16 length of `frame.content`
    frame_len: usize,
}

impl OutputChunker {
    pub fn new(settings: ChunkerSettings) -> Self {
        Self {
            settings,
            frame: OutboundFrame::new(0, settings.first_send_len),
            frame_len: 0,
        }
    }

    /// Append a fragment, returning a frame to send if one is due.
    pub fn push(&mut self, fragment: &str) -> Option<OutboundFrame> {
        if fragment.is_empty() {
            return None;
        }

        self.frame.content.push_str(fragment);
        self.frame_len += utf16_len(fragment);

        if self.frame_len > self.settings.message_ceiling {
            let full = self.start_segment(self.settings.send_len_step);
            return Some(full);
        }

        if self.frame_len > self.frame.send_len_threshold {
            let snapshot = self.frame.clone();
            self.frame.send_len_threshold += self.settings.send_len_step;
            return Some(snapshot);
        }

        None
    }

    /// Prepare for a continuation: flush whatever the previous iteration
    /// left in the frame and continue in a fresh segment.
    pub fn begin_iteration(&mut self) -> Option<OutboundFrame> {
        if self.frame.content.is_empty() {
            self.frame.send_len_threshold = self.settings.first_send_len;
            return None;
        }
        Some(self.start_segment(self.settings.first_send_len))
    }

    /// The final frame of the request. Always returned, even when empty.
    pub fn finish(self) -> OutboundFrame {
        self.frame
    }

    /// The segment currently being filled.
    pub fn segment(&self) -> usize {
        self.frame.segment
    }

    /// Replace the current frame with an empty one in the next segment,
    /// returning the old frame.
    fn start_segment(&mut self, threshold: usize) -> OutboundFrame {
        let next = OutboundFrame::new(self.frame.segment + 1, threshold);
        self.frame_len = 0;
        std::mem::replace(&mut self.frame, next)
    }
}
