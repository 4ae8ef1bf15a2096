//! Outbound frames — the unit handed from the engine to a renderer.

use serde::{Deserialize, Serialize};

/// A snapshot of buffered answer text on its way to the user.
///
/// Frames with the same `segment` describe the same platform message:
/// the first one is sent as a new message, later ones edit it with the
/// longer content. The engine never fills `platform_message_id`; a
/// renderer sets it on its own copy once the platform has assigned one.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OutboundFrame {
    /// Accumulated text of this segment so far
    pub content: String,

    /// Length (UTF-16 units) the content must exceed before the next flush
    pub send_len_threshold: usize,

    /// Platform message id, filled in by the renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform_message_id: Option<String>,

    /// Which user-visible message this frame belongs to (0-based)
    pub segment: usize,
}

impl OutboundFrame {
    pub fn new(segment: usize, send_len_threshold: usize) -> Self {
        Self {
            content: String::new(),
            send_len_threshold,
            platform_message_id: None,
            segment,
        }
    }
}

/// Length of `s` in UTF-16 code units, the unit chat platforms limit on.
pub fn utf16_len(s: &str) -> usize {
    s.encode_utf16().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_counts_surrogate_pairs() {
        assert_eq!(utf16_len("abc"), 3);
        assert_eq!(utf16_len("你好"), 2);
        // Emoji outside the BMP take two code units
        assert_eq!(utf16_len("🦀"), 2);
    }

    #[test]
    fn new_frame_is_empty() {
        let frame = OutboundFrame::new(2, 30);
        assert!(frame.content.is_empty());
        assert_eq!(frame.segment, 2);
        assert!(frame.platform_message_id.is_none());
    }
}
