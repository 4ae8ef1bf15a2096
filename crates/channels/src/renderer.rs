//! Frame renderer — drains a request's frame channel into a chat platform.
//!
//! Frames of one `segment` describe one platform message: the first frame
//! creates it, later frames edit it. A new segment starts a new message.
//! The renderer keeps its own copy of the last frame with the platform
//! message id filled in; the engine never sees it.

use streambot_core::channel::MessageSink;
use streambot_core::frame::OutboundFrame;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Shown instead of an empty answer.
pub const EMPTY_ANSWER_PLACEHOLDER: &str = "get nothing from llm!";

/// Counters describing one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub created: usize,
    pub edited: usize,
    /// Frames skipped because the platform already shows their content
    pub unchanged: usize,
    /// Create or edit calls the platform rejected
    pub failed: usize,
}

/// Render every frame from `frames` onto `sink` until the channel closes.
///
/// Platform errors are logged and counted; draining always continues so
/// the producer is never left blocked.
pub async fn render_frames(mut frames: mpsc::Receiver<OutboundFrame>, sink: &dyn MessageSink) -> RenderStats {
    let mut stats = RenderStats::default();
    let mut shown: Option<OutboundFrame> = None;

    if let Err(e) = sink.send_typing().await {
        debug!(channel = sink.name(), error = %e, "Typing indicator failed");
    }

    while let Some(mut frame) = frames.recv().await {
        if frame.content.is_empty() {
            // An empty segment after real output has nothing to show
            if shown.is_some() {
                stats.unchanged += 1;
                continue;
            }
            frame.content = EMPTY_ANSWER_PLACEHOLDER.to_string();
        }

        // Carry the id forward while the segment is unchanged
        if let Some(prev) = shown.as_ref().filter(|p| p.segment == frame.segment) {
            frame.platform_message_id = prev.platform_message_id.clone();
            if prev.content == frame.content && prev.platform_message_id.is_some() {
                stats.unchanged += 1;
                continue;
            }
        }

        let delivered = match frame.platform_message_id.clone() {
            Some(message_id) => match sink.edit(&message_id, &frame.content).await {
                Ok(()) => {
                    stats.edited += 1;
                    true
                }
                Err(e) => {
                    warn!(channel = sink.name(), %message_id, error = %e, "Failed to edit message");
                    stats.failed += 1;
                    false
                }
            },
            None => match sink.create(&frame.content).await {
                Ok(message_id) => {
                    debug!(channel = sink.name(), segment = frame.segment, %message_id, "Created message");
                    frame.platform_message_id = Some(message_id);
                    stats.created += 1;
                    true
                }
                Err(e) => {
                    warn!(channel = sink.name(), segment = frame.segment, error = %e, "Failed to create message");
                    stats.failed += 1;
                    false
                }
            },
        };

        // Only what the platform accepted counts as shown
        if delivered {
            shown = Some(frame);
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use streambot_core::error::ChannelError;

    /// Keeps one entry per created message; logs every call.
    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
        calls: Mutex<Vec<String>>,
        fail_creates: usize,
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn create(&self, content: &str) -> Result<String, ChannelError> {
            let mut calls = self.calls.lock().unwrap();
            let attempts = calls.iter().filter(|c| c.starts_with("create")).count();
            calls.push(format!("create:{content}"));
            if attempts < self.fail_creates {
                return Err(ChannelError::DeliveryFailed {
                    channel: "recording".into(),
                    reason: "flood wait".into(),
                });
            }
            let mut messages = self.messages.lock().unwrap();
            messages.push(content.to_string());
            Ok(format!("m{}", messages.len() - 1))
        }

        async fn edit(&self, message_id: &str, content: &str) -> Result<(), ChannelError> {
            self.calls.lock().unwrap().push(format!("edit:{message_id}:{content}"));
            let idx: usize = message_id[1..].parse().unwrap();
            self.messages.lock().unwrap()[idx] = content.to_string();
            Ok(())
        }
    }

    fn frame(segment: usize, content: &str) -> OutboundFrame {
        OutboundFrame {
            content: content.into(),
            send_len_threshold: 30,
            platform_message_id: None,
            segment,
        }
    }

    async fn render(frames: Vec<OutboundFrame>, sink: &RecordingSink) -> RenderStats {
        let (tx, rx) = mpsc::channel(frames.len().max(1));
        for f in frames {
            tx.send(f).await.unwrap();
        }
        drop(tx);
        render_frames(rx, sink).await
    }

    #[tokio::test]
    async fn create_then_edit_per_segment() {
        let sink = RecordingSink::default();
        let stats = render(
            vec![
                frame(0, "Hello"),
                frame(0, "Hello world"),
                frame(1, "Second"),
                frame(1, "Second message"),
            ],
            &sink,
        )
        .await;

        assert_eq!(
            *sink.calls.lock().unwrap(),
            vec![
                "create:Hello",
                "edit:m0:Hello world",
                "create:Second",
                "edit:m1:Second message"
            ]
        );
        assert_eq!(*sink.messages.lock().unwrap(), vec!["Hello world", "Second message"]);
        assert_eq!(
            stats,
            RenderStats {
                created: 2,
                edited: 2,
                unchanged: 0,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn unchanged_content_is_not_re_sent() {
        let sink = RecordingSink::default();
        let stats = render(vec![frame(0, "same"), frame(0, "same")], &sink).await;
        assert_eq!(sink.calls.lock().unwrap().len(), 1);
        assert_eq!(stats.unchanged, 1);
    }

    #[tokio::test]
    async fn empty_answer_shows_placeholder() {
        let sink = RecordingSink::default();
        render(vec![frame(0, "")], &sink).await;
        assert_eq!(*sink.messages.lock().unwrap(), vec![EMPTY_ANSWER_PLACEHOLDER]);
    }

    #[tokio::test]
    async fn empty_trailing_segment_is_skipped() {
        let sink = RecordingSink::default();
        render(vec![frame(0, "full message"), frame(1, "")], &sink).await;
        assert_eq!(*sink.messages.lock().unwrap(), vec!["full message"]);
    }

    #[tokio::test]
    async fn failed_create_is_retried_by_next_frame() {
        let sink = RecordingSink {
            fail_creates: 1,
            ..Default::default()
        };
        let stats = render(vec![frame(0, "Hello"), frame(0, "Hello again")], &sink).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(stats.created, 1);
        assert_eq!(*sink.messages.lock().unwrap(), vec!["Hello again"]);
    }

    #[tokio::test]
    async fn empty_final_frame_after_failed_create_shows_placeholder() {
        let sink = RecordingSink {
            fail_creates: 1,
            ..Default::default()
        };
        let stats = render(vec![frame(0, "Hello"), frame(1, "")], &sink).await;

        assert_eq!(stats.failed, 1);
        assert_eq!(*sink.messages.lock().unwrap(), vec![EMPTY_ANSWER_PLACEHOLDER]);
    }

    #[tokio::test]
    async fn closed_channel_with_no_frames() {
        let sink = RecordingSink::default();
        let stats = render(vec![], &sink).await;
        assert_eq!(stats, RenderStats::default());
        assert!(sink.calls.lock().unwrap().is_empty());
    }
}
