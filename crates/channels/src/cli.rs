//! CLI channel — terminal output and stdin input.
//!
//! A terminal cannot edit what it already printed, so [`CliSink`] prints
//! only the part of each edit that extends the message. Used by
//! `streambot chat`.

use async_trait::async_trait;
use std::io::{self, Write};
use std::sync::{Mutex, PoisonError};
use streambot_core::channel::MessageSink;
use streambot_core::error::ChannelError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// Prints streamed answers incrementally.
pub struct CliSink {
    out: Mutex<Box<dyn Write + Send>>,
    /// What has been printed for each message, by id
    printed: Mutex<Vec<String>>,
}

impl CliSink {
    pub fn stdout() -> Self {
        Self::with_writer(io::stdout())
    }

    pub fn with_writer(out: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(out)),
            printed: Mutex::new(Vec::new()),
        }
    }

    /// Finish the current answer with a newline.
    pub fn end_answer(&self) -> Result<(), ChannelError> {
        let has_output = !self.printed.lock().unwrap_or_else(PoisonError::into_inner).is_empty();
        if has_output {
            self.write("\n")?;
        }
        self.printed.lock().unwrap_or_else(PoisonError::into_inner).clear();
        Ok(())
    }

    fn write(&self, text: &str) -> Result<(), ChannelError> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| ChannelError::DeliveryFailed {
                channel: "cli".into(),
                reason: e.to_string(),
            })
    }
}

impl Default for CliSink {
    fn default() -> Self {
        Self::stdout()
    }
}

#[async_trait]
impl MessageSink for CliSink {
    fn name(&self) -> &str {
        "cli"
    }

    async fn create(&self, content: &str) -> Result<String, ChannelError> {
        let id = {
            let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
            printed.push(content.to_string());
            printed.len() - 1
        };
        if id > 0 {
            self.write("\n\n")?;
        }
        self.write(content)?;
        Ok(id.to_string())
    }

    async fn edit(&self, message_id: &str, content: &str) -> Result<(), ChannelError> {
        let edit_failed = |reason: &str| ChannelError::EditFailed {
            channel: "cli".into(),
            message_id: message_id.to_string(),
            reason: reason.to_string(),
        };
        let id: usize = message_id.parse().map_err(|_| edit_failed("not a cli message id"))?;

        let suffix = {
            let mut printed = self.printed.lock().unwrap_or_else(PoisonError::into_inner);
            let shown = printed.get_mut(id).ok_or_else(|| edit_failed("unknown message"))?;
            let suffix = match content.strip_prefix(shown.as_str()) {
                Some(rest) => rest.to_string(),
                // Not an extension of what is on screen; reprint it whole
                None => format!("\n{content}"),
            };
            *shown = content.to_string();
            suffix
        };
        self.write(&suffix)
    }
}

/// Read prompts from stdin, one per line, until EOF or an exit command.
///
/// Blank lines are skipped.
pub fn spawn_stdin_reader() -> mpsc::Receiver<Result<String, ChannelError>> {
    let (tx, rx) = mpsc::channel(8);

    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    if is_exit_command(&line) {
                        break;
                    }
                    if tx.send(Ok(line)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF (Ctrl+D)
                Err(e) => {
                    let _ = tx.send(Err(ChannelError::ConnectionLost(e.to_string()))).await;
                    break;
                }
            }
        }
    });

    rx
}

pub fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit" | ":q")
}
