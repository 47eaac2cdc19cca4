//! Terminal output.
//!
//! Everything the CLI shows the user goes through [`Output`]; logs go to
//! stderr through `tracing`.

use std::io::{self, Write};

use tidings_client::{ConnectionPhase, ConnectionState, Diagnostic};
use tidings_proto::{Conversation, Message};

/// Line writer for user-facing output.
pub struct Output<W: Write> {
    writer: W,
    user_id: String,
}

impl<W: Write> Output<W> {
    /// Write to `writer` on behalf of `user_id`.
    pub fn new(writer: W, user_id: impl Into<String>) -> Self {
        Self { writer, user_id: user_id.into() }
    }

    /// Connection state line.
    pub fn state(&mut self, state: ConnectionState) -> io::Result<()> {
        let text = match state.phase {
            ConnectionPhase::Disconnected => "disconnected".to_string(),
            ConnectionPhase::Connecting if state.attempt == 0 => "connecting".to_string(),
            ConnectionPhase::Connecting => format!("connecting (attempt {})", state.attempt),
            ConnectionPhase::Connected => "connected".to_string(),
            ConnectionPhase::Reconnecting => {
                format!("connection lost, reconnecting (attempt {})", state.attempt)
            },
            ConnectionPhase::Closed => "closed (use /reconnect)".to_string(),
        };
        self.line(&format!("* {text}"))
    }

    /// Conversation list, marking the active one.
    pub fn conversations(
        &mut self,
        conversations: &[Conversation],
        active: Option<&str>,
    ) -> io::Result<()> {
        if conversations.is_empty() {
            return self.line("* no conversations");
        }

        for conversation in conversations {
            let marker = if active == Some(conversation.id.as_str()) { '>' } else { ' ' };
            let mut line = format!("{marker} {}  {}", conversation.id, conversation.title);
            if conversation.unread_count > 0 {
                line.push_str(&format!("  ({} unread)", conversation.unread_count));
            }
            if let Some(last) = &conversation.last_message {
                line.push_str(&format!("  last: {}", preview(&last.content)));
            }
            self.line(&line)?;
        }
        Ok(())
    }

    /// A message as it first appears. Own messages carry their status.
    pub fn message(&mut self, message: &Message) -> io::Result<()> {
        let time = message.timestamp.format("%H:%M");
        if message.sender_id == self.user_id {
            self.line(&format!(
                "[{} {time}] you: {} ({}, {})",
                message.conversation_id, message.content, message.status, message.id
            ))
        } else {
            self.line(&format!(
                "[{} {time}] {}: {}",
                message.conversation_id, message.sender_id, message.content
            ))
        }
    }

    /// Status change of a message already shown.
    pub fn status(&mut self, message: &Message) -> io::Result<()> {
        self.line(&format!("  {} is now {}", message.id, message.status))
    }

    /// Diagnostic worth telling the user about.
    pub fn diagnostic(&mut self, diagnostic: &Diagnostic) -> io::Result<()> {
        self.line(&format!("! {diagnostic}"))
    }

    /// Free-form notice.
    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        self.line(&format!("* {text}"))
    }

    /// Plain text block.
    pub fn text(&mut self, text: &str) -> io::Result<()> {
        self.line(text)
    }

    /// Underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.writer, "{text}")?;
        self.writer.flush()
    }
}

/// First line of `content`, cut at 40 characters.
fn preview(content: &str) -> String {
    const MAX: usize = 40;

    let first = content.lines().next().unwrap_or_default();
    if first.chars().count() > MAX {
        let cut: String = first.chars().take(MAX).collect();
        format!("{cut}...")
    } else {
        first.to_string()
    }
}
