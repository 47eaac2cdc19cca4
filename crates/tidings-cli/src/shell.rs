//! Interactive loop.
//!
//! Reads input lines and turns them into session commands while rendering
//! whatever the session publishes: connection state, the conversation list,
//! new messages and status changes of messages already shown.

use std::{collections::HashMap, io::Write};

use thiserror::Error;
use tidings_app::{ChatSnapshot, Diagnostic, RuntimeError, SessionHandle};
use tidings_proto::MessageStatus;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt},
    sync::broadcast::error::RecvError,
};

use crate::{
    command::{Command, HELP},
    output::Output,
};

/// Errors that end the shell.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Reading input or writing output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The session runtime went away underneath the shell.
    #[error("session runtime has stopped")]
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Line-oriented chat front end for one session.
pub struct Shell<W: Write> {
    handle: SessionHandle,
    output: Output<W>,
    active: Option<String>,
    /// Messages already printed and the status they were printed with
    shown: HashMap<String, MessageStatus>,
    /// Conversation IDs and unread counts as last listed
    listed: Option<Vec<(String, u32)>>,
}

impl<W: Write> Shell<W> {
    /// Shell driving `handle` and writing to `output`.
    pub fn new(handle: SessionHandle, output: Output<W>) -> Self {
        Self { handle, output, active: None, shown: HashMap::new(), listed: None }
    }

    /// Run until `/quit`, end of input or the runtime stopping. Returns the
    /// output writer.
    pub async fn run<R>(mut self, input: R) -> Result<W, ShellError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut states = self.handle.watch_state();
        let mut snapshots = self.handle.watch_snapshot();
        let mut diagnostics = self.handle.subscribe_diagnostics();

        self.output.notice(&format!(
            "history page size {}; /help for commands",
            self.handle.page_size()
        ))?;
        let state = *states.borrow_and_update();
        self.output.state(state)?;

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if self.execute(&line).await? == Flow::Quit {
                            break;
                        }
                    },
                    None => break,
                },

                changed = states.changed() => {
                    if changed.is_err() {
                        return Err(ShellError::Stopped);
                    }
                    let state = *states.borrow_and_update();
                    self.output.state(state)?;
                },

                changed = snapshots.changed() => {
                    if changed.is_err() {
                        return Err(ShellError::Stopped);
                    }
                    let snapshot = snapshots.borrow_and_update().clone();
                    self.render(&snapshot)?;
                },

                diagnostic = diagnostics.recv() => match diagnostic {
                    Ok(diagnostic) => self.diagnostic(&diagnostic)?,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "diagnostics dropped");
                    },
                    Err(RecvError::Closed) => return Err(ShellError::Stopped),
                },
            }
        }

        Ok(self.output.into_inner())
    }

    async fn execute(&mut self, line: &str) -> Result<Flow, ShellError> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                self.output.notice(&e.to_string())?;
                return Ok(Flow::Continue);
            },
        };

        match command {
            Command::Select(id) => {
                let result = self.handle.select_conversation(Some(id.clone())).await;
                if self.report(result)? {
                    self.output.notice(&format!("active conversation: {id}"))?;
                    self.active = Some(id);
                }
            },
            Command::Read(id) => {
                let result = self.handle.mark_read(id).await;
                self.report(result)?;
            },
            Command::Retry(id) => {
                let result = self.handle.retry(id).await;
                self.report(result)?;
            },
            Command::Reconnect => {
                let result = self.handle.force_reconnect().await;
                self.report(result)?;
            },
            Command::List => {
                let snapshot = self.handle.snapshot();
                self.output.conversations(&snapshot.conversations, self.active.as_deref())?;
            },
            Command::Help => self.output.text(HELP)?,
            Command::Quit => return Ok(Flow::Quit),
            Command::Send(content) => {
                let Some(conversation_id) = self.active.clone() else {
                    self.output.notice("no active conversation (use /select <id>)")?;
                    return Ok(Flow::Continue);
                };
                let result = self.handle.send_message(conversation_id, content).await.map(|_| ());
                self.report(result)?;
            },
            Command::Empty => {},
        }

        Ok(Flow::Continue)
    }

    /// Print a rejected command. Returns whether the command succeeded.
    fn report(&mut self, result: Result<(), RuntimeError>) -> Result<bool, ShellError> {
        match result {
            Ok(()) => Ok(true),
            Err(RuntimeError::Stopped) => Err(ShellError::Stopped),
            Err(RuntimeError::Client(e)) => {
                self.output.notice(&e.to_string())?;
                Ok(false)
            },
        }
    }

    fn diagnostic(&mut self, diagnostic: &Diagnostic) -> Result<(), ShellError> {
        let visible =
            diagnostic.is_failure() || matches!(diagnostic, Diagnostic::SendDeferred { .. });
        if visible {
            self.output.diagnostic(diagnostic)?;
        } else {
            tracing::debug!(%diagnostic, "diagnostic");
        }
        Ok(())
    }

    fn render(&mut self, snapshot: &ChatSnapshot) -> Result<(), ShellError> {
        if !snapshot.is_loading {
            let summary: Vec<_> =
                snapshot.conversations.iter().map(|c| (c.id.clone(), c.unread_count)).collect();
            if self.listed.as_ref() != Some(&summary) {
                self.output.conversations(&snapshot.conversations, self.active.as_deref())?;
                self.listed = Some(summary);
            }
        }

        for message in snapshot.all_messages() {
            match self.shown.get(&message.id) {
                None => self.output.message(message)?,
                Some(status) if *status != message.status => self.output.status(message)?,
                Some(_) => continue,
            }
            self.shown.insert(message.id.clone(), message.status);
        }

        Ok(())
    }
}
