//! Input line parsing.

use thiserror::Error;

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/select <id>`: make a conversation active
    Select(String),
    /// `/read <id>`: reset a conversation's unread counter
    Read(String),
    /// `/retry <id>`: resend a failed message
    Retry(String),
    /// `/reconnect`: drop the connection and connect again
    Reconnect,
    /// `/list`: print the conversation list
    List,
    /// `/help`: print the command summary
    Help,
    /// `/quit`: leave
    Quit,
    /// Anything else: send to the active conversation
    Send(String),
    /// Blank line
    Empty,
}

/// Input line that is not a valid command.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// A command that needs an argument got none.
    #[error("/{command} needs an argument")]
    MissingArgument {
        /// Command name without the slash
        command: &'static str,
    },

    /// Unknown slash command.
    #[error("unknown command /{0} (try /help)")]
    Unknown(String),
}

/// Command summary printed by `/help`.
pub const HELP: &str = "\
/select <id>   make a conversation active
/read <id>     mark a conversation as read
/retry <id>    resend a failed message
/reconnect     reconnect now
/list          show conversations
/quit          exit
anything else is sent to the active conversation";

impl Command {
    /// Parse one line of input.
    ///
    /// A line starting with `//` sends the rest, starting with one `/`.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Self::Empty);
        }

        if line.starts_with("//") {
            return Ok(Self::Send(line[1..].to_string()));
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Self::Send(line.to_string()));
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        let required = |command: &'static str| {
            if argument.is_empty() {
                Err(CommandError::MissingArgument { command })
            } else {
                Ok(argument.to_string())
            }
        };

        match name {
            "select" => required("select").map(Self::Select),
            "read" => required("read").map(Self::Read),
            "retry" => required("retry").map(Self::Retry),
            "reconnect" => Ok(Self::Reconnect),
            "list" => Ok(Self::List),
            "help" => Ok(Self::Help),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}
