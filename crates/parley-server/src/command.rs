//! Slash commands.
//!
//! A chat message whose text starts with `/` is never broadcast. It is
//! answered privately to the sender with a system notice in the same room.

use chrono::{DateTime, Utc};

/// Text of the `/help` reply.
pub const HELP_TEXT: &str = "Available commands:\n/help - List commands\n/list - Number of \
                             connected users\n/hello - Greeting from the server\n/date - Current \
                             date";

/// A parsed slash command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `/help`
    Help,
    /// `/list`
    List,
    /// `/hello`
    Hello,
    /// `/date`
    Date,
    /// Anything else starting with `/`
    Unknown(String),
}

/// What a command reply may depend on.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Identity of the sender
    pub identity: &'a str,
    /// Number of connected identities
    pub connected: usize,
    /// Seconds since the Unix epoch
    pub wall_clock_secs: u64,
}

impl Command {
    /// Parse chat text. `None` unless the first character is `/`.
    ///
    /// Commands match the whole text exactly, so `/list all` and `/list `
    /// are unknown and ` /list` is plain chat.
    pub fn parse(text: &str) -> Option<Self> {
        if !text.starts_with('/') {
            return None;
        }

        Some(match text {
            "/help" => Self::Help,
            "/list" => Self::List,
            "/hello" => Self::Hello,
            "/date" => Self::Date,
            other => Self::Unknown(other.to_owned()),
        })
    }

    /// Reply text sent back to the issuer.
    pub fn reply(&self, ctx: &CommandContext<'_>) -> String {
        match self {
            Self::Help => HELP_TEXT.to_owned(),
            Self::List => format!("Connected users: {}", ctx.connected),
            Self::Hello => format!("Hello {}! Server here. How are you?", ctx.identity),
            Self::Date => format!("Current date: {}", format_utc(ctx.wall_clock_secs)),
            Self::Unknown(_) => {
                "Unrecognized command. Use /help to see the available commands.".to_owned()
            },
        }
    }
}

fn format_utc(secs: u64) -> String {
    let secs = i64::try_from(secs).unwrap_or(i64::MAX);
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S UTC")
        .to_string()
}
