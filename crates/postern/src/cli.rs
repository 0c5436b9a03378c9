//! Command line arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Read, write and send mail from the terminal.
#[derive(Debug, Parser)]
#[command(name = "postern", version, about)]
pub struct Cli {
    /// Configuration file to use instead of the default.
    #[arg(short, long, global = true, env = "POSTERN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Command to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print a stored message.
    Show {
        /// Message file.
        file: PathBuf,
        /// Print a JSON summary instead of the text.
        #[arg(long)]
        json: bool,
    },

    /// Reply to a stored message, edit the reply and send it.
    Reply {
        /// Message file to reply to.
        file: PathBuf,
        /// Keep the other recipients.
        #[arg(short, long)]
        all: bool,
        /// Save the reply as a draft instead of sending it.
        #[arg(long)]
        draft: bool,
    },

    /// Write a new message and send it.
    Compose {
        /// Files to attach.
        #[arg(short, long = "attach", value_name = "FILE")]
        attachments: Vec<PathBuf>,
        /// Save the message as a draft instead of sending it.
        #[arg(long)]
        draft: bool,
    },

    /// Send a message file as it is.
    Send {
        /// Message file.
        file: PathBuf,
    },

    /// Store a message file in the draft folder.
    Draft {
        /// Message file.
        file: PathBuf,
    },

    /// Open an attachment of a stored message.
    Open {
        /// Message file.
        file: PathBuf,
        /// Attachment number, starting at 1.
        #[arg(default_value_t = 1)]
        number: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn arguments_are_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_compose_attachments() {
        let cli = Cli::parse_from(["postern", "compose", "-a", "a.pdf", "--attach", "b.png"]);
        match cli.command {
            Command::Compose { attachments, draft } => {
                assert_eq!(attachments, [PathBuf::from("a.pdf"), PathBuf::from("b.png")]);
                assert!(!draft);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn open_defaults_to_first_attachment() {
        let cli = Cli::parse_from(["postern", "open", "mail.eml"]);
        assert!(matches!(cli.command, Command::Open { number: 1, .. }));
    }
}
