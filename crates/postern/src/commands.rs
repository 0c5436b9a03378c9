//! Subcommand implementations.

use crate::summary::{MessageSummary, render};
use anyhow::{Context, Result, bail};
use postern_core::{
    Config, Notmuch, Sender, attach, compose_new, compose_reply, edit_message, open_attachment,
};
use postern_mime::{Message, read_message};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Directory that receives opened attachments.
const ATTACHMENT_DIR: &str = "postern-attachments";

fn load(file: &Path) -> Result<Message> {
    read_message(file).with_context(|| format!("cannot read {}", file.display()))
}

/// Prints a stored message.
pub fn show(file: &Path, json: bool) -> Result<()> {
    let message = load(file)?;
    if json {
        let summary = MessageSummary::from(&message);
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render(&message));
    }
    Ok(())
}

/// Sends a message or stores it as a draft and prints where it went.
async fn dispatch(config: &Config, message: &Message, draft: bool) -> Result<()> {
    let index = Notmuch::new();
    let sender = Sender::new(config, &index);

    if draft {
        let report = sender.save_draft(message)?;
        println!("Draft saved to {}", report.path.display());
        return Ok(());
    }

    match sender.send(message).await {
        Ok(report) => {
            println!("Mail sent ({})", report.path.display());
            Ok(())
        }
        Err(err) => {
            if err.is_delivered() {
                warn!(error = %err, "message delivered with errors");
            }
            Err(err.into())
        }
    }
}

/// Opens the message in the editor, then sends or saves it.
async fn edit_and_dispatch(config: &Config, mut message: Message, draft: bool) -> Result<()> {
    let dir = tempfile::Builder::new().prefix("postern-").tempdir()?;
    edit_message(&config.commands.editor, &mut message, dir.path())
        .await
        .context("editing failed")?;
    dispatch(config, &message, draft).await
}

/// Replies to a stored message.
pub async fn reply(config: &Config, file: &Path, all: bool, draft: bool) -> Result<()> {
    let original = load(file)?;
    let reply = compose_reply(&original, all, config);
    edit_and_dispatch(config, reply, draft).await
}

/// Writes a new message.
pub async fn compose(config: &Config, attachments: &[PathBuf], draft: bool) -> Result<()> {
    let mut message = compose_new();
    if let Some(addr) = config.addresses().next() {
        message.headers.set("From", addr);
    }
    for path in attachments {
        attach(&mut message, path).with_context(|| format!("cannot attach {}", path.display()))?;
    }
    edit_and_dispatch(config, message, draft).await
}

/// Sends a message file without editing it.
pub async fn send(config: &Config, file: &Path) -> Result<()> {
    let message = load(file)?;
    dispatch(config, &message, false).await
}

/// Stores a message file as a draft.
pub async fn draft(config: &Config, file: &Path) -> Result<()> {
    let message = load(file)?;
    dispatch(config, &message, true).await
}

/// Opens the attachment with the given 1-based number.
pub async fn open(config: &Config, file: &Path, number: usize) -> Result<()> {
    let message = load(file)?;
    let Some(part) = number
        .checked_sub(1)
        .and_then(|i| message.attachments().nth(i))
    else {
        bail!("{} has no attachment {number}", file.display());
    };

    let dir = std::env::temp_dir().join(ATTACHMENT_DIR);
    tokio::fs::create_dir_all(&dir).await?;
    let path = open_attachment(&config.commands.attachments, part, &dir).await?;
    info!(path = %path.display(), "opened attachment");
    Ok(())
}
