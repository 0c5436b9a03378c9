//! # postern-core
//!
//! Core logic of the `postern` mail client.
//!
//! This crate provides:
//! - Configuration loading and validation
//! - Composing new messages, replies and attachments
//! - Editing messages in an external editor
//! - Maildir storage with atomic renames
//! - The mail index interface and a `notmuch` backend
//! - The send pipeline: delivery, filing and tagging

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod compose;
pub mod config;
pub mod delivery;
mod error;
pub mod external;
mod host;
pub mod index;
pub mod maildir;
pub mod notmuch;
pub mod send;

pub use compose::{
    apply_edit_string, attach, compose_new, compose_reply, detach, edit_string, new_message_id,
};
pub use config::{Account, CommandLine, Config, ValidationError, validate_config};
pub use error::{Error, Result};
pub use external::{edit_message, open_attachment, run_editor};
pub use index::{DatabaseMode, IndexDatabase, IndexedMessage, MailIndex, with_frozen};
pub use maildir::{Flag, Flags, Maildir, MaildirMessage};
pub use notmuch::Notmuch;
pub use send::{SendError, SendReport, Sender};
