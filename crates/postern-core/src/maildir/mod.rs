//! Maildir storage.
//!
//! Messages are written under `tmp/` and renamed into `new/` or `cur/`.
//! Renaming is the only way a stored message changes, so a crash leaves
//! either the old or the new state on disk.
//!
//! File names are `<key>,S=<size>` in `new/` and
//! `<key>,S=<size>:2,<flags>` in `cur/`.

mod flag;
mod key;
mod store;

pub use flag::{Flag, Flags, flagged_name};
pub use key::key;
pub use store::{Maildir, MaildirMessage};
