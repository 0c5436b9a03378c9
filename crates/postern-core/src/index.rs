//! Interface to the external mail index.
//!
//! The index is a tag database over the messages on disk. These traits cover
//! the operations the send pipeline needs; [`crate::notmuch`] implements them
//! for the `notmuch` command line tool.

use crate::error::Result;
use std::path::Path;

/// How a database is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseMode {
    /// Queries only.
    ReadOnly,
    /// Queries and modifications.
    ReadWrite,
}

/// A mail index that can open databases.
pub trait MailIndex {
    /// The database handle type.
    type Database: IndexDatabase;

    /// Opens the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] if the database cannot be opened.
    fn open_database(&self, path: &Path, mode: DatabaseMode) -> Result<Self::Database>;
}

/// An open index database.
pub trait IndexDatabase {
    /// The message handle type.
    type Message: IndexedMessage;

    /// Adds a message file to the index, or finds it if already indexed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] if the file cannot be indexed.
    fn add_message(&mut self, path: &Path) -> Result<Self::Message>;
}

/// A message in the index.
///
/// Tag changes made between [`freeze`](Self::freeze) and
/// [`thaw`](Self::thaw) become visible together.
pub trait IndexedMessage {
    /// Starts a batch of tag changes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] on failure.
    fn freeze(&mut self) -> Result<()>;

    /// Applies the batch of tag changes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] on failure.
    fn thaw(&mut self) -> Result<()>;

    /// Adds a tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] on failure.
    fn add_tag(&mut self, tag: &str) -> Result<()>;

    /// Removes a tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] on failure.
    fn remove_tag(&mut self, tag: &str) -> Result<()>;

    /// Removes every tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] on failure.
    fn remove_all_tags(&mut self) -> Result<()>;

    /// Renames the message files so their maildir flags match the tags.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Index`] on failure.
    fn sync_tags_to_flags(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Runs `f` between `freeze` and `thaw`.
///
/// The message is thawed even if `f` fails; the first error wins.
///
/// # Errors
///
/// Returns the error of `freeze`, `f` or `thaw`.
pub fn with_frozen<M, T>(message: &mut M, f: impl FnOnce(&mut M) -> Result<T>) -> Result<T>
where
    M: IndexedMessage + ?Sized,
{
    message.freeze()?;
    let result = f(message);
    let thawed = message.thaw();
    let value = result?;
    thawed?;
    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
        fail_on: Option<&'static str>,
    }

    impl Recorder {
        fn record(&mut self, call: String) -> Result<()> {
            let failed = self.fail_on.is_some_and(|f| call.starts_with(f));
            self.calls.push(call);
            if failed { Err(Error::Index("refused".into())) } else { Ok(()) }
        }
    }

    impl IndexedMessage for Recorder {
        fn freeze(&mut self) -> Result<()> {
            self.record("freeze".into())
        }
        fn thaw(&mut self) -> Result<()> {
            self.record("thaw".into())
        }
        fn add_tag(&mut self, tag: &str) -> Result<()> {
            self.record(format!("+{tag}"))
        }
        fn remove_tag(&mut self, tag: &str) -> Result<()> {
            self.record(format!("-{tag}"))
        }
        fn remove_all_tags(&mut self) -> Result<()> {
            self.record("clear".into())
        }
    }

    #[test]
    fn frozen_bracket() {
        let mut message = Recorder::default();
        with_frozen(&mut message, |m| {
            m.remove_all_tags()?;
            m.add_tag("sent")?;
            m.sync_tags_to_flags()
        })
        .unwrap();
        assert_eq!(message.calls, ["freeze", "clear", "+sent", "thaw"]);
    }

    #[test]
    fn thaws_after_failure() {
        let mut message = Recorder {
            fail_on: Some("+"),
            ..Recorder::default()
        };
        let result = with_frozen(&mut message, |m| m.add_tag("sent"));
        assert!(matches!(result, Err(Error::Index(_))));
        assert_eq!(message.calls, ["freeze", "+sent", "thaw"]);
    }
}
