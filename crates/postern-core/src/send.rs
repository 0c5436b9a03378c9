//! Sending messages.
//!
//! A send encodes the message, hands it to the account's delivery command,
//! files it in the account's sent maildir and tags it in the mail index.
//! Each step only runs if the previous one succeeded. Nothing is rolled
//! back: once the delivery command has accepted the message, later failures
//! are reported as "sent, but not filed" or "sent, but not tagged".

use crate::config::{Account, Config};
use crate::delivery::deliver;
use crate::error::Error;
use crate::index::{DatabaseMode, IndexDatabase, IndexedMessage, MailIndex, with_frozen};
use crate::maildir::{Flag, Flags, Maildir};
use postern_mime::{Message, parse_address_list};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Tag added to sent messages with more than one part.
pub const ATTACHMENT_TAG: &str = "attachment";

/// Why a send or draft save failed.
#[derive(Debug, Error)]
pub enum SendError {
    /// The `From` header is not exactly one address.
    #[error("Mail not sent: {0}")]
    InvalidFrom(String),

    /// No account is configured for the sender address.
    #[error("Mail not sent: no account for {0}")]
    NoAccount(String),

    /// The account lacks a setting needed for this operation.
    #[error("Mail not sent: account {account} has no {setting}")]
    MissingConfig {
        /// Account name.
        account: String,
        /// Name of the missing setting.
        setting: &'static str,
    },

    /// The message could not be encoded.
    #[error("Mail not sent: {0}")]
    Encode(#[source] postern_mime::Error),

    /// The delivery command reported a failure.
    #[error("Mail not sent: {0}")]
    Delivery(String),

    /// Delivered, but not stored in the sent maildir.
    #[error("Mail sent, but storing it in the sent folder failed: {0}")]
    Storage(#[source] Error),

    /// Delivered and stored, but not tagged in the index.
    #[error("Mail sent and stored, but tagging failed: {0}")]
    Index(#[source] Error),

    /// A draft could not be stored.
    #[error("Draft not saved: {0}")]
    Draft(#[source] Error),
}

impl SendError {
    /// Returns true if the delivery command accepted the message.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Index(_))
    }
}

impl From<Error> for SendError {
    fn from(err: Error) -> Self {
        match err {
            Error::Command(output) => Self::Delivery(output),
            Error::Mime(err) => Self::Encode(err),
            other => Self::Delivery(other.to_string()),
        }
    }
}

/// Outcome of a successful send or draft save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReport {
    /// Name of the account used.
    pub account: String,
    /// Path of the stored copy.
    pub path: PathBuf,
}

/// Sends messages for the configured accounts.
#[derive(Debug)]
pub struct Sender<'a, I> {
    config: &'a Config,
    index: &'a I,
}

impl<'a, I: MailIndex> Sender<'a, I> {
    /// Creates a sender.
    #[must_use]
    pub const fn new(config: &'a Config, index: &'a I) -> Self {
        Self { config, index }
    }

    /// Finds the account for the message's single `From` address.
    fn account(&self, message: &Message) -> Result<(&'a str, &'a Account), SendError> {
        let from = message.from().unwrap_or_default();
        let mailboxes =
            parse_address_list(from).map_err(|e| SendError::InvalidFrom(e.to_string()))?;
        let [mailbox] = mailboxes.as_slice() else {
            return Err(SendError::InvalidFrom(format!(
                "expected one sender address, found {}",
                mailboxes.len()
            )));
        };
        self.config
            .account_for(&mailbox.email)
            .ok_or_else(|| SendError::NoAccount(mailbox.email.clone()))
    }

    /// Sends a message.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`]; [`SendError::is_delivered`] tells whether
    /// the message went out.
    pub async fn send(&self, message: &Message) -> Result<SendReport, SendError> {
        let (name, account) = self.account(message)?;
        let missing = |setting| SendError::MissingConfig {
            account: name.to_string(),
            setting,
        };

        let command = account
            .sendmail_command
            .as_ref()
            .filter(|command| !command.is_empty())
            .ok_or_else(|| missing("sendmail-command"))?;
        let sent_dir = account.sent_dir.as_deref().ok_or_else(|| missing("sent-dir"))?;

        let data = postern_mime::encode(message).map_err(SendError::Encode)?;
        debug!(account = name, bytes = data.len(), "encoded message");

        deliver(
            &command.args(),
            data.as_bytes(),
            self.config.delivery_timeout(),
        )
        .await?;

        let seen: Flags = [Flag::Seen].into_iter().collect();
        let path = Maildir::open(sent_dir, false)
            .and_then(|maildir| maildir.store(data.as_bytes(), &seen))
            .and_then(|stored| stored.filename())
            .map_err(|e| {
                warn!(account = name, error = %e, "sent message not stored");
                SendError::Storage(e)
            })?;

        self.tag(account, &path, message.parts.len() > 1)
            .map_err(|e| {
                warn!(account = name, error = %e, "sent message not tagged");
                SendError::Index(e)
            })?;

        info!(account = name, path = %path.display(), "message sent");
        Ok(SendReport {
            account: name.to_string(),
            path,
        })
    }

    /// Adds a stored message to the index with the account's sent tags.
    fn tag(&self, account: &Account, path: &Path, has_attachment: bool) -> crate::Result<()> {
        let mut database = self
            .index
            .open_database(&self.config.general.database, DatabaseMode::ReadWrite)?;
        let mut indexed = database.add_message(path)?;
        let sync = self.config.general.synchronize_flags;

        with_frozen(&mut indexed, |m| {
            m.remove_all_tags()?;
            for tag in &account.sent_tag {
                m.add_tag(tag)?;
            }
            if has_attachment {
                m.add_tag(ATTACHMENT_TAG)?;
            }
            if sync {
                m.sync_tags_to_flags()?;
            }
            Ok(())
        })
    }

    /// Stores a message in the account's draft maildir without sending it.
    ///
    /// # Errors
    ///
    /// Returns a [`SendError`] if the account cannot be determined, has no
    /// draft directory, or the message cannot be encoded or stored.
    pub fn save_draft(&self, message: &Message) -> Result<SendReport, SendError> {
        let (name, account) = self.account(message)?;
        let draft_dir = account
            .draft_dir
            .as_deref()
            .ok_or_else(|| SendError::MissingConfig {
                account: name.to_string(),
                setting: "draft-dir",
            })?;

        let data = postern_mime::encode(message).map_err(SendError::Encode)?;
        let flags: Flags = [Flag::Draft, Flag::Seen].into_iter().collect();
        let path = Maildir::open(draft_dir, false)
            .and_then(|maildir| maildir.store(data.as_bytes(), &flags))
            .and_then(|stored| stored.filename())
            .map_err(SendError::Draft)?;

        info!(account = name, path = %path.display(), "draft saved");
        Ok(SendReport {
            account: name.to_string(),
            path,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compose::compose_new;
    use crate::config::CommandLine;
    use postern_mime::Part;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    type Log = Rc<RefCell<Vec<String>>>;

    #[derive(Default)]
    struct MockIndex {
        log: Log,
        fail_open: bool,
    }

    struct MockDatabase(Log);
    struct MockMessage(Log);

    impl MailIndex for MockIndex {
        type Database = MockDatabase;

        fn open_database(&self, _path: &Path, mode: DatabaseMode) -> crate::Result<MockDatabase> {
            if self.fail_open {
                return Err(Error::Index("locked".into()));
            }
            self.log.borrow_mut().push(format!("open {mode:?}"));
            Ok(MockDatabase(Rc::clone(&self.log)))
        }
    }

    impl IndexDatabase for MockDatabase {
        type Message = MockMessage;

        fn add_message(&mut self, path: &Path) -> crate::Result<MockMessage> {
            let name = path.file_name().unwrap().to_string_lossy();
            self.0.borrow_mut().push(format!("add {name}"));
            Ok(MockMessage(Rc::clone(&self.0)))
        }
    }

    impl IndexedMessage for MockMessage {
        fn freeze(&mut self) -> crate::Result<()> {
            self.0.borrow_mut().push("freeze".into());
            Ok(())
        }
        fn thaw(&mut self) -> crate::Result<()> {
            self.0.borrow_mut().push("thaw".into());
            Ok(())
        }
        fn add_tag(&mut self, tag: &str) -> crate::Result<()> {
            self.0.borrow_mut().push(format!("+{tag}"));
            Ok(())
        }
        fn remove_tag(&mut self, tag: &str) -> crate::Result<()> {
            self.0.borrow_mut().push(format!("-{tag}"));
            Ok(())
        }
        fn remove_all_tags(&mut self) -> crate::Result<()> {
            self.0.borrow_mut().push("clear".into());
            Ok(())
        }
        fn sync_tags_to_flags(&mut self) -> crate::Result<()> {
            self.0.borrow_mut().push("sync".into());
            Ok(())
        }
    }

    struct Fixture {
        dir: TempDir,
        config: Config,
    }

    fn fixture(script: &str) -> Fixture {
        let dir = TempDir::new().unwrap();
        let sent = dir.path().join("sent");
        let drafts = dir.path().join("drafts");
        Maildir::open(&sent, true).unwrap();
        Maildir::open(&drafts, true).unwrap();

        let mut account = Account::new("me@example.com");
        account.sendmail_command = Some(CommandLine::Args(vec![
            "sh".into(),
            "-c".into(),
            script.into(),
        ]));
        account.sent_tag = vec!["sent".into(), "inbox".into()];
        account.sent_dir = Some(sent);
        account.draft_dir = Some(drafts);

        let mut config = Config::default();
        config.general.database = dir.path().to_path_buf();
        config.accounts.insert("main".into(), account);
        Fixture { dir, config }
    }

    fn message(from: &str) -> Message {
        let mut message = compose_new();
        message.headers.set("From", from);
        message.headers.set("To", "you@example.com");
        message.headers.set("Subject", "Test");
        message.parts.push(Part::text("hello"));
        message
    }

    fn files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn send_stores_and_tags() {
        let fx = fixture("cat > /dev/null");
        let index = MockIndex::default();
        let sender = Sender::new(&fx.config, &index);

        let report = sender.send(&message("Me <me@example.com>")).await.unwrap();
        assert_eq!(report.account, "main");
        assert!(report.path.starts_with(fx.dir.path().join("sent").join("cur")));
        assert!(report.path.to_string_lossy().ends_with(":2,S"));

        let name = report.path.file_name().unwrap().to_string_lossy().into_owned();
        assert_eq!(
            *index.log.borrow(),
            [
                "open ReadWrite".to_string(),
                format!("add {name}"),
                "freeze".into(),
                "clear".into(),
                "+sent".into(),
                "+inbox".into(),
                "sync".into(),
                "thaw".into(),
            ]
        );
    }

    #[tokio::test]
    async fn attachment_tag_and_no_sync() {
        let mut fx = fixture("cat > /dev/null");
        fx.config.general.synchronize_flags = false;
        let index = MockIndex::default();
        let mut msg = message("me@example.com");
        msg.parts.push(Part::text("second"));

        Sender::new(&fx.config, &index).send(&msg).await.unwrap();
        let log = index.log.borrow();
        assert!(log.contains(&"+attachment".to_string()));
        assert!(!log.contains(&"sync".to_string()));
    }

    #[tokio::test]
    async fn delivery_output_stops_before_storage() {
        let fx = fixture("cat > /dev/null; echo 'no route'");
        let index = MockIndex::default();
        let err = Sender::new(&fx.config, &index)
            .send(&message("me@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, SendError::Delivery(ref out) if out == "no route"));
        assert!(!err.is_delivered());
        assert_eq!(err.to_string(), "Mail not sent: no route");
        assert!(files(&fx.dir.path().join("sent").join("cur")).is_empty());
        assert!(index.log.borrow().is_empty());
    }

    #[tokio::test]
    async fn index_failure_is_delivered() {
        let fx = fixture("cat > /dev/null");
        let index = MockIndex {
            fail_open: true,
            ..MockIndex::default()
        };
        let err = Sender::new(&fx.config, &index)
            .send(&message("me@example.com"))
            .await
            .unwrap_err();

        assert!(matches!(err, SendError::Index(_)));
        assert!(err.is_delivered());
        assert_eq!(files(&fx.dir.path().join("sent").join("cur")).len(), 1);
    }

    #[tokio::test]
    async fn missing_sent_dir_is_storage_failure() {
        let fx = fixture("cat > /dev/null");
        std::fs::remove_dir_all(fx.dir.path().join("sent")).unwrap();
        let index = MockIndex::default();
        let err = Sender::new(&fx.config, &index)
            .send(&message("me@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::Storage(_)));
        assert!(err.to_string().starts_with("Mail sent, but"));
    }

    #[tokio::test]
    async fn sender_checks() {
        let fx = fixture("cat > /dev/null");
        let index = MockIndex::default();
        let sender = Sender::new(&fx.config, &index);

        let two = message("me@example.com, other@example.com");
        assert!(matches!(sender.send(&two).await, Err(SendError::InvalidFrom(_))));

        let mut none = message("x@example.com");
        none.headers.remove("From");
        assert!(matches!(sender.send(&none).await, Err(SendError::InvalidFrom(_))));

        assert!(matches!(
            sender.send(&message("stranger@example.com")).await,
            Err(SendError::NoAccount(ref a)) if a == "stranger@example.com"
        ));

        let mut empty = message("me@example.com");
        empty.parts.clear();
        assert!(matches!(
            sender.send(&empty).await,
            Err(SendError::Encode(postern_mime::Error::EmptyMessage))
        ));
    }

    #[tokio::test]
    async fn missing_settings() {
        let mut fx = fixture("cat > /dev/null");
        let account = fx.config.accounts.get_mut("main").unwrap();
        account.sendmail_command = Some(CommandLine::Line("  ".into()));
        let index = MockIndex::default();
        let err = Sender::new(&fx.config, &index)
            .send(&message("me@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SendError::MissingConfig { setting: "sendmail-command", .. }
        ));
    }

    #[test]
    fn draft_saved_with_draft_flags() {
        let mut fx = fixture("exit 1");
        let index = MockIndex::default();
        let report = Sender::new(&fx.config, &index)
            .save_draft(&message("me@example.com"))
            .unwrap();
        assert!(report.path.starts_with(fx.dir.path().join("drafts").join("cur")));
        assert!(report.path.to_string_lossy().ends_with(":2,DS"));
        assert!(index.log.borrow().is_empty());

        fx.config.accounts.get_mut("main").unwrap().draft_dir = None;
        assert!(matches!(
            Sender::new(&fx.config, &index).save_draft(&message("me@example.com")),
            Err(SendError::MissingConfig { setting: "draft-dir", .. })
        ));
    }
}
