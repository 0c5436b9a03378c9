//! Mail index backed by the `notmuch` command line tool.

use crate::error::{Error, Result};
use crate::index::{DatabaseMode, IndexDatabase, IndexedMessage, MailIndex};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Default program name.
const NOTMUCH: &str = "notmuch";

/// Runs `notmuch` against a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notmuch {
    program: PathBuf,
}

impl Default for Notmuch {
    fn default() -> Self {
        Self::new()
    }
}

impl Notmuch {
    /// Uses `notmuch` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(NOTMUCH)
    }

    /// Uses a specific executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl MailIndex for Notmuch {
    type Database = NotmuchDatabase;

    fn open_database(&self, path: &Path, mode: DatabaseMode) -> Result<NotmuchDatabase> {
        if !path.is_dir() {
            return Err(Error::Index(format!(
                "database {} does not exist",
                path.display()
            )));
        }
        Ok(NotmuchDatabase {
            runner: Runner {
                program: self.program.clone(),
                database: path.to_path_buf(),
            },
            mode,
        })
    }
}

#[derive(Debug, Clone)]
struct Runner {
    program: PathBuf,
    database: PathBuf,
}

impl Runner {
    fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        debug!(program = %self.program.display(), ?args, "running index command");

        let output = Command::new(&self.program)
            .args(&args)
            .env("NOTMUCH_DATABASE", &self.database)
            .output()
            .map_err(|e| Error::Index(format!("cannot run {}: {e}", self.program.display())))?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(Error::Index(format!(
                "{} {:?} failed ({}): {}",
                self.program.display(),
                args,
                output.status,
                stderr.trim()
            )))
        }
    }
}

/// An open notmuch database.
#[derive(Debug, Clone)]
pub struct NotmuchDatabase {
    runner: Runner,
    mode: DatabaseMode,
}

/// Builds an `id:` query for a message id, with or without angle brackets.
fn id_query(message_id: &str) -> String {
    let id = message_id.trim();
    let id = id
        .strip_prefix('<')
        .and_then(|i| i.strip_suffix('>'))
        .unwrap_or(id);
    format!("id:\"{}\"", id.replace('"', "\"\""))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl NotmuchDatabase {
    /// Lists the indexed files matching a query.
    fn files(&self, query: &str) -> Result<Vec<PathBuf>> {
        let output = self
            .runner
            .run(["search", "--format=json", "--output=files", "--", query])?;
        serde_json::from_slice(&output)
            .map_err(|e| Error::Index(format!("unexpected file list: {e}")))
    }
}

impl IndexDatabase for NotmuchDatabase {
    type Message = NotmuchMessage;

    fn add_message(&mut self, path: &Path) -> Result<NotmuchMessage> {
        if self.mode == DatabaseMode::ReadOnly {
            return Err(Error::Index("database is open read-only".to_string()));
        }

        let message = postern_mime::read_message(path)?;
        let message_id = message
            .message_id()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| {
                Error::Index(format!("{} has no Message-ID", path.display()))
            })?;

        self.runner.run(["new", "--quiet", "--no-hooks"])?;

        let query = id_query(message_id);
        let wanted = canonical(path);
        if !self.files(&query)?.iter().any(|f| canonical(f) == wanted) {
            return Err(Error::Index(format!(
                "{} was not indexed; is it below {}?",
                path.display(),
                self.runner.database.display()
            )));
        }

        Ok(NotmuchMessage {
            runner: self.runner.clone(),
            query,
            frozen: false,
            pending: Vec::new(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TagOp {
    Add(String),
    Remove(String),
}

impl TagOp {
    fn tag(&self) -> &str {
        match self {
            Self::Add(tag) | Self::Remove(tag) => tag,
        }
    }

    fn argument(&self) -> String {
        match self {
            Self::Add(tag) => format!("+{tag}"),
            Self::Remove(tag) => format!("-{tag}"),
        }
    }
}

/// A message in a notmuch database, addressed by its Message-ID.
///
/// Tag changes made while frozen are sent as one `notmuch tag` call on thaw.
#[derive(Debug, Clone)]
pub struct NotmuchMessage {
    runner: Runner,
    query: String,
    frozen: bool,
    pending: Vec<TagOp>,
}

impl NotmuchMessage {
    /// Returns the current tags.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Index`] if the query fails or its output is not a
    /// JSON list of tags.
    pub fn tags(&self) -> Result<Vec<String>> {
        let output = self.runner.run([
            "search",
            "--format=json",
            "--output=tags",
            "--",
            self.query.as_str(),
        ])?;
        serde_json::from_slice(&output)
            .map_err(|e| Error::Index(format!("unexpected tag list: {e}")))
    }

    fn apply(&mut self, op: TagOp) -> Result<()> {
        // Later changes to the same tag replace earlier ones
        self.pending.retain(|pending| pending.tag() != op.tag());
        self.pending.push(op);
        if self.frozen { Ok(()) } else { self.flush() }
    }

    fn flush(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut args: Vec<String> = vec!["tag".to_string()];
        args.extend(self.pending.iter().map(TagOp::argument));
        args.push("--".to_string());
        args.push(self.query.clone());

        self.pending.clear();
        self.runner.run(args).map(drop)
    }
}

impl IndexedMessage for NotmuchMessage {
    fn freeze(&mut self) -> Result<()> {
        self.frozen = true;
        Ok(())
    }

    fn thaw(&mut self) -> Result<()> {
        self.frozen = false;
        self.flush()
    }

    fn add_tag(&mut self, tag: &str) -> Result<()> {
        self.apply(TagOp::Add(tag.to_string()))
    }

    fn remove_tag(&mut self, tag: &str) -> Result<()> {
        self.apply(TagOp::Remove(tag.to_string()))
    }

    fn remove_all_tags(&mut self) -> Result<()> {
        self.pending.clear();
        for tag in self.tags()? {
            self.pending.push(TagOp::Remove(tag));
        }
        if self.frozen { Ok(()) } else { self.flush() }
    }

    /// `notmuch tag` renames files itself when `maildir.synchronize_flags`
    /// is enabled in the notmuch configuration.
    fn sync_tags_to_flags(&mut self) -> Result<()> {
        Ok(())
    }
}
