//! Maildir directories and the messages stored in them.

use super::flag::{Flag, Flags, INFO_SEPARATOR, flagged_name};
use super::key::{key, key_of};
use crate::error::{Error, Result};
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

const TMP: &str = "tmp";
const NEW: &str = "new";
const CUR: &str = "cur";

/// A single maildir folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Maildir {
    path: PathBuf,
}

fn create_dir(path: &Path) -> io::Result<()> {
    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    match builder.create(path) {
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        other => other,
    }
}

impl Maildir {
    /// Opens a maildir.
    ///
    /// With `create`, the folder and its `tmp`, `new` and `cur`
    /// subdirectories are created if missing. The parent must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn open(path: impl Into<PathBuf>, create: bool) -> Result<Self> {
        let path = path.into();
        if create {
            create_dir(&path)?;
            for sub in [TMP, NEW, CUR] {
                create_dir(&path.join(sub))?;
            }
        }
        Ok(Self { path })
    }

    /// Returns the folder path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes a message into the maildir.
    ///
    /// The data is written and synced under `tmp/`, then renamed into `new/`
    /// or, if any flags are given, into `cur/`. If anything fails the file
    /// stays in `tmp/`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the maildir does not exist or a write or
    /// rename fails.
    pub fn store(&self, data: &[u8], flags: &Flags) -> Result<MaildirMessage> {
        if !self.path.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("maildir {} does not exist", self.path.display()),
            )
            .into());
        }

        let key = key();
        let tmp = self.path.join(TMP).join(&key);
        {
            let mut file = OpenOptions::new().write(true).create_new(true).open(&tmp)?;
            file.write_all(data)?;
            file.sync_all()?;
        }

        let name = format!("{key},S={}", data.len());
        let target = if flags.is_empty() {
            self.path.join(NEW).join(name)
        } else {
            self.path
                .join(CUR)
                .join(format!("{name}{INFO_SEPARATOR}{flags}"))
        };
        fs::rename(&tmp, &target)?;

        debug!(path = %target.display(), "stored message");
        Ok(MaildirMessage {
            key,
            filename: target,
            root: self.path.clone(),
        })
    }

    /// Finds a message by key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] or [`Error::DuplicateKey`] if the key
    /// does not identify exactly one file.
    pub fn get(&self, key: &str) -> Result<MaildirMessage> {
        let filename = find_key(&self.path, key)?;
        Ok(MaildirMessage {
            key: key.to_string(),
            filename,
            root: self.path.clone(),
        })
    }

    /// Lists all messages in `new/` and `cur/`.
    ///
    /// # Errors
    ///
    /// Returns an error if a subdirectory cannot be read.
    pub fn list(&self) -> Result<Vec<MaildirMessage>> {
        let mut messages = Vec::new();
        for sub in [NEW, CUR] {
            let mut names = file_names(&self.path.join(sub))?;
            names.sort();
            for name in names {
                messages.push(MaildirMessage {
                    key: key_of(&name).to_string(),
                    filename: self.path.join(sub).join(name),
                    root: self.path.clone(),
                });
            }
        }
        Ok(messages)
    }
}

fn file_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    Ok(names)
}

fn find_key(root: &Path, key: &str) -> Result<PathBuf> {
    let mut matches = Vec::new();
    for sub in [NEW, CUR] {
        for name in file_names(&root.join(sub))? {
            if key_of(&name) == key {
                matches.push(root.join(sub).join(name));
            }
        }
    }

    match matches.len() {
        0 => Err(Error::UnknownKey(key.to_string())),
        1 => Ok(matches.remove(0)),
        _ => Err(Error::DuplicateKey(key.to_string())),
    }
}

/// A message file in a maildir.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaildirMessage {
    key: String,
    /// Last known path; may be stale after another program renamed it.
    filename: PathBuf,
    root: PathBuf,
}

impl MaildirMessage {
    /// Returns the unique key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the current path of the message file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownKey`] or [`Error::DuplicateKey`] if the file
    /// moved and the key no longer identifies exactly one file.
    pub fn filename(&self) -> Result<PathBuf> {
        if self.filename.exists() {
            return Ok(self.filename.clone());
        }
        find_key(&self.root, &self.key)
    }

    fn current_name(&self) -> Result<(PathBuf, String)> {
        let path = self.filename()?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::InvalidFilename(path.display().to_string()))?;
        Ok((path, name))
    }

    /// Returns the flags in the file name; letters that are not standard
    /// flags are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found.
    pub fn flags(&self) -> Result<Flags> {
        let (_, name) = self.current_name()?;
        Ok(name
            .rsplit_once(INFO_SEPARATOR)
            .map(|(_, letters)| letters.chars().filter_map(Flag::from_char).collect())
            .unwrap_or_default())
    }

    fn rename_to(&mut self, from: &Path, name: &str) -> Result<()> {
        let target = self.root.join(CUR).join(name);
        fs::rename(from, &target)?;
        debug!(path = %target.display(), "renamed message");
        self.filename = target;
        Ok(())
    }

    /// Replaces the flags and moves the file into `cur/`.
    ///
    /// The `,S=<size>` annotation is kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found or renamed.
    pub fn set_flags(&mut self, flags: &Flags) -> Result<()> {
        let (path, name) = self.current_name()?;
        let base = name.split_once(':').map_or(name.as_str(), |(base, _)| base);
        let new_name = format!("{base}{INFO_SEPARATOR}{flags}");
        self.rename_to(&path, &new_name)
    }

    fn change_flag(&mut self, flag: Flag, set: bool) -> Result<()> {
        let (path, name) = self.current_name()?;
        if name.contains(INFO_SEPARATOR) {
            let new_name = flagged_name(&name, flag, set)?;
            self.rename_to(&path, &new_name)
        } else {
            let mut flags = Flags::new();
            if set {
                flags.insert(flag);
            }
            self.set_flags(&flags)
        }
    }

    /// Sets a single flag, keeping all others.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found or renamed.
    pub fn add_flag(&mut self, flag: Flag) -> Result<()> {
        self.change_flag(flag, true)
    }

    /// Clears a single flag, keeping all others.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be found or renamed.
    pub fn remove_flag(&mut self, flag: Flag) -> Result<()> {
        self.change_flag(flag, false)
    }
}
