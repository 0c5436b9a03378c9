//! Configuration model types.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Default location of the mail index database.
pub const DEFAULT_DATABASE: &str = "~/mail";

/// Default editor command.
pub const DEFAULT_EDITOR: &str = "vim";

/// Default time a delivery command may run before it is killed.
pub const DEFAULT_DELIVERY_TIMEOUT_SECS: u64 = 120;

/// A command given either as one whitespace separated string or as an
/// explicit argument list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandLine {
    /// `"msmtp --account=work -t"`
    Line(String),
    /// `["msmtp", "--account=work", "-t"]`
    Args(Vec<String>),
}

impl CommandLine {
    /// Returns the program and its arguments.
    #[must_use]
    pub fn args(&self) -> Vec<String> {
        match self {
            Self::Line(line) => line.split_whitespace().map(str::to_string).collect(),
            Self::Args(args) => args.clone(),
        }
    }

    /// Returns true if there is no program to run.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args().first().is_none_or(String::is_empty)
    }
}

impl From<&str> for CommandLine {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

/// General settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct General {
    /// Location of the mail index database.
    pub database: PathBuf,
    /// Whether maildir flags follow tag changes.
    pub synchronize_flags: bool,
    /// Seconds a delivery command may run.
    pub delivery_timeout: u64,
}

impl Default for General {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            synchronize_flags: true,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT_SECS,
        }
    }
}

/// External programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Commands {
    /// Editor used to edit outgoing mail.
    pub editor: String,
    /// Program used to open attachments; the system opener if empty.
    pub attachments: String,
}

impl Default for Commands {
    fn default() -> Self {
        Self {
            editor: DEFAULT_EDITOR.to_string(),
            attachments: String::new(),
        }
    }
}

/// A mail account set up for sending.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Account {
    /// Email address of the account.
    pub addr: String,
    /// Command that delivers a message read from stdin.
    pub sendmail_command: Option<CommandLine>,
    /// Tags added to sent messages.
    pub sent_tag: Vec<String>,
    /// Maildir that receives sent messages.
    pub sent_dir: Option<PathBuf>,
    /// Maildir that receives drafts.
    pub draft_dir: Option<PathBuf>,
}

impl Account {
    /// Creates an account with only an address.
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    /// Checks whether an address belongs to this account.
    #[must_use]
    pub fn matches(&self, email: &str) -> bool {
        self.addr.trim().eq_ignore_ascii_case(email.trim())
    }
}

/// Complete client configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings.
    pub general: General,
    /// External programs.
    pub commands: Commands,
    /// Accounts keyed by name.
    #[serde(rename = "account")]
    pub accounts: BTreeMap<String, Account>,
}

impl Config {
    /// Returns the default configuration file path.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("postern").join("config.toml"))
    }

    /// Parses a configuration from TOML and expands paths in it.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed or a path refers to an
    /// unset environment variable.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(text)?;
        config.expand_paths()?;
        Ok(config)
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Loads the configuration from the default path, or returns the
    /// defaults if there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read or parsed.
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => {
                debug!("no configuration file, using defaults");
                let mut config = Self::default();
                config.expand_paths()?;
                Ok(config)
            }
        }
    }

    /// Expands `~` and environment variables in all configured paths.
    fn expand_paths(&mut self) -> Result<()> {
        self.general.database = expand(&self.general.database)?;
        for account in self.accounts.values_mut() {
            if let Some(dir) = &account.sent_dir {
                account.sent_dir = Some(expand(dir)?);
            }
            if let Some(dir) = &account.draft_dir {
                account.draft_dir = Some(expand(dir)?);
            }
        }
        Ok(())
    }

    /// Finds the account for an address, matching case-insensitively.
    #[must_use]
    pub fn account_for(&self, email: &str) -> Option<(&str, &Account)> {
        self.accounts
            .iter()
            .find(|(_, account)| account.matches(email))
            .map(|(name, account)| (name.as_str(), account))
    }

    /// Checks whether an address belongs to any account.
    #[must_use]
    pub fn is_own_address(&self, email: &str) -> bool {
        self.account_for(email).is_some()
    }

    /// Returns the addresses of all accounts.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.accounts.values().map(|account| account.addr.as_str())
    }

    /// Returns the delivery timeout.
    #[must_use]
    pub const fn delivery_timeout(&self) -> Duration {
        Duration::from_secs(self.general.delivery_timeout)
    }
}

fn expand(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    shellexpand::full(&raw)
        .map(|expanded| PathBuf::from(expanded.as_ref()))
        .map_err(|e| Error::Config(format!("cannot expand {raw}: {e}")))
}
