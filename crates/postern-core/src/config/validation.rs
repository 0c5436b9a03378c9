//! Account validation.

use super::model::{Account, Config};
use postern_mime::Mailbox;

/// Validation error for account configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Email address is empty.
    EmptyAddress,
    /// Email address format is invalid.
    InvalidAddress,
    /// A delivery command is configured but names no program.
    EmptySendmailCommand,
    /// The sent maildir is not an absolute path.
    RelativeSentDir,
    /// The draft maildir is not an absolute path.
    RelativeDraftDir,
    /// The sent maildir lies outside the index database, so sent mail
    /// cannot be tagged.
    SentDirOutsideDatabase,
}

impl ValidationError {
    /// Get human-readable error message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::EmptyAddress => "Account address is required",
            Self::InvalidAddress => "Invalid email address format",
            Self::EmptySendmailCommand => "Sendmail command must name a program",
            Self::RelativeSentDir => "Sent directory must be an absolute path",
            Self::RelativeDraftDir => "Draft directory must be an absolute path",
            Self::SentDirOutsideDatabase => "Sent directory must be inside the database",
        }
    }

    /// Get the configuration key this error relates to.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::EmptyAddress | Self::InvalidAddress => "addr",
            Self::EmptySendmailCommand => "sendmail-command",
            Self::RelativeSentDir | Self::SentDirOutsideDatabase => "sent-dir",
            Self::RelativeDraftDir => "draft-dir",
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ValidationError {}

/// Result of validating an account.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an account configuration.
///
/// Missing delivery settings are not errors here; they only matter once the
/// account is used for sending.
///
/// # Errors
///
/// Returns a vector of `ValidationError` if any fields are invalid.
pub fn validate_account(account: &Account) -> ValidationResult {
    let mut errors = Vec::new();

    if account.addr.trim().is_empty() {
        errors.push(ValidationError::EmptyAddress);
    } else if Mailbox::new(account.addr.trim()).is_err() {
        errors.push(ValidationError::InvalidAddress);
    }

    if account
        .sendmail_command
        .as_ref()
        .is_some_and(super::CommandLine::is_empty)
    {
        errors.push(ValidationError::EmptySendmailCommand);
    }

    if account.sent_dir.as_ref().is_some_and(|d| d.is_relative()) {
        errors.push(ValidationError::RelativeSentDir);
    }
    if account.draft_dir.as_ref().is_some_and(|d| d.is_relative()) {
        errors.push(ValidationError::RelativeDraftDir);
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

/// Validate every account, returning the failures keyed by account name.
///
/// Besides the per-account checks, the sent maildir must lie below
/// `general.database`.
///
/// # Errors
///
/// Returns the account names with their errors if any account is invalid.
pub fn validate_config(config: &Config) -> Result<(), Vec<(String, Vec<ValidationError>)>> {
    let failures: Vec<_> = config
        .accounts
        .iter()
        .filter_map(|(name, account)| {
            let mut errors = validate_account(account).err().unwrap_or_default();
            let outside = account
                .sent_dir
                .as_ref()
                .is_some_and(|d| d.is_absolute() && !d.starts_with(&config.general.database));
            if outside {
                errors.push(ValidationError::SentDirOutsideDatabase);
            }
            (!errors.is_empty()).then(|| (name.clone(), errors))
        })
        .collect();

    if failures.is_empty() { Ok(()) } else { Err(failures) }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::CommandLine;
    use std::path::PathBuf;

    fn valid_account() -> Account {
        Account {
            addr: "me@example.com".to_string(),
            sendmail_command: Some(CommandLine::from("sendmail -t")),
            sent_tag: vec!["sent".to_string()],
            sent_dir: Some(PathBuf::from("/mail/sent")),
            draft_dir: None,
        }
    }

    #[test]
    fn valid_account_passes() {
        assert!(validate_account(&valid_account()).is_ok());
        assert!(validate_account(&Account::new("bare@example.com")).is_ok());
    }

    #[test]
    fn empty_address() {
        let errors = validate_account(&Account::new("  ")).unwrap_err();
        assert_eq!(errors, [ValidationError::EmptyAddress]);
        assert_eq!(errors[0].field(), "addr");
    }

    #[test]
    fn collects_all_errors() {
        let account = Account {
            addr: "not-an-address".to_string(),
            sendmail_command: Some(CommandLine::Args(Vec::new())),
            sent_dir: Some(PathBuf::from("relative/sent")),
            draft_dir: Some(PathBuf::from("drafts")),
            ..Account::default()
        };
        let errors = validate_account(&account).unwrap_err();
        assert_eq!(
            errors,
            [
                ValidationError::InvalidAddress,
                ValidationError::EmptySendmailCommand,
                ValidationError::RelativeSentDir,
                ValidationError::RelativeDraftDir,
            ]
        );
    }

    #[test]
    fn config_failures_name_the_account() {
        let mut config = Config::default();
        config.general.database = PathBuf::from("/mail");
        config.accounts.insert("good".into(), valid_account());
        config.accounts.insert("bad".into(), Account::new("broken"));
        let failures = validate_config(&config).unwrap_err();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "bad");
    }

    #[test]
    fn sent_dir_must_be_inside_database() {
        let mut config = Config::default();
        config.general.database = PathBuf::from("/var/mail");
        config.accounts.insert("home".into(), valid_account());
        let failures = validate_config(&config).unwrap_err();
        assert_eq!(failures[0].1, [ValidationError::SentDirOutsideDatabase]);
        assert_eq!(failures[0].1[0].field(), "sent-dir");

        config.general.database = PathBuf::from("/mail");
        assert!(validate_config(&config).is_ok());
    }
}
