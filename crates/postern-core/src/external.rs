//! External programs: the editor and the attachment opener.

use crate::compose::{apply_edit_string, edit_string};
use crate::error::{Error, Result};
use postern_mime::{Message, Part};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// File name used for the edit string.
const EDIT_FILE: &str = "edit.eml";

/// Splits a configured command into program and arguments.
fn command_for(command: &str) -> Result<Command> {
    let mut words = command.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| Error::Command("no program configured".to_string()))?;
    let mut cmd = Command::new(program);
    cmd.args(words);
    Ok(cmd)
}

/// Runs an editor on a file and waits for it to exit.
///
/// The editor inherits the terminal.
///
/// # Errors
///
/// Returns [`Error::Command`] if the editor cannot be started or fails.
pub async fn run_editor(command: &str, path: &Path) -> Result<()> {
    debug!(command, path = %path.display(), "starting editor");
    let status = command_for(command)?
        .arg(path)
        .status()
        .await
        .map_err(|e| Error::Command(format!("cannot run {command}: {e}")))?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Command(format!("{command} failed: {status}")))
    }
}

/// Lets the user edit a message in their editor.
///
/// The edit string is written to a file in `dir`, the editor is run on it
/// and the result is applied to the message.
///
/// # Errors
///
/// Returns an error if the file cannot be written or read, the editor
/// fails, or the edited text is malformed.
pub async fn edit_message(command: &str, message: &mut Message, dir: &Path) -> Result<()> {
    let path = dir.join(EDIT_FILE);
    tokio::fs::write(&path, edit_string(message)).await?;
    run_editor(command, &path).await?;
    let text = tokio::fs::read_to_string(&path).await?;
    apply_edit_string(message, &text)
}

/// Writes an attachment to `dir` and opens it.
///
/// Uses `command` if given, otherwise the desktop's default application.
/// Returns the path of the written file.
///
/// # Errors
///
/// Returns an error if the file cannot be written or the opener fails.
pub async fn open_attachment(command: &str, part: &Part, dir: &Path) -> Result<PathBuf> {
    let name = part
        .filename()
        .as_deref()
        .and_then(|name| Path::new(name).file_name())
        .map_or_else(|| PathBuf::from("attachment"), PathBuf::from);
    let path = dir.join(name);
    tokio::fs::write(&path, part.body.as_bytes()).await?;

    if command.trim().is_empty() {
        debug!(path = %path.display(), "opening with system opener");
        opener::open(&path).map_err(|e| Error::Command(e.to_string()))?;
    } else {
        debug!(command, path = %path.display(), "opening attachment");
        let status = command_for(command)?
            .arg(&path)
            .status()
            .await
            .map_err(|e| Error::Command(format!("cannot run {command}: {e}")))?;
        if !status.success() {
            return Err(Error::Command(format!("{command} failed: {status}")));
        }
    }

    Ok(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::compose::compose_new;
    use postern_mime::{Body, Headers};
    use tempfile::TempDir;

    #[tokio::test]
    async fn editor_failure_is_reported() {
        let dir = TempDir::new().unwrap();
        let err = run_editor("false", &dir.path().join("x")).await.unwrap_err();
        assert!(matches!(err, Error::Command(_)));
        assert!(matches!(
            run_editor("  ", &dir.path().join("x")).await,
            Err(Error::Command(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn edit_message_applies_changes() {
        let dir = TempDir::new().unwrap();
        let editor = dir.path().join("editor.sh");
        std::fs::write(
            &editor,
            "#!/bin/sh\nprintf 'From: me@example.com\\nTo: you@example.com\\nSubject: Edited\\n\\nNew body\\n' > \"$1\"\n",
        )
        .unwrap();
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&editor, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut message = compose_new();
        edit_message(editor.to_str().unwrap(), &mut message, dir.path())
            .await
            .unwrap();
        assert_eq!(message.subject(), Some("Edited"));
        assert_eq!(message.parts[0].text_body(), Some("New body\n"));
    }

    #[tokio::test]
    async fn attachment_written_and_opened() {
        let dir = TempDir::new().unwrap();
        let mut part = Part::new(Headers::new(), Body::Binary(b"%PDF".to_vec()));
        part.headers
            .set("Content-Disposition", "attachment; filename=\"../../report.pdf\"");

        let path = open_attachment("true", &part, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("report.pdf"));
        assert_eq!(std::fs::read(path).unwrap(), b"%PDF");
    }
}
