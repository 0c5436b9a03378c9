//! Handing messages to a local delivery agent.

use crate::error::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Runs a delivery command with the message on stdin.
///
/// The command is considered failed if it prints anything on stdout or
/// stderr, exits unsuccessfully, or runs longer than `timeout` (it is then
/// killed). The printed output becomes the error message.
///
/// # Errors
///
/// Returns [`Error::Command`] describing the failure.
pub async fn deliver(args: &[String], message: &[u8], timeout: Duration) -> Result<()> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Error::Command("empty delivery command".to_string()))?;

    debug!(program, ?rest, bytes = message.len(), "starting delivery command");

    let mut child = Command::new(program)
        .args(rest)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::Command(format!("cannot run {program}: {e}")))?;

    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| Error::Command(format!("no stdin for {program}")))?;

    let write = async move {
        let result = stdin.write_all(message).await;
        // Closing stdin signals the end of the message
        drop(stdin);
        result
    };

    let (written, output) = tokio::time::timeout(timeout, async move {
        tokio::join!(write, child.wait_with_output())
    })
    .await
    .map_err(|_| {
        Error::Command(format!(
            "{program} did not finish within {} seconds",
            timeout.as_secs()
        ))
    })?;

    let output =
        output.map_err(|e| Error::Command(format!("waiting for {program} failed: {e}")))?;

    let mut printed = String::from_utf8_lossy(&output.stdout).into_owned();
    printed.push_str(&String::from_utf8_lossy(&output.stderr));
    let printed = printed.trim();
    if !printed.is_empty() {
        return Err(Error::Command(printed.to_string()));
    }

    if !output.status.success() {
        return Err(Error::Command(format!("{program} failed: {}", output.status)));
    }

    written.map_err(|e| Error::Command(format!("writing to {program} failed: {e}")))?;

    info!(program, bytes = message.len(), "message delivered");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn silent_success() {
        deliver(&sh("cat > /dev/null"), b"message", TIMEOUT)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn receives_message_on_stdin() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("out");
        let script = format!("cat > '{}'", out.display());
        deliver(&sh(&script), b"To: x@example.com\r\n\r\nhi", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"To: x@example.com\r\n\r\nhi");
    }

    #[tokio::test]
    async fn output_is_failure() {
        let err = deliver(&sh("cat > /dev/null; echo 'relay denied' >&2"), b"m", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command(ref msg) if msg == "relay denied"));
    }

    #[tokio::test]
    async fn silent_exit_status_is_failure() {
        let err = deliver(&sh("cat > /dev/null; exit 3"), b"m", TIMEOUT)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    #[tokio::test]
    async fn empty_command() {
        assert!(matches!(
            deliver(&[], b"m", TIMEOUT).await,
            Err(Error::Command(_))
        ));
    }

    #[tokio::test]
    async fn missing_program() {
        let args = vec!["/nonexistent/postern-sendmail".to_string()];
        assert!(matches!(
            deliver(&args, b"m", TIMEOUT).await,
            Err(Error::Command(_))
        ));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let err = deliver(&sh("sleep 5"), b"m", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Command(ref msg) if msg.contains("did not finish")));
    }
}
