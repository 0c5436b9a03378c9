//! End-to-end tests: compose, reply, send and file with fake delivery and
//! index programs.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use postern_core::{
    Account, CommandLine, Config, Maildir, Notmuch, SendError, Sender, attach, compose_new,
    compose_reply, detach,
};
use postern_mime::{Body, Part, read_message};
use tempfile::TempDir;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

struct Setup {
    dir: TempDir,
    config: Config,
    index: Notmuch,
}

impl Setup {
    fn new(sendmail: &str) -> Self {
        Self::with_index(sendmail, true)
    }

    /// With `indexes` false the fake index ignores every new file, as
    /// notmuch does for files outside its database.
    fn with_index(sendmail: &str, indexes: bool) -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let database = root.join("mail");
        let sent = database.join("sent");
        std::fs::create_dir(&database).unwrap();
        Maildir::open(&sent, true).unwrap();

        let sendmail = script(root, "sendmail", sendmail);
        let files = if indexes {
            format!(
                "printf '['; sep=''; for f in $(find '{}' -type f); do printf '%s\"%s\"' \"$sep\" \"$f\"; sep=','; done; echo ']'",
                database.display()
            )
        } else {
            "echo '[]'".to_string()
        };
        let notmuch = script(
            root,
            "notmuch",
            &format!(
                "echo \"$*\" >> '{}'\ncase \"$*\" in\n  *output=files*) {files};;\n  *output=tags*) echo '[]';;\nesac",
                root.join("index.log").display()
            ),
        );

        let mut account = Account::new("me@example.com");
        account.sendmail_command = Some(CommandLine::Args(vec![
            sendmail.to_string_lossy().into_owned(),
            "-t".into(),
        ]));
        account.sent_tag = vec!["sent".into()];
        account.sent_dir = Some(sent);

        let mut config = Config::default();
        config.general.database = database;
        config.accounts.insert("personal".into(), account);

        Self {
            dir,
            config,
            index: Notmuch::with_program(notmuch),
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn sent(&self, sub: &str) -> Vec<PathBuf> {
        let dir = self.config.general.database.join("sent").join(sub);
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    fn index_calls(&self) -> String {
        std::fs::read_to_string(self.path("index.log")).unwrap_or_default()
    }
}

fn outgoing() -> postern_mime::Message {
    let mut message = compose_new();
    message.headers.set("From", "Me <me@example.com>");
    message.headers.set("To", "you@example.com");
    message.headers.set("Subject", "Weekly report");
    message.parts.push(Part::text("All good.\n"));
    message
}

#[tokio::test]
async fn sent_message_is_delivered_filed_and_tagged() {
    let setup = Setup::new("cat > \"$(dirname \"$0\")/delivered.eml\"");
    let message = outgoing();

    let report = Sender::new(&setup.config, &setup.index)
        .send(&message)
        .await
        .unwrap();
    assert_eq!(report.account, "personal");

    let delivered = std::fs::read(setup.path("delivered.eml")).unwrap();
    assert_eq!(std::fs::read(&report.path).unwrap(), delivered);

    let sent = setup.sent("cur");
    assert_eq!(sent, [report.path.clone()]);
    assert!(sent[0].to_string_lossy().ends_with(":2,S"));
    assert!(setup.sent("new").is_empty());

    let filed = read_message(&report.path).unwrap();
    assert_eq!(filed.subject(), Some("Weekly report"));
    assert_eq!(filed.message_id(), message.message_id());

    let id = message.message_id().unwrap();
    let query = format!("id:\"{}\"", &id[1..id.len() - 1]);
    let calls = setup.index_calls();
    assert!(calls.starts_with("new --quiet --no-hooks\n"));
    assert!(calls.contains(&format!("tag +sent -- {query}\n")));
}

#[tokio::test]
async fn delivery_complaint_leaves_nothing_behind() {
    let setup = Setup::new("cat > /dev/null\necho 'sendmail: account not found' >&2");

    let err = Sender::new(&setup.config, &setup.index)
        .send(&outgoing())
        .await
        .unwrap_err();

    assert!(!err.is_delivered());
    assert_eq!(
        err.to_string(),
        "Mail not sent: sendmail: account not found"
    );
    assert!(setup.sent("cur").is_empty());
    assert!(setup.sent("new").is_empty());
    assert!(setup.index_calls().is_empty());
}

#[tokio::test]
async fn tagging_failure_still_counts_as_sent() {
    let mut setup = Setup::new("cat > /dev/null");
    setup.index = Notmuch::with_program(script(setup.dir.path(), "broken", "exit 1"));

    let err = Sender::new(&setup.config, &setup.index)
        .send(&outgoing())
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::Index(_)));
    assert!(err.is_delivered());
    assert!(err.to_string().starts_with("Mail sent and stored"));
    assert_eq!(setup.sent("cur").len(), 1);
}

#[tokio::test]
async fn sent_copy_outside_the_index_is_reported() {
    let setup = Setup::with_index("cat > /dev/null", false);

    let err = Sender::new(&setup.config, &setup.index)
        .send(&outgoing())
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::Index(_)));
    assert!(err.is_delivered());
    assert!(err.to_string().contains("was not indexed"));
    assert_eq!(setup.sent("cur").len(), 1);
    assert!(!setup.index_calls().contains("tag "));
}

#[test]
fn compose_attach_detach() {
    let dir = TempDir::new().unwrap();
    let photo = dir.path().join("photo.png");
    std::fs::write(&photo, b"\x89PNG\r\n\x1a\n").unwrap();

    let mut message = compose_new();
    message.parts.push(Part::text("hi"));
    attach(&mut message, &photo).unwrap();

    assert_eq!(message.parts.len(), 2);
    assert!(message.parts[1].is_attachment());
    assert_eq!(message.parts[1].filename().as_deref(), Some("photo.png"));

    let wire = message.encode().unwrap();
    let decoded = postern_mime::Message::parse(wire.as_bytes()).unwrap();
    assert_eq!(decoded.parts.len(), 2);
    assert_eq!(decoded.parts[1].body, Body::Binary(b"\x89PNG\r\n\x1a\n".to_vec()));

    detach(&mut message).unwrap();
    assert_eq!(message.parts.len(), 1);
    assert_eq!(message.parts[0].text_body(), Some("hi"));
}

#[tokio::test]
async fn reply_to_received_mail_is_sendable() {
    let setup = Setup::new("cat > /dev/null");
    let received = postern_mime::Message::parse(
        concat!(
            "From: Friend <friend@example.org>\r\n",
            "To: me@example.com\r\n",
            "Subject: Dinner\r\n",
            "Date: Fri, 07 Mar 2025 18:30:00 +0100\r\n",
            "Message-ID: <dinner@example.org>\r\n",
            "References: <a@example.org> <b@example.org>\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "Friday at eight?\r\n",
        )
        .as_bytes(),
    )
    .unwrap();

    let reply = compose_reply(&received, false, &setup.config);
    assert_eq!(reply.from(), Some("me@example.com"));
    assert_eq!(reply.to(), Some("Friend <friend@example.org>"));
    assert_eq!(reply.subject(), Some("Re: Dinner"));
    assert_eq!(
        reply.references(),
        ["<a@example.org>", "<b@example.org>", "<dinner@example.org>"]
    );
    assert!(
        reply.parts[0]
            .text_body()
            .unwrap()
            .ends_with("> Friday at eight?\n")
    );

    let report = Sender::new(&setup.config, &setup.index)
        .send(&reply)
        .await
        .unwrap();
    let filed = read_message(report.path).unwrap();
    assert_eq!(filed.in_reply_to(), Some("<dinner@example.org>"));
}
