//! Printable views of a message.

use postern_mime::{Mailbox, Message, Part};
use serde::Serialize;
use std::fmt::Write as _;

/// Overview of one part.
#[derive(Debug, Serialize)]
pub struct PartSummary {
    /// Media type without parameters.
    pub content_type: String,
    /// Attachment file name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Decoded size in bytes.
    pub size: usize,
}

impl From<&Part> for PartSummary {
    fn from(part: &Part) -> Self {
        Self {
            content_type: part.content_type().media_type(),
            filename: part.filename(),
            size: part.body.len(),
        }
    }
}

/// Overview of a message, printed by `show --json`.
#[derive(Debug, Serialize)]
pub struct MessageSummary {
    /// Sender mailboxes.
    pub from: Vec<Mailbox>,
    /// Recipient mailboxes.
    pub to: Vec<Mailbox>,
    /// Carbon copy mailboxes.
    pub cc: Vec<Mailbox>,
    /// Subject line.
    pub subject: String,
    /// Date in RFC 3339 form, or as written if it does not parse.
    pub date: Option<String>,
    /// Message-ID.
    pub message_id: Option<String>,
    /// Leaf parts in order.
    pub parts: Vec<PartSummary>,
}

impl From<&Message> for MessageSummary {
    fn from(message: &Message) -> Self {
        Self {
            from: message.from_mailboxes().unwrap_or_default(),
            to: message.to_mailboxes().unwrap_or_default(),
            cc: message.cc_mailboxes().unwrap_or_default(),
            subject: message.subject().unwrap_or_default().to_string(),
            date: message
                .parsed_date()
                .map(|d| d.to_rfc3339())
                .or_else(|| message.date().map(str::to_string)),
            message_id: message.message_id().map(str::to_string),
            parts: message.parts.iter().map(PartSummary::from).collect(),
        }
    }
}

/// Renders a message for reading.
///
/// The main headers come first, then the text parts and a numbered list of
/// attachments.
#[must_use]
pub fn render(message: &Message) -> String {
    let mut out = String::new();
    for name in ["From", "To", "Cc", "Date", "Subject"] {
        if let Some(value) = message.header(name).filter(|v| !v.is_empty()) {
            let _ = writeln!(out, "{name}: {value}");
        }
    }
    out.push('\n');

    for text in message.text_plain_parts() {
        out.push_str(text);
        if !text.ends_with('\n') {
            out.push('\n');
        }
    }

    for (i, part) in message.attachments().enumerate() {
        let name = part.filename().unwrap_or_else(|| "(unnamed)".to_string());
        let _ = writeln!(
            out,
            "[{}] {name} ({}, {} bytes)",
            i + 1,
            part.content_type().media_type(),
            part.body.len()
        );
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use postern_mime::{Body, Headers};

    fn message() -> Message {
        let mut message = Message::new();
        message.headers.set("From", "Ann <ann@example.com>");
        message.headers.set("To", "bob@example.com");
        message.headers.set("Subject", "Photos");
        message
            .headers
            .set("Date", "Mon, 02 Jan 2006 15:04:05 -0700");
        message.parts.push(Part::text("See attached."));
        let mut photo = Part::new(Headers::new(), Body::Binary(vec![0; 4]));
        photo.headers.set("Content-Type", "image/jpeg");
        photo
            .headers
            .set("Content-Disposition", "attachment; filename=\"beach.jpg\"");
        message.parts.push(photo);
        message
    }

    #[test]
    fn renders_text_and_attachments() {
        assert_eq!(
            render(&message()),
            concat!(
                "From: Ann <ann@example.com>\n",
                "To: bob@example.com\n",
                "Date: Mon, 02 Jan 2006 15:04:05 -0700\n",
                "Subject: Photos\n",
                "\n",
                "See attached.\n",
                "[1] beach.jpg (image/jpeg, 4 bytes)\n",
            )
        );
    }

    #[test]
    fn json_summary() {
        let json = serde_json::to_value(MessageSummary::from(&message())).unwrap();
        assert_eq!(json["subject"], "Photos");
        assert_eq!(json["from"][0]["email"], "ann@example.com");
        assert_eq!(json["date"], "2006-01-02T15:04:05-07:00");
        assert_eq!(json["parts"][1]["filename"], "beach.jpg");
        assert!(json["parts"][0].get("filename").is_none());
    }
}
