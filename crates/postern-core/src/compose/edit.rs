//! Plain text form of a message for editing.
//!
//! ```text
//! From: me@example.com
//! To: you@example.com
//! Subject: Hello
//!
//! Message body.
//! ```

use super::format_date;
use crate::error::{Error, Result};
use chrono::Local;
use postern_mime::{Body, Message, Part};

/// Headers shown in the edit string, in order.
const EDITABLE_HEADERS: [&str; 3] = ["From", "To", "Subject"];

/// Renders the editable headers and the first part's text.
#[must_use]
pub fn edit_string(message: &Message) -> String {
    let mut text = String::new();
    for name in EDITABLE_HEADERS {
        text.push_str(name);
        text.push_str(": ");
        text.push_str(message.header(name).unwrap_or_default());
        text.push('\n');
    }
    text.push('\n');
    if let Some(body) = message.parts.first().and_then(Part::text_body) {
        text.push_str(body);
    }
    text
}

/// Applies an edited edit string to a message.
///
/// Every line up to the first empty one must be a `Name: value` header; it
/// replaces that header in the message. The rest becomes the body of the
/// first part, which is created if the message has no text part first.
/// The `Date` header is refreshed.
///
/// # Errors
///
/// Returns [`Error::EditFormat`] if the header section is malformed. The
/// message is left unchanged in that case.
pub fn apply_edit_string(message: &mut Message, text: &str) -> Result<()> {
    let mut lines = text.lines();
    let mut headers = Vec::new();

    for line in lines.by_ref() {
        if line.is_empty() {
            break;
        }
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| Error::EditFormat(format!("not a header line: {line:?}")))?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(Error::EditFormat(format!("invalid header name in {line:?}")));
        }
        headers.push((name.to_string(), value.trim().to_string()));
    }

    let mut body = String::new();
    for line in lines {
        body.push_str(line);
        body.push('\n');
    }

    for (name, value) in headers {
        message.headers.set(name, value);
    }
    message.headers.set("Date", format_date(&Local::now()));

    match message.parts.first_mut() {
        Some(part) if part.text_body().is_some() => part.body = Body::Text(body),
        _ => message.parts.insert(0, Part::text(body)),
    }

    Ok(())
}
