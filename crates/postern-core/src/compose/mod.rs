//! Composing new messages, replies and attachments.

mod edit;
mod reply;

pub use edit::{apply_edit_string, edit_string};
pub use reply::compose_reply;

use crate::error::Result;
use crate::host::hostname;
use chrono::{DateTime, Local, TimeZone};
use postern_mime::{Body, Headers, Message, Part, TransferEncoding};
use std::fmt::Display;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Value of the `User-Agent` header.
pub const USER_AGENT: &str = concat!("postern/", env!("CARGO_PKG_VERSION"));

/// RFC 1123 date with numeric zone, as used in the `Date` header.
pub const DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

static MESSAGE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Formats a timestamp for the `Date` header.
#[must_use]
pub fn format_date<Tz>(date: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    date.format(DATE_FORMAT).to_string()
}

/// Generates a new Message-ID.
#[must_use]
pub fn new_message_id() -> String {
    let now = Local::now();
    let count = MESSAGE_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "<{}.{:x}{:x}.{count:x}@{}>",
        now.format("%Y%m%d%H%M"),
        now.timestamp(),
        now.timestamp_subsec_nanos(),
        hostname()
    )
}

/// Creates an empty message with fresh identity headers and no parts.
#[must_use]
pub fn compose_new() -> Message {
    let mut message = Message::new();
    message.headers.set("MIME-Version", "1.0");
    message.headers.set("User-Agent", USER_AGENT);
    message.headers.set("Message-ID", new_message_id());
    message.headers.set("Date", format_date(&Local::now()));
    message
}

fn quote_parameter(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Appends a file as an attachment.
///
/// The media type is guessed from the file extension.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the file cannot be read.
pub fn attach(message: &mut Message, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let name = path
        .file_name()
        .map_or_else(|| "attachment".to_string(), |n| n.to_string_lossy().into_owned());
    let name = quote_parameter(&name);
    let media_type = mime_guess::from_path(path).first_or_octet_stream();

    let mut headers = Headers::new();
    headers.set("Content-Type", format!("{media_type}; name=\"{name}\""));
    headers.set(
        "Content-Disposition",
        format!("attachment; filename=\"{name}\""),
    );
    headers.set(
        "Content-Transfer-Encoding",
        TransferEncoding::Base64.to_string(),
    );

    debug!(path = %path.display(), %media_type, bytes = data.len(), "attached file");
    message.parts.push(Part::new(headers, Body::Binary(data)));
    Ok(())
}

/// Removes the last part, but never the only one.
pub fn detach(message: &mut Message) -> Option<Part> {
    if message.parts.len() > 1 {
        message.parts.pop()
    } else {
        None
    }
}
