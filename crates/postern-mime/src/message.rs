//! MIME message structure and handling.

use crate::address::{Mailbox, parse_address_list};
use crate::content_type::ContentType;
use crate::error::Result;
use crate::header::Headers;
use chrono::{DateTime, FixedOffset};
use std::fmt;

/// Content type used for text parts created by the client.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=\"utf-8\"";

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit binary.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
    /// An encoding this crate does not know; bodies pass through unchanged.
    Unknown,
}

impl TransferEncoding {
    /// Parses transfer encoding from string.
    ///
    /// An empty value is treated as `7bit`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Decoded content of a part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Text content, UTF-8 with LF line endings.
    Text(String),
    /// Raw bytes of a non-text part.
    Binary(Vec<u8>),
}

impl Body {
    /// Returns the text if this is a text body.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }

    /// Returns the body as bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(text) => text.as_bytes(),
            Self::Binary(bytes) => bytes,
        }
    }

    /// Returns the length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the body is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}

/// MIME message part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Decoded part body.
    pub body: Body,
}

impl Part {
    /// Creates a new part.
    #[must_use]
    pub const fn new(headers: Headers, body: Body) -> Self {
        Self { headers, body }
    }

    /// Creates a UTF-8 `text/plain` part sent as quoted-printable.
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        let mut headers = Headers::new();
        headers.set("Content-Type", TEXT_PLAIN_UTF8);
        headers.set(
            "Content-Transfer-Encoding",
            TransferEncoding::QuotedPrintable.to_string(),
        );
        Self::new(headers, Body::Text(body.into()))
    }

    /// Gets the content type.
    ///
    /// A missing or unparseable header yields `text/plain; charset=utf-8`.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        content_type_of(&self.headers)
    }

    /// Gets the declared transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("Content-Transfer-Encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// Returns the attachment file name from `Content-Disposition` or the
    /// content type's `name` parameter.
    #[must_use]
    pub fn filename(&self) -> Option<String> {
        self.headers
            .get("Content-Disposition")
            .and_then(|d| ContentType::parse(&format!("x/{d}")).ok())
            .and_then(|d| d.parameters.get("filename").cloned())
            .or_else(|| self.content_type().name().map(str::to_string))
            .filter(|name| !name.is_empty())
    }

    /// Returns true if the part is marked as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers.get("Content-Disposition").is_some_and(|d| {
            d.trim_start()
                .get(..10)
                .is_some_and(|s| s.eq_ignore_ascii_case("attachment"))
        })
    }

    /// Returns the text body if this is a text part.
    #[must_use]
    pub fn text_body(&self) -> Option<&str> {
        self.body.as_text()
    }
}

/// Reads the content type from headers, defaulting to UTF-8 plain text.
pub(crate) fn content_type_of(headers: &Headers) -> ContentType {
    headers
        .get("Content-Type")
        .and_then(|value| ContentType::parse(value).ok())
        .unwrap_or_else(ContentType::text_plain)
}

/// MIME message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Message {
    /// Message headers.
    pub headers: Headers,
    /// Leaf parts in document order.
    pub parts: Vec<Part>,
}

impl Message {
    /// Creates a new empty message.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a message from raw bytes.
    ///
    /// # Errors
    ///
    /// See [`crate::decode::decode`].
    pub fn parse(raw: &[u8]) -> Result<Self> {
        crate::decode::decode(raw)
    }

    /// Serializes the message.
    ///
    /// # Errors
    ///
    /// See [`crate::encode::encode`].
    pub fn encode(&self) -> Result<String> {
        crate::encode::encode(self)
    }

    /// Gets the first value of a header.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Gets the From header.
    #[must_use]
    pub fn from(&self) -> Option<&str> {
        self.header("From")
    }

    /// Gets the To header.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.header("To")
    }

    /// Gets the Cc header.
    #[must_use]
    pub fn cc(&self) -> Option<&str> {
        self.header("Cc")
    }

    /// Gets the Subject header.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.header("Subject")
    }

    /// Gets the Date header.
    #[must_use]
    pub fn date(&self) -> Option<&str> {
        self.header("Date")
    }

    /// Parses the Date header as an RFC 2822 date.
    ///
    /// A trailing comment such as `(UTC)` is ignored.
    #[must_use]
    pub fn parsed_date(&self) -> Option<DateTime<FixedOffset>> {
        let date = self.date()?.trim();
        let date = match (date.rfind('('), date.ends_with(')')) {
            (Some(open), true) => date[..open].trim_end(),
            _ => date,
        };
        DateTime::parse_from_rfc2822(date).ok()
    }

    /// Gets the Message-ID header.
    #[must_use]
    pub fn message_id(&self) -> Option<&str> {
        self.header("Message-ID")
    }

    /// Gets the In-Reply-To header.
    #[must_use]
    pub fn in_reply_to(&self) -> Option<&str> {
        self.header("In-Reply-To")
    }

    /// Returns every message id listed in the References header(s).
    #[must_use]
    pub fn references(&self) -> Vec<String> {
        self.headers
            .get_all("References")
            .into_iter()
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect()
    }

    /// Parses the From header as an address list.
    ///
    /// # Errors
    ///
    /// Returns an error if the header does not parse.
    pub fn from_mailboxes(&self) -> Result<Vec<Mailbox>> {
        parse_address_list(self.from().unwrap_or_default())
    }

    /// Parses the To header as an address list.
    ///
    /// # Errors
    ///
    /// Returns an error if the header does not parse.
    pub fn to_mailboxes(&self) -> Result<Vec<Mailbox>> {
        parse_address_list(self.to().unwrap_or_default())
    }

    /// Parses the Cc header as an address list.
    ///
    /// # Errors
    ///
    /// Returns an error if the header does not parse.
    pub fn cc_mailboxes(&self) -> Result<Vec<Mailbox>> {
        parse_address_list(self.cc().unwrap_or_default())
    }

    /// Returns the bodies of all `text/plain` parts in order.
    pub fn text_plain_parts(&self) -> impl Iterator<Item = &str> {
        self.parts
            .iter()
            .filter(|part| part.content_type().is_text_plain())
            .filter_map(Part::text_body)
    }

    /// Returns the parts that carry a file name.
    pub fn attachments(&self) -> impl Iterator<Item = &Part> {
        self.parts
            .iter()
            .filter(|part| part.is_attachment() || part.filename().is_some())
    }
}
