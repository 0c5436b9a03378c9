//! Decoding stored messages into the part model.
//!
//! Multipart bodies are flattened into their leaf parts in document order.
//! Transfer encodings are removed and text is converted to UTF-8 with LF line
//! endings, so the resulting [`Message`] can be edited and encoded again.

use crate::content_type::ContentType;
use crate::encoding::{
    decode_charset, decode_rfc2047, decode_transfer_encoding, normalize_charset,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Body, Message, Part, TransferEncoding, content_type_of};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

/// Splits a multipart body into the raw bytes of its parts.
///
/// Each returned slice holds one part's header block and body.
pub trait PartSource {
    /// Splits `body` on `boundary`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Framing`] if the body is not framed by `boundary`.
    fn split<'a>(&self, body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>>;
}

/// RFC 2046 boundary splitter.
///
/// Text before the first delimiter and after the closing one is ignored.
/// Delimiter lines may carry trailing whitespace. A missing closing delimiter
/// is tolerated; the last part then runs to the end of the body.
#[derive(Debug, Clone, Copy, Default)]
pub struct MultipartSplitter;

impl PartSource for MultipartSplitter {
    fn split<'a>(&self, body: &'a [u8], boundary: &str) -> Result<Vec<&'a [u8]>> {
        let delimiter = format!("--{boundary}");
        let mut parts = Vec::new();
        let mut current: Option<usize> = None;
        let mut opened = false;
        let mut closed = false;
        let mut pos = 0;

        while pos < body.len() {
            let line_end = body[pos..]
                .iter()
                .position(|&b| b == b'\n')
                .map_or(body.len(), |i| pos + i);
            let next = (line_end + 1).min(body.len());
            let line = trim_line_end(&body[pos..line_end]);

            if let Some(rest) = line.strip_prefix(delimiter.as_bytes()) {
                let is_close = rest == b"--";
                if rest.is_empty() || is_close {
                    opened = true;
                    if let Some(start) = current.take() {
                        parts.push(&body[start..content_end(body, start, pos)]);
                    }
                    if is_close {
                        closed = true;
                        break;
                    }
                    current = Some(next);
                }
            }
            pos = line_end + 1;
        }

        if !opened {
            return Err(Error::Framing(format!(
                "no delimiter line for boundary {boundary:?}"
            )));
        }
        if !closed {
            warn!(boundary, "multipart body without closing delimiter");
            if let Some(start) = current {
                parts.push(&body[start..]);
            }
        }

        Ok(parts)
    }
}

/// Strips CR and transport whitespace from the end of a line.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|b| !matches!(b, b'\r' | b' ' | b'\t'))
        .map_or(0, |p| p + 1);
    &line[..end]
}

/// The line break before a delimiter belongs to the delimiter.
fn content_end(body: &[u8], start: usize, delimiter: usize) -> usize {
    let mut end = delimiter;
    if end > start && body[end - 1] == b'\n' {
        end -= 1;
        if end > start && body[end - 1] == b'\r' {
            end -= 1;
        }
    }
    end
}

/// Splits raw bytes at the first empty line into header block and body.
///
/// Without an empty line everything is header.
fn split_head(raw: &[u8]) -> (&[u8], &[u8]) {
    let mut pos = 0;
    while pos < raw.len() {
        let line_end = raw[pos..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| pos + i);
        let line = &raw[pos..line_end];
        if line.is_empty() || line == b"\r" {
            return (&raw[..pos], &raw[(line_end + 1).min(raw.len())..]);
        }
        pos = line_end + 1;
    }
    (raw, &[])
}

/// Drops an mbox `From ` separator line at the start of a message.
fn skip_mbox_separator(raw: &[u8]) -> &[u8] {
    if raw.starts_with(b"From ") {
        let next = raw
            .iter()
            .position(|&b| b == b'\n')
            .map_or(raw.len(), |i| i + 1);
        &raw[next..]
    } else {
        raw
    }
}

fn parse_headers(head: &[u8]) -> Result<Headers> {
    let text = normalize_charset(head);
    let mut headers = Headers::parse(&text)?;
    headers.map_values(decode_rfc2047);
    Ok(headers)
}

fn normalize_newlines(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n")
    } else {
        text
    }
}

/// Removes the transfer encoding and classifies the body of a leaf part.
fn decode_leaf(headers: Headers, raw_body: &[u8]) -> Part {
    let content_type = content_type_of(&headers);
    let encoding = headers
        .get("Content-Transfer-Encoding")
        .map_or(TransferEncoding::SevenBit, TransferEncoding::parse);

    if encoding == TransferEncoding::Unknown {
        debug!(
            encoding = headers.get("Content-Transfer-Encoding"),
            "unknown transfer encoding, body left as is"
        );
    }

    let decoded = decode_transfer_encoding(encoding, raw_body).unwrap_or_else(|e| {
        warn!(error = %e, %encoding, "transfer decoding failed, keeping raw body");
        Cow::Borrowed(raw_body)
    });

    let body = if content_type.is_text_plain() {
        Body::Text(normalize_newlines(normalize_charset(&decoded)))
    } else if content_type.is_text() {
        let text = content_type
            .charset()
            .and_then(|charset| decode_charset(charset, &decoded))
            .unwrap_or_else(|| String::from_utf8_lossy(&decoded).into_owned());
        Body::Text(normalize_newlines(text))
    } else {
        Body::Binary(decoded.into_owned())
    };

    Part::new(headers, body)
}

fn split_multipart<'a, S: PartSource>(
    source: &S,
    content_type: &ContentType,
    body: &'a [u8],
) -> Result<std::vec::IntoIter<&'a [u8]>> {
    let boundary = content_type.boundary().ok_or_else(|| {
        Error::Framing(format!("{} without boundary", content_type.media_type()))
    })?;
    Ok(source.split(body, boundary)?.into_iter())
}

/// Collects the leaf parts below a multipart body in document order.
///
/// Nested multiparts are walked with an explicit stack of open containers,
/// so nesting depth is bounded by memory rather than by the call stack.
fn collect_parts<S: PartSource>(
    source: &S,
    content_type: &ContentType,
    body: &[u8],
    parts: &mut Vec<Part>,
) -> Result<()> {
    let mut open = vec![split_multipart(source, content_type, body)?];

    while let Some(container) = open.last_mut() {
        let Some(raw) = container.next() else {
            open.pop();
            continue;
        };
        let (head, body) = split_head(raw);
        let headers = parse_headers(head)?;
        let nested = content_type_of(&headers);
        if nested.is_multipart() {
            open.push(split_multipart(source, &nested, body)?);
        } else {
            parts.push(decode_leaf(headers, body));
        }
    }

    Ok(())
}

/// Decodes a raw message using the given multipart splitter.
///
/// # Errors
///
/// Returns [`Error::Header`] for a malformed header block and
/// [`Error::Framing`] for broken multipart framing.
pub fn decode_with<S: PartSource>(raw: &[u8], source: &S) -> Result<Message> {
    let (head, body) = split_head(skip_mbox_separator(raw));
    let headers = parse_headers(head)?;
    let content_type = content_type_of(&headers);

    let mut parts = Vec::new();
    if content_type.is_multipart() {
        collect_parts(source, &content_type, body, &mut parts)?;
        if parts.is_empty() {
            debug!("multipart body without parts, using an empty text part");
            parts.push(Part::text(""));
        }
    } else {
        let mut part_headers = Headers::new();
        for name in ["Content-Type", "Content-Transfer-Encoding"] {
            if let Some(value) = headers.get(name) {
                part_headers.set(name, value);
            }
        }
        parts.push(decode_leaf(part_headers, body));
    }

    debug!(parts = parts.len(), "decoded message");
    Ok(Message { headers, parts })
}

/// Decodes a raw message.
///
/// # Errors
///
/// Returns [`Error::Header`] for a malformed header block and
/// [`Error::Framing`] for broken multipart framing.
pub fn decode(raw: &[u8]) -> Result<Message> {
    decode_with(raw, &MultipartSplitter)
}

/// Reads and decodes a message file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read, otherwise as [`decode`].
pub fn read_message(path: impl AsRef<Path>) -> Result<Message> {
    let raw = std::fs::read(path.as_ref())?;
    decode(&raw)
}
