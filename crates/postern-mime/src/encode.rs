//! Serializing messages into 7-bit clean wire format.

use crate::content_type::ContentType;
use crate::encoding::{
    MAX_LINE_LENGTH, encode_7bit_safe, encode_address_header, encode_quoted_printable,
    encode_rfc2047, needs_encoding,
};
use crate::error::{Error, Result};
use crate::header::Headers;
use crate::message::{Body, Message, Part, TEXT_PLAIN_UTF8, TransferEncoding};
use rand::RngCore;
use std::fmt::Write as _;

/// Header fields whose values are address lists.
const ADDRESS_FIELDS: [&str; 5] = ["From", "To", "Cc", "Bcc", "Reply-To"];

/// Header fields whose values carry quoted parameters.
const PARAMETER_FIELDS: [&str; 2] = ["Content-Type", "Content-Disposition"];

/// Number of random bytes in a multipart boundary.
const BOUNDARY_BYTES: usize = 30;

/// Generates a random multipart boundary token.
#[must_use]
pub fn random_boundary() -> String {
    let mut bytes = [0u8; BOUNDARY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Encodes only the quoted parameter values, keeping the media type and
/// parameter names readable.
fn encode_parameter_header(value: &str) -> String {
    value
        .split('"')
        .enumerate()
        .map(|(i, segment)| {
            if i % 2 == 1 {
                encode_rfc2047(segment)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\"")
}

fn encode_header_value(name: &str, value: &str) -> String {
    let is = |fields: &[&str]| fields.iter().any(|f| f.eq_ignore_ascii_case(name));
    if is(&ADDRESS_FIELDS) {
        encode_address_header(value)
    } else if is(&PARAMETER_FIELDS) && needs_encoding(value) {
        encode_parameter_header(value)
    } else {
        encode_rfc2047(value)
    }
}

/// Writes headers as sorted `Name: value` lines followed by a blank line.
fn write_headers(out: &mut String, headers: &Headers) {
    let mut lines: Vec<String> = headers
        .fields()
        .filter_map(|(name, values)| {
            let value = values
                .iter()
                .filter(|v| !v.is_empty())
                .map(|v| encode_header_value(name, v))
                .collect::<Vec<_>>()
                .join(" ");
            (!value.is_empty()).then(|| format!("{name}: {value}\r\n"))
        })
        .collect();
    lines.sort();

    for line in lines {
        out.push_str(&line);
    }
    out.push_str("\r\n");
}

fn to_crlf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\r\n")
}

/// Chooses the wire encoding of a part and encodes its body.
///
/// Returns the part headers with the matching `Content-Transfer-Encoding`.
fn encode_part(part: &Part) -> Result<(Headers, String)> {
    let mut headers = part.headers.clone();

    let (encoding, body) = match &part.body {
        Body::Binary(bytes) => (
            TransferEncoding::Base64,
            encode_7bit_safe(bytes, MAX_LINE_LENGTH)?,
        ),
        Body::Text(text) if part.transfer_encoding() == TransferEncoding::Base64 => (
            TransferEncoding::Base64,
            encode_7bit_safe(to_crlf(text).as_bytes(), MAX_LINE_LENGTH)?,
        ),
        Body::Text(text) => (
            TransferEncoding::QuotedPrintable,
            encode_quoted_printable(text),
        ),
    };

    // Text bodies are held as UTF-8 whatever they were received in
    if matches!(part.body, Body::Text(_)) {
        if let Some(Ok(mut content_type)) = headers.get("Content-Type").map(ContentType::parse) {
            let stale = content_type
                .charset()
                .is_some_and(|c| !c.eq_ignore_ascii_case("utf-8") && !c.eq_ignore_ascii_case("us-ascii"));
            if stale {
                content_type = content_type.with_parameter("charset", "utf-8");
                headers.set("Content-Type", content_type.to_string());
            }
        }
    }

    headers.set("Content-Transfer-Encoding", encoding.to_string());
    Ok((headers, body))
}

/// Serializes a message.
///
/// A single part is promoted onto the message headers. Several parts are
/// framed as `multipart/mixed` with a fresh random boundary. The message
/// itself is not modified.
///
/// # Errors
///
/// Returns [`Error::EmptyMessage`] if the message has no parts.
pub fn encode(message: &Message) -> Result<String> {
    if message.parts.is_empty() {
        return Err(Error::EmptyMessage);
    }

    let mut headers = message.headers.clone();
    let mut out = String::new();

    if let [part] = message.parts.as_slice() {
        let (part_headers, body) = encode_part(part)?;
        headers.remove("Content-Type");
        headers.remove("Content-Transfer-Encoding");
        for (name, values) in part_headers.fields() {
            headers.set_all(name, values.to_vec());
        }
        if headers.get("Content-Type").is_none() {
            let default = match part.body {
                Body::Text(_) => TEXT_PLAIN_UTF8,
                Body::Binary(_) => "application/octet-stream",
            };
            headers.set("Content-Type", default);
        }
        write_headers(&mut out, &headers);
        out.push_str(&body);
        return Ok(out);
    }

    let boundary = random_boundary();
    headers.set(
        "Content-Type",
        ContentType::multipart_mixed(boundary.as_str()).to_string(),
    );
    headers.remove("Content-Transfer-Encoding");
    write_headers(&mut out, &headers);

    for (i, part) in message.parts.iter().enumerate() {
        let (part_headers, body) = encode_part(part)?;
        let lead = if i == 0 { "" } else { "\r\n" };
        let _ = write!(out, "{lead}--{boundary}\r\n");
        write_headers(&mut out, &part_headers);
        out.push_str(&body);
    }
    let _ = write!(out, "\r\n--{boundary}--\r\n");

    Ok(out)
}
