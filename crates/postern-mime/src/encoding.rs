//! MIME encoding and decoding utilities.
//!
//! Supports Base64 (with bounded line length), Quoted-Printable, charset
//! normalization and RFC 2047 header encoding.

use crate::address::parse_address_list;
use crate::error::{Error, Result};
use crate::message::TransferEncoding;
use base64::Engine;
use base64::alphabet;
use base64::engine::general_purpose::STANDARD;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::write::EncoderWriter;
use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::io::{self, Write};
use tracing::debug;

/// Maximum line length for Quoted-Printable and Base64 bodies.
pub const MAX_LINE_LENGTH: usize = 76;

/// Maximum length of a single RFC 2047 encoded word.
const MAX_ENCODED_WORD_LENGTH: usize = 75;

const ENCODED_WORD_PREFIX: &str = "=?utf-8?q?";
const ENCODED_WORD_SUFFIX: &str = "?=";

/// Accepts missing padding and stray trailing bits, which real mail has plenty of.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT.decode(cleaned).map_err(Into::into)
}

/// Inserts a CRLF after every `line_length` bytes written through it.
///
/// The position within the current line is kept across calls to `write`, so
/// the wrapper can sit underneath a streaming encoder. Only safe for ASCII
/// output, since multi-byte characters could be split.
#[derive(Debug)]
pub struct LineWrapper<W: Write> {
    inner: W,
    line_length: usize,
    counter: usize,
}

impl<W: Write> LineWrapper<W> {
    /// Wraps `inner`, breaking lines after `line_length` bytes (at least one).
    pub fn new(inner: W, line_length: usize) -> Self {
        Self {
            inner,
            line_length: line_length.max(1),
            counter: 0,
        }
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for LineWrapper<W> {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut rest = data;
        // A break is only emitted once more data follows a full line.
        while self.counter + rest.len() > self.line_length {
            let take = self.line_length - self.counter;
            self.inner.write_all(&rest[..take])?;
            self.inner.write_all(b"\r\n")?;
            rest = &rest[take..];
            self.counter = 0;
        }
        self.inner.write_all(rest)?;
        self.counter += rest.len();
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Base64-encodes `data` into `out`, breaking lines every `line_length` bytes.
///
/// # Errors
///
/// Returns any error raised by the underlying writer.
pub fn write_7bit_safe<W: Write>(data: &[u8], line_length: usize, out: W) -> io::Result<W> {
    let mut encoder = EncoderWriter::new(LineWrapper::new(out, line_length), &STANDARD);
    encoder.write_all(data)?;
    Ok(encoder.finish()?.into_inner())
}

/// Base64-encodes `data` with a line break every `line_length` encoded bytes.
///
/// # Errors
///
/// Only fails if the encoder produces non-ASCII output, which it never should.
pub fn encode_7bit_safe(data: &[u8], line_length: usize) -> Result<String> {
    let bytes = write_7bit_safe(data, line_length, Vec::with_capacity(data.len() * 4 / 3 + 4))?;
    String::from_utf8(bytes).map_err(|e| Error::InvalidEncoding(e.to_string()))
}

/// Encodes text using Quoted-Printable encoding (RFC 2045).
///
/// Line breaks (LF or CRLF) become CRLF hard breaks, whitespace at the end of
/// a line is encoded, and soft breaks keep every line within
/// [`MAX_LINE_LENGTH`] characters.
#[must_use]
pub fn encode_quoted_printable(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut result = String::with_capacity(bytes.len() + bytes.len() / 8);
    let mut line_length = 0;
    let mut i = 0;

    while i < bytes.len() {
        let byte = bytes[i];

        // Hard line break
        if byte == b'\n' || (byte == b'\r' && bytes.get(i + 1) == Some(&b'\n')) {
            result.push_str("\r\n");
            line_length = 0;
            i += if byte == b'\r' { 2 } else { 1 };
            continue;
        }

        let at_line_end = match bytes.get(i + 1) {
            None | Some(b'\n') => true,
            Some(b'\r') => bytes.get(i + 2) == Some(&b'\n'),
            Some(_) => false,
        };
        let literal = match byte {
            b' ' | b'\t' => !at_line_end,
            b'!'..=b'<' | b'>'..=b'~' => true,
            _ => false,
        };
        let width = if literal { 1 } else { 3 };

        // Leave room for the trailing '=' of a soft break
        if line_length + width > MAX_LINE_LENGTH - 1 {
            result.push_str("=\r\n");
            line_length = 0;
        }

        if literal {
            result.push(char::from(byte));
        } else {
            let _ = write!(result, "={byte:02X}");
        }
        line_length += width;
        i += 1;
    }

    result
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        _ => None,
    }
}

/// Decodes `=XX` escapes in a single line (no soft break handling).
///
/// An `=` that does not start a valid escape is kept literally.
fn decode_qp_escapes(line: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < line.len() {
        let escape = (line[i] == b'=')
            .then(|| {
                let high = line.get(i + 1).copied().and_then(hex_value)?;
                let low = line.get(i + 2).copied().and_then(hex_value)?;
                Some((high << 4) | low)
            })
            .flatten();
        if let Some(byte) = escape {
            out.push(byte);
            i += 3;
        } else {
            out.push(line[i]);
            i += 1;
        }
    }
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed, transport padding at the end of lines is
/// dropped, and hard breaks keep their original line ending. Malformed
/// escapes such as a bare `=` in a URL pass through unchanged, so decoding
/// never fails.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(data.len());
    let mut lines = data.split(|&b| b == b'\n').peekable();

    while let Some(line) = lines.next() {
        let has_newline = lines.peek().is_some();
        let (line, had_cr) = line
            .strip_suffix(b"\r")
            .map_or((line, false), |l| (l, true));

        let trimmed_len = line
            .iter()
            .rposition(|b| !matches!(b, b' ' | b'\t'))
            .map_or(0, |p| p + 1);
        let line = &line[..trimmed_len];

        let (content, soft_break) = line
            .strip_suffix(b"=")
            .map_or((line, false), |c| (c, true));

        decode_qp_escapes(content, &mut result);

        if has_newline && !soft_break {
            result.extend_from_slice(if had_cr { b"\r\n" } else { b"\n" });
        }
    }

    result
}

/// Removes a transfer encoding from a body.
///
/// Base64 and Quoted-Printable are decoded. Identity encodings (`7bit`,
/// `8bit`, `binary`) and [`TransferEncoding::Unknown`] are returned unchanged;
/// callers that care whether decoding was skipped check for `Unknown`.
///
/// # Errors
///
/// Returns an error if the body is not valid for its declared encoding.
pub fn decode_transfer_encoding(encoding: TransferEncoding, body: &[u8]) -> Result<Cow<'_, [u8]>> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(body).map(Cow::Owned),
        TransferEncoding::QuotedPrintable => Ok(Cow::Owned(decode_quoted_printable(body))),
        TransferEncoding::SevenBit
        | TransferEncoding::EightBit
        | TransferEncoding::Binary
        | TransferEncoding::Unknown => Ok(Cow::Borrowed(body)),
    }
}

/// Detects the charset of plain text and converts it to UTF-8.
///
/// Valid UTF-8 is returned as is. Otherwise a statistical detector picks the
/// most likely legacy encoding and the text is transcoded from it. This never
/// fails; undecodable sequences become U+FFFD.
#[must_use]
pub fn normalize_charset(bytes: &[u8]) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_owned();
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    if encoding == UTF_8 {
        return String::from_utf8_lossy(bytes).into_owned();
    }

    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        debug!(charset = encoding.name(), "charset conversion replaced malformed bytes");
    }
    text.into_owned()
}

/// Decodes bytes from a named charset, if the label is known.
#[must_use]
pub fn decode_charset(label: &str, bytes: &[u8]) -> Option<String> {
    let encoding = Encoding::for_label_no_replacement(label.trim().as_bytes())?;
    Some(encoding.decode_without_bom_handling(bytes).0.into_owned())
}

/// Returns true if a header value contains anything besides printable ASCII
/// and tabs.
#[must_use]
pub fn needs_encoding(value: &str) -> bool {
    value.chars().any(|c| (c < ' ' || c > '~') && c != '\t')
}

fn q_encode_byte(byte: u8, out: &mut String) {
    match byte {
        b' ' => out.push('_'),
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'!' | b'*' | b'+' | b'-' | b'/' => {
            out.push(char::from(byte));
        }
        _ => {
            let _ = write!(out, "={byte:02X}");
        }
    }
}

/// Encodes a header value using RFC 2047 "Q" encoded words.
///
/// Values made only of printable ASCII are returned unchanged. Otherwise the
/// value is split into `=?utf-8?q?...?=` words of at most 75 characters,
/// never splitting a character, separated by single spaces.
#[must_use]
pub fn encode_rfc2047(text: &str) -> String {
    if !needs_encoding(text) {
        return text.to_string();
    }

    let budget = MAX_ENCODED_WORD_LENGTH - ENCODED_WORD_PREFIX.len() - ENCODED_WORD_SUFFIX.len();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut buf = [0u8; 4];

    for c in text.chars() {
        let mut token = String::new();
        for &byte in c.encode_utf8(&mut buf).as_bytes() {
            q_encode_byte(byte, &mut token);
        }
        if !current.is_empty() && current.len() + token.len() > budget {
            words.push(std::mem::take(&mut current));
        }
        current.push_str(&token);
    }
    if !current.is_empty() {
        words.push(current);
    }

    words
        .iter()
        .map(|w| format!("{ENCODED_WORD_PREFIX}{w}{ENCODED_WORD_SUFFIX}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Encodes an address header value, touching only display names.
///
/// Bracketed addresses stay literal. If the value does not parse as an
/// address list, everything before the last space is treated as the name.
#[must_use]
pub fn encode_address_header(value: &str) -> String {
    if !needs_encoding(value) {
        return value.to_string();
    }

    match parse_address_list(value) {
        Ok(list) if !list.is_empty() => list
            .iter()
            .map(crate::address::Mailbox::to_encoded_string)
            .collect::<Vec<_>>()
            .join(", "),
        _ => match value.trim_end().rsplit_once(' ') {
            Some((name, address)) => format!("{} {address}", encode_rfc2047(name)),
            None => encode_rfc2047(value),
        },
    }
}

/// Decodes a single encoded word body given its charset and encoding letter.
fn decode_word(charset: &str, encoding: &str, text: &str) -> Option<String> {
    // RFC 2231 language suffix: charset*lang
    let charset = charset.split('*').next().unwrap_or(charset);

    let bytes = match encoding {
        "b" | "B" => LENIENT.decode(text).ok()?,
        "q" | "Q" => {
            let spaced = text.replace('_', " ");
            let mut out = Vec::with_capacity(spaced.len());
            decode_qp_escapes(spaced.as_bytes(), &mut out);
            out
        }
        _ => return None,
    };

    decode_charset(charset, &bytes)
}

/// Finds the next well-formed encoded word at or after `from`.
///
/// Returns the byte range of the word and its decoded text.
fn find_encoded_word(value: &str, from: usize) -> Option<(usize, usize, String)> {
    let mut search = from;
    while let Some(offset) = value[search..].find("=?") {
        let start = search + offset;
        let inner = &value[start + 2..];

        let parsed = inner.split_once('?').and_then(|(charset, rest)| {
            let (encoding, rest) = rest.split_once('?')?;
            let end = rest.find("?=")?;
            let text = &rest[..end];
            let valid = !charset.is_empty()
                && !charset.contains(char::is_whitespace)
                && encoding.len() == 1
                && !text.contains(char::is_whitespace);
            if !valid {
                return None;
            }
            let decoded = decode_word(charset, encoding, text)?;
            let len = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
            Some((len, decoded))
        });

        if let Some((len, decoded)) = parsed {
            return Some((start, start + len, decoded));
        }
        search = start + 2;
    }
    None
}

/// Decodes all RFC 2047 encoded words in a header value.
///
/// Whitespace between two adjacent encoded words is dropped. Words that are
/// malformed or use an unknown charset are kept verbatim.
#[must_use]
pub fn decode_rfc2047(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut pos = 0;
    let mut after_word = false;

    while let Some((start, end, decoded)) = find_encoded_word(value, pos) {
        let between = &value[pos..start];
        if !(after_word && between.chars().all(char::is_whitespace)) {
            result.push_str(between);
        }
        result.push_str(&decoded);
        pos = end;
        after_word = true;
    }
    result.push_str(&value[pos..]);

    result
}
