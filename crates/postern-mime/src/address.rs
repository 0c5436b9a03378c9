//! RFC 5322 mailbox and address list handling.

use crate::encoding::{encode_rfc2047, needs_encoding};
use crate::error::{Error, Result};
use std::fmt;

/// A single mailbox: an optional display name and an address.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mailbox {
    /// Display name, without quotes.
    pub name: Option<String>,
    /// The `local@domain` address.
    pub email: String,
}

impl Mailbox {
    /// Creates a mailbox without a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not of the form `local@domain`.
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        validate_email(&email)?;
        Ok(Self { name: None, email })
    }

    /// Creates a mailbox with a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not of the form `local@domain`.
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let mut mailbox = Self::new(email)?;
        mailbox.name = Some(name.into()).filter(|n: &String| !n.is_empty());
        Ok(mailbox)
    }

    /// Parses a single mailbox such as `"Doe, Jane" <jane@example.com>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a single valid mailbox.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidAddress("empty address".to_string()));
        }

        if let Some(open) = find_unquoted(s, '<') {
            let close = s[open..]
                .find('>')
                .map(|i| open + i)
                .ok_or_else(|| Error::InvalidAddress(format!("unterminated '<' in {s:?}")))?;
            let trailing = strip_comments(&s[close + 1..]);
            if !trailing.trim().is_empty() {
                return Err(Error::InvalidAddress(format!("trailing text in {s:?}")));
            }

            let email = s[open + 1..close].trim().to_string();
            validate_email(&email)?;
            let name = parse_display_name(&s[..open]);
            return Ok(Self { name, email });
        }

        // Bare address, possibly followed by a comment holding the name
        let (address, comment) = match (find_unquoted(s, '('), s.rfind(')')) {
            (Some(open), Some(close)) if close > open => {
                (s[..open].trim(), Some(s[open + 1..close].trim()))
            }
            _ => (s, None),
        };
        validate_email(address)?;
        Ok(Self {
            name: comment.filter(|c| !c.is_empty()).map(str::to_string),
            email: address.to_string(),
        })
    }

    /// Returns the display name if present.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Formats the mailbox for a header, RFC 2047 encoding the display name
    /// if it is not plain ASCII.
    #[must_use]
    pub fn to_encoded_string(&self) -> String {
        match &self.name {
            Some(name) if needs_encoding(name) => {
                format!("{} <{}>", encode_rfc2047(name), self.email)
            }
            _ => self.to_string(),
        }
    }
}

impl fmt::Display for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) if !name.is_empty() => {
                if needs_quoting(name) {
                    let escaped = name.replace('\\', "\\\\").replace('"', "\\\"");
                    write!(f, "\"{escaped}\" <{}>", self.email)
                } else {
                    write!(f, "{name} <{}>", self.email)
                }
            }
            _ => f.write_str(&self.email),
        }
    }
}

impl std::str::FromStr for Mailbox {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Parses a comma-separated address list.
///
/// Commas inside quoted names, angle brackets and comments do not split.
/// Empty entries (such as a trailing comma) are ignored, so an empty input
/// yields an empty list.
///
/// # Errors
///
/// Returns an error if any entry is not a valid mailbox.
pub fn parse_address_list(s: &str) -> Result<Vec<Mailbox>> {
    split_list(s)
        .into_iter()
        .filter(|item| !item.trim().is_empty())
        .map(Mailbox::parse)
        .collect()
}

/// Joins mailboxes into a header value.
#[must_use]
pub fn format_address_list(mailboxes: &[Mailbox]) -> String {
    mailboxes
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn split_list(s: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle = 0u32;
    let mut comment = 0u32;

    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes || comment > 0 => escaped = true,
            '"' if comment == 0 => in_quotes = !in_quotes,
            '(' if !in_quotes => comment += 1,
            ')' if !in_quotes => comment = comment.saturating_sub(1),
            '<' if !in_quotes && comment == 0 => angle += 1,
            '>' if !in_quotes && comment == 0 => angle = angle.saturating_sub(1),
            ',' if !in_quotes && comment == 0 && angle == 0 => {
                items.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&s[start..]);
    items
}

fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' && in_quotes {
            escaped = true;
        } else if c == '"' {
            in_quotes = !in_quotes;
        } else if c == needle && !in_quotes {
            return Some(i);
        }
    }
    None
}

fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0u32;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

fn parse_display_name(raw: &str) -> Option<String> {
    let raw = strip_comments(raw);
    let raw = raw.trim();

    let name = if let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) {
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(c);
            }
        }
        out
    } else {
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    };

    Some(name).filter(|n| !n.is_empty())
}

fn validate_email(email: &str) -> Result<()> {
    let valid = email
        .rsplit_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        && !email.contains(char::is_whitespace)
        && !email.contains(['<', '>', ',']);
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidAddress(format!("not an address: {email:?}")))
    }
}

fn needs_quoting(name: &str) -> bool {
    name.starts_with(char::is_whitespace)
        || name.ends_with(char::is_whitespace)
        || name.contains(|c: char| "()<>[]:;@\\,.\"".contains(c))
}
