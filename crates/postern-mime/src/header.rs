//! MIME header handling.

use crate::error::{Error, Result};
use std::fmt;

/// A single header field with all of its values.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    name: String,
    values: Vec<String>,
}

/// Collection of email headers.
///
/// Field names are matched case-insensitively but keep the spelling they were
/// first added with. Fields keep their insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<Field>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.position(&name) {
            Some(i) => self.fields[i].values.push(value),
            None => self.fields.push(Field {
                name,
                values: vec![value],
            }),
        }
    }

    /// Sets a header value, replacing any existing values.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.set_all(name, vec![value.into()]);
    }

    /// Replaces all values of a header, keeping its position if it exists.
    pub fn set_all(&mut self, name: impl Into<String>, values: Vec<String>) {
        let name = name.into();
        match self.position(&name) {
            Some(i) => self.fields[i].values = values,
            None => self.fields.push(Field { name, values }),
        }
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.position(name)
            .and_then(|i| self.fields[i].values.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.position(name)
            .map(|i| self.fields[i].values.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Checks whether a header is present.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        self.fields.retain(|f| !f.name.eq_ignore_ascii_case(name));
    }

    /// Returns the number of distinct fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if there are no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns an iterator over all `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().flat_map(|field| {
            field
                .values
                .iter()
                .map(move |v| (field.name.as_str(), v.as_str()))
        })
    }

    /// Returns an iterator over fields with all of their values.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.values.as_slice()))
    }

    /// Rewrites every value in place.
    pub fn map_values(&mut self, mut f: impl FnMut(&str) -> String) {
        for field in &mut self.fields {
            for value in &mut field.values {
                *value = f(value);
            }
        }
    }

    /// Parses headers from raw text.
    ///
    /// Headers are in the format:
    /// ```text
    /// Header-Name: value
    ///   continuation
    /// ```
    ///
    /// Parsing stops at the first empty line.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Header`] for a line that is neither a field nor a
    /// continuation, or for a field with an empty name.
    pub fn parse(text: &str) -> Result<Self> {
        let mut headers = Self::new();
        let mut current: Option<(String, String)> = None;

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                break;
            }

            // Continuation lines start with space or tab
            if line.starts_with([' ', '\t']) {
                let Some((_, value)) = current.as_mut() else {
                    return Err(Error::Header(format!(
                        "continuation line without a field: {line:?}"
                    )));
                };
                if !value.is_empty() {
                    value.push(' ');
                }
                value.push_str(line.trim());
                continue;
            }

            if let Some((name, value)) = current.take() {
                headers.add(name, value);
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::Header(format!("missing colon in {line:?}")))?;
            let name = name.trim();
            if name.is_empty() || name.contains(char::is_whitespace) {
                return Err(Error::Header(format!("invalid field name in {line:?}")));
            }
            current = Some((name.to_string(), value.trim().to_string()));
        }

        if let Some((name, value)) = current {
            headers.add(name, value);
        }

        Ok(headers)
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in self.iter() {
            write!(f, "{name}: {value}\r\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_new() {
        let headers = Headers::new();
        assert!(headers.is_empty());
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "text/plain");
        assert_eq!(headers.get("Content-Type"), Some("text/plain"));
        assert_eq!(headers.get("content-type"), Some("text/plain")); // Case insensitive
    }

    #[test]
    fn test_headers_preserve_case_and_order() {
        let mut headers = Headers::new();
        headers.add("Subject", "one");
        headers.add("Message-ID", "<a@b>");
        headers.add("MESSAGE-id", "<c@d>");

        let names: Vec<_> = headers.fields().map(|(n, _)| n).collect();
        assert_eq!(names, ["Subject", "Message-ID"]);
        assert_eq!(headers.get_all("message-id"), ["<a@b>", "<c@d>"]);
    }

    #[test]
    fn test_headers_set() {
        let mut headers = Headers::new();
        headers.add("To", "alice@example.com");
        headers.add("To", "bob@example.com");
        assert_eq!(headers.get_all("To").len(), 2);

        headers.set("to", "charlie@example.com");
        assert_eq!(headers.get_all("To"), ["charlie@example.com"]);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn test_headers_remove() {
        let mut headers = Headers::new();
        headers.add("Subject", "Test");
        assert!(headers.contains("subject"));

        headers.remove("SUBJECT");
        assert!(headers.get("Subject").is_none());
    }

    #[test]
    fn test_headers_parse() {
        let text = concat!(
            "From: sender@example.com\r\n",
            "To: recipient@example.com\r\n",
            "Subject: Test Message\r\n",
            "Content-Type: text/plain;\r\n",
            "\tcharset=utf-8\r\n",
            "\r\n",
            "Body: not a header\r\n",
        );

        let headers = Headers::parse(text).unwrap();
        assert_eq!(headers.get("From"), Some("sender@example.com"));
        assert_eq!(headers.get("Subject"), Some("Test Message"));
        assert_eq!(
            headers.get("Content-Type"),
            Some("text/plain; charset=utf-8")
        );
        assert!(!headers.contains("Body"));
    }

    #[test]
    fn test_headers_parse_empty_value() {
        let headers = Headers::parse("X-Empty:\nSubject: hi\n").unwrap();
        assert_eq!(headers.get("X-Empty"), Some(""));
        assert_eq!(headers.get("Subject"), Some("hi"));
    }

    #[test]
    fn test_headers_parse_errors() {
        assert!(matches!(
            Headers::parse("this is not a header\n"),
            Err(Error::Header(_))
        ));
        assert!(matches!(
            Headers::parse(" leading continuation\n"),
            Err(Error::Header(_))
        ));
        assert!(matches!(Headers::parse(": no name\n"), Err(Error::Header(_))));
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "recipient@example.com");

        assert_eq!(
            headers.to_string(),
            "From: sender@example.com\r\nTo: recipient@example.com\r\n"
        );
    }

    #[test]
    fn test_headers_iter() {
        let mut headers = Headers::new();
        headers.add("From", "sender@example.com");
        headers.add("To", "a@example.com");
        headers.add("To", "b@example.com");

        assert_eq!(headers.iter().count(), 3);
    }
}
