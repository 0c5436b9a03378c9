//! Unique maildir keys.

use crate::host::hostname;
use rand::RngCore;

/// Generates a new unique key.
///
/// The format is `<secs>.M<micros>P<pid>R<random>.<host>`, where the random
/// part is 10 bytes in hex and `/` and `:` in the host name are escaped.
#[must_use]
pub fn key() -> String {
    let now = chrono::Utc::now();
    let mut random = [0u8; 10];
    rand::thread_rng().fill_bytes(&mut random);

    format!(
        "{}.M{}P{}R{}.{}",
        now.timestamp(),
        now.timestamp_subsec_micros(),
        std::process::id(),
        hex::encode(random),
        escape_host(&hostname()),
    )
}

fn escape_host(host: &str) -> String {
    host.replace('/', "\\057").replace(':', "\\072")
}

/// Returns the key part of a maildir file name.
pub(crate) fn key_of(name: &str) -> &str {
    name.find([',', ':']).map_or(name, |end| &name[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let keys: HashSet<String> = (0..10_000).map(|_| key()).collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[test]
    fn key_format() {
        let key = key();
        let (secs, rest) = key.split_once(".M").unwrap_or_default();
        assert!(secs.parse::<i64>().is_ok());
        assert!(rest.contains(&format!("P{}R", std::process::id())));
        assert!(!key.contains(['/', ':', ',']));
    }

    #[test]
    fn host_escaping() {
        assert_eq!(escape_host("a/b:c"), "a\\057b\\072c");
    }

    #[test]
    fn key_of_strips_info() {
        assert_eq!(key_of("123.M4P5R6.host,S=10:2,S"), "123.M4P5R6.host");
        assert_eq!(key_of("123.M4P5R6.host:2,"), "123.M4P5R6.host");
        assert_eq!(key_of("plain"), "plain");
    }
}
