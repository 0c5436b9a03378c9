//! Maildir flags.

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Separator between the unique part of a file name and its flags.
pub(crate) const INFO_SEPARATOR: &str = ":2,";

/// A standard maildir flag.
///
/// Variants are declared in the ASCII order of their letters, so the derived
/// ordering sorts flags the way file names require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Flag {
    /// `D`: the message is a draft.
    Draft,
    /// `F`: flagged for urgent or special attention.
    Flagged,
    /// `P`: passed (resent, forwarded or bounced).
    Passed,
    /// `R`: replied to.
    Replied,
    /// `S`: seen.
    Seen,
    /// `T`: trashed.
    Trashed,
}

impl Flag {
    /// Returns the flag letter.
    #[must_use]
    pub const fn as_char(self) -> char {
        match self {
            Self::Draft => 'D',
            Self::Flagged => 'F',
            Self::Passed => 'P',
            Self::Replied => 'R',
            Self::Seen => 'S',
            Self::Trashed => 'T',
        }
    }

    /// Looks up a flag by its letter.
    #[must_use]
    pub const fn from_char(c: char) -> Option<Self> {
        match c {
            'D' => Some(Self::Draft),
            'F' => Some(Self::Flagged),
            'P' => Some(Self::Passed),
            'R' => Some(Self::Replied),
            'S' => Some(Self::Seen),
            'T' => Some(Self::Trashed),
            _ => None,
        }
    }
}

impl TryFrom<char> for Flag {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        Self::from_char(c).ok_or(Error::InvalidFlag(c))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// A set of flags, rendered in ASCII order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(BTreeSet<Flag>);

impl Flags {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Adds a flag.
    pub fn insert(&mut self, flag: Flag) {
        self.0.insert(flag);
    }

    /// Removes a flag.
    pub fn remove(&mut self, flag: Flag) {
        self.0.remove(&flag);
    }

    /// Checks whether a flag is set.
    #[must_use]
    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    /// Returns true if no flag is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the flags in order.
    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Flag> for Flags {
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl FromStr for Flags {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        s.chars().map(Flag::try_from).collect()
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for flag in &self.0 {
            write!(f, "{flag}")?;
        }
        Ok(())
    }
}

/// Returns `name` with `flag` set or cleared in its info section.
///
/// `name` may be a bare file name or a full path. Flag letters this crate
/// does not know are kept, and the result is sorted.
///
/// # Errors
///
/// Returns [`Error::InvalidFilename`] if the name has no `:2,` info section.
pub fn flagged_name(name: &str, flag: Flag, set: bool) -> Result<String> {
    let (base, flags) = name
        .rsplit_once(INFO_SEPARATOR)
        .ok_or_else(|| Error::InvalidFilename(name.to_string()))?;

    let mut letters: Vec<char> = flags.chars().filter(|&c| c != flag.as_char()).collect();
    if set {
        letters.push(flag.as_char());
    }
    letters.sort_unstable();
    letters.dedup();

    let letters: String = letters.into_iter().collect();
    Ok(format!("{base}{INFO_SEPARATOR}{letters}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn flags_render_sorted() {
        let flags: Flags = [Flag::Seen, Flag::Draft, Flag::Replied].into_iter().collect();
        assert_eq!(flags.to_string(), "DRS");
        assert_eq!("TSPFRD".parse::<Flags>().unwrap().to_string(), "DFPRST");
    }

    #[test]
    fn flags_reject_unknown_letters() {
        assert!(matches!("Sx".parse::<Flags>(), Err(Error::InvalidFlag('x'))));
    }

    #[test]
    fn flag_letters_round_trip() {
        for c in "DFPRST".chars() {
            assert_eq!(Flag::try_from(c).unwrap().as_char(), c);
        }
    }

    #[test]
    fn flagged_name_clears_and_sets() {
        let seen_replied =
            "/dir/1439037327_0.709.test,U=2252,FMD5=7e33426f1e6e9d79b29c3f82c57e:2,RS";
        assert_eq!(
            flagged_name(seen_replied, Flag::Replied, false).unwrap(),
            "/dir/1439037327_0.709.test,U=2252,FMD5=7e33426f1e6e9d79b29c3f82c57e:2,S"
        );
        assert_eq!(
            flagged_name(seen_replied, Flag::Replied, true).unwrap(),
            seen_replied
        );

        let no_flags = "/dur/1439038239_0.709.test,U=2253,FMD5=7e33426f1e6e9d79b29c3f82c57e:2,";
        assert_eq!(flagged_name(no_flags, Flag::Replied, false).unwrap(), no_flags);
        assert_eq!(
            flagged_name(no_flags, Flag::Replied, true).unwrap(),
            "/dur/1439038239_0.709.test,U=2253,FMD5=7e33426f1e6e9d79b29c3f82c57e:2,R"
        );
    }

    #[test]
    fn flagged_name_keeps_foreign_letters() {
        assert_eq!(flagged_name("k:2,Sa", Flag::Draft, true).unwrap(), "k:2,DSa");
    }

    #[test]
    fn flagged_name_requires_info() {
        let bare = "/dur/1439038239_0.709.test,U=2253,FMD5=7e33426f1e6e9d79b29c3f82c57e";
        assert!(matches!(
            flagged_name(bare, Flag::Replied, true),
            Err(Error::InvalidFilename(_))
        ));
    }
}
