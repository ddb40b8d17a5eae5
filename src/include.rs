//! Entry-type filter used by `apply --include` and `managed --include`.
use std::fmt;
use std::str::FromStr;

use anyhow::bail;

use crate::state::TargetStateEntry;

/// A set of target entry types, stored as a bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IncludeSet(u8);

impl IncludeSet {
    /// Entries that must not exist.
    pub const ABSENT: Self = Self(1);
    /// Directories.
    pub const DIRS: Self = Self(1 << 1);
    /// Regular files.
    pub const FILES: Self = Self(1 << 2);
    /// Scripts.
    pub const SCRIPTS: Self = Self(1 << 3);
    /// Symlinks.
    pub const SYMLINKS: Self = Self(1 << 4);
    /// Every entry type.
    pub const ALL: Self = Self(0b1_1111);
    /// No entry type.
    pub const NONE: Self = Self(0);

    const NAMES: [(&'static str, Self); 5] = [
        ("absent", Self::ABSENT),
        ("dirs", Self::DIRS),
        ("files", Self::FILES),
        ("scripts", Self::SCRIPTS),
        ("symlinks", Self::SYMLINKS),
    ];

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// `self` with every member of `other` removed.
    #[must_use]
    pub const fn difference(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Return `true` if every member of `other` is in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Return `true` if the kind of `entry` is in the set.
    #[must_use]
    pub const fn includes(self, entry: &TargetStateEntry) -> bool {
        let bit = match entry {
            TargetStateEntry::Absent => Self::ABSENT,
            TargetStateEntry::Dir { .. } => Self::DIRS,
            TargetStateEntry::File { .. } => Self::FILES,
            TargetStateEntry::Script { .. } => Self::SCRIPTS,
            TargetStateEntry::Symlink { .. } => Self::SYMLINKS,
        };
        self.contains(bit)
    }
}

impl Default for IncludeSet {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for IncludeSet {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "none" {
            return Ok(Self::NONE);
        }
        let mut set = Self::NONE;
        for element in s.split(',') {
            if element.is_empty() {
                continue;
            }
            let (exclude, element) = match element.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, element),
            };
            let bit = match element {
                "a" | "absent" => Self::ABSENT,
                "all" => Self::ALL,
                "d" | "dirs" => Self::DIRS,
                "f" | "files" => Self::FILES,
                "scripts" => Self::SCRIPTS,
                "s" | "symlinks" => Self::SYMLINKS,
                _ => bail!("{element}: unknown include element"),
            };
            set = if exclude {
                set.difference(bit)
            } else {
                set.union(bit)
            };
        }
        Ok(set)
    }
}

impl fmt::Display for IncludeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::ALL => return write!(f, "all"),
            Self::NONE => return write!(f, "none"),
            _ => {}
        }
        let names: Vec<&str> = Self::NAMES
            .iter()
            .filter(|(_, bit)| self.contains(*bit))
            .map(|(name, _)| *name)
            .collect();
        write!(f, "{}", names.join(","))
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    fn parse(s: &str) -> IncludeSet {
        s.parse().unwrap()
    }

    #[test]
    fn parse_empty_and_none() {
        assert_eq!(parse(""), IncludeSet::NONE);
        assert_eq!(parse("none"), IncludeSet::NONE);
    }

    #[test]
    fn parse_lists() {
        assert_eq!(
            parse("dirs,files"),
            IncludeSet::DIRS.union(IncludeSet::FILES)
        );
        assert_eq!(parse("all"), IncludeSet::ALL);
        assert_eq!(
            parse("a,s"),
            IncludeSet::ABSENT.union(IncludeSet::SYMLINKS)
        );
        assert_eq!(parse("symlinks,,"), IncludeSet::SYMLINKS);
    }

    #[test]
    fn parse_exclusion() {
        assert_eq!(
            parse("all,!scripts"),
            IncludeSet::ALL.difference(IncludeSet::SCRIPTS)
        );
    }

    #[test]
    fn parse_unknown_element_fails() {
        let err = "devices".parse::<IncludeSet>().unwrap_err();
        assert_eq!(err.to_string(), "devices: unknown include element");
    }

    #[test]
    fn display_forms() {
        assert_eq!(IncludeSet::ALL.to_string(), "all");
        assert_eq!(IncludeSet::NONE.to_string(), "none");
        assert_eq!(IncludeSet::ABSENT.to_string(), "absent");
        assert_eq!(IncludeSet::SCRIPTS.to_string(), "scripts");
        assert_eq!(
            IncludeSet::DIRS.union(IncludeSet::FILES).to_string(),
            "dirs,files"
        );
    }

    #[test]
    fn includes_matches_entry_kind() {
        let set = parse("files");
        assert!(set.includes(&TargetStateEntry::File {
            contents: Vec::new(),
            perm: 0o644,
        }));
        assert!(!set.includes(&TargetStateEntry::Absent));
        assert!(!set.includes(&TargetStateEntry::Dir {
            perm: 0o755,
            exact: false,
        }));
    }
}
