//! Ordered include/exclude glob rules with last-match-wins evaluation.
//!
//! Rules are evaluated in the order they were added and the polarity of the
//! last matching rule decides the result, the same override semantics as a
//! `.gitignore` file. A path that matches no rule is not matched.
//!
//! `*` and `?` do not cross a `/`; use `**` to match across directories.
use globset::{GlobBuilder, GlobMatcher};

use crate::error::PatternError;

#[derive(Debug, Clone)]
struct Rule {
    pattern: String,
    matcher: GlobMatcher,
    include: bool,
}

/// An ordered set of glob rules.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    rules: Vec<Rule>,
}

impl PatternSet {
    /// Create an empty pattern set.
    #[must_use]
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule. `include == false` is a `!`-negated rule.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidGlob`] if the glob syntax is malformed.
    pub fn add(&mut self, pattern: &str, include: bool) -> Result<(), PatternError> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|source| PatternError::InvalidGlob {
                pattern: pattern.to_string(),
                source,
            })?
            .compile_matcher();
        self.rules.push(Rule {
            pattern: pattern.to_string(),
            matcher,
            include,
        });
        Ok(())
    }

    /// Return `true` if the last rule matching `path` is an include rule.
    #[must_use]
    pub fn matches(&self, path: &str) -> bool {
        self.rules
            .iter()
            .rev()
            .find(|rule| rule.matcher.is_match(path))
            .is_some_and(|rule| rule.include)
    }

    /// Iterate over the include patterns in addition order.
    pub fn includes(&self) -> impl Iterator<Item = &str> {
        self.rules
            .iter()
            .filter(|rule| rule.include)
            .map(|rule| rule.pattern.as_str())
    }

    /// Return `true` if the set has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Parse the contents of an ignore/remove control file into rules.
    ///
    /// Blank lines and `#` comments are dropped, a leading `!` inverts the
    /// polarity, and each remaining pattern is joined onto `dir` (empty for
    /// the root).
    ///
    /// # Errors
    ///
    /// Returns the first [`PatternError`] encountered.
    pub fn add_lines(&mut self, text: &str, dir: &str) -> Result<(), PatternError> {
        for line in text.lines() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }
            let (include, pattern) = match line.strip_prefix('!') {
                Some(rest) => (false, rest.trim_start()),
                None => (true, line),
            };
            let pattern = if dir.is_empty() {
                pattern.to_string()
            } else {
                format!("{dir}/{pattern}")
            };
            self.add(&pattern, include)?;
        }
        Ok(())
    }
}
