//! Gitignore style pattern matching for directory sync.
//!
//! Patterns are compiled to regexes once per sync run; evaluation is a
//! scan over two lists. A path is ignored iff at least one positive
//! pattern matches and no negative pattern matches.

use crate::{error::EesError, map_err};
use regex::Regex;

/// Patterns applied when a sync root has no ignore file.
pub const DEFAULT_PATTERNS: &[&str] = &[
    "node_modules",
    ".git",
    ".DS_Store",
    "*.log",
    ".env",
    ".env.*",
    "dist",
    "build",
    "coverage",
    ".next",
    ".nuxt",
    ".cache",
];

/// A compiled ignore pattern set.
#[derive(Debug)]
pub struct IgnoreMatcher {
    positive: Vec<Regex>,
    negative: Vec<Regex>,
}

impl IgnoreMatcher {
    /// Compile a pattern list. Lines starting with `#` are comments,
    /// blank lines are skipped, a trailing CR is tolerated and a
    /// leading `!` negates the pattern.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, EesError> {
        let mut positive = Vec::new();
        let mut negative = Vec::new();

        for line in patterns {
            let line = line.as_ref().trim_end_matches('\r').trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (negated, pattern) = match line.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, line),
            };

            if pattern.is_empty() {
                continue;
            }

            let regex = map_err!(compile(pattern));

            if negated {
                negative.push(regex);
            } else {
                positive.push(regex);
            }
        }

        Ok(Self { positive, negative })
    }

    /// The default set used when no ignore file is present.
    pub fn default_set() -> Self {
        // The defaults are known-good; compilation cannot fail.
        Self::new(DEFAULT_PATTERNS).expect("default ignore patterns must compile")
    }

    /// Whether `path` (relative to the sync root, `/` separated) is
    /// excluded from sync. Negative patterns override positives
    /// globally.
    pub fn is_ignored(&self, path: &str) -> bool {
        if !self.positive.iter().any(|p| p.is_match(path)) {
            return false;
        }
        !self.negative.iter().any(|n| n.is_match(path))
    }

    /// True when the set contains negations. Walkers must not prune
    /// ignored directories in that case, since a negation may
    /// un-ignore a descendant.
    pub fn has_negations(&self) -> bool {
        !self.negative.is_empty()
    }
}

/// Compile a single pattern into a path regex.
///
/// A pattern ending in `/` matches any path segment equal to the
/// pattern sans slash. A pattern containing `/` is a path glob where
/// `*` matches within a segment, `**` crosses segments and `?` matches
/// one character; a matched directory covers everything under it. A
/// pattern without `/` matches when any segment satisfies the glob.
fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    let (pattern, segment_only) = match pattern.strip_suffix('/') {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };

    let glob = glob_to_regex(pattern);

    let anchored = if !segment_only && pattern.contains('/') {
        // Path glob, anchored to the whole relative path. A directory
        // match covers its contents.
        format!("^{glob}(/.*)?$")
    } else {
        // Segment glob, matched against every path segment.
        format!("(^|/){glob}(/|$)")
    };

    Regex::new(&anchored)
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::with_capacity(glob.len() * 2);
    let mut chars = glob.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            c if "\\.+()[]{}^$|".contains(c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> IgnoreMatcher {
        IgnoreMatcher::new(patterns).unwrap()
    }

    #[test]
    fn bare_pattern_matches_any_segment() {
        let m = matcher(&["node_modules"]);
        assert!(m.is_ignored("node_modules"));
        assert!(m.is_ignored("node_modules/react/index.js"));
        assert!(m.is_ignored("packages/a/node_modules/b.js"));
        assert!(!m.is_ignored("src/node_modules.md/nope"));
        assert!(!m.is_ignored("src/main.rs"));
    }

    #[test]
    fn extension_glob_matches_in_any_directory() {
        let m = matcher(&["*.log"]);
        assert!(m.is_ignored("app.log"));
        assert!(m.is_ignored("logs/app.log"));
        assert!(!m.is_ignored("app.log.txt"));
    }

    #[test]
    fn question_mark_matches_one_character() {
        let m = matcher(&["file?.txt"]);
        assert!(m.is_ignored("file1.txt"));
        assert!(!m.is_ignored("file12.txt"));
        assert!(!m.is_ignored("file.txt"));
    }

    #[test]
    fn trailing_slash_matches_directory_segment() {
        let m = matcher(&["build/"]);
        assert!(m.is_ignored("build"));
        assert!(m.is_ignored("build/out.js"));
        assert!(m.is_ignored("packages/a/build/out.js"));
    }

    #[test]
    fn path_glob_is_anchored_to_the_root() {
        let m = matcher(&["docs/*.md"]);
        assert!(m.is_ignored("docs/readme.md"));
        assert!(!m.is_ignored("docs/sub/readme.md"));
        assert!(!m.is_ignored("other/docs/readme.md"));
    }

    #[test]
    fn double_star_crosses_segments() {
        let m = matcher(&["docs/**/*.md"]);
        assert!(m.is_ignored("docs/a/readme.md"));
        assert!(m.is_ignored("docs/a/b/readme.md"));
        assert!(!m.is_ignored("src/readme.md"));
    }

    #[test]
    fn matched_directory_covers_contents() {
        let m = matcher(&["target/debug"]);
        assert!(m.is_ignored("target/debug/ees"));
    }

    #[test]
    fn negation_overrides_positive() {
        let m = matcher(&["*.log", "!important.log"]);
        assert!(m.is_ignored("app.log"));
        assert!(!m.is_ignored("important.log"));
        assert!(!m.is_ignored("logs/important.log"));
    }

    #[test]
    fn negation_is_global_and_order_independent() {
        let a = matcher(&["!keep.log", "*.log"]);
        let b = matcher(&["*.log", "!keep.log"]);
        for m in [a, b] {
            assert!(!m.is_ignored("keep.log"));
            assert!(m.is_ignored("drop.log"));
        }
    }

    #[test]
    fn positive_order_is_irrelevant() {
        let a = matcher(&["*.log", "dist"]);
        let b = matcher(&["dist", "*.log"]);
        for path in ["x.log", "dist/x.js", "src/ok.rs"] {
            assert_eq!(a.is_ignored(path), b.is_ignored(path));
        }
    }

    #[test]
    fn comments_blanks_and_crlf_are_tolerated() {
        let m = matcher(&["# a comment", "", "dist\r", "   "]);
        assert!(m.is_ignored("dist/app.js"));
        assert!(!m.is_ignored("# a comment"));
    }

    #[test]
    fn default_set_covers_the_usual_suspects() {
        let m = IgnoreMatcher::default_set();
        assert!(m.is_ignored("node_modules/x.js"));
        assert!(m.is_ignored(".git/HEAD"));
        assert!(m.is_ignored("server.log"));
        assert!(m.is_ignored(".env.local"));
        assert!(m.is_ignored("docs/.DS_Store"));
        assert!(!m.is_ignored("src/main.rs"));
        assert!(!m.is_ignored("README.md"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let m = matcher(&["a+b.txt"]);
        assert!(m.is_ignored("a+b.txt"));
        assert!(!m.is_ignored("aab.txt"));
    }
}
