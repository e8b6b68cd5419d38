//! Entry search
//!
//! Matches a pattern against the IP, hostnames and comment of each entry.
//! Patterns are plain substrings unless [`SearchOptions::regex`] is set.
//!
//! Each entry yields at most one [`SearchResult`]. Fields are tried in the
//! order IP, hostnames, comment and the first hit wins, so an entry whose IP
//! matches is reported as an IP match even if a hostname matches too.

use std::fmt;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Entry, HostsFile};

/// Which field of an entry produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Ip,
    Hostname,
    Comment,
}

impl fmt::Display for MatchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ip => "ip",
            Self::Hostname => "hostname",
            Self::Comment => "comment",
        })
    }
}

/// What to search for and where
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    /// Substring, or regular expression when `regex` is set
    pub pattern: String,
    /// Treat `pattern` as a regular expression
    pub regex: bool,
    /// Compare case-insensitively
    pub ignore_case: bool,
    /// Search IP addresses
    pub in_ip: bool,
    /// Search hostnames
    pub in_names: bool,
    /// Search comments
    pub in_comments: bool,
    /// Also search commented-out entries
    pub include_disabled: bool,
}

impl SearchOptions {
    /// Case-sensitive substring search over enabled entries
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Whether no field was selected, which means every field is searched
    fn all_fields(&self) -> bool {
        !self.in_ip && !self.in_names && !self.in_comments
    }
}

/// One matching entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub entry: Entry,
    pub match_type: MatchType,
    /// The field value that matched
    pub match_text: String,
}

enum Matcher {
    Substring { needle: String, ignore_case: bool },
    Regex(Regex),
}

impl Matcher {
    fn compile(options: &SearchOptions) -> Result<Self> {
        if options.regex {
            let regex = RegexBuilder::new(&options.pattern)
                .case_insensitive(options.ignore_case)
                .build()?;
            return Ok(Self::Regex(regex));
        }

        let needle = if options.ignore_case {
            options.pattern.to_lowercase()
        } else {
            options.pattern.clone()
        };
        Ok(Self::Substring {
            needle,
            ignore_case: options.ignore_case,
        })
    }

    fn is_match(&self, text: &str) -> bool {
        match self {
            Self::Regex(regex) => regex.is_match(text),
            Self::Substring {
                needle,
                ignore_case: true,
            } => text.to_lowercase().contains(needle.as_str()),
            Self::Substring { needle, .. } => text.contains(needle.as_str()),
        }
    }
}

/// Search `entries` in order
///
/// Fails only if `options.regex` is set and the pattern does not compile.
pub fn search_entries(entries: &[Entry], options: &SearchOptions) -> Result<Vec<SearchResult>> {
    let matcher = Matcher::compile(options)?;
    let all = options.all_fields();

    let results = entries
        .iter()
        .filter(|entry| options.include_disabled || !entry.disabled)
        .filter_map(|entry| {
            let (match_type, text) = if (all || options.in_ip) && matcher.is_match(&entry.ip) {
                (MatchType::Ip, entry.ip.as_str())
            } else if let Some(name) = (all || options.in_names)
                .then(|| entry.names.iter().find(|n| matcher.is_match(n)))
                .flatten()
            {
                (MatchType::Hostname, name.as_str())
            } else if (all || options.in_comments)
                && !entry.comment.is_empty()
                && matcher.is_match(&entry.comment)
            {
                (MatchType::Comment, entry.comment.as_str())
            } else {
                return None;
            };

            Some(SearchResult {
                entry: entry.clone(),
                match_type,
                match_text: text.to_string(),
            })
        })
        .collect();

    Ok(results)
}

impl HostsFile {
    /// Entries matching `options`, one result per entry
    pub fn search(&self, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        search_entries(&self.entries, options)
    }
}
