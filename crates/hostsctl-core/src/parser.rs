//! Hosts document parser and serializer
//!
//! ## Line grammar
//!
//! ```text
//! line     := blank | comment | entry
//! entry    := [ "#" ] IP WS NAME { WS NAME } [ "#" COMMENT ]
//! ```
//!
//! - Blank lines and pure comment lines produce nothing and consume no id.
//! - A line starting with `#` is a *disabled entry* only if the remainder
//!   still looks like an entry: its first token is a valid IP and at least
//!   one hostname follows. Anything else after a `#` is a plain comment.
//! - Any other non-blank line must be a well-formed entry with a valid IP
//!   and valid hostnames. In [`ParseMode::Strict`] the first bad line aborts
//!   the parse with a [`ParseError`]; in [`ParseMode::Lenient`] it is
//!   skipped silently.
//!
//! ## Serialization
//!
//! One canonical line per entry (see [`Entry`]'s `Display`), joined by `\n`,
//! with a single trailing `\n`. Original formatting is not preserved.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::error::{IoOperation, ParseError, Result};
use crate::model::{Entry, EntryId, HostsFile};
use crate::validation;
use crate::Error;

/// How malformed lines are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseMode {
    /// Abort on the first malformed line
    Strict,
    /// Skip malformed lines
    #[default]
    Lenient,
}

/// Bidirectional converter between hosts text and [`HostsFile`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Parser {
    mode: ParseMode,
}

/// Result of classifying one line
enum Line {
    Ignored,
    Entry(ParsedLine),
}

struct ParsedLine {
    ip: String,
    names: Vec<String>,
    comment: String,
    disabled: bool,
}

impl Parser {
    /// Create a parser with the given mode
    pub fn new(mode: ParseMode) -> Self {
        Self { mode }
    }

    /// Strict parser
    pub fn strict() -> Self {
        Self::new(ParseMode::Strict)
    }

    /// Lenient parser
    pub fn lenient() -> Self {
        Self::new(ParseMode::Lenient)
    }

    /// The parser's mode
    pub fn mode(&self) -> ParseMode {
        self.mode
    }

    /// Parse an in-memory document
    ///
    /// The returned file has an empty path; callers attach one.
    pub fn parse_str(&self, text: &str) -> std::result::Result<HostsFile, ParseError> {
        let mut builder = Builder::new(self.mode);
        for (index, line) in text.lines().enumerate() {
            builder.push(index + 1, line)?;
        }
        Ok(builder.finish())
    }

    /// Parse a document from an async line stream
    ///
    /// Fails with [`Error::Parse`] on a strict-mode content error, or with
    /// [`Error::Io`] if the stream itself fails.
    pub async fn parse_reader<R>(&self, reader: R) -> Result<HostsFile>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut builder = Builder::new(self.mode);
        let mut lines = reader.lines();
        let mut line_no = 0;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| Error::io(IoOperation::Read, "<stream>", e))?
        {
            line_no += 1;
            builder.push(line_no, &line)?;
        }
        Ok(builder.finish())
    }

    /// Render a document in canonical form
    ///
    /// Never fails. An empty document renders as a single `\n`.
    pub fn serialize(&self, hosts_file: &HostsFile) -> String {
        serialize(hosts_file)
    }
}

/// Render a document in canonical form
pub fn serialize(hosts_file: &HostsFile) -> String {
    let lines: Vec<String> = hosts_file.entries.iter().map(Entry::to_string).collect();
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Accumulates entries and assigns sequential ids
struct Builder {
    mode: ParseMode,
    entries: Vec<Entry>,
    next_id: EntryId,
}

impl Builder {
    fn new(mode: ParseMode) -> Self {
        Self {
            mode,
            entries: Vec::new(),
            next_id: 1,
        }
    }

    fn push(&mut self, line_no: usize, line: &str) -> std::result::Result<(), ParseError> {
        match classify(line_no, line) {
            Ok(Line::Ignored) => Ok(()),
            Ok(Line::Entry(parsed)) => {
                self.entries.push(Entry {
                    id: self.next_id,
                    ip: parsed.ip,
                    names: parsed.names,
                    comment: parsed.comment,
                    disabled: parsed.disabled,
                    raw: Some(line.to_string()),
                });
                self.next_id += 1;
                Ok(())
            }
            Err(err) if self.mode == ParseMode::Strict => Err(err),
            Err(err) => {
                debug!(line = err.line, reason = %err.reason, "skipping malformed line");
                Ok(())
            }
        }
    }

    fn finish(self) -> HostsFile {
        HostsFile::with_entries("", self.entries)
    }
}

fn classify(line_no: usize, line: &str) -> std::result::Result<Line, ParseError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(Line::Ignored);
    }

    let (disabled, body) = match trimmed.strip_prefix('#') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    let (fields, comment) = match body.split_once('#') {
        Some((fields, comment)) => (fields, comment.trim()),
        None => (body, ""),
    };

    let mut tokens = fields.split_whitespace();
    let ip = tokens.next();
    let names: Vec<String> = tokens.map(str::to_string).collect();

    if disabled {
        match ip {
            Some(ip) if !names.is_empty() && validation::is_valid_ip(ip) => {}
            _ => return Ok(Line::Ignored),
        }
    }

    let Some(ip) = ip else {
        return Err(ParseError::new(line_no, line, "invalid line format"));
    };
    if names.is_empty() {
        return Err(ParseError::new(line_no, line, "invalid line format: missing hostname"));
    }
    if !validation::is_valid_ip(ip) {
        return Err(ParseError::new(line_no, line, format!("invalid IP address: {ip}")));
    }
    if let Some(bad) = names.iter().find(|n| !validation::is_valid_hostname(n)) {
        return Err(ParseError::new(line_no, line, format!("invalid hostname: {bad}")));
    }

    Ok(Line::Entry(ParsedLine {
        ip: ip.to_string(),
        names,
        comment: comment.to_string(),
        disabled,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# This is a comment
127.0.0.1\tlocalhost

# 192.168.1.1\tdisabled.local\t# Disabled entry
192.168.1.2\tenabled.local\t# Enabled entry
";

    #[test]
    fn test_parse_mixed_document() {
        let file = Parser::strict().parse_str(SAMPLE).unwrap();
        assert_eq!(file.len(), 3);

        let ids: Vec<_> = file.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let disabled = &file.entries[1];
        assert_eq!(disabled.names, vec!["disabled.local"]);
        assert!(disabled.disabled);
        assert_eq!(disabled.comment, "Disabled entry");

        let enabled = &file.entries[2];
        assert!(!enabled.disabled);
        assert_eq!(enabled.comment, "Enabled entry");
    }

    #[test]
    fn test_disabled_entry_round_trip() {
        let line = "# 192.168.1.2\tdisabled.local\t# Disabled entry";
        let file = Parser::strict().parse_str(line).unwrap();
        assert_eq!(file.len(), 1);

        let entry = &file.entries[0];
        assert_eq!(entry.ip, "192.168.1.2");
        assert_eq!(entry.names, vec!["disabled.local"]);
        assert_eq!(entry.comment, "Disabled entry");
        assert!(entry.disabled);
        assert_eq!(entry.to_string(), line);
    }

    #[test]
    fn test_multiple_names_and_whitespace() {
        let file = Parser::strict()
            .parse_str("  10.0.0.1   api.local web.local\tapp.local  ")
            .unwrap();
        assert_eq!(file.entries[0].names, vec!["api.local", "web.local", "app.local"]);
        assert_eq!(file.entries[0].comment, "");
    }

    #[test]
    fn test_comment_without_space_after_hash() {
        let file = Parser::strict().parse_str("127.0.0.1 a.local #note  ").unwrap();
        assert_eq!(file.entries[0].comment, "note");

        let file = Parser::strict().parse_str("#127.0.0.1 a.local").unwrap();
        assert!(file.entries[0].disabled);
    }

    #[test]
    fn test_ipv6_entry() {
        let file = Parser::strict().parse_str("::1\tip6-localhost ip6-loopback").unwrap();
        assert_eq!(file.entries[0].ip, "::1");
        assert_eq!(file.entries[0].names.len(), 2);
    }

    #[test]
    fn test_pure_comments_are_ignored() {
        let text = "# The following lines are desirable for IPv6 capable hosts\n\
                    #\n\
                    # 127.0.0.1\n\
                    ## heading\n\
                    # 999.1.1.1 not.an.entry\n";
        let file = Parser::strict().parse_str(text).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn test_strict_rejects_first_bad_line() {
        let text = "127.0.0.1 localhost\n999.999.999.999\tinvalid.local\n127.0.0.1\t.invalid\n";
        let err = Parser::strict().parse_str(text).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.content, "999.999.999.999\tinvalid.local");
        assert!(err.reason.contains("invalid IP address"));
    }

    #[test]
    fn test_strict_rejects_structural_errors() {
        for text in ["127.0.0.1\t", "127.0.0.1", "127.0.0.1 #only comment"] {
            let err = Parser::strict().parse_str(text).unwrap_err();
            assert_eq!(err.line, 1, "{text:?}");
            assert!(err.reason.starts_with("invalid line format"), "{text:?}");
        }
    }

    #[test]
    fn test_strict_rejects_disabled_entry_with_bad_hostname() {
        let err = Parser::strict().parse_str("# 127.0.0.1 bad_host").unwrap_err();
        assert_eq!(err.reason, "invalid hostname: bad_host");
    }

    #[test]
    fn test_lenient_skips_without_consuming_ids() {
        let text = "127.0.0.1 localhost\n999.1.1.1 bad.local\n127.0.0.1\t.invalid\n10.0.0.1 ok.local\n";
        let file = Parser::lenient().parse_str(text).unwrap();
        assert_eq!(file.len(), 2);
        assert_eq!(file.entries[1].id, 2);
        assert_eq!(file.entries[1].names, vec!["ok.local"]);
    }

    #[test]
    fn test_raw_line_is_kept() {
        let file = Parser::lenient().parse_str("127.0.0.1   localhost").unwrap();
        assert_eq!(file.entries[0].raw.as_deref(), Some("127.0.0.1   localhost"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let file = Parser::strict().parse_str("127.0.0.1 a\r\n10.0.0.1 b\r\n").unwrap();
        assert_eq!(file.entries[1].names, vec!["b"]);
    }

    #[test]
    fn test_serialize_canonical_form() {
        let mut file = HostsFile::new("/tmp/hosts");
        file.add_entry(Entry::new("127.0.0.1", ["localhost"]));
        file.add_entry(Entry::new("192.168.1.1", ["server.local", "web.local"]).with_comment("Main server"));
        file.add_entry(Entry::new("192.168.1.2", ["old.local"]).disabled());

        assert_eq!(
            serialize(&file),
            "127.0.0.1\tlocalhost\n\
             192.168.1.1\tserver.local\tweb.local\t# Main server\n\
             # 192.168.1.2\told.local\n"
        );
    }

    #[test]
    fn test_serialize_empty() {
        assert_eq!(serialize(&HostsFile::default()), "\n");
    }

    #[test]
    fn test_canonical_text_round_trips_exactly() {
        let text = "127.0.0.1\tlocalhost\n\
                    # 10.0.0.5\tstaging.local\tapi.staging.local\t# old box\n\
                    fe80::1\trouter.lan\n";
        let parser = Parser::strict();
        let file = parser.parse_str(text).unwrap();
        assert_eq!(parser.serialize(&file), text);
    }

    #[tokio::test]
    async fn test_parse_reader_matches_parse_str() {
        let reader = tokio::io::BufReader::new(SAMPLE.as_bytes());
        let from_reader = Parser::strict().parse_reader(reader).await.unwrap();
        let from_str = Parser::strict().parse_str(SAMPLE).unwrap();
        assert_eq!(from_reader, from_str);
    }

    #[tokio::test]
    async fn test_parse_reader_strict_error() {
        let reader = tokio::io::BufReader::new("bogus line here\n".as_bytes());
        let err = Parser::strict().parse_reader(reader).await.unwrap_err();
        assert!(matches!(err, Error::Parse(ParseError { line: 1, .. })));
    }
}
