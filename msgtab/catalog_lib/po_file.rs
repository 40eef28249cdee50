//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Translation source file parser
//!
//! Parses the portable message-catalog text format into an ordered
//! collection of entries. The supported grammar is a documented subset
//! of the classic .po format:
//!
//! - Comments: lines starting with #
//!   - `# ` - translator comments
//!   - `#.` - extracted comments
//!   - `#:` - reference (file:line)
//!   - `#,` - flags (fuzzy, c-format, ...), passed through unmodified
//!   - `#~` - obsolete entry marker
//! - `msgctxt "context"` - message context (optional)
//! - `msgid "original"` - original string
//! - `msgid_plural "plural"` - plural original (optional)
//! - `msgstr "translation"` - translation (for singular)
//! - `msgstr[N]` - plural translations, N below MAX_PLURAL_FORMS
//!
//! String values may span multiple adjacent quoted lines and use
//! C-style escapes including octal and hex forms. Cosmetic problems
//! (duplicate keys, trailing-newline asymmetry, unknown escapes) are
//! collected as warnings on the parsed file and never abort the parse.

use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read};

/// Most plural forms any single entry may carry
pub const MAX_PLURAL_FORMS: usize = 6;

/// What a parsed entry represents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PoEntryKind {
    /// A translatable message
    #[default]
    Normal,
    /// A comment block attached to no message (e.g. trailing comments)
    PureComment,
}

/// A single entry from a translation source file
#[derive(Debug, Clone, Default)]
pub struct PoEntry {
    /// Entry kind
    pub kind: PoEntryKind,
    /// Line the entry's first keyword appeared on
    pub line: usize,
    /// Translator comments (# ...)
    pub translator_comments: Vec<String>,
    /// Extracted comments (#. ...)
    pub extracted_comments: Vec<String>,
    /// Reference comments (#: file:line)
    pub reference_comments: Vec<String>,
    /// Flags (#, fuzzy, c-format)
    pub flags: Vec<String>,
    /// Message context
    pub msgctxt: Option<String>,
    /// Original string (msgid)
    pub msgid: String,
    /// Plural original (msgid_plural)
    pub msgid_plural: Option<String>,
    /// Translations (msgstr or msgstr[N])
    /// For singular: single element
    /// For plural: multiple elements indexed by plural form
    pub msgstr: Vec<String>,
    /// Whether this entry is marked as fuzzy
    pub is_fuzzy: bool,
    /// Whether this entry is obsolete (#~ ...)
    pub is_obsolete: bool,
}

impl PoEntry {
    /// Check if this is the header entry (empty msgid, no context)
    pub fn is_header(&self) -> bool {
        self.kind == PoEntryKind::Normal && self.msgid.is_empty() && self.msgctxt.is_none()
    }

    /// Check if this is a plural entry
    pub fn is_plural(&self) -> bool {
        self.msgid_plural.is_some()
    }
}

/// A non-fatal problem found while parsing
#[derive(Debug, Clone, PartialEq)]
pub struct PoWarning {
    pub line: usize,
    pub message: String,
}

impl std::fmt::Display for PoWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

/// Parsed translation source file
#[derive(Debug, Clone, Default)]
pub struct PoFile {
    /// Header entry (msgid = "")
    pub header: Option<PoEntry>,
    /// Message entries, in file order
    pub entries: Vec<PoEntry>,
    /// Domain (from domain directive, if present)
    pub domain: Option<String>,
    /// Cosmetic problems found while parsing
    pub warnings: Vec<PoWarning>,
}

/// Error type for translation file parsing
#[derive(Debug)]
pub enum PoError {
    /// I/O error
    Io(std::io::Error),
    /// Parse error with line number
    Parse(usize, String),
    /// Unterminated string
    UnterminatedString(usize),
}

impl std::fmt::Display for PoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoError::Io(e) => write!(f, "I/O error: {}", e),
            PoError::Parse(line, msg) => write!(f, "line {}: {}", line, msg),
            PoError::UnterminatedString(line) => write!(f, "line {}: unterminated string", line),
        }
    }
}

impl std::error::Error for PoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PoError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PoError {
    fn from(e: std::io::Error) -> Self {
        PoError::Io(e)
    }
}

/// Parser for translation source files
pub struct PoParser<R> {
    reader: BufReader<R>,
    line_number: usize,
    current_line: String,
    peeked: Option<String>,
    warnings: Vec<PoWarning>,
    domain: Option<String>,
}

impl<R: Read> PoParser<R> {
    /// Create a new parser from a reader
    pub fn new(reader: R) -> Self {
        PoParser {
            reader: BufReader::new(reader),
            line_number: 0,
            current_line: String::new(),
            peeked: None,
            warnings: Vec::new(),
            domain: None,
        }
    }

    /// Parse the file
    pub fn parse(&mut self) -> Result<PoFile, PoError> {
        let mut po_file = PoFile::default();
        let mut seen: HashSet<(Option<String>, String)> = HashSet::new();

        while let Some(entry) = self.parse_entry()? {
            if entry.kind == PoEntryKind::PureComment {
                po_file.entries.push(entry);
                continue;
            }

            if entry.is_header() {
                if po_file.header.is_some() {
                    self.warnings.push(PoWarning {
                        line: entry.line,
                        message: "duplicate header entry".to_string(),
                    });
                } else {
                    po_file.header = Some(entry);
                }
                continue;
            }

            self.check_entry(&entry);

            let key = (entry.msgctxt.clone(), entry.msgid.clone());
            if !seen.insert(key) {
                self.warnings.push(PoWarning {
                    line: entry.line,
                    message: format!("duplicate message definition: \"{}\"", entry.msgid),
                });
                continue; // first entry wins
            }

            po_file.entries.push(entry);
        }

        po_file.domain = self.domain.take();
        po_file.warnings = std::mem::take(&mut self.warnings);
        Ok(po_file)
    }

    /// Cosmetic checks that produce warnings, never errors
    fn check_entry(&mut self, entry: &PoEntry) {
        for (i, msgstr) in entry.msgstr.iter().enumerate() {
            if msgstr.is_empty() {
                continue;
            }
            if entry.msgid.ends_with('\n') != msgstr.ends_with('\n') {
                self.warnings.push(PoWarning {
                    line: entry.line,
                    message: format!(
                        "msgid and msgstr{} disagree on a trailing newline",
                        if entry.msgstr.len() > 1 {
                            format!("[{}]", i)
                        } else {
                            String::new()
                        }
                    ),
                });
            }
        }

        if entry.msgstr.iter().all(|s| s.is_empty()) {
            self.warnings.push(PoWarning {
                line: entry.line,
                message: format!("empty msgstr for: \"{}\"", entry.msgid),
            });
        }
    }

    /// Read the next line, handling the peeked line
    fn next_line(&mut self) -> Result<Option<String>, PoError> {
        if let Some(line) = self.peeked.take() {
            return Ok(Some(line));
        }

        self.current_line.clear();
        let bytes = self.reader.read_line(&mut self.current_line)?;
        if bytes == 0 {
            return Ok(None);
        }

        self.line_number += 1;

        // Remove trailing newline
        let line = self.current_line.trim_end().to_string();
        Ok(Some(line))
    }

    /// Peek at the next line without consuming it
    fn peek_line(&mut self) -> Result<Option<&str>, PoError> {
        if self.peeked.is_none() {
            self.peeked = self.next_line()?;
        }
        Ok(self.peeked.as_deref())
    }

    /// Put back a line to be read again
    fn unread_line(&mut self, line: String) {
        self.peeked = Some(line);
    }

    /// Parse a single entry
    fn parse_entry(&mut self) -> Result<Option<PoEntry>, PoError> {
        let mut entry = PoEntry::default();
        let mut saw_comment = false;

        // Skip blank lines, collect the leading comment block
        loop {
            let line = match self.next_line()? {
                Some(line) => line,
                None => {
                    if saw_comment {
                        entry.kind = PoEntryKind::PureComment;
                        return Ok(Some(entry));
                    }
                    return Ok(None);
                }
            };

            if line.is_empty() {
                if saw_comment {
                    // Comment block followed by a blank line belongs to
                    // no message
                    entry.kind = PoEntryKind::PureComment;
                    return Ok(Some(entry));
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix('#') {
                if entry.line == 0 {
                    entry.line = self.line_number;
                }
                self.parse_comment(&mut entry, rest);
                saw_comment = true;
            } else {
                self.unread_line(line);
                break;
            }
        }

        if entry.line == 0 {
            // The first keyword line was just pushed back, so the line
            // counter is already positioned on it
            entry.line = self.line_number;
        }

        // Keyword lines up to the next blank line or comment
        while let Some(line) = self.peek_line()? {
            if line.is_empty() || line.starts_with('#') {
                break;
            }

            let line = match self.next_line()? {
                Some(line) => line,
                None => break,
            };

            if let Some(rest) = line.strip_prefix("domain ") {
                self.domain = Some(rest.trim().to_string());
            } else if let Some(rest) = line.strip_prefix("msgctxt") {
                entry.msgctxt = Some(self.parse_string_value(rest)?);
            } else if let Some(rest) = line.strip_prefix("msgid_plural") {
                entry.msgid_plural = Some(self.parse_string_value(rest)?);
            } else if let Some(rest) = line.strip_prefix("msgstr[") {
                let idx_end = rest.find(']').ok_or_else(|| {
                    PoError::Parse(self.line_number, "missing ']' after msgstr[".to_string())
                })?;
                let idx: usize = rest[..idx_end].parse().map_err(|_| {
                    PoError::Parse(self.line_number, "invalid msgstr index".to_string())
                })?;
                if idx >= MAX_PLURAL_FORMS {
                    return Err(PoError::Parse(
                        self.line_number,
                        format!("msgstr index {} exceeds {} forms", idx, MAX_PLURAL_FORMS),
                    ));
                }
                let value = self.parse_string_value(&rest[idx_end + 1..])?;
                while entry.msgstr.len() <= idx {
                    entry.msgstr.push(String::new());
                }
                entry.msgstr[idx] = value;
            } else if let Some(rest) = line.strip_prefix("msgstr") {
                entry.msgstr = vec![self.parse_string_value(rest)?];
            } else if let Some(rest) = line.strip_prefix("msgid") {
                if !entry.msgid.is_empty() || !entry.msgstr.is_empty() {
                    // New entry without a separating blank line
                    self.unread_line(format!("msgid{}", rest));
                    break;
                }
                entry.msgid = self.parse_string_value(rest)?;
            } else {
                return Err(PoError::Parse(
                    self.line_number,
                    format!("unrecognized line: {}", line),
                ));
            }
        }

        // Check if we actually parsed an entry
        if entry.msgid.is_empty() && entry.msgctxt.is_none() && entry.msgstr.is_empty() {
            if saw_comment {
                entry.kind = PoEntryKind::PureComment;
                return Ok(Some(entry));
            }
            return Ok(None);
        }

        // Ensure msgstr has at least one element
        if entry.msgstr.is_empty() {
            entry.msgstr.push(String::new());
        }

        Ok(Some(entry))
    }

    /// Parse a comment line
    fn parse_comment(&mut self, entry: &mut PoEntry, rest: &str) {
        if let Some(content) = rest.strip_prefix('.') {
            // Extracted comment
            entry.extracted_comments.push(content.trim().to_string());
        } else if let Some(content) = rest.strip_prefix(':') {
            // Reference comment
            entry.reference_comments.push(content.trim().to_string());
        } else if let Some(content) = rest.strip_prefix(',') {
            // Flags, passed through unmodified
            for flag in content.split(',') {
                let flag = flag.trim();
                if flag == "fuzzy" {
                    entry.is_fuzzy = true;
                }
                entry.flags.push(flag.to_string());
            }
        } else if rest.strip_prefix('~').is_some() {
            // Obsolete entry
            entry.is_obsolete = true;
        } else {
            // Translator comment
            entry.translator_comments.push(rest.trim().to_string());
        }
    }

    /// Parse a string value after a keyword (e.g., after "msgid ")
    fn parse_string_value(&mut self, rest: &str) -> Result<String, PoError> {
        let rest = rest.trim();
        if !rest.starts_with('"') {
            return Err(PoError::Parse(
                self.line_number,
                "expected quoted string".to_string(),
            ));
        }

        let mut result = self.parse_quoted_string(rest)?;

        // Adjacent quoted lines concatenate into one value
        loop {
            match self.peek_line()? {
                Some(line) if line.trim_start().starts_with('"') => {
                    let line = match self.next_line()? {
                        Some(line) => line,
                        None => break,
                    };
                    result.push_str(&self.parse_quoted_string(&line)?);
                }
                _ => break,
            }
        }

        Ok(result)
    }

    /// Parse a quoted string (including escape sequences)
    fn parse_quoted_string(&mut self, s: &str) -> Result<String, PoError> {
        let s = s.trim();
        if !s.starts_with('"') {
            return Err(PoError::Parse(
                self.line_number,
                "expected quoted string".to_string(),
            ));
        }

        let s = &s[1..]; // Skip opening quote
        let mut result = String::new();
        let mut chars = s.chars().peekable();

        loop {
            match chars.next() {
                None => {
                    return Err(PoError::UnterminatedString(self.line_number));
                }
                Some('"') => {
                    // End of string
                    break;
                }
                Some('\\') => match chars.next() {
                    None => {
                        return Err(PoError::UnterminatedString(self.line_number));
                    }
                    Some('n') => result.push('\n'),
                    Some('t') => result.push('\t'),
                    Some('r') => result.push('\r'),
                    Some('a') => result.push('\x07'),
                    Some('b') => result.push('\x08'),
                    Some('f') => result.push('\x0c'),
                    Some('v') => result.push('\x0b'),
                    Some('\\') => result.push('\\'),
                    Some('"') => result.push('"'),
                    Some(d @ '0'..='7') => {
                        // Octal escape, up to three digits
                        let mut value = d as u32 - '0' as u32;
                        for _ in 0..2 {
                            match chars.peek() {
                                Some(&o @ '0'..='7') => {
                                    value = value * 8 + (o as u32 - '0' as u32);
                                    chars.next();
                                }
                                _ => break,
                            }
                        }
                        result.push((value & 0xff) as u8 as char);
                    }
                    Some('x') => {
                        // Hex escape, one or two digits
                        let mut value: u32 = 0;
                        let mut digits = 0;
                        while digits < 2 {
                            match chars.peek().and_then(|c| c.to_digit(16)) {
                                Some(d) => {
                                    value = value * 16 + d;
                                    chars.next();
                                    digits += 1;
                                }
                                None => break,
                            }
                        }
                        if digits == 0 {
                            self.warnings.push(PoWarning {
                                line: self.line_number,
                                message: "\\x escape with no hex digits".to_string(),
                            });
                            result.push_str("\\x");
                        } else {
                            result.push(value as u8 as char);
                        }
                    }
                    Some(c) => {
                        // Unknown escape - keep as-is, but note it
                        self.warnings.push(PoWarning {
                            line: self.line_number,
                            message: format!("unknown escape sequence \\{}", c),
                        });
                        result.push('\\');
                        result.push(c);
                    }
                },
                Some(c) => {
                    result.push(c);
                }
            }
        }

        Ok(result)
    }
}

impl PoFile {
    /// Parse from a string
    pub fn parse(s: &str) -> Result<Self, PoError> {
        let mut parser = PoParser::new(s.as_bytes());
        parser.parse()
    }

    /// Parse from a reader
    pub fn parse_from<R: Read>(reader: R) -> Result<Self, PoError> {
        let mut parser = PoParser::new(reader);
        parser.parse()
    }

    /// Get all message entries (skipping pure-comment blocks)
    pub fn message_entries(&self) -> impl Iterator<Item = &PoEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == PoEntryKind::Normal)
    }
}
