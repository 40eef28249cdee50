//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Catalog header interpretation
//!
//! The distinguished empty-key entry of a translation file is
//! administrative, not translatable. Its translation text is a block
//! of `Key: value` lines; this module extracts the fields the catalog
//! builder needs: character set, language tag, and the plural
//! declaration `nplurals=N; plural=EXPR;`.
//!
//! Compiled catalogs store text in exactly one encoding, so any
//! charset other than UTF-8 is rejected here rather than converted.

use crate::catalog_lib::plural::PluralExpr;
use crate::catalog_lib::po_file::MAX_PLURAL_FORMS;
use crate::catalog_lib::postfix::{canonicalize, CanonError, PluralRuleId, DEFAULT_RULE};

/// Raw header fields, before plural-rule resolution
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFields {
    /// Character set from Content-Type (always "UTF-8" once validated)
    pub charset: String,
    /// Language tag (2-5 characters, e.g. "de" or "de_AT")
    pub language: String,
    /// Plural declaration, when the header carries one
    pub plural_decl: Option<PluralDecl>,
}

/// The `nplurals=N; plural=EXPR;` declaration, unparsed formula text
#[derive(Debug, Clone, PartialEq)]
pub struct PluralDecl {
    pub nplurals: usize,
    pub formula: String,
}

/// Error type for header interpretation
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderError {
    /// A mandatory header field is absent
    MissingField(&'static str),
    /// The declared charset is not the supported encoding
    UnsupportedCharset(String),
    /// The language tag is malformed
    BadLanguageTag(String),
    /// The Plural-Forms line is malformed
    BadPluralForms(String),
    /// The plural formula parsed but is not a known canonical rule
    UnsupportedExpression(CanonError),
}

impl std::fmt::Display for HeaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderError::MissingField(name) => write!(f, "missing header field: {}", name),
            HeaderError::UnsupportedCharset(cs) => {
                write!(f, "unsupported charset \"{}\" (only UTF-8)", cs)
            }
            HeaderError::BadLanguageTag(tag) => write!(f, "bad language tag \"{}\"", tag),
            HeaderError::BadPluralForms(msg) => write!(f, "bad Plural-Forms: {}", msg),
            HeaderError::UnsupportedExpression(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for HeaderError {}

/// Find a `Key:` line and return the rest of it
fn header_line<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(key))
        .map(str::trim)
}

/// Extract and validate the header fields of a language file
pub fn parse_header_fields(text: &str) -> Result<HeaderFields, HeaderError> {
    let content_type =
        header_line(text, "Content-Type:").ok_or(HeaderError::MissingField("Content-Type"))?;
    let charset = content_type
        .split(';')
        .find_map(|part| part.trim().strip_prefix("charset="))
        .map(str::trim)
        .ok_or(HeaderError::MissingField("charset"))?;
    if !charset.eq_ignore_ascii_case("UTF-8") {
        return Err(HeaderError::UnsupportedCharset(charset.to_string()));
    }

    let language = header_line(text, "Language:").ok_or(HeaderError::MissingField("Language"))?;
    if !valid_language_tag(language) {
        return Err(HeaderError::BadLanguageTag(language.to_string()));
    }

    let plural_decl = match header_line(text, "Plural-Forms:") {
        Some(decl) => Some(parse_plural_decl(decl)?),
        None => None,
    };

    Ok(HeaderFields {
        charset: "UTF-8".to_string(),
        language: language.to_string(),
        plural_decl,
    })
}

/// A tag is `ll` or `ll_CC`-shaped: 2-5 characters, leading two
/// alphabetic, the rest alphanumeric or '_'
fn valid_language_tag(tag: &str) -> bool {
    let bytes = tag.as_bytes();
    if !(2..=5).contains(&bytes.len()) {
        return false;
    }
    if !bytes[..2].iter().all(u8::is_ascii_alphabetic) {
        return false;
    }
    bytes[2..]
        .iter()
        .all(|b| b.is_ascii_alphanumeric() || *b == b'_')
}

/// Parse `nplurals=N; plural=EXPR;`
fn parse_plural_decl(decl: &str) -> Result<PluralDecl, HeaderError> {
    let mut nplurals = None;
    let mut formula = None;

    // The formula itself may contain ';'-free parts only; the plural=
    // expression ends the declaration, so split the nplurals part off
    // first and take everything after "plural=" verbatim.
    if let Some(pos) = decl.find("plural=") {
        let head = &decl[..pos];
        let tail = decl[pos + "plural=".len()..].trim();
        formula = Some(tail.trim_end_matches(';').trim().to_string());
        for part in head.split(';') {
            if let Some(val) = part.trim().strip_prefix("nplurals=") {
                nplurals = val
                    .trim()
                    .parse::<usize>()
                    .ok()
                    .filter(|n| (1..=MAX_PLURAL_FORMS).contains(n));
            }
        }
    }

    match (nplurals, formula) {
        (Some(n), Some(f)) if !f.is_empty() => Ok(PluralDecl {
            nplurals: n,
            formula: f,
        }),
        _ => Err(HeaderError::BadPluralForms(decl.to_string())),
    }
}

/// Resolve the plural declaration to a canonical rule.
///
/// A header without a declaration gets the built-in default: two
/// forms, "not equal to one".
pub fn resolve_plural(fields: &HeaderFields) -> Result<(usize, PluralRuleId), HeaderError> {
    match &fields.plural_decl {
        None => Ok((DEFAULT_RULE.nplurals(), DEFAULT_RULE)),
        Some(decl) => {
            let expr = PluralExpr::parse(&decl.formula)
                .map_err(|e| HeaderError::BadPluralForms(e.to_string()))?;
            let rule = canonicalize(decl.nplurals, &expr)
                .map_err(HeaderError::UnsupportedExpression)?;
            Ok((decl.nplurals, rule))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: &str = "Content-Type: text/plain; charset=UTF-8\n\
                        Language: de\n\
                        Plural-Forms: nplurals=2; plural=(n != 1);\n";

    #[test]
    fn test_good_header() {
        let fields = parse_header_fields(GOOD).unwrap();
        assert_eq!(fields.charset, "UTF-8");
        assert_eq!(fields.language, "de");
        let decl = fields.plural_decl.as_ref().unwrap();
        assert_eq!(decl.nplurals, 2);
        assert_eq!(decl.formula, "(n != 1)");

        let (nplurals, rule) = resolve_plural(&fields).unwrap();
        assert_eq!(nplurals, 2);
        assert_eq!(rule, PluralRuleId::Germanic);
    }

    #[test]
    fn test_missing_content_type() {
        let err = parse_header_fields("Language: de\n").unwrap_err();
        assert_eq!(err, HeaderError::MissingField("Content-Type"));
    }

    #[test]
    fn test_bad_charset() {
        let text = "Content-Type: text/plain; charset=ISO-8859-1\nLanguage: de\n";
        assert!(matches!(
            parse_header_fields(text),
            Err(HeaderError::UnsupportedCharset(_))
        ));
    }

    #[test]
    fn test_charset_case_insensitive() {
        let text = "Content-Type: text/plain; charset=utf-8\nLanguage: de\n";
        assert!(parse_header_fields(text).is_ok());
    }

    #[test]
    fn test_missing_language() {
        let text = "Content-Type: text/plain; charset=UTF-8\n";
        assert_eq!(
            parse_header_fields(text).unwrap_err(),
            HeaderError::MissingField("Language")
        );
    }

    #[test]
    fn test_bad_language_tags() {
        for tag in ["x", "d3", "toolong_", "de-AT"] {
            let text = format!("Content-Type: text/plain; charset=UTF-8\nLanguage: {}\n", tag);
            assert!(
                matches!(
                    parse_header_fields(&text),
                    Err(HeaderError::BadLanguageTag(_))
                ),
                "tag {} should be rejected",
                tag
            );
        }
        for tag in ["de", "de_AT", "pt_BR"] {
            let text = format!("Content-Type: text/plain; charset=UTF-8\nLanguage: {}\n", tag);
            assert!(parse_header_fields(&text).is_ok(), "tag {} should parse", tag);
        }
    }

    #[test]
    fn test_default_rule_when_absent() {
        let text = "Content-Type: text/plain; charset=UTF-8\nLanguage: de\n";
        let fields = parse_header_fields(text).unwrap();
        assert!(fields.plural_decl.is_none());
        let (nplurals, rule) = resolve_plural(&fields).unwrap();
        assert_eq!(nplurals, 2);
        assert_eq!(rule, DEFAULT_RULE);
    }

    #[test]
    fn test_polish_header() {
        let text = "Content-Type: text/plain; charset=UTF-8\n\
                    Language: pl\n\
                    Plural-Forms: nplurals=3; plural=(n==1 ? 0 : n%10>=2 && n%10<=4 && (n%100<10 || n%100>=20) ? 1 : 2);\n";
        let fields = parse_header_fields(text).unwrap();
        let (nplurals, rule) = resolve_plural(&fields).unwrap();
        assert_eq!(nplurals, 3);
        assert_eq!(rule, PluralRuleId::Polish);
    }

    #[test]
    fn test_unsupported_expression() {
        let text = "Content-Type: text/plain; charset=UTF-8\n\
                    Language: de\n\
                    Plural-Forms: nplurals=2; plural=n & 1;\n";
        let fields = parse_header_fields(text).unwrap();
        assert!(matches!(
            resolve_plural(&fields),
            Err(HeaderError::UnsupportedExpression(CanonError::Unsupported))
        ));
    }

    #[test]
    fn test_count_mismatch() {
        let text = "Content-Type: text/plain; charset=UTF-8\n\
                    Language: de\n\
                    Plural-Forms: nplurals=3; plural=(n != 1);\n";
        let fields = parse_header_fields(text).unwrap();
        assert!(matches!(
            resolve_plural(&fields),
            Err(HeaderError::UnsupportedExpression(
                CanonError::CountMismatch { .. }
            ))
        ));
    }

    #[test]
    fn test_malformed_plural_forms() {
        let text = "Content-Type: text/plain; charset=UTF-8\n\
                    Language: de\n\
                    Plural-Forms: nplurals=two; plural=(n != 1);\n";
        let fields = parse_header_fields(text);
        assert!(matches!(fields, Err(HeaderError::BadPluralForms(_))));
    }
}
