//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Catalog builder
//!
//! Merges one reference file and any number of per-language files
//! into a compiled [`Domain`]. The reference file is authoritative:
//! message ids are dense integers assigned in first-encounter order
//! while scanning it, and its errors abort the whole build. Errors in
//! a language file only degrade that language (or single entries of
//! it); everything else still ships.
//!
//! Translations textually identical to their source are not stored:
//! the offset stays 0 and the per-message present bit records that
//! the language does cover the message.

use std::borrow::Cow;
use std::collections::HashMap;

use crate::catalog_lib::artifact::{bit_set, present_len, Domain, Translation};
use crate::catalog_lib::header::{parse_header_fields, resolve_plural, HeaderError};
use crate::catalog_lib::po_file::{PoEntry, PoFile};
use crate::catalog_lib::postfix::{PluralRuleId, DEFAULT_RULE};

/// Byte gluing a context tag to its message key
pub const CONTEXT_GLUE: char = '\u{4}';

/// Fatal build error (reference file problems, capacity limits)
#[derive(Debug, Clone, PartialEq)]
pub enum BuildError {
    /// Reference-file semantic error; no id assignment is possible
    Semantic(String),
    /// An interned blob outgrew the offset index width
    Capacity(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Semantic(msg) => write!(f, "{}", msg),
            BuildError::Capacity(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for BuildError {}

/// A non-fatal, per-language or per-entry problem
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Language tag, when the problem is language-scoped
    pub lang: Option<String>,
    /// Source line, when known
    pub line: Option<usize>,
    pub message: String,
    pub is_error: bool,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref lang) = self.lang {
            write!(f, "{}: ", lang)?;
        }
        if let Some(line) = self.line {
            write!(f, "line {}: ", line)?;
        }
        write!(
            f,
            "{}: {}",
            if self.is_error { "error" } else { "warning" },
            self.message
        )
    }
}

/// What to do with a language whose plural formula is not canonical
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PluralFallback {
    /// Ship the language under the default two-form rule
    #[default]
    DefaultRule,
    /// Drop the language from the build
    Drop,
}

/// Build configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Include entries flagged as fuzzy
    pub include_fuzzy: bool,
    /// Policy for unrecognized plural formulas
    pub plural_fallback: PluralFallback,
}

/// One language's parsed input
#[derive(Debug)]
pub struct LanguageInput {
    /// Tag from the language list file (file naming)
    pub tag: String,
    pub po: PoFile,
}

/// A built domain plus everything worth reporting about the build
#[derive(Debug)]
pub struct BuildOutput {
    pub domain: Domain,
    pub diagnostics: Vec<Diagnostic>,
}

/// Interning buffer: NUL-joined runs, deduplicated, offset 0 reserved
struct BlobWriter {
    buf: Vec<u8>,
    map: HashMap<Vec<u8>, u32>,
}

impl BlobWriter {
    fn new() -> Self {
        BlobWriter {
            buf: vec![0],
            map: HashMap::new(),
        }
    }

    /// Intern a run of sub-strings. Each part is NUL-terminated and
    /// the run ends with one extra NUL; identical runs share one
    /// offset.
    fn intern(&mut self, parts: &[&str]) -> Result<u32, BuildError> {
        let mut run: Vec<u8> = Vec::new();
        for part in parts {
            run.extend_from_slice(part.as_bytes());
            run.push(0);
        }
        run.push(0);

        if let Some(&off) = self.map.get(&run) {
            return Ok(off);
        }

        let off = self.buf.len();
        if off + run.len() > u32::MAX as usize {
            return Err(BuildError::Capacity(
                "interned blob exceeds 32-bit offset range".to_string(),
            ));
        }
        self.buf.extend_from_slice(&run);
        self.map.insert(run, off as u32);
        Ok(off as u32)
    }

    fn into_blob(self) -> Vec<u8> {
        self.buf
    }
}

/// The context-glued first sub-string of an entry's key
fn glued_key(entry: &PoEntry) -> String {
    match &entry.msgctxt {
        Some(ctxt) => format!("{}{}{}", ctxt, CONTEXT_GLUE, entry.msgid),
        None => entry.msgid.clone(),
    }
}

fn has_embedded_nul(entry: &PoEntry) -> bool {
    entry.msgid.contains('\0')
        || entry.msgctxt.as_deref().is_some_and(|s| s.contains('\0'))
        || entry.msgid_plural.as_deref().is_some_and(|s| s.contains('\0'))
        || entry.msgstr.iter().any(|s| s.contains('\0'))
}

/// Build one domain from a reference file and its languages.
///
/// Building the same corpus twice yields byte-identical output: ids
/// follow reference order, languages follow input order, and interning
/// appends in first-need order.
pub fn build_domain(
    name: &str,
    reference: &PoFile,
    languages: &[LanguageInput],
    options: &BuildOptions,
) -> Result<BuildOutput, BuildError> {
    let mut diagnostics = Vec::new();

    // Pass 1: scan the reference, assign ids, intern keys
    let mut keys = BlobWriter::new();
    let mut key_offsets: Vec<u32> = vec![0]; // id 0 reserved
    let mut index: HashMap<(Option<String>, String), u32> = HashMap::new();
    let mut is_plural: Vec<bool> = vec![false];

    for entry in reference.message_entries() {
        if entry.is_obsolete {
            continue;
        }
        if entry.is_fuzzy && !options.include_fuzzy {
            continue;
        }
        if has_embedded_nul(entry) {
            return Err(BuildError::Semantic(format!(
                "line {}: embedded NUL byte in message",
                entry.line
            )));
        }
        if entry.is_plural() && entry.msgid_plural.as_deref() == Some("") {
            return Err(BuildError::Semantic(format!(
                "line {}: empty msgid_plural",
                entry.line
            )));
        }

        let lookup = (entry.msgctxt.clone(), entry.msgid.clone());
        if index.contains_key(&lookup) {
            return Err(BuildError::Semantic(format!(
                "line {}: duplicate key \"{}\"",
                entry.line, entry.msgid
            )));
        }

        let glued = glued_key(entry);
        let offset = match &entry.msgid_plural {
            Some(plural) => keys.intern(&[&glued, plural])?,
            None => keys.intern(&[&glued])?,
        };
        // The recorded offset skips the context prefix, so a source
        // fallback never exposes the glue
        let skip = entry
            .msgctxt
            .as_ref()
            .map_or(0, |c| c.len() + CONTEXT_GLUE.len_utf8()) as u32;

        let id = key_offsets.len() as u32;
        key_offsets.push(offset + skip);
        is_plural.push(entry.is_plural());
        index.insert(lookup, id);
    }

    let nkeys = key_offsets.len() as u32 - 1;

    // Pass 2: one translation record per language, input order
    let mut translations: Vec<Translation> = Vec::new();

    'languages: for input in languages {
        let header_text = match input.po.header.as_ref().and_then(|h| h.msgstr.first()) {
            Some(text) if !text.is_empty() => text.clone(),
            _ => {
                diagnostics.push(Diagnostic {
                    lang: Some(input.tag.clone()),
                    line: None,
                    message: "missing header entry".to_string(),
                    is_error: true,
                });
                continue;
            }
        };

        let fields = match parse_header_fields(&header_text) {
            Ok(fields) => fields,
            Err(e) => {
                diagnostics.push(Diagnostic {
                    lang: Some(input.tag.clone()),
                    line: None,
                    message: e.to_string(),
                    is_error: true,
                });
                continue;
            }
        };

        if fields.language != input.tag {
            diagnostics.push(Diagnostic {
                lang: Some(input.tag.clone()),
                line: None,
                message: format!(
                    "header Language \"{}\" differs from list entry \"{}\"",
                    fields.language, input.tag
                ),
                is_error: false,
            });
        }

        let (nplurals, rule): (usize, PluralRuleId) = match resolve_plural(&fields) {
            Ok(resolved) => resolved,
            Err(e @ HeaderError::UnsupportedExpression(_)) => match options.plural_fallback {
                PluralFallback::DefaultRule => {
                    diagnostics.push(Diagnostic {
                        lang: Some(input.tag.clone()),
                        line: None,
                        message: format!("{}; using default plural rule", e),
                        is_error: false,
                    });
                    (DEFAULT_RULE.nplurals(), DEFAULT_RULE)
                }
                PluralFallback::Drop => {
                    diagnostics.push(Diagnostic {
                        lang: Some(input.tag.clone()),
                        line: None,
                        message: e.to_string(),
                        is_error: true,
                    });
                    continue 'languages;
                }
            },
            Err(e) => {
                diagnostics.push(Diagnostic {
                    lang: Some(input.tag.clone()),
                    line: None,
                    message: e.to_string(),
                    is_error: true,
                });
                continue;
            }
        };

        let mut blob = BlobWriter::new();
        let mut offsets: Vec<u32> = vec![0; nkeys as usize + 1];
        let mut present: Vec<u8> = vec![0; present_len(nkeys)];

        for entry in input.po.message_entries() {
            if entry.is_obsolete {
                continue;
            }
            if entry.is_fuzzy && !options.include_fuzzy {
                continue;
            }

            let lookup = (entry.msgctxt.clone(), entry.msgid.clone());
            let id = match index.get(&lookup) {
                Some(&id) => id as usize,
                None => {
                    diagnostics.push(Diagnostic {
                        lang: Some(fields.language.clone()),
                        line: Some(entry.line),
                        message: format!("\"{}\" is not in the reference file", entry.msgid),
                        is_error: false,
                    });
                    continue;
                }
            };

            // Untranslated entries stay missing
            if entry.msgstr.iter().all(|s| s.is_empty()) {
                continue;
            }

            if has_embedded_nul(entry) {
                diagnostics.push(Diagnostic {
                    lang: Some(fields.language.clone()),
                    line: Some(entry.line),
                    message: "embedded NUL byte in message".to_string(),
                    is_error: true,
                });
                continue;
            }

            if entry.is_plural() != is_plural[id] {
                diagnostics.push(Diagnostic {
                    lang: Some(fields.language.clone()),
                    line: Some(entry.line),
                    message: format!(
                        "\"{}\" is {} in the reference file",
                        entry.msgid,
                        if is_plural[id] { "plural" } else { "singular" }
                    ),
                    is_error: true,
                });
                continue;
            }

            let expected = if entry.is_plural() { nplurals } else { 1 };
            if entry.msgstr.len() != expected {
                diagnostics.push(Diagnostic {
                    lang: Some(fields.language.clone()),
                    line: Some(entry.line),
                    message: format!(
                        "entry has {} plural forms, the language declares {}",
                        entry.msgstr.len(),
                        expected
                    ),
                    is_error: true,
                });
                continue;
            }
            if entry.is_plural() && entry.msgstr.iter().any(|s| s.is_empty()) {
                diagnostics.push(Diagnostic {
                    lang: Some(fields.language.clone()),
                    line: Some(entry.line),
                    message: "incomplete plural translation".to_string(),
                    is_error: true,
                });
                continue;
            }

            // Elide translations identical to their source text
            let source_joined = match &entry.msgid_plural {
                Some(plural) => format!("{}\0{}", entry.msgid, plural),
                None => entry.msgid.clone(),
            };
            let translated_joined = entry.msgstr.join("\0");
            if source_joined != translated_joined {
                let parts: Vec<&str> = entry.msgstr.iter().map(String::as_str).collect();
                offsets[id] = blob.intern(&parts)?;
            }
            bit_set(&mut present, id);
        }

        translations.push(Translation {
            lang: Cow::Owned(fields.language),
            rule,
            offsets: Cow::Owned(offsets),
            present: Cow::Owned(present),
            blob: Cow::Owned(blob.into_blob()),
        });
    }

    translations.push(Translation::sentinel());

    Ok(BuildOutput {
        domain: Domain {
            name: Cow::Owned(name.to_string()),
            nkeys,
            key_offsets: Cow::Owned(key_offsets),
            key_blob: Cow::Owned(keys.into_blob()),
            translations: Cow::Owned(translations),
        },
        diagnostics,
    })
}
