//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! msgsubst - rewrite translatable string literals in source code
//!
//! Replaces string literals that match catalog keys with either
//! integer-id lookup calls (multi-language mode) or one fixed
//! language's literal translation (single-language mode). Literals
//! matching no key are left untouched. Message ids are derived from
//! the reference file with the same assignment rules the catalog
//! builder uses, so rewritten call sites and the compiled artifact
//! agree.

use clap::Parser;
use msgtab::catalog_lib::po_file::PoFile;
use proc_macro2::{TokenStream, TokenTree};
use quote::ToTokens;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::exit;
use syn::{parse_file, parse_str, LitStr};

/// msgsubst - rewrite translatable string literals in source code
#[derive(Parser)]
#[command(version, about = "msgsubst - rewrite translatable string literals in source code")]
struct Args {
    #[arg(
        short = 'l',
        long = "language",
        help = "Single-language mode: substitute this language's translations"
    )]
    language: Option<String>,

    #[arg(short = 'd', help = "Directory containing TAG.po files (default: reference directory)")]
    directory: Option<PathBuf>,

    #[arg(
        short = 'k',
        long = "call",
        default_value = "msg",
        help = "Call name for id references in multi-language mode"
    )]
    call: String,

    #[arg(short = 'f', help = "Count fuzzy entries during id assignment")]
    include_fuzzy: bool,

    #[arg(short = 'i', help = "Rewrite files in place instead of printing to stdout")]
    in_place: bool,

    #[arg(required = true, help = "Reference translation source file")]
    reference: PathBuf,

    #[arg(required = true, help = "Rust source files to rewrite")]
    files: Vec<PathBuf>,
}

/// How matched literals are replaced
enum Substitution {
    /// `"literal"` becomes `call(id)`
    Ids { call: String, ids: HashMap<String, u32> },
    /// `"literal"` becomes the quoted translation
    Literals { texts: HashMap<String, String> },
}

impl Substitution {
    fn replacement(&self, value: &str) -> Option<String> {
        match self {
            Substitution::Ids { call, ids } => {
                ids.get(value).map(|id| format!("{}({})", call, id))
            }
            Substitution::Literals { texts } => texts.get(value).map(|t| format!("{:?}", t)),
        }
    }
}

/// Message-id table in the catalog builder's assignment order:
/// reference order, skipping obsolete (and by default fuzzy) entries.
/// Only plain keys are substitutable; contexted and plural keys need
/// call-site knowledge a literal cannot express.
fn id_table(reference: &PoFile, include_fuzzy: bool) -> HashMap<String, u32> {
    let mut ids = HashMap::new();
    let mut next = 0u32;
    for entry in reference.message_entries() {
        if entry.is_obsolete {
            continue;
        }
        if entry.is_fuzzy && !include_fuzzy {
            continue;
        }
        next += 1;
        if entry.msgctxt.is_none() && !entry.is_plural() {
            ids.insert(entry.msgid.clone(), next);
        }
    }
    ids
}

/// Translation table for single-language mode
fn text_table(po: &PoFile) -> HashMap<String, String> {
    let mut texts = HashMap::new();
    for entry in po.message_entries() {
        if entry.is_obsolete || entry.is_fuzzy || entry.msgctxt.is_some() || entry.is_plural() {
            continue;
        }
        if let Some(msgstr) = entry.msgstr.first() {
            if !msgstr.is_empty() {
                texts.insert(entry.msgid.clone(), msgstr.clone());
            }
        }
    }
    texts
}

/// Token walker collecting the byte ranges of matching string literals
struct Walker<'a> {
    subst: &'a Substitution,
    /// (byte range start, byte range end, replacement text)
    edits: Vec<(usize, usize, String)>,
}

impl<'a> Walker<'a> {
    fn new(subst: &'a Substitution) -> Self {
        Self {
            subst,
            edits: Vec::new(),
        }
    }

    fn process_rust_file(&mut self, content: &str) -> Result<(), syn::Error> {
        let file = parse_file(content)?;
        self.walk(file.into_token_stream());
        Ok(())
    }

    fn walk(&mut self, stream: TokenStream) {
        for token in stream {
            match token {
                TokenTree::Group(group) => {
                    // going into recursion
                    self.walk(group.stream());
                }
                TokenTree::Literal(literal) => {
                    let span = literal.span();
                    let parsed: Option<LitStr> = parse_str(&literal.to_string()).ok();
                    if let Some(lit) = parsed {
                        if let Some(replacement) = self.subst.replacement(&lit.value()) {
                            let range = span.byte_range();
                            self.edits.push((range.start, range.end, replacement));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

/// Rewrite one source text, returning the new text and how many
/// literals were replaced
fn substitute(content: &str, subst: &Substitution) -> Result<(String, usize), syn::Error> {
    let mut walker = Walker::new(subst);
    walker.process_rust_file(content)?;

    let mut edits = walker.edits;
    edits.sort_by_key(|e| e.0);

    let mut out = String::with_capacity(content.len());
    let mut pos = 0;
    let count = edits.len();
    for (start, end, replacement) in edits {
        out.push_str(&content[pos..start]);
        out.push_str(&replacement);
        pos = end;
    }
    out.push_str(&content[pos..]);
    Ok((out, count))
}

fn main() {
    let args = Args::parse();

    let reference = match fs::File::open(&args.reference)
        .map_err(|e| e.to_string())
        .and_then(|f| PoFile::parse_from(std::io::BufReader::new(f)).map_err(|e| e.to_string()))
    {
        Ok(po) => po,
        Err(msg) => {
            eprintln!("msgsubst: {}: {}", args.reference.display(), msg);
            exit(1);
        }
    };

    let subst = match &args.language {
        None => Substitution::Ids {
            call: args.call.clone(),
            ids: id_table(&reference, args.include_fuzzy),
        },
        Some(tag) => {
            let directory = args
                .directory
                .clone()
                .or_else(|| args.reference.parent().map(Path::to_path_buf))
                .unwrap_or_else(|| PathBuf::from("."));
            let path = directory.join(format!("{}.po", tag));
            let po = match fs::File::open(&path).map_err(|e| e.to_string()).and_then(|f| {
                PoFile::parse_from(std::io::BufReader::new(f)).map_err(|e| e.to_string())
            }) {
                Ok(po) => po,
                Err(msg) => {
                    eprintln!("msgsubst: {}: {}", path.display(), msg);
                    exit(1);
                }
            };
            Substitution::Literals {
                texts: text_table(&po),
            }
        }
    };

    let mut exit_code = 0;

    for path in &args.files {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                eprintln!("msgsubst: {}: {}", path.display(), e);
                exit_code = 1;
                continue;
            }
        };

        let (rewritten, count) = match substitute(&content, &subst) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("msgsubst: {}: {}", path.display(), e);
                exit_code = 1;
                continue;
            }
        };

        if args.in_place {
            if count > 0 {
                if let Err(e) = fs::write(path, &rewritten) {
                    eprintln!("msgsubst: {}: {}", path.display(), e);
                    exit_code = 1;
                }
            }
        } else {
            print!("{}", rewritten);
        }
    }

    exit(exit_code);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference() -> PoFile {
        PoFile::parse(
            "msgid \"Cancel\"\nmsgstr \"\"\n\n\
             msgid \"Open\"\nmsgstr \"\"\n\n\
             msgctxt \"menu\"\nmsgid \"File\"\nmsgstr \"\"\n",
        )
        .unwrap()
    }

    #[test]
    fn test_id_table_matches_builder_order() {
        let ids = id_table(&reference(), false);
        assert_eq!(ids.get("Cancel"), Some(&1));
        assert_eq!(ids.get("Open"), Some(&2));
        // contexted keys are not substitutable but still consume id 3
        assert_eq!(ids.get("File"), None);
    }

    #[test]
    fn test_substitute_ids() {
        let subst = Substitution::Ids {
            call: "msg".to_string(),
            ids: id_table(&reference(), false),
        };
        let source = "fn main() {\n    println!(\"{}\", \"Cancel\");\n    let s = \"Unknown\";\n}\n";
        let (out, count) = substitute(source, &subst).unwrap();
        assert_eq!(count, 1);
        assert!(out.contains("println!(\"{}\", msg(1))"));
        assert!(out.contains("let s = \"Unknown\";"));
    }

    #[test]
    fn test_substitute_literals() {
        let mut texts = HashMap::new();
        texts.insert("Cancel".to_string(), "Abbrechen".to_string());
        let subst = Substitution::Literals { texts };
        let source = "fn main() { let c = \"Cancel\"; }\n";
        let (out, count) = substitute(source, &subst).unwrap();
        assert_eq!(count, 1);
        assert!(out.contains("let c = \"Abbrechen\";"));
    }

    #[test]
    fn test_substitute_escapes_translation() {
        let mut texts = HashMap::new();
        texts.insert("Hi".to_string(), "line\n\"quoted\"".to_string());
        let subst = Substitution::Literals { texts };
        let source = "fn main() { let c = \"Hi\"; }\n";
        let (out, _) = substitute(source, &subst).unwrap();
        assert!(out.contains("\"line\\n\\\"quoted\\\"\""));
    }

    #[test]
    fn test_substitute_custom_call() {
        let subst = Substitution::Ids {
            call: "tr".to_string(),
            ids: id_table(&reference(), false),
        };
        let source = "fn main() { let c = \"Open\"; }\n";
        let (out, _) = substitute(source, &subst).unwrap();
        assert!(out.contains("let c = tr(2);"));
    }

    #[test]
    fn test_parse_error_reported() {
        let subst = Substitution::Ids {
            call: "msg".to_string(),
            ids: HashMap::new(),
        };
        assert!(substitute("fn main( {", &subst).is_err());
    }
}
