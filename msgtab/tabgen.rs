//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! tabgen - compile message tables from translation source files
//!
//! Compiles a reference file plus the languages named in a language
//! list file into one linked-in catalog artifact. The reference file
//! is authoritative for message-id assignment, so its errors abort
//! the build; a broken language only drops that language.

use clap::Parser;
use msgtab::catalog_lib::builder::{
    build_domain, BuildOptions, Diagnostic, LanguageInput, PluralFallback,
};
use msgtab::catalog_lib::po_file::{PoEntry, PoFile};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::exit;

/// tabgen - compile message tables from translation source files
#[derive(Parser)]
#[command(version, about = "tabgen - compile message tables from translation source files")]
struct Args {
    #[arg(short = 'l', long = "linguas", help = "Language list file, one tag per line")]
    linguas: Option<PathBuf>,

    #[arg(short = 'd', help = "Directory containing TAG.po files (default: reference directory)")]
    directory: Option<PathBuf>,

    #[arg(short = 'n', long = "name", help = "Domain name (default: reference file stem)")]
    name: Option<String>,

    #[arg(short = 'o', long = "output-file", help = "Output file name")]
    output: Option<PathBuf>,

    #[arg(short = 'r', help = "Emit Rust source instead of the binary artifact")]
    rust_source: bool,

    #[arg(short = 'f', help = "Include fuzzy entries in the output")]
    include_fuzzy: bool,

    #[arg(short = 'c', help = "Run extra validation checks on the inputs")]
    check: bool,

    #[arg(short = 'v', help = "Verbose mode - print warnings")]
    verbose: bool,

    #[arg(long = "strict", help = "Drop a language on an unsupported plural formula")]
    strict: bool,

    #[arg(required = true, help = "Reference translation source file")]
    reference: PathBuf,
}

fn main() {
    let args = Args::parse();

    // The reference file has no fallback: any error here is fatal
    let reference = match parse_po(&args.reference) {
        Ok(po) => po,
        Err(msg) => {
            eprintln!("tabgen: {}: {}", args.reference.display(), msg);
            exit(1);
        }
    };

    let directory = args
        .directory
        .clone()
        .or_else(|| args.reference.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));

    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut languages: Vec<LanguageInput> = Vec::new();

    if let Some(ref linguas) = args.linguas {
        let tags = match read_language_list(linguas) {
            Ok(tags) => tags,
            Err(e) => {
                eprintln!("tabgen: {}: {}", linguas.display(), e);
                exit(1);
            }
        };

        for tag in tags {
            let path = directory.join(format!("{}.po", tag));
            match parse_po(&path) {
                Ok(po) => {
                    if args.verbose {
                        for w in &po.warnings {
                            eprintln!("{}:{}: warning: {}", path.display(), w.line, w.message);
                        }
                    }
                    if args.check {
                        for entry in po.message_entries() {
                            check_formats(&tag, entry, &mut diagnostics);
                        }
                    }
                    languages.push(LanguageInput { tag, po });
                }
                Err(msg) => {
                    // Per-language degradation: report and move on
                    diagnostics.push(Diagnostic {
                        lang: Some(tag),
                        line: None,
                        message: format!("{}: {}", path.display(), msg),
                        is_error: true,
                    });
                }
            }
        }
    }

    if args.verbose {
        for w in &reference.warnings {
            eprintln!(
                "{}:{}: warning: {}",
                args.reference.display(),
                w.line,
                w.message
            );
        }
    }

    let name = args.name.clone().unwrap_or_else(|| {
        args.reference
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "messages".to_string())
    });

    let options = BuildOptions {
        include_fuzzy: args.include_fuzzy,
        plural_fallback: if args.strict {
            PluralFallback::Drop
        } else {
            PluralFallback::DefaultRule
        },
    };

    let output = match build_domain(&name, &reference, &languages, &options) {
        Ok(output) => output,
        Err(e) => {
            eprintln!("tabgen: {}: {}", args.reference.display(), e);
            exit(1);
        }
    };
    diagnostics.extend(output.diagnostics);

    for diag in &diagnostics {
        if diag.is_error || args.verbose {
            eprintln!("tabgen: {}", diag);
        }
    }

    let out_path = args.output.clone().unwrap_or_else(|| {
        PathBuf::from(format!("{}.{}", name, if args.rust_source { "rs" } else { "mtb" }))
    });

    let result = if args.rust_source {
        write_output(&out_path, output.domain.emit_rust().as_bytes())
    } else {
        match output.domain.write_to_bytes() {
            Ok(bytes) => write_output(&out_path, &bytes),
            Err(e) => {
                eprintln!("tabgen: {}: {}", out_path.display(), e);
                exit(1);
            }
        }
    };

    if let Err(e) = result {
        eprintln!("tabgen: {}: {}", out_path.display(), e);
        exit(1);
    }
}

fn parse_po(path: &Path) -> Result<PoFile, String> {
    let file = File::open(path).map_err(|e| e.to_string())?;
    PoFile::parse_from(BufReader::new(file)).map_err(|e| e.to_string())
}

/// One tag per line; blank lines and # comments are skipped
fn read_language_list(path: &Path) -> Result<Vec<String>, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Compare printf-style format directive counts between a key and its
/// translations
fn check_formats(tag: &str, entry: &PoEntry, diagnostics: &mut Vec<Diagnostic>) {
    if !entry.flags.iter().any(|f| f == "c-format") {
        return;
    }

    let msgid_formats = count_format_specs(&entry.msgid);
    for (i, msgstr) in entry.msgstr.iter().enumerate() {
        if msgstr.is_empty() {
            continue;
        }
        let msgstr_formats = count_format_specs(msgstr);
        if msgid_formats != msgstr_formats {
            diagnostics.push(Diagnostic {
                lang: Some(tag.to_string()),
                line: Some(entry.line),
                message: format!(
                    "format specifications in msgid and msgstr{} differ",
                    if entry.msgstr.len() > 1 {
                        format!("[{}]", i)
                    } else {
                        String::new()
                    }
                ),
                is_error: false,
            });
        }
    }
}

/// Count printf-style format specifications
fn count_format_specs(s: &str) -> usize {
    let mut count = 0;
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '%' {
            match chars.peek() {
                Some('%') => {
                    chars.next(); // Skip %%
                }
                Some(_) => {
                    count += 1;
                    // Skip the format specification body
                    while let Some(&c) = chars.peek() {
                        if c.is_alphabetic() {
                            chars.next();
                            break;
                        }
                        chars.next();
                    }
                }
                None => {}
            }
        }
    }

    count
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), std::io::Error> {
    let mut file = File::create(path)?;
    file.write_all(bytes)
}
