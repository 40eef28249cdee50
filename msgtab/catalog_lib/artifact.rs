//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Compiled catalog artifact
//!
//! A [`Domain`] is the compiled representation of one package's
//! messages: an interned key blob with a dense 1-based offset table,
//! and one [`Translation`] record per shipped language, terminated by
//! a sentinel record with an empty tag. All text fields are
//! `Cow<'static, _>` so the same types serve builder output (owned)
//! and catalogs emitted as Rust source and linked into the
//! application (borrowed).
//!
//! Blob layout: offset 0 holds a reserved NUL so that offset 0 always
//! reads as the empty string. Each interned entry is a run of one or
//! more NUL-terminated sub-strings followed by one extra NUL, so a
//! plural form walk terminates inside the entry it started in.
//!
//! The binary encoding exists for tooling and tests; the runtime
//! never reads catalogs from disk.

use std::borrow::Cow;
use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::catalog_lib::postfix::{PluralRuleId, DEFAULT_RULE};

/// Magic number of the binary artifact ("mtab")
pub const TAB_MAGIC: u32 = 0x6d746162;

/// Current binary artifact revision
pub const TAB_VERSION: u32 = 1;

/// Fixed-size artifact file header
#[derive(Debug, Clone, Copy, bytemuck::NoUninit)]
#[repr(C)]
pub struct TabHeader {
    /// Magic number
    pub magic: u32,
    /// Format revision
    pub version: u32,
    /// Number of message keys
    pub nkeys: u32,
    /// Number of translation records (sentinel excluded)
    pub ntranslations: u32,
}

impl TabHeader {
    /// Size of the header in bytes
    pub const SIZE: usize = 16;
}

/// Per-language compiled message table
#[derive(Debug, Clone, PartialEq)]
pub struct Translation {
    /// Language tag (2-5 characters; empty marks the sentinel)
    pub lang: Cow<'static, str>,
    /// Canonical plural rule for this language
    pub rule: PluralRuleId,
    /// Per-message offsets into `blob`; length nkeys + 1, index 0
    /// unused. Offset 0 means no distinct translation is stored.
    pub offsets: Cow<'static, [u32]>,
    /// Bit-packed has-translation flags, distinguishing "equals
    /// source" (offset 0, bit set) from "missing" (offset 0, bit
    /// clear)
    pub present: Cow<'static, [u8]>,
    /// Interned translation text
    pub blob: Cow<'static, [u8]>,
}

impl Translation {
    /// The record terminating a domain's translation list
    pub const fn sentinel() -> Translation {
        Translation {
            lang: Cow::Borrowed(""),
            rule: DEFAULT_RULE,
            offsets: Cow::Borrowed(&[]),
            present: Cow::Borrowed(&[]),
            blob: Cow::Borrowed(&[]),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.lang.is_empty()
    }

    /// Stored offset for a message id, 0 when none
    pub fn offset(&self, id: usize) -> u32 {
        self.offsets.get(id).copied().unwrap_or(0)
    }

    /// Whether the language has this message at all (stored or elided)
    pub fn has_message(&self, id: usize) -> bool {
        bit_get(&self.present, id)
    }
}

/// Compiled message catalog for one package
#[derive(Debug, Clone, PartialEq)]
pub struct Domain {
    /// Package name
    pub name: Cow<'static, str>,
    /// Number of message keys; ids are 1..=nkeys
    pub nkeys: u32,
    /// Per-id offsets into `key_blob`; length nkeys + 1, index 0
    /// unused
    pub key_offsets: Cow<'static, [u32]>,
    /// Interned key text
    pub key_blob: Cow<'static, [u8]>,
    /// Translation records, sentinel-terminated
    pub translations: Cow<'static, [Translation]>,
}

impl Domain {
    /// Source text for a message id ("" when out of range)
    pub fn key_str(&self, id: usize) -> &str {
        let off = self.key_offsets.get(id).copied().unwrap_or(0);
        cstr_at(&self.key_blob, off as usize)
    }

    /// Translation records without the trailing sentinel
    pub fn languages(&self) -> impl Iterator<Item = &Translation> {
        self.translations.iter().take_while(|t| !t.is_sentinel())
    }
}

/// Error type for artifact encoding and decoding
#[derive(Debug)]
pub enum ArtifactError {
    /// Invalid magic number
    InvalidMagic(u32),
    /// Unsupported format revision
    UnsupportedVersion(u32),
    /// Structurally invalid data
    InvalidFormat(String),
    /// Unknown plural rule code
    BadRule(u8),
    /// I/O error
    Io(io::Error),
}

impl std::fmt::Display for ArtifactError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactError::InvalidMagic(magic) => {
                write!(f, "invalid magic number: 0x{:08x}", magic)
            }
            ArtifactError::UnsupportedVersion(v) => write!(f, "unsupported revision: {}", v),
            ArtifactError::InvalidFormat(msg) => write!(f, "invalid format: {}", msg),
            ArtifactError::BadRule(code) => write!(f, "unknown plural rule code: {}", code),
            ArtifactError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ArtifactError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ArtifactError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ArtifactError {
    fn from(e: io::Error) -> Self {
        ArtifactError::Io(e)
    }
}

/// Read the NUL-terminated string starting at `offset`
pub(crate) fn cstr_at(blob: &[u8], offset: usize) -> &str {
    if offset >= blob.len() {
        return "";
    }
    let rest = &blob[offset..];
    let end = rest.iter().position(|b| *b == 0).unwrap_or(rest.len());
    std::str::from_utf8(&rest[..end]).unwrap_or("")
}

/// Walk to the idx-th NUL-joined sub-form of the entry at `offset`.
///
/// Interned entries end with an extra NUL, so walking past the last
/// form yields the empty string; `None` is returned in that case (no
/// stored form is ever empty).
pub(crate) fn nth_form(blob: &[u8], offset: usize, idx: usize) -> Option<&str> {
    let mut pos = offset;
    for _ in 0..idx {
        if pos >= blob.len() {
            return None;
        }
        match blob[pos..].iter().position(|b| *b == 0) {
            Some(nul) => pos += nul + 1,
            None => return None,
        }
    }
    let s = cstr_at(blob, pos);
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Test a bit in a packed flag array
pub(crate) fn bit_get(bits: &[u8], idx: usize) -> bool {
    bits.get(idx >> 3).is_some_and(|b| b & (1 << (idx & 7)) != 0)
}

/// Set a bit in a packed flag array
pub(crate) fn bit_set(bits: &mut [u8], idx: usize) {
    bits[idx >> 3] |= 1 << (idx & 7);
}

/// Number of bytes a packed flag array needs for nkeys + 1 slots
pub(crate) fn present_len(nkeys: u32) -> usize {
    (nkeys as usize + 1).div_ceil(8)
}

impl Domain {
    /// Encode to the binary artifact form
    pub fn write_to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        let ntranslations = self.languages().count() as u32;
        let header = TabHeader {
            magic: TAB_MAGIC,
            version: TAB_VERSION,
            nkeys: self.nkeys,
            ntranslations,
        };

        let mut data: Vec<u8> = Vec::new();
        data.extend_from_slice(bytemuck::bytes_of(&header));

        data.write_u32::<LittleEndian>(self.name.len() as u32)?;
        data.extend_from_slice(self.name.as_bytes());

        for off in self.key_offsets.iter() {
            data.write_u32::<LittleEndian>(*off)?;
        }
        data.write_u32::<LittleEndian>(self.key_blob.len() as u32)?;
        data.extend_from_slice(&self.key_blob);

        for tr in self.languages() {
            data.write_u8(tr.lang.len() as u8)?;
            data.extend_from_slice(tr.lang.as_bytes());
            data.write_u8(tr.rule.code())?;
            for off in tr.offsets.iter() {
                data.write_u32::<LittleEndian>(*off)?;
            }
            data.extend_from_slice(&tr.present);
            data.write_u32::<LittleEndian>(tr.blob.len() as u32)?;
            data.extend_from_slice(&tr.blob);
        }

        // Sentinel record: a zero-length language tag
        data.write_u8(0)?;

        Ok(data)
    }

    /// Decode from the binary artifact form
    pub fn read(data: &[u8]) -> Result<Domain, ArtifactError> {
        if data.len() < TabHeader::SIZE {
            return Err(ArtifactError::InvalidFormat("file too small".to_string()));
        }

        let mut cur = Cursor::new(data);
        let magic = cur.read_u32::<LittleEndian>()?;
        if magic != TAB_MAGIC {
            return Err(ArtifactError::InvalidMagic(magic));
        }
        let version = cur.read_u32::<LittleEndian>()?;
        if version != TAB_VERSION {
            return Err(ArtifactError::UnsupportedVersion(version));
        }
        let nkeys = cur.read_u32::<LittleEndian>()?;
        let ntranslations = cur.read_u32::<LittleEndian>()?;

        let name = read_string(&mut cur)?;

        let mut key_offsets = Vec::with_capacity(nkeys as usize + 1);
        for _ in 0..=nkeys {
            key_offsets.push(cur.read_u32::<LittleEndian>()?);
        }
        let key_blob = read_blob(&mut cur)?;

        let mut translations = Vec::with_capacity(ntranslations as usize + 1);
        for _ in 0..ntranslations {
            let lang_len = cur.read_u8()? as usize;
            if lang_len == 0 {
                return Err(ArtifactError::InvalidFormat(
                    "unexpected sentinel record".to_string(),
                ));
            }
            let mut lang = vec![0u8; lang_len];
            cur.read_exact(&mut lang)?;
            let lang = String::from_utf8(lang)
                .map_err(|_| ArtifactError::InvalidFormat("language tag not UTF-8".to_string()))?;

            let rule_code = cur.read_u8()?;
            let rule =
                PluralRuleId::from_code(rule_code).ok_or(ArtifactError::BadRule(rule_code))?;

            let mut offsets = Vec::with_capacity(nkeys as usize + 1);
            for _ in 0..=nkeys {
                offsets.push(cur.read_u32::<LittleEndian>()?);
            }
            let mut present = vec![0u8; present_len(nkeys)];
            cur.read_exact(&mut present)?;
            let blob = read_blob(&mut cur)?;

            translations.push(Translation {
                lang: Cow::Owned(lang),
                rule,
                offsets: Cow::Owned(offsets),
                present: Cow::Owned(present),
                blob: Cow::Owned(blob),
            });
        }

        let sentinel = cur.read_u8()?;
        if sentinel != 0 {
            return Err(ArtifactError::InvalidFormat(
                "missing sentinel record".to_string(),
            ));
        }
        translations.push(Translation::sentinel());

        Ok(Domain {
            name: Cow::Owned(name),
            nkeys,
            key_offsets: Cow::Owned(key_offsets),
            key_blob: Cow::Owned(key_blob),
            translations: Cow::Owned(translations),
        })
    }

    /// Emit the domain as a Rust source file defining a static that
    /// can be linked directly into the host application.
    pub fn emit_rust(&self) -> String {
        let mut out = String::new();
        out.push_str("// Generated by tabgen. Do not edit.\n\n");
        out.push_str("use std::borrow::Cow;\n\n");
        out.push_str("use msgtab::catalog_lib::artifact::{Domain, Translation};\n");
        out.push_str("use msgtab::catalog_lib::postfix::PluralRuleId;\n\n");

        let ident = static_ident(&self.name);
        out.push_str(&format!("pub static {}: Domain = Domain {{\n", ident));
        out.push_str(&format!("    name: Cow::Borrowed({:?}),\n", self.name));
        out.push_str(&format!("    nkeys: {},\n", self.nkeys));
        out.push_str(&format!(
            "    key_offsets: Cow::Borrowed(&{:?}),\n",
            self.key_offsets.as_ref()
        ));
        out.push_str(&format!(
            "    key_blob: Cow::Borrowed({}),\n",
            byte_literal(&self.key_blob)
        ));
        out.push_str("    translations: Cow::Borrowed(&[\n");
        for tr in self.languages() {
            out.push_str("        Translation {\n");
            out.push_str(&format!("            lang: Cow::Borrowed({:?}),\n", tr.lang));
            out.push_str(&format!("            rule: PluralRuleId::{:?},\n", tr.rule));
            out.push_str(&format!(
                "            offsets: Cow::Borrowed(&{:?}),\n",
                tr.offsets.as_ref()
            ));
            out.push_str(&format!(
                "            present: Cow::Borrowed(&{:?}),\n",
                tr.present.as_ref()
            ));
            out.push_str(&format!(
                "            blob: Cow::Borrowed({}),\n",
                byte_literal(&tr.blob)
            ));
            out.push_str("        },\n");
        }
        out.push_str("        Translation::sentinel(),\n");
        out.push_str("    ]),\n");
        out.push_str("};\n");
        out
    }
}

fn read_string(cur: &mut Cursor<&[u8]>) -> Result<String, ArtifactError> {
    let bytes = read_blob(cur)?;
    String::from_utf8(bytes)
        .map_err(|_| ArtifactError::InvalidFormat("string not UTF-8".to_string()))
}

fn read_blob(cur: &mut Cursor<&[u8]>) -> Result<Vec<u8>, ArtifactError> {
    let len = cur.read_u32::<LittleEndian>()? as usize;
    let mut bytes = vec![0u8; len];
    cur.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Static identifier for an emitted domain (e.g. "demo" -> DOMAIN_DEMO)
fn static_ident(name: &str) -> String {
    let mut ident = String::from("DOMAIN_");
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            ident.push(c.to_ascii_uppercase());
        } else {
            ident.push('_');
        }
    }
    ident
}

/// Format bytes as a Rust byte-string literal
fn byte_literal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() + 4);
    out.push_str("b\"");
    for b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            0x20..=0x7e => out.push(*b as char),
            _ => out.push_str(&format!("\\x{:02x}", b)),
        }
    }
    out.push('"');
    out
}
