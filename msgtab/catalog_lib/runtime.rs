//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Runtime lookup engine
//!
//! A [`Registry`] owns the compiled domains of a process and serves
//! all message lookups. It is an explicit value, not a global, so
//! tests and embedders construct isolated registries and decide where
//! to hold them.
//!
//! Registration, domain selection and locale matching are the only
//! mutating operations and are expected to run during start-up;
//! lookups take `&self`, never fail, and never allocate. A missing
//! domain, id, or translation falls back to the source text; id 0
//! returns the empty string without touching any table.

use crate::catalog_lib::artifact::{cstr_at, nth_form, Domain};

struct RegisteredDomain {
    domain: Domain,
    /// Index of the locale-matched translation record
    current: Option<usize>,
}

/// Process-wide domain registry and lookup engine
#[derive(Default)]
pub struct Registry {
    domains: Vec<RegisteredDomain>,
    active: Option<usize>,
    locale: String,
}

impl Registry {
    pub fn new() -> Registry {
        Registry {
            domains: Vec::new(),
            active: None,
            locale: String::new(),
        }
    }

    /// Register a compiled domain. A domain with the same name
    /// replaces the earlier registration; the first registered domain
    /// becomes the active one.
    pub fn register(&mut self, domain: Domain) {
        let current = match_translation(&domain, &self.locale);
        if let Some(slot) = self
            .domains
            .iter_mut()
            .find(|d| d.domain.name == domain.name)
        {
            slot.domain = domain;
            slot.current = current;
            return;
        }
        self.domains.push(RegisteredDomain { domain, current });
        if self.active.is_none() {
            self.active = Some(self.domains.len() - 1);
        }
    }

    /// Select the domain unqualified lookups use. Returns false (and
    /// changes nothing) when the name is unknown.
    pub fn select_domain(&mut self, name: &str) -> bool {
        match self.domains.iter().position(|d| d.domain.name == name) {
            Some(idx) => {
                self.active = Some(idx);
                true
            }
            None => false,
        }
    }

    /// Set the active locale and re-match every registered domain
    pub fn set_locale(&mut self, locale: &str) {
        self.locale = locale.to_string();
        for slot in &mut self.domains {
            slot.current = match_translation(&slot.domain, locale);
        }
    }

    fn domain_by_name(&self, name: &str) -> Option<&RegisteredDomain> {
        self.domains.iter().find(|d| d.domain.name == name)
    }

    fn active_domain(&self) -> Option<&RegisteredDomain> {
        self.active.and_then(|idx| self.domains.get(idx))
    }

    /// Look up a message in the active domain
    pub fn translate(&self, id: usize) -> &str {
        if id == 0 {
            return "";
        }
        match self.active_domain() {
            Some(slot) => lookup(slot, id),
            None => "",
        }
    }

    /// Look up a message in a named domain
    pub fn translate_in(&self, domain: &str, id: usize) -> &str {
        if id == 0 {
            return "";
        }
        match self.domain_by_name(domain) {
            Some(slot) => lookup(slot, id),
            None => "",
        }
    }

    /// Look up the source-language text of a message, ignoring the
    /// active locale
    pub fn translate_in_clocale(&self, domain: &str, id: usize) -> &str {
        if id == 0 {
            return "";
        }
        match self.domain_by_name(domain) {
            Some(slot) => slot.domain.key_str(id),
            None => "",
        }
    }

    /// Plural lookup in the active domain
    pub fn translate_plural(&self, sid: usize, pid: usize, n: u64) -> &str {
        if sid == 0 {
            return "";
        }
        match self.active_domain() {
            Some(slot) => lookup_plural(slot, sid, pid, n),
            None => "",
        }
    }

    /// Plural lookup in a named domain
    pub fn translate_plural_in(&self, domain: &str, sid: usize, pid: usize, n: u64) -> &str {
        if sid == 0 {
            return "";
        }
        match self.domain_by_name(domain) {
            Some(slot) => lookup_plural(slot, sid, pid, n),
            None => "",
        }
    }
}

/// First 5-character tag match, else first 2-character tag match
fn match_translation(domain: &Domain, locale: &str) -> Option<usize> {
    if locale.is_empty() || locale == "C" || locale == "POSIX" {
        return None;
    }

    for (idx, tr) in domain.languages().enumerate() {
        if tr.lang.len() == 5 && locale.get(0..5) == Some(tr.lang.as_ref()) {
            return Some(idx);
        }
    }
    for (idx, tr) in domain.languages().enumerate() {
        if tr.lang.len() == 2 && locale.get(0..2) == Some(tr.lang.as_ref()) {
            return Some(idx);
        }
    }
    None
}

/// O(1) plain lookup: offset-table indexing, no string comparison
fn lookup(slot: &RegisteredDomain, id: usize) -> &str {
    let domain = &slot.domain;
    if id > domain.nkeys as usize {
        return "";
    }
    if let Some(tr) = slot.current.and_then(|idx| domain.translations.get(idx)) {
        let off = tr.offset(id);
        if off != 0 {
            return cstr_at(&tr.blob, off as usize);
        }
    }
    domain.key_str(id)
}

/// Plural lookup: rule dispatch plus a NUL-joined form walk
fn lookup_plural<'a>(slot: &'a RegisteredDomain, sid: usize, pid: usize, n: u64) -> &'a str {
    let domain = &slot.domain;

    if sid <= domain.nkeys as usize {
        if let Some(tr) = slot.current.and_then(|idx| domain.translations.get(idx)) {
            let off = tr.offset(sid);
            if off != 0 {
                // Stored translation: its forms match the language's
                // declared count, so the rule index always lands
                let idx = tr.rule.index(n);
                if let Some(form) = nth_form(&tr.blob, off as usize, idx) {
                    return form;
                }
                return cstr_at(&tr.blob, off as usize);
            }
            if tr.has_message(sid) {
                // Translation equals source: select among the source
                // forms with the language's own rule
                let idx = tr.rule.index(n);
                let key_off = domain.key_offsets.get(sid).copied().unwrap_or(0);
                if let Some(form) = nth_form(&domain.key_blob, key_off as usize, idx) {
                    return form;
                }
            }
        }
    }

    // No translation registered: germanic default over the source
    // forms, with the second id as the plural fallback for call sites
    // whose singular key holds no second form
    if n == 1 {
        return domain.key_str(sid);
    }
    let key_off = domain.key_offsets.get(sid).copied().unwrap_or(0);
    match nth_form(&domain.key_blob, key_off as usize, 1) {
        Some(form) => form,
        None => domain.key_str(pid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog_lib::builder::{build_domain, BuildOptions, LanguageInput};
    use crate::catalog_lib::po_file::PoFile;

    const DE_HEADER: &str = "msgid \"\"\nmsgstr \"\"\n\
        \"Content-Type: text/plain; charset=UTF-8\\n\"\n\
        \"Language: de\\n\"\n\
        \"Plural-Forms: nplurals=2; plural=(n != 1);\\n\"\n\n";

    fn demo_domain() -> Domain {
        let reference = PoFile::parse(
            "msgid \"Cancel\"\nmsgstr \"\"\n\n\
             msgid \"OK\"\nmsgstr \"\"\n\n\
             msgid \"%d file\"\nmsgid_plural \"%d files\"\nmsgstr[0] \"\"\nmsgstr[1] \"\"\n",
        )
        .unwrap();
        let de = format!(
            "{}msgid \"Cancel\"\nmsgstr \"Abbrechen\"\n\n\
             msgid \"OK\"\nmsgstr \"OK\"\n\n\
             msgid \"%d file\"\nmsgid_plural \"%d files\"\n\
             msgstr[0] \"%d Datei\"\nmsgstr[1] \"%d Dateien\"\n",
            DE_HEADER
        );
        let languages = vec![LanguageInput {
            tag: "de".to_string(),
            po: PoFile::parse(&de).unwrap(),
        }];
        build_domain("demo", &reference, &languages, &BuildOptions::default())
            .unwrap()
            .domain
    }

    // Message ids follow reference order
    const ID_CANCEL: usize = 1;
    const ID_OK: usize = 2;
    const ID_FILES: usize = 3;

    #[test]
    fn test_scenario_a_locale_match_and_fallback() {
        let mut reg = Registry::new();
        reg.register(demo_domain());

        reg.set_locale("de_DE");
        assert_eq!(reg.translate(ID_CANCEL), "Abbrechen");

        reg.set_locale("fr_FR");
        assert_eq!(reg.translate(ID_CANCEL), "Cancel");
    }

    #[test]
    fn test_scenario_b_plural_dispatch() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");

        assert_eq!(reg.translate_plural(ID_FILES, ID_FILES, 0), "%d Dateien");
        assert_eq!(reg.translate_plural(ID_FILES, ID_FILES, 1), "%d Datei");
        assert_eq!(reg.translate_plural(ID_FILES, ID_FILES, 2), "%d Dateien");
    }

    #[test]
    fn test_plural_source_fallback() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("fr_FR");

        assert_eq!(reg.translate_plural(ID_FILES, ID_FILES, 1), "%d file");
        assert_eq!(reg.translate_plural(ID_FILES, ID_FILES, 5), "%d files");
    }

    #[test]
    fn test_elided_translation_reads_source() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");

        // "OK" was elided at build time; the lookup lands in the key blob
        assert_eq!(reg.translate(ID_OK), "OK");
    }

    #[test]
    fn test_id_zero_fast_path() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");

        assert_eq!(reg.translate(0), "");
        assert_eq!(reg.translate_plural(0, ID_FILES, 3), "");
    }

    #[test]
    fn test_out_of_range_id() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");

        assert_eq!(reg.translate(99), "");
    }

    #[test]
    fn test_empty_registry() {
        let reg = Registry::new();
        assert_eq!(reg.translate(1), "");
        assert_eq!(reg.translate_in("nowhere", 1), "");
        assert_eq!(reg.translate_plural(1, 2, 3), "");
    }

    #[test]
    fn test_c_locale_uses_source() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");
        reg.set_locale("C");

        assert_eq!(reg.translate(ID_CANCEL), "Cancel");
    }

    #[test]
    fn test_clocale_lookup_ignores_locale() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");

        assert_eq!(reg.translate_in("demo", ID_CANCEL), "Abbrechen");
        assert_eq!(reg.translate_in_clocale("demo", ID_CANCEL), "Cancel");
    }

    #[test]
    fn test_named_domain_lookup() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        reg.set_locale("de_DE");

        assert_eq!(reg.translate_in("demo", ID_CANCEL), "Abbrechen");
        assert_eq!(reg.translate_in("other", ID_CANCEL), "");
    }

    #[test]
    fn test_select_domain() {
        let mut reg = Registry::new();
        reg.register(demo_domain());
        let mut second = demo_domain();
        second.name = "second".into();
        reg.register(second);
        reg.set_locale("de_DE");

        assert!(reg.select_domain("second"));
        assert_eq!(reg.translate(ID_CANCEL), "Abbrechen");
        assert!(!reg.select_domain("missing"));
        assert_eq!(reg.translate(ID_CANCEL), "Abbrechen");
    }

    #[test]
    fn test_locale_set_before_registration() {
        let mut reg = Registry::new();
        reg.set_locale("de_DE");
        reg.register(demo_domain());

        assert_eq!(reg.translate(ID_CANCEL), "Abbrechen");
    }

    #[test]
    fn test_five_char_tag_preferred() {
        use crate::catalog_lib::artifact::Translation;
        use crate::catalog_lib::postfix::PluralRuleId;
        use std::borrow::Cow;

        let mut domain = demo_domain();
        // Prepend an Austrian variant whose sole difference is Cancel
        let mut translations: Vec<Translation> = domain.translations.to_vec();
        let mut at = translations[0].clone();
        at.lang = Cow::Borrowed("de_AT");
        at.rule = PluralRuleId::Germanic;
        at.blob = Cow::Borrowed(b"\0Passt scho\0\0");
        at.offsets = Cow::Owned(vec![0, 1, 0, 0]);
        at.present = Cow::Owned(vec![0b0000_0010]);
        translations.insert(1, at);
        domain.translations = Cow::Owned(translations);

        let mut reg = Registry::new();
        reg.register(domain);

        reg.set_locale("de_AT");
        assert_eq!(reg.translate(ID_CANCEL), "Passt scho");

        reg.set_locale("de_DE.UTF-8");
        assert_eq!(reg.translate(ID_CANCEL), "Abbrechen");
    }

    #[test]
    fn test_plural_pid_fallback_for_singular_key() {
        // Call sites rewritten from two separate literals pass two
        // distinct singular ids; the germanic default picks between them
        let mut reg = Registry::new();
        let reference = PoFile::parse(
            "msgid \"one page\"\nmsgstr \"\"\n\nmsgid \"many pages\"\nmsgstr \"\"\n",
        )
        .unwrap();
        let out = build_domain("pages", &reference, &[], &BuildOptions::default()).unwrap();
        reg.register(out.domain);

        assert_eq!(reg.translate_plural(1, 2, 1), "one page");
        assert_eq!(reg.translate_plural(1, 2, 4), "many pages");
    }
}
