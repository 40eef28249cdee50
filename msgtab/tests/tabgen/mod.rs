//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use msgtab::catalog_lib::artifact::Domain;
use msgtab::catalog_lib::runtime::Registry;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tlib::testing::{run_test, run_test_base, TestPlan};

const REFERENCE: &str = r#"msgid ""
msgstr ""
"Content-Type: text/plain; charset=UTF-8\n"

msgid "Cancel"
msgstr ""

msgid "%d file"
msgid_plural "%d files"
msgstr[0] ""
msgstr[1] ""
"#;

const GERMAN: &str = r#"msgid ""
msgstr ""
"Content-Type: text/plain; charset=UTF-8\n"
"Language: de\n"
"Plural-Forms: nplurals=2; plural=(n != 1);\n"

msgid "Cancel"
msgstr "Abbrechen"

msgid "%d file"
msgid_plural "%d files"
msgstr[0] "%d Datei"
msgstr[1] "%d Dateien"
"#;

fn write_file(path: &Path, content: &str) {
    let mut file = File::create(path).unwrap();
    write!(file, "{}", content).unwrap();
}

/// Lay out a reference file, a language list, and language files
fn setup(languages: &[(&str, &str)]) -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let reference = temp_dir.path().join("demo.pot");
    write_file(&reference, REFERENCE);

    let linguas = temp_dir.path().join("LINGUAS");
    let list: String = languages
        .iter()
        .map(|(tag, _)| format!("{}\n", tag))
        .collect();
    write_file(&linguas, &format!("# shipped languages\n{}", list));

    for (tag, content) in languages {
        write_file(&temp_dir.path().join(format!("{}.po", tag)), content);
    }

    (temp_dir, reference, linguas)
}

#[test]
fn test_tabgen_compiles_and_runtime_serves() {
    let (temp_dir, reference, linguas) = setup(&[("de", GERMAN)]);
    let out = temp_dir.path().join("demo.mtb");

    run_test(TestPlan {
        cmd: String::from("tabgen"),
        args: vec![
            String::from("-l"),
            linguas.to_str().unwrap().to_string(),
            String::from("-n"),
            String::from("demo"),
            String::from("-o"),
            out.to_str().unwrap().to_string(),
            reference.to_str().unwrap().to_string(),
        ],
        stdin_data: String::new(),
        expected_out: String::new(),
        expected_err: String::new(),
        expected_exit_code: 0,
    });

    let domain = Domain::read(&fs::read(&out).unwrap()).unwrap();
    assert_eq!(domain.name, "demo");
    assert_eq!(domain.nkeys, 2);

    let mut reg = Registry::new();
    reg.register(domain);
    reg.set_locale("de_DE.UTF-8");
    assert_eq!(reg.translate(1), "Abbrechen");
    assert_eq!(reg.translate_plural(2, 2, 1), "%d Datei");
    assert_eq!(reg.translate_plural(2, 2, 3), "%d Dateien");

    reg.set_locale("fr_FR");
    assert_eq!(reg.translate(1), "Cancel");
    assert_eq!(reg.translate_plural(2, 2, 3), "%d files");
}

#[test]
fn test_tabgen_emits_rust_source() {
    let (temp_dir, reference, linguas) = setup(&[("de", GERMAN)]);
    let out = temp_dir.path().join("demo.rs");

    run_test(TestPlan {
        cmd: String::from("tabgen"),
        args: vec![
            String::from("-r"),
            String::from("-l"),
            linguas.to_str().unwrap().to_string(),
            String::from("-n"),
            String::from("demo"),
            String::from("-o"),
            out.to_str().unwrap().to_string(),
            reference.to_str().unwrap().to_string(),
        ],
        stdin_data: String::new(),
        expected_out: String::new(),
        expected_err: String::new(),
        expected_exit_code: 0,
    });

    let source = fs::read_to_string(&out).unwrap();
    assert!(source.contains("pub static DOMAIN_DEMO: Domain"));
    assert!(source.contains("PluralRuleId::Germanic"));
    assert!(source.contains("Translation::sentinel()"));
}

#[test]
fn test_tabgen_missing_reference_fails() {
    let output = run_test_base(
        "tabgen",
        &vec![String::from("/nonexistent/demo.pot")],
        b"",
    );
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("tabgen: /nonexistent/demo.pot:"));
}

#[test]
fn test_tabgen_broken_language_degrades() {
    let broken = "msgid \"Cancel\nmsgstr \"x\"\n";
    let (temp_dir, reference, linguas) = setup(&[("xx", broken), ("de", GERMAN)]);
    let out = temp_dir.path().join("demo.mtb");

    let output = run_test_base(
        "tabgen",
        &vec![
            String::from("-l"),
            linguas.to_str().unwrap().to_string(),
            String::from("-n"),
            String::from("demo"),
            String::from("-o"),
            out.to_str().unwrap().to_string(),
            reference.to_str().unwrap().to_string(),
        ],
        b"",
    );

    // The broken language is reported but the build still ships German
    assert_eq!(output.status.code(), Some(0));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("xx"));

    let domain = Domain::read(&fs::read(&out).unwrap()).unwrap();
    let langs: Vec<&str> = domain.languages().map(|t| t.lang.as_ref()).collect();
    assert_eq!(langs, vec!["de"]);
}

#[test]
fn test_tabgen_deterministic_output() {
    let (temp_dir, reference, linguas) = setup(&[("de", GERMAN)]);
    let out_a = temp_dir.path().join("a.mtb");
    let out_b = temp_dir.path().join("b.mtb");

    for out in [&out_a, &out_b] {
        run_test(TestPlan {
            cmd: String::from("tabgen"),
            args: vec![
                String::from("-l"),
                linguas.to_str().unwrap().to_string(),
                String::from("-n"),
                String::from("demo"),
                String::from("-o"),
                out.to_str().unwrap().to_string(),
                reference.to_str().unwrap().to_string(),
            ],
            stdin_data: String::new(),
            expected_out: String::new(),
            expected_err: String::new(),
            expected_exit_code: 0,
        });
    }

    assert_eq!(fs::read(&out_a).unwrap(), fs::read(&out_b).unwrap());
}
