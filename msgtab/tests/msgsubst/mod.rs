//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tlib::testing::{run_test, TestPlan};

const REFERENCE: &str = r#"msgid "Cancel"
msgstr ""

msgid "Open"
msgstr ""
"#;

const GERMAN: &str = r#"msgid ""
msgstr ""
"Content-Type: text/plain; charset=UTF-8\n"
"Language: de\n"

msgid "Cancel"
msgstr "Abbrechen"
"#;

const SOURCE: &str = r#"fn main() {
    let cancel = "Cancel";
    let open = "Open";
    let other = "Untranslated";
    println!("{} {} {}", cancel, open, other);
}
"#;

fn write_file(path: &Path, content: &str) {
    let mut file = File::create(path).unwrap();
    write!(file, "{}", content).unwrap();
}

fn setup() -> (TempDir, PathBuf, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let reference = temp_dir.path().join("demo.pot");
    write_file(&reference, REFERENCE);
    write_file(&temp_dir.path().join("de.po"), GERMAN);
    let source = temp_dir.path().join("main.rs");
    write_file(&source, SOURCE);
    (temp_dir, reference, source)
}

#[test]
fn test_msgsubst_id_mode() {
    let (_temp_dir, reference, source) = setup();

    let expected = SOURCE
        .replace("\"Cancel\"", "msg(1)")
        .replace("\"Open\"", "msg(2)");

    run_test(TestPlan {
        cmd: String::from("msgsubst"),
        args: vec![
            reference.to_str().unwrap().to_string(),
            source.to_str().unwrap().to_string(),
        ],
        stdin_data: String::new(),
        expected_out: expected,
        expected_err: String::new(),
        expected_exit_code: 0,
    });
}

#[test]
fn test_msgsubst_custom_call_name() {
    let (_temp_dir, reference, source) = setup();

    let expected = SOURCE
        .replace("\"Cancel\"", "tr(1)")
        .replace("\"Open\"", "tr(2)");

    run_test(TestPlan {
        cmd: String::from("msgsubst"),
        args: vec![
            String::from("-k"),
            String::from("tr"),
            reference.to_str().unwrap().to_string(),
            source.to_str().unwrap().to_string(),
        ],
        stdin_data: String::new(),
        expected_out: expected,
        expected_err: String::new(),
        expected_exit_code: 0,
    });
}

#[test]
fn test_msgsubst_single_language_mode() {
    let (_temp_dir, reference, source) = setup();

    // "Open" has no German translation and stays a literal
    let expected = SOURCE.replace("\"Cancel\"", "\"Abbrechen\"");

    run_test(TestPlan {
        cmd: String::from("msgsubst"),
        args: vec![
            String::from("-l"),
            String::from("de"),
            reference.to_str().unwrap().to_string(),
            source.to_str().unwrap().to_string(),
        ],
        stdin_data: String::new(),
        expected_out: expected,
        expected_err: String::new(),
        expected_exit_code: 0,
    });
}

#[test]
fn test_msgsubst_in_place() {
    let (_temp_dir, reference, source) = setup();

    run_test(TestPlan {
        cmd: String::from("msgsubst"),
        args: vec![
            String::from("-i"),
            reference.to_str().unwrap().to_string(),
            source.to_str().unwrap().to_string(),
        ],
        stdin_data: String::new(),
        expected_out: String::new(),
        expected_err: String::new(),
        expected_exit_code: 0,
    });

    let rewritten = fs::read_to_string(&source).unwrap();
    assert!(rewritten.contains("let cancel = msg(1);"));
    assert!(rewritten.contains("let open = msg(2);"));
    assert!(rewritten.contains("let other = \"Untranslated\";"));
}
