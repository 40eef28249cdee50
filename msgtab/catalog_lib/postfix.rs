//
// Copyright (c) 2026 Jeff Garzik
//
// This file is part of the msgtab project covered under
// the MIT License.  For the full license text, please see the LICENSE
// file in the root directory of this project.
// SPDX-License-Identifier: MIT
//

//! Compiled plural expressions and the canonical rule catalog
//!
//! A parsed plural formula is flattened once into a postfix token
//! string that a small fixed-stack machine can evaluate without the
//! AST. Canonicalization prints the declared formula to this form and
//! matches it, byte for byte, against `CANONICAL_RULES` - the single
//! authoritative list of known plural rules. Only the matched rule's
//! identifier is stored in the compiled catalog; the runtime maps a
//! quantity to a form index through [`PluralRuleId::index`], a fixed
//! match statement kept in sync with the table by exhaustive tests.
//!
//! Postfix notation: space-separated tokens. `n` and decimal literals
//! stand for themselves; operators are single-character codes:
//!
//! `* / % + -` as themselves, `{` `}` for `<<` `>>`, `<` `>` as
//! themselves, `l` `g` for `<=` `>=`, `=` `!` for `==` `!=`,
//! `a` `^` `o` for bitwise `&` `^` `|`, `&` `|` for `&&` `||`,
//! `N` `~` `M` for unary `!` `~` `-`, and `?` for the ternary select.

use crate::catalog_lib::plural::{
    apply_binary, apply_unary, BinaryOp, EvalError, PluralExpr, UnaryOp, MAX_EVAL_DEPTH,
};

/// Values of `n` exercised by the canonicalization self-test.
pub const SELF_TEST_LIMIT: u64 = 200;

/// Identifier of a canonical plural rule.
///
/// The names follow the language family each rule is best known from;
/// every variant covers many languages. The discriminants are part of
/// the compiled artifact encoding and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PluralRuleId {
    /// One form for everything (CJK, Vietnamese, Thai)
    SingleForm = 0,
    /// Two forms, singular for n == 1 (English, German, Dutch, ...)
    Germanic = 1,
    /// Two forms, singular for n <= 1 (French, Brazilian Portuguese)
    Romanic = 2,
    /// Two forms, singular for 1, 21, 31, ... except 11 (Icelandic)
    Icelandic = 3,
    /// Two forms, singular when n or its last digit is 1 (Macedonian)
    Macedonian = 4,
    /// Three forms with a distinct zero form (Latvian)
    Latvian = 5,
    /// Three forms: one, two, other (Irish)
    Irish = 6,
    /// Three forms with a 1..19 band (Romanian)
    Romanian = 7,
    /// Three forms (Lithuanian)
    Lithuanian = 8,
    /// Three forms (Russian, Ukrainian, Serbian, Croatian)
    EastSlavic = 9,
    /// Three forms: 1 / 2-4 / other (Czech, Slovak)
    WestSlavic = 10,
    /// Three forms (Polish)
    Polish = 11,
    /// Four forms keyed on n % 100 (Slovenian)
    Slovenian = 12,
    /// Four forms (Scottish Gaelic)
    ScottishGaelic = 13,
    /// Four forms (Welsh)
    Welsh = 14,
    /// Four forms (Maltese)
    Maltese = 15,
    /// Six forms (Arabic)
    Arabic = 16,
}

/// The rule applied when a header declares no plural formula.
pub const DEFAULT_RULE: PluralRuleId = PluralRuleId::Germanic;

impl PluralRuleId {
    /// Number of plural forms this rule selects between.
    pub fn nplurals(self) -> usize {
        match self {
            PluralRuleId::SingleForm => 1,
            PluralRuleId::Germanic
            | PluralRuleId::Romanic
            | PluralRuleId::Icelandic
            | PluralRuleId::Macedonian => 2,
            PluralRuleId::Latvian
            | PluralRuleId::Irish
            | PluralRuleId::Romanian
            | PluralRuleId::Lithuanian
            | PluralRuleId::EastSlavic
            | PluralRuleId::WestSlavic
            | PluralRuleId::Polish => 3,
            PluralRuleId::Slovenian
            | PluralRuleId::ScottishGaelic
            | PluralRuleId::Welsh
            | PluralRuleId::Maltese => 4,
            PluralRuleId::Arabic => 6,
        }
    }

    /// Map a quantity to a plural-form index in `[0, nplurals)`.
    ///
    /// This is the allocation-free runtime twin of the compiled-form
    /// evaluator. Tests check it against every `CANONICAL_RULES` entry
    /// for all n below SELF_TEST_LIMIT.
    pub fn index(self, n: u64) -> usize {
        let m10 = n % 10;
        let m100 = n % 100;
        match self {
            PluralRuleId::SingleForm => 0,
            PluralRuleId::Germanic => usize::from(n != 1),
            PluralRuleId::Romanic => usize::from(n > 1),
            PluralRuleId::Icelandic => {
                if m10 == 1 && m100 != 11 {
                    0
                } else {
                    1
                }
            }
            PluralRuleId::Macedonian => {
                if n == 1 || m10 == 1 {
                    0
                } else {
                    1
                }
            }
            PluralRuleId::Latvian => {
                if m10 == 1 && m100 != 11 {
                    0
                } else if n != 0 {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::Irish => {
                if n == 1 {
                    0
                } else if n == 2 {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::Romanian => {
                if n == 1 {
                    0
                } else if n == 0 || (1..20).contains(&m100) {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::Lithuanian => {
                if m10 == 1 && m100 != 11 {
                    0
                } else if m10 >= 2 && !(10..20).contains(&m100) {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::EastSlavic => {
                if m10 == 1 && m100 != 11 {
                    0
                } else if (2..=4).contains(&m10) && !(12..=14).contains(&m100) {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::WestSlavic => {
                if n == 1 {
                    0
                } else if (2..=4).contains(&n) {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::Polish => {
                if n == 1 {
                    0
                } else if (2..=4).contains(&m10) && !(12..=14).contains(&m100) {
                    1
                } else {
                    2
                }
            }
            PluralRuleId::Slovenian => match m100 {
                1 => 0,
                2 => 1,
                3 | 4 => 2,
                _ => 3,
            },
            PluralRuleId::ScottishGaelic => {
                if n == 1 || n == 11 {
                    0
                } else if n == 2 || n == 12 {
                    1
                } else if n > 2 && n < 20 {
                    2
                } else {
                    3
                }
            }
            PluralRuleId::Welsh => {
                if n == 1 {
                    0
                } else if n == 2 {
                    1
                } else if n != 8 && n != 11 {
                    2
                } else {
                    3
                }
            }
            PluralRuleId::Maltese => {
                if n == 1 {
                    0
                } else if n == 0 || (2..=10).contains(&m100) {
                    1
                } else if (11..=19).contains(&m100) {
                    2
                } else {
                    3
                }
            }
            PluralRuleId::Arabic => {
                if n == 0 {
                    0
                } else if n == 1 {
                    1
                } else if n == 2 {
                    2
                } else if (3..=10).contains(&m100) {
                    3
                } else if m100 >= 11 {
                    4
                } else {
                    5
                }
            }
        }
    }

    /// Encoding used in the binary artifact.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Decode from the binary artifact encoding.
    pub fn from_code(code: u8) -> Option<PluralRuleId> {
        Some(match code {
            0 => PluralRuleId::SingleForm,
            1 => PluralRuleId::Germanic,
            2 => PluralRuleId::Romanic,
            3 => PluralRuleId::Icelandic,
            4 => PluralRuleId::Macedonian,
            5 => PluralRuleId::Latvian,
            6 => PluralRuleId::Irish,
            7 => PluralRuleId::Romanian,
            8 => PluralRuleId::Lithuanian,
            9 => PluralRuleId::EastSlavic,
            10 => PluralRuleId::WestSlavic,
            11 => PluralRuleId::Polish,
            12 => PluralRuleId::Slovenian,
            13 => PluralRuleId::ScottishGaelic,
            14 => PluralRuleId::Welsh,
            15 => PluralRuleId::Maltese,
            16 => PluralRuleId::Arabic,
            _ => return None,
        })
    }
}

/// One row of the canonical rule catalog.
#[derive(Debug, Clone, Copy)]
pub struct CanonicalRule {
    /// Rule identifier recorded in compiled catalogs
    pub rule: PluralRuleId,
    /// Declared plural-form count the row is valid for
    pub nplurals: usize,
    /// The formula in source (infix) notation
    pub formula: &'static str,
    /// The formula printed to postfix notation
    pub postfix: &'static str,
}

/// The authoritative catalog of recognized plural formulas.
///
/// Several rows share one `PluralRuleId`: translators spell the same
/// rule in different surface forms, and each known spelling gets its
/// own row so the exact-match canonicalization still recognizes it.
/// Everything else in this module (both evaluators, the runtime
/// dispatch) is tested against this one list.
pub static CANONICAL_RULES: [CanonicalRule; 29] = [
    CanonicalRule {
        rule: PluralRuleId::SingleForm,
        nplurals: 1,
        formula: "0",
        postfix: "0",
    },
    CanonicalRule {
        rule: PluralRuleId::Germanic,
        nplurals: 2,
        formula: "n != 1",
        postfix: "n 1 !",
    },
    CanonicalRule {
        rule: PluralRuleId::Germanic,
        nplurals: 2,
        formula: "n == 1 ? 0 : 1",
        postfix: "n 1 = 0 1 ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Germanic,
        nplurals: 2,
        formula: "n != 1 ? 1 : 0",
        postfix: "n 1 ! 1 0 ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Romanic,
        nplurals: 2,
        formula: "n > 1",
        postfix: "n 1 >",
    },
    CanonicalRule {
        rule: PluralRuleId::Romanic,
        nplurals: 2,
        formula: "n >= 2",
        postfix: "n 2 g",
    },
    CanonicalRule {
        rule: PluralRuleId::Romanic,
        nplurals: 2,
        formula: "n <= 1 ? 0 : 1",
        postfix: "n 1 l 0 1 ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Romanic,
        nplurals: 2,
        formula: "n > 1 ? 1 : 0",
        postfix: "n 1 > 1 0 ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Icelandic,
        nplurals: 2,
        formula: "n % 10 != 1 || n % 100 == 11",
        postfix: "n 10 % 1 ! n 100 % 11 = |",
    },
    CanonicalRule {
        rule: PluralRuleId::Icelandic,
        nplurals: 2,
        formula: "n % 10 == 1 && n % 100 != 11 ? 0 : 1",
        postfix: "n 10 % 1 = n 100 % 11 ! & 0 1 ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Macedonian,
        nplurals: 2,
        formula: "n == 1 || n % 10 == 1 ? 0 : 1",
        postfix: "n 1 = n 10 % 1 = | 0 1 ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Latvian,
        nplurals: 3,
        formula: "n % 10 == 1 && n % 100 != 11 ? 0 : n != 0 ? 1 : 2",
        postfix: "n 10 % 1 = n 100 % 11 ! & 0 n 0 ! 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Latvian,
        nplurals: 3,
        formula: "n % 10 == 1 && n % 100 != 11 ? 0 : n == 0 ? 2 : 1",
        postfix: "n 10 % 1 = n 100 % 11 ! & 0 n 0 = 2 1 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Irish,
        nplurals: 3,
        formula: "n == 1 ? 0 : n == 2 ? 1 : 2",
        postfix: "n 1 = 0 n 2 = 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Romanian,
        nplurals: 3,
        formula: "n == 1 ? 0 : n == 0 || n % 100 > 0 && n % 100 < 20 ? 1 : 2",
        postfix: "n 1 = 0 n 0 = n 100 % 0 > n 100 % 20 < & | 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Lithuanian,
        nplurals: 3,
        formula: "n % 10 == 1 && n % 100 != 11 ? 0 : n % 10 >= 2 && (n % 100 < 10 || n % 100 >= 20) ? 1 : 2",
        postfix: "n 10 % 1 = n 100 % 11 ! & 0 n 10 % 2 g n 100 % 10 < n 100 % 20 g | & 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::EastSlavic,
        nplurals: 3,
        formula: "n % 10 == 1 && n % 100 != 11 ? 0 : n % 10 >= 2 && n % 10 <= 4 && (n % 100 < 10 || n % 100 >= 20) ? 1 : 2",
        postfix: "n 10 % 1 = n 100 % 11 ! & 0 n 10 % 2 g n 10 % 4 l & n 100 % 10 < n 100 % 20 g | & 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::EastSlavic,
        nplurals: 3,
        formula: "n % 10 == 1 && n % 100 != 11 ? 0 : n % 10 >= 2 && n % 10 <= 4 && (n % 100 < 12 || n % 100 > 14) ? 1 : 2",
        postfix: "n 10 % 1 = n 100 % 11 ! & 0 n 10 % 2 g n 10 % 4 l & n 100 % 12 < n 100 % 14 > | & 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::WestSlavic,
        nplurals: 3,
        formula: "n == 1 ? 0 : n >= 2 && n <= 4 ? 1 : 2",
        postfix: "n 1 = 0 n 2 g n 4 l & 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::WestSlavic,
        nplurals: 3,
        formula: "n == 1 ? 0 : n == 2 || n == 3 || n == 4 ? 1 : 2",
        postfix: "n 1 = 0 n 2 = n 3 = | n 4 = | 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Polish,
        nplurals: 3,
        formula: "n == 1 ? 0 : n % 10 >= 2 && n % 10 <= 4 && (n % 100 < 10 || n % 100 >= 20) ? 1 : 2",
        postfix: "n 1 = 0 n 10 % 2 g n 10 % 4 l & n 100 % 10 < n 100 % 20 g | & 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Polish,
        nplurals: 3,
        formula: "n == 1 ? 0 : n % 10 >= 2 && n % 10 <= 4 && (n % 100 < 12 || n % 100 > 14) ? 1 : 2",
        postfix: "n 1 = 0 n 10 % 2 g n 10 % 4 l & n 100 % 12 < n 100 % 14 > | & 1 2 ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Slovenian,
        nplurals: 4,
        formula: "n % 100 == 1 ? 0 : n % 100 == 2 ? 1 : n % 100 == 3 || n % 100 == 4 ? 2 : 3",
        postfix: "n 100 % 1 = 0 n 100 % 2 = 1 n 100 % 3 = n 100 % 4 = | 2 3 ? ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Slovenian,
        nplurals: 4,
        formula: "n % 100 == 1 ? 0 : n % 100 == 2 ? 1 : n % 100 >= 3 && n % 100 <= 4 ? 2 : 3",
        postfix: "n 100 % 1 = 0 n 100 % 2 = 1 n 100 % 3 g n 100 % 4 l & 2 3 ? ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::ScottishGaelic,
        nplurals: 4,
        formula: "n == 1 || n == 11 ? 0 : n == 2 || n == 12 ? 1 : n > 2 && n < 20 ? 2 : 3",
        postfix: "n 1 = n 11 = | 0 n 2 = n 12 = | 1 n 2 > n 20 < & 2 3 ? ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Welsh,
        nplurals: 4,
        formula: "n == 1 ? 0 : n == 2 ? 1 : n != 8 && n != 11 ? 2 : 3",
        postfix: "n 1 = 0 n 2 = 1 n 8 ! n 11 ! & 2 3 ? ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Maltese,
        nplurals: 4,
        formula: "n == 1 ? 0 : n == 0 || n % 100 > 1 && n % 100 < 11 ? 1 : n % 100 > 10 && n % 100 < 20 ? 2 : 3",
        postfix: "n 1 = 0 n 0 = n 100 % 1 > n 100 % 11 < & | 1 n 100 % 10 > n 100 % 20 < & 2 3 ? ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Arabic,
        nplurals: 6,
        formula: "n == 0 ? 0 : n == 1 ? 1 : n == 2 ? 2 : n % 100 >= 3 && n % 100 <= 10 ? 3 : n % 100 >= 11 ? 4 : 5",
        postfix: "n 0 = 0 n 1 = 1 n 2 = 2 n 100 % 3 g n 100 % 10 l & 3 n 100 % 11 g 4 5 ? ? ? ? ?",
    },
    CanonicalRule {
        rule: PluralRuleId::Arabic,
        nplurals: 6,
        formula: "n == 0 ? 0 : n == 1 ? 1 : n == 2 ? 2 : n % 100 >= 3 && n % 100 <= 10 ? 3 : n % 100 >= 11 && n % 100 <= 99 ? 4 : 5",
        postfix: "n 0 = 0 n 1 = 1 n 2 = 2 n 100 % 3 g n 100 % 10 l & 3 n 100 % 11 g n 100 % 99 l & 4 5 ? ? ? ? ?",
    },
];

/// Error type for canonicalization
#[derive(Debug, Clone, PartialEq)]
pub enum CanonError {
    /// The formula is valid but matches no canonical rule
    Unsupported,
    /// The declared nplurals differs from the matched rule's count
    CountMismatch { declared: usize, canonical: usize },
    /// An evaluator faulted during the self-test
    Arithmetic(EvalError),
    /// The two evaluators disagreed during the self-test
    Disagreement { n: u64, tree: u64, stack: u64 },
    /// The formula produced an index outside [0, nplurals)
    FormOutOfRange { n: u64, index: u64 },
}

impl std::fmt::Display for CanonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonError::Unsupported => write!(f, "unsupported plural expression"),
            CanonError::CountMismatch {
                declared,
                canonical,
            } => write!(
                f,
                "declared nplurals={} but the matched rule has {} forms",
                declared, canonical
            ),
            CanonError::Arithmetic(e) => write!(f, "plural expression self-test: {}", e),
            CanonError::Disagreement { n, tree, stack } => write!(
                f,
                "plural evaluators disagree at n={} (tree={}, compiled={})",
                n, tree, stack
            ),
            CanonError::FormOutOfRange { n, index } => {
                write!(f, "plural expression yields form {} at n={}", index, n)
            }
        }
    }
}

impl std::error::Error for CanonError {}

impl From<EvalError> for CanonError {
    fn from(e: EvalError) -> Self {
        CanonError::Arithmetic(e)
    }
}

fn push_token(out: &mut String, tok: &str) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push_str(tok);
}

fn push_op(out: &mut String, op: char) {
    if !out.is_empty() {
        out.push(' ');
    }
    out.push(op);
}

fn unary_code(op: UnaryOp) -> char {
    match op {
        UnaryOp::Not => 'N',
        UnaryOp::BitNot => '~',
        UnaryOp::Neg => 'M',
    }
}

fn binary_code(op: BinaryOp) -> char {
    match op {
        BinaryOp::Mul => '*',
        BinaryOp::Div => '/',
        BinaryOp::Mod => '%',
        BinaryOp::Add => '+',
        BinaryOp::Sub => '-',
        BinaryOp::Shl => '{',
        BinaryOp::Shr => '}',
        BinaryOp::Lt => '<',
        BinaryOp::Le => 'l',
        BinaryOp::Gt => '>',
        BinaryOp::Ge => 'g',
        BinaryOp::Eq => '=',
        BinaryOp::Ne => '!',
        BinaryOp::BitAnd => 'a',
        BinaryOp::BitXor => '^',
        BinaryOp::BitOr => 'o',
        BinaryOp::And => '&',
        BinaryOp::Or => '|',
    }
}

/// Print an expression to its postfix form.
pub fn to_postfix(expr: &PluralExpr) -> Result<String, EvalError> {
    let mut out = String::new();
    print_node(expr, &mut out, 0)?;
    Ok(out)
}

fn print_node(expr: &PluralExpr, out: &mut String, depth: usize) -> Result<(), EvalError> {
    if depth >= MAX_EVAL_DEPTH {
        return Err(EvalError::TooDeep);
    }
    match expr {
        PluralExpr::N => push_token(out, "n"),
        PluralExpr::Literal(v) => push_token(out, &v.to_string()),
        PluralExpr::Unary(op, e) => {
            print_node(e, out, depth + 1)?;
            push_op(out, unary_code(*op));
        }
        PluralExpr::Binary(l, op, r) => {
            print_node(l, out, depth + 1)?;
            print_node(r, out, depth + 1)?;
            push_op(out, binary_code(*op));
        }
        PluralExpr::Ternary(c, t, f) => {
            print_node(c, out, depth + 1)?;
            print_node(t, out, depth + 1)?;
            print_node(f, out, depth + 1)?;
            push_token(out, "?");
        }
    }
    Ok(())
}

/// Evaluate a postfix token string with a fixed-size stack machine.
///
/// The stack depth bound matches the tree evaluator's recursion bound.
/// All operands are computed before their operator applies, so there
/// is no short-circuiting here either.
pub fn eval_postfix(code: &str, n: u64) -> Result<u64, EvalError> {
    let mut stack = [0u64; MAX_EVAL_DEPTH];
    let mut sp: usize = 0;

    for tok in code.split_ascii_whitespace() {
        let first = match tok.chars().next() {
            Some(c) => c,
            None => continue,
        };

        if tok == "n" {
            push(&mut stack, &mut sp, n)?;
            continue;
        }
        if first.is_ascii_digit() {
            let v: u64 = tok.parse().map_err(|_| EvalError::Malformed)?;
            push(&mut stack, &mut sp, v)?;
            continue;
        }
        if tok.len() != 1 {
            return Err(EvalError::Malformed);
        }

        match first {
            '?' => {
                let f = pop(&stack, &mut sp)?;
                let t = pop(&stack, &mut sp)?;
                let c = pop(&stack, &mut sp)?;
                push(&mut stack, &mut sp, if c != 0 { t } else { f })?;
            }
            'N' => {
                let v = pop(&stack, &mut sp)?;
                push(&mut stack, &mut sp, apply_unary(UnaryOp::Not, v))?;
            }
            '~' => {
                let v = pop(&stack, &mut sp)?;
                push(&mut stack, &mut sp, apply_unary(UnaryOp::BitNot, v))?;
            }
            'M' => {
                let v = pop(&stack, &mut sp)?;
                push(&mut stack, &mut sp, apply_unary(UnaryOp::Neg, v))?;
            }
            _ => {
                let op = match first {
                    '*' => BinaryOp::Mul,
                    '/' => BinaryOp::Div,
                    '%' => BinaryOp::Mod,
                    '+' => BinaryOp::Add,
                    '-' => BinaryOp::Sub,
                    '{' => BinaryOp::Shl,
                    '}' => BinaryOp::Shr,
                    '<' => BinaryOp::Lt,
                    'l' => BinaryOp::Le,
                    '>' => BinaryOp::Gt,
                    'g' => BinaryOp::Ge,
                    '=' => BinaryOp::Eq,
                    '!' => BinaryOp::Ne,
                    'a' => BinaryOp::BitAnd,
                    '^' => BinaryOp::BitXor,
                    'o' => BinaryOp::BitOr,
                    '&' => BinaryOp::And,
                    '|' => BinaryOp::Or,
                    _ => return Err(EvalError::Malformed),
                };
                let r = pop(&stack, &mut sp)?;
                let l = pop(&stack, &mut sp)?;
                push(&mut stack, &mut sp, apply_binary(op, l, r)?)?;
            }
        }
    }

    if sp == 1 {
        Ok(stack[0])
    } else {
        Err(EvalError::Malformed)
    }
}

fn push(stack: &mut [u64; MAX_EVAL_DEPTH], sp: &mut usize, v: u64) -> Result<(), EvalError> {
    if *sp >= MAX_EVAL_DEPTH {
        return Err(EvalError::TooDeep);
    }
    stack[*sp] = v;
    *sp += 1;
    Ok(())
}

fn pop(stack: &[u64; MAX_EVAL_DEPTH], sp: &mut usize) -> Result<u64, EvalError> {
    if *sp == 0 {
        return Err(EvalError::Malformed);
    }
    *sp -= 1;
    Ok(stack[*sp])
}

/// Canonicalize a parsed plural formula against the rule catalog.
///
/// Prints the expression to postfix, matches it exactly against
/// `CANONICAL_RULES`, verifies the declared form count, and runs both
/// evaluators over n below SELF_TEST_LIMIT before accepting the rule.
pub fn canonicalize(declared_nplurals: usize, expr: &PluralExpr) -> Result<PluralRuleId, CanonError> {
    let postfix = to_postfix(expr)?;

    let entry = CANONICAL_RULES
        .iter()
        .find(|r| r.postfix == postfix)
        .ok_or(CanonError::Unsupported)?;

    if entry.nplurals != declared_nplurals {
        return Err(CanonError::CountMismatch {
            declared: declared_nplurals,
            canonical: entry.nplurals,
        });
    }

    for n in 0..SELF_TEST_LIMIT {
        let tree = expr.evaluate(n)?;
        let stack = eval_postfix(&postfix, n)?;
        if tree != stack {
            return Err(CanonError::Disagreement { n, tree, stack });
        }
        if tree >= entry.nplurals as u64 {
            return Err(CanonError::FormOutOfRange { n, index: tree });
        }
    }

    Ok(entry.rule)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postfix_printing() {
        let expr = PluralExpr::parse("(n != 1)").unwrap();
        assert_eq!(to_postfix(&expr).unwrap(), "n 1 !");

        let expr = PluralExpr::parse(
            "n == 1 ? 0 : n % 10 >= 2 && n % 10 <= 4 && (n % 100 < 10 || n % 100 >= 20) ? 1 : 2",
        )
        .unwrap();
        assert_eq!(
            to_postfix(&expr).unwrap(),
            "n 1 = 0 n 10 % 2 g n 10 % 4 l & n 100 % 10 < n 100 % 20 g | & 1 2 ? ?"
        );

        // Parenthesization does not change the compiled form
        let bare = PluralExpr::parse("n != 1").unwrap();
        let wrapped = PluralExpr::parse("(((n != 1)))").unwrap();
        assert_eq!(to_postfix(&bare).unwrap(), to_postfix(&wrapped).unwrap());
    }

    #[test]
    fn test_stack_machine_basics() {
        assert_eq!(eval_postfix("n 1 !", 0), Ok(1));
        assert_eq!(eval_postfix("n 1 !", 1), Ok(0));
        assert_eq!(eval_postfix("n 1 = 0 1 ?", 1), Ok(0));
        assert_eq!(eval_postfix("n 1 = 0 1 ?", 3), Ok(1));
        assert_eq!(eval_postfix("n 0 /", 1), Err(EvalError::DivideByZero));
    }

    #[test]
    fn test_stack_machine_malformed() {
        assert_eq!(eval_postfix("", 0), Err(EvalError::Malformed));
        assert_eq!(eval_postfix("+", 0), Err(EvalError::Malformed));
        assert_eq!(eval_postfix("n n", 0), Err(EvalError::Malformed));
        assert_eq!(eval_postfix("n q", 0), Err(EvalError::Malformed));
        assert_eq!(eval_postfix("n xy", 0), Err(EvalError::Malformed));
    }

    #[test]
    fn test_stack_machine_overflow() {
        let mut code = String::new();
        for _ in 0..(MAX_EVAL_DEPTH + 1) {
            code.push_str("1 ");
        }
        assert_eq!(eval_postfix(&code, 0), Err(EvalError::TooDeep));
    }

    #[test]
    fn test_engines_agree_on_all_canonical_rules() {
        for entry in &CANONICAL_RULES {
            let expr = PluralExpr::parse(entry.formula)
                .unwrap_or_else(|e| panic!("{}: {}", entry.formula, e));
            for n in 0..SELF_TEST_LIMIT {
                let tree = expr.evaluate(n).unwrap();
                let stack = eval_postfix(entry.postfix, n).unwrap();
                assert_eq!(tree, stack, "{} at n={}", entry.formula, n);
                assert!(
                    tree < entry.nplurals as u64,
                    "{} yields form {} at n={}",
                    entry.formula,
                    tree,
                    n
                );
            }
        }
    }

    #[test]
    fn test_canonicalization_idempotent() {
        for entry in &CANONICAL_RULES {
            let expr = PluralExpr::parse(entry.formula).unwrap();
            assert_eq!(
                to_postfix(&expr).unwrap(),
                entry.postfix,
                "postfix drift for {}",
                entry.formula
            );
            assert_eq!(
                canonicalize(entry.nplurals, &expr),
                Ok(entry.rule),
                "canonicalization drift for {}",
                entry.formula
            );
        }
    }

    #[test]
    fn test_dispatch_matches_table() {
        for entry in &CANONICAL_RULES {
            assert_eq!(entry.rule.nplurals(), entry.nplurals, "{}", entry.formula);
            for n in 0..SELF_TEST_LIMIT {
                let compiled = eval_postfix(entry.postfix, n).unwrap();
                assert_eq!(
                    entry.rule.index(n) as u64,
                    compiled,
                    "{} at n={}",
                    entry.formula,
                    n
                );
            }
        }
    }

    #[test]
    fn test_unsupported_formula() {
        let expr = PluralExpr::parse("n + 1").unwrap();
        assert_eq!(canonicalize(2, &expr), Err(CanonError::Unsupported));

        // bitwise spelling is parseable but not canonical
        let expr = PluralExpr::parse("n & 1").unwrap();
        assert_eq!(canonicalize(2, &expr), Err(CanonError::Unsupported));
    }

    #[test]
    fn test_count_mismatch() {
        let expr = PluralExpr::parse("n != 1").unwrap();
        assert_eq!(
            canonicalize(3, &expr),
            Err(CanonError::CountMismatch {
                declared: 3,
                canonical: 2
            })
        );
    }

    #[test]
    fn test_rule_code_round_trip() {
        for entry in &CANONICAL_RULES {
            let code = entry.rule.code();
            assert_eq!(PluralRuleId::from_code(code), Some(entry.rule));
        }
        assert_eq!(PluralRuleId::from_code(200), None);
    }

    #[test]
    fn test_default_rule() {
        assert_eq!(DEFAULT_RULE, PluralRuleId::Germanic);
        assert_eq!(DEFAULT_RULE.nplurals(), 2);
        assert_eq!(DEFAULT_RULE.index(1), 0);
        assert_eq!(DEFAULT_RULE.index(0), 1);
        assert_eq!(DEFAULT_RULE.index(2), 1);
    }
}
