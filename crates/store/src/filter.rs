// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gitignore-compatible sibling filtering.
//!
//! Only direct-sibling semantics: each pattern is compiled once per
//! `.gitignore` file and matched against bare entry names in that
//! directory. No recursive `**` support.

use regex::Regex;

/// Compile one gitignore text into start-anchored patterns.
///
/// Per line: trim whitespace, strip leading/trailing `/`, escape `.` `[`
/// `]`, map `*` to `.*`. Comments and blanks are dropped; a line that still
/// fails to compile is logged and skipped.
pub fn compile(text: &str) -> Vec<Regex> {
    let mut patterns = Vec::new();
    for line in text.lines() {
        let line = line.trim().trim_matches('/');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let escaped = line
            .replace('.', r"\.")
            .replace('[', r"\[")
            .replace(']', r"\]")
            .replace('*', ".*");
        match Regex::new(&format!("^{escaped}")) {
            Ok(re) => patterns.push(re),
            Err(err) => tracing::error!(pattern = line, error = %err, "bad ignore pattern"),
        }
    }
    patterns
}

/// Retain the sibling names no pattern matches.
pub fn filter(names: Vec<String>, patterns: &[Regex]) -> Vec<String> {
    names
        .into_iter()
        .filter(|name| !patterns.iter().any(|re| re.is_match(name)))
        .collect()
}

#[cfg(test)]
#[path = "filter_tests.rs"]
mod tests;
