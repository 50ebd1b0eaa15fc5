//! Merge generated test code into a source file.
//!
//! Locating the existing test module is purely textual: braces are counted
//! on raw lines, so a `{` or `}` inside a string or comment within the test
//! module can move the insertion point. Candidates that end up malformed are
//! rejected by the build step and rolled back by the validator.

use std::sync::OnceLock;

use regex::Regex;

/// Attribute that opens a test module.
pub const TEST_MODULE_MARKER: &str = "#[cfg(test)]";

fn mod_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(?:pub(?:\([^)]*\))?\s+)?mod\s+([A-Za-z_][A-Za-z0-9_]*)")
            .expect("valid regex")
    })
}

/// Where generated code goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertionPoint {
    /// Insert immediately before this (0-based) line, the test module's closing brace.
    BeforeLine(usize),
    /// No usable test module: append a new one.
    Append,
}

/// Find the closing-brace line of the first inline test module.
///
/// A marker only counts when it is followed by a `mod` declaration with a
/// body, either on the same line or after any blank, attribute or comment
/// lines. Depth tracking starts on the declaration line; the module ends on
/// the first line where the running depth is back to zero and the line
/// holds a `}`.
pub fn locate_insertion(lines: &[&str]) -> InsertionPoint {
    (0..lines.len())
        .filter(|&i| lines[i].contains(TEST_MODULE_MARKER))
        .find_map(|i| module_close(lines, i))
        .map_or(InsertionPoint::Append, InsertionPoint::BeforeLine)
}

/// Drop leading single-line attributes such as `#[allow(dead_code)]`.
fn strip_attributes(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim_start();
        if !trimmed.starts_with("#[") {
            return trimmed;
        }
        match trimmed.find(']') {
            Some(end) => text = &trimmed[end + 1..],
            None => return trimmed,
        }
    }
}

/// Lines allowed between the marker and the `mod` declaration.
fn is_preamble(line: &str) -> bool {
    let rest = strip_attributes(line);
    rest.is_empty() || rest.starts_with("//")
}

fn module_close(lines: &[&str], marker: usize) -> Option<usize> {
    let after_marker = lines[marker]
        .split_once(TEST_MODULE_MARKER)
        .map(|(_, rest)| rest)
        .unwrap_or_default();

    let decl_line = if mod_decl().is_match(strip_attributes(after_marker)) {
        marker
    } else {
        if !is_preamble(after_marker) {
            return None;
        }
        let next = (marker + 1..lines.len()).find(|&j| !is_preamble(lines[j]))?;
        if !mod_decl().is_match(strip_attributes(lines[next])) {
            return None;
        }
        next
    };

    let mut depth: i64 = 0;
    let mut open_line = None;
    for (j, line) in lines.iter().enumerate().skip(decl_line) {
        let opens = line.matches('{').count() as i64;
        let closes = line.matches('}').count() as i64;
        if open_line.is_none() {
            if opens > 0 {
                open_line = Some(j);
            } else if line.trim_end().ends_with(';') {
                // `mod tests;` lives in another file
                return None;
            }
        }
        depth += opens - closes;
        if depth < 0 {
            return None;
        }
        if open_line.is_some() && depth == 0 && closes > 0 {
            // A module opened and closed on one line has no line to insert before.
            return (open_line != Some(j)).then_some(j);
        }
    }
    None
}

/// Merge `generated` test code into `original`.
///
/// With an existing test module the code is inserted as a new block right
/// before the module's closing line and every original line is kept
/// byte-for-byte. Otherwise a new `#[cfg(test)]` module is appended.
pub fn merge(original: &str, generated: &str) -> String {
    let generated = generated.trim_end_matches(&['\n', '\r'][..]);
    let lines: Vec<&str> = original.split('\n').collect();

    match locate_insertion(&lines) {
        InsertionPoint::BeforeLine(idx) => {
            let mut out: Vec<&str> = Vec::with_capacity(lines.len() + 2);
            out.extend_from_slice(&lines[..idx]);
            out.push("");
            out.push(generated);
            out.extend_from_slice(&lines[idx..]);
            out.join("\n")
        }
        InsertionPoint::Append => append_module(original, generated),
    }
}

fn append_module(original: &str, generated: &str) -> String {
    let name = if declares_module(original, "tests") {
        "generated_tests"
    } else {
        "tests"
    };

    let mut out = String::with_capacity(original.len() + generated.len() + 64);
    out.push_str(original);
    if !original.is_empty() {
        if !original.ends_with('\n') {
            out.push('\n');
        }
        out.push('\n');
    }
    out.push_str(TEST_MODULE_MARKER);
    out.push_str(&format!("\nmod {} {{\n    use super::*;\n\n", name));
    out.push_str(generated);
    out.push_str("\n}\n");
    out
}

fn declares_module(content: &str, name: &str) -> bool {
    content.lines().any(|line| {
        let decl = line
            .split_once(TEST_MODULE_MARKER)
            .map_or(line, |(_, rest)| rest);
        mod_decl()
            .captures(strip_attributes(decl))
            .and_then(|c| c.get(1))
            .is_some_and(|m| m.as_str() == name)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const GENERATED: &str = "    #[test]\n    fn test_new_case() {\n        assert_eq!(add(1, 1), 2);\n    }";

    #[test]
    fn test_append_when_no_marker() {
        let original = "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n";
        let merged = merge(original, GENERATED);

        assert!(merged.starts_with(original));
        assert_eq!(merged.matches(TEST_MODULE_MARKER).count(), 1);
        assert!(merged.contains("mod tests {\n    use super::*;\n"));
        assert!(merged.contains("fn test_new_case()"));
        assert!(merged.ends_with("}\n"));
    }

    #[test]
    fn test_append_without_trailing_newline() {
        let original = "pub fn one() -> u8 { 1 }";
        let merged = merge(original, GENERATED);
        assert!(merged.starts_with("pub fn one() -> u8 { 1 }\n\n#[cfg(test)]\nmod tests {"));
    }

    #[test]
    fn test_insert_before_module_close() {
        let original = "\
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        assert_eq!(add(2, 2), 4);
    }
}
";
        let merged = merge(original, GENERATED);
        let expected = "\
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add() {
        assert_eq!(add(2, 2), 4);
    }

    #[test]
    fn test_new_case() {
        assert_eq!(add(1, 1), 2);
    }
}
";
        assert_eq!(merged, expected);
    }

    #[test]
    fn test_insertion_point_skips_attribute_on_function() {
        let lines: Vec<&str> = "\
#[cfg(test)]
fn helper() {}

#[cfg(test)]
mod tests {
    #[test]
    fn t() {}
}"
        .split('\n')
        .collect();
        assert_eq!(locate_insertion(&lines), InsertionPoint::BeforeLine(7));
    }

    #[test]
    fn test_out_of_line_module_appends_generated_tests() {
        let original = "pub fn f() {}\n\n#[cfg(test)]\nmod tests;\n";
        let merged = merge(original, GENERATED);
        assert!(merged.starts_with(original));
        assert!(merged.contains("mod generated_tests {"));
    }

    #[test]
    fn test_single_line_module_appends() {
        let original = "#[cfg(test)] mod tests { #[test] fn t() {} }\n";
        let merged = merge(original, GENERATED);
        assert!(merged.starts_with(original));
        assert!(merged.contains("mod generated_tests {"));
    }

    #[test]
    fn test_nested_module_in_file() {
        let original = "\
mod outer {
    pub fn f() -> u8 { 1 }

    #[cfg(test)]
    mod tests {
        #[test]
        fn t() {}
    }
}
";
        let lines: Vec<&str> = original.split('\n').collect();
        assert_eq!(locate_insertion(&lines), InsertionPoint::BeforeLine(7));
    }

    #[test]
    fn test_insert_past_attributes_and_doc_comments() {
        let original = "\
pub fn f() {}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
/// Unit tests for `f`.
mod tests {
    use super::*;

    #[test]
    fn t() {}
}
";
        let merged = merge(original, "    #[test]\n    fn added() {}");
        assert_eq!(merged.matches("mod ").count(), 1);
        assert!(!merged.contains("generated_tests"));
        assert!(merged.ends_with("    fn t() {}\n\n    #[test]\n    fn added() {}\n}\n"));
    }

    #[test]
    fn test_attribute_on_marker_line() {
        let lines: Vec<&str> = "#[cfg(test)] #[allow(unused)]\nmod tests {\n    fn t() {}\n}"
            .split('\n')
            .collect();
        assert_eq!(locate_insertion(&lines), InsertionPoint::BeforeLine(3));
    }

    #[test]
    fn test_trailing_newlines_of_generated_are_trimmed() {
        let original = "#[cfg(test)]\nmod tests {\n}\n";
        let merged = merge(original, "fn x() {}\n\n\n");
        assert_eq!(merged, "#[cfg(test)]\nmod tests {\n\nfn x() {}\n}\n");
    }
}
