// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Human-readable chain visualizations for import graph failures.
//!
//! Both renderers keep the chain in the order it was accumulated while
//! linking: the root module first, the deepest importer last.

use std::fmt::Write;
use std::io;
use url::Url;

const REPEATED_MARKER: &str = "(*)";
const FAILED_MARKER: &str = "✗";

/// Render a circular import chain.
///
/// ```text
/// Circular dependency detected:
///      file:///app/a.js (*)
///   -> file:///app/b.js
///   => file:///app/a.js (*) closes the cycle
/// ```
pub fn render_circular(chain: &[Url], target: &Url) -> String {
    let mut out = String::from("Circular dependency detected:\n");

    for (i, module) in chain.iter().enumerate() {
        let edge = if i == 0 { "  " } else { "->" };
        let marker = if module == target {
            format!(" {REPEATED_MARKER}")
        } else {
            String::new()
        };
        let _ = writeln!(out, "  {edge} {module}{marker}");
    }

    let _ = write!(out, "  => {target} {REPEATED_MARKER} closes the cycle");
    out
}

/// Render the import path leading to an unreadable module.
///
/// ```text
/// Failed to read module:
///   file:///app/main.js
///   └─ file:///app/lib.js
///      └─ file:///app/missing.js ✗
///
/// No such file or directory (os error 2)
/// ```
pub fn render_file_read(chain: &[Url], target: &Url, cause: &io::Error) -> String {
    let mut out = String::from("Failed to read module:\n");

    let mut depth = 0;
    for module in chain {
        push_tree_line(&mut out, depth, module.as_str());
        depth += 1;
    }
    push_tree_line(&mut out, depth, &format!("{target} {FAILED_MARKER}"));

    let _ = write!(out, "\n{cause}");
    out
}

fn push_tree_line(out: &mut String, depth: usize, text: &str) {
    if depth == 0 {
        let _ = writeln!(out, "  {text}");
    } else {
        let indent = "   ".repeat(depth - 1);
        let _ = writeln!(out, "  {indent}└─ {text}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<Url> {
        list.iter().map(|s| Url::parse(s).unwrap()).collect()
    }

    #[test]
    fn test_circular_marks_repeated_entry_and_closing_edge() {
        let chain = urls(&["file:///app/main.js", "file:///app/a.js", "file:///app/b.js"]);
        let target = Url::parse("file:///app/a.js").unwrap();

        let rendered = render_circular(&chain, &target);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Circular dependency detected:");
        assert_eq!(lines[1], "     file:///app/main.js");
        assert_eq!(lines[2], "  -> file:///app/a.js (*)");
        assert_eq!(lines[3], "  -> file:///app/b.js");
        assert_eq!(lines[4], "  => file:///app/a.js (*) closes the cycle");
    }

    #[test]
    fn test_file_read_renders_tree() {
        let chain = urls(&["file:///app/main.js", "file:///app/lib.js"]);
        let target = Url::parse("file:///app/missing.js").unwrap();
        let cause = io::Error::new(io::ErrorKind::NotFound, "entity not found");

        let rendered = render_file_read(&chain, &target, &cause);
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[1], "  file:///app/main.js");
        assert_eq!(lines[2], "  └─ file:///app/lib.js");
        assert_eq!(lines[3], "     └─ file:///app/missing.js ✗");
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "entity not found");
    }

    #[test]
    fn test_file_read_of_entry_module() {
        let target = Url::parse("file:///app/main.js").unwrap();
        let cause = io::Error::new(io::ErrorKind::PermissionDenied, "denied");

        let rendered = render_file_read(&[], &target, &cause);
        assert!(rendered.contains("  file:///app/main.js ✗"));
    }
}
