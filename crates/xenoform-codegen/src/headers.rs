//! Header grouping.
//!
//! Headers are emitted in four groups, in this order:
//!
//! 1. anything that does not look like a header (inline code, macros)
//! 2. local headers: `"local.h"`, `"local.hpp"`
//! 3. third-party headers: `<lib/header.h>`, always ending with
//!    `<pybind11/pybind11.h>`
//! 4. system headers: `<vector>`
//!
//! Each group keeps first-seen order and drops exact duplicates.

use std::fmt::Write as _;

use rustc_hash::FxHashSet;

/// The binding framework's main header. Must follow its companion headers.
pub const PYBIND11_HEADER: &str = "<pybind11/pybind11.h>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeaderKind {
    Other,
    Local,
    ThirdParty,
    System,
}

fn has_header_suffix(name: &str) -> bool {
    name.ends_with(".h") || name.ends_with(".hpp")
}

fn classify(header: &str) -> HeaderKind {
    if let Some(inner) = header.strip_prefix('"').and_then(|h| h.strip_suffix('"')) {
        if has_header_suffix(inner) {
            return HeaderKind::Local;
        }
    } else if let Some(inner) = header.strip_prefix('<').and_then(|h| h.strip_suffix('>')) {
        if has_header_suffix(inner) {
            return HeaderKind::ThirdParty;
        }
        if !inner.is_empty() && !inner.contains('.') {
            return HeaderKind::System;
        }
    }
    HeaderKind::Other
}

/// Headers partitioned into emission groups.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderGroups {
    pub other: Vec<String>,
    pub local: Vec<String>,
    pub third_party: Vec<String>,
    pub system: Vec<String>,
}

impl HeaderGroups {
    /// The groups in emission order.
    pub fn groups(&self) -> [&[String]; 4] {
        [&self.other, &self.local, &self.third_party, &self.system]
    }

    /// `#include` lines, one blank line between non-empty groups.
    ///
    /// Entries of the first group are emitted verbatim unless they are
    /// shaped like an include target.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for group in self.groups().into_iter().filter(|g| !g.is_empty()) {
            if !out.is_empty() {
                out.push('\n');
            }
            for header in group {
                if is_include_target(header) {
                    let _ = writeln!(out, "#include {header}");
                } else {
                    let _ = writeln!(out, "{header}");
                }
            }
        }
        out
    }
}

fn is_include_target(header: &str) -> bool {
    (header.starts_with('<') && header.ends_with('>'))
        || (header.len() >= 2 && header.starts_with('"') && header.ends_with('"'))
}

/// Partition headers into groups.
///
/// ```
/// use xenoform_codegen::group_headers;
///
/// let groups = group_headers(&["<string>", "\"mine.h\"", "<pybind11/stl.h>", "<string>"]);
/// assert_eq!(groups.local, vec!["\"mine.h\""]);
/// assert_eq!(groups.third_party, vec!["<pybind11/stl.h>", "<pybind11/pybind11.h>"]);
/// assert_eq!(groups.system, vec!["<string>"]);
/// ```
pub fn group_headers<S: AsRef<str>>(headers: &[S]) -> HeaderGroups {
    let mut groups = HeaderGroups::default();
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for header in headers.iter().map(|h| h.as_ref().trim()) {
        if header.is_empty() || header == PYBIND11_HEADER || !seen.insert(header) {
            continue;
        }
        let group = match classify(header) {
            HeaderKind::Other => &mut groups.other,
            HeaderKind::Local => &mut groups.local,
            HeaderKind::ThirdParty => &mut groups.third_party,
            HeaderKind::System => &mut groups.system,
        };
        group.push(header.to_string());
    }
    groups.third_party.push(PYBIND11_HEADER.to_string());
    groups
}
