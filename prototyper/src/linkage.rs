//! `extern "C"` linkage for prototypes.
//!
//! Linkage belongs to the enclosing block, not to a single line, so it is
//! decided from the whole source file. Three shapes are recognized:
//!
//! ```c
//! extern "C" void foo();
//!
//! extern "C" {
//!     void foo();
//! }
//!
//! extern "C"
//! {
//!     void foo();
//! }
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{trace, warn};

use crate::parser::Entry;
use crate::source::{SourceCache, SourceFile};

pub(crate) const EXTERN_C: &str = "extern \"C\"";
const STATIC_IN_C: &str = "extern \"C\" static";

static RE_EXTERN_C: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"extern\s*"C""#).unwrap());

/// `extern "C"` alone on its line; the block opens on the next non-empty line.
static RE_EXTERN_C_ALONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*extern\s*"C"\s*$"#).unwrap());

/// Prepend `extern "C"` to the modifiers of every live tag declared inside
/// an `extern "C"` scope. Files that cannot be read contribute no scopes.
///
/// A `static` function in such a scope ends up as `extern "C" static`, which
/// compilers reject in a linkage specification; it is kept as is and warned
/// about.
pub(crate) fn fix_c_linkage(entries: &mut [Entry], sources: &mut SourceCache) {
    let mut scopes: HashMap<String, HashSet<usize>> = HashMap::new();

    for entry in entries.iter_mut().filter(|e| !e.is_skipped()) {
        let lines = scopes
            .entry(entry.tag.filename.clone())
            .or_insert_with(|| match sources.file(&entry.tag.filename) {
                Ok(file) => c_linkage_lines(&file),
                Err(_) => HashSet::new(),
            });

        let inside = lines.contains(&entry.tag.line) || lines.contains(&entry.decl_line);
        if inside && !entry.tag.modifiers.contains(EXTERN_C) {
            entry.tag.modifiers = format!("{EXTERN_C} {}", entry.tag.modifiers)
                .trim_end()
                .to_string();
            if entry.tag.modifiers.contains(STATIC_IN_C) {
                warn!(
                    name = %entry.tag.name,
                    line = entry.tag.line,
                    "static function inside an extern \"C\" scope"
                );
            }
        }
    }
}

/// Line numbers of `file` that lie inside an `extern "C"` scope.
fn c_linkage_lines(file: &SourceFile) -> HashSet<usize> {
    let mut lines = HashSet::new();
    let mut in_scope = false;
    let mut depth: i64 = 0;
    let mut scope_depth: i64 = 0;

    for (idx, text) in file.lines().iter().enumerate() {
        let line = idx + 1;
        if text.trim().is_empty() {
            continue;
        }

        // a lone `extern "C"` keeps the scope open for the `{` on the next non-empty line
        let mut block_follows = false;
        if !in_scope && RE_EXTERN_C.is_match(text) {
            in_scope = true;
            scope_depth = depth;
            block_follows = RE_EXTERN_C_ALONE.is_match(text);
        }
        if in_scope {
            lines.insert(line);
        }

        depth += brace_delta(text);
        if in_scope && depth <= scope_depth && !block_follows {
            in_scope = false;
        }
    }

    trace!(file = file.path(), lines = lines.len(), "extern \"C\" lines");
    lines
}

fn brace_delta(text: &str) -> i64 {
    text.chars()
        .map(|c| match c {
            '{' => 1,
            '}' => -1,
            _ => 0,
        })
        .sum()
}
