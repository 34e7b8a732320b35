//! Output records and the insertion line.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::parser::Entry;

/// A forward declaration to inject into the sketch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prototype {
    pub name: String,
    /// File the function is defined in.
    pub file: String,
    /// Declaration text including the trailing `;`.
    pub prototype: String,
    /// `static`, `extern "C"`, or empty.
    pub modifiers: String,
    /// Line of the definition. Only used for ordering and diagnostics.
    pub line: usize,
}

impl Prototype {
    /// The line a splicer inserts: modifiers and prototype text.
    pub fn declaration(&self) -> String {
        format!("{} {}", self.modifiers, self.prototype)
            .trim()
            .to_string()
    }
}

impl fmt::Display for Prototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} @ {}", self.declaration(), self.line)
    }
}

/// Live entries that have something to declare.
fn survivors(entries: &[Entry]) -> impl Iterator<Item = &Entry> {
    entries
        .iter()
        .filter(|e| !e.is_skipped() && !e.tag.prototype.trim().is_empty())
}

/// One prototype per surviving entry, in ctags order.
pub(crate) fn project(entries: &[Entry]) -> Vec<Prototype> {
    survivors(entries)
        .map(|e| Prototype {
            name: e.tag.name.clone(),
            file: e.tag.filename.clone(),
            prototype: e.tag.prototype.clone(),
            modifiers: e.tag.modifiers.clone(),
            line: e.tag.line,
        })
        .collect()
}

/// Earliest declaration line among the survivors defined in `main_file`.
/// Tags without a line number do not count.
pub(crate) fn insertion_line(entries: &[Entry], main_file: &Path) -> Option<usize> {
    survivors(entries)
        .filter(|e| Path::new(&e.tag.filename) == main_file)
        .map(|e| e.decl_line)
        .filter(|line| *line > 0)
        .min()
}
