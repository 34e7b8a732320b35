//! Stages that only need the tag records themselves.

use std::collections::HashSet;

use ctags_syntax::{TagKind, TagRecord};

use crate::parser::{Entry, Stage};

pub(crate) fn is_unknown(tag: &TagRecord) -> bool {
    !tag.kind.is_callable()
}

/// Methods and namespaced functions are never forward-declared.
pub(crate) fn is_unhandled(tag: &TagRecord) -> bool {
    tag.is_scoped()
}

/// Skip every tag whose prototype is already written out in the source.
///
/// Every prototype tag registers its text, including ones skipped earlier:
/// a declaration in the source exists whatever the reason it is not emitted.
pub(crate) fn skip_declared(entries: &mut [Entry]) {
    let declared: HashSet<String> = entries
        .iter()
        .filter(|e| e.tag.kind == TagKind::Prototype)
        .map(|e| e.tag.prototype.clone())
        .collect();

    for entry in entries.iter_mut() {
        if declared.contains(&entry.tag.prototype) {
            entry.skip(Stage::AlreadyDeclared);
        }
    }
}

/// Keep the first live tag of each prototype text, skip the rest.
pub(crate) fn skip_duplicates(entries: &mut [Entry]) {
    let mut seen = HashSet::new();
    for entry in entries.iter_mut().filter(|e| !e.is_skipped()) {
        if !seen.insert(entry.tag.prototype.clone()) {
            entry.skip(Stage::Duplicate);
        }
    }
}
