//! Check that a generated prototype can really be found in the code it was
//! generated from, ignoring spaces and tabs.
//!
//! ctags reports the line holding the function name. When the return type
//! sits on an earlier line (`void\nfoo() {`) the snippet alone is not enough,
//! so the check pulls in neighbouring lines and, on success, moves the tag's
//! declaration line to where the declaration really starts.

use ctags_syntax::TagRecord;

use crate::config::ParserConfig;
use crate::parser::{Entry, Stage};
use crate::source::{SourceCache, SourceFile};
use crate::template::through_first_paren;

pub(crate) fn skip_mismatched(entries: &mut [Entry], sources: &mut SourceCache, config: &ParserConfig) {
    for entry in entries.iter_mut().filter(|e| !e.is_skipped()) {
        match declaration_line(&entry.tag, sources, config) {
            Some(line) => entry.decl_line = line,
            None => entry.skip(Stage::CodeMismatch),
        }
    }
}

/// Line the tag's declaration starts on, or `None` if the prototype cannot
/// be matched against the code.
fn declaration_line(tag: &TagRecord, sources: &mut SourceCache, config: &ParserConfig) -> Option<usize> {
    if tag.code.trim().is_empty() {
        return None;
    }

    let prototype = squeeze(&tag.prototype);
    let prototype = prototype.strip_suffix(';').unwrap_or(&prototype);
    if prototype.is_empty() {
        return None;
    }

    let mut code = tag.code.clone();
    if !code.contains(')') {
        if let Ok(file) = sources.file(&tag.filename) {
            if let Some(signature) = signature_below(&file, tag.line, config.lookahead_lines) {
                code = signature;
            }
        }
    }

    let code = squeeze(&code);
    if code.contains(prototype) {
        return Some(tag.line);
    }

    // the code holds the tail of the prototype; find how much is missing in front
    let head = through_first_paren(&code)?;
    let missing = prototype.find(head)?;
    let file = sources.file(&tag.filename).ok()?;

    let wanted = head.len() + missing;
    let mut code = head.to_string();
    let mut start = tag.line;
    for (line, text) in file.lines_before(tag.line, config.lookback_lines).ok()? {
        if code.len() >= wanted {
            break;
        }
        code.insert_str(0, &squeeze(text));
        start = line;
    }

    code.contains(prototype).then_some(start)
}

/// The tag's line plus following lines, up to the one closing the parameter list.
fn signature_below(file: &SourceFile, line: usize, lookahead: usize) -> Option<String> {
    let lines = file.lines_from(line).ok()?;
    let mut code = String::new();
    for text in lines.iter().take(lookahead + 1) {
        code.push_str(text);
        code.push(' ');
        if code.contains(')') {
            break;
        }
    }
    Some(code)
}

fn squeeze(s: &str) -> String {
    s.chars().filter(|c| *c != ' ' && *c != '\t').collect()
}
