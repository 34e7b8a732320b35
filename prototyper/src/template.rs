//! Final prototype text and storage-class modifiers.
//!
//! ctags folds a template's `template <...>` header into the return type,
//! so the generated `returntype name signature;` text is not a valid
//! declaration. Templates get their prototype rebuilt from the code instead:
//! from the tag's own line when the header is on it, otherwise from the
//! source lines above it.

use ctags_syntax::TagRecord;
use tracing::warn;

use crate::config::ParserConfig;
use crate::parser::{Entry, Stage};
use crate::source::{SourceCache, SourceError};

const KEYWORD_TEMPLATE: &str = "template";
const KEYWORD_STATIC: &str = "static";
const STATIC_DECL: &str = "static ";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReconstructError {
    #[error("reconstruction failed for symbol {name} at line {line}: {source}")]
    Source {
        name: String,
        line: usize,
        #[source]
        source: SourceError,
    },

    #[error("reconstruction failed for symbol {name} at line {line}: no `template` header found")]
    TemplateNotFound { name: String, line: usize },

    #[error("reconstruction failed for symbol {name} at line {line}: no closing `)`")]
    NoClosingParen { name: String, line: usize },
}

pub(crate) fn add_prototypes(entries: &mut [Entry], sources: &mut SourceCache, config: &ParserConfig) {
    for entry in entries.iter_mut().filter(|e| !e.is_skipped()) {
        if let Err(err) = add_prototype(&mut entry.tag, sources, config) {
            warn!("{err}");
            entry.skip(Stage::Template);
        }
    }
}

fn add_prototype(
    tag: &mut TagRecord,
    sources: &mut SourceCache,
    config: &ParserConfig,
) -> Result<(), ReconstructError> {
    if tag.prototype.starts_with(KEYWORD_TEMPLATE) {
        let code = if tag.code.starts_with(KEYWORD_TEMPLATE) {
            single_line_template(&tag.code)
                .ok_or_else(|| no_paren(tag))?
                .to_string()
        } else {
            multi_line_template(tag, sources, config)?
        };
        tag.prototype = format!("{code};");
        return Ok(());
    }

    // extern "C" depends on the enclosing block and is decided in the linkage stage
    tag.modifiers = storage_modifiers(&tag.code).to_string();
    Ok(())
}

/// Declaration part of a one-line template: up to the `{`, or through the last `)`.
fn single_line_template(code: &str) -> Option<&str> {
    match code.find('{') {
        Some(brace) => Some(&code[..brace]),
        None => code.rfind(')').map(|paren| &code[..=paren]),
    }
}

/// Prepend the lines above the tag until the `template` header is included,
/// then append the lines below it until the parameter list is closed.
fn multi_line_template(
    tag: &TagRecord,
    sources: &mut SourceCache,
    config: &ParserConfig,
) -> Result<String, ReconstructError> {
    let source_err = |source| ReconstructError::Source {
        name: tag.name.clone(),
        line: tag.line,
        source,
    };
    let file = sources.file(&tag.filename).map_err(source_err)?;
    let (own, following) = file
        .lines_from(tag.line)
        .map_err(source_err)?
        .split_first()
        .ok_or_else(|| no_paren(tag))?;

    // the source line, not the ctags pattern, so trailing comments are gone
    let mut code = own.trim().to_string();
    for (_, text) in file.lines_before(tag.line, config.lookback_lines).map_err(source_err)? {
        if code.contains(KEYWORD_TEMPLATE) {
            break;
        }
        let text = text.trim();
        if !text.is_empty() {
            code = format!("{text} {code}");
        }
    }

    if !code.contains(KEYWORD_TEMPLATE) {
        return Err(ReconstructError::TemplateNotFound {
            name: tag.name.clone(),
            line: tag.line,
        });
    }

    // parameter list continues below the tag's line
    if !code.contains(')') {
        for text in following.iter().take(config.lookahead_lines) {
            code.push(' ');
            code.push_str(text.trim());
            if code.contains(')') {
                break;
            }
        }
    }
    through_first_paren(&code)
        .map(str::to_string)
        .ok_or_else(|| no_paren(tag))
}

fn no_paren(tag: &TagRecord) -> ReconstructError {
    ReconstructError::NoClosingParen {
        name: tag.name.clone(),
        line: tag.line,
    }
}

/// `static` when the code line declares one, otherwise nothing.
fn storage_modifiers(code: &str) -> &'static str {
    if code.contains(STATIC_DECL) {
        KEYWORD_STATIC
    } else {
        ""
    }
}

/// Text up to and including the first `)`.
pub(crate) fn through_first_paren(code: &str) -> Option<&str> {
    code.find(')').map(|paren| &code[..=paren])
}
