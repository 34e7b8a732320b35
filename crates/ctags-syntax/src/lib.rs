//! ctags output parsing — one [`TagRecord`] per output row.
//!
//! Rows are tab-separated: the symbol name, the file it was found in, then
//! `key:value` fields plus an ex-style search pattern (`/^<code>$/;"`) that
//! carries the source line the symbol was found on.
//!
//! ```text
//! setup	/tmp/sketch.ino.cpp	/^void setup() {$/;"	kind:function	line:3	signature:()	returntype:void
//! ```

use std::fmt;

const PATTERN_START: &str = "/^";
const PATTERN_END: &str = "$/;";

/// Errors for rows that cannot become a tag record at all.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TagError {
    #[error("expected at least 2 tab-separated fields, found {fields}: {row:?}")]
    MissingFields { fields: usize, row: String },
}

/// The `kind:` field of a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagKind {
    Function,
    Prototype,
    /// Anything else ctags reports (variables, macros, members, ...).
    Other(String),
}

impl TagKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "function" => TagKind::Function,
            "prototype" => TagKind::Prototype,
            other => TagKind::Other(other.to_string()),
        }
    }

    /// Function definitions and prototypes are the only callable top-level kinds.
    pub fn is_callable(&self) -> bool {
        matches!(self, TagKind::Function | TagKind::Prototype)
    }
}

impl Default for TagKind {
    fn default() -> Self {
        TagKind::Other(String::new())
    }
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Function => f.write_str("function"),
            TagKind::Prototype => f.write_str("prototype"),
            TagKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// One symbol occurrence reported by ctags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagRecord {
    pub name: String,
    /// File the symbol was found in, with `\\` unescaped.
    pub filename: String,
    pub kind: TagKind,
    /// 1-based line of the symbol; 0 when ctags gave none or it did not parse.
    pub line: usize,
    pub typeref: String,
    /// Parameter list text, e.g. `(int a, char b)`.
    pub signature: String,
    pub class: String,
    pub structure: String,
    pub namespace: String,
    /// Source line taken from the search pattern; empty when there was none.
    pub code: String,
    /// `returntype name signature;`, rewritten later for templates.
    pub prototype: String,
    /// Storage class and linkage modifiers for the prototype.
    pub modifiers: String,
}

impl TagRecord {
    /// True for symbols declared inside a class, struct or namespace.
    pub fn is_scoped(&self) -> bool {
        !self.class.is_empty() || !self.structure.is_empty() || !self.namespace.is_empty()
    }
}

/// Parse one row of ctags output.
///
/// Unknown `key:value` fields are ignored, and a `line:` value that is not
/// a number becomes 0. Only a row without a name and filename is an error.
pub fn parse_tag(row: &str) -> Result<TagRecord, TagError> {
    let mut parts = row.split('\t');
    let (Some(name), Some(filename)) = (parts.next(), parts.next()) else {
        return Err(TagError::MissingFields {
            fields: row.split('\t').count(),
            row: row.to_string(),
        });
    };

    // gcc escapes backslashes in line markers and ctags keeps them as-is
    let mut tag = TagRecord {
        name: name.to_string(),
        filename: filename.replace("\\\\", "\\"),
        ..Default::default()
    };

    let mut return_type = "";
    for part in parts {
        let Some((field, value)) = part.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match field {
            "kind" => tag.kind = TagKind::parse(value),
            "line" => tag.line = value.parse().unwrap_or(0),
            "typeref" => tag.typeref = value.to_string(),
            "signature" => tag.signature = value.to_string(),
            "returntype" => return_type = value,
            "class" => tag.class = value.to_string(),
            "struct" => tag.structure = value.to_string(),
            "namespace" => tag.namespace = value.to_string(),
            _ => {}
        }
    }

    tag.prototype = format!("{} {}{};", return_type, tag.name, tag.signature);
    tag.code = pattern_code(row).unwrap_or_default().to_string();

    Ok(tag)
}

/// Parse a whole ctags run, one record per non-blank row.
///
/// Rows that cannot be parsed are logged and dropped; they never abort the run.
pub fn parse_output(output: &str) -> Vec<TagRecord> {
    output
        .lines()
        .map(str::trim)
        .filter(|row| !row.is_empty())
        .filter_map(|row| match parse_tag(row) {
            Ok(tag) => Some(tag),
            Err(err) => {
                tracing::warn!("ignoring ctags row: {err}");
                None
            }
        })
        .collect()
}

/// Text between `/^` and the following `$/;`.
fn pattern_code(row: &str) -> Option<&str> {
    let start = row.find(PATTERN_START)? + PATTERN_START.len();
    let len = row[start..].find(PATTERN_END)?;
    Some(&row[start..start + len])
}
