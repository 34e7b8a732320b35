//! Original source text behind tag records.
//!
//! A tag carries a single line of code. Multi-line declarations and
//! `extern "C"` blocks need the lines around it, which come from a
//! [`LineSource`]. Within one run every file is read at most once and kept
//! in a [`SourceCache`].

use std::collections::HashMap;
use std::fs;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("failed to read {path}: {message}")]
    Unreadable { path: String, message: String },

    #[error("line {line} is out of range for {path} ({len} lines)")]
    LineOutOfRange {
        path: String,
        line: usize,
        len: usize,
    },
}

/// Supplier of source file contents, keyed by the filename ctags reported.
pub trait LineSource {
    /// Every line of `path`, without line terminators.
    fn read_lines(&self, path: &str) -> Result<Vec<String>, SourceError>;
}

/// Reads files from disk. Invalid UTF-8 is replaced rather than rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsLineSource;

impl LineSource for FsLineSource {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, SourceError> {
        let bytes = fs::read(path).map_err(|e| SourceError::Unreadable {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Ok(String::from_utf8_lossy(&bytes)
            .lines()
            .map(str::to_string)
            .collect())
    }
}

/// Source files held in memory, for callers that already have the text.
#[derive(Debug, Default, Clone)]
pub struct MemoryLineSource {
    files: HashMap<String, String>,
}

impl MemoryLineSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }
}

impl LineSource for MemoryLineSource {
    fn read_lines(&self, path: &str) -> Result<Vec<String>, SourceError> {
        self.files
            .get(path)
            .map(|content| content.lines().map(str::to_string).collect())
            .ok_or_else(|| SourceError::Unreadable {
                path: path.to_string(),
                message: "no such file".to_string(),
            })
    }
}

/// One source file with comments blanked out. Line numbering is unchanged.
#[derive(Debug)]
pub struct SourceFile {
    path: String,
    lines: Vec<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, raw: &[String]) -> Self {
        let mut in_block = false;
        let lines = raw
            .iter()
            .map(|line| strip_comments(line, &mut in_block))
            .collect();
        Self {
            path: path.into(),
            lines,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines from `start_line` (1-based) to the end of the file.
    pub fn lines_from(&self, start_line: usize) -> Result<&[String], SourceError> {
        self.check_line(start_line)?;
        Ok(&self.lines[start_line - 1..])
    }

    /// Up to `limit` lines preceding `line`, nearest first, with their line numbers.
    pub fn lines_before(
        &self,
        line: usize,
        limit: usize,
    ) -> Result<impl Iterator<Item = (usize, &str)>, SourceError> {
        self.check_line(line)?;
        let first = line.saturating_sub(limit).max(1);
        Ok((first..line)
            .rev()
            .map(move |n| (n, self.lines[n - 1].as_str())))
    }

    fn check_line(&self, line: usize) -> Result<(), SourceError> {
        if line == 0 || line > self.lines.len() {
            return Err(SourceError::LineOutOfRange {
                path: self.path.clone(),
                line,
                len: self.lines.len(),
            });
        }
        Ok(())
    }
}

/// Remove `//` and `/* */` comments from one line, tracking block comments
/// that span lines through `in_block`.
fn strip_comments(line: &str, in_block: &mut bool) -> String {
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    loop {
        if *in_block {
            match rest.find("*/") {
                Some(end) => {
                    rest = &rest[end + 2..];
                    *in_block = false;
                }
                None => return out,
            }
        }
        let block = rest.find("/*");
        let eol = rest.find("//");
        match (block, eol) {
            (Some(start), eol) if eol.map_or(true, |eol| start < eol) => {
                out.push_str(&rest[..start]);
                out.push(' ');
                rest = &rest[start + 2..];
                *in_block = true;
            }
            (_, Some(eol)) => {
                out.push_str(&rest[..eol]);
                return out;
            }
            _ => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Per-run cache of source files, so each file is read once.
pub(crate) struct SourceCache<'s> {
    source: &'s dyn LineSource,
    files: HashMap<String, Result<Rc<SourceFile>, SourceError>>,
}

impl<'s> SourceCache<'s> {
    pub fn new(source: &'s dyn LineSource) -> Self {
        Self {
            source,
            files: HashMap::new(),
        }
    }

    pub fn file(&mut self, path: &str) -> Result<Rc<SourceFile>, SourceError> {
        if let Some(cached) = self.files.get(path) {
            return cached.clone();
        }
        let loaded = self
            .source
            .read_lines(path)
            .map(|raw| Rc::new(SourceFile::new(path, &raw)));
        if let Err(err) = &loaded {
            tracing::debug!("source unavailable: {err}");
        }
        self.files.insert(path.to_string(), loaded.clone());
        loaded
    }
}
