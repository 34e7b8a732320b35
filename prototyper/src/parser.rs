//! The prototype pipeline.
//!
//! [`Parser::parse`] turns one ctags run into the prototypes a sketch needs
//! and the line they must be inserted before. Stages run in a fixed order,
//! each relying on the ones before it:
//!
//! 1. **Unknown kind** — only `function` and `prototype` tags are callable.
//! 2. **Unhandled scope** — class, struct and namespace members are left alone.
//! 3. **Prototype text** — templates get their declaration rebuilt from the
//!    code, everything else gets its storage-class modifier.
//! 4. **Already declared** — prototypes that exist in the source suppress
//!    identical synthesized ones.
//! 5. **Duplicates** — the first tag of each prototype text wins.
//! 6. **Code mismatch** — the prototype must be findable in the code it came
//!    from. This may move a tag's declaration line back to where a
//!    multi-line declaration starts.
//! 7. **C linkage** — tags inside `extern "C"` get the linkage modifier.
//!    Needs the final prototype text and survivors, so it runs last.
//!
//! Stage 4 registers the text of every prototype tag, skipped or not, and
//! marks every tag whose text is in the set. Stage 5 only lets tags that are
//! still alive claim a text.
//!
//! A skipped tag stays skipped, and no stage reads a skipped tag's derived
//! fields.

use std::fmt;
use std::path::PathBuf;

use ctags_syntax::{parse_output, TagRecord};
use serde::Serialize;
use tracing::debug;

use crate::config::ParserConfig;
use crate::prototype::{self, Prototype};
use crate::source::{LineSource, SourceCache};
use crate::{consistency, filter, linkage, template};

/// The stage that excluded a tag from the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    UnknownKind,
    UnhandledScope,
    Template,
    AlreadyDeclared,
    Duplicate,
    CodeMismatch,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::UnknownKind => "unknown kind",
            Stage::UnhandledScope => "unhandled scope",
            Stage::Template => "template reconstruction failed",
            Stage::AlreadyDeclared => "already declared",
            Stage::Duplicate => "duplicate",
            Stage::CodeMismatch => "prototype does not match code",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tag moving through the pipeline.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub tag: TagRecord,
    /// Line the declaration starts on; stage 6 may move it before `tag.line`.
    pub decl_line: usize,
    skipped: Option<Stage>,
}

impl Entry {
    pub fn new(tag: TagRecord) -> Self {
        Self {
            decl_line: tag.line,
            tag,
            skipped: None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        self.skipped.is_some()
    }

    pub fn skip_reason(&self) -> Option<Stage> {
        self.skipped
    }

    /// Exclude this tag. The first reason sticks; there is no way back.
    pub fn skip(&mut self, stage: Stage) {
        if self.skipped.is_none() {
            debug!(symbol = %self.tag.name, line = self.tag.line, "skipping tag: {stage}");
            self.skipped = Some(stage);
        }
    }
}

/// A tag left out of the output, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub name: String,
    pub file: String,
    pub line: usize,
    pub reason: Stage,
}

/// Result of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Analysis {
    /// Line of the main file the prototypes go before; `None` when there is
    /// nothing to insert.
    pub insertion_line: Option<usize>,
    pub prototypes: Vec<Prototype>,
    pub skipped: Vec<Skipped>,
}

/// Prototype synthesis for a single ctags run.
///
/// `parse` consumes the parser, so records from one run can never leak into
/// the next.
pub struct Parser<'s> {
    entries: Vec<Entry>,
    main_file: PathBuf,
    sources: SourceCache<'s>,
    config: ParserConfig,
}

impl<'s> Parser<'s> {
    /// `main_file` is the sketch's primary translation unit, as ctags names it.
    pub fn new(main_file: impl Into<PathBuf>, source: &'s dyn LineSource) -> Self {
        Self {
            entries: Vec::new(),
            main_file: main_file.into(),
            sources: SourceCache::new(source),
            config: ParserConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parse(mut self, ctags_output: &str) -> Analysis {
        self.entries = parse_output(ctags_output)
            .into_iter()
            .map(Entry::new)
            .collect();

        self.skip_where(Stage::UnknownKind, filter::is_unknown);
        self.skip_where(Stage::UnhandledScope, filter::is_unhandled);
        template::add_prototypes(&mut self.entries, &mut self.sources, &self.config);
        filter::skip_declared(&mut self.entries);
        filter::skip_duplicates(&mut self.entries);
        consistency::skip_mismatched(&mut self.entries, &mut self.sources, &self.config);
        linkage::fix_c_linkage(&mut self.entries, &mut self.sources);

        Analysis {
            insertion_line: prototype::insertion_line(&self.entries, &self.main_file),
            prototypes: prototype::project(&self.entries),
            skipped: self.skipped(),
        }
    }

    fn skip_where(&mut self, stage: Stage, predicate: fn(&TagRecord) -> bool) {
        for entry in self.entries.iter_mut().filter(|e| !e.is_skipped()) {
            if predicate(&entry.tag) {
                entry.skip(stage);
            }
        }
    }

    fn skipped(&self) -> Vec<Skipped> {
        self.entries
            .iter()
            .filter_map(|entry| {
                entry.skip_reason().map(|reason| Skipped {
                    name: entry.tag.name.clone(),
                    file: entry.tag.filename.clone(),
                    line: entry.tag.line,
                    reason,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemoryLineSource;
    use pretty_assertions::assert_eq;

    const MAIN: &str = "/tmp/sketch/sketch.ino.cpp";

    fn row(name: &str, code: &str, fields: &str) -> String {
        format!("{name}\t{MAIN}\t/^{code}$/;\"\t{fields}\n")
    }

    fn run(output: &str, source: &MemoryLineSource) -> Analysis {
        Parser::new(MAIN, source).parse(output)
    }

    fn declarations(analysis: &Analysis) -> Vec<String> {
        analysis.prototypes.iter().map(Prototype::declaration).collect()
    }

    #[test]
    fn simple_sketch() {
        let output = [
            row("setup", "void setup() {", "kind:function\tline:3\tsignature:()\treturntype:void"),
            row("loop", "void loop() {", "kind:function\tline:7\tsignature:()\treturntype:void"),
            row("blink", "int blink(int pin) {", "kind:function\tline:11\tsignature:(int pin)\treturntype:int"),
        ]
        .concat();
        let analysis = run(&output, &MemoryLineSource::new());
        assert_eq!(
            declarations(&analysis),
            vec!["void setup();", "void loop();", "int blink(int pin);"]
        );
        assert_eq!(analysis.insertion_line, Some(3));
        assert!(analysis.skipped.is_empty());
    }

    #[test]
    fn insertion_line_is_smallest_survivor() {
        let output = [
            row("a", "void a() {", "kind:function\tline:12\tsignature:()\treturntype:void"),
            row("b", "void b() {", "kind:function\tline:45\tsignature:()\treturntype:void"),
            row("c", "void c() {", "kind:function\tline:7\tsignature:()\treturntype:void"),
        ]
        .concat();
        assert_eq!(run(&output, &MemoryLineSource::new()).insertion_line, Some(7));
    }

    #[test]
    fn nothing_survives_means_no_insertion() {
        let output = row("x", "int x;", "kind:variable\tline:1");
        let analysis = run(&output, &MemoryLineSource::new());
        assert!(analysis.prototypes.is_empty());
        assert_eq!(analysis.insertion_line, None);
        assert_eq!(analysis.skipped[0].reason, Stage::UnknownKind);
    }

    #[test]
    fn other_files_do_not_set_insertion_line() {
        let output = "helper\t/tmp/sketch/other.cpp\t/^void helper() {$/;\"\tkind:function\tline:2\tsignature:()\treturntype:void\n";
        let analysis = run(output, &MemoryLineSource::new());
        assert_eq!(declarations(&analysis), vec!["void helper();"]);
        assert_eq!(analysis.prototypes[0].file, "/tmp/sketch/other.cpp");
        assert_eq!(analysis.insertion_line, None);
    }

    #[test]
    fn namespaced_function_is_skipped() {
        let output = row(
            "f",
            "void f() {",
            "kind:function\tline:4\tnamespace:Foo\tsignature:()\treturntype:void",
        );
        let analysis = run(&output, &MemoryLineSource::new());
        assert!(analysis.prototypes.is_empty());
        assert_eq!(analysis.skipped[0].reason, Stage::UnhandledScope);
    }

    #[test]
    fn declared_prototype_suppresses_function() {
        let output = [
            row("foo", "void foo();", "kind:prototype\tline:1\tsignature:()\treturntype:void"),
            row("foo", "void foo() {", "kind:function\tline:5\tsignature:()\treturntype:void"),
        ]
        .concat();
        let analysis = run(&output, &MemoryLineSource::new());
        assert!(analysis.prototypes.is_empty());
        assert_eq!(
            analysis.skipped.iter().map(|s| s.reason).collect::<Vec<_>>(),
            vec![Stage::AlreadyDeclared, Stage::AlreadyDeclared]
        );
    }

    #[test]
    fn scoped_prototype_still_suppresses_function() {
        let output = [
            row("foo", "  void foo();", "kind:prototype\tline:2\tclass:A\tsignature:()\treturntype:void"),
            row("foo", "void foo() {", "kind:function\tline:5\tsignature:()\treturntype:void"),
        ]
        .concat();
        let analysis = run(&output, &MemoryLineSource::new());
        assert!(analysis.prototypes.is_empty());
        assert_eq!(analysis.insertion_line, None);
        assert_eq!(
            analysis.skipped.iter().map(|s| s.reason).collect::<Vec<_>>(),
            vec![Stage::UnhandledScope, Stage::AlreadyDeclared]
        );
    }

    #[test]
    fn duplicate_static_function_kept_once() {
        let output = [
            row("foo", "static void foo() {", "kind:function\tline:3\tsignature:()\treturntype:void"),
            row("foo", "void foo() {", "kind:function\tline:9\tsignature:()\treturntype:void"),
        ]
        .concat();
        let analysis = run(&output, &MemoryLineSource::new());
        assert_eq!(analysis.prototypes.len(), 1);
        assert_eq!(analysis.prototypes[0].modifiers, "static");
        assert_eq!(analysis.prototypes[0].line, 3);
        assert_eq!(analysis.skipped[0].reason, Stage::Duplicate);
        assert_eq!(analysis.skipped[0].line, 9);
    }

    #[test]
    fn single_line_template() {
        let output = row(
            "max",
            "template <typename T> T max(T a, T b) {",
            "kind:function\tline:2\tsignature:(T a, T b)\treturntype:template <typename T> T",
        );
        let analysis = run(&output, &MemoryLineSource::new());
        assert_eq!(
            analysis.prototypes[0].prototype,
            "template <typename T> T max(T a, T b) ;"
        );
    }

    #[test]
    fn multi_line_template_uses_source() {
        let source = MemoryLineSource::new().with_file(
            MAIN,
            "#include <Arduino.h>\ntemplate <class T>\nT twice(T v) {\n  return v + v;\n}\n",
        );
        let output = row(
            "twice",
            "T twice(T v) {",
            "kind:function\tline:3\tsignature:(T v)\treturntype:template <class T> T",
        );
        let analysis = run(&output, &source);
        assert_eq!(declarations(&analysis), vec!["template <class T> T twice(T v);"]);
        assert_eq!(analysis.insertion_line, Some(2));
    }

    #[test_log::test]
    fn multi_line_template_without_source_is_skipped() {
        let output = row(
            "twice",
            "T twice(T v) {",
            "kind:function\tline:3\tsignature:(T v)\treturntype:template <class T> T",
        );
        let analysis = run(&output, &MemoryLineSource::new());
        assert!(analysis.prototypes.is_empty());
        assert_eq!(analysis.skipped[0].reason, Stage::Template);
    }

    #[test_log::test]
    fn failed_template_does_not_affect_other_tags() {
        let output = [
            row("twice", "T twice(T v) {", "kind:function\tline:3\tsignature:(T v)\treturntype:template <class T> T"),
            row("setup", "void setup() {", "kind:function\tline:8\tsignature:()\treturntype:void"),
        ]
        .concat();
        let analysis = run(&output, &MemoryLineSource::new());
        assert_eq!(declarations(&analysis), vec!["void setup();"]);
        assert_eq!(analysis.insertion_line, Some(8));
        assert_eq!(analysis.skipped.len(), 1);
        assert_eq!(analysis.skipped[0].name, "twice");
        assert_eq!(analysis.skipped[0].reason, Stage::Template);
    }

    #[test_log::test]
    fn missing_code_fails_closed() {
        let output = format!("f\t{MAIN}\tkind:function\tline:3\tsignature:()\treturntype:void\n");
        let analysis = run(&output, &MemoryLineSource::new());
        assert!(analysis.prototypes.is_empty());
        assert_eq!(analysis.skipped[0].reason, Stage::CodeMismatch);
    }

    #[test]
    fn extern_c_block() {
        let source = MemoryLineSource::new().with_file(
            MAIN,
            "extern \"C\" {\nvoid isr() {\n}\n}\nvoid later() {\n}\n",
        );
        let output = [
            row("isr", "void isr() {", "kind:function\tline:2\tsignature:()\treturntype:void"),
            row("later", "void later() {", "kind:function\tline:5\tsignature:()\treturntype:void"),
        ]
        .concat();
        let analysis = run(&output, &source);
        assert_eq!(
            declarations(&analysis),
            vec!["extern \"C\" void isr();", "void later();"]
        );
    }

    #[test_log::test]
    fn skip_is_monotonic_across_stages() {
        // in a namespace and a duplicate: the first reason is kept
        let output = [
            row("f", "void f() {", "kind:function\tline:1\tsignature:()\treturntype:void"),
            row("f", "void f() {", "kind:function\tline:2\tnamespace:N\tsignature:()\treturntype:void"),
        ]
        .concat();
        let analysis = run(&output, &MemoryLineSource::new());
        assert_eq!(declarations(&analysis), vec!["void f();"]);
        assert_eq!(analysis.skipped.len(), 1);
        assert_eq!(analysis.skipped[0].reason, Stage::UnhandledScope);
    }

    #[test]
    fn survivors_pass_through_unchanged() {
        let rows = [
            (1, row("a", "int a(char c);", "kind:prototype\tline:1\tsignature:(char c)\treturntype:int")),
            (2, row("a", "static int a(char c) {", "kind:function\tline:2\tsignature:(char c)\treturntype:int")),
            (4, row("d", "static void d() {", "kind:function\tline:4\tsignature:()\treturntype:void")),
            (8, row("b", "void b() {", "kind:function\tline:8\tsignature:()\treturntype:void")),
            (12, row("c", "void c() {", "kind:function\tline:12\tnamespace:N\tsignature:()\treturntype:void")),
            (20, row("b", "void b() {", "kind:function\tline:20\tsignature:()\treturntype:void")),
        ];
        let source = MemoryLineSource::new();
        let output: String = rows.iter().map(|(_, r)| r.as_str()).collect();
        let first = run(&output, &source);
        assert_eq!(declarations(&first), vec!["static void d();", "void b();"]);

        let kept: Vec<usize> = first.prototypes.iter().map(|p| p.line).collect();
        let survivors: String = rows
            .iter()
            .filter(|(line, _)| kept.contains(line))
            .map(|(_, r)| r.as_str())
            .collect();
        let second = run(&survivors, &source);
        assert_eq!(second.prototypes, first.prototypes);
        assert_eq!(second.insertion_line, first.insertion_line);
        assert!(second.skipped.is_empty());
    }

    #[test]
    fn same_input_same_output() {
        let output = [
            row("b", "void b() {", "kind:function\tline:8\tsignature:()\treturntype:void"),
            row("a", "static int a(char c) {", "kind:function\tline:2\tsignature:(char c)\treturntype:int"),
            row("a", "int a(char c);", "kind:prototype\tline:1\tsignature:(char c)\treturntype:int"),
        ]
        .concat();
        let source = MemoryLineSource::new();
        assert_eq!(run(&output, &source), run(&output, &source));
    }

    #[test]
    fn entry_skip_keeps_first_reason() {
        let mut entry = Entry::new(TagRecord::default());
        entry.skip(Stage::Duplicate);
        entry.skip(Stage::CodeMismatch);
        assert_eq!(entry.skip_reason(), Some(Stage::Duplicate));
    }
}
