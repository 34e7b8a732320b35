//! Forward-declaration synthesis for Arduino-style sketches.
//!
//! Sketches may call a function before its definition; C++ does not allow
//! that. Given the ctags output for a preprocessed sketch, [`Parser`] works
//! out which prototypes must be added and the line of the main file they
//! go before:
//!
//! ```no_run
//! use prototyper::{FsLineSource, Parser};
//!
//! let ctags_output = std::fs::read_to_string("ctags.out")?;
//! let analysis = Parser::new("sketch.ino.cpp", &FsLineSource).parse(&ctags_output);
//! if let Some(line) = analysis.insertion_line {
//!     for prototype in &analysis.prototypes {
//!         println!("{line}: {}", prototype.declaration());
//!     }
//! }
//! # Ok::<(), std::io::Error>(())
//! ```

pub mod config;
pub mod parser;
pub mod prototype;
pub mod source;
pub mod template;

mod consistency;
mod filter;
mod linkage;

pub use config::ParserConfig;
pub use parser::{Analysis, Parser, Skipped, Stage};
pub use prototype::Prototype;
pub use source::{FsLineSource, LineSource, MemoryLineSource, SourceError, SourceFile};
pub use template::ReconstructError;
