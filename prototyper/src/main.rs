//! prototyper — compute the forward declarations a sketch needs.
//!
//! Reads ctags output (from `-i` or stdin), runs the prototype pipeline
//! against the sketch's main file and prints the insertion line followed by
//! one declaration per line:
//!
//! ```text
//! prototyper -i ctags.out -m /tmp/build/sketch/sketch.ino.cpp
//! insert-at: 3
//! void setup();
//! static int blink(int pin);
//! ```

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Parser as _;
use tracing::info;
use tracing_subscriber::EnvFilter;

use prototyper::{Analysis, FsLineSource, Parser, ParserConfig};

#[derive(clap::Parser)]
#[command(
    name = "prototyper",
    about = "Synthesize forward declarations for Arduino-style sketches from ctags output"
)]
struct Cli {
    /// ctags output file. If omitted, reads from stdin.
    #[arg(short = 'i')]
    input: Option<PathBuf>,

    /// Main translation unit of the sketch, as named in the ctags output
    #[arg(short = 'm', long = "main")]
    main_file: PathBuf,

    /// Output format: text (default), json
    #[arg(short = 'f', long, default_value = "text")]
    format: String,

    /// Lines read after a tag to find the end of its parameter list
    #[arg(long, default_value_t = ParserConfig::default().lookahead_lines)]
    lookahead: usize,

    /// Lines read before a tag to find the start of its declaration
    #[arg(long, default_value_t = ParserConfig::default().lookback_lines)]
    lookback: usize,

    /// Also list skipped tags and the reason they were skipped
    #[arg(long)]
    explain: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let ctags_output = read_input(cli.input.as_ref())?;
    let config = ParserConfig {
        lookahead_lines: cli.lookahead,
        lookback_lines: cli.lookback,
    };

    let mut analysis = Parser::new(&cli.main_file, &FsLineSource)
        .with_config(config)
        .parse(&ctags_output);
    info!(
        prototypes = analysis.prototypes.len(),
        skipped = analysis.skipped.len(),
        "analysis complete"
    );

    if !cli.explain {
        analysis.skipped.clear();
    }
    print!("{}", render(&cli.format, &analysis)?);
    Ok(())
}

fn read_input(input: Option<&PathBuf>) -> Result<String> {
    match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn render(format: &str, analysis: &Analysis) -> Result<String> {
    match format {
        "text" => Ok(render_text(analysis)),
        "json" => {
            let mut out = serde_json::to_string_pretty(analysis)?;
            out.push('\n');
            Ok(out)
        }
        _ => Err(anyhow!("unknown format: {}. Use text or json", format)),
    }
}

fn render_text(analysis: &Analysis) -> String {
    let mut out = match analysis.insertion_line {
        Some(line) => format!("insert-at: {line}\n"),
        None => "insert-at: none\n".to_string(),
    };
    for prototype in &analysis.prototypes {
        out.push_str(&prototype.declaration());
        out.push('\n');
    }
    for skipped in &analysis.skipped {
        out.push_str(&format!(
            "skipped: {} @ {} ({})\n",
            skipped.name, skipped.line, skipped.reason
        ));
    }
    out
}
