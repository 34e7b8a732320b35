//! Tunables for the prototype pipeline.

/// How far the pipeline reads around a tag's line in the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Lines read after a tag's line while looking for the `)` that closes
    /// its parameter list.
    pub lookahead_lines: usize,
    /// Lines read before a tag's line when a declaration starts earlier
    /// (return type or `template <...>` on a line of its own).
    pub lookback_lines: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            lookahead_lines: 10,
            lookback_lines: 10,
        }
    }
}
