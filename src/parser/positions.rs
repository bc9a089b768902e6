//! Position table.
//!
//! Nodes carry byte spans only. A [`LineIndex`] built once per file maps those
//! offsets back to line and column numbers when a diagnostic needs them.
//! Columns are byte columns, which is what the Go toolchain reports.

/// Half-open byte range in a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn at(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position in source code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// Byte offset in source
    pub byte: usize,
    /// Line number (0-indexed)
    pub line: usize,
    /// Column number (0-indexed, in bytes)
    pub col: usize,
}

/// Byte offsets of every line start.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|&(_, b)| b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            line_starts,
            len: source.len(),
        }
    }

    /// Convert a byte offset to a position. Offsets past the end are clamped.
    pub fn position(&self, byte_offset: usize) -> Position {
        let byte = byte_offset.min(self.len);
        let line = self.line_starts.partition_point(|&start| start <= byte) - 1;
        Position {
            byte,
            line,
            col: byte - self.line_starts[line],
        }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_line() {
        let index = LineIndex::new("package demo\n");
        assert_eq!(index.position(0), Position { byte: 0, line: 0, col: 0 });
        assert_eq!(index.position(8), Position { byte: 8, line: 0, col: 8 });
    }

    #[test]
    fn test_after_newline() {
        let index = LineIndex::new("package demo\n\ntype S []string\n");
        // "type" starts right after the blank line
        assert_eq!(index.position(14), Position { byte: 14, line: 2, col: 0 });
        assert_eq!(index.position(19), Position { byte: 19, line: 2, col: 5 });
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_multibyte_columns_are_bytes() {
        let index = LineIndex::new("// café\nx");
        assert_eq!(index.position(9).line, 1);
        assert_eq!(index.position(7).col, 7);
    }

    #[test]
    fn test_out_of_bounds() {
        let index = LineIndex::new("hello");
        assert_eq!(index.position(100).byte, 5); // clamped to length
    }
}
