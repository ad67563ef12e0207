//! Source locations

use std::fmt;

/// A point in the source text.
///
/// Ordering compares line first, then column, so positions sort the way a
/// reader scans a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Position {
    /// 1-based line number
    pub line: u32,
    /// 1-based column, counted in characters rather than bytes
    pub column: u32,
    /// Byte offset from the start of the file
    pub offset: usize,
}

impl Position {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self { line, column, offset }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range of source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Zero-length span at `pos`
    pub fn point(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    pub fn line(&self) -> u32 {
        self.start.line
    }

    pub fn column(&self) -> u32 {
        self.start.column
    }

    pub fn offset(&self) -> usize {
        self.start.offset
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.end.offset.saturating_sub(self.start.offset)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Zero-length span just past the end of this one
    pub fn end_point(&self) -> Self {
        Self::point(self.end)
    }

    /// Smallest span covering both `self` and `other`
    pub fn merge(self, other: Span) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn byte_range(&self) -> std::ops::Range<usize> {
        self.start.offset..self.end.offset
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.start)
    }
}

/// Maps byte offsets to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        line_starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { line_starts }
    }

    /// Resolve `offset` against `source`, which must be the text this index was built from.
    pub fn position(&self, source: &str, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = self.line_starts[line];
        let column = source
            .get(line_start..offset)
            .map_or(offset - line_start, |text| text.chars().count());
        Position::new(line as u32 + 1, column as u32 + 1, offset)
    }

    /// Resolve `offset` by scanning forward from an already known
    /// position. Costs the distance between the two instead of the
    /// distance from the line start, which keeps long lines linear.
    pub fn position_after(&self, source: &str, from: Position, offset: usize) -> Position {
        if offset < from.offset || self.line_start(offset) > from.offset {
            return self.position(source, offset);
        }
        let advanced = source
            .get(from.offset..offset)
            .map_or(offset - from.offset, |text| text.chars().count());
        Position::new(from.line, from.column + advanced as u32, offset)
    }

    /// Byte offset where the line containing `offset` begins
    pub fn line_start(&self, offset: usize) -> usize {
        match self.line_starts.binary_search(&offset) {
            Ok(line) => self.line_starts[line],
            Err(next) => self.line_starts[next - 1],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_after_matches_position() {
        let source = "int é = 1;\nchar *s = \"ü\"; int y;";
        let index = LineIndex::new(source);

        let mut cursor = index.position(source, 0);
        for offset in (0..=source.len()).filter(|&o| source.is_char_boundary(o)) {
            let next = index.position_after(source, cursor, offset);
            assert_eq!(next, index.position(source, offset), "offset {}", offset);
            cursor = next;
        }

        let behind = index.position(source, 8);
        assert_eq!(index.position_after(source, behind, 2), index.position(source, 2));
    }

    #[test]
    fn test_positions_across_lines() {
        let source = "ab\ncd\n\nef";
        let index = LineIndex::new(source);

        assert_eq!(index.position(source, 0), Position::new(1, 1, 0));
        assert_eq!(index.position(source, 1), Position::new(1, 2, 1));
        assert_eq!(index.position(source, 3), Position::new(2, 1, 3));
        assert_eq!(index.position(source, 7), Position::new(4, 1, 7));
    }

    #[test]
    fn test_columns_count_characters() {
        let source = "/* é */ x";
        let index = LineIndex::new(source);
        let offset = source.find('x').unwrap();

        assert_eq!(index.position(source, offset).column, 9);
    }

    #[test]
    fn test_merge_and_ordering() {
        let a = Span::new(Position::new(1, 5, 4), Position::new(1, 8, 7));
        let b = Span::new(Position::new(2, 1, 10), Position::new(2, 3, 12));

        let merged = a.merge(b);
        assert_eq!(merged.start, a.start);
        assert_eq!(merged.end, b.end);
        assert!(a < b);
        assert_eq!(merged.len(), 8);
    }
}
