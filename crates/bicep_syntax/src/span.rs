use serde::Serialize;

/// Byte range into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize)]
pub struct TextSpan {
    pub start: usize,
    pub length: usize,
}

impl TextSpan {
    pub const fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub const fn empty(position: usize) -> Self {
        Self {
            start: position,
            length: 0,
        }
    }

    pub const fn end(&self) -> usize {
        self.start + self.length
    }

    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Span from the start of `first` to the end of `last`.
    pub fn between(first: TextSpan, last: TextSpan) -> TextSpan {
        let start = first.start.min(last.start);
        let end = last.end().max(first.end());
        TextSpan::new(start, end - start)
    }

    /// Span from the start of `first` up to (excluding) the start of `next`.
    pub fn between_inclusive_and_exclusive(first: TextSpan, next: TextSpan) -> TextSpan {
        let end = next.start.max(first.start);
        TextSpan::new(first.start, end - first.start)
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end()
    }

    /// Inclusive at both ends, so a cursor sitting right after a token still hits it.
    pub fn touches(&self, offset: usize) -> bool {
        offset >= self.start && offset <= self.end()
    }

    pub fn contains_span(&self, other: TextSpan) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }
}

impl std::fmt::Display for TextSpan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}]", self.start, self.end())
    }
}

/// One-based line/column position, used only for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Maps byte offsets to line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let bytes = text.as_bytes();
        let mut index = 0;
        while index < bytes.len() {
            match bytes[index] {
                b'\r' if bytes.get(index + 1) == Some(&b'\n') => {
                    line_starts.push(index + 2);
                    index += 2;
                    continue;
                }
                b'\r' | b'\n' => line_starts.push(index + 1),
                _ => {}
            }
            index += 1;
        }
        Self { line_starts }
    }

    pub fn position(&self, offset: usize) -> Position {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        Position {
            line: line + 1,
            column: offset - self.line_starts[line] + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn between_covers_both_spans() {
        let span = TextSpan::between(TextSpan::new(2, 3), TextSpan::new(10, 2));
        assert_eq!(span, TextSpan::new(2, 10));
    }

    #[test]
    fn between_exclusive_stops_at_next_start() {
        let span = TextSpan::between_inclusive_and_exclusive(TextSpan::new(4, 2), TextSpan::new(9, 1));
        assert_eq!(span, TextSpan::new(4, 5));
    }

    #[test]
    fn line_index_handles_crlf() {
        let index = LineIndex::new("a\r\nbc\nd");
        assert_eq!(index.position(0), Position { line: 1, column: 1 });
        assert_eq!(index.position(4), Position { line: 2, column: 2 });
        assert_eq!(index.position(6), Position { line: 3, column: 1 });
    }
}
