use std::ops::Range;

/// Byte offsets of line starts, addressed by 1-based line numbers.
///
/// Spans exclude the terminator (`\n` or `\r\n`), so splicing a rewritten line
/// back into the text keeps the document's original line endings.
pub struct LineMap {
    line_starts: Vec<usize>,
}

impl LineMap {
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Byte range of the content of `line_number` (1-based).
    pub fn line_span(&self, text: &str, line_number: usize) -> Option<Range<usize>> {
        if line_number == 0 {
            return None;
        }
        let start = *self.line_starts.get(line_number - 1)?;
        let mut end = self
            .line_starts
            .get(line_number)
            .map(|next| next - 1)
            .unwrap_or(text.len());

        if end > start && text.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }

        Some(start..end)
    }

    /// Iterate `(line_number, line)` pairs without terminators.
    pub fn lines<'a>(&'a self, text: &'a str) -> impl Iterator<Item = (usize, &'a str)> + 'a {
        (1..=self.line_count()).filter_map(move |line_number| {
            self.line_span(text, line_number)
                .map(|span| (line_number, &text[span]))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_spans() {
        let text = "first\nsecond\r\nthird";
        let map = LineMap::new(text);

        assert_eq!(map.line_count(), 3);
        assert_eq!(&text[map.line_span(text, 1).unwrap()], "first");
        assert_eq!(&text[map.line_span(text, 2).unwrap()], "second");
        assert_eq!(&text[map.line_span(text, 3).unwrap()], "third");
        assert!(map.line_span(text, 0).is_none());
        assert!(map.line_span(text, 4).is_none());
    }

    #[test]
    fn test_trailing_newline_yields_empty_last_line() {
        let text = "only\n";
        let map = LineMap::new(text);
        let lines: Vec<_> = map.lines(text).collect();
        assert_eq!(lines, vec![(1, "only"), (2, "")]);
    }

    #[test]
    fn test_empty_lines_are_addressable() {
        let text = "\n\nx";
        let map = LineMap::new(text);
        assert_eq!(map.line_span(text, 1), Some(0..0));
        assert_eq!(map.line_span(text, 2), Some(1..1));
        assert_eq!(&text[map.line_span(text, 3).unwrap()], "x");
    }
}
