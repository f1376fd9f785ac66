use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

const PREFERRED_COLORS: [&str; 10] = [
    "#35B279", "#ff0066", "#2B84D2", "#EE8A12", "#DF352E", "#9900ff", "#66ff99", "#00ffff",
    "#ffff00", "#838991",
];

/// A position in a text buffer: 1-based line, 0-based character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextPosition {
    pub line: usize,
    pub column: usize,
}

impl TextPosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// A user-marked range of the buffer, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: TextPosition,
    pub end: TextPosition,
}

impl Span {
    pub fn new(start: TextPosition, end: TextPosition) -> Self {
        Self { start, end }
    }

    /// Span covering `[start, stop)` on a single line.
    pub fn on_line(line: usize, start: usize, stop: usize) -> Self {
        Self::new(TextPosition::new(line, start), TextPosition::new(line, stop))
    }
}

/// Cosmetic colour used to highlight an accepted selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HighlightTag(String);

impl HighlightTag {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HighlightTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An accepted insertion point bound to a payload file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub line: usize,
    pub start: usize,
    pub stop: usize,
    pub payload_file: PathBuf,
    pub tag: HighlightTag,
}

impl Selection {
    fn intersects(&self, start: usize, stop: usize) -> bool {
        start < self.stop && self.start < stop
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionAccepted {
    pub tag: HighlightTag,
    pub payload_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("selection spans lines {start_line} to {end_line}")]
    MultiLine { start_line: usize, end_line: usize },
    #[error("selection on line {line} is empty")]
    Empty { line: usize },
    #[error("selection {start}..{stop} on line {line} is outside the buffer")]
    OutOfBounds { line: usize, start: usize, stop: usize },
    #[error("selection {start}..{stop} overlaps an existing selection on line {line}")]
    Overlap { line: usize, start: usize, stop: usize },
}

/// Hands out highlight colours: the preferred palette first, then generated ones.
#[derive(Debug, Clone)]
struct HighlightPalette {
    preferred: VecDeque<&'static str>,
    in_use: Vec<HighlightTag>,
    generated: u32,
}

impl Default for HighlightPalette {
    fn default() -> Self {
        Self {
            preferred: PREFERRED_COLORS.iter().copied().collect(),
            in_use: Vec::new(),
            generated: 0,
        }
    }
}

impl HighlightPalette {
    fn next_tag(&mut self) -> HighlightTag {
        let tag = match self.preferred.pop_front() {
            Some(color) => HighlightTag(color.to_string()),
            None => loop {
                self.generated = self.generated.wrapping_add(1);
                let rgb = self.generated.wrapping_mul(0x9E37_79B9) >> 8;
                let candidate = HighlightTag(format!("#{:06X}", rgb & 0x00FF_FFFF));
                if !self.in_use.contains(&candidate) {
                    break candidate;
                }
            },
        };
        self.in_use.push(tag.clone());
        tag
    }
}

/// The set of insertion points marked on one request buffer.
///
/// Selections are kept per line, sorted by start column, and never overlap.
#[derive(Debug, Clone, Default)]
pub struct SelectionSet {
    by_line: BTreeMap<usize, Vec<Selection>>,
    palette: HighlightPalette,
}

impl SelectionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.by_line.is_empty()
    }

    pub fn len(&self) -> usize {
        self.by_line.values().map(Vec::len).sum()
    }

    /// Lines that carry at least one selection, ascending.
    pub fn lines(&self) -> impl Iterator<Item = (usize, &[Selection])> {
        self.by_line
            .iter()
            .map(|(line, selections)| (*line, selections.as_slice()))
    }

    /// Checks whether `span` could be recorded without mutating the set.
    pub fn validate_selection(&self, buffer: &str, span: Span) -> Result<(), SelectionError> {
        if span.start.line != span.end.line {
            return Err(SelectionError::MultiLine {
                start_line: span.start.line,
                end_line: span.end.line,
            });
        }
        let line = span.start.line;
        let (start, stop) = (span.start.column, span.end.column);
        if start >= stop {
            return Err(SelectionError::Empty { line });
        }

        let line_len = line_text(buffer, line)
            .map(|text| text.chars().count())
            .ok_or(SelectionError::OutOfBounds { line, start, stop })?;
        if stop > line_len {
            return Err(SelectionError::OutOfBounds { line, start, stop });
        }

        let overlaps = self
            .by_line
            .get(&line)
            .is_some_and(|existing| existing.iter().any(|sel| sel.intersects(start, stop)));
        if overlaps {
            return Err(SelectionError::Overlap { line, start, stop });
        }
        Ok(())
    }

    /// Validates and records `span`, binding it to `payload_file`.
    ///
    /// A rejected span leaves the set untouched.
    pub fn record_selection(
        &mut self,
        buffer: &str,
        span: Span,
        payload_file: impl AsRef<Path>,
    ) -> Result<SelectionAccepted, SelectionError> {
        self.validate_selection(buffer, span)?;

        let tag = self.palette.next_tag();
        let payload_file = payload_file.as_ref().to_path_buf();
        let selections = self.by_line.entry(span.start.line).or_default();
        selections.push(Selection {
            line: span.start.line,
            start: span.start.column,
            stop: span.end.column,
            payload_file: payload_file.clone(),
            tag: tag.clone(),
        });
        selections.sort_by_key(|sel| sel.start);

        Ok(SelectionAccepted { tag, payload_file })
    }

    /// Drops every selection and resets the highlight palette.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Returns 1-based line `line` of `buffer`, ignoring a trailing carriage return.
pub(crate) fn line_text(buffer: &str, line: usize) -> Option<&str> {
    if line == 0 {
        return None;
    }
    buffer
        .split('\n')
        .nth(line - 1)
        .map(|text| text.strip_suffix('\r').unwrap_or(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUFFER: &str = "GET /search?q=term&page=2 HTTP/1.1\nHost: example.com\n\n";

    #[test]
    fn adjacent_spans_do_not_overlap() {
        let mut set = SelectionSet::new();
        set.record_selection(BUFFER, Span::on_line(1, 4, 10), "a.txt")
            .unwrap();
        assert!(set
            .record_selection(BUFFER, Span::on_line(1, 10, 12), "b.txt")
            .is_ok());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn palette_falls_back_to_generated_colors() {
        let mut palette = HighlightPalette::default();
        let tags: Vec<_> = (0..14).map(|_| palette.next_tag()).collect();
        assert_eq!(tags[0].as_str(), "#35B279");
        assert_eq!(tags[9].as_str(), "#838991");
        for generated in &tags[10..] {
            assert!(generated.as_str().starts_with('#'));
            assert_eq!(generated.as_str().len(), 7);
        }
        let unique: std::collections::HashSet<_> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn line_text_strips_carriage_return() {
        assert_eq!(line_text("a\r\nb", 1), Some("a"));
        assert_eq!(line_text("a\r\nb", 2), Some("b"));
        assert_eq!(line_text("a", 0), None);
        assert_eq!(line_text("a", 2), None);
    }
}
