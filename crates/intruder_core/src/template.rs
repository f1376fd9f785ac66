use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::selection::{line_text, SelectionSet};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("no payload positions have been marked")]
    NoPlaceholders,
    #[error("template expects {expected} payload values, got {actual}")]
    PlaceholderCount { expected: usize, actual: usize },
}

/// One piece of a template: literal request text or an ordinal placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(usize),
}

/// Request text with ordinal placeholders `{0}..{k-1}`.
///
/// Literal text is stored apart from the placeholders, so braces that already
/// appear in the request (JSON bodies, for instance) are never mistaken for
/// substitution markers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Template {
    segments: Vec<Segment>,
    placeholder_count: usize,
}

impl Template {
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn placeholder_count(&self) -> usize {
        self.placeholder_count
    }

    /// Substitutes `values[i]` for every placeholder `{i}`.
    pub fn render<S: AsRef<str>>(&self, values: &[S]) -> Result<String, TemplateError> {
        if values.len() != self.placeholder_count {
            return Err(TemplateError::PlaceholderCount {
                expected: self.placeholder_count,
                actual: values.len(),
            });
        }
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => rendered.push_str(text),
                Segment::Placeholder(ordinal) => rendered.push_str(values[*ordinal].as_ref()),
            }
        }
        Ok(rendered)
    }

    fn push_literal(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(Segment::Literal(last)) = self.segments.last_mut() {
            last.push_str(text);
        } else {
            self.segments.push(Segment::Literal(text.to_string()));
        }
    }

    fn push_placeholder(&mut self, ordinal: usize) {
        self.segments.push(Segment::Placeholder(ordinal));
        self.placeholder_count += 1;
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => f.write_str(text)?,
                Segment::Placeholder(ordinal) => write!(f, "{{{ordinal}}}")?,
            }
        }
        Ok(())
    }
}

/// A template plus the payload file bound to each placeholder, in ordinal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedTemplate {
    pub template: Template,
    pub bindings: Vec<PathBuf>,
}

/// Replaces every selection in `buffer` with an ordinal placeholder.
///
/// Ordinals follow reading order (line ascending, then column ascending)
/// regardless of the order the selections were recorded in. Within a line the
/// spans are cut right to left so earlier cuts never shift the columns of the
/// ones still pending.
pub fn build_template(
    buffer: &str,
    selections: &SelectionSet,
) -> Result<PreparedTemplate, TemplateError> {
    if selections.is_empty() {
        return Err(TemplateError::NoPlaceholders);
    }

    let mut lines: Vec<&str> = buffer
        .split('\n')
        .map(|text| text.strip_suffix('\r').unwrap_or(text))
        .collect();
    // Selections are validated against the buffer, but a stale set may name
    // lines that no longer exist; treat those as empty.
    let last_marked = selections.lines().map(|(line, _)| line).max().unwrap_or(0);
    if last_marked > lines.len() {
        lines.resize(last_marked, "");
    }

    let mut rewritten: Vec<Vec<Segment>> = vec![Vec::new(); lines.len()];
    let mut bindings = Vec::with_capacity(selections.len());
    let mut base = 0;

    for (line, marked) in selections.lines() {
        let chars: Vec<char> = line_text(buffer, line).unwrap_or("").chars().collect();
        let mut pieces = Vec::with_capacity(marked.len() * 2 + 1);
        let mut line_bindings = Vec::with_capacity(marked.len());
        let mut cut_end = chars.len();

        for (local, selection) in marked.iter().enumerate().rev() {
            let stop = selection.stop.min(cut_end);
            let start = selection.start.min(stop);
            pieces.push(Segment::Literal(chars[stop..cut_end].iter().collect()));
            pieces.push(Segment::Placeholder(base + local));
            line_bindings.push(selection.payload_file.clone());
            cut_end = start;
        }
        pieces.push(Segment::Literal(chars[..cut_end].iter().collect()));
        pieces.reverse();
        line_bindings.reverse();

        base += marked.len();
        bindings.extend(line_bindings);
        rewritten[line - 1] = pieces;
    }

    let mut template = Template::default();
    for (index, text) in lines.iter().enumerate() {
        if index > 0 {
            template.push_literal("\n");
        }
        if rewritten[index].is_empty() {
            template.push_literal(text);
            continue;
        }
        for segment in std::mem::take(&mut rewritten[index]) {
            match segment {
                Segment::Literal(text) => template.push_literal(&text),
                Segment::Placeholder(ordinal) => template.push_placeholder(ordinal),
            }
        }
    }

    Ok(PreparedTemplate { template, bindings })
}

impl SelectionSet {
    /// Builds the template and, on success, clears the consumed selections.
    pub fn take_template(&mut self, buffer: &str) -> Result<PreparedTemplate, TemplateError> {
        let prepared = build_template(buffer, self)?;
        self.clear();
        Ok(prepared)
    }
}
