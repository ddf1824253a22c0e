//! Line-oriented scanning over command output.
//!
//! Splits a document into numbered lines of whitespace-separated items and
//! walks forward through them. Lookups are bounded: a search can stop at a
//! boundary line without consuming it, so the caller's next search starts
//! there.

/// One line of input, tokenised on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    /// 1-based line number in the original document.
    pub number: usize,
    pub raw: &'a str,
    pub items: Vec<&'a str>,
}

impl<'a> Line<'a> {
    fn new(number: usize, raw: &'a str) -> Self {
        Self {
            number,
            raw,
            items: raw.split_whitespace().collect(),
        }
    }

    /// True when the line's leading items equal `pattern`.
    pub fn starts_with(&self, pattern: &[&str]) -> bool {
        !pattern.is_empty()
            && self.items.len() >= pattern.len()
            && self.items.iter().zip(pattern).all(|(item, want)| item == want)
    }

    /// Index of the first item equal to `item`, searching from `from`.
    pub fn position_from(&self, from: usize, item: &str) -> Option<usize> {
        self.items
            .iter()
            .skip(from)
            .position(|i| *i == item)
            .map(|p| p + from)
    }

    /// Items `start..end` joined by single spaces. Out-of-range bounds clamp.
    pub fn join(&self, start: usize, end: usize) -> String {
        let end = end.min(self.items.len());
        if start >= end {
            return String::new();
        }
        self.items
            .get(start..end)
            .map(|items| items.join(" "))
            .unwrap_or_default()
    }
}

/// Outcome of a bounded search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Found<'a> {
    /// The wanted line; the scanner is positioned after it.
    Match(Line<'a>),
    /// A boundary line came first; the scanner is positioned on it.
    Boundary,
    /// The document ended first.
    End,
}

/// A forward-only cursor over the lines of a document.
pub struct LineScanner<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> LineScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text
                .lines()
                .enumerate()
                .map(|(i, raw)| Line::new(i + 1, raw))
                .collect(),
            pos: 0,
        }
    }

    /// Advance to the next line starting with `pattern` and consume it.
    pub fn find_start(&mut self, pattern: &[&str]) -> Option<Line<'a>> {
        let offset = self
            .lines
            .iter()
            .skip(self.pos)
            .position(|line| line.starts_with(pattern))?;
        let index = self.pos + offset;
        self.pos = index + 1;
        self.lines.get(index).cloned()
    }

    /// Advance to the next line satisfying `wanted`, unless a line starting
    /// with `boundary` is reached first.
    pub fn find_until<F>(&mut self, wanted: F, boundary: &[&str]) -> Found<'a>
    where
        F: Fn(&Line<'a>) -> bool,
    {
        while let Some(line) = self.lines.get(self.pos) {
            if line.starts_with(boundary) {
                return Found::Boundary;
            }
            self.pos += 1;
            if wanted(line) {
                return Found::Match(line.clone());
            }
        }
        Found::End
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.lines.len()
    }
}
