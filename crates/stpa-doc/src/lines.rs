//! Line-array view of a document
//!
//! [`DocText`] owns the split lines plus the original newline flavor and
//! trailing-newline presence, so that serializing an untouched document
//! reproduces the input byte for byte.

/// Newline convention of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Newline {
    /// `\n`
    Lf,
    /// `\r\n`
    CrLf,
}

impl Newline {
    /// The separator string for this convention.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Newline::Lf => "\n",
            Newline::CrLf => "\r\n",
        }
    }
}

/// A document as a mutable line array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocText {
    lines: Vec<String>,
    newline: Newline,
    trailing_newline: bool,
}

impl DocText {
    /// Split text into lines, remembering the newline convention and whether
    /// the text ended with a newline.
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let newline = if text.contains("\r\n") {
            Newline::CrLf
        } else {
            Newline::Lf
        };
        if text.is_empty() {
            return Self {
                lines: Vec::new(),
                newline,
                trailing_newline: false,
            };
        }
        let trailing_newline = text.ends_with('\n');
        let mut lines: Vec<String> = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
            .collect();
        if trailing_newline {
            lines.pop();
        }
        Self {
            lines,
            newline,
            trailing_newline,
        }
    }

    /// Serialize back to text, preserving the original conventions.
    #[must_use]
    pub fn to_text(&self) -> String {
        let sep = self.newline.as_str();
        let mut out = self.lines.join(sep);
        if self.trailing_newline && !self.lines.is_empty() {
            out.push_str(sep);
        }
        out
    }

    /// The lines.
    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// True when the document has no lines.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Newline convention detected on parse.
    #[inline]
    #[must_use]
    pub fn newline(&self) -> Newline {
        self.newline
    }

    /// Replace the line at `idx`.
    pub fn replace(&mut self, idx: usize, line: String) {
        self.lines[idx] = line;
    }

    /// Insert a line before `idx` (or at the end when `idx == len`).
    pub fn insert(&mut self, idx: usize, line: String) {
        self.lines.insert(idx, line);
    }

    /// Insert several lines before `idx`, preserving their order.
    pub fn insert_many(&mut self, idx: usize, lines: Vec<String>) {
        for (offset, line) in lines.into_iter().enumerate() {
            self.lines.insert(idx + offset, line);
        }
    }

    /// Remove and return the line at `idx`.
    pub fn remove(&mut self, idx: usize) -> String {
        self.lines.remove(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lf_round_trip() {
        let text = "a\nb\nc\n";
        assert_eq!(DocText::from_text(text).to_text(), text);
    }

    #[test]
    fn crlf_round_trip() {
        let text = "a\r\nb\r\nc\r\n";
        let doc = DocText::from_text(text);
        assert_eq!(doc.newline(), Newline::CrLf);
        assert_eq!(doc.to_text(), text);
    }

    #[test]
    fn missing_trailing_newline_preserved() {
        let text = "a\nb";
        assert_eq!(DocText::from_text(text).to_text(), text);
    }

    #[test]
    fn empty_text() {
        let doc = DocText::from_text("");
        assert!(doc.is_empty());
        assert_eq!(doc.to_text(), "");
    }

    #[test]
    fn edits_serialize_with_original_convention() {
        let mut doc = DocText::from_text("a\r\nb\r\n");
        doc.insert(1, "x".to_string());
        assert_eq!(doc.to_text(), "a\r\nx\r\nb\r\n");
        doc.remove(0);
        doc.replace(0, "y".to_string());
        assert_eq!(doc.to_text(), "y\r\nb\r\n");
    }
}
