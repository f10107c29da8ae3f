use std::rc::Rc;

/// A human-readable source location: file, 1-based line and column, plus
/// the byte offset in the buffer the location was resolved from.
///
/// Attached to every token, AST node, and diagnostic. The filename is
/// reference-counted so tokens can carry it without per-token allocation.
#[derive(Debug, Clone)]
pub struct SourceLocation {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl SourceLocation {
    pub fn new(file: Rc<str>, line: u32, column: u32, offset: u32) -> Self {
        Self { file, line, column, offset }
    }

    /// A location for synthesized constructs that have no source position.
    pub fn unknown() -> Self {
        Self { file: Rc::from("<unknown>"), line: 0, column: 0, offset: 0 }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// Owns the bytes of one (preprocessed) translation unit and maps byte
/// offsets back to (line, column) pairs via a sorted line-offset table.
#[derive(Debug)]
pub struct SourceBuffer {
    name: Rc<str>,
    text: String,
    line_offsets: Vec<u32>,
}

impl SourceBuffer {
    pub fn new(name: &str, text: String) -> Self {
        let line_offsets = compute_line_offsets(&text);
        Self { name: Rc::from(name), text, line_offsets }
    }

    pub fn name(&self) -> Rc<str> {
        Rc::clone(&self.name)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    /// Resolve a byte offset to a full source location.
    pub fn location_at(&self, offset: u32) -> SourceLocation {
        let line = match self.line_offsets.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i.saturating_sub(1),
        };
        let column = offset - self.line_offsets[line];
        SourceLocation::new(self.name(), line as u32 + 1, column + 1, offset)
    }
}

fn compute_line_offsets(text: &str) -> Vec<u32> {
    // Estimate ~40 bytes per line to avoid most reallocations.
    let mut offsets = Vec::with_capacity(text.len() / 40 + 1);
    offsets.push(0u32);
    for (i, b) in text.bytes().enumerate() {
        if b == b'\n' {
            offsets.push(i as u32 + 1);
        }
    }
    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_lines_and_columns() {
        let buf = SourceBuffer::new("t.c", "int x;\nint y;\n".to_string());
        let loc = buf.location_at(0);
        assert_eq!((loc.line, loc.column), (1, 1));
        let loc = buf.location_at(4);
        assert_eq!((loc.line, loc.column), (1, 5));
        let loc = buf.location_at(7);
        assert_eq!((loc.line, loc.column), (2, 1));
        let loc = buf.location_at(11);
        assert_eq!((loc.line, loc.column), (2, 5));
    }

    #[test]
    fn offset_past_last_newline_stays_on_last_line() {
        let buf = SourceBuffer::new("t.c", "ab\ncd".to_string());
        let loc = buf.location_at(4);
        assert_eq!((loc.line, loc.column), (2, 2));
    }

    #[test]
    fn display_is_file_line_col() {
        let buf = SourceBuffer::new("main.cdd", "x".to_string());
        assert_eq!(buf.location_at(0).to_string(), "main.cdd:1:1");
    }
}
