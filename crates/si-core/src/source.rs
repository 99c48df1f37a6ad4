//! Source file model: a named buffer with byte offsets used for diagnostics.

use std::fmt;
use std::rc::Rc;

/// A source file loaded into memory, kept alive for the duration of a
/// compilation so every [`Position`] can be resolved back to file/line/column.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: Rc<str>,
    pub text: Rc<str>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        SourceFile {
            name: Rc::from(name.into()),
            text: Rc::from(text.into()),
        }
    }

    /// Resolves a byte offset into this file to a 1-based line and column.
    ///
    /// Columns count UTF-8 bytes since the start of the line, matching the
    /// lexer's own byte-oriented scanning.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let mut line = 1u32;
        let mut col = 1u32;
        for (i, b) in self.text.as_bytes().iter().enumerate() {
            if i as u32 == offset {
                break;
            }
            if *b == b'\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }

    pub fn position_at(&self, offset: u32) -> Position {
        let (line, column) = self.line_col(offset);
        Position {
            file: self.name.clone(),
            line,
            column,
            offset,
        }
    }
}

/// A source position carried by every token and diagnostic: `(file, line, column)`
/// plus the raw byte offset used to compute it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: Rc<str>,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_col_tracks_newlines() {
        let src = SourceFile::new("t.si", "ab\ncd\nef");
        assert_eq!(src.line_col(0), (1, 1));
        assert_eq!(src.line_col(2), (1, 3));
        assert_eq!(src.line_col(3), (2, 1));
        assert_eq!(src.line_col(6), (3, 1));
    }

    #[test]
    fn position_display_format() {
        let src = SourceFile::new("main.si", "x");
        let pos = src.position_at(0);
        assert_eq!(format!("{pos}"), "main.si:1:1");
    }
}
