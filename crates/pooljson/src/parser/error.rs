use std::fmt;

use thiserror::Error;

use crate::buffer::Buffer;

/// A syntax error and the byte offset where it was found.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{kind} at byte {offset}")]
pub struct ParseError {
    pub(crate) kind: SyntaxError,
    pub(crate) offset: usize,
}

/// What went wrong while parsing.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SyntaxError {
    /// A character that cannot start or continue the current token.
    #[error("invalid character {0:?}")]
    InvalidCharacter(char),
    /// The input ended inside a value.
    #[error("unexpected end of input")]
    UnexpectedEndOfInput,
    /// A binary value whose declared length runs past the end of the input.
    #[error("binary value declares {declared} bytes but only {available} remain")]
    TruncatedBinary {
        /// Length from the binary prefix.
        declared: usize,
        /// Bytes left after the prefix.
        available: usize,
    },
    /// A binary value in input parsed with binary values disabled.
    #[error("binary values are disabled")]
    BinaryDisabled,
    /// Non-whitespace bytes after a complete root value.
    #[error("trailing characters after the root value")]
    TrailingCharacters,
}

/// A one-based row and column plus the byte offset they were computed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// One-based line number.
    pub row: usize,
    /// One-based column, counted in bytes.
    pub column: usize,
    /// Zero-based byte offset into the input.
    pub offset: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.column)
    }
}

impl ParseError {
    pub(crate) fn new(kind: SyntaxError, offset: usize) -> Self {
        Self { kind, offset }
    }

    /// The kind of error.
    #[must_use]
    pub fn kind(&self) -> SyntaxError {
        self.kind
    }

    /// Byte offset of the offending character, or the input length when the
    /// input ended early.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Row and column of the error in `source`, the text that was parsed.
    ///
    /// Rows count `\n` bytes. A backslash and the byte after it are skipped
    /// together, so escaped characters never start a new row.
    #[must_use]
    pub fn locate(&self, source: &[u8]) -> Location {
        let end = self.offset.min(source.len());
        let mut row = 1;
        let mut row_start = 0;
        let mut at = 0;
        while at < end {
            match source[at] {
                b'\\' => at += 2,
                b'\n' => {
                    at += 1;
                    row += 1;
                    row_start = at;
                }
                _ => at += 1,
            }
        }
        Location {
            row,
            column: end.saturating_sub(row_start) + 1,
            offset: self.offset,
        }
    }

    /// `Error at row R, column: C (N bytes into json)`.
    #[must_use]
    pub fn describe(&self, source: &[u8]) -> String {
        let location = self.locate(source);
        format!(
            "Error at row {}, column: {} ({} bytes into json)",
            location.row, location.column, location.offset
        )
    }

    /// Appends [`describe`](Self::describe) and a newline to `buffer`.
    pub fn dump_to_buffer(&self, buffer: &mut Buffer, source: &[u8]) {
        let location = self.locate(source);
        buffer.append_fmt(format_args!(
            "Error at row {}, column: {} ({} bytes into json)\n",
            location.row, location.column, location.offset
        ));
    }
}
