// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for STEP parsing.

use std::fmt;

/// Result type for STEP parsing
pub type Result<T> = std::result::Result<T, Error>;

/// Location of a fault in the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// Byte offset from the start of the input
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column (in bytes) within the line
    pub column: usize,
}

impl Position {
    /// Resolve a byte offset into line and column within `source`.
    ///
    /// Offsets past the end are clamped to the end of the input.
    pub fn locate(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = &source.as_bytes()[..offset];
        let line = memchr::memchr_iter(b'\n', before).count() + 1;
        let line_start = memchr::memrchr(b'\n', before).map_or(0, |i| i + 1);
        Self {
            offset,
            line,
            column: offset - line_start + 1,
        }
    }
}

/// The start of the input: line 1, column 1
impl Default for Position {
    fn default() -> Self {
        Self {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {} (offset {})", self.line, self.column, self.offset)
    }
}

/// Errors that can occur while reading a STEP physical file
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No valid token starts here, or a literal is unterminated.
    #[error("lexical error at {position}: {message}")]
    Lex { position: Position, message: String },

    /// Malformed string escape or binary literal body.
    #[error("decode error at {position}: {message}")]
    Decode { position: Position, message: String },

    /// The token stream does not match the grammar.
    #[error("syntax error at {position}: expected {expected}, found {found}")]
    Syntax {
        position: Position,
        expected: String,
        found: String,
    },

    /// Grammatically valid document violating a file-level invariant.
    #[error("structure error at {position}: {message}")]
    Structure { position: Position, message: String },
}

impl Error {
    pub(crate) fn lex(source: &str, offset: usize, message: impl Into<String>) -> Self {
        Error::Lex {
            position: Position::locate(source, offset),
            message: message.into(),
        }
    }

    pub(crate) fn decode(source: &str, offset: usize, message: impl Into<String>) -> Self {
        Error::Decode {
            position: Position::locate(source, offset),
            message: message.into(),
        }
    }

    pub(crate) fn syntax(
        source: &str,
        offset: usize,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Error::Syntax {
            position: Position::locate(source, offset),
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub(crate) fn structure(source: &str, offset: usize, message: impl Into<String>) -> Self {
        Error::Structure {
            position: Position::locate(source, offset),
            message: message.into(),
        }
    }

    /// Where the error was detected
    pub fn position(&self) -> Position {
        match self {
            Error::Lex { position, .. }
            | Error::Decode { position, .. }
            | Error::Syntax { position, .. }
            | Error::Structure { position, .. } => *position,
        }
    }

    /// Shift a decode error raised on a literal body to its place in `source`.
    ///
    /// Decoders report offsets relative to the body they were given; the
    /// scanner knows where that body starts.
    pub(crate) fn rebase(self, source: &str, base: usize) -> Self {
        match self {
            Error::Decode { position, message } => {
                Error::decode(source, base + position.offset, message)
            }
            other => other,
        }
    }
}
