// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP lexical scanner
//!
//! Splits a buffered STEP document into tokens. Keywords, enumerations and
//! unescaped strings are slices of the input; string and binary bodies are
//! decoded as they are scanned.

use std::borrow::Cow;

use nom::{
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of, satisfy},
    combinator::{opt, recognize},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::binary::{decode_binary, BinaryValue};
use crate::error::{Error, Result};
use crate::escape::decode_string_cow;

/// Kind and payload of a STEP token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    /// String literal: 'text' (decoded)
    String(Cow<'a, str>),
    /// Binary literal: "0FF"
    Binary(BinaryValue),
    /// Integer: 42, -42
    Integer(i64),
    /// Real: 3.14, 0., 1.5E-10
    Real(f64),
    /// Keyword: IFCWALL, FILE_NAME, !USER_DEFINED
    Keyword(&'a str),
    /// Entity instance name: #123
    EntityRef(u64),
    /// Enumeration: .T., .ELEMENT. (dots stripped)
    Enumeration(&'a str),
    LParen,
    RParen,
    Comma,
    Semicolon,
    Equals,
    /// Omitted value: $
    Omitted,
    /// Inherited / derived value: *
    Inherited,
    /// ISO-10303-21
    IsoBegin,
    /// END-ISO-10303-21
    IsoEnd,
    /// HEADER
    Header,
    /// DATA
    Data,
    /// ENDSEC
    EndSec,
    /// End of input
    End,
}

impl TokenKind<'_> {
    /// Whether the token is a complete parameter value on its own
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            TokenKind::String(_)
                | TokenKind::Binary(_)
                | TokenKind::Integer(_)
                | TokenKind::Real(_)
                | TokenKind::EntityRef(_)
                | TokenKind::Enumeration(_)
                | TokenKind::Omitted
                | TokenKind::Inherited
        )
    }

    /// Short description used in syntax errors
    pub fn describe(&self) -> String {
        match self {
            TokenKind::String(s) => format!("string '{}'", truncate(s)),
            TokenKind::Binary(_) => "binary literal".to_string(),
            TokenKind::Integer(i) => format!("integer {}", i),
            TokenKind::Real(r) => format!("real {}", r),
            TokenKind::Keyword(k) => format!("keyword {}", k),
            TokenKind::EntityRef(id) => format!("entity reference #{}", id),
            TokenKind::Enumeration(e) => format!("enumeration .{}.", e),
            TokenKind::LParen => "'('".to_string(),
            TokenKind::RParen => "')'".to_string(),
            TokenKind::Comma => "','".to_string(),
            TokenKind::Semicolon => "';'".to_string(),
            TokenKind::Equals => "'='".to_string(),
            TokenKind::Omitted => "'$'".to_string(),
            TokenKind::Inherited => "'*'".to_string(),
            TokenKind::IsoBegin => "ISO-10303-21".to_string(),
            TokenKind::IsoEnd => "END-ISO-10303-21".to_string(),
            TokenKind::Header => "HEADER".to_string(),
            TokenKind::Data => "DATA".to_string(),
            TokenKind::EndSec => "ENDSEC".to_string(),
            TokenKind::End => "end of input".to_string(),
        }
    }
}

fn truncate(s: &str) -> &str {
    match s.char_indices().nth(32) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}

/// A token and the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub offset: usize,
}

/// Keyword: optional '!' then [A-Z_][A-Z0-9_]*
fn keyword(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        pair(opt(char('!')), satisfy(|c: char| c.is_ascii_uppercase() || c == '_')),
        take_while(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'),
    ))(input)
}

/// Entity instance name digits after '#'
fn entity_ref(input: &str) -> IResult<&str, &str> {
    preceded(char('#'), digit1)(input)
}

/// Number: [+-]digits[.digits][E[+-]digits]
fn number(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(one_of("+-")),
        digit1,
        opt(pair(char('.'), digit0)),
        opt(tuple((one_of("eE"), opt(one_of("+-")), digit1))),
    )))(input)
}

/// Enumeration: .NAME. (returns NAME)
fn enumeration(input: &str) -> IResult<&str, &str> {
    delimited(
        char('.'),
        recognize(pair(
            satisfy(|c: char| c.is_ascii_uppercase() || c == '_'),
            take_while(|c: char| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'),
        )),
        char('.'),
    )(input)
}

/// File delimiters, which are not keywords because of the hyphens
fn file_delimiter(input: &str) -> IResult<&str, &str> {
    nom::branch::alt((tag("END-ISO-10303-21"), tag("ISO-10303-21")))(input)
}

/// Whitespace run
fn whitespace(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_whitespace())(input)
}

/// Streaming tokenizer over a buffered STEP document
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer at the start of `input`
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// The full input being scanned
    #[inline]
    pub fn source(&self) -> &'a str {
        self.input
    }

    /// Current byte offset
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    #[inline]
    fn rest(&self) -> &'a str {
        &self.input[self.position..]
    }

    /// Advance past a nom match: `rest` is what the combinator left over
    #[inline]
    fn advance_to(&mut self, rest: &'a str) {
        self.position = self.input.len() - rest.len();
    }

    /// Skip whitespace and /* remarks */
    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            if let Ok((rest, _)) = whitespace(self.rest()) {
                self.advance_to(rest);
            }
            if !self.rest().starts_with("/*") {
                return Ok(());
            }
            let body = &self.rest().as_bytes()[2..];
            match memchr::memmem::find(body, b"*/") {
                Some(end) => self.position += 2 + end + 2,
                None => return Err(Error::lex(self.input, self.position, "unterminated remark")),
            }
        }
    }

    /// Scan the next token; returns `TokenKind::End` at end of input
    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_trivia()?;
        let start = self.position;
        let rest = self.rest();

        let Some(&first) = rest.as_bytes().first() else {
            return Ok(Token { kind: TokenKind::End, offset: start });
        };

        let punct = match first {
            b'(' => Some(TokenKind::LParen),
            b')' => Some(TokenKind::RParen),
            b',' => Some(TokenKind::Comma),
            b';' => Some(TokenKind::Semicolon),
            b'=' => Some(TokenKind::Equals),
            b'$' => Some(TokenKind::Omitted),
            b'*' => Some(TokenKind::Inherited),
            _ => None,
        };
        if let Some(kind) = punct {
            self.position += 1;
            return Ok(Token { kind, offset: start });
        }

        if let Ok((after, text)) = file_delimiter(rest) {
            self.advance_to(after);
            let kind = if text.starts_with("END") {
                TokenKind::IsoEnd
            } else {
                TokenKind::IsoBegin
            };
            return Ok(Token { kind, offset: start });
        }

        let kind = match first {
            b'\'' => self.string_literal()?,
            b'"' => self.binary_literal()?,
            b'#' => self.entity_ref()?,
            b'.' => self.enumeration()?,
            b'0'..=b'9' | b'+' | b'-' => self.number()?,
            b'A'..=b'Z' | b'_' | b'!' => self.keyword()?,
            _ => return Err(self.unexpected(start)),
        };

        Ok(Token { kind, offset: start })
    }

    fn unexpected(&self, offset: usize) -> Error {
        let c = self.input[offset..].chars().next().unwrap_or(' ');
        Error::lex(self.input, offset, format!("unexpected character {:?}", c))
    }

    fn keyword(&mut self) -> Result<TokenKind<'a>> {
        let start = self.position;
        let (rest, word) = keyword(self.rest()).map_err(|_| {
            Error::lex(self.input, start, "'!' must be followed by a keyword")
        })?;
        if let Some(c) = rest.chars().next() {
            if c == '.' || c == '!' || c.is_ascii_lowercase() {
                return Err(Error::lex(
                    self.input,
                    start,
                    format!("invalid keyword: {:?} cannot follow {}", c, word),
                ));
            }
        }
        self.advance_to(rest);

        Ok(match word {
            "HEADER" => TokenKind::Header,
            "DATA" => TokenKind::Data,
            "ENDSEC" => TokenKind::EndSec,
            _ => TokenKind::Keyword(word),
        })
    }

    fn entity_ref(&mut self) -> Result<TokenKind<'a>> {
        let start = self.position;
        let (rest, digits) = entity_ref(self.rest())
            .map_err(|_| Error::lex(self.input, start, "expected digits after '#'"))?;
        let id = lexical_core::parse::<u64>(digits.as_bytes())
            .map_err(|_| Error::lex(self.input, start, "entity instance name out of range"))?;
        self.advance_to(rest);
        Ok(TokenKind::EntityRef(id))
    }

    fn enumeration(&mut self) -> Result<TokenKind<'a>> {
        let start = self.position;
        let (rest, name) = enumeration(self.rest())
            .map_err(|_| Error::lex(self.input, start, "malformed enumeration"))?;
        self.advance_to(rest);
        Ok(TokenKind::Enumeration(name))
    }

    fn number(&mut self) -> Result<TokenKind<'a>> {
        let start = self.position;
        let (rest, text) = number(self.rest())
            .map_err(|_| Error::lex(self.input, start, "expected digits after sign"))?;
        self.advance_to(rest);

        let unsigned = text.strip_prefix('+').unwrap_or(text);
        if text.contains(['.', 'e', 'E']) {
            let value: f64 = fast_float::parse(unsigned)
                .map_err(|_| Error::lex(self.input, start, format!("invalid real {}", text)))?;
            if !value.is_finite() {
                return Err(Error::lex(self.input, start, format!("real {} out of range", text)));
            }
            Ok(TokenKind::Real(value))
        } else {
            let value = lexical_core::parse::<i64>(unsigned.as_bytes())
                .map_err(|_| Error::lex(self.input, start, format!("integer {} out of range", text)))?;
            Ok(TokenKind::Integer(value))
        }
    }

    fn string_literal(&mut self) -> Result<TokenKind<'a>> {
        let start = self.position;
        let bytes = self.input.as_bytes();
        let body_start = start + 1;
        let mut i = body_start;

        // Closing apostrophe is the first one that is not doubled
        let body_end = loop {
            match memchr::memchr(b'\'', &bytes[i..]) {
                Some(off) => {
                    let quote = i + off;
                    if bytes.get(quote + 1) == Some(&b'\'') {
                        i = quote + 2;
                    } else {
                        break quote;
                    }
                }
                None => return Err(Error::lex(self.input, start, "unterminated string literal")),
            }
        };

        let body = &self.input[body_start..body_end];
        let decoded = decode_string_cow(body).map_err(|e| e.rebase(self.input, body_start))?;
        self.position = body_end + 1;
        Ok(TokenKind::String(decoded))
    }

    fn binary_literal(&mut self) -> Result<TokenKind<'a>> {
        let start = self.position;
        let body_start = start + 1;
        let body_len = memchr::memchr(b'"', &self.input.as_bytes()[body_start..])
            .ok_or_else(|| Error::lex(self.input, start, "unterminated binary literal"))?;
        let body = &self.input[body_start..body_start + body_len];
        let value = decode_binary(body).map_err(|e| e.rebase(self.input, body_start))?;
        self.position = body_start + body_len + 1;
        Ok(TokenKind::Binary(value))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>>;

    /// Yields tokens up to (not including) `End`; stops after the first error
    fn next(&mut self) -> Option<Self::Item> {
        if self.position > self.input.len() {
            return None;
        }
        match self.next_token() {
            Ok(Token { kind: TokenKind::End, .. }) => None,
            Ok(token) => Some(Ok(token)),
            Err(e) => {
                self.position = self.input.len() + 1;
                Some(Err(e))
            }
        }
    }
}

/// Tokenize a whole document (the trailing `End` token is not included)
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>> {
    Lexer::new(input).collect()
}
