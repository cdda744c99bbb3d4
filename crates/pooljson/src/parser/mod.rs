//! Single-pass, non-recursive JSON parser.
//!
//! The parser takes a mutable input buffer and builds a [`Value`] tree in a
//! [`Pool`]. String, key and number nodes alias the buffer instead of copying
//! it: the closing quote of every string and key is overwritten with a NUL
//! byte, and with [`ParserOptions::decode_strings`] escapes are decoded in
//! place. The buffer must outlive the tree.
//!
//! Containers are tracked through the `parent` links of the tree itself, so
//! nesting depth is limited only by memory.
//!
//! Beyond strict JSON the parser accepts a trailing comma before `}` or `]`
//! and the `nb` binary extension. Exponents (`1e5`) are rejected.

pub(crate) mod error;
pub(crate) mod options;

use std::mem;

use memchr::memchr;

pub use error::{Location, ParseError, SyntaxError};
pub use options::ParserOptions;

use crate::{
    escape,
    pool::Pool,
    value::{Kind, Text, Value},
};

/// Parses `input` into a tree allocated in `pool`.
///
/// # Errors
///
/// Returns the first syntax error with the byte offset it was found at.
pub fn parse<'a>(pool: &'a Pool, input: &'a mut [u8]) -> Result<&'a Value<'a>, ParseError> {
    parse_with_options(pool, input, ParserOptions::default())
}

/// [`parse`] with explicit [`ParserOptions`].
///
/// # Errors
///
/// Returns the first syntax error with the byte offset it was found at.
pub fn parse_with_options<'a>(
    pool: &'a Pool,
    input: &'a mut [u8],
    options: ParserOptions,
) -> Result<&'a Value<'a>, ParseError> {
    Parser {
        pool,
        rest: input,
        offset: 0,
        options,
    }
    .run()
    .inspect_err(|err| {
        tracing::debug!(offset = err.offset(), kind = %err.kind(), "json parse failed");
    })
}

/// Copies `input` into `pool` and parses the copy.
///
/// # Errors
///
/// Returns the first syntax error with the byte offset it was found at.
pub fn parse_copy<'a>(pool: &'a Pool, input: &[u8]) -> Result<&'a Value<'a>, ParseError> {
    parse(pool, pool.dup_unaligned(input))
}

/// [`parse_copy`] with explicit [`ParserOptions`].
///
/// # Errors
///
/// Returns the first syntax error with the byte offset it was found at.
pub fn parse_copy_with_options<'a>(
    pool: &'a Pool,
    input: &[u8],
    options: ParserOptions,
) -> Result<&'a Value<'a>, ParseError> {
    parse_with_options(pool, pool.dup_unaligned(input), options)
}

#[derive(Clone, Copy)]
enum State<'a> {
    /// Expecting the root value.
    Root,
    /// Expecting an element or `]`.
    Element(&'a Value<'a>),
    /// Expecting a key or `}`.
    Key(&'a Value<'a>),
    /// Expecting `:` after a key.
    Colon(&'a Value<'a>, &'a [u8]),
    /// Expecting the value of a key.
    Member(&'a Value<'a>, &'a [u8]),
    /// Expecting `,` or `}`.
    AfterMember(&'a Value<'a>),
    /// Expecting `,` or `]`.
    AfterElement(&'a Value<'a>),
}

impl<'a> State<'a> {
    fn opened(container: &'a Value<'a>) -> Self {
        if container.is_object() {
            State::Key(container)
        } else {
            State::Element(container)
        }
    }

    fn after(container: &'a Value<'a>) -> Self {
        if container.is_object() {
            State::AfterMember(container)
        } else {
            State::AfterElement(container)
        }
    }
}

struct Parser<'a> {
    pool: &'a Pool,
    rest: &'a mut [u8],
    offset: usize,
    options: ParserOptions,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<&'a Value<'a>, ParseError> {
        let mut state = State::Root;
        loop {
            self.skip_whitespace();
            let Some(byte) = self.peek() else {
                return Err(self.error(SyntaxError::UnexpectedEndOfInput));
            };
            state = match state {
                State::Root => {
                    let value = self.value(byte)?;
                    if !value.is_container() {
                        return self.finish(value);
                    }
                    State::opened(value)
                }
                State::Element(array) if byte == b']' => {
                    self.bump();
                    match array.parent() {
                        Some(parent) => State::after(parent),
                        None => return self.finish(array),
                    }
                }
                State::Element(array) => {
                    let value = self.value(byte)?;
                    array.link_child(&[], value);
                    if value.is_container() {
                        State::opened(value)
                    } else {
                        State::AfterElement(array)
                    }
                }
                State::Key(object) => match byte {
                    b'"' => {
                        self.bump();
                        let key = self.string_token(false)?;
                        State::Colon(object, key)
                    }
                    b'}' => {
                        self.bump();
                        match object.parent() {
                            Some(parent) => State::after(parent),
                            None => return self.finish(object),
                        }
                    }
                    _ => return Err(self.invalid(byte)),
                },
                State::Colon(object, key) => {
                    if byte != b':' {
                        return Err(self.invalid(byte));
                    }
                    self.bump();
                    State::Member(object, key)
                }
                State::Member(object, key) => {
                    let value = self.value(byte)?;
                    object.link_child(key, value);
                    if value.is_container() {
                        State::opened(value)
                    } else {
                        State::AfterMember(object)
                    }
                }
                State::AfterMember(object) => match byte {
                    b',' => {
                        self.bump();
                        State::Key(object)
                    }
                    b'}' => {
                        self.bump();
                        match object.parent() {
                            Some(parent) => State::after(parent),
                            None => return self.finish(object),
                        }
                    }
                    _ => return Err(self.invalid(byte)),
                },
                State::AfterElement(array) => match byte {
                    b',' => {
                        self.bump();
                        State::Element(array)
                    }
                    b']' => {
                        self.bump();
                        match array.parent() {
                            Some(parent) => State::after(parent),
                            None => return self.finish(array),
                        }
                    }
                    _ => return Err(self.invalid(byte)),
                },
            };
        }
    }

    /// Starts a value at the current byte. Containers come back empty.
    fn value(&mut self, byte: u8) -> Result<&'a Value<'a>, ParseError> {
        match byte {
            b'{' => {
                self.bump();
                Ok(Value::object(self.pool))
            }
            b'[' => {
                self.bump();
                Ok(Value::array(self.pool))
            }
            b'"' => {
                self.bump();
                let decode = self.options.decode_strings;
                let text = self.string_token(decode)?;
                Ok(Value::scalar(self.pool, Kind::String, Text::Borrowed(text), decode))
            }
            b'-' | b'0'..=b'9' => self.number(),
            b't' => self.literal(b"true", Kind::True),
            b'f' => self.literal(b"false", Kind::False),
            b'n' if self.rest.get(1) == Some(&b'b') => self.binary(),
            b'n' => self.literal(b"null", Kind::Null),
            _ => Err(self.invalid(byte)),
        }
    }

    /// Consumes a string body after its opening quote, NUL-terminating it in
    /// place of the closing quote.
    fn string_token(&mut self, decode: bool) -> Result<&'a [u8], ParseError> {
        let Some(close) = closing_quote(self.rest) else {
            let end = self.offset + self.rest.len();
            return Err(ParseError::new(SyntaxError::UnexpectedEndOfInput, end));
        };
        let token = self.take(close);
        self.rest[0] = 0;
        self.bump();
        if decode {
            let len = escape::decode_in_place(token);
            let token: &'a [u8] = token;
            Ok(&token[..len])
        } else {
            Ok(token)
        }
    }

    fn number(&mut self) -> Result<&'a Value<'a>, ParseError> {
        let (len, kind) =
            scan_number(self.rest).map_err(|(at, kind)| ParseError::new(kind, self.offset + at))?;
        let token = self.take(len);
        let text = if kind == Kind::Zero {
            Text::Static(b"0")
        } else {
            Text::Borrowed(token)
        };
        Ok(Value::scalar(self.pool, kind, text, false))
    }

    fn literal(&mut self, word: &'static [u8], kind: Kind) -> Result<&'a Value<'a>, ParseError> {
        for (at, &expected) in word.iter().enumerate() {
            match self.rest.get(at) {
                Some(&byte) if byte == expected => {}
                Some(&byte) => {
                    return Err(ParseError::new(
                        SyntaxError::InvalidCharacter(char::from(byte)),
                        self.offset + at,
                    ));
                }
                None => {
                    return Err(ParseError::new(
                        SyntaxError::UnexpectedEndOfInput,
                        self.offset + at,
                    ));
                }
            }
        }
        self.advance(word.len());
        Ok(Value::scalar(self.pool, kind, Text::Static(word), false))
    }

    fn binary(&mut self) -> Result<&'a Value<'a>, ParseError> {
        if self.options.disallow_binary {
            return Err(self.error(SyntaxError::BinaryDisabled));
        }
        self.advance(2);
        let Some(prefix) = self.rest.get(..4) else {
            let end = self.offset + self.rest.len();
            return Err(ParseError::new(SyntaxError::UnexpectedEndOfInput, end));
        };
        let mut len = [0; 4];
        len.copy_from_slice(prefix);
        self.advance(4);
        let declared = u32::from_ne_bytes(len) as usize;
        if declared > self.rest.len() {
            return Err(self.error(SyntaxError::TruncatedBinary {
                declared,
                available: self.rest.len(),
            }));
        }
        let payload = self.take(declared);
        Ok(Value::scalar(self.pool, Kind::Binary, Text::Borrowed(payload), false))
    }

    fn finish(&mut self, root: &'a Value<'a>) -> Result<&'a Value<'a>, ParseError> {
        if !self.options.allow_trailing_data {
            self.skip_whitespace();
            if self.peek().is_some() {
                return Err(self.error(SyntaxError::TrailingCharacters));
            }
        }
        Ok(root)
    }

    fn skip_whitespace(&mut self) {
        let n = self
            .rest
            .iter()
            .take_while(|b| matches!(b, b' ' | b'\t' | b'\n' | b'\r'))
            .count();
        self.advance(n);
    }

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.rest.first().copied()
    }

    #[inline]
    fn bump(&mut self) {
        self.advance(1);
    }

    fn advance(&mut self, n: usize) {
        let rest = mem::take(&mut self.rest);
        self.rest = &mut rest[n..];
        self.offset += n;
    }

    /// Splits off the next `len` bytes.
    fn take(&mut self, len: usize) -> &'a mut [u8] {
        let rest = mem::take(&mut self.rest);
        let (head, tail) = rest.split_at_mut(len);
        self.rest = tail;
        self.offset += len;
        head
    }

    fn error(&self, kind: SyntaxError) -> ParseError {
        ParseError::new(kind, self.offset)
    }

    fn invalid(&self, byte: u8) -> ParseError {
        self.error(SyntaxError::InvalidCharacter(char::from(byte)))
    }
}

/// Index of the quote closing a string body: the first `"` preceded by an
/// even run of backslashes.
pub(crate) fn closing_quote(bytes: &[u8]) -> Option<usize> {
    let mut from = 0;
    while let Some(found) = memchr(b'"', &bytes[from..]) {
        let quote = from + found;
        let backslashes = bytes[..quote].iter().rev().take_while(|&&b| b == b'\\').count();
        if backslashes % 2 == 0 {
            return Some(quote);
        }
        from = quote + 1;
    }
    None
}

/// Measures the number at the start of `bytes`.
///
/// `-?(0|[1-9][0-9]*)(\.[0-9]+)?`, not followed by an exponent. On failure
/// returns the offending offset.
fn scan_number(bytes: &[u8]) -> Result<(usize, Kind), (usize, SyntaxError)> {
    let digits = |from: usize| {
        bytes[from..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };
    let unexpected = |at: usize| match bytes.get(at) {
        Some(&byte) => (at, SyntaxError::InvalidCharacter(char::from(byte))),
        None => (at, SyntaxError::UnexpectedEndOfInput),
    };

    let mut at = usize::from(bytes.first() == Some(&b'-'));
    let mut kind = match bytes.get(at) {
        Some(b'0') => {
            at += 1;
            Kind::Zero
        }
        Some(b'1'..=b'9') => {
            at += digits(at);
            Kind::Number
        }
        _ => return Err(unexpected(at)),
    };
    if bytes.get(at) == Some(&b'.') {
        at += 1;
        let fraction = digits(at);
        if fraction == 0 {
            return Err(unexpected(at));
        }
        at += fraction;
        kind = Kind::Decimal;
    }
    if matches!(bytes.get(at), Some(b'e' | b'E')) {
        return Err(unexpected(at));
    }
    Ok((at, kind))
}
