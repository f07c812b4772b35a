//! Positional field scanner for tinc's whitespace-separated line formats.
//!
//! Every decoder walks its line left to right, naming each field as it
//! consumes it, so a malformed line reports exactly which field broke.

use std::str::{FromStr, SplitWhitespace};

/// A field-level decode failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("missing field `{field}` at position {position}")]
    Missing { field: &'static str, position: usize },

    #[error("invalid value {value:?} for field `{field}` at position {position}")]
    Invalid {
        field: &'static str,
        position: usize,
        value: String,
    },

    #[error("expected literal {expected:?} at position {position}, found {found:?}")]
    Literal {
        expected: &'static str,
        position: usize,
        found: String,
    },

    #[error("{count} unexpected trailing field(s) after position {position}")]
    Trailing { position: usize, count: usize },
}

/// Whether a decoded line produced a record or asked the reader to stop.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome<T> {
    Record(T),
    /// Stop consuming lines; this is a normal end of response.
    Stop,
}

/// Decoder for one response line of a particular request kind.
pub trait LineDecoder: Sized {
    fn decode_line(line: &str) -> Result<LineOutcome<Self>, DecodeError>;
}

/// Cursor over the whitespace-separated fields of one line.
pub struct Fields<'a> {
    tokens: SplitWhitespace<'a>,
    position: usize,
}

impl<'a> Fields<'a> {
    pub fn new(line: &'a str) -> Self {
        Self {
            tokens: line.split_whitespace(),
            position: 0,
        }
    }

    fn next_token(&mut self, field: &'static str) -> Result<(&'a str, usize), DecodeError> {
        let position = self.position + 1;
        let token = self
            .tokens
            .next()
            .ok_or(DecodeError::Missing { field, position })?;
        self.position = position;
        Ok((token, position))
    }

    /// Take the next field as an unparsed string.
    pub fn text(&mut self, field: &'static str) -> Result<&'a str, DecodeError> {
        self.next_token(field).map(|(token, _)| token)
    }

    /// Take the next field and require it to equal `expected`.
    pub fn literal(&mut self, expected: &'static str) -> Result<(), DecodeError> {
        let (token, position) = self.next_token(expected)?;
        if token != expected {
            return Err(DecodeError::Literal {
                expected,
                position,
                found: token.to_string(),
            });
        }
        Ok(())
    }

    /// Take the next field as a decimal number (or any `FromStr` value).
    pub fn parse<T: FromStr>(&mut self, field: &'static str) -> Result<T, DecodeError> {
        let (token, position) = self.next_token(field)?;
        token.parse().map_err(|_| DecodeError::Invalid {
            field,
            position,
            value: token.to_string(),
        })
    }

    /// Take the next field as a hexadecimal `u32`, with or without `0x`.
    pub fn hex(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let (token, position) = self.next_token(field)?;
        let digits = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
            .unwrap_or(token);
        u32::from_str_radix(digits, 16).map_err(|_| DecodeError::Invalid {
            field,
            position,
            value: token.to_string(),
        })
    }

    /// Consume a field that is present on the wire but carries nothing we keep.
    pub fn skip<T: FromStr>(&mut self, field: &'static str) -> Result<(), DecodeError> {
        self.parse::<T>(field).map(|_| ())
    }

    /// Require that every field has been consumed.
    pub fn finish(mut self) -> Result<(), DecodeError> {
        let count = self.tokens.by_ref().count();
        if count > 0 {
            return Err(DecodeError::Trailing {
                position: self.position,
                count,
            });
        }
        Ok(())
    }
}
