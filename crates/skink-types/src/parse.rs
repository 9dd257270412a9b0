//! Annotation type string parsing
//!
//! Turns already-extracted docblock type strings into [`Union`] values:
//! `int|null`, `?string`, `array<int, string>`, `array{id: int}`, class
//! names, and the `self`/`static`/`$param` placeholders substituted later
//! by the checker.

use std::collections::BTreeMap;

use crate::atomic::Atomic;
use crate::combine::combine;
use crate::error::TypeParseError;
use crate::union::Union;

/// Parses a type string into a union.
pub fn parse(input: &str) -> Result<Union, TypeParseError> {
    let mut parser = Parser { input, pos: 0 };
    parser.skip_ws();
    if parser.at_end() {
        return Err(TypeParseError::EmptyInput);
    }
    let union = parser.parse_union()?;
    parser.skip_ws();
    if !parser.at_end() {
        return Err(TypeParseError::TrailingInput { offset: parser.pos });
    }
    Ok(union)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), TypeParseError> {
        if self.eat(expected) {
            Ok(())
        } else if self.at_end() {
            Err(TypeParseError::UnexpectedEnd)
        } else {
            Err(TypeParseError::Expected {
                expected,
                offset: self.pos,
            })
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn parse_union(&mut self) -> Result<Union, TypeParseError> {
        let mut nullable = false;
        let mut parts = Vec::new();
        loop {
            self.skip_ws();
            if self.eat('?') {
                nullable = true;
                self.skip_ws();
            }
            parts.push(self.parse_part()?);
            self.skip_ws();
            if !self.eat('|') {
                break;
            }
        }
        if nullable {
            parts.push(Atomic::Null);
        }
        Ok(combine(parts))
    }

    fn parse_part(&mut self) -> Result<Atomic, TypeParseError> {
        let name = self.parse_name()?;
        self.skip_ws();
        match self.peek() {
            Some('<') => {
                self.bump();
                let mut params = Vec::new();
                loop {
                    params.push(self.parse_union()?);
                    self.skip_ws();
                    if !self.eat(',') {
                        break;
                    }
                }
                self.expect('>')?;
                Ok(Atomic::Generic { name, params })
            }
            Some('{') => {
                self.bump();
                let mut fields = BTreeMap::new();
                self.skip_ws();
                if !self.eat('}') {
                    loop {
                        self.skip_ws();
                        let key = self.parse_key()?;
                        self.skip_ws();
                        self.expect(':')?;
                        let ty = self.parse_union()?;
                        fields.insert(key, ty);
                        self.skip_ws();
                        if !self.eat(',') {
                            break;
                        }
                    }
                    self.expect('}')?;
                }
                Ok(Atomic::Shaped { name, fields })
            }
            _ => Ok(Atomic::from_name(&name)),
        }
    }

    fn parse_name(&mut self) -> Result<String, TypeParseError> {
        let start = self.pos;
        match self.peek() {
            None => return Err(TypeParseError::UnexpectedEnd),
            Some(c) if c.is_alphabetic() || c == '_' || c == '$' || c == '\\' => {
                self.bump();
            }
            Some(c) => {
                return Err(TypeParseError::UnexpectedChar {
                    found: c,
                    offset: self.pos,
                })
            }
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_' || c == '\\') {
            self.bump();
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_key(&mut self) -> Result<String, TypeParseError> {
        let start = self.pos;
        match self.peek() {
            None => return Err(TypeParseError::UnexpectedEnd),
            Some(c) if c.is_alphanumeric() || c == '_' => {
                self.bump();
            }
            Some(c) => {
                return Err(TypeParseError::UnexpectedChar {
                    found: c,
                    offset: self.pos,
                })
            }
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        Ok(self.input[start..self.pos].to_string())
    }
}
