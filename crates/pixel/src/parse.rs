//! Recursive-descent parser for rendered commands.
//!
//! Whitespace between tokens is free. String literals run to the next double
//! quote; there are no escape sequences since rendering never emits a double
//! quote inside a string.

use log::trace;

use crate::{Command, GrammarError, Value};

/// Parse one command such as `Verb ( key = value, ... ) ;` or `Verb();`.
pub fn parse(input: &str) -> Result<Command, GrammarError> {
    let mut parser = Parser { src: input, pos: 0 };
    let command = parser.command()?;
    trace!("Parsed command '{}' with {} args", command.verb(), command.args().len());
    Ok(command)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn command(&mut self) -> Result<Command, GrammarError> {
        self.skip_ws();
        let mut command = Command::new(self.ident("verb")?);

        self.skip_ws();
        self.expect('(', "'('")?;
        self.skip_ws();

        if self.peek() == Some(')') {
            self.bump();
        } else {
            loop {
                self.skip_ws();
                let key = self.ident("argument name")?;
                self.skip_ws();
                self.expect('=', "'='")?;
                self.skip_ws();
                let value = self.value()?;
                command = command.arg(key, value);
                self.skip_ws();

                let at = self.pos;
                match self.bump() {
                    Some(',') => continue,
                    Some(')') => break,
                    Some(found) => return Err(self.unexpected_at(found, at, "',' or ')'")),
                    None => return Err(GrammarError::UnexpectedEnd { expected: "',' or ')'" }),
                }
            }
        }

        self.skip_ws();
        self.expect(';', "';'")?;
        self.skip_ws();

        if self.pos < self.src.len() {
            return Err(GrammarError::TrailingInput(self.pos));
        }

        Ok(command)
    }

    fn value(&mut self) -> Result<Value, GrammarError> {
        match self.peek() {
            Some('"') => self.string().map(Value::Str),
            Some('[') => self.list(),
            Some('{') => self.map(),
            Some(c) if c == '-' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => {
                let start = self.pos;
                match self.ident("value")?.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    _ => Err(self.unexpected_at(c, start, "value")),
                }
            }
            Some(found) => Err(self.unexpected(found, "value")),
            None => Err(GrammarError::UnexpectedEnd { expected: "value" }),
        }
    }

    fn string(&mut self) -> Result<String, GrammarError> {
        self.expect('"', "'\"'")?;
        let start = self.pos;
        match self.src[start..].find('"') {
            Some(len) => {
                self.pos = start + len + 1;
                Ok(self.src[start..start + len].to_string())
            }
            None => Err(GrammarError::UnexpectedEnd {
                expected: "closing '\"'",
            }),
        }
    }

    fn number(&mut self) -> Result<Value, GrammarError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.bump();
            } else {
                break;
            }
        }

        let text = &self.src[start..self.pos];
        text.parse::<f64>()
            .ok()
            .and_then(Value::number)
            .ok_or_else(|| GrammarError::InvalidNumber {
                text: text.to_string(),
                position: start,
            })
    }

    fn list(&mut self) -> Result<Value, GrammarError> {
        self.expect('[', "'['")?;
        let mut items = Vec::new();
        self.skip_ws();

        if self.peek() == Some(']') {
            self.bump();
            return Ok(Value::List(items));
        }

        loop {
            self.skip_ws();
            items.push(self.value()?);
            self.skip_ws();

            let at = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some(']') => return Ok(Value::List(items)),
                Some(found) => return Err(self.unexpected_at(found, at, "',' or ']'")),
                None => return Err(GrammarError::UnexpectedEnd { expected: "',' or ']'" }),
            }
        }
    }

    fn map(&mut self) -> Result<Value, GrammarError> {
        self.expect('{', "'{'")?;
        let mut entries = Vec::new();
        self.skip_ws();

        if self.peek() == Some('}') {
            self.bump();
            return Ok(Value::Map(entries));
        }

        loop {
            self.skip_ws();
            let key = self.string()?;
            self.skip_ws();
            self.expect(':', "':'")?;
            self.skip_ws();
            entries.push((key, self.value()?));
            self.skip_ws();

            let at = self.pos;
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Map(entries)),
                Some(found) => return Err(self.unexpected_at(found, at, "',' or '}'")),
                None => return Err(GrammarError::UnexpectedEnd { expected: "',' or '}'" }),
            }
        }
    }

    fn ident(&mut self, expected: &'static str) -> Result<String, GrammarError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            Some(found) => return Err(self.unexpected(found, expected)),
            None => return Err(GrammarError::UnexpectedEnd { expected }),
        }

        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }

        Ok(self.src[start..self.pos].to_string())
    }

    fn expect(&mut self, ch: char, expected: &'static str) -> Result<(), GrammarError> {
        match self.peek() {
            Some(c) if c == ch => {
                self.bump();
                Ok(())
            }
            Some(found) => Err(self.unexpected(found, expected)),
            None => Err(GrammarError::UnexpectedEnd { expected }),
        }
    }

    fn unexpected(&self, found: char, expected: &'static str) -> GrammarError {
        self.unexpected_at(found, self.pos, expected)
    }

    fn unexpected_at(&self, found: char, position: usize, expected: &'static str) -> GrammarError {
        GrammarError::UnexpectedChar {
            found,
            position,
            expected,
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }
}
