//! # Lexer
//!
//! Splits `.proto` source into tokens with 1-based line/column positions.
//! Comments (`//` to end of line, `/* ... */`) and whitespace are dropped.
//! String literals are unescaped here into raw bytes, because a `bytes`
//! default may hold octets that are not valid UTF-8.

use dynproto_core::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Tok {
    /// Identifier or keyword. Dots are separate `Symbol` tokens.
    Ident(String),
    /// Integer literal (decimal, `0x` hex or leading-zero octal).
    Int(u64),
    /// Floating-point literal.
    Float(f64),
    /// String literal after unescaping.
    Str(Vec<u8>),
    /// Any single punctuation character.
    Symbol(char),
    Eof,
}

impl Tok {
    /// Short description for "expected X, found Y" messages.
    pub(crate) fn describe(&self) -> String {
        match self {
            Tok::Ident(s) => format!("'{s}'"),
            Tok::Int(n) => format!("integer {n}"),
            Tok::Float(x) => format!("float {x}"),
            Tok::Str(_) => "string literal".to_string(),
            Tok::Symbol(c) => format!("'{c}'"),
            Tok::Eof => "end of file".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub tok: Tok,
    pub line: usize,
    pub column: usize,
}

struct Lexer<'a> {
    file: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: usize,
    column: usize,
}

/// Tokenize a whole file. The last token is always `Eof`.
pub(crate) fn tokenize(file: &str, source: &str) -> Result<Vec<Token>, ParseError> {
    let mut lexer = Lexer { file, chars: source.chars().collect(), pos: 0, line: 1, column: 1 };
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next_token()?;
        let done = token.tok == Tok::Eof;
        tokens.push(token);
        if done {
            return Ok(tokens);
        }
    }
}

impl<'a> Lexer<'a> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn error(&self, line: usize, column: usize, message: impl Into<String>) -> ParseError {
        ParseError::Syntax { file: self.file.to_string(), line, column, message: message.into() }
    }

    fn skip_trivia(&mut self) -> Result<(), ParseError> {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => {
                    self.bump();
                }
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    let (line, column) = (self.line, self.column);
                    self.bump();
                    self.bump();
                    loop {
                        match (self.peek(), self.peek_at(1)) {
                            (Some('*'), Some('/')) => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            (Some(_), _) => {
                                self.bump();
                            }
                            (None, _) => {
                                return Err(self.error(line, column, "unterminated block comment"))
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_trivia()?;
        let (line, column) = (self.line, self.column);
        let tok = match self.peek() {
            None => Tok::Eof,
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                let mut ident = String::new();
                while let Some(c) = self.peek() {
                    if c.is_ascii_alphanumeric() || c == '_' {
                        ident.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Tok::Ident(ident)
            }
            Some(c) if c.is_ascii_digit() => self.number(line, column)?,
            // `.5` is a float; a lone `.` separates name segments.
            Some('.') if self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) => {
                self.number(line, column)?
            }
            Some(q @ ('"' | '\'')) => {
                self.bump();
                Tok::Str(self.string_body(q, line, column)?)
            }
            Some(c) => {
                self.bump();
                Tok::Symbol(c)
            }
        };
        Ok(Token { tok, line, column })
    }

    fn number(&mut self, line: usize, column: usize) -> Result<Tok, ParseError> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.bump();
            self.bump();
            let mut digits = String::new();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                digits.push(c);
                self.bump();
            }
            return u64::from_str_radix(&digits, 16)
                .map(Tok::Int)
                .map_err(|_| self.error(line, column, format!("invalid hex literal '0x{digits}'")));
        }

        let mut text = String::new();
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    self.bump();
                    if let Some(sign @ ('+' | '-')) = self.peek() {
                        text.push(sign);
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            text.push(c);
            self.bump();
        }
        if self.peek().is_some_and(|c| c.is_ascii_alphabetic() || c == '_') {
            return Err(self.error(line, column, format!("invalid numeric literal '{text}...'")));
        }

        if is_float {
            return text
                .parse::<f64>()
                .map(Tok::Float)
                .map_err(|_| self.error(line, column, format!("invalid float literal '{text}'")));
        }
        let parsed = if text.len() > 1 && text.starts_with('0') {
            u64::from_str_radix(&text[1..], 8)
        } else {
            text.parse::<u64>()
        };
        parsed
            .map(Tok::Int)
            .map_err(|_| self.error(line, column, format!("invalid integer literal '{text}'")))
    }

    fn string_body(&mut self, quote: char, line: usize, column: usize) -> Result<Vec<u8>, ParseError> {
        let mut out = Vec::new();
        loop {
            let c = match self.bump() {
                None | Some('\n') => return Err(self.error(line, column, "unterminated string literal")),
                Some(c) => c,
            };
            if c == quote {
                return Ok(out);
            }
            if c != '\\' {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                continue;
            }
            let (esc_line, esc_column) = (self.line, self.column);
            let escaped = self
                .bump()
                .ok_or_else(|| self.error(line, column, "unterminated string literal"))?;
            match escaped {
                'n' => out.push(b'\n'),
                'r' => out.push(b'\r'),
                't' => out.push(b'\t'),
                'a' => out.push(0x07),
                'b' => out.push(0x08),
                'f' => out.push(0x0C),
                'v' => out.push(0x0B),
                '\\' => out.push(b'\\'),
                '\'' => out.push(b'\''),
                '"' => out.push(b'"'),
                '?' => out.push(b'?'),
                'x' | 'X' => {
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    while digits < 2 {
                        match self.peek().and_then(|c| c.to_digit(16)) {
                            Some(d) => {
                                value = value * 16 + d;
                                digits += 1;
                                self.bump();
                            }
                            None => break,
                        }
                    }
                    if digits == 0 {
                        return Err(self.error(esc_line, esc_column, "\\x used with no following hex digits"));
                    }
                    out.push(value as u8);
                }
                '0'..='7' => {
                    let mut value = escaped.to_digit(8).unwrap_or(0);
                    let mut digits = 1;
                    while digits < 3 {
                        match self.peek().and_then(|c| c.to_digit(8)) {
                            Some(d) => {
                                value = value * 8 + d;
                                digits += 1;
                                self.bump();
                            }
                            None => break,
                        }
                    }
                    out.push(value as u8);
                }
                other => {
                    return Err(self.error(esc_line, esc_column, format!("invalid escape sequence '\\{other}'")))
                }
            }
        }
    }
}
