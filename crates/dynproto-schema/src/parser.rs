//! # Parser — `.proto` Source to Syntax Tree
//!
//! Recursive-descent parser for proto2 and proto3 source. The output is an
//! unlinked syntax tree: type names are kept exactly as written and are
//! resolved later by the pool linker, once every imported file is known.
//!
//! Accepted but discarded: `service` and `extend` blocks, `extensions`
//! ranges, and every option other than `default`, `packed` and
//! `allow_alias`. Groups and editions are rejected.

use dynproto_core::{ParseError, ScalarKind, Syntax};

use crate::lexer::{tokenize, Tok, Token};

/// A parsed but unlinked schema file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAst {
    /// Virtual file name.
    pub name: String,
    pub syntax: Syntax,
    pub package: Option<String>,
    pub imports: Vec<Import>,
    pub messages: Vec<MessageAst>,
    pub enums: Vec<EnumAst>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    Default,
    Public,
    Weak,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    pub path: String,
    pub kind: ImportKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageAst {
    pub name: String,
    pub fields: Vec<FieldAst>,
    pub messages: Vec<MessageAst>,
    pub enums: Vec<EnumAst>,
    pub reserved_numbers: Vec<(u32, u32)>,
    pub reserved_names: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    /// No label: proto3 singular, map fields and oneof members.
    None,
    Optional,
    Required,
    Repeated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeAst {
    Scalar(ScalarKind),
    /// A message or enum name as written, possibly with a leading `.`.
    Named(String),
    Map(ScalarKind, Box<TypeAst>),
}

/// A constant on the right-hand side of an option.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Ident(String),
    Int { negative: bool, magnitude: u64 },
    Float(f64),
    Str(Vec<u8>),
    Aggregate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAst {
    pub name: String,
    pub number: u32,
    pub label: Label,
    pub ty: TypeAst,
    pub default: Option<Constant>,
    pub packed: Option<bool>,
    pub oneof: Option<String>,
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumAst {
    pub name: String,
    pub values: Vec<(String, i32)>,
    pub allow_alias: bool,
    pub line: usize,
    pub column: usize,
}

/// Parse one file's source text.
pub fn parse_file(name: &str, source: &str) -> Result<FileAst, ParseError> {
    let tokens = tokenize(name, source)?;
    Parser { file: name, tokens, pos: 0, syntax: Syntax::Proto2 }.file()
}

struct Parser<'a> {
    file: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    syntax: Syntax,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    // ── Token plumbing ──────────────────────────────────────────────

    fn peek(&self) -> &Token {
        // `tokenize` guarantees a trailing Eof, and `bump` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn bump(&mut self) -> Token {
        let token = self.peek().clone();
        if token.tok != Tok::Eof {
            self.pos += 1;
        }
        token
    }

    fn error_at(&self, token: &Token, message: impl Into<String>) -> ParseError {
        ParseError::Syntax {
            file: self.file.to_string(),
            line: token.line,
            column: token.column,
            message: message.into(),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        let token = self.peek();
        self.error_at(token, format!("expected {expected}, found {}", token.tok.describe()))
    }

    fn is_symbol(&self, c: char) -> bool {
        self.peek().tok == Tok::Symbol(c)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.peek().tok, Tok::Ident(s) if s == word)
    }

    fn eat_symbol(&mut self, c: char) -> bool {
        if self.is_symbol(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect_symbol(&mut self, c: char) -> PResult<()> {
        if self.eat_symbol(c) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{c}'")))
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> PResult<String> {
        match &self.peek().tok {
            Tok::Ident(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            _ => Err(self.unexpected("identifier")),
        }
    }

    /// `ident ("." ident)*`, with an optional leading dot when `allow_leading_dot`.
    fn dotted_name(&mut self, allow_leading_dot: bool) -> PResult<String> {
        let mut name = String::new();
        if allow_leading_dot && self.eat_symbol('.') {
            name.push('.');
        }
        name.push_str(&self.ident()?);
        while self.eat_symbol('.') {
            name.push('.');
            name.push_str(&self.ident()?);
        }
        Ok(name)
    }

    fn string_literal(&mut self) -> PResult<Vec<u8>> {
        let mut out = match &self.peek().tok {
            Tok::Str(bytes) => bytes.clone(),
            _ => return Err(self.unexpected("string literal")),
        };
        self.bump();
        // Adjacent literals concatenate.
        while let Tok::Str(bytes) = &self.peek().tok {
            out.extend_from_slice(bytes);
            self.bump();
        }
        Ok(out)
    }

    fn utf8_literal(&mut self) -> PResult<String> {
        let token = self.peek().clone();
        let bytes = self.string_literal()?;
        String::from_utf8(bytes).map_err(|_| self.error_at(&token, "string is not valid UTF-8"))
    }

    fn int_literal(&mut self) -> PResult<u64> {
        match self.peek().tok {
            Tok::Int(n) => {
                self.bump();
                Ok(n)
            }
            _ => Err(self.unexpected("integer")),
        }
    }

    fn field_number(&mut self) -> PResult<u32> {
        let token = self.peek().clone();
        let n = self.int_literal()?;
        u32::try_from(n).map_err(|_| self.error_at(&token, format!("field number {n} out of range")))
    }

    fn constant(&mut self) -> PResult<Constant> {
        if self.is_symbol('{') {
            self.skip_balanced('{', '}')?;
            return Ok(Constant::Aggregate);
        }
        let negative = self.eat_symbol('-');
        if !negative {
            self.eat_symbol('+');
        }
        let token = self.peek().clone();
        match token.tok {
            Tok::Int(magnitude) => {
                self.bump();
                Ok(Constant::Int { negative, magnitude })
            }
            Tok::Float(x) => {
                self.bump();
                Ok(Constant::Float(if negative { -x } else { x }))
            }
            Tok::Ident(ref s) if negative => match s.as_str() {
                "inf" => {
                    self.bump();
                    Ok(Constant::Float(f64::NEG_INFINITY))
                }
                "nan" => {
                    self.bump();
                    Ok(Constant::Float(f64::NAN))
                }
                _ => Err(self.unexpected("number")),
            },
            Tok::Ident(_) => Ok(Constant::Ident(self.dotted_name(false)?)),
            Tok::Str(_) if !negative => Ok(Constant::Str(self.string_literal()?)),
            _ => Err(self.unexpected("constant")),
        }
    }

    /// Skip a bracketed region starting at the current `open` token.
    fn skip_balanced(&mut self, open: char, close: char) -> PResult<()> {
        let start = self.peek().clone();
        self.expect_symbol(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            match self.bump().tok {
                Tok::Symbol(c) if c == open => depth += 1,
                Tok::Symbol(c) if c == close => depth -= 1,
                Tok::Eof => return Err(self.error_at(&start, format!("unclosed '{open}'"))),
                _ => {}
            }
        }
        Ok(())
    }

    /// Skip to and past the next `;` at the current nesting level.
    fn skip_statement(&mut self) -> PResult<()> {
        loop {
            if self.is_symbol('{') {
                self.skip_balanced('{', '}')?;
                continue;
            }
            match self.bump().tok {
                Tok::Symbol(';') => return Ok(()),
                Tok::Eof => return Err(self.unexpected("';'")),
                _ => {}
            }
        }
    }

    /// `option` name: `ident`, `(ext.name)`, followed by `.sub` parts.
    fn option_name(&mut self) -> PResult<String> {
        let mut name = String::new();
        loop {
            if self.eat_symbol('(') {
                name.push('(');
                name.push_str(&self.dotted_name(true)?);
                self.expect_symbol(')')?;
                name.push(')');
            } else {
                name.push_str(&self.ident()?);
            }
            if !self.eat_symbol('.') {
                return Ok(name);
            }
            name.push('.');
        }
    }

    /// `option name = constant ;` with the `option` keyword already consumed.
    fn option_statement(&mut self) -> PResult<(String, Constant)> {
        let name = self.option_name()?;
        self.expect_symbol('=')?;
        let value = self.constant()?;
        self.expect_symbol(';')?;
        Ok((name, value))
    }

    /// `[ name = constant, ... ]` if present.
    fn bracketed_options(&mut self) -> PResult<Vec<(String, Constant, Token)>> {
        let mut options = Vec::new();
        if !self.eat_symbol('[') {
            return Ok(options);
        }
        loop {
            let token = self.peek().clone();
            let name = self.option_name()?;
            self.expect_symbol('=')?;
            let value = self.constant()?;
            options.push((name, value, token));
            if self.eat_symbol(']') {
                return Ok(options);
            }
            self.expect_symbol(',')?;
        }
    }

    fn bool_option(&self, value: &Constant, token: &Token, name: &str) -> PResult<bool> {
        match value {
            Constant::Ident(s) if s == "true" => Ok(true),
            Constant::Ident(s) if s == "false" => Ok(false),
            _ => Err(self.error_at(token, format!("option '{name}' must be true or false"))),
        }
    }

    // ── Grammar ─────────────────────────────────────────────────────

    fn file(mut self) -> PResult<FileAst> {
        let mut ast = FileAst {
            name: self.file.to_string(),
            syntax: Syntax::Proto2,
            package: None,
            imports: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
        };

        if self.is_keyword("syntax") {
            self.bump();
            self.expect_symbol('=')?;
            let token = self.peek().clone();
            let syntax = self.utf8_literal()?;
            ast.syntax = match syntax.as_str() {
                "proto2" => Syntax::Proto2,
                "proto3" => Syntax::Proto3,
                other => return Err(self.error_at(&token, format!("unrecognized syntax '{other}'"))),
            };
            self.syntax = ast.syntax;
            self.expect_symbol(';')?;
        } else if self.is_keyword("edition") {
            let token = self.peek().clone();
            return Err(self.error_at(&token, "editions are not supported"));
        }

        loop {
            let token = self.peek().clone();
            match &token.tok {
                Tok::Eof => return Ok(ast),
                Tok::Symbol(';') => {
                    self.bump();
                }
                Tok::Ident(word) => match word.as_str() {
                    "package" => {
                        self.bump();
                        if ast.package.is_some() {
                            return Err(self.error_at(&token, "multiple package definitions"));
                        }
                        ast.package = Some(self.dotted_name(false)?);
                        self.expect_symbol(';')?;
                    }
                    "import" => {
                        self.bump();
                        let kind = if self.eat_keyword("public") {
                            ImportKind::Public
                        } else if self.eat_keyword("weak") {
                            ImportKind::Weak
                        } else {
                            ImportKind::Default
                        };
                        let path = self.utf8_literal()?;
                        self.expect_symbol(';')?;
                        ast.imports.push(Import { path, kind });
                    }
                    "option" => {
                        self.bump();
                        self.option_statement()?;
                    }
                    "message" => {
                        self.bump();
                        ast.messages.push(self.message()?);
                    }
                    "enum" => {
                        self.bump();
                        ast.enums.push(self.enum_def(&token)?);
                    }
                    "service" | "extend" => {
                        self.bump();
                        self.dotted_name(true)?;
                        self.skip_balanced('{', '}')?;
                    }
                    "syntax" => return Err(self.error_at(&token, "syntax must be the first statement")),
                    _ => return Err(self.unexpected("top-level statement")),
                },
                _ => return Err(self.unexpected("top-level statement")),
            }
        }
    }

    /// `message` keyword already consumed.
    fn message(&mut self) -> PResult<MessageAst> {
        let name = self.ident()?;
        let mut msg = MessageAst {
            name,
            fields: Vec::new(),
            messages: Vec::new(),
            enums: Vec::new(),
            reserved_numbers: Vec::new(),
            reserved_names: Vec::new(),
        };
        self.expect_symbol('{')?;
        while !self.eat_symbol('}') {
            let token = self.peek().clone();
            match &token.tok {
                Tok::Symbol(';') => {
                    self.bump();
                }
                Tok::Eof => return Err(self.unexpected("'}'")),
                Tok::Ident(word) => match word.as_str() {
                    "message" => {
                        self.bump();
                        msg.messages.push(self.message()?);
                    }
                    "enum" => {
                        self.bump();
                        msg.enums.push(self.enum_def(&token)?);
                    }
                    "option" => {
                        self.bump();
                        self.option_statement()?;
                    }
                    "reserved" => {
                        self.bump();
                        self.reserved(&mut msg.reserved_numbers, &mut msg.reserved_names)?;
                    }
                    "extensions" | "extend" => {
                        self.bump();
                        self.skip_statement_or_block()?;
                    }
                    "oneof" => {
                        self.bump();
                        self.oneof(&mut msg)?;
                    }
                    "map" if self.next_is_symbol('<') => {
                        self.bump();
                        msg.fields.push(self.map_field(&token, None)?);
                    }
                    _ => msg.fields.push(self.field(None)?),
                },
                Tok::Symbol('.') => msg.fields.push(self.field(None)?),
                _ => return Err(self.unexpected("message element")),
            }
        }
        Ok(msg)
    }

    fn next_is_symbol(&self, c: char) -> bool {
        self.tokens.get(self.pos + 1).is_some_and(|t| t.tok == Tok::Symbol(c))
    }

    /// `extend Foo { ... }` or `extensions 100 to 199;`.
    fn skip_statement_or_block(&mut self) -> PResult<()> {
        loop {
            if self.is_symbol('{') {
                return self.skip_balanced('{', '}');
            }
            match self.bump().tok {
                Tok::Symbol(';') => return Ok(()),
                Tok::Eof => return Err(self.unexpected("';'")),
                _ => {}
            }
        }
    }

    /// `reserved` keyword already consumed.
    fn reserved(&mut self, numbers: &mut Vec<(u32, u32)>, names: &mut Vec<String>) -> PResult<()> {
        loop {
            if matches!(self.peek().tok, Tok::Str(_)) {
                names.push(self.utf8_literal()?);
            } else {
                let start = self.field_number()?;
                let end = if self.eat_keyword("to") {
                    if self.eat_keyword("max") {
                        dynproto_core::wire::MAX_FIELD_NUMBER
                    } else {
                        self.field_number()?
                    }
                } else {
                    start
                };
                numbers.push((start, end));
            }
            if self.eat_symbol(';') {
                return Ok(());
            }
            self.expect_symbol(',')?;
        }
    }

    /// `oneof` keyword already consumed.
    fn oneof(&mut self, msg: &mut MessageAst) -> PResult<()> {
        let name = self.ident()?;
        self.expect_symbol('{')?;
        while !self.eat_symbol('}') {
            let token = self.peek().clone();
            match &token.tok {
                Tok::Symbol(';') => {
                    self.bump();
                }
                Tok::Ident(word) if word == "option" => {
                    self.bump();
                    self.option_statement()?;
                }
                Tok::Ident(word) if matches!(word.as_str(), "optional" | "required" | "repeated") => {
                    return Err(self.error_at(&token, "fields in oneofs must not have labels"));
                }
                Tok::Ident(word) if word == "map" && self.next_is_symbol('<') => {
                    return Err(self.error_at(&token, "map fields are not allowed in oneofs"));
                }
                Tok::Ident(_) | Tok::Symbol('.') => {
                    let field = self.field_body(Label::None, Some(name.clone()), &token)?;
                    msg.fields.push(field);
                }
                _ => return Err(self.unexpected("oneof field")),
            }
        }
        Ok(())
    }

    /// A normal field, starting at its label (or type when unlabelled).
    fn field(&mut self, oneof: Option<String>) -> PResult<FieldAst> {
        let token = self.peek().clone();
        let label = if self.eat_keyword("optional") {
            Label::Optional
        } else if self.eat_keyword("required") {
            if self.syntax == Syntax::Proto3 {
                return Err(self.error_at(&token, "required fields are not allowed in proto3"));
            }
            Label::Required
        } else if self.eat_keyword("repeated") {
            Label::Repeated
        } else {
            if self.syntax == Syntax::Proto2 {
                return Err(self.unexpected("\"required\", \"optional\", or \"repeated\""));
            }
            Label::None
        };
        if label != Label::None && self.is_keyword("map") && self.next_is_symbol('<') {
            return Err(self.error_at(&token, "map fields cannot have labels"));
        }
        self.field_body(label, oneof, &token)
    }

    /// `type name = number [options];` with the label already consumed.
    fn field_body(&mut self, label: Label, oneof: Option<String>, start: &Token) -> PResult<FieldAst> {
        if self.is_keyword("group") {
            return Err(self.error_at(start, "groups are not supported"));
        }
        let type_name = self.dotted_name(true)?;
        let ty = match type_name.parse::<ScalarKind>() {
            Ok(kind) => TypeAst::Scalar(kind),
            Err(_) => TypeAst::Named(type_name),
        };
        self.finish_field(label, ty, oneof, start)
    }

    /// `map` keyword already consumed; at `<`.
    fn map_field(&mut self, start: &Token, oneof: Option<String>) -> PResult<FieldAst> {
        self.expect_symbol('<')?;
        let key_token = self.peek().clone();
        let key_name = self.ident()?;
        let key = key_name
            .parse::<ScalarKind>()
            .ok()
            .filter(ScalarKind::is_map_key)
            .ok_or_else(|| self.error_at(&key_token, format!("'{key_name}' is not a valid map key type")))?;
        self.expect_symbol(',')?;
        let value_name = self.dotted_name(true)?;
        let value = match value_name.parse::<ScalarKind>() {
            Ok(kind) => TypeAst::Scalar(kind),
            Err(_) => TypeAst::Named(value_name),
        };
        self.expect_symbol('>')?;
        self.finish_field(Label::None, TypeAst::Map(key, Box::new(value)), oneof, start)
    }

    fn finish_field(
        &mut self,
        label: Label,
        ty: TypeAst,
        oneof: Option<String>,
        start: &Token,
    ) -> PResult<FieldAst> {
        let name = self.ident()?;
        self.expect_symbol('=')?;
        let number = self.field_number()?;
        let mut field = FieldAst {
            name,
            number,
            label,
            ty,
            default: None,
            packed: None,
            oneof,
            line: start.line,
            column: start.column,
        };
        for (option, value, token) in self.bracketed_options()? {
            match option.as_str() {
                "default" => {
                    if self.syntax == Syntax::Proto3 {
                        return Err(self.error_at(&token, "explicit default values are not allowed in proto3"));
                    }
                    if label == Label::Repeated {
                        return Err(self.error_at(&token, "repeated fields cannot have default values"));
                    }
                    field.default = Some(value);
                }
                "packed" => field.packed = Some(self.bool_option(&value, &token, "packed")?),
                _ => {}
            }
        }
        self.expect_symbol(';')?;
        Ok(field)
    }

    /// `enum` keyword already consumed.
    fn enum_def(&mut self, start: &Token) -> PResult<EnumAst> {
        let name = self.ident()?;
        let mut e = EnumAst {
            name,
            values: Vec::new(),
            allow_alias: false,
            line: start.line,
            column: start.column,
        };
        self.expect_symbol('{')?;
        while !self.eat_symbol('}') {
            let token = self.peek().clone();
            match &token.tok {
                Tok::Symbol(';') => {
                    self.bump();
                }
                Tok::Ident(word) if word == "option" => {
                    self.bump();
                    let (option, value) = self.option_statement()?;
                    if option == "allow_alias" {
                        e.allow_alias = self.bool_option(&value, &token, "allow_alias")?;
                    }
                }
                Tok::Ident(word) if word == "reserved" => {
                    self.bump();
                    self.skip_statement()?;
                }
                Tok::Ident(_) => {
                    let value_name = self.ident()?;
                    self.expect_symbol('=')?;
                    let negative = self.eat_symbol('-');
                    let number_token = self.peek().clone();
                    let magnitude = self.int_literal()?;
                    let signed = i64::try_from(magnitude).ok().map(|m| if negative { -m } else { m });
                    let number = signed
                        .and_then(|n| i32::try_from(n).ok())
                        .ok_or_else(|| self.error_at(&number_token, "enum value out of int32 range"))?;
                    self.bracketed_options()?;
                    self.expect_symbol(';')?;
                    e.values.push((value_name, number));
                }
                Tok::Eof => return Err(self.unexpected("'}'")),
                _ => return Err(self.unexpected("enum value")),
            }
        }
        Ok(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERSON: &str = r#"
        syntax = "proto3";
        package tutorial;

        import "google/protobuf/timestamp.proto";
        import public "common.proto";

        option java_package = "com.example.tutorial";

        message Person {
          string name = 1;
          int32 id = 2;  // Unique ID number for this person.
          string email = 3;

          enum PhoneType {
            MOBILE = 0;
            HOME = 1;
            WORK = 2;
          }

          message PhoneNumber {
            string number = 1;
            PhoneType type = 2;
          }

          repeated PhoneNumber phones = 4;
          map<string, int32> scores = 5 [deprecated = true];
          optional .tutorial.Person.PhoneType favourite = 6;
          oneof contact {
            string twitter = 7;
            string mastodon = 8;
          }
          reserved 9, 11 to 14;
          reserved "legacy";
        }

        service Directory {
          rpc Lookup (Person) returns (Person) { option (idempotent) = true; }
        }
    "#;

    #[test]
    fn test_parse_person_schema() {
        let ast = parse_file("person.proto", PERSON).unwrap();
        assert_eq!(ast.syntax, Syntax::Proto3);
        assert_eq!(ast.package.as_deref(), Some("tutorial"));
        assert_eq!(ast.imports.len(), 2);
        assert_eq!(ast.imports[1].kind, ImportKind::Public);
        assert_eq!(ast.messages.len(), 1);

        let person = &ast.messages[0];
        let names: Vec<&str> = person.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["name", "id", "email", "phones", "scores", "favourite", "twitter", "mastodon"]);
        assert_eq!(person.fields[3].label, Label::Repeated);
        assert_eq!(person.fields[3].ty, TypeAst::Named("PhoneNumber".into()));
        assert_eq!(
            person.fields[4].ty,
            TypeAst::Map(ScalarKind::String, Box::new(TypeAst::Scalar(ScalarKind::Int32)))
        );
        assert_eq!(person.fields[5].label, Label::Optional);
        assert_eq!(person.fields[5].ty, TypeAst::Named(".tutorial.Person.PhoneType".into()));
        assert_eq!(person.fields[6].oneof.as_deref(), Some("contact"));
        assert_eq!(person.reserved_numbers, vec![(9, 9), (11, 14)]);
        assert_eq!(person.reserved_names, vec!["legacy".to_string()]);
        assert_eq!(person.enums[0].values.len(), 3);
        assert_eq!(person.messages[0].name, "PhoneNumber");
    }

    #[test]
    fn test_proto2_defaults_and_labels() {
        let src = r#"
            message Config {
              required string host = 1;
              optional int32 port = 2 [default = 8080];
              optional double ratio = 3 [default = -inf];
              optional bytes magic = 4 [default = "\x00\xff"];
              optional Mode mode = 5 [default = FAST];
              repeated int32 ids = 6 [packed = true];
            }
            enum Mode { SLOW = 1; FAST = 2; }
        "#;
        let ast = parse_file("config.proto", src).unwrap();
        assert_eq!(ast.syntax, Syntax::Proto2);
        let fields = &ast.messages[0].fields;
        assert_eq!(fields[0].label, Label::Required);
        assert_eq!(fields[1].default, Some(Constant::Int { negative: false, magnitude: 8080 }));
        assert_eq!(fields[2].default, Some(Constant::Float(f64::NEG_INFINITY)));
        assert_eq!(fields[3].default, Some(Constant::Str(vec![0x00, 0xFF])));
        assert_eq!(fields[4].default, Some(Constant::Ident("FAST".into())));
        assert_eq!(fields[5].packed, Some(true));
        assert_eq!(ast.enums[0].values, vec![("SLOW".into(), 1), ("FAST".into(), 2)]);
    }

    #[test]
    fn test_proto2_requires_labels() {
        let err = parse_file("x.proto", "message X { int32 a = 1; }").unwrap_err();
        match err {
            ParseError::Syntax { line, column, message, .. } => {
                assert_eq!((line, column), (1, 13));
                assert!(message.contains("required"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_proto3_rejects_required_and_defaults() {
        let src = "syntax = \"proto3\"; message X { required int32 a = 1; }";
        assert!(parse_file("x.proto", src).is_err());
        let src = "syntax = \"proto3\"; message X { int32 a = 1 [default = 3]; }";
        assert!(parse_file("x.proto", src).is_err());
    }

    #[test]
    fn test_missing_semicolon_reports_position() {
        let src = "syntax = \"proto3\";\nmessage X {\n  int32 a = 1\n}";
        let err = parse_file("x.proto", src).unwrap_err();
        assert!(matches!(err, ParseError::Syntax { line: 4, column: 1, .. }), "{err}");
    }

    #[test]
    fn test_groups_rejected() {
        let src = "message X { optional group G = 1 { optional int32 a = 2; } }";
        assert!(parse_file("x.proto", src).is_err());
    }

    #[test]
    fn test_negative_enum_values() {
        let src = "syntax = \"proto3\"; enum E { ZERO = 0; NEG = -5; HEX = 0x10; }";
        let ast = parse_file("e.proto", src).unwrap();
        assert_eq!(ast.enums[0].values, vec![("ZERO".into(), 0), ("NEG".into(), -5), ("HEX".into(), 16)]);
    }

    #[test]
    fn test_invalid_map_key() {
        let src = "syntax = \"proto3\"; message X { map<double, string> m = 1; }";
        assert!(parse_file("x.proto", src).is_err());
    }

    #[test]
    fn test_field_named_map_is_not_a_map() {
        let src = "syntax = \"proto3\"; message X { string map = 1; map<int32, string> m = 2; }";
        let ast = parse_file("x.proto", src).unwrap();
        assert_eq!(ast.messages[0].fields[0].name, "map");
        assert!(matches!(ast.messages[0].fields[1].ty, TypeAst::Map(..)));
    }

    #[test]
    fn test_extensions_and_extend_are_skipped() {
        let src = r#"
            message Base { extensions 100 to max; optional int32 a = 1; }
            extend Base { optional int32 ext = 100; }
        "#;
        let ast = parse_file("x.proto", src).unwrap();
        assert_eq!(ast.messages.len(), 1);
        assert_eq!(ast.messages[0].fields.len(), 1);
    }
}
