//! Restricted-literal grammar.
//!
//! Document queries arrive as text such as
//! `('doctors', {'age': {'$gt': 20}})`. This module recognizes only data
//! literals: mappings with string keys, sequences, strings, numbers,
//! booleans, null, and parenthesized groupings. It never evaluates anything.
//!
//! Lexing runs over the whole input before any structure is built. Any
//! token outside the grammar (identifiers, attribute access, operators,
//! comments) makes the input [`LiteralErrorKind::Unsafe`]. Calls and
//! subscripts on a literal (`{}.keys()`, `'a'[0]`, `x(1)`) are unsafe too.
//! Input made only of grammar tokens that does not form a single literal is
//! [`LiteralErrorKind::Malformed`].
//!
//! Accepted keyword spellings: `True`/`true`, `False`/`false`,
//! `None`/`null`. Strings use single or double quotes (triple quotes too),
//! optionally with an `r` or `u` prefix.

use std::fmt;

use serde_json::{Number, Value};

use crate::models::{Document, StructuredQuery};

/// Nesting depth beyond which input is rejected.
const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralErrorKind {
    /// Contains a construct outside the literal grammar.
    Unsafe,
    /// Uses only literal tokens but is not a well-formed literal.
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiteralError {
    pub kind: LiteralErrorKind,
    pub reason: String,
    /// Byte offset into the input.
    pub offset: usize,
}

impl LiteralError {
    fn unsafe_at(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            kind: LiteralErrorKind::Unsafe,
            reason: reason.into(),
            offset,
        }
    }

    fn malformed_at(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            kind: LiteralErrorKind::Malformed,
            reason: reason.into(),
            offset,
        }
    }
}

impl fmt::Display for LiteralError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}", self.reason, self.offset)
    }
}

impl std::error::Error for LiteralError {}

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Sequence(Vec<Literal>),
    /// Entries in source order; keys are always strings.
    Mapping(Vec<(String, Literal)>),
    /// A parenthesized grouping with a comma, e.g. `(a, b)` or `(a,)`.
    Group(Vec<Literal>),
}

impl Literal {
    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "boolean",
            Literal::Number(_) => "number",
            Literal::String(_) => "string",
            Literal::Sequence(_) => "sequence",
            Literal::Mapping(_) => "mapping",
            Literal::Group(_) => "grouping",
        }
    }

    /// Convert to a JSON value. Groupings have no JSON form.
    pub fn into_json(self) -> Result<Value, String> {
        Ok(match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(b),
            Literal::Number(n) => Value::Number(n),
            Literal::String(s) => Value::String(s),
            Literal::Sequence(items) => Value::Array(
                items
                    .into_iter()
                    .map(Literal::into_json)
                    .collect::<Result<_, _>>()?,
            ),
            Literal::Mapping(entries) => {
                let mut map = Document::new();
                for (key, value) in entries {
                    map.insert(key, value.into_json()?);
                }
                Value::Object(map)
            }
            Literal::Group(_) => {
                return Err("a grouping cannot appear inside a document".to_string())
            }
        })
    }
}

// ============ Lexer ============

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Comma,
    Colon,
    Str(String),
    Num(Number),
    Bool(bool),
    Null,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::LBrace => "`{`".to_string(),
            Token::RBrace => "`}`".to_string(),
            Token::LBracket => "`[`".to_string(),
            Token::RBracket => "`]`".to_string(),
            Token::LParen => "`(`".to_string(),
            Token::RParen => "`)`".to_string(),
            Token::Comma => "`,`".to_string(),
            Token::Colon => "`:`".to_string(),
            Token::Str(_) => "string".to_string(),
            Token::Num(_) => "number".to_string(),
            Token::Bool(_) => "boolean".to_string(),
            Token::Null => "null".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Spanned {
    token: Token,
    offset: usize,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        self.src[self.pos..].chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, LiteralError> {
        let mut tokens = Vec::new();
        while let Some(c) = self.peek() {
            let offset = self.pos;
            let token = match c {
                c if c.is_whitespace() => {
                    self.bump();
                    continue;
                }
                '{' | '}' | '[' | ']' | '(' | ')' | ',' | ':' => {
                    self.bump();
                    match c {
                        '{' => Token::LBrace,
                        '}' => Token::RBrace,
                        '[' => Token::LBracket,
                        ']' => Token::RBracket,
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        _ => Token::Colon,
                    }
                }
                '\'' | '"' => Token::Str(self.string(false)?),
                '-' | '0'..='9' => Token::Num(self.number()?),
                '.' if self.peek_at(1).is_some_and(|d| d.is_ascii_digit()) => {
                    Token::Num(self.number()?)
                }
                '.' => return Err(LiteralError::unsafe_at(offset, "attribute access `.`")),
                c if c.is_alphabetic() || c == '_' => self.word()?,
                '#' => return Err(LiteralError::unsafe_at(offset, "comment `#`")),
                other => {
                    return Err(LiteralError::unsafe_at(
                        offset,
                        format!("operator or symbol `{}`", other),
                    ))
                }
            };
            tokens.push(Spanned { token, offset });
        }
        Ok(tokens)
    }

    fn word(&mut self) -> Result<Token, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                self.bump();
            } else {
                break;
            }
        }
        let word = &self.src[start..self.pos];

        if matches!(self.peek(), Some('\'') | Some('"')) {
            return match word {
                "r" | "R" => Ok(Token::Str(self.string(true)?)),
                "u" | "U" => Ok(Token::Str(self.string(false)?)),
                _ => Err(LiteralError::unsafe_at(
                    start,
                    format!("string prefix `{}`", word),
                )),
            };
        }

        match word {
            "True" | "true" => Ok(Token::Bool(true)),
            "False" | "false" => Ok(Token::Bool(false)),
            "None" | "null" => Ok(Token::Null),
            "import" | "from" | "lambda" | "exec" | "eval" | "__import__" => Err(
                LiteralError::unsafe_at(start, format!("executable keyword `{}`", word)),
            ),
            _ => Err(LiteralError::unsafe_at(
                start,
                format!("identifier `{}`", word),
            )),
        }
    }

    fn number(&mut self) -> Result<Number, LiteralError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
            let next_is_digit = match self.peek() {
                Some(c) if c.is_ascii_digit() => true,
                Some('.') => self.peek_at(1).is_some_and(|d| d.is_ascii_digit()),
                _ => false,
            };
            if !next_is_digit {
                return Err(LiteralError::unsafe_at(start, "operator `-`"));
            }
        }

        let mut is_float = false;
        self.digits();
        if self.peek() == Some('.') {
            is_float = true;
            self.bump();
            self.digits();
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let has_exponent = match self.peek_at(1) {
                Some(c) if c.is_ascii_digit() => true,
                Some('+') | Some('-') => self.peek_at(2).is_some_and(|d| d.is_ascii_digit()),
                _ => false,
            };
            if has_exponent {
                is_float = true;
                self.bump();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.bump();
                }
                self.digits();
            }
        }

        let text = &self.src[start..self.pos];
        let number = if is_float {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        } else if let Ok(i) = text.parse::<i64>() {
            Some(Number::from(i))
        } else if let Ok(u) = text.parse::<u64>() {
            Some(Number::from(u))
        } else {
            text.parse::<f64>().ok().and_then(Number::from_f64)
        };
        number.ok_or_else(|| LiteralError::malformed_at(start, format!("invalid number `{}`", text)))
    }

    fn digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn string(&mut self, raw: bool) -> Result<String, LiteralError> {
        let start = self.pos;
        let quote = match self.bump() {
            Some(q) => q,
            None => return Err(LiteralError::malformed_at(start, "expected a string")),
        };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| LiteralError::malformed_at(start, "unterminated string"))?;
            if c == quote {
                if !triple {
                    return Ok(out);
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    return Ok(out);
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(LiteralError::malformed_at(start, "unterminated string"));
            }
            if c != '\\' {
                out.push(c);
                continue;
            }

            let escaped = self
                .bump()
                .ok_or_else(|| LiteralError::malformed_at(start, "unterminated string"))?;
            if raw {
                out.push('\\');
                out.push(escaped);
                continue;
            }
            match escaped {
                'n' => out.push('\n'),
                't' => out.push('\t'),
                'r' => out.push('\r'),
                'b' => out.push('\u{8}'),
                'f' => out.push('\u{c}'),
                '0' => out.push('\0'),
                '\\' | '\'' | '"' | '/' => out.push(escaped),
                '\n' => {}
                'x' => out.push(self.hex_escape(2, start)?),
                'u' => out.push(self.unicode_escape(start)?),
                'U' => out.push(self.hex_escape(8, start)?),
                other => {
                    out.push('\\');
                    out.push(other);
                }
            }
        }
    }

    fn hex_digits(&mut self, len: usize, start: usize) -> Result<u32, LiteralError> {
        let begin = self.pos;
        for _ in 0..len {
            match self.bump() {
                Some(c) if c.is_ascii_hexdigit() => {}
                _ => return Err(LiteralError::malformed_at(start, "invalid escape sequence")),
            }
        }
        u32::from_str_radix(&self.src[begin..self.pos], 16)
            .map_err(|_| LiteralError::malformed_at(start, "invalid escape sequence"))
    }

    fn hex_escape(&mut self, len: usize, start: usize) -> Result<char, LiteralError> {
        let code = self.hex_digits(len, start)?;
        char::from_u32(code).ok_or_else(|| LiteralError::malformed_at(start, "invalid code point"))
    }

    /// `\uXXXX`, combining a UTF-16 surrogate pair when one follows.
    fn unicode_escape(&mut self, start: usize) -> Result<char, LiteralError> {
        let high = self.hex_digits(4, start)?;
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            self.bump();
            self.bump();
            let low = self.hex_digits(4, start)?;
            if (0xDC00..0xE000).contains(&low) {
                let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                return char::from_u32(code)
                    .ok_or_else(|| LiteralError::malformed_at(start, "invalid code point"));
            }
            return Err(LiteralError::malformed_at(start, "invalid surrogate pair"));
        }
        char::from_u32(high).ok_or_else(|| LiteralError::malformed_at(start, "invalid code point"))
    }
}

// ============ Parser ============

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn offset(&self) -> usize {
        self.tokens.get(self.pos).map_or(self.end, |s| s.offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, context: &str) -> Result<(), LiteralError> {
        let offset = self.offset();
        match self.next() {
            Some(ref t) if *t == expected => Ok(()),
            Some(t) => Err(LiteralError::malformed_at(
                offset,
                format!("expected {} {}, found {}", expected.describe(), context, t.describe()),
            )),
            None => Err(LiteralError::malformed_at(
                offset,
                format!("expected {} {}, found end of input", expected.describe(), context),
            )),
        }
    }

    fn value(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        if depth > MAX_DEPTH {
            return Err(LiteralError::malformed_at(self.offset(), "nesting too deep"));
        }
        let offset = self.offset();
        let literal = match self.next() {
            Some(Token::Null) => Literal::Null,
            Some(Token::Bool(b)) => Literal::Bool(b),
            Some(Token::Num(n)) => Literal::Number(n),
            Some(Token::Str(s)) => self.adjacent_strings(s),
            Some(Token::LBrace) => self.mapping(depth)?,
            Some(Token::LBracket) => self.sequence(depth)?,
            Some(Token::LParen) => self.group(depth)?,
            Some(t) => {
                return Err(LiteralError::malformed_at(
                    offset,
                    format!("unexpected {}", t.describe()),
                ))
            }
            None => return Err(LiteralError::malformed_at(offset, "unexpected end of input")),
        };

        // A value directly followed by `(` or `[` is a call or a subscript.
        if matches!(self.peek(), Some(Token::LParen) | Some(Token::LBracket)) {
            return Err(LiteralError::unsafe_at(
                self.offset(),
                "call or subscript applied to a value",
            ));
        }
        Ok(literal)
    }

    /// Adjacent string literals concatenate, as in `'ab' 'cd'`.
    fn adjacent_strings(&mut self, mut s: String) -> Literal {
        while let Some(Token::Str(next)) = self.peek() {
            s.push_str(next);
            self.pos += 1;
        }
        Literal::String(s)
    }

    fn mapping(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        let mut entries = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBrace) {
                self.pos += 1;
                return Ok(Literal::Mapping(entries));
            }
            let key_offset = self.offset();
            let key = match self.value(depth + 1)? {
                Literal::String(s) => s,
                other => {
                    return Err(LiteralError::malformed_at(
                        key_offset,
                        format!("mapping keys must be strings, found {}", other.type_name()),
                    ))
                }
            };
            self.expect(Token::Colon, "after mapping key")?;
            let value = self.value(depth + 1)?;
            entries.push((key, value));

            let offset = self.offset();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBrace) => return Ok(Literal::Mapping(entries)),
                Some(t) => {
                    return Err(LiteralError::malformed_at(
                        offset,
                        format!("expected `,` or `}}` in mapping, found {}", t.describe()),
                    ))
                }
                None => return Err(LiteralError::malformed_at(offset, "unclosed mapping")),
            }
        }
    }

    fn sequence(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        let mut items = Vec::new();
        loop {
            if self.peek() == Some(&Token::RBracket) {
                self.pos += 1;
                return Ok(Literal::Sequence(items));
            }
            items.push(self.value(depth + 1)?);

            let offset = self.offset();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBracket) => return Ok(Literal::Sequence(items)),
                Some(t) => {
                    return Err(LiteralError::malformed_at(
                        offset,
                        format!("expected `,` or `]` in sequence, found {}", t.describe()),
                    ))
                }
                None => return Err(LiteralError::malformed_at(offset, "unclosed sequence")),
            }
        }
    }

    /// `(v)` is just `v`; `(a, b)` and `(a,)` are groupings.
    fn group(&mut self, depth: usize) -> Result<Literal, LiteralError> {
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(Literal::Group(Vec::new()));
        }
        let first = self.value(depth + 1)?;
        let offset = self.offset();
        match self.next() {
            Some(Token::RParen) => return Ok(first),
            Some(Token::Comma) => {}
            Some(t) => {
                return Err(LiteralError::malformed_at(
                    offset,
                    format!("expected `,` or `)` in grouping, found {}", t.describe()),
                ))
            }
            None => return Err(LiteralError::malformed_at(offset, "unclosed grouping")),
        }

        let mut items = vec![first];
        loop {
            if self.peek() == Some(&Token::RParen) {
                self.pos += 1;
                return Ok(Literal::Group(items));
            }
            items.push(self.value(depth + 1)?);

            let offset = self.offset();
            match self.next() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(Literal::Group(items)),
                Some(t) => {
                    return Err(LiteralError::malformed_at(
                        offset,
                        format!("expected `,` or `)` in grouping, found {}", t.describe()),
                    ))
                }
                None => return Err(LiteralError::malformed_at(offset, "unclosed grouping")),
            }
        }
    }
}

/// Parse exactly one literal from `src`.
pub fn parse_literal(src: &str) -> Result<Literal, LiteralError> {
    let tokens = Lexer::new(src).tokenize()?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: src.len(),
    };
    let literal = parser.value(0)?;
    if parser.peek().is_some() {
        return Err(LiteralError::malformed_at(
            parser.offset(),
            "unexpected content after the literal",
        ));
    }
    Ok(literal)
}

// ============ Rendering ============

fn json(value: &impl serde::Serialize) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Render a query back into the text form [`crate::parser::parse_query`] accepts.
pub fn render_query(query: &StructuredQuery) -> String {
    match query {
        StructuredQuery::RelationalStatements { statements } => statements.join(";\n"),
        StructuredQuery::DocumentFilter { container, filter } => {
            format!("({}, {})", json(container), json(filter))
        }
        StructuredQuery::DocumentPipeline { container, stages } => {
            format!("({}, {})", json(container), json(stages))
        }
        StructuredQuery::DocumentUpdate {
            container,
            filter,
            update,
        } => format!("({}, ({}, {}))", json(container), json(filter), json(update)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse_json(src: &str) -> Value {
        parse_literal(src).unwrap().into_json().unwrap()
    }

    fn kind_of(src: &str) -> LiteralErrorKind {
        parse_literal(src).unwrap_err().kind
    }

    #[test]
    fn test_python_style_mapping() {
        let value = parse_json("{'age': {'$gt': 20}, 'active': True, 'boss': None}");
        assert_eq!(
            value,
            json!({"age": {"$gt": 20}, "active": true, "boss": null})
        );
    }

    #[test]
    fn test_json_style_and_trailing_commas() {
        let value = parse_json(r#"[{"a": 1.5e2, "b": [1, -2, .5,],},]"#);
        assert_eq!(value, json!([{"a": 150.0, "b": [1, -2, 0.5]}]));
    }

    #[test]
    fn test_string_escapes_and_prefixes() {
        assert_eq!(parse_json(r#""tab\there é""#), json!("tab\there é"));
        assert_eq!(parse_json(r"r'Smith\d$'"), json!("Smith\\d$"));
        assert_eq!(parse_json("'''it's'''"), json!("it's"));
        assert_eq!(parse_json("'ab' \"cd\""), json!("abcd"));
    }

    #[test]
    fn test_groupings() {
        assert_eq!(
            parse_literal("({'a': 1}, {'b': 2})").unwrap(),
            Literal::Group(vec![
                Literal::Mapping(vec![("a".to_string(), Literal::Number(1.into()))]),
                Literal::Mapping(vec![("b".to_string(), Literal::Number(2.into()))]),
            ])
        );
        assert_eq!(parse_literal("(1)").unwrap(), Literal::Number(1.into()));
        assert_eq!(
            parse_literal("(1,)").unwrap(),
            Literal::Group(vec![Literal::Number(1.into())])
        );
    }

    #[test]
    fn test_identifiers_are_unsafe() {
        assert_eq!(kind_of("__import__('os').system('rm -rf /')"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("db['doctors'].find({})"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("('c', dict(a=1))"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("('c', {'a': x})"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("import os"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("f'{x}'"), LiteralErrorKind::Unsafe);
    }

    #[test]
    fn test_operators_and_attribute_access_are_unsafe() {
        assert_eq!(kind_of("{'a': 1}.keys()"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("{'a': 1 + 2}"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("[1] * 10"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("('c', {}) # comment"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("{'a': -x}"), LiteralErrorKind::Unsafe);
    }

    #[test]
    fn test_calls_and_subscripts_on_values_are_unsafe() {
        assert_eq!(kind_of("'abc'(1)"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("{'a': 1}['a']"), LiteralErrorKind::Unsafe);
        assert_eq!(kind_of("(('c', {}))()"), LiteralErrorKind::Unsafe);
    }

    #[test]
    fn test_unsafe_detected_even_after_malformed_prefix() {
        // Lexing covers the whole input before structure is checked.
        assert_eq!(kind_of("{'a': ] open('x')"), LiteralErrorKind::Unsafe);
    }

    #[test]
    fn test_malformed_inputs() {
        assert_eq!(kind_of("{'a': 1"), LiteralErrorKind::Malformed);
        assert_eq!(kind_of("{1: 'a'}"), LiteralErrorKind::Malformed);
        assert_eq!(kind_of("'unterminated"), LiteralErrorKind::Malformed);
        assert_eq!(kind_of("[1 2]"), LiteralErrorKind::Malformed);
        assert_eq!(kind_of("{} {}"), LiteralErrorKind::Malformed);
        assert_eq!(kind_of(""), LiteralErrorKind::Malformed);
    }

    #[test]
    fn test_nesting_limit() {
        let deep = format!("{}{}", "[".repeat(200), "]".repeat(200));
        let err = parse_literal(&deep).unwrap_err();
        assert_eq!(err.kind, LiteralErrorKind::Malformed);
        assert!(err.reason.contains("too deep"));
    }

    #[test]
    fn test_group_has_no_json_form() {
        let literal = parse_literal("[(1, 2)]").unwrap();
        assert!(literal.into_json().is_err());
    }

    #[test]
    fn test_large_integers() {
        assert_eq!(parse_json("18446744073709551615"), json!(u64::MAX));
        assert_eq!(parse_json("-9223372036854775808"), json!(i64::MIN));
    }
}
