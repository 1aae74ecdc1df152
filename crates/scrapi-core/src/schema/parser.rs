//! Schema parser: recursive descent over a token stream.
//!
//! Grammar:
//! ```text
//! type    := member ('|' member)*
//! member  := primary ('[]')*
//! primary := 'string' bounds? | 'number' bounds? | 'integer' bounds?
//!          | 'boolean' | 'null' | 'any'
//!          | 'array' '<' type '>' bounds?
//!          | 'record' '<' type '>'
//!          | '{' (field (',' field)* ','?)? '}'
//!          | quoted-literal | '(' type ')'
//! field   := (ident | quoted) '?'? ':' type
//! bounds  := '(' int? '..' int? ')'
//! ```

use super::{Bounds, Field, SchemaError, SchemaType};

/// Deepest nesting of groups, containers and `[]` suffixes a schema may use.
pub const MAX_DEPTH: usize = 64;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Int(i64),
    Punct(char),
    DotDot,
    Eof,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{s}'"),
            Token::Quoted(s) => write!(f, "\"{s}\""),
            Token::Int(n) => write!(f, "{n}"),
            Token::Punct(c) => write!(f, "'{c}'"),
            Token::DotDot => f.write_str("'..'"),
            Token::Eof => f.write_str("end of input"),
        }
    }
}

/// Parse schema text into a [`SchemaType`].
pub fn parse(src: &str) -> Result<SchemaType, SchemaError> {
    let tokens = tokenize(src)?;
    if tokens.len() == 1 {
        return Err(SchemaError::Empty);
    }
    let mut pos = 0;
    let ty = parse_type(&tokens, &mut pos, 0)?;
    match &tokens[pos] {
        Token::Eof => Ok(ty),
        other => Err(SchemaError::Syntax(format!("unexpected {other} after type"))),
    }
}

// ── Tokenizer ──

fn tokenize(input: &str) -> Result<Vec<Token>, SchemaError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' {
            i += 1;
            let mut s = String::new();
            while i < chars.len() && chars[i] != c {
                if chars[i] == '\\' && i + 1 < chars.len() {
                    i += 1;
                }
                s.push(chars[i]);
                i += 1;
            }
            if i >= chars.len() {
                return Err(SchemaError::Syntax("unterminated string literal".into()));
            }
            i += 1;
            tokens.push(Token::Quoted(s));
            continue;
        }

        if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(|d| d.is_ascii_digit())) {
            let start = i;
            i += 1;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let n = text
                .parse::<i64>()
                .map_err(|_| SchemaError::Syntax(format!("invalid integer: {text}")))?;
            tokens.push(Token::Int(n));
            continue;
        }

        if c == '.' {
            if chars.get(i + 1) == Some(&'.') {
                tokens.push(Token::DotDot);
                i += 2;
                continue;
            }
            return Err(SchemaError::Syntax(format!("unexpected '.' at position {i}")));
        }

        if "<>{}()[],:?|".contains(c) {
            tokens.push(Token::Punct(c));
            i += 1;
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$' || chars[i] == '-') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        return Err(SchemaError::Syntax(format!("unexpected character '{c}' at position {i}")));
    }

    tokens.push(Token::Eof);
    Ok(tokens)
}

// ── Parser ──

fn peek_punct(tokens: &[Token], pos: usize, c: char) -> bool {
    matches!(tokens.get(pos), Some(Token::Punct(p)) if *p == c)
}

fn expect_punct(tokens: &[Token], pos: &mut usize, c: char) -> Result<(), SchemaError> {
    if peek_punct(tokens, *pos, c) {
        *pos += 1;
        Ok(())
    } else {
        Err(SchemaError::Syntax(format!("expected '{c}', found {}", tokens[*pos])))
    }
}

fn enter(depth: usize) -> Result<usize, SchemaError> {
    if depth >= MAX_DEPTH {
        return Err(SchemaError::Syntax(format!("schema nested deeper than {MAX_DEPTH} levels")));
    }
    Ok(depth + 1)
}

fn parse_type(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<SchemaType, SchemaError> {
    let mut members = vec![parse_member(tokens, pos, depth)?];
    while peek_punct(tokens, *pos, '|') {
        *pos += 1;
        members.push(parse_member(tokens, pos, depth)?);
    }
    if members.len() == 1 {
        Ok(members.remove(0))
    } else {
        Ok(SchemaType::Union(members))
    }
}

fn parse_member(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<SchemaType, SchemaError> {
    let mut ty = parse_primary(tokens, pos, depth)?;
    let mut depth = depth;
    while peek_punct(tokens, *pos, '[') && peek_punct(tokens, *pos + 1, ']') {
        depth = enter(depth)?;
        *pos += 2;
        ty = SchemaType::Array {
            item: Box::new(ty),
            len: Bounds::default(),
        };
    }
    Ok(ty)
}

fn parse_primary(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<SchemaType, SchemaError> {
    let token = tokens[*pos].clone();
    *pos += 1;
    match token {
        Token::Ident(word) => match word.as_str() {
            "string" => Ok(SchemaType::String(parse_bounds(tokens, pos)?)),
            "number" => Ok(SchemaType::Number(parse_bounds(tokens, pos)?)),
            "integer" => Ok(SchemaType::Integer(parse_bounds(tokens, pos)?)),
            "boolean" => Ok(SchemaType::Boolean),
            "null" => Ok(SchemaType::Null),
            "any" => Ok(SchemaType::Any),
            "array" => {
                expect_punct(tokens, pos, '<')?;
                let item = parse_type(tokens, pos, enter(depth)?)?;
                expect_punct(tokens, pos, '>')?;
                let len = parse_bounds(tokens, pos)?;
                Ok(SchemaType::Array {
                    item: Box::new(item),
                    len,
                })
            }
            "record" => {
                expect_punct(tokens, pos, '<')?;
                let value = parse_type(tokens, pos, enter(depth)?)?;
                expect_punct(tokens, pos, '>')?;
                Ok(SchemaType::Record(Box::new(value)))
            }
            other => Err(SchemaError::UnknownType(other.to_string())),
        },
        Token::Quoted(s) => Ok(SchemaType::Literal(s)),
        Token::Punct('{') => parse_object(tokens, pos, enter(depth)?),
        Token::Punct('(') => {
            let inner = parse_type(tokens, pos, enter(depth)?)?;
            expect_punct(tokens, pos, ')')?;
            Ok(inner)
        }
        other => Err(SchemaError::Syntax(format!("expected a type, found {other}"))),
    }
}

fn parse_object(tokens: &[Token], pos: &mut usize, depth: usize) -> Result<SchemaType, SchemaError> {
    let mut fields = Vec::new();
    loop {
        if peek_punct(tokens, *pos, '}') {
            *pos += 1;
            break;
        }
        let name = match &tokens[*pos] {
            Token::Ident(s) | Token::Quoted(s) => s.clone(),
            other => return Err(SchemaError::Syntax(format!("expected a field name, found {other}"))),
        };
        *pos += 1;
        let optional = peek_punct(tokens, *pos, '?');
        if optional {
            *pos += 1;
        }
        expect_punct(tokens, pos, ':')?;
        let ty = parse_type(tokens, pos, depth)?;
        if fields.iter().any(|f: &Field| f.name == name) {
            return Err(SchemaError::DuplicateField(name));
        }
        fields.push(Field { name, optional, ty });

        if peek_punct(tokens, *pos, ',') {
            *pos += 1;
        } else {
            expect_punct(tokens, pos, '}')?;
            break;
        }
    }
    Ok(SchemaType::Object(fields))
}

/// Optional `(min..max)` suffix; either end may be omitted.
fn parse_bounds(tokens: &[Token], pos: &mut usize) -> Result<Bounds, SchemaError> {
    if !peek_punct(tokens, *pos, '(') {
        return Ok(Bounds::default());
    }
    *pos += 1;
    let mut bounds = Bounds::default();
    if let Token::Int(n) = tokens[*pos] {
        bounds.min = Some(n);
        *pos += 1;
    }
    if tokens[*pos] != Token::DotDot {
        return Err(SchemaError::Syntax(format!("expected '..' in bounds, found {}", tokens[*pos])));
    }
    *pos += 1;
    if let Token::Int(n) = tokens[*pos] {
        bounds.max = Some(n);
        *pos += 1;
    }
    expect_punct(tokens, pos, ')')?;
    if let (Some(min), Some(max)) = (bounds.min, bounds.max) {
        if min > max {
            return Err(SchemaError::Syntax(format!("empty bounds {min}..{max}")));
        }
    }
    Ok(bounds)
}
