//! Tokenizer for the formula grammar.

use gridbase_domain::error::{Error, Result};
use gridbase_domain::value_objects::FieldId;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Number(f64),
    Text(String),
    Bool(bool),
    FieldRef(FieldId),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Not,
    LParen,
    RParen,
    Comma,
}

pub(super) fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    let mut tokens = Vec::new();

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                i += 1;
            }
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Eq);
                i += 1;
                if chars.get(i) == Some(&'=') {
                    i += 1;
                }
            }
            '!' if chars.get(i + 1) == Some(&'=') => {
                tokens.push(Token::Neq);
                i += 2;
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Gte);
                    i += 2;
                } else {
                    tokens.push(Token::Gt);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push(Token::Lte);
                    i += 2;
                } else {
                    tokens.push(Token::Lt);
                    i += 1;
                }
            }
            '"' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '"' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(Error::validation("unterminated string literal in formula"));
                }
                tokens.push(Token::Text(chars[start..j].iter().collect()));
                i = j + 1;
            }
            '{' => {
                let start = i + 1;
                let mut j = start;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                if j >= chars.len() {
                    return Err(Error::validation("unterminated field reference in formula"));
                }
                let raw: String = chars[start..j].iter().collect();
                let field_id = FieldId::parse(&raw)
                    .map_err(|_| Error::validation(format!("invalid field reference {raw}")))?;
                tokens.push(Token::FieldRef(field_id));
                i = j + 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                    j += 1;
                }
                let raw: String = chars[start..j].iter().collect();
                let n: f64 = raw
                    .parse()
                    .map_err(|_| Error::validation(format!("invalid numeric literal {raw}")))?;
                tokens.push(Token::Number(n));
                i = j;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                let mut j = i;
                while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                    j += 1;
                }
                let raw: String = chars[start..j].iter().collect();
                tokens.push(match raw.to_ascii_uppercase().as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    "TRUE" => Token::Bool(true),
                    "FALSE" => Token::Bool(false),
                    _ => Token::Ident(raw),
                });
                i = j;
            }
            other => {
                return Err(Error::validation(format!(
                    "unexpected character {other:?} in formula"
                )));
            }
        }
    }

    Ok(tokens)
}
