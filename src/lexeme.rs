/*
    This module splits rule bodies into lexemes and back
*/

use std::collections::BTreeSet;
use std::fmt::Display;

use itertools::{Itertools, PeekingNext};

use crate::error_handling::ErrorType;

pub const ARROW: char = '→';
pub const ASCII_ARROW: &str = "->";
pub const LAMBDA: char = 'λ';
pub const LESS_THAN: char = '<';
pub const GREATER_THAN: char = '>';
pub const ALTERNATIVE: char = '|';
pub const STEP_MARKER: char = '┠';
// Stands for λ in grammar files
pub const LAMBDA_PLACEHOLDER: &str = "<lambda>";

// Characters that can never name a symbol
pub fn is_reserved(c: char) -> bool {
    matches!(c, LESS_THAN | GREATER_THAN | LAMBDA | ALTERNATIVE | ARROW) || c.is_whitespace()
}

// Split a list of non-terminal names
pub fn is_name_separator(c: char) -> bool {
    matches!(c, ';' | ',')
}

#[derive(Debug, PartialEq, Clone)]
pub enum Lexeme {
    // A bare character: a terminal, a one-character non-terminal or λ
    Char(char),
    // A `<name>` reference, stored without the wrapper
    Wrapped(String),
}

impl Lexeme {
    pub fn is_lambda(&self) -> bool {
        *self == Lexeme::Char(LAMBDA)
    }

    // The referenced name with any wrapper removed
    pub fn name(&self) -> String {
        match self {
            Lexeme::Char(c) => c.to_string(),
            Lexeme::Wrapped(name) => name.clone(),
        }
    }
}

impl Display for Lexeme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lexeme::Char(c) => write!(f, "{}", c),
            Lexeme::Wrapped(name) => write!(f, "{}", wrap(name)),
        }
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LexemeError {
    // A `>` with no open `<`
    UnexpectedClose,
    // A `<` inside an open lexeme
    NestedOpen,
    // Input ended inside `<...`
    Unterminated,
    // `<>`
    EmptyName,
}

impl ErrorType for LexemeError {}

impl Display for LexemeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LexemeError::UnexpectedClose => write!(f, "Unexpected `{}` symbol", GREATER_THAN),
            LexemeError::NestedOpen => write!(f, "Unexpected `{}` symbol", LESS_THAN),
            LexemeError::Unterminated => write!(f, "Unexpected end of lexeme"),
            LexemeError::EmptyName => write!(f, "Empty lexeme `{}{}`", LESS_THAN, GREATER_THAN),
        }
    }
}

fn lex_wrapped(body: &mut impl PeekingNext<Item = char>) -> Result<Lexeme, LexemeError> {
    let name: String = body
        .peeking_take_while(|&c| c != GREATER_THAN && c != LESS_THAN)
        .collect();

    // Check what stopped the name and consume it
    match body.next() {
        Some(GREATER_THAN) if name.is_empty() => Err(LexemeError::EmptyName),
        Some(GREATER_THAN) => Ok(Lexeme::Wrapped(name)),
        Some(_) => Err(LexemeError::NestedOpen),
        None => Err(LexemeError::Unterminated),
    }
}

pub fn tokenize(body: &str) -> Result<Vec<Lexeme>, LexemeError> {
    let mut lexemes = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            LESS_THAN => lexemes.push(lex_wrapped(&mut chars)?),
            GREATER_THAN => return Err(LexemeError::UnexpectedClose),
            c => lexemes.push(Lexeme::Char(c)),
        }
    }

    Ok(lexemes)
}

pub fn untokenize(lexemes: &[Lexeme]) -> String {
    lexemes.iter().join("")
}

pub fn wrap(name: &str) -> String {
    format!("{}{}{}", LESS_THAN, name, GREATER_THAN)
}

pub fn unwrap(lexeme: &str) -> &str {
    lexeme
        .strip_prefix(LESS_THAN)
        .and_then(|inner| inner.strip_suffix(GREATER_THAN))
        .unwrap_or(lexeme)
}

// How a non-terminal is written inside a rule body
pub fn reference(name: &str) -> String {
    if name.chars().count() == 1 {
        name.to_string()
    } else {
        wrap(name)
    }
}

pub fn contains_lexeme(lexeme: &str, lexemes: &BTreeSet<String>, stripped: bool) -> bool {
    if stripped {
        lexemes.contains(unwrap(lexeme))
    } else {
        lexemes.contains(lexeme)
    }
}
