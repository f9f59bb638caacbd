/*
    This module is for storing and manipulating grammars
*/

mod canonical;
mod chomsky;
pub mod file;
mod names;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use itertools::Itertools;
use tracing::debug;

use crate::error_handling::ErrorType;
use crate::lexeme::{self, Lexeme, LexemeError, ARROW, ASCII_ARROW, LAMBDA};

pub use canonical::CanonicalStep;
pub use names::NameAllocator;

// The base unit in a grammar rule
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Hash)]
pub enum Symbol {
    Terminal(char),
    Nonterminal(String),
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Terminal(c) => write!(f, "{}", c),
            Symbol::Nonterminal(name) => write!(f, "{}", lexeme::reference(name)),
        }
    }
}

// The symbols in a single alternative. An empty alternative is λ
pub type Alternative = Vec<Symbol>;

// The alternatives of a rewrite rule
pub type Rewrite = BTreeSet<Alternative>;

// Every rewrite of a grammar, keyed by head
pub type RuleTable = BTreeMap<String, Rewrite>;

pub fn render(alternative: &Alternative) -> String {
    if alternative.is_empty() {
        LAMBDA.to_string()
    } else {
        alternative.iter().join("")
    }
}

#[derive(Debug)]
pub enum GrammarErrorType {
    // A rule is not `head→body` with a declared head and known body lexemes
    MalformedRule(String),
    // A `<...>` wrapper is broken
    MalformedLexeme(LexemeError),
    // The goal is not a declared, unwrapped non-terminal
    InvalidGoal(String),
    // A symbol was listed twice in one alphabet
    DuplicateSymbol(String),
    // A symbol is both a terminal and a non-terminal
    AlphabetCollision(String),
    // A symbol uses a character reserved for rule syntax
    ReservedSymbol(String),
    // An operation needs a goal symbol and none is set
    MissingGoal,
    // The goal derives no terminal chain at all
    EmptyLanguage,
    // There was an issue with reading or writing a file
    FileError(std::io::Error),
    // A grammar file is not valid JSON for the grammar schema
    InvalidJson(String),
}

impl ErrorType for GrammarErrorType {}

impl PartialEq for GrammarErrorType {
    fn eq(&self, other: &Self) -> bool {
        if let GrammarErrorType::FileError(a) = self {
            if let GrammarErrorType::FileError(b) = other {
                return a.kind() == b.kind();
            }
        }
        return std::mem::discriminant(self) == std::mem::discriminant(other);
    }
}

impl Display for GrammarErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GrammarErrorType::MalformedRule(rule) => write!(f, "Rule format violated: `{}`", rule),
            GrammarErrorType::MalformedLexeme(error) => write!(f, "Malformed lexeme: {}", error),
            GrammarErrorType::InvalidGoal(goal) => write!(f, "`{}` cannot be the goal symbol", goal),
            GrammarErrorType::DuplicateSymbol(symbol) => write!(f, "Symbol `{}` is listed more than once", symbol),
            GrammarErrorType::AlphabetCollision(symbol) => write!(f, "Symbol `{}` is both a terminal and a non-terminal", symbol),
            GrammarErrorType::ReservedSymbol(symbol) => write!(f, "Symbol `{}` uses a reserved character", symbol),
            GrammarErrorType::MissingGoal => write!(f, "No goal symbol is set"),
            GrammarErrorType::EmptyLanguage => write!(f, "The goal symbol derives no chains"),
            GrammarErrorType::FileError(e) => write!(f, "File error: {}", e),
            GrammarErrorType::InvalidJson(message) => write!(f, "Invalid grammar file: {}", message),
        }
    }
}

pub type Result<T> = std::result::Result<T, GrammarErrorType>;

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Grammar {
    terminals: BTreeSet<char>,
    non_terminals: BTreeSet<String>,
    goal: Option<String>,
    rules: RuleTable,
}

impl Grammar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminals(&self) -> &BTreeSet<char> {
        &self.terminals
    }

    pub fn non_terminals(&self) -> &BTreeSet<String> {
        &self.non_terminals
    }

    pub fn goal(&self) -> Option<&str> {
        self.goal.as_deref()
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    // On error the old alphabet is kept. Success drops every rule
    pub fn set_terminals(&mut self, symbols: &str) -> Result<()> {
        let mut terminals = BTreeSet::new();
        for c in symbols.trim().chars() {
            if lexeme::is_reserved(c) {
                return Err(GrammarErrorType::ReservedSymbol(c.to_string()));
            }
            if self.non_terminals.contains(&c.to_string()) {
                return Err(GrammarErrorType::AlphabetCollision(c.to_string()));
            }
            if !terminals.insert(c) {
                return Err(GrammarErrorType::DuplicateSymbol(c.to_string()));
            }
        }

        debug!("terminals set to {{{}}}", terminals.iter().join(", "));
        self.terminals = terminals;
        self.rules.clear();
        Ok(())
    }

    // Names are `;` or `,` separated. Behaves like `set_terminals`, and
    // forgets a goal that is no longer declared
    pub fn set_non_terminals(&mut self, names: &str) -> Result<()> {
        let mut non_terminals = BTreeSet::new();
        let items = names
            .split(lexeme::is_name_separator)
            .map(str::trim)
            .filter(|name| !name.is_empty());

        for name in items {
            if name.chars().any(lexeme::is_reserved) {
                return Err(GrammarErrorType::ReservedSymbol(name.to_string()));
            }
            let mut chars = name.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                if self.terminals.contains(&c) {
                    return Err(GrammarErrorType::AlphabetCollision(name.to_string()));
                }
            }
            if !non_terminals.insert(name.to_string()) {
                return Err(GrammarErrorType::DuplicateSymbol(name.to_string()));
            }
        }

        debug!("non-terminals set to {{{}}}", non_terminals.iter().join("; "));
        if self.goal.as_ref().is_some_and(|goal| !non_terminals.contains(goal)) {
            self.goal = None;
        }
        self.non_terminals = non_terminals;
        self.rules.clear();
        Ok(())
    }

    pub fn set_goal(&mut self, name: &str) -> Result<()> {
        if !lexeme::contains_lexeme(name, &self.non_terminals, false) {
            return Err(GrammarErrorType::InvalidGoal(name.to_string()));
        }

        self.goal = Some(name.to_string());
        Ok(())
    }

    fn classify(&self, lexeme: &Lexeme) -> Option<Symbol> {
        match lexeme {
            Lexeme::Wrapped(name) if self.non_terminals.contains(name) => {
                Some(Symbol::Nonterminal(name.clone()))
            }
            Lexeme::Char(c) if self.terminals.contains(c) => Some(Symbol::Terminal(*c)),
            Lexeme::Char(c) if self.non_terminals.contains(&c.to_string()) => {
                Some(Symbol::Nonterminal(c.to_string()))
            }
            _ => None,
        }
    }

    // `λ` on its own is the empty alternative
    pub fn parse_body(&self, body: &str) -> Result<Alternative> {
        let lexemes = lexeme::tokenize(body).map_err(GrammarErrorType::MalformedLexeme)?;
        let malformed = || GrammarErrorType::MalformedRule(body.to_string());

        if lexemes.iter().any(Lexeme::is_lambda) {
            return if lexemes.len() == 1 { Ok(Vec::new()) } else { Err(malformed()) };
        }
        if lexemes.is_empty() {
            return Err(malformed());
        }

        lexemes
            .iter()
            .map(|lexeme| self.classify(lexeme).ok_or_else(malformed))
            .collect()
    }

    fn split_rule(rule: &str) -> Option<(&str, &str)> {
        let (head, body) = rule
            .split_once(ARROW)
            .or_else(|| rule.split_once(ASCII_ARROW))?;
        if body.contains(ARROW) {
            return None;
        }
        Some((head.trim(), body.trim()))
    }

    // `head→body` or `head->body`
    pub fn add_rule(&mut self, rule: &str) -> Result<()> {
        let malformed = || GrammarErrorType::MalformedRule(rule.to_string());
        let (head, body) = Self::split_rule(rule).ok_or_else(malformed)?;
        if !lexeme::contains_lexeme(head, &self.non_terminals, false) {
            return Err(malformed());
        }

        let alternative = self.parse_body(body).map_err(|error| match error {
            GrammarErrorType::MalformedRule(_) => malformed(),
            other => other,
        })?;

        self.rules.entry(head.to_string()).or_default().insert(alternative);
        Ok(())
    }

    // Returns whether the rule existed
    pub fn remove_rule(&mut self, head: &str, alternative: &Alternative) -> bool {
        let Some(rewrite) = self.rules.get_mut(head) else {
            return false;
        };
        let removed = rewrite.remove(alternative);
        if rewrite.is_empty() {
            self.rules.remove(head);
        }
        removed
    }

    pub fn rule_lines(&self) -> Vec<String> {
        self.rules
            .iter()
            .flat_map(|(head, rewrite)| {
                rewrite
                    .iter()
                    .map(move |alternative| format!("{}{}{}", head, ARROW, render(alternative)))
            })
            .collect()
    }

    // Drops rules whose head is no longer declared or whose body has a
    // symbol `keep` rejects
    fn retain_rules(&mut self, keep: impl Fn(&Symbol) -> bool) {
        let non_terminals = &self.non_terminals;
        self.rules.retain(|head, rewrite| {
            rewrite.retain(|alternative| alternative.iter().all(&keep));
            non_terminals.contains(head) && !rewrite.is_empty()
        });
    }
}

impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Terminals: {{{}}}", self.terminals.iter().join(", "))?;
        writeln!(f, "Non-terminals: {{{}}}", self.non_terminals.iter().join("; "))?;
        writeln!(f, "Goal symbol: {}", self.goal.as_deref().unwrap_or("-"))?;
        let rules = self
            .rules
            .iter()
            .map(|(head, rewrite)| format!("{}{}{}", head, ARROW, rewrite.iter().map(render).join("|")))
            .join(", ");
        write!(f, "Rules: [{}]", rules)
    }
}
