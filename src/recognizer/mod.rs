/*
    This module runs deterministic automata over input chains
*/

pub mod dfa;
pub mod dpda;

use std::fmt::Display;
use std::path::PathBuf;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::error_handling::*;
use crate::lexeme::{LAMBDA, STEP_MARKER};
use crate::sink::TraceSink;

pub use dfa::Dfa;
pub use dpda::{Dpda, DpdaRule, StackAction};

#[derive(Debug)]
pub enum RecognizeErrorType {
    // No transition applies, or the automaton reached an undefined state
    UndefinedBehavior(String),
    // The input holds a symbol outside the input alphabet
    ForeignSymbol(char),
    // More than one rule applies after ordinary rules take priority
    NonDeterministic,
    // The run ended outside the accepting states or with input left over
    NotAccepted,
}

impl ErrorType for RecognizeErrorType {}

impl PartialEq for RecognizeErrorType {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Display for RecognizeErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecognizeErrorType::UndefinedBehavior(reason) => write!(f, "Behaviour is undefined: {}", reason),
            RecognizeErrorType::ForeignSymbol(c) => write!(f, "The chain contains the foreign symbol `{}`", c),
            RecognizeErrorType::NonDeterministic => write!(f, "Behaviour is non-deterministic"),
            RecognizeErrorType::NotAccepted => write!(f, "The automaton did not end in an accepting state"),
        }
    }
}

// Accepted, or the reason the chain was rejected
pub type Verdict = std::result::Result<(), RecognizeErrorType>;

#[derive(Debug)]
pub enum AutomatonErrorType {
    // A state is used but missing from the state set
    UndeclaredState(String),
    // A symbol is used but missing from its alphabet
    UndeclaredSymbol(char),
    // A second transition for the same trigger
    DuplicateTransition(String),
    // There was an issue with reading a file
    FileError(std::io::Error),
    // A definition file is not valid JSON for the automaton schema
    InvalidJson(String),
}

impl ErrorType for AutomatonErrorType {}

impl PartialEq for AutomatonErrorType {
    fn eq(&self, other: &Self) -> bool {
        if let AutomatonErrorType::FileError(a) = self {
            if let AutomatonErrorType::FileError(b) = other {
                return a.kind() == b.kind();
            }
        }
        return std::mem::discriminant(self) == std::mem::discriminant(other);
    }
}

impl Display for AutomatonErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AutomatonErrorType::UndeclaredState(state) => write!(f, "State `{}` is not declared", state),
            AutomatonErrorType::UndeclaredSymbol(c) => write!(f, "Symbol `{}` is not declared", c),
            AutomatonErrorType::DuplicateTransition(trigger) => write!(f, "Transition {} is already defined", trigger),
            AutomatonErrorType::FileError(e) => write!(f, "File error: {}", e),
            AutomatonErrorType::InvalidJson(message) => write!(f, "Invalid automaton file: {}", message),
        }
    }
}

pub type AutomatonError = Error<AutomatonErrorType>;

pub trait Automaton {
    // Checks that every state and symbol in use is declared
    fn validate(&self) -> std::result::Result<(), AutomatonErrorType>;

    // One trace line per step, the last without a step marker
    fn recognize(&self, input: &str, trace: &mut impl TraceSink) -> Verdict;
}

// Reads a definition from JSON and validates it
pub fn load<A: Automaton + DeserializeOwned>(path: &PathBuf) -> std::result::Result<A, AutomatonError> {
    let located = |error| AutomatonError::in_file(error, path);

    let text = std::fs::read_to_string(path).map_err(|e| located(AutomatonErrorType::FileError(e)))?;
    let automaton: A = serde_json::from_str(&text)
        .map_err(|e| located(AutomatonErrorType::InvalidJson(e.to_string())))?;
    automaton.validate().map_err(located)?;

    debug!("loaded automaton from {}", path.display());
    Ok(automaton)
}

fn or_lambda(text: String) -> String {
    if text.is_empty() {
        LAMBDA.to_string()
    } else {
        text
    }
}

// `(field, field, ...)` followed by the step marker unless it is the last line
fn step_line(fields: &[String], last: bool) -> String {
    let line = format!("({})", fields.join(", "));
    if last {
        line
    } else {
        format!("{} {}", line, STEP_MARKER)
    }
}

fn report(kind: &str, input: &str, verdict: &Verdict) {
    match verdict {
        Ok(()) => info!("{} accepted `{}`", kind, input),
        Err(error) => info!("{} rejected `{}`: {}", kind, input, error),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn step_lines() {
        let fields = vec!["q0".to_string(), or_lambda(String::new())];
        assert_eq!(step_line(&fields, false), "(q0, λ) ┠");
        assert_eq!(step_line(&fields, true), "(q0, λ)");
    }

    #[test]
    fn load_validates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dfa.json");

        std::fs::write(&path, r#"{
            "states": ["q0", "q1"],
            "alphabet": ["a"],
            "start": "q0",
            "accepting": ["q1"],
            "transitions": { "q0": { "a": "q1" } }
        }"#).unwrap();
        let dfa: Dfa = load(&path).unwrap();
        assert_eq!(dfa.recognize("a", &mut ()), Ok(()));

        std::fs::write(&path, r#"{
            "states": ["q0"],
            "alphabet": ["a"],
            "start": "q0",
            "accepting": ["q1"],
            "transitions": {}
        }"#).unwrap();
        let error = load::<Dfa>(&path).unwrap_err();
        assert_eq!(error.error, AutomatonErrorType::UndeclaredState(String::new()));
        assert_eq!(error.location, Location::file(path.clone()));

        std::fs::write(&path, "{ \"states\": 3 }").unwrap();
        assert_eq!(load::<Dfa>(&path).unwrap_err().error, AutomatonErrorType::InvalidJson(String::new()));
    }

    #[test]
    fn load_rejects_clashing_dpda_rules() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dpda.json");

        std::fs::write(&path, r#"{
            "states": ["q0", "q1", "q2"],
            "alphabet": ["a"],
            "start": "q0",
            "accepting": ["q1"],
            "stackAlphabet": ["Z"],
            "startStack": "Z",
            "rules": [
                { "from": "q0", "input": "a", "stackTop": "Z", "to": "q1" },
                { "from": "q0", "input": "a", "stackTop": "Z", "to": "q2" }
            ]
        }"#).unwrap();
        let error = load::<Dpda>(&path).unwrap_err();
        assert_eq!(error.error, AutomatonErrorType::DuplicateTransition(String::new()));
        assert_eq!(error.location, Location::file(path.clone()));
    }
}
