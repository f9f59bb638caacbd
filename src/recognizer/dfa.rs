use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::*;

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
pub struct Dfa {
    pub states: BTreeSet<String>,
    pub alphabet: BTreeSet<char>,
    pub start: String,
    pub accepting: BTreeSet<String>,
    // state -> symbol -> next state
    #[serde(default)]
    pub transitions: BTreeMap<String, BTreeMap<char, String>>,
}

impl Dfa {
    pub fn add_transition(&mut self, from: &str, symbol: char, to: &str) -> std::result::Result<(), AutomatonErrorType> {
        let row = self.transitions.entry(from.to_string()).or_default();
        if row.contains_key(&symbol) {
            return Err(AutomatonErrorType::DuplicateTransition(format!("({}, {})", from, symbol)));
        }
        row.insert(symbol, to.to_string());
        Ok(())
    }

    fn trace_step(&self, state: &str, rest: &[char], last: bool, trace: &mut impl TraceSink) {
        let fields = [state.to_string(), or_lambda(rest.iter().collect())];
        trace.append_line(&step_line(&fields, last));
    }

    fn run(&self, input: &[char], trace: &mut impl TraceSink) -> Verdict {
        let mut state = self.start.as_str();

        for (position, symbol) in input.iter().enumerate() {
            self.trace_step(state, &input[position..], false, trace);

            if state.trim().is_empty() {
                return Err(RecognizeErrorType::UndefinedBehavior("the current state is undefined".to_string()));
            }
            state = match self.transitions.get(state).and_then(|row| row.get(symbol)) {
                Some(next) => next.as_str(),
                None if !self.alphabet.contains(symbol) => {
                    return Err(RecognizeErrorType::UndefinedBehavior(format!("`{}` is not in the alphabet", symbol)));
                }
                None => {
                    return Err(RecognizeErrorType::UndefinedBehavior(format!("no transition from {} on `{}`", state, symbol)));
                }
            };
        }

        self.trace_step(state, &[], true, trace);
        if !self.accepting.contains(state) {
            return Err(RecognizeErrorType::NotAccepted);
        }
        Ok(())
    }
}

impl Automaton for Dfa {
    fn validate(&self) -> std::result::Result<(), AutomatonErrorType> {
        let undeclared = |state: &String| AutomatonErrorType::UndeclaredState(state.clone());

        if let Some(state) = std::iter::once(&self.start)
            .chain(&self.accepting)
            .find(|state| !self.states.contains(*state))
        {
            return Err(undeclared(state));
        }

        for (from, row) in &self.transitions {
            if !self.states.contains(from) {
                return Err(undeclared(from));
            }
            for (symbol, to) in row {
                if !self.alphabet.contains(symbol) {
                    return Err(AutomatonErrorType::UndeclaredSymbol(*symbol));
                }
                if !self.states.contains(to) {
                    return Err(undeclared(to));
                }
            }
        }
        Ok(())
    }

    fn recognize(&self, input: &str, trace: &mut impl TraceSink) -> Verdict {
        let input: Vec<char> = input.chars().collect();
        let verdict = self.run(&input, trace);
        report("DFA", &input.iter().collect::<String>(), &verdict);
        verdict
    }
}
