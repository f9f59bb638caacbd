use std::collections::BTreeSet;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::trace;

use super::*;

// Consecutive λ-moves allowed before the run is considered stuck
pub const LAMBDA_RUN_LIMIT: usize = 10_000;

// `input` is None for a λ-rule. The first symbol of `replacement` becomes
// the new top; an empty replacement pops
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DpdaRule {
    pub from: String,
    pub input: Option<char>,
    pub stack_top: char,
    pub to: String,
    #[serde(default)]
    pub replacement: String,
}

// The left-hand side of a rule under construction
#[derive(Debug, Clone)]
pub struct Trigger {
    from: String,
    input: Option<char>,
    stack_top: char,
}

impl Trigger {
    fn rule(self, to: &str, replacement: String) -> DpdaRule {
        DpdaRule {
            from: self.from,
            input: self.input,
            stack_top: self.stack_top,
            to: to.to_string(),
            replacement,
        }
    }

    pub fn pop(self, to: &str) -> DpdaRule {
        self.rule(to, String::new())
    }

    pub fn keep(self, to: &str) -> DpdaRule {
        let top = self.stack_top.to_string();
        self.rule(to, top)
    }

    // `symbols` go above the current top, first one on top
    pub fn push(self, to: &str, symbols: &str) -> DpdaRule {
        let replacement = format!("{}{}", symbols, self.stack_top);
        self.rule(to, replacement)
    }

    pub fn replace(self, to: &str, symbols: &str) -> DpdaRule {
        let replacement = symbols.chars().filter(|&c| c != LAMBDA).collect();
        self.rule(to, replacement)
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum StackAction<'a> {
    Pop,
    Keep,
    Push(&'a str),
    Replace(&'a str),
}

impl DpdaRule {
    // State, input and stack top; at most one rule per trigger
    fn trigger(&self) -> (&str, Option<char>, char) {
        (self.from.as_str(), self.input, self.stack_top)
    }

    pub fn when(from: &str, input: Option<char>, stack_top: char) -> Trigger {
        Trigger {
            from: from.to_string(),
            input,
            stack_top,
        }
    }

    pub fn action(&self) -> StackAction<'_> {
        if self.replacement.is_empty() {
            return StackAction::Pop;
        }
        match self.replacement.strip_suffix(self.stack_top) {
            Some("") => StackAction::Keep,
            Some(pushed) => StackAction::Push(pushed),
            None => StackAction::Replace(&self.replacement),
        }
    }
}

impl Display for DpdaRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "δ({},{},{})={{({},{})}}",
            self.from,
            self.input.unwrap_or(LAMBDA),
            self.stack_top,
            self.to,
            or_lambda(self.replacement.clone())
        )
    }
}

#[derive(Debug, PartialEq, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dpda {
    pub states: BTreeSet<String>,
    pub alphabet: BTreeSet<char>,
    pub start: String,
    pub accepting: BTreeSet<String>,
    pub stack_alphabet: BTreeSet<char>,
    pub start_stack: char,
    #[serde(default)]
    pub rules: BTreeSet<DpdaRule>,
}

impl Dpda {
    // Rejects a second rule for the same state, input and stack top
    pub fn add_rule(&mut self, rule: DpdaRule) -> std::result::Result<(), AutomatonErrorType> {
        if self.rules.iter().any(|other| other.trigger() == rule.trigger()) {
            return Err(AutomatonErrorType::DuplicateTransition(rule.to_string()));
        }
        self.rules.insert(rule);
        Ok(())
    }

    fn select(&self, state: &str, next: Option<char>, top: char) -> std::result::Result<&DpdaRule, RecognizeErrorType> {
        if let Some(c) = next {
            if !self.alphabet.contains(&c) {
                return Err(RecognizeErrorType::ForeignSymbol(c));
            }
        }

        let candidates: Vec<&DpdaRule> = self
            .rules
            .iter()
            .filter(|rule| rule.from == state && rule.stack_top == top)
            .filter(|rule| rule.input.is_none() || rule.input == next)
            .collect();
        let ordinary: Vec<&DpdaRule> = candidates.iter().copied().filter(|rule| rule.input.is_some()).collect();
        let chosen = if ordinary.is_empty() { candidates } else { ordinary };

        match chosen.as_slice() {
            [] => Err(RecognizeErrorType::UndefinedBehavior(format!(
                "no rule for ({}, {}, {})",
                state,
                next.unwrap_or(LAMBDA),
                top
            ))),
            [rule] => Ok(*rule),
            _ => Err(RecognizeErrorType::NonDeterministic),
        }
    }

    fn trace_step(&self, state: &str, rest: &[char], stack: &[char], last: bool, trace: &mut impl TraceSink) {
        let fields = [
            state.to_string(),
            or_lambda(rest.iter().collect()),
            or_lambda(stack.iter().rev().collect()),
        ];
        trace.append_line(&step_line(&fields, last));
    }

    fn run(&self, input: &[char], trace: &mut impl TraceSink) -> Verdict {
        let mut state = self.start.as_str();
        let mut rest = input;
        // Top at the end
        let mut stack = vec![self.start_stack];
        let mut lambda_run = 0;

        while let Some(&top) = stack.last() {
            self.trace_step(state, rest, &stack, false, trace);

            let rule = self.select(state, rest.first().copied(), top)?;
            trace!("applying {} ({:?})", rule, rule.action());
            if rule.input.is_some() {
                rest = &rest[1..];
                lambda_run = 0;
            } else {
                lambda_run += 1;
                if lambda_run > LAMBDA_RUN_LIMIT {
                    return Err(RecognizeErrorType::UndefinedBehavior(format!(
                        "more than {} λ-moves in a row",
                        LAMBDA_RUN_LIMIT
                    )));
                }
            }

            stack.pop();
            stack.extend(rule.replacement.chars().rev());
            state = rule.to.as_str();
        }

        self.trace_step(state, rest, &stack, true, trace);
        if !self.accepting.contains(state) || !rest.is_empty() {
            return Err(RecognizeErrorType::NotAccepted);
        }
        Ok(())
    }
}

impl Automaton for Dpda {
    fn validate(&self) -> std::result::Result<(), AutomatonErrorType> {
        let undeclared_state = |state: &String| AutomatonErrorType::UndeclaredState(state.clone());

        if let Some(state) = std::iter::once(&self.start)
            .chain(&self.accepting)
            .find(|state| !self.states.contains(*state))
        {
            return Err(undeclared_state(state));
        }
        if !self.stack_alphabet.contains(&self.start_stack) {
            return Err(AutomatonErrorType::UndeclaredSymbol(self.start_stack));
        }

        for rule in &self.rules {
            if let Some(state) = [&rule.from, &rule.to].into_iter().find(|state| !self.states.contains(*state)) {
                return Err(undeclared_state(state));
            }
            if let Some(c) = rule.input.filter(|c| !self.alphabet.contains(c)) {
                return Err(AutomatonErrorType::UndeclaredSymbol(c));
            }
            if let Some(c) = std::iter::once(rule.stack_top)
                .chain(rule.replacement.chars())
                .find(|c| !self.stack_alphabet.contains(c))
            {
                return Err(AutomatonErrorType::UndeclaredSymbol(c));
            }
        }

        // Rules sort by trigger first, so clashes are neighbours
        if let Some((_, second)) = self.rules.iter().tuple_windows().find(|(a, b)| a.trigger() == b.trigger()) {
            return Err(AutomatonErrorType::DuplicateTransition(second.to_string()));
        }
        Ok(())
    }

    fn recognize(&self, input: &str, trace: &mut impl TraceSink) -> Verdict {
        let input: Vec<char> = input.chars().collect();
        let verdict = self.run(&input, trace);
        report("DPDA", &input.iter().collect::<String>(), &verdict);
        verdict
    }
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    // Accepts balanced parentheses. Leftover `(` drain into the rejecting
    // state `qr`
    fn parentheses() -> Dpda {
        let mut dpda = Dpda {
            states: ["q0", "q1", "qr"].iter().map(|s| s.to_string()).collect(),
            alphabet: "()".chars().collect(),
            start: "q0".to_string(),
            accepting: BTreeSet::from(["q1".to_string()]),
            stack_alphabet: "(Z".chars().collect(),
            start_stack: 'Z',
            rules: BTreeSet::new(),
        };
        let rules = vec![
            DpdaRule::when("q0", Some('('), 'Z').push("q0", "("),
            DpdaRule::when("q0", Some('('), '(').push("q0", "("),
            DpdaRule::when("q0", Some(')'), '(').pop("q0"),
            DpdaRule::when("q0", None, 'Z').pop("q1"),
            DpdaRule::when("q0", None, '(').pop("qr"),
            DpdaRule::when("qr", None, '(').pop("qr"),
            DpdaRule::when("qr", None, 'Z').pop("qr")
        ];
        for rule in rules {
            dpda.add_rule(rule).unwrap();
        }
        dpda
    }

    #[test]
    fn balanced_parentheses() {
        let dpda = parentheses();
        assert_eq!(dpda.validate(), Ok(()));

        let inputs = vec!["(())", "()()", "", "(()", ")", "(a)"];
        let answers = vec![
            Ok(()),
            Ok(()),
            Ok(()),
            Err(RecognizeErrorType::NotAccepted),
            Err(RecognizeErrorType::NotAccepted),
            Err(RecognizeErrorType::ForeignSymbol('a'))
        ];

        for (input, answer) in zip(inputs, answers) {
            assert_eq!(dpda.recognize(input, &mut ()), answer, "{}", input);
        }
    }

    #[test]
    fn trace_lines() {
        let mut lines = Vec::new();
        assert_eq!(parentheses().recognize("()", &mut lines), Ok(()));
        assert_eq!(lines, vec![
            "(q0, (), Z) ┠",
            "(q0, ), (Z) ┠",
            "(q0, λ, Z) ┠",
            "(q1, λ, λ)"
        ]);
    }

    #[test]
    fn ordinary_rule_beats_lambda_rule() {
        let mut dpda = parentheses();
        // Would drain the stack if it won over reading `(`
        dpda.rules.insert(DpdaRule::when("q0", None, '(').pop("q1"));
        dpda.rules.remove(&DpdaRule::when("q0", None, '(').pop("qr"));

        let mut lines = Vec::new();
        assert_eq!(dpda.recognize("((", &mut lines), Err(RecognizeErrorType::UndefinedBehavior(String::new())));
        assert_eq!(lines[2], "(q0, λ, ((Z) ┠");
    }

    #[test]
    fn competing_rules_are_non_deterministic() {
        let mut dpda = parentheses();
        dpda.rules.insert(DpdaRule::when("q0", Some('('), 'Z').keep("q1"));

        assert_eq!(dpda.recognize("()", &mut ()), Err(RecognizeErrorType::NonDeterministic));
        assert_eq!(
            dpda.add_rule(DpdaRule::when("q0", Some(')'), '(').keep("q1")).unwrap_err(),
            AutomatonErrorType::DuplicateTransition(String::new())
        );
    }

    #[test]
    fn missing_rule_is_undefined() {
        let mut dpda = parentheses();
        dpda.rules.remove(&DpdaRule::when("q0", None, 'Z').pop("q1"));

        assert_eq!(dpda.recognize("", &mut ()), Err(RecognizeErrorType::UndefinedBehavior(String::new())));
    }

    #[test]
    fn endless_lambda_moves_stop() {
        let mut dpda = parentheses();
        dpda.rules.clear();
        dpda.add_rule(DpdaRule::when("q0", None, 'Z').keep("q0")).unwrap();

        assert_eq!(dpda.recognize("", &mut ()), Err(RecognizeErrorType::UndefinedBehavior(String::new())));
    }

    #[test]
    fn stack_policies() {
        let trigger = || DpdaRule::when("q", Some('a'), 'Z');
        let rules = vec![
            trigger().pop("q"),
            trigger().keep("q"),
            trigger().push("q", "ab"),
            trigger().replace("q", "ab"),
            trigger().replace("q", "λ")
        ];
        let answers = vec![
            StackAction::Pop,
            StackAction::Keep,
            StackAction::Push("ab"),
            StackAction::Replace("ab"),
            StackAction::Pop
        ];

        for (rule, answer) in zip(&rules, answers) {
            assert_eq!(rule.action(), answer);
        }
        assert_eq!(rules[2].to_string(), "δ(q,a,Z)={(q,abZ)}");
        assert_eq!(rules[0].to_string(), "δ(q,a,Z)={(q,λ)}");
    }

    #[test]
    fn validation() {
        let mut broken = parentheses();
        broken.rules.insert(DpdaRule::when("q0", Some('['), 'Z').pop("q0"));
        assert_eq!(broken.validate().unwrap_err(), AutomatonErrorType::UndeclaredSymbol('['));

        let mut broken = parentheses();
        broken.rules.insert(DpdaRule::when("q0", Some('('), 'Z').replace("q9", "Z"));
        assert_eq!(broken.validate().unwrap_err(), AutomatonErrorType::UndeclaredState(String::new()));

        let mut broken = parentheses();
        broken.start_stack = 'X';
        assert_eq!(broken.validate().unwrap_err(), AutomatonErrorType::UndeclaredSymbol('X'));

        let mut broken = parentheses();
        broken.rules.insert(DpdaRule::when("q0", Some('('), 'Z').keep("q1"));
        assert_eq!(broken.validate().unwrap_err(), AutomatonErrorType::DuplicateTransition(String::new()));
        assert_eq!(parentheses().validate(), Ok(()));
    }
}
