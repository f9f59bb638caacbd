/*
    This module generates every chain of a grammar within a length window
*/

mod task;

use std::collections::HashSet;
use std::fmt::Display;
use std::rc::Rc;

use tracing::{debug, info, trace};

use crate::error_handling::ErrorType;
use crate::grammar::{Grammar, RuleTable, Symbol};

pub use task::{CancelToken, GenerationOutcome, GenerationTask};

#[derive(Debug, PartialEq)]
pub enum GenerateErrorType {
    // The minimum chain length is above the maximum
    InvalidLengthWindow { min: usize, max: usize },
    // The grammar has no goal symbol to start from
    MissingGoal,
}

impl ErrorType for GenerateErrorType {}

impl Display for GenerateErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerateErrorType::InvalidLengthWindow { min, max } => {
                write!(f, "Minimum chain length {} is greater than maximum {}", min, max)
            }
            GenerateErrorType::MissingGoal => write!(f, "The grammar has no goal symbol"),
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerateErrorType>;

// Which end of the sentential form is rewritten first
#[derive(Debug, PartialEq, Clone, Copy, Default)]
pub enum Derivation {
    #[default]
    Leftmost,
    Rightmost,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct GenerationSettings {
    min_length: usize,
    max_length: usize,
    derivation: Derivation,
}

impl GenerationSettings {
    pub fn new(min_length: usize, max_length: usize, derivation: Derivation) -> Result<Self> {
        if min_length > max_length {
            return Err(GenerateErrorType::InvalidLengthWindow {
                min: min_length,
                max: max_length,
            });
        }
        Ok(GenerationSettings {
            min_length,
            max_length,
            derivation,
        })
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn derivation(&self) -> Derivation {
        self.derivation
    }
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum GenerationState {
    Idle,
    Running,
    Completed,
    Canceled,
}

// Owns a snapshot of the rules, so it can move to a worker thread
#[derive(Debug, Clone)]
pub struct Generator {
    rules: RuleTable,
    goal: String,
    settings: GenerationSettings,
    chains: Vec<String>,
    state: GenerationState,
}

impl Generator {
    pub fn new(rules: RuleTable, goal: String, settings: GenerationSettings) -> Self {
        Generator {
            rules,
            goal,
            settings,
            chains: Vec::new(),
            state: GenerationState::Idle,
        }
    }

    pub fn from_grammar(grammar: &Grammar, settings: GenerationSettings) -> Result<Self> {
        let goal = grammar.goal().ok_or(GenerateErrorType::MissingGoal)?;
        info!("generating from\n{}", grammar);
        Ok(Generator::new(grammar.rules().clone(), goal.to_string(), settings))
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn into_chains(self) -> Vec<String> {
        self.chains
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == GenerationState::Running
    }

    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    // Replaces earlier chains. A canceled run keeps none
    pub fn generate(&mut self, token: &CancelToken) -> GenerationState {
        self.state = GenerationState::Running;
        self.chains.clear();

        let mut search = Search::new(&self.rules, self.settings, token);
        let outcome = search.run(&self.goal);
        let chains = search.chains;

        self.state = match outcome {
            Ok(()) => {
                info!("generated {} chains from `{}`", chains.len(), self.goal);
                self.chains = chains;
                GenerationState::Completed
            }
            Err(Canceled) => {
                info!("generation from `{}` canceled", self.goal);
                GenerationState::Canceled
            }
        };
        self.state
    }
}

// Non-terminals expanded on the way to a frame, innermost first. Branches
// share their common prefix
#[derive(Debug, Clone, Default)]
struct DerivationPath<'r>(Option<Rc<PathNode<'r>>>);

#[derive(Debug)]
struct PathNode<'r> {
    name: &'r str,
    parent: DerivationPath<'r>,
}

impl<'r> DerivationPath<'r> {
    fn extended(&self, name: &'r str) -> Self {
        DerivationPath(Some(Rc::new(PathNode {
            name,
            parent: self.clone(),
        })))
    }

    fn depth_of(&self, name: &str) -> usize {
        let mut depth = 0;
        let mut node = self.0.as_deref();
        while let Some(current) = node {
            if current.name == name {
                depth += 1;
            }
            node = current.parent.0.as_deref();
        }
        depth
    }
}

// The unprocessed part of one rule body, with the path that produced it
#[derive(Debug, Clone)]
struct Frame<'r> {
    symbols: &'r [Symbol],
    path: DerivationPath<'r>,
}

impl<'r> Frame<'r> {
    fn take(&mut self, derivation: Derivation) -> Option<&'r Symbol> {
        let symbols = self.symbols;
        let (symbol, rest) = match derivation {
            Derivation::Leftmost => symbols.split_first()?,
            Derivation::Rightmost => symbols.split_last()?,
        };
        self.symbols = rest;
        Some(symbol)
    }
}

// What a branch of the search came back with
#[derive(Debug, PartialEq)]
enum Step<'r> {
    // A fully expanded chain
    Chain(String),
    // Every alternative of a non-terminal was tried
    Exhausted,
    // A non-terminal has no rules
    MissRule,
    // A chain ran over the maximum length, so the rest of the rule is skipped
    AbortRule,
    // A non-terminal recurred too often on the path
    LoopAt(&'r str),
}

// Unwinds the whole search
#[derive(Debug, PartialEq)]
struct Canceled;

#[derive(Debug, PartialEq)]
enum Offer {
    TooShort,
    TooLong,
    Duplicate,
    Accepted,
}

struct Search<'r> {
    rules: &'r RuleTable,
    settings: GenerationSettings,
    token: &'r CancelToken,
    chains: Vec<String>,
    seen: HashSet<String>,
}

impl<'r> Search<'r> {
    fn new(rules: &'r RuleTable, settings: GenerationSettings, token: &'r CancelToken) -> Self {
        Search {
            rules,
            settings,
            token,
            chains: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn poll(&self) -> std::result::Result<(), Canceled> {
        if self.token.is_canceled() {
            return Err(Canceled);
        }
        Ok(())
    }

    fn offer(&mut self, chain: String) -> Offer {
        let length = chain.chars().count();
        if length < self.settings.min_length {
            return Offer::TooShort;
        }
        if length > self.settings.max_length {
            trace!("`{}` is longer than {}", chain, self.settings.max_length);
            return Offer::TooLong;
        }
        if !self.seen.insert(chain.clone()) {
            return Offer::Duplicate;
        }
        debug!("found `{}`", chain);
        self.chains.push(chain);
        Offer::Accepted
    }

    fn run(&mut self, goal: &'r str) -> std::result::Result<(), Canceled> {
        let Some(rewrite) = self.rules.get(goal) else {
            trace!("goal `{}` has no rules", goal);
            return Ok(());
        };
        let path = DerivationPath::default().extended(goal);

        for alternative in rewrite {
            self.poll()?;
            let frames = vec![Frame {
                symbols: alternative,
                path: path.clone(),
            }];

            match self.derive(frames, String::new())? {
                Step::Chain(chain) => {
                    if self.offer(chain) == Offer::TooLong {
                        trace!("moving to the next rule of `{}`", goal);
                    }
                }
                step => trace!("rule of `{}` ended with {:?}", goal, step),
            }
        }
        Ok(())
    }

    // Consumes terminals from the innermost frame until a non-terminal has to
    // be expanded or every frame is used up
    fn derive(
        &mut self,
        mut frames: Vec<Frame<'r>>,
        mut chain: String,
    ) -> std::result::Result<Step<'r>, Canceled> {
        loop {
            let Some(frame) = frames.last_mut() else {
                return Ok(Step::Chain(chain));
            };

            match frame.take(self.settings.derivation) {
                None => {
                    frames.pop();
                }
                Some(Symbol::Terminal(c)) => match self.settings.derivation {
                    Derivation::Leftmost => chain.push(*c),
                    Derivation::Rightmost => chain.insert(0, *c),
                },
                Some(Symbol::Nonterminal(name)) => {
                    let path = frame.path.clone();
                    return self.expand(name, path, frames, chain);
                }
            }
        }
    }

    fn expand(
        &mut self,
        name: &'r str,
        path: DerivationPath<'r>,
        frames: Vec<Frame<'r>>,
        chain: String,
    ) -> std::result::Result<Step<'r>, Canceled> {
        if path.depth_of(name) > self.settings.max_length {
            trace!("`{}` recurs more than {} times", name, self.settings.max_length);
            return Ok(Step::LoopAt(name));
        }
        let Some(rewrite) = self.rules.get(name) else {
            trace!("`{}` has no rules", name);
            return Ok(Step::MissRule);
        };
        let path = path.extended(name);

        for alternative in rewrite {
            self.poll()?;
            let mut branch = frames.clone();
            branch.push(Frame {
                symbols: alternative,
                path: path.clone(),
            });

            match self.derive(branch, chain.clone())? {
                Step::Chain(found) => {
                    if self.offer(found) == Offer::TooLong {
                        trace!("abandoning the rules of `{}`", name);
                        return Ok(Step::AbortRule);
                    }
                }
                Step::Exhausted | Step::MissRule | Step::AbortRule => {}
                Step::LoopAt(looped) if looped == name => {}
                loop_elsewhere => return Ok(loop_elsewhere),
            }
        }
        Ok(Step::Exhausted)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::iter::zip;

    use super::*;
    use crate::grammar::tests::grammar;

    fn generate(grammar: &Grammar, min: usize, max: usize, derivation: Derivation) -> Vec<String> {
        let settings = GenerationSettings::new(min, max, derivation).unwrap();
        let mut generator = Generator::from_grammar(grammar, settings).unwrap();
        assert_eq!(generator.generate(&CancelToken::new()), GenerationState::Completed);
        generator.into_chains()
    }

    fn sorted(chains: Vec<String>) -> Vec<String> {
        chains.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
    }

    #[test]
    fn right_recursion_within_window() {
        let source = grammar("a", "S", "S", &["S→aS", "S→λ"]);

        for derivation in [Derivation::Leftmost, Derivation::Rightmost] {
            assert_eq!(generate(&source, 0, 3, derivation), vec!["", "a", "aa", "aaa"]);
        }
    }

    #[test]
    fn length_window() {
        let source = grammar("ab", "S", "S", &["S→aSb", "S→λ"]);
        let windows = vec![(0, 4), (1, 4), (2, 2), (3, 3), (0, 0)];
        let answers = vec![
            vec!["", "ab", "aabb"],
            vec!["ab", "aabb"],
            vec!["ab"],
            vec![],
            vec![""]
        ];

        for ((min, max), answer) in zip(windows, answers) {
            assert_eq!(generate(&source, min, max, Derivation::Leftmost), answer, "[{}, {}]", min, max);
        }
    }

    #[test]
    fn rest_of_body_follows_expansion() {
        let source = grammar("abc", "S;A;B", "S", &["S→AcB", "A→a", "A→aa", "B→b"]);

        for derivation in [Derivation::Leftmost, Derivation::Rightmost] {
            assert_eq!(sorted(generate(&source, 0, 5, derivation)), vec!["aacb", "acb"]);
        }
    }

    #[test]
    fn derivation_order_changes_discovery_order() {
        let source = grammar("ab", "S;A;B", "S", &["S→AB", "A→a", "A→aa", "B→b", "B→bb"]);

        assert_eq!(generate(&source, 0, 4, Derivation::Leftmost), vec!["ab", "abb", "aab", "aabb"]);
        assert_eq!(generate(&source, 0, 4, Derivation::Rightmost), vec!["ab", "aab", "abb", "aabb"]);
    }

    #[test]
    fn left_recursion_terminates() {
        let source = grammar("a", "S", "S", &["S→Sa"]);

        for max in [0, 1, 3, 6] {
            assert!(generate(&source, 0, max, Derivation::Leftmost).is_empty());
            assert!(generate(&source, 0, max, Derivation::Rightmost).is_empty());
        }
    }

    #[test]
    fn missing_rules_prune_branch() {
        let source = grammar("ab", "S;A", "S", &["S→aA", "S→b"]);
        assert_eq!(generate(&source, 0, 3, Derivation::Leftmost), vec!["b"]);
    }

    #[test]
    fn canceled_before_start() {
        let source = grammar("a", "S", "S", &["S→aS", "S→λ"]);
        let settings = GenerationSettings::new(0, 3, Derivation::Leftmost).unwrap();
        let mut generator = Generator::from_grammar(&source, settings).unwrap();

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(generator.generate(&token), GenerationState::Canceled);
        assert!(generator.chains().is_empty());
        assert!(!generator.is_running());
    }

    #[test]
    fn new_run_replaces_chains() {
        let source = grammar("a", "S", "S", &["S→aS", "S→λ"]);
        let settings = GenerationSettings::new(0, 2, Derivation::Leftmost).unwrap();
        let mut generator = Generator::from_grammar(&source, settings).unwrap();
        assert_eq!(generator.state(), GenerationState::Idle);

        generator.generate(&CancelToken::new());
        generator.generate(&CancelToken::new());
        assert_eq!(generator.chains(), ["", "a", "aa"]);
    }

    #[test]
    fn invalid_settings() {
        assert_eq!(
            GenerationSettings::new(3, 2, Derivation::Leftmost).unwrap_err(),
            GenerateErrorType::InvalidLengthWindow { min: 3, max: 2 }
        );

        let settings = GenerationSettings::new(0, 2, Derivation::Leftmost).unwrap();
        assert_eq!(
            Generator::from_grammar(&Grammar::new(), settings).unwrap_err(),
            GenerateErrorType::MissingGoal
        );
    }

    #[test]
    fn ambiguous_grammars_yield_unique_chains() {
        let sources = vec![
            grammar("a", "S", "S", &["S→SS", "S→a"]),
            grammar("a", "S", "S", &["S→aS", "S→Sa", "S→a"]),
            grammar("ab", "S;A", "S", &["S→A", "S→a", "A→a", "A→Ab", "S→Sb"])
        ];
        let answers = vec![
            vec!["a", "aa", "aaa"],
            vec!["a", "aa", "aaa"],
            vec!["a", "ab", "abb"]
        ];

        for (source, answer) in zip(sources, answers) {
            for derivation in [Derivation::Leftmost, Derivation::Rightmost] {
                let chains = generate(&source, 1, 3, derivation);
                let unique: HashSet<&String> = chains.iter().collect();

                assert_eq!(unique.len(), chains.len(), "{}", source);
                assert_eq!(sorted(chains), answer, "{}", source);
            }
        }
    }
}
