/*
    Chomsky normal form for grammars already in canonical form
*/

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use tracing::debug;

use super::{Alternative, Grammar, NameAllocator, RuleTable, Symbol};

fn stripped_name(symbol: &Symbol) -> String {
    match symbol {
        Symbol::Terminal(c) => c.to_string(),
        Symbol::Nonterminal(name) => name.clone(),
    }
}

// Builds the new rule table, inventing non-terminals as bodies are split
struct Rewriter {
    names: NameAllocator,
    rules: RuleTable,
    // `head` + terminal, standing in two-symbol bodies
    standing: BTreeMap<(String, char), String>,
    // `[a]`, standing in longer bodies
    bracketed: BTreeMap<char, String>,
    // The remainder of a long body, keyed by its symbols
    chains: BTreeMap<Vec<Symbol>, String>,
}

impl Rewriter {
    fn new(non_terminals: &BTreeSet<String>) -> Self {
        Rewriter {
            names: NameAllocator::new(non_terminals),
            rules: RuleTable::new(),
            standing: BTreeMap::new(),
            bracketed: BTreeMap::new(),
            chains: BTreeMap::new(),
        }
    }

    fn add(&mut self, head: &str, alternative: Alternative) {
        self.rules.entry(head.to_string()).or_default().insert(alternative);
    }

    fn stand_for(&mut self, head: &str, symbol: &Symbol) -> Symbol {
        let Symbol::Terminal(c) = symbol else {
            return symbol.clone();
        };
        let key = (head.to_string(), *c);
        if let Some(name) = self.standing.get(&key) {
            return Symbol::Nonterminal(name.clone());
        }

        let name = self.names.fresh(&format!("{}{}", head, c));
        self.add(&name, vec![symbol.clone()]);
        self.standing.insert(key, name.clone());
        Symbol::Nonterminal(name)
    }

    fn bracket(&mut self, symbol: &Symbol) -> Symbol {
        let Symbol::Terminal(c) = symbol else {
            return symbol.clone();
        };
        if let Some(name) = self.bracketed.get(c) {
            return Symbol::Nonterminal(name.clone());
        }

        let name = self.names.fresh(&format!("[{}]", c));
        self.add(&name, vec![symbol.clone()]);
        self.bracketed.insert(*c, name.clone());
        Symbol::Nonterminal(name)
    }

    // Non-terminal deriving exactly `rest`, at least two symbols long
    fn chain(&mut self, rest: &[Symbol]) -> Symbol {
        if let Some(name) = self.chains.get(rest) {
            return Symbol::Nonterminal(name.clone());
        }

        let name = self.names.fresh(&rest.iter().map(stripped_name).join(""));
        self.chains.insert(rest.to_vec(), name.clone());
        let body = self.split(rest);
        self.add(&name, body);
        Symbol::Nonterminal(name)
    }

    // Two-symbol body for a run of more than one symbol
    fn split(&mut self, symbols: &[Symbol]) -> Alternative {
        let first = self.bracket(&symbols[0]);
        let second = if symbols.len() == 2 {
            self.bracket(&symbols[1])
        } else {
            self.chain(&symbols[1..])
        };
        vec![first, second]
    }

    fn rewrite(&mut self, head: &str, alternative: &Alternative, goal: Option<&str>) {
        match alternative.as_slice() {
            [] if goal == Some(head) => self.add(head, Vec::new()),
            [Symbol::Terminal(_)] => self.add(head, alternative.clone()),
            [first, second] => {
                let body = vec![self.stand_for(head, first), self.stand_for(head, second)];
                self.add(head, body);
            }
            symbols if symbols.len() > 2 => {
                let body = self.split(symbols);
                self.add(head, body);
            }
            // λ off the goal and chain rules cannot survive canonical form
            _ => debug!("dropping {}→{}", head, super::render(alternative)),
        }
    }
}

impl Grammar {
    // Every body becomes one terminal or two non-terminals, except `goal→λ`.
    // Expects a canonical grammar
    pub fn to_chomsky(&mut self) {
        let mut rewriter = Rewriter::new(&self.non_terminals);
        let goal = self.goal.as_deref();

        for (head, rewrite) in &self.rules {
            for alternative in rewrite {
                rewriter.rewrite(head, alternative, goal);
            }
        }

        debug!(
            "chomsky form introduced {{{}}}",
            rewriter.names.allocated().iter().join("; ")
        );
        self.non_terminals.extend(rewriter.names.allocated().iter().cloned());
        self.rules = rewriter.rules;
    }

    // The Chomsky form as a separate grammar, leaving this one untouched
    pub fn chomsky(&self) -> Grammar {
        let mut grammar = self.clone();
        grammar.to_chomsky();
        grammar
    }
}
