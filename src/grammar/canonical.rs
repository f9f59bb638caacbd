/*
    Canonical form: no barren symbols, no unreachable symbols, no λ-rules
    and no chain rules
*/

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use itertools::Itertools;
use tracing::debug;

use super::{Alternative, Grammar, GrammarErrorType, Result, RuleTable, Symbol};
use crate::sink::TraceSink;

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CanonicalStep {
    BarrenSymbols,
    UnreachableSymbols,
    LambdaRules,
    ChainRules,
    // Symbols stranded by the λ-rule and chain rule passes
    UselessSymbols,
}

impl Display for CanonicalStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CanonicalStep::BarrenSymbols => write!(f, "Removed barren symbols"),
            CanonicalStep::UnreachableSymbols => write!(f, "Removed unreachable symbols"),
            CanonicalStep::LambdaRules => write!(f, "Removed λ-rules"),
            CanonicalStep::ChainRules => write!(f, "Removed chain rules"),
            CanonicalStep::UselessSymbols => write!(f, "Removed stranded symbols"),
        }
    }
}

fn single_non_terminal(alternative: &Alternative) -> Option<&String> {
    match alternative.as_slice() {
        [Symbol::Nonterminal(name)] => Some(name),
        _ => None,
    }
}

impl Grammar {
    // Publishes the alphabets and rules to `sink` after every step. Fails
    // untouched when there is no goal or it derives nothing
    pub fn to_canonical(&mut self, sink: &mut impl TraceSink) -> Result<()> {
        let goal = self.goal.clone().ok_or(GrammarErrorType::MissingGoal)?;
        if !self.generating().contains(&goal) {
            return Err(GrammarErrorType::EmptyLanguage);
        }

        self.remove_barren_symbols();
        self.publish(CanonicalStep::BarrenSymbols, sink);
        self.remove_unreachable_symbols(&goal);
        self.publish(CanonicalStep::UnreachableSymbols, sink);
        self.remove_lambda_rules(&goal);
        self.publish(CanonicalStep::LambdaRules, sink);
        self.remove_chain_rules();
        self.publish(CanonicalStep::ChainRules, sink);

        // The goal may have moved to a fresh symbol
        let goal = self.goal.clone().ok_or(GrammarErrorType::MissingGoal)?;
        self.remove_barren_symbols();
        self.remove_unreachable_symbols(&goal);
        self.publish(CanonicalStep::UselessSymbols, sink);
        Ok(())
    }

    fn publish(&self, step: CanonicalStep, sink: &mut impl TraceSink) {
        debug!(
            "{}: {} terminals, {} non-terminals, {} rules",
            step,
            self.terminals.len(),
            self.non_terminals.len(),
            self.rules.values().map(|rewrite| rewrite.len()).sum::<usize>()
        );
        sink.append_line(&step.to_string());
        sink.append_line(&format!("T = {{{}}}", self.terminals.iter().join(", ")));
        sink.append_line(&format!("N = {{{}}}", self.non_terminals.iter().join("; ")));
        for line in self.rule_lines() {
            sink.append_line(&line);
        }
    }

    // Fixpoint of non-terminals with some alternative made only of terminals
    // and already generating non-terminals
    fn generating(&self) -> BTreeSet<String> {
        let mut generating = BTreeSet::new();
        loop {
            let found: Vec<String> = self
                .rules
                .iter()
                .filter(|(head, _)| !generating.contains(*head))
                .filter(|(_, rewrite)| {
                    rewrite.iter().any(|alternative| {
                        alternative.iter().all(|symbol| match symbol {
                            Symbol::Terminal(_) => true,
                            Symbol::Nonterminal(name) => generating.contains(name),
                        })
                    })
                })
                .map(|(head, _)| head.clone())
                .collect();

            if found.is_empty() {
                break;
            }
            generating.extend(found);
        }
        generating
    }

    fn remove_barren_symbols(&mut self) {
        let generating = self.generating();
        debug!("generating symbols: {{{}}}", generating.iter().join("; "));

        self.non_terminals.retain(|name| generating.contains(name));
        self.retain_rules(|symbol| match symbol {
            Symbol::Terminal(_) => true,
            Symbol::Nonterminal(name) => generating.contains(name),
        });
    }

    fn reachable(&self, goal: &str) -> (BTreeSet<char>, BTreeSet<String>) {
        let mut terminals = BTreeSet::new();
        let mut non_terminals = BTreeSet::from([goal.to_string()]);
        let mut pending = vec![goal.to_string()];

        while let Some(head) = pending.pop() {
            for symbol in self.rules.get(&head).into_iter().flatten().flatten() {
                match symbol {
                    Symbol::Terminal(c) => {
                        terminals.insert(*c);
                    }
                    Symbol::Nonterminal(name) => {
                        if non_terminals.insert(name.clone()) {
                            pending.push(name.clone());
                        }
                    }
                }
            }
        }
        (terminals, non_terminals)
    }

    fn remove_unreachable_symbols(&mut self, goal: &str) {
        let (terminals, non_terminals) = self.reachable(goal);
        debug!(
            "reachable symbols: {{{}}} {{{}}}",
            terminals.iter().join(", "),
            non_terminals.iter().join("; ")
        );

        self.terminals.retain(|c| terminals.contains(c));
        self.non_terminals.retain(|name| non_terminals.contains(name));
        self.retain_rules(|symbol| match symbol {
            Symbol::Terminal(c) => terminals.contains(c),
            Symbol::Nonterminal(name) => non_terminals.contains(name),
        });
    }

    // Non-terminals that derive λ: a direct λ alternative, closed under
    // alternatives made only of nullable non-terminals
    fn nullable(&self) -> BTreeSet<String> {
        let mut nullable = BTreeSet::new();
        loop {
            let found: Vec<String> = self
                .rules
                .iter()
                .filter(|(head, _)| !nullable.contains(*head))
                .filter(|(_, rewrite)| {
                    rewrite.iter().any(|alternative| {
                        alternative.iter().all(|symbol| match symbol {
                            Symbol::Terminal(_) => false,
                            Symbol::Nonterminal(name) => nullable.contains(name),
                        })
                    })
                })
                .map(|(head, _)| head.clone())
                .collect();

            if found.is_empty() {
                break;
            }
            nullable.extend(found);
        }
        nullable
    }

    fn remove_lambda_rules(&mut self, goal: &str) {
        let nullable = self.nullable();
        debug!("nullable symbols: {{{}}}", nullable.iter().join("; "));

        let is_nullable = |symbol: &Symbol| match symbol {
            Symbol::Nonterminal(name) => nullable.contains(name),
            Symbol::Terminal(_) => false,
        };

        let mut rules = RuleTable::new();
        for (head, rewrite) in &self.rules {
            let self_reference = vec![Symbol::Nonterminal(head.clone())];
            let mut alternatives = BTreeSet::new();

            for alternative in rewrite.iter().filter(|alternative| !alternative.is_empty()) {
                alternatives.insert(alternative.clone());

                let positions: Vec<usize> = alternative.iter().positions(is_nullable).collect();
                // Every non-empty subset of nullable occurrences is dropped once
                for dropped in positions.into_iter().powerset().skip(1) {
                    let variant: Alternative = alternative
                        .iter()
                        .enumerate()
                        .filter(|(position, _)| !dropped.contains(position))
                        .map(|(_, symbol)| symbol.clone())
                        .collect();

                    if !variant.is_empty() && variant != self_reference {
                        alternatives.insert(variant);
                    }
                }
            }

            if !alternatives.is_empty() {
                rules.insert(head.clone(), alternatives);
            }
        }

        if nullable.contains(goal) {
            let goal_symbol = Symbol::Nonterminal(goal.to_string());
            let referenced = rules.values().flatten().flatten().any(|symbol| *symbol == goal_symbol);

            if referenced {
                let fresh = super::NameAllocator::new(&self.non_terminals).fresh(&format!("{}'", goal));
                debug!("goal `{}` is nullable and referenced, new goal `{}`", goal, fresh);
                rules.insert(fresh.clone(), BTreeSet::from([Vec::new(), vec![goal_symbol]]));
                self.non_terminals.insert(fresh.clone());
                self.goal = Some(fresh);
            } else {
                rules.entry(goal.to_string()).or_default().insert(Vec::new());
            }
        }

        self.rules = rules;
    }

    fn remove_chain_rules(&mut self) {
        // Non-terminals reachable through chains of single non-terminal
        // alternatives, excluding the starting one
        let mut chains: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for start in &self.non_terminals {
            let mut closure = BTreeSet::from([start.clone()]);
            loop {
                let found: Vec<String> = closure
                    .iter()
                    .flat_map(|name| self.rules.get(name))
                    .flatten()
                    .filter_map(single_non_terminal)
                    .filter(|name| !closure.contains(*name))
                    .cloned()
                    .collect();

                if found.is_empty() {
                    break;
                }
                closure.extend(found);
            }
            closure.remove(start);
            chains.insert(start.clone(), closure);
        }

        let mut rules: RuleTable = self
            .rules
            .iter()
            .map(|(head, rewrite)| {
                let kept = rewrite
                    .iter()
                    .filter(|alternative| single_non_terminal(alternative).is_none())
                    .cloned()
                    .collect();
                (head.clone(), kept)
            })
            .collect();

        let inherited: Vec<(String, Vec<Alternative>)> = chains
            .iter()
            .flat_map(|(head, closure)| closure.iter().map(move |name| (head, name)))
            .filter_map(|(head, name)| {
                rules.get(name).map(|rewrite| (head.clone(), rewrite.iter().cloned().collect()))
            })
            .collect();

        for (head, alternatives) in inherited {
            rules.entry(head).or_default().extend(alternatives);
        }
        rules.retain(|_, rewrite| !rewrite.is_empty());
        self.rules = rules;
    }
}
