/*
    This module reads and writes grammars as JSON files
*/

use std::path::{Path, PathBuf};

use itertools::{Either, Itertools};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{render, Grammar, GrammarErrorType};
use crate::error_handling::*;
use crate::lexeme::{ALTERNATIVE, ARROW, LAMBDA, LAMBDA_PLACEHOLDER};

pub type GrammarError = Error<GrammarErrorType>;
pub type GrammarErrors = Errors<GrammarErrorType>;

pub type EntryResult<T> = std::result::Result<T, GrammarError>;
pub type FileResult<T> = std::result::Result<T, GrammarErrors>;

// Every alternative of one head, joined by `|`
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    pub head: String,
    pub body: String,
}

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrammarFile {
    pub terminals: String,
    pub non_terminals: String,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub rules: Vec<RuleEntry>,
}

impl From<&Grammar> for GrammarFile {
    fn from(grammar: &Grammar) -> Self {
        let rules = grammar
            .rules()
            .iter()
            .map(|(head, rewrite)| RuleEntry {
                head: head.clone(),
                body: rewrite
                    .iter()
                    .map(|alternative| {
                        if alternative.is_empty() {
                            LAMBDA_PLACEHOLDER.to_string()
                        } else {
                            render(alternative)
                        }
                    })
                    .join(&ALTERNATIVE.to_string()),
            })
            .collect();

        GrammarFile {
            terminals: grammar.terminals().iter().collect(),
            non_terminals: grammar.non_terminals().iter().join(";"),
            goal: grammar.goal().unwrap_or_default().to_string(),
            rules,
        }
    }
}

fn io_error(error: std::io::Error, path: &Path) -> GrammarErrors {
    vec![GrammarError::in_file(GrammarErrorType::FileError(error), path)]
}

fn json_error(error: serde_json::Error, path: &Path) -> GrammarErrors {
    vec![GrammarError::in_file(GrammarErrorType::InvalidJson(error.to_string()), path)]
}

impl GrammarFile {
    // Alphabet and goal problems stop the load at once. Every broken rule
    // entry is reported
    pub fn to_grammar(&self, path: &Path) -> FileResult<Grammar> {
        let whole_file = |error| vec![GrammarError::in_file(error, path)];

        let mut grammar = Grammar::new();
        grammar.set_terminals(&self.terminals).map_err(whole_file)?;
        grammar.set_non_terminals(&self.non_terminals).map_err(whole_file)?;
        if !self.goal.is_empty() {
            grammar.set_goal(&self.goal).map_err(whole_file)?;
        }

        let (_, errors): (Vec<()>, GrammarErrors) = self
            .rules
            .iter()
            .enumerate()
            .flat_map(|(num, entry)| {
                entry
                    .body
                    .split(ALTERNATIVE)
                    .map(move |alternative| (num + 1, &entry.head, alternative))
            })
            .map(|(num, head, alternative)| {
                let body = alternative.replace(LAMBDA_PLACEHOLDER, &LAMBDA.to_string());
                grammar
                    .add_rule(&format!("{}{}{}", head, ARROW, body))
                    .map_err(|error| GrammarError::at(error, path, num))
            })
            .partition_map(|result: EntryResult<()>| match result {
                Ok(()) => Either::Left(()),
                Err(error) => Either::Right(error),
            });

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(grammar)
    }
}

pub fn parse(text: &str, path: &Path) -> FileResult<Grammar> {
    let file: GrammarFile = serde_json::from_str(text).map_err(|e| json_error(e, path))?;
    file.to_grammar(path)
}

pub fn load(path: &PathBuf) -> FileResult<Grammar> {
    let text = std::fs::read_to_string(path).map_err(|e| io_error(e, path))?;
    let grammar = parse(&text, path)?;
    debug!("loaded grammar from {}", path.display());
    Ok(grammar)
}

pub fn save(grammar: &Grammar, path: &PathBuf) -> FileResult<()> {
    let text = serde_json::to_string_pretty(&GrammarFile::from(grammar))
        .map_err(|e| json_error(e, path))?;
    std::fs::write(path, text).map_err(|e| io_error(e, path))?;
    debug!("saved grammar to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use tempfile::tempdir;

    use super::*;
    use crate::grammar::tests::grammar;

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("grammar.json");
        let source = grammar("ab", "S;expr", "S", &["S→a<expr>b", "S→λ", "expr→aS"]);

        save(&source, &path).unwrap();
        assert_eq!(load(&path).unwrap(), source);
    }

    #[test]
    fn chomsky_form_reloads() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chomsky.json");
        let mut source = grammar("a,;", "S", "S", &["S→a,S", "S→a;"]);
        source.to_canonical(&mut ()).unwrap();
        let result = source.chomsky();

        assert_eq!(
            result.non_terminals().iter().collect::<Vec<_>>(),
            vec!["S", "S_", "Sa", "[_]", "[a]", "_S"]
        );
        save(&result, &path).unwrap();
        assert_eq!(load(&path).unwrap(), result);
    }

    #[test]
    fn file_layout() {
        let source = grammar("ab", "S;expr", "S", &["S→a<expr>b", "S→λ", "expr→aS"]);
        let file = GrammarFile::from(&source);

        assert_eq!(file.terminals, "ab");
        assert_eq!(file.non_terminals, "S;expr");
        assert_eq!(file.goal, "S");
        assert_eq!(
            file.rules,
            vec![
                RuleEntry { head: "S".to_string(), body: "<lambda>|a<expr>b".to_string() },
                RuleEntry { head: "expr".to_string(), body: "aS".to_string() }
            ]
        );

        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["nonTerminals"], "S;expr");
    }

    #[test]
    fn rule_errors_are_collected() {
        let text = r#"{
            "terminals": "ab",
            "nonTerminals": "S,A",
            "goal": "S",
            "rules": [
                { "head": "S", "body": "aA|<lambda>" },
                { "head": "A", "body": "c|b" },
                { "head": "B", "body": "a" },
                { "head": "A", "body": "a<A" }
            ]
        }"#;
        let path = PathBuf::from("broken.json");

        let errors = parse(text, &path).unwrap_err();
        let entries = vec![2, 3, 4];
        let answers = vec![
            GrammarErrorType::MalformedRule(String::new()),
            GrammarErrorType::MalformedRule(String::new()),
            GrammarErrorType::MalformedLexeme(crate::lexeme::LexemeError::Unterminated)
        ];

        assert_eq!(errors.len(), 3);
        for ((error, entry), answer) in zip(zip(errors, entries), answers) {
            assert_eq!(error.location.entry, entry);
            assert_eq!(error.error, answer);
        }
    }

    #[test]
    fn header_errors_stop_the_load() {
        let path = PathBuf::from("header.json");
        let texts = vec![
            r#"{ "terminals": "aa", "nonTerminals": "S" }"#,
            r#"{ "terminals": "a", "nonTerminals": "S;a" }"#,
            r#"{ "terminals": "a", "nonTerminals": "S", "goal": "T" }"#,
            r#"{ "terminals": "a" }"#,
        ];
        let answers = vec![
            GrammarErrorType::DuplicateSymbol(String::new()),
            GrammarErrorType::AlphabetCollision(String::new()),
            GrammarErrorType::InvalidGoal(String::new()),
            GrammarErrorType::InvalidJson(String::new())
        ];

        for (text, answer) in zip(texts, answers) {
            let errors = parse(text, &path).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].location, Location::file(path.clone()));
            assert_eq!(errors[0].error, answer);
        }
    }

    #[test]
    fn missing_file() {
        let dir = tempdir().unwrap();
        let errors = load(&dir.path().join("absent.json")).unwrap_err();
        assert_eq!(
            errors[0].error,
            GrammarErrorType::FileError(std::io::Error::from(std::io::ErrorKind::NotFound))
        );
    }
}
