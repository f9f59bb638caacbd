mod cli;

use std::fmt::Display;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;

use clap::Parser;
use itertools::Itertools;
use tracing::{warn, Level};

use cli::{Cli, Command};
use formlang::generator::{GenerationOutcome, GenerationSettings, GenerationTask, Generator};
use formlang::grammar::{file, Grammar};
use formlang::lexeme::LAMBDA;
use formlang::recognizer::{self, Automaton, Dfa, Dpda};
use formlang::sink::TraceSink;

// Prints trace lines as they arrive
struct Stdout;

impl TraceSink for Stdout {
    fn append_line(&mut self, line: &str) {
        println!("{}", line);
    }
}

fn describe(errors: impl IntoIterator<Item = impl Display>) -> String {
    errors.into_iter().join("\n")
}

fn load_grammar(path: &PathBuf) -> Result<Grammar, String> {
    file::load(path).map_err(describe)
}

fn save_grammar(grammar: &Grammar, output: Option<PathBuf>) -> Result<(), String> {
    match output {
        Some(path) => file::save(grammar, &path).map_err(describe),
        None => Ok(()),
    }
}

fn canonical(path: PathBuf, output: Option<PathBuf>) -> Result<(), String> {
    let mut grammar = load_grammar(&path)?;
    grammar.to_canonical(&mut Stdout).map_err(|e| e.to_string())?;
    println!("{}", grammar);
    save_grammar(&grammar, output)
}

fn chomsky(path: PathBuf, output: Option<PathBuf>) -> Result<(), String> {
    let mut grammar = load_grammar(&path)?;
    grammar.to_canonical(&mut ()).map_err(|e| e.to_string())?;
    let grammar = grammar.chomsky();
    println!("{}", grammar);
    save_grammar(&grammar, output)
}

fn generate(
    path: PathBuf,
    settings: GenerationSettings,
    canonical: bool,
    chomsky: bool,
    timeout: Duration,
) -> Result<(), String> {
    let mut grammar = load_grammar(&path)?;
    if canonical || chomsky {
        grammar.to_canonical(&mut ()).map_err(|e| e.to_string())?;
    }
    if chomsky {
        grammar.to_chomsky();
    }

    let generator = Generator::from_grammar(&grammar, settings).map_err(|e| e.to_string())?;
    let (sender, receiver) = mpsc::channel();
    let task = GenerationTask::spawn(generator, move |outcome: GenerationOutcome| {
        let _ = sender.send(outcome);
    })
    .map_err(|e| e.to_string())?;

    let outcome = match receiver.recv_timeout(timeout) {
        Ok(outcome) => outcome,
        Err(RecvTimeoutError::Timeout) => {
            warn!("no result after {}s, canceling", timeout.as_secs());
            task.cancel();
            receiver.recv().map_err(|e| e.to_string())?
        }
        Err(e) => return Err(e.to_string()),
    };
    task.join();
    match outcome {
        GenerationOutcome::Completed(chains) => {
            for chain in &chains {
                if chain.is_empty() {
                    println!("{}", LAMBDA);
                } else {
                    println!("{}", chain);
                }
            }
            println!("Chains: {}", chains.len());
            Ok(())
        }
        GenerationOutcome::Canceled => Err(format!(
            "Generation was canceled after {}s, try a smaller --max",
            timeout.as_secs()
        )),
        GenerationOutcome::Failed(message) => Err(format!("Generation failed: {}", message)),
    }
}

fn recognize<A: Automaton + serde::de::DeserializeOwned>(path: PathBuf, input: &str) -> Result<(), String> {
    let automaton: A = recognizer::load(&path).map_err(|e| e.to_string())?;
    automaton.recognize(input, &mut Stdout).map_err(|e| e.to_string())?;
    println!("Accepted");
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .try_init();

    let result = match cli.command {
        Command::Canonical { file, output } => canonical(file, output),
        Command::Chomsky { file, output } => chomsky(file, output),
        Command::Generate { file, min, max, order, canonical, chomsky, timeout } => {
            let timeout = Duration::from_secs(timeout);
            GenerationSettings::new(min, max, order.into())
                .map_err(|e| e.to_string())
                .and_then(|settings| generate(file, settings, canonical, chomsky, timeout))
        }
        Command::Dfa { automaton, input } => recognize::<Dfa>(automaton, &input),
        Command::Dpda { automaton, input } => recognize::<Dpda>(automaton, &input),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
