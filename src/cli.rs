use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use formlang::generator::Derivation;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// Log more (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Bring a grammar to canonical form, printing every step
    Canonical {
        /// JSON file containing the grammar
        file: PathBuf,

        /// Save the result here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Bring a grammar to Chomsky normal form
    Chomsky {
        /// JSON file containing the grammar
        file: PathBuf,

        /// Save the result here
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// List the chains of a grammar within a length window
    Generate {
        /// JSON file containing the grammar
        file: PathBuf,

        /// Shortest chain to keep
        #[arg(long, value_name = "LENGTH", default_value_t = 0)]
        min: usize,

        /// Longest chain to keep
        #[arg(long, value_name = "LENGTH", default_value_t = 5)]
        max: usize,

        /// Which non-terminal is rewritten first
        #[arg(long, value_enum, default_value_t = Order::Left)]
        order: Order,

        /// Generate from the canonical form
        #[arg(long)]
        canonical: bool,

        /// Generate from the Chomsky normal form (implies --canonical)
        #[arg(long)]
        chomsky: bool,

        /// Cancel the search after this many seconds
        #[arg(long, value_name = "SECONDS", default_value_t = 60)]
        timeout: u64,
    },

    /// Run a deterministic finite automaton over a chain
    Dfa {
        /// JSON file containing the automaton
        automaton: PathBuf,

        /// Chain to recognize
        #[arg(default_value = "")]
        input: String,
    },

    /// Run a deterministic pushdown automaton over a chain
    Dpda {
        /// JSON file containing the automaton
        automaton: PathBuf,

        /// Chain to recognize
        #[arg(default_value = "")]
        input: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Order {
    Left,
    Right,
}

impl From<Order> for Derivation {
    fn from(order: Order) -> Self {
        match order {
            Order::Left => Derivation::Leftmost,
            Order::Right => Derivation::Rightmost,
        }
    }
}
