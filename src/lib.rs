pub mod error_handling;
pub mod generator;
pub mod grammar;
pub mod lexeme;
pub mod recognizer;
pub mod sink;
