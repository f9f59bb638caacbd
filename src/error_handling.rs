/*
    This module holds the error plumbing shared by grammar files and automata
*/

use std::path::{Path, PathBuf};
use std::fmt::Display;

pub trait ErrorType: Display + PartialEq {}

// Where a located error came from. `entry` counts rule entries of a grammar
// file starting at 1; 0 means the file as a whole
#[derive(Debug, PartialEq, Clone)]
pub struct Location {
    pub file: PathBuf,
    pub entry: usize
}

impl Location {
    pub fn file(file: PathBuf) -> Self {
        Location { file, entry: 0 }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.entry == 0 {
            write!(f, "{}", self.file.display())
        } else {
            write!(f, "{} rule #{}", self.file.display(), self.entry)
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Error<T: ErrorType> {
    pub location: Location,
    pub error: T
}

impl<T: ErrorType> Error<T> {
    pub fn at(error: T, file: &Path, entry: usize) -> Self {
        Error {
            location: Location { file: file.to_path_buf(), entry },
            error
        }
    }

    // Blames the whole file
    pub fn in_file(error: T, file: &Path) -> Self {
        Self::at(error, file, 0)
    }
}

impl<T: ErrorType> Display for Error<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\x1b[31;49;1m[{}]\x1b[39;49;1m  {}\x1b[0m", self.location, self.error)
    }
}

pub type Errors<T> = Vec<Error<T>>;

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    #[derive(Debug, PartialEq)]
    struct Broken;

    impl ErrorType for Broken {}

    impl Display for Broken {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "broken")
        }
    }

    #[test]
    fn locations() {
        let errors = vec![
            Error::in_file(Broken, Path::new("g.json")),
            Error::at(Broken, Path::new("g.json"), 3)
        ];
        let answers = vec![
            "\x1b[31;49;1m[g.json]\x1b[39;49;1m  broken\x1b[0m",
            "\x1b[31;49;1m[g.json rule #3]\x1b[39;49;1m  broken\x1b[0m"
        ];

        for (error, answer) in zip(errors, answers) {
            assert_eq!(error.to_string(), answer);
        }
        assert_eq!(Error::in_file(Broken, Path::new("g.json")).location, Location::file(PathBuf::from("g.json")));
    }
}
