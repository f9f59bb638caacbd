use std::collections::BTreeSet;

use crate::lexeme::{is_name_separator, is_reserved};

// Stands in for characters a non-terminal name cannot hold
const NAME_STAND_IN: char = '_';

// Hands out non-terminal names that clash with nothing already declared or
// handed out. A taken name gets primes appended until it is free
#[derive(Debug, Clone)]
pub struct NameAllocator {
    taken: BTreeSet<String>,
    allocated: Vec<String>,
}

impl NameAllocator {
    pub fn new(existing: &BTreeSet<String>) -> Self {
        NameAllocator {
            taken: existing.clone(),
            allocated: Vec::new(),
        }
    }

    pub fn fresh(&mut self, base: &str) -> String {
        let mut name: String = base
            .chars()
            .map(|c| if is_reserved(c) || is_name_separator(c) { NAME_STAND_IN } else { c })
            .collect();
        while self.taken.contains(&name) {
            name.push('\'');
        }
        self.taken.insert(name.clone());
        self.allocated.push(name.clone());
        name
    }

    // Names handed out so far, oldest first
    pub fn allocated(&self) -> &[String] {
        &self.allocated
    }
}

#[cfg(test)]
mod tests {
    use std::iter::zip;

    use super::*;

    #[test]
    fn fresh_names_never_clash() {
        let existing: BTreeSet<String> = ["S", "S'", "Sa"].iter().map(|s| s.to_string()).collect();
        let mut names = NameAllocator::new(&existing);

        assert_eq!(names.fresh("S'"), "S''");
        assert_eq!(names.fresh("Sa"), "Sa'");
        assert_eq!(names.fresh("Sa"), "Sa''");
        assert_eq!(names.fresh("Sb"), "Sb");
        assert_eq!(names.allocated(), ["S''", "Sa'", "Sa''", "Sb"]);
    }

    #[test]
    fn separators_are_replaced() {
        let mut names = NameAllocator::new(&BTreeSet::new());
        let bases = vec!["[,]", ",S", "S;", "[_]", "a b"];
        let answers = vec!["[_]", "_S", "S_", "[_]'", "a_b"];

        for (base, answer) in zip(bases, answers) {
            assert_eq!(names.fresh(base), answer);
        }
    }
}
