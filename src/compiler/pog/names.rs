use std::collections::BTreeSet;

/// Allocates binder names for one obligation.  Every name it hands out is
/// distinct from the names reserved before, so a generated quantifier never
/// captures a program variable or a name bound by the enclosing context.
/// Allocation is a pure function of what was reserved, which keeps output
/// stable from run to run.
#[derive(Clone, Debug, Default)]
pub struct NameGen {
    taken: BTreeSet<String>,
    issued: Vec<String>,
}

fn identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '\''
}

impl NameGen {
    pub fn new() -> Self {
        NameGen::default()
    }

    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    /// Reserve every identifier appearing in some printed text.
    pub fn reserve_text(&mut self, text: &str) {
        for word in text.split(|c: char| !identifier_char(c)) {
            if word.chars().next().map(|c| c.is_alphabetic()).unwrap_or(false) {
                self.reserve(word);
            }
        }
    }

    /// base itself if free, otherwise base1, base2 and so on.
    pub fn fresh(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut count = 0;
        while self.taken.contains(&candidate) {
            count += 1;
            candidate = format!("{}{}", base, count);
        }
        self.taken.insert(candidate.clone());
        self.issued.push(candidate.clone());
        candidate
    }

    pub fn issued(&self) -> Vec<String> {
        self.issued.clone()
    }

    pub fn is_taken(&self, name: &str) -> bool {
        self.taken.contains(name)
    }
}
