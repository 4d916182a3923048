use std::fmt::Display;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

/// If a Srcloc identifies a range of characters in the source file, this
/// identifies the tail of the range.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Until {
    pub line: usize,
    pub col: usize,
}

impl Until {
    pub fn from_pair(p: (usize, usize)) -> Self {
        Until {
            line: p.0,
            col: p.1,
        }
    }
}

/// Specifies the coordinates of a node of the typed tree in a source file,
/// including the file name.  The name is held by reference count so they can
/// be held and cloned relatively freely.
///
/// Every obligation carries one of these so that a client can jump to the
/// construct that gave rise to it, and ambiguity markers quote the line and
/// column of the statement they describe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Srcloc {
    pub file: Rc<String>,
    pub line: usize,
    pub col: usize,
    pub until: Option<Until>,
}

pub trait HasLoc {
    fn loc(&self) -> Srcloc;
}

impl Display for Srcloc {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        match &self.until {
            None => formatter.write_str(&format!("{}({}):{}", self.file, self.line, self.col)),
            Some(u) => formatter.write_str(&format!(
                "{}({}):{}-{}({}):{}",
                self.file, self.line, self.col, self.file, u.line, u.col
            )),
        }
    }
}

impl Srcloc {
    /// Create a srcloc given a refcounted pointer to the filename (so they're
    /// always shareable) and the line number and column (1-based).
    pub fn new(name: Rc<String>, line: usize, col: usize) -> Self {
        Srcloc {
            file: name,
            line,
            col,
            until: None,
        }
    }

    /// Given a filename, create a Srcloc that's logically at the beginning of
    /// that file.
    pub fn start(file: &str) -> Srcloc {
        Srcloc {
            file: Rc::new(file.to_string()),
            line: 1,
            col: 1,
            until: None,
        }
    }

    /// The same file at another line and column.
    pub fn at(&self, line: usize, col: usize) -> Srcloc {
        Srcloc::new(self.file.clone(), line, col)
    }

    /// "line:col", the form quoted inside rendered obligation comments.
    pub fn short(&self) -> String {
        format!("{}:{}", self.line, self.col)
    }

    /// Create a srcloc that begins where this srcloc begins and ends at the
    /// farther of the two range endings.
    pub fn ext(&self, other: &Srcloc) -> Srcloc {
        if other.file == self.file {
            combine_src_location(self, other)
        } else {
            self.clone()
        }
    }
}

/// Return the last character addressed by the srcloc.
pub fn src_location_max(a: &Srcloc) -> (usize, usize) {
    match &a.until {
        None => (a.line, a.col + 1),
        Some(u) => (u.line, u.col),
    }
}

fn add_onto(x: &Srcloc, y: &Srcloc) -> Srcloc {
    Srcloc {
        file: x.file.clone(),
        line: x.line,
        col: x.col,
        until: Some(Until::from_pair(src_location_max(y))),
    }
}

/// Helper function for Srcloc::ext.
fn combine_src_location(a: &Srcloc, b: &Srcloc) -> Srcloc {
    match (a.line < b.line, a.line == b.line) {
        (true, _) => add_onto(a, b),
        (_, true) => match (a.col < b.col, a.col == b.col) {
            (true, _) => add_onto(a, b),
            (_, true) => a.clone(),
            _ => add_onto(b, a),
        },
        _ => add_onto(b, a),
    }
}
