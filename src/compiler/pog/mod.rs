use std::fmt::Display;

use crate::compiler::srcloc::Srcloc;

pub mod context;
pub mod definition;
pub mod driver;
pub mod expression;
pub mod formula;
pub mod measure;
pub mod names;
pub mod obligation;
pub mod select;
pub mod state;
pub mod statement;

/// A structural problem in the typed tree that stops generation, such as a
/// call to an operation that does not exist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PogErr(pub Srcloc, pub String);

impl Display for PogErr {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(formatter, "{}: {}", self.0, self.1)
    }
}
