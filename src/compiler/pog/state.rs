use std::collections::BTreeSet;
use std::rc::Rc;

use crate::compiler::pog::driver::PogOpts;
use crate::compiler::typedtree::{Definition, Expr};
use crate::compiler::types::Type;

/// Mutable facts gathered while walking one top level definition.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct POGState {
    /// Name of the definition being walked.
    pub definition: String,
    /// Names assigned so far in the current statement sequence.
    pub written: BTreeSet<String>,
    /// Program variables read by the statement being walked.
    pub reading: BTreeSet<String>,
    /// Postcondition and result type of the enclosing operation.
    pub post: Option<Rc<Expr>>,
    pub result_type: Option<Type>,
    /// The function being walked, for recursion checks.
    pub function: Option<Definition>,
    next_choice: usize,
    #[derivative(Debug = "ignore")]
    opts: Rc<dyn PogOpts>,
}

impl POGState {
    pub fn new(opts: Rc<dyn PogOpts>, definition: &str) -> Self {
        POGState {
            definition: definition.to_string(),
            written: BTreeSet::new(),
            reading: BTreeSet::new(),
            post: None,
            result_type: None,
            function: None,
            next_choice: 1,
            opts,
        }
    }

    pub fn opts(&self) -> Rc<dyn PogOpts> {
        self.opts.clone()
    }

    /// Allocate the id of a new multi-way choice.
    pub fn next_choice(&mut self) -> usize {
        let choice = self.next_choice;
        self.next_choice += 1;
        choice
    }
}
