use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::compiler::environment::Environment;
use crate::compiler::pog::definition::definition_obligations;
use crate::compiler::pog::obligation::ProofObligationList;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::{HasLoc, Srcloc};
use crate::compiler::typedtree::Module;

pub trait PogOpts {
    fn filename(&self) -> String;
    fn ambiguity_checks(&self) -> bool;
    fn recursion_warnings(&self) -> bool;
    fn max_alternatives(&self) -> usize;

    fn set_filename(&self, new_filename: &str) -> Rc<dyn PogOpts>;
    fn set_ambiguity_checks(&self, checks: bool) -> Rc<dyn PogOpts>;
    fn set_recursion_warnings(&self, warnings: bool) -> Rc<dyn PogOpts>;
    fn set_max_alternatives(&self, limit: usize) -> Rc<dyn PogOpts>;
}

#[derive(Clone, Debug)]
pub struct DefaultPogOpts {
    pub filename: String,
    pub ambiguity_checks: bool,
    pub recursion_warnings: bool,
    pub max_alternatives: usize,
}

impl DefaultPogOpts {
    pub fn new(filename: &str) -> DefaultPogOpts {
        DefaultPogOpts {
            filename: filename.to_string(),
            ambiguity_checks: true,
            recursion_warnings: true,
            max_alternatives: 64,
        }
    }
}

impl PogOpts for DefaultPogOpts {
    fn filename(&self) -> String {
        self.filename.clone()
    }
    fn ambiguity_checks(&self) -> bool {
        self.ambiguity_checks
    }
    fn recursion_warnings(&self) -> bool {
        self.recursion_warnings
    }
    fn max_alternatives(&self) -> usize {
        self.max_alternatives
    }

    fn set_filename(&self, new_filename: &str) -> Rc<dyn PogOpts> {
        let mut copy = self.clone();
        copy.filename = new_filename.to_string();
        Rc::new(copy)
    }
    fn set_ambiguity_checks(&self, checks: bool) -> Rc<dyn PogOpts> {
        let mut copy = self.clone();
        copy.ambiguity_checks = checks;
        Rc::new(copy)
    }
    fn set_recursion_warnings(&self, warnings: bool) -> Rc<dyn PogOpts> {
        let mut copy = self.clone();
        copy.recursion_warnings = warnings;
        Rc::new(copy)
    }
    fn set_max_alternatives(&self, limit: usize) -> Rc<dyn PogOpts> {
        let mut copy = self.clone();
        copy.max_alternatives = limit;
        Rc::new(copy)
    }
}

/// Shared flag asking a running generation to stop at the next definition.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub struct PogResult {
    pub obligations: ProofObligationList,
    /// False when the run was cancelled before every definition was walked.
    pub complete: bool,
}

/// Allows one generation at a time per workspace.
#[derive(Debug, Default)]
pub struct PogSession {
    running: AtomicBool,
}

/// Held for the length of a run; the session is free again once it drops.
#[derive(Debug)]
pub struct PogTicket<'a> {
    session: &'a PogSession,
}

impl PogSession {
    pub fn new() -> Self {
        PogSession::default()
    }

    pub fn begin(&self, loc: &Srcloc) -> Result<PogTicket<'_>, PogErr> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(PogErr(
                loc.clone(),
                "proof obligation generation is already running".to_string(),
            ));
        }
        Ok(PogTicket { session: self })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for PogTicket<'_> {
    fn drop(&mut self) {
        self.session.running.store(false, Ordering::SeqCst);
    }
}

/// Generate the obligations of every definition of a module, in order.
pub fn generate(
    opts: Rc<dyn PogOpts>,
    env: &dyn Environment,
    module: &Module,
    cancel: &CancelToken,
) -> Result<PogResult, PogErr> {
    let mut obligations = ProofObligationList::new();
    let mut complete = true;

    for def in module.definitions.iter() {
        if cancel.is_cancelled() {
            log::debug!(
                "generation for {} cancelled before {} at {}",
                module.name,
                def.name(),
                def.loc()
            );
            complete = false;
            break;
        }
        let found = definition_obligations(env, opts.clone(), def)?;
        log::debug!("{} has {} obligations", def.name(), found.len());
        obligations.append(found);
    }

    obligations.renumber();
    log::debug!(
        "{} obligations for {} in {}",
        obligations.len(),
        module.name,
        opts.filename()
    );
    Ok(PogResult {
        obligations,
        complete,
    })
}

/// generate, holding the session's ticket for the length of the run.
pub fn generate_in_session(
    session: &PogSession,
    opts: Rc<dyn PogOpts>,
    env: &dyn Environment,
    module: &Module,
    cancel: &CancelToken,
) -> Result<PogResult, PogErr> {
    let _ticket = session.begin(&module.loc)?;
    generate(opts, env, module, cancel)
}
