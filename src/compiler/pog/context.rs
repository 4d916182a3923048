use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::Serialize;

use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::formula::{binder_lines, Binder, FBind, Formula};
use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::{Expr, Quantifier};
use crate::compiler::types::Type;

/// A statement whose effect on some variables depends on evaluation order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AmbiguityData {
    pub description: String,
    pub vars: Vec<(String, Type)>,
    pub loc: Srcloc,
}

impl AmbiguityData {
    pub fn names(&self) -> BTreeSet<String> {
        self.vars.iter().map(|(n, _)| n.clone()).collect()
    }
}

pub fn names_text<'a, I: Iterator<Item = &'a String>>(names: I) -> String {
    format!("{{{}}}", names.cloned().collect::<Vec<String>>().join(", "))
}

/// One frame of the logical context in front of an obligation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum POContext {
    Scope,
    ForAllRange {
        var: String,
        from: Rc<Expr>,
        to: Rc<Expr>,
        by: Option<Rc<Expr>>,
    },
    Quantified {
        quantifier: Quantifier,
        binds: Vec<FBind>,
    },
    Let {
        pattern: String,
        value: Rc<Formula>,
        update: bool,
    },
    Implies {
        antecedent: Rc<Formula>,
    },
    ResolvedAmbiguity {
        vars: BTreeSet<String>,
        loc: Srcloc,
    },
    AmbiguousUpdate(AmbiguityData),
    /// Variables whose values are unknown from here on.
    Havoc {
        note: Option<String>,
        vars: Vec<(String, Type)>,
    },
    Return {
        result: Rc<Formula>,
    },
    AltBranch {
        choice: usize,
        index: usize,
        guard: Rc<Formula>,
        frames: Vec<Rc<POContext>>,
    },
}

impl POContext {
    pub fn implies(antecedent: Rc<Formula>) -> POContext {
        POContext::Implies { antecedent }
    }

    pub fn let_expr(pattern: &str, value: &Rc<Expr>) -> POContext {
        POContext::Let {
            pattern: pattern.to_string(),
            value: Formula::expr(value),
            update: false,
        }
    }

    pub fn forall(binds: Vec<FBind>) -> POContext {
        POContext::Quantified {
            quantifier: Quantifier::Forall,
            binds,
        }
    }

    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            POContext::AltBranch { .. } | POContext::AmbiguousUpdate(_)
        )
    }

    /// The lines this frame contributes in front of a condition.
    pub fn binders(&self) -> Vec<Binder> {
        match self {
            POContext::Scope => vec![],
            POContext::ForAllRange { var, from, to, by } => {
                let guard = by.as_ref().map(|by| {
                    Formula::binary(
                        BinaryOp::Equals,
                        Formula::binary(
                            BinaryOp::Mod,
                            Formula::binary(BinaryOp::Minus, Formula::name(var), Formula::expr(from)),
                            Formula::expr(by),
                        ),
                        Formula::int(0),
                    )
                });
                vec![Binder::Quantifier(
                    Quantifier::Forall,
                    vec![FBind::Set(
                        var.clone(),
                        Rc::new(Formula::SetRange(Formula::expr(from), Formula::expr(to))),
                    )],
                    guard,
                )]
            }
            POContext::Quantified { quantifier, binds } => {
                vec![Binder::Quantifier(*quantifier, binds.clone(), None)]
            }
            POContext::Let { pattern, value, .. } => {
                vec![Binder::Let(vec![(pattern.clone(), value.clone())])]
            }
            POContext::Implies { antecedent } => vec![Binder::Implies(antecedent.clone())],
            POContext::ResolvedAmbiguity { vars, loc } => vec![Binder::Comment(format!(
                "-- Resolved ambiguity {} at {}",
                names_text(vars.iter()),
                loc.short()
            ))],
            POContext::AmbiguousUpdate(a) => vec![Binder::Comment(ambiguity_comment(a))],
            POContext::Havoc { note, vars } => {
                let mut result = Vec::new();
                if let Some(n) = note {
                    result.push(Binder::Comment(n.clone()));
                }
                if !vars.is_empty() {
                    result.push(Binder::Quantifier(
                        Quantifier::Forall,
                        vars.iter()
                            .map(|(n, t)| FBind::Type(n.clone(), t.clone()))
                            .collect(),
                        None,
                    ));
                }
                result
            }
            POContext::Return { result } => {
                vec![Binder::Let(vec![("RESULT".to_string(), result.clone())])]
            }
            POContext::AltBranch {
                choice,
                index,
                guard,
                frames,
            } => {
                let mut result = vec![
                    Binder::Comment(format!(
                        "-- Alternative {} of choice {}",
                        index + 1,
                        choice
                    )),
                    Binder::Implies(guard.clone()),
                ];
                for f in frames.iter() {
                    result.append(&mut f.binders());
                }
                result
            }
        }
    }
}

fn ambiguity_comment(a: &AmbiguityData) -> String {
    format!(
        "-- Ambiguous {} updates {} at {}",
        a.description,
        names_text(a.names().iter()),
        a.loc.short()
    )
}

#[derive(Debug)]
struct StackNode {
    frame: Rc<POContext>,
    below: Option<Rc<StackNode>>,
}

/// Position on a stack recorded by push, for pop_to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Marker(usize);

/// The context stack.  Nodes are shared between copies, so cloning is cheap
/// and pushing onto a clone never disturbs the original.
#[derive(Clone, Debug, Default)]
pub struct POContextStack {
    top: Option<Rc<StackNode>>,
    depth: usize,
}

impl POContextStack {
    pub fn new() -> Self {
        POContextStack::default()
    }

    pub fn from_frames(frames: Vec<Rc<POContext>>) -> Self {
        let mut result = POContextStack::new();
        for f in frames.into_iter() {
            result.push_rc(f);
        }
        result
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn is_empty(&self) -> bool {
        self.depth == 0
    }

    pub fn mark(&self) -> Marker {
        Marker(self.depth)
    }

    /// Push a frame, returning a marker that pops back to just below it.
    pub fn push(&mut self, frame: POContext) -> Marker {
        self.push_rc(Rc::new(frame))
    }

    pub fn push_rc(&mut self, frame: Rc<POContext>) -> Marker {
        let marker = Marker(self.depth);
        let below = self.top.take();
        self.top = Some(Rc::new(StackNode { frame, below }));
        self.depth += 1;
        marker
    }

    /// Push a Scope frame to be found again by pop_to.
    pub fn push_scope(&mut self) -> Marker {
        self.push(POContext::Scope)
    }

    pub fn pop(&mut self) -> Option<Rc<POContext>> {
        let top = self.top.take()?;
        self.top = top.below.clone();
        self.depth -= 1;
        Some(top.frame.clone())
    }

    pub fn pop_to(&mut self, marker: Marker) {
        while self.depth > marker.0 {
            if self.pop().is_none() {
                break;
            }
        }
    }

    /// All frames, outermost first.
    pub fn frames(&self) -> Vec<Rc<POContext>> {
        let mut result = Vec::with_capacity(self.depth);
        let mut here = self.top.clone();
        while let Some(node) = here {
            result.push(node.frame.clone());
            here = node.below.clone();
        }
        result.reverse();
        result
    }

    /// Frames pushed since the marker was taken, outermost first.
    pub fn frames_above(&self, marker: Marker) -> Vec<Rc<POContext>> {
        let frames = self.frames();
        frames.into_iter().skip(marker.0).collect()
    }

    /// Every semantically distinct linear context this stack stands for.
    pub fn expand(&self) -> Vec<POContextStack> {
        let frames = self.frames();
        if !frames.iter().any(|f| f.is_choice()) {
            return vec![self.clone()];
        }
        expand_frames(&frames)
            .into_iter()
            .map(POContextStack::from_frames)
            .collect()
    }

    pub fn binders(&self) -> Vec<Binder> {
        self.frames().iter().flat_map(|f| f.binders()).collect()
    }

    pub fn render(&self) -> Vec<String> {
        binder_lines(&self.binders()).0
    }

    /// Put the condition under every frame of the stack.
    pub fn wrap(&self, condition: Rc<Formula>) -> Rc<Formula> {
        self.binders()
            .into_iter()
            .rev()
            .fold(condition, |body, b| Formula::scoped(b, body))
    }

    pub fn resolved_variables(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        visit_frames(&self.frames(), &mut |f| {
            if let POContext::ResolvedAmbiguity { vars, .. } = f {
                result.append(&mut vars.clone());
            }
        });
        result
    }

    pub fn unresolved_ambiguities(&self) -> Vec<AmbiguityData> {
        let mut result = Vec::new();
        visit_frames(&self.frames(), &mut |f| {
            if let POContext::AmbiguousUpdate(a) = f {
                result.push(a.clone());
            }
        });
        result
    }

    /// Names given new values by assignments in this context.
    pub fn update_names(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        visit_frames(&self.frames(), &mut |f| {
            if let POContext::Let {
                pattern,
                update: true,
                ..
            } = f
            {
                result.insert(pattern.clone());
            }
        });
        result
    }
}

impl POContextStack {
    /// End the scope of the local names declared since the marker.  Frames
    /// binding them go, effects on outer variables stay.  An effect computed
    /// from a local value becomes an unknown value of the outer variable,
    /// typed from types.
    pub fn leave_scope(
        &mut self,
        marker: Marker,
        locals: &BTreeSet<String>,
        types: &BTreeMap<String, Type>,
    ) {
        let frames = self.frames_above(marker);
        self.pop_to(marker);
        for f in outside_effects(&frames, locals, types, false).into_iter() {
            self.push_rc(f);
        }
    }
}

fn mentions(f: &Formula, names: &BTreeSet<String>) -> bool {
    f.program_variables().iter().any(|n| names.contains(n))
}

fn without(vars: &[(String, Type)], names: &BTreeSet<String>) -> Vec<(String, Type)> {
    vars.iter()
        .filter(|(n, _)| !names.contains(n))
        .cloned()
        .collect()
}

fn outside_effects(
    frames: &[Rc<POContext>],
    locals: &BTreeSet<String>,
    types: &BTreeMap<String, Type>,
    nested: bool,
) -> Vec<Rc<POContext>> {
    let mut locals = locals.clone();
    let mut result = Vec::new();
    for frame in frames.iter() {
        match frame.as_ref() {
            POContext::Scope | POContext::Return { .. } => {}
            POContext::Let {
                pattern,
                value,
                update: false,
            } => {
                if !nested || mentions(value, &locals) {
                    locals.insert(pattern.clone());
                } else {
                    result.push(frame.clone());
                }
            }
            POContext::Let {
                pattern,
                value,
                update: true,
            } => {
                if locals.contains(pattern) {
                    continue;
                }
                if mentions(value, &locals) {
                    let ty = types.get(pattern).cloned().unwrap_or(Type::Unknown);
                    result.push(Rc::new(POContext::Havoc {
                        note: None,
                        vars: vec![(pattern.clone(), ty)],
                    }));
                } else {
                    result.push(frame.clone());
                }
            }
            POContext::Implies { antecedent } => {
                if !mentions(antecedent, &locals) {
                    result.push(frame.clone());
                }
            }
            POContext::ResolvedAmbiguity { vars, loc } => {
                let vars: BTreeSet<String> = vars.difference(&locals).cloned().collect();
                if !vars.is_empty() {
                    result.push(Rc::new(POContext::ResolvedAmbiguity {
                        vars,
                        loc: loc.clone(),
                    }));
                }
            }
            POContext::AmbiguousUpdate(a) => {
                let vars = without(&a.vars, &locals);
                if !vars.is_empty() {
                    result.push(Rc::new(POContext::AmbiguousUpdate(AmbiguityData {
                        description: a.description.clone(),
                        vars,
                        loc: a.loc.clone(),
                    })));
                }
            }
            POContext::Havoc { note, vars } => {
                let vars = without(vars, &locals);
                if !vars.is_empty() {
                    result.push(Rc::new(POContext::Havoc {
                        note: note.clone(),
                        vars,
                    }));
                }
            }
            POContext::AltBranch {
                choice,
                index,
                guard,
                frames: inner,
            } => {
                // Guards over locals are dropped.
                let guard = if mentions(guard, &locals) {
                    Rc::new(Formula::Bool(true))
                } else {
                    guard.clone()
                };
                result.push(Rc::new(POContext::AltBranch {
                    choice: *choice,
                    index: *index,
                    guard,
                    frames: outside_effects(inner, &locals, types, true),
                }));
            }
            POContext::ForAllRange { .. } | POContext::Quantified { .. } => {
                result.push(frame.clone());
            }
        }
    }
    result
}

fn visit_frames(frames: &[Rc<POContext>], f: &mut dyn FnMut(&POContext)) {
    for frame in frames.iter() {
        f(frame);
        if let POContext::AltBranch { frames: inner, .. } = frame.as_ref() {
            visit_frames(inner, f);
        }
    }
}

fn cross(
    prefixes: Vec<Vec<Rc<POContext>>>,
    options: &[Vec<Rc<POContext>>],
) -> Vec<Vec<Rc<POContext>>> {
    let mut result = Vec::with_capacity(prefixes.len() * options.len());
    for p in prefixes.iter() {
        for o in options.iter() {
            let mut alt = p.clone();
            alt.extend(o.iter().cloned());
            result.push(alt);
        }
    }
    result
}

fn expand_frames(frames: &[Rc<POContext>]) -> Vec<Vec<Rc<POContext>>> {
    let mut alternatives: Vec<Vec<Rc<POContext>>> = vec![vec![]];
    let mut i = 0;
    while i < frames.len() {
        match frames[i].as_ref() {
            POContext::AltBranch { choice, .. } => {
                let group_choice = *choice;
                let mut options = Vec::new();
                while i < frames.len() {
                    match frames[i].as_ref() {
                        POContext::AltBranch {
                            choice,
                            guard,
                            frames: inner,
                            ..
                        } if *choice == group_choice => {
                            for sub in expand_frames(inner).into_iter() {
                                let mut option =
                                    vec![Rc::new(POContext::implies(guard.clone()))];
                                option.extend(sub.into_iter());
                                options.push(option);
                            }
                            i += 1;
                        }
                        _ => break,
                    }
                }
                alternatives = cross(alternatives, &options);
            }
            POContext::AmbiguousUpdate(a) => {
                let havoc = Rc::new(POContext::Havoc {
                    note: Some(ambiguity_comment(a)),
                    vars: a.vars.clone(),
                });
                for alt in alternatives.iter_mut() {
                    alt.push(havoc.clone());
                }
                i += 1;
            }
            _ => {
                for alt in alternatives.iter_mut() {
                    alt.push(frames[i].clone());
                }
                i += 1;
            }
        }
    }
    alternatives
}
