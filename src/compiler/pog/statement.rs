use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::compiler::environment::Environment;
use crate::compiler::ops::{BinaryOp, UnaryOp};
use crate::compiler::pog::context::{names_text, AmbiguityData, POContext, POContextStack};
use crate::compiler::pog::expression::{
    expression_obligations, match_condition, operation_call, pattern_frames, subtype_obligations,
    value_binding,
};
use crate::compiler::pog::formula::Formula;
use crate::compiler::pog::obligation::{flagged, obligations_for, POType, ProofObligationList};
use crate::compiler::pog::state::POGState;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::{HasLoc, Srcloc};
use crate::compiler::typedtree::{
    Definition, Expr, ForIndexData, LocalDef, StateDesignator, Stmt,
};
use crate::compiler::types::Type;

/// One way through an if or cases statement.
struct Branch {
    guard: Rc<Formula>,
    frames: Vec<POContext>,
    body: Option<Rc<Stmt>>,
}

fn call_writes(env: &dyn Environment) -> impl Fn(&str) -> Vec<(String, Type)> + '_ {
    move |name: &str| {
        env.find_operation(name)
            .map(|o| o.writes)
            .unwrap_or_default()
    }
}

fn under(ctxt: &POContextStack, frame: POContext) -> POContextStack {
    let mut result = ctxt.clone();
    result.push(frame);
    result
}

/// The variable an identifier designator updates, its type and the
/// variables the designator reads.
pub fn updated_variable(designator: &StateDesignator) -> (String, Type, BTreeSet<String>) {
    let (name, ty) = designator.base();
    (name, ty, designator.variables())
}

/// The new value of the whole variable once the designated part of it is
/// replaced by value.
fn updated_value(designator: &StateDesignator, value: Rc<Formula>) -> Rc<Formula> {
    match designator {
        StateDesignator::Identifier(_, _, _) => value,
        StateDesignator::MapSeq(_, inner, key, _) => {
            let current = Formula::expr(&Rc::new(inner.as_expr()));
            updated_value(
                inner,
                Formula::binary(
                    BinaryOp::PlusPlus,
                    current,
                    Rc::new(Formula::MapEnum(vec![(Formula::expr(key), value)])),
                ),
            )
        }
        StateDesignator::Field(_, inner, field, _) => {
            let current = Formula::expr(&Rc::new(inner.as_expr()));
            updated_value(
                inner,
                Rc::new(Formula::Mu(current, vec![(field.clone(), value)])),
            )
        }
    }
}

fn designator_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    designator: &StateDesignator,
) -> Result<ProofObligationList, PogErr> {
    match designator {
        StateDesignator::Identifier(_, _, _) => Ok(ProofObligationList::new()),
        StateDesignator::MapSeq(loc, inner, key, ty) => {
            let mut obligations = designator_obligations(env, state, ctxt, inner)?;
            obligations.append(expression_obligations(env, state, ctxt, key)?);
            if ty.is_seq() {
                let container = Rc::new(inner.as_expr());
                obligations.append(obligations_for(
                    state,
                    ctxt,
                    POType::SeqApply,
                    loc,
                    &[&container, key],
                    |_| {
                        Ok(Formula::binary(
                            BinaryOp::InSet,
                            Formula::expr(key),
                            Formula::unary(UnaryOp::Inds, Formula::expr(&container)),
                        ))
                    },
                )?);
            }
            Ok(obligations)
        }
        StateDesignator::Field(_, inner, _, _) => designator_obligations(env, state, ctxt, inner),
    }
}

fn state_invariant(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    name: &str,
) -> Result<ProofObligationList, PogErr> {
    if let Some(def) = env.state_definition() {
        if let Definition::State(s) = def.as_ref() {
            if s.invariant.is_some() && s.fields.iter().any(|(f, _)| f == name) {
                let fields: Vec<Rc<Formula>> =
                    s.fields.iter().map(|(f, _)| Formula::name(f)).collect();
                return obligations_for(state, ctxt, POType::StateInvariant, loc, &[], |_| {
                    Ok(Formula::call(
                        &format!("inv_{}", s.name),
                        vec![Rc::new(Formula::Record(s.name.clone(), fields.clone()))],
                    ))
                });
            }
        }
    }
    Ok(ProofObligationList::new())
}

fn assignment(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    loc: &Srcloc,
    designator: &StateDesignator,
    value: &Rc<Expr>,
    value_type: &Type,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = expression_obligations(env, state, ctxt, value)?;
    obligations.append(designator_obligations(env, state, ctxt, designator)?);
    obligations.append(subtype_obligations(
        state,
        ctxt,
        loc,
        value,
        value_type,
        &designator.target_type(),
    )?);

    let (name, _, _) = updated_variable(designator);
    ctxt.push(POContext::Let {
        pattern: name.clone(),
        value: updated_value(designator, Formula::expr(value)),
        update: true,
    });
    state.written.insert(name.clone());
    obligations.append(state_invariant(env, state, ctxt, loc, &name)?);
    Ok(obligations)
}

/// Flag reads of variables left ambiguous by an earlier statement, then
/// record them as resolved so enclosing statements do not flag them again.
fn check_ambiguity(
    state: &mut POGState,
    ctxt: &mut POContextStack,
    stmt: &Stmt,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    let reads = stmt.reads();
    state.reading = reads.clone();
    if !state.opts().ambiguity_checks() {
        return Ok(obligations);
    }

    let loc = stmt.loc();
    for ambiguity in ctxt.unresolved_ambiguities().iter() {
        let resolved = ctxt.resolved_variables();
        let clash: BTreeSet<String> = ambiguity
            .names()
            .intersection(&reads)
            .filter(|n| !resolved.contains(*n) && !state.written.contains(*n))
            .cloned()
            .collect();
        if clash.is_empty() {
            continue;
        }

        let comment = format!(
            "-- Unresolved ambiguity {} read at {} after {} at {}",
            names_text(clash.iter()),
            loc.short(),
            ambiguity.description,
            ambiguity.loc.short()
        );
        obligations.append(obligations_for(
            state,
            ctxt,
            POType::Ambiguous,
            &loc,
            &[],
            |_| Ok(flagged(comment.clone())),
        )?
        .with_message(&format!(
            "unresolved ambiguity of {}",
            names_text(clash.iter())
        )));
        ctxt.push(POContext::ResolvedAmbiguity {
            vars: clash,
            loc: loc.clone(),
        });
    }
    Ok(obligations)
}

pub fn contains_return(stmt: &Stmt) -> bool {
    matches!(stmt, Stmt::Return(_, _, _)) || stmt.children().iter().any(|c| contains_return(c))
}

/// Mark the variables a loop without an invariant updates as ambiguous
/// from here on.
fn push_loop_updates(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    description: &str,
    loc: &Srcloc,
    body: &Stmt,
    local: Option<&str>,
) {
    let mut updates = body.updates(&call_writes(env));
    if let Some(l) = local {
        updates.remove(l);
    }
    if let Some(rt) = &state.result_type {
        if contains_return(body) {
            updates.insert("RESULT".to_string(), rt.clone());
        }
    }
    if updates.is_empty() {
        return;
    }
    for n in updates.keys() {
        state.written.remove(n);
    }
    ctxt.push(POContext::AmbiguousUpdate(AmbiguityData {
        description: description.to_string(),
        vars: updates.into_iter().collect(),
        loc: loc.clone(),
    }));
}

fn resolutions_in(frames: &[Rc<POContext>]) -> BTreeSet<String> {
    POContextStack::from_frames(frames.to_vec()).resolved_variables()
}

fn loop_invariant(
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    invariant: &Rc<Expr>,
    message: &str,
) -> Result<ProofObligationList, PogErr> {
    Ok(
        obligations_for(state, ctxt, POType::LoopInvariant, loc, &[invariant], |_| {
            Ok(Formula::expr(invariant))
        })?
        .with_message(message),
    )
}

/// Walk a loop body in a scope of its own, leaving only the resolutions it
/// made behind.
fn loop_body(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    loc: &Srcloc,
    frames: Vec<POContext>,
    body: &Rc<Stmt>,
) -> Result<ProofObligationList, PogErr> {
    let marker = ctxt.push_scope();
    for f in frames.into_iter() {
        ctxt.push(f);
    }
    let saved = state.written.clone();
    let obligations = statement_obligations(env, state, ctxt, body)?;
    let resolved = resolutions_in(&ctxt.frames_above(marker));
    ctxt.pop_to(marker);
    state.written = saved;
    if !resolved.is_empty() {
        ctxt.push(POContext::ResolvedAmbiguity {
            vars: resolved,
            loc: loc.clone(),
        });
    }
    Ok(obligations)
}

fn range_frame(f: &ForIndexData) -> POContext {
    POContext::ForAllRange {
        var: f.var.clone(),
        from: f.from.clone(),
        to: f.to.clone(),
        by: f.by.clone(),
    }
}

fn for_index(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    f: &ForIndexData,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = expression_obligations(env, state, ctxt, &f.from)?;
    obligations.append(expression_obligations(env, state, ctxt, &f.to)?);
    if let Some(by) = &f.by {
        obligations.append(expression_obligations(env, state, ctxt, by)?);
    }

    match &f.invariant {
        None => {
            obligations.append(loop_body(
                env,
                state,
                ctxt,
                &f.loc,
                vec![range_frame(f)],
                &f.body,
            )?);
            push_loop_updates(env, state, ctxt, "for loop", &f.loc, &f.body, Some(&f.var));
        }
        Some(inv) => {
            let initial = ctxt.push(POContext::let_expr(&f.var, &f.from));
            obligations.append(loop_invariant(state, ctxt, &f.loc, inv, "check initial for-loop")?);
            ctxt.pop_to(initial);

            let scope = ctxt.push_scope();
            ctxt.push(range_frame(f));
            obligations.append(loop_invariant(state, ctxt, &f.loc, inv, "check before for-loop")?);
            ctxt.push(POContext::implies(Formula::expr(inv)));
            let saved = state.written.clone();
            obligations.append(statement_obligations(env, state, ctxt, &f.body)?);
            obligations.append(loop_invariant(state, ctxt, &f.loc, inv, "check after for-loop")?);
            ctxt.pop_to(scope);
            state.written = saved;

            ctxt.push(POContext::implies(Formula::expr(inv)));
        }
    }
    Ok(obligations)
}

fn while_loop(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    loc: &Srcloc,
    cond: &Rc<Expr>,
    invariant: &Option<Rc<Expr>>,
    body: &Rc<Stmt>,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = expression_obligations(env, state, ctxt, cond)?;
    match invariant {
        None => {
            obligations.append(loop_body(
                env,
                state,
                ctxt,
                loc,
                vec![POContext::implies(Formula::expr(cond))],
                body,
            )?);
            push_loop_updates(env, state, ctxt, "while loop", loc, body, None);
        }
        Some(inv) => {
            obligations.append(loop_invariant(state, ctxt, loc, inv, "check before while")?);

            let updates: Vec<(String, Type)> =
                body.updates(&call_writes(env)).into_iter().collect();
            let havoc = POContext::Havoc {
                note: None,
                vars: updates,
            };
            let scope = ctxt.push_scope();
            ctxt.push(havoc.clone());
            ctxt.push(POContext::implies(Formula::and_all(vec![
                Formula::expr(inv),
                Formula::expr(cond),
            ])));
            let saved = state.written.clone();
            obligations.append(statement_obligations(env, state, ctxt, body)?);
            obligations.append(loop_invariant(state, ctxt, loc, inv, "check after while body")?);
            ctxt.pop_to(scope);
            state.written = saved;

            ctxt.push(havoc);
            ctxt.push(POContext::implies(Formula::and_all(vec![
                Formula::expr(inv),
                Formula::not(Formula::expr(cond)),
            ])));
        }
    }
    Ok(obligations)
}

/// Walk every branch on its own copy of the context.  When any branch leaves
/// frames behind, the branches are recorded as one choice on the stack.
fn branching(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    branches: Vec<Branch>,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    let choice = state.next_choice();
    let outer_written = state.written.clone();
    let mut written: Option<BTreeSet<String>> = None;
    let mut recorded = Vec::new();
    let mut left_behind = false;

    for (index, branch) in branches.into_iter().enumerate() {
        let mut bctxt = ctxt.clone();
        bctxt.push(POContext::implies(branch.guard.clone()));
        let guard_marker = bctxt.mark();
        for f in branch.frames.into_iter() {
            bctxt.push(f);
        }
        let body_marker = bctxt.mark();

        state.written = outer_written.clone();
        if let Some(body) = &branch.body {
            obligations.append(statement_obligations(env, state, &mut bctxt, body)?);
        }
        written = Some(match written {
            None => state.written.clone(),
            Some(w) => w.intersection(&state.written).cloned().collect(),
        });

        left_behind = left_behind || !bctxt.frames_above(body_marker).is_empty();
        recorded.push((index, branch.guard, bctxt.frames_above(guard_marker)));
    }

    state.written = written.unwrap_or(outer_written);
    if left_behind {
        for (index, guard, frames) in recorded.into_iter() {
            ctxt.push(POContext::AltBranch {
                choice,
                index,
                guard,
                frames,
            });
        }
    }
    Ok(obligations)
}

fn local_definitions(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    defs: &[LocalDef],
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    for d in defs.iter() {
        obligations.append(expression_obligations(env, state, ctxt, &d.value)?);
        obligations.append(subtype_obligations(
            state,
            ctxt,
            &d.loc,
            &d.value,
            &d.value_type,
            &d.ty,
        )?);
        if !d.pattern.always_matches(&d.ty) {
            obligations.append(value_binding(
                state, ctxt, &d.loc, &d.pattern, &d.ty, &d.value,
            )?);
        }
        ctxt.push(POContext::let_expr(&d.pattern.to_string(), &d.value));
    }
    Ok(obligations)
}

fn nondeterministic(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    loc: &Srcloc,
    stmts: &[Rc<Stmt>],
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    let writes = call_writes(env);
    let updates: Vec<BTreeMap<String, Type>> = stmts.iter().map(|s| s.updates(&writes)).collect();
    let reads: Vec<BTreeSet<String>> = stmts.iter().map(|s| s.all_reads()).collect();

    let mut clash = BTreeSet::new();
    for (i, u) in updates.iter().enumerate() {
        for j in 0..stmts.len() {
            if i == j {
                continue;
            }
            for n in u.keys() {
                if updates[j].contains_key(n) || reads[j].contains(n) {
                    clash.insert(n.clone());
                }
            }
        }
    }

    if clash.is_empty() {
        // Any order gives the same result.
        for s in stmts.iter() {
            obligations.append(statement_obligations(env, state, ctxt, s)?);
        }
        return Ok(obligations);
    }

    let saved = state.written.clone();
    for s in stmts.iter() {
        let mut sctxt = ctxt.clone();
        state.written = saved.clone();
        obligations.append(statement_obligations(env, state, &mut sctxt, s)?);
    }
    state.written = saved;

    if state.opts().ambiguity_checks() {
        let comment = format!(
            "-- Order of non-deterministic statement at {} affects {}",
            loc.short(),
            names_text(clash.iter())
        );
        obligations.append(obligations_for(
            state,
            ctxt,
            POType::Ambiguous,
            loc,
            &[],
            |_| Ok(flagged(comment.clone())),
        )?
        .with_message(&format!(
            "unresolved ambiguity of {}",
            names_text(clash.iter())
        )));
    }

    let mut all: BTreeMap<String, Type> = BTreeMap::new();
    for u in updates.into_iter() {
        all.extend(u.into_iter());
    }
    for n in all.keys() {
        state.written.remove(n);
    }
    ctxt.push(POContext::AmbiguousUpdate(AmbiguityData {
        description: "non-deterministic statement".to_string(),
        vars: all.into_iter().collect(),
        loc: loc.clone(),
    }));
    Ok(obligations)
}

/// Obligations arising from a statement.  Statements may leave frames on
/// the stack describing their effect on later statements.
pub fn statement_obligations(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    stmt: &Rc<Stmt>,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = check_ambiguity(state, ctxt, stmt)?;
    match stmt.as_ref() {
        Stmt::Skip(_) => {}
        Stmt::Assignment(loc, designator, value, value_type) => {
            obligations.append(assignment(
                env, state, ctxt, loc, designator, value, value_type,
            )?);
        }
        Stmt::Block(_, dcls, stmts) => {
            let saved = state.written.clone();
            let marker = ctxt.mark();
            for d in dcls.iter() {
                match &d.init {
                    Some(init) => {
                        obligations.append(expression_obligations(env, state, ctxt, init)?);
                        ctxt.push(POContext::let_expr(&d.name, init));
                    }
                    None => {
                        ctxt.push(POContext::Havoc {
                            note: None,
                            vars: vec![(d.name.clone(), d.ty.clone())],
                        });
                    }
                }
            }
            for s in stmts.iter() {
                obligations.append(statement_obligations(env, state, ctxt, s)?);
            }
            let locals: BTreeSet<String> = dcls.iter().map(|d| d.name.clone()).collect();
            ctxt.leave_scope(marker, &locals, &stmt.updates(&call_writes(env)));
            state.written = saved;
        }
        Stmt::If(_, c, t, elseifs, e) => {
            obligations.append(expression_obligations(env, state, ctxt, c)?);
            let mut prior: Vec<Rc<Formula>> = Vec::new();
            let mut branches = Vec::new();
            let mut arms = vec![(c.clone(), t.clone())];
            arms.extend(elseifs.iter().cloned());
            for (i, (cond, body)) in arms.into_iter().enumerate() {
                if i > 0 {
                    let cond_ctxt =
                        under(ctxt, POContext::implies(Formula::and_all(prior.clone())));
                    obligations.append(expression_obligations(env, state, &cond_ctxt, &cond)?);
                }
                let mut guard = prior.clone();
                guard.push(Formula::expr(&cond));
                branches.push(Branch {
                    guard: Formula::and_all(guard),
                    frames: vec![],
                    body: Some(body),
                });
                prior.push(Formula::not(Formula::expr(&cond)));
            }
            branches.push(Branch {
                guard: Formula::and_all(prior),
                frames: vec![],
                body: e.clone(),
            });
            obligations.append(branching(env, state, ctxt, branches)?);
        }
        Stmt::Cases(c) => {
            obligations.append(expression_obligations(env, state, ctxt, &c.subject)?);
            let mut matched = Vec::new();
            let mut branches = Vec::new();
            for (p, body) in c.alternatives.iter() {
                let condition = match_condition(p, &c.subject_type, &c.subject);
                let mut guard: Vec<Rc<Formula>> =
                    matched.iter().map(|m: &Rc<Formula>| Formula::not(m.clone())).collect();
                if *condition != Formula::Bool(true) {
                    guard.push(condition.clone());
                }
                matched.push(condition);
                branches.push(Branch {
                    guard: Formula::and_all(guard),
                    frames: pattern_frames(p, &c.subject_type, &c.subject),
                    body: Some(body.clone()),
                });
            }
            if c.others.is_none()
                && !c
                    .alternatives
                    .iter()
                    .any(|(p, _)| p.always_matches(&c.subject_type))
            {
                obligations.append(obligations_for(
                    state,
                    ctxt,
                    POType::CasesExhaustive,
                    &c.loc,
                    &[&c.subject],
                    |_| Ok(Formula::or_all(matched.clone())),
                )?);
            }
            branches.push(Branch {
                guard: Formula::not(Formula::or_all(matched)),
                frames: vec![],
                body: c.others.clone(),
            });
            obligations.append(branching(env, state, ctxt, branches)?);
        }
        Stmt::ForIndex(f) => obligations.append(for_index(env, state, ctxt, f)?),
        Stmt::While(loc, cond, invariant, body) => {
            obligations.append(while_loop(env, state, ctxt, loc, cond, invariant, body)?);
        }
        Stmt::Call(c) => {
            let (op, calls) = operation_call(env, state, ctxt, &c.loc, &c.name, &c.args)?;
            obligations.append(calls);
            if let Some((params, _)) = op.op_type.signature() {
                for (i, (arg, at)) in c.args.iter().zip(c.arg_types.iter()).enumerate() {
                    if let Some(pt) = params.get(i) {
                        obligations.append(subtype_obligations(state, ctxt, &c.loc, arg, at, pt)?);
                    }
                }
            }
            if !op.writes.is_empty() {
                ctxt.push(POContext::Havoc {
                    note: Some(format!("-- After call of {} at {}", c.name, c.loc.short())),
                    vars: op.writes.clone(),
                });
                for (n, _) in op.writes.iter() {
                    state.written.insert(n.clone());
                }
            }
        }
        Stmt::Return(loc, value, value_type) => {
            let post = state.post.clone();
            match value {
                Some(v) => {
                    obligations.append(expression_obligations(env, state, ctxt, v)?);
                    if let Some(rt) = state.result_type.clone() {
                        obligations.append(subtype_obligations(
                            state, ctxt, loc, v, value_type, &rt,
                        )?);
                    }
                    if let Some(post) = post {
                        let marker = ctxt.push(POContext::Return {
                            result: Formula::expr(v),
                        });
                        obligations.append(obligations_for(
                            state,
                            ctxt,
                            POType::OpPostCondition,
                            loc,
                            &[v, &post],
                            |_| Ok(Formula::expr(&post)),
                        )?);
                        ctxt.pop_to(marker);
                    }
                }
                None => {
                    if let Some(post) = post {
                        obligations.append(obligations_for(
                            state,
                            ctxt,
                            POType::OpPostCondition,
                            loc,
                            &[&post],
                            |_| Ok(Formula::expr(&post)),
                        )?);
                    }
                }
            }
        }
        Stmt::NonDeterministic(loc, stmts) => {
            obligations.append(nondeterministic(env, state, ctxt, loc, stmts)?);
        }
        Stmt::Let(_, defs, body) => {
            let marker = ctxt.mark();
            obligations.append(local_definitions(env, state, ctxt, defs)?);
            obligations.append(statement_obligations(env, state, ctxt, body)?);
            let locals: BTreeSet<String> =
                defs.iter().flat_map(|d| d.pattern.variables()).collect();
            ctxt.leave_scope(marker, &locals, &stmt.updates(&call_writes(env)));
        }
    }
    Ok(obligations)
}
