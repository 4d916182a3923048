use std::rc::Rc;

use num_traits::Zero;

use crate::compiler::environment::Environment;
use crate::compiler::ops::{BinaryOp, UnaryOp};
use crate::compiler::pog::context::{names_text, POContext, POContextStack};
use crate::compiler::pog::formula::{Binder, FBind, Formula};
use crate::compiler::pog::measure::recursive_obligations;
use crate::compiler::pog::obligation::{
    flagged, obligations_for, subtype_condition, POType, ProofObligationList,
};
use crate::compiler::pog::state::POGState;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::{
    ApplyData, BinaryData, Bind, Definition, Expr, Literal, OperationData, Pattern, Quantifier,
};
use crate::compiler::types::Type;

pub fn fbind(b: &Bind) -> FBind {
    match b {
        Bind::Set(p, s) => FBind::Set(p.to_string(), Formula::expr(s)),
        Bind::Seq(p, s) => FBind::Seq(p.to_string(), Formula::expr(s)),
        Bind::Type(p, t) => FBind::Type(p.to_string(), t.clone()),
    }
}

fn under(ctxt: &POContextStack, frame: POContext) -> POContextStack {
    let mut result = ctxt.clone();
    result.push(frame);
    result
}

fn equals(a: Rc<Formula>, b: Rc<Formula>) -> Rc<Formula> {
    Formula::binary(BinaryOp::Equals, a, b)
}

fn nonzero_literal(e: &Expr) -> bool {
    match e {
        Expr::Literal(_, Literal::Int(n)) => !n.is_zero(),
        _ => false,
    }
}

/// Name of the precondition function of a named function or operation, if
/// it has one.
fn precondition_name(env: &dyn Environment, root: &Expr) -> Option<String> {
    if let Expr::Variable(_, name, _) = root {
        if let Some(d) = env.find_name(name) {
            if d.precondition().is_some() {
                return Some(format!("pre_{}", name));
            }
        }
    }
    None
}

fn is_named_function(env: &dyn Environment, root: &Expr) -> bool {
    if let Expr::Variable(_, name, _) = root {
        if let Some(d) = env.find_name(name) {
            return matches!(
                d.as_ref(),
                Definition::ExplicitFunction(_) | Definition::ImplicitFunction(_)
            );
        }
    }
    false
}

/// Frames that hold while the alternative for pattern is chosen.  Literal
/// patterns only contribute their guard.
pub fn pattern_frames(pattern: &Pattern, ty: &Type, subject: &Rc<Expr>) -> Vec<POContext> {
    let ptext = pattern.to_string();
    if pattern.always_matches(ty) {
        if pattern.variables().is_empty() {
            vec![]
        } else {
            vec![POContext::let_expr(&ptext, subject)]
        }
    } else if let Pattern::Literal(_, _) = pattern {
        vec![]
    } else {
        vec![
            POContext::forall(vec![FBind::Type(ptext.clone(), ty.clone())]),
            POContext::implies(equals(Formula::name(&ptext), Formula::expr(subject))),
        ]
    }
}

/// The condition under which the pattern matches the subject.
pub fn match_condition(pattern: &Pattern, ty: &Type, subject: &Rc<Expr>) -> Rc<Formula> {
    let ptext = pattern.to_string();
    if pattern.always_matches(ty) {
        Rc::new(Formula::Bool(true))
    } else if let Pattern::Literal(_, _) = pattern {
        equals(Formula::expr(subject), Formula::name(&ptext))
    } else {
        Formula::scoped(
            Binder::Quantifier(
                Quantifier::Exists,
                vec![FBind::Type(ptext.clone(), ty.clone())],
                None,
            ),
            equals(Formula::name(&ptext), Formula::expr(subject)),
        )
    }
}

pub fn subtype_obligations(
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    value: &Rc<Expr>,
    value_type: &Type,
    target: &Type,
) -> Result<ProofObligationList, PogErr> {
    if value_type.is_subtype_of(target) {
        return Ok(ProofObligationList::new());
    }
    obligations_for(state, ctxt, POType::Subtype, loc, &[value], |_| {
        Ok(subtype_condition(Formula::expr(value), target))
    })
}

pub fn value_binding(
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    pattern: &Pattern,
    ty: &Type,
    value: &Rc<Expr>,
) -> Result<ProofObligationList, PogErr> {
    let ptext = pattern.to_string();
    obligations_for(state, ctxt, POType::ValueBinding, loc, &[value], |_| {
        Ok(Formula::scoped(
            Binder::Quantifier(
                Quantifier::Exists,
                vec![FBind::Type(ptext.clone(), ty.clone())],
                None,
            ),
            equals(Formula::name(&ptext), Formula::expr(value)),
        ))
    })
}

fn all_of(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    exprs: &[Rc<Expr>],
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    for e in exprs.iter() {
        obligations.append(expression_obligations(env, state, ctxt, e)?);
    }
    Ok(obligations)
}

pub fn bind_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    binds: &[Bind],
) -> Result<ProofObligationList, PogErr> {
    let exprs: Vec<Rc<Expr>> = binds.iter().filter_map(|b| b.expression()).collect();
    all_of(env, state, ctxt, &exprs)
}

fn map_set_compatible(
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    maps: &Rc<Expr>,
) -> Result<ProofObligationList, PogErr> {
    obligations_for(state, ctxt, POType::MapSetOfCompatible, loc, &[maps], |names| {
        let m1 = names.fresh("m1");
        let m2 = names.fresh("m2");
        let d1 = names.fresh("d1");
        let d2 = names.fresh("d2");
        let dom = |m: &str| Formula::unary(UnaryOp::Dom, Formula::name(m));
        let at = |m: &str, d: &str| Rc::new(Formula::Apply(Formula::name(m), vec![Formula::name(d)]));
        Ok(Formula::scoped(
            Binder::Quantifier(
                Quantifier::Forall,
                vec![
                    FBind::Set(m1.clone(), Formula::expr(maps)),
                    FBind::Set(m2.clone(), Formula::expr(maps)),
                ],
                None,
            ),
            Formula::scoped(
                Binder::Quantifier(
                    Quantifier::Forall,
                    vec![FBind::Set(d1.clone(), dom(&m1)), FBind::Set(d2.clone(), dom(&m2))],
                    None,
                ),
                Formula::implies(
                    equals(Formula::name(&d1), Formula::name(&d2)),
                    equals(at(&m1, &d1), at(&m2, &d2)),
                ),
            ),
        ))
    })
}

fn unary_obligations(
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    op: &UnaryOp,
    arg: &Rc<Expr>,
    arg_type: &Type,
) -> Result<ProofObligationList, PogErr> {
    match op {
        UnaryOp::Hd | UnaryOp::Tl if !matches!(arg_type.resolve(), Type::Seq1(_)) => {
            obligations_for(state, ctxt, POType::NonEmptySeq, loc, &[arg], |_| {
                Ok(Formula::binary(
                    BinaryOp::NotEquals,
                    Formula::expr(arg),
                    Rc::new(Formula::SeqEnum(vec![])),
                ))
            })
        }
        UnaryOp::Dinter if !matches!(arg_type.resolve(), Type::Set1(_)) => {
            obligations_for(state, ctxt, POType::NonEmptySet, loc, &[arg], |_| {
                Ok(Formula::binary(
                    BinaryOp::NotEquals,
                    Formula::expr(arg),
                    Rc::new(Formula::SetEnum(vec![])),
                ))
            })
        }
        UnaryOp::Merge => map_set_compatible(state, ctxt, loc, arg),
        UnaryOp::Inverse => match arg_type.resolve() {
            Type::Map(d, r) => {
                let inmap = Type::InMap(d.clone(), r.clone());
                obligations_for(state, ctxt, POType::MapInverse, loc, &[arg], |_| {
                    Ok(Rc::new(Formula::Is(Formula::expr(arg), inmap.clone())))
                })
            }
            _ => Ok(ProofObligationList::new()),
        },
        _ => Ok(ProofObligationList::new()),
    }
}

fn function_iteration(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    b: &BinaryData,
) -> Result<ProofObligationList, PogErr> {
    let left = &b.left;
    let right = &b.right;
    let pre = precondition_name(env, left);
    let unknown_partial = pre.is_none() && b.ltype.is_partial_function() && !is_named_function(env, left);
    if pre.is_none() && !unknown_partial {
        return Ok(ProofObligationList::new());
    }
    let arg_type = b
        .ltype
        .signature()
        .and_then(|(params, _)| params.first().cloned())
        .unwrap_or(Type::Unknown);
    let pre_of = |x: Rc<Formula>| match &pre {
        Some(p) => Formula::call(p, vec![x]),
        None => Rc::new(Formula::Pre(Formula::expr(left), vec![x])),
    };
    obligations_for(state, ctxt, POType::FuncIteration, &b.loc, &[left, right], |names| {
        let arg = names.fresh("arg");
        let applied = Rc::new(Formula::Apply(Formula::expr(left), vec![Formula::name(&arg)]));
        Ok(Formula::implies(
            Formula::binary(BinaryOp::Greater, Formula::expr(right), Formula::int(1)),
            Formula::scoped(
                Binder::Quantifier(
                    Quantifier::Forall,
                    vec![FBind::Type(arg.clone(), arg_type.clone())],
                    None,
                ),
                Formula::implies(pre_of(Formula::name(&arg)), pre_of(applied)),
            ),
        ))
    })
}

fn map_iteration(
    state: &POGState,
    ctxt: &POContextStack,
    b: &BinaryData,
) -> Result<ProofObligationList, PogErr> {
    let left = &b.left;
    let right = &b.right;
    obligations_for(state, ctxt, POType::MapIteration, &b.loc, &[left, right], |_| {
        Ok(Formula::or_all(vec![
            equals(Formula::expr(right), Formula::int(0)),
            equals(Formula::expr(right), Formula::int(1)),
            Formula::binary(
                BinaryOp::Subset,
                Formula::unary(UnaryOp::Rng, Formula::expr(left)),
                Formula::unary(UnaryOp::Dom, Formula::expr(left)),
            ),
        ]))
    })
}

/// A left operand of union type may be both a function and a map.
fn iteration_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    b: &BinaryData,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    if b.ltype.is_function() {
        obligations.append(function_iteration(env, state, ctxt, b)?);
    }
    if b.ltype.is_map() {
        obligations.append(map_iteration(state, ctxt, b)?);
    }
    Ok(obligations)
}

fn binary_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    b: &BinaryData,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = expression_obligations(env, state, ctxt, &b.left)?;
    let right_ctxt = match b.op {
        BinaryOp::And | BinaryOp::Implies => under(ctxt, POContext::implies(Formula::expr(&b.left))),
        BinaryOp::Or => under(
            ctxt,
            POContext::implies(Formula::not(Formula::expr(&b.left))),
        ),
        _ => ctxt.clone(),
    };
    obligations.append(expression_obligations(env, state, &right_ctxt, &b.right)?);

    let (left, right) = (&b.left, &b.right);
    let checks = match b.op {
        BinaryOp::Divide | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Mod => {
            if nonzero_literal(right) {
                ProofObligationList::new()
            } else {
                obligations_for(state, ctxt, POType::NonZero, &b.loc, &[right], |_| {
                    Ok(Formula::binary(
                        BinaryOp::NotEquals,
                        Formula::expr(right),
                        Formula::int(0),
                    ))
                })?
            }
        }
        BinaryOp::MapUnion => {
            obligations_for(state, ctxt, POType::MapCompatible, &b.loc, &[left, right], |names| {
                let ldom = names.fresh("ldom");
                let rdom = names.fresh("rdom");
                Ok(Formula::scoped(
                    Binder::Quantifier(
                        Quantifier::Forall,
                        vec![
                            FBind::Set(ldom.clone(), Formula::unary(UnaryOp::Dom, Formula::expr(left))),
                            FBind::Set(rdom.clone(), Formula::unary(UnaryOp::Dom, Formula::expr(right))),
                        ],
                        None,
                    ),
                    Formula::implies(
                        equals(Formula::name(&ldom), Formula::name(&rdom)),
                        equals(
                            Rc::new(Formula::Apply(Formula::expr(left), vec![Formula::name(&ldom)])),
                            Rc::new(Formula::Apply(Formula::expr(right), vec![Formula::name(&rdom)])),
                        ),
                    ),
                ))
            })?
        }
        BinaryOp::Comp if b.ltype.is_map() => {
            obligations_for(state, ctxt, POType::MapCompose, &b.loc, &[left, right], |_| {
                Ok(Formula::binary(
                    BinaryOp::Subset,
                    Formula::unary(UnaryOp::Rng, Formula::expr(right)),
                    Formula::unary(UnaryOp::Dom, Formula::expr(left)),
                ))
            })?
        }
        BinaryOp::PlusPlus if b.ltype.is_seq() => {
            obligations_for(state, ctxt, POType::SeqModification, &b.loc, &[left, right], |_| {
                Ok(Formula::binary(
                    BinaryOp::Subset,
                    Formula::unary(UnaryOp::Dom, Formula::expr(right)),
                    Formula::unary(UnaryOp::Inds, Formula::expr(left)),
                ))
            })?
        }
        BinaryOp::StarStar => iteration_obligations(env, state, ctxt, b)?,
        _ => ProofObligationList::new(),
    };
    obligations.append(checks);
    Ok(obligations)
}

/// Look up a called operation and check its precondition.
pub fn operation_call(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    loc: &Srcloc,
    name: &str,
    args: &[Rc<Expr>],
) -> Result<(OperationData, ProofObligationList), PogErr> {
    let op = env
        .find_operation(name)
        .ok_or_else(|| PogErr(loc.clone(), format!("call of unknown operation {}", name)))?;
    let mut obligations = all_of(env, state, ctxt, args)?;
    if op.pre.is_some() {
        let involved: Vec<&Rc<Expr>> = args.iter().collect();
        obligations.append(obligations_for(
            state,
            ctxt,
            POType::OpPreCondition,
            loc,
            &involved,
            |_| {
                Ok(Formula::call(
                    &format!("pre_{}", name),
                    args.iter().map(Formula::expr).collect(),
                ))
            },
        )?);
    }
    Ok((op, obligations))
}

fn apply_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    a: &ApplyData,
) -> Result<ProofObligationList, PogErr> {
    let root = &a.root;
    let root_type = &a.root_type;

    if root_type.is_operation() {
        let name = match root.as_ref() {
            Expr::Variable(_, n, _) => n.clone(),
            _ => {
                return Err(PogErr(
                    a.loc.clone(),
                    format!("cannot resolve the operation called by {}", root),
                ))
            }
        };
        let (op, mut obligations) = operation_call(env, state, ctxt, &a.loc, &name, &a.args)?;
        let clash: Vec<String> = op
            .writes
            .iter()
            .map(|(n, _)| n.clone())
            .filter(|n| state.reading.contains(n))
            .collect();
        if !clash.is_empty() && state.opts().ambiguity_checks() {
            let comment = format!(
                "-- Operation {} updates {} while they are read at {}",
                name,
                names_text(clash.iter()),
                a.loc.short()
            );
            obligations.append(obligations_for(
                state,
                ctxt,
                POType::Ambiguous,
                &a.loc,
                &[],
                |_| Ok(flagged(comment.clone())),
            )?
            .with_message(&format!(
                "unresolved ambiguity of {}",
                names_text(clash.iter())
            )));
        }
        return Ok(obligations);
    }

    let mut obligations = expression_obligations(env, state, ctxt, root)?;
    obligations.append(all_of(env, state, ctxt, &a.args)?);

    if root_type.is_map() && a.args.len() == 1 {
        let arg = &a.args[0];
        obligations.append(obligations_for(state, ctxt, POType::MapApply, &a.loc, &[root, arg], |_| {
            Ok(Formula::binary(
                BinaryOp::InSet,
                Formula::expr(arg),
                Formula::unary(UnaryOp::Dom, Formula::expr(root)),
            ))
        })?);
    } else if root_type.is_seq() && a.args.len() == 1 {
        let arg = &a.args[0];
        obligations.append(obligations_for(state, ctxt, POType::SeqApply, &a.loc, &[root, arg], |_| {
            Ok(Formula::binary(
                BinaryOp::InSet,
                Formula::expr(arg),
                Formula::unary(UnaryOp::Inds, Formula::expr(root)),
            ))
        })?);
    } else if root_type.is_function() {
        let mut involved: Vec<&Rc<Expr>> = vec![root];
        involved.extend(a.args.iter());
        let args: Vec<Rc<Formula>> = a.args.iter().map(Formula::expr).collect();
        if let Some(pre) = precondition_name(env, root) {
            obligations.append(obligations_for(state, ctxt, POType::FuncApply, &a.loc, &involved, |_| {
                Ok(Formula::call(&pre, args.clone()))
            })?);
        } else if root_type.is_partial_function() && !is_named_function(env, root) {
            obligations.append(obligations_for(state, ctxt, POType::FuncApply, &a.loc, &involved, |_| {
                Ok(Rc::new(Formula::Pre(Formula::expr(root), args.clone())))
            })?);
        }

        if let Some((params, _)) = root_type.signature() {
            for (i, (arg, at)) in a.args.iter().zip(a.arg_types.iter()).enumerate() {
                if let Some(pt) = params.get(i) {
                    obligations.append(subtype_obligations(state, ctxt, &a.loc, arg, at, pt)?);
                }
            }
        }

        if !a.cycles.is_empty() {
            obligations.append(recursive_obligations(env, state, ctxt, a)?);
        }
    }

    Ok(obligations)
}

/// Obligations arising from an expression.  Expressions never leave frames
/// behind; sub-expressions see the context their evaluation depends on.
pub fn expression_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    expr: &Rc<Expr>,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    match expr.as_ref() {
        Expr::Literal(_, _) | Expr::Variable(_, _, _) => {}
        Expr::Unary(loc, op, arg, arg_type) => {
            obligations.append(expression_obligations(env, state, ctxt, arg)?);
            obligations.append(unary_obligations(state, ctxt, loc, op, arg, arg_type)?);
        }
        Expr::Binary(b) => obligations.append(binary_obligations(env, state, ctxt, b)?),
        Expr::Apply(a) => obligations.append(apply_obligations(env, state, ctxt, a)?),
        Expr::Field(_, e, _) | Expr::TupleSelect(_, e, _) => {
            obligations.append(expression_obligations(env, state, ctxt, e)?);
        }
        Expr::If(_, c, t, elseifs, e) => {
            obligations.append(expression_obligations(env, state, ctxt, c)?);
            let mut prior: Vec<Rc<Formula>> = Vec::new();
            let mut arms = vec![(c.clone(), t.clone())];
            arms.extend(elseifs.iter().cloned());
            for (i, (cond, body)) in arms.iter().enumerate() {
                if i > 0 {
                    let cond_ctxt = under(ctxt, POContext::implies(Formula::and_all(prior.clone())));
                    obligations.append(expression_obligations(env, state, &cond_ctxt, cond)?);
                }
                let mut guard = prior.clone();
                guard.push(Formula::expr(cond));
                let body_ctxt = under(ctxt, POContext::implies(Formula::and_all(guard)));
                obligations.append(expression_obligations(env, state, &body_ctxt, body)?);
                prior.push(Formula::not(Formula::expr(cond)));
            }
            let else_ctxt = under(ctxt, POContext::implies(Formula::and_all(prior)));
            obligations.append(expression_obligations(env, state, &else_ctxt, e)?);
        }
        Expr::Cases(c) => {
            obligations.append(expression_obligations(env, state, ctxt, &c.subject)?);
            let mut matched = Vec::new();
            for (p, body) in c.alternatives.iter() {
                let mut alt_ctxt = ctxt.clone();
                let mut guard: Vec<Rc<Formula>> =
                    matched.iter().map(|m: &Rc<Formula>| Formula::not(m.clone())).collect();
                if let Pattern::Literal(_, _) = p {
                    guard.push(match_condition(p, &c.subject_type, &c.subject));
                }
                if !guard.is_empty() {
                    alt_ctxt.push(POContext::implies(Formula::and_all(guard)));
                }
                for f in pattern_frames(p, &c.subject_type, &c.subject).into_iter() {
                    alt_ctxt.push(f);
                }
                obligations.append(expression_obligations(env, state, &alt_ctxt, body)?);
                matched.push(match_condition(p, &c.subject_type, &c.subject));
            }
            match &c.others {
                Some(o) => {
                    let others_ctxt =
                        under(ctxt, POContext::implies(Formula::not(Formula::or_all(matched))));
                    obligations.append(expression_obligations(env, state, &others_ctxt, o)?);
                }
                None => {
                    if !c
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
                }
            }
        }
        Expr::Let(_, defs, body) => {
            let mut inner = ctxt.clone();
            for d in defs.iter() {
                obligations.append(expression_obligations(env, state, &inner, &d.value)?);
                obligations.append(subtype_obligations(
                    state,
                    &inner,
                    &d.loc,
                    &d.value,
                    &d.value_type,
                    &d.ty,
                )?);
                if !d.pattern.always_matches(&d.ty) {
                    obligations.append(value_binding(
                        state, &inner, &d.loc, &d.pattern, &d.ty, &d.value,
                    )?);
                }
                inner.push(POContext::let_expr(&d.pattern.to_string(), &d.value));
            }
            obligations.append(expression_obligations(env, state, &inner, body)?);
        }
        Expr::LetBe(loc, bind, st, body) => {
            obligations.append(bind_obligations(env, state, ctxt, &[bind.clone()])?);
            if st.is_some() || !matches!(bind, Bind::Type(_, _)) {
                let mut involved: Vec<&Rc<Expr>> = Vec::new();
                if let Some(st) = st {
                    involved.push(st);
                }
                obligations.append(obligations_for(
                    state,
                    ctxt,
                    POType::LetBeExists,
                    loc,
                    &involved,
                    |_| {
                        let condition = match st {
                            Some(st) => Formula::expr(st),
                            None => Rc::new(Formula::Bool(true)),
                        };
                        Ok(Formula::scoped(
                            Binder::Quantifier(Quantifier::Exists, vec![fbind(bind)], None),
                            condition,
                        ))
                    },
                )?);
            }
            let mut inner = under(ctxt, POContext::forall(vec![fbind(bind)]));
            if let Some(st) = st {
                obligations.append(expression_obligations(env, state, &inner, st)?);
                inner.push(POContext::implies(Formula::expr(st)));
            }
            obligations.append(expression_obligations(env, state, &inner, body)?);
        }
        Expr::Quantified(_, _, binds, body) => {
            obligations.append(bind_obligations(env, state, ctxt, binds)?);
            let inner = under(ctxt, POContext::forall(binds.iter().map(fbind).collect()));
            obligations.append(expression_obligations(env, state, &inner, body)?);
        }
        Expr::Iota(loc, bind, pred) => {
            obligations.append(bind_obligations(env, state, ctxt, &[bind.clone()])?);
            obligations.append(obligations_for(
                state,
                ctxt,
                POType::UniqueExistence,
                loc,
                &[pred],
                |_| {
                    Ok(Formula::scoped(
                        Binder::Quantifier(Quantifier::Exists1, vec![fbind(bind)], None),
                        Formula::expr(pred),
                    ))
                },
            )?);
            let inner = under(ctxt, POContext::forall(vec![fbind(bind)]));
            obligations.append(expression_obligations(env, state, &inner, pred)?);
        }
        Expr::SetEnum(_, es) | Expr::SeqEnum(_, es) | Expr::Tuple(_, es) => {
            obligations.append(all_of(env, state, ctxt, es)?);
        }
        Expr::Record(_, _, es) => obligations.append(all_of(env, state, ctxt, es)?),
        Expr::MapEnum(_, maplets) => {
            for (k, v) in maplets.iter() {
                obligations.append(expression_obligations(env, state, ctxt, k)?);
                obligations.append(expression_obligations(env, state, ctxt, v)?);
            }
        }
        Expr::Mu(_, r, mods) => {
            obligations.append(expression_obligations(env, state, ctxt, r)?);
            for (_, v) in mods.iter() {
                obligations.append(expression_obligations(env, state, ctxt, v)?);
            }
        }
        Expr::SetComp(_, elem, binds, pred) => {
            obligations.append(comprehension(env, state, ctxt, &[elem.clone()], binds, pred)?);
        }
        Expr::SeqComp(_, elem, bind, pred) => {
            obligations.append(comprehension(
                env,
                state,
                ctxt,
                &[elem.clone()],
                &[bind.clone()],
                pred,
            )?);
        }
        Expr::MapComp(loc, k, v, binds, pred) => {
            obligations.append(comprehension(
                env,
                state,
                ctxt,
                &[k.clone(), v.clone()],
                binds,
                pred,
            )?);
            let maps = Rc::new(Expr::SetComp(
                loc.clone(),
                Rc::new(Expr::MapEnum(loc.clone(), vec![(k.clone(), v.clone())])),
                binds.clone(),
                pred.clone(),
            ));
            obligations.append(map_set_compatible(state, ctxt, loc, &maps)?);
        }
        Expr::Lambda(_, params, body) => {
            let binds = params
                .iter()
                .map(|(p, t)| FBind::Type(p.to_string(), t.clone()))
                .collect();
            let inner = under(ctxt, POContext::forall(binds));
            obligations.append(expression_obligations(env, state, &inner, body)?);
        }
    }
    Ok(obligations)
}

fn comprehension(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    elements: &[Rc<Expr>],
    binds: &[Bind],
    pred: &Option<Rc<Expr>>,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = bind_obligations(env, state, ctxt, binds)?;
    let mut inner = under(ctxt, POContext::forall(binds.iter().map(fbind).collect()));
    if let Some(p) = pred {
        obligations.append(expression_obligations(env, state, &inner, p)?);
        inner.push(POContext::implies(Formula::expr(p)));
    }
    obligations.append(all_of(env, state, &inner, elements)?);
    Ok(obligations)
}
