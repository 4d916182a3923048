use std::rc::Rc;

use crate::compiler::environment::Environment;
use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::context::{POContext, POContextStack};
use crate::compiler::pog::driver::PogOpts;
use crate::compiler::pog::expression::{expression_obligations, subtype_obligations, value_binding};
use crate::compiler::pog::formula::{Binder, FBind, Formula};
use crate::compiler::pog::obligation::{obligations_for, POType, ProofObligationList};
use crate::compiler::pog::state::POGState;
use crate::compiler::pog::statement::{contains_return, statement_obligations};
use crate::compiler::pog::PogErr;
use crate::compiler::typedtree::{
    Definition, Expr, FunctionData, ImplicitFunctionData, InstanceVariableData, OperationData,
    Pattern, Quantifier, StateData, TypeDefData, ValueData,
};
use crate::compiler::types::Type;

fn parameter_binds(params: &[Pattern], types: &[Type]) -> Vec<FBind> {
    params
        .iter()
        .zip(types.iter())
        .map(|(p, t)| FBind::Type(p.to_string(), t.clone()))
        .collect()
}

fn parameter_types(loc_name: &str, ty: &Type, count: usize) -> Vec<Type> {
    match ty.signature() {
        Some((params, _)) => params,
        None => {
            log::debug!("{} has no signature, parameters left untyped", loc_name);
            vec![Type::Unknown; count]
        }
    }
}

/// Walk a precondition, then assume it for whatever follows.
fn assume_precondition(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &mut POContextStack,
    pre: &Option<Rc<Expr>>,
) -> Result<ProofObligationList, PogErr> {
    match pre {
        Some(pre) => {
            let obligations = expression_obligations(env, state, ctxt, pre)?;
            ctxt.push(POContext::implies(Formula::expr(pre)));
            Ok(obligations)
        }
        None => Ok(ProofObligationList::new()),
    }
}

/// Each parameter pattern that can fail to match an argument of its type
/// must match every argument satisfying the precondition.
fn parameter_patterns(
    state: &POGState,
    ctxt: &POContextStack,
    f: &FunctionData,
    types: &[Type],
) -> Result<ProofObligationList, PogErr> {
    let refutable: Vec<(&Pattern, &Type)> = f
        .params
        .iter()
        .zip(types.iter())
        .filter(|(p, t)| !p.always_matches(t))
        .collect();
    if refutable.is_empty() {
        return Ok(ProofObligationList::new());
    }

    obligations_for(state, ctxt, POType::ParameterPatterns, &f.loc, &[], |names| {
        for (p, _) in refutable.iter() {
            names.reserve_text(&p.to_string());
        }
        let args: Vec<(String, &Pattern, &Type)> = refutable
            .iter()
            .map(|(p, t)| (names.fresh("arg"), *p, *t))
            .collect();
        let matches = args
            .iter()
            .map(|(a, p, t)| {
                Formula::scoped(
                    Binder::Quantifier(
                        Quantifier::Exists,
                        vec![FBind::Type(p.to_string(), (*t).clone())],
                        None,
                    ),
                    Formula::binary(
                        BinaryOp::Equals,
                        Formula::name(&p.to_string()),
                        Formula::name(a),
                    ),
                )
            })
            .collect();
        let mut body = Formula::and_all(matches);
        if f.pre.is_some() {
            let arg_names = args.iter().map(|(a, _, _)| Formula::name(a)).collect();
            body = Formula::implies(Formula::call(&format!("pre_{}", f.name), arg_names), body);
        }
        Ok(Formula::scoped(
            Binder::Quantifier(
                Quantifier::Forall,
                args.iter()
                    .map(|(a, _, t)| FBind::Type(a.clone(), (*t).clone()))
                    .collect(),
                None,
            ),
            body,
        ))
    })
}

fn explicit_function(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    f: &FunctionData,
) -> Result<ProofObligationList, PogErr> {
    let types = parameter_types(&f.name, &f.fn_type, f.params.len());

    let mut obligations = parameter_patterns(state, ctxt, f, &types)?;
    if !f.params.is_empty() {
        ctxt.push(POContext::forall(parameter_binds(&f.params, &types)));
    }
    obligations.append(assume_precondition(env, state, ctxt, &f.pre)?);
    obligations.append(expression_obligations(env, state, ctxt, &f.body)?);

    if let Some((_, result)) = f.fn_type.signature() {
        obligations.append(subtype_obligations(
            state,
            ctxt,
            &f.loc,
            &f.body,
            &f.body_type,
            &result,
        )?);
    }

    if let Some(post) = &f.post {
        let mut args: Vec<Rc<Formula>> = f
            .params
            .iter()
            .map(|p| Formula::name(&p.to_string()))
            .collect();
        args.push(Formula::expr(&f.body));
        obligations.append(expression_obligations(env, state, ctxt, post)?);
        obligations.append(obligations_for(
            state,
            ctxt,
            POType::FuncPostCondition,
            &f.loc,
            &[&f.body],
            |_| Ok(Formula::call(&format!("post_{}", f.name), args.clone())),
        )?);
    }
    Ok(obligations)
}

fn implicit_function(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    f: &ImplicitFunctionData,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    if !f.params.is_empty() {
        ctxt.push(POContext::forall(
            f.params
                .iter()
                .map(|(p, t)| FBind::Type(p.to_string(), t.clone()))
                .collect(),
        ));
    }
    obligations.append(assume_precondition(env, state, ctxt, &f.pre)?);

    let (result_name, result_type) = &f.result;
    match &f.body {
        None => {
            obligations.append(obligations_for(
                state,
                ctxt,
                POType::FuncSatisfiability,
                &f.loc,
                &[&f.post],
                |_| {
                    Ok(Formula::scoped(
                        Binder::Quantifier(
                            Quantifier::Exists,
                            vec![FBind::Type(result_name.clone(), result_type.clone())],
                            None,
                        ),
                        Formula::expr(&f.post),
                    ))
                },
            )?);
        }
        Some(body) => {
            obligations.append(expression_obligations(env, state, ctxt, body)?);
            ctxt.push(POContext::let_expr(result_name, body));
            obligations.append(obligations_for(
                state,
                ctxt,
                POType::FuncPostCondition,
                &f.loc,
                &[body, &f.post],
                |_| Ok(Formula::expr(&f.post)),
            )?);
        }
    }
    Ok(obligations)
}

fn explicit_operation(
    env: &dyn Environment,
    state: &mut POGState,
    ctxt: &mut POContextStack,
    o: &OperationData,
) -> Result<ProofObligationList, PogErr> {
    state.post = o.post.clone();
    state.result_type = o
        .op_type
        .signature()
        .map(|(_, r)| r)
        .filter(|r| *r != Type::Void);
    let types = parameter_types(&o.name, &o.op_type, o.params.len());

    if !o.params.is_empty() {
        ctxt.push(POContext::forall(parameter_binds(&o.params, &types)));
    }
    let mut obligations = assume_precondition(env, state, ctxt, &o.pre)?;
    obligations.append(statement_obligations(env, state, ctxt, &o.body)?);

    if let Some(post) = &o.post {
        if state.result_type.is_none() && !contains_return(&o.body) {
            obligations.append(obligations_for(
                state,
                ctxt,
                POType::OpPostCondition,
                &o.loc,
                &[post],
                |_| Ok(Formula::expr(post)),
            )?);
        }
    }
    Ok(obligations)
}

fn value_definition(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    v: &ValueData,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = expression_obligations(env, state, ctxt, &v.value)?;
    let ty = v.ty.clone().unwrap_or_else(|| v.value_type.clone());
    if v.ty.is_some() {
        obligations.append(subtype_obligations(
            state,
            ctxt,
            &v.loc,
            &v.value,
            &v.value_type,
            &ty,
        )?);
    }
    if !v.pattern.always_matches(&ty) {
        obligations.append(value_binding(state, ctxt, &v.loc, &v.pattern, &ty, &v.value)?);
    }
    Ok(obligations)
}

fn invariant_under(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    pattern: &Pattern,
    ty: &Type,
    inv: &Rc<Expr>,
) -> Result<ProofObligationList, PogErr> {
    let mut inner = ctxt.clone();
    inner.push(POContext::forall(vec![FBind::Type(
        pattern.to_string(),
        ty.clone(),
    )]));
    expression_obligations(env, state, &inner, inv)
}

fn type_definition(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    t: &TypeDefData,
) -> Result<ProofObligationList, PogErr> {
    let (pattern, inv) = match &t.invariant {
        Some(i) => i,
        None => return Ok(ProofObligationList::new()),
    };
    let mut obligations = obligations_for(
        state,
        ctxt,
        POType::TypeInvSatisfiability,
        &t.loc,
        &[inv],
        |_| {
            Ok(Formula::scoped(
                Binder::Quantifier(
                    Quantifier::Exists,
                    vec![FBind::Type(pattern.to_string(), t.ty.clone())],
                    None,
                ),
                Formula::expr(inv),
            ))
        },
    )?;
    obligations.append(invariant_under(env, state, ctxt, pattern, &t.ty, inv)?);
    Ok(obligations)
}

fn state_definition(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    s: &StateData,
) -> Result<ProofObligationList, PogErr> {
    match &s.invariant {
        Some((pattern, inv)) => {
            let record = Type::Record {
                name: s.name.clone(),
                fields: s.fields.clone(),
            };
            invariant_under(env, state, ctxt, pattern, &record, inv)
        }
        None => Ok(ProofObligationList::new()),
    }
}

fn instance_variable(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    i: &InstanceVariableData,
) -> Result<ProofObligationList, PogErr> {
    match &i.init {
        Some((init, init_type)) => {
            let mut obligations = expression_obligations(env, state, ctxt, init)?;
            obligations.append(subtype_obligations(
                state, ctxt, &i.loc, init, init_type, &i.ty,
            )?);
            Ok(obligations)
        }
        None => Ok(ProofObligationList::new()),
    }
}

/// Every obligation of one top level definition, named after it and in
/// source order.  Numbering is left to the caller.
pub fn definition_obligations(
    env: &dyn Environment,
    opts: Rc<dyn PogOpts>,
    def: &Definition,
) -> Result<ProofObligationList, PogErr> {
    let name = def.name();
    let mut state = POGState::new(opts, &name);
    if let Definition::ExplicitFunction(_) | Definition::ImplicitFunction(_) = def {
        state.function = Some(def.clone());
    }
    let mut ctxt = POContextStack::new();

    let mut obligations = match def {
        Definition::ExplicitFunction(f) => explicit_function(env, &mut state, &mut ctxt, f)?,
        Definition::ImplicitFunction(f) => implicit_function(env, &mut state, &mut ctxt, f)?,
        Definition::ExplicitOperation(o) => explicit_operation(env, &mut state, &mut ctxt, o)?,
        Definition::Value(v) => value_definition(env, &state, &ctxt, v)?,
        Definition::Type(t) => type_definition(env, &state, &ctxt, t)?,
        Definition::State(s) => state_definition(env, &state, &ctxt, s)?,
        Definition::InstanceVariable(i) => instance_variable(env, &state, &ctxt, i)?,
    };
    obligations.set_names(&name);
    Ok(obligations)
}
