use std::rc::Rc;

use crate::compiler::environment::Environment;
use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::context::POContextStack;
use crate::compiler::pog::formula::{Binder, Formula};
use crate::compiler::pog::obligation::{obligations_for, POType, ProofObligationList};
use crate::compiler::pog::state::POGState;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::{ApplyData, Definition, Expr};

/// How a measure orders its values.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeasureShape {
    Scalar,
    Lexicographic(usize),
}

/// The name a recursive function's measure goes by, with the function's
/// type parameters attached.
pub fn measure_name(def: &Definition) -> String {
    let base = bare_measure_name(def);
    let tparams = def.type_params();
    if tparams.is_empty() {
        base
    } else {
        let tps: Vec<String> = tparams.iter().map(|t| format!("@{}", t)).collect();
        format!("{}[{}]", base, tps.join(", "))
    }
}

fn bare_measure_name(def: &Definition) -> String {
    def.measure()
        .unwrap_or_else(|| format!("measure_{}", def.name()))
}

fn measure_shape(loc: &Srcloc, measure: &Definition) -> Result<MeasureShape, PogErr> {
    let result = measure.result_type().ok_or_else(|| {
        PogErr(
            loc.clone(),
            format!("measure {} is not a function", measure.name()),
        )
    })?;
    if result.is_numeric() {
        Ok(MeasureShape::Scalar)
    } else if let Some(width) = result.product_width() {
        Ok(MeasureShape::Lexicographic(width))
    } else {
        Err(PogErr(
            loc.clone(),
            format!(
                "measure {} must return a natural number or a tuple of them, not {}",
                measure.name(),
                result
            ),
        ))
    }
}

/// lhs > rhs in the lexicographic order on width-tuples:
/// if lhs.#1 <> rhs.#1 then lhs.#1 > rhs.#1 elseif ... else lhs.#k > rhs.#k
pub fn measure_greater(width: usize, lhs: &str, rhs: &str) -> Rc<Formula> {
    let component = |name: &str, i: usize| Rc::new(Formula::TupleSelect(Formula::name(name), i));
    let greater =
        |i: usize| Formula::binary(BinaryOp::Greater, component(lhs, i), component(rhs, i));
    if width <= 1 {
        return greater(1);
    }
    let arms = (1..width)
        .map(|i| {
            (
                Formula::binary(BinaryOp::NotEquals, component(lhs, i), component(rhs, i)),
                greater(i),
            )
        })
        .collect();
    Rc::new(Formula::If(arms, greater(width)))
}

fn find_function(
    env: &dyn Environment,
    loc: &Srcloc,
    name: &str,
) -> Result<Rc<Definition>, PogErr> {
    match env.find_name(name) {
        Some(d) => match d.as_ref() {
            Definition::ExplicitFunction(_) | Definition::ImplicitFunction(_) => Ok(d),
            _ => Err(PogErr(
                loc.clone(),
                format!("recursion cycle member {} is not a function", name),
            )),
        },
        None => Err(PogErr(
            loc.clone(),
            format!("unknown recursion cycle member {}", name),
        )),
    }
}

/// One termination obligation per recursion cycle through a call site in a
/// measured function: the measure of the caller's parameters must exceed the
/// measure of the callee's arguments.
pub fn recursive_obligations(
    env: &dyn Environment,
    state: &POGState,
    ctxt: &POContextStack,
    apply: &ApplyData,
) -> Result<ProofObligationList, PogErr> {
    let mut obligations = ProofObligationList::new();
    let caller = match &state.function {
        Some(f) => f,
        None => return Ok(obligations),
    };
    let caller_name = caller.name();
    let caller_params = caller.parameters();

    for cycle in apply.cycles.iter() {
        let first = match cycle.first() {
            Some(f) => f,
            None => continue,
        };
        let members = cycle
            .iter()
            .map(|n| find_function(env, &apply.loc, n))
            .collect::<Result<Vec<Rc<Definition>>, PogErr>>()?;
        if first != &caller_name {
            return Err(PogErr(
                apply.loc.clone(),
                format!(
                    "recursion cycle through {} does not start at {}",
                    first, caller_name
                ),
            ));
        }

        let lhs_def = members[0].clone();
        let rhs_def = members.get(1).cloned().unwrap_or_else(|| lhs_def.clone());

        let lhs_measure = env.find_name(&bare_measure_name(&lhs_def));
        let rhs_measure = env.find_name(&bare_measure_name(&rhs_def));
        let (lhs_measure, rhs_measure) = match (lhs_measure, rhs_measure) {
            (Some(l), Some(r)) => (l, r),
            _ => {
                // Nothing to compare against.
                if state.opts().recursion_warnings() {
                    env.diagnostics().warning(
                        &apply.loc,
                        &format!(
                            "recursive call of {} cannot be checked, no measure found",
                            rhs_def.name()
                        ),
                    );
                }
                continue;
            }
        };

        let shape = measure_shape(&apply.loc, &lhs_measure)?;
        if measure_shape(&apply.loc, &rhs_measure)? != shape {
            return Err(PogErr(
                apply.loc.clone(),
                format!(
                    "measures of {} and {} do not have the same shape",
                    lhs_def.name(),
                    rhs_def.name()
                ),
            ));
        }

        let lhs_call = Rc::new(Formula::Apply(
            Formula::name(&measure_name(&lhs_def)),
            caller_params
                .iter()
                .map(|p| Formula::name(&p.to_string()))
                .collect(),
        ));
        let rhs_call = Rc::new(Formula::Apply(
            Formula::name(&measure_name(&rhs_def)),
            apply.args.iter().map(Formula::expr).collect(),
        ));

        let involved: Vec<&Rc<Expr>> = apply.args.iter().collect();
        obligations.append(obligations_for(
            state,
            ctxt,
            POType::Recursive,
            &apply.loc,
            &involved,
            |names| match shape {
                MeasureShape::Scalar => Ok(Formula::binary(
                    BinaryOp::Greater,
                    lhs_call.clone(),
                    rhs_call.clone(),
                )),
                MeasureShape::Lexicographic(width) => {
                    for p in caller_params.iter() {
                        names.reserve_text(&p.to_string());
                    }
                    let lhs = names.fresh("lhs");
                    let rhs = names.fresh("rhs");
                    Ok(Formula::scoped(
                        Binder::Let(vec![(lhs.clone(), lhs_call.clone()), (rhs.clone(), rhs_call.clone())]),
                        measure_greater(width, &lhs, &rhs),
                    ))
                }
            },
        )?);
    }

    Ok(obligations)
}
