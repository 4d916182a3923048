use std::fmt::Display;
use std::rc::Rc;

use serde::Serialize;

use crate::compiler::ops::BinaryOp;
use crate::compiler::pog::context::POContextStack;
use crate::compiler::pog::formula::{Binder, Formula};
use crate::compiler::pog::names::NameGen;
use crate::compiler::pog::state::POGState;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::Expr;
use crate::compiler::types::Type;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum POType {
    MapApply,
    SeqApply,
    FuncApply,
    FuncIteration,
    MapIteration,
    MapCompatible,
    MapSetOfCompatible,
    MapCompose,
    MapInverse,
    SeqModification,
    NonZero,
    NonEmptySeq,
    NonEmptySet,
    Subtype,
    CasesExhaustive,
    ValueBinding,
    LetBeExists,
    UniqueExistence,
    FuncPostCondition,
    FuncSatisfiability,
    OpPreCondition,
    OpPostCondition,
    StateInvariant,
    Recursive,
    LoopInvariant,
    Ambiguous,
    ParameterPatterns,
    TypeInvSatisfiability,
}

impl Display for POType {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        let text = match self {
            POType::MapApply => "map apply",
            POType::SeqApply => "sequence apply",
            POType::FuncApply => "function apply",
            POType::FuncIteration => "function iteration",
            POType::MapIteration => "map iteration",
            POType::MapCompatible => "map compatible",
            POType::MapSetOfCompatible => "map set compatible",
            POType::MapCompose => "map compose",
            POType::MapInverse => "map inverse",
            POType::SeqModification => "sequence modification",
            POType::NonZero => "non-zero",
            POType::NonEmptySeq => "non-empty sequence",
            POType::NonEmptySet => "non-empty set",
            POType::Subtype => "subtype",
            POType::CasesExhaustive => "cases exhaustive",
            POType::ValueBinding => "value binding",
            POType::LetBeExists => "let be st existence",
            POType::UniqueExistence => "unique existence binding",
            POType::FuncPostCondition => "post condition",
            POType::FuncSatisfiability => "function satisfiability",
            POType::OpPreCondition => "operation precondition",
            POType::OpPostCondition => "operation post condition",
            POType::StateInvariant => "state invariant",
            POType::Recursive => "recursive function",
            POType::LoopInvariant => "loop invariant",
            POType::Ambiguous => "ambiguous",
            POType::ParameterPatterns => "parameter patterns",
            POType::TypeInvSatisfiability => "type invariant satisfiable",
        };
        formatter.write_str(text)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ProofObligation {
    pub location: Srcloc,
    pub kind: POType,
    /// Name of the top level definition the obligation arose in.
    pub name: String,
    pub value: Rc<Formula>,
    pub formula: String,
    pub free_variables: Vec<String>,
    pub reasons_about: Vec<String>,
    pub number: usize,
    pub message: Option<String>,
}

impl Display for ProofObligation {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        writeln!(
            formatter,
            "Proof Obligation {}: ({})",
            self.number,
            self.message.as_deref().unwrap_or("Unproved")
        )?;
        writeln!(
            formatter,
            "{}: {} obligation @ {}",
            self.name, self.kind, self.location
        )?;
        write!(formatter, "{}", self.formula)
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ProofObligationList {
    obligations: Vec<ProofObligation>,
}

impl ProofObligationList {
    pub fn new() -> Self {
        ProofObligationList::default()
    }

    pub fn push(&mut self, po: ProofObligation) {
        self.obligations.push(po);
    }

    pub fn append(&mut self, mut other: ProofObligationList) {
        self.obligations.append(&mut other.obligations);
    }

    pub fn len(&self) -> usize {
        self.obligations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.obligations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProofObligation> {
        self.obligations.iter()
    }

    pub fn get(&self, i: usize) -> Option<&ProofObligation> {
        self.obligations.get(i)
    }

    pub fn of_kind(&self, kind: POType) -> Vec<&ProofObligation> {
        self.obligations.iter().filter(|po| po.kind == kind).collect()
    }

    /// Give the last obligation in the list a status message.
    pub fn with_message(mut self, message: &str) -> Self {
        if let Some(po) = self.obligations.last_mut() {
            po.message = Some(message.to_string());
        }
        self
    }

    pub fn set_names(&mut self, name: &str) {
        for po in self.obligations.iter_mut() {
            po.name = name.to_string();
        }
    }

    /// Number obligations from 1 in list order.
    pub fn renumber(&mut self) {
        for (i, po) in self.obligations.iter_mut().enumerate() {
            po.number = i + 1;
        }
    }

    pub(crate) fn retain<F: FnMut(&ProofObligation) -> bool>(&mut self, f: F) {
        self.obligations.retain(f);
    }

    /// The list in the shape handed to protocol clients.
    pub fn to_json(&self) -> serde_json::Value {
        let items: Vec<serde_json::Value> = self
            .obligations
            .iter()
            .map(|po| {
                json!({
                    "id": po.number,
                    "kind": po.kind.to_string(),
                    "name": po.name,
                    "location": {
                        "file": po.location.file.as_ref(),
                        "line": po.location.line,
                        "col": po.location.col
                    },
                    "source": po.formula,
                    "message": po.message
                })
            })
            .collect();
        serde_json::Value::Array(items)
    }
}

impl Display for ProofObligationList {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> Result<(), std::fmt::Error> {
        for po in self.obligations.iter() {
            writeln!(formatter, "{}\n", po)?;
        }
        Ok(())
    }
}

/// Create one obligation of the given kind for every alternative the context
/// expands to.  The condition is built separately for each alternative, with
/// a name generator that already knows every name the alternative and the
/// involved expressions use.
pub fn obligations_for<F>(
    state: &POGState,
    ctxt: &POContextStack,
    kind: POType,
    loc: &Srcloc,
    involved: &[&Rc<Expr>],
    condition: F,
) -> Result<ProofObligationList, PogErr>
where
    F: Fn(&mut NameGen) -> Result<Rc<Formula>, PogErr>,
{
    let alternatives = ctxt.expand();
    if alternatives.len() > state.opts().max_alternatives() {
        return Err(PogErr(
            loc.clone(),
            format!(
                "{} obligation needs {} context alternatives, more than the limit of {}",
                kind,
                alternatives.len(),
                state.opts().max_alternatives()
            ),
        ));
    }
    if alternatives.len() > 1 {
        log::debug!(
            "{} obligation at {} expands to {} alternatives",
            kind,
            loc,
            alternatives.len()
        );
    }

    let mut result = ProofObligationList::new();
    for alt in alternatives.iter() {
        let mut names = NameGen::new();
        for line in alt.render().iter() {
            names.reserve_text(line);
        }
        for e in involved.iter() {
            names.reserve_text(&e.to_string());
        }

        let cond = condition(&mut names)?;
        let value = alt.wrap(cond.clone());
        let mut reasons = cond.program_variables();
        reasons.append(&mut alt.update_names());

        result.push(ProofObligation {
            location: loc.clone(),
            kind,
            name: state.definition.clone(),
            formula: value.to_string(),
            value,
            free_variables: names.issued(),
            reasons_about: reasons.into_iter().collect(),
            number: 0,
            message: None,
        });
    }
    Ok(result)
}

/// What must hold for a value to belong to a type it was not statically
/// shown to belong to.
pub fn subtype_condition(value: Rc<Formula>, target: &Type) -> Rc<Formula> {
    match target {
        Type::Nat => Formula::binary(BinaryOp::GreaterEq, value, Formula::int(0)),
        Type::Nat1 => Formula::binary(BinaryOp::Greater, value, Formula::int(0)),
        Type::Named {
            name,
            invariant: true,
            ..
        } => Formula::call(&format!("inv_{}", name), vec![value]),
        _ => Rc::new(Formula::Is(value, target.clone())),
    }
}

/// A condition that can never be discharged, documented by a comment.
pub fn flagged(comment: String) -> Rc<Formula> {
    Formula::scoped(Binder::Comment(comment), Rc::new(Formula::Bool(false)))
}
