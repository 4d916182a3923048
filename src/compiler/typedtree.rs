use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::compiler::ops::{BinaryOp, UnaryOp};
use crate::compiler::srcloc::{HasLoc, Srcloc};
use crate::compiler::types::Type;
use crate::util::Number;

// The typed tree is the output of type checking.  Every node that the
// generator needs to reason about carries the resolved types it was checked
// with, so no inference happens here.

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Literal {
    Bool(bool),
    Int(Number),
    Real(String),
    Char(char),
    Text(String),
    Quote(String),
    Nil,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quantifier {
    Forall,
    Exists,
    Exists1,
}

impl Quantifier {
    pub fn keyword(&self) -> &'static str {
        match self {
            Quantifier::Forall => "forall",
            Quantifier::Exists => "exists",
            Quantifier::Exists1 => "exists1",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Pattern {
    Identifier(Srcloc, String),
    Ignore(Srcloc),
    Literal(Srcloc, Literal),
    Tuple(Srcloc, Vec<Pattern>),
    Record(Srcloc, String, Vec<Pattern>),
    SeqEnum(Srcloc, Vec<Pattern>),
    SetEnum(Srcloc, Vec<Pattern>),
    Concat(Srcloc, Rc<Pattern>, Rc<Pattern>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bind {
    Set(Pattern, Rc<Expr>),
    Seq(Pattern, Rc<Expr>),
    Type(Pattern, Type),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyData {
    pub loc: Srcloc,
    pub root: Rc<Expr>,
    pub args: Vec<Rc<Expr>>,
    pub root_type: Type,
    pub arg_types: Vec<Type>,
    /// Recursion cycles through this call, as found by the type checker.
    /// Each cycle lists function names starting with the caller; a direct
    /// recursive call has the single cycle [caller].
    pub cycles: Vec<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryData {
    pub loc: Srcloc,
    pub op: BinaryOp,
    pub left: Rc<Expr>,
    pub right: Rc<Expr>,
    pub ltype: Type,
    pub rtype: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalDef {
    pub loc: Srcloc,
    pub pattern: Pattern,
    pub ty: Type,
    pub value: Rc<Expr>,
    pub value_type: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CasesData<T> {
    pub loc: Srcloc,
    pub subject: Rc<Expr>,
    pub subject_type: Type,
    pub alternatives: Vec<(Pattern, Rc<T>)>,
    pub others: Option<Rc<T>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Srcloc, Literal),
    Variable(Srcloc, String, Type),
    Unary(Srcloc, UnaryOp, Rc<Expr>, Type),
    Binary(BinaryData),
    Apply(ApplyData),
    Field(Srcloc, Rc<Expr>, String),
    TupleSelect(Srcloc, Rc<Expr>, usize),
    If(Srcloc, Rc<Expr>, Rc<Expr>, Vec<(Rc<Expr>, Rc<Expr>)>, Rc<Expr>),
    Cases(CasesData<Expr>),
    Let(Srcloc, Vec<LocalDef>, Rc<Expr>),
    LetBe(Srcloc, Bind, Option<Rc<Expr>>, Rc<Expr>),
    Quantified(Srcloc, Quantifier, Vec<Bind>, Rc<Expr>),
    Iota(Srcloc, Bind, Rc<Expr>),
    SetEnum(Srcloc, Vec<Rc<Expr>>),
    SeqEnum(Srcloc, Vec<Rc<Expr>>),
    MapEnum(Srcloc, Vec<(Rc<Expr>, Rc<Expr>)>),
    Tuple(Srcloc, Vec<Rc<Expr>>),
    Record(Srcloc, String, Vec<Rc<Expr>>),
    Mu(Srcloc, Rc<Expr>, Vec<(String, Rc<Expr>)>),
    SetComp(Srcloc, Rc<Expr>, Vec<Bind>, Option<Rc<Expr>>),
    SeqComp(Srcloc, Rc<Expr>, Bind, Option<Rc<Expr>>),
    MapComp(Srcloc, Rc<Expr>, Rc<Expr>, Vec<Bind>, Option<Rc<Expr>>),
    Lambda(Srcloc, Vec<(Pattern, Type)>, Rc<Expr>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StateDesignator {
    Identifier(Srcloc, String, Type),
    /// m(k) or s(i); the type is that of the container.
    MapSeq(Srcloc, Rc<StateDesignator>, Rc<Expr>, Type),
    /// r.f; the type is that of the record.
    Field(Srcloc, Rc<StateDesignator>, String, Type),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dcl {
    pub loc: Srcloc,
    pub name: String,
    pub ty: Type,
    pub init: Option<Rc<Expr>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForIndexData {
    pub loc: Srcloc,
    pub var: String,
    pub from: Rc<Expr>,
    pub to: Rc<Expr>,
    pub by: Option<Rc<Expr>>,
    pub invariant: Option<Rc<Expr>>,
    pub body: Rc<Stmt>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
    pub loc: Srcloc,
    pub name: String,
    pub args: Vec<Rc<Expr>>,
    pub arg_types: Vec<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Skip(Srcloc),
    Assignment(Srcloc, StateDesignator, Rc<Expr>, Type),
    Block(Srcloc, Vec<Dcl>, Vec<Rc<Stmt>>),
    If(Srcloc, Rc<Expr>, Rc<Stmt>, Vec<(Rc<Expr>, Rc<Stmt>)>, Option<Rc<Stmt>>),
    Cases(CasesData<Stmt>),
    ForIndex(ForIndexData),
    While(Srcloc, Rc<Expr>, Option<Rc<Expr>>, Rc<Stmt>),
    Call(CallData),
    Return(Srcloc, Option<Rc<Expr>>, Type),
    NonDeterministic(Srcloc, Vec<Rc<Stmt>>),
    Let(Srcloc, Vec<LocalDef>, Rc<Stmt>),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionData {
    pub loc: Srcloc,
    pub name: String,
    pub type_params: Vec<String>,
    pub fn_type: Type,
    pub params: Vec<Pattern>,
    pub body: Rc<Expr>,
    pub body_type: Type,
    pub pre: Option<Rc<Expr>>,
    pub post: Option<Rc<Expr>>,
    /// Name of the measure function, when one is declared.
    pub measure: Option<String>,
    pub recursive: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImplicitFunctionData {
    pub loc: Srcloc,
    pub name: String,
    pub type_params: Vec<String>,
    pub params: Vec<(Pattern, Type)>,
    pub result: (String, Type),
    pub body: Option<Rc<Expr>>,
    pub pre: Option<Rc<Expr>>,
    pub post: Rc<Expr>,
    pub measure: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationData {
    pub loc: Srcloc,
    pub name: String,
    pub op_type: Type,
    pub params: Vec<Pattern>,
    pub body: Rc<Stmt>,
    pub pre: Option<Rc<Expr>>,
    pub post: Option<Rc<Expr>>,
    /// State components the operation may update.
    pub writes: Vec<(String, Type)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueData {
    pub loc: Srcloc,
    pub pattern: Pattern,
    pub ty: Option<Type>,
    pub value: Rc<Expr>,
    pub value_type: Type,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDefData {
    pub loc: Srcloc,
    pub name: String,
    pub ty: Type,
    pub invariant: Option<(Pattern, Rc<Expr>)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateData {
    pub loc: Srcloc,
    pub name: String,
    pub fields: Vec<(String, Type)>,
    pub invariant: Option<(Pattern, Rc<Expr>)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceVariableData {
    pub loc: Srcloc,
    pub name: String,
    pub ty: Type,
    pub init: Option<(Rc<Expr>, Type)>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Definition {
    ExplicitFunction(FunctionData),
    ImplicitFunction(ImplicitFunctionData),
    ExplicitOperation(OperationData),
    Value(ValueData),
    Type(TypeDefData),
    State(StateData),
    InstanceVariable(InstanceVariableData),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    Module,
    Class,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub loc: Srcloc,
    pub name: String,
    pub kind: ModuleKind,
    pub definitions: Vec<Rc<Definition>>,
}

impl HasLoc for Pattern {
    fn loc(&self) -> Srcloc {
        match self {
            Pattern::Identifier(l, _)
            | Pattern::Ignore(l)
            | Pattern::Literal(l, _)
            | Pattern::Tuple(l, _)
            | Pattern::Record(l, _, _)
            | Pattern::SeqEnum(l, _)
            | Pattern::SetEnum(l, _)
            | Pattern::Concat(l, _, _) => l.clone(),
        }
    }
}

impl Pattern {
    pub fn identifier(loc: &Srcloc, name: &str) -> Pattern {
        Pattern::Identifier(loc.clone(), name.to_string())
    }

    /// Names bound by the pattern, in order of appearance.
    pub fn variables(&self) -> Vec<String> {
        let mut result = Vec::new();
        self.collect_variables(&mut result);
        result
    }

    fn collect_variables(&self, result: &mut Vec<String>) {
        match self {
            Pattern::Identifier(_, n) => {
                if !result.contains(n) {
                    result.push(n.clone());
                }
            }
            Pattern::Ignore(_) | Pattern::Literal(_, _) => {}
            Pattern::Tuple(_, ps)
            | Pattern::Record(_, _, ps)
            | Pattern::SeqEnum(_, ps)
            | Pattern::SetEnum(_, ps) => {
                for p in ps.iter() {
                    p.collect_variables(result);
                }
            }
            Pattern::Concat(_, l, r) => {
                l.collect_variables(result);
                r.collect_variables(result);
            }
        }
    }

    /// Whether any value of the given type matches this pattern.
    pub fn always_matches(&self, ty: &Type) -> bool {
        match self {
            Pattern::Identifier(_, _) | Pattern::Ignore(_) => true,
            Pattern::Tuple(_, ps) => match ty.resolve() {
                Type::Product(ts) => {
                    ts.len() == ps.len()
                        && ps.iter().zip(ts.iter()).all(|(p, t)| p.always_matches(t))
                }
                _ => false,
            },
            Pattern::Record(_, name, ps) => match ty.resolve() {
                Type::Record { name: rname, fields } => {
                    rname == name
                        && fields.len() == ps.len()
                        && ps
                            .iter()
                            .zip(fields.iter())
                            .all(|(p, (_, t))| p.always_matches(t))
                }
                _ => false,
            },
            _ => false,
        }
    }
}

impl Bind {
    pub fn pattern(&self) -> &Pattern {
        match self {
            Bind::Set(p, _) | Bind::Seq(p, _) | Bind::Type(p, _) => p,
        }
    }

    pub fn expression(&self) -> Option<Rc<Expr>> {
        match self {
            Bind::Set(_, e) | Bind::Seq(_, e) => Some(e.clone()),
            Bind::Type(_, _) => None,
        }
    }

    fn variables_into(&self, bound: &BTreeSet<String>, result: &mut BTreeSet<String>) {
        if let Some(e) = self.expression() {
            e.free_into(bound, result);
        }
    }
}

impl HasLoc for Expr {
    fn loc(&self) -> Srcloc {
        match self {
            Expr::Literal(l, _)
            | Expr::Variable(l, _, _)
            | Expr::Unary(l, _, _, _)
            | Expr::Field(l, _, _)
            | Expr::TupleSelect(l, _, _)
            | Expr::If(l, _, _, _, _)
            | Expr::Let(l, _, _)
            | Expr::LetBe(l, _, _, _)
            | Expr::Quantified(l, _, _, _)
            | Expr::Iota(l, _, _)
            | Expr::SetEnum(l, _)
            | Expr::SeqEnum(l, _)
            | Expr::MapEnum(l, _)
            | Expr::Tuple(l, _)
            | Expr::Record(l, _, _)
            | Expr::Mu(l, _, _)
            | Expr::SetComp(l, _, _, _)
            | Expr::SeqComp(l, _, _, _)
            | Expr::MapComp(l, _, _, _, _)
            | Expr::Lambda(l, _, _) => l.clone(),
            Expr::Binary(b) => b.loc.clone(),
            Expr::Apply(a) => a.loc.clone(),
            Expr::Cases(c) => c.loc.clone(),
        }
    }
}

fn bind_all(bound: &BTreeSet<String>, names: Vec<String>) -> BTreeSet<String> {
    let mut result = bound.clone();
    for n in names.into_iter() {
        result.insert(n);
    }
    result
}

impl Expr {
    pub fn variable(loc: &Srcloc, name: &str, ty: Type) -> Expr {
        Expr::Variable(loc.clone(), name.to_string(), ty)
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Expr::Literal(_, _))
    }

    /// Free program variables of the expression, sorted.
    pub fn variables(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        self.free_into(&BTreeSet::new(), &mut result);
        result
    }

    fn free_into(&self, bound: &BTreeSet<String>, result: &mut BTreeSet<String>) {
        match self {
            Expr::Literal(_, _) => {}
            Expr::Variable(_, n, _) => {
                if !bound.contains(n) {
                    result.insert(n.clone());
                }
            }
            Expr::Unary(_, _, e, _) | Expr::Field(_, e, _) | Expr::TupleSelect(_, e, _) => {
                e.free_into(bound, result)
            }
            Expr::Binary(b) => {
                b.left.free_into(bound, result);
                b.right.free_into(bound, result);
            }
            Expr::Apply(a) => {
                a.root.free_into(bound, result);
                for arg in a.args.iter() {
                    arg.free_into(bound, result);
                }
            }
            Expr::If(_, c, t, elseifs, e) => {
                c.free_into(bound, result);
                t.free_into(bound, result);
                for (ec, et) in elseifs.iter() {
                    ec.free_into(bound, result);
                    et.free_into(bound, result);
                }
                e.free_into(bound, result);
            }
            Expr::Cases(c) => {
                c.subject.free_into(bound, result);
                for (p, body) in c.alternatives.iter() {
                    body.free_into(&bind_all(bound, p.variables()), result);
                }
                if let Some(o) = &c.others {
                    o.free_into(bound, result);
                }
            }
            Expr::Let(_, defs, body) => {
                let mut inner = bound.clone();
                for d in defs.iter() {
                    d.value.free_into(&inner, result);
                    inner = bind_all(&inner, d.pattern.variables());
                }
                body.free_into(&inner, result);
            }
            Expr::LetBe(_, bind, st, body) => {
                bind.variables_into(bound, result);
                let inner = bind_all(bound, bind.pattern().variables());
                if let Some(st) = st {
                    st.free_into(&inner, result);
                }
                body.free_into(&inner, result);
            }
            Expr::Quantified(_, _, binds, body) => {
                let mut inner = bound.clone();
                for b in binds.iter() {
                    b.variables_into(bound, result);
                    inner = bind_all(&inner, b.pattern().variables());
                }
                body.free_into(&inner, result);
            }
            Expr::Iota(_, bind, pred) => {
                bind.variables_into(bound, result);
                pred.free_into(&bind_all(bound, bind.pattern().variables()), result);
            }
            Expr::SetEnum(_, es) | Expr::SeqEnum(_, es) | Expr::Tuple(_, es) => {
                for e in es.iter() {
                    e.free_into(bound, result);
                }
            }
            Expr::Record(_, _, es) => {
                for e in es.iter() {
                    e.free_into(bound, result);
                }
            }
            Expr::MapEnum(_, maplets) => {
                for (k, v) in maplets.iter() {
                    k.free_into(bound, result);
                    v.free_into(bound, result);
                }
            }
            Expr::Mu(_, e, mods) => {
                e.free_into(bound, result);
                for (_, v) in mods.iter() {
                    v.free_into(bound, result);
                }
            }
            Expr::SetComp(_, elem, binds, pred) => {
                let mut inner = bound.clone();
                for b in binds.iter() {
                    b.variables_into(bound, result);
                    inner = bind_all(&inner, b.pattern().variables());
                }
                elem.free_into(&inner, result);
                if let Some(p) = pred {
                    p.free_into(&inner, result);
                }
            }
            Expr::SeqComp(_, elem, bind, pred) => {
                bind.variables_into(bound, result);
                let inner = bind_all(bound, bind.pattern().variables());
                elem.free_into(&inner, result);
                if let Some(p) = pred {
                    p.free_into(&inner, result);
                }
            }
            Expr::MapComp(_, k, v, binds, pred) => {
                let mut inner = bound.clone();
                for b in binds.iter() {
                    b.variables_into(bound, result);
                    inner = bind_all(&inner, b.pattern().variables());
                }
                k.free_into(&inner, result);
                v.free_into(&inner, result);
                if let Some(p) = pred {
                    p.free_into(&inner, result);
                }
            }
            Expr::Lambda(_, params, body) => {
                let mut inner = bound.clone();
                for (p, _) in params.iter() {
                    inner = bind_all(&inner, p.variables());
                }
                body.free_into(&inner, result);
            }
        }
    }
}

impl HasLoc for StateDesignator {
    fn loc(&self) -> Srcloc {
        match self {
            StateDesignator::Identifier(l, _, _)
            | StateDesignator::MapSeq(l, _, _, _)
            | StateDesignator::Field(l, _, _, _) => l.clone(),
        }
    }
}

impl StateDesignator {
    /// The variable ultimately updated and its type.
    pub fn base(&self) -> (String, Type) {
        match self {
            StateDesignator::Identifier(_, n, t) => (n.clone(), t.clone()),
            StateDesignator::MapSeq(_, d, _, _) | StateDesignator::Field(_, d, _, _) => d.base(),
        }
    }

    /// The designated location read as an expression.
    pub fn as_expr(&self) -> Expr {
        match self {
            StateDesignator::Identifier(l, n, t) => Expr::Variable(l.clone(), n.clone(), t.clone()),
            StateDesignator::MapSeq(l, d, k, t) => Expr::Apply(ApplyData {
                loc: l.clone(),
                root: Rc::new(d.as_expr()),
                args: vec![k.clone()],
                root_type: t.clone(),
                arg_types: vec![],
                cycles: vec![],
            }),
            StateDesignator::Field(l, d, f, _) => {
                Expr::Field(l.clone(), Rc::new(d.as_expr()), f.clone())
            }
        }
    }

    /// Type of the value stored at the designated location.
    pub fn target_type(&self) -> Type {
        match self {
            StateDesignator::Identifier(_, _, t) => t.clone(),
            StateDesignator::MapSeq(_, _, _, t) => t
                .map_types()
                .map(|(_, r)| r)
                .or_else(|| t.seq_element())
                .unwrap_or(Type::Unknown),
            StateDesignator::Field(_, _, f, t) => t.field_type(f).unwrap_or(Type::Unknown),
        }
    }

    /// Variables read when evaluating the designator, including the base.
    pub fn variables(&self) -> BTreeSet<String> {
        match self {
            StateDesignator::Identifier(_, n, _) => {
                let mut result = BTreeSet::new();
                result.insert(n.clone());
                result
            }
            StateDesignator::MapSeq(_, d, k, _) => {
                let mut result = d.variables();
                result.append(&mut k.variables());
                result
            }
            StateDesignator::Field(_, d, _, _) => d.variables(),
        }
    }
}

impl HasLoc for Stmt {
    fn loc(&self) -> Srcloc {
        match self {
            Stmt::Skip(l)
            | Stmt::Assignment(l, _, _, _)
            | Stmt::Block(l, _, _)
            | Stmt::If(l, _, _, _, _)
            | Stmt::While(l, _, _, _)
            | Stmt::Return(l, _, _)
            | Stmt::NonDeterministic(l, _)
            | Stmt::Let(l, _, _) => l.clone(),
            Stmt::Cases(c) => c.loc.clone(),
            Stmt::ForIndex(f) => f.loc.clone(),
            Stmt::Call(c) => c.loc.clone(),
        }
    }
}

impl Stmt {
    /// Variables assigned anywhere inside the statement that are visible
    /// outside it.  Operation calls contribute whatever call_writes reports
    /// for the called operation.
    pub fn updates(
        &self,
        call_writes: &dyn Fn(&str) -> Vec<(String, Type)>,
    ) -> BTreeMap<String, Type> {
        let mut result = BTreeMap::new();
        self.updates_into(call_writes, &BTreeSet::new(), &mut result);
        result
    }

    fn updates_into(
        &self,
        call_writes: &dyn Fn(&str) -> Vec<(String, Type)>,
        local: &BTreeSet<String>,
        result: &mut BTreeMap<String, Type>,
    ) {
        match self {
            Stmt::Skip(_) | Stmt::Return(_, _, _) => {}
            Stmt::Assignment(_, d, _, _) => {
                let (name, ty) = d.base();
                if !local.contains(&name) {
                    result.insert(name, ty);
                }
            }
            Stmt::Block(_, dcls, stmts) => {
                let inner = bind_all(local, dcls.iter().map(|d| d.name.clone()).collect());
                for s in stmts.iter() {
                    s.updates_into(call_writes, &inner, result);
                }
            }
            Stmt::If(_, _, t, elseifs, e) => {
                t.updates_into(call_writes, local, result);
                for (_, s) in elseifs.iter() {
                    s.updates_into(call_writes, local, result);
                }
                if let Some(e) = e {
                    e.updates_into(call_writes, local, result);
                }
            }
            Stmt::Cases(c) => {
                for (p, s) in c.alternatives.iter() {
                    s.updates_into(call_writes, &bind_all(local, p.variables()), result);
                }
                if let Some(o) = &c.others {
                    o.updates_into(call_writes, local, result);
                }
            }
            Stmt::ForIndex(f) => {
                let inner = bind_all(local, vec![f.var.clone()]);
                f.body.updates_into(call_writes, &inner, result);
            }
            Stmt::While(_, _, _, body) => body.updates_into(call_writes, local, result),
            Stmt::Call(c) => {
                for (name, ty) in call_writes(&c.name).into_iter() {
                    if !local.contains(&name) {
                        result.insert(name, ty);
                    }
                }
            }
            Stmt::NonDeterministic(_, stmts) => {
                for s in stmts.iter() {
                    s.updates_into(call_writes, local, result);
                }
            }
            Stmt::Let(_, defs, body) => {
                let mut inner = local.clone();
                for d in defs.iter() {
                    inner = bind_all(&inner, d.pattern.variables());
                }
                body.updates_into(call_writes, &inner, result);
            }
        }
    }

    /// Statements nested directly inside this one.
    pub fn children(&self) -> Vec<Rc<Stmt>> {
        match self {
            Stmt::Skip(_)
            | Stmt::Assignment(_, _, _, _)
            | Stmt::Call(_)
            | Stmt::Return(_, _, _) => vec![],
            Stmt::Block(_, _, stmts) | Stmt::NonDeterministic(_, stmts) => stmts.clone(),
            Stmt::If(_, _, t, elseifs, e) => {
                let mut result = vec![t.clone()];
                result.extend(elseifs.iter().map(|(_, s)| s.clone()));
                result.extend(e.iter().cloned());
                result
            }
            Stmt::Cases(c) => {
                let mut result: Vec<Rc<Stmt>> =
                    c.alternatives.iter().map(|(_, s)| s.clone()).collect();
                result.extend(c.others.iter().cloned());
                result
            }
            Stmt::ForIndex(f) => vec![f.body.clone()],
            Stmt::While(_, _, _, body) | Stmt::Let(_, _, body) => vec![body.clone()],
        }
    }

    /// Variables read anywhere inside the statement.
    pub fn all_reads(&self) -> BTreeSet<String> {
        let mut result = self.reads();
        for c in self.children().iter() {
            result.append(&mut c.all_reads());
        }
        result
    }

    /// Variables read by the statement itself, not counting the statements
    /// nested inside it.
    pub fn reads(&self) -> BTreeSet<String> {
        let mut result = BTreeSet::new();
        match self {
            Stmt::Skip(_) | Stmt::NonDeterministic(_, _) => {}
            Stmt::Assignment(_, d, v, _) => {
                result.append(&mut v.variables());
                if !matches!(d, StateDesignator::Identifier(_, _, _)) {
                    result.append(&mut d.variables());
                }
            }
            Stmt::Block(_, dcls, _) => {
                for d in dcls.iter() {
                    if let Some(i) = &d.init {
                        result.append(&mut i.variables());
                    }
                }
            }
            Stmt::If(_, c, _, elseifs, _) => {
                result.append(&mut c.variables());
                for (ec, _) in elseifs.iter() {
                    result.append(&mut ec.variables());
                }
            }
            Stmt::Cases(c) => result.append(&mut c.subject.variables()),
            Stmt::ForIndex(f) => {
                result.append(&mut f.from.variables());
                result.append(&mut f.to.variables());
                if let Some(by) = &f.by {
                    result.append(&mut by.variables());
                }
            }
            Stmt::While(_, c, _, _) => result.append(&mut c.variables()),
            Stmt::Call(c) => {
                for a in c.args.iter() {
                    result.append(&mut a.variables());
                }
            }
            Stmt::Return(_, e, _) => {
                if let Some(e) = e {
                    result.append(&mut e.variables());
                }
            }
            Stmt::Let(_, defs, _) => {
                for d in defs.iter() {
                    result.append(&mut d.value.variables());
                }
            }
        }
        result
    }
}

impl HasLoc for Definition {
    fn loc(&self) -> Srcloc {
        match self {
            Definition::ExplicitFunction(f) => f.loc.clone(),
            Definition::ImplicitFunction(f) => f.loc.clone(),
            Definition::ExplicitOperation(o) => o.loc.clone(),
            Definition::Value(v) => v.loc.clone(),
            Definition::Type(t) => t.loc.clone(),
            Definition::State(s) => s.loc.clone(),
            Definition::InstanceVariable(i) => i.loc.clone(),
        }
    }
}

impl Definition {
    pub fn name(&self) -> String {
        match self {
            Definition::ExplicitFunction(f) => f.name.clone(),
            Definition::ImplicitFunction(f) => f.name.clone(),
            Definition::ExplicitOperation(o) => o.name.clone(),
            Definition::Value(v) => v.pattern.to_string(),
            Definition::Type(t) => t.name.clone(),
            Definition::State(s) => s.name.clone(),
            Definition::InstanceVariable(i) => i.name.clone(),
        }
    }

    pub fn precondition(&self) -> Option<Rc<Expr>> {
        match self {
            Definition::ExplicitFunction(f) => f.pre.clone(),
            Definition::ImplicitFunction(f) => f.pre.clone(),
            Definition::ExplicitOperation(o) => o.pre.clone(),
            _ => None,
        }
    }

    /// Declared measure of a function.
    pub fn measure(&self) -> Option<String> {
        match self {
            Definition::ExplicitFunction(f) => f.measure.clone(),
            Definition::ImplicitFunction(f) => f.measure.clone(),
            _ => None,
        }
    }

    /// Parameter patterns of anything that can be called.
    pub fn parameters(&self) -> Vec<Pattern> {
        match self {
            Definition::ExplicitFunction(f) => f.params.clone(),
            Definition::ImplicitFunction(f) => f.params.iter().map(|(p, _)| p.clone()).collect(),
            Definition::ExplicitOperation(o) => o.params.clone(),
            _ => vec![],
        }
    }

    pub fn type_params(&self) -> Vec<String> {
        match self {
            Definition::ExplicitFunction(f) => f.type_params.clone(),
            Definition::ImplicitFunction(f) => f.type_params.clone(),
            _ => vec![],
        }
    }

    /// Result type, for definitions that can be called.
    pub fn result_type(&self) -> Option<Type> {
        match self {
            Definition::ExplicitFunction(f) => f.fn_type.signature().map(|(_, r)| r),
            Definition::ImplicitFunction(f) => Some(f.result.1.clone()),
            Definition::ExplicitOperation(o) => o.op_type.signature().map(|(_, r)| r),
            _ => None,
        }
    }
}
