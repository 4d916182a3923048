use std::rc::Rc;

use crate::compiler::environment::{DiagnosticSink, Diagnostics, ModuleEnvironment};
use crate::compiler::ops::{BinaryOp, UnaryOp};
use crate::compiler::pog::context::POContextStack;
use crate::compiler::pog::driver::{generate, CancelToken, DefaultPogOpts, PogOpts, PogResult};
use crate::compiler::pog::expression::expression_obligations;
use crate::compiler::pog::obligation::ProofObligationList;
use crate::compiler::pog::state::POGState;
use crate::compiler::pog::statement::statement_obligations;
use crate::compiler::pog::PogErr;
use crate::compiler::srcloc::Srcloc;
use crate::compiler::typedtree::{
    ApplyData, BinaryData, Definition, Expr, ForIndexData, FunctionData, Literal, Module,
    ModuleKind, OperationData, Pattern, StateDesignator, Stmt,
};
use crate::compiler::types::Type;

pub fn loc(line: usize, col: usize) -> Srcloc {
    Srcloc::start("test.vdm").at(line, col)
}

pub fn int(n: i64) -> Rc<Expr> {
    Rc::new(Expr::Literal(loc(1, 1), Literal::Int(n.into())))
}

pub fn boolean(b: bool) -> Rc<Expr> {
    Rc::new(Expr::Literal(loc(1, 1), Literal::Bool(b)))
}

pub fn var(name: &str, ty: Type) -> Rc<Expr> {
    Rc::new(Expr::variable(&loc(1, 1), name, ty))
}

pub fn nat(name: &str) -> Rc<Expr> {
    var(name, Type::Nat)
}

pub fn binop(op: BinaryOp, left: Rc<Expr>, ltype: Type, right: Rc<Expr>, rtype: Type) -> Rc<Expr> {
    Rc::new(Expr::Binary(BinaryData {
        loc: loc(1, 1),
        op,
        left,
        right,
        ltype,
        rtype,
    }))
}

/// A binary expression between two naturals.
pub fn natop(op: BinaryOp, left: Rc<Expr>, right: Rc<Expr>) -> Rc<Expr> {
    binop(op, left, Type::Nat, right, Type::Nat)
}

pub fn unop(op: UnaryOp, arg: Rc<Expr>, ty: Type) -> Rc<Expr> {
    Rc::new(Expr::Unary(loc(1, 1), op, arg, ty))
}

pub fn call(name: &str, fn_type: Type, args: Vec<Rc<Expr>>, arg_types: Vec<Type>) -> Rc<Expr> {
    Rc::new(Expr::Apply(ApplyData {
        loc: loc(1, 1),
        root: var(name, fn_type.clone()),
        args,
        root_type: fn_type,
        arg_types,
        cycles: vec![],
    }))
}

pub fn maplet_map(k: i64, v: i64) -> Rc<Expr> {
    Rc::new(Expr::MapEnum(loc(1, 1), vec![(int(k), int(v))]))
}

pub fn assign_at(line: usize, name: &str, ty: Type, value: Rc<Expr>, value_type: Type) -> Rc<Stmt> {
    Rc::new(Stmt::Assignment(
        loc(line, 5),
        StateDesignator::Identifier(loc(line, 5), name.to_string(), ty),
        value,
        value_type,
    ))
}

pub fn assign(name: &str, value: Rc<Expr>) -> Rc<Stmt> {
    assign_at(1, name, Type::Nat, value, Type::Nat)
}

pub fn block(stmts: Vec<Rc<Stmt>>) -> Rc<Stmt> {
    Rc::new(Stmt::Block(loc(1, 1), vec![], stmts))
}

pub fn skip() -> Rc<Stmt> {
    Rc::new(Stmt::Skip(loc(1, 1)))
}

pub fn for_loop(line: usize, var: &str, from: i64, to: i64, invariant: Option<Rc<Expr>>, body: Rc<Stmt>) -> Rc<Stmt> {
    Rc::new(Stmt::ForIndex(ForIndexData {
        loc: loc(line, 3),
        var: var.to_string(),
        from: int(from),
        to: int(to),
        by: None,
        invariant,
        body,
    }))
}

pub fn operation(
    name: &str,
    result: Type,
    body: Rc<Stmt>,
    pre: Option<Rc<Expr>>,
    post: Option<Rc<Expr>>,
    writes: Vec<(String, Type)>,
) -> Rc<Definition> {
    Rc::new(Definition::ExplicitOperation(OperationData {
        loc: loc(1, 1),
        name: name.to_string(),
        op_type: Type::Operation {
            params: vec![],
            result: Rc::new(result),
        },
        params: vec![],
        body,
        pre,
        post,
        writes,
    }))
}

/// fn(params) == body, with one natural parameter per name.
pub fn function(name: &str, params: &[&str], result: Type, body: Rc<Expr>, body_type: Type) -> FunctionData {
    FunctionData {
        loc: loc(1, 1),
        name: name.to_string(),
        type_params: vec![],
        fn_type: Type::total_function(params.iter().map(|_| Type::Nat).collect(), result),
        params: params.iter().map(|p| Pattern::identifier(&loc(1, 1), p)).collect(),
        body,
        body_type,
        pre: None,
        post: None,
        measure: None,
        recursive: false,
    }
}

pub fn module(definitions: Vec<Rc<Definition>>) -> Module {
    Module {
        loc: loc(1, 1),
        name: "M".to_string(),
        kind: ModuleKind::Module,
        definitions,
    }
}

pub fn opts() -> Rc<dyn PogOpts> {
    Rc::new(DefaultPogOpts::new("test.vdm"))
}

pub fn environment(m: &Module) -> (ModuleEnvironment, Rc<Diagnostics>) {
    let diagnostics = Rc::new(Diagnostics::new());
    let sink: Rc<dyn DiagnosticSink> = diagnostics.clone();
    (ModuleEnvironment::new(m, sink), diagnostics)
}

pub fn run_module_with(opts: Rc<dyn PogOpts>, definitions: Vec<Rc<Definition>>) -> (Result<PogResult, PogErr>, Rc<Diagnostics>) {
    let m = module(definitions);
    let (env, diagnostics) = environment(&m);
    (generate(opts, &env, &m, &CancelToken::new()), diagnostics)
}

pub fn run_module(definitions: Vec<Rc<Definition>>) -> ProofObligationList {
    match run_module_with(opts(), definitions).0 {
        Ok(r) => r.obligations,
        Err(e) => panic!("generation failed: {}", e),
    }
}

/// Obligations of one expression against a module holding the definitions.
pub fn expression_pos(definitions: Vec<Rc<Definition>>, e: &Rc<Expr>) -> ProofObligationList {
    let m = module(definitions);
    let (env, _) = environment(&m);
    let state = POGState::new(opts(), "test");
    expression_obligations(&env, &state, &POContextStack::new(), e).expect("generates")
}

/// Obligations of one statement, with the stack it leaves behind.
pub fn statement_pos_with(
    opts: Rc<dyn PogOpts>,
    definitions: Vec<Rc<Definition>>,
    s: &Rc<Stmt>,
) -> Result<(ProofObligationList, POContextStack), PogErr> {
    let m = module(definitions);
    let (env, _) = environment(&m);
    let mut state = POGState::new(opts, "test");
    let mut ctxt = POContextStack::new();
    let found = statement_obligations(&env, &mut state, &mut ctxt, s)?;
    Ok((found, ctxt))
}

pub fn statement_pos(s: &Rc<Stmt>) -> ProofObligationList {
    statement_pos_with(opts(), vec![], s).expect("generates").0
}

pub fn formulas(pos: &ProofObligationList) -> Vec<String> {
    pos.iter().map(|po| po.formula.clone()).collect()
}
